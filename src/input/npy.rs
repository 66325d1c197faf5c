//! Memory-mapped reader for two-dimensional NumPy `.npy` arrays.
//!
//! The numeric inputs of a pyramid build (layout coordinates and latent
//! vectors) are produced by external tooling as `.npy` files. Only the subset
//! of the format those files use is supported: format versions 1–3,
//! little-endian `f4`/`f8` element types, C order, two dimensions.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use memmap2::MmapOptions;

use crate::error::{PyramidError, PyramidResult};

const MAGIC: &[u8] = b"\x93NUMPY";

/// Row-major matrix of `f64` values read from an `.npy` file.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyMatrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl NpyMatrix {
    /// Row `i` as a slice of `cols` values.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    F32,
    F64,
}

impl Element {
    fn width(self) -> usize {
        match self {
            Element::F32 => 4,
            Element::F64 => 8,
        }
    }
}

/// Read a 2-D floating point array.
pub fn read_matrix(path: &Path) -> PyramidResult<NpyMatrix> {
    let name = path.display().to_string();
    let file = File::open(path).map_err(|e| PyramidError::io_at("opening array", path, e).fatal())?;
    let len = file
        .metadata()
        .map_err(|e| PyramidError::io_at("reading array metadata", path, e).fatal())?
        .len();
    if len < 10 {
        return Err(PyramidError::input(name, "file too short for an .npy header"));
    }

    // SAFETY: the mapping is read-only and inputs are not modified during a run.
    let map = unsafe { MmapOptions::new().map(&file) }
        .map_err(|e| PyramidError::io_at("mapping array", path, e).fatal())?;
    parse(&map).map_err(|reason| PyramidError::input(name, reason))
}

fn parse(bytes: &[u8]) -> Result<NpyMatrix, String> {
    if !bytes.starts_with(MAGIC) {
        return Err("missing .npy magic string".to_string());
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err("truncated header length".to_string());
            }
            (u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize, 12)
        }
        v => return Err(format!("unsupported .npy format version {}", v)),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err("truncated header".to_string());
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| "header is not valid text".to_string())?;

    let element = match dict_value(header, "descr")?.trim_matches(|c| c == '\'' || c == '"') {
        "<f4" => Element::F32,
        "<f8" => Element::F64,
        other => return Err(format!("unsupported element type {}", other)),
    };
    if dict_value(header, "fortran_order")?.trim() != "False" {
        return Err("Fortran-ordered arrays are not supported".to_string());
    }
    let (rows, cols) = parse_shape(header)?;

    let payload = &bytes[data_start..];
    let expected = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(element.width()))
        .ok_or_else(|| format!("shape ({}, {}) is too large", rows, cols))?;
    if payload.len() < expected {
        return Err(format!(
            "expected {} bytes of data for shape ({}, {}), found {}",
            expected,
            rows,
            cols,
            payload.len()
        ));
    }

    let data = match element {
        Element::F32 => payload[..expected]
            .chunks_exact(4)
            .map(|c| f64::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect(),
        Element::F64 => payload[..expected]
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect(),
    };

    Ok(NpyMatrix { rows, cols, data })
}

/// Raw text of `'key': value` up to the next top-level comma.
fn dict_value<'h>(header: &'h str, key: &str) -> Result<&'h str, String> {
    let pattern = format!("'{}':", key);
    let start = header
        .find(&pattern)
        .map(|i| i + pattern.len())
        .ok_or_else(|| format!("header has no '{}' entry", key))?;
    let rest = header[start..].trim_start();
    let end = rest.find([',', '}']).unwrap_or(rest.len());
    Ok(rest[..end].trim())
}

fn parse_shape(header: &str) -> Result<(usize, usize), String> {
    let start = header
        .find("'shape':")
        .ok_or_else(|| "header has no 'shape' entry".to_string())?;
    let rest = &header[start..];
    let open = rest.find('(').ok_or("malformed shape")?;
    let close = rest.find(')').ok_or("malformed shape")?;
    let dims = rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| format!("bad dimension '{}'", s)))
        .collect::<Result<Vec<_>, _>>()?;
    match dims.as_slice() {
        [rows, cols] => Ok((*rows, *cols)),
        _ => Err(format!("expected a 2-D array, found {} dimensions", dims.len())),
    }
}

/// Write a C-ordered `<f8` array in format version 1.
///
/// Produces files [`read_matrix`] accepts; used to stage inputs for tests and tooling.
pub fn write_matrix(path: &Path, rows: usize, cols: usize, data: &[f64]) -> PyramidResult<()> {
    if data.len() != rows * cols {
        return Err(PyramidError::input(
            path.display().to_string(),
            format!("{} values do not fill shape ({}, {})", data.len(), rows, cols),
        ));
    }
    let mut header = format!(
        "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
        rows, cols
    );
    // Pad so the data starts on a 64-byte boundary, header ends with a newline.
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut bytes = Vec::with_capacity(MAGIC.len() + 4 + header.len() + data.len() * 8);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&[1, 0]);
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    for value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    let mut file = File::create(path).map_err(|e| PyramidError::io_at("creating array", path, e))?;
    file.write_all(&bytes)
        .map_err(|e| PyramidError::io_at("writing array", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_file(descr: &str, shape: &str, payload: &[u8]) -> Vec<u8> {
        let header = format!("{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}\n", descr, shape);
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn parses_f4_arrays() {
        let payload: Vec<u8> = [0.5f32, -1.0, 0.25, 1.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let m = parse(&v1_file("<f4", "(2, 2)", &payload)).unwrap();
        assert_eq!((m.rows, m.cols), (2, 2));
        assert_eq!(m.row(1), &[0.25, 1.0]);
    }

    #[test]
    fn rejects_wrong_rank() {
        let err = parse(&v1_file("<f8", "(4,)", &[0u8; 32])).unwrap_err();
        assert!(err.contains("2-D"));
    }

    #[test]
    fn rejects_unsupported_dtype() {
        let err = parse(&v1_file("<i8", "(1, 1)", &[0u8; 8])).unwrap_err();
        assert!(err.contains("<i8"));
    }

    #[test]
    fn rejects_short_payload() {
        let err = parse(&v1_file("<f8", "(2, 2)", &[0u8; 16])).unwrap_err();
        assert!(err.contains("expected 32 bytes"));
    }

    #[test]
    fn rejects_overflowing_shape() {
        let shape = format!("({}, {})", usize::MAX / 2, 3);
        let err = parse(&v1_file("<f8", &shape, &[0u8; 8])).unwrap_err();
        assert!(err.contains("too large"), "{}", err);
    }

    #[test]
    fn oversized_header_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latent.npy");
        let shape = format!("({}, {})", usize::MAX, usize::MAX);
        std::fs::write(&path, v1_file("<f4", &shape, &[0u8; 16])).unwrap();
        let err = read_matrix(&path).unwrap_err();
        assert_eq!(err.category(), "input");
    }

    #[test]
    fn written_files_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.npy");
        let data = [0.1, 0.2, -0.3, 0.4, 0.5, -0.6];
        write_matrix(&path, 3, 2, &data).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);

        let m = read_matrix(&path).unwrap();
        assert_eq!((m.rows, m.cols), (3, 2));
        assert_eq!(m.data, data);
    }
}
