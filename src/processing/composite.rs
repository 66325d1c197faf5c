//! # Sprite Compositing
//!
//! Raster operations used to draw one image ("sprite") onto a tile:
//!
//! 1. **Rotate**: counter-clockwise by the table angle, canvas grown to fit
//! 2. **Scale**: uniform factor so the unrotated original would span `image_size`
//! 3. **Shadow**: a black layer carrying the sprite's alpha, padded by the
//!    shadow radius, Gaussian blurred and dimmed by the opacity
//! 4. **Paste**: shadow, then sprite, alpha-composited over the canvas
//!
//! Pastes go through `imageops::overlay`, which clips against the canvas, so
//! sprites overlapping the tile edge are drawn partially.
//!
//! ## Performance Characteristics
//!
//! - **Scaling** goes through the SIMD resizer of `tile-scale`, with alpha
//!   premultiplication so transparent borders do not bleed colour
//! - **Rotation** is one bicubic `imageproc` pass over a padded square canvas
//! - **Blur** is `image::imageops::blur` on the shadow layer

use fast_image_resize::Resizer;
use image::{Rgba, RgbaImage, imageops};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use tile_scale::cpu::{ScaleError, scale_rgba_cpu};
use tile_scale::presets::{ResampleFilter, ScaleTarget, Size, build_plan, display_factor};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Shadow parameters shared by every sprite of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowStyle {
    /// Padding around the sprite; blur sigma is half of it.
    pub radius: u32,
    /// 0 = invisible, 1 = full black where the sprite is opaque.
    pub opacity: f32,
}

/// Rotate `src` counter-clockwise by `degrees`, enlarging the canvas so no
/// pixel is cut off. Uncovered pixels are fully transparent.
pub fn rotate_expand(src: &RgbaImage, degrees: f64) -> RgbaImage {
    if degrees.rem_euclid(360.0) == 0.0 {
        return src.clone();
    }
    let (w, h) = (f64::from(src.width()), f64::from(src.height()));
    let (sin, cos) = degrees.to_radians().sin_cos();
    let out_w = ((w * cos.abs() + h * sin.abs()) - 1e-6).ceil().max(1.0) as u32;
    let out_h = ((w * sin.abs() + h * cos.abs()) - 1e-6).ceil().max(1.0) as u32;

    // A square holding both the source and its rotation, centred on the source.
    let side = src.width().max(src.height()).max(out_w).max(out_h) + 2;
    let mut padded = RgbaImage::from_pixel(side, side, TRANSPARENT);
    imageops::replace(
        &mut padded,
        src,
        i64::from((side - src.width()) / 2),
        i64::from((side - src.height()) / 2),
    );

    // imageproc turns clockwise for positive angles in image coordinates.
    let turned = rotate_about_center(&padded, -(degrees.to_radians() as f32), Interpolation::Bicubic, TRANSPARENT);
    imageops::crop_imm(&turned, (side - out_w) / 2, (side - out_h) / 2, out_w, out_h).to_image()
}

/// Resize `src` by a uniform `factor` (each side floored, at least one pixel).
pub fn scale_sprite(
    resizer: &mut Resizer,
    src: &RgbaImage,
    factor: f64,
    filter: ResampleFilter,
) -> Result<RgbaImage, ScaleError> {
    let input = Size {
        w: src.width(),
        h: src.height(),
    };
    let plan = build_plan(input, ScaleTarget::Factor(factor), filter);
    if plan.out == input {
        return Ok(src.clone());
    }
    let mut dst = vec![0u8; plan.out.rgba_len()];
    scale_rgba_cpu(resizer, src.as_raw(), &plan, &mut dst, true)?;
    RgbaImage::from_raw(plan.out.w, plan.out.h, dst).ok_or(ScaleError::BufferTooSmall)
}

/// Rotate, then scale so that the unrotated `original` would have its longest
/// side equal to `display_side`.
pub fn prepare_sprite(
    resizer: &mut Resizer,
    original: &RgbaImage,
    degrees: f64,
    display_side: u32,
    filter: ResampleFilter,
) -> Result<RgbaImage, ScaleError> {
    let factor = display_factor(
        Size {
            w: original.width(),
            h: original.height(),
        },
        display_side,
    );
    let rotated = rotate_expand(original, degrees);
    scale_sprite(resizer, &rotated, factor, filter)
}

/// Black layer with the blurred, dimmed alpha of `sprite`, padded by
/// `style.radius` on every side.
pub fn shadow_layer(sprite: &RgbaImage, style: &ShadowStyle) -> RgbaImage {
    let r = style.radius;
    let mut layer = RgbaImage::from_pixel(sprite.width() + 2 * r, sprite.height() + 2 * r, TRANSPARENT);
    for (x, y, px) in sprite.enumerate_pixels() {
        layer.put_pixel(x + r, y + r, Rgba([0, 0, 0, px[3]]));
    }

    let sigma = (r / 2) as f32;
    if sigma > 0.0 {
        layer = imageops::blur(&layer, sigma);
    }
    let opacity = style.opacity.clamp(0.0, 1.0);
    for px in layer.pixels_mut() {
        *px = Rgba([0, 0, 0, (f32::from(px[3]) * opacity).round() as u8]);
    }
    layer
}

/// Shadow first, sprite on top, both centred on the pixel position `center`.
pub fn draw_sprite(canvas: &mut RgbaImage, sprite: &RgbaImage, center: [f64; 2], style: &ShadowStyle) {
    let left = (center[0] - f64::from(sprite.width() / 2)).floor() as i64;
    let top = (center[1] - f64::from(sprite.height() / 2)).floor() as i64;

    if style.opacity > 0.0 {
        let shadow = shadow_layer(sprite, style);
        let r = i64::from(style.radius);
        imageops::overlay(canvas, &shadow, left - r, top - r);
    }
    imageops::overlay(canvas, sprite, left, top);
}
