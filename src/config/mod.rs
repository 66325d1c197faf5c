//! # Configuration Module
//!
//! This module provides the configuration structure for pyramid builds.

pub mod config;

pub use config::PyramidConfig;
