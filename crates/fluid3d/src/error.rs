//! Error types for solver construction and geometry loading.
//!
//! Stepping never fails; once construction and `init` succeed the
//! simulation is total.

use thiserror::Error;

/// Failures possible when constructing or initializing the solver.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read geometry file")]
    Io(#[from] std::io::Error),

    #[error("grid dimensions must each be at least 2, got {nx}x{ny}x{nz}")]
    GridTooSmall { nx: usize, ny: usize, nz: usize },

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },

    #[error("geometry describes a {found_nx}x{found_ny}x{found_nz} grid, expected {nx}x{ny}x{nz}")]
    DimensionMismatch {
        nx: usize,
        ny: usize,
        nz: usize,
        found_nx: usize,
        found_ny: usize,
        found_nz: usize,
    },

    #[error("unexpected character {glyph:?} in geometry frame {frame}")]
    UnknownGlyph { glyph: char, frame: usize },

    #[error("boundary cell ({i}, {j}, {k}) is not solid")]
    OpenBoundary { i: usize, j: usize, k: usize },
}
