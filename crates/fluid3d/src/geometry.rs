//! Initial geometry: plain-text cell-label descriptions and in-code
//! label-grid builders.
//!
//! File format: `nz` frames separated by blank lines, one frame per Z
//! slice from k = 0 upward. Each frame holds `ny` lines of `nx`
//! characters, the first line being the top row (j = ny-1). Characters:
//! `s` solid, `f` fluid, `a` air. The outermost layer of cells must be
//! solid on every side.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::grid::{CellLabel, Grid3};

/// Read and parse a geometry file, validating it against the solver's
/// grid dimensions.
pub fn load_geometry(
    path: &Path,
    nx: usize,
    ny: usize,
    nz: usize,
) -> Result<Grid3<CellLabel>, ConfigError> {
    let text = fs::read_to_string(path)?;
    parse_geometry(&text, nx, ny, nz)
}

/// Parse geometry text into a label grid.
pub fn parse_geometry(
    text: &str,
    nx: usize,
    ny: usize,
    nz: usize,
) -> Result<Grid3<CellLabel>, ConfigError> {
    let mut frames: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                frames.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        frames.push(current);
    }

    let mismatch = |found_nx, found_ny, found_nz| ConfigError::DimensionMismatch {
        nx,
        ny,
        nz,
        found_nx,
        found_ny,
        found_nz,
    };

    if frames.len() != nz {
        return Err(mismatch(nx, ny, frames.len()));
    }

    let mut labels = Grid3::new(nx, ny, nz, CellLabel::Air);

    for (k, frame) in frames.iter().enumerate() {
        if frame.len() != ny {
            return Err(mismatch(nx, frame.len(), nz));
        }
        for (row, line) in frame.iter().enumerate() {
            let j = ny - 1 - row;
            let glyphs: Vec<char> = line.chars().collect();
            if glyphs.len() != nx {
                return Err(mismatch(glyphs.len(), ny, nz));
            }
            for (i, &glyph) in glyphs.iter().enumerate() {
                let label = match glyph {
                    's' => CellLabel::Solid,
                    'f' => CellLabel::Fluid,
                    'a' => CellLabel::Air,
                    _ => return Err(ConfigError::UnknownGlyph { glyph, frame: k }),
                };
                labels.set(i, j, k, label);
            }
        }
    }

    validate_boundary(&labels)?;
    Ok(labels)
}

/// Check that every cell on the outer boundary of the grid is solid.
pub fn validate_boundary(labels: &Grid3<CellLabel>) -> Result<(), ConfigError> {
    let (nx, ny, nz) = labels.extents();
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let on_boundary = i == 0
                    || j == 0
                    || k == 0
                    || i == nx - 1
                    || j == ny - 1
                    || k == nz - 1;
                if on_boundary && labels.at(i, j, k) != CellLabel::Solid {
                    return Err(ConfigError::OpenBoundary { i, j, k });
                }
            }
        }
    }
    Ok(())
}

/// A label grid with a one-cell solid shell and air inside. The usual
/// starting point for building scenes in code.
pub fn solid_box(nx: usize, ny: usize, nz: usize) -> Grid3<CellLabel> {
    let mut labels = Grid3::new(nx, ny, nz, CellLabel::Air);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                if i == 0 || j == 0 || k == 0 || i == nx - 1 || j == ny - 1 || k == nz - 1 {
                    labels.set(i, j, k, CellLabel::Solid);
                }
            }
        }
    }
    labels
}

/// Set every cell in the half-open box `[min, max)` to `label`.
pub fn fill_region(
    labels: &mut Grid3<CellLabel>,
    min: (usize, usize, usize),
    max: (usize, usize, usize),
    label: CellLabel,
) {
    for k in min.2..max.2 {
        for j in min.1..max.1 {
            for i in min.0..max.0 {
                labels.set(i, j, k, label);
            }
        }
    }
}
