//! Velocity extrapolation: flood fluid-defined face values into the
//! surrounding air band by layered neighbor averaging.
//!
//! Layer 0 is the set of known faces. Each pass assigns every still-unknown
//! face adjacent to an earlier layer the mean of its already-assigned
//! 6-neighbors. Advection and the grid-to-particle gather sample velocity
//! just outside the fluid surface, so those faces must carry values.

use crate::grid::{CellLabel, Grid3, MacGrid3D};

/// Flood one component grid outward from its known faces.
///
/// `depth` bounds the number of layers; passing the maximum grid extent
/// floods the whole grid. The pass stops early once nothing changes.
pub fn extrapolate_component(field: &mut Grid3<f32>, known: &Grid3<bool>, depth: usize) {
    let (nx, ny, nz) = field.extents();
    let mut layer: Grid3<i32> = Grid3::new(nx, ny, nz, -1);

    for idx in 0..known.len() {
        if known.values()[idx] {
            layer.values_mut()[idx] = 0;
        }
    }

    for d in 1..=depth as i32 {
        let mut changed = false;

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    if layer.at(i, j, k) != -1 {
                        continue;
                    }

                    let mut sum = 0.0f32;
                    let mut count = 0u32;
                    let neighbors = [
                        (i as i32 - 1, j as i32, k as i32),
                        (i as i32 + 1, j as i32, k as i32),
                        (i as i32, j as i32 - 1, k as i32),
                        (i as i32, j as i32 + 1, k as i32),
                        (i as i32, j as i32, k as i32 - 1),
                        (i as i32, j as i32, k as i32 + 1),
                    ];

                    for &(ni, nj, nk) in &neighbors {
                        if let Some(l) = layer.get(ni, nj, nk) {
                            // Only earlier layers contribute, so a sweep
                            // never reads values assigned in the same pass.
                            if l != -1 && l < d {
                                sum += field.at(ni as usize, nj as usize, nk as usize);
                                count += 1;
                            }
                        }
                    }

                    if count > 0 {
                        field.set(i, j, k, sum / count as f32);
                        layer.set(i, j, k, d);
                        changed = true;
                    }
                }
            }
        }

        if !changed {
            break;
        }
    }
}

/// Rebuild the known masks from the label grid: a face is known when at
/// least one of its adjacent cells is fluid. Used before the second
/// extrapolation pass, after projection has rewritten fluid faces.
pub fn mark_known_from_labels(mac: &mut MacGrid3D) {
    let (nx, ny, nz) = (mac.nx as i32, mac.ny as i32, mac.nz as i32);

    let fluid = |labels: &Grid3<CellLabel>, i: i32, j: i32, k: i32| {
        labels.get(i, j, k) == Some(CellLabel::Fluid)
    };

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..=nx {
                let adjacent = fluid(&mac.labels, i - 1, j, k) || fluid(&mac.labels, i, j, k);
                mac.u_known.set(i as usize, j as usize, k as usize, adjacent);
            }
        }
    }
    for k in 0..nz {
        for j in 0..=ny {
            for i in 0..nx {
                let adjacent = fluid(&mac.labels, i, j - 1, k) || fluid(&mac.labels, i, j, k);
                mac.v_known.set(i as usize, j as usize, k as usize, adjacent);
            }
        }
    }
    for k in 0..=nz {
        for j in 0..ny {
            for i in 0..nx {
                let adjacent = fluid(&mac.labels, i, j, k - 1) || fluid(&mac.labels, i, j, k);
                mac.w_known.set(i as usize, j as usize, k as usize, adjacent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_seed_floods() {
        let mut field = Grid3::new(5, 1, 1, 0.0f32);
        let mut known = Grid3::new(5, 1, 1, false);
        field.set(0, 0, 0, 4.0);
        known.set(0, 0, 0, true);

        extrapolate_component(&mut field, &known, 5);

        // A single seed propagates its value unchanged down the line.
        for i in 0..5 {
            assert_eq!(field.at(i, 0, 0), 4.0);
        }
    }

    #[test]
    fn test_layered_average() {
        let mut field = Grid3::new(3, 1, 1, 0.0f32);
        let mut known = Grid3::new(3, 1, 1, false);
        field.set(0, 0, 0, 2.0);
        field.set(2, 0, 0, 6.0);
        known.set(0, 0, 0, true);
        known.set(2, 0, 0, true);

        extrapolate_component(&mut field, &known, 3);

        // The middle face averages its two layer-0 neighbors.
        assert_eq!(field.at(1, 0, 0), 4.0);
    }

    #[test]
    fn test_depth_limits_flood() {
        let mut field = Grid3::new(5, 1, 1, 0.0f32);
        let mut known = Grid3::new(5, 1, 1, false);
        field.set(0, 0, 0, 4.0);
        known.set(0, 0, 0, true);

        extrapolate_component(&mut field, &known, 2);

        assert_eq!(field.at(2, 0, 0), 4.0);
        // Beyond the requested depth nothing is written.
        assert_eq!(field.at(3, 0, 0), 0.0);
        assert_eq!(field.at(4, 0, 0), 0.0);
    }

    #[test]
    fn test_known_faces_untouched() {
        let mut field = Grid3::new(3, 3, 3, 0.0f32);
        let mut known = Grid3::new(3, 3, 3, false);
        field.set(1, 1, 1, 9.0);
        known.set(1, 1, 1, true);

        extrapolate_component(&mut field, &known, 4);

        assert_eq!(field.at(1, 1, 1), 9.0);
    }

    #[test]
    fn test_mark_known_from_labels() {
        let mut mac = MacGrid3D::new(3, 3, 3, 1.0);
        mac.labels.set(1, 1, 1, CellLabel::Fluid);

        mark_known_from_labels(&mut mac);

        // The two U faces bounding the fluid cell are known.
        assert!(mac.u_known.at(1, 1, 1));
        assert!(mac.u_known.at(2, 1, 1));
        // A face with no fluid on either side is not.
        assert!(!mac.u_known.at(0, 0, 0));
        assert!(mac.v_known.at(1, 1, 1));
        assert!(mac.v_known.at(1, 2, 1));
        assert!(mac.w_known.at(1, 1, 1));
        assert!(mac.w_known.at(1, 1, 2));
    }
}
