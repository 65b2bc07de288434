//! Pressure projection: assemble the sparse SPD Poisson system over fluid
//! cells, solve it with a MIC(0)-preconditioned conjugate gradient, and
//! subtract the pressure gradient so the face velocities are divergence-free.
//!
//! Solid boundary condition: faces touching a solid cell carry zero normal
//! velocity and contribute nothing to the divergence. Air cells hold zero
//! pressure and appear only on the matrix diagonal.

use crate::constants::{FLUID_DENSITY, PRESSURE_MAX_ITERATIONS, PRESSURE_TOLERANCE};
use crate::grid::{CellLabel, Grid3, MacGrid3D};

/// Outcome of one projection solve.
#[derive(Debug, Clone, Copy)]
pub struct SolveStats {
    /// Conjugate-gradient iterations performed.
    pub iterations: usize,
    /// Final residual 2-norm.
    pub residual: f64,
    /// Whether the relative tolerance was met before the iteration cap.
    pub converged: bool,
}

// Bridson's modified-incomplete-Cholesky constants.
const MIC_TUNING: f64 = 0.97;
const MIC_SAFETY: f64 = 0.25;

/// Project the face velocities onto the divergence-free space.
///
/// Writes the solved pressures into `mac.pressure` (zero for air and solid
/// cells), updates the face velocities, and zeroes every solid-adjacent
/// face. Never fails: on non-convergence the best iterate is applied and
/// the stats report it.
pub fn project(mac: &mut MacGrid3D, dt: f32) -> SolveStats {
    let system = PressureSystem::build(mac, dt);
    mac.pressure.fill(0.0);

    let stats = if system.cells.is_empty() {
        SolveStats {
            iterations: 0,
            residual: 0.0,
            converged: true,
        }
    } else {
        let (pressures, stats) = system.solve();
        for (row, &(i, j, k)) in system.cells.iter().enumerate() {
            mac.pressure
                .set(i as usize, j as usize, k as usize, pressures[row] as f32);
        }
        stats
    };

    apply_gradient(mac, dt);
    enforce_solid_boundaries(mac);
    stats
}

/// The Poisson system in Bridson's compressed grid form: one row per fluid
/// cell, a diagonal, and the three positive-direction off-diagonals.
struct PressureSystem {
    /// Row id per cell, -1 for non-fluid.
    index: Grid3<i32>,
    /// Cell coordinates per row, in lexicographic (k, j, i) order.
    cells: Vec<(i32, i32, i32)>,
    adiag: Vec<f64>,
    aplusx: Vec<f64>,
    aplusy: Vec<f64>,
    aplusz: Vec<f64>,
    rhs: Vec<f64>,
    precon: Vec<f64>,
}

impl PressureSystem {
    fn build(mac: &MacGrid3D, dt: f32) -> Self {
        let (nx, ny, nz) = (mac.nx, mac.ny, mac.nz);
        let dx = mac.dx as f64;
        let scale = dt as f64 / (FLUID_DENSITY as f64 * dx * dx);

        let mut index: Grid3<i32> = Grid3::new(nx, ny, nz, -1);
        let mut cells = Vec::new();

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    if mac.labels.at(i, j, k) == CellLabel::Fluid {
                        index.set(i, j, k, cells.len() as i32);
                        cells.push((i as i32, j as i32, k as i32));
                    }
                }
            }
        }

        let n = cells.len();
        let mut adiag = vec![0.0; n];
        let mut aplusx = vec![0.0; n];
        let mut aplusy = vec![0.0; n];
        let mut aplusz = vec![0.0; n];
        let mut rhs = vec![0.0; n];

        let label = |i: i32, j: i32, k: i32| mac.labels.get(i, j, k).unwrap_or(CellLabel::Solid);

        for (row, &(i, j, k)) in cells.iter().enumerate() {
            // Every non-solid neighbor adds to the diagonal; fluid neighbors
            // in the positive directions also carry the off-diagonal entry
            // (negative-direction entries live on the neighbor's row).
            for (ni, nj, nk) in [(i - 1, j, k), (i, j - 1, k), (i, j, k - 1)] {
                if label(ni, nj, nk) != CellLabel::Solid {
                    adiag[row] += scale;
                }
            }
            match label(i + 1, j, k) {
                CellLabel::Fluid => {
                    adiag[row] += scale;
                    aplusx[row] = -scale;
                }
                CellLabel::Air => adiag[row] += scale,
                CellLabel::Solid => {}
            }
            match label(i, j + 1, k) {
                CellLabel::Fluid => {
                    adiag[row] += scale;
                    aplusy[row] = -scale;
                }
                CellLabel::Air => adiag[row] += scale,
                CellLabel::Solid => {}
            }
            match label(i, j, k + 1) {
                CellLabel::Fluid => {
                    adiag[row] += scale;
                    aplusz[row] = -scale;
                }
                CellLabel::Air => adiag[row] += scale,
                CellLabel::Solid => {}
            }

            // Divergence with solid faces contributing zero velocity.
            let (iu, ju, ku) = (i as usize, j as usize, k as usize);
            let u_left = if label(i - 1, j, k) == CellLabel::Solid {
                0.0
            } else {
                mac.u.at(iu, ju, ku)
            };
            let u_right = if label(i + 1, j, k) == CellLabel::Solid {
                0.0
            } else {
                mac.u.at(iu + 1, ju, ku)
            };
            let v_bottom = if label(i, j - 1, k) == CellLabel::Solid {
                0.0
            } else {
                mac.v.at(iu, ju, ku)
            };
            let v_top = if label(i, j + 1, k) == CellLabel::Solid {
                0.0
            } else {
                mac.v.at(iu, ju + 1, ku)
            };
            let w_back = if label(i, j, k - 1) == CellLabel::Solid {
                0.0
            } else {
                mac.w.at(iu, ju, ku)
            };
            let w_front = if label(i, j, k + 1) == CellLabel::Solid {
                0.0
            } else {
                mac.w.at(iu, ju, ku + 1)
            };

            let div = (u_right - u_left) + (v_top - v_bottom) + (w_front - w_back);
            rhs[row] = -(div as f64) / dx;
        }

        let mut system = Self {
            index,
            cells,
            adiag,
            aplusx,
            aplusy,
            aplusz,
            rhs,
            precon: vec![0.0; n],
        };
        system.build_preconditioner();
        system
    }

    #[inline]
    fn row_at(&self, i: i32, j: i32, k: i32) -> Option<usize> {
        match self.index.get(i, j, k) {
            Some(r) if r >= 0 => Some(r as usize),
            _ => None,
        }
    }

    /// MIC(0) factorization. Rows are lexicographically ordered, so the
    /// minus-direction neighbors referenced here are always already done.
    fn build_preconditioner(&mut self) {
        for row in 0..self.cells.len() {
            let (i, j, k) = self.cells[row];
            let mut e = self.adiag[row];

            if let Some(nr) = self.row_at(i - 1, j, k) {
                let ax = self.aplusx[nr] * self.precon[nr];
                e -= ax * ax
                    + MIC_TUNING
                        * self.aplusx[nr]
                        * (self.aplusy[nr] + self.aplusz[nr])
                        * self.precon[nr]
                        * self.precon[nr];
            }
            if let Some(nr) = self.row_at(i, j - 1, k) {
                let ay = self.aplusy[nr] * self.precon[nr];
                e -= ay * ay
                    + MIC_TUNING
                        * self.aplusy[nr]
                        * (self.aplusx[nr] + self.aplusz[nr])
                        * self.precon[nr]
                        * self.precon[nr];
            }
            if let Some(nr) = self.row_at(i, j, k - 1) {
                let az = self.aplusz[nr] * self.precon[nr];
                e -= az * az
                    + MIC_TUNING
                        * self.aplusz[nr]
                        * (self.aplusx[nr] + self.aplusy[nr])
                        * self.precon[nr]
                        * self.precon[nr];
            }

            if e < MIC_SAFETY * self.adiag[row] {
                e = self.adiag[row];
            }
            self.precon[row] = if e > 0.0 { 1.0 / e.sqrt() } else { 0.0 };
        }
    }

    /// z = M⁻¹ r via forward then backward triangular solves.
    fn apply_preconditioner(&self, r: &[f64], q: &mut [f64], z: &mut [f64]) {
        let n = self.cells.len();

        for row in 0..n {
            let (i, j, k) = self.cells[row];
            let mut t = r[row];
            if let Some(nr) = self.row_at(i - 1, j, k) {
                t -= self.aplusx[nr] * self.precon[nr] * q[nr];
            }
            if let Some(nr) = self.row_at(i, j - 1, k) {
                t -= self.aplusy[nr] * self.precon[nr] * q[nr];
            }
            if let Some(nr) = self.row_at(i, j, k - 1) {
                t -= self.aplusz[nr] * self.precon[nr] * q[nr];
            }
            q[row] = t * self.precon[row];
        }

        for row in (0..n).rev() {
            let (i, j, k) = self.cells[row];
            let mut t = q[row];
            if let Some(nr) = self.row_at(i + 1, j, k) {
                t -= self.aplusx[row] * self.precon[row] * z[nr];
            }
            if let Some(nr) = self.row_at(i, j + 1, k) {
                t -= self.aplusy[row] * self.precon[row] * z[nr];
            }
            if let Some(nr) = self.row_at(i, j, k + 1) {
                t -= self.aplusz[row] * self.precon[row] * z[nr];
            }
            z[row] = t * self.precon[row];
        }
    }

    /// out = A x.
    fn apply_matrix(&self, x: &[f64], out: &mut [f64]) {
        for (row, &(i, j, k)) in self.cells.iter().enumerate() {
            let mut t = self.adiag[row] * x[row];
            if let Some(nr) = self.row_at(i - 1, j, k) {
                t += self.aplusx[nr] * x[nr];
            }
            if let Some(nr) = self.row_at(i + 1, j, k) {
                t += self.aplusx[row] * x[nr];
            }
            if let Some(nr) = self.row_at(i, j - 1, k) {
                t += self.aplusy[nr] * x[nr];
            }
            if let Some(nr) = self.row_at(i, j + 1, k) {
                t += self.aplusy[row] * x[nr];
            }
            if let Some(nr) = self.row_at(i, j, k - 1) {
                t += self.aplusz[nr] * x[nr];
            }
            if let Some(nr) = self.row_at(i, j, k + 1) {
                t += self.aplusz[row] * x[nr];
            }
            out[row] = t;
        }
    }

    /// Preconditioned conjugate gradient, Bridson's formulation.
    fn solve(&self) -> (Vec<f64>, SolveStats) {
        let n = self.cells.len();
        let mut p = vec![0.0; n];
        let mut r = self.rhs.clone();

        let b_norm = norm2(&r);
        if b_norm <= f64::EPSILON {
            return (
                p,
                SolveStats {
                    iterations: 0,
                    residual: 0.0,
                    converged: true,
                },
            );
        }

        let mut q = vec![0.0; n];
        let mut z = vec![0.0; n];
        self.apply_preconditioner(&r, &mut q, &mut z);
        let mut s = z.clone();
        let mut sigma = dot(&z, &r);

        for iter in 1..=PRESSURE_MAX_ITERATIONS {
            self.apply_matrix(&s, &mut z);
            let sz = dot(&z, &s);
            if sz.abs() < f64::MIN_POSITIVE {
                break;
            }
            let alpha = sigma / sz;

            for idx in 0..n {
                p[idx] += alpha * s[idx];
                r[idx] -= alpha * z[idx];
            }

            let residual = norm2(&r);
            if residual <= PRESSURE_TOLERANCE * b_norm {
                return (
                    p,
                    SolveStats {
                        iterations: iter,
                        residual,
                        converged: true,
                    },
                );
            }

            self.apply_preconditioner(&r, &mut q, &mut z);
            let sigma_new = dot(&z, &r);
            if sigma.abs() < f64::MIN_POSITIVE {
                break;
            }
            let beta = sigma_new / sigma;
            for idx in 0..n {
                s[idx] = z[idx] + beta * s[idx];
            }
            sigma = sigma_new;
        }

        let residual = norm2(&r);
        (
            p,
            SolveStats {
                iterations: PRESSURE_MAX_ITERATIONS,
                residual,
                converged: false,
            },
        )
    }
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn norm2(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// Subtract the pressure gradient from every interior face between
/// non-solid cells; faces touching a solid cell are zeroed.
fn apply_gradient(mac: &mut MacGrid3D, dt: f32) {
    let scale = dt / (FLUID_DENSITY * mac.dx);
    let (nx, ny, nz) = (mac.nx, mac.ny, mac.nz);

    for k in 0..nz {
        for j in 0..ny {
            for i in 1..nx {
                let left = mac.labels.at(i - 1, j, k);
                let right = mac.labels.at(i, j, k);
                if left == CellLabel::Solid || right == CellLabel::Solid {
                    mac.u.set(i, j, k, 0.0);
                } else if left == CellLabel::Fluid || right == CellLabel::Fluid {
                    let grad = mac.pressure.at(i, j, k) - mac.pressure.at(i - 1, j, k);
                    let u = mac.u.at(i, j, k) - scale * grad;
                    mac.u.set(i, j, k, u);
                }
            }
        }
    }

    for k in 0..nz {
        for j in 1..ny {
            for i in 0..nx {
                let bottom = mac.labels.at(i, j - 1, k);
                let top = mac.labels.at(i, j, k);
                if bottom == CellLabel::Solid || top == CellLabel::Solid {
                    mac.v.set(i, j, k, 0.0);
                } else if bottom == CellLabel::Fluid || top == CellLabel::Fluid {
                    let grad = mac.pressure.at(i, j, k) - mac.pressure.at(i, j - 1, k);
                    let v = mac.v.at(i, j, k) - scale * grad;
                    mac.v.set(i, j, k, v);
                }
            }
        }
    }

    for k in 1..nz {
        for j in 0..ny {
            for i in 0..nx {
                let back = mac.labels.at(i, j, k - 1);
                let front = mac.labels.at(i, j, k);
                if back == CellLabel::Solid || front == CellLabel::Solid {
                    mac.w.set(i, j, k, 0.0);
                } else if back == CellLabel::Fluid || front == CellLabel::Fluid {
                    let grad = mac.pressure.at(i, j, k) - mac.pressure.at(i, j, k - 1);
                    let w = mac.w.at(i, j, k) - scale * grad;
                    mac.w.set(i, j, k, w);
                }
            }
        }
    }
}

/// Zero the normal velocity of every face adjacent to a solid cell.
/// Out-of-domain counts as solid, so domain-boundary faces are zeroed too.
pub fn enforce_solid_boundaries(mac: &mut MacGrid3D) {
    let (nx, ny, nz) = (mac.nx, mac.ny, mac.nz);

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..=nx {
                let (si, sj, sk) = (i as i32, j as i32, k as i32);
                if mac.is_solid(si - 1, sj, sk) || mac.is_solid(si, sj, sk) {
                    mac.u.set(i, j, k, 0.0);
                }
            }
        }
    }
    for k in 0..nz {
        for j in 0..=ny {
            for i in 0..nx {
                let (si, sj, sk) = (i as i32, j as i32, k as i32);
                if mac.is_solid(si, sj - 1, sk) || mac.is_solid(si, sj, sk) {
                    mac.v.set(i, j, k, 0.0);
                }
            }
        }
    }
    for k in 0..=nz {
        for j in 0..ny {
            for i in 0..nx {
                let (si, sj, sk) = (i as i32, j as i32, k as i32);
                if mac.is_solid(si, sj, sk - 1) || mac.is_solid(si, sj, sk) {
                    mac.w.set(i, j, k, 0.0);
                }
            }
        }
    }
}

/// Discrete divergence at a cell.
pub fn cell_divergence(mac: &MacGrid3D, i: usize, j: usize, k: usize) -> f32 {
    ((mac.u.at(i + 1, j, k) - mac.u.at(i, j, k))
        + (mac.v.at(i, j + 1, k) - mac.v.at(i, j, k))
        + (mac.w.at(i, j, k + 1) - mac.w.at(i, j, k)))
        / mac.dx
}

/// Maximum |divergence| over fluid cells with no solid neighbor.
pub fn max_fluid_divergence(mac: &MacGrid3D) -> f32 {
    let (nx, ny, nz) = (mac.nx, mac.ny, mac.nz);
    let mut max_div = 0.0f32;

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                if mac.labels.at(i, j, k) != CellLabel::Fluid {
                    continue;
                }
                let (si, sj, sk) = (i as i32, j as i32, k as i32);
                let touches_solid = mac.is_solid(si - 1, sj, sk)
                    || mac.is_solid(si + 1, sj, sk)
                    || mac.is_solid(si, sj - 1, sk)
                    || mac.is_solid(si, sj + 1, sk)
                    || mac.is_solid(si, sj, sk - 1)
                    || mac.is_solid(si, sj, sk + 1);
                if touches_solid {
                    continue;
                }
                max_div = max_div.max(cell_divergence(mac, i, j, k).abs());
            }
        }
    }
    max_div
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry;

    fn boxed_mac(n: usize, dx: f32) -> MacGrid3D {
        let mut mac = MacGrid3D::new(n, n, n, dx);
        mac.labels = geometry::solid_box(n, n, n);
        mac
    }

    #[test]
    fn test_project_trivial_on_empty_field() {
        let mut mac = boxed_mac(4, 1.0);
        let stats = project(&mut mac, 0.01);
        assert!(stats.converged);
        assert_eq!(stats.iterations, 0);
    }

    #[test]
    fn test_project_reduces_divergence() {
        let mut mac = boxed_mac(6, 1.0);
        geometry::fill_region(&mut mac.labels, (1, 1, 1), (4, 4, 4), CellLabel::Fluid);

        // Divergent velocity in the interior.
        for k in 1..5 {
            for j in 1..5 {
                mac.u.set(3, j, k, 1.0);
            }
        }

        let stats = project(&mut mac, 0.01);
        assert!(stats.converged, "solve should converge: {stats:?}");
        assert!(
            max_fluid_divergence(&mac) < 1e-4,
            "divergence too large: {}",
            max_fluid_divergence(&mac)
        );
    }

    #[test]
    fn test_solid_faces_zeroed() {
        let mut mac = boxed_mac(6, 1.0);
        geometry::fill_region(&mut mac.labels, (1, 1, 1), (4, 4, 4), CellLabel::Fluid);
        mac.u.fill(1.0);
        mac.v.fill(1.0);
        mac.w.fill(1.0);

        project(&mut mac, 0.01);

        // Faces between the solid shell and the interior carry no flow.
        for k in 0..6 {
            for j in 0..6 {
                assert_eq!(mac.u.at(1, j, k), 0.0);
                assert_eq!(mac.u.at(5, j, k), 0.0);
            }
        }
        for k in 0..6 {
            for i in 0..6 {
                assert_eq!(mac.v.at(i, 1, k), 0.0);
                assert_eq!(mac.v.at(i, 5, k), 0.0);
            }
        }
    }

    #[test]
    fn test_hydrostatic_pressure_gradient() {
        // A fluid column under downward flow at its top boundary builds
        // higher pressure at the bottom.
        let mut mac = boxed_mac(6, 1.0);
        geometry::fill_region(&mut mac.labels, (1, 1, 1), (4, 4, 4), CellLabel::Fluid);
        // Uniform fall everywhere, as after a gravity kick.
        for v in mac.v.values_mut() {
            *v = -0.1;
        }

        project(&mut mac, 0.01);

        let p_bottom = mac.pressure.at(2, 1, 2);
        let p_top = mac.pressure.at(2, 3, 2);
        assert!(
            p_bottom > p_top,
            "expected hydrostatic profile, got bottom {p_bottom} top {p_top}"
        );
    }
}
