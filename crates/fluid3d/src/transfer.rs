//! Particle/grid transfer: hat-kernel scatter onto MAC faces and the
//! FLIP/PIC gather back onto particles.
//!
//! The scatter runs serially so face accumulation stays race-free; the
//! gather is data-parallel over particles.

use glam::Vec3;
use rayon::prelude::*;

use crate::grid::{Grid3, MacGrid3D};
use crate::kernels::hat_1d;
use crate::particle::Particles3D;

/// Pre-allocated accumulation buffers for the particle-to-grid scatter.
pub struct TransferBuffers {
    pub u_sum: Grid3<f32>,
    pub u_weight: Grid3<f32>,
    pub v_sum: Grid3<f32>,
    pub v_weight: Grid3<f32>,
    pub w_sum: Grid3<f32>,
    pub w_weight: Grid3<f32>,
}

impl TransferBuffers {
    /// Create buffers sized for the given MAC grid.
    pub fn new(mac: &MacGrid3D) -> Self {
        let (nx, ny, nz) = (mac.nx, mac.ny, mac.nz);
        Self {
            u_sum: Grid3::new(nx + 1, ny, nz, 0.0),
            u_weight: Grid3::new(nx + 1, ny, nz, 0.0),
            v_sum: Grid3::new(nx, ny + 1, nz, 0.0),
            v_weight: Grid3::new(nx, ny + 1, nz, 0.0),
            w_sum: Grid3::new(nx, ny, nz + 1, 0.0),
            w_weight: Grid3::new(nx, ny, nz + 1, 0.0),
        }
    }

    /// Zero all accumulators.
    pub fn clear(&mut self) {
        self.u_sum.fill(0.0);
        self.u_weight.fill(0.0);
        self.v_sum.fill(0.0);
        self.v_weight.fill(0.0);
        self.w_sum.fill(0.0);
        self.w_weight.fill(0.0);
    }
}

/// Grid-space sample coordinates of a world position for each component.
/// The normal axis is measured in face units, the transverse axes are
/// shifted half a cell because faces sit at cell-edge centers.
#[inline]
fn u_coords(pos: Vec3, inv_dx: f32) -> Vec3 {
    Vec3::new(pos.x * inv_dx, pos.y * inv_dx - 0.5, pos.z * inv_dx - 0.5)
}

#[inline]
fn v_coords(pos: Vec3, inv_dx: f32) -> Vec3 {
    Vec3::new(pos.x * inv_dx - 0.5, pos.y * inv_dx, pos.z * inv_dx - 0.5)
}

#[inline]
fn w_coords(pos: Vec3, inv_dx: f32) -> Vec3 {
    Vec3::new(pos.x * inv_dx - 0.5, pos.y * inv_dx - 0.5, pos.z * inv_dx)
}

/// Scatter one particle component into the 2x2x2 face stencil around `g`.
fn scatter(sum: &mut Grid3<f32>, weight: &mut Grid3<f32>, g: Vec3, value: f32) {
    let (nx, ny, nz) = sum.extents();
    let i0 = g.x.floor() as i32;
    let j0 = g.y.floor() as i32;
    let k0 = g.z.floor() as i32;

    for dk in 0..2i32 {
        for dj in 0..2i32 {
            for di in 0..2i32 {
                let (ni, nj, nk) = (i0 + di, j0 + dj, k0 + dk);
                if ni < 0
                    || nj < 0
                    || nk < 0
                    || ni >= nx as i32
                    || nj >= ny as i32
                    || nk >= nz as i32
                {
                    continue;
                }

                let wgt =
                    hat_1d(g.x - ni as f32) * hat_1d(g.y - nj as f32) * hat_1d(g.z - nk as f32);
                if wgt <= 0.0 {
                    continue;
                }

                let idx = sum.index(ni as usize, nj as usize, nk as usize);
                sum.values_mut()[idx] += wgt * value;
                weight.values_mut()[idx] += wgt;
            }
        }
    }
}

/// Divide accumulated sums by weights; faces with no contribution are
/// zeroed and marked unknown.
fn normalize(field: &mut Grid3<f32>, known: &mut Grid3<bool>, sum: &Grid3<f32>, weight: &Grid3<f32>) {
    let values = field.values_mut();
    let flags = known.values_mut();
    for idx in 0..values.len() {
        let w = weight.values()[idx];
        if w > 0.0 {
            values[idx] = sum.values()[idx] / w;
            flags[idx] = true;
        } else {
            values[idx] = 0.0;
            flags[idx] = false;
        }
    }
}

/// Transfer particle velocities onto the MAC faces.
///
/// Each face becomes the hat-weighted average of the velocities of every
/// particle within one cell width of it; faces with no particle in their
/// support are marked unknown for extrapolation.
pub fn particles_to_grid(mac: &mut MacGrid3D, particles: &Particles3D, buffers: &mut TransferBuffers) {
    buffers.clear();
    let inv_dx = 1.0 / mac.dx;

    for particle in &particles.list {
        if particle.trapped {
            continue;
        }
        let pos = particle.position;
        let vel = particle.velocity;
        scatter(&mut buffers.u_sum, &mut buffers.u_weight, u_coords(pos, inv_dx), vel.x);
        scatter(&mut buffers.v_sum, &mut buffers.v_weight, v_coords(pos, inv_dx), vel.y);
        scatter(&mut buffers.w_sum, &mut buffers.w_weight, w_coords(pos, inv_dx), vel.z);
    }

    normalize(&mut mac.u, &mut mac.u_known, &buffers.u_sum, &buffers.u_weight);
    normalize(&mut mac.v, &mut mac.v_known, &buffers.v_sum, &buffers.v_weight);
    normalize(&mut mac.w, &mut mac.w_known, &buffers.w_sum, &buffers.w_weight);
}

/// Trilinear sample of one component grid at grid-space coordinates `g`.
/// The sample point is clamped so the 2x2x2 stencil stays in range, which
/// keeps the weights a partition of unity.
fn sample(field: &Grid3<f32>, g: Vec3) -> f32 {
    let (base, t) = stencil_base(field, g);
    let mut value = 0.0;
    for dk in 0..2usize {
        for dj in 0..2usize {
            for di in 0..2usize {
                let wgt = axis_weight(t.x, di) * axis_weight(t.y, dj) * axis_weight(t.z, dk);
                value += wgt * field.at(base.0 + di, base.1 + dj, base.2 + dk);
            }
        }
    }
    value
}

/// As [`sample`], but reads the current and saved grids with one set of
/// weights. Returns `(current, saved)`.
fn sample_pair(field: &Grid3<f32>, saved: &Grid3<f32>, g: Vec3) -> (f32, f32) {
    let (base, t) = stencil_base(field, g);
    let mut current = 0.0;
    let mut old = 0.0;
    for dk in 0..2usize {
        for dj in 0..2usize {
            for di in 0..2usize {
                let wgt = axis_weight(t.x, di) * axis_weight(t.y, dj) * axis_weight(t.z, dk);
                let (i, j, k) = (base.0 + di, base.1 + dj, base.2 + dk);
                current += wgt * field.at(i, j, k);
                old += wgt * saved.at(i, j, k);
            }
        }
    }
    (current, old)
}

#[inline]
fn axis_weight(t: f32, side: usize) -> f32 {
    if side == 0 {
        1.0 - t
    } else {
        t
    }
}

#[inline]
fn stencil_base(field: &Grid3<f32>, g: Vec3) -> ((usize, usize, usize), Vec3) {
    let (nx, ny, nz) = field.extents();
    let x = g.x.clamp(0.0, (nx - 1) as f32);
    let y = g.y.clamp(0.0, (ny - 1) as f32);
    let z = g.z.clamp(0.0, (nz - 1) as f32);
    let i0 = (x.floor() as usize).min(nx - 2);
    let j0 = (y.floor() as usize).min(ny - 2);
    let k0 = (z.floor() as usize).min(nz - 2);
    ((i0, j0, k0), Vec3::new(x - i0 as f32, y - j0 as f32, z - k0 as f32))
}

/// Trilinear interpolation of the current grid velocity at a world position.
pub fn interp_velocity(mac: &MacGrid3D, pos: Vec3) -> Vec3 {
    let inv_dx = 1.0 / mac.dx;
    Vec3::new(
        sample(&mac.u, u_coords(pos, inv_dx)),
        sample(&mac.v, v_coords(pos, inv_dx)),
        sample(&mac.w, w_coords(pos, inv_dx)),
    )
}

/// Update particle velocities from the projected grid using the FLIP/PIC
/// blend: `(1 - alpha) * (v_p + delta_grid) + alpha * v_grid`.
pub fn grid_to_particles(mac: &MacGrid3D, particles: &mut Particles3D, pic_weight: f32) {
    let inv_dx = 1.0 / mac.dx;

    particles.list.par_iter_mut().for_each(|particle| {
        if particle.trapped {
            return;
        }
        let pos = particle.position;
        let (u_now, u_old) = sample_pair(&mac.u, &mac.u_saved, u_coords(pos, inv_dx));
        let (v_now, v_old) = sample_pair(&mac.v, &mac.v_saved, v_coords(pos, inv_dx));
        let (w_now, w_old) = sample_pair(&mac.w, &mac.w_saved, w_coords(pos, inv_dx));

        let pic = Vec3::new(u_now, v_now, w_now);
        let delta = pic - Vec3::new(u_old, v_old, w_old);
        let flip = particle.velocity + delta;

        particle.velocity = flip * (1.0 - pic_weight) + pic * pic_weight;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Particle3D;

    fn mac_with_buffers(n: usize, dx: f32) -> (MacGrid3D, TransferBuffers) {
        let mac = MacGrid3D::new(n, n, n, dx);
        let buffers = TransferBuffers::new(&mac);
        (mac, buffers)
    }

    #[test]
    fn test_p2g_particle_on_face() {
        let (mut mac, mut buffers) = mac_with_buffers(3, 1.0);
        let mut particles = Particles3D::new();

        // Exactly on the U face at (1, 1, 1): full weight, no spread in x.
        particles.spawn(Vec3::new(1.0, 1.5, 1.5), Vec3::new(2.0, 0.0, 0.0));
        particles_to_grid(&mut mac, &particles, &mut buffers);

        assert!((mac.u.at(1, 1, 1) - 2.0).abs() < 1e-6);
        assert!(mac.u_known.at(1, 1, 1));
        // Faces one cell over in x got no contribution.
        assert!(!mac.u_known.at(0, 0, 0));
        assert_eq!(mac.u.at(0, 0, 0), 0.0);
    }

    #[test]
    fn test_p2g_weighted_average() {
        let (mut mac, mut buffers) = mac_with_buffers(3, 1.0);
        let mut particles = Particles3D::new();

        // Two particles straddling the U face at (1, 1, 1) symmetrically.
        particles.spawn(Vec3::new(0.75, 1.5, 1.5), Vec3::new(1.0, 0.0, 0.0));
        particles.spawn(Vec3::new(1.25, 1.5, 1.5), Vec3::new(3.0, 0.0, 0.0));
        particles_to_grid(&mut mac, &particles, &mut buffers);

        // Equal weights: the face sees the mean.
        assert!((mac.u.at(1, 1, 1) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_p2g_skips_trapped() {
        let (mut mac, mut buffers) = mac_with_buffers(3, 1.0);
        let mut particles = Particles3D::new();
        let mut p = Particle3D::new(Vec3::new(1.0, 1.5, 1.5), Vec3::new(2.0, 0.0, 0.0));
        p.trapped = true;
        particles.list.push(p);

        particles_to_grid(&mut mac, &particles, &mut buffers);
        assert!(!mac.u_known.at(1, 1, 1));
    }

    #[test]
    fn test_interp_uniform_field() {
        let (mut mac, _) = mac_with_buffers(4, 0.5);
        mac.u.fill(1.0);
        mac.v.fill(2.0);
        mac.w.fill(3.0);

        let v = interp_velocity(&mac, Vec3::new(0.93, 1.1, 0.37));
        assert!((v.x - 1.0).abs() < 1e-6);
        assert!((v.y - 2.0).abs() < 1e-6);
        assert!((v.z - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_g2p_pure_pic_picks_up_grid() {
        let (mut mac, _) = mac_with_buffers(4, 1.0);
        mac.u.fill(1.0);
        mac.v.fill(-2.0);
        mac.w.fill(0.5);
        let mut particles = Particles3D::new();
        particles.spawn(Vec3::new(2.0, 2.0, 2.0), Vec3::ZERO);

        grid_to_particles(&mac, &mut particles, 1.0);

        let vel = particles.list[0].velocity;
        assert!((vel.x - 1.0).abs() < 1e-6);
        assert!((vel.y + 2.0).abs() < 1e-6);
        assert!((vel.z - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_g2p_flip_adds_delta() {
        let (mut mac, _) = mac_with_buffers(4, 1.0);
        // Saved state zero, current 1: delta of +1 in x.
        mac.u.fill(1.0);
        let mut particles = Particles3D::new();
        particles.spawn(Vec3::new(2.0, 2.0, 2.0), Vec3::new(0.5, 0.0, 0.0));

        grid_to_particles(&mac, &mut particles, 0.0);

        // Pure FLIP: old velocity plus grid delta.
        assert!((particles.list[0].velocity.x - 1.5).abs() < 1e-6);
    }
}
