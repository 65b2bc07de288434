//! Particle advection by Ralston's third-order Runge-Kutta, with CFL
//! substepping, domain clamping, and solid-cell repair.

use glam::Vec3;
use rayon::prelude::*;

use crate::constants::{ADVECT_MAX, REPAIR_OFFSET};
use crate::grid::{CellLabel, MacGrid3D};
use crate::particle::Particles3D;
use crate::transfer::interp_velocity;

const SPEED_EPSILON: f32 = 1e-6;
/// Inward margin, in cell widths, applied when clamping escaped particles.
const CLAMP_MARGIN: f32 = 1e-3;

/// Largest absolute face velocity over all three components.
pub fn max_face_speed(mac: &MacGrid3D) -> f32 {
    let fold = |values: &[f32]| values.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
    fold(mac.u.values())
        .max(fold(mac.v.values()))
        .max(fold(mac.w.values()))
}

/// Advance all particles through the grid velocity field by `dt`.
///
/// The step is cut into substeps so no particle crosses more than
/// [`ADVECT_MAX`] cells per substep; positions leaving the domain are
/// clamped back inside with a small inward margin.
pub fn advect_particles(particles: &mut Particles3D, mac: &MacGrid3D, dt: f32) {
    let v_max = max_face_speed(mac);
    let dt_sub = if v_max > SPEED_EPSILON {
        (ADVECT_MAX * mac.dx / v_max).min(dt)
    } else {
        dt
    };

    let mut remaining = dt;
    while remaining > 0.0 {
        let h = dt_sub.min(remaining);
        substep_rk3(particles, mac, h);
        remaining -= h;
    }
}

/// One Ralston RK3 substep over every particle.
fn substep_rk3(particles: &mut Particles3D, mac: &MacGrid3D, h: f32) {
    let size = mac.world_size();
    let margin = CLAMP_MARGIN * mac.dx;

    particles.list.par_iter_mut().for_each(|particle| {
        if particle.trapped {
            return;
        }
        let x = particle.position;
        let k1 = interp_velocity(mac, x);
        let k2 = interp_velocity(mac, x + 0.5 * h * k1);
        let k3 = interp_velocity(mac, x + 0.75 * h * k2);
        let next = x + h * (2.0 * k1 + 3.0 * k2 + 4.0 * k3) / 9.0;
        particle.position = next.clamp(Vec3::splat(margin), size - margin);
    });
}

/// Project every particle that ended up inside a solid cell into the
/// nearest adjacent non-solid cell. Returns the number of particles left
/// trapped (no non-solid neighbor to project into).
pub fn cleanup_particles(particles: &mut Particles3D, mac: &MacGrid3D) -> usize {
    let dx = mac.dx;
    let mut trapped = 0usize;

    for particle in &mut particles.list {
        let (i, j, k) = mac.cell_containing(particle.position);
        if mac.labels.at(i, j, k) != CellLabel::Solid {
            particle.trapped = false;
            continue;
        }

        let pos = particle.position;
        let (fi, fj, fk) = (i as f32, j as f32, k as f32);
        // Candidate exits, ordered by how close the particle already is to
        // the shared face.
        let exits = [
            (pos.x - fi * dx, (i as i32 - 1, j as i32, k as i32), 0),
            ((fi + 1.0) * dx - pos.x, (i as i32 + 1, j as i32, k as i32), 1),
            (pos.y - fj * dx, (i as i32, j as i32 - 1, k as i32), 2),
            ((fj + 1.0) * dx - pos.y, (i as i32, j as i32 + 1, k as i32), 3),
            (pos.z - fk * dx, (i as i32, j as i32, k as i32 - 1), 4),
            ((fk + 1.0) * dx - pos.z, (i as i32, j as i32, k as i32 + 1), 5),
        ];

        let mut best: Option<(f32, usize)> = None;
        for &(dist, (ni, nj, nk), dir) in &exits {
            if mac.is_solid(ni, nj, nk) {
                continue;
            }
            if best.map_or(true, |(d, _)| dist < d) {
                best = Some((dist, dir));
            }
        }

        match best {
            Some((_, dir)) => {
                let offset = REPAIR_OFFSET * dx;
                match dir {
                    0 => particle.position.x = fi * dx - offset,
                    1 => particle.position.x = (fi + 1.0) * dx + offset,
                    2 => particle.position.y = fj * dx - offset,
                    3 => particle.position.y = (fj + 1.0) * dx + offset,
                    4 => particle.position.z = fk * dx - offset,
                    _ => particle.position.z = (fk + 1.0) * dx + offset,
                }
                particle.trapped = false;
            }
            None => {
                particle.trapped = true;
                trapped += 1;
            }
        }
    }

    trapped
}
