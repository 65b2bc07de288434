//! Trilinear hat kernel for particle/grid transfer.

use glam::Vec3;

/// 1D tent weight. Support: (-1, 1) in cell units, peak 1 at the node.
#[inline]
pub fn hat_1d(r: f32) -> f32 {
    let r_abs = r.abs();
    if r_abs < 1.0 {
        1.0 - r_abs
    } else {
        0.0
    }
}

/// Trilinear hat weight for a world-space offset between a particle and a
/// face position (tensor product of three 1D tents).
#[inline]
pub fn trilinear_hat(delta: Vec3, dx: f32) -> f32 {
    let inv = 1.0 / dx;
    hat_1d(delta.x * inv) * hat_1d(delta.y * inv) * hat_1d(delta.z * inv)
}
