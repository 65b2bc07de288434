//! Marker particles for the FLIP/PIC simulation.

use glam::Vec3;

/// A single massless marker particle.
#[derive(Clone, Copy, Debug)]
pub struct Particle3D {
    /// World position, constrained to the domain.
    pub position: Vec3,
    /// Current velocity.
    pub velocity: Vec3,
    /// Set when the particle sits in a solid cell with no reachable
    /// non-solid neighbor. Trapped particles are skipped by transfer,
    /// labeling, and advection until repair succeeds.
    pub trapped: bool,
}

impl Particle3D {
    /// Create a particle with the given position and velocity.
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Self {
            position,
            velocity,
            trapped: false,
        }
    }

    /// Create a stationary particle.
    pub fn at(position: Vec3) -> Self {
        Self::new(position, Vec3::ZERO)
    }
}

/// Flat collection of marker particles, owned by the solver.
#[derive(Default)]
pub struct Particles3D {
    pub list: Vec<Particle3D>,
}

impl Particles3D {
    /// Create an empty particle collection.
    pub fn new() -> Self {
        Self { list: Vec::new() }
    }

    /// Create with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            list: Vec::with_capacity(capacity),
        }
    }

    /// Add a particle with the given position and velocity.
    pub fn spawn(&mut self, position: Vec3, velocity: Vec3) {
        self.list.push(Particle3D::new(position, velocity));
    }

    /// Add a stationary particle.
    pub fn spawn_at(&mut self, position: Vec3) {
        self.list.push(Particle3D::at(position));
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Remove all particles.
    pub fn clear(&mut self) {
        self.list.clear();
    }

    /// Current positions, copied out.
    pub fn positions(&self) -> Vec<Vec3> {
        self.list.iter().map(|p| p.position).collect()
    }

    /// Number of particles currently flagged as trapped.
    pub fn trapped_len(&self) -> usize {
        self.list.iter().filter(|p| p.trapped).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn() {
        let mut particles = Particles3D::new();
        particles.spawn(Vec3::ONE, Vec3::new(0.1, 0.0, 0.0));
        particles.spawn_at(Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(particles.len(), 2);
        assert!(!particles.list[0].trapped);
        assert_eq!(particles.list[1].velocity, Vec3::ZERO);
    }

    #[test]
    fn test_positions_copy() {
        let mut particles = Particles3D::new();
        particles.spawn_at(Vec3::new(1.0, 2.0, 3.0));
        let positions = particles.positions();
        assert_eq!(positions, vec![Vec3::new(1.0, 2.0, 3.0)]);
    }
}
