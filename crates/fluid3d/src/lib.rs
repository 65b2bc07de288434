//! 3D incompressible fluid simulation with the hybrid FLIP/PIC method on a
//! staggered MAC grid.
//!
//! Marker particles carry the fluid through a pressure-projected grid
//! velocity field: each step classifies cells, scatters particle momentum
//! onto the grid, applies gravity, solves for pressures enforcing zero
//! divergence, gathers the velocity change back onto the particles, and
//! advects them with RK3 under a CFL bound. A triangulated fluid surface
//! can be extracted at any time via marching cubes.
//!
//! # Example
//!
//! ```
//! use fluid3d::{geometry, CellLabel, FluidSolver3D};
//!
//! let mut labels = geometry::solid_box(6, 6, 6);
//! geometry::fill_region(&mut labels, (1, 1, 1), (5, 3, 5), CellLabel::Fluid);
//!
//! let mut solver = FluidSolver3D::new(6, 6, 6, 0.1, 1.0 / 60.0).unwrap();
//! solver.init_from_labels(&labels).unwrap();
//!
//! solver.step();
//!
//! assert_eq!(solver.particle_count(), 16 * 2 * 8);
//! let mesh = solver.mesh_data();
//! assert!(!mesh.indices.is_empty());
//! ```

pub mod advection;
pub mod constants;
pub mod error;
pub mod extrapolation;
pub mod geometry;
pub mod grid;
pub mod kernels;
pub mod mesh;
pub mod output;
pub mod particle;
pub mod pressure;
pub mod timing;
pub mod transfer;

use std::path::Path;
use std::time::Instant;

pub use error::ConfigError;
pub use glam::Vec3;
pub use grid::{CellLabel, Grid3, MacGrid3D};
pub use mesh::MeshData;
pub use particle::{Particle3D, Particles3D};
pub use pressure::SolveStats;

use constants::{GRAVITY_MAGNITUDE, PARTICLES_PER_CELL, PARTICLE_SEED, PIC_WEIGHT, SURFACE_THRESHOLD};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use timing::{Phase, PhaseTiming, Profiler};
use transfer::TransferBuffers;

/// The fluid solver: owns the MAC grid, the marker particles, and all
/// scratch buffers. `step()` is a blocking call that advances the
/// simulation by the configured timestep and never fails.
pub struct FluidSolver3D {
    /// The staggered grid holding pressure, velocities, and cell labels.
    pub grid: MacGrid3D,
    /// All marker particles in the simulation.
    pub particles: Particles3D,

    buffers: TransferBuffers,
    orientation: Vec3,
    dt: f32,
    extrapolation_depth: usize,
    trapped: usize,
    profiler: Option<Profiler>,
}

impl FluidSolver3D {
    /// Create a solver for an `nx * ny * nz` grid with cell width `dx`
    /// (meters) and timestep `dt` (seconds).
    pub fn new(nx: usize, ny: usize, nz: usize, dx: f32, dt: f32) -> Result<Self, ConfigError> {
        if nx < 2 || ny < 2 || nz < 2 {
            return Err(ConfigError::GridTooSmall { nx, ny, nz });
        }
        if !(dx > 0.0) {
            return Err(ConfigError::NonPositive { name: "dx", value: dx });
        }
        if !(dt > 0.0) {
            return Err(ConfigError::NonPositive { name: "dt", value: dt });
        }

        let grid = MacGrid3D::new(nx, ny, nz, dx);
        let buffers = TransferBuffers::new(&grid);

        Ok(Self {
            grid,
            particles: Particles3D::new(),
            buffers,
            orientation: Vec3::new(0.0, -1.0, 0.0),
            dt,
            extrapolation_depth: nx.max(ny).max(nz),
            trapped: 0,
            profiler: None,
        })
    }

    /// Load an initial geometry file, set up the label grid, and seed
    /// eight jittered particles into every fluid cell.
    pub fn init<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let labels =
            geometry::load_geometry(path.as_ref(), self.grid.nx, self.grid.ny, self.grid.nz)?;
        self.install_labels(labels);
        Ok(())
    }

    /// Initialize from an in-memory label grid instead of a file. The grid
    /// must match the solver dimensions and carry a solid boundary shell.
    pub fn init_from_labels(&mut self, labels: &Grid3<CellLabel>) -> Result<(), ConfigError> {
        let (nx, ny, nz) = labels.extents();
        if (nx, ny, nz) != (self.grid.nx, self.grid.ny, self.grid.nz) {
            return Err(ConfigError::DimensionMismatch {
                nx: self.grid.nx,
                ny: self.grid.ny,
                nz: self.grid.nz,
                found_nx: nx,
                found_ny: ny,
                found_nz: nz,
            });
        }
        geometry::validate_boundary(labels)?;
        self.install_labels(labels.clone());
        Ok(())
    }

    fn install_labels(&mut self, labels: Grid3<CellLabel>) {
        self.grid.labels = labels;
        self.grid.pressure.fill(0.0);
        self.grid.u.fill(0.0);
        self.grid.v.fill(0.0);
        self.grid.w.fill(0.0);
        self.grid.u_saved.fill(0.0);
        self.grid.v_saved.fill(0.0);
        self.grid.w_saved.fill(0.0);
        self.grid.u_known.fill(false);
        self.grid.v_known.fill(false);
        self.grid.w_known.fill(false);
        self.trapped = 0;
        self.seed_particles();
    }

    /// Seed [`PARTICLES_PER_CELL`] particles into each fluid cell on a
    /// jittered 2x2x2 lattice. The jitter is deterministic so `init` is
    /// reproducible.
    fn seed_particles(&mut self) {
        let dx = self.grid.dx;
        let (nx, ny, nz) = self.grid.labels.extents();

        let fluid_cells = self
            .grid
            .labels
            .values()
            .iter()
            .filter(|&&l| l == CellLabel::Fluid)
            .count();
        self.particles = Particles3D::with_capacity(fluid_cells * PARTICLES_PER_CELL);

        let mut rng = ChaCha8Rng::seed_from_u64(PARTICLE_SEED);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    if self.grid.labels.at(i, j, k) != CellLabel::Fluid {
                        continue;
                    }
                    for sk in 0..2 {
                        for sj in 0..2 {
                            for si in 0..2 {
                                let base = Vec3::new(
                                    (i as f32 + 0.25 + 0.5 * si as f32) * dx,
                                    (j as f32 + 0.25 + 0.5 * sj as f32) * dx,
                                    (k as f32 + 0.25 + 0.5 * sk as f32) * dx,
                                );
                                let jitter = Vec3::new(
                                    rng.gen_range(-0.5f32..0.5),
                                    rng.gen_range(-0.5f32..0.5),
                                    rng.gen_range(-0.5f32..0.5),
                                ) * (dx * 0.25);
                                self.particles.spawn_at(base + jitter);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Set the gravity direction. Normalized internally; takes effect on
    /// the next step. A zero vector is ignored.
    pub fn update_orientation(&mut self, orientation: Vec3) {
        let normalized = orientation.normalize_or_zero();
        if normalized != Vec3::ZERO {
            self.orientation = normalized;
        }
    }

    /// Advance the simulation by the configured timestep.
    ///
    /// Steps are total: solver non-convergence is logged and the step
    /// proceeds with the best available pressure field.
    pub fn step(&mut self) {
        let dt = self.dt;

        self.phase(Phase::Label, |s| s.classify_cells());
        self.phase(Phase::ParticlesToGrid, |s| {
            transfer::particles_to_grid(&mut s.grid, &s.particles, &mut s.buffers);
        });
        self.phase(Phase::SaveVelocities, |s| s.grid.store_saved_velocities());
        self.phase(Phase::ExtrapolateBefore, |s| s.extrapolate_velocities());
        self.phase(Phase::BodyForces, |s| s.apply_body_forces());
        self.phase(Phase::Pressure, |s| {
            let stats = pressure::project(&mut s.grid, dt);
            if !stats.converged {
                log::warn!(
                    "pressure solve hit the iteration cap at {} iterations (residual {:.3e})",
                    stats.iterations,
                    stats.residual
                );
            }
        });
        self.phase(Phase::ExtrapolateAfter, |s| {
            extrapolation::mark_known_from_labels(&mut s.grid);
            s.extrapolate_velocities();
            pressure::enforce_solid_boundaries(&mut s.grid);
        });
        self.phase(Phase::GridToParticles, |s| {
            transfer::grid_to_particles(&s.grid, &mut s.particles, PIC_WEIGHT);
        });
        self.phase(Phase::Advect, |s| {
            advection::advect_particles(&mut s.particles, &s.grid, dt);
        });
        self.phase(Phase::Cleanup, |s| {
            s.trapped = advection::cleanup_particles(&mut s.particles, &s.grid);
            if s.trapped > 0 {
                log::debug!("{} particles trapped in solid cells", s.trapped);
            }
        });
    }

    fn phase(&mut self, phase: Phase, f: impl FnOnce(&mut Self)) {
        if self.profiler.is_some() {
            let start = Instant::now();
            f(self);
            if let Some(profiler) = self.profiler.as_mut() {
                profiler.record(phase, start.elapsed());
            }
        } else {
            f(self);
        }
    }

    /// Mark every non-solid cell containing a particle as fluid, the rest
    /// as air.
    fn classify_cells(&mut self) {
        self.grid.reset_labels();
        for particle in &self.particles.list {
            if particle.trapped {
                continue;
            }
            let (i, j, k) = self.grid.cell_containing(particle.position);
            if self.grid.labels.at(i, j, k) != CellLabel::Solid {
                self.grid.labels.set(i, j, k, CellLabel::Fluid);
            }
        }
    }

    /// Accelerate every face along the gravity orientation.
    fn apply_body_forces(&mut self) {
        let g = self.orientation * GRAVITY_MAGNITUDE * self.dt;

        if g.x.abs() > 1e-6 {
            for u in self.grid.u.values_mut() {
                *u += g.x;
            }
        }
        if g.y.abs() > 1e-6 {
            for v in self.grid.v.values_mut() {
                *v += g.y;
            }
        }
        if g.z.abs() > 1e-6 {
            for w in self.grid.w.values_mut() {
                *w += g.z;
            }
        }
    }

    fn extrapolate_velocities(&mut self) {
        let depth = self.extrapolation_depth;
        extrapolation::extrapolate_component(&mut self.grid.u, &self.grid.u_known, depth);
        extrapolation::extrapolate_component(&mut self.grid.v, &self.grid.v_known, depth);
        extrapolation::extrapolate_component(&mut self.grid.w, &self.grid.w_known, depth);
    }

    /// Current particle positions, copied out.
    pub fn particle_data(&self) -> Vec<Vec3> {
        self.particles.positions()
    }

    /// Extract the current fluid surface via marching cubes.
    pub fn mesh_data(&self) -> MeshData {
        mesh::extract_surface(&self.grid.labels, self.grid.dx, SURFACE_THRESHOLD)
    }

    /// Borrow the current cell-label grid.
    pub fn geometry(&self) -> &Grid3<CellLabel> {
        &self.grid.labels
    }

    /// Number of particles in the simulation.
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Particles currently stuck in solid cells with no reachable exit.
    pub fn trapped_count(&self) -> usize {
        self.trapped
    }

    /// World bounds of the domain as `(min, max)`.
    pub fn world_bounds(&self) -> (Vec3, Vec3) {
        (Vec3::ZERO, self.grid.world_size())
    }

    /// Install a per-phase profiler; subsequent steps record timings.
    pub fn enable_timing(&mut self) {
        self.profiler = Some(Profiler::new());
    }

    /// Borrow the profiler, if timing is enabled.
    pub fn profiler(&self) -> Option<&Profiler> {
        self.profiler.as_ref()
    }

    /// Mean per-phase durations, if timing is enabled.
    pub fn timing_report(&self) -> Option<Vec<PhaseTiming>> {
        self.profiler.as_ref().map(|p| p.report())
    }
}
