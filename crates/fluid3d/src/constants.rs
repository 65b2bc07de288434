//! Simulation constants shared across the solver.

/// Marker particles seeded per fluid cell at initialization.
pub const PARTICLES_PER_CELL: usize = 8;

/// PIC fraction of the FLIP/PIC velocity blend. Small values keep FLIP's low
/// numerical viscosity while damping its noise.
pub const PIC_WEIGHT: f32 = 0.02;

/// Maximum number of cells a particle may travel in one advection substep.
pub const ADVECT_MAX: f32 = 1.0;

/// Gravitational acceleration magnitude (m/s²).
pub const GRAVITY_MAGNITUDE: f32 = 9.81;

/// Density of the simulated fluid (kg/m³).
pub const FLUID_DENSITY: f32 = 1000.0;

/// Isovalue separating fluid from air during surface extraction.
pub const SURFACE_THRESHOLD: f32 = 0.0;

/// Relative residual tolerance for the pressure solve.
pub const PRESSURE_TOLERANCE: f64 = 1e-6;

/// Iteration cap for the pressure solve.
pub const PRESSURE_MAX_ITERATIONS: usize = 200;

/// Divergence magnitude below which a fluid cell counts as incompressible.
pub const DIVERGENCE_TOLERANCE: f32 = 1e-4;

/// Fraction of a cell width a repaired particle is placed inside its new cell.
pub const REPAIR_OFFSET: f32 = 0.25;

/// Seed for the jitter applied when seeding particles, so `init` is
/// reproducible run to run.
pub const PARTICLE_SEED: u64 = 42;
