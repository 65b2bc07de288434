//! Pressure projection tests through the public solver API: post-step
//! incompressibility, hydrostatic rest, and the pressure profile of a
//! standing pool.

use fluid3d::{constants, geometry, pressure, CellLabel, FluidSolver3D};

fn pool_solver(n: usize, fluid_top: usize, dx: f32, dt: f32) -> FluidSolver3D {
    let mut solver = FluidSolver3D::new(n, n, n, dx, dt).unwrap();
    let mut labels = geometry::solid_box(n, n, n);
    geometry::fill_region(&mut labels, (1, 1, 1), (n - 1, fluid_top, n - 1), CellLabel::Fluid);
    solver.init_from_labels(&labels).unwrap();
    solver
}

#[test]
fn test_divergence_free_after_step() {
    let mut solver = pool_solver(6, 5, 1.0, 0.01);

    solver.step();

    let max_div = pressure::max_fluid_divergence(&solver.grid);
    assert!(
        max_div < constants::DIVERGENCE_TOLERANCE,
        "post-projection divergence {max_div} exceeds tolerance"
    );
}

#[test]
fn test_divergence_free_through_collapse() {
    // A falling column keeps the interior divergence-free every step.
    let mut solver = FluidSolver3D::new(6, 6, 6, 0.5, 0.01).unwrap();
    let mut labels = geometry::solid_box(6, 6, 6);
    geometry::fill_region(&mut labels, (2, 1, 2), (4, 5, 4), CellLabel::Fluid);
    solver.init_from_labels(&labels).unwrap();

    for _ in 0..20 {
        solver.step();
        let max_div = pressure::max_fluid_divergence(&solver.grid);
        assert!(
            max_div < constants::DIVERGENCE_TOLERANCE,
            "divergence {max_div} mid-collapse"
        );
    }
}

#[test]
fn test_hydrostatic_rest() {
    // A standing pool must not run away: velocities stay near zero over
    // many steps while gravity keeps pushing.
    let mut solver = pool_solver(6, 4, 0.5, 1.0 / 120.0);

    for _ in 0..100 {
        solver.step();
    }

    let max_speed = solver
        .particles
        .list
        .iter()
        .map(|p| p.velocity.length())
        .fold(0.0f32, f32::max);
    assert!(max_speed < 1.0, "pool is not at rest: max speed {max_speed}");

    // The pool must still be a pool: nothing climbed above its surface.
    let surface_y = 4.0 * 0.5 + 0.25;
    for p in solver.particle_data() {
        assert!(p.y < surface_y, "particle above surface: {p:?}");
    }
}

#[test]
fn test_hydrostatic_pressure_profile() {
    let mut solver = pool_solver(6, 5, 1.0, 0.01);

    solver.step();

    // Pressure increases monotonically toward the floor of the pool.
    let column: Vec<f32> = (1..5).map(|j| solver.grid.pressure.at(2, j, 2)).collect();
    for pair in column.windows(2) {
        assert!(
            pair[0] > pair[1],
            "pressure not decreasing with height: {column:?}"
        );
    }
}

#[test]
fn test_solid_faces_stay_closed() {
    let mut solver = pool_solver(6, 4, 1.0, 0.01);

    for _ in 0..5 {
        solver.step();
    }

    // Normal velocities into the shell are zero after every step.
    let n = 6;
    for k in 0..n {
        for j in 0..n {
            assert_eq!(solver.grid.u.at(1, j, k), 0.0);
            assert_eq!(solver.grid.u.at(n - 1, j, k), 0.0);
        }
    }
    for k in 0..n {
        for i in 0..n {
            assert_eq!(solver.grid.v.at(i, 1, k), 0.0);
            assert_eq!(solver.grid.v.at(i, n - 1, k), 0.0);
        }
    }
    for j in 0..n {
        for i in 0..n {
            assert_eq!(solver.grid.w.at(i, j, 1), 0.0);
            assert_eq!(solver.grid.w.at(i, j, n - 1), 0.0);
        }
    }
}
