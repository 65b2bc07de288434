//! Property-based invariants over randomized scenes: particle count is
//! conserved, positions stay in the domain, and nothing gets trapped in
//! well-posed boxes.

use fluid3d::{geometry, CellLabel, FluidSolver3D};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(10))]

    #[test]
    fn particles_conserved_and_contained(
        x0 in 1usize..4,
        y0 in 1usize..4,
        z0 in 1usize..4,
        w in 1usize..3,
        h in 1usize..3,
        d in 1usize..3,
        steps in 1usize..5,
    ) {
        let n = 6;
        let x1 = (x0 + w).min(n - 1);
        let y1 = (y0 + h).min(n - 1);
        let z1 = (z0 + d).min(n - 1);

        let mut labels = geometry::solid_box(n, n, n);
        geometry::fill_region(&mut labels, (x0, y0, z0), (x1, y1, z1), CellLabel::Fluid);

        let mut solver = FluidSolver3D::new(n, n, n, 0.5, 1.0 / 60.0).unwrap();
        solver.init_from_labels(&labels).unwrap();

        let initial_count = solver.particle_count();
        prop_assert!(initial_count > 0);

        for _ in 0..steps {
            solver.step();
        }

        prop_assert_eq!(solver.particle_count(), initial_count);
        prop_assert_eq!(solver.trapped_count(), 0);

        let (min, max) = solver.world_bounds();
        for p in solver.particle_data() {
            prop_assert!(p.cmpge(min).all() && p.cmple(max).all());
        }
    }
}
