//! Dense 3D scalar grids and the staggered MAC grid.
//!
//! Velocity components live on cell faces:
//! - u (X-velocity) on YZ faces at x = i * dx, size (nx+1) * ny * nz
//! - v (Y-velocity) on XZ faces at y = j * dx, size nx * (ny+1) * nz
//! - w (Z-velocity) on XY faces at z = k * dx, size nx * ny * (nz+1)
//!
//! Pressure and the cell label live at cell centers.

use glam::Vec3;

/// Cell classification for labeling and the pressure solve.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CellLabel {
    /// Solid obstacle, fixed by the initial geometry.
    Solid,
    /// Contains at least one marker particle.
    Fluid,
    /// Empty space.
    #[default]
    Air,
}

/// Dense 3D array with k-major contiguous storage.
///
/// All grids are sized once at construction; nothing here allocates inside
/// the step loop.
#[derive(Clone, Debug)]
pub struct Grid3<T> {
    nx: usize,
    ny: usize,
    nz: usize,
    data: Vec<T>,
}

impl<T: Clone> Grid3<T> {
    /// Create a grid of the given extents, every element set to `value`.
    pub fn new(nx: usize, ny: usize, nz: usize, value: T) -> Self {
        Self {
            nx,
            ny,
            nz,
            data: vec![value; nx * ny * nz],
        }
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Copy all elements from a grid of identical extents.
    pub fn copy_from(&mut self, other: &Grid3<T>) {
        assert_eq!(
            self.extents(),
            other.extents(),
            "copy_from requires identical grid extents"
        );
        self.data.clone_from_slice(&other.data);
    }
}

impl<T> Grid3<T> {
    /// Grid extents as `(nx, ny, nz)`.
    #[inline]
    pub fn extents(&self) -> (usize, usize, usize) {
        (self.nx, self.ny, self.nz)
    }

    /// Total element count.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the grid holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat index of `(i, j, k)`.
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.nx && j < self.ny && k < self.nz);
        (k * self.ny + j) * self.nx + i
    }

    /// Read-only view of the flat storage.
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.data
    }

    /// Mutable view of the flat storage.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Copy> Grid3<T> {
    /// Bounds-checked read.
    #[inline]
    pub fn at(&self, i: usize, j: usize, k: usize) -> T {
        assert!(
            i < self.nx && j < self.ny && k < self.nz,
            "grid read ({i}, {j}, {k}) out of bounds ({}, {}, {})",
            self.nx,
            self.ny,
            self.nz
        );
        self.data[(k * self.ny + j) * self.nx + i]
    }

    /// Bounds-checked write.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: T) {
        assert!(
            i < self.nx && j < self.ny && k < self.nz,
            "grid write ({i}, {j}, {k}) out of bounds ({}, {}, {})",
            self.nx,
            self.ny,
            self.nz
        );
        self.data[(k * self.ny + j) * self.nx + i] = value;
    }

    /// Signed-index read, `None` outside the grid.
    #[inline]
    pub fn get(&self, i: i32, j: i32, k: i32) -> Option<T> {
        if i < 0 || j < 0 || k < 0 {
            return None;
        }
        let (i, j, k) = (i as usize, j as usize, k as usize);
        if i < self.nx && j < self.ny && k < self.nz {
            Some(self.data[(k * self.ny + j) * self.nx + i])
        } else {
            None
        }
    }
}

/// 3D MAC grid: pressure and labels at cell centers, velocities on faces,
/// saved face velocities for the FLIP delta, and per-face "known" masks
/// marking faces that received particle contributions during transfer.
pub struct MacGrid3D {
    /// Number of cells in X.
    pub nx: usize,
    /// Number of cells in Y.
    pub ny: usize,
    /// Number of cells in Z.
    pub nz: usize,
    /// Cell width in world units.
    pub dx: f32,

    /// Cell classification, recomputed each step (Solid cells never change).
    pub labels: Grid3<CellLabel>,
    /// Pressure at cell centers.
    pub pressure: Grid3<f32>,

    /// X-velocity on YZ faces.
    pub u: Grid3<f32>,
    /// Y-velocity on XZ faces.
    pub v: Grid3<f32>,
    /// Z-velocity on XY faces.
    pub w: Grid3<f32>,

    /// Face velocities snapshotted right after particle-to-grid transfer.
    pub u_saved: Grid3<f32>,
    pub v_saved: Grid3<f32>,
    pub w_saved: Grid3<f32>,

    /// True where transfer (or extrapolation seeding) defined the face value.
    pub u_known: Grid3<bool>,
    pub v_known: Grid3<bool>,
    pub w_known: Grid3<bool>,
}

impl MacGrid3D {
    /// Create a MAC grid of `nx * ny * nz` cells with cell width `dx`.
    pub fn new(nx: usize, ny: usize, nz: usize, dx: f32) -> Self {
        Self {
            nx,
            ny,
            nz,
            dx,
            labels: Grid3::new(nx, ny, nz, CellLabel::Air),
            pressure: Grid3::new(nx, ny, nz, 0.0),
            u: Grid3::new(nx + 1, ny, nz, 0.0),
            v: Grid3::new(nx, ny + 1, nz, 0.0),
            w: Grid3::new(nx, ny, nz + 1, 0.0),
            u_saved: Grid3::new(nx + 1, ny, nz, 0.0),
            v_saved: Grid3::new(nx, ny + 1, nz, 0.0),
            w_saved: Grid3::new(nx, ny, nz + 1, 0.0),
            u_known: Grid3::new(nx + 1, ny, nz, false),
            v_known: Grid3::new(nx, ny + 1, nz, false),
            w_known: Grid3::new(nx, ny, nz + 1, false),
        }
    }

    /// World-space size of the domain.
    #[inline]
    pub fn world_size(&self) -> Vec3 {
        Vec3::new(
            self.nx as f32 * self.dx,
            self.ny as f32 * self.dx,
            self.nz as f32 * self.dx,
        )
    }

    /// Cell containing a world position, clamped to the grid.
    #[inline]
    pub fn cell_containing(&self, pos: Vec3) -> (usize, usize, usize) {
        let g = pos / self.dx;
        (
            (g.x.floor().max(0.0) as usize).min(self.nx - 1),
            (g.y.floor().max(0.0) as usize).min(self.ny - 1),
            (g.z.floor().max(0.0) as usize).min(self.nz - 1),
        )
    }

    /// World position of cell center `(i, j, k)`.
    #[inline]
    pub fn cell_center(&self, i: usize, j: usize, k: usize) -> Vec3 {
        Vec3::new(
            (i as f32 + 0.5) * self.dx,
            (j as f32 + 0.5) * self.dx,
            (k as f32 + 0.5) * self.dx,
        )
    }

    /// World position of the U face at `(i, j, k)`.
    #[inline]
    pub fn u_position(&self, i: usize, j: usize, k: usize) -> Vec3 {
        Vec3::new(
            i as f32 * self.dx,
            (j as f32 + 0.5) * self.dx,
            (k as f32 + 0.5) * self.dx,
        )
    }

    /// World position of the V face at `(i, j, k)`.
    #[inline]
    pub fn v_position(&self, i: usize, j: usize, k: usize) -> Vec3 {
        Vec3::new(
            (i as f32 + 0.5) * self.dx,
            j as f32 * self.dx,
            (k as f32 + 0.5) * self.dx,
        )
    }

    /// World position of the W face at `(i, j, k)`.
    #[inline]
    pub fn w_position(&self, i: usize, j: usize, k: usize) -> Vec3 {
        Vec3::new(
            (i as f32 + 0.5) * self.dx,
            (j as f32 + 0.5) * self.dx,
            k as f32 * self.dx,
        )
    }

    /// Signed-index solid query. Out-of-bounds counts as solid; the geometry
    /// validation guarantees the boundary shell is solid anyway.
    #[inline]
    pub fn is_solid(&self, i: i32, j: i32, k: i32) -> bool {
        match self.labels.get(i, j, k) {
            Some(label) => label == CellLabel::Solid,
            None => true,
        }
    }

    /// Snapshot `u, v, w` into the saved grids for the FLIP delta.
    pub fn store_saved_velocities(&mut self) {
        self.u_saved.copy_from(&self.u);
        self.v_saved.copy_from(&self.v);
        self.w_saved.copy_from(&self.w);
    }

    /// Reset every non-solid cell to Air ahead of labeling.
    pub fn reset_labels(&mut self) {
        for label in self.labels.values_mut() {
            if *label != CellLabel::Solid {
                *label = CellLabel::Air;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_creation() {
        let grid: Grid3<f32> = Grid3::new(4, 5, 6, 0.0);
        assert_eq!(grid.extents(), (4, 5, 6));
        assert_eq!(grid.len(), 120);
    }

    #[test]
    fn test_index_order() {
        let grid: Grid3<f32> = Grid3::new(4, 5, 6, 0.0);
        assert_eq!(grid.index(0, 0, 0), 0);
        assert_eq!(grid.index(1, 0, 0), 1);
        assert_eq!(grid.index(0, 1, 0), 4);
        assert_eq!(grid.index(0, 0, 1), 20);
        assert_eq!(grid.index(3, 4, 5), 5 * 20 + 4 * 4 + 3);
    }

    #[test]
    fn test_read_write() {
        let mut grid = Grid3::new(3, 3, 3, 0.0f32);
        grid.set(1, 2, 0, 7.5);
        assert_eq!(grid.at(1, 2, 0), 7.5);
        assert_eq!(grid.get(1, 2, 0), Some(7.5));
        assert_eq!(grid.get(-1, 2, 0), None);
        assert_eq!(grid.get(1, 2, 3), None);
    }

    #[test]
    fn test_copy_from() {
        let mut a = Grid3::new(2, 2, 2, 0.0f32);
        let mut b = Grid3::new(2, 2, 2, 0.0f32);
        b.set(1, 1, 1, 3.0);
        a.copy_from(&b);
        assert_eq!(a.at(1, 1, 1), 3.0);
    }

    #[test]
    fn test_mac_array_sizes() {
        let mac = MacGrid3D::new(4, 5, 6, 1.0);
        assert_eq!(mac.pressure.len(), 4 * 5 * 6);
        assert_eq!(mac.u.len(), 5 * 5 * 6);
        assert_eq!(mac.v.len(), 4 * 6 * 6);
        assert_eq!(mac.w.len(), 4 * 5 * 7);
        assert_eq!(mac.u_saved.len(), mac.u.len());
    }

    #[test]
    fn test_face_positions() {
        let mac = MacGrid3D::new(4, 4, 4, 1.0);
        assert_eq!(mac.u_position(1, 0, 0), Vec3::new(1.0, 0.5, 0.5));
        assert_eq!(mac.v_position(0, 2, 0), Vec3::new(0.5, 2.0, 0.5));
        assert_eq!(mac.w_position(0, 0, 3), Vec3::new(0.5, 0.5, 3.0));
        assert_eq!(mac.cell_center(1, 1, 1), Vec3::new(1.5, 1.5, 1.5));
    }

    #[test]
    fn test_cell_containing_clamps() {
        let mac = MacGrid3D::new(4, 4, 4, 0.5);
        assert_eq!(mac.cell_containing(Vec3::new(0.6, 1.9, 0.1)), (1, 3, 0));
        assert_eq!(mac.cell_containing(Vec3::new(-1.0, 5.0, 0.0)), (0, 3, 0));
    }

    #[test]
    fn test_reset_labels_keeps_solid() {
        let mut mac = MacGrid3D::new(3, 3, 3, 1.0);
        mac.labels.set(0, 0, 0, CellLabel::Solid);
        mac.labels.set(1, 1, 1, CellLabel::Fluid);
        mac.reset_labels();
        assert_eq!(mac.labels.at(0, 0, 0), CellLabel::Solid);
        assert_eq!(mac.labels.at(1, 1, 1), CellLabel::Air);
    }
}
