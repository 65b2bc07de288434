//! Fluid surface extraction: marching cubes over a signed scalar field
//! derived from the cell labels.
//!
//! Each cell contributes a sample at its center: -1 for fluid, +1
//! otherwise. Cubes span the lattice of cell centers; active edges get a
//! vertex interpolated to the isovalue, shared between neighboring cubes
//! through an edge map so the output is indexed and normals can be
//! smoothed across triangles.

mod tables;

use std::collections::HashMap;

use glam::Vec3;

use crate::grid::{CellLabel, Grid3};
use tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, NO_EDGE, TRI_TABLE};

/// Triangulated fluid surface: interleavable positions and smooth normals
/// plus a 32-bit index buffer.
#[derive(Debug, Default, Clone)]
pub struct MeshData {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[inline]
fn corner_value(labels: &Grid3<CellLabel>, i: usize, j: usize, k: usize) -> f32 {
    if labels.at(i, j, k) == CellLabel::Fluid {
        -1.0
    } else {
        1.0
    }
}

/// Canonical key for a cube edge: the lattice point of its lower endpoint
/// plus the axis it runs along.
#[inline]
fn edge_key(cube: (usize, usize, usize), edge: usize) -> (usize, usize, usize, u8) {
    let (c0, c1) = EDGE_CORNERS[edge];
    let a = CORNER_OFFSETS[c0];
    let b = CORNER_OFFSETS[c1];
    let low = (
        cube.0 + a.0.min(b.0),
        cube.1 + a.1.min(b.1),
        cube.2 + a.2.min(b.2),
    );
    let axis = if a.0 != b.0 {
        0
    } else if a.1 != b.1 {
        1
    } else {
        2
    };
    (low.0, low.1, low.2, axis)
}

/// Run marching cubes over the label grid.
///
/// `threshold` is the isovalue between the fluid (-1) and air (+1)
/// samples; the extracted surface sits where the interpolated field
/// crosses it.
pub fn extract_surface(labels: &Grid3<CellLabel>, dx: f32, threshold: f32) -> MeshData {
    let (nx, ny, nz) = labels.extents();
    let mut mesh = MeshData::default();
    if nx < 2 || ny < 2 || nz < 2 {
        return mesh;
    }

    let mut edge_vertices: HashMap<(usize, usize, usize, u8), u32> = HashMap::new();

    for k in 0..nz - 1 {
        for j in 0..ny - 1 {
            for i in 0..nx - 1 {
                let d: [f32; 8] = std::array::from_fn(|c| {
                    let (oi, oj, ok) = CORNER_OFFSETS[c];
                    corner_value(labels, i + oi, j + oj, k + ok)
                });

                let mut case = 0usize;
                for (c, &value) in d.iter().enumerate() {
                    if value < threshold {
                        case |= 1 << c;
                    }
                }
                if case == 0 || case == 255 {
                    continue;
                }

                let edges = EDGE_TABLE[case];
                if edges == 0 {
                    continue;
                }

                let mut cube_vertex = [u32::MAX; 12];
                for (edge, slot) in cube_vertex.iter_mut().enumerate() {
                    if edges & (1 << edge) == 0 {
                        continue;
                    }
                    let key = edge_key((i, j, k), edge);
                    let index = *edge_vertices.entry(key).or_insert_with(|| {
                        let (c0, c1) = EDGE_CORNERS[edge];
                        let p0 = corner_position(i, j, k, c0, dx);
                        let p1 = corner_position(i, j, k, c1, dx);
                        let t = (threshold - d[c0]) / (d[c1] - d[c0]);
                        let index = mesh.vertices.len() as u32;
                        mesh.vertices.push(p0 + (p1 - p0) * t);
                        mesh.normals.push(Vec3::ZERO);
                        index
                    });
                    *slot = index;
                }

                for tri in TRI_TABLE[case].chunks(3) {
                    if tri[0] == NO_EDGE {
                        break;
                    }
                    let a = cube_vertex[tri[0] as usize];
                    let b = cube_vertex[tri[1] as usize];
                    let c = cube_vertex[tri[2] as usize];

                    let pa = mesh.vertices[a as usize];
                    let pb = mesh.vertices[b as usize];
                    let pc = mesh.vertices[c as usize];
                    let face_normal = (pb - pa).cross(pc - pa);

                    mesh.normals[a as usize] += face_normal;
                    mesh.normals[b as usize] += face_normal;
                    mesh.normals[c as usize] += face_normal;

                    mesh.indices.extend_from_slice(&[a, b, c]);
                }
            }
        }
    }

    for normal in &mut mesh.normals {
        *normal = normal.normalize_or_zero();
    }

    mesh
}

/// World position of a cube corner: the center of the underlying cell.
#[inline]
fn corner_position(i: usize, j: usize, k: usize, corner: usize, dx: f32) -> Vec3 {
    let (oi, oj, ok) = CORNER_OFFSETS[corner];
    Vec3::new(
        ((i + oi) as f32 + 0.5) * dx,
        ((j + oj) as f32 + 0.5) * dx,
        ((k + ok) as f32 + 0.5) * dx,
    )
}
