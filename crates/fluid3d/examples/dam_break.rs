//! Dam break demo (headless).
//!
//! Builds a dam-break scene, round-trips it through the geometry text
//! format, runs the solver with timing enabled, and writes the particle
//! and timing CSV streams.
//!
//! Run: cargo run -p fluid3d --release --example dam_break

use std::fs::{self, File};
use std::io::BufWriter;

use fluid3d::{geometry, output, CellLabel, FluidSolver3D, Grid3};

const NX: usize = 16;
const NY: usize = 12;
const NZ: usize = 16;
const DX: f32 = 0.05;
const DT: f32 = 1.0 / 60.0;
const STEPS: usize = 120;

fn main() {
    env_logger::init();

    // Water column against the left wall, air everywhere else.
    let mut labels = geometry::solid_box(NX, NY, NZ);
    geometry::fill_region(&mut labels, (1, 1, 1), (6, 9, NZ - 1), CellLabel::Fluid);

    let geometry_path = std::env::temp_dir().join("dam_break_geometry.txt");
    fs::write(&geometry_path, serialize_labels(&labels)).expect("write geometry file");

    let mut solver = FluidSolver3D::new(NX, NY, NZ, DX, DT).expect("solver config");
    solver.init(&geometry_path).expect("load geometry");
    solver.enable_timing();

    println!("=== DAM BREAK ===");
    println!(
        "grid {NX}x{NY}x{NZ}, dx {DX} m, dt {:.4} s, {} particles",
        DT,
        solver.particle_count()
    );

    let particle_file = File::create("particles.csv").expect("create particles.csv");
    let mut particle_out = BufWriter::new(particle_file);

    for step in 0..STEPS {
        solver.step();
        output::write_particle_frame(&mut particle_out, &solver.particle_data())
            .expect("write particle frame");

        if step % 30 == 0 {
            let mesh = solver.mesh_data();
            println!(
                "step {step:3}: {} surface triangles, {} trapped",
                mesh.indices.len() / 3,
                solver.trapped_count()
            );
        }
    }

    let timing_file = File::create("timing.csv").expect("create timing.csv");
    let mut timing_out = BufWriter::new(timing_file);
    let profiler = solver.profiler().expect("timing enabled");
    output::write_timing_csv(&mut timing_out, profiler).expect("write timing csv");

    println!("\nmean phase times:");
    for timing in solver.timing_report().unwrap() {
        println!("  {:<20} {:>10.3?}", timing.phase.name(), timing.mean);
    }
    println!("\nwrote particles.csv and timing.csv");
}

/// Serialize a label grid into the geometry text format: one frame per Z
/// slice, top row first.
fn serialize_labels(labels: &Grid3<CellLabel>) -> String {
    let (nx, ny, nz) = labels.extents();
    let mut text = String::with_capacity((nx + 1) * (ny + 1) * nz);
    for k in 0..nz {
        for row in 0..ny {
            let j = ny - 1 - row;
            for i in 0..nx {
                text.push(match labels.at(i, j, k) {
                    CellLabel::Solid => 's',
                    CellLabel::Fluid => 'f',
                    CellLabel::Air => 'a',
                });
            }
            text.push('\n');
        }
        text.push('\n');
    }
    text
}
