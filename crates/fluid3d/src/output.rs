//! CSV output streams for particle positions and phase timings.

use std::io::{self, Write};

use glam::Vec3;

use crate::timing::Profiler;

/// Write one timestep of particle positions: `x y z` per line, the frame
/// terminated by a blank line.
pub fn write_particle_frame<W: Write>(out: &mut W, positions: &[Vec3]) -> io::Result<()> {
    for p in positions {
        writeln!(out, "{} {} {}", p.x, p.y, p.z)?;
    }
    writeln!(out)
}

/// Write a header row of phase names and one row of mean durations in
/// seconds.
pub fn write_timing_csv<W: Write>(out: &mut W, profiler: &Profiler) -> io::Result<()> {
    let report = profiler.report();

    let header: Vec<&str> = report.iter().map(|t| t.phase.name()).collect();
    writeln!(out, "{}", header.join(","))?;

    let row: Vec<String> = report
        .iter()
        .map(|t| format!("{:.6}", t.mean.as_secs_f64()))
        .collect();
    writeln!(out, "{}", row.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::Phase;
    use std::time::Duration;

    #[test]
    fn test_particle_frame_format() {
        let mut out = Vec::new();
        let positions = vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.5, 0.5, 0.5)];
        write_particle_frame(&mut out, &positions).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "1 2 3\n0.5 0.5 0.5\n\n");
    }

    #[test]
    fn test_timing_csv_shape() {
        let mut profiler = Profiler::new();
        profiler.record(Phase::Pressure, Duration::from_millis(5));

        let mut out = Vec::new();
        write_timing_csv(&mut out, &profiler).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("label,particles_to_grid"));
        assert_eq!(lines[0].split(',').count(), lines[1].split(',').count());
    }
}
