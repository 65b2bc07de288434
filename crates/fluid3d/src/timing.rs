//! Optional per-phase timing observer.
//!
//! The solver only takes timestamps when a profiler is installed; the
//! core's contract does not include timing.

use std::time::Duration;

/// Phases of a single solver step, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Label,
    ParticlesToGrid,
    SaveVelocities,
    ExtrapolateBefore,
    BodyForces,
    Pressure,
    ExtrapolateAfter,
    GridToParticles,
    Advect,
    Cleanup,
}

pub const PHASE_COUNT: usize = 10;

impl Phase {
    /// All phases, in execution order.
    pub const ALL: [Phase; PHASE_COUNT] = [
        Phase::Label,
        Phase::ParticlesToGrid,
        Phase::SaveVelocities,
        Phase::ExtrapolateBefore,
        Phase::BodyForces,
        Phase::Pressure,
        Phase::ExtrapolateAfter,
        Phase::GridToParticles,
        Phase::Advect,
        Phase::Cleanup,
    ];

    /// Stable name used in reports and the timing CSV header.
    pub fn name(self) -> &'static str {
        match self {
            Phase::Label => "label",
            Phase::ParticlesToGrid => "particles_to_grid",
            Phase::SaveVelocities => "save_velocities",
            Phase::ExtrapolateBefore => "extrapolate_before",
            Phase::BodyForces => "body_forces",
            Phase::Pressure => "pressure",
            Phase::ExtrapolateAfter => "extrapolate_after",
            Phase::GridToParticles => "grid_to_particles",
            Phase::Advect => "advect",
            Phase::Cleanup => "cleanup",
        }
    }

    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

/// Mean duration of one phase across the recorded steps.
#[derive(Clone, Copy, Debug)]
pub struct PhaseTiming {
    pub phase: Phase,
    pub mean: Duration,
}

/// Accumulates per-phase wall-clock durations across steps.
#[derive(Clone, Debug)]
pub struct Profiler {
    totals: [Duration; PHASE_COUNT],
    samples: [u32; PHASE_COUNT],
}

impl Default for Profiler {
    fn default() -> Self {
        Self {
            totals: [Duration::ZERO; PHASE_COUNT],
            samples: [0; PHASE_COUNT],
        }
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample for a phase.
    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        self.totals[phase.slot()] += elapsed;
        self.samples[phase.slot()] += 1;
    }

    /// Mean duration of a phase, zero if never recorded.
    pub fn mean(&self, phase: Phase) -> Duration {
        let samples = self.samples[phase.slot()];
        if samples == 0 {
            Duration::ZERO
        } else {
            self.totals[phase.slot()] / samples
        }
    }

    /// Mean durations for every phase, in execution order.
    pub fn report(&self) -> Vec<PhaseTiming> {
        Phase::ALL
            .iter()
            .map(|&phase| PhaseTiming {
                phase,
                mean: self.mean(phase),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_samples() {
        let mut profiler = Profiler::new();
        profiler.record(Phase::Pressure, Duration::from_millis(10));
        profiler.record(Phase::Pressure, Duration::from_millis(30));

        assert_eq!(profiler.mean(Phase::Pressure), Duration::from_millis(20));
        assert_eq!(profiler.mean(Phase::Advect), Duration::ZERO);
    }

    #[test]
    fn test_report_covers_all_phases() {
        let profiler = Profiler::new();
        let report = profiler.report();
        assert_eq!(report.len(), PHASE_COUNT);
        assert_eq!(report[0].phase, Phase::Label);
    }
}
