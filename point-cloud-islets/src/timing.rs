/// Phase timing context passed through the pipeline
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span};

#[derive(Debug, Clone, Serialize)]
pub struct PhaseTiming {
    pub phase: &'static str,
    pub elapsed_ms: f64,
}

/// Records how long each named phase of a run took.
#[derive(Debug)]
pub struct PhaseTimer {
    started: Instant,
    phases: Vec<(&'static str, Duration)>,
}

impl Default for PhaseTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            phases: Vec::new(),
        }
    }

    /// Run `f` as phase `name`, logging and recording its duration.
    pub fn measure<T>(&mut self, name: &'static str, f: impl FnOnce() -> T) -> T {
        let span = info_span!("phase", phase = name);
        let _entered = span.enter();
        debug!(phase = name, "Starting phase");

        let start = Instant::now();
        let value = f();
        let elapsed = start.elapsed();

        info!(
            phase = name,
            elapsed_ms = format!("{:.2}", elapsed.as_secs_f64() * 1000.0),
            "Phase completed"
        );
        self.phases.push((name, elapsed));
        value
    }

    pub fn phases(&self) -> &[(&'static str, Duration)] {
        &self.phases
    }

    /// Wall time since the timer was created.
    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn report(&self) -> Vec<PhaseTiming> {
        self.phases
            .iter()
            .map(|&(phase, elapsed)| PhaseTiming {
                phase,
                elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            })
            .collect()
    }
}
