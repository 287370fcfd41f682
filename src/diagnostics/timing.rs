use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Wall-clock duration of one pipeline pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub label: String,
    pub elapsed_ms: f64,
    /// Frames (or frame pairs) handled by the pass.
    pub frames: usize,
}

impl StageTiming {
    pub fn new(label: impl Into<String>, elapsed_ms: f64, frames: usize) -> Self {
        Self {
            label: label.into(),
            elapsed_ms,
            frames,
        }
    }
}

/// Timings of all passes of a run, in execution order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

impl TimingBreakdown {
    /// Record a pass started at `start`; the total accumulates.
    pub fn record(&mut self, label: impl Into<String>, start: Instant, frames: usize) {
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.total_ms += elapsed_ms;
        self.stages.push(StageTiming::new(label, elapsed_ms, frames));
    }

    pub fn stage(&self, label: &str) -> Option<&StageTiming> {
        self.stages.iter().find(|s| s.label == label)
    }
}
