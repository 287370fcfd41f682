//! Run diagnostics: per-pass timings and object counters, serialized as
//! camelCase JSON next to the store.
mod timing;

pub use timing::{StageTiming, TimingBreakdown};

use serde::{Deserialize, Serialize};

pub const STAGE_FEATURES: &str = "regionFeatures";
pub const STAGE_DIVISION: &str = "divisionFeatures";
pub const STAGE_ASSEMBLY: &str = "assembly";

/// Summary of one orchestrator run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub frames_processed: usize,
    pub frames_with_division_features: usize,
    /// Objects considered during assembly, background excluded.
    pub objects_seen: usize,
    pub traxels_created: usize,
    pub objects_rejected_by_size: usize,
    pub timings: TimingBreakdown,
}

impl RunReport {
    pub fn summary(&self) -> String {
        format!(
            "frames={} division_frames={} traxels={} rejected={} total_ms={:.1}",
            self.frames_processed,
            self.frames_with_division_features,
            self.traxels_created,
            self.objects_rejected_by_size,
            self.timings.total_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn report_serializes_camel_case() {
        let mut report = RunReport {
            frames_processed: 3,
            traxels_created: 5,
            ..RunReport::default()
        };
        report.timings.record(STAGE_FEATURES, Instant::now(), 3);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["framesProcessed"], 3);
        assert_eq!(json["traxelsCreated"], 5);
        assert_eq!(json["timings"]["stages"][0]["label"], STAGE_FEATURES);
        assert!(report.timings.stage(STAGE_FEATURES).is_some());
    }
}
