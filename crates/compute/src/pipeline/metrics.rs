use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Wall-clock duration of one completed pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub elapsed_ms: u64,
}

/// Run metrics, updated incrementally as each stage completes.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Completed stages in execution order.
    pub stages: Vec<StageTiming>,
    /// Duration of the whole run in milliseconds, set by [`RunMetrics::finish`].
    pub total_ms: u64,

    #[serde(skip)]
    start: Instant,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::start()
    }
}

impl RunMetrics {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            stages: Vec::new(),
            total_ms: 0,
            start: Instant::now(),
        }
    }

    /// Record a completed stage.
    pub fn record_stage(&mut self, stage: &str, elapsed: Duration) {
        self.stages.push(StageTiming {
            stage: stage.to_owned(),
            elapsed_ms: elapsed.as_millis() as u64,
        });
    }

    /// Create a scoped timer for one stage.
    pub fn timer(&self, stage: &'static str) -> StageTimer {
        StageTimer {
            stage,
            start: Instant::now(),
        }
    }

    /// Stamp the total run duration.
    pub fn finish(&mut self) {
        self.total_ms = self.start.elapsed().as_millis() as u64;
    }

    pub fn stage(&self, name: &str) -> Option<&StageTiming> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

/// A scoped timer for one stage.
pub struct StageTimer {
    stage: &'static str,
    start: Instant,
}

impl StageTimer {
    /// Finalize the timer and record the stage.
    pub fn finish(self, metrics: &mut RunMetrics) {
        metrics.record_stage(self.stage, self.start.elapsed());
    }
}
