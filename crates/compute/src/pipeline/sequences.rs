//! Fixed-width sliding windows over pruned alarm-code sequences.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use alarmlog_core::{AlarmLogError, Result, Serial};

use super::prune::PrunedLog;

/// Window width and forecast horizon, validated so that `1 <= horizon < width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    width: usize,
    horizon: usize,
}

impl WindowSpec {
    pub fn new(width: usize, horizon: usize) -> Result<Self> {
        if width < 2 {
            return Err(AlarmLogError::Configuration(format!(
                "window_size must be at least 2, got {width}"
            )));
        }
        if horizon == 0 || horizon >= width {
            return Err(AlarmLogError::Configuration(format!(
                "forecast_horizon must satisfy 1 <= horizon < window_size ({width}), got {horizon}"
            )));
        }
        Ok(Self { width, horizon })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }
}

/// Supervised forecasting pair cut from one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPair {
    /// First `width - horizon` codes of the window.
    pub input: Vec<f64>,
    /// Last `horizon` codes of the window.
    pub target: Vec<f64>,
}

/// Windows produced for one machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineSequences {
    /// Full windows, used as anomaly-detection observations.
    pub windows: Vec<Vec<f64>>,
    pub pairs: Vec<ForecastPair>,
}

impl MachineSequences {
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Slide a window of `spec.width()` over `codes`.
///
/// Returns no windows when the sequence is shorter than the window; callers
/// treat that as "insufficient history", not an error.
pub fn create_sequences(codes: &[f64], spec: WindowSpec) -> MachineSequences {
    if codes.len() < spec.width {
        return MachineSequences::default();
    }
    let split = spec.width - spec.horizon;
    let mut out = MachineSequences::default();
    for window in codes.windows(spec.width) {
        out.pairs.push(ForecastPair {
            input: window[..split].to_vec(),
            target: window[split..].to_vec(),
        });
        out.windows.push(window.to_vec());
    }
    out
}

/// Build sequences for every machine of a pruned log, in serial order.
///
/// Machines with too little history are present with an empty entry.
pub fn build_all(log: &PrunedLog, spec: WindowSpec) -> BTreeMap<Serial, MachineSequences> {
    log.machines()
        .keys()
        .map(|serial| {
            let seqs = create_sequences(&log.codes(serial), spec);
            debug!(
                machine = %serial,
                windows = seqs.len(),
                "generated forecasting and anomaly detection sequences"
            );
            (serial.clone(), seqs)
        })
        .collect()
}
