//! Tagged results returned across the engine boundary.
//!
//! Engines never return `Err` for anomaly or forecast runs: every failure is
//! folded into a [`PipelineFailure`] carrying a reason code and a display
//! summary, with no figures.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use alarmlog_core::{AlarmLogError, FailureReason, Result};

use crate::anomaly::AnomalyReport;
use crate::forecast::ForecastReport;

/// A rendered chart, PNG-encoded and base64-embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub title: String,
    pub png_base64: String,
}

impl Figure {
    pub fn from_png(title: impl Into<String>, png: &[u8]) -> Self {
        Self {
            title: title.into(),
            png_base64: STANDARD.encode(png),
        }
    }

    /// Decoded PNG bytes.
    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.png_base64)
            .map_err(|e| AlarmLogError::Render(format!("figure '{}' is not valid base64: {e}", self.title)))
    }

    /// Lowercase, filesystem-safe version of the title.
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.title.len());
        for c in self.title.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('_') && !slug.is_empty() {
                slug.push('_');
            }
        }
        slug.trim_end_matches('_').to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineFailure {
    pub reason: FailureReason,
    pub summary: String,
}

impl From<AlarmLogError> for PipelineFailure {
    fn from(err: AlarmLogError) -> Self {
        Self {
            reason: err.reason(),
            summary: err.summary(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnomalyOutcome {
    Success(AnomalyReport),
    Failure(PipelineFailure),
}

impl AnomalyOutcome {
    pub fn summary(&self) -> &str {
        match self {
            Self::Success(report) => &report.summary,
            Self::Failure(failure) => &failure.summary,
        }
    }

    pub fn figures(&self) -> &[Figure] {
        match self {
            Self::Success(report) => &report.figures,
            Self::Failure(_) => &[],
        }
    }

    pub fn report(&self) -> Option<&AnomalyReport> {
        match self {
            Self::Success(report) => Some(report),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<Result<AnomalyReport>> for AnomalyOutcome {
    fn from(result: Result<AnomalyReport>) -> Self {
        match result {
            Ok(report) => Self::Success(report),
            Err(err) => Self::Failure(err.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForecastOutcome {
    Success(ForecastReport),
    Failure(PipelineFailure),
}

impl ForecastOutcome {
    pub fn summary(&self) -> &str {
        match self {
            Self::Success(report) => &report.summary,
            Self::Failure(failure) => &failure.summary,
        }
    }

    pub fn figures(&self) -> &[Figure] {
        match self {
            Self::Success(report) => &report.figures,
            Self::Failure(_) => &[],
        }
    }

    pub fn report(&self) -> Option<&ForecastReport> {
        match self {
            Self::Success(report) => Some(report),
            Self::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<Result<ForecastReport>> for ForecastOutcome {
    fn from(result: Result<ForecastReport>) -> Self {
        match result {
            Ok(report) => Self::Success(report),
            Err(err) => Self::Failure(err.into()),
        }
    }
}
