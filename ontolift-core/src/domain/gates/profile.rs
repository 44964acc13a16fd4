// ontolift-core/src/domain/gates/profile.rs

use serde::{Deserialize, Serialize};

use crate::domain::gates::result::{GateCategory, GateResult, GateStatus};

/// Promotion thresholds, ordered from most to least demanding:
/// strict fails on any error or warning, standard fails only on errors,
/// lenient fails only on deployability errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdProfile {
    Strict,
    #[default]
    Standard,
    Lenient,
}

impl ThresholdProfile {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "standard" => Some(Self::Standard),
            "lenient" => Some(Self::Lenient),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Standard => "standard",
            Self::Lenient => "lenient",
        }
    }

    pub fn rejects(&self, result: &GateResult) -> bool {
        match self {
            Self::Strict => result.status != GateStatus::Pass,
            Self::Standard => result.status == GateStatus::Error,
            Self::Lenient => {
                result.status == GateStatus::Error
                    && result.category == GateCategory::Deployability
            }
        }
    }
}

impl std::fmt::Display for ThresholdProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
