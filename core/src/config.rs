//! Feature configuration: recency windows and source label vocabularies.
//!
//! Loaded from `{data_dir}/feature_config.json`. Defaults match the
//! bureau data dictionary, so a missing file is not required for tests.

use crate::{
    error::{FeatureError, FeatureResult},
    types::DayOffset,
};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "feature_config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub windows:         RecencyWindows,
    #[serde(default)]
    pub loan_labels:     LoanLabels,
    #[serde(default)]
    pub decision_labels: DecisionLabels,
}

/// Trailing windows, as day offsets relative to the reference date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecencyWindows {
    /// A loan opened strictly after this offset counts as recent.
    pub recent_loan_days:        DayOffset,
    /// An application decided strictly after this offset counts as recent.
    pub recent_decision_days:    DayOffset,
    /// A loan opened at or after this offset can raise HAS_RECENT_DPD.
    pub recent_delinquency_days: DayOffset,
}

impl Default for RecencyWindows {
    fn default() -> Self {
        Self {
            recent_loan_days:        -365, // last 12 months
            recent_decision_days:    -365,
            recent_delinquency_days: -3,
        }
    }
}

/// CREDIT_ACTIVE values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanLabels {
    pub active: String,
    pub closed: String,
    /// Written for loans that are neither active nor closed.
    #[serde(default = "default_other_label")]
    pub other:  String,
}

impl Default for LoanLabels {
    fn default() -> Self {
        Self {
            active: "Active".into(),
            closed: "Closed".into(),
            other:  default_other_label(),
        }
    }
}

/// NAME_CONTRACT_STATUS values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLabels {
    pub approved: String,
    pub refused:  String,
    #[serde(default = "default_other_label")]
    pub other:    String,
}

impl Default for DecisionLabels {
    fn default() -> Self {
        Self {
            approved: "Approved".into(),
            refused:  "Refused".into(),
            other:    default_other_label(),
        }
    }
}

fn default_other_label() -> String {
    "Other".into()
}

impl FeatureConfig {
    /// Load and validate `{data_dir}/feature_config.json`.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/{CONFIG_FILE}");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: FeatureConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `data_dir` when the file exists, otherwise fall back to defaults.
    pub fn load_or_default(data_dir: &str) -> anyhow::Result<Self> {
        let path = std::path::Path::new(data_dir).join(CONFIG_FILE);
        if path.exists() {
            Self::load(data_dir)
        } else {
            log::info!("config: {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> FeatureResult<()> {
        let w = &self.windows;
        for (name, value) in [
            ("recent_loan_days", w.recent_loan_days),
            ("recent_decision_days", w.recent_decision_days),
            ("recent_delinquency_days", w.recent_delinquency_days),
        ] {
            if value > 0 {
                return Err(FeatureError::InvalidConfig {
                    reason: format!("{name} must be <= 0, got {value}"),
                });
            }
        }

        let labels = [
            ("loan_labels.active", &self.loan_labels.active),
            ("loan_labels.closed", &self.loan_labels.closed),
            ("decision_labels.approved", &self.decision_labels.approved),
            ("decision_labels.refused", &self.decision_labels.refused),
        ];
        for (name, value) in labels {
            if value.trim().is_empty() {
                return Err(FeatureError::InvalidConfig {
                    reason: format!("{name} must not be empty"),
                });
            }
        }
        if self.loan_labels.active == self.loan_labels.closed {
            return Err(FeatureError::InvalidConfig {
                reason: "loan_labels.active and loan_labels.closed must differ".into(),
            });
        }
        if self.decision_labels.approved == self.decision_labels.refused {
            return Err(FeatureError::InvalidConfig {
                reason: "decision_labels.approved and decision_labels.refused must differ".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(FeatureConfig::default().validate().is_ok());
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let data_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
        let config = FeatureConfig::load(data_dir).expect("shipped config loads");
        assert_eq!(config.windows, RecencyWindows::default());
        assert_eq!(config.loan_labels.active, "Active");
        assert_eq!(config.decision_labels.refused, "Refused");
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: FeatureConfig =
            serde_json::from_str(r#"{ "windows": { "recent_loan_days": -180, "recent_decision_days": -365, "recent_delinquency_days": -3 } }"#)
                .expect("parse");
        assert_eq!(config.windows.recent_loan_days, -180);
        assert_eq!(config.loan_labels, LoanLabels::default());
    }

    #[test]
    fn positive_window_is_rejected() {
        let mut config = FeatureConfig::default();
        config.windows.recent_delinquency_days = 3;
        assert!(matches!(config.validate(), Err(FeatureError::InvalidConfig { .. })));
    }

    #[test]
    fn indistinct_labels_are_rejected() {
        let mut config = FeatureConfig::default();
        config.loan_labels.closed = config.loan_labels.active.clone();
        assert!(matches!(config.validate(), Err(FeatureError::InvalidConfig { .. })));

        let mut config = FeatureConfig::default();
        config.decision_labels.approved = "  ".into();
        assert!(matches!(config.validate(), Err(FeatureError::InvalidConfig { .. })));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = FeatureConfig::load_or_default("/nonexistent/feature-config-dir").expect("defaults");
        assert_eq!(config, FeatureConfig::default());
    }
}
