//! Run manifest: what one pipeline run read and produced, as JSON.
//!
//! One manifest is stored per run. Comparing the column lists and the
//! OTHER-status tally across runs is how schema drift in the source
//! data becomes visible.

use crate::types::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRows {
    pub loan_balance:          usize,
    pub loans:                 usize,
    pub previous_applications: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableShape {
    pub name:       String,
    pub key_column: String,
    pub rows:       usize,
    pub columns:    Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id:                   RunId,
    pub created_at:               DateTime<Utc>,
    pub input_rows:               InputRows,
    pub tables:                   Vec<TableShape>,
    /// Balance records whose STATUS fell outside the known vocabulary.
    pub other_status_records:     u64,
    /// Optional previous-application columns absent from the input.
    pub missing_optional_columns: Vec<String>,
}

impl RunManifest {
    pub fn table(&self, name: &str) -> Option<&TableShape> {
        self.tables.iter().find(|t| t.name == name)
    }
}
