//! The feature pipeline: one full batch pass over an input snapshot.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Loan-balance rollup          (bureau_balance → one row per loan)
//!   2. Loan-history rollup          (bureau → one row per client)
//!   3. Previous-application rollup  (previous_application → one row per client)
//!   4. Client-level aggregation     (1 through the loan → client edge, folded onto 2)
//!
//! RULES:
//!   - Stages read only the inputs and earlier stages' outputs.
//!   - No stage mutates another stage's output.
//!   - Every run recomputes every table from the current snapshot.
//!   - Output row order is key order, never input order.

use crate::{
    balance::{self, LoanBalanceSummary},
    bureau::{self, ClientBureauSummary},
    client_level::{self, ClientFeatureRow, LoanOwnership},
    config::FeatureConfig,
    error::FeatureResult,
    feature::{column_names, FeatureRow},
    manifest::{InputRows, RunManifest, TableShape},
    previous_application::{self, ClientPreviousAppSummary},
    record::{LoanBalanceRecord, LoanRecord, PreviousAppColumns, PreviousApplicationRecord},
    types::{ClientId, RunId},
};
use serde::{Deserialize, Serialize};

pub const LOAN_BALANCE_TABLE: &str = "loan_balance_features";
pub const CLIENT_BUREAU_TABLE: &str = "client_bureau_features";
pub const PREVIOUS_APPLICATION_TABLE: &str = "client_previous_application_features";
pub const CLIENT_FEATURE_TABLE: &str = "client_features";

/// The three source tables of one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureInputs {
    pub loan_balance:          Vec<LoanBalanceRecord>,
    pub loans:                 Vec<LoanRecord>,
    pub previous_applications: Vec<PreviousApplicationRecord>,
    pub previous_columns:      PreviousAppColumns,
}

impl FeatureInputs {
    pub fn row_counts(&self) -> InputRows {
        InputRows {
            loan_balance:          self.loan_balance.len(),
            loans:                 self.loans.len(),
            previous_applications: self.previous_applications.len(),
        }
    }
}

/// Every table one run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub loan_balance:         Vec<LoanBalanceSummary>,
    pub client_bureau:        Vec<ClientBureauSummary>,
    pub previous_application: Vec<ClientPreviousAppSummary>,
    pub client_features:      Vec<ClientFeatureRow>,
    pub previous_columns:     PreviousAppColumns,
}

impl FeatureSet {
    /// Clients of the final table, ascending.
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.client_features.iter().map(|r| r.client_id()).collect()
    }

    /// Previous-application features for every client of the final table,
    /// zero-filled for clients without previous applications.
    pub fn previous_application_for_clients(&self) -> Vec<ClientPreviousAppSummary> {
        previous_application::for_population(
            &self.client_ids(),
            &self.previous_application,
            self.previous_columns,
        )
    }

    pub fn shapes(&self) -> Vec<TableShape> {
        vec![
            shape::<LoanBalanceSummary>(LOAN_BALANCE_TABLE, &self.loan_balance),
            shape::<ClientBureauSummary>(CLIENT_BUREAU_TABLE, &self.client_bureau),
            shape::<ClientPreviousAppSummary>(PREVIOUS_APPLICATION_TABLE, &self.previous_application),
            shape::<ClientFeatureRow>(CLIENT_FEATURE_TABLE, &self.client_features),
        ]
    }
}

fn shape<R: FeatureRow>(name: &str, rows: &[R]) -> TableShape {
    TableShape {
        name:       name.to_string(),
        key_column: R::key_column().to_string(),
        rows:       rows.len(),
        columns:    column_names(rows),
    }
}

pub struct FeaturePipeline {
    config: FeatureConfig,
}

impl FeaturePipeline {
    pub fn new(config: FeatureConfig) -> FeatureResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Run every stage over `inputs`.
    pub fn run(&self, inputs: &FeatureInputs) -> FeatureSet {
        let windows = &self.config.windows;

        let loan_balance = balance::roll_up(&inputs.loan_balance);
        log::info!(
            "stage 1/4 balance: {} records -> {} loans",
            inputs.loan_balance.len(),
            loan_balance.len(),
        );

        let client_bureau = bureau::roll_up(&inputs.loans, windows);
        log::info!(
            "stage 2/4 bureau: {} loans -> {} clients",
            inputs.loans.len(),
            client_bureau.len(),
        );

        let previous_application = previous_application::roll_up(
            &inputs.previous_applications,
            inputs.previous_columns,
            &self.config,
        );
        log::info!(
            "stage 3/4 previous_application: {} applications -> {} clients",
            inputs.previous_applications.len(),
            previous_application.len(),
        );

        let ownership = LoanOwnership::from_loans(&inputs.loans);
        let view = client_level::loan_client_view(&loan_balance, &ownership);
        let client_features = client_level::aggregate(&client_bureau, &view, windows);
        log::info!(
            "stage 4/4 client_level: {} attributed loans -> {} client rows",
            view.len(),
            client_features.len(),
        );

        FeatureSet {
            loan_balance,
            client_bureau,
            previous_application,
            client_features,
            previous_columns: inputs.previous_columns,
        }
    }

    /// Describe a finished run: input sizes, output shapes, drift signals.
    pub fn manifest(&self, run_id: RunId, inputs: &FeatureInputs, set: &FeatureSet) -> RunManifest {
        let other_status_records = inputs
            .loan_balance
            .iter()
            .filter(|r| r.status.is_other())
            .count() as u64;

        RunManifest {
            run_id,
            created_at: chrono::Utc::now(),
            input_rows: inputs.row_counts(),
            tables: set.shapes(),
            other_status_records,
            missing_optional_columns: inputs
                .previous_columns
                .missing()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}
