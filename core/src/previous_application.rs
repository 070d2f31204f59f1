//! Previous-application rollup: prior applications to one row per client.
//!
//! Clients with no previous applications are absent from the output.
//! Use `for_population` to left-join the summaries onto a client
//! population with zero fill.

use crate::{
    config::{FeatureConfig, RecencyWindows},
    feature::{flag, FeatureRow, CLIENT_KEY},
    join::group_by_sorted,
    ratio::{safe_div, safe_div_opt, NumericAgg, RangeAgg},
    record::{DecisionStatus, PreviousAppColumns, PreviousApplicationRecord},
    types::{ApplicationId, ClientId, DayOffset},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const SOURCE: &str = "PREV";

/// One client's previous-application features.
///
/// Fields backed by an optional source column are `None` when that
/// column is absent from the input, and are then left out of the
/// exported schema. When the column exists they are always `Some`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPreviousAppSummary {
    pub client_id:                        ClientId,
    pub app_count:                        u64,
    pub approved_count:                   u64,
    pub refused_count:                    u64,
    pub approval_ratio:                   f64,
    pub refused_ratio:                    f64,
    pub has_refused_flag:                 u8,
    pub days_decision_most_recent:        DayOffset,
    pub days_decision_oldest:             DayOffset,
    pub days_decision_span:               i64,
    pub last_1y_app_count:                u64,
    pub amt_credit_mean:                  f64,
    pub amt_credit_max:                   f64,
    pub amt_application_mean:             f64,
    pub amt_annuity_mean:                 Option<f64>,
    pub amt_down_payment_mean:            Option<f64>,
    pub cnt_payment_mean:                 Option<f64>,
    pub cnt_payment_max:                  Option<f64>,
    pub credit_to_application_ratio_mean: f64,
    pub credit_minus_application_mean:    f64,
}

impl ClientPreviousAppSummary {
    /// The row of a client with no previous applications.
    pub fn zeroed(client_id: ClientId, columns: PreviousAppColumns) -> Self {
        let optional = |present: bool| present.then_some(0.0);
        Self {
            client_id,
            app_count:                        0,
            approved_count:                   0,
            refused_count:                    0,
            approval_ratio:                   0.0,
            refused_ratio:                    0.0,
            has_refused_flag:                 0,
            days_decision_most_recent:        0,
            days_decision_oldest:             0,
            days_decision_span:               0,
            last_1y_app_count:                0,
            amt_credit_mean:                  0.0,
            amt_credit_max:                   0.0,
            amt_application_mean:             0.0,
            amt_annuity_mean:                 optional(columns.annuity),
            amt_down_payment_mean:            optional(columns.down_payment),
            cnt_payment_mean:                 optional(columns.payment_count),
            cnt_payment_max:                  optional(columns.payment_count),
            credit_to_application_ratio_mean: 0.0,
            credit_minus_application_mean:    0.0,
        }
    }
}

impl FeatureRow for ClientPreviousAppSummary {
    fn key_column() -> &'static str { CLIENT_KEY }

    fn key(&self) -> i64 { self.client_id }

    fn features(&self) -> Vec<(String, f64)> {
        let mut out = vec![
            (format!("{SOURCE}_APP_COUNT"), self.app_count as f64),
            (format!("{SOURCE}_APPROVED_COUNT"), self.approved_count as f64),
            (format!("{SOURCE}_REFUSED_COUNT"), self.refused_count as f64),
            (format!("{SOURCE}_APPROVAL_RATIO"), self.approval_ratio),
            (format!("{SOURCE}_REFUSED_RATIO"), self.refused_ratio),
            (format!("{SOURCE}_HAS_REFUSED_FLAG"), f64::from(self.has_refused_flag)),
            (format!("{SOURCE}_DAYS_DECISION_MOST_RECENT"), self.days_decision_most_recent as f64),
            (format!("{SOURCE}_DAYS_DECISION_OLDEST"), self.days_decision_oldest as f64),
            (format!("{SOURCE}_DAYS_DECISION_SPAN"), self.days_decision_span as f64),
            (format!("{SOURCE}_LAST_1Y_APP_COUNT"), self.last_1y_app_count as f64),
            (format!("{SOURCE}_AMT_CREDIT_MEAN"), self.amt_credit_mean),
            (format!("{SOURCE}_AMT_CREDIT_MAX"), self.amt_credit_max),
            (format!("{SOURCE}_AMT_APPLICATION_MEAN"), self.amt_application_mean),
        ];
        let optional = [
            ("AMT_ANNUITY_MEAN", self.amt_annuity_mean),
            ("AMT_DOWN_PAYMENT_MEAN", self.amt_down_payment_mean),
            ("CNT_PAYMENT_MEAN", self.cnt_payment_mean),
            ("CNT_PAYMENT_MAX", self.cnt_payment_max),
        ];
        for (metric, value) in optional {
            if let Some(v) = value {
                out.push((format!("{SOURCE}_{metric}"), v));
            }
        }
        out.extend([
            (
                format!("{SOURCE}_CREDIT_TO_APPLICATION_RATIO_MEAN"),
                self.credit_to_application_ratio_mean,
            ),
            (
                format!("{SOURCE}_CREDIT_MINUS_APPLICATION_MEAN"),
                self.credit_minus_application_mean,
            ),
        ]);
        out
    }
}

// ── Accumulator ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ClientApps {
    applications:       BTreeSet<ApplicationId>,
    approved:           u64,
    refused:            u64,
    recent:             u64,
    days_decision:      RangeAgg,
    granted:            NumericAgg,
    requested:          NumericAgg,
    annuity:            NumericAgg,
    down_payment:       NumericAgg,
    payment_count:      NumericAgg,
    credit_to_app:      NumericAgg,
    credit_minus_app:   NumericAgg,
}

impl ClientApps {
    fn push(&mut self, app: &PreviousApplicationRecord, windows: &RecencyWindows) {
        // A repeated application_id is the same application reported twice.
        if !self.applications.insert(app.application_id) {
            return;
        }
        match app.decision {
            DecisionStatus::Approved => self.approved += 1,
            DecisionStatus::Refused  => self.refused += 1,
            DecisionStatus::Other    => {}
        }
        if app.days_decision.is_some_and(|d| d > windows.recent_decision_days) {
            self.recent += 1;
        }
        self.days_decision.push(app.days_decision);
        self.granted.push(app.granted);
        self.requested.push(app.requested);
        self.annuity.push(app.annuity);
        self.down_payment.push(app.down_payment);
        self.payment_count.push(app.payment_count);
        // Per-row ratio is always defined (0 when either side is missing),
        // the difference is missing unless both sides are present.
        self.credit_to_app.push(Some(safe_div_opt(app.granted, app.requested)));
        self.credit_minus_app.push(match (app.granted, app.requested) {
            (Some(g), Some(r)) => Some(g - r),
            _ => None,
        });
    }

    fn summarize(&self, client_id: ClientId, columns: PreviousAppColumns) -> ClientPreviousAppSummary {
        let app_count = self.applications.len() as u64;
        let fill = |agg: Option<f64>| agg.unwrap_or(0.0);
        let optional = |present: bool, agg: Option<f64>| present.then(|| fill(agg));

        ClientPreviousAppSummary {
            client_id,
            app_count,
            approved_count:                   self.approved,
            refused_count:                    self.refused,
            approval_ratio:                   safe_div(self.approved as f64, app_count as f64),
            refused_ratio:                    safe_div(self.refused as f64, app_count as f64),
            has_refused_flag:                 flag(self.refused > 0),
            days_decision_most_recent:        self.days_decision.max().unwrap_or(0),
            days_decision_oldest:             self.days_decision.min().unwrap_or(0),
            days_decision_span:               self.days_decision.span().unwrap_or(0),
            last_1y_app_count:                self.recent,
            amt_credit_mean:                  fill(self.granted.mean()),
            amt_credit_max:                   fill(self.granted.max()),
            amt_application_mean:             fill(self.requested.mean()),
            amt_annuity_mean:                 optional(columns.annuity, self.annuity.mean()),
            amt_down_payment_mean:            optional(columns.down_payment, self.down_payment.mean()),
            cnt_payment_mean:                 optional(columns.payment_count, self.payment_count.mean()),
            cnt_payment_max:                  optional(columns.payment_count, self.payment_count.max()),
            credit_to_application_ratio_mean: fill(self.credit_to_app.mean()),
            credit_minus_application_mean:    fill(self.credit_minus_app.mean()),
        }
    }
}

// ── Rollup ───────────────────────────────────────────────────────────────────

/// Roll previous applications up to one summary per client, ordered by client_id.
pub fn roll_up(
    applications: &[PreviousApplicationRecord],
    columns: PreviousAppColumns,
    config: &FeatureConfig,
) -> Vec<ClientPreviousAppSummary> {
    let missing = columns.missing();
    if !missing.is_empty() {
        log::warn!(
            "previous_application: optional columns absent, dependent features omitted: {}",
            missing.join(", "),
        );
    }

    let summaries: Vec<_> = group_by_sorted(
        applications,
        |a| a.client_id,
        PreviousApplicationRecord::canonical_cmp,
    )
        .into_iter()
        .map(|(client_id, rows)| {
            let mut acc = ClientApps::default();
            for row in rows {
                acc.push(row, &config.windows);
            }
            acc.summarize(client_id, columns)
        })
        .collect();

    log::debug!(
        "previous_application: {} applications rolled up to {} clients",
        applications.len(),
        summaries.len(),
    );
    summaries
}

/// Left-join summaries onto `population` with zero fill.
///
/// Returns exactly one row per distinct client in `population`, in
/// ascending client order. Summaries for clients outside the population
/// are dropped.
pub fn for_population(
    population: &[ClientId],
    summaries: &[ClientPreviousAppSummary],
    columns: PreviousAppColumns,
) -> Vec<ClientPreviousAppSummary> {
    let by_client: BTreeMap<ClientId, &ClientPreviousAppSummary> =
        summaries.iter().map(|s| (s.client_id, s)).collect();
    let clients: BTreeSet<ClientId> = population.iter().copied().collect();

    clients
        .into_iter()
        .map(|client_id| match by_client.get(&client_id) {
            Some(summary) => (*summary).clone(),
            None => ClientPreviousAppSummary::zeroed(client_id, columns),
        })
        .collect()
}
