//! Source records, as handed over by the loader.
//!
//! Identifier and offset columns arrive typed. Business columns are
//! Option: a value that failed numeric coercion is simply missing.

use crate::{
    config::{DecisionLabels, LoanLabels},
    status::BalanceStatus,
    types::{ApplicationId, ClientId, DayOffset, LoanId, MonthOffset, RecordId},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One month of a bureau loan's status history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanBalanceRecord {
    pub record_id:    RecordId,
    pub loan_id:      LoanId,
    pub month_offset: MonthOffset,
    pub status:       BalanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditActivity {
    Active,
    Closed,
    Other,
}

impl CreditActivity {
    pub fn classify(raw: &str, labels: &LoanLabels) -> Self {
        let raw = raw.trim();
        if raw == labels.active {
            Self::Active
        } else if raw == labels.closed {
            Self::Closed
        } else {
            Self::Other
        }
    }

    /// Text written back to the source table.
    pub fn label<'a>(&self, labels: &'a LoanLabels) -> &'a str {
        match self {
            Self::Active => &labels.active,
            Self::Closed => &labels.closed,
            Self::Other  => &labels.other,
        }
    }
}

/// One bureau credit line owned by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub client_id:      ClientId,
    pub loan_id:        LoanId,
    pub activity:       CreditActivity,
    pub days_credit:    Option<DayOffset>,
    pub debt_amount:    Option<f64>,
    pub credit_sum:     Option<f64>,
    pub max_overdue:    Option<f64>,
}

impl LoanRecord {
    pub fn is_active(&self) -> bool {
        self.activity == CreditActivity::Active
    }

    /// Missing overdue counts as not overdue.
    pub fn has_overdue(&self) -> bool {
        self.max_overdue.unwrap_or(0.0) > 0.0
    }

    /// Total order over every field, loan_id first.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        (self.loan_id, self.days_credit, self.activity)
            .cmp(&(other.loan_id, other.days_credit, other.activity))
            .then_with(|| cmp_amount(self.debt_amount, other.debt_amount))
            .then_with(|| cmp_amount(self.credit_sum, other.credit_sum))
            .then_with(|| cmp_amount(self.max_overdue, other.max_overdue))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Approved,
    Refused,
    Other,
}

impl DecisionStatus {
    pub fn classify(raw: &str, labels: &DecisionLabels) -> Self {
        let raw = raw.trim();
        if raw == labels.approved {
            Self::Approved
        } else if raw == labels.refused {
            Self::Refused
        } else {
            Self::Other
        }
    }

    pub fn label<'a>(&self, labels: &'a DecisionLabels) -> &'a str {
        match self {
            Self::Approved => &labels.approved,
            Self::Refused  => &labels.refused,
            Self::Other    => &labels.other,
        }
    }
}

/// One prior application made by a client at this institution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousApplicationRecord {
    pub client_id:      ClientId,
    pub application_id: ApplicationId,
    pub decision:       DecisionStatus,
    pub days_decision:  Option<DayOffset>,
    pub requested:      Option<f64>,
    pub granted:        Option<f64>,
    pub annuity:        Option<f64>,
    pub down_payment:   Option<f64>,
    pub payment_count:  Option<f64>,
}

impl PreviousApplicationRecord {
    /// Total order over every field, application_id first.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        (self.application_id, self.days_decision, self.decision)
            .cmp(&(other.application_id, other.days_decision, other.decision))
            .then_with(|| cmp_amount(self.requested, other.requested))
            .then_with(|| cmp_amount(self.granted, other.granted))
            .then_with(|| cmp_amount(self.annuity, other.annuity))
            .then_with(|| cmp_amount(self.down_payment, other.down_payment))
            .then_with(|| cmp_amount(self.payment_count, other.payment_count))
    }
}

/// Missing sorts first.
fn cmp_amount(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}

/// Which optional previous-application columns the source table carries.
///
/// Features computed solely from an absent column are dropped from the
/// output schema instead of being reported as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousAppColumns {
    pub annuity:       bool,
    pub down_payment:  bool,
    pub payment_count: bool,
}

impl PreviousAppColumns {
    pub fn all() -> Self {
        Self { annuity: true, down_payment: true, payment_count: true }
    }

    /// Source column names of the optional columns that are absent.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.annuity { out.push("AMT_ANNUITY"); }
        if !self.down_payment { out.push("AMT_DOWN_PAYMENT"); }
        if !self.payment_count { out.push("CNT_PAYMENT"); }
        out
    }
}

impl Default for PreviousAppColumns {
    fn default() -> Self { Self::all() }
}
