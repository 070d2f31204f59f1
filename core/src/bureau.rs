//! Loan-history rollup: bureau credit lines to one row per client.
//!
//! Intermediate frames, each keyed by SK_ID_CURR:
//!   1. Total loan count        (base frame: every client with a loan)
//!   2. Active / closed counts + active ratio
//!   3. Credit recency and span
//!   4. Overdue ratio
//!   5. Active monetary sums + debt ratio   (active view)
//!   6. Active max overdue                  (active view)
//!   7. Recent loan count                   (recent view)
//!
//! Frames 5–7 only contain clients present in their filtered view;
//! the left join leaves everyone else at zero.

use crate::{
    config::RecencyWindows,
    feature::{FeatureRow, CLIENT_KEY},
    join::{group_by_sorted, LeftJoin},
    ratio::{safe_div, safe_share, NumericAgg, RangeAgg},
    record::{CreditActivity, LoanRecord},
    types::{ClientId, DayOffset, LoanId},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const SOURCE: &str = "BUREAU";

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientBureauSummary {
    pub client_id:                ClientId,
    pub total_loan_count:         u64,
    pub active_loan_count:        u64,
    pub closed_loan_count:        u64,
    pub active_loan_ratio:        f64,
    pub days_credit_most_recent:  DayOffset,
    pub days_credit_oldest:       DayOffset,
    pub days_credit_span:         i64,
    pub overdue_loan_ratio:       f64,
    pub active_debt_sum:          f64,
    pub active_credit_sum:        f64,
    pub active_debt_ratio:        f64,
    pub active_max_overdue_max:   f64,
    pub recent_1y_loan_count:     u64,
}

impl ClientBureauSummary {
    fn empty(client_id: ClientId, total_loan_count: u64) -> Self {
        Self {
            client_id,
            total_loan_count,
            active_loan_count:       0,
            closed_loan_count:       0,
            active_loan_ratio:       0.0,
            days_credit_most_recent: 0,
            days_credit_oldest:      0,
            days_credit_span:        0,
            overdue_loan_ratio:      0.0,
            active_debt_sum:         0.0,
            active_credit_sum:       0.0,
            active_debt_ratio:       0.0,
            active_max_overdue_max:  0.0,
            recent_1y_loan_count:    0,
        }
    }
}

impl FeatureRow for ClientBureauSummary {
    fn key_column() -> &'static str { CLIENT_KEY }

    fn key(&self) -> i64 { self.client_id }

    fn features(&self) -> Vec<(String, f64)> {
        vec![
            (format!("{SOURCE}_TOTAL_LOAN_COUNT"), self.total_loan_count as f64),
            (format!("{SOURCE}_ACTIVE_LOAN_COUNT"), self.active_loan_count as f64),
            (format!("{SOURCE}_CLOSED_LOAN_COUNT"), self.closed_loan_count as f64),
            (format!("{SOURCE}_ACTIVE_LOAN_RATIO"), self.active_loan_ratio),
            (format!("{SOURCE}_DAYS_CREDIT_MOST_RECENT"), self.days_credit_most_recent as f64),
            (format!("{SOURCE}_DAYS_CREDIT_OLDEST"), self.days_credit_oldest as f64),
            (format!("{SOURCE}_DAYS_CREDIT_SPAN"), self.days_credit_span as f64),
            (format!("{SOURCE}_OVERDUE_LOAN_RATIO"), self.overdue_loan_ratio),
            (format!("{SOURCE}_ACTIVE_AMT_CREDIT_SUM_DEBT_SUM"), self.active_debt_sum),
            (format!("{SOURCE}_ACTIVE_AMT_CREDIT_SUM_SUM"), self.active_credit_sum),
            (format!("{SOURCE}_ACTIVE_DEBT_RATIO"), self.active_debt_ratio),
            (format!("{SOURCE}_ACTIVE_AMT_CREDIT_MAX_OVERDUE_MAX"), self.active_max_overdue_max),
            (format!("{SOURCE}_RECENT_1Y_LOAN_COUNT"), self.recent_1y_loan_count as f64),
        ]
    }
}

// ── Intermediate frames ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct ActiveClosed {
    active: u64,
    closed: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct ActiveAmounts {
    debt:   NumericAgg,
    credit: NumericAgg,
}

type Groups<'a> = BTreeMap<ClientId, Vec<&'a LoanRecord>>;

fn distinct_loans(groups: &Groups) -> BTreeMap<ClientId, u64> {
    groups
        .iter()
        .map(|(id, rows)| {
            let loans: BTreeSet<LoanId> = rows.iter().map(|r| r.loan_id).collect();
            (*id, loans.len() as u64)
        })
        .collect()
}

fn active_closed(groups: &Groups) -> BTreeMap<ClientId, ActiveClosed> {
    groups
        .iter()
        .map(|(id, rows)| {
            let mut c = ActiveClosed::default();
            for row in rows {
                match row.activity {
                    CreditActivity::Active => c.active += 1,
                    CreditActivity::Closed => c.closed += 1,
                    CreditActivity::Other  => {}
                }
            }
            (*id, c)
        })
        .collect()
}

fn credit_age(groups: &Groups) -> BTreeMap<ClientId, RangeAgg> {
    groups
        .iter()
        .map(|(id, rows)| {
            let mut range = RangeAgg::default();
            for row in rows {
                range.push(row.days_credit);
            }
            (*id, range)
        })
        .collect()
}

fn overdue_ratio(groups: &Groups) -> BTreeMap<ClientId, f64> {
    groups
        .iter()
        .map(|(id, rows)| {
            let overdue = rows.iter().filter(|r| r.has_overdue()).count();
            (*id, safe_div(overdue as f64, rows.len() as f64))
        })
        .collect()
}

fn active_amounts(active: &Groups) -> BTreeMap<ClientId, ActiveAmounts> {
    active
        .iter()
        .map(|(id, rows)| {
            let mut a = ActiveAmounts::default();
            for row in rows {
                a.debt.push(row.debt_amount);
                a.credit.push(row.credit_sum);
            }
            (*id, a)
        })
        .collect()
}

fn active_max_overdue(active: &Groups) -> BTreeMap<ClientId, f64> {
    active
        .iter()
        .filter_map(|(id, rows)| {
            let mut agg = NumericAgg::default();
            for row in rows {
                agg.push(row.max_overdue);
            }
            agg.max().map(|m| (*id, m))
        })
        .collect()
}

// ── Rollup ───────────────────────────────────────────────────────────────────

/// True when the loan was opened inside the recent window.
/// A loan with unknown opening date is never recent.
pub fn is_recent_loan(loan: &LoanRecord, windows: &RecencyWindows) -> bool {
    loan.days_credit.is_some_and(|d| d > windows.recent_loan_days)
}

/// Roll bureau loans up to one summary per client, ordered by client_id.
pub fn roll_up(loans: &[LoanRecord], windows: &RecencyWindows) -> Vec<ClientBureauSummary> {
    let by_client = |l: &LoanRecord| l.client_id;
    let groups = group_by_sorted(loans, by_client, LoanRecord::canonical_cmp);
    let active_groups = group_by_sorted(
        loans.iter().filter(|l| l.is_active()),
        by_client,
        LoanRecord::canonical_cmp,
    );
    let recent_groups = group_by_sorted(
        loans.iter().filter(|l| is_recent_loan(l, windows)),
        by_client,
        LoanRecord::canonical_cmp,
    );

    let totals = distinct_loans(&groups);
    let status = active_closed(&groups);
    let age = credit_age(&groups);
    let overdue = overdue_ratio(&groups);
    let amounts = active_amounts(&active_groups);
    let active_overdue = active_max_overdue(&active_groups);
    let recent_counts = distinct_loans(&recent_groups);

    let summaries = LeftJoin::new(&totals, |client_id, n| ClientBureauSummary::empty(*client_id, *n))
        .join("active_closed", &status, |row, c| {
            row.active_loan_count = c.active;
            row.closed_loan_count = c.closed;
            row.active_loan_ratio = safe_div(c.active as f64, (c.active + c.closed) as f64);
        })
        .join("credit_age", &age, |row, range| {
            row.days_credit_most_recent = range.max().unwrap_or(0);
            row.days_credit_oldest = range.min().unwrap_or(0);
            row.days_credit_span = range.span().unwrap_or(0);
        })
        .join("overdue_ratio", &overdue, |row, ratio| {
            row.overdue_loan_ratio = *ratio;
        })
        .join("active_amounts", &amounts, |row, a| {
            row.active_debt_sum = a.debt.sum().unwrap_or(0.0);
            row.active_credit_sum = a.credit.sum().unwrap_or(0.0);
            row.active_debt_ratio = safe_share(a.debt.sum(), a.credit.sum());
        })
        .join("active_overdue", &active_overdue, |row, max| {
            row.active_max_overdue_max = *max;
        })
        .join("recent_loans", &recent_counts, |row, n| {
            row.recent_1y_loan_count = *n;
        })
        .finish();

    log::debug!(
        "bureau: {} loans rolled up to {} clients ({} with active loans, {} with recent loans)",
        loans.len(),
        summaries.len(),
        active_groups.len(),
        recent_groups.len(),
    );
    summaries
}
