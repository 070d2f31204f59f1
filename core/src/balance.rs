//! Loan-balance rollup: monthly status history to one row per loan.
//!
//! Intermediate frames, each keyed by SK_ID_BUREAU:
//!   1. Record count      (base frame: every loan with history)
//!   2. Month window      (oldest / most recent / span)
//!   3. Status tallies    (fixed vocabulary pivot)
//!   4. Delinquency       (ordinal statuses only)
//!   5. Most recent status
//!
//! Non-ordinal statuses (C, X, non-numeric OTHER) count toward the record
//! count and the pivot, but never toward the DPD statistics. A numeric
//! OTHER such as "7" pivots into OTHER and still feeds the DPD statistics.

use crate::{
    feature::{flag, FeatureRow, LOAN_KEY},
    join::{group_by, LeftJoin},
    ratio::safe_div,
    record::LoanBalanceRecord,
    status::{BalanceStatus, StatusTally},
    types::{LoanId, MonthOffset},
};
use serde::{Deserialize, Serialize};
use std::{cmp::Reverse, collections::BTreeMap};

pub const SOURCE: &str = "BUREAU_BALANCE";

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanBalanceSummary {
    pub loan_id:            LoanId,
    pub record_count:       u64,
    pub oldest_month:       MonthOffset,
    pub most_recent_month:  MonthOffset,
    pub month_span:         i64,
    pub status_counts:      StatusTally,
    pub status_ratios:      [f64; BalanceStatus::COUNT],
    pub dpd_max:            u32,
    pub dpd_mean:           f64,
    pub has_positive_dpd:   u8,
    /// Delinquent months over all months on record.
    pub dpd_ratio:          f64,
    pub most_recent_status: Option<BalanceStatus>,
}

impl LoanBalanceSummary {
    fn empty(loan_id: LoanId, record_count: u64) -> Self {
        Self {
            loan_id,
            record_count,
            oldest_month:       0,
            most_recent_month:  0,
            month_span:         0,
            status_counts:      StatusTally::default(),
            status_ratios:      [0.0; BalanceStatus::COUNT],
            dpd_max:            0,
            dpd_mean:           0.0,
            has_positive_dpd:   0,
            dpd_ratio:          0.0,
            most_recent_status: None,
        }
    }

    pub fn status_count(&self, status: BalanceStatus) -> u64 {
        self.status_counts.get(status)
    }

    pub fn status_ratio(&self, status: BalanceStatus) -> f64 {
        self.status_ratios[status.index()]
    }
}

impl FeatureRow for LoanBalanceSummary {
    fn key_column() -> &'static str { LOAN_KEY }

    fn key(&self) -> i64 { self.loan_id }

    fn features(&self) -> Vec<(String, f64)> {
        let mut out = vec![
            (format!("{SOURCE}_RECORD_COUNT"), self.record_count as f64),
            (format!("{SOURCE}_OLDEST_MONTH"), self.oldest_month as f64),
            (format!("{SOURCE}_MOST_RECENT_MONTH"), self.most_recent_month as f64),
            (format!("{SOURCE}_MONTH_SPAN"), self.month_span as f64),
        ];
        for (status, count) in self.status_counts.iter() {
            out.push((format!("{SOURCE}_STATUS_{}_COUNT", status.token()), count as f64));
        }
        for status in BalanceStatus::ALL {
            out.push((
                format!("{SOURCE}_STATUS_{}_RATIO", status.token()),
                self.status_ratio(status),
            ));
        }
        out.extend([
            (format!("{SOURCE}_DPD_MAX"), f64::from(self.dpd_max)),
            (format!("{SOURCE}_DPD_MEAN"), self.dpd_mean),
            (format!("{SOURCE}_HAS_POSITIVE_DPD"), f64::from(self.has_positive_dpd)),
            (format!("{SOURCE}_DPD_RATIO"), self.dpd_ratio),
        ]);
        for status in BalanceStatus::ALL {
            let hit = self.most_recent_status.is_some_and(|s| s.index() == status.index());
            out.push((
                format!("{SOURCE}_RECENT_STATUS_{}", status.token()),
                f64::from(flag(hit)),
            ));
        }
        out
    }
}

// ── Intermediate frames ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct MonthWindow {
    oldest:      MonthOffset,
    most_recent: MonthOffset,
}

#[derive(Debug, Clone, Copy, Default)]
struct Delinquency {
    dpd_max:         u32,
    dpd_sum:         u64,
    ordinal_months:  u64,
    positive_months: u64,
}

type Groups<'a> = BTreeMap<LoanId, Vec<&'a LoanBalanceRecord>>;

fn record_counts(groups: &Groups) -> BTreeMap<LoanId, u64> {
    groups.iter().map(|(id, rows)| (*id, rows.len() as u64)).collect()
}

fn month_windows(groups: &Groups) -> BTreeMap<LoanId, MonthWindow> {
    groups
        .iter()
        .filter_map(|(id, rows)| {
            let oldest = rows.iter().map(|r| r.month_offset).min()?;
            let most_recent = rows.iter().map(|r| r.month_offset).max()?;
            Some((*id, MonthWindow { oldest, most_recent }))
        })
        .collect()
}

fn status_tallies(groups: &Groups) -> BTreeMap<LoanId, StatusTally> {
    groups
        .iter()
        .map(|(id, rows)| {
            let mut tally = StatusTally::default();
            for row in rows {
                tally.add(row.status);
            }
            (*id, tally)
        })
        .collect()
}

/// Loans with no ordinal month at all are absent from this frame.
fn delinquency(groups: &Groups) -> BTreeMap<LoanId, Delinquency> {
    let mut out = BTreeMap::new();
    for (id, rows) in groups {
        let mut d = Delinquency::default();
        for dpd in rows.iter().filter_map(|r| r.status.ordinal()) {
            d.dpd_max = d.dpd_max.max(dpd);
            d.dpd_sum += u64::from(dpd);
            d.ordinal_months += 1;
            if dpd > 0 {
                d.positive_months += 1;
            }
        }
        if d.ordinal_months > 0 {
            out.insert(*id, d);
        }
    }
    out
}

/// The record with the greatest month offset.
///
/// Ties on month offset go to the smallest record_id, then to the lowest
/// status in vocabulary order, so the choice never depends on row order.
pub fn most_recent_record<'a>(rows: &[&'a LoanBalanceRecord]) -> Option<&'a LoanBalanceRecord> {
    rows.iter()
        .copied()
        .max_by_key(|r| (r.month_offset, Reverse(r.record_id), Reverse(r.status)))
}

fn most_recent_statuses(groups: &Groups) -> BTreeMap<LoanId, BalanceStatus> {
    groups
        .iter()
        .filter_map(|(id, rows)| most_recent_record(rows).map(|r| (*id, r.status)))
        .collect()
}

// ── Rollup ───────────────────────────────────────────────────────────────────

/// Roll monthly balance records up to one summary per loan, ordered by loan_id.
pub fn roll_up(records: &[LoanBalanceRecord]) -> Vec<LoanBalanceSummary> {
    let groups = group_by(records, |r| r.loan_id);

    let counts = record_counts(&groups);
    let windows = month_windows(&groups);
    let tallies = status_tallies(&groups);
    let dpd = delinquency(&groups);
    let recent = most_recent_statuses(&groups);

    let other = tallies.values().map(|t| t.get(BalanceStatus::Other(None))).sum::<u64>();
    if other > 0 {
        log::warn!("balance: {other} records carry an unrecognised STATUS, tallied as OTHER");
    }

    let summaries = LeftJoin::new(&counts, |loan_id, n| LoanBalanceSummary::empty(*loan_id, *n))
        .join("month_window", &windows, |row, w| {
            row.oldest_month = w.oldest;
            row.most_recent_month = w.most_recent;
            row.month_span = w.most_recent - w.oldest;
        })
        .join("status_tally", &tallies, |row, tally| {
            row.status_counts = *tally;
            for status in BalanceStatus::ALL {
                row.status_ratios[status.index()] =
                    safe_div(tally.get(status) as f64, row.record_count as f64);
            }
        })
        .join("delinquency", &dpd, |row, d| {
            row.dpd_max = d.dpd_max;
            row.dpd_mean = safe_div(d.dpd_sum as f64, d.ordinal_months as f64);
            row.has_positive_dpd = flag(d.positive_months > 0);
            row.dpd_ratio = safe_div(d.positive_months as f64, row.record_count as f64);
        })
        .join("recent_status", &recent, |row, status| {
            row.most_recent_status = Some(*status);
        })
        .finish();

    log::debug!(
        "balance: {} records rolled up to {} loans",
        records.len(),
        summaries.len(),
    );
    summaries
}
