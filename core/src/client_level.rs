//! Client-level aggregator: per-loan balance summaries to the final table.
//!
//! Each loan summary is first attached to its owning client through the
//! bureau table (the loan → client edge), along with that loan's credit
//! recency. The joined view is then rolled up per client and folded onto
//! the loan-history summaries:
//!   1. Loan-history summary     (base frame: one row per bureau client)
//!   2. Structural aggregates    (max/mean/sum over the client's loans)
//!   3. Weighted DPD ratio       (DPD ratio weighted by month span)
//!   4. Recent DPD flag
//!
//! Balance loans with no owner in the bureau table cannot be attributed
//! and are dropped from the view.

use crate::{
    balance::LoanBalanceSummary,
    bureau::ClientBureauSummary,
    config::RecencyWindows,
    feature::{flag, FeatureRow, CLIENT_KEY},
    join::{group_by, LeftJoin},
    ratio::{safe_div, NumericAgg, RangeAgg},
    record::LoanRecord,
    types::{ClientId, DayOffset, LoanId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Loan → client edge ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Owner {
    client_id: ClientId,
    recency:   Option<DayOffset>,
}

/// Ownership of each bureau loan, built from the loan table.
#[derive(Debug, Clone, Default)]
pub struct LoanOwnership {
    owners: BTreeMap<LoanId, Owner>,
}

impl LoanOwnership {
    /// A loan listed under several clients belongs to the smallest client_id.
    /// A loan listed several times keeps its latest opening offset.
    pub fn from_loans(loans: &[LoanRecord]) -> Self {
        let mut owners: BTreeMap<LoanId, Owner> = BTreeMap::new();
        let mut conflicts = 0usize;

        for loan in loans {
            let candidate = Owner { client_id: loan.client_id, recency: loan.days_credit };
            owners
                .entry(loan.loan_id)
                .and_modify(|owner| {
                    if owner.client_id != loan.client_id {
                        conflicts += 1;
                        if loan.client_id < owner.client_id {
                            *owner = candidate;
                        }
                    } else {
                        owner.recency = owner.recency.max(loan.days_credit);
                    }
                })
                .or_insert(candidate);
        }

        if conflicts > 0 {
            log::warn!("client_level: {conflicts} loan rows disagree on owning client, smallest client_id kept");
        }
        Self { owners }
    }

    pub fn owner(&self, loan_id: LoanId) -> Option<ClientId> {
        self.owners.get(&loan_id).map(|o| o.client_id)
    }

    pub fn credit_recency(&self, loan_id: LoanId) -> Option<DayOffset> {
        self.owners.get(&loan_id).and_then(|o| o.recency)
    }
}

/// One balance loan enriched with its owner and credit recency.
#[derive(Debug, Clone, Copy)]
pub struct LoanClientView<'a> {
    pub client_id:      ClientId,
    pub summary:        &'a LoanBalanceSummary,
    pub credit_recency: Option<DayOffset>,
}

/// Attach every balance summary to its owning client. Orphans are dropped.
pub fn loan_client_view<'a>(
    summaries: &'a [LoanBalanceSummary],
    ownership: &LoanOwnership,
) -> Vec<LoanClientView<'a>> {
    let view: Vec<_> = summaries
        .iter()
        .filter_map(|summary| {
            let client_id = ownership.owner(summary.loan_id)?;
            Some(LoanClientView {
                client_id,
                summary,
                credit_recency: ownership.credit_recency(summary.loan_id),
            })
        })
        .collect();

    let orphans = summaries.len() - view.len();
    if orphans > 0 {
        log::warn!("client_level: {orphans} balance loans have no owner in the bureau table, dropped");
    }
    view
}

// ── Public types ─────────────────────────────────────────────────────────────

/// Statistics over one client's per-loan balance summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientBalanceAggregates {
    pub loan_count:                  u64,
    pub dpd_max_max:                 f64,
    pub dpd_max_mean:                f64,
    pub dpd_ratio_mean:              f64,
    pub dpd_ratio_max:               f64,
    pub has_positive_dpd_sum:        u64,
    pub has_positive_dpd_mean:       f64,
    pub month_span_mean:             f64,
    pub month_span_max:              i64,
    pub days_credit_most_recent_max: DayOffset,
    pub days_credit_most_recent_min: DayOffset,
    pub oldest_month_max:            i64,
    pub oldest_month_min:            i64,
    pub most_recent_month_max:       i64,
    pub most_recent_month_min:       i64,
}

/// The final feature row: one per client of the loan-history rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFeatureRow {
    pub bureau:                  ClientBureauSummary,
    pub balance:                 ClientBalanceAggregates,
    pub dpd_ratio_weighted_mean: f64,
    pub has_recent_dpd:          u8,
}

impl ClientFeatureRow {
    pub fn client_id(&self) -> ClientId {
        self.bureau.client_id
    }
}

impl FeatureRow for ClientFeatureRow {
    fn key_column() -> &'static str { CLIENT_KEY }

    fn key(&self) -> i64 { self.bureau.client_id }

    fn features(&self) -> Vec<(String, f64)> {
        let b = &self.balance;
        let mut out = self.bureau.features();
        out.extend([
            ("SK_ID_BUREAU_COUNT".to_string(), b.loan_count as f64),
            ("BUREAU_BALANCE_DPD_MAX_MAX".to_string(), b.dpd_max_max),
            ("BUREAU_BALANCE_DPD_MAX_MEAN".to_string(), b.dpd_max_mean),
            ("BUREAU_BALANCE_DPD_RATIO_MEAN".to_string(), b.dpd_ratio_mean),
            ("BUREAU_BALANCE_DPD_RATIO_MAX".to_string(), b.dpd_ratio_max),
            ("BUREAU_BALANCE_HAS_POSITIVE_DPD_SUM".to_string(), b.has_positive_dpd_sum as f64),
            ("BUREAU_BALANCE_HAS_POSITIVE_DPD_MEAN".to_string(), b.has_positive_dpd_mean),
            ("BUREAU_BALANCE_MONTH_SPAN_MEAN".to_string(), b.month_span_mean),
            ("BUREAU_BALANCE_MONTH_SPAN_MAX".to_string(), b.month_span_max as f64),
            ("BUREAU_DAYS_CREDIT_MOST_RECENT_MAX".to_string(), b.days_credit_most_recent_max as f64),
            ("BUREAU_DAYS_CREDIT_MOST_RECENT_MIN".to_string(), b.days_credit_most_recent_min as f64),
            ("BUREAU_BALANCE_OLDEST_MONTH_MAX".to_string(), b.oldest_month_max as f64),
            ("BUREAU_BALANCE_OLDEST_MONTH_MIN".to_string(), b.oldest_month_min as f64),
            ("BUREAU_BALANCE_MOST_RECENT_MONTH_MAX".to_string(), b.most_recent_month_max as f64),
            ("BUREAU_BALANCE_MOST_RECENT_MONTH_MIN".to_string(), b.most_recent_month_min as f64),
            ("BUREAU_BALANCE_DPD_RATIO_WEIGHTED_MEAN".to_string(), self.dpd_ratio_weighted_mean),
            ("HAS_RECENT_DPD".to_string(), f64::from(self.has_recent_dpd)),
        ]);
        out
    }
}

// ── Intermediate frames ──────────────────────────────────────────────────────

type Groups<'v, 'a> = BTreeMap<ClientId, Vec<&'v LoanClientView<'a>>>;

fn structural_aggregates(groups: &Groups) -> BTreeMap<ClientId, ClientBalanceAggregates> {
    groups
        .iter()
        .map(|(client_id, loans)| {
            let mut dpd_max = NumericAgg::default();
            let mut dpd_ratio = NumericAgg::default();
            let mut positive = NumericAgg::default();
            let mut span = NumericAgg::default();
            let mut recency = RangeAgg::default();
            let mut oldest = RangeAgg::default();
            let mut most_recent = RangeAgg::default();

            for loan in loans {
                let s = loan.summary;
                dpd_max.push(Some(f64::from(s.dpd_max)));
                dpd_ratio.push(Some(s.dpd_ratio));
                positive.push(Some(f64::from(s.has_positive_dpd)));
                span.push(Some(s.month_span as f64));
                recency.push(loan.credit_recency);
                oldest.push(Some(s.oldest_month));
                most_recent.push(Some(s.most_recent_month));
            }

            let aggregates = ClientBalanceAggregates {
                loan_count:                  loans.len() as u64,
                dpd_max_max:                 dpd_max.max().unwrap_or(0.0),
                dpd_max_mean:                dpd_max.mean().unwrap_or(0.0),
                dpd_ratio_mean:              dpd_ratio.mean().unwrap_or(0.0),
                dpd_ratio_max:               dpd_ratio.max().unwrap_or(0.0),
                has_positive_dpd_sum:        positive.sum().unwrap_or(0.0) as u64,
                has_positive_dpd_mean:       positive.mean().unwrap_or(0.0),
                month_span_mean:             span.mean().unwrap_or(0.0),
                month_span_max:              span.max().unwrap_or(0.0) as i64,
                days_credit_most_recent_max: recency.max().unwrap_or(0),
                days_credit_most_recent_min: recency.min().unwrap_or(0),
                oldest_month_max:            oldest.max().unwrap_or(0),
                oldest_month_min:            oldest.min().unwrap_or(0),
                most_recent_month_max:       most_recent.max().unwrap_or(0),
                most_recent_month_min:       most_recent.min().unwrap_or(0),
            };
            (*client_id, aggregates)
        })
        .collect()
}

/// Σ(DPD ratio × month span) / Σ month span over one client's loans.
///
/// Loans with a longer observed history weigh more. Zero when the total
/// span is zero.
pub fn weighted_dpd_ratio<'a, I>(loans: I) -> f64
where
    I: IntoIterator<Item = &'a LoanBalanceSummary>,
{
    let (weighted, total_span) = loans.into_iter().fold((0.0, 0.0), |(w, t), s| {
        let span = s.month_span as f64;
        (w + s.dpd_ratio * span, t + span)
    });
    safe_div(weighted, total_span)
}

fn weighted_dpd_ratios(groups: &Groups) -> BTreeMap<ClientId, f64> {
    groups
        .iter()
        .map(|(client_id, loans)| {
            (*client_id, weighted_dpd_ratio(loans.iter().map(|l| l.summary)))
        })
        .collect()
}

/// True when the loan was opened inside the delinquency window and has
/// ever been reported past due.
pub fn is_recent_delinquency(loan: &LoanClientView, windows: &RecencyWindows) -> bool {
    let recent = loan
        .credit_recency
        .is_some_and(|d| d >= windows.recent_delinquency_days);
    recent && loan.summary.dpd_max > 0
}

fn recent_dpd_flags(groups: &Groups, windows: &RecencyWindows) -> BTreeMap<ClientId, u8> {
    groups
        .iter()
        .map(|(client_id, loans)| {
            let hit = loans.iter().any(|l| is_recent_delinquency(l, windows));
            (*client_id, flag(hit))
        })
        .collect()
}

// ── Aggregation ──────────────────────────────────────────────────────────────

/// Fold the per-loan view onto the loan-history summaries.
///
/// The result has exactly one row per entry of `bureau`, in ascending
/// client order. Clients without balance history are zero-filled.
pub fn aggregate(
    bureau: &[ClientBureauSummary],
    view: &[LoanClientView],
    windows: &RecencyWindows,
) -> Vec<ClientFeatureRow> {
    let base: BTreeMap<ClientId, &ClientBureauSummary> =
        bureau.iter().map(|b| (b.client_id, b)).collect();
    let groups = group_by(view, |l| l.client_id);

    let structural = structural_aggregates(&groups);
    let weighted = weighted_dpd_ratios(&groups);
    let recent = recent_dpd_flags(&groups, windows);

    let rows = LeftJoin::new(&base, |_, summary| ClientFeatureRow {
        bureau:                  (*summary).clone(),
        balance:                 ClientBalanceAggregates::default(),
        dpd_ratio_weighted_mean: 0.0,
        has_recent_dpd:          0,
    })
    .join("structural", &structural, |row, agg| row.balance = agg.clone())
    .join("weighted_dpd", &weighted, |row, ratio| row.dpd_ratio_weighted_mean = *ratio)
    .join("recent_dpd", &recent, |row, hit| row.has_recent_dpd = *hit)
    .finish();

    let unmatched = groups.keys().filter(|c| !base.contains_key(*c)).count();
    if unmatched > 0 {
        log::warn!("client_level: {unmatched} clients have balance history but no loan-history row");
    }
    log::debug!(
        "client_level: {} loans across {} clients folded onto {} client rows",
        view.len(),
        groups.len(),
        rows.len(),
    );
    rows
}
