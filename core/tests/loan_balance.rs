//! Loan-balance rollup: monthly status history to one row per loan.

use credit_features_core::{
    balance::{self, LoanBalanceSummary},
    feature::FeatureRow,
    record::LoanBalanceRecord,
    status::BalanceStatus,
};

fn rec(record_id: i64, loan_id: i64, month_offset: i64, status: &str) -> LoanBalanceRecord {
    LoanBalanceRecord {
        record_id,
        loan_id,
        month_offset,
        status: BalanceStatus::parse(status),
    }
}

fn feature(row: &LoanBalanceSummary, column: &str) -> f64 {
    row.features()
        .into_iter()
        .find(|(name, _)| name == column)
        .map(|(_, v)| v)
        .unwrap_or_else(|| panic!("missing column {column}"))
}

#[test]
fn single_record_loan_has_zero_span_and_binary_ratio() {
    let clean = balance::roll_up(&[rec(1, 10, -4, "0")]);
    let late = balance::roll_up(&[rec(1, 11, -4, "3")]);

    assert_eq!(clean.len(), 1);
    assert_eq!(clean[0].month_span, 0);
    assert_eq!(clean[0].oldest_month, -4);
    assert_eq!(clean[0].most_recent_month, -4);
    assert_eq!(clean[0].dpd_ratio, 0.0, "on-time single month has ratio 0");

    assert_eq!(late[0].month_span, 0);
    assert_eq!(late[0].dpd_ratio, 1.0, "late single month has ratio 1");
    assert_eq!(late[0].dpd_max, 3);
    assert_eq!(late[0].has_positive_dpd, 1);
}

#[test]
fn one_row_per_loan_in_key_order() {
    let records = vec![
        rec(1, 30, 0, "0"),
        rec(2, 10, 0, "0"),
        rec(3, 30, -1, "1"),
        rec(4, 20, 0, "C"),
        rec(5, 10, -1, "X"),
    ];
    let rows = balance::roll_up(&records);

    let ids: Vec<i64> = rows.iter().map(|r| r.loan_id).collect();
    assert_eq!(ids, vec![10, 20, 30]);

    let total: u64 = rows.iter().map(|r| r.record_count).sum();
    assert_eq!(total as usize, records.len(), "every record is counted exactly once");
}

#[test]
fn non_ordinal_statuses_stay_out_of_dpd_statistics() {
    let records = vec![
        rec(1, 7, 0, "C"),
        rec(2, 7, -1, "X"),
        rec(3, 7, -2, "2"),
        rec(4, 7, -3, "0"),
        rec(5, 7, -4, "Z"),
    ];
    let row = &balance::roll_up(&records)[0];

    assert_eq!(row.record_count, 5);
    assert_eq!(row.dpd_max, 2);
    assert_eq!(row.dpd_mean, 1.0, "mean is over the two ordinal months only");
    assert_eq!(row.dpd_ratio, 0.2, "ratio denominator is the full record count");
    assert_eq!(row.status_count(BalanceStatus::Other(None)), 1);
    assert_eq!(row.month_span, 4);
}

#[test]
fn out_of_range_ordinal_pivots_to_other_but_counts_as_delinquent() {
    let records = vec![rec(1, 6, 0, "7"), rec(2, 6, -1, "0")];
    let row = &balance::roll_up(&records)[0];

    assert_eq!(row.dpd_max, 7);
    assert_eq!(row.has_positive_dpd, 1);
    assert_eq!(row.dpd_ratio, 0.5);
    assert_eq!(row.dpd_mean, 3.5);
    assert_eq!(row.status_count(BalanceStatus::Other(None)), 1, "\"7\" still pivots into OTHER");
    assert_eq!(feature(row, "BUREAU_BALANCE_STATUS_OTHER_RATIO"), 0.5);
    assert_eq!(feature(row, "BUREAU_BALANCE_RECENT_STATUS_OTHER"), 1.0, "month 0 is the \"7\" record");
}

#[test]
fn loan_without_ordinal_months_has_zero_dpd() {
    let records = vec![rec(1, 8, 0, "C"), rec(2, 8, -1, "C"), rec(3, 8, -2, "X")];
    let row = &balance::roll_up(&records)[0];

    assert_eq!(row.dpd_max, 0);
    assert_eq!(row.dpd_mean, 0.0);
    assert_eq!(row.has_positive_dpd, 0);
    assert_eq!(row.dpd_ratio, 0.0);
    assert_eq!(row.status_ratio(BalanceStatus::Closed), 2.0 / 3.0);
}

#[test]
fn status_pivot_covers_fixed_vocabulary() {
    let records = vec![rec(1, 5, 0, "0"), rec(2, 5, -1, "0"), rec(3, 5, -2, "1"), rec(4, 5, -3, "X")];
    let row = &balance::roll_up(&records)[0];

    assert_eq!(feature(row, "BUREAU_BALANCE_STATUS_0_COUNT"), 2.0);
    assert_eq!(feature(row, "BUREAU_BALANCE_STATUS_0_RATIO"), 0.5);
    assert_eq!(feature(row, "BUREAU_BALANCE_STATUS_1_RATIO"), 0.25);
    assert_eq!(feature(row, "BUREAU_BALANCE_STATUS_X_RATIO"), 0.25);
    assert_eq!(feature(row, "BUREAU_BALANCE_STATUS_5_COUNT"), 0.0, "unseen values still get a column");
    assert_eq!(feature(row, "BUREAU_BALANCE_STATUS_OTHER_RATIO"), 0.0);

    let ratio_sum: f64 = BalanceStatus::ALL.iter().map(|s| row.status_ratio(*s)).sum();
    assert!((ratio_sum - 1.0).abs() < 1e-12, "status ratios sum to 1, got {ratio_sum}");
}

#[test]
fn numeric_text_statuses_decode_as_ordinals() {
    let records = vec![rec(1, 9, 0, "4.0"), rec(2, 9, -1, " 1 ")];
    let row = &balance::roll_up(&records)[0];
    assert_eq!(row.dpd_max, 4);
    assert_eq!(row.status_count(BalanceStatus::Other(None)), 0);
}

#[test]
fn most_recent_tie_breaks_on_smallest_record_id() {
    let forward = vec![rec(10, 1, 0, "2"), rec(11, 1, 0, "0"), rec(12, 1, -1, "5")];
    let mut backward = forward.clone();
    backward.reverse();

    let a = &balance::roll_up(&forward)[0];
    let b = &balance::roll_up(&backward)[0];

    assert_eq!(a.most_recent_status, Some(BalanceStatus::Dpd2), "record 10 wins the month-0 tie");
    assert_eq!(a, b, "row order must not change the summary");
    assert_eq!(feature(a, "BUREAU_BALANCE_RECENT_STATUS_2"), 1.0);
    assert_eq!(feature(a, "BUREAU_BALANCE_RECENT_STATUS_0"), 0.0);
}

#[test]
fn exported_columns_are_stable() {
    let rows = balance::roll_up(&[rec(1, 1, 0, "0"), rec(2, 2, -3, "C")]);
    let first: Vec<String> = rows[0].features().into_iter().map(|(n, _)| n).collect();
    let second: Vec<String> = rows[1].features().into_iter().map(|(n, _)| n).collect();

    assert_eq!(first, second);
    assert_eq!(first.len(), 4 + 9 + 9 + 4 + 9);
    assert_eq!(LoanBalanceSummary::key_column(), "SK_ID_BUREAU");
    assert!(first.iter().all(|c| c.starts_with("BUREAU_BALANCE_")));
}
