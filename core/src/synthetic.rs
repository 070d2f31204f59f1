//! Synthetic bureau snapshot generator.
//!
//! Produces a plausible three-table snapshot from a seed, for the
//! runner's `--synthetic` mode and for property tests. The same seed
//! and shape always produce the same snapshot.
//!
//! The generator deliberately includes the awkward cases the rollups
//! must survive: clients without loans, loans without balance history,
//! balance loans without an owner, duplicate months, unrecognised
//! statuses, missing amounts and zero requested amounts.

use crate::{
    pipeline::FeatureInputs,
    record::{
        CreditActivity, DecisionStatus, LoanBalanceRecord, LoanRecord, PreviousAppColumns,
        PreviousApplicationRecord,
    },
    rng::{RngBank, StreamRng, StreamSlot},
    status::BalanceStatus,
    types::{ApplicationId, ClientId, LoanId, RecordId},
};

pub const FIRST_CLIENT_ID: ClientId = 100_001;
const FIRST_LOAN_ID: LoanId = 5_000_001;
const FIRST_ORPHAN_LOAN_ID: LoanId = 9_000_001;
const FIRST_APPLICATION_ID: ApplicationId = 2_000_001;
const PAYMENT_TERMS: [f64; 7] = [6.0, 12.0, 18.0, 24.0, 36.0, 48.0, 60.0];

/// Shape of the generated snapshot.
#[derive(Debug, Clone)]
pub struct SyntheticShape {
    pub clients:          usize,
    pub max_loans:        u64,
    pub max_months:       i64,
    pub max_applications: u64,
    pub orphan_loans:     usize,
}

impl Default for SyntheticShape {
    fn default() -> Self {
        Self {
            clients:          500,
            max_loans:        6,
            max_months:       96,
            max_applications: 5,
            orphan_loans:     3,
        }
    }
}

/// Generate a full snapshot from `seed`.
pub fn generate(seed: u64, shape: &SyntheticShape) -> FeatureInputs {
    let bank = RngBank::new(seed);
    let mut loan_rng = bank.for_stream(StreamSlot::Loans);
    let mut balance_rng = bank.for_stream(StreamSlot::Balance);
    let mut app_rng = bank.for_stream(StreamSlot::Applications);

    let mut loans = Vec::new();
    let mut loan_balance = Vec::new();
    let mut previous_applications = Vec::new();
    let mut next_loan_id = FIRST_LOAN_ID;
    let mut next_record_id: RecordId = 1;
    let mut next_application_id = FIRST_APPLICATION_ID;

    for offset in 0..shape.clients {
        let client_id = FIRST_CLIENT_ID + offset as ClientId;

        let loan_count = loan_rng.next_u64_below(shape.max_loans + 1);
        for _ in 0..loan_count {
            let loan = synthetic_loan(&mut loan_rng, client_id, next_loan_id);
            next_loan_id += 1;

            if balance_rng.chance(0.85) {
                let closed = loan.activity == CreditActivity::Closed;
                push_history(
                    &mut balance_rng,
                    &mut loan_balance,
                    &mut next_record_id,
                    loan.loan_id,
                    closed,
                    shape.max_months,
                );
            }
            loans.push(loan);
        }

        let app_count = app_rng.next_u64_below(shape.max_applications + 1);
        for _ in 0..app_count {
            previous_applications.push(synthetic_application(
                &mut app_rng,
                client_id,
                next_application_id,
            ));
            next_application_id += 1;
        }
    }

    for i in 0..shape.orphan_loans {
        push_history(
            &mut balance_rng,
            &mut loan_balance,
            &mut next_record_id,
            FIRST_ORPHAN_LOAN_ID + i as LoanId,
            false,
            shape.max_months,
        );
    }

    log::debug!(
        "synthetic: seed={seed} clients={} loans={} balance_records={} applications={}",
        shape.clients,
        loans.len(),
        loan_balance.len(),
        previous_applications.len(),
    );

    FeatureInputs {
        loan_balance,
        loans,
        previous_applications,
        previous_columns: PreviousAppColumns::all(),
    }
}

/// A copy of `inputs` with every table's rows in a different order.
pub fn shuffled(inputs: &FeatureInputs, seed: u64) -> FeatureInputs {
    let mut rng = RngBank::new(seed).for_stream(StreamSlot::Shuffle);
    let mut out = inputs.clone();
    rng.shuffle(&mut out.loan_balance);
    rng.shuffle(&mut out.loans);
    rng.shuffle(&mut out.previous_applications);
    out
}

fn maybe(rng: &mut StreamRng, p_missing: f64, value: f64) -> Option<f64> {
    if rng.chance(p_missing) { None } else { Some(value) }
}

fn synthetic_loan(rng: &mut StreamRng, client_id: ClientId, loan_id: LoanId) -> LoanRecord {
    let roll = rng.next_f64();
    let activity = if roll < 0.40 {
        CreditActivity::Active
    } else if roll < 0.95 {
        CreditActivity::Closed
    } else {
        CreditActivity::Other
    };

    let days_credit = if rng.chance(0.03) { None } else { Some(rng.range_i64(-2_900, 0)) };
    let credit = rng.amount(10_000.0, 1_000_000.0);
    // Debt never exceeds the credit line, so the debt ratio stays in [0, 1].
    let debt = match activity {
        CreditActivity::Active => rng.amount(0.0, credit),
        _ => 0.0,
    };
    let max_overdue = {
        let roll = rng.next_f64();
        if roll < 0.70 {
            None
        } else if roll < 0.90 {
            Some(0.0)
        } else {
            Some(rng.amount(1.0, 50_000.0))
        }
    };

    LoanRecord {
        client_id,
        loan_id,
        activity,
        days_credit,
        debt_amount: maybe(rng, 0.10, debt),
        credit_sum:  maybe(rng, 0.05, credit),
        max_overdue,
    }
}

fn synthetic_status(rng: &mut StreamRng) -> BalanceStatus {
    let roll = rng.next_f64();
    match roll {
        r if r < 0.800 => BalanceStatus::Dpd0,
        r if r < 0.880 => BalanceStatus::Unknown,
        r if r < 0.950 => BalanceStatus::Dpd1,
        r if r < 0.980 => BalanceStatus::Dpd2,
        r if r < 0.990 => BalanceStatus::Dpd3,
        r if r < 0.994 => BalanceStatus::Dpd4,
        r if r < 0.998 => BalanceStatus::Dpd5,
        r if r < 0.999 => BalanceStatus::Other(Some(rng.range_i64(6, 9) as u32)),
        _ => BalanceStatus::Other(None),
    }
}

fn push_history(
    rng: &mut StreamRng,
    out: &mut Vec<LoanBalanceRecord>,
    next_record_id: &mut RecordId,
    loan_id: LoanId,
    closed: bool,
    max_months: i64,
) {
    let months = rng.range_i64(1, max_months.max(1));
    let latest = if closed { rng.range_i64(-24, 0) } else { 0 };
    let closed_months = if closed { rng.range_i64(1, months) } else { 0 };

    for i in 0..months {
        let month_offset = latest - i;
        let status = if i < closed_months { BalanceStatus::Closed } else { synthetic_status(rng) };
        out.push(LoanBalanceRecord {
            record_id: *next_record_id,
            loan_id,
            month_offset,
            status,
        });
        *next_record_id += 1;

        // Occasional duplicate report for the same month.
        if rng.chance(0.01) {
            out.push(LoanBalanceRecord {
                record_id: *next_record_id,
                loan_id,
                month_offset,
                status: synthetic_status(rng),
            });
            *next_record_id += 1;
        }
    }
}

fn synthetic_application(
    rng: &mut StreamRng,
    client_id: ClientId,
    application_id: ApplicationId,
) -> PreviousApplicationRecord {
    let roll = rng.next_f64();
    let decision = if roll < 0.62 {
        DecisionStatus::Approved
    } else if roll < 0.80 {
        DecisionStatus::Refused
    } else {
        DecisionStatus::Other
    };

    let requested = if rng.chance(0.05) { 0.0 } else { rng.amount(5_000.0, 500_000.0) };
    let granted = match decision {
        DecisionStatus::Approved => (requested * (0.8 + 0.4 * rng.next_f64()) * 100.0).round() / 100.0,
        _ => 0.0,
    };
    let term = PAYMENT_TERMS[rng.next_u64_below(PAYMENT_TERMS.len() as u64) as usize];
    let annuity = rng.amount(1_000.0, 60_000.0);
    let down_payment = rng.amount(0.0, 20_000.0);

    PreviousApplicationRecord {
        client_id,
        application_id,
        decision,
        days_decision: if rng.chance(0.02) { None } else { Some(rng.range_i64(-2_900, -1)) },
        requested:     maybe(rng, 0.05, requested),
        granted:       maybe(rng, 0.05, granted),
        annuity:       maybe(rng, 0.20, annuity),
        down_payment:  maybe(rng, 0.50, down_payment),
        payment_count: maybe(rng, 0.20, term),
    }
}
