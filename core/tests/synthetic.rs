//! Synthetic snapshot generator: shape and awkward cases.

use credit_features_core::{
    status::BalanceStatus,
    synthetic::{self, SyntheticShape, FIRST_CLIENT_ID},
};
use std::collections::BTreeSet;

#[test]
fn snapshot_respects_its_shape() {
    let shape = SyntheticShape { clients: 120, ..SyntheticShape::default() };
    let inputs = synthetic::generate(2024, &shape);

    let clients: BTreeSet<i64> = inputs.loans.iter().map(|l| l.client_id).collect();
    assert!(clients.iter().all(|c| (FIRST_CLIENT_ID..FIRST_CLIENT_ID + 120).contains(c)));
    assert!(clients.len() < shape.clients, "some clients should have no bureau loans");

    let record_ids: BTreeSet<i64> = inputs.loan_balance.iter().map(|r| r.record_id).collect();
    assert_eq!(record_ids.len(), inputs.loan_balance.len(), "record ids are unique");

    let per_client = inputs.loans.iter().fold(std::collections::BTreeMap::new(), |mut m, l| {
        *m.entry(l.client_id).or_insert(0u64) += 1;
        m
    });
    assert!(per_client.values().all(|n| *n <= shape.max_loans));
}

#[test]
fn snapshot_contains_the_awkward_cases() {
    let inputs = synthetic::generate(77, &SyntheticShape::default());

    let owned: BTreeSet<i64> = inputs.loans.iter().map(|l| l.loan_id).collect();
    let orphans = inputs
        .loan_balance
        .iter()
        .filter(|r| !owned.contains(&r.loan_id))
        .map(|r| r.loan_id)
        .collect::<BTreeSet<_>>();
    assert_eq!(orphans.len(), SyntheticShape::default().orphan_loans);

    assert!(inputs.loan_balance.iter().any(|r| r.status.is_other()));
    assert!(inputs.loans.iter().any(|l| l.debt_amount.is_none()));
    assert!(inputs.previous_applications.iter().any(|a| a.requested == Some(0.0)));
    assert!(inputs.previous_applications.iter().any(|a| a.down_payment.is_none()));

    for loan in inputs.loans.iter().filter(|l| l.is_active()) {
        if let (Some(debt), Some(credit)) = (loan.debt_amount, loan.credit_sum) {
            assert!(debt <= credit, "loan {} debt {debt} exceeds credit {credit}", loan.loan_id);
        }
    }
}
