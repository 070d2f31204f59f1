use super::{quote_ident, FeatureStore};
use crate::{
    config::{DecisionLabels, FeatureConfig, LoanLabels},
    error::{FeatureError, FeatureResult},
    pipeline::FeatureInputs,
    ratio::{coerce_f64, coerce_i64, whole_number},
    record::{
        CreditActivity, DecisionStatus, LoanBalanceRecord, LoanRecord, PreviousAppColumns,
        PreviousApplicationRecord,
    },
    status::BalanceStatus,
};
use rusqlite::{params, types::Value, Connection};

pub const BALANCE_TABLE: &str = "bureau_balance";
pub const BUREAU_TABLE: &str = "bureau";
pub const PREVIOUS_APPLICATION_SOURCE: &str = "previous_application";

const BALANCE_COLUMNS: [&str; 3] = ["SK_ID_BUREAU", "MONTHS_BALANCE", "STATUS"];
const BUREAU_COLUMNS: [&str; 7] = [
    "SK_ID_CURR",
    "SK_ID_BUREAU",
    "CREDIT_ACTIVE",
    "DAYS_CREDIT",
    "AMT_CREDIT_SUM_DEBT",
    "AMT_CREDIT_SUM",
    "AMT_CREDIT_MAX_OVERDUE",
];
const PREVIOUS_REQUIRED: [&str; 6] = [
    "SK_ID_CURR",
    "SK_ID_PREV",
    "NAME_CONTRACT_STATUS",
    "DAYS_DECISION",
    "AMT_APPLICATION",
    "AMT_CREDIT",
];

// ── Coercion ───────────────────────────────────────────────────
//
// Every business value is read as a raw SQLite value and coerced here.
// A value that does not coerce becomes missing; it never fails the load.

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Real(r) if r.is_finite() => Some(*r),
        Value::Text(s) => coerce_f64(s),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Real(r) => whole_number(*r),
        Value::Text(s) => coerce_i64(s),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => match whole_number(*r) {
            Some(i) => i.to_string(),
            None => r.to_string(),
        },
        Value::Text(s) => s.clone(),
        Value::Null | Value::Blob(_) => String::new(),
    }
}

fn value_at(row: &[Value], index: Option<usize>) -> Option<f64> {
    index.and_then(|i| as_f64(&row[i]))
}

fn real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

impl FeatureStore {
    /// Fail unless `table` exists with every `required` column.
    /// Returns the table's full column list.
    fn require_columns(&self, table: &str, required: &[&str]) -> FeatureResult<Vec<String>> {
        if !self.table_exists(table)? {
            return Err(FeatureError::MissingTable { name: table.to_string() });
        }
        let columns = self.table_columns(table)?;
        for column in required {
            if !columns.iter().any(|c| c == column) {
                return Err(FeatureError::MissingColumn {
                    table:  table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(columns)
    }

    /// Read every row of `table` as raw values, `columns` in order.
    fn raw_rows(&self, table: &str, columns: &[&str]) -> FeatureResult<Vec<Vec<Value>>> {
        let select = columns
            .iter()
            .map(|c| if *c == "rowid" { c.to_string() } else { quote_ident(c) })
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {select} FROM {} ORDER BY rowid ASC",
            quote_ident(table)
        ))?;
        let width = columns.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width).map(|i| row.get::<_, Value>(i)).collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Loaders ────────────────────────────────────────────────

    /// Load all three source tables.
    pub fn load_inputs(&self, config: &FeatureConfig) -> FeatureResult<FeatureInputs> {
        let loan_balance = self.load_loan_balance()?;
        let loans = self.load_loans(&config.loan_labels)?;
        let (previous_applications, previous_columns) =
            self.load_previous_applications(&config.decision_labels)?;
        Ok(FeatureInputs {
            loan_balance,
            loans,
            previous_applications,
            previous_columns,
        })
    }

    pub fn load_loan_balance(&self) -> FeatureResult<Vec<LoanBalanceRecord>> {
        self.require_columns(BALANCE_TABLE, &BALANCE_COLUMNS)?;
        let rows = self.raw_rows(BALANCE_TABLE, &["rowid", "SK_ID_BUREAU", "MONTHS_BALANCE", "STATUS"])?;

        let total = rows.len();
        let records: Vec<_> = rows
            .iter()
            .filter_map(|v| {
                Some(LoanBalanceRecord {
                    record_id:    as_i64(&v[0])?,
                    loan_id:      as_i64(&v[1])?,
                    month_offset: as_i64(&v[2])?,
                    status:       BalanceStatus::parse(&as_text(&v[3])),
                })
            })
            .collect();

        log_skipped(BALANCE_TABLE, total, records.len());
        Ok(records)
    }

    pub fn load_loans(&self, labels: &LoanLabels) -> FeatureResult<Vec<LoanRecord>> {
        self.require_columns(BUREAU_TABLE, &BUREAU_COLUMNS)?;
        let rows = self.raw_rows(BUREAU_TABLE, &BUREAU_COLUMNS)?;

        let total = rows.len();
        let loans: Vec<_> = rows
            .iter()
            .filter_map(|v| {
                Some(LoanRecord {
                    client_id:   as_i64(&v[0])?,
                    loan_id:     as_i64(&v[1])?,
                    activity:    CreditActivity::classify(&as_text(&v[2]), labels),
                    days_credit: as_i64(&v[3]),
                    debt_amount: as_f64(&v[4]),
                    credit_sum:  as_f64(&v[5]),
                    max_overdue: as_f64(&v[6]),
                })
            })
            .collect();

        log_skipped(BUREAU_TABLE, total, loans.len());
        Ok(loans)
    }

    /// Load previous applications. Optional columns absent from the table
    /// are reported in the returned `PreviousAppColumns`, not as errors.
    pub fn load_previous_applications(
        &self,
        labels: &DecisionLabels,
    ) -> FeatureResult<(Vec<PreviousApplicationRecord>, PreviousAppColumns)> {
        let table = PREVIOUS_APPLICATION_SOURCE;
        let present = self.require_columns(table, &PREVIOUS_REQUIRED)?;
        let has = |name: &str| present.iter().any(|c| c == name);
        let columns = PreviousAppColumns {
            annuity:       has("AMT_ANNUITY"),
            down_payment:  has("AMT_DOWN_PAYMENT"),
            payment_count: has("CNT_PAYMENT"),
        };
        for missing in columns.missing() {
            log::warn!("store: {table} has no {missing} column");
        }

        let mut select: Vec<&str> = PREVIOUS_REQUIRED.to_vec();
        let optional = [
            ("AMT_ANNUITY", columns.annuity),
            ("AMT_DOWN_PAYMENT", columns.down_payment),
            ("CNT_PAYMENT", columns.payment_count),
        ];
        let mut slot = [None; 3];
        for (i, (name, present)) in optional.iter().enumerate() {
            if *present {
                slot[i] = Some(select.len());
                select.push(*name);
            }
        }
        let rows = self.raw_rows(table, &select)?;

        let total = rows.len();
        let applications: Vec<_> = rows
            .iter()
            .filter_map(|v| {
                Some(PreviousApplicationRecord {
                    client_id:      as_i64(&v[0])?,
                    application_id: as_i64(&v[1])?,
                    decision:       DecisionStatus::classify(&as_text(&v[2]), labels),
                    days_decision:  as_i64(&v[3]),
                    requested:      as_f64(&v[4]),
                    granted:        as_f64(&v[5]),
                    annuity:        value_at(v, slot[0]),
                    down_payment:   value_at(v, slot[1]),
                    payment_count:  value_at(v, slot[2]),
                })
            })
            .collect();

        log_skipped(table, total, applications.len());
        Ok((applications, columns))
    }

    // ── Writers ────────────────────────────────────────────────

    /// Append all three source tables in one transaction.
    /// Tables must already exist (see `migrate`).
    pub fn insert_inputs(&self, inputs: &FeatureInputs, config: &FeatureConfig) -> FeatureResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        write_inputs(&tx, inputs, config)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace the contents of all three source tables with `inputs`.
    /// Either every table is replaced or none is.
    pub fn replace_inputs(&self, inputs: &FeatureInputs, config: &FeatureConfig) -> FeatureResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let mut cleared = 0usize;
        for table in [BALANCE_TABLE, BUREAU_TABLE, PREVIOUS_APPLICATION_SOURCE] {
            cleared += tx.execute(&format!("DELETE FROM {}", quote_ident(table)), [])?;
        }
        write_inputs(&tx, inputs, config)?;
        tx.commit()?;

        if cleared > 0 {
            log::info!("store: replaced {cleared} existing source rows");
        }
        Ok(())
    }
}

fn write_inputs(conn: &Connection, inputs: &FeatureInputs, config: &FeatureConfig) -> FeatureResult<()> {
    write_loan_balance(conn, &inputs.loan_balance)?;
    write_loans(conn, &inputs.loans, &config.loan_labels)?;
    write_previous_applications(conn, &inputs.previous_applications, &config.decision_labels)?;
    log::debug!("store: wrote source snapshot {:?}", inputs.row_counts());
    Ok(())
}

fn write_loan_balance(conn: &Connection, records: &[LoanBalanceRecord]) -> FeatureResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO bureau_balance (record_id, SK_ID_BUREAU, MONTHS_BALANCE, STATUS)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for r in records {
        stmt.execute(params![r.record_id, r.loan_id, r.month_offset, r.status.source_text()])?;
    }
    Ok(())
}

fn write_loans(conn: &Connection, loans: &[LoanRecord], labels: &LoanLabels) -> FeatureResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO bureau (
            SK_ID_CURR, SK_ID_BUREAU, CREDIT_ACTIVE, DAYS_CREDIT,
            AMT_CREDIT_SUM_DEBT, AMT_CREDIT_SUM, AMT_CREDIT_MAX_OVERDUE
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for l in loans {
        stmt.execute(params![
            l.client_id,
            l.loan_id,
            l.activity.label(labels),
            l.days_credit,
            real(l.debt_amount),
            real(l.credit_sum),
            real(l.max_overdue),
        ])?;
    }
    Ok(())
}

fn write_previous_applications(
    conn: &Connection,
    applications: &[PreviousApplicationRecord],
    labels: &DecisionLabels,
) -> FeatureResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO previous_application (
            SK_ID_CURR, SK_ID_PREV, NAME_CONTRACT_STATUS, DAYS_DECISION,
            AMT_APPLICATION, AMT_CREDIT, AMT_ANNUITY, AMT_DOWN_PAYMENT, CNT_PAYMENT
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for a in applications {
        stmt.execute(params![
            a.client_id,
            a.application_id,
            a.decision.label(labels),
            a.days_decision,
            real(a.requested),
            real(a.granted),
            real(a.annuity),
            real(a.down_payment),
            real(a.payment_count),
        ])?;
    }
    Ok(())
}

fn log_skipped(table: &str, total: usize, kept: usize) {
    if kept < total {
        log::warn!("store: {table}: skipped {} rows with unusable keys", total - kept);
    }
    log::debug!("store: loaded {kept} rows from {table}");
}
