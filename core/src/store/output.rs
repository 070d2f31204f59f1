use super::{quote_ident, FeatureStore};
use crate::{
    error::{FeatureError, FeatureResult},
    feature::{column_names, FeatureRow},
    pipeline::{
        FeatureSet, CLIENT_BUREAU_TABLE, CLIENT_FEATURE_TABLE, LOAN_BALANCE_TABLE,
        PREVIOUS_APPLICATION_TABLE,
    },
};
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension};

impl FeatureStore {
    /// Materialise `rows` as table `table`, replacing any previous table of
    /// that name. The key column is the primary key; every feature is REAL.
    pub fn write_feature_table<R: FeatureRow>(&self, table: &str, rows: &[R]) -> FeatureResult<usize> {
        let key = R::key_column();
        let columns = column_names(rows);

        let mut ddl = format!("{} INTEGER PRIMARY KEY", quote_ident(key));
        for column in &columns {
            ddl.push_str(&format!(", {} REAL", quote_ident(column)));
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {t}; CREATE TABLE {t} ({ddl});",
            t = quote_ident(table),
        ))?;
        {
            let placeholders = (1..=columns.len() + 1)
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} VALUES ({placeholders})",
                quote_ident(table)
            ))?;
            for row in rows {
                let features = row.features();
                if features.len() != columns.len() {
                    return Err(FeatureError::Other(anyhow::anyhow!(
                        "{table}: row {} has {} features, table has {}",
                        row.key(),
                        features.len(),
                        columns.len()
                    )));
                }
                let values = std::iter::once(Value::Integer(row.key()))
                    .chain(features.into_iter().map(|(_, v)| Value::Real(v)));
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        log::debug!("store: wrote {} rows x {} columns to {table}", rows.len(), columns.len());
        Ok(rows.len())
    }

    /// Write every table of a run.
    pub fn write_feature_set(&self, set: &FeatureSet) -> FeatureResult<()> {
        self.write_feature_table(LOAN_BALANCE_TABLE, &set.loan_balance)?;
        self.write_feature_table(CLIENT_BUREAU_TABLE, &set.client_bureau)?;
        self.write_feature_table(PREVIOUS_APPLICATION_TABLE, &set.previous_application)?;
        self.write_feature_table(CLIENT_FEATURE_TABLE, &set.client_features)?;
        Ok(())
    }

    pub fn feature_row_count(&self, table: &str) -> FeatureResult<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Feature columns of an output table, key column excluded.
    pub fn feature_columns(&self, table: &str) -> FeatureResult<Vec<String>> {
        let mut columns = self.table_columns(table)?;
        if !columns.is_empty() {
            columns.remove(0);
        }
        Ok(columns)
    }

    /// One stored feature value. `None` when the row does not exist.
    pub fn feature_value(&self, table: &str, key: i64, column: &str) -> FeatureResult<Option<f64>> {
        let key_column = self
            .table_columns(table)?
            .into_iter()
            .next()
            .ok_or_else(|| FeatureError::MissingTable { name: table.to_string() })?;
        let value = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE {} = ?1",
                    quote_ident(column),
                    quote_ident(table),
                    quote_ident(&key_column)
                ),
                params![key],
                |row| row.get::<_, Option<f64>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }
}
