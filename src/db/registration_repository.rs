use sqlx::sqlite::{SqliteArguments, SqlitePool};
use sqlx::Row;
use tracing::{debug, info, instrument};

use crate::db::DbError;
use crate::importers::excel_importer::{CellValue, RegistrationTable};
use crate::period::ReportPeriod;

// Period columns prepended to every stored row
const PERIOD_COLUMNS: [&str; 2] = ["jahr", "monat"];

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Clone)]
pub struct RegistrationRepository {
    pool: SqlitePool,
}

impl RegistrationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upsert one period's rows into `table_name` in a single transaction,
    /// creating the table and its natural-key index on first use.
    /// Returns the number of rows written.
    #[instrument(skip(self, table), fields(rows = table.rows.len()))]
    pub async fn upsert_table(
        &self,
        period: &ReportPeriod,
        table: &RegistrationTable,
        table_name: &str,
    ) -> Result<u64, DbError> {
        let types = infer_column_types(table);
        self.ensure_schema(table_name, &table.columns, &types).await?;

        let key_columns = natural_key_columns(&table.columns, &types);
        let insert_sql = build_upsert_sql(table_name, &table.columns, &key_columns);

        let mut tx = self.pool.begin().await?;
        let mut written = 0u64;
        for row in &table.rows {
            let mut query = sqlx::query(&insert_sql)
                .bind(period.year())
                .bind(period.month());
            for (value, ty) in row.iter().zip(&types) {
                query = bind_cell(query, value, *ty);
            }
            written += query.execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        info!(
            "Wrote {} rows for period {} into table {}",
            written, period, table_name
        );
        Ok(written)
    }

    /// Create table and unique index if absent; surface a schema conflict
    /// when the existing column set differs from the incoming batch
    async fn ensure_schema(
        &self,
        table_name: &str,
        columns: &[String],
        types: &[ColumnType],
    ) -> Result<(), DbError> {
        let expected = all_columns(columns);

        if let Some(existing) = self.existing_columns(table_name).await? {
            if existing != expected {
                return Err(DbError::SchemaMismatch {
                    table: table_name.to_string(),
                    existing: existing.join(", "),
                    incoming: expected.join(", "),
                });
            }
            return Ok(());
        }

        let mut definitions = vec![
            "\"jahr\" INTEGER NOT NULL".to_string(),
            "\"monat\" INTEGER NOT NULL".to_string(),
        ];
        for (name, ty) in columns.iter().zip(types) {
            definitions.push(format!("{} {}", quote_ident(name), ty.sql()));
        }
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(table_name),
            definitions.join(", ")
        );
        sqlx::query(&create).execute(&self.pool).await?;

        let key_columns = natural_key_columns(columns, types);
        let index = format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_ident(&format!("{table_name}_natural_key")),
            quote_ident(table_name),
            quoted_list(&key_columns)
        );
        sqlx::query(&index).execute(&self.pool).await?;

        debug!(
            "Created table {} with natural key ({})",
            table_name,
            key_columns.join(", ")
        );
        Ok(())
    }

    /// Column names of `table_name` in declaration order, None when absent
    async fn existing_columns(&self, table_name: &str) -> Result<Option<Vec<String>>, DbError> {
        let pragma = format!("PRAGMA table_info({})", quote_ident(table_name));
        let rows = sqlx::query(&pragma).fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            names.push(row.try_get::<String, _>("name")?);
        }
        Ok(Some(names))
    }
}

/// Infer SQLite column types from the first batch of rows
fn infer_column_types(table: &RegistrationTable) -> Vec<ColumnType> {
    (0..table.columns.len())
        .map(|col| {
            let mut saw_real = false;
            let mut saw_integer = false;
            for row in &table.rows {
                match row.get(col) {
                    Some(CellValue::Text(_)) => return ColumnType::Text,
                    Some(CellValue::Real(_)) => saw_real = true,
                    Some(CellValue::Integer(_)) => saw_integer = true,
                    Some(CellValue::Empty) | None => {}
                }
            }
            if saw_real {
                ColumnType::Real
            } else if saw_integer {
                ColumnType::Integer
            } else {
                ColumnType::Text
            }
        })
        .collect()
}

/// jahr/monat plus every text-typed column. The text columns of an FZ10
/// sheet are its dimensions (brand, model series, region); the numeric
/// columns are measures.
fn natural_key_columns(columns: &[String], types: &[ColumnType]) -> Vec<String> {
    let mut key: Vec<String> = PERIOD_COLUMNS.iter().map(|c| c.to_string()).collect();
    let dimensions: Vec<String> = columns
        .iter()
        .zip(types)
        .filter(|(_, ty)| **ty == ColumnType::Text)
        .map(|(name, _)| name.clone())
        .collect();

    if dimensions.is_empty() {
        // All-numeric sheet: fall back to the leading column
        if let Some(first) = columns.first() {
            key.push(first.clone());
        }
    } else {
        key.extend(dimensions);
    }
    key
}

fn all_columns(columns: &[String]) -> Vec<String> {
    PERIOD_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(columns.iter().cloned())
        .collect()
}

fn build_upsert_sql(table_name: &str, columns: &[String], key_columns: &[String]) -> String {
    let all = all_columns(columns);
    let placeholders = vec!["?"; all.len()].join(", ");
    let updates: Vec<String> = all
        .iter()
        .filter(|c| !key_columns.contains(c))
        .map(|c| format!("{0} = excluded.{0}", quote_ident(c)))
        .collect();

    if updates.is_empty() {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
            quote_ident(table_name),
            quoted_list(&all),
            placeholders,
            quoted_list(key_columns)
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
            quote_ident(table_name),
            quoted_list(&all),
            placeholders,
            quoted_list(key_columns),
            updates.join(", ")
        )
    }
}

// Empty cells in text columns become '' rather than NULL: NULLs never
// conflict in a SQLite unique index, which would break upsert idempotence
fn bind_cell<'q>(query: SqliteQuery<'q>, value: &CellValue, ty: ColumnType) -> SqliteQuery<'q> {
    match value {
        CellValue::Text(s) => query.bind(s.clone()),
        CellValue::Integer(i) => query.bind(*i),
        CellValue::Real(f) => query.bind(*f),
        CellValue::Empty => match ty {
            ColumnType::Text => query.bind(String::new()),
            _ => query.bind(None::<i64>),
        },
    }
}

/// SQLite identifier quoting; the verbatim German column names carry
/// spaces, umlauts and punctuation
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quoted_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}
