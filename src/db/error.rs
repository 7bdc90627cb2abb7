#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error(
        "Table {table} already exists with columns [{existing}] \
         but the report provides [{incoming}]"
    )]
    SchemaMismatch {
        table: String,
        existing: String,
        incoming: String,
    },
}
