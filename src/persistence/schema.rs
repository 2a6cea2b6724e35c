//! Schema lifecycle for the entity table, driven by [`SchemaMode`].

use sqlx::PgPool;
use tracing::{debug, info};

use crate::config::SchemaMode;
use crate::error::{HarnessError, HarnessResult};
use crate::models::Customer;

/// Bring the entity table into the state `mode` requires, called once when the binding opens
pub async fn apply(pool: &PgPool, mode: SchemaMode) -> HarnessResult<()> {
    match mode {
        SchemaMode::Create | SchemaMode::CreateDrop => {
            drop_table(pool).await?;
            create_table(pool).await?;
        }
        SchemaMode::Update => create_table(pool).await?,
        SchemaMode::Validate => validate(pool).await?,
        SchemaMode::None => {
            if !table_exists(pool, Customer::TABLE).await? {
                return Err(missing_table(mode));
            }
        }
    }

    info!(schema_mode = %mode, table = Customer::TABLE, "Schema ready");
    Ok(())
}

/// Counterpart of [`apply`], called once when the binding closes
pub async fn release(pool: &PgPool, mode: SchemaMode) -> HarnessResult<()> {
    if mode == SchemaMode::CreateDrop {
        drop_table(pool).await?;
        debug!(table = Customer::TABLE, "Dropped table on close");
    }
    Ok(())
}

pub async fn table_exists(pool: &PgPool, table: &str) -> HarnessResult<bool> {
    sqlx::query_scalar::<_, bool>("SELECT to_regclass($1) IS NOT NULL")
        .bind(table)
        .fetch_one(pool)
        .await
        .map_err(|e| HarnessError::Binding(format!("failed to inspect schema: {e}")))
}

async fn table_columns(pool: &PgPool, table: &str) -> HarnessResult<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT column_name::text
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| HarnessError::Binding(format!("failed to inspect columns of {table}: {e}")))
}

async fn validate(pool: &PgPool) -> HarnessResult<()> {
    if !table_exists(pool, Customer::TABLE).await? {
        return Err(missing_table(SchemaMode::Validate));
    }

    let columns = table_columns(pool, Customer::TABLE).await?;
    let missing: Vec<&str> = Customer::COLUMNS
        .iter()
        .copied()
        .filter(|expected| !columns.iter().any(|c| c == expected))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(HarnessError::Binding(format!(
            "table {} is missing columns {missing:?}",
            Customer::TABLE
        )))
    }
}

async fn create_table(pool: &PgPool) -> HarnessResult<()> {
    sqlx::query(Customer::CREATE_TABLE_SQL)
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|e| HarnessError::Binding(format!("failed to create {}: {e}", Customer::TABLE)))
}

async fn drop_table(pool: &PgPool) -> HarnessResult<()> {
    sqlx::query(Customer::DROP_TABLE_SQL)
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|e| HarnessError::Binding(format!("failed to drop {}: {e}", Customer::TABLE)))
}

fn missing_table(mode: SchemaMode) -> HarnessError {
    HarnessError::Binding(format!(
        "table {} does not exist and schema mode '{mode}' does not create it",
        Customer::TABLE
    ))
}
