//! # Canonical Scenarios
//!
//! The two templates every other scenario follows. Writes happen in one unit of work and are
//! verified from a separate read-only unit of work, so checks hit durable storage rather than
//! whatever the writer still holds in memory.

use futures::FutureExt;
use tracing::debug;

use crate::error::{ensure_eq, HarnessError, HarnessResult};
use crate::models::{Customer, NewCustomer};
use crate::session::{Scenario, ScenarioContext};

pub const CREATE_AND_VERIFY: &str = "create_customer_and_verify";
pub const CREATE_THEN_DELETE_AND_VERIFY: &str = "create_then_delete_customer_and_verify";

/// Persist `candidate`, commit, and verify it from an independent unit of work
pub async fn create_and_verify(
    ctx: ScenarioContext<'_>,
    candidate: NewCustomer,
) -> HarnessResult<Customer> {
    let binding = ctx.binding();

    let mut writer = binding.new_unit_of_work().await?;
    let created = writer.persist(&candidate).await?;
    writer.commit().await?;

    let mut reader = binding.new_read_only_unit_of_work().await?;
    let rows = reader.list_all().await?;
    reader.rollback().await?;

    ensure_eq(
        "row count after create",
        ctx.baseline_count() + 1,
        rows.len() as i64,
    )?;

    let stored = rows
        .iter()
        .find(|c| c.email == candidate.email)
        .ok_or_else(|| {
            HarnessError::assertion("row with new email", &candidate.email, "no such row")
        })?;
    ensure_eq("identity of stored row", created.id, stored.id)?;
    if !stored.matches(&candidate) {
        return Err(HarnessError::assertion(
            "stored field values",
            &candidate,
            stored,
        ));
    }

    ensure_fixture_intact(ctx, &rows)?;

    debug!(customer_id = created.id, email = %created.email, "Create verified");
    Ok(created)
}

/// Persist `candidate`, remove it from a later unit of work, and verify only it is gone.
/// Returns the identity that was deleted.
pub async fn create_then_delete_and_verify(
    ctx: ScenarioContext<'_>,
    candidate: NewCustomer,
) -> HarnessResult<i64> {
    let binding = ctx.binding();

    let mut writer = binding.new_unit_of_work().await?;
    let before = writer.count().await?;
    let created = writer.persist(&candidate).await?;
    writer.commit().await?;

    // `created` is detached from this unit of work until attached
    let mut remover = binding.new_unit_of_work().await?;
    let managed = remover.attach(&created).await?;
    remover.remove(&managed).await?;
    remover.commit().await?;

    let mut reader = binding.new_read_only_unit_of_work().await?;
    let lookup = reader.find(created.id).await?;
    let rows = reader.list_all().await?;
    reader.rollback().await?;

    if let Some(found) = lookup {
        return Err(HarnessError::assertion(
            format!("customer {} after delete", created.id),
            "absent",
            found,
        ));
    }
    ensure_eq("row count after delete", before, rows.len() as i64)?;
    ensure_fixture_intact(ctx, &rows)?;

    debug!(customer_id = created.id, "Delete verified");
    Ok(created.id)
}

fn ensure_fixture_intact(ctx: ScenarioContext<'_>, rows: &[Customer]) -> HarnessResult<()> {
    let Some(fixture) = ctx.fixture() else {
        return Ok(());
    };

    match rows.iter().find(|c| c.id == fixture.id) {
        Some(row) if row == fixture => Ok(()),
        Some(row) => Err(HarnessError::assertion("baseline fixture", fixture, row)),
        None => Err(HarnessError::assertion(
            "baseline fixture",
            fixture,
            "missing",
        )),
    }
}

/// Create-and-verify with John Doe, create-then-delete with Charlie Black
pub fn canonical_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new(CREATE_AND_VERIFY, |ctx| {
            async move {
                create_and_verify(ctx, NewCustomer::new("John", "Doe", "jdoe@gmail.com"))
                    .await
                    .map(|_| ())
            }
            .boxed()
        }),
        Scenario::new(CREATE_THEN_DELETE_AND_VERIFY, |ctx| {
            async move {
                create_then_delete_and_verify(
                    ctx,
                    NewCustomer::new("Charlie", "Black", "charlie@gmail.com"),
                )
                .await
                .map(|_| ())
            }
            .boxed()
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_scenario_names() {
        let names: Vec<String> = canonical_scenarios()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec![CREATE_AND_VERIFY, CREATE_THEN_DELETE_AND_VERIFY]);
    }
}
