//! Cosmonaut reads and writes.
//!
//! Every write keeps `Superpower::users` in step with `Cosmonaut::superpower`.
//! The steps of one write are issued in sequence with no rollback: if a later
//! step fails, earlier ones stay applied.

use tracing::info;

use crate::cosmonaut::{Cosmonaut, CosmonautId, CosmonautInput};
use crate::error::{ApiError, ApiResult};
use crate::resolve::{CosmonautView, RequestScope};
use crate::storage::{CosmonautFilter, CosmonautPatch, SuperpowerFilter, SuperpowerPatch};
use crate::superpower::{Superpower, SuperpowerId};

/// Every cosmonaut, in insertion order.
///
/// # Errors
/// Any store error.
pub async fn list_cosmonauts(scope: &RequestScope) -> ApiResult<Vec<CosmonautView>> {
    let all = scope.stores.cosmonauts.find(&CosmonautFilter::All).await?;
    Ok(all.into_iter().map(CosmonautView::from).collect())
}

/// Creates a cosmonaut and registers it with its superpower.
///
/// # Errors
/// - `Validation` for bad input (nothing is written)
/// - `NotFound` if the superpower does not exist (nothing is written)
/// - `Store` for any store failure
pub async fn create_cosmonaut(
    scope: &RequestScope,
    input: &CosmonautInput,
) -> ApiResult<CosmonautView> {
    let fields = input.validate()?;
    if let Some(power) = fields.superpower {
        require_superpower(scope, power).await?;
    }

    let cosmonaut = scope
        .stores
        .cosmonauts
        .insert_one(Cosmonaut::new(fields))
        .await?;
    if let Some(power) = cosmonaut.superpower {
        add_user(scope, power, cosmonaut.id).await?;
    }

    info!(cosmonaut = %cosmonaut.id, superpower = ?cosmonaut.superpower, "created cosmonaut");
    Ok(cosmonaut.into())
}

/// Overwrites a cosmonaut, moving it between superpowers when its reference
/// changes.
///
/// The new superpower is looked up before anything is written, so a missing
/// target leaves the cosmonaut and both users sets untouched.
///
/// # Errors
/// - `Validation` for a bad id or input
/// - `NotFound` if the cosmonaut or the new superpower does not exist
/// - `Store` for any store failure
pub async fn modify_cosmonaut(
    scope: &RequestScope,
    id: &str,
    input: &CosmonautInput,
) -> ApiResult<CosmonautView> {
    let id: CosmonautId = id.parse()?;
    let fields = input.validate()?;

    let existing = scope
        .stores
        .cosmonauts
        .find_one(&CosmonautFilter::Id(id))
        .await?
        .ok_or_else(|| ApiError::not_found::<Cosmonaut>(id))?;

    if fields.superpower != existing.superpower {
        if let Some(new) = fields.superpower {
            require_superpower(scope, new).await?;
        }
        if let Some(old) = existing.superpower {
            scope
                .stores
                .superpowers
                .update_one(&SuperpowerFilter::Id(old), &SuperpowerPatch::PullUser(id))
                .await?;
            scope.superpowers.clear(&old);
        }
        if let Some(new) = fields.superpower {
            add_user(scope, new, id).await?;
        }
    }

    let updated = scope
        .stores
        .cosmonauts
        .update_one(&CosmonautFilter::Id(id), &CosmonautPatch::Replace(fields))
        .await?
        .ok_or_else(|| ApiError::not_found::<Cosmonaut>(id))?;

    info!(
        cosmonaut = %id,
        from = ?existing.superpower,
        to = ?updated.superpower,
        "modified cosmonaut"
    );
    Ok(updated.into())
}

/// Removes a cosmonaut after stripping it from every users set.
///
/// # Errors
/// - `Validation` for a bad id
/// - `NotFound` if the cosmonaut does not exist
/// - `Store` for any store failure
pub async fn remove_cosmonaut(scope: &RequestScope, id: &str) -> ApiResult<CosmonautView> {
    let id: CosmonautId = id.parse()?;

    let stripped = scope
        .stores
        .superpowers
        .update_many(&SuperpowerFilter::HasUser(id), &SuperpowerPatch::PullUser(id))
        .await?;
    if stripped > 0 {
        scope.superpowers.clear_all();
    }

    let removed = scope
        .stores
        .cosmonauts
        .delete_one(&CosmonautFilter::Id(id))
        .await?
        .ok_or_else(|| ApiError::not_found::<Cosmonaut>(id))?;

    info!(cosmonaut = %id, stripped, "removed cosmonaut");
    Ok(removed.into())
}

async fn require_superpower(scope: &RequestScope, id: SuperpowerId) -> ApiResult<()> {
    match scope.superpowers.load(id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found::<Superpower>(id)),
    }
}

async fn add_user(scope: &RequestScope, power: SuperpowerId, user: CosmonautId) -> ApiResult<()> {
    let updated = scope
        .stores
        .superpowers
        .update_one(&SuperpowerFilter::Id(power), &SuperpowerPatch::AddUser(user))
        .await?;
    scope.superpowers.clear(&power);
    if let Some(updated) = updated {
        scope.superpowers.prime(power, updated);
    }
    Ok(())
}
