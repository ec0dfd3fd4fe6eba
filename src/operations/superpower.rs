//! Superpower reads and writes.

use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::resolve::{RequestScope, SuperpowerView};
use crate::storage::{CosmonautFilter, CosmonautPatch, SuperpowerFilter, SuperpowerPatch};
use crate::superpower::{Superpower, SuperpowerId, SuperpowerInput};

/// Every superpower, in insertion order.
///
/// # Errors
/// Any store error.
pub async fn list_superpowers(scope: &RequestScope) -> ApiResult<Vec<SuperpowerView>> {
    let all = scope.stores.superpowers.find(&SuperpowerFilter::All).await?;
    Ok(all.into_iter().map(SuperpowerView::from).collect())
}

/// Creates a superpower with no users.
///
/// # Errors
/// - `Validation` for a blank name
/// - `Store` for any store failure
pub async fn create_superpower(
    scope: &RequestScope,
    input: &SuperpowerInput,
) -> ApiResult<SuperpowerView> {
    let name = input.validate()?;
    let superpower = scope
        .stores
        .superpowers
        .insert_one(Superpower::new(name))
        .await?;
    scope.superpowers.prime(superpower.id, superpower.clone());

    info!(superpower = %superpower.id, name = %superpower.name, "created superpower");
    Ok(superpower.into())
}

/// Renames a superpower. Its users are left as they are.
///
/// # Errors
/// - `Validation` for a bad id or a blank name
/// - `NotFound` if the superpower does not exist
/// - `Store` for any store failure
pub async fn modify_superpower(
    scope: &RequestScope,
    id: &str,
    input: &SuperpowerInput,
) -> ApiResult<SuperpowerView> {
    let id: SuperpowerId = id.parse()?;
    let name = input.validate()?;

    let updated = scope
        .stores
        .superpowers
        .update_one(&SuperpowerFilter::Id(id), &SuperpowerPatch::SetName(name))
        .await?
        .ok_or_else(|| ApiError::not_found::<Superpower>(id))?;
    scope.superpowers.clear(&id);
    scope.superpowers.prime(id, updated.clone());

    info!(superpower = %id, name = %updated.name, "modified superpower");
    Ok(updated.into())
}

/// Removes a superpower after clearing every cosmonaut's reference to it.
///
/// # Errors
/// - `Validation` for a bad id
/// - `NotFound` if the superpower does not exist
/// - `Store` for any store failure
pub async fn remove_superpower(scope: &RequestScope, id: &str) -> ApiResult<SuperpowerView> {
    let id: SuperpowerId = id.parse()?;

    let released = scope
        .stores
        .cosmonauts
        .update_many(&CosmonautFilter::SuperpowerIs(id), &CosmonautPatch::ClearSuperpower)
        .await?;

    let removed = scope
        .stores
        .superpowers
        .delete_one(&SuperpowerFilter::Id(id))
        .await?
        .ok_or_else(|| ApiError::not_found::<Superpower>(id))?;
    scope.superpowers.clear(&id);

    info!(superpower = %id, released, "removed superpower");
    Ok(removed.into())
}
