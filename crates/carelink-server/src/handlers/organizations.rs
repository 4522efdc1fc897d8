//! Organization CRUD.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use carelink_ability::{Ability, Action, Subject};
use carelink_api::{ApiError, DeleteReceipt, PageParams, PageResponse};
use carelink_core::{OrganizationStatus, Plan};
use carelink_postgres::OrganizationStorage;
use carelink_postgres::organizations::{NewOrganization, OrganizationFilter, OrganizationPatch};

use super::{denied, storage_error};
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub name: Option<String>,
    pub gov_id: Option<String>,
    pub status: Option<OrganizationStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
    pub name: String,
    #[serde(default)]
    pub status: OrganizationStatus,
    #[serde(default)]
    pub plan: Plan,
    pub gov_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub name: Option<String>,
    pub status: Option<OrganizationStatus>,
    pub plan: Option<Plan>,
    pub gov_id: Option<String>,
}

impl UpdateBody {
    fn into_patch(self) -> OrganizationPatch {
        OrganizationPatch {
            name: self.name,
            status: self.status,
            plan: self.plan,
            gov_id: self.gov_id,
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ability = Ability::for_user(&user);
    ability
        .check(Action::Read, Subject::Organization(None))
        .map_err(denied)?;

    let scope_ids = if user.is_super_admin() {
        None
    } else {
        Some(user.org_access_ids.clone())
    };
    let filter = OrganizationFilter {
        name: q.name,
        gov_id: q.gov_id,
        status: q.status,
        scope_ids,
    };

    let page = PageParams::from_query(q.page, q.limit);
    let (limit, offset) = page.clamp();
    let (list, total) = OrganizationStorage::new(&state.pool, &state.cipher)
        .list(&filter, limit, offset)
        .await
        .map_err(storage_error)?;

    Ok(Json(PageResponse::new(list, total, page)))
}

pub async fn get_one(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Read, Subject::Organization(Some(id)))
        .map_err(denied)?;

    let org = OrganizationStorage::new(&state.pool, &state.cipher)
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Organization {id}")))?;

    Ok(Json(org))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Create, Subject::Organization(None))
        .map_err(denied)?;

    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("Organization name must not be empty"));
    }

    let org = OrganizationStorage::new(&state.pool, &state.cipher)
        .create(NewOrganization {
            name: body.name,
            status: body.status,
            plan: body.plan,
            gov_id: body.gov_id,
        })
        .await
        .map_err(storage_error)?;

    Ok(Json(org))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Update, Subject::Organization(Some(id)))
        .map_err(denied)?;

    let patch = body.into_patch();
    if patch.is_empty() {
        return Err(ApiError::bad_request(
            "Update body must set at least one field",
        ));
    }

    let org = OrganizationStorage::new(&state.pool, &state.cipher)
        .update(id, patch)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Organization {id}")))?;

    Ok(Json(org))
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Delete, Subject::Organization(Some(id)))
        .map_err(denied)?;

    let deleted = OrganizationStorage::new(&state.pool, &state.cipher)
        .delete(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Organization {id}")))?;

    Ok(Json(DeleteReceipt::new(deleted)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_update_body_yields_empty_patch() {
        // An all-None body is rejected with 400 before touching storage.
        assert!(UpdateBody::default().into_patch().is_empty());

        let body = UpdateBody {
            name: Some("Acme Health".to_string()),
            ..Default::default()
        };
        assert!(!body.into_patch().is_empty());
    }
}
