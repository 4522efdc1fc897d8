//! Beneficiary CRUD. Instance-level checks are scoped by the owning
//! organization; moving a beneficiary requires create rights on the target
//! organization as well.

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
use carelink_postgres::{BeneficiaryStorage, OrganizationStorage};
use carelink_postgres::profiles::{BeneficiaryFilter, BeneficiaryPatch, NewBeneficiary};

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
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub status: OrganizationStatus,
    pub gov_id: Option<String>,
    pub organization_id: Uuid,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub name: Option<String>,
    pub email: Option<String>,
    pub plan: Option<Plan>,
    pub status: Option<OrganizationStatus>,
    pub gov_id: Option<String>,
    pub organization_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Read, Subject::Beneficiaries)
        .map_err(denied)?;

    let scope_org_ids = if user.is_super_admin() {
        None
    } else {
        Some(user.org_access_ids.clone())
    };
    let filter = BeneficiaryFilter {
        name: q.name,
        gov_id: q.gov_id,
        status: q.status,
        organization_id: q.organization_id,
        scope_org_ids,
    };

    let page = PageParams::from_query(q.page, q.limit);
    let (limit, offset) = page.clamp();
    let (list, total) = BeneficiaryStorage::new(&state.pool, &state.cipher)
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
    let beneficiary = BeneficiaryStorage::new(&state.pool, &state.cipher)
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Beneficiary {id}")))?;

    Ability::for_user(&user)
        .check(Action::Read, Subject::Beneficiary(beneficiary.organization_id))
        .map_err(denied)?;

    Ok(Json(beneficiary))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Create, Subject::Beneficiary(Some(body.organization_id)))
        .map_err(denied)?;

    if body.name.trim().is_empty() || body.email.trim().is_empty() {
        return Err(ApiError::bad_request("Name and email must not be empty"));
    }

    let org_exists = OrganizationStorage::new(&state.pool, &state.cipher)
        .exists(body.organization_id)
        .await
        .map_err(storage_error)?;
    if !org_exists {
        return Err(ApiError::bad_request(format!(
            "Organization {} does not exist",
            body.organization_id
        )));
    }

    let beneficiary = BeneficiaryStorage::new(&state.pool, &state.cipher)
        .create(NewBeneficiary {
            name: body.name,
            email: body.email,
            plan: body.plan,
            status: body.status,
            gov_id: body.gov_id,
            organization_id: Some(body.organization_id),
        })
        .await
        .map_err(storage_error)?;

    Ok(Json(beneficiary))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBody>,
) -> Result<impl IntoResponse, ApiError> {
    let storage = BeneficiaryStorage::new(&state.pool, &state.cipher);
    let current = storage
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Beneficiary {id}")))?;

    let ability = Ability::for_user(&user);
    ability
        .check(Action::Update, Subject::Beneficiary(current.organization_id))
        .map_err(denied)?;

    if let Some(target_org) = body.organization_id {
        // Moving requires create rights on the destination organization.
        ability
            .check(Action::Create, Subject::Beneficiary(Some(target_org)))
            .map_err(denied)?;

        let org_exists = OrganizationStorage::new(&state.pool, &state.cipher)
            .exists(target_org)
            .await
            .map_err(storage_error)?;
        if !org_exists {
            return Err(ApiError::bad_request(format!(
                "Organization {target_org} does not exist"
            )));
        }
    }

    let beneficiary = storage
        .update(
            id,
            BeneficiaryPatch {
                name: body.name,
                email: body.email,
                plan: body.plan,
                status: body.status,
                gov_id: body.gov_id,
                organization_id: body.organization_id,
            },
        )
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Beneficiary {id}")))?;

    Ok(Json(beneficiary))
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let storage = BeneficiaryStorage::new(&state.pool, &state.cipher);
    let current = storage
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Beneficiary {id}")))?;

    Ability::for_user(&user)
        .check(Action::Delete, Subject::Beneficiary(current.organization_id))
        .map_err(denied)?;

    let deleted = storage
        .delete(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Beneficiary {id}")))?;

    Ok(Json(DeleteReceipt::new(deleted)))
}
