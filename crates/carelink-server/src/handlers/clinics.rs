//! Clinic CRUD. Creation and deletion are super-admin operations; clinic
//! admins are explicitly denied both by the ability engine.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use carelink_ability::{Ability, Action, Subject};
use carelink_api::{ApiError, DeleteReceipt, PageParams, PageResponse};
use carelink_postgres::ClinicStorage;
use carelink_postgres::clinics::{ClinicFilter, ClinicPatch, NewClinic};

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
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
    pub name: String,
    pub address: Option<String>,
    pub gov_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub name: Option<String>,
    pub address: Option<String>,
    pub gov_id: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Read, Subject::Clinic(None))
        .map_err(denied)?;

    let scope_ids = if user.is_super_admin() {
        None
    } else {
        Some(user.clinic_access_ids.clone())
    };
    let filter = ClinicFilter {
        name: q.name,
        gov_id: q.gov_id,
        scope_ids,
    };

    let page = PageParams::from_query(q.page, q.limit);
    let (limit, offset) = page.clamp();
    let (list, total) = ClinicStorage::new(&state.pool, &state.cipher)
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
        .check(Action::Read, Subject::Clinic(Some(id)))
        .map_err(denied)?;

    let clinic = ClinicStorage::new(&state.pool, &state.cipher)
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Clinic {id}")))?;

    Ok(Json(clinic))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Create, Subject::Clinic(None))
        .map_err(denied)?;

    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("Clinic name must not be empty"));
    }

    let clinic = ClinicStorage::new(&state.pool, &state.cipher)
        .create(NewClinic {
            name: body.name,
            address: body.address,
            gov_id: body.gov_id,
        })
        .await
        .map_err(storage_error)?;

    Ok(Json(clinic))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Update, Subject::Clinic(Some(id)))
        .map_err(denied)?;

    let clinic = ClinicStorage::new(&state.pool, &state.cipher)
        .update(
            id,
            ClinicPatch {
                name: body.name,
                address: body.address,
                gov_id: body.gov_id,
            },
        )
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Clinic {id}")))?;

    Ok(Json(clinic))
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Delete, Subject::Clinic(Some(id)))
        .map_err(denied)?;

    let deleted = ClinicStorage::new(&state.pool, &state.cipher)
        .delete(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Clinic {id}")))?;

    Ok(Json(DeleteReceipt::new(deleted)))
}
