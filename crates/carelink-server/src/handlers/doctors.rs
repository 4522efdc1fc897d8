//! Doctor CRUD. The ability engine grants doctor management per clinic
//! admin; clinic placement is additionally checked against the caller's
//! clinic-access list, since the Doctor subject itself carries no scope.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use carelink_ability::{Ability, Action, Subject};
use carelink_api::{ApiError, DeleteReceipt, PageParams, PageResponse};
use carelink_core::UserContext;
use carelink_postgres::{ClinicStorage, DoctorStorage, SpecialtyStorage};
use carelink_postgres::profiles::{DoctorFilter, DoctorPatch, NewDoctor};

use super::{denied, storage_error};
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub name: Option<String>,
    pub specialty_id: Option<Uuid>,
    pub clinic_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
    pub name: String,
    pub email: String,
    pub gov_id: Option<String>,
    pub clinic_id: Option<Uuid>,
    #[serde(default)]
    pub specialty_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub name: Option<String>,
    pub email: Option<String>,
    pub gov_id: Option<String>,
    pub clinic_id: Option<Uuid>,
    pub specialty_ids: Option<Vec<Uuid>>,
}

/// Non-super-admins may only place doctors into clinics they administer.
fn check_clinic_placement(user: &UserContext, clinic_id: Uuid) -> Result<(), ApiError> {
    if user.is_super_admin() || user.has_clinic_access(clinic_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "No access to clinic {clinic_id}"
        )))
    }
}

/// Collapses repeated IDs, keeping first-seen order. Duplicates would make
/// the existence count undershoot the request length and would collide on
/// the specialty join table's primary key.
fn dedupe_ids(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(*id));
    ids
}

async fn validate_specialties(state: &AppState, ids: &[Uuid]) -> Result<(), ApiError> {
    if ids.is_empty() {
        return Ok(());
    }
    let known = SpecialtyStorage::new(&state.pool)
        .count_existing(ids)
        .await
        .map_err(storage_error)?;
    if known as usize != ids.len() {
        return Err(ApiError::bad_request("Unknown specialty ID in request"));
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Read, Subject::Doctor)
        .map_err(denied)?;

    let scope_clinic_ids = if user.is_super_admin() {
        None
    } else {
        Some(user.clinic_access_ids.clone())
    };
    let filter = DoctorFilter {
        name: q.name,
        specialty_id: q.specialty_id,
        clinic_id: q.clinic_id,
        scope_clinic_ids,
    };

    let page = PageParams::from_query(q.page, q.limit);
    let (limit, offset) = page.clamp();
    let (list, total) = DoctorStorage::new(&state.pool, &state.cipher)
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
        .check(Action::Read, Subject::Doctor)
        .map_err(denied)?;

    let doctor = DoctorStorage::new(&state.pool, &state.cipher)
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Doctor {id}")))?;

    if let Some(clinic_id) = doctor.clinic_id {
        check_clinic_placement(&user, clinic_id)?;
    }

    Ok(Json(doctor))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Create, Subject::Doctor)
        .map_err(denied)?;

    if body.name.trim().is_empty() || body.email.trim().is_empty() {
        return Err(ApiError::bad_request("Name and email must not be empty"));
    }

    if let Some(clinic_id) = body.clinic_id {
        check_clinic_placement(&user, clinic_id)?;
        let clinic_exists = ClinicStorage::new(&state.pool, &state.cipher)
            .exists(clinic_id)
            .await
            .map_err(storage_error)?;
        if !clinic_exists {
            return Err(ApiError::bad_request(format!(
                "Clinic {clinic_id} does not exist"
            )));
        }
    }

    let specialty_ids = dedupe_ids(body.specialty_ids);
    validate_specialties(&state, &specialty_ids).await?;

    let doctor = DoctorStorage::new(&state.pool, &state.cipher)
        .create(NewDoctor {
            name: body.name,
            email: body.email,
            gov_id: body.gov_id,
            clinic_id: body.clinic_id,
            specialty_ids,
        })
        .await
        .map_err(storage_error)?;

    Ok(Json(doctor))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateBody>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Update, Subject::Doctor)
        .map_err(denied)?;

    let storage = DoctorStorage::new(&state.pool, &state.cipher);
    let current = storage
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Doctor {id}")))?;

    if let Some(clinic_id) = current.clinic_id {
        check_clinic_placement(&user, clinic_id)?;
    }
    if let Some(target_clinic) = body.clinic_id {
        check_clinic_placement(&user, target_clinic)?;
        let clinic_exists = ClinicStorage::new(&state.pool, &state.cipher)
            .exists(target_clinic)
            .await
            .map_err(storage_error)?;
        if !clinic_exists {
            return Err(ApiError::bad_request(format!(
                "Clinic {target_clinic} does not exist"
            )));
        }
    }

    let specialty_ids = body.specialty_ids.map(dedupe_ids);
    if let Some(ids) = &specialty_ids {
        validate_specialties(&state, ids).await?;
    }

    let doctor = storage
        .update(
            id,
            DoctorPatch {
                name: body.name,
                email: body.email,
                gov_id: body.gov_id,
                clinic_id: body.clinic_id,
                specialty_ids,
            },
        )
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Doctor {id}")))?;

    Ok(Json(doctor))
}

pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ability::for_user(&user)
        .check(Action::Delete, Subject::Doctor)
        .map_err(denied)?;

    let storage = DoctorStorage::new(&state.pool, &state.cipher);
    let current = storage
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Doctor {id}")))?;

    if let Some(clinic_id) = current.clinic_id {
        check_clinic_placement(&user, clinic_id)?;
    }

    let deleted = storage
        .delete(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found(format!("Doctor {id}")))?;

    Ok(Json(DeleteReceipt::new(deleted)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_ids_keeps_first_seen_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(dedupe_ids(vec![a, b, a, b, a]), vec![a, b]);
        assert_eq!(dedupe_ids(vec![a]), vec![a]);
        assert!(dedupe_ids(vec![]).is_empty());
    }
}
