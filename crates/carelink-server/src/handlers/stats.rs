//! Admin dashboard summary.

use axum::{Json, extract::State, response::IntoResponse};

use carelink_ability::{Ability, Action, Subject};
use carelink_api::{ApiError, StatEntry};
use carelink_postgres::StatsStorage;
use carelink_postgres::stats::MonthlyCount;

use super::{denied, storage_error};
use crate::extract::CurrentUser;
use crate::state::AppState;

/// The displayed value is the all-time total; the change compares this
/// month's intake against last month's.
fn entry(kind: &str, counts: MonthlyCount) -> StatEntry {
    let monthly_delta = counts.current_month - counts.previous_month;
    StatEntry::from_counts(kind, counts.total, counts.total - monthly_delta)
}

pub async fn admin_summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    // Platform-wide counts; only the super admin's blanket rule grants this.
    Ability::for_user(&user)
        .check(Action::Manage, Subject::Profile)
        .map_err(denied)?;

    let summary = StatsStorage::new(&state.pool)
        .admin_summary()
        .await
        .map_err(storage_error)?;

    let body = vec![
        entry("total_clinics", summary.clinics),
        entry("total_organizations", summary.organizations),
        entry("total_beneficiaries", summary.beneficiaries),
    ];

    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use carelink_api::ChangeType;

    #[test]
    fn test_entry_growth_is_positive() {
        let e = entry(
            "total_clinics",
            MonthlyCount {
                total: 40,
                current_month: 7,
                previous_month: 3,
            },
        );
        assert_eq!(e.value, 40);
        assert_eq!(e.change, 4);
        assert_eq!(e.change_type, ChangeType::Positive);
    }

    #[test]
    fn test_entry_slowdown_is_negative() {
        let e = entry(
            "total_clinics",
            MonthlyCount {
                total: 40,
                current_month: 2,
                previous_month: 9,
            },
        );
        assert_eq!(e.change, 7);
        assert_eq!(e.change_type, ChangeType::Negative);
    }
}
