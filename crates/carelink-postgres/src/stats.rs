//! Admin dashboard summary counts.
//!
//! One round trip: totals plus rows created in the current and previous
//! calendar month, for clinics, organizations and beneficiaries. Month
//! boundaries come from `date_trunc('month', now())` on the database clock.

use sqlx_core::query_as::query_as;
use tracing::instrument;

use crate::{PgPool, StorageResult};

/// Total plus the current/previous month creation counts for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyCount {
    pub total: i64,
    pub current_month: i64,
    pub previous_month: i64,
}

/// The full admin summary.
#[derive(Debug, Clone, Copy)]
pub struct AdminSummary {
    pub clinics: MonthlyCount,
    pub organizations: MonthlyCount,
    pub beneficiaries: MonthlyCount,
}

/// Summary count queries.
pub struct StatsStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetches all nine counts in a single statement.
    #[instrument(skip(self))]
    pub async fn admin_summary(&self) -> StorageResult<AdminSummary> {
        let row: (i64, i64, i64, i64, i64, i64, i64, i64, i64) = query_as(
            r#"
            SELECT
                (SELECT count(*) FROM clinics),
                (SELECT count(*) FROM clinics
                    WHERE created_at >= date_trunc('month', now())),
                (SELECT count(*) FROM clinics
                    WHERE created_at >= date_trunc('month', now()) - interval '1 month'
                      AND created_at < date_trunc('month', now())),
                (SELECT count(*) FROM organizations),
                (SELECT count(*) FROM organizations
                    WHERE created_at >= date_trunc('month', now())),
                (SELECT count(*) FROM organizations
                    WHERE created_at >= date_trunc('month', now()) - interval '1 month'
                      AND created_at < date_trunc('month', now())),
                (SELECT count(*) FROM profiles WHERE role = 'beneficiary'),
                (SELECT count(*) FROM profiles WHERE role = 'beneficiary'
                    AND created_at >= date_trunc('month', now())),
                (SELECT count(*) FROM profiles WHERE role = 'beneficiary'
                    AND created_at >= date_trunc('month', now()) - interval '1 month'
                    AND created_at < date_trunc('month', now()))
            "#,
        )
        .fetch_one(self.pool)
        .await?;

        Ok(AdminSummary {
            clinics: MonthlyCount {
                total: row.0,
                current_month: row.1,
                previous_month: row.2,
            },
            organizations: MonthlyCount {
                total: row.3,
                current_month: row.4,
                previous_month: row.5,
            },
            beneficiaries: MonthlyCount {
                total: row.6,
                current_month: row.7,
                previous_month: row.8,
            },
        })
    }
}
