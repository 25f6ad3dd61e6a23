use sqlx::SqlitePool;
use tracing::warn;

use crate::db;
use crate::error::AppError;
use crate::identity::{Capability, Identity};
use crate::models::{CreditSummary, CreditTotals, Term, UserInfo};

/// Credit totals are derived on every call; nothing is cached.
pub struct CreditService {
    db: SqlitePool,
}

impl CreditService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn summarize(&self, student_id: i64, current: &Term) -> Result<CreditTotals, AppError> {
        let mut conn = self.db.acquire().await?;
        let rows = db::credit::credit_rows(&mut conn, student_id).await?;
        Ok(CreditTotals::tally(&rows, current))
    }

    pub async fn summary_for(&self, identity: &Identity, current: &Term) -> Result<CreditSummary, AppError> {
        let user_info = match &identity.profile {
            Some(profile) => UserInfo {
                real_name: profile.real_name.clone(),
                student_id: profile.student_id.clone(),
                department: profile.department.clone(),
                grade: profile.grade,
            },
            None => {
                warn!("user {} has no profile, reporting username only", identity.username);
                UserInfo {
                    real_name: identity.username.clone(),
                    student_id: None,
                    department: None,
                    grade: None,
                }
            }
        };

        let totals = if identity.can(Capability::ViewCredits) {
            self.summarize(identity.user_id, current).await?
        } else {
            warn!("user {} holds no student role, credits zeroed", identity.username);
            CreditTotals::default()
        };

        Ok(CreditSummary {
            user_info,
            term: current.clone(),
            total_credits: totals.total_credits,
            semester_credits: totals.semester_credits,
        })
    }
}
