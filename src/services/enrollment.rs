use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::{catalog, enrollment};
use crate::error::AppError;
use crate::identity::{Capability, Identity};
use crate::models::{
    ClassTime, EnrolledCourse, EnrolledQueryParams, Enrollment, OfferingStatus, TimeSlot, find_conflict,
};
use crate::services::locks::EnrollmentLocks;

/// What the engine checks on enroll, decided from the caller's capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollPolicy {
    pub check_conflicts: bool,
}

impl EnrollPolicy {
    pub const STRICT: EnrollPolicy = EnrollPolicy { check_conflicts: true };

    /// Students act on their own record; anyone else needs `ManageEnrollments`,
    /// and skips the schedule check only with `BypassScheduleConflicts`.
    pub fn authorize(actor: &Identity, student_id: i64) -> Result<Self, AppError> {
        if actor.user_id == student_id && actor.can(Capability::SelfEnroll) {
            return Ok(Self::STRICT);
        }
        actor.require(Capability::ManageEnrollments)?;
        Ok(Self {
            check_conflicts: !actor.can(Capability::BypassScheduleConflicts),
        })
    }
}

pub struct EnrollmentService {
    db: SqlitePool,
    locks: Arc<EnrollmentLocks>,
}

impl EnrollmentService {
    pub fn new(db: SqlitePool, locks: Arc<EnrollmentLocks>) -> Self {
        Self { db, locks }
    }

    pub async fn enroll(
        &self,
        student_id: i64,
        offering_id: i64,
        policy: EnrollPolicy,
    ) -> Result<Enrollment, AppError> {
        let _guard = self.locks.acquire(student_id, offering_id).await;
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        if !catalog::claim_offering(&mut tx, offering_id).await? {
            return Err(AppError::NotFound(format!("offering {}", offering_id)));
        }
        let offering = catalog::find_offering(&mut tx, offering_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("offering {}", offering_id)))?;

        if enrollment::find_active(&mut tx, student_id, offering_id).await?.is_some() {
            return Err(AppError::AlreadyEnrolled);
        }
        if offering.status == OfferingStatus::Closed {
            return Err(AppError::OfferingClosed);
        }
        if offering.is_full() {
            return Err(AppError::CapacityExceeded);
        }

        if !catalog::reserve_seat(&mut tx, offering_id, now).await? {
            return Err(AppError::CapacityExceeded);
        }

        if policy.check_conflicts {
            let requested: Vec<TimeSlot> = catalog::class_times_for(&mut tx, offering_id)
                .await?
                .iter()
                .map(ClassTime::slot)
                .collect();
            let occupied = enrollment::occupied_slots(&mut tx, student_id, offering_id).await?;

            if let Some(hit) = find_conflict(&requested, &occupied) {
                let course_name = hit.course_name.clone();
                tx.rollback().await?;
                debug!(
                    "student {} blocked from offering {}: overlaps {}",
                    student_id, offering_id, course_name
                );
                return Err(AppError::TimeConflict { course_name });
            }
        }

        let created = enrollment::insert(&mut tx, student_id, offering_id, now)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => AppError::AlreadyEnrolled,
                other => AppError::Database(other),
            })?;
        tx.commit().await?;

        info!(
            "student {} enrolled in offering {} ({}/{})",
            student_id,
            offering_id,
            offering.current_students + 1,
            offering.max_students
        );
        Ok(created)
    }

    pub async fn drop_course(&self, student_id: i64, offering_id: i64) -> Result<Enrollment, AppError> {
        let _guard = self.locks.acquire(student_id, offering_id).await;
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let dropped = enrollment::mark_dropped(&mut tx, student_id, offering_id, now)
            .await?
            .ok_or_else(|| AppError::NotFound("enrollment".to_string()))?;
        catalog::release_seat(&mut tx, offering_id, now).await?;
        tx.commit().await?;

        info!("student {} dropped offering {}", student_id, offering_id);
        Ok(dropped)
    }

    pub async fn enrolled_courses(
        &self,
        student_id: i64,
        params: &EnrolledQueryParams,
    ) -> Result<Vec<EnrolledCourse>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(enrollment::list_enrolled(&mut conn, student_id, params).await?)
    }

    pub async fn history(&self, student_id: i64) -> Result<Vec<Enrollment>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(enrollment::history(&mut conn, student_id).await?)
    }
}
