mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use registrar::db::favorite;
use registrar::error::AppError;
use registrar::models::{EnrolledQueryParams, EnrollmentStatus, OfferingStatus};
use registrar::services::{EnrollPolicy, EnrollmentLocks, EnrollmentService};

use common::{OfferingSeed, current_students, seed_offering, setup_file_pool, setup_pool};

fn service(pool: &sqlx::SqlitePool) -> EnrollmentService {
    EnrollmentService::new(pool.clone(), Arc::new(EnrollmentLocks::new()))
}

async fn offering_status(pool: &sqlx::SqlitePool, offering_id: i64) -> OfferingStatus {
    sqlx::query_scalar("SELECT status FROM course_offerings WHERE id = ?")
        .bind(offering_id)
        .fetch_one(pool)
        .await
        .expect("offering missing")
}

#[tokio::test]
async fn test_overlapping_offering_is_rejected_with_its_name() {
    let pool = setup_pool().await;
    let mut algebra = OfferingSeed::new("CS101", &[(1, 1, 2)]);
    algebra.name = "Algebra";
    let algebra = seed_offering(&pool, algebra).await;
    let biology = seed_offering(&pool, OfferingSeed::new("CS102", &[(1, 2, 3)])).await;
    let service = service(&pool);

    service.enroll(1, algebra, EnrollPolicy::STRICT).await.unwrap();

    let err = service.enroll(1, biology, EnrollPolicy::STRICT).await.unwrap_err();
    match err {
        AppError::TimeConflict { course_name } => assert_eq!(course_name, "Algebra"),
        other => panic!("expected time conflict, got {:?}", other),
    }
    // the reserved seat is rolled back with the transaction
    assert_eq!(current_students(&pool, biology).await, 0);
    assert_eq!(current_students(&pool, algebra).await, 1);

    // dropping frees the slot
    service.drop_course(1, algebra).await.unwrap();
    service.enroll(1, biology, EnrollPolicy::STRICT).await.unwrap();
}

#[tokio::test]
async fn test_back_to_back_periods_do_not_conflict() {
    let pool = setup_pool().await;
    let morning = seed_offering(&pool, OfferingSeed::new("CS101", &[(2, 1, 2)])).await;
    let later = seed_offering(&pool, OfferingSeed::new("CS102", &[(2, 3, 4), (4, 1, 1)])).await;
    let service = service(&pool);

    service.enroll(7, morning, EnrollPolicy::STRICT).await.unwrap();
    service.enroll(7, later, EnrollPolicy::STRICT).await.unwrap();

    let listed = service
        .enrolled_courses(7, &EnrolledQueryParams::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().any(|c| c.id == later && c.class_times.len() == 2));
}

#[tokio::test]
async fn test_duplicate_enroll_is_rejected() {
    let pool = setup_pool().await;
    let offering = seed_offering(&pool, OfferingSeed::new("CS101", &[(1, 1, 2)])).await;
    let service = service(&pool);

    service.enroll(1, offering, EnrollPolicy::STRICT).await.unwrap();
    let err = service.enroll(1, offering, EnrollPolicy::STRICT).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyEnrolled));
    assert_eq!(current_students(&pool, offering).await, 1);
}

#[tokio::test]
async fn test_full_offering_reopens_after_drop() {
    let pool = setup_pool().await;
    let mut seed = OfferingSeed::new("CS101", &[(3, 5, 6)]);
    seed.max_students = 1;
    let offering = seed_offering(&pool, seed).await;
    let service = service(&pool);

    service.enroll(1, offering, EnrollPolicy::STRICT).await.unwrap();
    let err = service.enroll(2, offering, EnrollPolicy::STRICT).await.unwrap_err();
    assert!(matches!(err, AppError::CapacityExceeded));

    assert_eq!(offering_status(&pool, offering).await, OfferingStatus::Full);

    service.drop_course(1, offering).await.unwrap();
    assert_eq!(current_students(&pool, offering).await, 0);
    assert_eq!(offering_status(&pool, offering).await, OfferingStatus::Open);

    service.enroll(2, offering, EnrollPolicy::STRICT).await.unwrap();
    assert_eq!(current_students(&pool, offering).await, 1);
    assert_eq!(offering_status(&pool, offering).await, OfferingStatus::Full);
}

#[tokio::test]
async fn test_full_course_then_conflict_then_switch() {
    let pool = setup_pool().await;
    let mut a = OfferingSeed::new("CS101", &[(1, 3, 4)]);
    a.name = "Course A";
    a.max_students = 1;
    let a = seed_offering(&pool, a).await;
    let b = seed_offering(&pool, OfferingSeed::new("CS102", &[(1, 4, 5)])).await;
    let service = service(&pool);

    service.enroll(1, a, EnrollPolicy::STRICT).await.unwrap();
    assert_eq!(current_students(&pool, a).await, 1);
    assert_eq!(offering_status(&pool, a).await, OfferingStatus::Full);

    assert!(matches!(
        service.enroll(2, a, EnrollPolicy::STRICT).await.unwrap_err(),
        AppError::CapacityExceeded
    ));

    match service.enroll(1, b, EnrollPolicy::STRICT).await.unwrap_err() {
        AppError::TimeConflict { course_name } => assert_eq!(course_name, "Course A"),
        other => panic!("expected time conflict, got {:?}", other),
    }

    service.drop_course(1, a).await.unwrap();
    assert_eq!(offering_status(&pool, a).await, OfferingStatus::Open);
    service.enroll(1, b, EnrollPolicy::STRICT).await.unwrap();
    assert_eq!(current_students(&pool, b).await, 1);
}

#[tokio::test]
async fn test_drop_without_enrollment_is_not_found() {
    let pool = setup_pool().await;
    let offering = seed_offering(&pool, OfferingSeed::new("CS101", &[(1, 1, 2)])).await;
    let service = service(&pool);

    let err = service.drop_course(1, offering).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(current_students(&pool, offering).await, 0);
}

#[tokio::test]
async fn test_reenroll_keeps_dropped_history() {
    let pool = setup_pool().await;
    let offering = seed_offering(&pool, OfferingSeed::new("CS101", &[(1, 1, 2)])).await;
    let service = service(&pool);

    let first = service.enroll(1, offering, EnrollPolicy::STRICT).await.unwrap();
    let dropped = service.drop_course(1, offering).await.unwrap();
    assert_eq!(dropped.id, first.id);
    assert_eq!(dropped.status, EnrollmentStatus::Dropped);

    let second = service.enroll(1, offering, EnrollPolicy::STRICT).await.unwrap();
    assert_ne!(second.id, first.id);

    let history = service.history(1).await.unwrap();
    let statuses: Vec<_> = history.iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![EnrollmentStatus::Dropped, EnrollmentStatus::Enrolled]);
    assert_eq!(current_students(&pool, offering).await, 1);
}

#[tokio::test]
async fn test_closed_and_missing_offerings() {
    let pool = setup_pool().await;
    let offering = seed_offering(&pool, OfferingSeed::new("CS101", &[(1, 1, 2)])).await;
    sqlx::query("UPDATE course_offerings SET status = 'closed' WHERE id = ?")
        .bind(offering)
        .execute(&pool)
        .await
        .unwrap();
    let service = service(&pool);

    let err = service.enroll(1, offering, EnrollPolicy::STRICT).await.unwrap_err();
    assert!(matches!(err, AppError::OfferingClosed));

    let err = service.enroll(1, 9999, EnrollPolicy::STRICT).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_bypass_policy_skips_schedule_check() {
    let pool = setup_pool().await;
    let first = seed_offering(&pool, OfferingSeed::new("CS101", &[(5, 1, 3)])).await;
    let overlapping = seed_offering(&pool, OfferingSeed::new("CS102", &[(5, 2, 2)])).await;
    let service = service(&pool);
    let bypass = EnrollPolicy { check_conflicts: false };

    service.enroll(3, first, EnrollPolicy::STRICT).await.unwrap();
    service.enroll(3, overlapping, bypass).await.unwrap();
    assert_eq!(current_students(&pool, overlapping).await, 1);

    // capacity still applies
    let mut seed = OfferingSeed::new("CS103", &[(6, 1, 1)]);
    seed.max_students = 1;
    let tiny = seed_offering(&pool, seed).await;
    service.enroll(4, tiny, bypass).await.unwrap();
    assert!(matches!(
        service.enroll(3, tiny, bypass).await.unwrap_err(),
        AppError::CapacityExceeded
    ));
}

#[tokio::test]
async fn test_concurrent_enrolls_never_overfill() {
    let (_dir, pool) = setup_file_pool(8).await;
    let mut seed = OfferingSeed::new("CS101", &[(1, 1, 2)]);
    seed.max_students = 1;
    let offering = seed_offering(&pool, seed).await;
    let locks = Arc::new(EnrollmentLocks::new());

    let handles: Vec<_> = (1..=8)
        .map(|student_id| {
            let service = EnrollmentService::new(pool.clone(), locks.clone());
            tokio::spawn(async move { service.enroll(student_id, offering, EnrollPolicy::STRICT).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(AppError::CapacityExceeded) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(current_students(&pool, offering).await, 1);
    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE offering_id = ? AND status = 'enrolled'")
        .bind(offering)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(active, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_favorite_toggles() {
    let (_dir, pool) = setup_file_pool(16).await;
    let offering = seed_offering(&pool, OfferingSeed::new("CS101", &[(1, 1, 2)])).await;

    for expected in [true, false, true] {
        let handles: Vec<_> = (1..=16)
            .map(|student_id| {
                let pool = pool.clone();
                tokio::spawn(async move { favorite::toggle_favorite(&pool, student_id, offering).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), expected);
        }
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorite_courses WHERE offering_id = ?")
        .bind(offering)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 16);

    // one student racing themselves ends with one of each outcome
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { favorite::toggle_favorite(&pool, 99, offering).await })
        })
        .collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }
    outcomes.sort();
    assert_eq!(outcomes, vec![false, true]);
}

#[tokio::test]
async fn test_concurrent_double_submit_by_one_student() {
    let (_dir, pool) = setup_file_pool(4).await;
    let offering = seed_offering(&pool, OfferingSeed::new("CS101", &[(1, 1, 2)])).await;
    let locks = Arc::new(EnrollmentLocks::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = EnrollmentService::new(pool.clone(), locks.clone());
            tokio::spawn(async move { service.enroll(42, offering, EnrollPolicy::STRICT).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(AppError::AlreadyEnrolled) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(current_students(&pool, offering).await, 1);
}
