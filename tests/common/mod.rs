#![allow(dead_code)]

use registrar::db;
use registrar::identity::dto::IdentityRecord;
use registrar::identity::{Profile, Role};
use registrar::models::{CourseType, CreateOfferingRequest, NewClassTime, NewOfferingTeacher, TeacherRole};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub async fn setup_pool() -> SqlitePool {
    let pool = db::connect("sqlite::memory:", 1)
        .await
        .expect("Failed to create database");
    db::MIGRATOR.run(&pool).await.expect("Failed to run migrations");
    pool
}

/// File-backed database so several pooled connections share one store.
/// Keep the `TempDir` alive for as long as the pool is used.
pub async fn setup_file_pool(max_connections: u32) -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("registrar.db").display());
    let pool = db::connect(&url, max_connections)
        .await
        .expect("Failed to create database");
    db::MIGRATOR.run(&pool).await.expect("Failed to run migrations");
    (dir, pool)
}

pub struct OfferingSeed<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub course_type: CourseType,
    pub credits: i64,
    pub academic_year: &'a str,
    pub semester: i64,
    pub max_students: i64,
    /// (weekday, start_period, end_period)
    pub slots: &'a [(i64, i64, i64)],
}

impl<'a> OfferingSeed<'a> {
    pub fn new(code: &'a str, slots: &'a [(i64, i64, i64)]) -> Self {
        Self {
            code,
            name: code,
            course_type: CourseType::Required,
            credits: 3,
            academic_year: "114",
            semester: 1,
            max_students: 30,
            slots,
        }
    }

    pub fn request(&self) -> CreateOfferingRequest {
        CreateOfferingRequest {
            course_code: self.code.to_string(),
            course_name: self.name.to_string(),
            course_name_en: None,
            course_type: self.course_type,
            credits: self.credits,
            description: String::new(),
            academic_year: self.academic_year.to_string(),
            semester: self.semester,
            department: "Computer Science".to_string(),
            grade_level: 1,
            max_students: self.max_students,
            notes: String::new(),
            class_times: self
                .slots
                .iter()
                .map(|&(weekday, start_period, end_period)| NewClassTime {
                    weekday,
                    start_period,
                    end_period,
                    classroom: "E101".to_string(),
                })
                .collect(),
            teachers: vec![NewOfferingTeacher {
                teacher_id: 900,
                teacher_name: "Prof. Chen".to_string(),
                role: TeacherRole::Main,
            }],
        }
    }
}

pub async fn seed_offering(pool: &SqlitePool, seed: OfferingSeed<'_>) -> i64 {
    db::catalog::create_offering(pool, seed.request())
        .await
        .expect("Failed to seed offering")
        .id
}

pub async fn current_students(pool: &SqlitePool, offering_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT current_students FROM course_offerings WHERE id = ?")
        .bind(offering_id)
        .fetch_one(pool)
        .await
        .expect("offering missing")
}

pub fn student(user_id: i64) -> IdentityRecord {
    IdentityRecord {
        user_id,
        username: format!("s{}", user_id),
        roles: vec![Role::Student],
        profile: Some(Profile {
            real_name: format!("Student {}", user_id),
            student_id: Some(format!("A{:07}", user_id)),
            department: Some("Computer Science".to_string()),
            grade: Some(2),
        }),
    }
}

pub fn admin(user_id: i64) -> IdentityRecord {
    IdentityRecord {
        user_id,
        username: format!("admin{}", user_id),
        roles: vec![Role::Admin],
        profile: None,
    }
}
