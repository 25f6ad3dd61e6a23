use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::course::CourseType;
use crate::models::offering::ClassTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Enrolled,
    Passed,
    Failed,
    Dropped,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: i64,
    pub student_id: i64,
    pub offering_id: i64,
    pub status: EnrollmentStatus,
    pub grade: Option<String>,
    pub score: Option<f64>,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrolledQueryParams {
    pub academic_year: Option<String>,
    pub semester: Option<i64>,
}

/// A course-listing row shared by the enrolled and favorites views.
#[derive(Debug, Clone, FromRow)]
pub struct ListedCourseRow {
    pub offering_id: i64,
    pub course_code: String,
    pub course_name: String,
    pub course_type: CourseType,
    pub credits: i64,
    pub teacher_name: Option<String>,
    pub listed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrolledCourse {
    pub id: i64,
    pub course_code: String,
    pub course_name: String,
    pub course_type: CourseType,
    pub credits: i64,
    pub teacher_name: Option<String>,
    pub class_times: Vec<ClassTime>,
    pub enrolled_at: DateTime<Utc>,
}

impl EnrolledCourse {
    pub fn new(row: ListedCourseRow, class_times: Vec<ClassTime>) -> Self {
        Self {
            id: row.offering_id,
            course_code: row.course_code,
            course_name: row.course_name,
            course_type: row.course_type,
            credits: row.credits,
            teacher_name: row.teacher_name,
            class_times,
            enrolled_at: row.listed_at,
        }
    }
}
