use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::course::CourseType;
use crate::models::enrollment::ListedCourseRow;
use crate::models::offering::ClassTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FavoriteCourse {
    pub id: i64,
    pub student_id: i64,
    pub offering_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteEntry {
    pub id: i64,
    pub course_code: String,
    pub course_name: String,
    pub course_type: CourseType,
    pub credits: i64,
    pub teacher_name: Option<String>,
    pub class_times: Vec<ClassTime>,
    pub favorited_at: DateTime<Utc>,
}

impl FavoriteEntry {
    pub fn new(row: ListedCourseRow, class_times: Vec<ClassTime>) -> Self {
        Self {
            id: row.offering_id,
            course_code: row.course_code,
            course_name: row.course_name,
            course_type: row.course_type,
            credits: row.credits,
            teacher_name: row.teacher_name,
            class_times,
            favorited_at: row.listed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteToggled {
    pub message: String,
    pub is_favorited: bool,
}
