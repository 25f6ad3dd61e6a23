use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CourseType {
    Required,
    Elective,
    GeneralRequired,
    GeneralElective,
}

impl CourseType {
    pub const ALL: [CourseType; 4] = [
        CourseType::Required,
        CourseType::Elective,
        CourseType::GeneralRequired,
        CourseType::GeneralElective,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CourseType::Required => "required",
            CourseType::Elective => "elective",
            CourseType::GeneralRequired => "general_required",
            CourseType::GeneralElective => "general_elective",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i64,
    pub course_code: String,
    pub course_name: String,
    pub course_name_en: Option<String>,
    pub course_type: CourseType,
    pub credits: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
}
