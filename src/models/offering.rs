use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;
use crate::models::course::CourseType;
use crate::models::schedule::TimeSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OfferingStatus {
    Open,
    Full,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseOffering {
    pub id: i64,
    pub course_id: i64,
    pub department_id: i64,
    pub academic_year: String,
    pub semester: i64,
    pub grade_level: i64,
    pub max_students: i64,
    pub current_students: i64,
    pub status: OfferingStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseOffering {
    pub fn is_full(&self) -> bool {
        self.current_students >= self.max_students
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ClassTime {
    pub id: i64,
    pub offering_id: i64,
    pub weekday: i64,
    pub start_period: i64,
    pub end_period: i64,
    pub classroom: String,
}

impl ClassTime {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot {
            weekday: self.weekday,
            start_period: self.start_period,
            end_period: self.end_period,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TeacherRole {
    Main,
    Co,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OfferingTeacher {
    pub id: i64,
    pub offering_id: i64,
    pub teacher_id: i64,
    pub teacher_name: String,
    pub role: TeacherRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClassTime {
    pub weekday: i64,
    pub start_period: i64,
    pub end_period: i64,
    pub classroom: String,
}

impl NewClassTime {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=7).contains(&self.weekday) {
            return Err(AppError::BadRequest(format!(
                "weekday must be between 1 and 7, got {}",
                self.weekday
            )));
        }
        if self.start_period < 1 || self.start_period > self.end_period {
            return Err(AppError::BadRequest(format!(
                "invalid period range {}-{}",
                self.start_period, self.end_period
            )));
        }
        if self.classroom.trim().is_empty() {
            return Err(AppError::BadRequest("classroom is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOfferingTeacher {
    pub teacher_id: i64,
    pub teacher_name: String,
    pub role: TeacherRole,
}

fn default_max_students() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOfferingRequest {
    pub course_code: String,
    pub course_name: String,
    #[serde(default)]
    pub course_name_en: Option<String>,
    pub course_type: CourseType,
    pub credits: i64,
    #[serde(default)]
    pub description: String,
    pub academic_year: String,
    pub semester: i64,
    pub department: String,
    pub grade_level: i64,
    #[serde(default = "default_max_students")]
    pub max_students: i64,
    #[serde(default)]
    pub notes: String,
    pub class_times: Vec<NewClassTime>,
    #[serde(default)]
    pub teachers: Vec<NewOfferingTeacher>,
}

impl CreateOfferingRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let required = [
            ("course_code", &self.course_code),
            ("course_name", &self.course_name),
            ("academic_year", &self.academic_year),
            ("department", &self.department),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::BadRequest(format!("{} is required", field)));
            }
        }
        if !matches!(self.semester, 1 | 2) {
            return Err(AppError::BadRequest(format!(
                "semester must be 1 or 2, got {}",
                self.semester
            )));
        }
        if self.credits < 0 {
            return Err(AppError::BadRequest("credits must not be negative".to_string()));
        }
        if self.max_students < 1 {
            return Err(AppError::BadRequest("max_students must be at least 1".to_string()));
        }
        if self.class_times.is_empty() {
            return Err(AppError::BadRequest("at least one class time is required".to_string()));
        }
        for class_time in &self.class_times {
            class_time.validate()?;
        }
        let main_teachers = self
            .teachers
            .iter()
            .filter(|t| t.role == TeacherRole::Main)
            .count();
        if main_teachers > 1 {
            return Err(AppError::BadRequest("only one main teacher is allowed".to_string()));
        }
        Ok(())
    }
}

/// Offering joined with its course and department, as listed to students.
#[derive(Debug, Clone, FromRow)]
pub struct OfferingRow {
    pub id: i64,
    pub course_code: String,
    pub course_name: String,
    pub course_type: CourseType,
    pub credits: i64,
    pub description: String,
    pub academic_year: String,
    pub semester: i64,
    pub department: String,
    pub grade_level: i64,
    pub max_students: i64,
    pub current_students: i64,
    pub status: OfferingStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferingDetail {
    pub id: i64,
    pub course_code: String,
    pub course_name: String,
    pub course_type: CourseType,
    pub credits: i64,
    pub description: String,
    pub academic_year: String,
    pub semester: i64,
    pub department: String,
    pub grade_level: i64,
    pub max_students: i64,
    pub current_students: i64,
    pub status: OfferingStatus,
    pub teachers: Vec<OfferingTeacher>,
    pub class_times: Vec<ClassTime>,
}

impl OfferingDetail {
    pub fn new(row: OfferingRow, teachers: Vec<OfferingTeacher>, class_times: Vec<ClassTime>) -> Self {
        Self {
            id: row.id,
            course_code: row.course_code,
            course_name: row.course_name,
            course_type: row.course_type,
            credits: row.credits,
            description: row.description,
            academic_year: row.academic_year,
            semester: row.semester,
            department: row.department,
            grade_level: row.grade_level,
            max_students: row.max_students,
            current_students: row.current_students,
            status: row.status,
            teachers,
            class_times,
        }
    }
}

/// Search parameters. List-valued filters are comma separated (`weekdays=1,3`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferingFilter {
    pub keyword: Option<String>,
    /// Defaults to the current year; `all` searches every year.
    pub academic_year: Option<String>,
    pub semester: Option<i64>,
    pub department: Option<String>,
    pub course_type: Option<CourseType>,
    pub grade_level: Option<i64>,
    pub weekdays: Option<String>,
    pub periods: Option<String>,
}

impl OfferingFilter {
    pub fn weekday_list(&self) -> Result<Vec<i64>, AppError> {
        parse_number_list("weekdays", self.weekdays.as_deref())
    }

    pub fn period_list(&self) -> Result<Vec<i64>, AppError> {
        parse_number_list("periods", self.periods.as_deref())
    }
}

fn parse_number_list(field: &str, raw: Option<&str>) -> Result<Vec<i64>, AppError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| AppError::BadRequest(format!("invalid {} value: {}", field, s)))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub departments: Vec<String>,
    pub academic_years: Vec<String>,
    pub semesters: Vec<SelectOption>,
    pub course_types: Vec<SelectOption>,
    pub weekdays: Vec<SelectOption>,
    pub grades: Vec<SelectOption>,
}
