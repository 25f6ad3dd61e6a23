use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::course::CourseType;
use crate::models::enrollment::EnrollmentStatus;

/// An (academic_year, semester) scheduling period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub academic_year: String,
    pub semester: i64,
}

impl Term {
    pub fn new(academic_year: impl Into<String>, semester: i64) -> Self {
        Self {
            academic_year: academic_year.into(),
            semester,
        }
    }

    pub fn contains(&self, academic_year: &str, semester: i64) -> bool {
        self.academic_year == academic_year && self.semester == semester
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBuckets {
    pub general: i64,
    pub elective: i64,
    pub required: i64,
    pub all: i64,
}

impl CreditBuckets {
    pub fn add(&mut self, course_type: CourseType, credits: i64) {
        match course_type {
            CourseType::GeneralRequired | CourseType::GeneralElective => self.general += credits,
            CourseType::Elective => self.elective += credits,
            CourseType::Required => self.required += credits,
        }
        self.all = self.general + self.elective + self.required;
    }
}

/// One enrollment joined with the course and term it counts toward.
#[derive(Debug, Clone, FromRow)]
pub struct CreditRow {
    pub status: EnrollmentStatus,
    pub course_type: CourseType,
    pub credits: i64,
    pub academic_year: String,
    pub semester: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CreditTotals {
    pub total_credits: CreditBuckets,
    pub semester_credits: CreditBuckets,
}

impl CreditTotals {
    /// Passed courses outside `current` count toward the historical total;
    /// active enrollments inside `current` count toward the semester total.
    pub fn tally(rows: &[CreditRow], current: &Term) -> Self {
        let mut totals = Self::default();
        for row in rows {
            let in_current = current.contains(&row.academic_year, row.semester);
            match row.status {
                EnrollmentStatus::Passed if !in_current => {
                    totals.total_credits.add(row.course_type, row.credits)
                }
                EnrollmentStatus::Enrolled if in_current => {
                    totals.semester_credits.add(row.course_type, row.credits)
                }
                _ => {}
            }
        }
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub real_name: String,
    pub student_id: Option<String>,
    pub department: Option<String>,
    pub grade: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditSummary {
    pub user_info: UserInfo,
    pub term: Term,
    pub total_credits: CreditBuckets,
    pub semester_credits: CreditBuckets,
}
