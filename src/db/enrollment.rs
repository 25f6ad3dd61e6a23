use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::db::catalog;
use crate::models::{EnrolledCourse, EnrolledQueryParams, Enrollment, EnrollmentStatus, ListedCourseRow, ScheduledSlot};

const ENROLLMENT_COLUMNS: &str =
    "id, student_id, offering_id, status, grade, score, enrolled_at, updated_at";

pub async fn find_active(
    conn: &mut SqliteConnection,
    student_id: i64,
    offering_id: i64,
) -> Result<Option<Enrollment>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM enrollments WHERE student_id = ? AND offering_id = ? AND status = 'enrolled'",
        ENROLLMENT_COLUMNS
    );
    sqlx::query_as::<_, Enrollment>(&sql)
        .bind(student_id)
        .bind(offering_id)
        .fetch_optional(&mut *conn)
        .await
}

/// Every enrollment row of a student, oldest first, dropped ones included.
pub async fn history(
    conn: &mut SqliteConnection,
    student_id: i64,
) -> Result<Vec<Enrollment>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM enrollments WHERE student_id = ? ORDER BY id",
        ENROLLMENT_COLUMNS
    );
    sqlx::query_as::<_, Enrollment>(&sql)
        .bind(student_id)
        .fetch_all(&mut *conn)
        .await
}

pub async fn insert(
    conn: &mut SqliteConnection,
    student_id: i64,
    offering_id: i64,
    now: DateTime<Utc>,
) -> Result<Enrollment, sqlx::Error> {
    let id = sqlx::query(
        r#"
        INSERT INTO enrollments
            (student_id, offering_id, status, grade, score, enrolled_at, updated_at)
        VALUES (?, ?, 'enrolled', NULL, NULL, ?, ?)
        "#,
    )
    .bind(student_id)
    .bind(offering_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(Enrollment {
        id,
        student_id,
        offering_id,
        status: EnrollmentStatus::Enrolled,
        grade: None,
        score: None,
        enrolled_at: now,
        updated_at: now,
    })
}

/// Soft delete: flips the active row to dropped and returns it.
pub async fn mark_dropped(
    conn: &mut SqliteConnection,
    student_id: i64,
    offering_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<Enrollment>, sqlx::Error> {
    let sql = format!(
        r#"
        UPDATE enrollments
        SET status = 'dropped', updated_at = ?
        WHERE student_id = ? AND offering_id = ? AND status = 'enrolled'
        RETURNING {}
        "#,
        ENROLLMENT_COLUMNS
    );
    sqlx::query_as::<_, Enrollment>(&sql)
        .bind(now)
        .bind(student_id)
        .bind(offering_id)
        .fetch_optional(&mut *conn)
        .await
}

/// Class times of the student's active enrollments, other than `except_offering`.
pub async fn occupied_slots(
    conn: &mut SqliteConnection,
    student_id: i64,
    except_offering: i64,
) -> Result<Vec<ScheduledSlot>, sqlx::Error> {
    sqlx::query_as::<_, ScheduledSlot>(
        r#"
        SELECT
            e.offering_id,
            c.course_name,
            ct.weekday,
            ct.start_period,
            ct.end_period
        FROM enrollments e
        JOIN course_offerings o ON o.id = e.offering_id
        JOIN courses c ON c.id = o.course_id
        JOIN class_times ct ON ct.offering_id = e.offering_id
        WHERE e.student_id = ? AND e.status = 'enrolled' AND e.offering_id != ?
        ORDER BY e.enrolled_at, e.id, ct.weekday, ct.start_period
        "#,
    )
    .bind(student_id)
    .bind(except_offering)
    .fetch_all(&mut *conn)
    .await
}

pub async fn list_enrolled(
    conn: &mut SqliteConnection,
    student_id: i64,
    params: &EnrolledQueryParams,
) -> Result<Vec<EnrolledCourse>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT
            o.id AS offering_id,
            c.course_code,
            c.course_name,
            c.course_type,
            c.credits,
            (SELECT t.teacher_name FROM offering_teachers t
             WHERE t.offering_id = o.id AND t.role = 'main'
             ORDER BY t.id LIMIT 1) AS teacher_name,
            e.enrolled_at AS listed_at
        FROM enrollments e
        JOIN course_offerings o ON o.id = e.offering_id
        JOIN courses c ON c.id = o.course_id
        WHERE e.status = 'enrolled' AND e.student_id = "#,
    );
    qb.push_bind(student_id);

    if let Some(academic_year) = params.academic_year.as_deref().filter(|y| !y.trim().is_empty()) {
        qb.push(" AND o.academic_year = ").push_bind(academic_year.trim().to_string());
    }
    if let Some(semester) = params.semester {
        qb.push(" AND o.semester = ").push_bind(semester);
    }
    qb.push(" ORDER BY e.enrolled_at DESC, e.id DESC");

    let rows = qb.build_query_as::<ListedCourseRow>().fetch_all(&mut *conn).await?;
    let ids: Vec<i64> = rows.iter().map(|r| r.offering_id).collect();
    let mut class_times = catalog::class_times_for_many(&mut *conn, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let times = class_times.remove(&row.offering_id).unwrap_or_default();
            EnrolledCourse::new(row, times)
        })
        .collect())
}
