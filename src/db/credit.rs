use sqlx::SqliteConnection;

use crate::models::CreditRow;

/// Passed and active enrollments of a student with the course credits they carry.
pub async fn credit_rows(
    conn: &mut SqliteConnection,
    student_id: i64,
) -> Result<Vec<CreditRow>, sqlx::Error> {
    sqlx::query_as::<_, CreditRow>(
        r#"
        SELECT
            e.status,
            c.course_type,
            c.credits,
            o.academic_year,
            o.semester
        FROM enrollments e
        JOIN course_offerings o ON o.id = e.offering_id
        JOIN courses c ON c.id = o.course_id
        WHERE e.student_id = ? AND e.status IN ('passed', 'enrolled')
        ORDER BY e.id
        "#,
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await
}
