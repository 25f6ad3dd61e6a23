use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::db::catalog;
use crate::error::AppError;
use crate::models::{FavoriteCourse, FavoriteEntry, ListedCourseRow};

pub async fn find_favorite(
    conn: &mut SqliteConnection,
    student_id: i64,
    offering_id: i64,
) -> Result<Option<FavoriteCourse>, sqlx::Error> {
    sqlx::query_as::<_, FavoriteCourse>(
        "SELECT id, student_id, offering_id, created_at FROM favorite_courses WHERE student_id = ? AND offering_id = ?",
    )
    .bind(student_id)
    .bind(offering_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Flips the bookmark and returns whether the offering is now a favorite.
/// Opens with a write so the transaction holds the write lock from the start.
pub async fn toggle_favorite(
    db: &SqlitePool,
    student_id: i64,
    offering_id: i64,
) -> Result<bool, AppError> {
    let mut tx = db.begin().await?;

    let removed = sqlx::query("DELETE FROM favorite_courses WHERE student_id = ? AND offering_id = ?")
        .bind(student_id)
        .bind(offering_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if removed == 0 {
        sqlx::query(
            r#"
            INSERT INTO favorite_courses (student_id, offering_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(student_id, offering_id) DO NOTHING
            "#,
        )
        .bind(student_id)
        .bind(offering_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                AppError::NotFound(format!("offering {}", offering_id))
            }
            other => AppError::Database(other),
        })?;
    }

    tx.commit().await?;
    Ok(removed == 0)
}

pub async fn list_favorites(
    conn: &mut SqliteConnection,
    student_id: i64,
) -> Result<Vec<FavoriteEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ListedCourseRow>(
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
            f.created_at AS listed_at
        FROM favorite_courses f
        JOIN course_offerings o ON o.id = f.offering_id
        JOIN courses c ON c.id = o.course_id
        WHERE f.student_id = ?
        ORDER BY f.created_at DESC, f.id DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(&mut *conn)
    .await?;

    let ids: Vec<i64> = rows.iter().map(|r| r.offering_id).collect();
    let mut class_times = catalog::class_times_for_many(&mut *conn, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let times = class_times.remove(&row.offering_id).unwrap_or_default();
            FavoriteEntry::new(row, times)
        })
        .collect())
}
