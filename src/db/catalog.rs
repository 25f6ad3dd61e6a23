use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::error::AppError;
use crate::models::{
    ClassTime, Course, CourseOffering, CourseType, Department, CreateOfferingRequest, FilterOptions, OfferingDetail, OfferingFilter,
    OfferingRow, OfferingTeacher, SelectOption,
};

const OFFERING_ROW_SELECT: &str = r#"
    SELECT
        o.id,
        c.course_code,
        c.course_name,
        c.course_type,
        c.credits,
        c.description,
        o.academic_year,
        o.semester,
        d.name AS department,
        o.grade_level,
        o.max_students,
        o.current_students,
        o.status
    FROM course_offerings o
    JOIN courses c ON c.id = o.course_id
    JOIN departments d ON d.id = o.department_id
"#;

pub async fn find_offering(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<CourseOffering>, sqlx::Error> {
    sqlx::query_as::<_, CourseOffering>(
        "SELECT id, course_id, department_id, academic_year, semester, grade_level, max_students, current_students, status, notes, created_at, updated_at FROM course_offerings WHERE id = ?"
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn class_times_for(
    conn: &mut SqliteConnection,
    offering_id: i64,
) -> Result<Vec<ClassTime>, sqlx::Error> {
    sqlx::query_as::<_, ClassTime>(
        "SELECT id, offering_id, weekday, start_period, end_period, classroom FROM class_times WHERE offering_id = ? ORDER BY weekday, start_period"
    )
    .bind(offering_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn class_times_for_many(
    conn: &mut SqliteConnection,
    offering_ids: &[i64],
) -> Result<HashMap<i64, Vec<ClassTime>>, sqlx::Error> {
    let mut grouped: HashMap<i64, Vec<ClassTime>> = HashMap::new();
    if offering_ids.is_empty() {
        return Ok(grouped);
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT id, offering_id, weekday, start_period, end_period, classroom FROM class_times WHERE offering_id IN (",
    );
    let mut ids = qb.separated(", ");
    for id in offering_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY offering_id, weekday, start_period");

    let rows = qb.build_query_as::<ClassTime>().fetch_all(&mut *conn).await?;
    for row in rows {
        grouped.entry(row.offering_id).or_default().push(row);
    }
    Ok(grouped)
}

async fn teachers_for_many(
    conn: &mut SqliteConnection,
    offering_ids: &[i64],
) -> Result<HashMap<i64, Vec<OfferingTeacher>>, sqlx::Error> {
    let mut grouped: HashMap<i64, Vec<OfferingTeacher>> = HashMap::new();
    if offering_ids.is_empty() {
        return Ok(grouped);
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT id, offering_id, teacher_id, teacher_name, role FROM offering_teachers WHERE offering_id IN (",
    );
    let mut ids = qb.separated(", ");
    for id in offering_ids {
        ids.push_bind(*id);
    }
    // main teacher first
    ids.push_unseparated(") ORDER BY offering_id, role = 'co', id");

    let rows = qb.build_query_as::<OfferingTeacher>().fetch_all(&mut *conn).await?;
    for row in rows {
        grouped.entry(row.offering_id).or_default().push(row);
    }
    Ok(grouped)
}

async fn attach_details(
    conn: &mut SqliteConnection,
    rows: Vec<OfferingRow>,
) -> Result<Vec<OfferingDetail>, sqlx::Error> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut class_times = class_times_for_many(&mut *conn, &ids).await?;
    let mut teachers = teachers_for_many(&mut *conn, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            OfferingDetail::new(
                row,
                teachers.remove(&id).unwrap_or_default(),
                class_times.remove(&id).unwrap_or_default(),
            )
        })
        .collect())
}

pub async fn offering_detail(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<OfferingDetail>, sqlx::Error> {
    let sql = format!("{} WHERE o.id = ?", OFFERING_ROW_SELECT);
    let row = sqlx::query_as::<_, OfferingRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(attach_details(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// `academic_year` value that lifts the year restriction from a search.
pub const ALL_YEARS: &str = "all";

/// Makes `%`, `_` and `\` match literally under `LIKE ... ESCAPE '\'`.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub async fn search_offerings(
    conn: &mut SqliteConnection,
    filter: &OfferingFilter,
    default_year: &str,
) -> Result<Vec<OfferingDetail>, AppError> {
    let weekdays = filter.weekday_list()?;
    let periods = filter.period_list()?;
    let academic_year = match filter.academic_year.as_deref().map(str::trim) {
        Some(year) if year.eq_ignore_ascii_case(ALL_YEARS) => None,
        Some(year) if !year.is_empty() => Some(year.to_string()),
        _ => Some(default_year.to_string()),
    };

    let mut qb = QueryBuilder::<Sqlite>::new(OFFERING_ROW_SELECT);
    qb.push(" WHERE 1 = 1");
    if let Some(academic_year) = academic_year {
        qb.push(" AND o.academic_year = ").push_bind(academic_year);
    }

    if let Some(semester) = filter.semester {
        qb.push(" AND o.semester = ").push_bind(semester);
    }
    if let Some(department) = filter.department.as_deref().filter(|d| !d.trim().is_empty()) {
        qb.push(" AND d.name = ").push_bind(department.trim().to_string());
    }
    if let Some(course_type) = filter.course_type {
        qb.push(" AND c.course_type = ").push_bind(course_type);
    }
    if let Some(grade_level) = filter.grade_level {
        qb.push(" AND o.grade_level = ").push_bind(grade_level);
    }

    if !weekdays.is_empty() {
        qb.push(" AND EXISTS (SELECT 1 FROM class_times ct WHERE ct.offering_id = o.id AND ct.weekday IN (");
        let mut list = qb.separated(", ");
        for weekday in weekdays {
            list.push_bind(weekday);
        }
        list.push_unseparated("))");
    }

    if !periods.is_empty() {
        qb.push(" AND EXISTS (SELECT 1 FROM class_times ct WHERE ct.offering_id = o.id AND (");
        for (i, period) in periods.into_iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("(ct.start_period <= ")
                .push_bind(period)
                .push(" AND ct.end_period >= ")
                .push_bind(period)
                .push(")");
        }
        qb.push("))");
    }

    if let Some(keyword) = filter.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        let pattern = format!("%{}%", escape_like(keyword));
        qb.push(" AND (c.course_code LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR c.course_name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR EXISTS (SELECT 1 FROM offering_teachers t WHERE t.offering_id = o.id AND t.teacher_name LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\'))");
    }

    qb.push(" ORDER BY c.course_code, o.id");

    let rows = qb.build_query_as::<OfferingRow>().fetch_all(&mut *conn).await?;
    Ok(attach_details(conn, rows).await?)
}

pub async fn filter_options(conn: &mut SqliteConnection) -> Result<FilterOptions, sqlx::Error> {
    let departments = sqlx::query_scalar::<_, String>("SELECT name FROM departments ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;
    let academic_years = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT academic_year FROM course_offerings ORDER BY academic_year DESC",
    )
    .fetch_all(&mut *conn)
    .await?;

    let option = |value: String, label: &str| SelectOption {
        value,
        label: label.to_string(),
    };

    Ok(FilterOptions {
        departments,
        academic_years,
        semesters: vec![option("1".to_string(), "First semester"), option("2".to_string(), "Second semester")],
        course_types: CourseType::ALL
            .iter()
            .map(|t| {
                let label = match t {
                    CourseType::Required => "Required",
                    CourseType::Elective => "Elective",
                    CourseType::GeneralRequired => "General (required)",
                    CourseType::GeneralElective => "General (elective)",
                };
                option(t.as_str().to_string(), label)
            })
            .collect(),
        weekdays: ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"]
            .into_iter()
            .enumerate()
            .map(|(i, name)| option((i + 1).to_string(), name))
            .collect(),
        grades: (1..=4)
            .map(|g| option(g.to_string(), &format!("Year {}", g)))
            .collect(),
    })
}

async fn upsert_department(
    conn: &mut SqliteConnection,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Department, sqlx::Error> {
    sqlx::query("INSERT INTO departments (name, created_at) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    sqlx::query_as::<_, Department>("SELECT id, name, code, created_at FROM departments WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
}

/// Courses are shared across offerings; an existing code takes the latest details.
async fn upsert_course(
    conn: &mut SqliteConnection,
    req: &CreateOfferingRequest,
    now: DateTime<Utc>,
) -> Result<Course, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO courses
            (course_code, course_name, course_name_en, course_type, credits, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(course_code) DO UPDATE SET
            course_name = excluded.course_name,
            course_name_en = excluded.course_name_en,
            course_type = excluded.course_type,
            credits = excluded.credits,
            description = excluded.description,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(req.course_code.trim())
    .bind(&req.course_name)
    .bind(&req.course_name_en)
    .bind(req.course_type)
    .bind(req.credits)
    .bind(&req.description)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    sqlx::query_as::<_, Course>(
        "SELECT id, course_code, course_name, course_name_en, course_type, credits, description, created_at, updated_at FROM courses WHERE course_code = ?",
    )
    .bind(req.course_code.trim())
    .fetch_one(&mut *conn)
    .await
}

pub async fn create_offering(
    db: &SqlitePool,
    req: CreateOfferingRequest,
) -> Result<OfferingDetail, AppError> {
    req.validate()?;
    let now = Utc::now();
    let mut tx = db.begin().await?;

    let department_id = upsert_department(&mut tx, req.department.trim(), now).await?.id;
    let course_id = upsert_course(&mut tx, &req, now).await?.id;

    for class_time in &req.class_times {
        let duplicates = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM class_times ct
            JOIN course_offerings o ON o.id = ct.offering_id
            WHERE o.course_id = ? AND o.academic_year = ? AND o.semester = ? AND o.department_id = ?
              AND ct.weekday = ? AND ct.start_period = ? AND ct.end_period = ? AND ct.classroom = ?
            "#,
        )
        .bind(course_id)
        .bind(&req.academic_year)
        .bind(req.semester)
        .bind(department_id)
        .bind(class_time.weekday)
        .bind(class_time.start_period)
        .bind(class_time.end_period)
        .bind(&class_time.classroom)
        .fetch_one(&mut *tx)
        .await?;

        if duplicates > 0 {
            return Err(AppError::Conflict(format!(
                "{} is already offered at this time in {}",
                req.course_code, req.department
            )));
        }
    }

    let offering_id = sqlx::query(
        r#"
        INSERT INTO course_offerings
            (course_id, department_id, academic_year, semester, grade_level,
            max_students, current_students, status, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, 'open', ?, ?, ?)
        "#,
    )
    .bind(course_id)
    .bind(department_id)
    .bind(&req.academic_year)
    .bind(req.semester)
    .bind(req.grade_level)
    .bind(req.max_students)
    .bind(&req.notes)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for class_time in &req.class_times {
        sqlx::query(
            "INSERT INTO class_times (offering_id, weekday, start_period, end_period, classroom) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(offering_id)
        .bind(class_time.weekday)
        .bind(class_time.start_period)
        .bind(class_time.end_period)
        .bind(&class_time.classroom)
        .execute(&mut *tx)
        .await?;
    }

    for teacher in &req.teachers {
        sqlx::query(
            "INSERT INTO offering_teachers (offering_id, teacher_id, teacher_name, role) VALUES (?, ?, ?, ?)",
        )
        .bind(offering_id)
        .bind(teacher.teacher_id)
        .bind(&teacher.teacher_name)
        .bind(teacher.role)
        .execute(&mut *tx)
        .await?;
    }

    let detail = offering_detail(&mut tx, offering_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("offering {}", offering_id)))?;
    tx.commit().await?;

    Ok(detail)
}

pub async fn delete_offering(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM course_offerings WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

/// Takes the database write lock for the offering before anything is read.
/// SQLite cannot upgrade a read transaction that raced another writer.
pub async fn claim_offering(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE course_offerings SET updated_at = updated_at WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(result > 0)
}

/// Increments the head count only while a seat is free and recomputes
/// open/full from the new count. Returns false when nothing was reserved.
pub async fn reserve_seat(
    conn: &mut SqliteConnection,
    id: i64,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE course_offerings
        SET current_students = current_students + 1,
            status = CASE WHEN current_students + 1 >= max_students THEN 'full' ELSE 'open' END,
            updated_at = ?
        WHERE id = ? AND status != 'closed' AND current_students < max_students
        "#,
    )
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn release_seat(
    conn: &mut SqliteConnection,
    id: i64,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE course_offerings
        SET current_students = MAX(current_students - 1, 0),
            status = CASE WHEN status = 'full' THEN 'open' ELSE status END,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(result > 0)
}
