pub mod auth;

use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::api::auth::CurrentUser;
use crate::db::{catalog, favorite};
use crate::error::AppError;
use crate::identity::Capability;
use crate::models::*;
use crate::services::EnrollPolicy;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self { message: message.into() })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", post(create_offering))
        .route("/courses/search", get(search_courses))
        .route("/courses/filter-options", get(filter_options))
        .route("/courses/enrolled", get(list_enrolled))
        .route("/courses/favorites", get(list_favorites))
        .route("/courses/{offering_id}", axum::routing::delete(delete_offering))
        .route("/courses/{offering_id}/detail", get(course_detail))
        .route("/courses/{offering_id}/enroll", post(enroll))
        .route("/courses/{offering_id}/drop", post(drop_course))
        .route("/courses/{offering_id}/favorite", post(toggle_favorite))
        .route(
            "/admin/students/{student_id}/courses/{offering_id}/enroll",
            post(admin_enroll),
        )
        .route(
            "/admin/students/{student_id}/courses/{offering_id}/drop",
            post(admin_drop),
        )
        .route("/user/credit-summary", get(credit_summary))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn search_courses(
    State(state): State<AppState>,
    Query(filter): Query<OfferingFilter>,
) -> Result<Json<Vec<OfferingDetail>>, AppError> {
    let mut conn = state.db.acquire().await?;
    let offerings =
        catalog::search_offerings(&mut conn, &filter, &state.current_term.academic_year).await?;
    Ok(Json(offerings))
}

async fn filter_options(State(state): State<AppState>) -> Result<Json<FilterOptions>, AppError> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(catalog::filter_options(&mut conn).await?))
}

async fn course_detail(
    State(state): State<AppState>,
    Path(offering_id): Path<i64>,
) -> Result<Json<OfferingDetail>, AppError> {
    let mut conn = state.db.acquire().await?;
    let detail = catalog::offering_detail(&mut conn, offering_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("offering {}", offering_id)))?;
    Ok(Json(detail))
}

async fn create_offering(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateOfferingRequest>,
) -> Result<(StatusCode, Json<OfferingDetail>), AppError> {
    user.require(Capability::ManageCatalog)?;
    let detail = catalog::create_offering(&state.db, req).await?;
    tracing::info!("{} created offering {} ({})", user.username, detail.id, detail.course_code);
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn delete_offering(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(offering_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    user.require(Capability::ManageCatalog)?;
    let ok = catalog::delete_offering(&state.db, offering_id).await?;
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("offering {}", offering_id)))
    }
}

async fn enroll(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(offering_id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let policy = EnrollPolicy::authorize(&user, user.user_id)?;
    state.enrollments().enroll(user.user_id, offering_id, policy).await?;
    Ok(MessageResponse::new("Enrolled"))
}

async fn drop_course(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(offering_id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    EnrollPolicy::authorize(&user, user.user_id)?;
    state.enrollments().drop_course(user.user_id, offering_id).await?;
    Ok(MessageResponse::new("Dropped"))
}

async fn admin_enroll(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((student_id, offering_id)): Path<(i64, i64)>,
) -> Result<Json<MessageResponse>, AppError> {
    let policy = EnrollPolicy::authorize(&user, student_id)?;
    state.enrollments().enroll(student_id, offering_id, policy).await?;
    tracing::info!(
        "{} enrolled student {} in offering {} (conflict check: {})",
        user.username,
        student_id,
        offering_id,
        policy.check_conflicts
    );
    Ok(MessageResponse::new("Enrolled"))
}

async fn admin_drop(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((student_id, offering_id)): Path<(i64, i64)>,
) -> Result<Json<MessageResponse>, AppError> {
    EnrollPolicy::authorize(&user, student_id)?;
    state.enrollments().drop_course(student_id, offering_id).await?;
    Ok(MessageResponse::new("Dropped"))
}

async fn list_enrolled(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<EnrolledQueryParams>,
) -> Result<Json<Vec<EnrolledCourse>>, AppError> {
    let courses = state.enrollments().enrolled_courses(user.user_id, &params).await?;
    Ok(Json(courses))
}

async fn toggle_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(offering_id): Path<i64>,
) -> Result<Json<FavoriteToggled>, AppError> {
    let is_favorited = favorite::toggle_favorite(&state.db, user.user_id, offering_id).await?;
    let message = if is_favorited { "Added to favorites" } else { "Removed from favorites" };
    Ok(Json(FavoriteToggled {
        message: message.to_string(),
        is_favorited,
    }))
}

async fn list_favorites(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<FavoriteEntry>>, AppError> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(favorite::list_favorites(&mut conn, user.user_id).await?))
}

async fn credit_summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<CreditSummary>, AppError> {
    let summary = state.credits().summary_for(&user, &state.current_term).await?;
    Ok(Json(summary))
}
