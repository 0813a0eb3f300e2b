use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CreateMealRequest, MealDetails, MealListItem, Pagination, UpdateMealRequest};
use super::services;
use crate::{auth::AuthUser, error::AppError, nutrition::NutrientTotals, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals).post(create_meal))
        .route(
            "/meals/:id",
            get(get_meal).patch(update_meal).delete(delete_meal),
        )
        .route("/meals/:id/totals", get(get_meal_totals))
}

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<MealListItem>>, AppError> {
    let meals =
        services::list_meals(&state.db, user_id, p.limit.clamp(1, 100), p.offset.max(0)).await?;
    Ok(Json(meals))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MealDetails>, AppError> {
    Ok(Json(services::meal_details(&state.db, user_id, id).await?))
}

#[instrument(skip(state))]
pub async fn get_meal_totals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<NutrientTotals>, AppError> {
    Ok(Json(services::read_meal_totals(&state.db, user_id, id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateMealRequest>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<MealDetails>), AppError> {
    let meal =
        services::create_meal(&state.db, state.config.reconcile_mode, user_id, body).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/v1/meals/{}", meal.id))],
        Json(meal),
    ))
}

#[instrument(skip(state, body))]
pub async fn update_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMealRequest>,
) -> Result<Json<MealDetails>, AppError> {
    let meal =
        services::update_meal(&state.db, state.config.reconcile_mode, user_id, id, body).await?;
    Ok(Json(meal))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete_meal(&state.db, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
