use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{FoodFields, FoodQuery, UpdateFoodRequest};
use super::repo;
use super::repo_types::Food;
use crate::{auth::AuthUser, error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/foods", get(list_foods).post(create_food))
        .route(
            "/foods/:id",
            get(get_food).patch(update_food).delete(delete_food),
        )
}

#[instrument(skip(state))]
pub async fn list_foods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<FoodQuery>,
) -> Result<Json<Vec<Food>>, AppError> {
    let foods = repo::list_visible(
        &state.db,
        user_id,
        q.search.as_deref(),
        q.category,
        q.ordering,
        q.limit.clamp(1, 200),
        q.offset.max(0),
    )
    .await?;
    Ok(Json(foods))
}

#[instrument(skip(state))]
pub async fn get_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Food>, AppError> {
    let food = repo::find_visible(&state.db, user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("food {id}")))?;
    Ok(Json(food))
}

#[instrument(skip(state, body))]
pub async fn create_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<FoodFields>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<Food>), AppError> {
    if let Err(e) = body.validate() {
        warn!(error = %e, "invalid food");
        return Err(e);
    }
    let food = repo::insert(&state.db, user_id, &body).await?;
    info!(food_id = %food.id, %user_id, "food created");
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/api/v1/foods/{}", food.id))],
        Json(food),
    ))
}

/// Loads a food the caller may change. Visible-but-locked foods are forbidden.
async fn editable_food(state: &AppState, user_id: Uuid, id: Uuid) -> Result<Food, AppError> {
    let food = repo::find_visible(&state.db, user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("food {id}")))?;
    if !food.editable_by(user_id) {
        warn!(%user_id, food_id = %id, "food is not editable by caller");
        return Err(AppError::Forbidden(
            "only the owner of a private food may change it".into(),
        ));
    }
    Ok(food)
}

#[instrument(skip(state, body))]
pub async fn update_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateFoodRequest>,
) -> Result<Json<Food>, AppError> {
    let food = editable_food(&state, user_id, id).await?;
    let mut fields = FoodFields::from(&food);
    body.merge_into(&mut fields);
    fields.validate()?;

    let food = repo::update(&state.db, id, &fields).await?;
    info!(food_id = %id, %user_id, "food updated");
    Ok(Json(food))
}

#[instrument(skip(state))]
pub async fn delete_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    editable_food(&state, user_id, id).await?;
    repo::delete(&state.db, id).await?;
    info!(food_id = %id, %user_id, "food deleted");
    Ok(StatusCode::NO_CONTENT)
}
