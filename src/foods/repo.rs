use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::dto::{FoodFields, FoodOrdering};
use super::repo_types::{Food, FoodCategory, FoodRow};
use crate::error::AppError;

const FOOD_COLUMNS: &str = r#"
    id, owner_id, name, description, serving_quantity, serving_unit,
    calories, protein, carbohydrates, fat, fiber, sugar, sodium,
    food_category, is_public, created_at, updated_at
"#;

/// Public foods plus the caller's private ones.
pub async fn list_visible(
    db: &PgPool,
    user_id: Uuid,
    search: Option<&str>,
    category: Option<FoodCategory>,
    ordering: FoodOrdering,
    limit: i64,
    offset: i64,
) -> Result<Vec<Food>, AppError> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s));
    let order_by = ordering.order_by();
    let sql = format!(
        r#"
        SELECT {FOOD_COLUMNS}
        FROM foods
        WHERE (is_public OR owner_id = $1)
          AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)
          AND ($3::text IS NULL OR food_category = $3)
        ORDER BY {order_by}
        LIMIT $4 OFFSET $5
        "#
    );
    let rows = sqlx::query_as::<_, FoodRow>(&sql)
        .bind(user_id)
        .bind(pattern)
        .bind(category.map(|c| c.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
    rows.into_iter()
        .map(|r| Food::try_from(r).map_err(AppError::from))
        .collect()
}

pub async fn find_visible(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<Food>, AppError> {
    let sql = format!(
        "SELECT {FOOD_COLUMNS} FROM foods WHERE id = $1 AND (is_public OR owner_id = $2)"
    );
    let row = sqlx::query_as::<_, FoodRow>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(row.map(Food::try_from).transpose()?)
}

pub async fn insert(db: &PgPool, owner_id: Uuid, f: &FoodFields) -> Result<Food, AppError> {
    let sql = format!(
        r#"
        INSERT INTO foods (owner_id, name, description, serving_quantity, serving_unit,
                           calories, protein, carbohydrates, fat, fiber, sugar, sodium,
                           food_category, is_public)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {FOOD_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, FoodRow>(&sql)
        .bind(owner_id)
        .bind(&f.name)
        .bind(&f.description)
        .bind(f.serving_quantity)
        .bind(&f.serving_unit)
        .bind(f.calories)
        .bind(f.protein)
        .bind(f.carbohydrates)
        .bind(f.fat)
        .bind(f.fiber)
        .bind(f.sugar)
        .bind(f.sodium)
        .bind(f.food_category.as_str())
        .bind(f.is_public)
        .fetch_one(db)
        .await?;
    Ok(Food::try_from(row)?)
}

pub async fn update(db: &PgPool, id: Uuid, f: &FoodFields) -> Result<Food, AppError> {
    let sql = format!(
        r#"
        UPDATE foods
           SET name = $2, description = $3, serving_quantity = $4, serving_unit = $5,
               calories = $6, protein = $7, carbohydrates = $8, fat = $9,
               fiber = $10, sugar = $11, sodium = $12,
               food_category = $13, is_public = $14, updated_at = now()
         WHERE id = $1
        RETURNING {FOOD_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, FoodRow>(&sql)
        .bind(id)
        .bind(&f.name)
        .bind(&f.description)
        .bind(f.serving_quantity)
        .bind(&f.serving_unit)
        .bind(f.calories)
        .bind(f.protein)
        .bind(f.carbohydrates)
        .bind(f.fat)
        .bind(f.fiber)
        .bind(f.sugar)
        .bind(f.sodium)
        .bind(f.food_category.as_str())
        .bind(f.is_public)
        .fetch_one(db)
        .await?;
    Ok(Food::try_from(row)?)
}

/// Removes the food; meal items that use it go with it.
pub async fn delete(db: &PgPool, id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM foods WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Returns the subset of `ids` the user may put into a meal.
pub async fn visible_ids(
    conn: &mut PgConnection,
    user_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Uuid>, AppError> {
    let rows = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM foods
        WHERE id = ANY($1) AND (is_public OR owner_id = $2)
        "#,
    )
    .bind(ids)
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
