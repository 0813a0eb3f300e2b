use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::dto::{MealFields, MealItemInput};
use super::repo_types::{Meal, MealItem, MealItemFoodRow, MealItemRow, MealRow};
use crate::error::AppError;
use crate::reconcile::ChildStore;

const MEAL_COLUMNS: &str =
    "id, owner_id, name, meal_time_category, description, is_template, created_at, updated_at";

pub async fn insert_meal(
    conn: &mut PgConnection,
    owner_id: Uuid,
    f: &MealFields,
) -> Result<Meal, AppError> {
    let sql = format!(
        r#"
        INSERT INTO meals (owner_id, name, meal_time_category, description, is_template)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {MEAL_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, MealRow>(&sql)
        .bind(owner_id)
        .bind(&f.name)
        .bind(f.meal_time_category.as_str())
        .bind(&f.description)
        .bind(f.is_template)
        .fetch_one(conn)
        .await?;
    Ok(Meal::try_from(row)?)
}

pub async fn update_meal(
    conn: &mut PgConnection,
    id: Uuid,
    f: &MealFields,
) -> Result<Meal, AppError> {
    let sql = format!(
        r#"
        UPDATE meals
           SET name = $2, meal_time_category = $3, description = $4, is_template = $5,
               updated_at = now()
         WHERE id = $1
        RETURNING {MEAL_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, MealRow>(&sql)
        .bind(id)
        .bind(&f.name)
        .bind(f.meal_time_category.as_str())
        .bind(&f.description)
        .bind(f.is_template)
        .fetch_one(conn)
        .await?;
    Ok(Meal::try_from(row)?)
}

pub async fn find_owned(
    conn: &mut PgConnection,
    owner_id: Uuid,
    id: Uuid,
) -> Result<Option<Meal>, AppError> {
    let sql = format!("SELECT {MEAL_COLUMNS} FROM meals WHERE id = $1 AND owner_id = $2");
    let row = sqlx::query_as::<_, MealRow>(&sql)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(Meal::try_from).transpose()?)
}

pub async fn find_visible(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<Meal>, AppError> {
    let sql = format!(
        "SELECT {MEAL_COLUMNS} FROM meals WHERE id = $1 AND (owner_id = $2 OR is_template)"
    );
    let row = sqlx::query_as::<_, MealRow>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(row.map(Meal::try_from).transpose()?)
}

pub async fn list_by_owner(
    db: &PgPool,
    owner_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Meal>, AppError> {
    let sql = format!(
        r#"
        SELECT {MEAL_COLUMNS}
        FROM meals
        WHERE owner_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#
    );
    let rows = sqlx::query_as::<_, MealRow>(&sql)
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
    rows.into_iter()
        .map(|r| Meal::try_from(r).map_err(AppError::from))
        .collect()
}

/// Returns whether a row was removed. Items and scheduled entries cascade.
pub async fn delete_owned(db: &PgPool, owner_id: Uuid, id: Uuid) -> Result<bool, AppError> {
    let res = sqlx::query("DELETE FROM meals WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Meals with the given ids, whoever owns them.
pub async fn find_many(conn: &mut PgConnection, ids: &[Uuid]) -> Result<Vec<Meal>, AppError> {
    let sql = format!("SELECT {MEAL_COLUMNS} FROM meals WHERE id = ANY($1)");
    let rows = sqlx::query_as::<_, MealRow>(&sql)
        .bind(ids)
        .fetch_all(conn)
        .await?;
    rows.into_iter()
        .map(|r| Meal::try_from(r).map_err(AppError::from))
        .collect()
}

/// Items of all given meals with their foods, for computing totals.
pub async fn items_for_meals(
    db: &PgPool,
    meal_ids: &[Uuid],
) -> Result<Vec<MealItem>, AppError> {
    let rows = sqlx::query_as::<_, MealItemFoodRow>(
        r#"
        SELECT mi.id AS item_id, mi.meal_id, mi.servings,
               f.id, f.owner_id, f.name, f.description, f.serving_quantity, f.serving_unit,
               f.calories, f.protein, f.carbohydrates, f.fat, f.fiber, f.sugar, f.sodium,
               f.food_category, f.is_public, f.created_at, f.updated_at
          FROM meal_items mi
          JOIN foods f ON f.id = mi.food_id
         WHERE mi.meal_id = ANY($1)
         ORDER BY f.name ASC, mi.id ASC
        "#,
    )
    .bind(meal_ids)
    .fetch_all(db)
    .await?;
    rows.into_iter()
        .map(|r| MealItem::try_from(r).map_err(AppError::from))
        .collect()
}

/// Meal items of one transaction, as seen by the reconciler.
pub struct MealItemStore<'c> {
    pub conn: &'c mut PgConnection,
}

const DUPLICATE_FOOD: &str = "each food can appear only once per meal";

#[async_trait]
impl ChildStore for MealItemStore<'_> {
    type Row = MealItemRow;
    type Desired = MealItemInput;
    const KIND: &'static str = "meal item";
    const FIELD: &'static str = "meal_items";

    fn row_id(row: &MealItemRow) -> Uuid {
        row.id
    }

    fn desired_id(d: &MealItemInput) -> Option<Uuid> {
        d.id
    }

    async fn load(&mut self, meal_id: Uuid) -> Result<Vec<MealItemRow>, AppError> {
        let rows = sqlx::query_as::<_, MealItemRow>(
            "SELECT id, meal_id, food_id, servings FROM meal_items WHERE meal_id = $1",
        )
        .bind(meal_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows)
    }

    async fn update(&mut self, id: Uuid, d: &MealItemInput) -> Result<(), AppError> {
        sqlx::query("UPDATE meal_items SET food_id = $2, servings = $3 WHERE id = $1")
            .bind(id)
            .bind(d.food)
            .bind(d.servings)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| AppError::unique_violation_on(e, "meal_items.food", DUPLICATE_FOOD))?;
        Ok(())
    }

    async fn create(&mut self, meal_id: Uuid, d: &MealItemInput) -> Result<Uuid, AppError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO meal_items (meal_id, food_id, servings)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(meal_id)
        .bind(d.food)
        .bind(d.servings)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| AppError::unique_violation_on(e, "meal_items.food", DUPLICATE_FOOD))?;
        Ok(id)
    }

    async fn delete(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM meal_items WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}
