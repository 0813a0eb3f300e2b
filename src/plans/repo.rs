use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::copy::CopyTarget;
use super::dto::{MealPlanFields, ScheduledMealInput};
use super::repo_types::{
    MealPlan, MealPlanRow, ScheduledMeal, ScheduledMealMealRow, ScheduledMealRow,
};
use crate::error::AppError;
use crate::reconcile::ChildStore;

const PLAN_COLUMNS: &str = r#"
    id, owner_id, name, description, goal, duration_days, start_date,
    target_daily_calories, target_daily_protein, target_daily_carbohydrates, target_daily_fat,
    is_active, is_template, created_at, updated_at
"#;

pub async fn insert_plan(
    conn: &mut PgConnection,
    owner_id: Uuid,
    f: &MealPlanFields,
) -> Result<MealPlan, AppError> {
    let sql = format!(
        r#"
        INSERT INTO meal_plans (owner_id, name, description, goal, duration_days, start_date,
                                target_daily_calories, target_daily_protein,
                                target_daily_carbohydrates, target_daily_fat,
                                is_active, is_template)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {PLAN_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, MealPlanRow>(&sql)
        .bind(owner_id)
        .bind(&f.name)
        .bind(&f.description)
        .bind(f.goal.as_str())
        .bind(f.duration_days)
        .bind(f.start_date)
        .bind(f.targets.calories)
        .bind(f.targets.protein)
        .bind(f.targets.carbohydrates)
        .bind(f.targets.fat)
        .bind(f.is_active)
        .bind(f.is_template)
        .fetch_one(conn)
        .await?;
    Ok(MealPlan::try_from(row)?)
}

pub async fn update_plan(
    conn: &mut PgConnection,
    id: Uuid,
    f: &MealPlanFields,
) -> Result<MealPlan, AppError> {
    let sql = format!(
        r#"
        UPDATE meal_plans
           SET name = $2, description = $3, goal = $4, duration_days = $5, start_date = $6,
               target_daily_calories = $7, target_daily_protein = $8,
               target_daily_carbohydrates = $9, target_daily_fat = $10,
               is_active = $11, is_template = $12, updated_at = now()
         WHERE id = $1
        RETURNING {PLAN_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, MealPlanRow>(&sql)
        .bind(id)
        .bind(&f.name)
        .bind(&f.description)
        .bind(f.goal.as_str())
        .bind(f.duration_days)
        .bind(f.start_date)
        .bind(f.targets.calories)
        .bind(f.targets.protein)
        .bind(f.targets.carbohydrates)
        .bind(f.targets.fat)
        .bind(f.is_active)
        .bind(f.is_template)
        .fetch_one(conn)
        .await?;
    Ok(MealPlan::try_from(row)?)
}

pub async fn find_owned(
    conn: &mut PgConnection,
    owner_id: Uuid,
    id: Uuid,
) -> Result<Option<MealPlan>, AppError> {
    let sql = format!("SELECT {PLAN_COLUMNS} FROM meal_plans WHERE id = $1 AND owner_id = $2");
    let row = sqlx::query_as::<_, MealPlanRow>(&sql)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(MealPlan::try_from).transpose()?)
}

/// Own plans and templates.
pub async fn find_visible(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<MealPlan>, AppError> {
    let sql = format!(
        "SELECT {PLAN_COLUMNS} FROM meal_plans WHERE id = $1 AND (owner_id = $2 OR is_template)"
    );
    let row = sqlx::query_as::<_, MealPlanRow>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(row.map(MealPlan::try_from).transpose()?)
}

pub async fn list_by_owner(
    db: &PgPool,
    owner_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<MealPlan>, AppError> {
    let sql = format!(
        r#"
        SELECT {PLAN_COLUMNS}
        FROM meal_plans
        WHERE owner_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#
    );
    let rows = sqlx::query_as::<_, MealPlanRow>(&sql)
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
    rows.into_iter()
        .map(|r| MealPlan::try_from(r).map_err(AppError::from))
        .collect()
}

pub async fn delete_owned(db: &PgPool, owner_id: Uuid, id: Uuid) -> Result<bool, AppError> {
    let res = sqlx::query("DELETE FROM meal_plans WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn scheduled_rows(
    conn: &mut PgConnection,
    plan_id: Uuid,
) -> Result<Vec<ScheduledMealRow>, AppError> {
    let rows = sqlx::query_as::<_, ScheduledMealRow>(
        r#"
        SELECT id, meal_plan_id, meal_id, day_of_plan
          FROM scheduled_meals
         WHERE meal_plan_id = $1
         ORDER BY day_of_plan ASC, id ASC
        "#,
    )
    .bind(plan_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub async fn insert_scheduled(
    conn: &mut PgConnection,
    plan_id: Uuid,
    meal_id: Uuid,
    day_of_plan: i32,
) -> Result<Uuid, AppError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO scheduled_meals (meal_plan_id, meal_id, day_of_plan)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(plan_id)
    .bind(meal_id)
    .bind(day_of_plan)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Scheduled entries of a plan with their meals, ordered by day.
pub async fn scheduled_with_meals(
    db: &PgPool,
    plan_id: Uuid,
) -> Result<Vec<ScheduledMeal>, AppError> {
    let rows = sqlx::query_as::<_, ScheduledMealMealRow>(
        r#"
        SELECT sm.id AS scheduled_id, sm.day_of_plan,
               m.id, m.owner_id, m.name, m.meal_time_category, m.description, m.is_template,
               m.created_at, m.updated_at
          FROM scheduled_meals sm
          JOIN meals m ON m.id = sm.meal_id
         WHERE sm.meal_plan_id = $1
         ORDER BY sm.day_of_plan ASC, m.meal_time_category ASC, sm.id ASC
        "#,
    )
    .bind(plan_id)
    .fetch_all(db)
    .await?;
    rows.into_iter()
        .map(|r| ScheduledMeal::try_from(r).map_err(AppError::from))
        .collect()
}

/// Scheduled meals of one transaction, as seen by the reconciler.
pub struct ScheduledMealStore<'c> {
    pub conn: &'c mut PgConnection,
}

#[async_trait]
impl ChildStore for ScheduledMealStore<'_> {
    type Row = ScheduledMealRow;
    type Desired = ScheduledMealInput;
    const KIND: &'static str = "scheduled meal";
    const FIELD: &'static str = "scheduled_meals";

    fn row_id(row: &ScheduledMealRow) -> Uuid {
        row.id
    }

    fn desired_id(d: &ScheduledMealInput) -> Option<Uuid> {
        d.id
    }

    async fn load(&mut self, plan_id: Uuid) -> Result<Vec<ScheduledMealRow>, AppError> {
        scheduled_rows(self.conn, plan_id).await
    }

    async fn update(&mut self, id: Uuid, d: &ScheduledMealInput) -> Result<(), AppError> {
        sqlx::query("UPDATE scheduled_meals SET meal_id = $2, day_of_plan = $3 WHERE id = $1")
            .bind(id)
            .bind(d.meal)
            .bind(d.day_of_plan)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn create(&mut self, plan_id: Uuid, d: &ScheduledMealInput) -> Result<Uuid, AppError> {
        insert_scheduled(self.conn, plan_id, d.meal, d.day_of_plan).await
    }

    async fn delete(&mut self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM scheduled_meals WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}

/// Copy writes on the connection of an open transaction.
pub struct PgCopyTarget<'c> {
    pub conn: &'c mut PgConnection,
}

#[async_trait]
impl CopyTarget for PgCopyTarget<'_> {
    async fn insert_plan(
        &mut self,
        owner_id: Uuid,
        fields: &MealPlanFields,
    ) -> Result<Uuid, AppError> {
        insert_plan(self.conn, owner_id, fields).await.map(|p| p.id)
    }

    async fn source_schedule(&mut self, plan_id: Uuid) -> Result<Vec<ScheduledMealRow>, AppError> {
        scheduled_rows(self.conn, plan_id).await
    }

    async fn insert_scheduled(
        &mut self,
        plan_id: Uuid,
        meal_id: Uuid,
        day_of_plan: i32,
    ) -> Result<Uuid, AppError> {
        insert_scheduled(self.conn, plan_id, meal_id, day_of_plan).await
    }
}
