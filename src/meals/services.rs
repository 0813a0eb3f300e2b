use std::collections::{BTreeSet, HashMap};

use sqlx::{PgConnection, PgPool};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::dto::{
    validate_items, CreateMealRequest, MealDetails, MealFields, MealItemInput, MealListItem,
    UpdateMealRequest,
};
use super::repo::{self, MealItemStore};
use super::repo_types::{meal_totals, MealItem};
use crate::error::AppError;
use crate::foods;
use crate::nutrition::NutrientTotals;
use crate::reconcile::{reconcile_named, ReconcileMode, ReconcileReport};

/// Creates a meal and, when given, its items in one transaction.
pub async fn create_meal(
    db: &PgPool,
    mode: ReconcileMode,
    owner_id: Uuid,
    req: CreateMealRequest,
) -> Result<MealDetails, AppError> {
    req.fields.validate()?;
    let items = req.meal_items.unwrap_or_default();
    validate_items(&items)?;

    let mut tx = db.begin().await?;
    let meal_id = write_new_meal(&mut tx, mode, owner_id, &req.fields, &items)
        .await
        .map_err(|e| e.in_transaction("create meal"))?;
    tx.commit()
        .await
        .map_err(|e| AppError::from(e).in_transaction("create meal"))?;

    info!(%meal_id, %owner_id, items = items.len(), "meal created");
    meal_details(db, owner_id, meal_id).await
}

/// Applies a partial update. Items are reconciled only when the request names them.
pub async fn update_meal(
    db: &PgPool,
    mode: ReconcileMode,
    owner_id: Uuid,
    meal_id: Uuid,
    mut req: UpdateMealRequest,
) -> Result<MealDetails, AppError> {
    if let Some(items) = &req.meal_items {
        validate_items(items)?;
    }

    let mut tx = db.begin().await?;
    let report = write_meal_update(&mut tx, mode, owner_id, meal_id, &mut req)
        .await
        .map_err(|e| e.in_transaction("update meal"))?;
    tx.commit()
        .await
        .map_err(|e| AppError::from(e).in_transaction("update meal"))?;

    match report {
        Some(r) => info!(
            %meal_id,
            updated = r.updated.len(),
            created = r.created.len(),
            deleted = r.deleted.len(),
            "meal updated"
        ),
        None => info!(%meal_id, "meal updated, items untouched"),
    }
    meal_details(db, owner_id, meal_id).await
}

pub async fn meal_details(
    db: &PgPool,
    viewer: Uuid,
    meal_id: Uuid,
) -> Result<MealDetails, AppError> {
    let meal = repo::find_visible(db, viewer, meal_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("meal {meal_id}")))?;
    let items = repo::items_for_meals(db, &[meal.id]).await?;
    Ok(MealDetails::new(meal, items))
}

/// Nutrient totals of a meal, computed from its current items.
pub async fn read_meal_totals(
    db: &PgPool,
    viewer: Uuid,
    meal_id: Uuid,
) -> Result<NutrientTotals, AppError> {
    let meal = repo::find_visible(db, viewer, meal_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("meal {meal_id}")))?;
    let items = repo::items_for_meals(db, &[meal.id]).await?;
    Ok(meal_totals(&items))
}

pub async fn list_meals(
    db: &PgPool,
    owner_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<MealListItem>, AppError> {
    let meals = repo::list_by_owner(db, owner_id, limit, offset).await?;
    let ids: Vec<Uuid> = meals.iter().map(|m| m.id).collect();
    let mut by_meal = group_by_meal(repo::items_for_meals(db, &ids).await?);

    Ok(meals
        .into_iter()
        .map(|m| {
            let items = by_meal.remove(&m.id).unwrap_or_default();
            MealListItem {
                id: m.id,
                name: m.name,
                meal_time_category: m.meal_time_category,
                is_template: m.is_template,
                item_count: items.len(),
                totals: meal_totals(&items),
                created_at: m.created_at,
            }
        })
        .collect())
}

pub async fn delete_meal(db: &PgPool, owner_id: Uuid, meal_id: Uuid) -> Result<(), AppError> {
    if !repo::delete_owned(db, owner_id, meal_id).await? {
        return Err(AppError::not_found(format!("meal {meal_id}")));
    }
    info!(%meal_id, %owner_id, "meal deleted");
    Ok(())
}

pub fn group_by_meal(items: Vec<MealItem>) -> HashMap<Uuid, Vec<MealItem>> {
    let mut out: HashMap<Uuid, Vec<MealItem>> = HashMap::new();
    for item in items {
        out.entry(item.meal_id).or_default().push(item);
    }
    out
}

async fn write_new_meal(
    conn: &mut PgConnection,
    mode: ReconcileMode,
    owner_id: Uuid,
    fields: &MealFields,
    items: &[MealItemInput],
) -> Result<Uuid, AppError> {
    ensure_foods_usable(conn, owner_id, items).await?;
    let meal = repo::insert_meal(conn, owner_id, fields).await?;
    sync_items(conn, meal.id, Some(items), mode).await?;
    Ok(meal.id)
}

async fn write_meal_update(
    conn: &mut PgConnection,
    mode: ReconcileMode,
    owner_id: Uuid,
    meal_id: Uuid,
    req: &mut UpdateMealRequest,
) -> Result<Option<ReconcileReport>, AppError> {
    let meal = repo::find_owned(conn, owner_id, meal_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("meal {meal_id}")))?;

    let mut fields = MealFields::from(&meal);
    req.merge_into(&mut fields);
    fields.validate()?;

    if let Some(items) = &req.meal_items {
        ensure_foods_usable(conn, owner_id, items).await?;
    }
    repo::update_meal(conn, meal_id, &fields).await?;

    sync_items(conn, meal_id, req.meal_items.as_deref(), mode).await
}

/// Every referenced food must exist and be visible to the owner.
async fn ensure_foods_usable(
    conn: &mut PgConnection,
    owner_id: Uuid,
    items: &[MealItemInput],
) -> Result<(), AppError> {
    let wanted: BTreeSet<Uuid> = items.iter().map(|i| i.food).collect();
    if wanted.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = wanted.iter().copied().collect();
    let found: BTreeSet<Uuid> = foods::repo::visible_ids(conn, owner_id, &ids)
        .await?
        .into_iter()
        .collect();
    if let Some(missing) = wanted.difference(&found).next() {
        warn!(%owner_id, food_id = %missing, "meal references unknown food");
        return Err(AppError::not_found(format!("food {missing}")));
    }
    Ok(())
}

async fn sync_items(
    conn: &mut PgConnection,
    meal_id: Uuid,
    items: Option<&[MealItemInput]>,
    mode: ReconcileMode,
) -> Result<Option<ReconcileReport>, AppError> {
    let mut store = MealItemStore { conn };
    reconcile_named(&mut store, meal_id, items, mode)
        .await
        .inspect_err(|e| {
            if matches!(e, AppError::Validation { .. } | AppError::NotFound(_)) {
                warn!(%meal_id, error = %e, "meal items rejected");
            } else {
                error!(%meal_id, error = %e, "meal item reconciliation failed");
            }
        })
}
