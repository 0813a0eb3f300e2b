use std::collections::{BTreeMap, BTreeSet};

use sqlx::{PgConnection, PgPool};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::copy::{write_copy, PlanCopy};
use super::dto::{
    validate_schedule, CreateMealPlanRequest, DayTotals, MealPlanDetails, MealPlanFields,
    MealPlanListItem, ScheduledMealInput, ScheduledMealSummary, ScheduledMealView,
    UpdateMealPlanRequest,
};
use super::repo::{self, PgCopyTarget, ScheduledMealStore};
use crate::error::AppError;
use crate::meals;
use crate::meals::repo_types::{first_unusable_meal, meal_totals};
use crate::nutrition::NutrientTotals;
use crate::reconcile::{reconcile_named, ReconcileMode, ReconcileReport};

pub async fn create_meal_plan(
    db: &PgPool,
    mode: ReconcileMode,
    owner_id: Uuid,
    req: CreateMealPlanRequest,
) -> Result<MealPlanDetails, AppError> {
    req.fields.validate()?;
    let schedule = req.scheduled_meals.unwrap_or_default();
    validate_schedule(&schedule, req.fields.duration_days)?;

    let mut tx = db.begin().await?;
    let plan_id = write_new_plan(&mut tx, mode, owner_id, &req.fields, &schedule)
        .await
        .map_err(|e| e.in_transaction("create meal plan"))?;
    tx.commit()
        .await
        .map_err(|e| AppError::from(e).in_transaction("create meal plan"))?;

    info!(%plan_id, %owner_id, scheduled = schedule.len(), "meal plan created");
    plan_details(db, owner_id, plan_id).await
}

/// Partial update. The schedule is reconciled only when the request names it,
/// and is checked against the duration after merging.
pub async fn update_meal_plan(
    db: &PgPool,
    mode: ReconcileMode,
    owner_id: Uuid,
    plan_id: Uuid,
    mut req: UpdateMealPlanRequest,
) -> Result<MealPlanDetails, AppError> {
    let mut tx = db.begin().await?;
    let report = write_plan_update(&mut tx, mode, owner_id, plan_id, &mut req)
        .await
        .map_err(|e| e.in_transaction("update meal plan"))?;
    tx.commit()
        .await
        .map_err(|e| AppError::from(e).in_transaction("update meal plan"))?;

    match report {
        Some(r) => info!(
            %plan_id,
            updated = r.updated.len(),
            created = r.created.len(),
            deleted = r.deleted.len(),
            "meal plan updated"
        ),
        None => info!(%plan_id, "meal plan updated, schedule untouched"),
    }
    plan_details(db, owner_id, plan_id).await
}

/// The plan, its schedule with per-meal totals, and totals per scheduled day.
pub async fn plan_details(
    db: &PgPool,
    viewer: Uuid,
    plan_id: Uuid,
) -> Result<MealPlanDetails, AppError> {
    let plan = repo::find_visible(db, viewer, plan_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("meal plan {plan_id}")))?;
    let scheduled = repo::scheduled_with_meals(db, plan.id).await?;

    let meal_ids: Vec<Uuid> = scheduled
        .iter()
        .map(|s| s.meal.id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let items = meals::repo::items_for_meals(db, &meal_ids).await?;
    let by_meal = meals::services::group_by_meal(items);

    let views: Vec<ScheduledMealView> = scheduled
        .into_iter()
        .map(|s| {
            let totals = by_meal
                .get(&s.meal.id)
                .map(|items| meal_totals(items))
                .unwrap_or_default();
            ScheduledMealView {
                id: s.id,
                day_of_plan: s.day_of_plan,
                meal: ScheduledMealSummary {
                    id: s.meal.id,
                    owner_id: s.meal.owner_id,
                    name: s.meal.name,
                    meal_time_category: s.meal.meal_time_category,
                },
                totals,
            }
        })
        .collect();

    Ok(MealPlanDetails {
        plan,
        daily_totals: daily_totals(&views),
        scheduled_meals: views,
    })
}

/// Sums scheduled meal totals per plan day. Days without meals are left out.
fn daily_totals(views: &[ScheduledMealView]) -> Vec<DayTotals> {
    let mut per_day: BTreeMap<i32, NutrientTotals> = BTreeMap::new();
    for v in views {
        per_day.entry(v.day_of_plan).or_default().add(&v.totals);
    }
    per_day
        .into_iter()
        .map(|(day_of_plan, totals)| DayTotals { day_of_plan, totals })
        .collect()
}

pub async fn list_plans(
    db: &PgPool,
    owner_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<MealPlanListItem>, AppError> {
    let plans = repo::list_by_owner(db, owner_id, limit, offset).await?;
    Ok(plans.into_iter().map(MealPlanListItem::from).collect())
}

pub async fn delete_meal_plan(
    db: &PgPool,
    owner_id: Uuid,
    plan_id: Uuid,
) -> Result<(), AppError> {
    if !repo::delete_owned(db, owner_id, plan_id).await? {
        return Err(AppError::not_found(format!("meal plan {plan_id}")));
    }
    info!(%plan_id, %owner_id, "meal plan deleted");
    Ok(())
}

/// Copies a visible plan for `requester`. Either the whole copy lands or nothing does.
pub async fn copy_meal_plan(
    db: &PgPool,
    requester: Uuid,
    source_id: Uuid,
) -> Result<MealPlanDetails, AppError> {
    let source = repo::find_visible(db, requester, source_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("meal plan {source_id}")))?;
    let copy = PlanCopy::new(&source, requester)?;

    let mut tx = db.begin().await?;
    let written = write_copy(&mut PgCopyTarget { conn: &mut *tx }, &copy).await;
    let (new_id, scheduled) = match written {
        Ok(v) => v,
        Err(e) => {
            let e = e.in_transaction("copy meal plan");
            error!(%source_id, %requester, error = ?e, "meal plan copy rolled back");
            return Err(e);
        }
    };
    tx.commit().await.map_err(|e| {
        let e = AppError::from(e).in_transaction("copy meal plan");
        error!(%source_id, %requester, error = ?e, "meal plan copy commit failed");
        e
    })?;

    info!(%source_id, %new_id, %requester, scheduled, "meal plan copied");
    plan_details(db, requester, new_id).await
}

async fn write_new_plan(
    conn: &mut PgConnection,
    mode: ReconcileMode,
    owner_id: Uuid,
    fields: &MealPlanFields,
    schedule: &[ScheduledMealInput],
) -> Result<Uuid, AppError> {
    ensure_meals_usable(conn, owner_id, schedule).await?;
    let plan = repo::insert_plan(conn, owner_id, fields).await?;
    sync_schedule(conn, plan.id, Some(schedule), mode).await?;
    Ok(plan.id)
}

async fn write_plan_update(
    conn: &mut PgConnection,
    mode: ReconcileMode,
    owner_id: Uuid,
    plan_id: Uuid,
    req: &mut UpdateMealPlanRequest,
) -> Result<Option<ReconcileReport>, AppError> {
    let plan = repo::find_owned(conn, owner_id, plan_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("meal plan {plan_id}")))?;

    let mut fields = MealPlanFields::from(&plan);
    req.merge_into(&mut fields);
    fields.validate()?;

    match &req.scheduled_meals {
        Some(schedule) => {
            validate_schedule(schedule, fields.duration_days)?;
            ensure_meals_usable(conn, owner_id, schedule).await?;
        }
        None => {
            // A shorter plan must not strand existing entries past its end.
            let existing = repo::scheduled_rows(conn, plan_id).await?;
            if let Some(last) = existing.iter().map(|r| r.day_of_plan).max() {
                if last > fields.duration_days {
                    return Err(AppError::validation(
                        "duration_days",
                        format!("meals are scheduled up to day {last}"),
                    ));
                }
            }
        }
    }
    repo::update_plan(conn, plan_id, &fields).await?;

    sync_schedule(conn, plan_id, req.scheduled_meals.as_deref(), mode).await
}

/// Scheduled meals must be the owner's own meals or templates.
async fn ensure_meals_usable(
    conn: &mut PgConnection,
    owner_id: Uuid,
    schedule: &[ScheduledMealInput],
) -> Result<(), AppError> {
    let wanted: BTreeSet<Uuid> = schedule.iter().map(|s| s.meal).collect();
    if wanted.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = wanted.iter().copied().collect();
    let found = meals::repo::find_many(conn, &ids).await?;
    if let Some(missing) = first_unusable_meal(&wanted, &found, owner_id) {
        warn!(%owner_id, meal_id = %missing, "schedule references unusable meal");
        return Err(AppError::not_found(format!("meal {missing}")));
    }
    Ok(())
}

async fn sync_schedule(
    conn: &mut PgConnection,
    plan_id: Uuid,
    schedule: Option<&[ScheduledMealInput]>,
    mode: ReconcileMode,
) -> Result<Option<ReconcileReport>, AppError> {
    let mut store = ScheduledMealStore { conn };
    reconcile_named(&mut store, plan_id, schedule, mode)
        .await
        .inspect_err(|e| {
            if matches!(e, AppError::Validation { .. } | AppError::NotFound(_)) {
                warn!(%plan_id, error = %e, "scheduled meals rejected");
            } else {
                error!(%plan_id, error = %e, "schedule reconciliation failed");
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::repo_types::MealTimeCategory;

    fn view(day_of_plan: i32, calories: f64, protein: f64) -> ScheduledMealView {
        ScheduledMealView {
            id: Uuid::new_v4(),
            day_of_plan,
            meal: ScheduledMealSummary {
                id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                name: "Oat bowl".into(),
                meal_time_category: MealTimeCategory::Breakfast,
            },
            totals: NutrientTotals {
                calories,
                protein,
                ..Default::default()
            },
        }
    }

    #[test]
    fn daily_totals_sum_meals_of_the_same_day_in_day_order() {
        let views = vec![view(3, 500.0, 30.0), view(1, 400.0, 20.0), view(3, 250.0, 5.0)];

        let days = daily_totals(&views);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].day_of_plan, 1);
        assert_eq!(days[0].totals.calories, 400.0);
        assert_eq!(days[1].day_of_plan, 3);
        assert_eq!(days[1].totals.calories, 750.0);
        assert_eq!(days[1].totals.protein, 35.0);
    }

    #[test]
    fn no_scheduled_meals_means_no_days() {
        assert!(daily_totals(&[]).is_empty());
    }
}
