//! Duplicating a meal plan for another owner.
//!
//! The copy shares meals by reference: only the plan row and its scheduled
//! entries are new. Writing it happens in `services::copy_meal_plan`, inside a
//! single transaction; this module decides what gets written.

use async_trait::async_trait;
use uuid::Uuid;

use super::dto::MealPlanFields;
use super::repo_types::{MealPlan, ScheduledMealRow};
use crate::error::AppError;

pub const COPY_SUFFIX: &str = " (Copy)";

/// The plan row a copy will insert, owned by the requester.
#[derive(Debug, Clone)]
pub struct PlanCopy {
    pub source_id: Uuid,
    pub owner_id: Uuid,
    pub fields: MealPlanFields,
}

impl PlanCopy {
    /// Fails with `Forbidden` when the requester already owns the plan and it is
    /// not a template.
    pub fn new(source: &MealPlan, requester: Uuid) -> Result<Self, AppError> {
        if source.owner_id == requester && !source.is_template {
            return Err(AppError::Forbidden("meal plan is already yours".into()));
        }

        let fields = MealPlanFields {
            name: format!("{}{}", source.name, COPY_SUFFIX),
            description: source.description.clone(),
            goal: source.goal,
            duration_days: source.duration_days,
            start_date: None,
            targets: source.targets,
            is_active: true,
            is_template: false,
        };

        Ok(Self {
            source_id: source.id,
            owner_id: requester,
            fields,
        })
    }

    /// `(meal_id, day_of_plan)` for every entry of the source, same meals, same days.
    pub fn schedule(source_rows: &[ScheduledMealRow]) -> Vec<(Uuid, i32)> {
        source_rows
            .iter()
            .map(|r| (r.meal_id, r.day_of_plan))
            .collect()
    }
}

/// Rows a copy reads and writes. Implementations run inside one unit of work.
#[async_trait]
pub trait CopyTarget: Send {
    async fn insert_plan(
        &mut self,
        owner_id: Uuid,
        fields: &MealPlanFields,
    ) -> Result<Uuid, AppError>;
    async fn source_schedule(&mut self, plan_id: Uuid) -> Result<Vec<ScheduledMealRow>, AppError>;
    async fn insert_scheduled(
        &mut self,
        plan_id: Uuid,
        meal_id: Uuid,
        day_of_plan: i32,
    ) -> Result<Uuid, AppError>;
}

/// Inserts the new plan and its schedule. Returns the new id and the number of
/// scheduled entries. Stops at the first failed row; the caller rolls back.
pub async fn write_copy<T: CopyTarget>(
    target: &mut T,
    copy: &PlanCopy,
) -> Result<(Uuid, usize), AppError> {
    let plan_id = target.insert_plan(copy.owner_id, &copy.fields).await?;
    let source_rows = target.source_schedule(copy.source_id).await?;
    let schedule = PlanCopy::schedule(&source_rows);
    for (meal_id, day) in &schedule {
        target.insert_scheduled(plan_id, *meal_id, *day).await?;
    }
    Ok((plan_id, schedule.len()))
}
