use serde::{Deserialize, Deserializer, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{DailyTargets, MealPlan, PlanGoal};
use crate::error::AppError;
use crate::meals::repo_types::MealTimeCategory;
use crate::nutrition::NutrientTotals;

/// One desired scheduled meal. Same id rules as meal items.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledMealInput {
    pub id: Option<Uuid>,
    pub meal: Uuid,
    pub day_of_plan: i32,
}

pub fn validate_schedule(
    items: &[ScheduledMealInput],
    duration_days: i32,
) -> Result<(), AppError> {
    for (i, item) in items.iter().enumerate() {
        if item.day_of_plan < 1 || item.day_of_plan > duration_days {
            return Err(AppError::validation(
                format!("scheduled_meals[{i}].day_of_plan"),
                format!("must be between 1 and {duration_days}"),
            ));
        }
    }
    Ok(())
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct MealPlanFields {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub goal: PlanGoal,
    pub duration_days: i32,
    pub start_date: Option<Date>,
    #[serde(default)]
    pub targets: DailyTargets,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_template: bool,
}

impl MealPlanFields {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("name", "must not be empty"));
        }
        if self.duration_days < 1 {
            return Err(AppError::validation("duration_days", "must be at least 1"));
        }
        let t = &self.targets;
        for (field, v) in [
            ("targets.calories", t.calories),
            ("targets.protein", t.protein),
            ("targets.carbohydrates", t.carbohydrates),
            ("targets.fat", t.fat),
        ] {
            if let Some(v) = v {
                if !(v.is_finite() && v >= 0.0) {
                    return Err(AppError::validation(field, "must be a number >= 0"));
                }
            }
        }
        Ok(())
    }
}

impl From<&MealPlan> for MealPlanFields {
    fn from(p: &MealPlan) -> Self {
        Self {
            name: p.name.clone(),
            description: p.description.clone(),
            goal: p.goal,
            duration_days: p.duration_days,
            start_date: p.start_date,
            targets: p.targets,
            is_active: p.is_active,
            is_template: p.is_template,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMealPlanRequest {
    #[serde(flatten)]
    pub fields: MealPlanFields,
    #[serde(alias = "scheduled_meals_payload")]
    pub scheduled_meals: Option<Vec<ScheduledMealInput>>,
}

/// Absent stays `None`; an explicit `null` becomes `Some(None)`.
fn nullable<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMealPlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub goal: Option<PlanGoal>,
    pub duration_days: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub start_date: Option<Option<Date>>,
    pub targets: Option<DailyTargets>,
    pub is_active: Option<bool>,
    pub is_template: Option<bool>,
    #[serde(alias = "scheduled_meals_payload")]
    pub scheduled_meals: Option<Vec<ScheduledMealInput>>,
}

impl UpdateMealPlanRequest {
    pub fn merge_into(&mut self, f: &mut MealPlanFields) {
        if let Some(v) = self.name.take() {
            f.name = v;
        }
        if let Some(v) = self.description.take() {
            f.description = v;
        }
        if let Some(v) = self.goal {
            f.goal = v;
        }
        if let Some(v) = self.duration_days {
            f.duration_days = v;
        }
        if let Some(v) = self.start_date {
            f.start_date = v;
        }
        if let Some(v) = self.targets {
            f.targets = v;
        }
        if let Some(v) = self.is_active {
            f.is_active = v;
        }
        if let Some(v) = self.is_template {
            f.is_template = v;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScheduledMealSummary {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub meal_time_category: MealTimeCategory,
}

#[derive(Debug, Serialize)]
pub struct ScheduledMealView {
    pub id: Uuid,
    pub day_of_plan: i32,
    pub meal: ScheduledMealSummary,
    pub totals: NutrientTotals,
}

#[derive(Debug, Serialize)]
pub struct DayTotals {
    pub day_of_plan: i32,
    pub totals: NutrientTotals,
}

#[derive(Debug, Serialize)]
pub struct MealPlanDetails {
    #[serde(flatten)]
    pub plan: MealPlan,
    pub scheduled_meals: Vec<ScheduledMealView>,
    pub daily_totals: Vec<DayTotals>,
}

#[derive(Debug, Serialize)]
pub struct MealPlanListItem {
    pub id: Uuid,
    pub name: String,
    pub goal: PlanGoal,
    pub duration_days: i32,
    pub start_date: Option<Date>,
    pub is_active: bool,
    pub is_template: bool,
    pub created_at: OffsetDateTime,
}

impl From<MealPlan> for MealPlanListItem {
    fn from(p: MealPlan) -> Self {
        Self {
            id: p.id,
            name: p.name,
            goal: p.goal,
            duration_days: p.duration_days,
            start_date: p.start_date,
            is_active: p.is_active,
            is_template: p.is_template,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> MealPlanFields {
        serde_json::from_value(json!({
            "name": "Cut",
            "goal": "weight_loss",
            "duration_days": 7
        }))
        .unwrap()
    }

    #[test]
    fn new_plans_default_to_active_non_template() {
        let f = fields();
        assert!(f.is_active);
        assert!(!f.is_template);
        assert_eq!(f.start_date, None);
        assert_eq!(f.targets, DailyTargets::default());
        assert!(f.validate().is_ok());
    }

    fn entry(meal: Uuid, day_of_plan: i32) -> ScheduledMealInput {
        ScheduledMealInput {
            id: None,
            meal,
            day_of_plan,
        }
    }

    #[test]
    fn day_outside_the_plan_is_rejected() {
        let meal = Uuid::new_v4();
        let ok = vec![
            entry(meal, 1),
            entry(meal, 7),
        ];
        assert!(validate_schedule(&ok, 7).is_ok());

        let late = vec![entry(meal, 8)];
        let err = validate_schedule(&late, 7).unwrap_err();
        assert_eq!(
            err.to_string(),
            "scheduled_meals[0].day_of_plan: must be between 1 and 7"
        );

        let zero = vec![entry(meal, 0)];
        assert!(validate_schedule(&zero, 7).is_err());
    }

    #[test]
    fn negative_target_is_rejected() {
        let mut f = fields();
        f.targets.protein = Some(-5.0);
        let err = f.validate().unwrap_err();
        assert_eq!(err.to_string(), "targets.protein: must be a number >= 0");
    }

    #[test]
    fn legacy_payload_name_is_accepted() {
        let req: CreateMealPlanRequest = serde_json::from_value(json!({
            "name": "Cut",
            "goal": "weight_loss",
            "duration_days": 7,
            "scheduled_meals_payload": [{ "meal": Uuid::new_v4(), "day_of_plan": 2 }]
        }))
        .unwrap();
        assert_eq!(req.scheduled_meals.unwrap()[0].day_of_plan, 2);
    }

    #[test]
    fn start_date_can_be_cleared_explicitly() {
        let mut f = fields();
        f.start_date = Some(time::macros::date!(2026 - 10 - 19));

        let mut untouched: UpdateMealPlanRequest =
            serde_json::from_value(json!({ "name": "Cut v2" })).unwrap();
        assert!(untouched.scheduled_meals.is_none());
        untouched.merge_into(&mut f);
        assert!(f.start_date.is_some());
        assert_eq!(f.name, "Cut v2");

        let mut cleared: UpdateMealPlanRequest =
            serde_json::from_value(json!({ "start_date": null })).unwrap();
        cleared.merge_into(&mut f);
        assert_eq!(f.start_date, None);
    }
}
