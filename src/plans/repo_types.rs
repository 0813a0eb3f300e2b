use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::meals::repo_types::{Meal, MealRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanGoal {
    WeightLoss,
    MuscleGain,
    Maintenance,
    GeneralHealth,
}

impl PlanGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanGoal::WeightLoss => "weight_loss",
            PlanGoal::MuscleGain => "muscle_gain",
            PlanGoal::Maintenance => "maintenance",
            PlanGoal::GeneralHealth => "general_health",
        }
    }
}

impl FromStr for PlanGoal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "weight_loss" => PlanGoal::WeightLoss,
            "muscle_gain" => PlanGoal::MuscleGain,
            "maintenance" => PlanGoal::Maintenance,
            "general_health" => PlanGoal::GeneralHealth,
            other => anyhow::bail!("unknown plan goal {other:?}"),
        })
    }
}

#[derive(Debug, FromRow)]
pub struct MealPlanRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub goal: String,
    pub duration_days: i32,
    pub start_date: Option<Date>,
    pub target_daily_calories: Option<f64>,
    pub target_daily_protein: Option<f64>,
    pub target_daily_carbohydrates: Option<f64>,
    pub target_daily_fat: Option<f64>,
    pub is_active: bool,
    pub is_template: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Daily nutrient goals of a plan. All optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyTargets {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub fat: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealPlan {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub goal: PlanGoal,
    pub duration_days: i32,
    pub start_date: Option<Date>,
    pub targets: DailyTargets,
    pub is_active: bool,
    pub is_template: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<MealPlanRow> for MealPlan {
    type Error = anyhow::Error;

    fn try_from(r: MealPlanRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            owner_id: r.owner_id,
            name: r.name,
            description: r.description,
            goal: r.goal.parse()?,
            duration_days: r.duration_days,
            start_date: r.start_date,
            targets: DailyTargets {
                calories: r.target_daily_calories,
                protein: r.target_daily_protein,
                carbohydrates: r.target_daily_carbohydrates,
                fat: r.target_daily_fat,
            },
            is_active: r.is_active,
            is_template: r.is_template,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ScheduledMealRow {
    pub id: Uuid,
    pub meal_plan_id: Uuid,
    pub meal_id: Uuid,
    pub day_of_plan: i32,
}

/// Scheduled entry joined with the meal it points at.
#[derive(Debug, FromRow)]
pub struct ScheduledMealMealRow {
    pub scheduled_id: Uuid,
    pub day_of_plan: i32,
    #[sqlx(flatten)]
    pub meal: MealRow,
}

#[derive(Debug, Clone)]
pub struct ScheduledMeal {
    pub id: Uuid,
    pub day_of_plan: i32,
    pub meal: Meal,
}

impl TryFrom<ScheduledMealMealRow> for ScheduledMeal {
    type Error = anyhow::Error;

    fn try_from(r: ScheduledMealMealRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.scheduled_id,
            day_of_plan: r.day_of_plan,
            meal: Meal::try_from(r.meal)?,
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_plan(owner_id: Uuid, is_template: bool) -> MealPlan {
    MealPlan {
        id: Uuid::new_v4(),
        owner_id,
        name: "Lean bulk".into(),
        description: "Four weeks, high protein".into(),
        goal: PlanGoal::MuscleGain,
        duration_days: 28,
        start_date: Some(time::macros::date!(2026 - 11 - 02)),
        targets: DailyTargets {
            calories: Some(2800.0),
            protein: Some(180.0),
            carbohydrates: None,
            fat: None,
        },
        is_active: false,
        is_template,
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_round_trips_through_the_column_format() {
        for g in [
            PlanGoal::WeightLoss,
            PlanGoal::MuscleGain,
            PlanGoal::Maintenance,
            PlanGoal::GeneralHealth,
        ] {
            assert_eq!(g.as_str().parse::<PlanGoal>().unwrap(), g);
        }
        assert!("bulk".parse::<PlanGoal>().is_err());
    }

    #[test]
    fn goal_serializes_snake_case() {
        let v = serde_json::to_value(PlanGoal::GeneralHealth).unwrap();
        assert_eq!(v, serde_json::json!("general_health"));
    }
}
