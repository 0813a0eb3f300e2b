use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::foods::repo_types::{Food, FoodRow};
use crate::nutrition::{rollup, NutrientProfile, NutrientTotals};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealTimeCategory {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    PreWorkout,
    PostWorkout,
}

impl MealTimeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealTimeCategory::Breakfast => "breakfast",
            MealTimeCategory::Lunch => "lunch",
            MealTimeCategory::Dinner => "dinner",
            MealTimeCategory::Snack => "snack",
            MealTimeCategory::PreWorkout => "pre_workout",
            MealTimeCategory::PostWorkout => "post_workout",
        }
    }
}

impl FromStr for MealTimeCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "breakfast" => MealTimeCategory::Breakfast,
            "lunch" => MealTimeCategory::Lunch,
            "dinner" => MealTimeCategory::Dinner,
            "snack" => MealTimeCategory::Snack,
            "pre_workout" => MealTimeCategory::PreWorkout,
            "post_workout" => MealTimeCategory::PostWorkout,
            other => anyhow::bail!("unknown meal time category {other:?}"),
        })
    }
}

#[derive(Debug, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub meal_time_category: String,
    pub description: String,
    pub is_template: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meal {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub meal_time_category: MealTimeCategory,
    pub description: String,
    pub is_template: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Meal {
    /// Owners see their meals; templates are readable by everyone.
    pub fn visible_to(&self, user_id: Uuid) -> bool {
        self.is_template || self.owner_id == user_id
    }
}

/// First id in `wanted` that is missing from `found` or hidden from `user_id`.
pub fn first_unusable_meal<'a, I>(wanted: I, found: &[Meal], user_id: Uuid) -> Option<Uuid>
where
    I: IntoIterator<Item = &'a Uuid>,
{
    wanted.into_iter().copied().find(|id| {
        !found
            .iter()
            .any(|m| m.id == *id && m.visible_to(user_id))
    })
}

impl TryFrom<MealRow> for Meal {
    type Error = anyhow::Error;

    fn try_from(r: MealRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            owner_id: r.owner_id,
            name: r.name,
            meal_time_category: r.meal_time_category.parse()?,
            description: r.description,
            is_template: r.is_template,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Bare child row, as the reconciler sees it.
#[derive(Debug, FromRow)]
pub struct MealItemRow {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub food_id: Uuid,
    pub servings: f64,
}

/// Item joined with its food for reads.
#[derive(Debug, FromRow)]
pub struct MealItemFoodRow {
    pub item_id: Uuid,
    pub meal_id: Uuid,
    pub servings: f64,
    #[sqlx(flatten)]
    pub food: FoodRow,
}

#[derive(Debug, Clone)]
pub struct MealItem {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub servings: f64,
    pub food: Food,
}

impl MealItem {
    /// What this item contributes: the food's profile times `servings`.
    pub fn calculated(&self) -> NutrientProfile {
        self.food.profile().scale(self.servings)
    }
}

impl TryFrom<MealItemFoodRow> for MealItem {
    type Error = anyhow::Error;

    fn try_from(r: MealItemFoodRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.item_id,
            meal_id: r.meal_id,
            servings: r.servings,
            food: Food::try_from(r.food)?,
        })
    }
}

pub fn meal_totals<'a, I>(items: I) -> NutrientTotals
where
    I: IntoIterator<Item = &'a MealItem>,
{
    rollup(items.into_iter().map(|i| (i.food.profile(), i.servings)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foods::repo_types::sample_food;

    fn item(food: Food, servings: f64) -> MealItem {
        MealItem {
            id: Uuid::new_v4(),
            meal_id: Uuid::new_v4(),
            servings,
            food,
        }
    }

    #[test]
    fn category_parses_column_values() {
        assert_eq!(
            "pre_workout".parse::<MealTimeCategory>().unwrap(),
            MealTimeCategory::PreWorkout
        );
        assert_eq!(MealTimeCategory::PostWorkout.as_str(), "post_workout");
        assert!("brunch".parse::<MealTimeCategory>().is_err());
    }

    #[test]
    fn calculated_values_scale_the_food() {
        // 150 g of a food described per 100 g
        let i = item(sample_food(None, true), 1.5);
        let c = i.calculated();
        assert_eq!(c.calories, Some(570.0));
        assert_eq!(c.fiber, Some(15.0));
        assert_eq!(c.sugar, None);
    }

    #[test]
    fn totals_follow_the_item_formula() {
        let mut sweet = sample_food(None, true);
        sweet.calories = 89.0;
        sweet.sugar = Some(12.0);
        sweet.fiber = None;
        let items = vec![item(sample_food(None, true), 0.5), item(sweet, 2.0)];

        let totals = meal_totals(&items);
        let expected_calories: f64 = items.iter().map(|i| i.food.calories * i.servings).sum();
        let expected_fiber: f64 = items
            .iter()
            .filter_map(|i| i.food.fiber.map(|f| f * i.servings))
            .sum();
        assert!((totals.calories - expected_calories).abs() < 1e-9);
        assert!((totals.fiber - expected_fiber).abs() < 1e-9);
        assert!((totals.sugar - 24.0).abs() < 1e-9);
        assert_eq!(totals.sodium, 0.0);
    }

    fn meal(owner_id: Uuid, is_template: bool) -> Meal {
        Meal {
            id: Uuid::new_v4(),
            owner_id,
            name: "Oat bowl".into(),
            meal_time_category: MealTimeCategory::Breakfast,
            description: String::new(),
            is_template,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn own_meals_and_templates_are_usable() {
        let user = Uuid::new_v4();
        let own = meal(user, false);
        let template = meal(Uuid::new_v4(), true);
        let found = vec![own.clone(), template.clone()];

        assert_eq!(first_unusable_meal(&[own.id, template.id], &found, user), None);
    }

    #[test]
    fn someone_elses_private_meal_is_unusable() {
        let user = Uuid::new_v4();
        let own = meal(user, false);
        let private = meal(Uuid::new_v4(), false);
        let found = vec![own.clone(), private.clone()];

        assert!(!private.visible_to(user));
        assert_eq!(
            first_unusable_meal(&[own.id, private.id], &found, user),
            Some(private.id)
        );
    }

    #[test]
    fn unknown_meal_is_unusable() {
        let user = Uuid::new_v4();
        let missing = Uuid::new_v4();
        assert_eq!(first_unusable_meal(&[missing], &[], user), Some(missing));
    }
}
