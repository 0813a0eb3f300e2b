use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{meal_totals, Meal, MealItem, MealTimeCategory};
use crate::error::AppError;
use crate::foods::repo_types::Food;
use crate::nutrition::{NutrientProfile, NutrientTotals};

pub const MIN_SERVINGS: f64 = 0.01;

/// One desired meal item. Without `id` (or with an id the meal doesn't own) it is
/// created, otherwise the item with that id is updated in place.
#[derive(Debug, Clone, Deserialize)]
pub struct MealItemInput {
    pub id: Option<Uuid>,
    pub food: Uuid,
    #[serde(alias = "number_of_servings")]
    pub servings: f64,
}

pub fn validate_items(items: &[MealItemInput]) -> Result<(), AppError> {
    for (i, item) in items.iter().enumerate() {
        if !(item.servings.is_finite() && item.servings >= MIN_SERVINGS) {
            return Err(AppError::validation(
                format!("meal_items[{i}].servings"),
                format!("must be at least {MIN_SERVINGS}"),
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct MealFields {
    pub name: String,
    pub meal_time_category: MealTimeCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_template: bool,
}

impl MealFields {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("name", "must not be empty"));
        }
        Ok(())
    }
}

impl From<&Meal> for MealFields {
    fn from(m: &Meal) -> Self {
        Self {
            name: m.name.clone(),
            meal_time_category: m.meal_time_category,
            description: m.description.clone(),
            is_template: m.is_template,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateMealRequest {
    #[serde(flatten)]
    pub fields: MealFields,
    pub meal_items: Option<Vec<MealItemInput>>,
}

/// Partial update. `meal_items: None` leaves the items alone, `Some(vec![])`
/// removes all of them.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMealRequest {
    pub name: Option<String>,
    pub meal_time_category: Option<MealTimeCategory>,
    pub description: Option<String>,
    pub is_template: Option<bool>,
    pub meal_items: Option<Vec<MealItemInput>>,
}

impl UpdateMealRequest {
    pub fn merge_into(&mut self, f: &mut MealFields) {
        if let Some(v) = self.name.take() {
            f.name = v;
        }
        if let Some(v) = self.meal_time_category {
            f.meal_time_category = v;
        }
        if let Some(v) = self.description.take() {
            f.description = v;
        }
        if let Some(v) = self.is_template {
            f.is_template = v;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealItemView {
    pub id: Uuid,
    pub servings: f64,
    pub food: Food,
    pub calculated: NutrientProfile,
}

impl From<MealItem> for MealItemView {
    fn from(i: MealItem) -> Self {
        Self {
            id: i.id,
            servings: i.servings,
            calculated: i.calculated(),
            food: i.food,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealDetails {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub meal_time_category: MealTimeCategory,
    pub description: String,
    pub is_template: bool,
    pub meal_items: Vec<MealItemView>,
    pub totals: NutrientTotals,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl MealDetails {
    pub fn new(meal: Meal, items: Vec<MealItem>) -> Self {
        let totals = meal_totals(&items);
        Self {
            id: meal.id,
            owner_id: meal.owner_id,
            name: meal.name,
            meal_time_category: meal.meal_time_category,
            description: meal.description,
            is_template: meal.is_template,
            meal_items: items.into_iter().map(MealItemView::from).collect(),
            totals,
            created_at: meal.created_at,
            updated_at: meal.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealListItem {
    pub id: Uuid,
    pub name: String,
    pub meal_time_category: MealTimeCategory,
    pub is_template: bool,
    pub item_count: usize,
    pub totals: NutrientTotals,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}
