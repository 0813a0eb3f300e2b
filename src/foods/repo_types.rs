use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::nutrition::NutrientProfile;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodCategory {
    Fruit,
    Vegetable,
    Grain,
    Protein,
    Dairy,
    FatOil,
    Beverage,
    Snack,
    #[default]
    Other,
}

impl FoodCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoodCategory::Fruit => "fruit",
            FoodCategory::Vegetable => "vegetable",
            FoodCategory::Grain => "grain",
            FoodCategory::Protein => "protein",
            FoodCategory::Dairy => "dairy",
            FoodCategory::FatOil => "fat_oil",
            FoodCategory::Beverage => "beverage",
            FoodCategory::Snack => "snack",
            FoodCategory::Other => "other",
        }
    }
}

impl FromStr for FoodCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "fruit" => FoodCategory::Fruit,
            "vegetable" => FoodCategory::Vegetable,
            "grain" => FoodCategory::Grain,
            "protein" => FoodCategory::Protein,
            "dairy" => FoodCategory::Dairy,
            "fat_oil" => FoodCategory::FatOil,
            "beverage" => FoodCategory::Beverage,
            "snack" => FoodCategory::Snack,
            "other" => FoodCategory::Other,
            other => anyhow::bail!("unknown food category {other:?}"),
        })
    }
}

#[derive(Debug, FromRow)]
pub struct FoodRow {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub serving_quantity: f64,
    pub serving_unit: String,
    pub calories: f64,
    pub protein: f64,
    pub carbohydrates: f64,
    pub fat: f64,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub sodium: Option<f64>,
    pub food_category: String,
    pub is_public: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A food and the nutrients of one reference serving of it.
/// `owner_id == None` marks a system food.
#[derive(Debug, Clone, Serialize)]
pub struct Food {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub serving_quantity: f64,
    pub serving_unit: String,
    pub calories: f64,
    pub protein: f64,
    pub carbohydrates: f64,
    pub fat: f64,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub sodium: Option<f64>,
    pub food_category: FoodCategory,
    pub is_public: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Food {
    pub fn profile(&self) -> NutrientProfile {
        NutrientProfile {
            calories: Some(self.calories),
            protein: Some(self.protein),
            carbohydrates: Some(self.carbohydrates),
            fat: Some(self.fat),
            fiber: self.fiber,
            sugar: self.sugar,
            sodium: self.sodium,
        }
    }

    /// Only the owner may change a food, and only while it is private.
    pub fn editable_by(&self, user_id: Uuid) -> bool {
        !self.is_public && self.owner_id == Some(user_id)
    }
}

impl TryFrom<FoodRow> for Food {
    type Error = anyhow::Error;

    fn try_from(r: FoodRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            owner_id: r.owner_id,
            name: r.name,
            description: r.description,
            serving_quantity: r.serving_quantity,
            serving_unit: r.serving_unit,
            calories: r.calories,
            protein: r.protein,
            carbohydrates: r.carbohydrates,
            fat: r.fat,
            fiber: r.fiber,
            sugar: r.sugar,
            sodium: r.sodium,
            food_category: r.food_category.parse()?,
            is_public: r.is_public,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_food(owner_id: Option<Uuid>, is_public: bool) -> Food {
    Food {
        id: Uuid::new_v4(),
        owner_id,
        name: "Rolled oats".into(),
        description: String::new(),
        serving_quantity: 100.0,
        serving_unit: "g".into(),
        calories: 380.0,
        protein: 13.0,
        carbohydrates: 67.0,
        fat: 7.0,
        fiber: Some(10.0),
        sugar: None,
        sodium: None,
        food_category: FoodCategory::Grain,
        is_public,
        created_at: OffsetDateTime::UNIX_EPOCH,
        updated_at: OffsetDateTime::UNIX_EPOCH,
    }
}
