use serde::Deserialize;

use super::repo_types::{Food, FoodCategory};
use crate::error::AppError;

/// Writable columns of a food. Doubles as the create payload.
#[derive(Debug, Clone, Deserialize)]
pub struct FoodFields {
    pub name: String,
    #[serde(default)]
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
    #[serde(default)]
    pub food_category: FoodCategory,
    #[serde(default)]
    pub is_public: bool,
}

impl From<&Food> for FoodFields {
    fn from(f: &Food) -> Self {
        Self {
            name: f.name.clone(),
            description: f.description.clone(),
            serving_quantity: f.serving_quantity,
            serving_unit: f.serving_unit.clone(),
            calories: f.calories,
            protein: f.protein,
            carbohydrates: f.carbohydrates,
            fat: f.fat,
            fiber: f.fiber,
            sugar: f.sugar,
            sodium: f.sodium,
            food_category: f.food_category,
            is_public: f.is_public,
        }
    }
}

impl FoodFields {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("name", "must not be empty"));
        }
        if self.serving_unit.trim().is_empty() {
            return Err(AppError::validation("serving_unit", "must not be empty"));
        }
        if !(self.serving_quantity.is_finite() && self.serving_quantity > 0.0) {
            return Err(AppError::validation("serving_quantity", "must be greater than 0"));
        }
        let required = [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbohydrates", self.carbohydrates),
            ("fat", self.fat),
        ];
        let optional = [("fiber", self.fiber), ("sugar", self.sugar), ("sodium", self.sodium)];
        let present = required
            .into_iter()
            .chain(optional.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))));
        for (field, v) in present {
            if !(v.is_finite() && v >= 0.0) {
                return Err(AppError::validation(field, "must be a number >= 0"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateFoodRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub serving_quantity: Option<f64>,
    pub serving_unit: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub fat: Option<f64>,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub sodium: Option<f64>,
    pub food_category: Option<FoodCategory>,
    pub is_public: Option<bool>,
}

impl UpdateFoodRequest {
    pub fn merge_into(self, f: &mut FoodFields) {
        if let Some(v) = self.name {
            f.name = v;
        }
        if let Some(v) = self.description {
            f.description = v;
        }
        if let Some(v) = self.serving_quantity {
            f.serving_quantity = v;
        }
        if let Some(v) = self.serving_unit {
            f.serving_unit = v;
        }
        if let Some(v) = self.calories {
            f.calories = v;
        }
        if let Some(v) = self.protein {
            f.protein = v;
        }
        if let Some(v) = self.carbohydrates {
            f.carbohydrates = v;
        }
        if let Some(v) = self.fat {
            f.fat = v;
        }
        if self.fiber.is_some() {
            f.fiber = self.fiber;
        }
        if self.sugar.is_some() {
            f.sugar = self.sugar;
        }
        if self.sodium.is_some() {
            f.sodium = self.sodium;
        }
        if let Some(v) = self.food_category {
            f.food_category = v;
        }
        if let Some(v) = self.is_public {
            f.is_public = v;
        }
    }
}

/// Sort key of a food listing. A leading `-` sorts descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum FoodOrdering {
    #[default]
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "-name")]
    NameDesc,
    #[serde(rename = "calories")]
    Calories,
    #[serde(rename = "-calories")]
    CaloriesDesc,
    #[serde(rename = "protein")]
    Protein,
    #[serde(rename = "-protein")]
    ProteinDesc,
    #[serde(rename = "created_at")]
    CreatedAt,
    #[serde(rename = "-created_at")]
    CreatedAtDesc,
}

impl FoodOrdering {
    /// `ORDER BY` clause body. Ties fall back to name, then id.
    pub fn order_by(&self) -> &'static str {
        match self {
            FoodOrdering::Name => "name ASC, id ASC",
            FoodOrdering::NameDesc => "name DESC, id ASC",
            FoodOrdering::Calories => "calories ASC, name ASC, id ASC",
            FoodOrdering::CaloriesDesc => "calories DESC, name ASC, id ASC",
            FoodOrdering::Protein => "protein ASC, name ASC, id ASC",
            FoodOrdering::ProteinDesc => "protein DESC, name ASC, id ASC",
            FoodOrdering::CreatedAt => "created_at ASC, id ASC",
            FoodOrdering::CreatedAtDesc => "created_at DESC, id ASC",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FoodQuery {
    pub search: Option<String>,
    pub category: Option<FoodCategory>,
    #[serde(default)]
    pub ordering: FoodOrdering,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foods::repo_types::sample_food;

    fn fields() -> FoodFields {
        FoodFields::from(&sample_food(None, false))
    }

    #[test]
    fn valid_fields_pass() {
        assert!(fields().validate().is_ok());
    }

    #[test]
    fn negative_optional_nutrient_is_rejected() {
        let mut f = fields();
        f.sodium = Some(-1.0);
        let err = f.validate().unwrap_err();
        assert_eq!(err.to_string(), "sodium: must be a number >= 0");
    }

    #[test]
    fn zero_serving_quantity_is_rejected() {
        let mut f = fields();
        f.serving_quantity = 0.0;
        assert!(matches!(f.validate(), Err(AppError::Validation { .. })));
    }

    #[test]
    fn create_payload_defaults_to_private_other() {
        let f: FoodFields = serde_json::from_value(serde_json::json!({
            "name": "Skyr",
            "serving_quantity": 150.0,
            "serving_unit": "g",
            "calories": 95.0,
            "protein": 16.5,
            "carbohydrates": 6.0,
            "fat": 0.3
        }))
        .unwrap();
        assert!(!f.is_public);
        assert_eq!(f.food_category, FoodCategory::Other);
        assert_eq!(f.fiber, None);
    }

    #[test]
    fn update_only_touches_supplied_fields() {
        let mut f = fields();
        UpdateFoodRequest {
            calories: Some(400.0),
            sugar: Some(1.0),
            ..Default::default()
        }
        .merge_into(&mut f);
        assert_eq!(f.calories, 400.0);
        assert_eq!(f.sugar, Some(1.0));
        assert_eq!(f.fiber, Some(10.0));
        assert_eq!(f.name, "Rolled oats");
    }

    #[test]
    fn ordering_defaults_to_name_and_accepts_descending_keys() {
        let q: FoodQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(q.ordering, FoodOrdering::Name);
        assert_eq!(q.limit, 50);

        let q: FoodQuery =
            serde_json::from_value(serde_json::json!({ "ordering": "-protein" })).unwrap();
        assert_eq!(q.ordering, FoodOrdering::ProteinDesc);
        assert_eq!(q.ordering.order_by(), "protein DESC, name ASC, id ASC");

        let bad = serde_json::from_value::<FoodQuery>(serde_json::json!({ "ordering": "fat" }));
        assert!(bad.is_err());
    }
}
