//! Nutrient arithmetic shared by meals and meal plans.
//!
//! A [`NutrientProfile`] describes a food's reference serving; scaling it by a
//! servings multiplier gives what a single meal item contributes. Meal totals are
//! never stored: [`rollup`] recomputes them from the current items on every read.

use serde::{Deserialize, Serialize};

/// Per-serving nutrient values. A `None` field means the value is unknown for the
/// food, which is different from a known zero only when a single profile is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientProfile {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub fat: Option<f64>,
    pub fiber: Option<f64>,
    pub sugar: Option<f64>,
    pub sodium: Option<f64>,
}

impl NutrientProfile {
    /// Multiplies every known value by `multiplier`; unknown values stay unknown.
    pub fn scale(&self, multiplier: f64) -> NutrientProfile {
        let s = |v: Option<f64>| v.map(|v| v * multiplier);
        NutrientProfile {
            calories: s(self.calories),
            protein: s(self.protein),
            carbohydrates: s(self.carbohydrates),
            fat: s(self.fat),
            fiber: s(self.fiber),
            sugar: s(self.sugar),
            sodium: s(self.sodium),
        }
    }
}

/// Summed nutrient values of a meal, a day or any other group of items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbohydrates: f64,
    pub fat: f64,
    pub fiber: f64,
    pub sugar: f64,
    pub sodium: f64,
}

impl NutrientTotals {
    pub fn add_profile(&mut self, p: &NutrientProfile) {
        let add = |acc: &mut f64, v: Option<f64>| {
            if let Some(v) = v {
                *acc += v;
            }
        };
        add(&mut self.calories, p.calories);
        add(&mut self.protein, p.protein);
        add(&mut self.carbohydrates, p.carbohydrates);
        add(&mut self.fat, p.fat);
        add(&mut self.fiber, p.fiber);
        add(&mut self.sugar, p.sugar);
        add(&mut self.sodium, p.sodium);
    }

    pub fn add(&mut self, other: &NutrientTotals) {
        self.calories += other.calories;
        self.protein += other.protein;
        self.carbohydrates += other.carbohydrates;
        self.fat += other.fat;
        self.fiber += other.fiber;
        self.sugar += other.sugar;
        self.sodium += other.sodium;
    }
}

/// Sums `profile.scale(servings)` over `items`.
pub fn rollup<I>(items: I) -> NutrientTotals
where
    I: IntoIterator<Item = (NutrientProfile, f64)>,
{
    let mut totals = NutrientTotals::default();
    for (profile, servings) in items {
        totals.add_profile(&profile.scale(servings));
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oats() -> NutrientProfile {
        NutrientProfile {
            calories: Some(380.0),
            protein: Some(13.0),
            carbohydrates: Some(67.0),
            fat: Some(7.0),
            fiber: Some(10.0),
            sugar: None,
            sodium: Some(2.0),
        }
    }

    fn banana() -> NutrientProfile {
        NutrientProfile {
            calories: Some(89.0),
            protein: Some(1.1),
            carbohydrates: Some(23.0),
            fat: Some(0.3),
            fiber: None,
            sugar: Some(12.0),
            sodium: None,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn scale_keeps_absent_values_absent() {
        let p = NutrientProfile {
            calories: Some(100.0),
            fiber: None,
            ..Default::default()
        };
        let scaled = p.scale(1.5);
        assert_eq!(scaled.calories, Some(150.0));
        assert_eq!(scaled.fiber, None);
        assert_eq!(scaled.protein, None);
    }

    #[test]
    fn scale_by_one_is_identity() {
        assert_eq!(oats().scale(1.0), oats());
    }

    #[test]
    fn rollup_of_nothing_is_zero() {
        let items: Vec<(NutrientProfile, f64)> = Vec::new();
        assert_eq!(rollup(items), NutrientTotals::default());
    }

    #[test]
    fn rollup_sums_scaled_values_per_field() {
        let totals = rollup(vec![(oats(), 0.5), (banana(), 2.0)]);

        assert!(approx(totals.calories, 380.0 * 0.5 + 89.0 * 2.0));
        assert!(approx(totals.protein, 13.0 * 0.5 + 1.1 * 2.0));
        assert!(approx(totals.carbohydrates, 67.0 * 0.5 + 23.0 * 2.0));
        assert!(approx(totals.fat, 7.0 * 0.5 + 0.3 * 2.0));
        // banana has no fiber or sodium, oats have no sugar
        assert!(approx(totals.fiber, 10.0 * 0.5));
        assert!(approx(totals.sugar, 12.0 * 2.0));
        assert!(approx(totals.sodium, 2.0 * 0.5));
    }

    #[test]
    fn totals_add_is_fieldwise() {
        let mut day = rollup(vec![(oats(), 1.0)]);
        day.add(&rollup(vec![(oats(), 1.0)]));
        assert!(approx(day.calories, 760.0));
        assert!(approx(day.sugar, 0.0));
    }
}
