use serde::{Deserialize, Serialize};

pub const PROTEIN_KCAL_PER_G: f64 = 4.0;
pub const FAT_KCAL_PER_G: f64 = 9.0;
pub const CARBS_KCAL_PER_G: f64 = 4.0;

/// Energy in kcal for the given macro grams.
#[must_use]
pub fn calories(proteins: f64, fats: f64, carbs: f64) -> f64 {
    proteins * PROTEIN_KCAL_PER_G + fats * FAT_KCAL_PER_G + carbs * CARBS_KCAL_PER_G
}

/// Macro grams per 100 g of a food.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MacroDensity {
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
}

impl MacroDensity {
    #[must_use]
    pub fn new(proteins: f64, fats: f64, carbs: f64) -> Self {
        Self {
            proteins,
            fats,
            carbs,
        }
    }

    #[must_use]
    pub fn calories_per_100g(&self) -> f64 {
        calories(self.proteins, self.fats, self.carbs)
    }

    /// Scale the density to an absolute weight. No validation happens here;
    /// callers check weight and density ranges first.
    #[must_use]
    pub fn scale(&self, weight_g: f64) -> Macros {
        let scale = weight_g / 100.0;
        Macros {
            proteins: self.proteins * scale,
            fats: self.fats * scale,
            carbs: self.carbs * scale,
        }
    }

    /// Calorie readout for a density and weight, as shown while filling in a new entry.
    #[must_use]
    pub fn preview_calories(&self, weight_g: f64) -> f64 {
        self.calories_per_100g() * (weight_g / 100.0)
    }
}

/// Absolute macro grams for an actual weight of food.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Macros {
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
}

impl Macros {
    #[must_use]
    pub fn calories(&self) -> f64 {
        calories(self.proteins, self.fats, self.carbs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calories_formula() {
        assert!((calories(1.0, 1.0, 1.0) - 17.0).abs() < f64::EPSILON);
        assert!((calories(200.0, 80.0, 300.0) - 2720.0).abs() < f64::EPSILON);
        assert_eq!(calories(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_scale_chicken_breast() {
        let density = MacroDensity::new(31.0, 3.6, 0.0);
        let macros = density.scale(150.0);
        assert!((macros.proteins - 46.5).abs() < 1e-9);
        assert!((macros.fats - 5.4).abs() < 1e-9);
        assert_eq!(macros.carbs, 0.0);
        // 46.5*4 + 5.4*9 = 186 + 48.6
        assert!((macros.calories() - 234.6).abs() < 1e-9);
    }

    #[test]
    fn test_scale_100g_is_identity() {
        let density = MacroDensity::new(20.0, 5.0, 12.5);
        let macros = density.scale(100.0);
        assert_eq!(macros.proteins, 20.0);
        assert_eq!(macros.fats, 5.0);
        assert_eq!(macros.carbs, 12.5);
    }

    #[test]
    fn test_preview_matches_scaled_calories() {
        let density = MacroDensity::new(20.0, 5.0, 0.0);
        // 20*4 + 5*9 = 125 kcal/100g
        assert!((density.calories_per_100g() - 125.0).abs() < f64::EPSILON);
        let preview = density.preview_calories(250.0);
        assert!((preview - density.scale(250.0).calories()).abs() < 1e-9);
        assert!((preview - 312.5).abs() < 1e-9);
    }
}
