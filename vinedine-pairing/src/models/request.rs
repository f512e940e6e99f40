//! Validated recipe request
//!
//! A [`RecipeRequest`] can only be built through validating constructors, so
//! everything downstream of the orchestrator's validation step may assume a
//! non-empty ingredient list and a known cuisine and dietary requirement.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between ingredients in raw user input
pub const INGREDIENT_SEPARATOR: char = ',';

/// Bad user input, rejected before any network call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Ingredient list is empty")]
    EmptyIngredients,

    #[error("Ingredients must be separated by ','")]
    MissingSeparator,

    #[error("Unknown cuisine: {0}")]
    UnknownCuisine(String),

    #[error("Unknown dietary requirement: {0}")]
    UnknownDietaryRequirement(String),
}

/// Cuisines offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cuisine {
    Italian,
    Chinese,
    Indian,
    Mexican,
    Japanese,
    Mediterranean,
    MiddleEastern,
    Thai,
    American,
    Greek,
    French,
    Spanish,
    SouthAfrican,
}

impl Cuisine {
    pub const ALL: [Cuisine; 13] = [
        Cuisine::Italian,
        Cuisine::Chinese,
        Cuisine::Indian,
        Cuisine::Mexican,
        Cuisine::Japanese,
        Cuisine::Mediterranean,
        Cuisine::MiddleEastern,
        Cuisine::Thai,
        Cuisine::American,
        Cuisine::Greek,
        Cuisine::French,
        Cuisine::Spanish,
        Cuisine::SouthAfrican,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cuisine::Italian => "Italian",
            Cuisine::Chinese => "Chinese",
            Cuisine::Indian => "Indian",
            Cuisine::Mexican => "Mexican",
            Cuisine::Japanese => "Japanese",
            Cuisine::Mediterranean => "Mediterranean",
            Cuisine::MiddleEastern => "Middle Eastern",
            Cuisine::Thai => "Thai",
            Cuisine::American => "American",
            Cuisine::Greek => "Greek",
            Cuisine::French => "French",
            Cuisine::Spanish => "Spanish",
            Cuisine::SouthAfrican => "South African",
        }
    }
}

impl fmt::Display for Cuisine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cuisine {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Cuisine::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownCuisine(wanted.to_string()))
    }
}

/// Dietary constraints offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DietaryRequirement {
    AnythingGoes,
    Keto,
    LowFat,
    Under300Calories,
    Vegetarian,
    Vegan,
    GlutenFree,
}

impl DietaryRequirement {
    pub const ALL: [DietaryRequirement; 7] = [
        DietaryRequirement::AnythingGoes,
        DietaryRequirement::Keto,
        DietaryRequirement::LowFat,
        DietaryRequirement::Under300Calories,
        DietaryRequirement::Vegetarian,
        DietaryRequirement::Vegan,
        DietaryRequirement::GlutenFree,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DietaryRequirement::AnythingGoes => "Anything goes",
            DietaryRequirement::Keto => "Keto",
            DietaryRequirement::LowFat => "Low fat",
            DietaryRequirement::Under300Calories => "Under 300 calories",
            DietaryRequirement::Vegetarian => "Vegetarian",
            DietaryRequirement::Vegan => "Vegan",
            DietaryRequirement::GlutenFree => "Gluten-free",
        }
    }
}

impl fmt::Display for DietaryRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DietaryRequirement {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        DietaryRequirement::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownDietaryRequirement(wanted.to_string()))
    }
}

/// User input for one pairing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeRequest {
    ingredients: Vec<String>,
    dietary_requirement: DietaryRequirement,
    cuisine: Cuisine,
}

impl RecipeRequest {
    /// Build from already-split ingredients; blank items are dropped
    pub fn new(
        ingredients: Vec<String>,
        cuisine: Cuisine,
        dietary_requirement: DietaryRequirement,
    ) -> Result<Self, ValidationError> {
        let ingredients: Vec<String> = ingredients
            .into_iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();

        if ingredients.is_empty() {
            return Err(ValidationError::EmptyIngredients);
        }

        Ok(Self {
            ingredients,
            dietary_requirement,
            cuisine,
        })
    }

    /// Build from raw form input such as `"chicken, peanuts, chilli"`
    pub fn parse(
        raw_ingredients: &str,
        cuisine: &str,
        dietary_requirement: &str,
    ) -> Result<Self, ValidationError> {
        let raw = raw_ingredients.trim();
        if raw.is_empty() {
            return Err(ValidationError::EmptyIngredients);
        }
        if !raw.contains(INGREDIENT_SEPARATOR) {
            return Err(ValidationError::MissingSeparator);
        }

        let cuisine = cuisine.parse()?;
        let dietary_requirement = dietary_requirement.parse()?;
        let ingredients = raw
            .split(INGREDIENT_SEPARATOR)
            .map(str::to_string)
            .collect();

        Self::new(ingredients, cuisine, dietary_requirement)
    }

    pub fn ingredients(&self) -> &[String] {
        &self.ingredients
    }

    pub fn cuisine(&self) -> Cuisine {
        self.cuisine
    }

    pub fn dietary_requirement(&self) -> DietaryRequirement {
        self.dietary_requirement
    }

    /// Ingredients joined for prompt embedding
    pub fn ingredient_list(&self) -> String {
        self.ingredients.join(", ")
    }
}
