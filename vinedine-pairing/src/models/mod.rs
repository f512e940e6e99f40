//! Data model for the pairing pipeline

pub mod composite;
pub mod recipe;
pub mod request;

pub use composite::{CompositeRecord, SongOutcome, TrackSelection};
pub use recipe::{RecipeResult, SectionLabel};
pub use request::{Cuisine, DietaryRequirement, RecipeRequest, ValidationError};
