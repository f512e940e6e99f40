//! Generated recipe and its section labels

use serde::Serialize;
use std::collections::BTreeMap;

/// Markers the generation prompt asks for verbatim
///
/// `ALL` is also the matching order: when a line contains more than one
/// token, the earliest entry wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionLabel {
    Title,
    Ingredients,
    Instructions,
    WinePairing,
    WineRecommendation,
    Spices,
    Calories,
    SongRecommendation,
}

impl SectionLabel {
    pub const ALL: [SectionLabel; 8] = [
        SectionLabel::Title,
        SectionLabel::Ingredients,
        SectionLabel::Instructions,
        SectionLabel::WinePairing,
        SectionLabel::WineRecommendation,
        SectionLabel::Spices,
        SectionLabel::Calories,
        SectionLabel::SongRecommendation,
    ];

    /// Literal text marking the section in generated output
    pub fn token(&self) -> &'static str {
        match self {
            SectionLabel::Title => "Title:",
            SectionLabel::Ingredients => "Ingredients:",
            SectionLabel::Instructions => "Instructions:",
            SectionLabel::WinePairing => "Wine pairing:",
            SectionLabel::WineRecommendation => "South African wine recommendation:",
            SectionLabel::Spices => "Complimentary spices and herbs:",
            SectionLabel::Calories => "Estimated calories per portion:",
            SectionLabel::SongRecommendation => "Song recommendation:",
        }
    }

    /// First label whose token appears in `line`
    pub fn find_in(line: &str) -> Option<SectionLabel> {
        SectionLabel::ALL
            .into_iter()
            .find(|label| line.contains(label.token()))
    }
}

/// Output of one generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeResult {
    /// Recipe name, absent when the text carries no `Title:` line
    pub title: Option<String>,
    /// Raw generated text
    pub body: String,
    pub sections: BTreeMap<SectionLabel, String>,
}

impl RecipeResult {
    /// Derive title and sections from raw generated text
    pub fn from_text(body: String) -> Self {
        let title = crate::extraction::extract_title(&body);
        let sections = crate::extraction::split_sections(&body);
        Self {
            title,
            body,
            sections,
        }
    }

    pub fn section(&self, label: SectionLabel) -> Option<&str> {
        self.sections.get(&label).map(String::as_str)
    }
}
