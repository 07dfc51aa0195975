// Core type definitions for Foodlog

use chrono::{DateTime, FixedOffset};
use color_eyre::{eyre::eyre, Report, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const MIN_WELL_BEING: u8 = 1;
pub const MAX_WELL_BEING: u8 = 10;

/// Identity under which one conversation's state is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub chat_id: i64,
    pub user_id: i64,
}

impl SessionKey {
    pub fn new(chat_id: i64, user_id: i64) -> Self {
        SessionKey { chat_id, user_id }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat_id, self.user_id)
    }
}

/// Where a conversation currently is in the meal-logging flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueState {
    #[default]
    Idle,
    AddingFoods,
    ConfirmFinish,
    AskConditionBloating,
    AskConditionDiarrhea,
    AskConditionWellBeing,
    Persisting,
}

/// Meal being assembled line by line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodEventDraft {
    pub started_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub foods_raw: Vec<String>,
    /// Token for the food-log filename, fixed on the first save attempt
    /// so a retried save rewrites the same file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,
}

impl FoodEventDraft {
    pub fn new(started_at: DateTime<FixedOffset>) -> Self {
        FoodEventDraft {
            started_at,
            foods_raw: Vec::new(),
            log_id: None,
        }
    }

    pub fn append_foods<I, S>(&mut self, foods: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.foods_raw.extend(foods.into_iter().map(Into::into));
    }

    pub fn is_empty(&self) -> bool {
        self.foods_raw.is_empty()
    }
}

/// Symptom questionnaire answers collected so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionDraft {
    pub bloating: Option<bool>,
    pub diarrhea: Option<bool>,
    pub well_being: Option<u8>,
}

impl ConditionDraft {
    pub fn is_complete(&self) -> bool {
        self.bloating.is_some() && self.diarrhea.is_some() && self.well_being.is_some()
    }
}

/// Fully answered questionnaire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    bloating: bool,
    diarrhea: bool,
    well_being: u8,
}

impl Condition {
    pub fn new(bloating: bool, diarrhea: bool, well_being: u8) -> Result<Self> {
        if !(MIN_WELL_BEING..=MAX_WELL_BEING).contains(&well_being) {
            return Err(eyre!(
                "well_being must be between {} and {}, got {}",
                MIN_WELL_BEING,
                MAX_WELL_BEING,
                well_being
            ));
        }
        Ok(Condition {
            bloating,
            diarrhea,
            well_being,
        })
    }

    pub fn bloating(&self) -> bool {
        self.bloating
    }

    pub fn diarrhea(&self) -> bool {
        self.diarrhea
    }

    pub fn well_being(&self) -> u8 {
        self.well_being
    }
}

impl TryFrom<&ConditionDraft> for Condition {
    type Error = Report;

    fn try_from(draft: &ConditionDraft) -> Result<Self> {
        match (draft.bloating, draft.diarrhea, draft.well_being) {
            (Some(bloating), Some(diarrhea), Some(well_being)) => {
                Condition::new(bloating, diarrhea, well_being)
            }
            _ => Err(eyre!("Condition questionnaire is incomplete")),
        }
    }
}

/// How noticeable bad breath is; logged at most once per day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathSmell {
    None,
    Mild,
    Strong,
}

impl BreathSmell {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreathSmell::None => "none",
            BreathSmell::Mild => "mild",
            BreathSmell::Strong => "strong",
        }
    }
}

impl fmt::Display for BreathSmell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BreathSmell {
    type Err = Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(BreathSmell::None),
            "mild" => Ok(BreathSmell::Mild),
            "strong" => Ok(BreathSmell::Strong),
            other => Err(eyre!(
                "Unknown breath smell '{}', expected none, mild or strong",
                other
            )),
        }
    }
}

/// Result of persisting one meal with its symptoms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedFoodEvent {
    pub food_log_path: PathBuf,
    pub condition_log_path: PathBuf,
    /// Deduplicated ingredients, original casing
    pub foods: Vec<String>,
    /// Catalog notes touched for this event (empty when the catalog step failed)
    pub catalog_paths: Vec<PathBuf>,
    /// Set when catalog notes could not be written; the logs were still saved
    pub catalog_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_condition_draft_completeness() {
        let mut draft = ConditionDraft::default();
        assert!(!draft.is_complete());
        assert!(Condition::try_from(&draft).is_err());

        draft.bloating = Some(true);
        draft.diarrhea = Some(false);
        assert!(!draft.is_complete());

        draft.well_being = Some(6);
        assert!(draft.is_complete());

        let condition = Condition::try_from(&draft).unwrap();
        assert!(condition.bloating());
        assert!(!condition.diarrhea());
        assert_eq!(condition.well_being(), 6);
    }

    #[test]
    fn test_condition_rejects_out_of_range_score() {
        assert!(Condition::new(false, false, 0).is_err());
        assert!(Condition::new(false, false, 11).is_err());
        assert!(Condition::new(false, false, 1).is_ok());
        assert!(Condition::new(false, false, 10).is_ok());
    }

    #[test]
    fn test_draft_round_trips_through_json() {
        let started_at = FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 12, 19, 30, 0)
            .unwrap();
        let mut draft = FoodEventDraft::new(started_at);
        draft.append_foods(["Паста", "Сыр"]);

        let value = serde_json::to_value(&draft).unwrap();
        let back: FoodEventDraft = serde_json::from_value(value).unwrap();
        assert_eq!(back, draft);
        assert_eq!(back.started_at.offset().local_minus_utc(), 3 * 3600);
    }

    #[test]
    fn test_dialogue_state_serializes_snake_case() {
        let json = serde_json::to_string(&DialogueState::AskConditionWellBeing).unwrap();
        assert_eq!(json, "\"ask_condition_well_being\"");
    }

    #[test]
    fn test_breath_smell_parses_cli_words() {
        assert_eq!(" Strong ".parse::<BreathSmell>().unwrap(), BreathSmell::Strong);
        assert_eq!("none".parse::<BreathSmell>().unwrap(), BreathSmell::None);
        assert!("awful".parse::<BreathSmell>().is_err());
        assert_eq!(BreathSmell::Mild.to_string(), "mild");
    }
}
