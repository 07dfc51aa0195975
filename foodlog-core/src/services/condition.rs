// Condition log: one symptom note and one breath note per calendar day, last write wins

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use color_eyre::Result;
use serde::Serialize;

use crate::markdown::{build_day_filename, format_date, format_time, render_frontmatter};
use crate::store::FileStore;
use crate::types::{BreathSmell, Condition};

use super::CONDITION_LOG_DIR;

/// What was written for a day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionRecord {
    pub path: PathBuf,
    pub content: String,
}

#[derive(Serialize)]
struct ConditionFrontmatter {
    date: String,
    time: String,
    symptoms: Symptoms,
}

#[derive(Serialize)]
struct Symptoms {
    bloating: bool,
    diarrhea: bool,
    well_being: u8,
}

#[derive(Serialize)]
struct BreathFrontmatter {
    date: String,
    time: String,
    breath_smell: BreathSmell,
}

#[derive(Debug, Clone)]
pub struct ConditionService {
    store: FileStore,
    log_dir: PathBuf,
}

impl ConditionService {
    pub fn new(store: FileStore) -> Self {
        Self::with_dir(store, CONDITION_LOG_DIR)
    }

    pub fn with_dir(store: FileStore, log_dir: impl Into<PathBuf>) -> Self {
        ConditionService {
            store,
            log_dir: log_dir.into(),
        }
    }

    /// Write the day's condition note, replacing any earlier one for that date
    pub fn persist(
        &self,
        timestamp: &DateTime<FixedOffset>,
        condition: &Condition,
    ) -> Result<ConditionRecord> {
        let content = Self::render(timestamp, condition)?;
        let filename = build_day_filename(timestamp, "condition");
        let path = self.store.write_text(self.log_dir.join(filename), &content)?;
        Ok(ConditionRecord { path, content })
    }

    /// Write the day's breath note, replacing any earlier one for that date
    pub fn persist_breath(
        &self,
        timestamp: &DateTime<FixedOffset>,
        smell: BreathSmell,
    ) -> Result<ConditionRecord> {
        let payload = BreathFrontmatter {
            date: format_date(timestamp),
            time: format_time(timestamp),
            breath_smell: smell,
        };
        let content = render_frontmatter(&payload, None)?;
        let filename = build_day_filename(timestamp, "breath");
        let path = self.store.write_text(self.log_dir.join(filename), &content)?;
        Ok(ConditionRecord { path, content })
    }

    fn render(timestamp: &DateTime<FixedOffset>, condition: &Condition) -> Result<String> {
        let payload = ConditionFrontmatter {
            date: format_date(timestamp),
            time: format_time(timestamp),
            symptoms: Symptoms {
                bloating: condition.bloating(),
                diarrhea: condition.diarrhea(),
                well_being: condition.well_being(),
            },
        };
        render_frontmatter(&payload, None)
    }
}
