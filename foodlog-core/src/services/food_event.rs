// Food-event orchestration: catalog notes, then the meal log, then the day's condition

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::{eyre::WrapErr, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::clock::{Clock, SHORT_ID_LEN};
use crate::markdown::{
    backlink, build_log_filename, format_date, format_time, render_frontmatter, FOODTRACKER_TAG,
};
use crate::normalize::{deduplicate_preserve_order, normalize_key};
use crate::store::FileStore;
use crate::types::{Condition, FoodEventDraft, PersistedFoodEvent};

use super::{ConditionService, FoodsService, FOOD_LOG_DIR};

#[derive(Serialize)]
struct FoodLogFrontmatter {
    date: String,
    time: String,
    foods: Vec<String>,
}

/// Error context for a save that got as far as the food log.
///
/// Attached with `wrap_err`, so callers find it with `Report::downcast_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionNotSaved {
    pub food_log_path: PathBuf,
}

impl fmt::Display for ConditionNotSaved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Food log {} was written but the condition note was not",
            self.food_log_path.display()
        )
    }
}

pub struct FoodEventService {
    store: FileStore,
    foods: FoodsService,
    conditions: ConditionService,
    clock: Arc<dyn Clock>,
}

impl FoodEventService {
    pub fn new(
        store: FileStore,
        foods: FoodsService,
        conditions: ConditionService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        FoodEventService {
            store,
            foods,
            conditions,
            clock,
        }
    }

    /// Persist a finished meal and its symptoms.
    ///
    /// Steps run strictly in order. A failing catalog step is logged and
    /// reported in the result; a failing log write aborts with the error.
    /// When only the condition note fails the error carries
    /// [`ConditionNotSaved`]. The food-log filename uses `draft.log_id` when
    /// set, so retrying with the same draft rewrites one file.
    pub fn persist_event(
        &self,
        draft: &FoodEventDraft,
        condition: &Condition,
    ) -> Result<PersistedFoodEvent> {
        let foods = deduplicate_preserve_order(&draft.foods_raw);
        let catalog_names: Vec<String> = foods.iter().map(|f| normalize_key(f)).collect();

        let (catalog_paths, catalog_error) = match self.foods.ensure_notes(&catalog_names) {
            Ok(paths) => (paths, None),
            Err(e) => {
                warn!(error = %e, "failed to write catalog notes, continuing with food log");
                (Vec::new(), Some(format!("{:#}", e)))
            }
        };

        let links = catalog_names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let stem = catalog_paths
                    .get(idx)
                    .and_then(|p| p.file_stem())
                    .and_then(|s| s.to_str());
                backlink(name, stem)
            })
            .collect();

        let timestamp = draft.started_at;
        let payload = FoodLogFrontmatter {
            date: format_date(&timestamp),
            time: format_time(&timestamp),
            foods: links,
        };
        let content = render_frontmatter(&payload, Some(FOODTRACKER_TAG))?;
        let log_id = match draft.log_id {
            Some(ref id) => id.clone(),
            None => self.clock.short_id(SHORT_ID_LEN),
        };
        let filename = build_log_filename(&timestamp, &log_id);
        let food_log_path = self
            .store
            .write_text(PathBuf::from(FOOD_LOG_DIR).join(filename), &content)?;

        let record = self
            .conditions
            .persist(&self.clock.now(), condition)
            .wrap_err_with(|| ConditionNotSaved {
                food_log_path: food_log_path.clone(),
            })?;

        info!(
            foods = foods.len(),
            food_log = %food_log_path.display(),
            condition_log = %record.path.display(),
            "persisted food event"
        );

        Ok(PersistedFoodEvent {
            food_log_path,
            condition_log_path: record.path,
            foods,
            catalog_paths,
            catalog_error,
        })
    }
}
