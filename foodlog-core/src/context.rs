// Dependency wiring, built once at startup and passed by reference to the engine

use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::{Settings, DEFAULT_PHOTO_TIMEOUT_SECS};
use crate::photo::{HttpPhotoIntake, PhotoIntake, PhotoIntakeConfig, StubPhotoIntake};
use crate::services::{ConditionService, FoodEventService, FoodsService};
use crate::session::{MemorySessionStore, SessionStore, SqliteSessionStore};
use crate::store::FileStore;

/// Everything the dialogue engine talks to
pub struct AppContext {
    pub clock: Arc<dyn Clock>,
    pub store: FileStore,
    pub food_events: FoodEventService,
    pub sessions: Arc<dyn SessionStore>,
    pub photo_intake: Arc<dyn PhotoIntake>,
    pub photo_timeout: Duration,
}

impl AppContext {
    /// Wire the default services over one data root
    pub fn new(
        store: FileStore,
        clock: Arc<dyn Clock>,
        sessions: Arc<dyn SessionStore>,
        photo_intake: Arc<dyn PhotoIntake>,
    ) -> Self {
        let food_events = FoodEventService::new(
            store.clone(),
            FoodsService::new(store.clone()),
            ConditionService::new(store.clone()),
            clock.clone(),
        );
        AppContext {
            clock,
            store,
            food_events,
            sessions,
            photo_intake,
            photo_timeout: Duration::from_secs(DEFAULT_PHOTO_TIMEOUT_SECS),
        }
    }

    pub fn with_photo_timeout(mut self, timeout: Duration) -> Self {
        self.photo_timeout = timeout;
        self
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let store = FileStore::new(settings.data_dir.clone());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(settings.timezone));

        let sessions: Arc<dyn SessionStore> = match settings.session_db {
            Some(ref path) => {
                info!(path = %path.display(), "using SQLite session store");
                Arc::new(SqliteSessionStore::open(path)?)
            }
            None => Arc::new(MemorySessionStore::new()),
        };

        let photo_intake: Arc<dyn PhotoIntake> = match settings.photo_intake_url {
            Some(ref url) => {
                info!(url = %url, "using HTTP photo intake");
                Arc::new(HttpPhotoIntake::new(PhotoIntakeConfig {
                    url: url.clone(),
                    token: settings.photo_intake_token.clone(),
                    timeout: settings.photo_timeout,
                })?)
            }
            None => Arc::new(StubPhotoIntake),
        };

        Ok(AppContext::new(store, clock, sessions, photo_intake)
            .with_photo_timeout(settings.photo_timeout))
    }
}
