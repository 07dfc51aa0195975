// Foodlog Core Library
// Dialogue engine, note services and storage for the meal and condition journal

pub mod clock;
pub mod config;
pub mod context;
pub mod dialogue;
pub mod event;
pub mod markdown;
pub mod normalize;
pub mod photo;
pub mod services;
pub mod session;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use types::*;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Settings;
pub use context::AppContext;
pub use dialogue::DialogueEngine;
pub use event::{BoolAnswer, Command, Event, FlowAction, Keyboard, Reply, ReplyKind, Symptom};
pub use photo::{HttpPhotoIntake, PhotoIntake, StubPhotoIntake};
pub use session::{MemorySessionStore, SessionBag, SessionStore, SqliteSessionStore};
pub use store::FileStore;
