// Note-writing services layered over the file store

pub mod condition;
pub mod food_event;
pub mod foods;

pub use condition::{ConditionRecord, ConditionService};
pub use food_event::{ConditionNotSaved, FoodEventService};
pub use foods::FoodsService;

/// Default directory names under the data root
pub const FOODS_DIR: &str = "Foods";
pub const FOOD_LOG_DIR: &str = "FoodLog";
pub const CONDITION_LOG_DIR: &str = "ConditionLog";
