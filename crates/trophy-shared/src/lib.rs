//! Shared engine for the Trophy Case achievement system.
//!
//! Everything the portfolio front end needs to turn raw input into durable
//! progression lives here: the static achievement catalog, the XP/level
//! curve, the persisted progression aggregate and its single-writer store,
//! the easter egg trigger detector and the announcement scheduler.

pub mod achievements;
pub mod config;
pub mod eggs;
pub mod error;
pub mod kv_store;
pub mod levels;
pub mod persistence;
pub mod progression;
pub mod scheduler;
pub mod store;
pub mod triggers;

pub use achievements::{Achievement, AchievementDef, Category, LocalizedText, Locale, Rarity};
pub use config::TrophyConfig;
pub use eggs::{EggNotice, EggRouter, EggSession};
pub use error::TrophyError;
pub use kv_store::{FileStore, KeyValueStore, MemoryStore};
pub use levels::XpProgress;
pub use persistence::Persistence;
pub use progression::{ProgressionState, StatKind, UserStats, XpHistoryEntry};
pub use scheduler::{Announcement, NotificationScheduler};
pub use store::{ProgressionSnapshot, ProgressionStore, StoreEvent};
pub use triggers::{EasterEgg, EventKind, InputEvent, Trigger, TriggerDetector};

/// Version of the shared engine, reported by trophyctl.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
