//! Persistence adapter: one JSON blob under one well-known key.
//!
//! Loading never fails. Missing, corrupt or incompatible blobs fall back to
//! the catalog zero state, and anything that does parse is reconciled against
//! the current catalog before the store sees it.

use crate::achievements;
use crate::error::Result;
use crate::kv_store::KeyValueStore;
use crate::levels;
use crate::progression::{AchievementProgress, ProgressionState, HISTORY_LIMIT};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Default storage key for the progression blob
pub const DEFAULT_STORAGE_KEY: &str = "portfolio-achievements";

pub struct Persistence {
    kv: Box<dyn KeyValueStore>,
    key: String,
}

impl Persistence {
    pub fn new(kv: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { kv, key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load and reconcile the stored state, or the zero state
    pub fn load(&self) -> ProgressionState {
        self.load_at(Utc::now())
    }

    pub fn load_at(&self, now: DateTime<Utc>) -> ProgressionState {
        let raw = match self.kv.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No saved progression under '{}', starting fresh", self.key);
                return ProgressionState::fresh();
            }
            Err(e) => {
                warn!("Failed to read saved progression: {}", e);
                return ProgressionState::fresh();
            }
        };

        match serde_json::from_str::<ProgressionState>(&raw) {
            Ok(stored) => reconcile(stored, now),
            Err(e) => {
                warn!("Discarding unreadable progression blob: {}", e);
                ProgressionState::fresh()
            }
        }
    }

    /// Overwrite the blob with the full aggregate
    pub fn save(&self, state: &ProgressionState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.kv.set(&self.key, &json)
    }

    /// Remove the blob
    pub fn clear(&self) -> Result<()> {
        self.kv.remove(&self.key)
    }
}

/// Align a stored state with the current catalog.
///
/// The stored unlocked-id list is authoritative: unknown ids are dropped, an
/// unlocked entry without a timestamp is stamped with `now`, and timestamps
/// on entries outside the set are discarded. Locked progress is kept strictly
/// below the maximum and derived stats are recomputed.
pub fn reconcile(stored: ProgressionState, now: DateTime<Utc>) -> ProgressionState {
    let mut state = ProgressionState::fresh();

    let dropped = stored
        .unlocked_ids
        .iter()
        .filter(|id| achievements::by_id(id).is_none())
        .count()
        + stored
            .achievements
            .iter()
            .filter(|a| achievements::by_id(&a.id).is_none())
            .count();
    if dropped > 0 {
        warn!("Dropped {} stored achievement entries missing from the catalog", dropped);
    }

    state.unlocked_ids = stored
        .unlocked_ids
        .into_iter()
        .filter(|id| achievements::by_id(id).is_some())
        .collect();

    state.achievements = achievements::all()
        .iter()
        .map(|def| {
            let saved = stored.achievements.iter().find(|a| a.id == def.id);
            let unlocked = state.unlocked_ids.contains(def.id);
            let mut overlay = AchievementProgress::fresh(def);

            if unlocked {
                overlay.unlocked_at = Some(saved.and_then(|s| s.unlocked_at).unwrap_or(now));
            }
            if let Some(max) = def.max_progress {
                overlay.progress = Some(if unlocked {
                    max
                } else {
                    let saved_progress = saved.and_then(|s| s.progress).unwrap_or(0);
                    saved_progress.min(max.saturating_sub(1))
                });
            }
            overlay
        })
        .collect();

    let s = stored.stats;
    state.stats.total_xp = s.total_xp;
    state.stats.level = levels::level(s.total_xp);
    state.stats.achievements_unlocked = state.unlocked_ids.len() as u32;
    state.stats.total_achievements = achievements::total() as u32;
    state.stats.easter_eggs_found = s.easter_eggs_found;
    state.stats.projects_viewed = s.projects_viewed;
    state.stats.time_spent = if s.time_spent.is_finite() && s.time_spent >= 0.0 {
        s.time_spent
    } else {
        0.0
    };
    state.stats.last_activity = s.last_activity;

    let mut history = stored.xp_history;
    if history.len() > HISTORY_LIMIT {
        let excess = history.len() - HISTORY_LIMIT;
        history.drain(..excess);
    }
    state.xp_history = history;

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv_store::MemoryStore;
    use crate::progression::StatKind;

    fn persistence_with(raw: Option<&str>) -> Persistence {
        let kv = match raw {
            Some(raw) => MemoryStore::with_entry(DEFAULT_STORAGE_KEY, raw),
            None => MemoryStore::new(),
        };
        Persistence::new(Box::new(kv), DEFAULT_STORAGE_KEY)
    }

    #[test]
    fn test_missing_blob_is_fresh() {
        let p = persistence_with(None);
        assert_eq!(p.load(), ProgressionState::fresh());
    }

    #[test]
    fn test_corrupt_blob_is_fresh() {
        let p = persistence_with(Some("{not json"));
        assert_eq!(p.load(), ProgressionState::fresh());

        let p = persistence_with(Some("[1, 2, 3]"));
        assert_eq!(p.load(), ProgressionState::fresh());

        let p = persistence_with(Some(r#"{"stats": {"totalXP": -5}}"#));
        assert_eq!(p.load(), ProgressionState::fresh());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let p = persistence_with(None);
        let now = Utc::now();
        let mut state = ProgressionState::fresh();
        state.unlock("first-visit", now);
        state.unlock("space-explorer", now);
        state.set_progress("portfolio-explorer", 2, now);
        state.add_xp(40, "bonus", now);
        state.increment_stat(StatKind::TimeSpent, 3);

        p.save(&state).unwrap();
        assert_eq!(p.load_at(now), state);
    }

    #[test]
    fn test_persisted_shape_uses_wire_names() {
        let p = persistence_with(None);
        let mut state = ProgressionState::fresh();
        state.unlock("first-visit", Utc::now());
        p.save(&state).unwrap();

        let raw = p.kv.get(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["stats"]["totalXP"], 10);
        assert_eq!(value["stats"]["achievementsUnlocked"], 1);
        assert_eq!(value["unlockedAchievementIds"][0], "first-visit");
        assert_eq!(value["xpHistory"][0]["xp"], 10);
        assert!(value["achievements"][0]["unlockedAt"].is_string());
    }

    #[test]
    fn test_reconcile_drops_unknown_and_fills_missing() {
        let raw = r#"{
            "stats": {"totalXP": 35, "level": 9, "achievementsUnlocked": 7,
                      "totalAchievements": 2, "easterEggsFound": 1,
                      "projectsViewed": 4, "timeSpent": 12.5},
            "achievements": [
                {"id": "first-visit", "unlockedAt": "2024-03-01T10:00:00Z"},
                {"id": "retired-badge", "unlockedAt": "2024-03-01T10:00:00Z"},
                {"id": "portfolio-explorer", "progress": 3}
            ],
            "unlockedAchievementIds": ["first-visit", "retired-badge", "space-explorer"],
            "xpHistory": [{"date": "2024-03-01T10:00:00Z", "xp": 10, "reason": "Achievement: Hello World"}]
        }"#;
        let now = Utc::now();
        let state = persistence_with(Some(raw)).load_at(now);

        assert_eq!(state.achievements.len(), achievements::total());
        assert!(state.overlay("retired-badge").is_none());
        assert!(!state.is_unlocked("retired-badge"));
        assert_eq!(state.unlocked_ids.len(), 2);

        // Derived stats recomputed
        assert_eq!(state.stats.achievements_unlocked, 2);
        assert_eq!(state.stats.level, 1);
        assert_eq!(state.stats.total_achievements as usize, achievements::total());
        assert_eq!(state.stats.projects_viewed, 4);
        assert_eq!(state.stats.time_spent, 12.5);

        // Missing timestamp stamped with load time
        assert_eq!(state.overlay("space-explorer").unwrap().unlocked_at, Some(now));
        assert_eq!(state.overlay("portfolio-explorer").unwrap().progress, Some(3));
        assert_eq!(state.overlay("certificate-collector").unwrap().progress, Some(0));
        assert_eq!(state.xp_history[0].date.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_reconcile_pins_progress() {
        let raw = r#"{
            "stats": {},
            "achievements": [
                {"id": "portfolio-explorer", "progress": 5},
                {"id": "certificate-collector", "progress": 1}
            ],
            "unlockedAchievementIds": ["certificate-collector"],
            "xpHistory": []
        }"#;
        let state = persistence_with(Some(raw)).load();

        // Locked progress stays below max, unlocked is pinned at max
        assert_eq!(state.overlay("portfolio-explorer").unwrap().progress, Some(4));
        assert_eq!(state.overlay("certificate-collector").unwrap().progress, Some(3));
    }

    #[test]
    fn test_clear_removes_blob() {
        let p = persistence_with(None);
        p.save(&ProgressionState::fresh()).unwrap();
        p.clear().unwrap();
        assert_eq!(p.kv.get(DEFAULT_STORAGE_KEY).unwrap(), None);
    }
}
