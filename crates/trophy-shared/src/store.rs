//! Progression store: the single writer over the progression aggregate.
//!
//! Every mutation takes one lock over the whole aggregate, applies the
//! transition, persists the result and queues announcements before the lock
//! is released. Subscribers are told afterwards, outside the lock, so a
//! listener may call back into the store.

use crate::achievements::{self, Achievement, AchievementDef, Category, COMPLETIONIST_ID};
use crate::config::{NotificationSettings, TrophyConfig};
use crate::kv_store::{FileStore, MemoryStore};
use crate::levels::{self, XpProgress};
use crate::persistence::{Persistence, DEFAULT_STORAGE_KEY};
use crate::progression::{ProgressOutcome, ProgressionState, StatKind, UserStats, XpHistoryEntry};
use crate::scheduler::{Announcement, NotificationScheduler};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Change notifications delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Unlocked(Achievement),
    ProgressUpdated { id: String, progress: u32, max_progress: u32 },
    XpAdded { amount: u64, reason: String, total_xp: u64, level: u32 },
    StatChanged { stat: StatKind, value: f64 },
    Reset,
}

/// Read-only view handed to renderers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionSnapshot {
    pub stats: UserStats,
    pub achievements: Vec<Achievement>,
    pub unlocked_ids: BTreeSet<String>,
}

type Listener = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

struct Inner {
    state: ProgressionState,
    persistence: Persistence,
    scheduler: NotificationScheduler,
}

impl Inner {
    fn persist(&self) {
        if let Err(e) = self.persistence.save(&self.state) {
            warn!("Failed to persist progression: {}", e);
        }
    }
}

pub struct ProgressionStore {
    inner: Mutex<Inner>,
    listeners: Mutex<Vec<Listener>>,
    notifications: NotificationSettings,
}

/// Join the catalog with the state's overlay
fn joined(state: &ProgressionState) -> Vec<Achievement> {
    achievements::all().iter().map(|def| join_one(state, def)).collect()
}

fn join_one(state: &ProgressionState, def: &'static AchievementDef) -> Achievement {
    let overlay = state.overlay(def.id);
    Achievement::join(
        def,
        overlay.and_then(|o| o.progress),
        overlay.and_then(|o| o.unlocked_at),
    )
}

impl ProgressionStore {
    /// Open the store over a persistence adapter, reconciling saved state
    pub fn open(persistence: Persistence, notifications: NotificationSettings) -> Self {
        let mut state = persistence.load();

        // A catalog change may have left completionist due
        if let Some(def) = state.enforce_completionist(Utc::now()) {
            info!("Granted '{}' while reconciling saved progression", def.id);
            if let Err(e) = persistence.save(&state) {
                warn!("Failed to persist progression: {}", e);
            }
        }

        Self {
            inner: Mutex::new(Inner {
                state,
                persistence,
                scheduler: NotificationScheduler::new(notifications.spacing()),
            }),
            listeners: Mutex::new(Vec::new()),
            notifications,
        }
    }

    /// Store backed by the configured data directory
    pub fn from_config(config: &TrophyConfig) -> Self {
        let kv = FileStore::new(&config.storage.data_dir);
        let persistence = Persistence::new(Box::new(kv), config.storage.key.clone());
        Self::open(persistence, config.notifications.clone())
    }

    /// Store over a fresh in-memory map
    pub fn in_memory() -> Self {
        let persistence = Persistence::new(Box::new(MemoryStore::new()), DEFAULT_STORAGE_KEY);
        Self::open(persistence, NotificationSettings::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, events: &[StoreEvent]) {
        if events.is_empty() {
            return;
        }
        // Listeners run without the registry lock so they may re-enter
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for event in events {
            for listener in listeners.iter() {
                listener(event);
            }
        }
    }

    /// Register a change listener
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Queue announcements for a batch of fresh unlocks (primary first)
    fn announce(&self, inner: &mut Inner, unlocked: &[&'static AchievementDef], notify: bool) -> Vec<StoreEvent> {
        let now = Instant::now();
        let mut primary_due = now;
        let mut events = Vec::with_capacity(unlocked.len());

        for def in unlocked {
            let achievement = join_one(&inner.state, def);
            if def.id == COMPLETIONIST_ID {
                inner.scheduler.schedule(
                    achievement.clone(),
                    primary_due,
                    self.notifications.completionist_delay(),
                );
            } else if notify {
                primary_due = inner.scheduler.schedule(
                    achievement.clone(),
                    now,
                    self.notifications.initial_delay(),
                );
            }
            events.push(StoreEvent::Unlocked(achievement));
        }
        events
    }

    /// Unlock an achievement. Returns true when it was newly unlocked;
    /// unknown or already-unlocked ids are a no-op.
    pub fn unlock_achievement(&self, id: &str, notify: bool) -> bool {
        let events = {
            let mut inner = self.lock();
            let unlocked = inner.state.unlock(id, Utc::now());
            if unlocked.is_empty() {
                return false;
            }
            inner.persist();
            self.announce(&mut inner, &unlocked, notify)
        };
        self.emit(&events);
        true
    }

    /// Record incremental progress; reaching the maximum unlocks with a
    /// notification
    pub fn update_achievement_progress(&self, id: &str, new_progress: i64) {
        let events = {
            let mut inner = self.lock();
            match inner.state.set_progress(id, new_progress, Utc::now()) {
                ProgressOutcome::Ignored => return,
                ProgressOutcome::Updated(progress) => {
                    inner.persist();
                    let max_progress = achievements::by_id(id).and_then(|d| d.max_progress).unwrap_or(progress);
                    debug!("Progress for '{}' is now {}/{}", id, progress, max_progress);
                    vec![StoreEvent::ProgressUpdated { id: id.to_string(), progress, max_progress }]
                }
                ProgressOutcome::Unlocked(unlocked) => {
                    if unlocked.is_empty() {
                        return;
                    }
                    inner.persist();
                    self.announce(&mut inner, &unlocked, true)
                }
            }
        };
        self.emit(&events);
    }

    /// Add XP that is not tied to an achievement
    pub fn add_xp(&self, amount: u64, reason: &str) {
        let event = {
            let mut inner = self.lock();
            inner.state.add_xp(amount, reason, Utc::now());
            inner.persist();
            StoreEvent::XpAdded {
                amount,
                reason: reason.to_string(),
                total_xp: inner.state.stats.total_xp,
                level: inner.state.stats.level,
            }
        };
        self.emit(&[event]);
    }

    /// Bump a numeric stat
    pub fn increment_stat(&self, stat: StatKind, amount: u64) {
        let event = {
            let mut inner = self.lock();
            inner.state.increment_stat(stat, amount);
            inner.persist();
            StoreEvent::StatChanged { stat, value: inner.state.stat_value(stat) }
        };
        self.emit(&[event]);
    }

    /// Record fractional minutes spent on the site
    pub fn add_time_spent(&self, minutes: f64) {
        let event = {
            let mut inner = self.lock();
            if !inner.state.add_time_spent(minutes) {
                return;
            }
            inner.persist();
            StoreEvent::StatChanged {
                stat: StatKind::TimeSpent,
                value: inner.state.stats.time_spent,
            }
        };
        self.emit(&[event]);
    }

    /// Wipe all progress, the saved blob and every pending announcement
    pub fn reset_progress(&self) {
        {
            let mut inner = self.lock();
            inner.state = ProgressionState::fresh();
            if let Err(e) = inner.persistence.clear() {
                warn!("Failed to clear saved progression: {}", e);
            }
            inner.scheduler.cancel_all();
        }
        info!("Progression reset");
        self.emit(&[StoreEvent::Reset]);
    }

    // ========== Queries ==========

    pub fn unlocked(&self) -> Vec<Achievement> {
        joined(&self.lock().state).into_iter().filter(Achievement::is_unlocked).collect()
    }

    pub fn locked(&self) -> Vec<Achievement> {
        joined(&self.lock().state).into_iter().filter(|a| !a.is_unlocked()).collect()
    }

    pub fn by_category(&self, category: Category) -> Vec<Achievement> {
        let inner = self.lock();
        achievements::by_category(category)
            .into_iter()
            .map(|def| join_one(&inner.state, def))
            .collect()
    }

    pub fn achievement(&self, id: &str) -> Option<Achievement> {
        let def = achievements::by_id(id)?;
        Some(join_one(&self.lock().state, def))
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.lock().state.is_unlocked(id)
    }

    pub fn xp_progress(&self) -> XpProgress {
        levels::progress_to_next(self.lock().state.stats.total_xp)
    }

    pub fn stats(&self) -> UserStats {
        self.lock().state.stats.clone()
    }

    pub fn history(&self) -> Vec<XpHistoryEntry> {
        self.lock().state.xp_history.clone()
    }

    /// Copy of the full aggregate
    pub fn state(&self) -> ProgressionState {
        self.lock().state.clone()
    }

    pub fn snapshot(&self) -> ProgressionSnapshot {
        let inner = self.lock();
        ProgressionSnapshot {
            stats: inner.state.stats.clone(),
            achievements: joined(&inner.state),
            unlocked_ids: inner.state.unlocked_ids.clone(),
        }
    }

    // ========== Announcements ==========

    /// Next announcement due at `now`, at most one per call
    pub fn next_announcement(&self, now: Instant) -> Option<Announcement> {
        self.lock().scheduler.poll(now)
    }

    pub fn next_announcement_due(&self) -> Option<Instant> {
        self.lock().scheduler.next_due()
    }

    pub fn pending_announcements(&self) -> Vec<Announcement> {
        self.lock().scheduler.pending().to_vec()
    }

    /// Drop queued announcements (UI teardown)
    pub fn cancel_announcements(&self) -> usize {
        self.lock().scheduler.cancel_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unlock_returns_and_notifies() {
        let store = ProgressionStore::in_memory();
        assert!(store.unlock_achievement("first-visit", true));
        assert!(!store.unlock_achievement("first-visit", true));
        assert_eq!(store.pending_announcements().len(), 1);
    }

    #[test]
    fn test_unlock_without_notify_schedules_nothing() {
        let store = ProgressionStore::in_memory();
        assert!(store.unlock_achievement("first-visit", false));
        assert!(store.pending_announcements().is_empty());
        assert!(store.is_unlocked("first-visit"));
    }

    #[test]
    fn test_unknown_id_is_ignored() {
        let store = ProgressionStore::in_memory();
        assert!(!store.unlock_achievement("bogus", true));
        store.update_achievement_progress("bogus", 3);
        assert_eq!(store.state(), ProgressionState::fresh());
    }

    #[test]
    fn test_subscribers_see_events_in_order() {
        let store = ProgressionStore::in_memory();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        store.update_achievement_progress("portfolio-explorer", 2);
        store.add_xp(5, "bonus");
        store.increment_stat(StatKind::ProjectsViewed, 1);
        store.unlock_achievement("polyglot", true);
        store.reset_progress();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert!(matches!(seen[0], StoreEvent::ProgressUpdated { progress: 2, max_progress: 5, .. }));
        assert!(matches!(seen[1], StoreEvent::XpAdded { amount: 5, total_xp: 5, .. }));
        assert!(matches!(seen[2], StoreEvent::StatChanged { stat: StatKind::ProjectsViewed, .. }));
        assert!(matches!(&seen[3], StoreEvent::Unlocked(a) if a.id == "polyglot"));
        assert_eq!(seen[4], StoreEvent::Reset);
    }

    #[test]
    fn test_listener_may_reenter_store() {
        let store = Arc::new(ProgressionStore::in_memory());
        let inner = Arc::clone(&store);
        store.subscribe(move |event| {
            if let StoreEvent::Unlocked(a) = event {
                if a.id == "first-visit" {
                    inner.unlock_achievement("polyglot", false);
                }
            }
        });

        let worker = Arc::clone(&store);
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            worker.unlock_achievement("first-visit", false);
            let _ = tx.send(());
        });
        rx.recv_timeout(Duration::from_secs(5))
            .expect("re-entrant listener call did not return");
        assert!(store.is_unlocked("polyglot"));
        assert_eq!(store.stats().achievements_unlocked, 2);
    }

    #[test]
    fn test_completionist_announced_after_primary() {
        let store = ProgressionStore::in_memory();
        let others: Vec<_> = achievements::all()
            .iter()
            .filter(|d| d.id != COMPLETIONIST_ID)
            .collect();
        let (last, rest) = others.split_last().unwrap();
        for def in rest {
            store.unlock_achievement(def.id, false);
        }
        store.unlock_achievement(last.id, true);

        let pending = store.pending_announcements();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].achievement.id, last.id);
        assert_eq!(pending[1].achievement.id, COMPLETIONIST_ID);
        assert_eq!(pending[1].due - pending[0].due, Duration::from_secs(6));
    }

    #[test]
    fn test_add_time_spent_fractional() {
        let store = ProgressionStore::in_memory();
        store.add_time_spent(0.5);
        store.increment_stat(StatKind::TimeSpent, 2);
        store.add_time_spent(-1.0);
        assert_eq!(store.stats().time_spent, 2.5);
    }

    #[test]
    fn test_reset_cancels_announcements() {
        let store = ProgressionStore::in_memory();
        store.unlock_achievement("first-visit", true);
        store.unlock_achievement("polyglot", true);
        store.reset_progress();

        assert!(store.pending_announcements().is_empty());
        assert!(store.next_announcement(Instant::now() + Duration::from_secs(60)).is_none());
        assert_eq!(store.stats(), UserStats::default());
    }

    #[test]
    fn test_queries() {
        let store = ProgressionStore::in_memory();
        store.unlock_achievement("space-explorer", false);

        assert_eq!(store.unlocked().len(), 1);
        assert_eq!(store.locked().len(), achievements::total() - 1);
        let eggs = store.by_category(Category::EasterEgg);
        assert!(eggs.iter().any(|a| a.id == "space-explorer" && a.is_unlocked()));
        assert_eq!(store.xp_progress().current, 25);

        let snapshot = store.snapshot();
        assert!(snapshot.unlocked_ids.contains("space-explorer"));
        assert_eq!(snapshot.stats.easter_eggs_found, 1);
        assert_eq!(snapshot.achievements.len(), achievements::total());
    }
}
