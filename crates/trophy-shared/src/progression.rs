//! Progression aggregate: stats, per-achievement overlay, unlocked set and
//! bounded XP history.
//!
//! The transitions here are plain functions over `&mut ProgressionState`
//! taking an explicit `now`. [`ProgressionStore`](crate::store::ProgressionStore)
//! wraps them in its single-writer lock and handles persistence and
//! announcements.

use crate::achievements::{self, AchievementDef, Category, COMPLETIONIST_ID};
use crate::error::TrophyError;
use crate::levels;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Maximum XP history entries kept (oldest dropped first)
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    #[serde(rename = "totalXP")]
    pub total_xp: u64,
    pub level: u32,
    pub achievements_unlocked: u32,
    pub total_achievements: u32,
    pub easter_eggs_found: u64,
    pub projects_viewed: u64,
    /// Minutes spent on the site
    pub time_spent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            total_xp: 0,
            level: 1,
            achievements_unlocked: 0,
            total_achievements: achievements::total() as u32,
            easter_eggs_found: 0,
            projects_viewed: 0,
            time_spent: 0.0,
            last_activity: None,
        }
    }
}

/// Runtime overlay for one catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementProgress {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl AchievementProgress {
    /// Zero-progress overlay for a catalog entry
    pub fn fresh(def: &AchievementDef) -> Self {
        Self {
            id: def.id.to_string(),
            progress: def.max_progress.map(|_| 0),
            unlocked_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpHistoryEntry {
    pub date: DateTime<Utc>,
    pub xp: u64,
    pub reason: String,
}

/// Numeric stats that instrumentation may bump directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    EasterEggsFound,
    ProjectsViewed,
    TimeSpent,
}

impl StatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::EasterEggsFound => "easterEggsFound",
            StatKind::ProjectsViewed => "projectsViewed",
            StatKind::TimeSpent => "timeSpent",
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StatKind {
    type Err = TrophyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "eastereggsfound" => Ok(StatKind::EasterEggsFound),
            "projectsviewed" => Ok(StatKind::ProjectsViewed),
            "timespent" => Ok(StatKind::TimeSpent),
            _ => Err(TrophyError::UnknownStat(s.to_string())),
        }
    }
}

/// Outcome of a progress update
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressOutcome {
    /// Unknown id, already unlocked, or not incremental
    Ignored,
    /// Progress stored below the maximum
    Updated(u32),
    /// Progress reached the maximum; holds every achievement unlocked as a result
    Unlocked(Vec<&'static AchievementDef>),
}

/// The persisted aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionState {
    pub stats: UserStats,
    /// One overlay per catalog entry, in catalog order
    pub achievements: Vec<AchievementProgress>,
    #[serde(rename = "unlockedAchievementIds")]
    pub unlocked_ids: BTreeSet<String>,
    pub xp_history: Vec<XpHistoryEntry>,
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self::fresh()
    }
}

impl ProgressionState {
    /// Zero state derived from the catalog
    pub fn fresh() -> Self {
        Self {
            stats: UserStats::default(),
            achievements: achievements::all().iter().map(AchievementProgress::fresh).collect(),
            unlocked_ids: BTreeSet::new(),
            xp_history: Vec::new(),
        }
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.unlocked_ids.contains(id)
    }

    pub fn overlay(&self, id: &str) -> Option<&AchievementProgress> {
        self.achievements.iter().find(|a| a.id == id)
    }

    fn overlay_mut(&mut self, def: &AchievementDef) -> &mut AchievementProgress {
        // Reconciled states always carry every catalog id; the push covers
        // hand-built states in tests.
        if let Some(pos) = self.achievements.iter().position(|a| a.id == def.id) {
            return &mut self.achievements[pos];
        }
        self.achievements.push(AchievementProgress::fresh(def));
        let last = self.achievements.len() - 1;
        &mut self.achievements[last]
    }

    fn push_history(&mut self, xp: u64, reason: String, now: DateTime<Utc>) {
        self.xp_history.push(XpHistoryEntry { date: now, xp, reason });
        if self.xp_history.len() > HISTORY_LIMIT {
            let excess = self.xp_history.len() - HISTORY_LIMIT;
            self.xp_history.drain(..excess);
        }
    }

    fn credit_xp(&mut self, amount: u64, reason: String, now: DateTime<Utc>) {
        self.stats.total_xp = self.stats.total_xp.saturating_add(amount);
        self.stats.level = levels::level(self.stats.total_xp);
        self.push_history(amount, reason, now);
    }

    /// Unlock one achievement without the completionist cascade.
    /// Returns false when it was already unlocked.
    fn unlock_single(&mut self, def: &'static AchievementDef, now: DateTime<Utc>) -> bool {
        if self.unlocked_ids.contains(def.id) {
            return false;
        }

        self.unlocked_ids.insert(def.id.to_string());
        let overlay = self.overlay_mut(def);
        overlay.unlocked_at = Some(now);
        if let Some(max) = def.max_progress {
            overlay.progress = Some(max);
        }

        self.credit_xp(achievements::points(def), format!("Achievement: {}", def.name.en), now);
        self.stats.achievements_unlocked = self.unlocked_ids.len() as u32;
        if def.category == Category::EasterEgg {
            self.stats.easter_eggs_found += 1;
        }
        self.stats.last_activity = Some(now);

        info!(
            "Achievement unlocked: {} (+{} XP, total {}, level {})",
            def.id, def.points, self.stats.total_xp, self.stats.level
        );
        true
    }

    /// Whether every achievement except completionist is unlocked while
    /// completionist itself is not
    pub fn completionist_due(&self) -> bool {
        !self.unlocked_ids.contains(COMPLETIONIST_ID)
            && achievements::all()
                .iter()
                .filter(|def| def.id != COMPLETIONIST_ID)
                .all(|def| self.unlocked_ids.contains(def.id))
    }

    /// Unlock completionist if it is due. Returns its definition when granted.
    pub fn enforce_completionist(&mut self, now: DateTime<Utc>) -> Option<&'static AchievementDef> {
        if !self.completionist_due() {
            return None;
        }
        let def = achievements::by_id(COMPLETIONIST_ID)?;
        self.unlock_single(def, now).then_some(def)
    }

    /// Unlock an achievement and cascade into completionist.
    ///
    /// Returns every achievement newly unlocked, primary first. Empty when
    /// the id is unknown or already unlocked.
    pub fn unlock(&mut self, id: &str, now: DateTime<Utc>) -> Vec<&'static AchievementDef> {
        let Some(def) = achievements::by_id(id) else {
            warn!("Ignoring unlock of unknown achievement '{}'", id);
            return Vec::new();
        };

        // Completionist is only ever granted by the cascade
        if def.id == COMPLETIONIST_ID {
            if self.completionist_due() {
                return self.enforce_completionist(now).into_iter().collect();
            }
            warn!("Ignoring direct unlock of '{}' while other achievements are locked", id);
            return Vec::new();
        }

        if !self.unlock_single(def, now) {
            debug!("Achievement '{}' already unlocked", id);
            return Vec::new();
        }

        let mut unlocked = vec![def];
        if let Some(completionist) = self.enforce_completionist(now) {
            unlocked.push(completionist);
        }
        unlocked
    }

    /// Store incremental progress, unlocking at the maximum
    pub fn set_progress(&mut self, id: &str, new_progress: i64, now: DateTime<Utc>) -> ProgressOutcome {
        let Some(def) = achievements::by_id(id) else {
            warn!("Ignoring progress for unknown achievement '{}'", id);
            return ProgressOutcome::Ignored;
        };
        let Some(max) = def.max_progress else {
            debug!("Achievement '{}' has no progress track", id);
            return ProgressOutcome::Ignored;
        };
        if self.unlocked_ids.contains(def.id) {
            return ProgressOutcome::Ignored;
        }

        let clamped = new_progress.clamp(0, i64::from(max)) as u32;
        if clamped == max {
            return ProgressOutcome::Unlocked(self.unlock(def.id, now));
        }

        self.overlay_mut(def).progress = Some(clamped);
        ProgressOutcome::Updated(clamped)
    }

    /// Add XP outside of any achievement
    pub fn add_xp(&mut self, amount: u64, reason: &str, now: DateTime<Utc>) {
        self.credit_xp(amount, reason.to_string(), now);
    }

    /// Bump a numeric stat; never touches XP or achievements.
    /// `TimeSpent` increments are whole minutes here; use
    /// [`add_time_spent`](Self::add_time_spent) for fractions.
    pub fn increment_stat(&mut self, stat: StatKind, amount: u64) {
        match stat {
            StatKind::EasterEggsFound => {
                self.stats.easter_eggs_found = self.stats.easter_eggs_found.saturating_add(amount)
            }
            StatKind::ProjectsViewed => {
                self.stats.projects_viewed = self.stats.projects_viewed.saturating_add(amount)
            }
            StatKind::TimeSpent => self.stats.time_spent += amount as f64,
        }
    }

    /// Add fractional minutes to `time_spent`. Negative or non-finite
    /// amounts are ignored.
    pub fn add_time_spent(&mut self, minutes: f64) -> bool {
        if !minutes.is_finite() || minutes < 0.0 {
            warn!("Ignoring invalid time spent increment {}", minutes);
            return false;
        }
        self.stats.time_spent += minutes;
        true
    }

    pub fn stat_value(&self, stat: StatKind) -> f64 {
        match stat {
            StatKind::EasterEggsFound => self.stats.easter_eggs_found as f64,
            StatKind::ProjectsViewed => self.stats.projects_viewed as f64,
            StatKind::TimeSpent => self.stats.time_spent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_fresh_state() {
        let state = ProgressionState::fresh();
        assert_eq!(state.stats.level, 1);
        assert_eq!(state.stats.total_xp, 0);
        assert_eq!(state.stats.total_achievements as usize, achievements::total());
        assert_eq!(state.achievements.len(), achievements::total());
        assert_eq!(state.overlay("portfolio-explorer").unwrap().progress, Some(0));
        assert_eq!(state.overlay("first-visit").unwrap().progress, None);
    }

    #[test]
    fn test_unlock_first_visit() {
        let mut state = ProgressionState::fresh();
        let unlocked = state.unlock("first-visit", now());
        assert_eq!(unlocked.len(), 1);
        assert_eq!(state.stats.total_xp, 10);
        assert_eq!(state.stats.level, 1);
        assert_eq!(state.stats.achievements_unlocked, 1);
        assert_eq!(state.xp_history.len(), 1);
        assert_eq!(state.xp_history[0].xp, 10);
        assert!(state.overlay("first-visit").unwrap().unlocked_at.is_some());
    }

    #[test]
    fn test_unlock_twice_is_noop() {
        let mut state = ProgressionState::fresh();
        let at = now();
        state.unlock("first-visit", at);
        let once = state.clone();
        assert!(state.unlock("first-visit", at).is_empty());
        assert_eq!(state, once);
    }

    #[test]
    fn test_unlock_unknown_is_noop() {
        let mut state = ProgressionState::fresh();
        assert!(state.unlock("not-a-thing", now()).is_empty());
        assert_eq!(state, ProgressionState::fresh());
    }

    #[test]
    fn test_easter_egg_counts() {
        let mut state = ProgressionState::fresh();
        state.unlock("space-explorer", now());
        assert_eq!(state.stats.easter_eggs_found, 1);
        state.unlock("first-visit", now());
        assert_eq!(state.stats.easter_eggs_found, 1);
    }

    #[test]
    fn test_progress_below_max_stores_only() {
        let mut state = ProgressionState::fresh();
        assert_eq!(state.set_progress("portfolio-explorer", 3, now()), ProgressOutcome::Updated(3));
        assert_eq!(state.overlay("portfolio-explorer").unwrap().progress, Some(3));
        assert_eq!(state.stats.total_xp, 0);
        assert!(state.xp_history.is_empty());
    }

    #[test]
    fn test_progress_clamps() {
        let mut state = ProgressionState::fresh();
        assert_eq!(state.set_progress("portfolio-explorer", -4, now()), ProgressOutcome::Updated(0));
        match state.set_progress("portfolio-explorer", 99, now()) {
            ProgressOutcome::Unlocked(defs) => assert_eq!(defs[0].id, "portfolio-explorer"),
            other => panic!("expected unlock, got {:?}", other),
        }
        assert_eq!(state.overlay("portfolio-explorer").unwrap().progress, Some(5));
    }

    #[test]
    fn test_progress_ignored_cases() {
        let mut state = ProgressionState::fresh();
        assert_eq!(state.set_progress("first-visit", 1, now()), ProgressOutcome::Ignored);
        assert_eq!(state.set_progress("unknown", 1, now()), ProgressOutcome::Ignored);
        state.set_progress("certificate-collector", 3, now());
        assert_eq!(state.set_progress("certificate-collector", 1, now()), ProgressOutcome::Ignored);
        assert_eq!(state.overlay("certificate-collector").unwrap().progress, Some(3));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut state = ProgressionState::fresh();
        for i in 0..(HISTORY_LIMIT as u64 + 7) {
            state.add_xp(i, "tick", now());
        }
        assert_eq!(state.xp_history.len(), HISTORY_LIMIT);
        assert_eq!(state.xp_history[0].xp, 7);
    }

    #[test]
    fn test_add_xp_levels() {
        let mut state = ProgressionState::fresh();
        state.add_xp(1000, "test", now());
        assert_eq!(state.stats.level, 4);
        assert_eq!(state.stats.achievements_unlocked, 0);
    }

    #[test]
    fn test_increment_stat_touches_only_field() {
        let mut state = ProgressionState::fresh();
        state.increment_stat(StatKind::ProjectsViewed, 2);
        state.increment_stat(StatKind::TimeSpent, 5);
        assert_eq!(state.stats.projects_viewed, 2);
        assert_eq!(state.stats.time_spent, 5.0);
        assert_eq!(state.stats.total_xp, 0);
        assert!(state.xp_history.is_empty());
    }

    #[test]
    fn test_time_spent_accepts_fractions() {
        let mut state = ProgressionState::fresh();
        assert!(state.add_time_spent(0.5));
        assert!(state.add_time_spent(1.25));
        assert!(!state.add_time_spent(-2.0));
        assert!(!state.add_time_spent(f64::NAN));
        assert_eq!(state.stat_value(StatKind::TimeSpent), 1.75);
        assert_eq!(state.stats.total_xp, 0);
    }

    #[test]
    fn test_stat_kind_parse() {
        assert_eq!("projectsViewed".parse::<StatKind>().unwrap(), StatKind::ProjectsViewed);
        assert_eq!("time-spent".parse::<StatKind>().unwrap(), StatKind::TimeSpent);
        assert_eq!("easter_eggs_found".parse::<StatKind>().unwrap(), StatKind::EasterEggsFound);
        assert!("totalXP".parse::<StatKind>().is_err());
    }

    #[test]
    fn test_completionist_cascade() {
        let mut state = ProgressionState::fresh();
        let others: Vec<_> = achievements::all()
            .iter()
            .filter(|d| d.id != COMPLETIONIST_ID)
            .collect();
        let (last, rest) = others.split_last().unwrap();
        for def in rest {
            state.unlock(def.id, now());
        }
        assert!(!state.is_unlocked(COMPLETIONIST_ID));

        let unlocked = state.unlock(last.id, now());
        assert_eq!(unlocked.len(), 2);
        assert_eq!(unlocked[1].id, COMPLETIONIST_ID);
        assert!(state.is_unlocked(COMPLETIONIST_ID));
        assert_eq!(state.stats.achievements_unlocked as usize, achievements::total());
    }

    #[test]
    fn test_progress_at_max_cascades_into_completionist() {
        let mut state = ProgressionState::fresh();
        for def in achievements::all() {
            if def.id != COMPLETIONIST_ID && def.id != "command-master" {
                state.unlock(def.id, now());
            }
        }

        match state.set_progress("command-master", 10, now()) {
            ProgressOutcome::Unlocked(defs) => {
                let ids: Vec<_> = defs.iter().map(|d| d.id).collect();
                assert_eq!(ids, vec!["command-master", COMPLETIONIST_ID]);
            }
            other => panic!("expected unlock, got {:?}", other),
        }
        assert_eq!(state.stats.achievements_unlocked as usize, achievements::total());
    }

    #[test]
    fn test_direct_completionist_unlock_rejected() {
        let mut state = ProgressionState::fresh();
        assert!(state.unlock(COMPLETIONIST_ID, now()).is_empty());
        assert!(!state.is_unlocked(COMPLETIONIST_ID));
    }
}
