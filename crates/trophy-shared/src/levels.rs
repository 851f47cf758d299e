//! Level curve for the progression system.
//!
//! ## XP Curve
//!
//! level = floor(sqrt(total_xp / 100)) + 1
//!
//! so level L starts at (L - 1)^2 * 100 XP:
//! - Level 1: 0 XP
//! - Level 2: 100 XP
//! - Level 4: 900 XP
//! - Level 10: 8,100 XP
//!
//! Everything here is pure; the progression store calls these after every
//! XP change.

use serde::{Deserialize, Serialize};

/// XP per unit of the squared level index
const XP_SCALE: u64 = 100;

/// Title bands mapping level ranges to display titles
pub const TITLE_BANDS: &[(u32, u32, &str)] = &[
    (1, 1, "Visitor"),
    (2, 3, "Explorer"),
    (4, 5, "Adventurer"),
    (6, 8, "Pathfinder"),
    (9, 12, "Veteran"),
    (13, u32::MAX, "Legend"),
];

/// Progress within the current level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XpProgress {
    /// XP earned since the current level started
    pub current: u64,
    /// XP span of the current level
    pub next: u64,
    /// current / next as a percentage, clamped to 0-100
    pub percentage: f64,
}

/// Integer square root (floor)
fn isqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    let mut x = (n as f64).sqrt() as u64;
    // Float rounding can be off by one near large perfect squares
    while x.checked_mul(x).map_or(true, |sq| sq > n) {
        x -= 1;
    }
    while (x + 1).checked_mul(x + 1).map_or(false, |sq| sq <= n) {
        x += 1;
    }
    x
}

/// Level reached with the given total XP (always >= 1)
pub fn level(total_xp: u64) -> u32 {
    let root = isqrt(total_xp / XP_SCALE);
    u32::try_from(root).unwrap_or(u32::MAX - 1) + 1
}

/// Total XP at which a level starts
pub fn xp_at_level_start(level: u32) -> u64 {
    let steps = u64::from(level.saturating_sub(1));
    steps.saturating_mul(steps).saturating_mul(XP_SCALE)
}

/// Progress toward the next level
pub fn progress_to_next(total_xp: u64) -> XpProgress {
    let lvl = level(total_xp);
    let start = xp_at_level_start(lvl);
    let end = xp_at_level_start(lvl.saturating_add(1));

    let current = total_xp.saturating_sub(start);
    let next = end.saturating_sub(start);

    let percentage = if next == 0 {
        100.0
    } else {
        (current as f64 / next as f64 * 100.0).clamp(0.0, 100.0)
    };

    XpProgress { current, next, percentage }
}

/// Display title for a level
pub fn title(level: u32) -> &'static str {
    for &(min, max, title) in TITLE_BANDS {
        if level >= min && level <= max {
            return title;
        }
    }
    "Unknown"
}
