//! Built-in easter eggs and the glue between detectors and the store.
//!
//! Three kinds of registry exist side by side: the global one that listens
//! everywhere, page-scoped ones bound to a route, and the command palette.
//! Each runs in its own [`TriggerDetector`] with its own buffer, so a pattern
//! registered in two registries may fire from both. [`EggSession`] collapses
//! that by egg id: each egg produces a notice at most once per session.

use crate::achievements::EGG_HUNTER_ID;
use crate::store::ProgressionStore;
use crate::triggers::{EasterEgg, EventKind, InputEvent, TriggerDetector, DEFAULT_BUFFER_LEN};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

/// Routes that carry page-scoped eggs
pub const PAGE_ROUTES: &[&str] = &["/about", "/projects"];

const KONAMI: &str = "<arrowup><arrowup><arrowdown><arrowdown><arrowleft><arrowright><arrowleft><arrowright>ba";

/// Egg ids that grant a persisted achievement
pub const EGG_ACHIEVEMENTS: &[(&str, &str)] = &[
    ("konami", "konami-master"),
    ("space", "space-explorer"),
    ("matrix", "matrix-hacker"),
    ("devtools", "dev-inspector"),
    ("rapid-clicks", "click-frenzy"),
    ("planet", "planet-hopper"),
    ("coffee", "coffee-break"),
];

/// Achievement granted by an egg, if any
pub fn achievement_for_egg(egg_id: &str) -> Option<&'static str> {
    EGG_ACHIEVEMENTS
        .iter()
        .find(|(egg, _)| *egg == egg_id)
        .map(|(_, achievement)| *achievement)
}

fn is_devtools_shortcut(event: &InputEvent) -> bool {
    match event {
        InputEvent::Key { code, modifiers, .. } => {
            code == "F12"
                || (modifiers.ctrl && modifiers.shift && code == "KeyI")
                || (modifiers.meta && modifiers.alt && code == "KeyI")
        }
        InputEvent::Click { .. } => false,
    }
}

/// Eggs that listen on every page
pub fn global_registry() -> Vec<EasterEgg> {
    vec![
        EasterEgg::sequence("konami", "Konami Code", KONAMI, "+30 lives. Old habits die hard."),
        EasterEgg::sequence("space", "Space", "space", "Houston, we have a visitor."),
        EasterEgg::sequence("matrix", "The Matrix", "matrix", "Wake up, Neo..."),
        EasterEgg::sequence("hello", "Hello", "hello", "Hello to you too!"),
        EasterEgg::predicate(
            "devtools",
            "Developer Tools",
            EventKind::Key,
            is_devtools_shortcut,
            "Looking under the hood? The source is on GitHub.",
        ),
        EasterEgg::predicate(
            "rapid-clicks",
            "Rapid Clicks",
            EventKind::Click,
            |event| matches!(event, InputEvent::Click { count, .. } if *count >= 3),
            "Easy there, the mouse has feelings.",
        )
        .with_cooldown(Duration::from_secs(5)),
    ]
}

/// Eggs bound to one route; unknown routes have none
pub fn page_registry(route: &str) -> Vec<EasterEgg> {
    match route {
        "/about" => vec![EasterEgg::predicate(
            "planet",
            "Planet",
            EventKind::Click,
            |event| event.has_tag("planet"),
            "You found a hidden world.",
        )],
        "/projects" => vec![EasterEgg::sequence(
            "space",
            "Space",
            "space",
            "Houston, we have a visitor.",
        )],
        _ => Vec::new(),
    }
}

/// Eggs matched against command palette input
pub fn palette_registry() -> Vec<EasterEgg> {
    vec![
        EasterEgg::sequence("sudo", "sudo", "sudo", "Nice try. You are not in the sudoers file."),
        EasterEgg::sequence("coffee", "Coffee", "coffee", "418: I'm a teapot."),
        EasterEgg::sequence("hire-me", "Hire Me", "hire me", "The contact form is one click away."),
    ]
}

/// The detectors for every registry
pub struct EggRouter {
    global: TriggerDetector,
    pages: HashMap<String, TriggerDetector>,
    palette: TriggerDetector,
    active_route: Option<String>,
}

impl Default for EggRouter {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_LEN)
    }
}

impl EggRouter {
    pub fn new(buffer_len: usize) -> Self {
        let pages = PAGE_ROUTES
            .iter()
            .map(|route| (route.to_string(), TriggerDetector::with_eggs(buffer_len, page_registry(route))))
            .collect();
        Self {
            global: TriggerDetector::with_eggs(buffer_len, global_registry()),
            pages,
            palette: TriggerDetector::with_eggs(buffer_len, palette_registry()),
            active_route: None,
        }
    }

    /// Bind page-scoped detection to a route, starting its buffer empty
    pub fn set_route(&mut self, route: &str) {
        if self.active_route.as_deref() == Some(route) {
            return;
        }
        if let Some(detector) = self.pages.get_mut(route) {
            detector.clear_buffer();
        }
        debug!("Egg router now on route {}", route);
        self.active_route = Some(route.to_string());
    }

    pub fn active_route(&self) -> Option<&str> {
        self.active_route.as_deref()
    }

    /// Feed a raw event to the global and active page detectors
    pub fn handle(&mut self, event: &InputEvent) -> Vec<String> {
        let mut fired = self.global.handle(event);
        if let Some(route) = &self.active_route {
            if let Some(page) = self.pages.get_mut(route) {
                fired.extend(page.handle(event));
            }
        }
        fired
    }

    /// Feed command palette text
    pub fn palette_input(&mut self, text: &str) -> Vec<String> {
        self.palette.handle_text(text)
    }

    /// Find an egg record in any registry
    pub fn egg(&self, id: &str) -> Option<&EasterEgg> {
        self.global
            .egg(id)
            .or_else(|| self.palette.egg(id))
            .or_else(|| self.pages.values().find_map(|d| d.egg(id)))
    }
}

/// What the UI shows when an egg is found
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EggNotice {
    pub egg_id: String,
    pub display_name: String,
    pub message: String,
    /// Achievement newly unlocked by this egg
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievement: Option<&'static str>,
}

/// Per-session consumer: de-duplicates eggs and forwards them to the store
pub struct EggSession {
    router: EggRouter,
    fired_ids: HashSet<String>,
}

impl Default for EggSession {
    fn default() -> Self {
        Self::new(EggRouter::default())
    }
}

impl EggSession {
    pub fn new(router: EggRouter) -> Self {
        Self { router, fired_ids: HashSet::new() }
    }

    pub fn router(&self) -> &EggRouter {
        &self.router
    }

    pub fn set_route(&mut self, route: &str) {
        self.router.set_route(route);
    }

    pub fn has_fired(&self, egg_id: &str) -> bool {
        self.fired_ids.contains(egg_id)
    }

    /// Handle a raw input event
    pub fn handle(&mut self, event: &InputEvent, store: &ProgressionStore) -> Vec<EggNotice> {
        let fired = self.router.handle(event);
        self.consume(fired, store)
    }

    /// Handle command palette text
    pub fn palette_input(&mut self, text: &str, store: &ProgressionStore) -> Vec<EggNotice> {
        let fired = self.router.palette_input(text);
        self.consume(fired, store)
    }

    fn consume(&mut self, fired: Vec<String>, store: &ProgressionStore) -> Vec<EggNotice> {
        let mut notices = Vec::new();
        for egg_id in fired {
            if !self.fired_ids.insert(egg_id.clone()) {
                continue;
            }
            let Some(egg) = self.router.egg(&egg_id) else {
                continue;
            };

            let mut achievement = None;
            if let Some(achievement_id) = achievement_for_egg(&egg_id) {
                if store.unlock_achievement(achievement_id, true) {
                    achievement = Some(achievement_id);
                    let found = store.stats().easter_eggs_found;
                    store.update_achievement_progress(EGG_HUNTER_ID, i64::try_from(found).unwrap_or(i64::MAX));
                }
            }

            info!("Easter egg found: {}", egg_id);
            notices.push(EggNotice {
                egg_id: egg.id.clone(),
                display_name: egg.display_name.clone(),
                message: egg.message.clone(),
                achievement,
            });
        }
        notices
    }

    /// Forget which eggs were seen (new page load)
    pub fn reset(&mut self) {
        self.fired_ids.clear();
    }
}
