//! Easter egg trigger detection.
//!
//! A [`TriggerDetector`] turns a stream of raw input events into egg ids.
//! Key events are normalized into tokens and appended to a bounded rolling
//! buffer; fixed-sequence triggers fire when the newest token completes their
//! token run, and predicate triggers are evaluated directly against each event
//! of the kind they listen for.
//!
//! Detectors know nothing about achievements. They may fire the same egg
//! repeatedly; de-duplication per session is the consumer's job.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default rolling buffer length
pub const DEFAULT_BUFFER_LEN: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Key,
    Click,
}

/// Raw input as delivered by the host
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key {
        /// Physical key code, e.g. `KeyS` or `ArrowUp`
        code: String,
        /// Produced key value, e.g. `s`
        key: String,
        modifiers: Modifiers,
    },
    Click {
        /// Consecutive click count reported by the host
        count: u32,
        /// Tags carried by the clicked element
        tags: Vec<String>,
        modifiers: Modifiers,
    },
}

impl InputEvent {
    pub fn key(code: &str) -> Self {
        InputEvent::Key { code: code.to_string(), key: String::new(), modifiers: Modifiers::default() }
    }

    pub fn key_with(code: &str, key: &str, modifiers: Modifiers) -> Self {
        InputEvent::Key { code: code.to_string(), key: key.to_string(), modifiers }
    }

    pub fn click(count: u32) -> Self {
        InputEvent::Click { count, tags: Vec::new(), modifiers: Modifiers::default() }
    }

    pub fn click_on(count: u32, tags: &[&str]) -> Self {
        InputEvent::Click {
            count,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            modifiers: Modifiers::default(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            InputEvent::Key { .. } => EventKind::Key,
            InputEvent::Click { .. } => EventKind::Click,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            InputEvent::Key { modifiers, .. } | InputEvent::Click { modifiers, .. } => *modifiers,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        matches!(self, InputEvent::Click { tags, .. } if tags.iter().any(|t| t == tag))
    }
}

/// Normalize a key event into a buffer token.
///
/// `KeyX` becomes `x`, `DigitN` becomes `N`, `Space` becomes a space and any
/// other code becomes `<code>` in lowercase. Without a code the key value is
/// used instead.
pub fn normalize_key(code: &str, key: &str) -> Option<String> {
    if let Some(letter) = code.strip_prefix("Key") {
        if letter.len() == 1 {
            return Some(letter.to_ascii_lowercase());
        }
    }
    if let Some(digit) = code.strip_prefix("Digit") {
        if digit.len() == 1 {
            return Some(digit.to_string());
        }
    }
    if code == "Space" {
        return Some(" ".to_string());
    }
    if !code.is_empty() {
        return Some(format!("<{}>", code.to_ascii_lowercase()));
    }

    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c.to_lowercase().collect()),
        (Some(_), Some(_)) => Some(format!("<{}>", key.to_ascii_lowercase())),
        _ => None,
    }
}

/// Split a sequence target into tokens: `<name>` groups or single chars
fn tokenize(target: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = target.chars();
    while let Some(c) = chars.next() {
        if c == '<' {
            let mut group = String::from("<");
            let mut closed = false;
            for next in chars.by_ref() {
                group.push(next);
                if next == '>' {
                    closed = true;
                    break;
                }
            }
            if closed {
                tokens.push(group.to_ascii_lowercase());
            } else {
                tokens.extend(group.chars().map(|c| c.to_lowercase().collect::<String>()));
            }
        } else {
            tokens.push(c.to_lowercase().collect());
        }
    }
    tokens
}

pub type PredicateFn = Box<dyn Fn(&InputEvent) -> bool + Send + Sync>;
pub type FireHook = Box<dyn Fn() + Send + Sync>;

/// How an egg is triggered
pub enum Trigger {
    /// Token run that must appear contiguously in the rolling key buffer
    FixedSequence(String),
    /// Test evaluated against every event of the given kind
    Predicate { on: EventKind, test: PredicateFn },
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::FixedSequence(seq) => f.debug_tuple("FixedSequence").field(seq).finish(),
            Trigger::Predicate { on, .. } => f.debug_struct("Predicate").field("on", on).finish_non_exhaustive(),
        }
    }
}

/// An easter egg trigger record
pub struct EasterEgg {
    pub id: String,
    pub display_name: String,
    pub trigger: Trigger,
    pub message: String,
    pub on_fire: Option<FireHook>,
    pub cooldown: Option<Duration>,
}

impl std::fmt::Debug for EasterEgg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EasterEgg")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}

impl EasterEgg {
    pub fn sequence(id: &str, display_name: &str, sequence: &str, message: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            trigger: Trigger::FixedSequence(sequence.to_string()),
            message: message.to_string(),
            on_fire: None,
            cooldown: None,
        }
    }

    pub fn predicate<F>(id: &str, display_name: &str, on: EventKind, test: F, message: &str) -> Self
    where
        F: Fn(&InputEvent) -> bool + Send + Sync + 'static,
    {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            trigger: Trigger::Predicate { on, test: Box::new(test) },
            message: message.to_string(),
            on_fire: None,
            cooldown: None,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    pub fn on_fire<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_fire = Some(Box::new(hook));
        self
    }
}

struct Registered {
    egg: EasterEgg,
    /// Tokenized target for sequence triggers
    tokens: Vec<String>,
}

/// One independent detector with its own rolling buffer
pub struct TriggerDetector {
    eggs: Vec<Registered>,
    buffer: VecDeque<String>,
    capacity: usize,
    last_fired: HashMap<String, Instant>,
}

impl Default for TriggerDetector {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_LEN)
    }
}

impl TriggerDetector {
    pub fn new(capacity: usize) -> Self {
        Self {
            eggs: Vec::new(),
            buffer: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            last_fired: HashMap::new(),
        }
    }

    /// Detector pre-loaded with a registry of eggs
    pub fn with_eggs(capacity: usize, eggs: Vec<EasterEgg>) -> Self {
        let mut detector = Self::new(capacity);
        for egg in eggs {
            detector.register(egg);
        }
        detector
    }

    /// Register an egg. Sequences that are empty or cannot fit the buffer
    /// are skipped.
    pub fn register(&mut self, egg: EasterEgg) {
        let tokens = match &egg.trigger {
            Trigger::FixedSequence(seq) => {
                let tokens = tokenize(seq);
                if tokens.is_empty() || tokens.len() > self.capacity {
                    warn!(
                        "Skipping egg '{}': sequence of {} tokens does not fit a buffer of {}",
                        egg.id,
                        tokens.len(),
                        self.capacity
                    );
                    return;
                }
                tokens
            }
            Trigger::Predicate { .. } => Vec::new(),
        };
        self.eggs.push(Registered { egg, tokens });
    }

    pub fn egg(&self, id: &str) -> Option<&EasterEgg> {
        self.eggs.iter().map(|r| &r.egg).find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.eggs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eggs.is_empty()
    }

    /// Current buffer contents, oldest first
    pub fn buffer(&self) -> Vec<String> {
        self.buffer.iter().cloned().collect()
    }

    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    fn push_token(&mut self, token: String) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(token);
    }

    /// Feed one event, returning the ids of eggs that fired
    pub fn handle(&mut self, event: &InputEvent) -> Vec<String> {
        self.handle_at(event, Instant::now())
    }

    pub fn handle_at(&mut self, event: &InputEvent, now: Instant) -> Vec<String> {
        let token = match event {
            InputEvent::Key { code, key, .. } => normalize_key(code, key),
            InputEvent::Click { .. } => None,
        };
        let appended = token.is_some();
        if let Some(token) = token {
            self.push_token(token);
        }
        self.evaluate(event, appended, now)
    }

    /// Feed typed text one character at a time (command palette input)
    pub fn handle_text(&mut self, text: &str) -> Vec<String> {
        let now = Instant::now();
        let mut fired = Vec::new();
        for c in text.chars() {
            self.push_token(c.to_lowercase().collect());
            let event = InputEvent::key_with("", &c.to_string(), Modifiers::default());
            fired.extend(self.evaluate(&event, true, now));
        }
        fired
    }

    fn evaluate(&mut self, event: &InputEvent, appended: bool, now: Instant) -> Vec<String> {
        let Self { eggs, buffer, last_fired, .. } = self;
        let kind = event.kind();
        let mut fired = Vec::new();

        for reg in eggs.iter() {
            let egg = &reg.egg;
            let (matched, is_sequence) = match &egg.trigger {
                Trigger::FixedSequence(_) => {
                    if !appended || buffer.len() < reg.tokens.len() {
                        continue;
                    }
                    // Only a run completed by the newest token counts
                    let start = buffer.len() - reg.tokens.len();
                    let hit = buffer.iter().skip(start).eq(reg.tokens.iter());
                    (hit, true)
                }
                Trigger::Predicate { on, test } => {
                    if *on != kind {
                        continue;
                    }
                    match catch_unwind(AssertUnwindSafe(|| test(event))) {
                        Ok(hit) => (hit, false),
                        Err(_) => {
                            warn!("Trigger predicate for egg '{}' panicked; skipping", egg.id);
                            continue;
                        }
                    }
                }
            };
            if !matched {
                continue;
            }

            if let (Some(cooldown), Some(last)) = (egg.cooldown, last_fired.get(&egg.id)) {
                if now.saturating_duration_since(*last) < cooldown {
                    debug!("Egg '{}' is cooling down", egg.id);
                    if is_sequence {
                        buffer.clear();
                    }
                    continue;
                }
            }

            if let Some(hook) = &egg.on_fire {
                if catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
                    warn!("on_fire hook for egg '{}' panicked", egg.id);
                }
            }

            debug!("Egg '{}' fired", egg.id);
            last_fired.insert(egg.id.clone(), now);
            fired.push(egg.id.clone());
            if is_sequence {
                buffer.clear();
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn feed(detector: &mut TriggerDetector, codes: &[&str]) -> Vec<String> {
        codes.iter().flat_map(|c| detector.handle(&InputEvent::key(c))).collect()
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("KeyS", "s").as_deref(), Some("s"));
        assert_eq!(normalize_key("Digit7", "7").as_deref(), Some("7"));
        assert_eq!(normalize_key("Space", " ").as_deref(), Some(" "));
        assert_eq!(normalize_key("ArrowUp", "ArrowUp").as_deref(), Some("<arrowup>"));
        assert_eq!(normalize_key("", "Q").as_deref(), Some("q"));
        assert_eq!(normalize_key("", "Enter").as_deref(), Some("<enter>"));
        assert_eq!(normalize_key("", ""), None);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("ab"), vec!["a", "b"]);
        assert_eq!(tokenize("<ArrowUp>b"), vec!["<arrowup>", "b"]);
        assert_eq!(tokenize("a<b"), vec!["a", "<", "b"]);
    }

    #[test]
    fn test_sequence_fires_and_clears() {
        let mut d = TriggerDetector::default();
        d.register(EasterEgg::sequence("space", "Space", "space", "To infinity"));

        let codes = ["KeyS", "KeyP", "KeyA", "KeyC", "KeyE"];
        assert_eq!(feed(&mut d, &codes), vec!["space"]);
        assert!(d.buffer().is_empty());
        assert_eq!(feed(&mut d, &codes), vec!["space"]);
    }

    #[test]
    fn test_sequence_matches_inside_noise() {
        let mut d = TriggerDetector::default();
        d.register(EasterEgg::sequence("space", "Space", "space", ""));
        let fired = feed(&mut d, &["KeyX", "Digit1", "KeyS", "KeyP", "KeyA", "KeyC", "KeyE", "KeyZ"]);
        assert_eq!(fired, vec!["space"]);
    }

    #[test]
    fn test_special_keys_do_not_leak_letters() {
        let mut d = TriggerDetector::default();
        d.register(EasterEgg::sequence("space", "Space", "space", ""));
        assert!(feed(&mut d, &["Backspace", "Space"]).is_empty());
    }

    #[test]
    fn test_buffer_is_bounded() {
        let mut d = TriggerDetector::new(4);
        feed(&mut d, &["KeyA", "KeyB", "KeyC", "KeyD", "KeyE", "KeyF"]);
        assert_eq!(d.buffer(), vec!["c", "d", "e", "f"]);
    }

    #[test]
    fn test_overlong_sequence_skipped() {
        let mut d = TriggerDetector::new(3);
        d.register(EasterEgg::sequence("long", "Long", "abcd", ""));
        d.register(EasterEgg::sequence("empty", "Empty", "", ""));
        assert!(d.is_empty());
    }

    #[test]
    fn test_overlapping_sequences_first_wins() {
        let mut d = TriggerDetector::default();
        d.register(EasterEgg::sequence("abc", "ABC", "abc", ""));
        d.register(EasterEgg::sequence("bc", "BC", "bc", ""));
        assert_eq!(feed(&mut d, &["KeyA", "KeyB", "KeyC"]), vec!["abc"]);
    }

    #[test]
    fn test_predicate_on_clicks() {
        let mut d = TriggerDetector::default();
        d.register(EasterEgg::predicate(
            "triple",
            "Triple",
            EventKind::Click,
            |e| matches!(e, InputEvent::Click { count, .. } if *count >= 3),
            "",
        ));
        assert!(d.handle(&InputEvent::click(1)).is_empty());
        assert_eq!(d.handle(&InputEvent::click(3)), vec!["triple"]);
        // Key events never reach click predicates
        assert!(d.handle(&InputEvent::key("KeyA")).is_empty());
    }

    #[test]
    fn test_panicking_predicate_is_isolated() {
        let mut d = TriggerDetector::default();
        d.register(EasterEgg::predicate("bad", "Bad", EventKind::Key, |_| panic!("malformed"), ""));
        d.register(EasterEgg::sequence("hi", "Hi", "hi", ""));
        d.register(EasterEgg::predicate("any-key", "Any", EventKind::Key, |_| true, ""));

        assert_eq!(d.handle(&InputEvent::key("KeyH")), vec!["any-key"]);
        assert_eq!(d.buffer(), vec!["h"]);
        assert_eq!(d.handle(&InputEvent::key("KeyI")), vec!["hi", "any-key"]);
    }

    #[test]
    fn test_cooldown() {
        let mut d = TriggerDetector::default();
        d.register(
            EasterEgg::predicate("click", "Click", EventKind::Click, |_| true, "")
                .with_cooldown(Duration::from_secs(10)),
        );
        let t0 = Instant::now();
        assert_eq!(d.handle_at(&InputEvent::click(1), t0).len(), 1);
        assert!(d.handle_at(&InputEvent::click(1), t0 + Duration::from_secs(5)).is_empty());
        assert_eq!(d.handle_at(&InputEvent::click(1), t0 + Duration::from_secs(11)).len(), 1);
    }

    #[test]
    fn test_suppressed_sequence_does_not_linger() {
        let mut d = TriggerDetector::default();
        d.register(EasterEgg::sequence("hi", "Hi", "hi", "").with_cooldown(Duration::from_secs(10)));
        let t0 = Instant::now();
        let at = |secs| t0 + Duration::from_secs(secs);

        assert!(d.handle_at(&InputEvent::key("KeyH"), at(0)).is_empty());
        assert_eq!(d.handle_at(&InputEvent::key("KeyI"), at(0)), vec!["hi"]);

        d.handle_at(&InputEvent::key("KeyH"), at(1));
        assert!(d.handle_at(&InputEvent::key("KeyI"), at(1)).is_empty());
        assert!(d.buffer().is_empty());

        assert!(d.handle_at(&InputEvent::key("KeyZ"), at(20)).is_empty());
        d.handle_at(&InputEvent::key("KeyH"), at(21));
        assert_eq!(d.handle_at(&InputEvent::key("KeyI"), at(21)), vec!["hi"]);
    }

    #[test]
    fn test_on_fire_hook_runs() {
        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&count);
        let mut d = TriggerDetector::default();
        d.register(
            EasterEgg::sequence("ok", "Ok", "ok", "").on_fire(move || {
                hook_count.fetch_add(1, Ordering::SeqCst);
            }),
        );
        feed(&mut d, &["KeyO", "KeyK"]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_text() {
        let mut d = TriggerDetector::default();
        d.register(EasterEgg::sequence("hire", "Hire", "hire me", ""));
        assert_eq!(d.handle_text("please HIRE ME"), vec!["hire"]);
    }
}
