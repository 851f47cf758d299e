//! Achievement catalog for the portfolio progression system.
//!
//! The catalog is static and never mutated at runtime. Whether an achievement
//! is unlocked, and how far along it is, lives exclusively in
//! [`ProgressionState`](crate::progression::ProgressionState); the two are
//! joined by id into an [`Achievement`] read model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Id of the achievement granted for unlocking everything else.
pub const COMPLETIONIST_ID: &str = "completionist";

/// Id of the incremental achievement tracking easter eggs found.
pub const EGG_HUNTER_ID: &str = "egg-hunter";

/// Rarity tier, a purely cosmetic classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    EasterEgg,
    Interaction,
    Exploration,
    Mastery,
    Social,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::EasterEgg,
        Category::Interaction,
        Category::Exploration,
        Category::Mastery,
        Category::Social,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::EasterEgg => "easter-egg",
            Category::Interaction => "interaction",
            Category::Exploration => "exploration",
            Category::Mastery => "mastery",
            Category::Social => "social",
        }
    }

    /// Parse a category from its kebab-case name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Display locale for catalog text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
}

/// Two-locale text record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalizedText {
    pub en: &'static str,
    pub es: &'static str,
}

impl LocalizedText {
    const fn new(en: &'static str, es: &'static str) -> Self {
        Self { en, es }
    }

    pub fn get(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => self.en,
            Locale::Es => self.es,
        }
    }
}

/// Immutable catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementDef {
    /// Unique, stable identifier
    pub id: &'static str,
    pub name: LocalizedText,
    /// How to earn it
    pub description: LocalizedText,
    /// Opaque display token, resolved by the renderer
    pub icon: &'static str,
    pub points: u64,
    pub rarity: Rarity,
    pub category: Category,
    /// Present only for incrementally unlocked achievements
    pub max_progress: Option<u32>,
}

impl AchievementDef {
    const fn new(
        id: &'static str,
        name: LocalizedText,
        description: LocalizedText,
        icon: &'static str,
        points: u64,
        rarity: Rarity,
        category: Category,
    ) -> Self {
        Self { id, name, description, icon, points, rarity, category, max_progress: None }
    }

    const fn incremental(mut self, max_progress: u32) -> Self {
        self.max_progress = Some(max_progress);
        self
    }
}

use Category::*;
use Rarity::*;

static CATALOG: &[AchievementDef] = &[
    // Interaction
    AchievementDef::new(
        "first-visit",
        LocalizedText::new("Hello World", "Hola Mundo"),
        LocalizedText::new("Visit the portfolio for the first time", "Visita el portafolio por primera vez"),
        "wave", 10, Common, Interaction,
    ),
    AchievementDef::new(
        "theme-switcher",
        LocalizedText::new("Light Bender", "Doblador de Luz"),
        LocalizedText::new("Toggle the color theme", "Cambia el tema de color"),
        "palette", 10, Common, Interaction,
    ),
    AchievementDef::new(
        "polyglot",
        LocalizedText::new("Polyglot", "Políglota"),
        LocalizedText::new("Switch the site language", "Cambia el idioma del sitio"),
        "globe", 10, Common, Interaction,
    ),
    AchievementDef::new(
        "command-master",
        LocalizedText::new("Command Master", "Maestro de Comandos"),
        LocalizedText::new("Run 10 commands from the command palette", "Ejecuta 10 comandos desde la paleta"),
        "terminal", 20, Rare, Interaction,
    )
    .incremental(10),
    // Exploration
    AchievementDef::new(
        "portfolio-explorer",
        LocalizedText::new("Portfolio Explorer", "Explorador del Portafolio"),
        LocalizedText::new("View 5 different projects", "Mira 5 proyectos diferentes"),
        "compass", 20, Rare, Exploration,
    )
    .incremental(5),
    AchievementDef::new(
        "certificate-collector",
        LocalizedText::new("Certificate Collector", "Coleccionista de Certificados"),
        LocalizedText::new("Open 3 certificates", "Abre 3 certificados"),
        "scroll", 20, Rare, Exploration,
    )
    .incremental(3),
    AchievementDef::new(
        "night-owl",
        LocalizedText::new("Night Owl", "Búho Nocturno"),
        LocalizedText::new("Browse the site after midnight", "Navega por el sitio después de medianoche"),
        "moon", 15, Rare, Exploration,
    ),
    // Mastery
    AchievementDef::new(
        "dedicated-visitor",
        LocalizedText::new("Dedicated Visitor", "Visitante Dedicado"),
        LocalizedText::new("Spend 30 minutes on the site", "Pasa 30 minutos en el sitio"),
        "hourglass", 30, Epic, Mastery,
    )
    .incremental(30),
    AchievementDef::new(
        EGG_HUNTER_ID,
        LocalizedText::new("Egg Hunter", "Cazador de Huevos"),
        LocalizedText::new("Find 5 easter eggs", "Encuentra 5 huevos de pascua"),
        "basket", 50, Epic, Mastery,
    )
    .incremental(5),
    // Easter eggs
    AchievementDef::new(
        "konami-master",
        LocalizedText::new("Konami Master", "Maestro Konami"),
        LocalizedText::new("Enter the legendary code", "Introduce el código legendario"),
        "gamepad", 50, Epic, EasterEgg,
    ),
    AchievementDef::new(
        "space-explorer",
        LocalizedText::new("Space Explorer", "Explorador Espacial"),
        LocalizedText::new("Type the word that opens the cosmos", "Escribe la palabra que abre el cosmos"),
        "rocket", 25, Rare, EasterEgg,
    ),
    AchievementDef::new(
        "matrix-hacker",
        LocalizedText::new("Matrix Hacker", "Hacker de la Matrix"),
        LocalizedText::new("Follow the white rabbit", "Sigue al conejo blanco"),
        "pill", 25, Rare, EasterEgg,
    ),
    AchievementDef::new(
        "dev-inspector",
        LocalizedText::new("Inspector", "Inspector"),
        LocalizedText::new("Open the developer tools", "Abre las herramientas de desarrollo"),
        "wrench", 15, Common, EasterEgg,
    ),
    AchievementDef::new(
        "click-frenzy",
        LocalizedText::new("Click Frenzy", "Frenesí de Clics"),
        LocalizedText::new("Click three times in a row, fast", "Haz tres clics rápidos seguidos"),
        "pointer", 10, Common, EasterEgg,
    ),
    AchievementDef::new(
        "planet-hopper",
        LocalizedText::new("Planet Hopper", "Saltador de Planetas"),
        LocalizedText::new("Click a planet on the about page", "Haz clic en un planeta en la página sobre mí"),
        "planet", 25, Rare, EasterEgg,
    ),
    AchievementDef::new(
        "coffee-break",
        LocalizedText::new("Coffee Break", "Pausa para el Café"),
        LocalizedText::new("Ask the command palette for coffee", "Pide café a la paleta de comandos"),
        "coffee", 15, Common, EasterEgg,
    ),
    // Social
    AchievementDef::new(
        "social-butterfly",
        LocalizedText::new("Social Butterfly", "Mariposa Social"),
        LocalizedText::new("Follow a social profile link", "Sigue un enlace a una red social"),
        "butterfly", 15, Common, Social,
    ),
    AchievementDef::new(
        "networker",
        LocalizedText::new("Networker", "Networker"),
        LocalizedText::new("Send a message through the contact form", "Envía un mensaje desde el formulario de contacto"),
        "envelope", 20, Rare, Social,
    ),
    // Granted automatically once every other achievement is unlocked
    AchievementDef::new(
        COMPLETIONIST_ID,
        LocalizedText::new("Completionist", "Completista"),
        LocalizedText::new("Unlock every other achievement", "Desbloquea todos los demás logros"),
        "crown", 100, Legendary, Mastery,
    ),
];

/// All catalog entries, in display order
pub fn all() -> &'static [AchievementDef] {
    CATALOG
}

/// Number of catalog entries
pub fn total() -> usize {
    CATALOG.len()
}

fn index() -> &'static HashMap<&'static str, usize> {
    static INDEX: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();
    INDEX.get_or_init(|| CATALOG.iter().enumerate().map(|(i, def)| (def.id, i)).collect())
}

/// Look up a catalog entry by id
pub fn by_id(id: &str) -> Option<&'static AchievementDef> {
    index().get(id).map(|&i| &CATALOG[i])
}

pub fn by_category(category: Category) -> Vec<&'static AchievementDef> {
    CATALOG.iter().filter(|def| def.category == category).collect()
}

/// Display color token for a rarity tier
pub fn rarity_color(rarity: Rarity) -> &'static str {
    match rarity {
        Rarity::Common => "#9ca3af",
        Rarity::Rare => "#3b82f6",
        Rarity::Epic => "#a855f7",
        Rarity::Legendary => "#f59e0b",
    }
}

pub fn points(def: &AchievementDef) -> u64 {
    def.points
}

/// Catalog entry joined with its runtime overlay
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: &'static str,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub icon: &'static str,
    pub points: u64,
    pub rarity: Rarity,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_progress: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl Achievement {
    pub fn join(def: &'static AchievementDef, progress: Option<u32>, unlocked_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: def.id,
            name: def.name,
            description: def.description,
            icon: def.icon,
            points: def.points,
            rarity: def.rarity,
            category: def.category,
            progress: def.max_progress.map(|_| progress.unwrap_or(0)),
            max_progress: def.max_progress,
            unlocked_at,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}

/// Format a single achievement for an unlock notification
pub fn format_unlock(ach: &Achievement, locale: Locale) -> String {
    format!(
        "[{}] Achievement unlocked: {} - {} (+{} XP)",
        ach.rarity,
        ach.name.get(locale),
        ach.description.get(locale),
        ach.points
    )
}
