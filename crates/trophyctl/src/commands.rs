//! Command handlers for trophyctl.

use crate::display;
use anyhow::{bail, Result};
use std::time::Instant;
use tracing::debug;
use trophy_shared::eggs::EggNotice;
use trophy_shared::triggers::Modifiers;
use trophy_shared::{
    Category, EggRouter, EggSession, InputEvent, Locale, ProgressionStore, StatKind, TrophyConfig,
};

/// Everything a command needs
pub struct Context {
    pub store: ProgressionStore,
    pub locale: Locale,
    /// Wait for announcements to come due instead of dumping them
    pub wait: bool,
    buffer_len: usize,
}

impl Context {
    pub fn new(config: TrophyConfig, locale: Locale, wait: bool) -> Self {
        debug!("Using data dir {}", config.storage.data_dir.display());
        let store = ProgressionStore::from_config(&config);
        store.subscribe(|event| debug!("Store event: {:?}", event));
        Self {
            store,
            locale,
            wait,
            buffer_len: config.triggers.effective_buffer_len(),
        }
    }

    fn egg_session(&self, route: Option<&str>) -> EggSession {
        let mut session = EggSession::new(EggRouter::new(self.buffer_len));
        if let Some(route) = route {
            session.set_route(route);
        }
        session
    }
}

/// Print announcements in order, sleeping until each comes due
async fn drain_announcements(ctx: &Context) {
    if !ctx.wait {
        for announcement in ctx.store.pending_announcements() {
            display::print_announcement(&announcement.achievement, ctx.locale);
        }
        ctx.store.cancel_announcements();
        return;
    }

    while let Some(due) = ctx.store.next_announcement_due() {
        tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await;
        if let Some(announcement) = ctx.store.next_announcement(Instant::now()) {
            display::print_announcement(&announcement.achievement, ctx.locale);
        }
    }
}

fn print_notices(notices: &[EggNotice]) {
    for notice in notices {
        display::print_egg_notice(notice);
    }
}

/// Handle status command
pub fn status(ctx: &Context, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&ctx.store.snapshot())?);
        return Ok(());
    }
    display::print_status(&ctx.store.stats(), &ctx.store.xp_progress());
    Ok(())
}

/// Handle list command
pub fn list(ctx: &Context, category: Option<&str>, locked: bool, unlocked: bool) -> Result<()> {
    let mut achievements = match category {
        Some(name) => match Category::parse(name) {
            Some(category) => ctx.store.by_category(category),
            None => bail!("Unknown category '{}'", name),
        },
        None => ctx.store.snapshot().achievements,
    };
    if locked {
        achievements.retain(|a| !a.is_unlocked());
    } else if unlocked {
        achievements.retain(|a| a.is_unlocked());
    }

    for achievement in &achievements {
        display::print_achievement_row(achievement, ctx.locale);
    }
    println!();
    println!("{} shown", achievements.len());
    Ok(())
}

/// Handle unlock command
pub async fn unlock(ctx: &Context, id: &str, quiet: bool) -> Result<()> {
    if ctx.store.achievement(id).is_none() {
        bail!("Unknown achievement '{}'", id);
    }
    if !ctx.store.unlock_achievement(id, !quiet) {
        println!("'{}' was not unlocked (already unlocked or not yet due)", id);
        return Ok(());
    }
    if quiet {
        println!("Unlocked '{}'", id);
    }
    drain_announcements(ctx).await;
    Ok(())
}

/// Handle progress command
pub async fn progress(ctx: &Context, id: &str, value: i64) -> Result<()> {
    let Some(before) = ctx.store.achievement(id) else {
        bail!("Unknown achievement '{}'", id);
    };
    if before.max_progress.is_none() {
        bail!("'{}' has no progress track", id);
    }

    ctx.store.update_achievement_progress(id, value);
    if let Some(after) = ctx.store.achievement(id) {
        display::print_achievement_row(&after, ctx.locale);
    }
    drain_announcements(ctx).await;
    Ok(())
}

/// Handle xp command
pub fn xp(ctx: &Context, amount: u64, reason: &str) -> Result<()> {
    let level_before = ctx.store.stats().level;
    ctx.store.add_xp(amount, reason);
    let stats = ctx.store.stats();
    println!("+{} XP ({}), total {}", amount, reason, stats.total_xp);
    if stats.level > level_before {
        display::print_level_up(stats.level);
    }
    Ok(())
}

/// Handle stat command
pub fn stat(ctx: &Context, name: &str, amount: Option<f64>) -> Result<()> {
    let stat: StatKind = name.parse()?;
    match amount {
        None => {}
        Some(minutes) if stat == StatKind::TimeSpent => {
            if !minutes.is_finite() || minutes < 0.0 {
                bail!("Time spent must be a non-negative number of minutes");
            }
            ctx.store.add_time_spent(minutes);
        }
        Some(count) => {
            if count < 0.0 || count.fract() != 0.0 || !count.is_finite() {
                bail!("'{}' only counts whole, non-negative amounts", stat);
            }
            ctx.store.increment_stat(stat, count as u64);
        }
    }
    println!("{} = {}", stat, ctx.store.state().stat_value(stat));
    Ok(())
}

/// Handle keys command
pub async fn keys(ctx: &Context, codes: &[String], route: Option<&str>, modifiers: Modifiers) -> Result<()> {
    let mut session = ctx.egg_session(route);
    let mut notices = Vec::new();
    for code in codes {
        let event = InputEvent::key_with(code, "", modifiers);
        notices.extend(session.handle(&event, &ctx.store));
    }

    if notices.is_empty() {
        println!("Nothing happened.");
    }
    print_notices(&notices);
    drain_announcements(ctx).await;
    Ok(())
}

/// Handle click command
pub async fn click(ctx: &Context, count: u32, tags: &[String], route: Option<&str>) -> Result<()> {
    let mut session = ctx.egg_session(route);
    let event = InputEvent::Click {
        count,
        tags: tags.to_vec(),
        modifiers: Modifiers::default(),
    };
    let notices = session.handle(&event, &ctx.store);

    if notices.is_empty() {
        println!("Nothing happened.");
    }
    print_notices(&notices);
    drain_announcements(ctx).await;
    Ok(())
}

/// Handle palette command
pub async fn palette(ctx: &Context, text: &str) -> Result<()> {
    let mut session = ctx.egg_session(None);
    let notices = session.palette_input(text, &ctx.store);

    if notices.is_empty() {
        println!("No command matches '{}'.", text);
    }
    print_notices(&notices);
    drain_announcements(ctx).await;
    Ok(())
}

/// Handle history command
pub fn history(ctx: &Context) -> Result<()> {
    let entries = ctx.store.history();
    if entries.is_empty() {
        println!("No XP earned yet.");
        return Ok(());
    }
    for entry in entries.iter().rev() {
        display::print_history_entry(entry);
    }
    Ok(())
}

/// Handle reset command
pub fn reset(ctx: &Context) -> Result<()> {
    ctx.store.reset_progress();
    println!("Progression reset.");
    Ok(())
}
