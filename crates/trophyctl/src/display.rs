//! Display helpers for trophyctl output.

use owo_colors::OwoColorize;
use trophy_shared::achievements::format_unlock;
use trophy_shared::eggs::EggNotice;
use trophy_shared::levels;
use trophy_shared::{Achievement, Locale, Rarity, UserStats, XpHistoryEntry, XpProgress};

const BAR_WIDTH: usize = 30;
const KEY_WIDTH: usize = 20;

fn print_kv(key: &str, value: &str) {
    println!("{:width$} {}", key, value, width = KEY_WIDTH);
}

fn rarity_label(rarity: Rarity) -> String {
    let label = format!("[{}]", rarity);
    match rarity {
        Rarity::Common => label.dimmed().to_string(),
        Rarity::Rare => label.bright_blue().to_string(),
        Rarity::Epic => label.bright_magenta().to_string(),
        Rarity::Legendary => label.bright_yellow().to_string(),
    }
}

fn progress_bar(percentage: f64) -> String {
    let filled = ((percentage / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// Print status display
pub fn print_status(stats: &UserStats, progress: &XpProgress) {
    println!();
    println!("{}", format!("trophyctl v{}", trophy_shared::VERSION).bold());
    println!("{}", "-".repeat(50).dimmed());

    print_kv("level", &format!("{} ({})", stats.level, levels::title(stats.level)));
    print_kv("total_xp", &stats.total_xp.to_string());
    print_kv(
        "next_level",
        &format!(
            "{} {}/{} ({:.0}%)",
            progress_bar(progress.percentage),
            progress.current,
            progress.next,
            progress.percentage
        ),
    );
    println!();

    print_kv(
        "achievements",
        &format!("{}/{}", stats.achievements_unlocked, stats.total_achievements),
    );
    print_kv("easter_eggs_found", &stats.easter_eggs_found.to_string());
    print_kv("projects_viewed", &stats.projects_viewed.to_string());
    print_kv("time_spent", &format!("{:.1} min", stats.time_spent));
    if let Some(last) = stats.last_activity {
        print_kv("last_activity", &last.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
    println!();
}

/// One line per achievement in listings
pub fn print_achievement_row(achievement: &Achievement, locale: Locale) {
    let mark = if achievement.is_unlocked() {
        "[x]".bright_green().to_string()
    } else {
        "[ ]".dimmed().to_string()
    };
    let progress = match (achievement.progress, achievement.max_progress) {
        (Some(p), Some(max)) => format!(" {}/{}", p, max),
        _ => String::new(),
    };
    println!(
        "{} {:24} {:22} {} {:>4} XP{}",
        mark,
        achievement.id,
        achievement.name.get(locale),
        rarity_label(achievement.rarity),
        achievement.points,
        progress.dimmed()
    );
}

pub fn print_announcement(achievement: &Achievement, locale: Locale) {
    println!("{}", format_unlock(achievement, locale).bright_green());
}

pub fn print_egg_notice(notice: &EggNotice) {
    println!("{} {}", format!("* {}:", notice.display_name).bright_cyan(), notice.message);
}

pub fn print_level_up(level: u32) {
    println!(
        "{}",
        format!("Level up! Now level {} ({})", level, levels::title(level)).bright_yellow()
    );
}

pub fn print_history_entry(entry: &XpHistoryEntry) {
    println!(
        "{}  {:>5} XP  {}",
        entry.date.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        format!("+{}", entry.xp),
        entry.reason
    );
}
