use chrono::{DateTime, Local, Utc};

use reelmark_core::history::HistoryCounts;
use reelmark_core::models::{Platform, WatchRecord};
use reelmark_runtime::StatusReport;

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn stars(record: &WatchRecord) -> String {
    match record.rating {
        Some(r) => format!("{}{}", "★".repeat(r.value() as usize), "☆".repeat(5 - r.value() as usize)),
        None => "-".into(),
    }
}

pub fn print_records(records: &[WatchRecord]) {
    if records.is_empty() {
        println!("No titles yet.");
        return;
    }
    for record in records {
        let year = record
            .release_year
            .as_deref()
            .map(|y| format!(" ({y})"))
            .unwrap_or_default();
        println!(
            "{:<12} {}{}  x{}  {}  {}",
            record.platform.display_name(),
            record.title,
            year,
            record.view_count,
            local_time(record.last_activity()),
            stars(record),
        );
    }
}

pub fn print_counts(counts: &HistoryCounts) {
    let per_platform: Vec<String> = Platform::ALL
        .iter()
        .map(|p| format!("{} {}", p.display_name(), counts.per_platform.get(p).copied().unwrap_or(0)))
        .collect();
    println!(
        "{} titles, {} unrated, {} favorites | {}",
        counts.total,
        counts.unrated,
        counts.favorites,
        per_platform.join(", ")
    );
}

pub fn print_status(report: &StatusReport) {
    match &report.session {
        Some(session) => println!(
            "Signed in as {} since {}",
            session.user.email.as_deref().unwrap_or(session.user_id()),
            local_time(session.established_at),
        ),
        None => println!("Not signed in."),
    }
    print_counts(&report.counts);
    if !report.recent_events.is_empty() {
        println!();
        for (at, event) in &report.recent_events {
            println!("{}  {event}", local_time(*at));
        }
    }
}
