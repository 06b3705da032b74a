use anyhow::{Context, Result};
use uuid::Uuid;

use lexis_lib::study::{CardHistoryInput, CardInput};

use super::describe_due;
use crate::app::App;
use crate::OutputFormat;

pub fn run_dashboard(app: &App, format: &OutputFormat) -> Result<()> {
    let dashboard = app
        .service
        .get_dashboard(&app.ctx)
        .context("Failed to load dashboard")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&dashboard)?),
        OutputFormat::Plain => {
            let counts = &dashboard.state_counts;
            println!("Due:       {} ({} overdue)", dashboard.due_count, dashboard.overdue_count);
            println!("New:       {}", dashboard.new_count);
            println!(
                "Today:     {} reviewed ({} new), goal {}",
                dashboard.reviewed_today, dashboard.new_today, dashboard.reviews_per_day_goal
            );
            println!("Streak:    {} days", dashboard.streak_days);
            println!(
                "Cards:     {} total, {} learning, {} review, {} relearning",
                counts.total(),
                counts.learning,
                counts.review,
                counts.relearning
            );
            if let Some(session) = dashboard.active_session {
                println!("Session:   {} (active)", session);
            }
        }
    }
    Ok(())
}

pub fn run_history(
    app: &App,
    card_id: Uuid,
    limit: u32,
    offset: u32,
    format: &OutputFormat,
) -> Result<()> {
    let input = CardHistoryInput {
        card_id,
        limit,
        offset,
    };
    let history = app
        .service
        .get_card_history(&app.ctx, input)
        .context("Failed to load card history")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&history)?),
        OutputFormat::Plain => {
            if history.logs.is_empty() {
                println!("No reviews.");
                return Ok(());
            }
            for log in &history.logs {
                let duration = log
                    .duration_ms
                    .map(|ms| format!("{:.1}s", f64::from(ms) / 1000.0))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<6} {:<10} -> {:>4}d  S {:.2}  D {:.2}  {}",
                    log.reviewed_at.format("%Y-%m-%d %H:%M"),
                    log.grade,
                    log.previous_state(),
                    log.scheduled_days,
                    log.stability_after,
                    log.difficulty_after,
                    duration
                );
            }
            println!("\n{} of {} reviews", history.logs.len(), history.total);
        }
    }
    Ok(())
}

pub fn run_stats(app: &App, card_id: Uuid, format: &OutputFormat) -> Result<()> {
    let stats = app
        .service
        .get_card_stats(&app.ctx, CardInput::new(card_id))
        .context("Failed to load card stats")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Plain => {
            let counts = &stats.grade_counts;
            println!("State:     {}, {}", stats.schedule.state, describe_due(&stats.schedule, app.now()));
            println!("Reviews:   {} ({} lapses)", stats.total_reviews, stats.schedule.lapses);
            println!(
                "Grades:    again {} hard {} good {} easy {}",
                counts.again, counts.hard, counts.good, counts.easy
            );
            println!("Accuracy:  {:.1}%", stats.accuracy_rate);
            if let Some(ms) = stats.average_duration_ms {
                println!("Avg time:  {:.1}s", f64::from(ms) / 1000.0);
            }
            if let (Some(s), Some(d)) = (stats.schedule.stability(), stats.schedule.difficulty()) {
                println!("Memory:    stability {:.2}d, difficulty {:.2}", s, d);
            }
        }
    }
    Ok(())
}
