use anyhow::{Context, Result};
use uuid::Uuid;

use lexis_lib::study::{FinishSessionInput, StudySession};

use crate::app::App;
use crate::OutputFormat;

fn print_session(session: &StudySession, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(session)?),
        OutputFormat::Plain => {
            println!("Session {} ({})", session.id, session.status);
            println!("Started:  {}", session.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
            if let Some(finished) = session.finished_at {
                println!("Finished: {}", finished.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            println!("Reviewed: {}", session.total_reviewed);

            if let Some(result) = &session.result {
                let counts = &result.grade_counts;
                println!(
                    "New {} / due {} | again {} hard {} good {} easy {}",
                    result.new_reviewed,
                    result.due_reviewed,
                    counts.again,
                    counts.hard,
                    counts.good,
                    counts.easy
                );
                println!(
                    "Accuracy {:.1}%, {}s",
                    result.accuracy_rate,
                    result.duration_ms / 1000
                );
            }
        }
    }
    Ok(())
}

pub fn run_start(app: &App, format: &OutputFormat) -> Result<()> {
    let session = app
        .service
        .start_session(&app.ctx)
        .context("Failed to start session")?;
    print_session(&session, format)
}

pub fn run_finish(app: &App, id: Option<Uuid>, format: &OutputFormat) -> Result<()> {
    let session = match id {
        Some(session_id) => app
            .service
            .finish_session(&app.ctx, FinishSessionInput::new(session_id)),
        None => app.service.finish_active_session(&app.ctx),
    }
    .context("Failed to finish session")?;
    print_session(&session, format)
}

pub fn run_abandon(app: &App, format: &OutputFormat) -> Result<()> {
    let session = app
        .service
        .abandon_session(&app.ctx)
        .context("Failed to abandon session")?;
    print_session(&session, format)
}

pub fn run_show(app: &App, format: &OutputFormat) -> Result<()> {
    let session = app
        .service
        .get_active_session(&app.ctx)
        .context("Failed to load session")?;

    match session {
        Some(session) => print_session(&session, format),
        None => {
            match format {
                OutputFormat::Json => println!("null"),
                OutputFormat::Plain => println!("No active session."),
            }
            Ok(())
        }
    }
}
