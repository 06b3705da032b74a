use anyhow::{Context, Result};
use uuid::Uuid;

use lexis_lib::study::{Card, CardInput, GetQueueInput, Grade, ReviewCardInput};

use super::describe_due;
use crate::app::App;
use crate::OutputFormat;

fn print_card_line(app: &App, card: &Card) {
    println!(
        "{}  {:<10} reps {:<3} {}",
        card.id,
        card.state(),
        card.schedule.reps,
        describe_due(&card.schedule, app.now())
    );
}

pub fn run_queue(app: &App, limit: Option<u32>, format: &OutputFormat) -> Result<()> {
    let input = GetQueueInput { limit };
    let queue = app
        .service
        .get_study_queue(&app.ctx, input)
        .context("Failed to build study queue")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&queue)?),
        OutputFormat::Plain => {
            if queue.is_empty() {
                println!("Nothing to study right now.");
                return Ok(());
            }
            for card in &queue {
                print_card_line(app, card);
            }
            println!("\n{} cards", queue.len());
        }
    }
    Ok(())
}

pub fn run_review(
    app: &App,
    card_id: Uuid,
    grade: &str,
    duration_ms: Option<u32>,
    format: &OutputFormat,
) -> Result<()> {
    let mut input = ReviewCardInput::parse(card_id, grade)?;
    if let Some(ms) = duration_ms {
        input = input.with_duration(ms);
    }
    let card = app
        .service
        .review_card(&app.ctx, input)
        .context("Failed to review card")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&card)?),
        OutputFormat::Plain => {
            println!("{}  {}, {}", card.id, card.state(), describe_due(&card.schedule, app.now()));
            if let Some(memory) = card.schedule.memory {
                println!(
                    "stability {:.2}d, difficulty {:.2}",
                    memory.stability, memory.difficulty
                );
            }
        }
    }
    Ok(())
}

pub fn run_preview(app: &App, card_id: Uuid, format: &OutputFormat) -> Result<()> {
    let preview = app
        .service
        .preview_review(&app.ctx, CardInput::new(card_id))
        .context("Failed to preview card")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&preview)?),
        OutputFormat::Plain => {
            for grade in [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy] {
                let schedule = preview.for_grade(grade);
                println!(
                    "{} {:<6} {:<10} {}",
                    grade.value(),
                    grade,
                    schedule.state,
                    describe_due(schedule, app.now())
                );
            }
        }
    }
    Ok(())
}

pub fn run_undo(app: &App, card_id: Uuid, format: &OutputFormat) -> Result<()> {
    let card = app
        .service
        .undo_review(&app.ctx, CardInput::new(card_id))
        .context("Failed to undo review")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&card)?),
        OutputFormat::Plain => {
            println!("Restored card {} to {}", card.id, card.state());
        }
    }
    Ok(())
}
