use anyhow::{Context, Result};
use uuid::Uuid;

use lexis_lib::study::{BatchCreateCardsInput, CardInput, CreateCardInput};

use crate::app::App;
use crate::OutputFormat;

pub fn run_entry_add(app: &App, text: &str, senses: u32, format: &OutputFormat) -> Result<()> {
    let entry_id = app
        .store()
        .add_entry(app.user_id(), text, senses, app.now())
        .context("Failed to add entry")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": entry_id.to_string(),
                "text": text,
                "senseCount": senses,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Added entry '{}' ({} senses): {}", text, senses, entry_id);
        }
    }
    Ok(())
}

pub fn run_create(app: &App, entry_id: Uuid, format: &OutputFormat) -> Result<()> {
    let card = app
        .service
        .create_card(&app.ctx, CreateCardInput::new(entry_id))
        .context("Failed to create card")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&card)?),
        OutputFormat::Plain => println!("Created card {} for entry {}", card.id, card.entry_id),
    }
    Ok(())
}

pub fn run_batch(app: &App, entry_ids: Vec<Uuid>, format: &OutputFormat) -> Result<()> {
    let result = app
        .service
        .batch_create_cards(&app.ctx, BatchCreateCardsInput { entry_ids })
        .context("Failed to create cards")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Plain => {
            println!("Created:            {}", result.created.len());
            println!("Already had a card: {}", result.skipped_existing.len());
            println!("No senses:          {}", result.skipped_no_senses.len());
            if !result.errors.is_empty() {
                println!("Errors:");
                for error in &result.errors {
                    println!("  {}: {}", error.entry_id, error.reason);
                }
            }
        }
    }
    Ok(())
}

pub fn run_delete(app: &App, card_id: Uuid, format: &OutputFormat) -> Result<()> {
    app.service
        .delete_card(&app.ctx, CardInput::new(card_id))
        .context("Failed to delete card")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "deleted": card_id.to_string() });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => println!("Deleted card {}", card_id),
    }
    Ok(())
}
