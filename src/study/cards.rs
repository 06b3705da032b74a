//! Creating and deleting cards

use uuid::Uuid;

use super::context::RequestContext;
use super::error::{StudyError, StudyResult};
use super::input::{BatchCreateCardsInput, CardInput, CreateCardInput};
use super::models::{BatchCreateError, BatchCreateResult, Card};
use super::service::StudyService;
use super::store::{CardStore, EntryCatalog, StudyRepository, StudyStores};

/// What to do with one entry of a batch
enum EntryCheck {
    Create,
    Existing,
    NoSenses,
}

fn check_entry(stores: &dyn StudyStores, user_id: Uuid, entry_id: Uuid) -> StudyResult<EntryCheck> {
    match stores.entry_sense_count(user_id, entry_id)? {
        None => Err(StudyError::NotFound(format!("entry {}", entry_id))),
        Some(_) if stores.card_exists_for_entry(user_id, entry_id)? => Ok(EntryCheck::Existing),
        Some(0) => Ok(EntryCheck::NoSenses),
        Some(_) => Ok(EntryCheck::Create),
    }
}

impl<R: StudyRepository> StudyService<R> {
    /// Create a New card for one of the user's entries
    pub fn create_card(&self, ctx: &RequestContext, input: CreateCardInput) -> StudyResult<Card> {
        let user_id = self.begin(ctx)?;
        input.validate()?;
        let now = self.now();

        let card = self.repository().transaction(|stores| {
            match check_entry(stores, user_id, input.entry_id)? {
                EntryCheck::Existing => {
                    return Err(StudyError::AlreadyExists(format!("card for entry {}", input.entry_id)))
                }
                EntryCheck::NoSenses => {
                    return Err(StudyError::validation(
                        "entry_id",
                        "entry must have at least one sense to create a card",
                    ))
                }
                EntryCheck::Create => {}
            }
            let card = Card::new(user_id, input.entry_id, now);
            stores.create_card(&card)?;
            Ok(card)
        })?;

        log::info!("Created card {} for entry {}", card.id, card.entry_id);
        Ok(card)
    }

    /// Delete a card and its review history
    pub fn delete_card(&self, ctx: &RequestContext, input: CardInput) -> StudyResult<()> {
        let user_id = self.begin(ctx)?;
        input.validate()?;

        let deleted = self
            .repository()
            .transaction(|stores| stores.delete_card(user_id, input.card_id))?;
        if !deleted {
            return Err(StudyError::NotFound(format!("card {}", input.card_id)));
        }

        log::info!("Deleted card {}", input.card_id);
        Ok(())
    }

    /// Create cards for many entries, reporting each entry's outcome.
    ///
    /// Every entry is handled in its own transaction, so one failure does not
    /// affect the others.
    pub fn batch_create_cards(&self, ctx: &RequestContext, input: BatchCreateCardsInput) -> StudyResult<BatchCreateResult> {
        let user_id = self.begin(ctx)?;
        input.validate(self.config())?;
        let now = self.now();

        let mut result = BatchCreateResult::default();
        for &entry_id in &input.entry_ids {
            let outcome = self.repository().transaction(|stores| {
                let check = check_entry(stores, user_id, entry_id)?;
                if let EntryCheck::Create = check {
                    let card = Card::new(user_id, entry_id, now);
                    stores.create_card(&card)?;
                    return Ok((check, Some(card.id)));
                }
                Ok((check, None))
            });

            match outcome {
                Ok((EntryCheck::Create, Some(card_id))) => result.created.push(card_id),
                Ok((EntryCheck::Existing, _)) => result.skipped_existing.push(entry_id),
                Ok((EntryCheck::NoSenses, _)) => result.skipped_no_senses.push(entry_id),
                Ok((EntryCheck::Create, None)) => {}
                Err(StudyError::NotFound(_)) => result.errors.push(BatchCreateError {
                    entry_id,
                    reason: "entry not found".to_string(),
                }),
                // Lost a race with a concurrent create
                Err(StudyError::AlreadyExists(_)) => result.skipped_existing.push(entry_id),
                Err(e) => result.errors.push(BatchCreateError {
                    entry_id,
                    reason: e.to_string(),
                }),
            }
        }

        log::info!(
            "Batch created {} cards ({} existing, {} without senses, {} errors)",
            result.created.len(),
            result.skipped_existing.len(),
            result.skipped_no_senses.len(),
            result.errors.len()
        );
        Ok(result)
    }
}
