//! Dialogue engine
//!
//! The conversational core: one inbound text or image event plus the
//! sender's current session produce a new session state and an ordered list
//! of replies. Collaborator failures are absorbed before they reach the
//! state machine (empty extraction, download-failed reply), so event
//! handling itself never fails.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::extraction::ReceiptExtractor;
use crate::fields::{self, ReceiptField};
use crate::media::MediaFetcher;
use crate::menu;
use crate::session::{DialogueState, ReceiptSession, SessionStore};

pub struct DialogueEngine {
    store: Arc<dyn SessionStore>,
    extractor: Arc<dyn ReceiptExtractor>,
    media: Arc<dyn MediaFetcher>,
}

impl DialogueEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        extractor: Arc<dyn ReceiptExtractor>,
        media: Arc<dyn MediaFetcher>,
    ) -> Self {
        Self {
            store,
            extractor,
            media,
        }
    }

    /// Handle an inbound text message. Returns the ordered replies to send.
    pub async fn on_text(&self, from: &str, body: &str) -> Vec<String> {
        let mut session = self.store.get_or_create(from).await;
        let input = body.trim();

        let replies = match session.state.clone() {
            DialogueState::AwaitingImage => vec![menu::UPLOAD_PROMPT.to_string()],
            DialogueState::AwaitingConfirmation => self.handle_confirmation(&mut session, input),
            DialogueState::AwaitingEditField => self.handle_edit_menu(&mut session, input),
            DialogueState::AwaitingNewValue { field } => {
                self.handle_new_value(&mut session, field, input)
            }
            DialogueState::AwaitingMultiFieldSelection => {
                self.handle_multi_selection(&mut session, input)
            }
            DialogueState::AwaitingMultiFieldValues { queue } => {
                self.handle_multi_values(&mut session, &queue, input)
            }
        };

        self.store.put(from, session).await;
        replies
    }

    /// Handle an inbound image message. Runs in any state: a fresh receipt
    /// photo always restarts the capture flow.
    pub async fn on_image(&self, from: &str, media_id: &str) -> Vec<String> {
        let mut session = self.store.get_or_create(from).await;
        info!(from = %from, media_id = %media_id, "Receipt image received");

        let image = match self.media.fetch_image(media_id).await {
            Ok(image) => image,
            Err(err) => {
                warn!(from = %from, error = %err, "Media download failed");
                self.store.put(from, session).await;
                return vec![menu::DOWNLOAD_FAILED.to_string()];
            }
        };

        let mut record = self.extractor.extract(&image).await;
        // Temp file is removed here, before any reply goes out.
        drop(image);
        record.normalize();

        let replies = if record.is_blank() {
            session.reset();
            vec![menu::EXTRACTION_REJECTED.to_string()]
        } else {
            session.receipt = record;
            session.state = DialogueState::AwaitingConfirmation;
            vec![
                menu::render_summary(&session.receipt),
                menu::CONFIRM_PROMPT.to_string(),
            ]
        };

        self.store.put(from, session).await;
        replies
    }

    fn handle_confirmation(&self, session: &mut ReceiptSession, input: &str) -> Vec<String> {
        match input {
            "1" => {
                let age_secs = (Utc::now() - session.created_at).num_seconds();
                info!(
                    session_id = %session.id,
                    session_age_secs = age_secs,
                    receipt = ?session.receipt,
                    "Receipt submitted"
                );
                session.reset();
                vec![menu::SUBMITTED.to_string()]
            }
            "2" => {
                session.state = DialogueState::AwaitingEditField;
                vec![menu::render_edit_menu()]
            }
            _ => vec![menu::CONFIRM_RETRY.to_string()],
        }
    }

    fn handle_edit_menu(&self, session: &mut ReceiptSession, input: &str) -> Vec<String> {
        match input {
            "6" => {
                session.state = DialogueState::AwaitingConfirmation;
                vec![
                    menu::render_summary(&session.receipt),
                    menu::CONFIRM_PROMPT.to_string(),
                ]
            }
            "7" => {
                session.state = DialogueState::AwaitingMultiFieldSelection;
                vec![menu::render_multi_select_prompt()]
            }
            other => match ReceiptField::from_menu_digit(other) {
                Some(field) => {
                    session.state = DialogueState::AwaitingNewValue { field };
                    vec![menu::field_prompt(field).to_string()]
                }
                None => vec![menu::INVALID_OPTION.to_string()],
            },
        }
    }

    fn handle_new_value(
        &self,
        session: &mut ReceiptSession,
        field: ReceiptField,
        input: &str,
    ) -> Vec<String> {
        if let Err(message) = fields::validate(field, input) {
            return vec![message];
        }
        session.receipt.set(field, input);
        // Back to the menu so several single-field edits can chain.
        session.state = DialogueState::AwaitingEditField;
        vec![menu::render_value_updated(field), menu::render_edit_menu()]
    }

    fn handle_multi_selection(&self, session: &mut ReceiptSession, input: &str) -> Vec<String> {
        // Unrecognized tokens are dropped silently; duplicates are kept in
        // the order given.
        let queue: Vec<ReceiptField> = input
            .split(',')
            .filter_map(|token| ReceiptField::from_menu_digit(token.trim()))
            .collect();

        if queue.is_empty() {
            return vec![menu::INVALID_SELECTION.to_string()];
        }

        let prompt = menu::render_multi_values_prompt(&queue);
        session.state = DialogueState::AwaitingMultiFieldValues { queue };
        vec![prompt]
    }

    fn handle_multi_values(
        &self,
        session: &mut ReceiptSession,
        queue: &[ReceiptField],
        input: &str,
    ) -> Vec<String> {
        let values: Vec<&str> = input.split(',').map(str::trim).collect();
        if values.len() != queue.len() {
            return vec![menu::render_count_mismatch(queue.len())];
        }

        let mut errors = Vec::new();
        for (field, value) in queue.iter().copied().zip(values.iter().copied()) {
            if let Err(message) = fields::validate(field, value) {
                errors.push((field, message));
            }
        }
        // All-or-nothing: a single bad value rejects the whole batch so no
        // selected field is silently left unset.
        if !errors.is_empty() {
            return vec![menu::render_multi_errors(&errors, queue)];
        }

        for (field, value) in queue.iter().copied().zip(values.iter().copied()) {
            session.receipt.set(field, value);
        }
        session.state = DialogueState::AwaitingConfirmation;
        vec![
            menu::render_summary(&session.receipt),
            menu::CONFIRM_PROMPT.to_string(),
        ]
    }
}
