// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation flow engine for opsdesk.
//!
//! Telegram delivers independent, stateless updates; this crate stitches them
//! into multi-turn flows (collect description, optionally collect photo,
//! create the ticket; press reply, collect text, append the update) while
//! checking permissions at every step.
//!
//! State lives in a map of per-`(user, kind)` mutex cells. A transition --
//! store calls included -- runs entirely inside its cell's critical section,
//! so two near-simultaneous events for the same user are applied in order and
//! the second observes the completed transition of the first. Events for
//! different users never contend.
//!
//! Store failures terminate the active flow: the error is logged here, the
//! cell is cleared, and the caller receives a visible failure outcome. A
//! stuck flow never survives a failed step.

pub mod event;
pub mod state;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use opsdesk_core::{AuthPolicy, Principal, StoreError, TicketStore};

pub use event::{Event, FailedOp, Outcome, TicketView};
pub use state::{FlowKind, FlowState};

type FlowCell = Arc<Mutex<Option<FlowState>>>;

/// The per-user flow state machine.
///
/// Shared process-wide behind an `Arc`; all methods take `&self`.
pub struct FlowEngine {
    store: Arc<dyn TicketStore + Send + Sync>,
    policy: AuthPolicy,
    flows: DashMap<(i64, FlowKind), FlowCell>,
}

impl FlowEngine {
    pub fn new(store: Arc<dyn TicketStore + Send + Sync>, policy: AuthPolicy) -> Self {
        Self {
            store,
            policy,
            flows: DashMap::new(),
        }
    }

    /// Consumes one inbound event and returns what to render.
    ///
    /// Infallible by design: store errors are handled (logged, flow
    /// terminated) before they reach the caller.
    pub async fn handle_event(&self, principal: &Principal, event: Event) -> Outcome {
        match event {
            Event::NewTicket => self.start_creation(principal).await,
            Event::Skip => self.create_without_photo(principal).await,
            Event::Cancel => self.cancel_creation(principal).await,
            Event::ListTickets => self.list_tickets(principal).await,
            Event::ViewTicket(id) => self.view_ticket(principal, id).await,
            Event::ResolveTicket(id) => self.resolve_ticket(principal, id).await,
            Event::ReplyToTicket(id) => self.start_update(principal, id).await,
            Event::Text(text) => self.handle_text(principal, &text).await,
            Event::Photo { file_id } => self.create_with_photo(principal, &file_id).await,
        }
    }

    /// Fetches (creating if absent) the state cell for one user and kind.
    fn cell(&self, user_id: i64, kind: FlowKind) -> FlowCell {
        let entry = self.flows.entry((user_id, kind)).or_default();
        Arc::clone(entry.value())
    }

    async fn start_creation(&self, principal: &Principal) -> Outcome {
        if !self.policy.is_collector(principal.id) {
            debug!(user_id = principal.id, "ticket creation denied: not the collector");
            return Outcome::NotAuthorized;
        }

        let cell = self.cell(principal.id, FlowKind::Creation);
        let mut state = cell.lock().await;
        if state.is_some() {
            debug!(user_id = principal.id, "creation flow restarted, pending payload discarded");
        }
        *state = Some(FlowState::AwaitingDescription);
        Outcome::PromptDescription
    }

    async fn create_without_photo(&self, principal: &Principal) -> Outcome {
        let cell = self.cell(principal.id, FlowKind::Creation);
        let mut state = cell.lock().await;
        match state.take() {
            Some(FlowState::AwaitingPhotoOrSkip { description }) => {
                self.finish_creation(principal, &description, None).await
            }
            other => {
                // /skip means nothing outside the photo step.
                *state = other;
                Outcome::Ignored
            }
        }
    }

    async fn create_with_photo(&self, principal: &Principal, file_id: &str) -> Outcome {
        let cell = self.cell(principal.id, FlowKind::Creation);
        let mut state = cell.lock().await;
        match state.take() {
            Some(FlowState::AwaitingPhotoOrSkip { description }) => {
                self.finish_creation(principal, &description, Some(file_id)).await
            }
            other => {
                *state = other;
                Outcome::Ignored
            }
        }
    }

    /// Terminal step of the creation flow. The caller has already taken the
    /// state, so the flow is over whichever way the insert goes.
    async fn finish_creation(
        &self,
        principal: &Principal,
        description: &str,
        photo_file_id: Option<&str>,
    ) -> Outcome {
        match self.store.create_ticket(description, photo_file_id).await {
            Ok(ticket_id) => {
                debug!(
                    user_id = principal.id,
                    ticket_id,
                    with_photo = photo_file_id.is_some(),
                    "ticket created"
                );
                Outcome::TicketCreated {
                    ticket_id,
                    with_photo: photo_file_id.is_some(),
                }
            }
            Err(e) => {
                error!(user_id = principal.id, error = %e, "failed to create ticket");
                Outcome::Failed(FailedOp::CreateTicket)
            }
        }
    }

    async fn cancel_creation(&self, principal: &Principal) -> Outcome {
        let cell = self.cell(principal.id, FlowKind::Creation);
        let mut state = cell.lock().await;
        if state.take().is_some() {
            debug!(user_id = principal.id, "creation flow cancelled");
            Outcome::CreationCancelled
        } else {
            Outcome::Ignored
        }
    }

    async fn list_tickets(&self, principal: &Principal) -> Outcome {
        if !self.policy.is_authorized(principal) {
            return Outcome::Ignored;
        }

        match self.store.list_open_tickets().await {
            Ok(tickets) => Outcome::OpenTickets(tickets),
            Err(e) => {
                error!(user_id = principal.id, error = %e, "failed to list open tickets");
                Outcome::Failed(FailedOp::LoadTickets)
            }
        }
    }

    async fn view_ticket(&self, principal: &Principal, ticket_id: i64) -> Outcome {
        if !self.policy.is_authorized(principal) {
            return Outcome::NotAuthorized;
        }

        let ticket = match self.store.get_ticket(ticket_id).await {
            Ok(Some(ticket)) => ticket,
            Ok(None) => return Outcome::TicketMissing,
            Err(e) => {
                error!(user_id = principal.id, ticket_id, error = %e, "failed to load ticket");
                return Outcome::Failed(FailedOp::LoadTicket);
            }
        };

        let updates = match self.store.list_updates(ticket_id).await {
            Ok(updates) => updates,
            Err(e) => {
                error!(user_id = principal.id, ticket_id, error = %e, "failed to load ticket updates");
                return Outcome::Failed(FailedOp::LoadTicket);
            }
        };

        Outcome::Detail(TicketView {
            ticket,
            updates,
            can_reply: self.policy.is_authorized(principal),
            can_resolve: self.policy.is_collector(principal.id),
        })
    }

    async fn resolve_ticket(&self, principal: &Principal, ticket_id: i64) -> Outcome {
        // Checked here regardless of what controls were rendered.
        if !self.policy.is_collector(principal.id) {
            warn!(user_id = principal.id, ticket_id, "resolve denied: not the collector");
            return Outcome::NotAuthorized;
        }

        match self.store.resolve_ticket(ticket_id).await {
            Ok(true) => Outcome::Resolved { ticket_id },
            Ok(false) => Outcome::ResolveFailed { ticket_id },
            Err(e) => {
                error!(user_id = principal.id, ticket_id, error = %e, "failed to resolve ticket");
                Outcome::Failed(FailedOp::Resolve)
            }
        }
    }

    async fn start_update(&self, principal: &Principal, ticket_id: i64) -> Outcome {
        if !self.policy.is_authorized(principal) {
            return Outcome::NotAuthorized;
        }

        let cell = self.cell(principal.id, FlowKind::Update);
        let mut state = cell.lock().await;
        // Last entry wins: a fresh reply press retargets the flow.
        *state = Some(FlowState::AwaitingUpdateText {
            ticket_id: Some(ticket_id),
        });
        Outcome::PromptUpdateText
    }

    /// Routes a free-text message to whichever flow is waiting on it. The
    /// creation flow is consulted first, matching the original handler order.
    async fn handle_text(&self, principal: &Principal, text: &str) -> Outcome {
        let creation = self.cell(principal.id, FlowKind::Creation);
        {
            let mut state = creation.lock().await;
            match state.take() {
                Some(FlowState::AwaitingDescription) => {
                    if text.trim().is_empty() {
                        *state = Some(FlowState::AwaitingDescription);
                        return Outcome::PromptDescription;
                    }
                    *state = Some(FlowState::AwaitingPhotoOrSkip {
                        description: text.to_string(),
                    });
                    return Outcome::PromptPhotoOrSkip;
                }
                Some(waiting @ FlowState::AwaitingPhotoOrSkip { .. }) => {
                    // Text is neither a photo nor /skip; keep waiting.
                    *state = Some(waiting);
                    return Outcome::Ignored;
                }
                other => *state = other,
            }
        }

        let update = self.cell(principal.id, FlowKind::Update);
        let mut state = update.lock().await;
        match state.take() {
            Some(FlowState::AwaitingUpdateText {
                ticket_id: Some(ticket_id),
            }) => {
                if text.trim().is_empty() {
                    *state = Some(FlowState::AwaitingUpdateText {
                        ticket_id: Some(ticket_id),
                    });
                    return Outcome::PromptUpdateText;
                }
                match self
                    .store
                    .append_update(ticket_id, principal.display_handle(), text)
                    .await
                {
                    Ok(()) => Outcome::UpdateSaved,
                    Err(StoreError::TicketNotFound(_)) => {
                        warn!(user_id = principal.id, ticket_id, "update targeted a missing ticket");
                        Outcome::TicketMissing
                    }
                    Err(e) => {
                        error!(user_id = principal.id, ticket_id, error = %e, "failed to append update");
                        Outcome::Failed(FailedOp::SaveUpdate)
                    }
                }
            }
            Some(FlowState::AwaitingUpdateText { ticket_id: None }) => {
                warn!(user_id = principal.id, "update flow resumed without a ticket id");
                Outcome::SessionExpired
            }
            other => {
                *state = other;
                Outcome::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdesk_config::model::StorageConfig;
    use opsdesk_core::TicketStatus;
    use opsdesk_storage::SqliteTicketStore;
    use tempfile::tempdir;

    const COLLECTOR: i64 = 777;

    fn collector() -> Principal {
        Principal {
            id: COLLECTOR,
            username: Some("carol".into()),
            first_name: "Carol".into(),
        }
    }

    fn member() -> Principal {
        Principal {
            id: 100,
            username: Some("alice".into()),
            first_name: "Alice".into(),
        }
    }

    fn nameless_member() -> Principal {
        Principal {
            id: 101,
            username: None,
            first_name: "Bob".into(),
        }
    }

    fn stranger() -> Principal {
        Principal {
            id: 666,
            username: Some("mallory".into()),
            first_name: "Mallory".into(),
        }
    }

    async fn engine() -> (Arc<SqliteTicketStore>, FlowEngine, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            database_path: dir.path().join("flow.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let store = Arc::new(SqliteTicketStore::open(&config).await.unwrap());
        let policy = AuthPolicy::new(
            &["100".into(), "101".into()],
            &["alice".into()],
            COLLECTOR,
        );
        let engine = FlowEngine::new(store.clone(), policy);
        (store, engine, dir)
    }

    #[tokio::test]
    async fn creation_flow_with_skip() {
        let (store, engine, _dir) = engine().await;
        let p = collector();

        assert_eq!(
            engine.handle_event(&p, Event::NewTicket).await,
            Outcome::PromptDescription
        );
        assert_eq!(
            engine.handle_event(&p, Event::Text("Printer jammed".into())).await,
            Outcome::PromptPhotoOrSkip
        );
        let outcome = engine.handle_event(&p, Event::Skip).await;
        let Outcome::TicketCreated { ticket_id, with_photo } = outcome else {
            panic!("expected TicketCreated, got {outcome:?}");
        };
        assert!(!with_photo);

        let ticket = store.get_ticket(ticket_id).await.unwrap().unwrap();
        assert_eq!(ticket.description, "Printer jammed");
        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(ticket.photo_file_id.is_none());
        assert!(store.list_updates(ticket_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn creation_flow_with_photo_round_trips_into_detail() {
        let (_store, engine, _dir) = engine().await;
        let p = collector();

        engine.handle_event(&p, Event::NewTicket).await;
        engine.handle_event(&p, Event::Text("Leaking pipe".into())).await;
        let outcome = engine
            .handle_event(&p, Event::Photo { file_id: "file123".into() })
            .await;
        let Outcome::TicketCreated { ticket_id, with_photo } = outcome else {
            panic!("expected TicketCreated, got {outcome:?}");
        };
        assert!(with_photo);

        // The detail view must carry the photo reference so the channel
        // renders it as an attachment-bearing message.
        let outcome = engine.handle_event(&member(), Event::ViewTicket(ticket_id)).await;
        let Outcome::Detail(view) = outcome else {
            panic!("expected Detail, got {outcome:?}");
        };
        assert_eq!(view.ticket.photo_file_id.as_deref(), Some("file123"));
    }

    #[tokio::test]
    async fn non_collector_cannot_start_creation() {
        let (store, engine, _dir) = engine().await;
        let p = member();

        assert_eq!(
            engine.handle_event(&p, Event::NewTicket).await,
            Outcome::NotAuthorized
        );
        // No state was left behind: the follow-up text goes nowhere.
        assert_eq!(
            engine.handle_event(&p, Event::Text("sneaky".into())).await,
            Outcome::Ignored
        );
        assert!(store.list_open_tickets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restarting_creation_discards_pending_description() {
        let (store, engine, _dir) = engine().await;
        let p = collector();

        engine.handle_event(&p, Event::NewTicket).await;
        engine.handle_event(&p, Event::Text("first draft".into())).await;

        // Second /newticket resets the flow.
        assert_eq!(
            engine.handle_event(&p, Event::NewTicket).await,
            Outcome::PromptDescription
        );
        engine.handle_event(&p, Event::Text("second draft".into())).await;
        let Outcome::TicketCreated { ticket_id, .. } =
            engine.handle_event(&p, Event::Skip).await
        else {
            panic!("expected TicketCreated");
        };

        let ticket = store.get_ticket(ticket_id).await.unwrap().unwrap();
        assert_eq!(ticket.description, "second draft");
        assert_eq!(store.list_open_tickets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancel_aborts_from_either_state() {
        let (store, engine, _dir) = engine().await;
        let p = collector();

        engine.handle_event(&p, Event::NewTicket).await;
        assert_eq!(
            engine.handle_event(&p, Event::Cancel).await,
            Outcome::CreationCancelled
        );

        engine.handle_event(&p, Event::NewTicket).await;
        engine.handle_event(&p, Event::Text("half done".into())).await;
        assert_eq!(
            engine.handle_event(&p, Event::Cancel).await,
            Outcome::CreationCancelled
        );

        // Payload is gone; /skip has nothing to finish.
        assert_eq!(engine.handle_event(&p, Event::Skip).await, Outcome::Ignored);
        assert!(store.list_open_tickets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_without_a_flow_is_silent() {
        let (_store, engine, _dir) = engine().await;
        assert_eq!(
            engine.handle_event(&collector(), Event::Cancel).await,
            Outcome::Ignored
        );
    }

    #[tokio::test]
    async fn unexpected_events_do_not_derail_creation() {
        let (store, engine, _dir) = engine().await;
        let p = collector();

        engine.handle_event(&p, Event::NewTicket).await;
        // A photo before the description is ignored, state preserved.
        assert_eq!(
            engine
                .handle_event(&p, Event::Photo { file_id: "early".into() })
                .await,
            Outcome::Ignored
        );
        engine.handle_event(&p, Event::Text("desc".into())).await;
        // Free text during the photo step is ignored, state preserved.
        assert_eq!(
            engine.handle_event(&p, Event::Text("not a photo".into())).await,
            Outcome::Ignored
        );
        let Outcome::TicketCreated { ticket_id, .. } =
            engine.handle_event(&p, Event::Skip).await
        else {
            panic!("expected TicketCreated");
        };
        assert_eq!(
            store.get_ticket(ticket_id).await.unwrap().unwrap().description,
            "desc"
        );
    }

    #[tokio::test]
    async fn blank_description_reprompts_and_stays() {
        let (_store, engine, _dir) = engine().await;
        let p = collector();

        engine.handle_event(&p, Event::NewTicket).await;
        assert_eq!(
            engine.handle_event(&p, Event::Text("   ".into())).await,
            Outcome::PromptDescription
        );
        // Still in the flow: a real description advances it.
        assert_eq!(
            engine.handle_event(&p, Event::Text("real one".into())).await,
            Outcome::PromptPhotoOrSkip
        );
    }

    #[tokio::test]
    async fn update_flow_appends_with_username_author() {
        let (store, engine, _dir) = engine().await;
        let ticket_id = store.create_ticket("Door squeaks", None).await.unwrap();

        let p = member();
        assert_eq!(
            engine.handle_event(&p, Event::ReplyToTicket(ticket_id)).await,
            Outcome::PromptUpdateText
        );
        assert_eq!(
            engine.handle_event(&p, Event::Text("oiled the hinge".into())).await,
            Outcome::UpdateSaved
        );

        let updates = store.list_updates(ticket_id).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].author, "alice");
        assert_eq!(updates[0].text, "oiled the hinge");
    }

    #[tokio::test]
    async fn update_author_falls_back_to_first_name() {
        let (store, engine, _dir) = engine().await;
        let ticket_id = store.create_ticket("No hot water", None).await.unwrap();

        let p = nameless_member();
        engine.handle_event(&p, Event::ReplyToTicket(ticket_id)).await;
        engine.handle_event(&p, Event::Text("boiler reset".into())).await;

        let updates = store.list_updates(ticket_id).await.unwrap();
        assert_eq!(updates[0].author, "Bob");
    }

    #[tokio::test]
    async fn update_flow_without_ticket_id_expires_without_writing() {
        let (store, engine, _dir) = engine().await;
        let ticket_id = store.create_ticket("Lost badge", None).await.unwrap();
        let p = member();

        // Simulate a flow that outlived its payload (restart mid-flow).
        let cell = engine.cell(p.id, FlowKind::Update);
        *cell.lock().await = Some(FlowState::AwaitingUpdateText { ticket_id: None });

        assert_eq!(
            engine.handle_event(&p, Event::Text("too late".into())).await,
            Outcome::SessionExpired
        );
        assert!(store.list_updates(ticket_id).await.unwrap().is_empty());
        // The flow ended: the next text is a stray message.
        assert_eq!(
            engine.handle_event(&p, Event::Text("hello?".into())).await,
            Outcome::Ignored
        );
    }

    #[tokio::test]
    async fn creation_text_takes_precedence_over_update_flow() {
        let (store, _engine, _dir) = engine().await;
        let ticket_id = store.create_ticket("existing", None).await.unwrap();

        // The collector is also allow-listed here so both flows can coexist.
        let policy = AuthPolicy::new(&[COLLECTOR.to_string()], &[], COLLECTOR);
        let engine = FlowEngine::new(store.clone() as Arc<dyn TicketStore + Send + Sync>, policy);
        let p = collector();

        engine.handle_event(&p, Event::ReplyToTicket(ticket_id)).await;
        engine.handle_event(&p, Event::NewTicket).await;

        // Text feeds the creation flow, not the pending update.
        assert_eq!(
            engine.handle_event(&p, Event::Text("new desc".into())).await,
            Outcome::PromptPhotoOrSkip
        );
        assert!(store.list_updates(ticket_id).await.unwrap().is_empty());

        // With creation finished, text resumes the update flow.
        engine.handle_event(&p, Event::Skip).await;
        assert_eq!(
            engine.handle_event(&p, Event::Text("the update".into())).await,
            Outcome::UpdateSaved
        );
        assert_eq!(store.list_updates(ticket_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listing_is_silent_for_strangers_and_works_for_members() {
        let (store, engine, _dir) = engine().await;
        store.create_ticket("visible", None).await.unwrap();

        assert_eq!(
            engine.handle_event(&stranger(), Event::ListTickets).await,
            Outcome::Ignored
        );

        let outcome = engine.handle_event(&member(), Event::ListTickets).await;
        let Outcome::OpenTickets(tickets) = outcome else {
            panic!("expected OpenTickets, got {outcome:?}");
        };
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].description, "visible");
    }

    #[tokio::test]
    async fn view_flags_controls_by_role() {
        let (store, engine, _dir) = engine().await;
        let ticket_id = store.create_ticket("inspect me", None).await.unwrap();

        let outcome = engine.handle_event(&member(), Event::ViewTicket(ticket_id)).await;
        let Outcome::Detail(view) = outcome else {
            panic!("expected Detail, got {outcome:?}");
        };
        assert!(view.can_reply);
        assert!(!view.can_resolve);

        assert_eq!(
            engine.handle_event(&stranger(), Event::ViewTicket(ticket_id)).await,
            Outcome::NotAuthorized
        );
        assert_eq!(
            engine.handle_event(&member(), Event::ViewTicket(9999)).await,
            Outcome::TicketMissing
        );
    }

    #[tokio::test]
    async fn resolve_is_collector_only_and_idempotent() {
        let (store, engine, _dir) = engine().await;
        let ticket_id = store.create_ticket("resolve me", None).await.unwrap();

        assert_eq!(
            engine.handle_event(&member(), Event::ResolveTicket(ticket_id)).await,
            Outcome::NotAuthorized
        );
        assert_eq!(
            engine.handle_event(&collector(), Event::ResolveTicket(ticket_id)).await,
            Outcome::Resolved { ticket_id }
        );
        assert_eq!(
            engine.handle_event(&collector(), Event::ResolveTicket(ticket_id)).await,
            Outcome::ResolveFailed { ticket_id }
        );
        assert_eq!(
            store.get_ticket(ticket_id).await.unwrap().unwrap().status,
            TicketStatus::Resolved
        );
    }

    #[tokio::test]
    async fn stray_messages_are_ignored() {
        let (_store, engine, _dir) = engine().await;
        let p = member();
        assert_eq!(
            engine.handle_event(&p, Event::Text("hello".into())).await,
            Outcome::Ignored
        );
        assert_eq!(
            engine
                .handle_event(&p, Event::Photo { file_id: "pic".into() })
                .await,
            Outcome::Ignored
        );
    }

    #[tokio::test]
    async fn same_key_events_serialize_through_the_cell() {
        let (store, engine, _dir) = engine().await;
        let engine = Arc::new(engine);
        let ticket_id = store.create_ticket("busy ticket", None).await.unwrap();
        let p = member();

        engine.handle_event(&p, Event::ReplyToTicket(ticket_id)).await;

        // Two racing texts for the same user: exactly one lands as the
        // update, the other observes the terminated flow.
        let e1 = engine.clone();
        let p1 = p.clone();
        let t1 = tokio::spawn(async move { e1.handle_event(&p1, Event::Text("first".into())).await });
        let e2 = engine.clone();
        let p2 = p.clone();
        let t2 = tokio::spawn(async move { e2.handle_event(&p2, Event::Text("second".into())).await });

        let (r1, r2) = (t1.await.unwrap(), t2.await.unwrap());
        let saved = [&r1, &r2]
            .iter()
            .filter(|o| ***o == Outcome::UpdateSaved)
            .count();
        let ignored = [&r1, &r2]
            .iter()
            .filter(|o| ***o == Outcome::Ignored)
            .count();
        assert_eq!((saved, ignored), (1, 1), "got {r1:?} and {r2:?}");
        assert_eq!(store.list_updates(ticket_id).await.unwrap().len(), 1);
    }
}
