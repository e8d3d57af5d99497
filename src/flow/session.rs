//! One visitor's conversation.
//!
//! A `ConversationSession` owns the lead being built, the current node, the
//! scheduled transitions and the surface it renders to. Every user turn goes
//! through `choose` or `submit_free_text`; timed continuations are driven by
//! `pump`/`settle`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::config::BotConfig;
use crate::delivery::{DeliveryClient, DeliveryReceipt, WebhookPayload};
use crate::error::{DeliveryError, FlowError, StoreError};
use crate::extract::{extract_contact, extract_name};
use crate::lead::{LeadField, LeadRecord, SessionId, SessionStore};
use crate::surface::{ChatSurface, OptionBlockId, OptionView, Speaker};

use super::node::{DialogNode, ExtractorKind, NodeId, NodeKind};
use super::scheduler::{Transition, TransitionScheduler};
use super::script::{NodeTable, OTHER_INDUSTRY};
use super::template::{self, PromptContext};

const ENDED_NOTICE: &str =
    "La conversación ha terminado. Puede reiniciarla cuando guste para comenzar de nuevo.";
const CHOOSE_NOTICE: &str = "Por favor elija una de las opciones de arriba 👆";
const TYPE_NOTICE: &str = "Por favor escriba su respuesta en el cuadro de texto.";
const NAME_RETRY_NOTICE: &str =
    "Disculpe, no alcancé a leer su nombre. ¿Me lo podría escribir de nuevo?";
const CONTACT_RETRY_NOTICE: &str =
    "Necesito al menos su email o su teléfono para poder contactarle. ¿Me los comparte?";
const RESET_NOTICE: &str = "Conversación reiniciada.";

/// Shared, read-only collaborators of every session.
#[derive(Clone)]
pub struct SessionDeps {
    pub table: Arc<NodeTable>,
    pub config: Arc<BotConfig>,
    pub delivery: Arc<DeliveryClient>,
}

impl SessionDeps {
    pub fn new(table: NodeTable, config: BotConfig, delivery: DeliveryClient) -> Self {
        Self {
            table: Arc::new(table),
            config: Arc::new(config),
            delivery: Arc::new(delivery),
        }
    }

    /// The Helios script delivering to the configured webhook.
    pub fn helios(config: BotConfig) -> Result<Self, FlowError> {
        let table = NodeTable::helios()?;
        let delivery = DeliveryClient::from_config(&config);
        Ok(Self::new(table, config, delivery))
    }
}

/// Where the engine is within the current node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    /// Entered; prompt not shown yet (read pause or sequence narration).
    Revealing,
    AwaitingChoice,
    AwaitingText,
    /// A turn was accepted and the next node is about to be entered.
    Transitioning,
    Delivering,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Idle,
    Sending,
    Delivered,
    Failed,
}

/// A delivery that has been started and must be completed.
#[derive(Debug)]
pub struct PendingDelivery {
    session_id: SessionId,
    hash: String,
    payload: WebhookPayload,
}

impl PendingDelivery {
    pub fn payload(&self) -> &WebhookPayload {
        &self.payload
    }
}

#[derive(Debug)]
pub enum BeginDelivery {
    /// This exact payload was already delivered.
    Skip,
    Send(PendingDelivery),
}

#[derive(Debug)]
pub enum DeliveryReport {
    Delivered { attempts: u32 },
    /// Unchanged since the last successful delivery; no request was made.
    AlreadyDelivered,
    Failed { error: DeliveryError },
    /// The session was reset while the request was in flight.
    Discarded,
}

impl DeliveryReport {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. } | Self::AlreadyDelivered)
    }
}

/// Read-only view of a session for status endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub node: Option<NodeId>,
    pub phase: Phase,
    pub ended: bool,
    pub input_locked: bool,
    pub delivery: DeliveryState,
    pub options: Vec<OptionView>,
    pub lead: LeadRecord,
}

pub struct ConversationSession<S: ChatSurface> {
    deps: SessionDeps,
    surface: S,
    store: Option<Arc<dyn SessionStore>>,
    lead: LeadRecord,
    candidate_title: Option<String>,
    current: Option<NodeId>,
    phase: Phase,
    scheduler: TransitionScheduler,
    next_block: OptionBlockId,
    active_block: Option<OptionBlockId>,
    visible_options: Vec<OptionView>,
    delivery_state: DeliveryState,
}

impl<S: ChatSurface> ConversationSession<S> {
    pub fn new(deps: SessionDeps, surface: S, session_id: SessionId) -> Self {
        Self {
            deps,
            surface,
            store: None,
            lead: LeadRecord::new(session_id),
            candidate_title: None,
            current: None,
            phase: Phase::Idle,
            scheduler: TransitionScheduler::new(),
            next_block: 1,
            active_block: None,
            visible_options: Vec::new(),
            delivery_state: DeliveryState::Idle,
        }
    }

    /// Reuse the session id persisted in `store`, or mint one. Resets will
    /// persist their new id there too.
    pub fn resume_or_create(
        deps: SessionDeps,
        surface: S,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, StoreError> {
        let session_id = SessionId::load_or_create(store.as_ref())?;
        let mut session = Self::new(deps, surface, session_id);
        session.store = Some(store);
        Ok(session)
    }

    pub fn session_id(&self) -> &SessionId {
        self.lead.session_id()
    }

    pub fn lead(&self) -> &LeadRecord {
        &self.lead
    }

    pub fn current_node(&self) -> Option<NodeId> {
        self.current
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_ended(&self) -> bool {
        self.phase == Phase::Ended
    }

    pub fn is_input_locked(&self) -> bool {
        self.phase != Phase::AwaitingText
    }

    /// Buttons of the current menu, empty when none is clickable.
    pub fn visible_options(&self) -> &[OptionView] {
        if self.phase == Phase::AwaitingChoice {
            &self.visible_options
        } else {
            &[]
        }
    }

    pub fn candidate_title(&self) -> Option<&str> {
        self.candidate_title.as_deref()
    }

    pub fn delivery_state(&self) -> DeliveryState {
        self.delivery_state
    }

    pub fn pending_transitions(&self) -> usize {
        self.scheduler.pending_count()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id().to_string(),
            node: self.current,
            phase: self.phase,
            ended: self.is_ended(),
            input_locked: self.is_input_locked(),
            delivery: self.delivery_state,
            options: self.visible_options().to_vec(),
            lead: self.lead.clone(),
        }
    }

    /// Enter the start node.
    pub async fn start(&mut self) -> Result<(), FlowError> {
        let start = self.deps.table.start();
        tracing::info!(session_id = %self.session_id(), "Conversation started");
        self.enter(start).await
    }

    /// Make `id` the current node, cancelling anything still scheduled.
    pub async fn enter(&mut self, id: NodeId) -> Result<(), FlowError> {
        self.apply(Transition::Enter(id)).await
    }

    /// Handle a button click.
    pub async fn choose(&mut self, value: &str) -> Result<(), FlowError> {
        let node = self.current.unwrap_or_else(|| self.deps.table.start());
        match self.phase {
            Phase::Ended => return Err(self.reject(node, Some(ENDED_NOTICE), "conversation has ended")),
            Phase::AwaitingText => {
                return Err(self.reject(node, Some(TYPE_NOTICE), "node expects free text"));
            }
            Phase::AwaitingChoice => {}
            _ => return Err(self.reject(node, None, "no options are clickable yet")),
        }
        if !self.visible_options.iter().any(|o| o.value == value) {
            return Err(self.reject(node, Some(CHOOSE_NOTICE), "option is not on screen"));
        }

        let table = Arc::clone(&self.deps.table);
        let option = table.get(node)?.option(value).ok_or_else(|| FlowError::InvalidTurn {
            node,
            reason: format!("node has no option '{value}'"),
        })?;

        self.lead
            .record_response(option.value.clone(), Some(option.label.clone()));
        if let Some(field) = option.sets {
            self.lead.set(field, option.value.clone());
        }
        self.surface.show_message(Speaker::Visitor, &option.label);
        if let Some(block) = self.active_block {
            self.surface.disable_options(block);
        }
        self.phase = Phase::Transitioning;

        tracing::info!(
            session_id = %self.session_id(),
            node = %node,
            value,
            "Option chosen"
        );

        let delay = self.deps.config.choice_delay;
        match self.after(delay, Transition::Enter(option.next)) {
            Some(transition) => self.apply(transition).await,
            None => Ok(()),
        }
    }

    /// Handle a typed line.
    pub async fn submit_free_text(&mut self, raw: &str) -> Result<(), FlowError> {
        let node = self.current.unwrap_or_else(|| self.deps.table.start());
        match self.phase {
            Phase::Ended => return Err(self.reject(node, Some(ENDED_NOTICE), "conversation has ended")),
            Phase::AwaitingChoice => {
                return Err(self.reject(node, Some(CHOOSE_NOTICE), "options are visible"));
            }
            Phase::AwaitingText => {}
            _ => return Err(self.reject(node, None, "input is locked")),
        }
        let text = raw.trim();
        if text.is_empty() {
            return Err(self.reject(node, None, "empty message"));
        }

        let table = Arc::clone(&self.deps.table);
        let NodeKind::FreeText { extractor, next } = &table.get(node)?.kind else {
            return Err(self.reject(node, None, "node does not take free text"));
        };

        self.lead.record_response(text, None);
        self.surface.show_message(Speaker::Visitor, text);

        match extractor {
            ExtractorKind::Name => {
                let parts = extract_name(text);
                if !parts.has_name() {
                    self.surface.show_notice(NAME_RETRY_NOTICE);
                    return Ok(());
                }
                self.lead.set(LeadField::FullName, parts.full_name);
                self.lead.set(LeadField::GivenName, parts.given_name);
                self.lead.set(LeadField::Surname, parts.surname);
                self.candidate_title = parts.candidate_title;
            }
            ExtractorKind::Contact => {
                let info = extract_contact(text, &self.deps.config.country_code);
                if !info.is_reachable() {
                    self.surface.show_notice(CONTACT_RETRY_NOTICE);
                    return Ok(());
                }
                let found = [
                    (LeadField::Email, info.email),
                    (LeadField::Phone, info.phone),
                    (LeadField::PreferredDay, info.preferred_day),
                    (LeadField::PreferredTime, info.preferred_time),
                ];
                for (field, value) in found {
                    if let Some(value) = value {
                        self.lead.set(field, value);
                    }
                }
            }
            ExtractorKind::Verbatim(field) => self.lead.set(*field, text),
        }

        tracing::info!(session_id = %self.session_id(), node = %node, "Free text accepted");

        self.surface.set_input_locked(true);
        self.phase = Phase::Transitioning;
        let delay = self.deps.config.choice_delay;
        match self.after(delay, Transition::Enter(*next)) {
            Some(transition) => self.apply(transition).await,
            None => Ok(()),
        }
    }

    /// Start over with a fresh identity and an empty lead.
    pub async fn reset(&mut self) -> Result<(), FlowError> {
        self.scheduler.cancel_all();
        self.clear_active_block();

        let session_id = match &self.store {
            Some(store) => SessionId::regenerate(store.as_ref()).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Could not persist new session id");
                SessionId::generate()
            }),
            None => SessionId::generate(),
        };
        tracing::info!(
            old = %self.session_id(),
            new = %session_id,
            "Conversation reset"
        );

        self.lead = LeadRecord::new(session_id);
        self.candidate_title = None;
        self.current = None;
        self.phase = Phase::Idle;
        self.delivery_state = DeliveryState::Idle;
        self.surface.show_notice(RESET_NOTICE);

        let start = self.deps.table.start();
        self.enter(start).await
    }

    /// Apply the next scheduled transition. Returns `false` once nothing is
    /// pending.
    pub async fn pump(&mut self) -> Result<bool, FlowError> {
        match self.scheduler.next_fired().await {
            Some(transition) => {
                self.apply(transition).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run scheduled transitions until the session waits on the visitor.
    pub async fn settle(&mut self) -> Result<(), FlowError> {
        while self.pump().await? {}
        Ok(())
    }

    /// Snapshot the lead and mark a delivery as in flight.
    pub fn begin_delivery(&mut self) -> Result<BeginDelivery, DeliveryError> {
        if self.delivery_state == DeliveryState::Sending {
            return Err(DeliveryError::InFlight {
                session_id: self.session_id().to_string(),
            });
        }

        let payload = WebhookPayload::build(&self.lead, &self.deps.config);
        let hash = payload.content_hash()?;
        if self.lead.already_delivered(&hash) {
            tracing::info!(session_id = %self.session_id(), "Lead unchanged since last delivery; skipping");
            self.delivery_state = DeliveryState::Delivered;
            return Ok(BeginDelivery::Skip);
        }

        self.delivery_state = DeliveryState::Sending;
        Ok(BeginDelivery::Send(PendingDelivery {
            session_id: self.session_id().clone(),
            hash,
            payload,
        }))
    }

    /// Record the outcome of a delivery started with `begin_delivery`.
    pub fn complete_delivery(
        &mut self,
        pending: PendingDelivery,
        result: Result<DeliveryReceipt, DeliveryError>,
    ) -> DeliveryReport {
        if pending.session_id != *self.session_id() {
            tracing::info!(
                session_id = %pending.session_id,
                "Session was reset during delivery; discarding result"
            );
            return DeliveryReport::Discarded;
        }

        match result {
            Ok(receipt) => {
                self.lead.mark_sent(pending.hash, Utc::now());
                self.delivery_state = DeliveryState::Delivered;
                DeliveryReport::Delivered {
                    attempts: receipt.attempts,
                }
            }
            Err(error) => {
                self.delivery_state = DeliveryState::Failed;
                DeliveryReport::Failed { error }
            }
        }
    }

    /// Deliver the current lead, skipping the request if it is unchanged.
    pub async fn deliver(&mut self) -> Result<DeliveryReport, DeliveryError> {
        let pending = match self.begin_delivery()? {
            BeginDelivery::Skip => return Ok(DeliveryReport::AlreadyDelivered),
            BeginDelivery::Send(pending) => pending,
        };
        let client = Arc::clone(&self.deps.delivery);
        let result = client.send(&pending.payload).await;
        Ok(self.complete_delivery(pending, result))
    }

    /// Run a transition and everything it triggers without a delay. A failing
    /// step falls back to the main menu; a failing main menu is returned.
    async fn apply(&mut self, first: Transition) -> Result<(), FlowError> {
        let main_menu = self.deps.table.main_menu();
        let mut next = Some(first);
        while let Some(transition) = next.take() {
            next = match self.step(transition).await {
                Ok(follow_up) => follow_up,
                Err(e) if transition.node() != main_menu => {
                    tracing::error!(
                        session_id = %self.session_id(),
                        ?transition,
                        error = %e,
                        "Dialog step failed, returning to main menu"
                    );
                    Some(Transition::Enter(main_menu))
                }
                Err(e) => return Err(e),
            };
        }
        Ok(())
    }

    async fn step(&mut self, transition: Transition) -> Result<Option<Transition>, FlowError> {
        let table = Arc::clone(&self.deps.table);
        match transition {
            Transition::Enter(id) => {
                table.get(id)?;
                self.scheduler.cancel_all();
                self.clear_active_block();
                self.surface.set_input_locked(true);
                self.current = Some(id);
                self.phase = Phase::Revealing;
                tracing::debug!(session_id = %self.session_id(), node = %id, "Entering node");

                let delay = self.deps.config.read_pause;
                Ok(self.after(delay, Transition::Reveal(id)))
            }
            Transition::Reveal(id) => {
                if self.current != Some(id) {
                    return Ok(None);
                }
                let node = table.get(id)?;
                self.show_prompt(node)?;
                self.reveal(node).await
            }
            Transition::Narrate(id) => {
                let node = table.get(id)?;
                self.show_prompt(node)?;
                Ok(None)
            }
        }
    }

    /// Everything after the prompt: options, input, narration, delivery.
    async fn reveal(&mut self, node: &DialogNode) -> Result<Option<Transition>, FlowError> {
        match &node.kind {
            NodeKind::Menu { options } => {
                let mut views: Vec<OptionView> = options
                    .iter()
                    .map(|o| OptionView {
                        label: o.label.clone(),
                        value: o.value.clone(),
                    })
                    .collect();
                // Offer the honorific the visitor already used first.
                let picks_title = options.iter().any(|o| o.sets == Some(LeadField::Title));
                if let (true, Some(candidate)) = (picks_title, &self.candidate_title) {
                    if let Some(pos) = views.iter().position(|v| &v.value == candidate) {
                        let preferred = views.remove(pos);
                        views.insert(0, preferred);
                    }
                }

                let block = self.next_block;
                self.next_block += 1;
                self.surface.show_options(block, &views);
                self.active_block = Some(block);
                self.visible_options = views;
                self.phase = Phase::AwaitingChoice;
                Ok(None)
            }
            NodeKind::FreeText { .. } => {
                self.surface.set_input_locked(false);
                self.phase = Phase::AwaitingText;
                Ok(None)
            }
            NodeKind::Sequence { steps, then } => {
                let pause = self.deps.config.read_pause;
                if pause.is_zero() {
                    let table = Arc::clone(&self.deps.table);
                    for step in steps {
                        self.show_prompt(table.get(*step)?)?;
                    }
                    return Ok(Some(Transition::Enter(*then)));
                }
                for (i, step) in steps.iter().enumerate() {
                    self.scheduler
                        .schedule(Transition::Narrate(*step), pause * (i as u32 + 1));
                }
                self.scheduler
                    .schedule(Transition::Enter(*then), pause * (steps.len() as u32 + 1));
                Ok(None)
            }
            NodeKind::Deliver {
                on_success,
                on_failure,
            } => {
                let (on_success, on_failure) = (*on_success, *on_failure);
                self.phase = Phase::Delivering;
                match self.deliver().await {
                    Ok(report) if report.is_success() => Ok(Some(Transition::Enter(on_success))),
                    Ok(DeliveryReport::Discarded) => Ok(None),
                    Ok(_) => Ok(Some(Transition::Enter(on_failure))),
                    Err(e) => {
                        tracing::warn!(session_id = %self.session_id(), error = %e, "Could not start delivery");
                        Ok(Some(Transition::Enter(on_failure)))
                    }
                }
            }
            NodeKind::End => {
                self.phase = Phase::Ended;
                tracing::info!(
                    session_id = %self.session_id(),
                    responses = self.lead.responses().len(),
                    "Conversation ended"
                );
                Ok(None)
            }
        }
    }

    fn show_prompt(&mut self, node: &DialogNode) -> Result<(), FlowError> {
        let industry_pitch = if template::needs_pitch(&node.prompt) {
            let industry = match self.lead.industry.as_str() {
                "" => OTHER_INDUSTRY,
                key => key,
            };
            Some(self.deps.table.pitch_for(industry)?)
        } else {
            None
        };
        let ctx = PromptContext {
            lead: &self.lead,
            industry_pitch,
            fallback_phone: &self.deps.config.fallback_phone,
        };
        let text = template::render(&node.prompt, &ctx);
        if !text.is_empty() {
            self.surface.show_message(Speaker::Bot, &text);
        }
        Ok(())
    }

    /// Follow up immediately when `delay` is zero, otherwise schedule.
    fn after(&mut self, delay: Duration, transition: Transition) -> Option<Transition> {
        if delay.is_zero() {
            Some(transition)
        } else {
            self.scheduler.schedule(transition, delay);
            None
        }
    }

    fn clear_active_block(&mut self) {
        if let Some(block) = self.active_block.take() {
            self.surface.clear_options(block);
        }
        self.visible_options.clear();
    }

    fn reject(&mut self, node: NodeId, notice: Option<&str>, reason: &str) -> FlowError {
        if let Some(notice) = notice {
            self.surface.show_notice(notice);
        }
        tracing::debug!(session_id = %self.session_id(), node = %node, reason, "Turn rejected");
        FlowError::InvalidTurn {
            node,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::delivery::Transport;
    use crate::lead::MemoryStore;
    use crate::surface::Transcript;

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn post(&self, _payload: &WebhookPayload) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn deps(config: BotConfig) -> (SessionDeps, Arc<CountingTransport>) {
        let transport = Arc::new(CountingTransport::default());
        let delivery = DeliveryClient::with_transport(&config, transport.clone());
        let deps = SessionDeps::new(NodeTable::helios().unwrap(), config, delivery);
        (deps, transport)
    }

    fn session(config: BotConfig) -> (ConversationSession<Transcript>, Arc<CountingTransport>) {
        let (deps, transport) = deps(config);
        let session =
            ConversationSession::new(deps, Transcript::new(), SessionId::from_raw("sess_1_test"));
        (session, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_waits_for_read_pause() {
        let (mut s, _) = session(BotConfig::default());
        s.start().await.unwrap();

        assert_eq!(s.current_node(), Some(NodeId::Greeting));
        assert_eq!(s.phase(), Phase::Revealing);
        assert!(s.surface().last_bot_message().is_none());
        assert_eq!(s.pending_transitions(), 1);

        s.settle().await.unwrap();
        assert_eq!(s.phase(), Phase::AwaitingText);
        assert!(!s.is_input_locked());
        assert!(s.surface().last_bot_message().unwrap().contains("Helios"));
    }

    #[tokio::test(start_paused = true)]
    async fn reentering_before_reveal_shows_one_menu() {
        let (mut s, _) = session(BotConfig::default());
        s.enter(NodeId::MainMenu).await.unwrap();
        s.enter(NodeId::MainMenu).await.unwrap();
        assert_eq!(s.pending_transitions(), 1);

        s.settle().await.unwrap();
        let blocks = s
            .surface()
            .events()
            .iter()
            .filter(|e| matches!(e, crate::surface::TranscriptEvent::Options { .. }))
            .count();
        assert_eq!(blocks, 1);
        assert_eq!(s.surface().visible_option_blocks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_narrates_steps_then_enters_contact_capture() {
        let (mut s, _) = session(BotConfig::default());
        s.enter(NodeId::MainMenu).await.unwrap();
        s.settle().await.unwrap();

        s.choose("E").await.unwrap();
        s.settle().await.unwrap();

        assert_eq!(s.current_node(), Some(NodeId::ContactCapture));
        assert_eq!(s.phase(), Phase::AwaitingText);
        let bot: Vec<&str> = s
            .surface()
            .messages()
            .into_iter()
            .filter(|(speaker, _)| *speaker == Speaker::Bot)
            .map(|(_, text)| text)
            .collect();
        // menu, sequence intro, four narrated steps, contact capture
        assert_eq!(bot.len(), 7);
        assert!(bot[2].starts_with("Nuestros asistentes"));
        assert!(bot[5].contains("3 meses"));
        // Narrated steps never render their own buttons.
        assert_eq!(s.surface().visible_option_blocks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_scheduled_narration() {
        let (mut s, _) = session(BotConfig::default());
        s.enter(NodeId::Everything).await.unwrap();
        s.pump().await.unwrap(); // reveal: schedules the narration
        assert_eq!(s.pending_transitions(), 5);

        let before = s.session_id().clone();
        s.reset().await.unwrap();
        assert_ne!(*s.session_id(), before);
        assert_eq!(s.pending_transitions(), 1);

        s.settle().await.unwrap();
        assert_eq!(s.current_node(), Some(NodeId::Greeting));
        assert!(s.surface().last_bot_message().unwrap().contains("¿Con quién"));
    }

    #[tokio::test]
    async fn choosing_while_typing_is_rejected() {
        let (mut s, _) = session(BotConfig::instant());
        s.start().await.unwrap();
        let err = s.choose("A").await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidTurn { node: NodeId::Greeting, .. }));
        assert!(s.lead().responses().is_empty());
        assert_eq!(s.surface().notices(), vec![TYPE_NOTICE]);
    }

    #[tokio::test]
    async fn unparseable_name_reprompts_but_is_logged() {
        let (mut s, _) = session(BotConfig::instant());
        s.start().await.unwrap();
        s.submit_free_text("🙂🙂").await.unwrap();

        assert_eq!(s.current_node(), Some(NodeId::Greeting));
        assert_eq!(s.phase(), Phase::AwaitingText);
        assert_eq!(s.lead().responses().len(), 1);
        assert_eq!(s.surface().notices(), vec![NAME_RETRY_NOTICE]);
    }

    #[tokio::test]
    async fn candidate_title_is_offered_first() {
        let (mut s, _) = session(BotConfig::instant());
        s.start().await.unwrap();
        s.submit_free_text("Hola, soy la Dra. Ana Pérez").await.unwrap();

        assert_eq!(s.current_node(), Some(NodeId::TitleSelect));
        assert_eq!(s.candidate_title(), Some("Dra."));
        assert_eq!(s.visible_options()[0].value, "Dra.");
        // Still only a suggestion until the visitor picks it.
        assert_eq!(s.lead().title, "");
    }

    #[tokio::test]
    async fn spelled_out_honorific_maps_to_its_button() {
        let (mut s, _) = session(BotConfig::instant());
        s.start().await.unwrap();
        s.submit_free_text("Profesora Elena Ruiz").await.unwrap();

        assert_eq!(s.candidate_title(), Some("Prof."));
        assert_eq!(s.visible_options()[0].value, "Prof.");
    }

    #[tokio::test]
    async fn begin_delivery_twice_is_in_flight() {
        let (mut s, transport) = session(BotConfig::instant());
        let first = s.begin_delivery().unwrap();
        assert!(matches!(first, BeginDelivery::Send(_)));
        assert_eq!(s.delivery_state(), DeliveryState::Sending);

        let err = s.begin_delivery().unwrap_err();
        assert!(matches!(err, DeliveryError::InFlight { .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn result_after_reset_is_discarded() {
        let (mut s, _) = session(BotConfig::instant());
        let BeginDelivery::Send(pending) = s.begin_delivery().unwrap() else {
            panic!("fresh lead should be sent");
        };
        s.reset().await.unwrap();

        let report = s.complete_delivery(pending, Ok(DeliveryReceipt { attempts: 1 }));
        assert!(matches!(report, DeliveryReport::Discarded));
        assert!(!s.lead().sent());
        assert_eq!(s.delivery_state(), DeliveryState::Idle);
    }

    #[tokio::test]
    async fn unchanged_lead_is_delivered_once() {
        let (mut s, transport) = session(BotConfig::instant());
        let first = s.deliver().await.unwrap();
        assert!(matches!(first, DeliveryReport::Delivered { attempts: 1 }));
        let second = s.deliver().await.unwrap();
        assert!(matches!(second, DeliveryReport::AlreadyDelivered));
        assert!(second.is_success());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        assert!(s.lead().sent());
    }

    #[tokio::test]
    async fn resume_reuses_persisted_id_and_reset_replaces_it() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let (deps, _) = deps(BotConfig::instant());

        let first = ConversationSession::resume_or_create(deps.clone(), Transcript::new(), store.clone())
            .unwrap();
        let id = first.session_id().clone();
        let mut second =
            ConversationSession::resume_or_create(deps, Transcript::new(), store.clone()).unwrap();
        assert_eq!(*second.session_id(), id);

        second.reset().await.unwrap();
        let persisted = store.load(crate::lead::SESSION_KEY).unwrap().unwrap();
        assert_eq!(persisted, second.session_id().as_str());
        assert_ne!(persisted, id.as_str());
    }
}
