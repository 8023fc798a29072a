use chrono::{DateTime, Local};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::attachment::{AttachmentError, PendingAttachment};
use crate::config::Config;
use crate::events::{Role, SessionEvent, Turn};
use crate::llm::{ChatBackend, ChatError};
use crate::streaming::{spawn_reveal_timer, TypingReveal};

/// Timing and limits for a chat session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub reply_delay: Duration,
    pub reveal_interval: Duration,
    pub max_attachment_bytes: u64,
    pub suggestions: Vec<String>,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reply_delay: config.reply_delay(),
            reveal_interval: config.reveal_interval(),
            max_attachment_bytes: config.max_attachment_bytes,
            suggestions: config.suggestions.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { request_id: u64 },
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyInput,
    ResponseInFlight,
}

/// Display state of a bubble in the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BubbleState {
    /// Sent by the user, or a reply that finished revealing
    Done,
    /// Waiting for the API
    Loading,
    /// Reply text is being typed out
    Revealing,
    /// Reveal halted by the user; holds the partial text
    Stopped,
    Failed(ChatError),
}

/// One message as shown on screen
#[derive(Debug, Clone)]
pub struct ChatBubble {
    pub role: Role,
    pub text: String,
    pub attachment: Option<String>,
    pub state: BubbleState,
    pub timestamp: DateTime<Local>,
}

impl ChatBubble {
    fn user(text: &str, attachment: Option<String>) -> Self {
        Self {
            role: Role::User,
            text: text.to_string(),
            attachment,
            state: BubbleState::Done,
            timestamp: Local::now(),
        }
    }

    fn model_placeholder() -> Self {
        Self {
            role: Role::Model,
            text: "Just a sec..".to_string(),
            attachment: None,
            state: BubbleState::Loading,
            timestamp: Local::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.state, BubbleState::Failed(_))
    }
}

/// The single request allowed to be live
struct ActiveRequest {
    id: u64,
    token: CancellationToken,
    /// Transcript index of the model bubble, once shown
    bubble: Option<usize>,
    reveal: Option<TypingReveal>,
}

/// Conversation controller: history, staged attachment and request lifecycle.
///
/// Background tasks never touch this state directly; they send
/// [`SessionEvent`]s that the owner feeds back through [`ChatSession::apply`].
/// `submit` spawns tasks and must run inside a tokio runtime.
pub struct ChatSession<B: ChatBackend> {
    id: Uuid,
    backend: Arc<B>,
    settings: SessionSettings,
    history: Vec<Turn>,
    transcript: Vec<ChatBubble>,
    pending: Option<PendingAttachment>,
    responding: bool,
    chats_active: bool,
    active: Option<ActiveRequest>,
    next_request_id: u64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<B: ChatBackend> ChatSession<B> {
    pub fn new(backend: B, settings: SessionSettings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            id: Uuid::new_v4(),
            backend: Arc::new(backend),
            settings,
            history: Vec::new(),
            transcript: Vec::new(),
            pending: None,
            responding: false,
            chats_active: false,
            active: None,
            next_request_id: 0,
            events_tx,
            events_rx,
        }
    }

    /// Send a message with the staged attachment, if any
    pub fn submit(&mut self, input: &str) -> SubmitOutcome {
        let text = input.trim();
        if text.is_empty() {
            return SubmitOutcome::Ignored(IgnoreReason::EmptyInput);
        }
        if self.responding {
            debug!(session = %self.id, "Submission ignored, response in flight");
            return SubmitOutcome::Ignored(IgnoreReason::ResponseInFlight);
        }

        let attachment = self.pending.take();
        self.history.push(Turn::user(text, attachment.as_ref()));
        self.transcript
            .push(ChatBubble::user(text, attachment.as_ref().map(PendingAttachment::label)));

        self.responding = true;
        self.chats_active = true;
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let token = CancellationToken::new();

        self.active = Some(ActiveRequest {
            id: request_id,
            token: token.clone(),
            bubble: None,
            reveal: None,
        });
        self.spawn_request(request_id, token);

        info!(
            session = %self.id,
            request_id,
            turns = self.history.len(),
            attachment = attachment.is_some(),
            "Message submitted"
        );
        SubmitOutcome::Accepted { request_id }
    }

    fn spawn_request(&self, request_id: u64, token: CancellationToken) {
        let backend = Arc::clone(&self.backend);
        let contents = self.history.clone();
        let delay = self.settings.reply_delay;
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if tx.send(SessionEvent::Placeholder { request_id }).is_err() {
                return;
            }

            // Dropping the backend future aborts the HTTP call
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(ChatError::Cancelled),
                result = backend.generate(contents) => result,
            };
            let _ = tx.send(SessionEvent::Reply { request_id, result });
        });
    }

    /// Apply one event from a background task; events for requests that
    /// were stopped or cleared are dropped
    pub fn apply(&mut self, event: SessionEvent) {
        let current = self.active.as_ref().map(|active| active.id);
        if current != Some(event.request_id()) {
            trace!(request_id = event.request_id(), "Dropping stale session event");
            return;
        }

        match event {
            SessionEvent::Placeholder { .. } => {
                self.model_bubble();
            }
            SessionEvent::Reply { result: Ok(text), .. } => self.begin_reveal(text),
            SessionEvent::Reply { result: Err(error), .. } => self.fail_request(error),
            SessionEvent::RevealTick { .. } => self.advance_reveal(),
        }
    }

    /// Apply every event already queued; returns whether anything arrived
    pub fn process_events(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
            changed = true;
        }
        changed
    }

    /// Wait for the next event from a background task
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Drive events until no response is in flight
    pub async fn run_until_idle(&mut self) {
        while self.responding {
            match self.events_rx.recv().await {
                Some(event) => self.apply(event),
                None => break,
            }
        }
    }

    /// Index of the model bubble for the active request, creating it if the
    /// placeholder has not been shown yet
    fn model_bubble(&mut self) -> usize {
        if let Some(index) = self.active.as_ref().and_then(|active| active.bubble) {
            return index;
        }
        let index = self.transcript.len();
        self.transcript.push(ChatBubble::model_placeholder());
        if let Some(active) = self.active.as_mut() {
            active.bubble = Some(index);
        }
        index
    }

    fn begin_reveal(&mut self, text: String) {
        let index = self.model_bubble();
        let bubble = &mut self.transcript[index];
        bubble.state = BubbleState::Revealing;
        bubble.text.clear();

        let Some(active) = self.active.as_mut() else {
            return;
        };
        debug!(request_id = active.id, chars = text.len(), "Revealing reply");
        active.reveal = Some(TypingReveal::new(&text));
        spawn_reveal_timer(
            active.id,
            self.settings.reveal_interval,
            active.token.clone(),
            self.events_tx.clone(),
        );
    }

    fn advance_reveal(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let (Some(reveal), Some(index)) = (active.reveal.as_mut(), active.bubble) else {
            return;
        };

        if reveal.step().is_some() {
            self.transcript[index].text = reveal.visible().to_string();
        }
        trace!(request_id = active.id, remaining = reveal.remaining(), "Reveal step");

        if reveal.is_finished() {
            let text = reveal.full_text();
            self.history.push(Turn::model(text));
            self.transcript[index].state = BubbleState::Done;
            info!(session = %self.id, turns = self.history.len(), "Reply complete");
            self.finish_request();
        }
    }

    fn fail_request(&mut self, error: ChatError) {
        warn!(session = %self.id, error = %error, "Reply failed");
        let index = self.model_bubble();
        let bubble = &mut self.transcript[index];
        bubble.text = error.to_string();
        bubble.state = BubbleState::Failed(error);
        self.finish_request();
    }

    fn finish_request(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
        }
        self.responding = false;
    }

    /// Stop the in-flight request or reveal. Also drops the staged attachment.
    ///
    /// Returns `false` when nothing was in flight.
    pub fn stop_response(&mut self) -> bool {
        self.pending = None;
        self.responding = false;

        let Some(active) = self.active.take() else {
            return false;
        };
        active.token.cancel();

        let index = match active.bubble {
            Some(index) => index,
            None => {
                self.transcript.push(ChatBubble::model_placeholder());
                self.transcript.len() - 1
            }
        };
        let bubble = &mut self.transcript[index];
        if active.reveal.is_some() {
            bubble.state = BubbleState::Stopped;
        } else {
            bubble.text = ChatError::Cancelled.to_string();
            bubble.state = BubbleState::Failed(ChatError::Cancelled);
        }

        info!(session = %self.id, request_id = active.id, "Response stopped");
        true
    }

    /// Forget the whole conversation, stopping anything in flight
    pub fn clear_history(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
        }
        self.history.clear();
        self.transcript.clear();
        self.responding = false;
        self.chats_active = false;
        info!(session = %self.id, "Conversation cleared");
    }

    /// Stage a file for the next message, replacing any previous one
    pub fn attach(&mut self, path: &Path) -> Result<&PendingAttachment, AttachmentError> {
        match PendingAttachment::from_path(path, self.settings.max_attachment_bytes) {
            Ok(attachment) => {
                info!(
                    name = %attachment.name,
                    mime_type = %attachment.mime_type,
                    "Attachment staged"
                );
                let staged = self.pending.insert(attachment);
                Ok(&*staged)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Attachment rejected");
                Err(err)
            }
        }
    }

    pub fn cancel_attachment(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Submit the suggestion at `index`
    pub fn use_suggestion(&mut self, index: usize) -> Option<SubmitOutcome> {
        let text = self.settings.suggestions.get(index)?.clone();
        Some(self.submit(&text))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn transcript(&self) -> &[ChatBubble] {
        &self.transcript
    }

    pub fn pending_attachment(&self) -> Option<&PendingAttachment> {
        self.pending.as_ref()
    }

    pub fn is_responding(&self) -> bool {
        self.responding
    }

    pub fn chats_active(&self) -> bool {
        self.chats_active
    }

    pub fn suggestions(&self) -> &[String] {
        &self.settings.suggestions
    }
}
