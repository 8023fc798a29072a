use crate::events::SessionEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Word-by-word reveal of an already complete reply
#[derive(Debug, Clone)]
pub struct TypingReveal {
    /// Words split on single spaces, so joining them restores the text
    words: Vec<String>,
    next: usize,
    visible: String,
}

impl TypingReveal {
    pub fn new(text: &str) -> Self {
        Self {
            words: text.split(' ').map(str::to_string).collect(),
            next: 0,
            visible: String::new(),
        }
    }

    /// Reveal the next word and return everything visible so far
    pub fn step(&mut self) -> Option<&str> {
        let word = self.words.get(self.next)?;
        if self.next > 0 {
            self.visible.push(' ');
        }
        self.visible.push_str(word);
        self.next += 1;
        Some(&self.visible)
    }

    pub fn visible(&self) -> &str {
        &self.visible
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.words.len()
    }

    pub fn remaining(&self) -> usize {
        self.words.len().saturating_sub(self.next)
    }

    pub fn full_text(&self) -> String {
        self.words.join(" ")
    }
}

/// Emit a [`SessionEvent::RevealTick`] every `every` until `token` is cancelled.
///
/// The first tick fires one full interval after the call.
pub fn spawn_reveal_timer(
    request_id: u64,
    every: Duration,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval() completes its first tick immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if tx.send(SessionEvent::RevealTick { request_id }).is_err() {
                        break;
                    }
                }
            }
        }
    })
}
