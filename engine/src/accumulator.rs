//! Folding streamed output into the conversation log.

use std::time::SystemTime;

use weft_stream::Extracted;
use weft_types::{Message, MessageId};

use crate::log::ConversationLog;

/// What [`TurnAccumulator::apply`] did to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Nothing to show yet, or the tail already matched.
    Unchanged,
    /// First output of the turn: a new assistant message.
    Appended(MessageId),
    /// The tail assistant message was rewritten in place.
    Updated(MessageId),
}

impl Applied {
    #[must_use]
    pub fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Write handle over the log for the active turn.
///
/// Each call receives the fold of the whole turn so far, so the tail is
/// replaced rather than appended to. A second assistant message is never
/// appended while the tail is already an assistant message.
pub struct TurnAccumulator<'a> {
    log: &'a mut ConversationLog,
}

impl<'a> TurnAccumulator<'a> {
    pub fn new(log: &'a mut ConversationLog) -> Self {
        Self { log }
    }

    /// Open a turn with the user's message.
    pub fn begin_turn(&mut self, user: Message) -> MessageId {
        self.log.push(user)
    }

    pub fn apply(&mut self, extracted: &Extracted) -> Applied {
        if extracted.is_empty() {
            return Applied::Unchanged;
        }

        let Some(tail) = self.log.assistant_tail() else {
            let message = Message::assistant(
                extracted.text.clone(),
                extracted.image.clone(),
                SystemTime::now(),
            );
            return Applied::Appended(self.log.push(message));
        };

        let image = extracted
            .image
            .clone()
            .or_else(|| tail.image().cloned());
        let updated = tail.rewritten(extracted.text.clone(), image);
        if &updated == tail {
            return Applied::Unchanged;
        }
        let id = updated.id();
        self.log.replace_last(updated);
        Applied::Updated(id)
    }

    /// End the turn with a visible error.
    ///
    /// Extends the tail when the turn already produced output, so a failing
    /// turn still ends with a single assistant message.
    pub fn fail(&mut self, error: &str) -> MessageId {
        match self.log.assistant_tail() {
            Some(tail) => {
                let content = if tail.content().is_empty() {
                    error.to_string()
                } else {
                    format!("{}\n\n{error}", tail.content())
                };
                let updated = tail.rewritten(content, tail.image().cloned());
                let id = updated.id();
                self.log.replace_last(updated);
                id
            }
            None => self
                .log
                .push(Message::assistant(error, None, SystemTime::now())),
        }
    }
}
