//! The conversation record shared by the renderer and the transport.

use weft_types::{HistoryEntry, Message, MessageId};

/// Ordered messages of one session.
///
/// Append-only, except that the last message may be replaced while it is the
/// active assistant turn. Mutation is crate-private: only the turn
/// accumulator and the approval gate write here.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Last message, if it is an assistant message.
    #[must_use]
    pub fn assistant_tail(&self) -> Option<&Message> {
        self.last().filter(|message| message.is_assistant())
    }

    /// History projection sent with the next request. Blank messages
    /// (an unanswered resume placeholder) are left out.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .filter(|message| !message.is_blank())
            .map(Message::to_history_entry)
            .collect()
    }

    pub(crate) fn push(&mut self, message: Message) -> MessageId {
        let id = message.id();
        self.messages.push(message);
        id
    }

    /// Swap the last message for `message`. No-op on an empty log.
    pub(crate) fn replace_last(&mut self, message: Message) -> bool {
        match self.messages.last_mut() {
            Some(last) => {
                *last = message;
                true
            }
            None => false,
        }
    }
}
