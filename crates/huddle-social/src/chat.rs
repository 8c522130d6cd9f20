//! Sending chat messages and polls.
//!
//! Messages are append-only documents in the top-level `messages`
//! collection keyed back to their room; live delivery happens through the
//! room subscriber.

use std::sync::Arc;

use huddle_common::{now_millis, ChatMessage, Participant, Poll, RoomId, StoreError};
use huddle_store::{encode, Direction, DocumentStore, FieldUpdate, Query};
use tracing::{debug, info};

use crate::protocol::{collections, fields, message_path};
use crate::rooms::RoomError;

/// Longest accepted message, in characters, unless configured otherwise.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 1000;

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn DocumentStore>,
    max_message_length: usize,
}

impl ChatService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }

    pub fn with_max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = max;
        self
    }

    /// Post a message to `room`, timestamped by the store.
    ///
    /// The text is trimmed; blank input is ignored and yields `None`.
    /// Returns the new message id.
    pub async fn send_message(
        &self,
        room: &RoomId,
        author: &Participant,
        text: &str,
        poll: Option<Poll>,
    ) -> Result<Option<String>, RoomError> {
        let text = text.trim();
        if text.is_empty() {
            debug!(room = %room, "ignoring blank message");
            return Ok(None);
        }
        self.write(room, author, text, poll).await.map(Some)
    }

    /// Post a poll, closing every poll still open in the room first.
    pub async fn post_poll(
        &self,
        room: &RoomId,
        author: &Participant,
        poll: Poll,
    ) -> Result<String, RoomError> {
        for open in self.messages(room).await? {
            if open.poll.as_ref().is_some_and(|p| p.active) {
                self.close_poll(&open.id).await?;
            }
        }

        let question = poll.question.clone();
        let id = self
            .write(room, author, &format!("Poll: {question}"), Some(poll))
            .await?;
        info!(room = %room, message = %id, question = %question, "poll opened");
        Ok(id)
    }

    /// Mark the poll embedded in `message_id` inactive.
    pub async fn close_poll(&self, message_id: &str) -> Result<(), RoomError> {
        let path = message_path(message_id);
        let doc = self
            .store
            .get(&path)
            .await?
            .ok_or_else(|| RoomError::MessageNotFound(message_id.to_string()))?;
        let message: ChatMessage = doc.decode()?;
        let Some(mut poll) = message.poll else {
            return Err(RoomError::NoPoll(message_id.to_string()));
        };
        if !poll.active {
            return Ok(());
        }

        poll.active = false;
        let update = vec![(
            fields::POLL.to_string(),
            FieldUpdate::Set(serde_json::to_value(&poll).map_err(StoreError::from)?),
        )];
        self.store
            .update(&path, update)
            .await
            .map_err(|e| missing_message(e, message_id))?;
        info!(message = %message_id, poll = %poll.id, "poll closed");
        Ok(())
    }

    async fn write(
        &self,
        room: &RoomId,
        author: &Participant,
        text: &str,
        poll: Option<Poll>,
    ) -> Result<String, RoomError> {
        if text.chars().count() > self.max_message_length {
            return Err(RoomError::MessageTooLong(self.max_message_length));
        }

        let poll = poll.map(|mut poll| {
            if poll.created_at == 0 {
                poll.created_at = now_millis();
            }
            poll
        });
        let message = ChatMessage {
            id: String::new(),
            room_id: room.clone(),
            user_name: author.name.clone(),
            message: text.to_string(),
            timestamp: 0,
            is_admin: author.is_admin,
            poll,
        };

        let path = self
            .store
            .add(collections::MESSAGES, encode(&message)?, &[fields::TIMESTAMP])
            .await?;
        debug!(room = %room, message = %path.id(), "message sent");
        Ok(path.id().to_string())
    }

    /// One-shot read of a room's messages, oldest first.
    pub async fn messages(&self, room: &RoomId) -> Result<Vec<ChatMessage>, RoomError> {
        let query = Query::new(collections::MESSAGES)
            .where_eq(fields::ROOM_ID, room.as_str())
            .order_by(fields::TIMESTAMP, Direction::Ascending);

        let mut messages = Vec::new();
        for doc in self.store.query(&query).await? {
            let mut message: ChatMessage = doc.decode()?;
            message.id = doc.id().to_string();
            messages.push(message);
        }
        Ok(messages)
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("max_message_length", &self.max_message_length)
            .finish_non_exhaustive()
    }
}

fn missing_message(error: StoreError, id: &str) -> RoomError {
    match error {
        StoreError::NotFound(_) => RoomError::MessageNotFound(id.to_string()),
        other => RoomError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use huddle_store::MemoryStore;

    use super::*;

    fn service() -> (MemoryStore, ChatService) {
        let mem = MemoryStore::new();
        let chat = ChatService::new(Arc::new(mem.clone()));
        (mem, chat)
    }

    fn room() -> RoomId {
        RoomId::from("R1")
    }

    #[tokio::test]
    async fn send_trims_and_stamps() {
        let (_mem, chat) = service();
        let author = Participant::new("Alice");
        let id = chat
            .send_message(&room(), &author, "  hello  ", None)
            .await
            .unwrap()
            .unwrap();

        let messages = chat.messages(&room()).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, id);
        assert_eq!(messages[0].message, "hello");
        assert_eq!(messages[0].user_name, "Alice");
        assert!(!messages[0].is_admin);
        assert!(messages[0].timestamp > 0);
    }

    #[tokio::test]
    async fn blank_message_is_ignored() {
        let (mem, chat) = service();
        let sent = chat
            .send_message(&room(), &Participant::new("Alice"), " \n\t ", None)
            .await
            .unwrap();
        assert!(sent.is_none());
        assert_eq!(mem.commit_count(), 0);
    }

    #[tokio::test]
    async fn overlong_message_is_rejected() {
        let mem = MemoryStore::new();
        let chat = ChatService::new(Arc::new(mem.clone())).with_max_message_length(5);
        let author = Participant::new("Alice");

        // Length counts characters, not bytes.
        assert!(chat.send_message(&room(), &author, "héllo", None).await.is_ok());
        let err = chat
            .send_message(&room(), &author, "too long", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::MessageTooLong(5)));
        assert_eq!(mem.document_count(collections::MESSAGES), 1);
    }

    #[tokio::test]
    async fn admin_flag_follows_author() {
        let (_mem, chat) = service();
        let admin = Participant::new("Teacher").admin();
        chat.send_message(&room(), &admin, "welcome", None)
            .await
            .unwrap();
        assert!(chat.messages(&room()).await.unwrap()[0].is_admin);
    }

    #[tokio::test]
    async fn new_poll_closes_open_ones() {
        let (_mem, chat) = service();
        let admin = Participant::new("Teacher").admin();

        let first = chat
            .post_poll(&room(), &admin, Poll::multiple_choice("Lunch?", &["pizza", "sushi"]))
            .await
            .unwrap();
        let second = chat
            .post_poll(&room(), &admin, Poll::word_cloud("One word?"))
            .await
            .unwrap();

        let messages = chat.messages(&room()).await.unwrap();
        let poll_of = |id: &str| {
            messages
                .iter()
                .find(|m| m.id == id)
                .and_then(|m| m.poll.clone())
                .unwrap()
        };
        assert!(!poll_of(&first).active);
        assert!(poll_of(&second).active);
        assert!(poll_of(&second).created_at > 0);
        assert_eq!(messages[1].message, "Poll: One word?");
    }

    #[tokio::test]
    async fn close_poll_errors() {
        let (_mem, chat) = service();
        let author = Participant::new("Alice");
        let plain = chat
            .send_message(&room(), &author, "hi", None)
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(
            chat.close_poll(&plain).await,
            Err(RoomError::NoPoll(_))
        ));
        assert!(matches!(
            chat.close_poll("missing").await,
            Err(RoomError::MessageNotFound(_))
        ));
    }

    #[tokio::test]
    async fn closing_twice_is_harmless() {
        let (mem, chat) = service();
        let admin = Participant::new("Teacher").admin();
        let id = chat
            .post_poll(&room(), &admin, Poll::word_cloud("Mood?"))
            .await
            .unwrap();

        chat.close_poll(&id).await.unwrap();
        let commits = mem.commit_count();
        chat.close_poll(&id).await.unwrap();
        assert_eq!(mem.commit_count(), commits);
    }
}
