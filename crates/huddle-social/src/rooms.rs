//! Room administration.
//!
//! Owners create rooms, toggle them open or closed, rename them and delete
//! them. Deleting a room removes its presence records and messages in the
//! same batch.

use std::sync::Arc;

use huddle_common::{Room, RoomId, StoreError};
use huddle_store::{encode, Direction, DocumentStore, FieldUpdate, Query, WriteBatch};
use serde_json::Value;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::info;

use crate::identity::Identity;
use crate::protocol::{collections, fields, presence_collection, room_path};

/// Rooms an owner may hold at once unless configured otherwise.
pub const DEFAULT_MAX_ROOMS_PER_OWNER: usize = 3;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room name must not be empty")]
    EmptyName,

    #[error("room limit reached: at most {0} rooms per owner")]
    LimitReached(usize),

    #[error("room not found: {0}")]
    NotFound(RoomId),

    #[error("room is closed: {0}")]
    Inactive(RoomId),

    #[error("message exceeds {0} characters")]
    MessageTooLong(usize),

    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error("message {0} carries no poll")]
    NoPoll(String),

    #[error("room store error: {0}")]
    Store(#[from] StoreError),
}

/// Fields for a new room.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub admin_name: Option<String>,
    pub admin_password: String,
}

/// A partial room edit. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct RoomUpdate {
    pub name: Option<String>,
    pub admin_name: Option<String>,
    pub admin_password: Option<String>,
}

impl RoomUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.admin_name.is_none() && self.admin_password.is_none()
    }
}

/// Room CRUD over a document store.
#[derive(Clone)]
pub struct RoomService {
    store: Arc<dyn DocumentStore>,
    max_rooms_per_owner: usize,
}

impl RoomService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            max_rooms_per_owner: DEFAULT_MAX_ROOMS_PER_OWNER,
        }
    }

    pub fn with_room_limit(mut self, max_rooms_per_owner: usize) -> Self {
        self.max_rooms_per_owner = max_rooms_per_owner;
        self
    }

    /// Create an open room with no one online.
    ///
    /// With an `owner`, the room is attributed to them and counts against
    /// their room limit. Without one it is an anonymous admin room.
    pub async fn create_room(
        &self,
        room: NewRoom,
        owner: Option<&Identity>,
    ) -> Result<RoomId, RoomError> {
        let name = room.name.trim();
        if name.is_empty() {
            return Err(RoomError::EmptyName);
        }

        if let Some(owner) = owner {
            let owned = self.owned_rooms(&owner.user_id).await?;
            if owned.len() >= self.max_rooms_per_owner {
                return Err(RoomError::LimitReached(self.max_rooms_per_owner));
            }
        }

        let doc = Room {
            id: RoomId::default(),
            name: name.to_string(),
            admin_password: room.admin_password,
            admin_name: room.admin_name.clone(),
            active: true,
            online_count: 0,
            created_at: 0,
            owner_id: owner.map(|o| o.user_id.clone()),
            owner_email: owner.and_then(|o| o.email.clone()),
            owner_display_name: owner.map(|o| {
                o.display_name
                    .clone()
                    .or(room.admin_name)
                    .unwrap_or_else(|| o.label().to_string())
            }),
        };

        let path = self
            .store
            .add(collections::ROOMS, encode(&doc)?, &[fields::CREATED_AT])
            .await?;
        let id = RoomId::from(path.id());
        info!(room = %id, name = %doc.name, owner = ?doc.owner_id, "room created");
        Ok(id)
    }

    pub async fn get_room(&self, id: &RoomId) -> Result<Room, RoomError> {
        let doc = self
            .store
            .get(&room_path(id))
            .await?
            .ok_or_else(|| RoomError::NotFound(id.clone()))?;
        let mut room: Room = doc.decode()?;
        room.id = id.clone();
        Ok(room)
    }

    /// Fetch a room a participant is about to enter. Closed rooms are
    /// rejected.
    pub async fn open_room(&self, id: &RoomId) -> Result<Room, RoomError> {
        let room = self.get_room(id).await?;
        if !room.active {
            return Err(RoomError::Inactive(id.clone()));
        }
        Ok(room)
    }

    /// Check an admin password in constant time.
    pub async fn verify_admin_password(
        &self,
        id: &RoomId,
        password: &str,
    ) -> Result<bool, RoomError> {
        let room = self.get_room(id).await?;
        Ok(bool::from(
            room.admin_password.as_bytes().ct_eq(password.as_bytes()),
        ))
    }

    pub async fn set_active(&self, id: &RoomId, active: bool) -> Result<(), RoomError> {
        let update = vec![(fields::ACTIVE.to_string(), FieldUpdate::Set(Value::Bool(active)))];
        self.store
            .update(&room_path(id), update)
            .await
            .map_err(|e| not_found_as(e, id))?;
        info!(room = %id, active, "room status changed");
        Ok(())
    }

    pub async fn update_room(&self, id: &RoomId, update: RoomUpdate) -> Result<(), RoomError> {
        if update.is_empty() {
            return Ok(());
        }

        let mut changes = Vec::new();
        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(RoomError::EmptyName);
            }
            changes.push((fields::NAME.to_string(), FieldUpdate::Set(name.into())));
        }
        if let Some(admin_name) = update.admin_name {
            changes.push((fields::ADMIN_NAME.to_string(), FieldUpdate::Set(admin_name.into())));
        }
        if let Some(password) = update.admin_password {
            changes.push((fields::ADMIN_PASSWORD.to_string(), FieldUpdate::Set(password.into())));
        }

        self.store
            .update(&room_path(id), changes)
            .await
            .map_err(|e| not_found_as(e, id))?;
        info!(room = %id, "room updated");
        Ok(())
    }

    /// Delete a room with its presence records and messages.
    pub async fn delete_room(&self, id: &RoomId) -> Result<(), RoomError> {
        let presence = self
            .store
            .query(&Query::new(presence_collection(id)))
            .await?;
        let messages = self
            .store
            .query(&Query::new(collections::MESSAGES).where_eq(fields::ROOM_ID, id.as_str()))
            .await?;

        let mut batch = WriteBatch::new().delete_existing(room_path(id));
        for doc in presence.iter().chain(messages.iter()) {
            batch = batch.delete(doc.path.clone());
        }

        self.store
            .commit(batch)
            .await
            .map_err(|e| not_found_as(e, id))?;
        info!(
            room = %id,
            presence = presence.len(),
            messages = messages.len(),
            "room deleted"
        );
        Ok(())
    }

    /// Rooms owned by `owner_id`, newest first.
    pub async fn owned_rooms(&self, owner_id: &str) -> Result<Vec<Room>, RoomError> {
        let query = Query::new(collections::ROOMS)
            .where_eq(fields::OWNER_ID, owner_id)
            .order_by(fields::CREATED_AT, Direction::Descending);

        self.store
            .query(&query)
            .await?
            .into_iter()
            .map(|doc| -> Result<Room, RoomError> {
                let mut room: Room = doc.decode()?;
                room.id = RoomId::from(doc.id());
                Ok(room)
            })
            .collect()
    }
}

impl std::fmt::Debug for RoomService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomService")
            .field("max_rooms_per_owner", &self.max_rooms_per_owner)
            .finish_non_exhaustive()
    }
}

fn not_found_as(error: StoreError, id: &RoomId) -> RoomError {
    match error {
        StoreError::NotFound(_) => RoomError::NotFound(id.clone()),
        other => RoomError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use huddle_common::Participant;
    use huddle_store::MemoryStore;

    use super::*;
    use crate::presence::PresenceManager;

    fn service() -> (MemoryStore, RoomService) {
        let mem = MemoryStore::new();
        let service = RoomService::new(Arc::new(mem.clone()));
        (mem, service)
    }

    fn new_room(name: &str) -> NewRoom {
        NewRoom {
            name: name.into(),
            admin_name: Some("Teacher".into()),
            admin_password: "secret".into(),
        }
    }

    fn owner() -> Identity {
        Identity::new("u1").with_email("owner@example.com")
    }

    #[tokio::test]
    async fn create_and_get() {
        let (_mem, rooms) = service();
        let id = rooms.create_room(new_room("  Lecture "), None).await.unwrap();
        let room = rooms.get_room(&id).await.unwrap();

        assert_eq!(room.id, id);
        assert_eq!(room.name, "Lecture");
        assert!(room.active);
        assert_eq!(room.online_count, 0);
        assert!(room.created_at > 0);
        assert!(room.owner_id.is_none());
    }

    #[tokio::test]
    async fn owner_fields_are_recorded() {
        let (_mem, rooms) = service();
        let id = rooms.create_room(new_room("Lecture"), Some(&owner())).await.unwrap();
        let room = rooms.get_room(&id).await.unwrap();

        assert_eq!(room.owner_id.as_deref(), Some("u1"));
        assert_eq!(room.owner_email.as_deref(), Some("owner@example.com"));
        // No display name on the account: the admin name stands in.
        assert_eq!(room.owner_display_name.as_deref(), Some("Teacher"));
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let (mem, rooms) = service();
        let err = rooms.create_room(new_room("   "), None).await.unwrap_err();
        assert!(matches!(err, RoomError::EmptyName));
        assert_eq!(mem.document_count(collections::ROOMS), 0);
    }

    #[tokio::test]
    async fn owner_limit_is_enforced() {
        let (_mem, rooms) = service();
        let owner = owner();
        for i in 0..3 {
            rooms
                .create_room(new_room(&format!("Room {i}")), Some(&owner))
                .await
                .unwrap();
        }
        let err = rooms
            .create_room(new_room("Room 4"), Some(&owner))
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::LimitReached(3)));

        // Other owners and anonymous rooms are unaffected.
        rooms
            .create_room(new_room("Other"), Some(&Identity::new("u2")))
            .await
            .unwrap();
        rooms.create_room(new_room("Anon"), None).await.unwrap();
    }

    #[tokio::test]
    async fn configured_limit_applies() {
        let mem = MemoryStore::new();
        let rooms = RoomService::new(Arc::new(mem)).with_room_limit(1);
        rooms.create_room(new_room("A"), Some(&owner())).await.unwrap();
        let err = rooms.create_room(new_room("B"), Some(&owner())).await.unwrap_err();
        assert!(matches!(err, RoomError::LimitReached(1)));
    }

    #[tokio::test]
    async fn owned_rooms_newest_first() {
        let (_mem, rooms) = service();
        let owner = owner();
        let first = rooms.create_room(new_room("First"), Some(&owner)).await.unwrap();
        let second = rooms.create_room(new_room("Second"), Some(&owner)).await.unwrap();
        rooms.create_room(new_room("Anon"), None).await.unwrap();

        let owned = rooms.owned_rooms("u1").await.unwrap();
        let ids: Vec<_> = owned.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn password_check() {
        let (_mem, rooms) = service();
        let id = rooms.create_room(new_room("Lecture"), None).await.unwrap();
        assert!(rooms.verify_admin_password(&id, "secret").await.unwrap());
        assert!(!rooms.verify_admin_password(&id, "secre").await.unwrap());
        assert!(!rooms.verify_admin_password(&id, "").await.unwrap());
    }

    #[tokio::test]
    async fn closed_room_cannot_be_opened() {
        let (_mem, rooms) = service();
        let id = rooms.create_room(new_room("Lecture"), None).await.unwrap();
        rooms.set_active(&id, false).await.unwrap();

        assert!(!rooms.get_room(&id).await.unwrap().active);
        assert!(matches!(rooms.open_room(&id).await, Err(RoomError::Inactive(_))));

        rooms.set_active(&id, true).await.unwrap();
        assert!(rooms.open_room(&id).await.is_ok());
    }

    #[tokio::test]
    async fn missing_room_errors() {
        let (_mem, rooms) = service();
        let id = RoomId::from("nope");
        assert!(matches!(rooms.get_room(&id).await, Err(RoomError::NotFound(_))));
        assert!(matches!(rooms.set_active(&id, false).await, Err(RoomError::NotFound(_))));
        assert!(matches!(rooms.delete_room(&id).await, Err(RoomError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let (_mem, rooms) = service();
        let id = rooms.create_room(new_room("Lecture"), None).await.unwrap();
        rooms
            .update_room(
                &id,
                RoomUpdate {
                    admin_password: Some("new-secret".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let room = rooms.get_room(&id).await.unwrap();
        assert_eq!(room.name, "Lecture");
        assert_eq!(room.admin_password, "new-secret");

        let err = rooms
            .update_room(
                &id,
                RoomUpdate {
                    name: Some(" ".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::EmptyName));
    }

    #[tokio::test]
    async fn delete_cascades_to_presence_and_messages() {
        let (mem, rooms) = service();
        let store: Arc<dyn DocumentStore> = Arc::new(mem.clone());
        let keep = rooms.create_room(new_room("Keep"), None).await.unwrap();
        let id = rooms.create_room(new_room("Doomed"), None).await.unwrap();

        let alice = PresenceManager::new(Arc::clone(&store), id.clone(), Participant::new("Alice"));
        alice.join().await.unwrap();

        let chat = crate::chat::ChatService::new(Arc::clone(&store));
        let author = Participant::new("Alice");
        chat.send_message(&id, &author, "bye", None).await.unwrap();
        chat.send_message(&keep, &author, "stay", None).await.unwrap();

        rooms.delete_room(&id).await.unwrap();

        assert!(matches!(rooms.get_room(&id).await, Err(RoomError::NotFound(_))));
        assert_eq!(mem.document_count(&presence_collection(&id)), 0);
        assert_eq!(mem.document_count(collections::MESSAGES), 1);
        assert!(rooms.get_room(&keep).await.is_ok());

        // The departing session finds nothing left to clean up.
        alice.leave().await;
        assert_eq!(mem.document_count(collections::ROOMS), 1);
    }
}
