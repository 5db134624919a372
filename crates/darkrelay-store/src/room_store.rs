//! In-memory room registry.
//!
//! Lock layout:
//! - `rooms` (registry `RwLock`) guards which rooms exist. It is held only
//!   to look up, insert or remove an `Arc` handle.
//! - each room's `Mutex` guards its messages and metadata. It is always
//!   taken after the registry guard has been dropped.
//!
//! Appends re-check the claimed `prev_hash` against the live tail under the
//! room mutex, so two senders that read the same tail cannot both win.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use darkrelay_shared::chain::{self, verify_chain, verify_message};
use darkrelay_shared::constants::MAX_ID_ATTEMPTS;
use darkrelay_shared::crypto::{generate_symmetric_key, SymmetricKey};
use darkrelay_shared::{Message, RoomId, SenderId};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::journal::{Journal, SqliteJournal};
use crate::models::{PersistedRoom, RoomSummary, RoomView};

struct Room {
    id: RoomId,
    name: String,
    key: SymmetricKey,
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    participants: BTreeSet<SenderId>,
    generation: u64,
    /// Set once the room leaves the registry. Holders of a stale handle
    /// see `NotFound` from then on.
    removed: bool,
}

impl Room {
    fn view(&self) -> RoomView {
        RoomView {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            participants: self.participants.iter().cloned().collect(),
            messages: self.messages.clone(),
        }
    }

    fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            message_count: self.messages.len(),
            participant_count: self.participants.len(),
        }
    }

    fn tail_hash(&self) -> &str {
        chain::tail_hash(&self.messages)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }
}

type RoomHandle = Arc<Mutex<Room>>;

/// Shared registry of rooms. Construct one per process and pass it around
/// as `Arc<RoomStore>`.
pub struct RoomStore {
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    config: StoreConfig,
    journal: Option<Arc<dyn Journal>>,
}

impl RoomStore {
    /// Memory-only store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
            journal: None,
        }
    }

    /// Store that reports every mutation to `journal`.
    pub fn with_journal(config: StoreConfig, journal: Arc<dyn Journal>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
            journal: Some(journal),
        }
    }

    /// Rebuild a store from a SQLite journal and keep journaling into it.
    ///
    /// Journal writes are best-effort, so a room may come back with a hole
    /// in its sequence. History is restored up to the first missing message
    /// and the unlinkable rows after it are dropped with a warning, which
    /// keeps a lost write from reading as tampering. Rooms whose remaining
    /// history still fails verification are loaded anyway; the break is
    /// logged here and reported again by every read of that room.
    pub fn restore(config: StoreConfig, journal: Arc<SqliteJournal>) -> Result<Self> {
        let persisted = journal.load_rooms()?;
        let mut rooms = HashMap::with_capacity(persisted.len());

        for p in persisted {
            if let Err(brk) = verify_chain(&p.messages) {
                warn!(
                    room = %p.id,
                    index = brk.index,
                    kind = %brk.kind,
                    "restored room failed chain verification"
                );
            }
            let room = Room {
                id: p.id.clone(),
                name: p.name,
                key: p.key,
                messages: p.messages,
                created_at: p.created_at,
                last_activity: p.last_activity,
                participants: p.participants.into_iter().collect(),
                generation: p.generation,
                removed: false,
            };
            rooms.insert(p.id, Arc::new(Mutex::new(room)));
        }

        info!(rooms = rooms.len(), "restored room store from database");

        Ok(Self {
            rooms: RwLock::new(rooms),
            config,
            journal: Some(journal),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of live rooms.
    pub fn len(&self) -> Result<usize> {
        Ok(self.rooms.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // ------------------------------------------------------------------
    // Room lifecycle
    // ------------------------------------------------------------------

    /// Register a new room with a random id and an independent random key.
    ///
    /// A blank `name` becomes `Room-<first 8 id chars>`. Id collisions are
    /// retried with a fresh id up to `MAX_ID_ATTEMPTS` times.
    pub fn create_room(&self, name: &str) -> Result<RoomId> {
        let now = Utc::now();

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = RoomId::generate();
            let name = match name.trim() {
                "" => format!("Room-{}", id.short()),
                trimmed => trimmed.to_string(),
            };
            let room = Room {
                id: id.clone(),
                name,
                key: generate_symmetric_key(),
                messages: Vec::new(),
                created_at: now,
                last_activity: now,
                participants: BTreeSet::new(),
                generation: 0,
                removed: false,
            };
            let record = PersistedRoom {
                id: id.clone(),
                name: room.name.clone(),
                key: room.key,
                created_at: now,
                last_activity: now,
                generation: 0,
                participants: Vec::new(),
                messages: Vec::new(),
            };

            {
                let mut rooms = self.rooms.write()?;
                if rooms.contains_key(&id) {
                    warn!(attempt, "room id collision, retrying");
                    continue;
                }
                rooms.insert(id.clone(), Arc::new(Mutex::new(room)));
            }

            self.journal(&id, "room_created", |j| j.room_created(&record));
            info!(room = %id, name = %record.name, "room created");
            return Ok(id);
        }

        Err(StoreError::AlreadyExists {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Snapshot of the room. Later appends do not affect the returned view.
    pub fn get_room(&self, room_id: &RoomId) -> Result<RoomView> {
        let handle = self.handle(room_id)?;
        let room = lock_live(&handle, room_id)?;
        Ok(room.view())
    }

    /// Remove a room. Its key and messages are dropped with it.
    pub fn delete_room(&self, room_id: &RoomId) -> Result<()> {
        let handle = self
            .rooms
            .write()?
            .remove(room_id)
            .ok_or_else(|| StoreError::NotFound(room_id.clone()))?;

        {
            let mut room = lock_room(&handle)?;
            room.removed = true;
        }

        self.journal(room_id, "room_deleted", |j| j.room_deleted(room_id));
        info!(room = %room_id, "room deleted");
        Ok(())
    }

    /// Summaries of every live room, oldest first.
    pub fn list_rooms(&self) -> Result<Vec<RoomSummary>> {
        let handles: Vec<RoomHandle> = self.rooms.read()?.values().cloned().collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            let room = lock_room(&handle)?;
            if !room.removed {
                summaries.push(room.summary());
            }
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    /// Record `sender` as a participant and return a fresh snapshot.
    pub fn join_room(&self, room_id: &RoomId, sender: &SenderId) -> Result<RoomView> {
        let now = Utc::now();
        let handle = self.handle(room_id)?;

        let (view, newly_joined) = {
            let mut room = lock_live(&handle, room_id)?;
            let newly_joined = room.participants.insert(sender.clone());
            room.touch(now);
            (room.view(), newly_joined)
        };

        if newly_joined {
            self.journal(room_id, "participant_joined", |j| {
                j.participant_joined(room_id, sender, now)
            });
            debug!(room = %room_id, sender = %sender.short(), "participant joined");
        }
        Ok(view)
    }

    /// Delete every room idle for longer than the configured TTL. Returns
    /// the ids that were removed. Without a TTL this is a no-op.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<RoomId>> {
        let Some(ttl) = self.config.room_ttl else {
            return Ok(Vec::new());
        };
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return Ok(Vec::new());
        };

        let handles: Vec<(RoomId, RoomHandle)> = self
            .rooms
            .read()?
            .iter()
            .map(|(id, h)| (id.clone(), Arc::clone(h)))
            .collect();

        let mut expired = Vec::new();
        for (id, handle) in handles {
            let mut room = lock_room(&handle)?;
            if !room.removed && now.signed_duration_since(room.last_activity) > ttl {
                room.removed = true;
                expired.push((id, handle.clone()));
            }
        }

        if expired.is_empty() {
            return Ok(Vec::new());
        }

        {
            let mut rooms = self.rooms.write()?;
            for (id, handle) in &expired {
                if rooms.get(id).is_some_and(|h| Arc::ptr_eq(h, handle)) {
                    rooms.remove(id);
                }
            }
        }

        let ids: Vec<RoomId> = expired.into_iter().map(|(id, _)| id).collect();
        for id in &ids {
            self.journal(id, "room_deleted", |j| j.room_deleted(id));
        }
        info!(count = ids.len(), "expired idle rooms");
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// The room's symmetric key.
    pub fn get_key(&self, room_id: &RoomId) -> Result<SymmetricKey> {
        let handle = self.handle(room_id)?;
        let room = lock_live(&handle, room_id)?;
        Ok(room.key)
    }

    /// Hash the next appended message must carry as `prev_hash`.
    pub fn tail_hash(&self, room_id: &RoomId) -> Result<String> {
        let handle = self.handle(room_id)?;
        let room = lock_live(&handle, room_id)?;
        Ok(room.tail_hash().to_string())
    }

    /// Append a message built by [`chain::next_message`].
    ///
    /// Fails with [`StoreError::ChainMismatch`] when `message.prev_hash` is
    /// no longer the room's tail: another append (or a clear) won the race
    /// and the caller must rebuild the message against the new tail.
    pub fn append_message(&self, room_id: &RoomId, message: Message) -> Result<()> {
        let now = Utc::now();
        let handle = self.handle(room_id)?;

        let (generation, seq, message) = {
            let mut room = lock_live(&handle, room_id)?;

            if message.prev_hash != room.tail_hash() {
                return Err(StoreError::ChainMismatch {
                    claimed: message.prev_hash,
                    tail: room.tail_hash().to_string(),
                });
            }
            if !verify_message(&message) {
                return Err(StoreError::InvalidMessageHash);
            }

            let seq = room.messages.len() as u64;
            room.participants.insert(message.sender_id.clone());
            room.messages.push(message.clone());
            room.touch(now);
            (room.generation, seq, message)
        };

        self.journal(room_id, "message_appended", |j| {
            j.message_appended(room_id, generation, seq, &message)
        });
        debug!(room = %room_id, seq, hash = %message.hash, "message appended");
        Ok(())
    }

    /// Drop the whole history. The room starts over from the genesis hash.
    pub fn clear_messages(&self, room_id: &RoomId) -> Result<()> {
        let now = Utc::now();
        let handle = self.handle(room_id)?;

        let (generation, dropped) = {
            let mut room = lock_live(&handle, room_id)?;
            let dropped = room.messages.len();
            room.messages.clear();
            room.generation += 1;
            room.touch(now);
            (room.generation, dropped)
        };

        self.journal(room_id, "messages_cleared", |j| {
            j.messages_cleared(room_id, generation, now)
        });
        info!(room = %room_id, dropped, generation, "room history cleared");
        Ok(())
    }

    /// Verify the room's stored history.
    ///
    /// Returns [`StoreError::ChainVerificationFailed`] with the first bad
    /// index when tampering is detected.
    pub fn verify_room(&self, room_id: &RoomId) -> Result<()> {
        let messages = {
            let handle = self.handle(room_id)?;
            let room = lock_live(&handle, room_id)?;
            room.messages.clone()
        };

        verify_chain(&messages).map_err(|brk| {
            warn!(room = %room_id, index = brk.index, kind = %brk.kind, "chain verification failed");
            StoreError::ChainVerificationFailed(brk)
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn handle(&self, room_id: &RoomId) -> Result<RoomHandle> {
        self.rooms
            .read()?
            .get(room_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(room_id.clone()))
    }

    fn journal<F>(&self, room_id: &RoomId, op: &'static str, write: F)
    where
        F: FnOnce(&dyn Journal) -> Result<()>,
    {
        if let Some(journal) = &self.journal {
            if let Err(e) = write(journal.as_ref()) {
                warn!(room = %room_id, op, error = %e, "journal write failed, continuing in memory");
            }
        }
    }

    #[cfg(test)]
    fn replace_messages(&self, room_id: &RoomId, messages: Vec<Message>) {
        let handle = self.handle(room_id).unwrap();
        handle.lock().unwrap().messages = messages;
    }
}

fn lock_room(handle: &RoomHandle) -> Result<MutexGuard<'_, Room>> {
    Ok(handle.lock()?)
}

fn lock_live<'a>(handle: &'a RoomHandle, room_id: &RoomId) -> Result<MutexGuard<'a, Room>> {
    let room = lock_room(handle)?;
    if room.removed {
        return Err(StoreError::NotFound(room_id.clone()));
    }
    Ok(room)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use darkrelay_shared::chain::next_message;
    use darkrelay_shared::constants::GENESIS_HASH;
    use darkrelay_shared::crypto::generate_symmetric_key;
    use darkrelay_shared::BreakKind;

    use super::*;
    use crate::Database;

    fn post(store: &RoomStore, id: &RoomId, sender: &str, text: &str) -> Message {
        let key = store.get_key(id).unwrap();
        let prev = store.tail_hash(id).unwrap();
        let msg = next_message(text, &SenderId::from(sender), &key, &prev, Utc::now()).unwrap();
        store.append_message(id, msg.clone()).unwrap();
        msg
    }

    #[test]
    fn create_and_get_room() {
        let store = RoomStore::new(StoreConfig::default());
        let id = store.create_room("Project Phoenix").unwrap();

        let view = store.get_room(&id).unwrap();
        assert_eq!(view.id, id);
        assert_eq!(view.name, "Project Phoenix");
        assert!(view.messages.is_empty());
        assert_eq!(view.tail_hash(), GENESIS_HASH);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn blank_name_gets_default() {
        let store = RoomStore::new(StoreConfig::default());
        let id = store.create_room("   ").unwrap();
        assert_eq!(store.get_room(&id).unwrap().name, format!("Room-{}", id.short()));
    }

    #[test]
    fn unknown_room_is_not_found() {
        let store = RoomStore::new(StoreConfig::default());
        let id = RoomId::generate();
        assert!(matches!(store.get_room(&id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.get_key(&id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.clear_messages(&id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete_room(&id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn rooms_get_independent_keys() {
        let store = RoomStore::new(StoreConfig::default());
        let a = store.create_room("a").unwrap();
        let b = store.create_room("b").unwrap();
        assert_ne!(a, b);
        assert_ne!(store.get_key(&a).unwrap(), store.get_key(&b).unwrap());
    }

    #[test]
    fn key_is_stable_for_room_lifetime() {
        let store = RoomStore::new(StoreConfig::default());
        let id = store.create_room("a").unwrap();
        let key = store.get_key(&id).unwrap();
        post(&store, &id, "alice", "hi");
        store.clear_messages(&id).unwrap();
        assert_eq!(store.get_key(&id).unwrap(), key);
    }

    #[test]
    fn append_rejects_stale_prev_hash() {
        let store = RoomStore::new(StoreConfig::default());
        let id = store.create_room("race").unwrap();
        let key = store.get_key(&id).unwrap();

        let stale_tail = store.tail_hash(&id).unwrap();
        post(&store, &id, "alice", "winner");

        let loser = next_message("loser", &SenderId::from("bob"), &key, &stale_tail, Utc::now()).unwrap();
        match store.append_message(&id, loser) {
            Err(StoreError::ChainMismatch { claimed, tail }) => {
                assert_eq!(claimed, GENESIS_HASH);
                assert_eq!(tail, store.tail_hash(&id).unwrap());
            }
            other => panic!("expected ChainMismatch, got {other:?}"),
        }
        assert_eq!(store.get_room(&id).unwrap().messages.len(), 1);
    }

    #[test]
    fn append_rejects_bad_hash() {
        let store = RoomStore::new(StoreConfig::default());
        let id = store.create_room("bad").unwrap();
        let key = store.get_key(&id).unwrap();

        let mut msg = next_message("x", &SenderId::from("a"), &key, GENESIS_HASH, Utc::now()).unwrap();
        msg.hash = "0".repeat(64);
        assert!(matches!(
            store.append_message(&id, msg),
            Err(StoreError::InvalidMessageHash)
        ));
    }

    #[test]
    fn snapshots_are_isolated() {
        let store = RoomStore::new(StoreConfig::default());
        let id = store.create_room("snap").unwrap();
        let before = store.get_room(&id).unwrap();
        post(&store, &id, "alice", "hello");
        assert!(before.messages.is_empty());
        assert_eq!(store.get_room(&id).unwrap().messages.len(), 1);
    }

    #[test]
    fn clear_resets_to_genesis() {
        let store = RoomStore::new(StoreConfig::default());
        let id = store.create_room("clear").unwrap();
        for i in 0..5 {
            post(&store, &id, "alice", &format!("msg {i}"));
        }

        store.clear_messages(&id).unwrap();
        assert!(store.get_room(&id).unwrap().messages.is_empty());
        assert_eq!(store.tail_hash(&id).unwrap(), GENESIS_HASH);

        let next = post(&store, &id, "bob", "fresh start");
        assert_eq!(next.prev_hash, GENESIS_HASH);
        assert!(store.verify_room(&id).is_ok());
    }

    #[test]
    fn deleted_room_is_gone_even_for_stale_handles() {
        let store = RoomStore::new(StoreConfig::default());
        let id = store.create_room("doomed").unwrap();
        let stale = store.handle(&id).unwrap();

        store.delete_room(&id).unwrap();
        assert!(matches!(store.get_room(&id), Err(StoreError::NotFound(_))));
        assert!(matches!(lock_live(&stale, &id), Err(StoreError::NotFound(_))));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn join_records_participants_once() {
        let store = RoomStore::new(StoreConfig::default());
        let id = store.create_room("club").unwrap();
        store.join_room(&id, &SenderId::from("alice")).unwrap();
        let view = store.join_room(&id, &SenderId::from("alice")).unwrap();
        assert_eq!(view.participants, vec![SenderId::from("alice")]);

        post(&store, &id, "bob", "hi");
        assert_eq!(store.get_room(&id).unwrap().participants.len(), 2);
    }

    #[test]
    fn list_rooms_reports_counts() {
        let store = RoomStore::new(StoreConfig::default());
        let a = store.create_room("a").unwrap();
        store.create_room("b").unwrap();
        post(&store, &a, "alice", "one");
        post(&store, &a, "alice", "two");

        let rooms = store.list_rooms().unwrap();
        assert_eq!(rooms.len(), 2);
        let summary = rooms.iter().find(|r| r.id == a).unwrap();
        assert_eq!(summary.message_count, 2);
        assert_eq!(summary.participant_count, 1);
    }

    #[test]
    fn verify_room_reports_tampering() {
        let store = RoomStore::new(StoreConfig::default());
        let id = store.create_room("tamper").unwrap();
        post(&store, &id, "alice", "one");
        post(&store, &id, "bob", "two");

        let mut messages = store.get_room(&id).unwrap().messages;
        messages[1].sender_id = SenderId::from("mallory");
        store.replace_messages(&id, messages);

        match store.verify_room(&id) {
            Err(StoreError::ChainVerificationFailed(brk)) => {
                assert_eq!(brk.index, 1);
                assert_eq!(brk.kind, BreakKind::HashMismatch);
            }
            other => panic!("expected ChainVerificationFailed, got {other:?}"),
        }
    }

    #[test]
    fn purge_removes_only_idle_rooms() {
        let config = StoreConfig::default().with_room_ttl(Duration::from_secs(60));
        let store = RoomStore::new(config);
        let idle = store.create_room("idle").unwrap();
        let busy = store.create_room("busy").unwrap();

        let later = Utc::now() + chrono::Duration::seconds(30);
        assert!(store.purge_expired(later).unwrap().is_empty());

        post(&store, &busy, "alice", "still here");
        {
            let handle = store.handle(&busy).unwrap();
            handle.lock().unwrap().last_activity = Utc::now() + chrono::Duration::seconds(100);
        }

        let much_later = Utc::now() + chrono::Duration::seconds(120);
        let expired = store.purge_expired(much_later).unwrap();
        assert_eq!(expired, vec![idle.clone()]);
        assert!(matches!(store.get_room(&idle), Err(StoreError::NotFound(_))));
        assert!(store.get_room(&busy).is_ok());
    }

    #[test]
    fn purge_without_ttl_is_noop() {
        let store = RoomStore::new(StoreConfig::default());
        store.create_room("forever").unwrap();
        let far_future = Utc::now() + chrono::Duration::days(365);
        assert!(store.purge_expired(far_future).unwrap().is_empty());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn journal_round_trip_through_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.db");

        let (id, cleared, key) = {
            let journal = Arc::new(SqliteJournal::new(Database::open_at(&path).unwrap()));
            let store = RoomStore::with_journal(StoreConfig::default(), journal);
            let id = store.create_room("persisted").unwrap();
            post(&store, &id, "alice", "one");
            post(&store, &id, "bob", "two");

            let cleared = store.create_room("cleared").unwrap();
            post(&store, &cleared, "alice", "gone soon");
            store.clear_messages(&cleared).unwrap();
            post(&store, &cleared, "alice", "after clear");

            let deleted = store.create_room("deleted").unwrap();
            store.delete_room(&deleted).unwrap();

            let key = store.get_key(&id).unwrap();
            (id, cleared, key)
        };

        let journal = Arc::new(SqliteJournal::new(Database::open_at(&path).unwrap()));
        let store = RoomStore::restore(StoreConfig::default(), journal).unwrap();

        assert_eq!(store.len().unwrap(), 2);
        let view = store.get_room(&id).unwrap();
        assert_eq!(view.name, "persisted");
        assert_eq!(view.messages.len(), 2);
        assert_eq!(store.get_key(&id).unwrap(), key);
        assert!(store.verify_room(&id).is_ok());
        assert_eq!(
            view.participants,
            vec![SenderId::from("alice"), SenderId::from("bob")]
        );

        let cleared_view = store.get_room(&cleared).unwrap();
        assert_eq!(cleared_view.messages.len(), 1);
        assert_eq!(cleared_view.messages[0].prev_hash, GENESIS_HASH);

        // Appends continue on the restored tail.
        post(&store, &id, "alice", "three");
        assert!(store.verify_room(&id).is_ok());
    }

    #[test]
    fn lost_journal_write_restores_as_intact_prefix() {
        /// Drops the second message write, as a busy timeout would.
        struct Lossy(Arc<SqliteJournal>);
        impl Journal for Lossy {
            fn room_created(&self, room: &PersistedRoom) -> Result<()> {
                self.0.room_created(room)
            }
            fn participant_joined(&self, id: &RoomId, s: &SenderId, at: DateTime<Utc>) -> Result<()> {
                self.0.participant_joined(id, s, at)
            }
            fn message_appended(&self, id: &RoomId, generation: u64, seq: u64, m: &Message) -> Result<()> {
                if seq == 1 {
                    return Err(StoreError::Corrupt("database is locked".into()));
                }
                self.0.message_appended(id, generation, seq, m)
            }
            fn messages_cleared(&self, id: &RoomId, generation: u64, at: DateTime<Utc>) -> Result<()> {
                self.0.messages_cleared(id, generation, at)
            }
            fn room_deleted(&self, id: &RoomId) -> Result<()> {
                self.0.room_deleted(id)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.db");

        let (id, first) = {
            let sqlite = Arc::new(SqliteJournal::new(Database::open_at(&path).unwrap()));
            let store = RoomStore::with_journal(StoreConfig::default(), Arc::new(Lossy(sqlite)));
            let id = store.create_room("flaky disk").unwrap();
            let first = post(&store, &id, "alice", "one");
            post(&store, &id, "bob", "two");
            post(&store, &id, "alice", "three");
            (id, first)
        };

        let reopen = || {
            let journal = Arc::new(SqliteJournal::new(Database::open_at(&path).unwrap()));
            RoomStore::restore(StoreConfig::default(), journal).unwrap()
        };

        let store = reopen();
        let view = store.get_room(&id).unwrap();
        assert_eq!(view.messages, vec![first]);
        assert!(store.verify_room(&id).is_ok());

        // New messages reuse the freed slots and survive the next restart.
        post(&store, &id, "bob", "four");
        drop(store);

        let store = reopen();
        assert_eq!(store.get_room(&id).unwrap().messages.len(), 2);
        assert!(store.verify_room(&id).is_ok());
    }

    #[test]
    fn journal_failure_does_not_block_memory() {
        struct Broken;
        impl Journal for Broken {
            fn room_created(&self, _: &PersistedRoom) -> Result<()> {
                Err(StoreError::Corrupt("disk on fire".into()))
            }
            fn participant_joined(&self, _: &RoomId, _: &SenderId, _: DateTime<Utc>) -> Result<()> {
                Err(StoreError::Corrupt("disk on fire".into()))
            }
            fn message_appended(&self, _: &RoomId, _: u64, _: u64, _: &Message) -> Result<()> {
                Err(StoreError::Corrupt("disk on fire".into()))
            }
            fn messages_cleared(&self, _: &RoomId, _: u64, _: DateTime<Utc>) -> Result<()> {
                Err(StoreError::Corrupt("disk on fire".into()))
            }
            fn room_deleted(&self, _: &RoomId) -> Result<()> {
                Err(StoreError::Corrupt("disk on fire".into()))
            }
        }

        let store = RoomStore::with_journal(StoreConfig::default(), Arc::new(Broken));
        let id = store.create_room("volatile").unwrap();
        post(&store, &id, "alice", "still works");
        assert_eq!(store.get_room(&id).unwrap().messages.len(), 1);
    }

    #[test]
    fn wrong_key_message_still_chains() {
        let store = RoomStore::new(StoreConfig::default());
        let id = store.create_room("foreign").unwrap();
        let other_key = generate_symmetric_key();

        // A message sealed under the wrong key still chains correctly.
        let msg = next_message("x", &SenderId::from("a"), &other_key, GENESIS_HASH, Utc::now()).unwrap();
        store.append_message(&id, msg).unwrap();
        assert!(store.verify_room(&id).is_ok());
    }
}
