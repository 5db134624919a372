use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, Utc};

use darkrelay_shared::chain::{decrypt_message, next_message, verify_chain};
use darkrelay_shared::constants::GENESIS_HASH;
use darkrelay_shared::crypto::generate_symmetric_key;
use darkrelay_shared::{CryptoError, SenderId};
use darkrelay_store::conversation::{post_message, read_transcript, ChainStatus};
use darkrelay_store::{RoomStore, StoreConfig, StoreError};

#[test]
fn basic_conversation() {
    let store = RoomStore::new(StoreConfig::default());
    let id = store.create_room("Test").unwrap();

    post_message(&store, &id, &SenderId::from("A"), "hello").unwrap();
    post_message(&store, &id, &SenderId::from("B"), "world").unwrap();

    let view = store.get_room(&id).unwrap();
    assert_eq!(view.messages.len(), 2);
    assert_eq!(verify_chain(&view.messages), Ok(()));

    let key = store.get_key(&id).unwrap();
    assert_eq!(decrypt_message(&view.messages[0], &key).unwrap(), "hello");
    assert_eq!(decrypt_message(&view.messages[1], &key).unwrap(), "world");
    assert_eq!(view.messages[1].prev_hash, view.messages[0].hash);
}

#[test]
fn long_chain_round_trip() {
    let store = RoomStore::new(StoreConfig::default());
    let id = store.create_room("long").unwrap();

    for i in 0..50 {
        let sender = SenderId::from(if i % 2 == 0 { "A" } else { "B" });
        post_message(&store, &id, &sender, &format!("message {i}")).unwrap();
    }

    let view = store.get_room(&id).unwrap();
    assert_eq!(view.messages.len(), 50);
    assert_eq!(verify_chain(&view.messages), Ok(()));
    assert_eq!(view.messages[0].prev_hash, GENESIS_HASH);
}

#[test]
fn tampering_any_field_is_located() {
    let store = RoomStore::new(StoreConfig::default());
    let id = store.create_room("tamper").unwrap();
    for text in ["one", "two", "three", "four"] {
        post_message(&store, &id, &SenderId::from("A"), text).unwrap();
    }
    let chain = store.get_room(&id).unwrap().messages;

    let mut ciphertext = chain.clone();
    ciphertext[2].ciphertext = ciphertext[1].ciphertext.clone();
    assert_eq!(verify_chain(&ciphertext).unwrap_err().index, 2);

    let mut timestamp = chain.clone();
    timestamp[1].timestamp = timestamp[1].timestamp - Duration::milliseconds(1);
    assert_eq!(verify_chain(&timestamp).unwrap_err().index, 1);

    let mut sender = chain.clone();
    sender[3].sender_id = SenderId::from("B");
    assert_eq!(verify_chain(&sender).unwrap_err().index, 3);

    let mut hash = chain.clone();
    hash[0].hash = chain[1].hash.clone();
    assert_eq!(verify_chain(&hash).unwrap_err().index, 0);
}

#[test]
fn wrong_key_never_yields_plaintext() {
    let store = RoomStore::new(StoreConfig::default());
    let a = store.create_room("a").unwrap();
    let b = store.create_room("b").unwrap();

    let msg = post_message(&store, &a, &SenderId::from("A"), "for room a only").unwrap();

    let other_room_key = store.get_key(&b).unwrap();
    assert_eq!(
        decrypt_message(&msg, &other_room_key),
        Err(CryptoError::DecryptionFailed)
    );
    assert_eq!(
        decrypt_message(&msg, &generate_symmetric_key()),
        Err(CryptoError::DecryptionFailed)
    );
}

#[test]
fn clear_then_continue() {
    let store = RoomStore::new(StoreConfig::default());
    let id = store.create_room("reset").unwrap();
    for i in 0..5 {
        post_message(&store, &id, &SenderId::from("A"), &format!("old {i}")).unwrap();
    }
    let old_tail = store.tail_hash(&id).unwrap();

    store.clear_messages(&id).unwrap();
    assert_eq!(store.get_room(&id).unwrap().messages.len(), 0);

    let next = post_message(&store, &id, &SenderId::from("B"), "new").unwrap();
    assert_eq!(next.prev_hash, GENESIS_HASH);
    assert_ne!(next.prev_hash, old_tail);
    assert!(read_transcript(&store, &id).unwrap().is_intact());
}

#[test]
fn stale_append_after_clear_is_rejected() {
    let store = RoomStore::new(StoreConfig::default());
    let id = store.create_room("reset").unwrap();
    post_message(&store, &id, &SenderId::from("A"), "before").unwrap();

    let key = store.get_key(&id).unwrap();
    let stale_tail = store.tail_hash(&id).unwrap();
    store.clear_messages(&id).unwrap();

    let stale = next_message("late", &SenderId::from("B"), &key, &stale_tail, Utc::now()).unwrap();
    assert!(matches!(
        store.append_message(&id, stale),
        Err(StoreError::ChainMismatch { .. })
    ));
}

#[test]
fn concurrent_senders_all_land_exactly_once() {
    const SENDERS: usize = 16;

    // A sender only loses a race to another sender's successful append, and
    // each sender appends once, so SENDERS attempts always suffice.
    let config = StoreConfig::default().with_append_attempts(SENDERS as u32);
    let store = Arc::new(RoomStore::new(config));
    let id = store.create_room("busy").unwrap();
    let barrier = Arc::new(Barrier::new(SENDERS));

    let handles: Vec<_> = (0..SENDERS)
        .map(|i| {
            let store = Arc::clone(&store);
            let id = id.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let sender = SenderId::from(format!("sender-{i}"));
                barrier.wait();
                post_message(&store, &id, &sender, &format!("payload {i}"))
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let transcript = read_transcript(&store, &id).unwrap();
    assert_eq!(transcript.chain, ChainStatus::Intact);
    assert_eq!(transcript.entries.len(), SENDERS);

    let mut bodies: Vec<String> = transcript
        .entries
        .iter()
        .map(|e| e.body.display().to_string())
        .collect();
    bodies.sort();
    bodies.dedup();
    assert_eq!(bodies.len(), SENDERS);
}

#[test]
fn unrelated_rooms_do_not_interfere() {
    let store = Arc::new(RoomStore::new(StoreConfig::default()));
    let rooms: Vec<_> = (0..4)
        .map(|i| store.create_room(&format!("room {i}")).unwrap())
        .collect();

    thread::scope(|scope| {
        for id in &rooms {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for n in 0..20 {
                    post_message(&store, id, &SenderId::from("solo"), &format!("{n}")).unwrap();
                }
            });
        }
    });

    for id in &rooms {
        let view = store.get_room(id).unwrap();
        assert_eq!(view.messages.len(), 20);
        assert_eq!(verify_chain(&view.messages), Ok(()));
    }
}

#[test]
fn forged_hash_refused_at_append() {
    let store = RoomStore::new(StoreConfig::default());
    let id = store.create_room("audit").unwrap();
    post_message(&store, &id, &SenderId::from("A"), "fine").unwrap();

    let key = store.get_key(&id).unwrap();
    // A message whose prev_hash claims the tail but whose hash was forged is
    // refused at the door.
    let tail = store.tail_hash(&id).unwrap();
    let mut forged = next_message("forged", &SenderId::from("M"), &key, &tail, Utc::now()).unwrap();
    forged.sender_id = SenderId::from("A");
    assert!(matches!(
        store.append_message(&id, forged),
        Err(StoreError::InvalidMessageHash)
    ));
    assert!(store.verify_room(&id).is_ok());
}
