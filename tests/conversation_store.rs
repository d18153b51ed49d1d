use std::sync::Arc;

use murmur::{
    db::{
        SqlChatStore,
        models::{ReadOutcome, User},
    },
    error::StoreError,
    room::RoomKey,
    store::{ConversationStore, PresenceTracker},
};
use rstest::rstest;
use tempfile::TempDir;

async fn store_with(usernames: &[&str]) -> (SqlChatStore, Vec<User>) {
    let store = SqlChatStore::in_memory().await.unwrap();
    let mut users = Vec::new();
    for name in usernames {
        users.push(store.register_user(name).await.unwrap());
    }
    (store, users)
}

#[tokio::test]
async fn get_or_create_is_order_independent() {
    let (store, users) = store_with(&["alice", "bob"]).await;
    let (alice, bob) = (&users[0], &users[1]);

    let first = store.get_or_create(bob.id, alice.id).await.unwrap();
    let second = store.get_or_create(alice.id, bob.id).await.unwrap();

    assert_eq!(first.id, second.id);
    assert!(first.user_low < first.user_high);
    assert_eq!(first.room(), RoomKey::new(alice.id, bob.id));
}

#[tokio::test]
async fn concurrent_first_contact_creates_one_conversation() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("chat.db").display());
    let store = Arc::new(SqlChatStore::connect(&url, 4).await.unwrap());
    let alice = store.register_user("alice").await.unwrap();
    let bob = store.register_user("bob").await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        let (a, b) = if i % 2 == 0 {
            (alice.id, bob.id)
        } else {
            (bob.id, alice.id)
        };
        tasks.push(tokio::spawn(async move { store.get_or_create(a, b).await }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn self_conversation_is_refused() {
    let (store, users) = store_with(&["alice"]).await;

    let err = store.get_or_create(users[0].id, users[0].id).await.unwrap_err();
    assert!(matches!(err, StoreError::SelfConversation(id) if id == users[0].id));
}

#[tokio::test]
async fn messages_come_back_in_timestamp_order() {
    let (store, users) = store_with(&["alice", "bob"]).await;
    let (alice, bob) = (&users[0], &users[1]);
    let conversation = store.get_or_create(alice.id, bob.id).await.unwrap();

    for i in 0..10 {
        let sender = if i % 3 == 0 { bob.id } else { alice.id };
        store
            .append_message(&conversation, sender, &format!("message {i}"))
            .await
            .unwrap();
    }

    let messages = store.messages(conversation.id).await.unwrap();
    assert_eq!(messages.len(), 10);
    assert!(messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(messages[0].content, "message 0");
    assert_eq!(messages[9].content, "message 9");

    let refreshed = store.find(alice.id, bob.id).await.unwrap().unwrap();
    assert_eq!(refreshed.updated_at, messages[9].timestamp);
}

#[rstest]
#[case::empty(String::new())]
#[case::too_long("a".repeat(2001))]
#[tokio::test]
async fn invalid_content_is_refused(#[case] content: String) {
    let (store, users) = store_with(&["alice", "bob"]).await;
    let conversation = store.get_or_create(users[0].id, users[1].id).await.unwrap();

    let err = store
        .append_message(&conversation, users[0].id, &content)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidContent));
}

#[tokio::test]
async fn length_bound_counts_characters_not_bytes() {
    let (store, users) = store_with(&["alice", "bob"]).await;
    let conversation = store.get_or_create(users[0].id, users[1].id).await.unwrap();

    let wide = "é".repeat(2000);
    let stored = store
        .append_message(&conversation, users[0].id, &wide)
        .await
        .unwrap();
    assert_eq!(stored.content.chars().count(), 2000);
}

#[tokio::test]
async fn outsider_cannot_append() {
    let (store, users) = store_with(&["alice", "bob", "mallory"]).await;
    let conversation = store.get_or_create(users[0].id, users[1].id).await.unwrap();

    let err = store
        .append_message(&conversation, users[2].id, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotParticipant { .. }));
}

#[tokio::test]
async fn mark_read_flips_once() {
    let (store, users) = store_with(&["alice", "bob"]).await;
    let (alice, bob) = (&users[0], &users[1]);
    let room = RoomKey::new(alice.id, bob.id);
    let conversation = store.get_or_create(alice.id, bob.id).await.unwrap();
    let message = store
        .append_message(&conversation, alice.id, "hi")
        .await
        .unwrap();

    let first = store.mark_read(message.id, bob.id, room).await.unwrap();
    let ReadOutcome::Marked { read_at } = first else {
        panic!("expected the first read to mark, got {first:?}");
    };
    assert_eq!(
        store.mark_read(message.id, bob.id, room).await.unwrap(),
        ReadOutcome::AlreadyRead
    );

    let stored = &store.messages(conversation.id).await.unwrap()[0];
    assert!(stored.is_read);
    assert_eq!(stored.read_at, Some(read_at));
}

#[tokio::test]
async fn sender_cannot_mark_own_message() {
    let (store, users) = store_with(&["alice", "bob"]).await;
    let (alice, bob) = (&users[0], &users[1]);
    let conversation = store.get_or_create(alice.id, bob.id).await.unwrap();
    let message = store
        .append_message(&conversation, alice.id, "hi")
        .await
        .unwrap();

    let outcome = store
        .mark_read(message.id, alice.id, conversation.room())
        .await
        .unwrap();
    assert_eq!(outcome, ReadOutcome::OwnMessage);
    assert!(!store.messages(conversation.id).await.unwrap()[0].is_read);
}

#[rstest]
#[case::unknown_id(9_999, false)]
#[case::other_room(0, true)]
#[tokio::test]
async fn unresolvable_reads_are_not_found(#[case] id: i64, #[case] use_foreign: bool) {
    let (store, users) = store_with(&["alice", "bob", "carol"]).await;
    let (alice, bob, carol) = (&users[0], &users[1], &users[2]);
    let foreign = store.get_or_create(bob.id, carol.id).await.unwrap();
    let message = store
        .append_message(&foreign, carol.id, "not for alice")
        .await
        .unwrap();

    let target = if use_foreign { message.id } else { id };
    let outcome = store
        .mark_read(target, bob.id, RoomKey::new(alice.id, bob.id))
        .await
        .unwrap();

    assert_eq!(outcome, ReadOutcome::NotFound);
    assert!(!outcome.resolved());
}

#[tokio::test]
async fn summaries_list_newest_activity_first() {
    let (store, users) = store_with(&["alice", "bob", "carol"]).await;
    let (alice, bob, carol) = (&users[0], &users[1], &users[2]);

    let with_bob = store.get_or_create(alice.id, bob.id).await.unwrap();
    let with_carol = store.get_or_create(alice.id, carol.id).await.unwrap();
    store.append_message(&with_bob, bob.id, "one").await.unwrap();
    store.append_message(&with_bob, bob.id, "two").await.unwrap();
    store.append_message(&with_bob, alice.id, "mine").await.unwrap();
    store.append_message(&with_carol, carol.id, "latest").await.unwrap();
    store.set_online(carol.id, true).await.unwrap();

    let summaries = store.conversations_for(alice.id).await.unwrap();
    assert_eq!(summaries.len(), 2);

    assert_eq!(summaries[0].conversation.id, with_carol.id);
    assert_eq!(summaries[0].peer, *carol);
    assert!(summaries[0].peer_online);
    assert_eq!(summaries[0].unread_count, 1);
    assert_eq!(
        summaries[0].last_message.as_ref().map(|m| m.content.as_str()),
        Some("latest")
    );

    assert_eq!(summaries[1].peer, *bob);
    assert!(!summaries[1].peer_online);
    assert_eq!(summaries[1].unread_count, 2);
    assert_eq!(
        summaries[1].last_message.as_ref().map(|m| m.content.as_str()),
        Some("mine")
    );

    let for_bob = store.conversations_for(bob.id).await.unwrap();
    assert_eq!(for_bob.len(), 1);
    assert_eq!(for_bob[0].peer, *alice);
    assert_eq!(for_bob[0].unread_count, 1);
}

#[tokio::test]
async fn deleting_a_conversation_removes_its_messages() {
    let (store, users) = store_with(&["alice", "bob"]).await;
    let conversation = store.get_or_create(users[0].id, users[1].id).await.unwrap();
    store
        .append_message(&conversation, users[0].id, "ephemeral")
        .await
        .unwrap();

    sqlx::query("DELETE FROM conversations WHERE id = ?")
        .bind(conversation.id)
        .execute(store.pool())
        .await
        .unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
