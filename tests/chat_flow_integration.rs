//! End-to-end chat flows over the in-memory adapters.
//!
//! These tests wire the application services the way the server does and
//! drive them through the transport hooks:
//! 1. Direct messages reach every handle of the receiver and echo to the sender
//! 2. Assistant exchanges land in the conversation's history
//! 3. Presence is announced once per user, not per device
//! 4. History pages walk the whole conversation without gaps

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

use parley::adapters::ai::MockAIProvider;
use parley::adapters::memory::{InMemoryConversationStore, InMemoryUserDirectory};
use parley::adapters::registry::InMemoryConnectionRegistry;
use parley::application::{
    AskAssistantCommand, AskAssistantHandler, AskOutcome, AssistantPolicy, ConversationLanes,
    GetHistoryHandler, GetHistoryQuery, HandlerError, HistoryOutcome, HistoryView,
    MessageDispatcher, PresenceTracker, SendMessageCommand, SendMessageHandler, SendOutcome,
};
use parley::domain::assistant::{AssistantIdentity, DEFAULT_FALLBACK_TEXT};
use parley::domain::foundation::{ConnectionId, MessageId, Timestamp, UserId};
use parley::domain::messaging::{
    ConversationPair, HistoryCursor, Message, MessageOrigin, OutboundEvent, PresenceEvent,
    UserProfile,
};
use parley::ports::{ConnectionHandle, ConversationStore};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct World {
    presence: PresenceTracker,
    send_handler: Arc<SendMessageHandler>,
    ask_handler: AskAssistantHandler,
    history_handler: GetHistoryHandler,
    store: InMemoryConversationStore,
    directory: InMemoryUserDirectory,
    alice: UserId,
    bob: UserId,
    assistant: UserId,
}

fn world(provider: MockAIProvider, policy: AssistantPolicy) -> World {
    let (alice, bob, assistant) = (UserId::new(), UserId::new(), UserId::new());
    let directory = InMemoryUserDirectory::new()
        .with_user(UserProfile::new(alice, "alice@x.io", "Alice"))
        .with_user(UserProfile::new(bob, "bob@x.io", "Bob"))
        .with_user(UserProfile::new(assistant, "ai@chatapp.system", "AI Assistant"));
    let store = InMemoryConversationStore::new();
    let registry = Arc::new(InMemoryConnectionRegistry::new());
    let dispatcher = MessageDispatcher::new(registry.clone());
    let lanes = ConversationLanes::new();

    World {
        presence: PresenceTracker::new(
            registry,
            dispatcher.clone(),
            Arc::new(directory.clone()),
        ),
        send_handler: Arc::new(SendMessageHandler::new(
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
            dispatcher.clone(),
            lanes.clone(),
        )),
        ask_handler: AskAssistantHandler::new(
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
            Arc::new(provider),
            dispatcher,
            lanes,
            AssistantIdentity::new(assistant, "AI Assistant"),
            policy,
        ),
        history_handler: GetHistoryHandler::new(
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
        ),
        store,
        directory,
        alice,
        bob,
        assistant,
    }
}

fn default_world() -> World {
    world(MockAIProvider::new().with_response("4"), AssistantPolicy::default())
}

impl World {
    /// Opens a connection and discards its greeting.
    async fn connect(&self, user: UserId) -> (ConnectionId, Receiver<OutboundEvent>) {
        let (handle, mut rx) = ConnectionHandle::channel(user, 256);
        let id = handle.id.clone();
        self.presence.connect(handle).await;
        assert!(matches!(rx.try_recv(), Ok(OutboundEvent::Connected { .. })));
        (id, rx)
    }

    async fn send(&self, from: UserId, to: UserId, text: &str) -> SendOutcome {
        self.send_handler
            .handle(SendMessageCommand {
                sender_id: from,
                receiver_id: to.to_string(),
                content: text.to_string(),
            })
            .await
            .unwrap()
    }

    async fn ask(&self, question: &str) -> Result<AskOutcome, HandlerError> {
        self.ask_handler
            .handle(
                AskAssistantCommand {
                    asker_id: self.alice,
                    partner_id: self.bob.to_string(),
                    question: question.to_string(),
                },
                CancellationToken::new(),
            )
            .await
    }

    async fn page(&self, user: UserId, partner: UserId, limit: usize) -> HistoryView {
        self.page_before(user, partner, None, None, limit).await
    }

    async fn page_before(
        &self,
        user: UserId,
        partner: UserId,
        before: Option<Timestamp>,
        before_seq: Option<i64>,
        limit: usize,
    ) -> HistoryView {
        let query = GetHistoryQuery {
            user_id: user,
            partner_id: partner.to_string(),
            before,
            before_seq,
            limit: Some(limit),
        };
        match self.history_handler.handle(query).await.unwrap() {
            HistoryOutcome::Page(view) => view,
            HistoryOutcome::Rejected(reason) => panic!("history rejected: {}", reason),
        }
    }
}

/// Drains queued events, keeping only delivered messages.
fn messages(rx: &mut Receiver<OutboundEvent>) -> Vec<Message> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let OutboundEvent::MessageReceived(delivered) = event {
            out.push(delivered.message);
        }
    }
    out
}

/// Drains queued events, keeping only presence notifications.
fn presence_events(rx: &mut Receiver<OutboundEvent>) -> Vec<PresenceEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let OutboundEvent::Presence(p) = event {
            out.push(p);
        }
    }
    out
}

// =============================================================================
// Direct messages
// =============================================================================

#[tokio::test]
async fn message_reaches_receiver_once_and_echoes_to_sender() {
    let w = default_world();
    let (_, mut rx_alice) = w.connect(w.alice).await;
    let (_, mut rx_bob) = w.connect(w.bob).await;
    presence_events(&mut rx_alice);

    let SendOutcome::Sent(sent) = w.send(w.alice, w.bob, "hi").await else {
        panic!("send rejected");
    };

    let to_bob = messages(&mut rx_bob);
    assert_eq!(to_bob.len(), 1);
    assert_eq!(to_bob[0].content(), "hi");
    assert_eq!(to_bob[0].sender_id(), w.alice);

    let to_alice = messages(&mut rx_alice);
    assert_eq!(to_alice.len(), 1);
    assert_eq!(to_alice[0].id(), sent.message.id());
}

#[tokio::test]
async fn message_fans_out_to_every_receiver_device() {
    let w = default_world();
    let (_, mut alice_phone) = w.connect(w.alice).await;
    let (_, mut alice_laptop) = w.connect(w.alice).await;
    let (_, mut rx_bob) = w.connect(w.bob).await;

    w.send(w.bob, w.alice, "dinner?").await;

    let phone = messages(&mut alice_phone);
    let laptop = messages(&mut alice_laptop);
    assert_eq!(phone.len(), 1);
    assert_eq!(laptop.len(), 1);
    assert_eq!(phone[0].id(), laptop[0].id());

    let echo = messages(&mut rx_bob);
    assert_eq!(echo.len(), 1);
    assert_eq!(echo[0].sender_id(), w.bob);
}

#[tokio::test]
async fn offline_receiver_finds_message_in_history() {
    let w = default_world();
    let (_, mut rx_alice) = w.connect(w.alice).await;

    w.send(w.alice, w.bob, "are you there?").await;
    assert_eq!(messages(&mut rx_alice).len(), 1);

    let (_, mut rx_bob) = w.connect(w.bob).await;
    assert!(messages(&mut rx_bob).is_empty());

    let page = w.page(w.bob, w.alice, 20).await;
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].message.content(), "are you there?");
    assert_eq!(page.items[0].sender_display_name, "Alice");
}

#[tokio::test]
async fn concurrent_sends_arrive_in_history_order() {
    let w = Arc::new(default_world());
    let (_, mut rx_bob) = w.connect(w.bob).await;

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let w = w.clone();
            tokio::spawn(async move {
                let (from, to) = if i % 2 == 0 { (w.alice, w.bob) } else { (w.bob, w.alice) };
                w.send(from, to, &format!("m{}", i)).await
            })
        })
        .collect();
    for task in tasks {
        assert!(matches!(task.await.unwrap(), SendOutcome::Sent(_)));
    }

    let live: Vec<MessageId> = messages(&mut rx_bob).iter().map(|m| m.id()).collect();
    let mut stored: Vec<MessageId> = w
        .page(w.bob, w.alice, 100)
        .await
        .items
        .iter()
        .map(|d| d.message.id())
        .collect();
    stored.reverse();

    assert_eq!(live.len(), 20);
    assert_eq!(live, stored);
}

// =============================================================================
// Assistant
// =============================================================================

#[tokio::test]
async fn assistant_exchange_lands_in_conversation_history() {
    let w = default_world();
    let (_, mut rx_alice) = w.connect(w.alice).await;
    let (_, mut rx_bob) = w.connect(w.bob).await;
    presence_events(&mut rx_alice);

    let AskOutcome::Answered(exchange) = w.ask("What is 2+2?").await.unwrap() else {
        panic!("query rejected");
    };
    assert!(!exchange.used_fallback);

    let page = w.page(w.alice, w.bob, 20).await;
    assert_eq!(page.items.len(), 3);

    let question: Vec<_> = page.items.iter().filter(|d| d.message.sender_id() == w.alice).collect();
    assert_eq!(question.len(), 1);
    assert_eq!(question[0].message.content(), "(Question for AI): What is 2+2?");

    let answers: Vec<_> = page
        .items
        .iter()
        .filter(|d| d.message.origin() == MessageOrigin::Assistant)
        .collect();
    assert_eq!(answers.len(), 2);
    assert!(answers.iter().all(|d| d.message.sender_id() == w.assistant));
    assert!(answers.iter().all(|d| d.message.content() == "4"));
    let addressees: HashSet<UserId> = answers.iter().map(|d| d.message.receiver_id()).collect();
    assert_eq!(addressees, HashSet::from([w.alice, w.bob]));

    // Each member sees the question once and only their own answer copy
    let alice_live = messages(&mut rx_alice);
    let bob_live = messages(&mut rx_bob);
    assert_eq!(alice_live.len(), 2);
    assert_eq!(bob_live.len(), 2);
    assert_eq!(alice_live[1].receiver_id(), w.alice);
    assert_eq!(bob_live[1].receiver_id(), w.bob);
}

#[tokio::test]
async fn assistant_timeout_answers_with_fallback_and_keeps_question() {
    let policy = AssistantPolicy {
        timeout: Duration::from_millis(50),
        ..AssistantPolicy::default()
    };
    let w = world(
        MockAIProvider::new().with_delay(Duration::from_secs(60)),
        policy,
    );

    let AskOutcome::Answered(exchange) = w.ask("Still there?").await.unwrap() else {
        panic!("query rejected");
    };
    assert!(exchange.used_fallback);
    assert_eq!(exchange.answer_to_asker.message.content(), DEFAULT_FALLBACK_TEXT);
    assert_eq!(exchange.answer_to_partner.message.content(), DEFAULT_FALLBACK_TEXT);

    let stored = w.store.all().await;
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().any(|m| m.id() == exchange.question.message.id()));
}

#[tokio::test]
async fn failed_commit_leaves_no_trace() {
    let w = default_world();
    let (_, mut rx_bob) = w.connect(w.bob).await;
    w.store.fail_after_appends(1);

    let result = w.ask("What is 2+2?").await;

    assert!(matches!(result, Err(HandlerError::Store(_))));
    assert!(w.store.is_empty().await);
    assert!(messages(&mut rx_bob).is_empty());
    assert!(w.page(w.alice, w.bob, 20).await.items.is_empty());
}

// =============================================================================
// Presence
// =============================================================================

#[tokio::test]
async fn presence_follows_the_last_device() {
    let w = default_world();
    let (_, mut rx_bob) = w.connect(w.bob).await;

    let (phone, _rx_phone) = w.connect(w.alice).await;
    let (laptop, _rx_laptop) = w.connect(w.alice).await;
    assert_eq!(presence_events(&mut rx_bob), vec![PresenceEvent::online(w.alice)]);

    w.presence.disconnect(&phone).await;
    assert!(presence_events(&mut rx_bob).is_empty());
    assert!(w.presence.is_online(w.alice));
    assert!(w.directory.last_seen_of(w.alice).await.is_none());

    w.presence.disconnect(&laptop).await;
    assert_eq!(presence_events(&mut rx_bob), vec![PresenceEvent::offline(w.alice)]);
    assert!(!w.presence.is_online(w.alice));
    assert!(w.directory.last_seen_of(w.alice).await.is_some());

    // A repeated close is a no-op
    w.presence.disconnect(&laptop).await;
    assert!(presence_events(&mut rx_bob).is_empty());
}

#[tokio::test]
async fn new_connection_learns_who_is_already_online() {
    let w = default_world();
    let (_, _rx_bob) = w.connect(w.bob).await;

    let (handle, mut rx) = ConnectionHandle::channel(w.alice, 8);
    w.presence.connect(handle).await;

    match rx.try_recv() {
        Ok(OutboundEvent::Connected { online_users, .. }) => assert_eq!(online_users, vec![w.bob]),
        other => panic!("expected greeting, got {:?}", other),
    }
}

#[tokio::test]
async fn slow_receiver_is_cut_off_and_catches_up_from_history() {
    let w = default_world();
    let (_, _rx_alice) = w.connect(w.alice).await;
    let (bob_handle, mut rx_bob) = ConnectionHandle::channel(w.bob, 2);
    w.presence.connect(bob_handle.clone()).await;
    assert!(matches!(rx_bob.try_recv(), Ok(OutboundEvent::Connected { .. })));

    for text in ["one", "two", "three"] {
        w.send(w.alice, w.bob, text).await;
    }

    // Two fit, the third overflows and closes the handle
    assert_eq!(messages(&mut rx_bob).len(), 2);
    assert!(bob_handle.is_closed());
    w.send(w.alice, w.bob, "four").await;
    assert!(messages(&mut rx_bob).is_empty());

    w.presence.disconnect(&bob_handle.id).await;
    assert!(!w.presence.is_online(w.bob));
    let history = w.page(w.bob, w.alice, 20).await;
    assert_eq!(history.items.len(), 4);
}

// =============================================================================
// History paging
// =============================================================================

async fn seed(store: &InMemoryConversationStore, a: UserId, b: UserId, offsets: &[i64]) {
    let pair = ConversationPair::new(a, b).unwrap();
    let base = Timestamp::parse_rfc3339("2024-01-15T10:00:00Z").unwrap();
    for (i, offset) in offsets.iter().enumerate() {
        let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
        let message = Message::reconstitute(
            MessageId::new(),
            from,
            to,
            pair,
            format!("m{}", i),
            base.plus_millis(*offset),
            MessageOrigin::Human,
            false,
        );
        store.append(&message).await.unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn paging_visits_every_message_once(
        offsets in prop::collection::vec(0i64..5, 0..30),
        limit in 1usize..7,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (seen, total) = runtime.block_on(async {
            let w = default_world();
            seed(&w.store, w.alice, w.bob, &offsets).await;

            let mut seen = Vec::new();
            let mut cursor: Option<HistoryCursor> = None;
            loop {
                let (before, before_seq) = match cursor {
                    Some(c) => (Some(c.before), c.before_seq),
                    None => (None, None),
                };
                let page = w.page_before(w.alice, w.bob, before, before_seq, limit).await;
                seen.extend(page.items.iter().map(|d| d.message.id()));
                if !page.has_more {
                    break;
                }
                cursor = page.next_cursor;
            }
            (seen, w.store.len().await)
        });

        let unique: HashSet<MessageId> = seen.iter().copied().collect();
        prop_assert_eq!(unique.len(), seen.len());
        prop_assert_eq!(seen.len(), total);
    }
}
