//! MessageDispatcher - Fan-out of events to live connections.
//!
//! Delivery is best-effort per handle: a dead handle is skipped and never
//! stops delivery to the others. A saturated handle is closed by the push,
//! so its transport ends the session instead of silently missing events.
//! A user with no handles simply gets nothing live; history covers it on
//! reconnect.
//!
//! Each handle owns one FIFO channel, so events pushed by one caller reach a
//! connection in the order they were pushed.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::messaging::{DeliveredMessage, OutboundEvent, PresenceEvent};
use crate::ports::{ConnectionRegistry, DeliveryError};

/// Counts for one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryReport {
    /// True when the target had no live handle at all.
    pub fn is_offline(&self) -> bool {
        self.delivered == 0 && self.failed == 0
    }

    fn merge(self, other: DeliveryReport) -> Self {
        Self {
            delivered: self.delivered + other.delivered,
            failed: self.failed + other.failed,
        }
    }
}

/// Pushes events to every live handle of a user.
#[derive(Clone)]
pub struct MessageDispatcher {
    registry: Arc<dyn ConnectionRegistry>,
}

impl MessageDispatcher {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Delivers `event` to every handle of `user_id`.
    pub fn deliver_to_user(&self, user_id: UserId, event: &OutboundEvent) -> DeliveryReport {
        let handles = self.registry.handles_of(user_id);
        let mut report = DeliveryReport::default();

        for handle in handles {
            match handle.push(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Full) => {
                    report.failed += 1;
                    tracing::warn!(
                        connection_id = %handle.id,
                        user_id = %user_id,
                        "Closing connection that is not keeping up"
                    );
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::debug!(
                        connection_id = %handle.id,
                        user_id = %user_id,
                        error = %err,
                        "Skipping handle during delivery"
                    );
                }
            }
        }

        report
    }

    /// Re-delivers a sender's own message to all of the sender's handles,
    /// including the one it was sent from.
    pub fn echo_to_sender(&self, sender_id: UserId, event: &OutboundEvent) -> DeliveryReport {
        self.deliver_to_user(sender_id, event)
    }

    /// Delivers a stored message to its receiver and echoes it to its sender.
    pub fn deliver_message(&self, delivered: &DeliveredMessage) -> DeliveryReport {
        let receiver = delivered.message.receiver_id();
        let sender = delivered.message.sender_id();
        let event = OutboundEvent::message(delivered.clone());

        let to_receiver = self.deliver_to_user(receiver, &event);
        if to_receiver.is_offline() {
            tracing::debug!(
                message_id = %delivered.message.id(),
                receiver_id = %receiver,
                "Receiver offline; message stored only"
            );
        }
        to_receiver.merge(self.echo_to_sender(sender, &event))
    }

    /// Delivers a presence event to every connected user except its subject.
    pub fn broadcast_presence(&self, event: PresenceEvent) -> DeliveryReport {
        let outbound = OutboundEvent::Presence(event);
        self.registry
            .online_users()
            .into_iter()
            .filter(|user| *user != event.user_id)
            .map(|user| self.deliver_to_user(user, &outbound))
            .fold(DeliveryReport::default(), DeliveryReport::merge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::registry::InMemoryConnectionRegistry;
    use crate::domain::messaging::Message;
    use crate::ports::ConnectionHandle;

    fn setup() -> (Arc<InMemoryConnectionRegistry>, MessageDispatcher) {
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let dispatcher = MessageDispatcher::new(registry.clone());
        (registry, dispatcher)
    }

    fn delivered(sender: UserId, receiver: UserId, text: &str) -> DeliveredMessage {
        DeliveredMessage {
            message: Message::new(sender, receiver, text).unwrap(),
            sender_display_name: "Sender".into(),
            sender_avatar_url: None,
        }
    }

    #[tokio::test]
    async fn delivers_to_every_handle_of_user() {
        let (registry, dispatcher) = setup();
        let alice = UserId::new();
        let (h1, mut rx1) = ConnectionHandle::channel(alice, 8);
        let (h2, mut rx2) = ConnectionHandle::channel(alice, 8);
        registry.register(h1);
        registry.register(h2);

        let msg = delivered(UserId::new(), alice, "hi");
        let report = dispatcher.deliver_to_user(alice, &OutboundEvent::message(msg.clone()));

        assert_eq!(report.delivered, 2);
        assert_eq!(rx1.recv().await, Some(OutboundEvent::message(msg.clone())));
        assert_eq!(rx2.recv().await, Some(OutboundEvent::message(msg)));
    }

    #[test]
    fn dead_handle_does_not_block_others() {
        let (registry, dispatcher) = setup();
        let alice = UserId::new();
        let (dead, dead_rx) = ConnectionHandle::channel(alice, 8);
        let (live, mut live_rx) = ConnectionHandle::channel(alice, 8);
        registry.register(dead);
        registry.register(live);
        drop(dead_rx);

        let report = dispatcher.deliver_to_user(
            alice,
            &OutboundEvent::Presence(PresenceEvent::online(UserId::new())),
        );

        assert_eq!(report, DeliveryReport { delivered: 1, failed: 1 });
        assert!(live_rx.try_recv().is_ok());
    }

    #[test]
    fn saturated_handle_is_closed_not_skipped() {
        let (registry, dispatcher) = setup();
        let bob = UserId::new();
        let (slow, mut slow_rx) = ConnectionHandle::channel(bob, 2);
        let (fast, mut fast_rx) = ConnectionHandle::channel(bob, 8);
        registry.register(slow.clone());
        registry.register(fast);

        let sent: Vec<_> = (0..4)
            .map(|i| delivered(UserId::new(), bob, &format!("m{}", i)))
            .collect();
        let reports: Vec<_> = sent
            .iter()
            .map(|d| dispatcher.deliver_to_user(bob, &OutboundEvent::message(d.clone())))
            .collect();

        assert_eq!(reports[2], DeliveryReport { delivered: 1, failed: 1 });
        assert!(slow.is_closed());

        // The slow handle keeps what it had and nothing after the gap
        let mut slow_ids = Vec::new();
        while let Ok(event) = slow_rx.try_recv() {
            slow_ids.extend(event.message_id());
        }
        assert_eq!(slow_ids, vec![sent[0].message.id(), sent[1].message.id()]);

        let mut fast_count = 0;
        while fast_rx.try_recv().is_ok() {
            fast_count += 1;
        }
        assert_eq!(fast_count, 4);
    }

    #[test]
    fn offline_user_is_not_an_error() {
        let (_registry, dispatcher) = setup();
        let report = dispatcher.deliver_message(&delivered(UserId::new(), UserId::new(), "x"));
        assert!(report.is_offline());
    }

    #[test]
    fn deliver_message_reaches_receiver_and_sender() {
        let (registry, dispatcher) = setup();
        let (alice, bob) = (UserId::new(), UserId::new());
        let (ha, mut rx_a) = ConnectionHandle::channel(alice, 8);
        let (hb, mut rx_b) = ConnectionHandle::channel(bob, 8);
        registry.register(ha);
        registry.register(hb);

        dispatcher.deliver_message(&delivered(alice, bob, "hi"));

        assert!(matches!(rx_b.try_recv(), Ok(OutboundEvent::MessageReceived(_))));
        assert!(matches!(rx_a.try_recv(), Ok(OutboundEvent::MessageReceived(_))));
    }

    #[test]
    fn presence_broadcast_skips_subject() {
        let (registry, dispatcher) = setup();
        let (alice, bob) = (UserId::new(), UserId::new());
        let (ha, mut rx_a) = ConnectionHandle::channel(alice, 8);
        let (hb, mut rx_b) = ConnectionHandle::channel(bob, 8);
        registry.register(ha);
        registry.register(hb);

        let report = dispatcher.broadcast_presence(PresenceEvent::online(alice));

        assert_eq!(report.delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(
            rx_b.try_recv().ok(),
            Some(OutboundEvent::Presence(PresenceEvent::online(alice)))
        );
    }

    #[test]
    fn per_connection_order_matches_push_order() {
        let (registry, dispatcher) = setup();
        let bob = UserId::new();
        let (hb, mut rx) = ConnectionHandle::channel(bob, 16);
        registry.register(hb);

        let sent: Vec<_> = (0..5)
            .map(|i| delivered(UserId::new(), bob, &format!("m{}", i)))
            .collect();
        for d in &sent {
            dispatcher.deliver_message(d);
        }

        for d in &sent {
            assert_eq!(rx.try_recv().ok().and_then(|e| e.message_id()), Some(d.message.id()));
        }
    }
}
