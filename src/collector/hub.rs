// Gatewayから受け取ったイベントを、待機中のセッションへ配送するモジュール
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serenity::model::prelude::*;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingReaction {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingEvent {
    Message(IncomingMessage),
    Reaction(IncomingReaction),
}

/// Selects the events a listener receives: messages written by `author_id` in
/// `channel_id`, and reactions added by the same user to `message_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub author_id: UserId,
    pub channel_id: ChannelId,
    pub message_id: Option<MessageId>,
}

impl EventFilter {
    pub fn new(author_id: UserId, channel_id: ChannelId) -> Self {
        Self {
            author_id,
            channel_id,
            message_id: None,
        }
    }

    pub fn reactions_on(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    pub fn matches(&self, event: &IncomingEvent) -> bool {
        match event {
            IncomingEvent::Message(message) => {
                message.author_id == self.author_id && message.channel_id == self.channel_id
            },
            IncomingEvent::Reaction(reaction) => {
                reaction.user_id == self.author_id && Some(reaction.message_id) == self.message_id
            },
        }
    }
}

struct Listener {
    filter: EventFilter,
    sender: mpsc::UnboundedSender<IncomingEvent>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: HashMap<u64, Listener>,
}

#[derive(Clone, Default)]
pub struct EventHub {
    listeners: Arc<Mutex<Listeners>>,
}

fn lock(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip_all, fields(filter = ?filter))]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut listeners = lock(&self.listeners);
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.insert(id, Listener { filter, sender });
        tracing::trace!(id, "listener registered");

        Subscription {
            id,
            receiver,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Delivers `event` to every matching listener and returns how many received it.
    pub fn dispatch(&self, event: IncomingEvent) -> usize {
        let listeners = lock(&self.listeners);
        let mut delivered = 0;
        for listener in listeners.entries.values() {
            if listener.filter.matches(&event) && listener.sender.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }

    /// Number of subscriptions ever opened, useful to wait for a session to start listening.
    pub fn subscriptions_opened(&self) -> u64 {
        lock(&self.listeners).next_id
    }
}

/// A registered listener. Dropping it unregisters the listener from the hub.
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<IncomingEvent>,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub async fn next(&mut self) -> Option<IncomingEvent> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).entries.remove(&self.id);
            tracing::trace!(id = self.id, "listener released");
        }
    }
}
