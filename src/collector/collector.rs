use std::sync::Arc;
use std::time::Duration;

use serenity::model::prelude::*;
use tokio::time::Instant;

use super::hub::{EventFilter, EventHub, IncomingEvent, Subscription};
use super::menu::Menu;
use super::prompt::{Prompt, DEFAULT_CANCEL_TOKEN};
use super::response::{TextOutcome, TimedResponse};
use crate::platform::ChatPlatform;

/// Result of one collection step. Exactly one arm is produced per step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorResult<T> {
    Text(T),
    Reaction(&'static str),
    Cancelled,
    TimedOut,
}

/// Races a text prompt against a reaction menu under one shared deadline.
pub struct Collector<'a, T> {
    platform: &'a Arc<dyn ChatPlatform>,
    hub: &'a EventHub,
    author: UserId,
    channel: ChannelId,
    timeout: Duration,
    prompt: Option<&'a Prompt<T>>,
    menu: Option<(MessageId, &'a Menu)>,
}

impl<'a, T: std::fmt::Debug + 'static> Collector<'a, T> {
    pub fn new(
        platform: &'a Arc<dyn ChatPlatform>,
        hub: &'a EventHub,
        author: UserId,
        channel: ChannelId,
        timeout: Duration,
    ) -> Self {
        Self {
            platform,
            hub,
            author,
            channel,
            timeout,
            prompt: None,
            menu: None,
        }
    }

    pub fn prompt(mut self, prompt: &'a Prompt<T>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Listens for reactions on `message`. The reactions themselves are attached by the caller.
    pub fn menu(mut self, message: MessageId, menu: &'a Menu) -> Self {
        self.menu = Some((message, menu));
        self
    }

    fn filter(&self) -> EventFilter {
        let filter = EventFilter::new(self.author, self.channel);
        match self.menu {
            Some((message, _)) => filter.reactions_on(message),
            None => filter,
        }
    }

    fn is_cancel_text(&self, content: &str) -> bool {
        match self.prompt {
            Some(prompt) => prompt.is_cancel(content),
            None => content.trim().eq_ignore_ascii_case(DEFAULT_CANCEL_TOKEN),
        }
    }

    /// Runs the collection. Any subscription still held in `slot` is retired before
    /// the new one is registered, and the new one is retired once a result is produced.
    #[tracing::instrument(skip_all, fields(author = ?self.author, channel = ?self.channel, timeout = ?self.timeout))]
    pub async fn run(self, slot: &mut Option<Subscription>) -> CollectorResult<T> {
        slot.take();
        let deadline = Instant::now() + self.timeout;
        let subscription = slot.insert(self.hub.subscribe(self.filter()));

        let result = loop {
            let event = match tokio::time::timeout_at(deadline, subscription.next()).await {
                Ok(Some(event)) => event,
                Ok(None) | Err(_) => break CollectorResult::TimedOut,
            };

            match event {
                IncomingEvent::Message(message) => match self.prompt {
                    Some(prompt) => {
                        match TimedResponse::new(self.platform, prompt)
                            .accept(&message)
                            .await
                        {
                            Some(TextOutcome::Value(value)) => break CollectorResult::Text(value),
                            Some(TextOutcome::Cancelled) => break CollectorResult::Cancelled,
                            Some(TextOutcome::TimedOut) => break CollectorResult::TimedOut,
                            None => continue,
                        }
                    },
                    None if self.is_cancel_text(&message.content) => {
                        break CollectorResult::Cancelled
                    },
                    None => continue,
                },
                IncomingEvent::Reaction(reaction) => {
                    let Some((_, menu)) = self.menu else {
                        continue;
                    };
                    if menu.is_cancel(&reaction.emoji) {
                        break CollectorResult::Cancelled;
                    }
                    if let Some(emoji) = menu.select(&reaction.emoji) {
                        break CollectorResult::Reaction(emoji);
                    }
                },
            }
        };

        slot.take();
        tracing::debug!(?result, "collection finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::testing::*;

    fn spawn_collect(
        platform: Arc<dyn ChatPlatform>,
        hub: EventHub,
        prompt: Option<Prompt<String>>,
        menu: Option<Menu>,
        timeout: Duration,
    ) -> tokio::task::JoinHandle<CollectorResult<String>> {
        tokio::spawn(async move {
            let mut slot = None;
            let mut collector = Collector::new(
                &platform,
                &hub,
                UserId::new(1),
                ChannelId::new(10),
                timeout,
            );
            if let Some(prompt) = prompt.as_ref() {
                collector = collector.prompt(prompt);
            }
            if let Some(menu) = menu.as_ref() {
                collector = collector.menu(MessageId::new(50), menu);
            }
            collector.run(&mut slot).await
        })
    }

    #[tokio::test]
    async fn text_wins_when_typed_first() {
        let (platform, _) = platform();
        let hub = EventHub::new();
        let handle = spawn_collect(
            platform,
            hub.clone(),
            Some(Prompt::text(1, 20)),
            Some(Menu::new(["✅", "❌"]).with_cancel("❌")),
            Duration::from_secs(60),
        );

        wait_for_subscriptions(&hub, 1).await;
        assert_eq!(hub.listener_count(), 1);
        hub.dispatch(message(1, 10, "my answer"));

        assert_eq!(
            handle.await.unwrap(),
            CollectorResult::Text(String::from("my answer"))
        );
        assert_eq!(hub.listener_count(), 0);
    }

    #[tokio::test]
    async fn reaction_wins_when_added_first() {
        let (platform, _) = platform();
        let hub = EventHub::new();
        let handle = spawn_collect(
            platform,
            hub.clone(),
            Some(Prompt::text(1, 20)),
            Some(Menu::new(["✅", "❌"]).with_cancel("❌")),
            Duration::from_secs(60),
        );

        wait_for_subscriptions(&hub, 1).await;
        hub.dispatch(reaction(2, 50, "✅"));
        hub.dispatch(reaction(1, 50, "✅"));

        assert_eq!(handle.await.unwrap(), CollectorResult::Reaction("✅"));
    }

    #[tokio::test]
    async fn cancel_emoji_and_cancel_token_both_cancel() {
        let (platform, _) = platform();
        let hub = EventHub::new();
        let handle = spawn_collect(
            platform.clone(),
            hub.clone(),
            Some(Prompt::text(1, 20)),
            Some(Menu::new(["✅", "❌"]).with_cancel("❌")),
            Duration::from_secs(60),
        );
        wait_for_subscriptions(&hub, 1).await;
        hub.dispatch(reaction(1, 50, "❌"));
        assert_eq!(handle.await.unwrap(), CollectorResult::Cancelled);

        let handle = spawn_collect(
            platform,
            hub.clone(),
            None,
            Some(Menu::new(["✅"])),
            Duration::from_secs(60),
        );
        wait_for_subscriptions(&hub, 2).await;
        hub.dispatch(message(1, 10, "--cancel"));
        assert_eq!(handle.await.unwrap(), CollectorResult::Cancelled);
    }

    #[tokio::test]
    async fn rejected_text_does_not_resolve() {
        let (platform, _) = platform();
        let hub = EventHub::new();
        let handle = spawn_collect(
            platform,
            hub.clone(),
            Some(Prompt::text(3, 5)),
            Some(Menu::new(["✅"])),
            Duration::from_secs(60),
        );

        wait_for_subscriptions(&hub, 1).await;
        hub.dispatch(message(1, 10, "ab"));
        hub.dispatch(message(1, 10, "abcdef"));
        hub.dispatch(message(1, 10, "abcd"));

        assert_eq!(
            handle.await.unwrap(),
            CollectorResult::Text(String::from("abcd"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_yields_timed_out() {
        let (platform, _) = platform();
        let hub = EventHub::new();
        let mut slot = None;
        let prompt = Prompt::text(1, 20);
        let menu = Menu::new(["✅"]);

        let result = Collector::new(
            &platform,
            &hub,
            UserId::new(1),
            ChannelId::new(10),
            Duration::from_secs(600),
        )
        .prompt(&prompt)
        .menu(MessageId::new(50), &menu)
        .run(&mut slot)
        .await;

        assert_eq!(result, CollectorResult::TimedOut);
        assert!(slot.is_none());
        assert_eq!(hub.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_a_collection_retires_the_previous_listener() {
        let (platform, _) = platform();
        let hub = EventHub::new();
        let mut slot = Some(hub.subscribe(EventFilter::new(UserId::new(1), ChannelId::new(10))));
        assert_eq!(hub.listener_count(), 1);

        let menu = Menu::new(["✅"]);
        let collection = Collector::<()>::new(
            &platform,
            &hub,
            UserId::new(1),
            ChannelId::new(10),
            Duration::from_secs(1),
        )
        .menu(MessageId::new(50), &menu)
        .run(&mut slot);
        tokio::pin!(collection);

        // 最初のポーリングで新しいリスナーに置き換わる
        assert!(tokio::time::timeout(Duration::ZERO, &mut collection)
            .await
            .is_err());
        assert_eq!(hub.listener_count(), 1);

        assert_eq!(collection.await, CollectorResult::TimedOut);
        assert_eq!(hub.listener_count(), 0);
    }
}
