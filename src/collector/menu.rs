use std::sync::Arc;
use std::time::Duration;

use serenity::model::prelude::*;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::hub::{EventFilter, EventHub, IncomingEvent};
use crate::platform::{ChatPlatform, PlatformResult};

/// Compares two emoji ignoring variation selectors, since the gateway may send
/// `⚙️` for a reaction attached as `⚙`.
pub fn same_emoji(a: &str, b: &str) -> bool {
    let strip = |s: &str| s.chars().filter(|c| *c != '\u{fe0f}').collect::<String>();
    strip(a) == strip(b)
}

/// An ordered set of emoji choices shown on a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    emojis: Vec<&'static str>,
    cancel: Option<&'static str>,
    attach: bool,
}

impl Menu {
    pub fn new<I: IntoIterator<Item = &'static str>>(emojis: I) -> Self {
        Self {
            emojis: emojis.into_iter().collect(),
            cancel: None,
            attach: true,
        }
    }

    /// Marks `emoji` (which must be part of the menu) as the cancel choice.
    pub fn with_cancel(mut self, emoji: &'static str) -> Self {
        self.cancel = Some(emoji);
        self
    }

    /// The caller has already attached the reactions, e.g. with [`attach_in_background`].
    pub fn already_attached(mut self) -> Self {
        self.attach = false;
        self
    }

    pub fn emojis(&self) -> &[&'static str] {
        &self.emojis
    }

    pub fn should_attach(&self) -> bool {
        self.attach
    }

    pub fn is_cancel(&self, emoji: &str) -> bool {
        self.cancel.map_or(false, |cancel| same_emoji(cancel, emoji))
    }

    /// Maps a received emoji back onto the menu entry it represents.
    pub fn select(&self, emoji: &str) -> Option<&'static str> {
        self.emojis
            .iter()
            .copied()
            .find(|candidate| same_emoji(candidate, emoji))
    }
}

// リアクションは順番に意味があるため、1つずつ順番に付与する
#[tracing::instrument(skip_all, fields(channel = ?channel, message = ?message, emojis = ?emojis))]
pub async fn attach_reactions(
    platform: &dyn ChatPlatform,
    channel: ChannelId,
    message: MessageId,
    emojis: &[&'static str],
) -> PlatformResult<()> {
    for emoji in emojis {
        platform.add_reaction(channel, message, emoji).await?;
    }
    Ok(())
}

/// Attaches reactions without blocking the caller, so the user can already
/// react to the first entries while the rest are being added.
pub fn attach_in_background(
    platform: Arc<dyn ChatPlatform>,
    channel: ChannelId,
    message: MessageId,
    emojis: Vec<&'static str>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = attach_reactions(platform.as_ref(), channel, message, &emojis).await {
            tracing::warn!(?err, "failed to attach reactions");
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOutcome {
    Selected(&'static str),
    TimedOut,
}

/// Waits for the first reaction from one user that belongs to a menu.
pub struct ReactionMenu<'a> {
    platform: &'a Arc<dyn ChatPlatform>,
    menu: &'a Menu,
}

impl<'a> ReactionMenu<'a> {
    pub fn new(platform: &'a Arc<dyn ChatPlatform>, menu: &'a Menu) -> Self {
        Self { platform, menu }
    }

    /// Attaches the menu, then waits for a selection. Typed messages are ignored here,
    /// unlike a [`Collector`](super::Collector) with a menu, which also ends on a typed cancel token.
    #[tracing::instrument(skip_all, fields(user = ?user, message = ?message, timeout = ?timeout))]
    pub async fn wait(
        &self,
        hub: &EventHub,
        user: UserId,
        channel: ChannelId,
        message: MessageId,
        timeout: Duration,
    ) -> MenuOutcome {
        let deadline = Instant::now() + timeout;
        // リアクションの付与中に押されたものも拾えるよう、先に購読しておく
        let mut subscription = hub.subscribe(EventFilter::new(user, channel).reactions_on(message));

        if self.menu.should_attach() {
            if let Err(err) =
                attach_reactions(self.platform.as_ref(), channel, message, self.menu.emojis()).await
            {
                tracing::warn!(?err, "failed to attach reactions");
            }
        }

        loop {
            let event = match tokio::time::timeout_at(deadline, subscription.next()).await {
                Ok(Some(event)) => event,
                Ok(None) | Err(_) => return MenuOutcome::TimedOut,
            };

            if let IncomingEvent::Reaction(reaction) = event {
                if let Some(emoji) = self.menu.select(&reaction.emoji) {
                    tracing::debug!(emoji, "menu entry selected");
                    return MenuOutcome::Selected(emoji);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::testing::*;

    #[test]
    fn select_ignores_variation_selector() {
        let menu = Menu::new(["⚙", "❌"]);
        assert_eq!(menu.select("⚙\u{fe0f}"), Some("⚙"));
        assert_eq!(menu.select("❌"), Some("❌"));
        assert_eq!(menu.select("✅"), None);
    }

    #[test]
    fn cancel_must_be_configured() {
        let menu = Menu::new(["✅", "❌"]);
        assert!(!menu.is_cancel("❌"));
        let menu = menu.with_cancel("❌");
        assert!(menu.is_cancel("❌"));
        assert!(!menu.is_cancel("✅"));
    }

    #[tokio::test]
    async fn attaches_in_order_and_accepts_only_authorized_members() {
        let (platform, recording) = platform();
        let hub = EventHub::new();
        let message_id = MessageId::new(50);
        let menu = Menu::new(["⬅️", "✅", "❌"]);

        let waiter = {
            let hub = hub.clone();
            let platform = platform.clone();
            tokio::spawn(async move {
                ReactionMenu::new(&platform, &menu)
                    .wait(
                        &hub,
                        UserId::new(1),
                        ChannelId::new(10),
                        message_id,
                        Duration::from_secs(60),
                    )
                    .await
            })
        };

        wait_for_subscriptions(&hub, 1).await;
        hub.dispatch(reaction(2, 50, "✅"));
        hub.dispatch(reaction(1, 50, "🎉"));
        hub.dispatch(reaction(1, 51, "✅"));
        hub.dispatch(reaction(1, 50, "✅"));

        assert_eq!(waiter.await.unwrap(), MenuOutcome::Selected("✅"));
        assert_eq!(recording.reactions_on(message_id), vec!["⬅️", "✅", "❌"]);
        assert_eq!(hub.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_reaction() {
        let (platform, recording) = platform();
        let hub = EventHub::new();
        let menu = Menu::new(["✅"]).already_attached();

        let outcome = ReactionMenu::new(&platform, &menu)
            .wait(
                &hub,
                UserId::new(1),
                ChannelId::new(10),
                MessageId::new(50),
                Duration::from_secs(60),
            )
            .await;

        assert_eq!(outcome, MenuOutcome::TimedOut);
        assert!(recording.reactions_on(MessageId::new(50)).is_empty());
        assert_eq!(hub.listener_count(), 0);
    }

    #[tokio::test]
    async fn background_attach_keeps_order() {
        let (platform, recording) = platform();
        attach_in_background(
            platform,
            ChannelId::new(10),
            MessageId::new(50),
            vec!["1⃣", "2⃣", "3⃣"],
        )
        .await
        .unwrap();
        assert_eq!(recording.reactions_on(MessageId::new(50)), vec!["1⃣", "2⃣", "3⃣"]);
    }
}
