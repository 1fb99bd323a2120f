use std::sync::Arc;
use std::time::Duration;

use serenity::model::prelude::*;

use super::collector::{Collector, CollectorResult};
use super::hub::{EventHub, IncomingMessage};
use super::prompt::{Prompt, Validation};
use crate::platform::ChatPlatform;

// 不正な入力に対する警告メッセージを表示しておく時間
static REJECTION_NOTICE_LIFETIME: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOutcome<T> {
    Value(T),
    Cancelled,
    TimedOut,
}

/// Waits for one text answer from a single author in a single channel.
pub struct TimedResponse<'a, T> {
    platform: &'a Arc<dyn ChatPlatform>,
    prompt: &'a Prompt<T>,
}

impl<'a, T: std::fmt::Debug + 'static> TimedResponse<'a, T> {
    pub fn new(platform: &'a Arc<dyn ChatPlatform>, prompt: &'a Prompt<T>) -> Self {
        Self { platform, prompt }
    }

    /// Waits for a typed answer alone. This is a [`Collector`] without a menu.
    pub async fn wait(
        &self,
        hub: &EventHub,
        author: UserId,
        channel: ChannelId,
        timeout: Duration,
    ) -> TextOutcome<T> {
        let result = Collector::new(self.platform, hub, author, channel, timeout)
            .prompt(self.prompt)
            .run(&mut None)
            .await;
        match result {
            CollectorResult::Text(value) => TextOutcome::Value(value),
            CollectorResult::Cancelled => TextOutcome::Cancelled,
            // メニューがないのでリアクションは届かない
            CollectorResult::TimedOut | CollectorResult::Reaction(_) => TextOutcome::TimedOut,
        }
    }

    /// Evaluates one message against the prompt. `None` means the message was
    /// rejected and the caller keeps waiting under the same deadline.
    pub async fn accept(&self, message: &IncomingMessage) -> Option<TextOutcome<T>> {
        if self.prompt.is_cancel(&message.content) {
            tracing::debug!("cancel token received");
            self.consume(message).await;
            return Some(TextOutcome::Cancelled);
        }

        match self.prompt.validate(&message.content) {
            Validation::Accepted(value) => {
                self.consume(message).await;
                Some(TextOutcome::Value(value))
            },
            Validation::Rejected(reason) => {
                tracing::debug!(reason, "response rejected");
                self.notify_rejection(message.channel_id, reason).await;
                None
            },
        }
    }

    async fn consume(&self, message: &IncomingMessage) {
        if !self.prompt.deletes_reply() {
            return;
        }
        if let Err(err) = self
            .platform
            .delete_message(message.channel_id, message.id)
            .await
        {
            tracing::warn!(?err, "failed to delete response message");
        }
    }

    async fn notify_rejection(&self, channel: ChannelId, reason: String) {
        let notice = match self.platform.send_text(channel, &reason).await {
            Ok(notice) => notice,
            Err(err) => {
                tracing::warn!(?err, "failed to send rejection notice");
                return;
            },
        };

        let platform = Arc::clone(self.platform);
        tokio::spawn(async move {
            tokio::time::sleep(REJECTION_NOTICE_LIFETIME).await;
            if let Err(err) = platform.delete_message(channel, notice).await {
                tracing::warn!(?err, "failed to delete rejection notice");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::testing::*;
    use crate::platform::recording::{PlatformCall, RecordingPlatform};

    #[tokio::test]
    async fn resolves_with_first_valid_message() {
        let (platform, recording) = platform();
        let hub = EventHub::new();
        let prompt = Prompt::text(2, 10);

        let waiter = {
            let hub = hub.clone();
            let platform = platform.clone();
            tokio::spawn(async move {
                TimedResponse::new(&platform, &prompt)
                    .wait(&hub, UserId::new(1), ChannelId::new(10), Duration::from_secs(60))
                    .await
            })
        };

        wait_for_subscriptions(&hub, 1).await;
        hub.dispatch(message(2, 10, "someone else"));
        hub.dispatch(message(1, 10, "x"));
        hub.dispatch(message(1, 10, "valid"));

        assert_eq!(
            waiter.await.unwrap(),
            TextOutcome::Value(String::from("valid"))
        );
        assert_eq!(hub.listener_count(), 0);

        // 短すぎる入力には警告が送られる
        assert!(recording
            .calls()
            .iter()
            .any(|call| matches!(call, PlatformCall::SendText(_, _, text) if text.contains("at least"))));
    }

    #[tokio::test]
    async fn cancel_token_yields_cancelled() {
        let (platform, _) = platform();
        let hub = EventHub::new();
        let prompt = Prompt::text(1, 10);

        let waiter = {
            let hub = hub.clone();
            let platform = platform.clone();
            tokio::spawn(async move {
                TimedResponse::new(&platform, &prompt)
                    .wait(&hub, UserId::new(1), ChannelId::new(10), Duration::from_secs(60))
                    .await
            })
        };

        wait_for_subscriptions(&hub, 1).await;
        hub.dispatch(message(1, 10, "--cancel"));

        assert_eq!(waiter.await.unwrap(), TextOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_yields_timed_out() {
        let (platform, _) = platform();
        let hub = EventHub::new();
        let prompt = Prompt::text(1, 10);

        let outcome = TimedResponse::new(&platform, &prompt)
            .wait(&hub, UserId::new(1), ChannelId::new(10), Duration::from_secs(30))
            .await;

        assert_eq!(outcome, TextOutcome::TimedOut);
        assert_eq!(hub.listener_count(), 0);
    }

    #[tokio::test]
    async fn accepted_reply_is_deleted_unless_kept() {
        let recording = Arc::new(RecordingPlatform::new());
        let platform: Arc<dyn ChatPlatform> = recording.clone();
        let reply = IncomingMessage {
            id: MessageId::new(77),
            channel_id: ChannelId::new(10),
            author_id: UserId::new(1),
            content: String::from("hello"),
        };

        let prompt = Prompt::text(1, 10);
        TimedResponse::new(&platform, &prompt).accept(&reply).await;
        assert!(recording.is_deleted(MessageId::new(77)));

        let recording = Arc::new(RecordingPlatform::new());
        let platform: Arc<dyn ChatPlatform> = recording.clone();
        let prompt = Prompt::text(1, 10).keep_reply();
        TimedResponse::new(&platform, &prompt).accept(&reply).await;
        assert!(!recording.is_deleted(MessageId::new(77)));
    }
}
