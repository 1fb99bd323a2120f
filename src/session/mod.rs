// 1ユーザとの対話の間だけ存在するセッションを扱うモジュール
mod registry;

pub use registry::*;

use std::sync::Arc;
use std::time::Duration;

use serde_derive::Deserialize;
use serenity::model::prelude::*;
use tokio::task::JoinHandle;

use crate::collector::{self, Collector, CollectorResult, EventHub, Menu, Prompt, Subscription};
use crate::platform::{ChatPlatform, Panel, PlatformError, PlatformResult};
use crate::services::store::GuildStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Reaction-only menus, in seconds.
    pub menu: u64,
    /// Steps that accept typed answers, in seconds.
    pub prompt: u64,
    /// Yes/no confirmations, in seconds.
    pub confirm: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            menu: 5 * 60,
            prompt: 10 * 60,
            confirm: 60,
        }
    }
}

impl Timeouts {
    pub fn menu(&self) -> Duration {
        Duration::from_secs(self.menu)
    }

    pub fn prompt(&self) -> Duration {
        Duration::from_secs(self.prompt)
    }

    pub fn confirm(&self) -> Duration {
        Duration::from_secs(self.confirm)
    }
}

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionContext {
    pub platform: Arc<dyn ChatPlatform>,
    pub hub: EventHub,
    pub registry: SessionRegistry,
    pub store: Arc<dyn GuildStore>,
    pub timeouts: Timeouts,
}

impl SessionContext {
    /// Starts a session for `user` in `channel`, unless the user is already in a menu.
    pub fn open(&self, user: UserId, channel: ChannelId, kind: MenuKind) -> Option<Session> {
        let guard = self.registry.try_enter(user, kind)?;
        Some(Session {
            platform: Arc::clone(&self.platform),
            hub: self.hub.clone(),
            user,
            channel,
            message: None,
            panel: None,
            attached: Vec::new(),
            attach_task: None,
            subscription: None,
            _guard: guard,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// 最後に表示した内容をそのまま残す
    Completed,
    /// メッセージを削除する
    Cancelled,
    /// リアクションを外し、タイムアウトした旨をフッターに表示して残す
    TimedOut,
}

pub struct Session {
    platform: Arc<dyn ChatPlatform>,
    hub: EventHub,
    user: UserId,
    channel: ChannelId,
    message: Option<MessageId>,
    panel: Option<Panel>,
    attached: Vec<&'static str>,
    attach_task: Option<JoinHandle<()>>,
    subscription: Option<Subscription>,
    _guard: RegistryGuard,
}

impl Session {
    pub fn message(&self) -> Option<MessageId> {
        self.message
    }

    /// Shows `panel`, sending the session message on first use and editing it afterwards.
    #[tracing::instrument(skip_all, fields(user = ?self.user, message = ?self.message))]
    pub async fn render(&mut self, panel: &Panel) -> PlatformResult<MessageId> {
        let message = match self.message {
            Some(message) => {
                self.platform.edit_panel(self.channel, message, panel).await?;
                message
            },
            None => {
                let message = self.platform.send_panel(self.channel, panel).await?;
                self.message = Some(message);
                message
            },
        };
        self.panel = Some(panel.clone());
        Ok(message)
    }

    // 既に同じリアクションが付いていれば何もしない。異なる場合は付け直す。
    async fn prepare_menu(&mut self, message: MessageId, menu: &Menu) {
        if self.attached.as_slice() == menu.emojis() {
            return;
        }

        if let Some(task) = self.attach_task.take() {
            task.abort();
        }

        if !self.attached.is_empty() {
            if let Err(err) = self.platform.clear_reactions(self.channel, message).await {
                tracing::warn!(?err, "failed to clear reactions");
            }
        }

        self.attached = menu.emojis().to_vec();
        if menu.should_attach() {
            self.attach_task = Some(collector::attach_in_background(
                Arc::clone(&self.platform),
                self.channel,
                message,
                self.attached.clone(),
            ));
        }
    }

    /// Renders `panel`, then waits for either a typed answer or a menu reaction.
    #[tracing::instrument(skip_all, fields(user = ?self.user, timeout = ?timeout))]
    pub async fn ask<T: std::fmt::Debug + 'static>(
        &mut self,
        panel: &Panel,
        prompt: Option<&Prompt<T>>,
        menu: &Menu,
        timeout: Duration,
    ) -> PlatformResult<CollectorResult<T>> {
        let message = self.render(panel).await?;
        self.prepare_menu(message, menu).await;

        let mut collector = Collector::new(&self.platform, &self.hub, self.user, self.channel, timeout)
            .menu(message, menu);
        if let Some(prompt) = prompt {
            collector = collector.prompt(prompt);
        }

        Ok(collector.run(&mut self.subscription).await)
    }

    /// Same as [`Session::ask`] for steps that only accept reactions.
    pub async fn choose(
        &mut self,
        panel: &Panel,
        menu: &Menu,
        timeout: Duration,
    ) -> PlatformResult<CollectorResult<()>> {
        self.ask::<()>(panel, None, menu, timeout).await
    }

    /// Deletes the current message; the next render sends a new one.
    pub async fn discard_message(&mut self) {
        self.reset_menu();
        if let Some(message) = self.message.take() {
            match self.platform.delete_message(self.channel, message).await {
                // 既に削除されている
                Ok(()) | Err(PlatformError::MessageNotFound(_)) => {},
                Err(err) => tracing::warn!(?err, "failed to delete session message"),
            }
        }
        self.panel = None;
    }

    /// Removes every reaction from the current message.
    pub async fn clear_menu(&mut self) {
        self.reset_menu();
        if let Some(message) = self.message {
            if let Err(err) = self.platform.clear_reactions(self.channel, message).await {
                tracing::warn!(?err, "failed to clear reactions");
            }
        }
    }

    fn reset_menu(&mut self) {
        if let Some(task) = self.attach_task.take() {
            task.abort();
        }
        self.attached.clear();
    }

    /// Tears the session down. Platform failures are logged and otherwise ignored.
    #[tracing::instrument(skip_all, fields(user = ?self.user, end = ?end))]
    pub async fn finish(mut self, end: SessionEnd) {
        self.subscription.take();
        tracing::debug!("finish session");

        match end {
            SessionEnd::Completed => self.clear_menu().await,
            SessionEnd::Cancelled => self.discard_message().await,
            SessionEnd::TimedOut => {
                self.clear_menu().await;
                if let (Some(message), Some(panel)) = (self.message, self.panel.take()) {
                    let panel = panel.footer("This menu has timed out.");
                    if let Err(err) = self.platform.edit_panel(self.channel, message, &panel).await {
                        tracing::warn!(?err, "failed to mark session message as timed out");
                    }
                }
            },
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = self.attach_task.take() {
            task.abort();
        }
    }
}
