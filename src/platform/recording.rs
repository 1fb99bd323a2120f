// テスト用にすべての呼び出しを記録するChatPlatformの実装
use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serenity::model::prelude::*;

use super::{ChannelRef, ChatPlatform, Panel, PlatformError, PlatformResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    SendPanel(ChannelId, MessageId, Panel),
    EditPanel(ChannelId, MessageId, Panel),
    SendText(ChannelId, MessageId, String),
    DeleteMessage(ChannelId, MessageId),
    AddReaction(MessageId, String),
    ClearReactions(MessageId),
    OpenDirectChannel(UserId),
}

#[derive(Default)]
struct State {
    next_message_id: u64,
    calls: Vec<PlatformCall>,
    deleted: HashSet<MessageId>,
}

pub struct RecordingPlatform {
    state: Mutex<State>,
    channels: Vec<ChannelRef>,
    dm_channel: ChannelId,
}

impl Default for RecordingPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_message_id: 1000,
                ..Default::default()
            }),
            channels: Vec::new(),
            dm_channel: ChannelId::new(900),
        }
    }

    pub fn with_channels(mut self, channels: Vec<ChannelRef>) -> Self {
        self.channels = channels;
        self
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn is_deleted(&self, message: MessageId) -> bool {
        self.state.lock().unwrap().deleted.contains(&message)
    }

    pub fn reactions_on(&self, message: MessageId) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::AddReaction(id, emoji) if id == message => Some(emoji),
                _ => None,
            })
            .collect()
    }

    pub fn last_panel(&self) -> Option<Panel> {
        self.calls().into_iter().rev().find_map(|call| match call {
            PlatformCall::SendPanel(_, _, panel) | PlatformCall::EditPanel(_, _, panel) => {
                Some(panel)
            },
            _ => None,
        })
    }

    /// Makes `message` disappear as if someone else had deleted it.
    pub fn remove_message(&self, message: MessageId) {
        self.state.lock().unwrap().deleted.insert(message);
    }

    fn record(&self, call: PlatformCall) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn allocate(&self) -> MessageId {
        let mut state = self.state.lock().unwrap();
        state.next_message_id += 1;
        MessageId::new(state.next_message_id)
    }

    fn ensure_alive(&self, message: MessageId) -> PlatformResult<()> {
        if self.is_deleted(message) {
            return Err(PlatformError::MessageNotFound(message));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn send_panel(&self, channel: ChannelId, panel: &Panel) -> PlatformResult<MessageId> {
        panel.check_size()?;
        let id = self.allocate();
        self.record(PlatformCall::SendPanel(channel, id, panel.clone()));
        Ok(id)
    }

    async fn edit_panel(
        &self,
        channel: ChannelId,
        message: MessageId,
        panel: &Panel,
    ) -> PlatformResult<()> {
        self.ensure_alive(message)?;
        panel.check_size()?;
        self.record(PlatformCall::EditPanel(channel, message, panel.clone()));
        Ok(())
    }

    async fn send_text(&self, channel: ChannelId, content: &str) -> PlatformResult<MessageId> {
        let id = self.allocate();
        self.record(PlatformCall::SendText(channel, id, content.to_string()));
        Ok(id)
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> PlatformResult<()> {
        self.ensure_alive(message)?;
        self.state.lock().unwrap().deleted.insert(message);
        self.record(PlatformCall::DeleteMessage(channel, message));
        Ok(())
    }

    async fn add_reaction(
        &self,
        _channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> PlatformResult<()> {
        self.ensure_alive(message)?;
        self.record(PlatformCall::AddReaction(message, emoji.to_string()));
        Ok(())
    }

    async fn clear_reactions(&self, _channel: ChannelId, message: MessageId) -> PlatformResult<()> {
        self.ensure_alive(message)?;
        self.record(PlatformCall::ClearReactions(message));
        Ok(())
    }

    async fn open_direct_channel(&self, user: UserId) -> PlatformResult<ChannelId> {
        self.record(PlatformCall::OpenDirectChannel(user));
        Ok(self.dm_channel)
    }

    async fn text_channels(&self, _guild: GuildId) -> PlatformResult<Vec<ChannelRef>> {
        Ok(self.channels.clone())
    }
}
