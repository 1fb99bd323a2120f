use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::CreateEmbed;
use serenity::all::CreateEmbedAuthor;
use serenity::all::CreateEmbedFooter;
use serenity::all::CreateMessage;
use serenity::all::EditMessage;
use serenity::http::Http;
use serenity::model::prelude::*;

use super::{ChannelRef, ChatPlatform, Panel, PlatformError, PlatformResult};

static PANEL_COLOUR: u32 = 0x3498db;

// 対象のメッセージが既に削除されている場合は MessageNotFound に変換する
fn message_error(err: serenity::Error, message: MessageId) -> PlatformError {
    if let serenity::Error::Http(http) = &err {
        if http.status_code() == Some(serenity::http::StatusCode::NOT_FOUND) {
            return PlatformError::MessageNotFound(message);
        }
    }
    err.into()
}

impl From<&Panel> for CreateEmbed {
    fn from(panel: &Panel) -> Self {
        let mut embed = CreateEmbed::new()
            .colour(PANEL_COLOUR)
            .title(&panel.title)
            .description(&panel.description);

        embed = match &panel.author {
            Some(author) => embed.author(CreateEmbedAuthor::new(author)),
            None => embed,
        };

        for (name, value) in &panel.fields {
            embed = embed.field(name, value, false);
        }

        match &panel.footer {
            Some(footer) => embed.footer(CreateEmbedFooter::new(footer)),
            None => embed,
        }
    }
}

// serenityのHTTPクライアントを用いたChatPlatformの実装
pub struct DiscordPlatform {
    discord_client: Arc<Http>,
}

impl DiscordPlatform {
    pub fn new(discord_client: Arc<Http>) -> Self {
        Self { discord_client }
    }

    fn http(&self) -> &Http {
        &self.discord_client
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    #[tracing::instrument(skip_all, fields(channel = ?channel))]
    async fn send_panel(&self, channel: ChannelId, panel: &Panel) -> PlatformResult<MessageId> {
        tracing::trace!("Send panel");
        panel.check_size()?;
        let message = channel
            .send_message(self.http(), CreateMessage::new().embed(panel.into()))
            .await?;
        Ok(message.id)
    }

    #[tracing::instrument(skip_all, fields(channel = ?channel, message = ?message))]
    async fn edit_panel(
        &self,
        channel: ChannelId,
        message: MessageId,
        panel: &Panel,
    ) -> PlatformResult<()> {
        tracing::trace!("Edit panel");
        panel.check_size()?;
        channel
            .edit_message(self.http(), message, EditMessage::new().embed(panel.into()))
            .await
            .map_err(|err| message_error(err, message))?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(channel = ?channel))]
    async fn send_text(&self, channel: ChannelId, content: &str) -> PlatformResult<MessageId> {
        tracing::trace!("Send text");
        let message = channel.say(self.http(), content).await?;
        Ok(message.id)
    }

    #[tracing::instrument(skip_all, fields(channel = ?channel, message = ?message))]
    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> PlatformResult<()> {
        tracing::trace!("Delete message");
        channel
            .delete_message(self.http(), message)
            .await
            .map_err(|err| message_error(err, message))?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(channel = ?channel, message = ?message, emoji))]
    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> PlatformResult<()> {
        tracing::trace!("Add reaction");
        channel
            .create_reaction(self.http(), message, ReactionType::Unicode(emoji.to_string()))
            .await
            .map_err(|err| message_error(err, message))?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(channel = ?channel, message = ?message))]
    async fn clear_reactions(&self, channel: ChannelId, message: MessageId) -> PlatformResult<()> {
        tracing::trace!("Clear reactions");
        channel
            .delete_reactions(self.http(), message)
            .await
            .map_err(|err| message_error(err, message))?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(user = ?user))]
    async fn open_direct_channel(&self, user: UserId) -> PlatformResult<ChannelId> {
        tracing::trace!("Open direct channel");
        Ok(user.create_dm_channel(self.http()).await?.id)
    }

    #[tracing::instrument(skip_all, fields(guild = ?guild))]
    async fn text_channels(&self, guild: GuildId) -> PlatformResult<Vec<ChannelRef>> {
        tracing::trace!("Get text channels");
        let mut channels: Vec<_> = guild
            .channels(self.http())
            .await?
            .into_values()
            .filter(|channel| channel.kind == ChannelType::Text)
            .map(|channel| ChannelRef {
                id: channel.id,
                name: channel.name,
            })
            .collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(channels)
    }
}
