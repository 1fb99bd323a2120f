// チャットプラットフォームに対する操作を抽象化するモジュール
mod discord;
#[cfg(test)]
pub mod recording;

pub use discord::*;

use async_trait::async_trait;
use serenity::model::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("message {0} no longer exists")]
    MessageNotFound(MessageId),

    #[error("panel is {0} characters long, which exceeds the embed limit")]
    PanelTooLarge(usize),

    #[error("{0}")]
    SerenityError(#[from] serenity::Error),
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

// Discordが受け付けるEmbedの文字数上限
pub static EMBED_LIMIT: usize = 6000;
pub static FIELD_VALUE_LIMIT: usize = 1024;

/// Rendered content of a session message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Panel {
    pub author: Option<String>,
    pub title: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub footer: Option<String>,
}

impl Panel {
    pub fn new<S: Into<String>>(title: S) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn author<S: Into<String>>(mut self, author: S) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn field<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn footer<S: Into<String>>(mut self, footer: S) -> Self {
        self.footer = Some(footer.into());
        self
    }

    /// Character count as Discord measures it for the embed total.
    pub fn embed_length(&self) -> usize {
        let count = |s: &str| s.chars().count();
        count(&self.title)
            + count(&self.description)
            + self.author.as_deref().map_or(0, count)
            + self.footer.as_deref().map_or(0, count)
            + self
                .fields
                .iter()
                .map(|(name, value)| count(name) + count(value))
                .sum::<usize>()
    }

    pub fn check_size(&self) -> PlatformResult<()> {
        let length = self.embed_length();
        let oversized_field = self
            .fields
            .iter()
            .any(|(_, value)| value.chars().count() > FIELD_VALUE_LIMIT);
        if length > EMBED_LIMIT || oversized_field {
            return Err(PlatformError::PanelTooLarge(length));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: ChannelId,
    pub name: String,
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn send_panel(&self, channel: ChannelId, panel: &Panel) -> PlatformResult<MessageId>;

    async fn edit_panel(
        &self,
        channel: ChannelId,
        message: MessageId,
        panel: &Panel,
    ) -> PlatformResult<()>;

    async fn send_text(&self, channel: ChannelId, content: &str) -> PlatformResult<MessageId>;

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> PlatformResult<()>;

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> PlatformResult<()>;

    async fn clear_reactions(&self, channel: ChannelId, message: MessageId) -> PlatformResult<()>;

    async fn open_direct_channel(&self, user: UserId) -> PlatformResult<ChannelId>;

    async fn text_channels(&self, guild: GuildId) -> PlatformResult<Vec<ChannelRef>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_length_counts_every_part() {
        let panel = Panel::new("abc")
            .author("de")
            .description("日本語")
            .field("f", "gh")
            .footer("i");
        assert_eq!(panel.embed_length(), 12);
        assert!(panel.check_size().is_ok());
    }

    #[test]
    fn oversized_panels_are_rejected() {
        let panel = Panel::new("title").description("x".repeat(EMBED_LIMIT));
        assert!(matches!(panel.check_size(), Err(PlatformError::PanelTooLarge(_))));

        let panel = Panel::new("title").field("name", "x".repeat(FIELD_VALUE_LIMIT + 1));
        assert!(matches!(panel.check_size(), Err(PlatformError::PanelTooLarge(_))));
    }
}
