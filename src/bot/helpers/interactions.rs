use serenity::all::CommandDataOption;
use serenity::all::CommandInteraction;
use serenity::all::CreateInteractionResponse;
use serenity::all::CreateInteractionResponseMessage;
use serenity::all::EditInteractionResponse;
use serenity::model::prelude::*;

use super::HelperResult;
use crate::bot::Bot;

// Interactionに対する操作するためのヘルパー関数
impl Bot {
    // ユーザからのinteractionに即時応答するメソッド
    pub async fn respond(
        &self,
        interaction: &CommandInteraction,
        data: CreateInteractionResponseMessage,
    ) -> HelperResult<()> {
        interaction
            .create_response(self.http(), CreateInteractionResponse::Message(data))
            .await?;
        Ok(())
    }

    // ユーザからのinteractionの応答を編集するメソッド
    pub async fn edit_response(
        &self,
        interaction: &CommandInteraction,
        data: EditInteractionResponse,
    ) -> HelperResult<()> {
        interaction.edit_response(self.http(), data).await?;
        Ok(())
    }

    pub async fn respond_ephemeral(
        &self,
        interaction: &CommandInteraction,
        content: impl Into<String>,
    ) -> HelperResult<()> {
        self.respond(
            interaction,
            CreateInteractionResponseMessage::new()
                .ephemeral(true)
                .content(content),
        )
        .await
    }

    pub fn get_option_as_user(&self, options: &[CommandDataOption], name: &str) -> Option<UserId> {
        options
            .iter()
            .find(|option| option.name == name)
            .and_then(|option| option.value.as_user_id())
    }
}
