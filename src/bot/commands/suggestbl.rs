use anyhow::Result;
use serenity::all::CommandInteraction;
use serenity::all::CommandOptionType;
use serenity::all::CreateCommand;
use serenity::all::CreateCommandOption;
use serenity::all::CreateInteractionResponseMessage;
use serenity::model::prelude::*;

use crate::bot::Bot;
use crate::services::store::{GuildStore, StoreError};

#[derive(Debug, thiserror::Error)]
enum SuggestBlacklistCommandError {
    #[error("Only the bot owner can use this command.")]
    NotOwnerError,
    #[error("No user was found. Please specify a valid user.")]
    UserNotFoundError,
    #[error("You cannot run this command on yourself.")]
    SamePersonAsAuthorError,
    #[error("<@{0}> is already blacklisted from using the bot suggestions feature.")]
    AlreadyBlacklistedError(UserId),

    #[error("An unexpected error occurred.")]
    StoreError(#[from] StoreError),
}

type SuggestBlacklistCommandResult<T> = std::result::Result<T, SuggestBlacklistCommandError>;

async fn blacklist_suggestion_user(
    store: &dyn GuildStore,
    bot_id: UserId,
    owner_ids: &[UserId],
    invoker: UserId,
    target: Option<UserId>,
) -> SuggestBlacklistCommandResult<UserId> {
    if !owner_ids.contains(&invoker) {
        return Err(SuggestBlacklistCommandError::NotOwnerError);
    }
    let target = target.ok_or(SuggestBlacklistCommandError::UserNotFoundError)?;
    if target == invoker {
        return Err(SuggestBlacklistCommandError::SamePersonAsAuthorError);
    }

    let settings = store.bot_settings(bot_id).await?;
    let already = settings
        .dev
        .is_some_and(|dev| dev.is_blacklisted(&target.get().to_string()));
    if already {
        return Err(SuggestBlacklistCommandError::AlreadyBlacklistedError(target));
    }

    store.push_blacklisted(bot_id, target).await?;
    Ok(target)
}

impl Bot {
    pub fn create_suggestbl_command() -> CreateCommand {
        CreateCommand::new("suggestbl")
            .description("Blacklists a user from submitting bug reports and suggestions.")
            .add_option(
                CreateCommandOption::new(CommandOptionType::User, "user", "User to blacklist")
                    .required(true),
            )
    }

    #[tracing::instrument(skip_all)]
    pub async fn handle_suggestbl_command(&self, interaction: &CommandInteraction) -> Result<()> {
        let target = self.get_option_as_user(&interaction.data.options, "user");

        let result = blacklist_suggestion_user(
            self.sessions.store.as_ref(),
            self.bot_id(),
            &self.owner_ids,
            interaction.user.id,
            target,
        )
        .await;

        let content = match result {
            Ok(target) => {
                tracing::info!(?target, "user blacklisted from suggestions");
                format!(
                    "<@{}> has been blacklisted from submitting suggestions successfully.",
                    target
                )
            },
            Err(err) => {
                if let SuggestBlacklistCommandError::StoreError(err) = &err {
                    tracing::error!(?err, "failed to blacklist user");
                }
                err.to_string()
            },
        };

        self.respond(
            interaction,
            CreateInteractionResponseMessage::new()
                .ephemeral(true)
                .content(content),
        )
        .await?;
        Ok(())
    }
}
