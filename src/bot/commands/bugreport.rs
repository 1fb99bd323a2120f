use anyhow::Result;
use serenity::all::CommandInteraction;
use serenity::all::CreateCommand;
use serenity::all::EditInteractionResponse;

use crate::bot::Bot;
use crate::menus::bug_report::{BugReportError, BugReportMenu, Reporter};

#[derive(Debug, thiserror::Error)]
enum BugReportCommandError {
    #[error("You are already using another menu. Please finish it before filing a bug report.")]
    AlreadyInMenuError,
    #[error("I cannot DM you. Please make sure your privacy settings are set so anyone can send messages to you.")]
    DirectMessageClosedError,
}

impl Bot {
    pub fn create_bugreport_command() -> CreateCommand {
        CreateCommand::new("bugreport")
            .description("Lets you report a bug to the developer of this bot.")
    }

    #[tracing::instrument(skip_all)]
    pub async fn handle_bugreport_command(&self, interaction: &CommandInteraction) -> Result<()> {
        let user = &interaction.user;

        if let Some(kind) = self.sessions.registry.current(user.id) {
            tracing::debug!(?kind, "user is already in a menu");
            self.respond_ephemeral(
                interaction,
                BugReportCommandError::AlreadyInMenuError.to_string(),
            )
            .await?;
            return Ok(());
        }

        let dm_channel = match self.sessions.platform.open_direct_channel(user.id).await {
            Ok(channel) => channel,
            Err(err) => {
                tracing::warn!(?err, "failed to open dm channel");
                self.respond_ephemeral(
                    interaction,
                    BugReportCommandError::DirectMessageClosedError.to_string(),
                )
                .await?;
                return Ok(());
            },
        };

        self.respond_ephemeral(interaction, "Please check your direct messages.")
            .await?;

        let reporter = Reporter {
            id: user.id,
            tag: user.tag(),
            is_developer: self.developer_ids.contains(&user.id),
        };
        let menu = BugReportMenu::new(
            &self.sessions,
            self.issue_tracker.as_ref(),
            self.bot_id(),
            self.production,
        );

        match menu.run(&reporter, dm_channel).await {
            Ok(outcome) => tracing::info!(?outcome, "bug report finished"),
            // DMを受け付けていない利用者へは最初の送信で失敗する
            Err(BugReportError::PlatformError(err)) => {
                tracing::warn!(?err, "failed to talk with user in dm");
                self.edit_response(
                    interaction,
                    EditInteractionResponse::new()
                        .content(BugReportCommandError::DirectMessageClosedError.to_string()),
                )
                .await?;
            },
            Err(err) => return Err(err.into()),
        }

        Ok(())
    }
}
