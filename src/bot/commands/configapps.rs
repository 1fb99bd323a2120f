use anyhow::Result;
use serenity::all::CommandInteraction;
use serenity::all::CreateCommand;
use serenity::all::EditInteractionResponse;
use serenity::all::Permissions;

use crate::bot::Bot;
use crate::menus::applications::{ApplicationWizard, WizardOutcome};

#[derive(Debug, thiserror::Error)]
enum ConfigAppsCommandError {
    #[error("This command can only be used in a server.")]
    CalledFromDirectMessageError,
    #[error("You are already using another menu. Please finish it before configuring applications.")]
    AlreadyInMenuError,
    #[error("The changes could not be saved. Please try again later.")]
    SaveFailedError,
    #[error("The menu could not be shown and has been closed. Please try again later.")]
    MenuFailedError,
}

impl Bot {
    pub fn create_configapps_command() -> CreateCommand {
        CreateCommand::new("configapps")
            .description("Creates, edits, or deletes the applications of this server.")
            .default_member_permissions(Permissions::BAN_MEMBERS)
            .dm_permission(false)
    }

    #[tracing::instrument(skip_all)]
    pub async fn handle_configapps_command(&self, interaction: &CommandInteraction) -> Result<()> {
        let Some(guild_id) = interaction.guild_id else {
            self.respond_ephemeral(
                interaction,
                ConfigAppsCommandError::CalledFromDirectMessageError.to_string(),
            )
            .await?;
            return Ok(());
        };

        if self.sessions.registry.current(interaction.user.id).is_some() {
            self.respond_ephemeral(
                interaction,
                ConfigAppsCommandError::AlreadyInMenuError.to_string(),
            )
            .await?;
            return Ok(());
        }

        self.respond_ephemeral(interaction, "Opening the application configuration menu.")
            .await?;

        let outcome = ApplicationWizard::new(&self.sessions)
            .run(guild_id, interaction.user.id, interaction.channel_id)
            .await?;
        tracing::info!(?outcome, "application configuration finished");

        let err = match outcome {
            WizardOutcome::SaveFailed => ConfigAppsCommandError::SaveFailedError,
            WizardOutcome::Failed => ConfigAppsCommandError::MenuFailedError,
            WizardOutcome::Busy | WizardOutcome::Closed(_) => return Ok(()),
        };
        self.edit_response(
            interaction,
            EditInteractionResponse::new().content(err.to_string()),
        )
        .await?;

        Ok(())
    }
}
