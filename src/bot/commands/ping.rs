use anyhow::Result;
use serenity::all::CommandInteraction;
use serenity::all::CreateCommand;
use serenity::all::CreateInteractionResponseMessage;

use crate::bot::Bot;

impl Bot {
    pub fn create_ping_command() -> CreateCommand {
        CreateCommand::new("ping").description("Checks whether the bot is alive.")
    }

    #[tracing::instrument(skip_all)]
    pub async fn handle_ping_command(&self, interaction: &CommandInteraction) -> Result<()> {
        self.respond(
            interaction,
            CreateInteractionResponseMessage::new().content("pong!"),
        )
        .await?;
        Ok(())
    }
}
