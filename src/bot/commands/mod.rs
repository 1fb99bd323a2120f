mod bugreport;
mod configapps;
mod ping;
mod suggestbl;

use serenity::all::CreateCommand;

use crate::bot::Bot;

impl Bot {
    pub(super) fn global_commands() -> Vec<CreateCommand> {
        vec![
            Bot::create_ping_command(),
            Bot::create_bugreport_command(),
            Bot::create_configapps_command(),
            Bot::create_suggestbl_command(),
        ]
    }
}
