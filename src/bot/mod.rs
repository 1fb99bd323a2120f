mod commands;
pub mod helpers;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::PoisonError;

use anyhow::Result;
use serenity::all::Command;
use serenity::all::CommandInteraction;
use serenity::async_trait;
use serenity::client::Client;
use serenity::client::Context;
use serenity::client::EventHandler;
use serenity::futures::StreamExt;
use serenity::http::Http;
use serenity::model::event::Event;
use serenity::model::prelude::*;
use tokio::task::JoinHandle;

use crate::collector::{EventHub, IncomingEvent, IncomingMessage, IncomingReaction};
use crate::platform::DiscordPlatform;
use crate::services::issues::IssueTracker;
use crate::services::store::GuildStore;
use crate::session::{SessionContext, SessionRegistry, Timeouts};

pub struct Configuration {
    pub token: String,
    pub application_id: u64,
    pub owner_ids: Vec<u64>,
    pub developer_ids: Vec<u64>,
    pub production: bool,
    pub timeouts: Timeouts,
}

pub struct Bot {
    token: String,
    application_id: ApplicationId,
    owner_ids: Vec<UserId>,
    developer_ids: Vec<UserId>,
    production: bool,
    // readyイベントで確定する
    bot_id: OnceLock<UserId>,
    discord_client: Arc<Http>,
    sessions: SessionContext,
    issue_tracker: Box<dyn IssueTracker>,
    // シャードごとのイベント転送タスク
    forwarders: Mutex<HashMap<ShardId, JoinHandle<()>>>,
}

impl Bot {
    pub fn new(
        config: Configuration,
        store: Arc<dyn GuildStore>,
        issue_tracker: Box<dyn IssueTracker>,
    ) -> Self {
        let application_id = ApplicationId::new(config.application_id);
        let discord_client = Arc::new(Http::new(&config.token));
        discord_client.set_application_id(application_id);

        let sessions = SessionContext {
            platform: Arc::new(DiscordPlatform::new(Arc::clone(&discord_client))),
            hub: EventHub::new(),
            registry: SessionRegistry::new(),
            store,
            timeouts: config.timeouts,
        };

        Bot {
            token: config.token,
            application_id,
            owner_ids: config.owner_ids.into_iter().map(UserId::new).collect(),
            developer_ids: config.developer_ids.into_iter().map(UserId::new).collect(),
            production: config.production,
            bot_id: OnceLock::new(),
            discord_client,
            sessions,
            issue_tracker,
            forwarders: Mutex::new(HashMap::new()),
        }
    }

    fn http(&self) -> &Http {
        &self.discord_client
    }

    // Botユーザの ID はアプリケーション ID と一致する
    fn bot_id(&self) -> UserId {
        self.bot_id
            .get()
            .copied()
            .unwrap_or_else(|| UserId::new(self.application_id.get()))
    }

    pub async fn start(self) -> Result<()> {
        let token = self.token.clone();
        let application_id = self.application_id;

        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::DIRECT_MESSAGE_REACTIONS
            | GatewayIntents::MESSAGE_CONTENT;

        let mut client = Client::builder(&token, intents)
            .application_id(application_id)
            .event_handler(self)
            .await?;

        Ok(client.start().await?)
    }

    #[tracing::instrument(skip_all)]
    async fn sync_global_application_commands(&self) -> Result<()> {
        tracing::info!("sync global application commands");
        let commands = Command::set_global_commands(self.http(), Bot::global_commands()).await?;
        for command in commands {
            tracing::debug!(name = ?command.name, id = ?command.id, "global application command synced");
        }
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub async fn delete_commands(&self) -> Result<()> {
        tracing::info!("delete global application commands");
        let commands = self.http().get_global_commands().await?;

        for command in commands {
            tracing::debug!(?command, "delete global application command");
            self.http().delete_global_command(command.id).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for Bot {
    #[tracing::instrument(skip_all, fields(
        session_id = ?ready.session_id,
        user = ?ready.user.id,
    ))]
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!("bot is ready!");
        let _ = self.bot_id.set(ready.user.id);
        self.forward_gateway_events(&ctx);

        if let Err(err) = self.sync_global_application_commands().await {
            tracing::error!(?err, "failed to sync global application commands")
        }
    }

    async fn interaction_create(&self, _: Context, interaction: Interaction) {
        if let Interaction::Command(interaction) = interaction {
            self.handle_application_command(&interaction).await;
        }
    }
}

impl Bot {
    // シャードが受け取ったメッセージとリアクションをセッションへ流し続ける。
    // 再接続で ready が再び届いたら古いタスクは捨てる
    #[tracing::instrument(skip_all, fields(shard_id = ?ctx.shard_id))]
    fn forward_gateway_events(&self, ctx: &Context) {
        let bot_id = self.bot_id();
        let hub = self.sessions.hub.clone();
        let events = serenity::collector::collect(&ctx.shard, move |event| incoming_event(event, bot_id));

        let task = tokio::spawn(async move {
            let mut events = std::pin::pin!(events);
            while let Some(event) = events.next().await {
                hub.dispatch(event);
            }
            tracing::debug!("gateway event stream closed");
        });

        let previous = self
            .forwarders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ctx.shard_id, task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    #[tracing::instrument(skip_all, fields(
        id = ?interaction.id,
        name = ?interaction.data.name,
        guild_id = ?interaction.guild_id,
        channel_id = ?interaction.channel_id,
        user = ?interaction.user.id,
    ))]
    async fn handle_application_command(&self, interaction: &CommandInteraction) {
        let result = match interaction.data.name.as_str() {
            "ping" => self.handle_ping_command(interaction).await,
            "bugreport" => self.handle_bugreport_command(interaction).await,
            "configapps" => self.handle_configapps_command(interaction).await,
            "suggestbl" => self.handle_suggestbl_command(interaction).await,
            name => {
                tracing::warn!(name, "unknown command");
                Ok(())
            },
        };

        if let Err(err) = result {
            tracing::error!(?err, "failed to handle application command");
        }
    }
}

fn incoming_event(event: &Event, bot_id: UserId) -> Option<IncomingEvent> {
    match event {
        Event::MessageCreate(event) => incoming_message(&event.message),
        Event::ReactionAdd(event) => incoming_reaction(&event.reaction, bot_id),
        _ => None,
    }
}

fn incoming_message(message: &Message) -> Option<IncomingEvent> {
    if message.author.bot {
        return None;
    }

    Some(IncomingEvent::Message(IncomingMessage {
        id: message.id,
        channel_id: message.channel_id,
        author_id: message.author.id,
        content: message.content.clone(),
    }))
}

fn incoming_reaction(reaction: &Reaction, bot_id: UserId) -> Option<IncomingEvent> {
    let user_id = reaction.user_id?;
    if user_id == bot_id {
        return None;
    }
    if reaction.member.as_ref().is_some_and(|member| member.user.bot) {
        return None;
    }
    // メニューはUnicode絵文字のみを用いる
    let ReactionType::Unicode(emoji) = &reaction.emoji else {
        return None;
    };

    Some(IncomingEvent::Reaction(IncomingReaction {
        message_id: reaction.message_id,
        channel_id: reaction.channel_id,
        user_id,
        emoji: emoji.clone(),
    }))
}
