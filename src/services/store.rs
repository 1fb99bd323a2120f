use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_derive::{Deserialize, Serialize};
use serenity::model::prelude::*;
use tokio::sync::RwLock;

use crate::models::*;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("application `{0}` not found")]
    ApplicationNotFound(String),
    #[error("application `{0}` already exists")]
    DuplicateApplication(String),
    #[error("a guild may not have more than {} applications", MAX_APPLICATIONS)]
    TooManyApplications,
    #[error("an application may not have more than {} questions", MAX_QUESTIONS)]
    TooManyQuestions,
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationUpdate {
    Enabled(bool),
    Name(String),
    Channel(String),
    Questions(Vec<String>),
}

/// Document-style persistence for guild and bot settings. Every write returns
/// the document as it is after the write.
#[async_trait]
pub trait GuildStore: Send + Sync {
    async fn guild(&self, guild_id: GuildId) -> StoreResult<GuildDocument>;

    async fn push_application(
        &self,
        guild_id: GuildId,
        application: Application,
    ) -> StoreResult<GuildDocument>;

    async fn update_application(
        &self,
        guild_id: GuildId,
        name: &str,
        update: ApplicationUpdate,
    ) -> StoreResult<GuildDocument>;

    async fn pull_application(&self, guild_id: GuildId, name: &str) -> StoreResult<GuildDocument>;

    /// Returns the bot settings, initialising the developer section when missing.
    async fn bot_settings(&self, bot_id: UserId) -> StoreResult<BotSettings>;

    async fn push_bug_report(&self, bot_id: UserId, report: BugReport) -> StoreResult<BotSettings>;

    async fn push_blacklisted(&self, bot_id: UserId, user_id: UserId) -> StoreResult<BotSettings>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Documents {
    #[serde(default)]
    guilds: BTreeMap<u64, GuildDocument>,
    #[serde(default)]
    bots: BTreeMap<u64, BotSettings>,
}

impl Documents {
    fn guild_mut(&mut self, guild_id: GuildId) -> &mut GuildDocument {
        self.guilds
            .entry(guild_id.get())
            .or_insert_with(|| GuildDocument::new(guild_id.get()))
    }

    fn dev_mut(&mut self, bot_id: UserId) -> &mut DevSettings {
        self.bots
            .entry(bot_id.get())
            .or_insert_with(|| BotSettings::new(bot_id.get()))
            .dev
            .get_or_insert_with(DevSettings::default)
    }

    fn push_application(
        &mut self,
        guild_id: GuildId,
        application: Application,
    ) -> StoreResult<GuildDocument> {
        let guild = self.guild_mut(guild_id);
        if guild.is_name_taken(&application.name) {
            return Err(StoreError::DuplicateApplication(application.name));
        }
        if !guild.can_create_application() {
            return Err(StoreError::TooManyApplications);
        }
        guild.applications.push(application);
        Ok(guild.clone())
    }

    fn update_application(
        &mut self,
        guild_id: GuildId,
        name: &str,
        update: ApplicationUpdate,
    ) -> StoreResult<GuildDocument> {
        let guild = self.guild_mut(guild_id);

        if let ApplicationUpdate::Name(new_name) = &update {
            let taken = guild
                .applications
                .iter()
                .any(|app| app.has_name(new_name) && !app.has_name(name));
            if taken {
                return Err(StoreError::DuplicateApplication(new_name.clone()));
            }
        }

        let application = guild
            .application_mut(name)
            .ok_or_else(|| StoreError::ApplicationNotFound(name.to_string()))?;

        match update {
            ApplicationUpdate::Enabled(is_enabled) => application.is_enabled = is_enabled,
            ApplicationUpdate::Name(new_name) => application.name = new_name,
            ApplicationUpdate::Channel(channel) => application.channel = channel,
            ApplicationUpdate::Questions(questions) => {
                if questions.len() > MAX_QUESTIONS {
                    return Err(StoreError::TooManyQuestions);
                }
                application.questions = questions;
            },
        }

        Ok(guild.clone())
    }

    fn pull_application(&mut self, guild_id: GuildId, name: &str) -> StoreResult<GuildDocument> {
        let guild = self.guild_mut(guild_id);
        let before = guild.applications.len();
        guild.applications.retain(|app| !app.has_name(name));
        if guild.applications.len() == before {
            return Err(StoreError::ApplicationNotFound(name.to_string()));
        }
        Ok(guild.clone())
    }
}

/// In-memory document store, optionally mirrored to a JSON file after every write.
pub struct DocumentStore {
    documents: RwLock<Documents>,
    path: Option<PathBuf>,
}

impl DocumentStore {
    pub fn in_memory() -> Self {
        Self {
            documents: RwLock::new(Documents::default()),
            path: None,
        }
    }

    #[tracing::instrument(skip_all, fields(path = ?path.as_ref()))]
    pub async fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let documents = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("document file not found, starting empty");
                Documents::default()
            },
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            documents: RwLock::new(documents),
            path: Some(path),
        })
    }

    async fn flush(&self, documents: &Documents) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        tracing::trace!(?path, "flush documents");

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // 書き込み途中で落ちても元のファイルが壊れないよう、一時ファイル経由で置き換える
        let temporary = path.with_extension("json.tmp");
        tokio::fs::write(&temporary, serde_json::to_vec_pretty(documents)?).await?;
        tokio::fs::rename(&temporary, path).await?;
        Ok(())
    }

    async fn write<T, F>(&self, mutate: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Documents) -> StoreResult<T> + Send,
        T: Send,
    {
        let mut documents = self.documents.write().await;
        let mut updated = documents.clone();
        let result = mutate(&mut updated)?;
        self.flush(&updated).await?;
        *documents = updated;
        Ok(result)
    }
}

#[async_trait]
impl GuildStore for DocumentStore {
    #[tracing::instrument(skip(self))]
    async fn guild(&self, guild_id: GuildId) -> StoreResult<GuildDocument> {
        let documents = self.documents.read().await;
        Ok(documents
            .guilds
            .get(&guild_id.get())
            .cloned()
            .unwrap_or_else(|| GuildDocument::new(guild_id.get())))
    }

    #[tracing::instrument(skip(self))]
    async fn push_application(
        &self,
        guild_id: GuildId,
        application: Application,
    ) -> StoreResult<GuildDocument> {
        self.write(|documents| documents.push_application(guild_id, application))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn update_application(
        &self,
        guild_id: GuildId,
        name: &str,
        update: ApplicationUpdate,
    ) -> StoreResult<GuildDocument> {
        self.write(|documents| documents.update_application(guild_id, name, update))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn pull_application(&self, guild_id: GuildId, name: &str) -> StoreResult<GuildDocument> {
        self.write(|documents| documents.pull_application(guild_id, name))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn bot_settings(&self, bot_id: UserId) -> StoreResult<BotSettings> {
        {
            let documents = self.documents.read().await;
            if let Some(settings) = documents.bots.get(&bot_id.get()) {
                if settings.dev.is_some() {
                    return Ok(settings.clone());
                }
            }
        }

        self.write(|documents| {
            documents.dev_mut(bot_id);
            Ok(documents.bots[&bot_id.get()].clone())
        })
        .await
    }

    #[tracing::instrument(skip(self, report), fields(title = %report.title))]
    async fn push_bug_report(&self, bot_id: UserId, report: BugReport) -> StoreResult<BotSettings> {
        self.write(|documents| {
            documents.dev_mut(bot_id).bugs.push(report);
            Ok(documents.bots[&bot_id.get()].clone())
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn push_blacklisted(&self, bot_id: UserId, user_id: UserId) -> StoreResult<BotSettings> {
        self.write(|documents| {
            documents
                .dev_mut(bot_id)
                .blacklisted
                .push(user_id.get().to_string());
            Ok(documents.bots[&bot_id.get()].clone())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guild() -> GuildId {
        GuildId::new(1)
    }

    #[tokio::test]
    async fn create_add_questions_and_reload() {
        let store = DocumentStore::in_memory();
        store
            .push_application(guild(), Application::new("Foo"))
            .await
            .unwrap();
        store
            .update_application(
                guild(),
                "Foo",
                ApplicationUpdate::Questions(vec![String::from("Q1"), String::from("Q2")]),
            )
            .await
            .unwrap();

        let reloaded = store.guild(guild()).await.unwrap();
        let app = reloaded.application("Foo").unwrap();
        assert_eq!(app.questions, vec!["Q1", "Q2"]);
        assert!(!app.is_enabled);
        assert_eq!(app.channel, "");
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected_case_insensitively() {
        let store = DocumentStore::in_memory();
        store
            .push_application(guild(), Application::new("Foo"))
            .await
            .unwrap();

        let err = store
            .push_application(guild(), Application::new("foo"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateApplication(_)));

        store
            .push_application(guild(), Application::new("Bar"))
            .await
            .unwrap();
        let err = store
            .update_application(guild(), "Bar", ApplicationUpdate::Name(String::from("FOO")))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateApplication(_)));

        // 自分自身の大文字小文字を変えるだけの変更は許可する
        let doc = store
            .update_application(guild(), "Bar", ApplicationUpdate::Name(String::from("BAR")))
            .await
            .unwrap();
        assert!(doc.applications.iter().any(|app| app.name == "BAR"));
    }

    #[tokio::test]
    async fn update_on_missing_application_is_a_conflict() {
        let store = DocumentStore::in_memory();
        let err = store
            .update_application(guild(), "Ghost", ApplicationUpdate::Enabled(true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ApplicationNotFound(_)));

        let err = store.pull_application(guild(), "Ghost").await.unwrap_err();
        assert!(matches!(err, StoreError::ApplicationNotFound(_)));
    }

    #[tokio::test]
    async fn application_count_is_bounded() {
        let store = DocumentStore::in_memory();
        for i in 0..MAX_APPLICATIONS {
            store
                .push_application(guild(), Application::new(format!("App {}", i)))
                .await
                .unwrap();
        }
        let err = store
            .push_application(guild(), Application::new("One too many"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TooManyApplications));
    }

    #[tokio::test]
    async fn question_count_is_bounded() {
        let store = DocumentStore::in_memory();
        store
            .push_application(guild(), Application::new("Foo"))
            .await
            .unwrap();
        let questions = (0..=MAX_QUESTIONS).map(|i| format!("Q{}", i)).collect();
        let err = store
            .update_application(guild(), "Foo", ApplicationUpdate::Questions(questions))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TooManyQuestions));
    }

    #[tokio::test]
    async fn pull_removes_only_the_named_application() {
        let store = DocumentStore::in_memory();
        store
            .push_application(guild(), Application::new("Foo"))
            .await
            .unwrap();
        store
            .push_application(guild(), Application::new("Bar"))
            .await
            .unwrap();

        let doc = store.pull_application(guild(), "foo").await.unwrap();
        assert_eq!(doc.applications.len(), 1);
        assert_eq!(doc.applications[0].name, "Bar");
    }

    #[tokio::test]
    async fn bot_settings_are_initialised() {
        let store = DocumentStore::in_memory();
        let bot = UserId::new(5);
        let settings = store.bot_settings(bot).await.unwrap();
        assert_eq!(settings.dev, Some(DevSettings::default()));

        let settings = store.push_blacklisted(bot, UserId::new(9)).await.unwrap();
        assert!(settings.dev.unwrap().is_blacklisted("9"));
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("documents.json");

        let store = DocumentStore::open(&path).await.unwrap();
        store
            .push_application(guild(), Application::new("Foo"))
            .await
            .unwrap();
        store
            .update_application(guild(), "Foo", ApplicationUpdate::Enabled(true))
            .await
            .unwrap();
        drop(store);

        let reopened = DocumentStore::open(&path).await.unwrap();
        let doc = reopened.guild(guild()).await.unwrap();
        assert!(doc.application("Foo").unwrap().is_enabled);
    }
}
