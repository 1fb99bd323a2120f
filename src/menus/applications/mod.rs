// ギルドの申請フォームを対話的に設定するメニュー
mod state;

pub use state::*;

use std::time::Duration;

use serenity::model::prelude::*;

use crate::collector::CollectorResult;
use crate::models::GuildDocument;
use crate::platform::{ChannelRef, Panel, PlatformResult};
use crate::services::store::StoreResult;
use crate::session::{MenuKind, Session, SessionContext, SessionEnd};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardOutcome {
    /// 別のメニューを操作中
    Busy,
    Closed(SessionEnd),
    /// 保存に失敗したためセッションを打ち切った
    SaveFailed,
    /// メニューの表示に失敗したためセッションを打ち切った
    Failed,
}

pub struct ApplicationWizard<'a> {
    context: &'a SessionContext,
    notice: Duration,
}

impl<'a> ApplicationWizard<'a> {
    pub fn new(context: &'a SessionContext) -> Self {
        Self {
            context,
            notice: Duration::from_secs(5),
        }
    }

    /// How long the "application created" notice stays before returning to the main menu.
    pub fn notice_duration(mut self, notice: Duration) -> Self {
        self.notice = notice;
        self
    }

    async fn execute(&self, guild_id: GuildId, write: Write) -> StoreResult<GuildDocument> {
        let store = &self.context.store;
        match write {
            Write::Create(application) => store.push_application(guild_id, application).await,
            Write::Update { name, update } => {
                store.update_application(guild_id, &name, update).await
            },
            Write::Delete { name } => store.pull_application(guild_id, &name).await,
        }
    }

    async fn show_created(&self, session: &mut Session, name: &str) -> PlatformResult<()> {
        session.clear_menu().await;
        session
            .render(
                &Panel::new("Application Created").description(format!(
                    "Your application, named `{}`, has been created. It is currently disabled and no questions have been provided. To manage this application, please edit the application.",
                    name
                )),
            )
            .await?;
        tokio::time::sleep(self.notice).await;
        Ok(())
    }

    // 最後の案内を表示してセッションを閉じる。元のメッセージが使えなければ新しく送る
    async fn close_with(mut session: Session, panel: Panel) {
        session.clear_menu().await;
        if session.render(&panel).await.is_err() {
            session.discard_message().await;
            if let Err(err) = session.render(&panel).await {
                tracing::warn!(?err, "failed to show closing notice");
            }
        }
        session.finish(SessionEnd::Completed).await;
    }

    #[tracing::instrument(skip_all, fields(guild_id = ?guild_id, user = ?user, channel = ?channel))]
    pub async fn run(
        &self,
        guild_id: GuildId,
        user: UserId,
        channel: ChannelId,
    ) -> StoreResult<WizardOutcome> {
        let guild = self.context.store.guild(guild_id).await?;
        let Some(mut session) = self
            .context
            .open(user, channel, MenuKind::ApplicationConfig)
        else {
            return Ok(WizardOutcome::Busy);
        };

        let outcome = match self.drive(&mut session, guild_id, guild).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(?err, "failed to show application menu");
                Self::close_with(
                    session,
                    Panel::new("Failed").description(
                        "Something went wrong while showing this menu, so it has been closed. Any unsaved changes were discarded; please run this command again.",
                    ),
                )
                .await;
                return Ok(WizardOutcome::Failed);
            },
        };

        match outcome {
            WizardOutcome::Closed(end) => session.finish(end).await,
            _ => {
                Self::close_with(
                    session,
                    Panel::new("Failed to Save").description(
                        "Your changes could not be saved. The application may have been changed or deleted by someone else; please run this command again.",
                    ),
                )
                .await
            },
        }
        Ok(outcome)
    }

    // 画面遷移を繰り返し、セッションの終わり方を返す。後始末は呼び出し側が行う
    async fn drive(
        &self,
        session: &mut Session,
        guild_id: GuildId,
        mut guild: GuildDocument,
    ) -> PlatformResult<WizardOutcome> {
        let timeouts = self.context.timeouts;
        let mut navigator = Navigator::new();
        // チャンネル一覧はチャンネル変更画面で初めて必要になる
        let mut channels: Option<Vec<ChannelRef>> = None;

        loop {
            if !navigator.current().is_valid(&guild) {
                tracing::debug!(screen = ?navigator.current(), "application is gone, return to main menu");
                navigator.apply(Nav::Home);
            }

            let view = view(navigator.current(), &guild);
            if view.prompt == PromptKind::Channel && channels.is_none() {
                channels = Some(self.context.platform.text_channels(guild_id).await?);
            }
            let prompt = view
                .prompt
                .build(&guild, channels.as_deref().unwrap_or_default());
            let timeout = match view.deadline {
                Deadline::Menu => timeouts.menu(),
                Deadline::Prompt => timeouts.prompt(),
                Deadline::Confirm => timeouts.confirm(),
            };

            let input = match session
                .ask(&view.panel, prompt.as_ref(), &view.menu, timeout)
                .await?
            {
                CollectorResult::Text(input) => input,
                CollectorResult::Reaction(emoji) => Input::Reaction(emoji),
                CollectorResult::TimedOut => Input::TimedOut,
                CollectorResult::Cancelled => return Ok(WizardOutcome::Closed(SessionEnd::Cancelled)),
            };

            match step(navigator.current(), &guild, input) {
                Transition::Navigate(nav) => navigator.apply(nav),
                Transition::Persist { write, then } => {
                    let created = match &write {
                        Write::Create(application) => Some(application.name.clone()),
                        _ => None,
                    };

                    match self.execute(guild_id, write).await {
                        Ok(updated) => guild = updated,
                        Err(err) => {
                            tracing::error!(?err, "failed to save application");
                            return Ok(WizardOutcome::SaveFailed);
                        },
                    }

                    if let Some(name) = created {
                        self.show_created(session, &name).await?;
                    }
                    navigator.apply(then);
                },
                Transition::Exit(end) => return Ok(WizardOutcome::Closed(end)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::collector::testing::{message, reaction, wait_for_subscriptions};
    use crate::collector::EventHub;
    use crate::models::{Application, MAX_QUESTIONS, MAX_QUESTION_LENGTH};
    use crate::platform::recording::{PlatformCall, RecordingPlatform};
    use crate::session::testing::{context, context_with};

    static SESSION_MESSAGE: u64 = 1001;

    fn guild() -> GuildId {
        GuildId::new(1)
    }

    // 画面ごとに1つずつ入力を送るための小さなドライバ
    struct Script<'a> {
        hub: &'a EventHub,
        opened: u64,
    }

    impl<'a> Script<'a> {
        fn new(hub: &'a EventHub) -> Self {
            Self { hub, opened: 0 }
        }

        async fn react(&mut self, emoji: &str) {
            self.opened += 1;
            wait_for_subscriptions(self.hub, self.opened).await;
            self.hub.dispatch(reaction(1, SESSION_MESSAGE, emoji));
        }

        async fn say(&mut self, text: &str) {
            self.opened += 1;
            wait_for_subscriptions(self.hub, self.opened).await;
            self.hub.dispatch(message(1, 10, text));
        }
    }

    fn spawn_wizard(
        context: SessionContext,
    ) -> tokio::task::JoinHandle<StoreResult<WizardOutcome>> {
        tokio::spawn(async move {
            ApplicationWizard::new(&context)
                .notice_duration(Duration::ZERO)
                .run(guild(), UserId::new(1), ChannelId::new(10))
                .await
        })
    }

    #[tokio::test]
    async fn create_add_questions_and_save() {
        let (context, recording) = context();
        let hub = context.hub.clone();
        let store = Arc::clone(&context.store);
        let task = spawn_wizard(context);

        let mut script = Script::new(&hub);
        script.react(CREATE_EMOJI).await;
        script.say("Foo").await;
        script.react(CONFIRM_EMOJI).await;
        script.react(EDIT_EMOJI).await;
        script.react("1⃣").await;
        script.react(QUESTIONS_EMOJI).await;
        script.react(ADD_QUESTION_EMOJI).await;
        script.react(END_EMOJI).await;
        script.say("Q1 | Q2").await;
        script.react(CONFIRM_EMOJI).await;
        script.react(SAVE_EMOJI).await;
        script.react(CANCEL_EMOJI).await;

        assert_eq!(
            task.await.unwrap().unwrap(),
            WizardOutcome::Closed(SessionEnd::Cancelled)
        );
        assert_eq!(hub.listener_count(), 0);
        assert!(recording.is_deleted(MessageId::new(SESSION_MESSAGE)));

        let doc = store.guild(guild()).await.unwrap();
        let app = doc.application("Foo").unwrap();
        assert_eq!(app.questions, vec!["Q1", "Q2"]);
        assert!(!app.is_enabled);
        assert_eq!(app.channel, "");
    }

    #[tokio::test]
    async fn discarded_question_edits_are_not_saved() {
        let (context, _) = context();
        let hub = context.hub.clone();
        let store = Arc::clone(&context.store);
        let mut app = Application::new("Foo");
        app.questions = vec![String::from("A"), String::from("B"), String::from("C")];
        store.push_application(guild(), app).await.unwrap();
        let task = spawn_wizard(context);

        let mut script = Script::new(&hub);
        script.react(EDIT_EMOJI).await;
        script.react("1⃣").await;
        script.react(QUESTIONS_EMOJI).await;
        script.react(REMOVE_QUESTION_EMOJI).await;
        script.say("2").await;
        // 保存せずに戻る
        script.react(BACK_EMOJI).await;
        script.react(QUESTIONS_EMOJI).await;
        script.react(SWAP_EMOJI).await;
        script.say("1 3").await;
        script.react(CONFIRM_EMOJI).await;
        script.react(SAVE_EMOJI).await;
        script.react(CANCEL_EMOJI).await;

        assert_eq!(
            task.await.unwrap().unwrap(),
            WizardOutcome::Closed(SessionEnd::Cancelled)
        );
        let doc = store.guild(guild()).await.unwrap();
        assert_eq!(doc.application("Foo").unwrap().questions, vec!["C", "B", "A"]);
    }

    #[tokio::test]
    async fn channel_and_name_changes_are_persisted() {
        let platform = RecordingPlatform::new().with_channels(vec![ChannelRef {
            id: ChannelId::new(42),
            name: String::from("applications"),
        }]);
        let (context, _) = context_with(platform);
        let hub = context.hub.clone();
        let store = Arc::clone(&context.store);
        store
            .push_application(guild(), Application::new("Foo"))
            .await
            .unwrap();
        let task = spawn_wizard(context);

        let mut script = Script::new(&hub);
        script.react(EDIT_EMOJI).await;
        script.react("1⃣").await;
        script.react(CHANNEL_EMOJI).await;
        script.say("#applications").await;
        script.react(CONFIRM_EMOJI).await;
        script.react(RENAME_EMOJI).await;
        script.say("Leader").await;
        script.react(CONFIRM_EMOJI).await;
        script.react(TOGGLE_EMOJI).await;
        script.react(CANCEL_EMOJI).await;

        task.await.unwrap().unwrap();
        let doc = store.guild(guild()).await.unwrap();
        assert!(doc.application("Foo").is_none());
        let app = doc.application("Leader").unwrap();
        assert_eq!(app.channel, "42");
        assert!(app.is_enabled);
    }

    #[tokio::test]
    async fn delete_requires_confirmation() {
        let (context, _) = context();
        let hub = context.hub.clone();
        let store = Arc::clone(&context.store);
        store
            .push_application(guild(), Application::new("Foo"))
            .await
            .unwrap();
        let task = spawn_wizard(context);

        let mut script = Script::new(&hub);
        script.react(EDIT_EMOJI).await;
        script.react("1⃣").await;
        script.react(DELETE_EMOJI).await;
        // ❌ は削除の取り消し
        script.react(CANCEL_EMOJI).await;
        script.react(DELETE_EMOJI).await;
        script.react(CONFIRM_EMOJI).await;
        script.react(CANCEL_EMOJI).await;

        assert_eq!(
            task.await.unwrap().unwrap(),
            WizardOutcome::Closed(SessionEnd::Cancelled)
        );
        assert!(store.guild(guild()).await.unwrap().applications.is_empty());
    }

    #[tokio::test]
    async fn failed_write_aborts_the_session() {
        let (context, recording) = context();
        let hub = context.hub.clone();
        let store = Arc::clone(&context.store);
        let registry = context.registry.clone();
        store
            .push_application(guild(), Application::new("Foo"))
            .await
            .unwrap();
        let task = spawn_wizard(context);

        let mut script = Script::new(&hub);
        script.react(EDIT_EMOJI).await;
        script.react("1⃣").await;
        script.opened += 1;
        wait_for_subscriptions(&hub, script.opened).await;
        // 操作中に別の場所で削除された
        store.pull_application(guild(), "Foo").await.unwrap();
        hub.dispatch(reaction(1, SESSION_MESSAGE, TOGGLE_EMOJI));

        assert_eq!(task.await.unwrap().unwrap(), WizardOutcome::SaveFailed);
        assert_eq!(recording.last_panel().unwrap().title, "Failed to Save");
        assert!(registry.is_empty());
        assert_eq!(hub.listener_count(), 0);
    }

    #[tokio::test]
    async fn vanished_menu_message_closes_the_session() {
        let (context, recording) = context();
        let hub = context.hub.clone();
        let registry = context.registry.clone();
        let task = spawn_wizard(context);

        let mut script = Script::new(&hub);
        script.opened += 1;
        wait_for_subscriptions(&hub, script.opened).await;
        // メニューのメッセージが他の誰かに削除された
        recording.remove_message(MessageId::new(SESSION_MESSAGE));
        hub.dispatch(reaction(1, SESSION_MESSAGE, CREATE_EMOJI));

        assert_eq!(task.await.unwrap().unwrap(), WizardOutcome::Failed);
        assert!(registry.is_empty());
        assert_eq!(hub.listener_count(), 0);
        let last = recording.last_panel().unwrap();
        assert_eq!(last.title, "Failed");
    }

    #[tokio::test]
    async fn full_question_list_can_be_shown_and_saved() {
        let (context, recording) = context();
        let hub = context.hub.clone();
        let store = Arc::clone(&context.store);
        let mut app = Application::new("Foo");
        app.questions = (0..MAX_QUESTIONS - 1)
            .map(|i| format!("{}{}", i, "q".repeat(MAX_QUESTION_LENGTH - 2)))
            .collect();
        store.push_application(guild(), app).await.unwrap();
        let task = spawn_wizard(context);

        let mut script = Script::new(&hub);
        script.react(EDIT_EMOJI).await;
        script.react("1⃣").await;
        script.react(QUESTIONS_EMOJI).await;
        script.react(ADD_QUESTION_EMOJI).await;
        script.react(END_EMOJI).await;
        script.say(&"z".repeat(MAX_QUESTION_LENGTH)).await;
        script.react(CONFIRM_EMOJI).await;
        script.react(SAVE_EMOJI).await;
        script.react(CANCEL_EMOJI).await;

        assert_eq!(
            task.await.unwrap().unwrap(),
            WizardOutcome::Closed(SessionEnd::Cancelled)
        );
        let doc = store.guild(guild()).await.unwrap();
        assert_eq!(doc.application("Foo").unwrap().questions.len(), MAX_QUESTIONS);
        assert!(recording
            .calls()
            .iter()
            .all(|call| match call {
                PlatformCall::SendPanel(_, _, panel) | PlatformCall::EditPanel(_, _, panel) => {
                    panel.check_size().is_ok()
                },
                _ => true,
            }));
    }

    #[tokio::test]
    async fn second_wizard_for_same_user_is_refused() {
        let (context, _) = context();
        let _guard = context
            .registry
            .try_enter(UserId::new(1), MenuKind::BugReport)
            .unwrap();

        let outcome = ApplicationWizard::new(&context)
            .run(guild(), UserId::new(1), ChannelId::new(10))
            .await
            .unwrap();
        assert_eq!(outcome, WizardOutcome::Busy);
    }
}
