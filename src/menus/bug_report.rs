// DMで質問に順番に答えてもらい、バグ報告を作成するメニュー
use serenity::model::prelude::*;

use crate::collector::{CollectorResult, Menu, Prompt};
use crate::models::{BugReport, BugReportBuilder, BugReportBuilderError};
use crate::platform::{Panel, PlatformError};
use crate::services::issues::{IssueStatus, IssueTracker};
use crate::services::store::StoreError;
use crate::session::{MenuKind, SessionContext, SessionEnd};

static MAX_ANSWER_LENGTH: usize = 1500;

static CONFIRM_EMOJI: &str = "✅";
static CANCEL_EMOJI: &str = "❌";

static GENERAL_INSTRUCTIONS: &str = "Please respond to the question posed above. Please see the specific directions below for this question. You will have up to 1500 characters, and will have 10 minutes to respond. Note that you cannot submit images.\n⇒ React with ✅ once you are satisfied with your response above. You will be moved to the next step.\n⇒ React with ❌ to cancel this process.\n\n⚠️ WARNING: Your Discord tag and ID will be shared with the developer.\nℹ️ NOTE: Once you submit your response to this question, you cannot view your response again!";

struct Question {
    title: &'static str,
    directions: &'static str,
}

static QUESTIONS: [Question; 6] = [
    Question {
        title: "What is the general idea of this bug report?",
        directions: "The general idea is a short \"summary\" (preferably less than 10 words) of what your report is about. This should NOT be an essay; that will be for later. Examples of valid submissions are:\n- \"AFK check dungeon menu not responding\"\n- \"Blacklist doesn't blacklist all alts.\"\n- \"The bot isn't sending modmail.\"\n\nExamples of invalid submissions are:\n- \"The bot broke\"\n- \"Please help\"",
    },
    Question {
        title: "Please provide any error message(s).",
        directions: "If the bot provided any error messages or other responses that seem out of place (with respect to the command itself), please list them. If not, simply respond with `None`.",
    },
    Question {
        title: "Where did this bug occur?",
        directions: "Please specify where the bug occurred. For example, if the bug occurred in a command, type the command name. If the bug occurred during an AFK check, say \"AFK check.\" Please be descriptive.",
    },
    Question {
        title: "Please provide a description of this bug.",
        directions: "Now is the time for you to write a description of the bug. **Be as descriptive as possible!** Use this opportunity to describe what the bug does. Include information like what you expected the bot to do and what actually happened. The more descriptive you are, the faster the bug will be fixed.",
    },
    Question {
        title: "Please provide steps to reproduce this bug.",
        directions: "Tell the developer how you came across this bug: which bot commands or features you used *prior* to the bug happening. Please number the steps, for example:\n1. Run the AFK check command with no arguments.\n2. Specify the location.\n3. Select a dungeon.\n4. Done.",
    },
    Question {
        title: "Any other details?",
        directions: "Provide any other useful or notable details.",
    },
];

#[derive(Debug, thiserror::Error)]
pub enum BugReportError {
    #[error("platform error: {0}")]
    PlatformError(#[from] PlatformError),
    #[error("store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("failed to build bug report: {0}")]
    BuilderError(#[from] BugReportBuilderError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BugReportOutcome {
    Submitted(IssueStatus),
    /// 開発者がバグ報告を受け付けていない
    Disabled,
    Blacklisted,
    /// 別のメニューを操作中
    Busy,
    Cancelled,
    TimedOut,
}

/// The user filing the report.
#[derive(Debug, Clone)]
pub struct Reporter {
    pub id: UserId,
    pub tag: String,
    pub is_developer: bool,
}

impl Reporter {
    // 開発者自身の報告は ID とタグを伏せる
    fn masked(&self, production: bool) -> (String, String) {
        if !self.is_developer {
            return (self.id.get().to_string(), self.tag.clone());
        }
        let label = if production {
            "Developer"
        } else {
            "Developer Testing"
        };
        (label.to_string(), label.to_string())
    }
}

pub struct BugReportMenu<'a> {
    context: &'a SessionContext,
    issue_tracker: &'a dyn IssueTracker,
    bot_id: UserId,
    production: bool,
}

impl<'a> BugReportMenu<'a> {
    pub fn new(
        context: &'a SessionContext,
        issue_tracker: &'a dyn IssueTracker,
        bot_id: UserId,
        production: bool,
    ) -> Self {
        Self {
            context,
            issue_tracker,
            bot_id,
            production,
        }
    }

    fn question_panel(reporter: &Reporter, question: &Question, answer: &str) -> Panel {
        Panel::new(question.title)
            .author(&reporter.tag)
            .description(if answer.is_empty() { "N/A" } else { answer })
            .field("General Instructions", GENERAL_INSTRUCTIONS)
            .field("Specific Directions", question.directions)
            .footer("Bug Report")
    }

    /// Runs the whole questionnaire in `dm_channel`.
    #[tracing::instrument(skip_all, fields(reporter = ?reporter.id, dm_channel = ?dm_channel))]
    pub async fn run(
        &self,
        reporter: &Reporter,
        dm_channel: ChannelId,
    ) -> Result<BugReportOutcome, BugReportError> {
        let platform = &self.context.platform;

        let settings = self.context.store.bot_settings(self.bot_id).await?;
        let dev = settings.dev.unwrap_or_default();
        if !dev.is_enabled {
            platform
                .send_text(
                    dm_channel,
                    "At this time, the developer is not accepting bug reports.",
                )
                .await?;
            return Ok(BugReportOutcome::Disabled);
        }
        if dev.is_blacklisted(&reporter.id.get().to_string()) {
            platform
                .send_text(
                    dm_channel,
                    "You are not able to submit bug reports to the developer.",
                )
                .await?;
            return Ok(BugReportOutcome::Blacklisted);
        }

        let Some(mut session) = self
            .context
            .open(reporter.id, dm_channel, MenuKind::BugReport)
        else {
            return Ok(BugReportOutcome::Busy);
        };

        // DMでは利用者のメッセージを削除できないため、返信は残しておく
        let prompt = Prompt::text(1, MAX_ANSWER_LENGTH).keep_reply();
        let menu = Menu::new([CONFIRM_EMOJI, CANCEL_EMOJI]).with_cancel(CANCEL_EMOJI);
        let timeout = self.context.timeouts.prompt();

        let mut answers = Vec::with_capacity(QUESTIONS.len());
        for question in &QUESTIONS {
            let mut answer = String::new();
            loop {
                let panel = Self::question_panel(reporter, question, &answer);
                match session.ask(&panel, Some(&prompt), &menu, timeout).await? {
                    CollectorResult::Text(text) => answer = text,
                    CollectorResult::Reaction(_) if !answer.is_empty() => break,
                    CollectorResult::Reaction(_) => continue,
                    CollectorResult::Cancelled => {
                        session.finish(SessionEnd::Cancelled).await;
                        return Ok(BugReportOutcome::Cancelled);
                    },
                    CollectorResult::TimedOut => {
                        session.finish(SessionEnd::TimedOut).await;
                        return Ok(BugReportOutcome::TimedOut);
                    },
                }
            }
            tracing::debug!(question = question.title, "question answered");
            // 回答済みの質問は見返せないよう、メッセージごと消す
            session.discard_message().await;
            answers.push(answer);
        }
        session.finish(SessionEnd::Completed).await;

        let report = self.build_report(reporter, answers)?;

        let status = match self.issue_tracker.submit_bug_report(&report).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(?err, "failed to submit bug report to issue tracker");
                IssueStatus::NotSubmitted
            },
        };
        self.context
            .store
            .push_bug_report(self.bot_id, report)
            .await?;

        let summary = Panel::new("Bug Report Submitted Successfully")
            .author(&reporter.tag)
            .description(
                "Thank you for submitting your bug report! It has been submitted successfully.",
            )
            .field(
                "Information",
                format!(
                    "- Database: Saved\n- Online: {}",
                    if status.is_submitted() {
                        "Saved"
                    } else {
                        "Not Saved"
                    }
                ),
            )
            .footer("Successfully Submitted Bug Report.");
        if let Err(err) = platform.send_panel(dm_channel, &summary).await {
            tracing::warn!(?err, "failed to send bug report summary");
        }

        Ok(BugReportOutcome::Submitted(status))
    }

    fn build_report(
        &self,
        reporter: &Reporter,
        answers: Vec<String>,
    ) -> Result<BugReport, BugReportBuilderError> {
        let (author_id, author_tag) = reporter.masked(self.production);
        let mut answers = answers.into_iter();
        let mut next = || answers.next().unwrap_or_default();

        BugReportBuilder::default()
            .time(chrono::Utc::now().timestamp_millis())
            .author_id(author_id)
            .author_tag(author_tag)
            .version(env!("CARGO_PKG_VERSION"))
            .title(format!("[BUG REPORT] {}", next()))
            .error_msg(next())
            .location(next())
            .description(next())
            .reproduce_steps(next())
            .other_info(next())
            .build()
    }
}
