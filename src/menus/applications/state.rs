// 申請フォーム設定メニューの画面遷移。副作用を持たない純粋な状態機械として実装する
use crate::collector::{Menu, Prompt, Validation};
use crate::models::*;
use crate::platform::{ChannelRef, Panel, EMBED_LIMIT, FIELD_VALUE_LIMIT};
use crate::services::store::ApplicationUpdate;
use crate::session::SessionEnd;

pub static CREATE_EMOJI: &str = "➕";
pub static EDIT_EMOJI: &str = "⚙️";
pub static CANCEL_EMOJI: &str = "❌";
pub static BACK_EMOJI: &str = "⬅️";
pub static CONFIRM_EMOJI: &str = "✅";
pub static RENAME_EMOJI: &str = "📝";
pub static TOGGLE_EMOJI: &str = "🔔";
pub static QUESTIONS_EMOJI: &str = "❓";
pub static CHANNEL_EMOJI: &str = "#️⃣";
pub static DELETE_EMOJI: &str = "🗑️";
pub static ADD_QUESTION_EMOJI: &str = "➕";
pub static REMOVE_QUESTION_EMOJI: &str = "➖";
pub static EDIT_QUESTION_EMOJI: &str = "✏️";
pub static SWAP_EMOJI: &str = "🔃";
pub static SAVE_EMOJI: &str = "💾";
pub static FRONT_EMOJI: &str = "🇫";
pub static END_EMOJI: &str = "🇧";

pub static NUMBER_EMOJIS: [&str; 10] = ["1⃣", "2⃣", "3⃣", "4⃣", "5⃣", "6⃣", "7⃣", "8⃣", "9⃣", "🔟"];

static QUESTIONS_FIELD: &str = "Questions";
// 質問一覧が分割されるフィールド数の見積もり上限
static RESERVED_QUESTION_FIELDS: usize = 8;

static MAIN_MENU: Screen = Screen::MainMenu;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionPurpose {
    Add,
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    MainMenu,
    SelectApplication,
    CreateApplication {
        name: Option<String>,
    },
    EditApplication {
        name: String,
    },
    ChangeName {
        name: String,
        draft: Option<String>,
    },
    ChangeChannel {
        name: String,
        draft: Option<ChannelRef>,
    },
    ConfirmDelete {
        name: String,
    },
    EditQuestions {
        name: String,
        draft: Vec<String>,
    },
    SelectPosition {
        name: String,
        draft: Vec<String>,
        purpose: PositionPurpose,
    },
    AddQuestions {
        name: String,
        draft: Vec<String>,
        position: Position,
        pending: Vec<String>,
    },
    EditQuestion {
        name: String,
        draft: Vec<String>,
        // 0始まり
        index: usize,
        pending: Option<String>,
    },
    DeleteQuestion {
        name: String,
        draft: Vec<String>,
    },
    SwapQuestions {
        name: String,
        draft: Vec<String>,
        pair: Option<(usize, usize)>,
    },
}

impl Screen {
    /// Name of the application this screen works on, if any.
    pub fn application_name(&self) -> Option<&str> {
        match self {
            Screen::MainMenu | Screen::SelectApplication | Screen::CreateApplication { .. } => None,
            Screen::EditApplication { name }
            | Screen::ChangeName { name, .. }
            | Screen::ChangeChannel { name, .. }
            | Screen::ConfirmDelete { name }
            | Screen::EditQuestions { name, .. }
            | Screen::SelectPosition { name, .. }
            | Screen::AddQuestions { name, .. }
            | Screen::EditQuestion { name, .. }
            | Screen::DeleteQuestion { name, .. }
            | Screen::SwapQuestions { name, .. } => Some(name),
        }
    }

    /// A screen is stale once the application it refers to is gone.
    pub fn is_valid(&self, guild: &GuildDocument) -> bool {
        match self {
            Screen::SelectApplication => !guild.applications.is_empty(),
            _ => self
                .application_name()
                .map_or(true, |name| guild.application(name).is_some()),
        }
    }
}

/// One accepted piece of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Reaction(&'static str),
    Text(String),
    Number(usize),
    Channel(ChannelRef),
    Questions(Vec<String>),
    Pair(usize, usize),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nav {
    Stay,
    Replace(Screen),
    Push(Screen),
    Back,
    Home,
    /// Pops back to the application screen, which now shows `name`.
    ReturnToEdit(String),
    /// Pops back to the question list with an updated draft.
    ReturnToQuestions(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Create(Application),
    Update {
        name: String,
        update: ApplicationUpdate,
    },
    Delete {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Navigate(Nav),
    Persist { write: Write, then: Nav },
    Exit(SessionEnd),
}

impl From<Nav> for Transition {
    fn from(nav: Nav) -> Self {
        Transition::Navigate(nav)
    }
}

/// Screen history. The last entry is the screen currently shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    stack: Vec<Screen>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            stack: vec![Screen::MainMenu],
        }
    }

    pub fn current(&self) -> &Screen {
        self.stack.last().unwrap_or(&MAIN_MENU)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn replace(&mut self, screen: Screen) {
        match self.stack.last_mut() {
            Some(top) => *top = screen,
            None => self.stack.push(screen),
        }
    }

    // 条件に合う画面まで戻る。見つからなければメインメニューまで戻る
    fn unwind_to(&mut self, is_target: impl Fn(&Screen) -> bool) -> bool {
        while let Some(top) = self.stack.last() {
            if is_target(top) {
                return true;
            }
            self.stack.pop();
        }
        self.stack.push(Screen::MainMenu);
        false
    }

    pub fn apply(&mut self, nav: Nav) {
        tracing::debug!(?nav, "navigate");
        match nav {
            Nav::Stay => {},
            Nav::Replace(screen) => self.replace(screen),
            Nav::Push(screen) => self.stack.push(screen),
            Nav::Back => {
                if self.stack.len() > 1 {
                    self.stack.pop();
                }
            },
            Nav::Home => self.stack = vec![Screen::MainMenu],
            Nav::ReturnToEdit(name) => {
                if self.unwind_to(|screen| matches!(screen, Screen::EditApplication { .. })) {
                    self.replace(Screen::EditApplication { name });
                } else {
                    self.stack.push(Screen::EditApplication { name });
                }
            },
            Nav::ReturnToQuestions(questions) => {
                if self.unwind_to(|screen| matches!(screen, Screen::EditQuestions { .. })) {
                    if let Some(Screen::EditQuestions { draft, .. }) = self.stack.last_mut() {
                        *draft = questions;
                    }
                }
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    None,
    /// Application name, unique among the guild's applications except `current`.
    Name { current: Option<String> },
    Channel,
    /// `|` separated batch. `room` is how many more questions fit.
    Questions { room: usize },
    Question,
    Number { max: usize },
    Pair { len: usize },
}

impl PromptKind {
    /// Builds the prompt for this kind. `channels` is only read for [`PromptKind::Channel`].
    pub fn build(&self, guild: &GuildDocument, channels: &[ChannelRef]) -> Option<Prompt<Input>> {
        let prompt = match self {
            PromptKind::None => return None,
            PromptKind::Name { current } => {
                let taken: Vec<String> = guild
                    .applications
                    .iter()
                    .filter(|app| current.as_deref().map_or(true, |current| !app.has_name(current)))
                    .map(|app| app.name.to_lowercase())
                    .collect();
                Prompt::text(1, MAX_APPLICATION_NAME_LENGTH)
                    .and_then(move |name| {
                        if taken.contains(&name.to_lowercase()) {
                            Validation::Rejected(format!(
                                "An application named `{}` already exists.",
                                name
                            ))
                        } else {
                            Validation::Accepted(name)
                        }
                    })
                    .map(Input::Text)
            },
            PromptKind::Channel => Prompt::channel(channels.to_vec()).map(Input::Channel),
            PromptKind::Questions { room } => {
                let room = *room;
                Prompt::new(move |content: &str| validate_questions(content, room))
            },
            PromptKind::Question => Prompt::text(1, MAX_QUESTION_LENGTH).map(Input::Text),
            PromptKind::Number { max } => {
                Prompt::number(1, *max as i64).map(|number| Input::Number(number as usize))
            },
            PromptKind::Pair { len } => {
                let len = *len;
                Prompt::new(move |content: &str| match parse_swap_pair(content, len) {
                    Some((first, second)) => Validation::Accepted(Input::Pair(first, second)),
                    None => Validation::Rejected(format!(
                        "Please type two numbers between 1 and {}, for example `1 2`.",
                        len
                    )),
                })
            },
        };
        Some(prompt)
    }
}

fn validate_questions(content: &str, room: usize) -> Validation<Input> {
    let questions = split_questions(content);
    if questions.is_empty() {
        return Validation::Rejected(String::from("Please type at least one question."));
    }
    if questions.len() > MAX_QUESTIONS_PER_BATCH {
        return Validation::Rejected(format!(
            "You may only add up to {} questions at once.",
            MAX_QUESTIONS_PER_BATCH
        ));
    }
    if questions.len() > room {
        return Validation::Rejected(format!(
            "An application may not have more than {} questions. You can add {} more.",
            MAX_QUESTIONS, room
        ));
    }
    if let Some(question) = questions
        .iter()
        .find(|question| question.chars().count() > MAX_QUESTION_LENGTH)
    {
        return Validation::Rejected(format!(
            "Each question must not be more than {} characters long: `{}`",
            MAX_QUESTION_LENGTH,
            question.chars().take(30).collect::<String>()
        ));
    }
    Validation::Accepted(Input::Questions(questions))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    Menu,
    Prompt,
    Confirm,
}

/// Everything needed to render one screen and collect its input.
pub struct View {
    pub panel: Panel,
    pub menu: Menu,
    pub prompt: PromptKind,
    pub deadline: Deadline,
}

fn shorten(text: &str, room: usize) -> String {
    if text.chars().count() <= room {
        return text.to_string();
    }
    let mut short: String = text.chars().take(room.saturating_sub(1)).collect();
    short.push('…');
    short
}

// 一覧全体が Embed の上限に収まるよう、1問あたりの表示文字数を割り当てて長い質問は省略する
fn question_fields(panel: Panel, questions: &[String]) -> Panel {
    if questions.is_empty() {
        return panel.field(QUESTIONS_FIELD, "N/A");
    }

    let reserved = panel.embed_length() + QUESTIONS_FIELD.chars().count() * RESERVED_QUESTION_FIELDS;
    let per_question = EMBED_LIMIT.saturating_sub(reserved) / questions.len();

    let mut fields = Vec::new();
    let mut current = String::new();
    for (i, question) in questions.iter().enumerate() {
        let prefix = format!("**`[{}]`** ", i + 1);
        let room = per_question.saturating_sub(prefix.chars().count() + 1);
        let line = format!("{}{}\n", prefix, shorten(question, room));
        if !current.is_empty()
            && current.chars().count() + line.chars().count() > FIELD_VALUE_LIMIT
        {
            fields.push(std::mem::take(&mut current));
        }
        current.push_str(&line);
    }
    fields.push(current);

    fields
        .into_iter()
        .fold(panel, |panel, field| panel.field(QUESTIONS_FIELD, field))
}

fn status(app: &Application) -> &'static str {
    if app.is_enabled {
        "Active"
    } else {
        "Inactive"
    }
}

fn channel_label(app: &Application) -> String {
    app.channel_id()
        .map(|id| format!("<#{}>", id.get()))
        .unwrap_or_else(|| String::from("N/A"))
}

pub fn view(screen: &Screen, guild: &GuildDocument) -> View {
    let menu_view = |panel: Panel, menu: Menu| View {
        panel,
        menu,
        prompt: PromptKind::None,
        deadline: Deadline::Menu,
    };
    let prompt_view = |panel: Panel, menu: Menu, prompt: PromptKind| View {
        panel,
        menu,
        prompt,
        deadline: Deadline::Prompt,
    };
    let with_confirm = |ready: bool| {
        let mut emojis = vec![BACK_EMOJI];
        if ready {
            emojis.push(CONFIRM_EMOJI);
        }
        emojis.push(CANCEL_EMOJI);
        Menu::new(emojis).with_cancel(CANCEL_EMOJI)
    };

    match screen {
        Screen::MainMenu => {
            let mut panel = Panel::new("Configure Applications")
                .description("Use this command to add, remove, or edit applications. Applications are a good way to assess a person's interest in many areas, whether that be raid leading or moderation.")
                .footer("Application Configuration");
            let mut emojis = Vec::new();
            if guild.can_create_application() {
                panel = panel.field(
                    "Create New Application",
                    "React with ➕ if you would like to create a new application.",
                );
                emojis.push(CREATE_EMOJI);
            }
            if !guild.applications.is_empty() {
                panel = panel.field(
                    "Edit Application",
                    "React with ⚙️ if you would like to edit or delete an application.",
                );
                emojis.push(EDIT_EMOJI);
            }
            panel = panel.field("Exit", "React with ❌ if you would like to exit this process.");
            emojis.push(CANCEL_EMOJI);
            menu_view(panel, Menu::new(emojis).with_cancel(CANCEL_EMOJI))
        },
        Screen::SelectApplication => {
            let mut panel = Panel::new("Select Application")
                .description("Please react to the emoji corresponding to the application that you want to configure.\n⇒ React with ⬅️ if you want to go back to the main menu.\n⇒ React with ❌ if you want to cancel this entire process.");
            let mut emojis = vec![BACK_EMOJI, CANCEL_EMOJI];
            for (i, app) in guild.applications.iter().take(NUMBER_EMOJIS.len()).enumerate() {
                panel = panel.field(
                    format!("**`[{}]`** {}", i + 1, app.name),
                    format!(
                        "Questions: {}\nStatus: {}",
                        app.questions.len(),
                        status(app)
                    ),
                );
                emojis.push(NUMBER_EMOJIS[i]);
            }
            menu_view(panel, Menu::new(emojis).with_cancel(CANCEL_EMOJI))
        },
        Screen::CreateApplication { name } => {
            let panel = Panel::new("Creating New Application").description(format!(
                "Current Title: {}\n\nType the name of this application. The name must not have already been used, and must not be more than {} characters.\n\n⇒ React with ⬅️ to go back.\n⇒ React with ✅ if you are satisfied with the name above.\n⇒ React with ❌ to cancel this process completely.",
                name.as_deref().unwrap_or("N/A"),
                MAX_APPLICATION_NAME_LENGTH
            ));
            prompt_view(
                panel,
                with_confirm(name.is_some()),
                PromptKind::Name { current: None },
            )
        },
        Screen::EditApplication { name } => {
            let Some(app) = guild.application(name) else {
                return menu_view(Panel::new(name.clone()), with_confirm(false));
            };
            let toggle = if app.is_enabled { "Disable" } else { "Enable" };
            let panel = Panel::new(format!("Application: **{}**", app.name))
                .description(format!(
                    "Enabled: {}\nQuestions: {}\nChannel: {}",
                    status(app),
                    app.questions.len(),
                    channel_label(app)
                ))
                .field("Go Back", "React with ⬅️ if you want to go back to the previous menu.")
                .field(
                    format!("{} Application", toggle),
                    format!(
                        "React with 🔔 if you want to {} this application.",
                        toggle.to_lowercase()
                    ),
                )
                .field("Change Name", "React with 📝 if you want to change the name for this application.")
                .field("Edit Question(s)", "React with ❓ if you want to edit the application questions. You may add, remove, or edit questions.")
                .field("Edit Channel", "React with #️⃣ if you want to change the channel where responses will be sent to.")
                .field("Delete Application", "React with 🗑️ if you want to delete this application.")
                .field("Cancel Process", "React with ❌ if you want to cancel this process.");
            let menu = Menu::new([
                BACK_EMOJI,
                TOGGLE_EMOJI,
                RENAME_EMOJI,
                QUESTIONS_EMOJI,
                CHANNEL_EMOJI,
                DELETE_EMOJI,
                CANCEL_EMOJI,
            ])
            .with_cancel(CANCEL_EMOJI);
            menu_view(panel, menu)
        },
        Screen::ChangeName { name, draft } => {
            let panel = Panel::new(format!("**{}** ⇒ Change Name", name))
                .description(format!(
                    "Please type the name that you want to use for this application. Your name must not be more than {} characters long and must not be used by another application.\n\n⇒ React with ⬅️ if you want to go back to the previous menu.\n⇒ React with ✅ if you want to use the name below.\n⇒ React with ❌ if you want to cancel.",
                    MAX_APPLICATION_NAME_LENGTH
                ))
                .field("New Name", draft.as_deref().unwrap_or("N/A"));
            prompt_view(
                panel,
                with_confirm(draft.is_some()),
                PromptKind::Name {
                    current: Some(name.clone()),
                },
            )
        },
        Screen::ChangeChannel { name, draft } => {
            let preview = draft
                .as_ref()
                .map(|channel| format!("<#{}>", channel.id.get()))
                .unwrap_or_else(|| String::from("N/A"));
            let panel = Panel::new(format!("**{}** ⇒ Change Channel", name))
                .description("Please type the channel that you want to use for this application. Any applications will be sent to this channel where it can be reviewed.\n\n⇒ React with ⬅️ if you want to go back to the previous menu.\n⇒ React with ✅ if you want to use the channel below.\n⇒ React with ❌ if you want to cancel.")
                .field("New Channel", preview);
            prompt_view(panel, with_confirm(draft.is_some()), PromptKind::Channel)
        },
        Screen::ConfirmDelete { name } => View {
            panel: Panel::new("Delete Application").description(format!(
                "Are you sure you want to delete the application, `{}`?\n\n⇒ React with ✅ to delete it.\n⇒ React with ❌ to go back.",
                name
            )),
            // ここでの ❌ は中断ではなく「戻る」
            menu: Menu::new([CONFIRM_EMOJI, CANCEL_EMOJI]),
            prompt: PromptKind::None,
            deadline: Deadline::Confirm,
        },
        Screen::EditQuestions { name, draft } => {
            let mut description = String::from("⇒ React with ⬅️ to go back to the previous menu. Your changes won't be saved.");
            let mut emojis = vec![BACK_EMOJI];
            if draft.len() < MAX_QUESTIONS {
                description.push_str("\n⇒ React with ➕ to add one or more question(s) to the application.");
                emojis.push(ADD_QUESTION_EMOJI);
            }
            if !draft.is_empty() {
                description.push_str("\n⇒ React with ➖ to delete a question.\n⇒ React with ✏️ to edit a question.");
                emojis.push(REMOVE_QUESTION_EMOJI);
                emojis.push(EDIT_QUESTION_EMOJI);
            }
            if draft.len() > 1 {
                description.push_str("\n⇒ React with 🔃 to switch two questions around.");
                emojis.push(SWAP_EMOJI);
            }
            description.push_str("\n⇒ React with 💾 to save your application.\n⇒ React with ❌ to cancel this entire process.");
            emojis.push(SAVE_EMOJI);
            emojis.push(CANCEL_EMOJI);

            let panel = Panel::new(format!("**{}** ⇒ Editing Questions", name))
                .description(format!(
                    "There are currently `{}`/{} questions, which are displayed below.\n\n{}",
                    draft.len(),
                    MAX_QUESTIONS,
                    description
                ))
                .footer(name.clone());
            menu_view(
                question_fields(panel, draft),
                Menu::new(emojis).with_cancel(CANCEL_EMOJI),
            )
        },
        Screen::SelectPosition {
            name,
            draft,
            purpose,
        } => {
            let (label, description) = match purpose {
                PositionPurpose::Add => ("Add", "Please type the location where the new question(s) should be added.\n⇒ React with ⬅️ if you want to go back.\n⇒ React with 🇫 if you want to put the question(s) at the front of the application.\n⇒ React with 🇧 if you want to put the question(s) at the end of the application.\nOtherwise, type the number corresponding to the position where you want to put the question. Any questions after that will be shifted."),
                PositionPurpose::Edit => ("Edit", "Please type the location of the question you want to edit.\n⇒ React with ⬅️ if you want to go back.\n⇒ React with 🇫 if you want to edit the first question.\n⇒ React with 🇧 if you want to edit the last question.\nOtherwise, type the number corresponding to the question that you want to edit."),
            };
            let panel = Panel::new(format!("**{}** ⇒ Editing Questions ⇒ {} Question", name, label))
                .description(description)
                .footer("Select Position.");
            let prompt = if draft.is_empty() {
                PromptKind::None
            } else {
                PromptKind::Number { max: draft.len() }
            };
            View {
                panel: question_fields(panel, draft),
                menu: Menu::new([BACK_EMOJI, FRONT_EMOJI, END_EMOJI, CANCEL_EMOJI])
                    .with_cancel(CANCEL_EMOJI),
                prompt,
                deadline: Deadline::Prompt,
            }
        },
        Screen::AddQuestions {
            name,
            draft,
            position,
            pending,
        } => {
            let preview = if pending.is_empty() {
                String::from("N/A")
            } else {
                pending.join("\n")
            };
            let panel = Panel::new(format!("**{}** ⇒ Editing Questions ⇒ Adding Question(s)", name))
                .description(format!(
                    "{}\n\nYou may add up to {} questions ({} characters each), starting at {}. Split each question with a bar: `|`.\n⇒ React with ⬅️ to go back to the previous menu.\n⇒ React with ✅ to save the questions.\n⇒ React with ❌ to cancel this process.",
                    preview,
                    MAX_QUESTIONS_PER_BATCH,
                    MAX_QUESTION_LENGTH,
                    position.describe()
                ));
            prompt_view(
                question_fields(panel, draft),
                with_confirm(!pending.is_empty()),
                PromptKind::Questions {
                    room: MAX_QUESTIONS.saturating_sub(draft.len()),
                },
            )
        },
        Screen::EditQuestion {
            name,
            draft,
            index,
            pending,
        } => {
            let current = pending
                .as_deref()
                .or_else(|| draft.get(*index).map(String::as_str))
                .unwrap_or("N/A");
            let panel = Panel::new(format!("**{}** ⇒ Editing Questions ⇒ Edit Question", name))
                .description(format!(
                    "{}\n\nYou are currently editing question **`{}`**. Your edited question can be up to {} characters long.\n⇒ React with ⬅️ to go back to the previous menu.\n⇒ React with ✅ to save the question.\n⇒ React with ❌ to cancel this process.",
                    current,
                    index + 1,
                    MAX_QUESTION_LENGTH
                ));
            prompt_view(
                question_fields(panel, draft),
                with_confirm(pending.is_some()),
                PromptKind::Question,
            )
        },
        Screen::DeleteQuestion { name, draft } => {
            let panel = Panel::new(format!("**{}** ⇒ Editing Questions ⇒ Delete Question", name))
                .description("Please type the number corresponding to the question you want to delete. Choose carefully; you won't be able to undo your action.\n\n⇒ React with ⬅️ to go back to the previous menu.\n⇒ React with ❌ to cancel this process.");
            prompt_view(
                question_fields(panel, draft),
                Menu::new([BACK_EMOJI, CANCEL_EMOJI]).with_cancel(CANCEL_EMOJI),
                PromptKind::Number { max: draft.len() },
            )
        },
        Screen::SwapQuestions { name, draft, pair } => {
            let pick = |index: Option<usize>| {
                index
                    .and_then(|index| index.checked_sub(1))
                    .and_then(|index| draft.get(index))
                    .map(String::as_str)
                    .unwrap_or("N/A")
            };
            let panel = Panel::new(format!("**{}** ⇒ Editing Questions ⇒ Switching Questions", name))
                .description(format!(
                    "Q1: {}\nQ2: {}\n\nPlease type two numbers corresponding to the questions you want to swap around. For example, valid inputs could be `1 10` or `15 2`.\n\n⇒ React with ⬅️ to go back to the previous menu.\n⇒ React with ✅ to confirm that you want to switch the above two questions.\n⇒ React with ❌ to cancel this process.",
                    pick(pair.map(|(first, _)| first)),
                    pick(pair.map(|(_, second)| second)),
                ));
            prompt_view(
                question_fields(panel, draft),
                with_confirm(pair.is_some()),
                PromptKind::Pair { len: draft.len() },
            )
        },
    }
}

/// Computes the next step from the screen shown and the input received.
pub fn step(screen: &Screen, guild: &GuildDocument, input: Input) -> Transition {
    use Input::*;

    // 戻る操作と時間切れはほとんどの画面で共通
    match (&input, screen) {
        (TimedOut, Screen::ConfirmDelete { .. }) => return Nav::Back.into(),
        (TimedOut, _) => return Transition::Exit(SessionEnd::TimedOut),
        (Reaction(emoji), _) if *emoji == BACK_EMOJI => return Nav::Back.into(),
        _ => {},
    }

    match screen {
        Screen::MainMenu => match input {
            Reaction(emoji) if emoji == CREATE_EMOJI && guild.can_create_application() => {
                Nav::Push(Screen::CreateApplication { name: None }).into()
            },
            Reaction(emoji) if emoji == EDIT_EMOJI && !guild.applications.is_empty() => {
                Nav::Push(Screen::SelectApplication).into()
            },
            _ => Nav::Stay.into(),
        },
        Screen::SelectApplication => match input {
            Reaction(emoji) => NUMBER_EMOJIS
                .iter()
                .position(|number| *number == emoji)
                .and_then(|index| guild.applications.get(index))
                .map(|app| {
                    Nav::Push(Screen::EditApplication {
                        name: app.name.clone(),
                    })
                })
                .unwrap_or(Nav::Stay)
                .into(),
            _ => Nav::Stay.into(),
        },
        Screen::CreateApplication { name } => match input {
            Text(text) => Nav::Replace(Screen::CreateApplication { name: Some(text) }).into(),
            Reaction(emoji) if emoji == CONFIRM_EMOJI => match name {
                Some(name) => Transition::Persist {
                    write: Write::Create(Application::new(name.clone())),
                    then: Nav::Home,
                },
                None => Nav::Stay.into(),
            },
            _ => Nav::Stay.into(),
        },
        Screen::EditApplication { name } => {
            let Some(app) = guild.application(name) else {
                return Nav::Home.into();
            };
            let name = app.name.clone();
            match input {
                Reaction(emoji) if emoji == TOGGLE_EMOJI => Transition::Persist {
                    write: Write::Update {
                        name,
                        update: ApplicationUpdate::Enabled(!app.is_enabled),
                    },
                    then: Nav::Stay,
                },
                Reaction(emoji) if emoji == RENAME_EMOJI => {
                    Nav::Push(Screen::ChangeName { name, draft: None }).into()
                },
                Reaction(emoji) if emoji == QUESTIONS_EMOJI => Nav::Push(Screen::EditQuestions {
                    name,
                    draft: app.questions.clone(),
                })
                .into(),
                Reaction(emoji) if emoji == CHANNEL_EMOJI => {
                    Nav::Push(Screen::ChangeChannel { name, draft: None }).into()
                },
                Reaction(emoji) if emoji == DELETE_EMOJI => {
                    Nav::Push(Screen::ConfirmDelete { name }).into()
                },
                _ => Nav::Stay.into(),
            }
        },
        Screen::ChangeName { name, draft } => match input {
            Text(text) => Nav::Replace(Screen::ChangeName {
                name: name.clone(),
                draft: Some(text),
            })
            .into(),
            Reaction(emoji) if emoji == CONFIRM_EMOJI => match draft {
                Some(new_name) => Transition::Persist {
                    write: Write::Update {
                        name: name.clone(),
                        update: ApplicationUpdate::Name(new_name.clone()),
                    },
                    then: Nav::ReturnToEdit(new_name.clone()),
                },
                None => Nav::Stay.into(),
            },
            _ => Nav::Stay.into(),
        },
        Screen::ChangeChannel { name, draft } => match input {
            Channel(channel) => Nav::Replace(Screen::ChangeChannel {
                name: name.clone(),
                draft: Some(channel),
            })
            .into(),
            Reaction(emoji) if emoji == CONFIRM_EMOJI => match draft {
                Some(channel) => Transition::Persist {
                    write: Write::Update {
                        name: name.clone(),
                        update: ApplicationUpdate::Channel(channel.id.get().to_string()),
                    },
                    then: Nav::ReturnToEdit(name.clone()),
                },
                None => Nav::Stay.into(),
            },
            _ => Nav::Stay.into(),
        },
        Screen::ConfirmDelete { name } => match input {
            Reaction(emoji) if emoji == CONFIRM_EMOJI => Transition::Persist {
                write: Write::Delete { name: name.clone() },
                then: Nav::Home,
            },
            Reaction(emoji) if emoji == CANCEL_EMOJI => Nav::Back.into(),
            _ => Nav::Stay.into(),
        },
        Screen::EditQuestions { name, draft } => {
            let sub_screen = |purpose| Screen::SelectPosition {
                name: name.clone(),
                draft: draft.clone(),
                purpose,
            };
            match input {
                Reaction(emoji) if emoji == ADD_QUESTION_EMOJI && draft.len() < MAX_QUESTIONS => {
                    Nav::Push(sub_screen(PositionPurpose::Add)).into()
                },
                Reaction(emoji) if emoji == EDIT_QUESTION_EMOJI && !draft.is_empty() => {
                    Nav::Push(sub_screen(PositionPurpose::Edit)).into()
                },
                Reaction(emoji) if emoji == REMOVE_QUESTION_EMOJI && !draft.is_empty() => {
                    Nav::Push(Screen::DeleteQuestion {
                        name: name.clone(),
                        draft: draft.clone(),
                    })
                    .into()
                },
                Reaction(emoji) if emoji == SWAP_EMOJI && draft.len() > 1 => {
                    Nav::Push(Screen::SwapQuestions {
                        name: name.clone(),
                        draft: draft.clone(),
                        pair: None,
                    })
                    .into()
                },
                Reaction(emoji) if emoji == SAVE_EMOJI => Transition::Persist {
                    write: Write::Update {
                        name: name.clone(),
                        update: ApplicationUpdate::Questions(draft.clone()),
                    },
                    then: Nav::ReturnToEdit(name.clone()),
                },
                _ => Nav::Stay.into(),
            }
        },
        Screen::SelectPosition {
            name,
            draft,
            purpose,
        } => {
            let last = draft.len().saturating_sub(1);
            let target = match input {
                Reaction(emoji) if emoji == FRONT_EMOJI => Some((Position::Front, 0)),
                Reaction(emoji) if emoji == END_EMOJI => Some((Position::End, last)),
                Number(number) if (1..=draft.len()).contains(&number) => {
                    Some((Position::Before(number - 1), number - 1))
                },
                _ => None,
            };
            let Some((position, index)) = target else {
                return Nav::Stay.into();
            };

            let next = match purpose {
                PositionPurpose::Add => Screen::AddQuestions {
                    name: name.clone(),
                    draft: draft.clone(),
                    position,
                    pending: Vec::new(),
                },
                PositionPurpose::Edit if draft.is_empty() => return Nav::Stay.into(),
                PositionPurpose::Edit => Screen::EditQuestion {
                    name: name.clone(),
                    draft: draft.clone(),
                    index,
                    pending: None,
                },
            };
            Nav::Replace(next).into()
        },
        Screen::AddQuestions {
            name,
            draft,
            position,
            pending,
        } => match input {
            Questions(questions) => Nav::Replace(Screen::AddQuestions {
                name: name.clone(),
                draft: draft.clone(),
                position: *position,
                pending: questions,
            })
            .into(),
            Reaction(emoji)
                if emoji == CONFIRM_EMOJI
                    && !pending.is_empty()
                    && draft.len() + pending.len() <= MAX_QUESTIONS =>
            {
                let mut questions = draft.clone();
                insert_questions(&mut questions, *position, pending.clone());
                Nav::ReturnToQuestions(questions).into()
            },
            _ => Nav::Stay.into(),
        },
        Screen::EditQuestion {
            name,
            draft,
            index,
            pending,
        } => match input {
            Text(text) => Nav::Replace(Screen::EditQuestion {
                name: name.clone(),
                draft: draft.clone(),
                index: *index,
                pending: Some(text),
            })
            .into(),
            Reaction(emoji) if emoji == CONFIRM_EMOJI && *index < draft.len() => match pending {
                Some(question) => {
                    let mut questions = draft.clone();
                    questions[*index] = question.clone();
                    Nav::ReturnToQuestions(questions).into()
                },
                None => Nav::Stay.into(),
            },
            _ => Nav::Stay.into(),
        },
        Screen::DeleteQuestion { draft, .. } => match input {
            Number(number) => {
                let mut questions = draft.clone();
                match delete_question(&mut questions, number) {
                    Some(_) => Nav::ReturnToQuestions(questions).into(),
                    None => Nav::Stay.into(),
                }
            },
            _ => Nav::Stay.into(),
        },
        Screen::SwapQuestions { name, draft, pair } => match input {
            Pair(first, second) => Nav::Replace(Screen::SwapQuestions {
                name: name.clone(),
                draft: draft.clone(),
                pair: Some((first, second)),
            })
            .into(),
            Reaction(emoji) if emoji == CONFIRM_EMOJI => match pair {
                Some((first, second)) => {
                    let mut questions = draft.clone();
                    if swap_questions(&mut questions, *first, *second) {
                        Nav::ReturnToQuestions(questions).into()
                    } else {
                        Nav::Stay.into()
                    }
                },
                None => Nav::Stay.into(),
            },
            _ => Nav::Stay.into(),
        },
    }
}
