use serde_derive::{Deserialize, Serialize};
use serenity::model::prelude::ChannelId;

pub static MAX_APPLICATIONS: usize = 5;
pub static MAX_QUESTIONS: usize = 35;
pub static MAX_APPLICATION_NAME_LENGTH: usize = 50;
pub static MAX_QUESTION_LENGTH: usize = 200;
pub static MAX_QUESTIONS_PER_BATCH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    pub is_enabled: bool,
    // 未設定の場合は空文字列
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub questions: Vec<String>,
}

impl Application {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            is_enabled: false,
            channel: String::new(),
            questions: Vec::new(),
        }
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        match self.channel.parse::<u64>() {
            Ok(id) if id != 0 => Some(ChannelId::new(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildDocument {
    pub guild_id: u64,
    #[serde(default)]
    pub applications: Vec<Application>,
}

impl GuildDocument {
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            applications: Vec::new(),
        }
    }

    pub fn application(&self, name: &str) -> Option<&Application> {
        self.applications.iter().find(|app| app.has_name(name))
    }

    pub fn application_mut(&mut self, name: &str) -> Option<&mut Application> {
        self.applications.iter_mut().find(|app| app.has_name(name))
    }

    pub fn is_name_taken(&self, name: &str) -> bool {
        self.application(name).is_some()
    }

    pub fn can_create_application(&self) -> bool {
        self.applications.len() < MAX_APPLICATIONS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSettings {
    pub bot_id: u64,
    #[serde(default)]
    pub dev: Option<DevSettings>,
}

impl BotSettings {
    pub fn new(bot_id: u64) -> Self {
        Self { bot_id, dev: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevSettings {
    pub is_enabled: bool,
    #[serde(default)]
    pub bugs: Vec<BugReport>,
    #[serde(default)]
    pub blacklisted: Vec<String>,
}

impl Default for DevSettings {
    fn default() -> Self {
        Self {
            is_enabled: true,
            bugs: Vec::new(),
            blacklisted: Vec::new(),
        }
    }
}

impl DevSettings {
    pub fn is_blacklisted(&self, user_id: &str) -> bool {
        self.blacklisted.iter().any(|id| id == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_builder::Builder)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into))]
pub struct BugReport {
    // unix time in milliseconds
    pub time: i64,
    pub author_id: String,
    pub author_tag: String,
    pub version: String,
    pub title: String,
    pub error_msg: String,
    pub location: String,
    pub description: String,
    pub reproduce_steps: String,
    #[builder(default)]
    pub other_info: String,
}

/// Where a batch of new questions goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Front,
    End,
    /// Zero-based index of the question the batch is inserted before.
    Before(usize),
}

impl Position {
    pub fn describe(&self) -> String {
        match self {
            Position::Front => String::from("the front"),
            Position::End => String::from("the end"),
            Position::Before(index) => format!("question **`{}`**", index + 1),
        }
    }
}

pub fn insert_questions(questions: &mut Vec<String>, position: Position, new: Vec<String>) {
    let index = match position {
        Position::Front => 0,
        Position::End => questions.len(),
        Position::Before(index) => index.min(questions.len()),
    };
    questions.splice(index..index, new);
}

/// Removes the one-indexed question `number`.
pub fn delete_question(questions: &mut Vec<String>, number: usize) -> Option<String> {
    if number == 0 || number > questions.len() {
        return None;
    }
    Some(questions.remove(number - 1))
}

/// Swaps two one-indexed questions. Returns false when either index is out of range.
pub fn swap_questions(questions: &mut [String], first: usize, second: usize) -> bool {
    let len = questions.len();
    if first == 0 || second == 0 || first > len || second > len {
        return false;
    }
    questions.swap(first - 1, second - 1);
    true
}

/// Parses input like `1 10` into a pair of one-indexed positions within `len`.
pub fn parse_swap_pair(input: &str, len: usize) -> Option<(usize, usize)> {
    let numbers: Vec<usize> = input
        .split_whitespace()
        .filter_map(|part| part.parse::<usize>().ok())
        .collect();

    match numbers.as_slice() {
        [first, second] if (1..=len).contains(first) && (1..=len).contains(second) => {
            Some((*first, *second))
        },
        _ => None,
    }
}

/// Splits a `|` separated batch of questions, dropping empty entries.
pub fn split_questions(input: &str) -> Vec<String> {
    input
        .split('|')
        .map(str::trim)
        .filter(|question| !question.is_empty())
        .map(String::from)
        .collect()
}
