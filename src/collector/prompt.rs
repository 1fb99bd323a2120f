use crate::platform::ChannelRef;

pub static DEFAULT_CANCEL_TOKEN: &str = "--cancel";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation<T> {
    Accepted(T),
    /// 入力は破棄され、同じ締め切りのまま再入力を待つ
    Rejected(String),
}

type Validator<T> = Box<dyn Fn(&str) -> Validation<T> + Send + Sync>;

/// Describes what counts as a valid free-text answer.
pub struct Prompt<T> {
    validator: Validator<T>,
    cancel_token: String,
    delete_reply: bool,
}

impl<T: 'static> Prompt<T> {
    pub fn new<F>(validator: F) -> Self
    where
        F: Fn(&str) -> Validation<T> + Send + Sync + 'static,
    {
        Self {
            validator: Box::new(validator),
            cancel_token: DEFAULT_CANCEL_TOKEN.to_string(),
            delete_reply: true,
        }
    }

    pub fn cancel_token<S: Into<String>>(mut self, token: S) -> Self {
        self.cancel_token = token.into();
        self
    }

    /// Leaves the user's reply in the channel. Direct messages from users cannot be deleted by the bot.
    pub fn keep_reply(mut self) -> Self {
        self.delete_reply = false;
        self
    }

    pub fn deletes_reply(&self) -> bool {
        self.delete_reply
    }

    pub fn is_cancel(&self, content: &str) -> bool {
        content.trim().eq_ignore_ascii_case(&self.cancel_token)
    }

    pub fn validate(&self, content: &str) -> Validation<T> {
        (self.validator)(content)
    }

    /// Adds a further check on top of the accepted value.
    pub fn and_then<F>(self, check: F) -> Self
    where
        F: Fn(T) -> Validation<T> + Send + Sync + 'static,
    {
        let validator = self.validator;
        Self {
            validator: Box::new(move |content| match validator(content) {
                Validation::Accepted(value) => check(value),
                Validation::Rejected(reason) => Validation::Rejected(reason),
            }),
            cancel_token: self.cancel_token,
            delete_reply: self.delete_reply,
        }
    }

    pub fn map<U: 'static, F>(self, f: F) -> Prompt<U>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let validator = self.validator;
        Prompt {
            validator: Box::new(move |content| match validator(content) {
                Validation::Accepted(value) => Validation::Accepted(f(value)),
                Validation::Rejected(reason) => Validation::Rejected(reason),
            }),
            cancel_token: self.cancel_token,
            delete_reply: self.delete_reply,
        }
    }
}

impl Prompt<String> {
    /// Accepts text whose length in characters lies within `min..=max`.
    pub fn text(min: usize, max: usize) -> Self {
        Prompt::new(move |content: &str| {
            let content = content.trim();
            let length = content.chars().count();
            if length < min {
                Validation::Rejected(format!(
                    "Your response must be at least {} character(s) long.",
                    min
                ))
            } else if length > max {
                Validation::Rejected(format!(
                    "Your response must not be more than {} characters long.",
                    max
                ))
            } else {
                Validation::Accepted(content.to_string())
            }
        })
    }
}

impl Prompt<i64> {
    /// Accepts an integer within `min..=max`.
    pub fn number(min: i64, max: i64) -> Self {
        Prompt::new(move |content: &str| match content.trim().parse::<i64>() {
            Ok(number) if (min..=max).contains(&number) => Validation::Accepted(number),
            Ok(_) => Validation::Rejected(format!(
                "Please type a number between {} and {}.",
                min, max
            )),
            Err(_) => Validation::Rejected(String::from("Please type a valid number.")),
        })
    }
}

impl Prompt<ChannelRef> {
    /// Resolves a channel mention, raw channel id, or channel name among `channels`.
    pub fn channel(channels: Vec<ChannelRef>) -> Self {
        Prompt::new(move |content: &str| match resolve_channel(&channels, content) {
            Some(channel) => Validation::Accepted(channel.clone()),
            None => Validation::Rejected(String::from(
                "I could not find that channel. Please mention a text channel in this server.",
            )),
        })
    }
}

pub fn resolve_channel<'a>(channels: &'a [ChannelRef], content: &str) -> Option<&'a ChannelRef> {
    let content = content.trim();

    let id = serenity::utils::parse_channel_mention(content).or_else(|| {
        content
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(serenity::model::id::ChannelId::new)
    });

    if let Some(id) = id {
        return channels.iter().find(|channel| channel.id == id);
    }

    let name = content.trim_start_matches('#');
    channels
        .iter()
        .find(|channel| channel.name.eq_ignore_ascii_case(name))
}
