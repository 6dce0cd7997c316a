use crate::domain::{ChatId, MessageRef, UserId};

/// Messenger-agnostic incoming update model.
///
/// Telegram-specific fields should live in the Telegram adapter.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Command(Command),
    Text(TextMessage),
    Callback(CallbackQuery),
}

#[derive(Clone, Debug)]
pub struct Command {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub name: String,
    pub args: String,
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub first_name: String,
    pub username: Option<String>,
    pub text: String,
    /// The message this one replies to, if any.
    pub reply_to: Option<MessageRef>,
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub callback_id: String,
    pub data: String,
}

/// Inline keyboard laid out as rows of buttons.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

impl InlineKeyboard {
    pub fn row(mut self, buttons: Vec<InlineButton>) -> Self {
        self.rows.push(buttons);
        self
    }

    /// All callback tags, in layout order.
    pub fn callback_tags(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .map(|b| b.callback_data.as_str())
            .collect()
    }
}
