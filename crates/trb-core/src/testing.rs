//! Recording `MessagingPort` used by the crate's tests.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicI32, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::InlineKeyboard},
    Result,
};

#[derive(Clone, Debug)]
pub struct SentMessage {
    pub message: MessageRef,
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

#[derive(Debug)]
pub struct FakeMessenger {
    next_id: AtomicI32,
    failing: Mutex<HashSet<i64>>,
    sent: Mutex<Vec<SentMessage>>,
    answers: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeMessenger {
    /// Message ids are handed out sequentially starting at 1001.
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1001),
            failing: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
            answers: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_for(&self, chat_id: ChatId) {
        self.failing.lock().unwrap().insert(chat_id.0);
    }

    pub fn all(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: ChatId) -> Vec<SentMessage> {
        self.all()
            .into_iter()
            .filter(|m| m.message.chat_id == chat_id)
            .collect()
    }

    pub fn last_to(&self, chat_id: ChatId) -> Option<String> {
        self.sent_to(chat_id).pop().map(|m| m.text)
    }

    pub fn answers(&self) -> Vec<(String, Option<String>)> {
        self.answers.lock().unwrap().clone()
    }

    fn record(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        if self.failing.lock().unwrap().contains(&chat_id.0) {
            return Err(Error::Transport(format!(
                "chat {} is unreachable",
                chat_id.0
            )));
        }
        let message = MessageRef {
            chat_id,
            message_id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        self.sent.lock().unwrap().push(SentMessage {
            message,
            text: text.to_string(),
            keyboard,
        });
        Ok(message)
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.record(chat_id, html, None)
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.record(chat_id, text, None)
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.record(chat_id, html, Some(keyboard))
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(|s| s.to_string())));
        Ok(())
    }
}
