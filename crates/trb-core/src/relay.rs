//! Relay engine: forward agent messages, route replies back, fan out broadcasts.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::{
    domain::{ChatId, MessageRef, UserId},
    errors::Error,
    formatting::relayed_message,
    messaging::{port::MessagingPort, types::TextMessage},
    reply_router::ReplyRouter,
    Result,
};

/// Result of a broadcast fan-out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: Vec<UserId>,
}

impl BroadcastReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed.len()
    }
}

/// Result of routing a reply back to an agent.
#[derive(Debug)]
pub enum ReplyOutcome {
    /// The replied-to message has no (live) binding.
    Unbound,
    Delivered(UserId),
    Failed { recipient: UserId, error: Error },
}

#[derive(Clone)]
pub struct RelayEngine {
    relay_chat: ChatId,
    router: ReplyRouter,
    messenger: Arc<dyn MessagingPort>,
}

impl RelayEngine {
    pub fn new(relay_chat: ChatId, router: ReplyRouter, messenger: Arc<dyn MessagingPort>) -> Self {
        Self {
            relay_chat,
            router,
            messenger,
        }
    }

    pub fn relay_chat(&self) -> ChatId {
        self.relay_chat
    }

    pub fn router(&self) -> &ReplyRouter {
        &self.router
    }

    /// Post the message card to the relay chat, then bind it to the sender.
    ///
    /// No binding is created when the send fails.
    pub async fn forward(&self, msg: &TextMessage) -> Result<MessageRef> {
        let html = relayed_message(
            msg.user_id,
            &msg.first_name,
            msg.username.as_deref(),
            &msg.text,
        );

        let sent = match self.messenger.send_html(self.relay_chat, &html).await {
            Ok(sent) => sent,
            Err(e) => {
                error!(user_id = msg.user_id.0, error = %e, "relay to owner failed");
                return Err(e);
            }
        };

        self.router.bind(sent, msg.user_id);
        info!(
            user_id = msg.user_id.0,
            message_id = sent.message_id.0,
            chars = msg.text.chars().count(),
            "relayed message"
        );
        Ok(sent)
    }

    /// Send `text` to whoever originated the relayed message `target`.
    pub async fn reply_back(&self, target: MessageRef, text: &str) -> ReplyOutcome {
        let Some(recipient) = self.router.resolve(target) else {
            debug!(
                chat_id = target.chat_id.0,
                message_id = target.message_id.0,
                "reply to unbound message ignored"
            );
            return ReplyOutcome::Unbound;
        };

        match self.messenger.send_text(recipient.private_chat(), text).await {
            Ok(_) => {
                info!(user_id = recipient.0, "reply delivered");
                ReplyOutcome::Delivered(recipient)
            }
            Err(error) => {
                error!(user_id = recipient.0, error = %error, "reply delivery failed");
                ReplyOutcome::Failed { recipient, error }
            }
        }
    }

    /// Best-effort sequential fan-out. Per-recipient failures are recorded, never raised.
    pub async fn broadcast(&self, recipients: &[UserId], text: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for &user_id in recipients {
            match self.messenger.send_text(user_id.private_chat(), text).await {
                Ok(_) => report.sent += 1,
                Err(e) => {
                    warn!(user_id = user_id.0, error = %e, "broadcast send failed");
                    report.failed.push(user_id);
                }
            }
        }
        info!(
            sent = report.sent,
            failed = report.failed.len(),
            "broadcast finished"
        );
        report
    }
}
