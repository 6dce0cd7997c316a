//! Command dispatcher: routes every inbound update by sender role and keyword.
//!
//! - commands are gated by `BotCommand::min_role`
//! - panel buttons are gated by `PanelAction::min_role`
//! - replies from admins go through the reply router, everything else is relayed

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    access_store::{AccessSet, AccessStore},
    config::Config,
    domain::{ChatId, MessageRef, UserId},
    formatting::{self, escape_html, StatusSnapshot},
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, Command, IncomingUpdate, TextMessage},
    },
    relay::{RelayEngine, ReplyOutcome},
    reply_router::ReplyRouter,
    roles::{role_of, BotCommand, PanelAction, Role},
    Result,
};

pub const ACCESS_DENIED: &str = "⛔ Access denied.";
const CALLBACK_DENIED: &str = "Access denied";

pub struct CommandDispatcher {
    owner: UserId,
    greeting: String,
    store: AccessStore,
    engine: RelayEngine,
    messenger: Arc<dyn MessagingPort>,
    started_at: DateTime<Utc>,
}

impl CommandDispatcher {
    pub fn new(
        cfg: &Config,
        store: AccessStore,
        router: ReplyRouter,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            owner: cfg.owner_id,
            greeting: cfg.greeting.clone(),
            store,
            engine: RelayEngine::new(cfg.relay_chat_id, router, messenger.clone()),
            messenger,
            started_at: Utc::now(),
        }
    }

    pub fn engine(&self) -> &RelayEngine {
        &self.engine
    }

    pub fn store(&self) -> &AccessStore {
        &self.store
    }

    pub async fn role_of(&self, user_id: UserId) -> Result<Role> {
        role_of(self.owner, &self.store, user_id).await
    }

    pub async fn handle(&self, update: IncomingUpdate) -> Result<()> {
        match update {
            IncomingUpdate::Command(cmd) => self.handle_command(cmd).await,
            IncomingUpdate::Text(msg) => self.handle_text(msg).await,
            IncomingUpdate::Callback(q) => self.handle_callback(q).await,
        }
    }

    async fn say(&self, chat_id: ChatId, html: &str) -> Result<()> {
        self.messenger.send_html(chat_id, html).await?;
        Ok(())
    }

    // ============== Commands ==============

    async fn handle_command(&self, cmd: Command) -> Result<()> {
        let Some(kind) = BotCommand::parse(&cmd.name) else {
            debug!(user_id = cmd.user_id.0, command = %cmd.name, "unknown command");
            return self
                .say(cmd.chat_id, "Unknown command. Send /help for the list.")
                .await;
        };

        let role = self.role_of(cmd.user_id).await?;
        if !role.permits(kind.min_role()) {
            warn!(
                user_id = cmd.user_id.0,
                username = cmd.username.as_deref().unwrap_or("unknown"),
                command = kind.keyword(),
                "command denied"
            );
            return self.say(cmd.chat_id, ACCESS_DENIED).await;
        }

        let chat = cmd.chat_id;
        match kind {
            BotCommand::Start => self.say(chat, &escape_html(&self.greeting)).await,
            BotCommand::Help => self.say(chat, &formatting::help(role)).await,
            BotCommand::Panel => {
                self.messenger
                    .send_inline_keyboard(
                        chat,
                        &formatting::panel_header(role),
                        formatting::admin_panel(role),
                    )
                    .await?;
                Ok(())
            }
            BotCommand::AddUser | BotCommand::RemoveUser => {
                self.mutate(&cmd, kind, AccessSet::AllowedUsers).await
            }
            BotCommand::AddAdmin | BotCommand::RemoveAdmin => {
                self.mutate(&cmd, kind, AccessSet::Admins).await
            }
            BotCommand::ListUsers => {
                let ids = self.store.list_allowed_users().await?;
                self.say(chat, &formatting::id_list("Allowed users", &ids))
                    .await
            }
            BotCommand::ListAdmins => {
                let ids = self.store.list_admins().await?;
                self.say(chat, &formatting::id_list("Admins", &ids)).await
            }
            BotCommand::Broadcast => {
                let text = cmd.args.trim();
                if text.is_empty() {
                    return self.say(chat, &formatting::usage(kind)).await;
                }
                let recipients = self.store.list_allowed_users().await?;
                let report = self.engine.broadcast(&recipients, text).await;
                self.say(chat, &formatting::broadcast_report(&report)).await
            }
        }
    }

    /// add/remove against one of the two sets, after validating the id argument.
    async fn mutate(&self, cmd: &Command, kind: BotCommand, set: AccessSet) -> Result<()> {
        let Some(target) = parse_user_id(&cmd.args) else {
            return self.say(cmd.chat_id, &formatting::usage(kind)).await;
        };

        let adding = matches!(kind, BotCommand::AddUser | BotCommand::AddAdmin);
        if set == AccessSet::Admins && adding && target == self.owner {
            return self
                .say(cmd.chat_id, "The owner already has full authority.")
                .await;
        }

        if adding {
            self.store.add(set, target).await?;
        } else {
            self.store.remove(set, target).await?;
        }
        info!(
            by = cmd.user_id.0,
            target = target.0,
            command = kind.keyword(),
            "access updated"
        );

        let what = match set {
            AccessSet::AllowedUsers => "allowed users",
            AccessSet::Admins => "admins",
        };
        let html = if adding {
            format!("✅ <code>{target}</code> added to {what}.")
        } else {
            format!("✅ <code>{target}</code> removed from {what}.")
        };
        self.say(cmd.chat_id, &html).await
    }

    // ============== Text ==============

    async fn handle_text(&self, msg: TextMessage) -> Result<()> {
        if let Some(target) = msg.reply_to {
            if self.role_of(msg.user_id).await?.permits(Role::Admin) {
                return self.route_reply(&msg, target).await;
            }
        }

        if msg.chat_id == self.engine.relay_chat() {
            debug!(user_id = msg.user_id.0, "non-reply text in relay chat ignored");
            return Ok(());
        }

        self.engine.forward(&msg).await?;
        Ok(())
    }

    async fn route_reply(&self, msg: &TextMessage, target: MessageRef) -> Result<()> {
        match self.engine.reply_back(target, &msg.text).await {
            ReplyOutcome::Unbound => Ok(()),
            ReplyOutcome::Delivered(recipient) => {
                self.say(
                    msg.chat_id,
                    &format!("✅ Reply sent to <code>{recipient}</code>."),
                )
                .await
            }
            ReplyOutcome::Failed { recipient, error } => {
                self.say(
                    msg.chat_id,
                    &format!(
                        "❌ Could not deliver reply to <code>{recipient}</code>: {}",
                        escape_html(&error.to_string())
                    ),
                )
                .await
            }
        }
    }

    // ============== Panel buttons ==============

    async fn handle_callback(&self, q: CallbackQuery) -> Result<()> {
        let Some(action) = PanelAction::parse(&q.data) else {
            debug!(data = %q.data, "unknown callback data");
            self.answer(&q.callback_id, None).await;
            return Ok(());
        };

        let role = self.role_of(q.user_id).await?;
        if !role.permits(action.min_role()) {
            warn!(
                user_id = q.user_id.0,
                username = q.username.as_deref().unwrap_or("unknown"),
                action = action.tag(),
                "panel action denied"
            );
            self.answer(&q.callback_id, Some(CALLBACK_DENIED)).await;
            return Ok(());
        }
        self.answer(&q.callback_id, None).await;

        let html = match action {
            PanelAction::AddUser | PanelAction::RemoveUser | PanelAction::Broadcast => {
                formatting::panel_hint(action).unwrap_or_default()
            }
            PanelAction::ListUsers => {
                formatting::id_list("Allowed users", &self.store.list_allowed_users().await?)
            }
            PanelAction::ListAdmins => {
                formatting::id_list("Admins", &self.store.list_admins().await?)
            }
            PanelAction::Status => formatting::status(&self.status_snapshot().await?),
        };
        self.say(q.chat_id, &html).await
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.messenger.answer_callback_query(callback_id, text).await {
            warn!(error = %e, "failed to answer callback query");
        }
    }

    async fn status_snapshot(&self) -> Result<StatusSnapshot> {
        Ok(StatusSnapshot {
            allowed_users: self.store.count(AccessSet::AllowedUsers).await?,
            admins: self.store.count(AccessSet::Admins).await?,
            reply_bindings: self.engine.router().len(),
            started_at: self.started_at,
            now: Utc::now(),
        })
    }
}

/// Exactly one integer argument.
pub fn parse_user_id(args: &str) -> Option<UserId> {
    let mut parts = args.split_whitespace();
    let first = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    first.parse::<i64>().ok().map(UserId)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{domain::MessageId, testing::FakeMessenger};

    const OWNER: UserId = UserId(1);
    const ADMIN: UserId = UserId(2);
    const AGENT: UserId = UserId(42);
    const OWNER_CHAT: ChatId = ChatId(1);

    struct Harness {
        _dir: tempfile::TempDir,
        fake: Arc<FakeMessenger>,
        dispatcher: CommandDispatcher,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = AccessStore::open(dir.path().join("users.db")).await.unwrap();
        store.add_admin(ADMIN).await.unwrap();

        let cfg = Config::from_lookup(|key: &str| match key {
            "TELEGRAM_BOT_TOKEN" => Some("test-token".to_string()),
            "OWNER_ID" => Some(OWNER.0.to_string()),
            "RELAY_GREETING" => Some("Hi <there>".to_string()),
            _ => None,
        })
        .unwrap();

        let fake = Arc::new(FakeMessenger::new());
        let dispatcher = CommandDispatcher::new(
            &cfg,
            store,
            ReplyRouter::new(100, Duration::from_secs(60)),
            fake.clone(),
        );
        Harness {
            _dir: dir,
            fake,
            dispatcher,
        }
    }

    fn command(user: UserId, name: &str, args: &str) -> IncomingUpdate {
        IncomingUpdate::Command(Command {
            chat_id: user.private_chat(),
            user_id: user,
            username: None,
            name: name.to_string(),
            args: args.to_string(),
        })
    }

    fn text(
        user: UserId,
        chat: ChatId,
        body: &str,
        reply_to: Option<MessageRef>,
    ) -> IncomingUpdate {
        IncomingUpdate::Text(TextMessage {
            chat_id: chat,
            user_id: user,
            first_name: "Alice".to_string(),
            username: None,
            text: body.to_string(),
            reply_to,
        })
    }

    fn press(user: UserId, data: &str) -> IncomingUpdate {
        IncomingUpdate::Callback(CallbackQuery {
            chat_id: user.private_chat(),
            user_id: user,
            username: None,
            callback_id: format!("cb-{data}"),
            data: data.to_string(),
        })
    }

    #[test]
    fn user_id_argument_validation() {
        assert_eq!(parse_user_id(" 99 "), Some(UserId(99)));
        assert_eq!(parse_user_id("-1001"), Some(UserId(-1001)));
        assert_eq!(parse_user_id(""), None);
        assert_eq!(parse_user_id("abc"), None);
        assert_eq!(parse_user_id("1 2"), None);
        assert_eq!(parse_user_id("1.5"), None);
    }

    #[tokio::test]
    async fn roles_resolve_from_owner_and_admin_set() {
        let h = harness().await;
        assert_eq!(h.dispatcher.role_of(OWNER).await.unwrap(), Role::Owner);
        assert_eq!(h.dispatcher.role_of(ADMIN).await.unwrap(), Role::Admin);
        assert_eq!(h.dispatcher.role_of(AGENT).await.unwrap(), Role::Agent);
    }

    #[tokio::test]
    async fn start_greets_anyone() {
        let h = harness().await;
        h.dispatcher.handle(command(AGENT, "start", "")).await.unwrap();
        assert_eq!(
            h.fake.last_to(AGENT.private_chat()).as_deref(),
            Some("Hi &lt;there&gt;")
        );
    }

    #[tokio::test]
    async fn agent_cannot_add_users() {
        let h = harness().await;
        h.dispatcher.handle(command(AGENT, "adduser", "99")).await.unwrap();

        assert!(h.dispatcher.store().list_allowed_users().await.unwrap().is_empty());
        assert_eq!(
            h.fake.last_to(AGENT.private_chat()).as_deref(),
            Some(ACCESS_DENIED)
        );
    }

    #[tokio::test]
    async fn admin_adds_and_removes_users() {
        let h = harness().await;
        h.dispatcher.handle(command(ADMIN, "adduser", "99")).await.unwrap();
        assert!(h.dispatcher.store().is_allowed(UserId(99)).await.unwrap());

        h.dispatcher
            .handle(command(ADMIN, "removeuser", "99"))
            .await
            .unwrap();
        assert!(!h.dispatcher.store().is_allowed(UserId(99)).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_id_gets_usage_and_no_mutation() {
        let h = harness().await;
        h.dispatcher
            .handle(command(ADMIN, "adduser", "ninety"))
            .await
            .unwrap();
        h.dispatcher.handle(command(ADMIN, "adduser", "")).await.unwrap();

        assert!(h.dispatcher.store().list_allowed_users().await.unwrap().is_empty());
        let reply = h.fake.last_to(ADMIN.private_chat()).unwrap();
        assert!(reply.starts_with("Usage: <code>/adduser"));
    }

    #[tokio::test]
    async fn admin_management_is_owner_only() {
        let h = harness().await;
        h.dispatcher.handle(command(ADMIN, "addadmin", "5")).await.unwrap();
        assert!(!h.dispatcher.store().is_admin(UserId(5)).await.unwrap());
        assert_eq!(
            h.fake.last_to(ADMIN.private_chat()).as_deref(),
            Some(ACCESS_DENIED)
        );

        h.dispatcher.handle(command(OWNER, "addadmin", "5")).await.unwrap();
        assert!(h.dispatcher.store().is_admin(UserId(5)).await.unwrap());

        h.dispatcher.handle(command(OWNER, "listadmins", "")).await.unwrap();
        let listing = h.fake.last_to(OWNER_CHAT).unwrap();
        assert!(listing.contains("<code>2</code>"));
        assert!(listing.contains("<code>5</code>"));

        h.dispatcher
            .handle(command(OWNER, "removeadmin", "5"))
            .await
            .unwrap();
        assert!(!h.dispatcher.store().is_admin(UserId(5)).await.unwrap());
    }

    #[tokio::test]
    async fn owner_is_never_stored_as_admin() {
        let h = harness().await;
        h.dispatcher
            .handle(command(OWNER, "addadmin", &OWNER.0.to_string()))
            .await
            .unwrap();
        assert!(!h.dispatcher.store().is_admin(OWNER).await.unwrap());
    }

    #[tokio::test]
    async fn broadcast_reports_partial_delivery() {
        let h = harness().await;
        for id in [1, 2, 3] {
            h.dispatcher
                .store()
                .add_allowed_user(UserId(id))
                .await
                .unwrap();
        }
        h.fake.fail_for(ChatId(2));

        h.dispatcher
            .handle(command(OWNER, "broadcast", "hi"))
            .await
            .unwrap();

        assert_eq!(h.fake.last_to(ChatId(3)).as_deref(), Some("hi"));
        let owner_chat = h.fake.sent_to(OWNER_CHAT);
        assert_eq!(owner_chat[0].text, "hi");
        let report = &owner_chat[1].text;
        assert!(report.contains("2 of 3"));
        assert!(report.contains("Failed: <code>2</code>"));
    }

    #[tokio::test]
    async fn empty_broadcast_gets_usage() {
        let h = harness().await;
        h.dispatcher.handle(command(ADMIN, "broadcast", "  ")).await.unwrap();
        let reply = h.fake.last_to(ADMIN.private_chat()).unwrap();
        assert!(reply.contains("/broadcast"));
    }

    #[tokio::test]
    async fn end_to_end_relay_and_reply() {
        let h = harness().await;

        h.dispatcher
            .handle(text(AGENT, AGENT.private_chat(), "help me", None))
            .await
            .unwrap();
        let card = h.fake.sent_to(OWNER_CHAT).pop().unwrap();
        assert!(card.text.contains("42"));
        assert!(card.text.contains("help me"));
        assert_eq!(card.message.message_id, MessageId(1001));
        assert_eq!(
            h.dispatcher.engine().router().resolve(card.message),
            Some(AGENT)
        );

        h.dispatcher
            .handle(text(OWNER, OWNER_CHAT, "sure, on it", Some(card.message)))
            .await
            .unwrap();
        assert_eq!(
            h.fake.last_to(AGENT.private_chat()).as_deref(),
            Some("sure, on it")
        );
        assert!(h
            .fake
            .last_to(OWNER_CHAT)
            .unwrap()
            .contains("Reply sent to <code>42</code>"));
    }

    #[tokio::test]
    async fn admin_reply_to_unbound_message_is_silent() {
        let h = harness().await;
        let stray = MessageRef {
            chat_id: OWNER_CHAT,
            message_id: MessageId(5000),
        };
        h.dispatcher
            .handle(text(OWNER, OWNER_CHAT, "hello?", Some(stray)))
            .await
            .unwrap();
        assert!(h.fake.all().is_empty());
    }

    #[tokio::test]
    async fn agent_replies_are_relayed_not_routed() {
        let h = harness().await;
        let some_msg = MessageRef {
            chat_id: AGENT.private_chat(),
            message_id: MessageId(3),
        };
        h.dispatcher
            .handle(text(AGENT, AGENT.private_chat(), "thanks!", Some(some_msg)))
            .await
            .unwrap();
        assert!(h.fake.last_to(OWNER_CHAT).unwrap().contains("thanks!"));
    }

    #[tokio::test]
    async fn failed_relay_surfaces_error() {
        let h = harness().await;
        h.fake.fail_for(OWNER_CHAT);
        let res = h
            .dispatcher
            .handle(text(AGENT, AGENT.private_chat(), "help", None))
            .await;
        assert!(res.is_err());
        h.dispatcher.engine().router().sync();
        assert!(h.dispatcher.engine().router().is_empty());
    }

    #[tokio::test]
    async fn relay_chat_chatter_is_not_echoed() {
        let h = harness().await;
        h.dispatcher
            .handle(text(OWNER, OWNER_CHAT, "note to self", None))
            .await
            .unwrap();
        assert!(h.fake.all().is_empty());
    }

    #[tokio::test]
    async fn panel_layout_depends_on_role() {
        let h = harness().await;
        h.dispatcher.handle(command(ADMIN, "panel", "")).await.unwrap();
        h.dispatcher.handle(command(OWNER, "panel", "")).await.unwrap();

        let admin_kb = h.fake.sent_to(ADMIN.private_chat())[0]
            .keyboard
            .clone()
            .unwrap();
        assert!(!admin_kb.callback_tags().contains(&"list_admins"));
        let owner_kb = h.fake.sent_to(OWNER_CHAT)[0].keyboard.clone().unwrap();
        assert!(owner_kb.callback_tags().contains(&"list_admins"));
    }

    #[tokio::test]
    async fn panel_buttons() {
        let h = harness().await;
        h.dispatcher
            .store()
            .add_allowed_user(UserId(77))
            .await
            .unwrap();

        h.dispatcher.handle(press(ADMIN, "add_user")).await.unwrap();
        assert!(h
            .fake
            .last_to(ADMIN.private_chat())
            .unwrap()
            .contains("/adduser"));

        h.dispatcher.handle(press(ADMIN, "list_users")).await.unwrap();
        assert!(h
            .fake
            .last_to(ADMIN.private_chat())
            .unwrap()
            .contains("<code>77</code>"));

        h.dispatcher.handle(press(ADMIN, "status")).await.unwrap();
        let status = h.fake.last_to(ADMIN.private_chat()).unwrap();
        assert!(status.contains("Allowed users: 1"));
        assert!(status.contains("Admins: 1"));

        assert!(h.fake.answers().iter().all(|(_, text)| text.is_none()));
    }

    #[tokio::test]
    async fn gated_buttons_are_refused() {
        let h = harness().await;
        h.dispatcher.handle(press(AGENT, "list_users")).await.unwrap();
        h.dispatcher.handle(press(ADMIN, "list_admins")).await.unwrap();

        assert!(h.fake.all().is_empty());
        let answers = h.fake.answers();
        assert_eq!(answers.len(), 2);
        assert!(answers
            .iter()
            .all(|(_, text)| text.as_deref() == Some(CALLBACK_DENIED)));
    }

    #[tokio::test]
    async fn unknown_command_points_to_help() {
        let h = harness().await;
        h.dispatcher.handle(command(AGENT, "frobnicate", "")).await.unwrap();
        assert!(h
            .fake
            .last_to(AGENT.private_chat())
            .unwrap()
            .contains("/help"));
    }
}
