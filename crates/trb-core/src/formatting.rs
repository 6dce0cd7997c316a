//! Formatting utilities (Telegram HTML cards, admin panel layout, reports).

use chrono::{DateTime, Utc};

use crate::{
    domain::UserId,
    messaging::types::{InlineButton, InlineKeyboard},
    relay::BroadcastReport,
    roles::{BotCommand, PanelAction, Role},
};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        return format!("{days}d {hours}h {mins}m");
    }
    if hours > 0 {
        return format!("{hours}h {mins}m {secs}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

/// Card posted to the relay chat for every inbound agent message.
pub fn relayed_message(
    user_id: UserId,
    first_name: &str,
    username: Option<&str>,
    text: &str,
) -> String {
    let handle = match username {
        Some(u) => format!("@{}", escape_html(u)),
        None => "no username".to_string(),
    };
    format!(
        "📩 <b>New message</b>\nFrom: {} ({handle})\nID: <code>{user_id}</code>\n\n{}",
        escape_html(first_name),
        escape_html(text)
    )
}

pub fn admin_panel(role: Role) -> InlineKeyboard {
    let mut kb = InlineKeyboard::default()
        .row(vec![
            InlineButton::new("➕ Add user", PanelAction::AddUser.tag()),
            InlineButton::new("➖ Remove user", PanelAction::RemoveUser.tag()),
        ])
        .row(vec![InlineButton::new(
            "👥 Allowed users",
            PanelAction::ListUsers.tag(),
        )])
        .row(vec![InlineButton::new(
            "📢 Broadcast",
            PanelAction::Broadcast.tag(),
        )])
        .row(vec![InlineButton::new("🛰 Status", PanelAction::Status.tag())]);
    if role.permits(PanelAction::ListAdmins.min_role()) {
        kb = kb.row(vec![InlineButton::new(
            "🛡 Admins",
            PanelAction::ListAdmins.tag(),
        )]);
    }
    kb
}

pub fn panel_header(role: Role) -> String {
    let who = match role {
        Role::Owner => "owner",
        _ => "admin",
    };
    format!("🛠 <b>Admin panel</b>\nSigned in as {who}.")
}

/// Command list filtered to what `role` may run.
pub fn help(role: Role) -> String {
    let mut out = String::from("<b>Commands</b>");
    for cmd in BotCommand::ALL {
        if !role.permits(cmd.min_role()) {
            continue;
        }
        let (args, about) = cmd.usage();
        out.push_str("\n/");
        out.push_str(cmd.keyword());
        if !args.is_empty() {
            out.push(' ');
            out.push_str(&escape_html(args));
        }
        out.push_str(" - ");
        out.push_str(about);
    }
    if role.permits(Role::Admin) {
        out.push_str("\n\nReply to a relayed message to answer its sender.");
    } else {
        out.push_str("\n\nAny other text you send is delivered to the owner.");
    }
    out
}

pub fn usage(cmd: BotCommand) -> String {
    let (args, about) = cmd.usage();
    format!(
        "Usage: <code>/{} {}</code>\n{about}",
        cmd.keyword(),
        escape_html(args)
    )
}

/// Hint shown for panel buttons that need an argument.
pub fn panel_hint(action: PanelAction) -> Option<String> {
    let cmd = match action {
        PanelAction::AddUser => BotCommand::AddUser,
        PanelAction::RemoveUser => BotCommand::RemoveUser,
        PanelAction::Broadcast => BotCommand::Broadcast,
        _ => return None,
    };
    Some(usage(cmd))
}

pub fn id_list(title: &str, ids: &[UserId]) -> String {
    let mut out = format!("<b>{}</b> ({})", escape_html(title), ids.len());
    if ids.is_empty() {
        out.push_str("\nnone");
        return out;
    }
    for id in ids {
        out.push_str(&format!("\n• <code>{id}</code>"));
    }
    out
}

pub fn broadcast_report(report: &BroadcastReport) -> String {
    let mut out = format!(
        "📢 Broadcast delivered to {} of {} users.",
        report.sent,
        report.total()
    );
    if !report.failed.is_empty() {
        let ids = report
            .failed
            .iter()
            .map(|id| format!("<code>{id}</code>"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("\nFailed: {ids}"));
    }
    out
}

pub struct StatusSnapshot {
    pub allowed_users: u64,
    pub admins: u64,
    pub reply_bindings: u64,
    pub started_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

pub fn status(s: &StatusSnapshot) -> String {
    let uptime = s.now.signed_duration_since(s.started_at).num_seconds();
    format!(
        "🛰 <b>System status</b>\nAllowed users: {}\nAdmins: {}\n\
         Active reply bindings: {}\nUp since: {} ({})",
        s.allowed_users,
        s.admins,
        s.reply_bindings,
        s.started_at.format("%Y-%m-%d %H:%M UTC"),
        format_duration(uptime)
    )
}
