use teloxide::utils::command::BotCommands;

/// Commands advertised in the Telegram command menu.
///
/// Parsing is done by `parse_command`; this enum only feeds `set_my_commands`.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum MenuCommand {
    #[command(description = "greeting")]
    Start,
    #[command(description = "commands available to you")]
    Help,
    #[command(description = "admin panel")]
    Panel,
}

/// Split `/cmd@botname arg1 ...` into a lowercase command and the raw argument text.
///
/// Returns `None` when the command is addressed to a different bot.
pub fn parse_command(text: &str, bot_username: Option<&str>) -> Option<(String, String)> {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let mut target = first.trim_start_matches('/').splitn(2, '@');
    let cmd = target.next().unwrap_or("").to_lowercase();
    if let (Some(addressed), Some(me)) = (target.next(), bot_username) {
        if !addressed.eq_ignore_ascii_case(me) {
            return None;
        }
    }

    Some((cmd, rest))
}
