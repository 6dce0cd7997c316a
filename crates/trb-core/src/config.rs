use std::{env, io, path::PathBuf, time::Duration};

use crate::{
    domain::{ChatId, UserId},
    errors::Error,
    Result,
};

const DEFAULT_GREETING: &str =
    "Hello! Send your message here and it will be delivered to the owner.";

/// Upper bound for `REPLY_BINDING_TTL_HOURS` (100 years).
const MAX_TTL_HOURS: u64 = 100 * 365 * 24;

/// Typed configuration for the relay bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub owner_id: UserId,
    pub relay_chat_id: ChatId,

    // Storage
    pub database_path: PathBuf,

    // Reply bindings
    pub reply_binding_capacity: u64,
    pub reply_binding_ttl: Duration,

    // Behavior
    pub greeting: String,
    pub startup_notify: bool,
}

impl Config {
    /// Load from `.env` (if present) and the process environment.
    pub fn load() -> Result<Self> {
        // Existing variables win over `.env` entries.
        check_dotenv(dotenvy::dotenv())?;
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_str = |key: &str| lookup(key).and_then(non_empty);

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;

        let owner_raw = env_str("OWNER_ID")
            .ok_or_else(|| Error::Config("OWNER_ID environment variable is required".to_string()))?;
        let owner_id = UserId(parse_i64("OWNER_ID", &owner_raw)?);

        let relay_chat_id = match env_str("RELAY_CHAT_ID") {
            Some(raw) => ChatId(parse_i64("RELAY_CHAT_ID", &raw)?),
            None => owner_id.private_chat(),
        };

        let database_path =
            PathBuf::from(env_str("DATABASE_PATH").unwrap_or_else(|| "users.db".to_string()));

        let reply_binding_capacity = match env_str("REPLY_BINDING_CAPACITY") {
            Some(raw) => parse_positive("REPLY_BINDING_CAPACITY", &raw)?,
            None => 10_000,
        };
        let ttl_hours = match env_str("REPLY_BINDING_TTL_HOURS") {
            Some(raw) => parse_positive("REPLY_BINDING_TTL_HOURS", &raw)?,
            None => 168,
        };
        let reply_binding_ttl = ttl_from_hours(ttl_hours)?;

        let greeting = env_str("RELAY_GREETING").unwrap_or_else(|| DEFAULT_GREETING.to_string());
        let startup_notify = env_str("STARTUP_NOTIFY")
            .map(|s| parse_bool(&s))
            .unwrap_or(true);

        Ok(Self {
            telegram_bot_token,
            owner_id,
            relay_chat_id,
            database_path,
            reply_binding_capacity,
            reply_binding_ttl,
            greeting,
            startup_notify,
        })
    }
}

/// A missing `.env` is fine; an unreadable or malformed one is not.
fn check_dotenv(res: std::result::Result<PathBuf, dotenvy::Error>) -> Result<()> {
    match res {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Config(format!("failed to load .env: {e}"))),
    }
}

fn ttl_from_hours(hours: u64) -> Result<Duration> {
    if hours > MAX_TTL_HOURS {
        return Err(Error::Config(format!(
            "REPLY_BINDING_TTL_HOURS must be at most {MAX_TTL_HOURS}, got {hours}"
        )));
    }
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::Config(format!("REPLY_BINDING_TTL_HOURS overflows: {hours}")))
}

fn parse_i64(key: &str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::Config(format!("{key} must be an integer, got {raw:?}")))
}

fn parse_positive(key: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::Config(format!(
            "{key} must be a positive integer, got {raw:?}"
        ))),
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
