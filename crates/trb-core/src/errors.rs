/// Core error type for the relay bot.
///
/// Adapter crates should map their specific errors into this type so the
/// dispatcher can handle failures consistently (log vs report to the admin).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("access store is closed")]
    StoreClosed,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolClosed => Error::StoreClosed,
            other => Error::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
