use std::sync::Arc;

use tracing::info;

use trb_core::{access_store::AccessStore, config::Config};

#[tokio::main]
async fn main() -> Result<(), trb_core::Error> {
    trb_core::logging::init("trb")?;

    let cfg = Arc::new(Config::load()?);
    let store = AccessStore::open(&cfg.database_path).await?;

    let result = trb_telegram::router::run_polling(cfg, store.clone()).await;

    store.close().await;
    info!("access store closed");

    result.map_err(|e| trb_core::Error::Transport(format!("telegram bot failed: {e}")))
}
