use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, utils::command::BotCommands};
use tracing::{info, warn};

use trb_core::{
    access_store::AccessStore, config::Config, dispatcher::CommandDispatcher,
    messaging::port::MessagingPort, reply_router::ReplyRouter,
};

use crate::handlers::{self, commands::MenuCommand};
use crate::TelegramMessenger;

pub struct AppState {
    pub bot: Bot,
    /// Our own `@username`, used to skip commands addressed to other bots.
    pub bot_username: Option<String>,
    pub dispatcher: CommandDispatcher,
}

/// Long-poll Telegram until Ctrl-C.
pub async fn run_polling(cfg: Arc<Config>, store: AccessStore) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            info!(bot = %me.username(), "relay bot started");
            Some(me.username().to_string())
        }
        Err(e) => {
            warn!(error = %e, "get_me failed");
            None
        }
    };
    info!(
        owner = cfg.owner_id.0,
        relay_chat = cfg.relay_chat_id.0,
        "relay configured"
    );

    if let Err(e) = bot.set_my_commands(MenuCommand::bot_commands()).await {
        warn!(error = %e, "failed to register command menu");
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let router = ReplyRouter::new(cfg.reply_binding_capacity, cfg.reply_binding_ttl);

    if cfg.startup_notify {
        let messenger = messenger.clone();
        let chat = cfg.relay_chat_id;
        tokio::spawn(async move {
            if let Err(e) = messenger.send_html(chat, "🟢 <b>Relay online</b>").await {
                warn!(error = %e, "startup notification failed");
            }
        });
    }

    let state = Arc::new(AppState {
        bot: bot.clone(),
        bot_username,
        dispatcher: CommandDispatcher::new(&cfg, store, router, messenger),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("polling stopped");
    Ok(())
}
