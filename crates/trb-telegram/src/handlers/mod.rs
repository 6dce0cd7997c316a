//! Telegram update handlers.
//!
//! Each handler is a small adapter that:
//! - converts the teloxide update into a `trb-core` `IncomingUpdate`
//! - hands it to the core dispatcher
//! - logs (never propagates) handler failures so polling keeps going

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};
use tracing::error;

use trb_core::messaging::types::IncomingUpdate;

use crate::router::AppState;

mod callback;
pub mod commands;
mod text;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(update) = callback::to_update(&q) else {
        // Still answer, so the client stops spinning.
        let _ = state.bot.answer_callback_query(q.id).await;
        return Ok(());
    };
    dispatch(&state, update).await;
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(update) = text::to_update(&msg, state.bot_username.as_deref()) else {
        return Ok(());
    };
    dispatch(&state, update).await;
    Ok(())
}

async fn dispatch(state: &AppState, update: IncomingUpdate) {
    let kind = match &update {
        IncomingUpdate::Command(_) => "command",
        IncomingUpdate::Text(_) => "text",
        IncomingUpdate::Callback(_) => "callback",
    };
    if let Err(e) = state.dispatcher.handle(update).await {
        error!(kind, error = %e, "update handler failed");
    }
}
