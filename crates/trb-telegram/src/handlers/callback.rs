use teloxide::types::CallbackQuery as TgCallbackQuery;

use trb_core::{
    domain::ChatId,
    messaging::types::{CallbackQuery, IncomingUpdate},
};

use super::text::user_id;

/// Button presses need both a chat to answer in and a data tag.
pub(super) fn to_update(q: &TgCallbackQuery) -> Option<IncomingUpdate> {
    let message = q.message.as_ref()?;
    let data = q.data.clone().filter(|d| !d.is_empty())?;

    Some(IncomingUpdate::Callback(CallbackQuery {
        chat_id: ChatId(message.chat.id.0),
        user_id: user_id(&q.from),
        username: q.from.username.clone(),
        callback_id: q.id.clone(),
        data,
    }))
}
