use std::sync::Arc;

use teloxide::prelude::*;

use crate::handlers::check::run_check;
use crate::router::AppState;

pub async fn handle_text(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if text.trim().is_empty() {
        return Ok(());
    }

    run_check(&state, msg.chat.id.0, user.id.0 as i64, text).await;
    Ok(())
}
