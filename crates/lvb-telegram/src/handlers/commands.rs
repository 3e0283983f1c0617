use std::sync::Arc;

use teloxide::prelude::*;
use tracing::warn;

use lvb_core::{
    domain::ChatId,
    formatting::escape_html,
    messaging::types::InlineKeyboard,
    settings::ChatSettings,
};

use crate::router::AppState;

use super::check::run_check;

pub(crate) const TOGGLE_INVALID_CALLBACK: &str = "settings:invalid:toggle";

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn parse_on_off(arg: &str) -> Option<bool> {
    match arg.trim().to_lowercase().as_str() {
        "on" | "yes" | "true" | "1" | "show" => Some(true),
        "off" | "no" | "false" | "0" | "hide" => Some(false),
        _ => None,
    }
}

fn help_html(max_links: usize) -> String {
    format!(
        "🔗 <b>Link Validator Bot</b>\n\n\
Send one or more links and I'll check them.\n\
Recognized: <code>https://…</code>, <code>http://…</code>, <code>t.me/…</code>\n\
Up to {max_links} links per message; duplicates are checked once.\n\n\
<b>📋 Commands:</b>\n\
/check &lt;links&gt; - Check links\n\
/settings - Show report settings\n\
/showinvalid on|off - Show or hide invalid links in reports\n\
/help - Show this message\n\n\
<b>💡 Tips:</b>\n\
• Results are ordered: ✅ valid, ❌ invalid, ❔ unknown\n\
• You can also send a .txt file with links"
    )
}

pub(crate) fn settings_html(settings: ChatSettings) -> String {
    let invalid = if settings.show_invalid {
        "shown"
    } else {
        "hidden"
    };
    format!(
        "⚙️ <b>Report settings</b>\n\nInvalid links: <b>{}</b>\n\n<i>Hidden invalid links are still counted in the report header.</i>",
        escape_html(invalid)
    )
}

pub(crate) fn settings_keyboard(settings: ChatSettings) -> InlineKeyboard {
    let label = if settings.show_invalid {
        "Hide invalid links"
    } else {
        "Show invalid links"
    };
    InlineKeyboard::single(label, TOGGLE_INVALID_CALLBACK)
}

pub async fn handle_command(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let user_id = user.id.0 as i64;
    let chat_id = msg.chat.id.0;
    let chat = ChatId(chat_id);
    let messenger = state.messenger.clone();

    let (cmd, arg) = parse_command(text);

    match cmd.as_str() {
        "start" | "help" => {
            let _ = messenger
                .send_html(chat, &help_html(state.cfg.max_links_per_message))
                .await;
            Ok(())
        }

        "check" => {
            if arg.is_empty() {
                let _ = messenger
                    .send_text(chat, "Usage: /check <links>")
                    .await;
                return Ok(());
            }
            let _guard = state.chat_locks.lock_chat(chat_id).await;
            run_check(&state, chat_id, user_id, &arg).await;
            Ok(())
        }

        "settings" => {
            let settings = state.settings.get(chat).await;
            if messenger.capabilities().supports_inline_keyboards {
                let _ = messenger
                    .send_inline_keyboard(
                        chat,
                        &settings_html(settings),
                        settings_keyboard(settings),
                    )
                    .await;
            } else {
                let html = format!(
                    "{}\n\nUse /showinvalid on|off to change it.",
                    settings_html(settings)
                );
                let _ = messenger.send_html(chat, &html).await;
            }
            Ok(())
        }

        "showinvalid" => {
            let Some(show) = parse_on_off(&arg) else {
                let _ = messenger
                    .send_text(chat, "Usage: /showinvalid on|off")
                    .await;
                return Ok(());
            };
            match state.settings.set_show_invalid(chat, show).await {
                Ok(s) => {
                    let _ = messenger.send_html(chat, &settings_html(s)).await;
                }
                Err(e) => {
                    warn!(chat_id, error = %e, "failed to save settings");
                    let _ = messenger
                        .send_text(chat, "❌ Could not save settings. Try again later.")
                        .await;
                }
            }
            Ok(())
        }

        _ => {
            let msg = format!("Unknown command: /{}", escape_html(&cmd));
            let _ = messenger.send_html(chat, &msg).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_bot_suffix() {
        assert_eq!(
            parse_command("/Check@LinkBot t.me/a t.me/b"),
            ("check".to_string(), "t.me/a t.me/b".to_string())
        );
        assert_eq!(parse_command("/help"), ("help".to_string(), String::new()));
    }

    #[test]
    fn parses_on_off_arguments() {
        assert_eq!(parse_on_off("ON"), Some(true));
        assert_eq!(parse_on_off(" hide "), Some(false));
        assert_eq!(parse_on_off("maybe"), None);
    }

    #[test]
    fn settings_view_reflects_state() {
        let shown = ChatSettings { show_invalid: true };
        assert!(settings_html(shown).contains("<b>shown</b>"));
        assert_eq!(
            settings_keyboard(shown).buttons[0].label,
            "Hide invalid links"
        );

        let hidden = ChatSettings {
            show_invalid: false,
        };
        assert!(settings_html(hidden).contains("<b>hidden</b>"));
        assert_eq!(
            settings_keyboard(hidden).buttons[0].callback_data,
            TOGGLE_INVALID_CALLBACK
        );
    }
}
