//! Thin wrapper over the Telegram Bot API for outbound calls
//!
//! Every webhook invocation may serve a different bot, so a `Bot` handle is
//! built per call from the project's token on top of one shared HTTP
//! client. The API base URL can be overridden (local Bot API server,
//! tests).

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, PreCheckoutQuery};
use url::Url;

use crate::core::error::AppResult;
use crate::storage::commands::ButtonSpec;

#[derive(Clone)]
pub struct Gateway {
    client: reqwest::Client,
    api_url: Option<Url>,
}

impl Gateway {
    /// Create a gateway over a shared HTTP client.
    ///
    /// `api_url` of `None` means the public api.telegram.org.
    pub fn new(client: reqwest::Client, api_url: Option<Url>) -> Self {
        Self { client, api_url }
    }

    fn bot(&self, token: &str) -> Bot {
        let bot = Bot::with_client(token, self.client.clone());
        match &self.api_url {
            Some(url) => bot.set_api_url(url.clone()),
            None => bot,
        }
    }

    /// Send an HTML-formatted text reply, with an inline keyboard when
    /// buttons are given
    pub async fn send_message(
        &self,
        token: &str,
        chat_id: ChatId,
        text: &str,
        buttons: Option<&[ButtonSpec]>,
    ) -> AppResult<()> {
        let request = self
            .bot(token)
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html);

        match buttons.map(build_keyboard) {
            Some(keyboard) if !keyboard.inline_keyboard.is_empty() => {
                request.reply_markup(keyboard).await?;
            }
            _ => {
                request.await?;
            }
        }
        Ok(())
    }

    /// Acknowledge a callback query so the client stops its loading
    /// indicator. Callers fire this before any routing and ignore failures.
    pub async fn answer_callback(&self, token: &str, query: &CallbackQuery) -> AppResult<()> {
        self.bot(token).answer_callback_query(query.id.clone()).await?;
        Ok(())
    }

    /// Answer a pre-checkout query with an approval decision
    pub async fn answer_pre_checkout(&self, token: &str, query: &PreCheckoutQuery, ok: bool) -> AppResult<()> {
        self.bot(token)
            .answer_pre_checkout_query(query.id.clone(), ok)
            .await?;
        Ok(())
    }
}

/// One keyboard row per configured button. Buttons with an unparseable URL
/// or with neither payload nor URL are dropped.
fn build_keyboard(buttons: &[ButtonSpec]) -> InlineKeyboardMarkup {
    let rows = buttons.iter().filter_map(|spec| {
        if let Some(data) = &spec.callback_data {
            return Some(vec![InlineKeyboardButton::callback(spec.text.clone(), data.clone())]);
        }
        if let Some(raw) = &spec.url {
            match Url::parse(raw) {
                Ok(url) => return Some(vec![InlineKeyboardButton::url(spec.text.clone(), url)]),
                Err(e) => {
                    log::warn!("Dropping button with invalid url {raw}: {e}");
                    return None;
                }
            }
        }
        log::warn!("Dropping button {:?} with neither callback_data nor url", spec.text);
        None
    });
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(text: &str, callback: Option<&str>, url: Option<&str>) -> ButtonSpec {
        ButtonSpec {
            text: text.into(),
            callback_data: callback.map(Into::into),
            url: url.map(Into::into),
        }
    }

    #[test]
    fn keyboard_has_one_row_per_button() {
        let keyboard = build_keyboard(&[
            button("Go", Some("go"), None),
            button("Docs", None, Some("https://example.com/docs")),
        ]);
        assert_eq!(keyboard.inline_keyboard.len(), 2);
        assert_eq!(keyboard.inline_keyboard[0].len(), 1);
    }

    #[test]
    fn unusable_buttons_are_dropped() {
        let keyboard = build_keyboard(&[
            button("broken", None, Some("not a url")),
            button("empty", None, None),
            button("ok", Some("ok"), None),
        ]);
        assert_eq!(keyboard.inline_keyboard.len(), 1);
    }
}
