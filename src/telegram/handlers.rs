//! Update handlers: commands, URL messages and format-choice callbacks.

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, InputFile, Message, MessageId};
use teloxide::utils::command::BotCommands;
use teloxide::{ApiError, RequestError};
use url::Url;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::download::format::Selection;
use crate::download::job::{run_job, JobRequest};
use crate::download::Extractor;
use crate::telegram::keyboard::{
    audio_quality_keyboard, kind_keyboard, video_quality_keyboard, CallbackAction,
};
use crate::telegram::session::{Session, SessionStore};
use crate::telegram::transport::TelegramTransport;
use crate::telegram::Bot;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "I can:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "show usage help")]
    Help,
}

/// Dependencies shared by all handlers.
#[derive(Clone)]
pub struct HandlerDeps {
    pub extractor: Arc<dyn Extractor>,
    pub sessions: Arc<SessionStore>,
}

impl HandlerDeps {
    pub fn new(extractor: Arc<dyn Extractor>, sessions: Arc<SessionStore>) -> Self {
        Self { extractor, sessions }
    }
}

/// Creates the dispatcher schema. The same tree serves production and tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let deps = deps_messages.clone();
            async move {
                handle_message(bot, msg, deps).await?;
                Ok(())
            }
        }))
        .branch(
            Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
                let deps = deps_callback.clone();
                async move {
                    handle_callback(bot, q, deps).await?;
                    Ok(())
                }
            }),
        )
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> Result<(), HandlerError> {
    let text = match cmd {
        Command::Start => {
            "Hi! Send me a link to a video or track and I'll download it for you.\n\n\
             I support YouTube, TikTok, Instagram and 1000+ other sites."
        }
        Command::Help => {
            "Send a URL starting with http:// or https://.\n\n\
             I'll show what I found and let you pick video or audio and the quality. \
             Files up to 50 MB can be delivered."
        }
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Validates a free-text message as a candidate URL.
pub fn parse_candidate_url(text: &str) -> AppResult<Url> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.len() > config::limits::MAX_URL_LENGTH {
        return Err(AppError::InvalidUrl(trimmed.chars().take(64).collect()));
    }
    let url = Url::parse(trimmed).map_err(|_| AppError::InvalidUrl(trimmed.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::InvalidUrl(trimmed.to_string()));
    }
    Ok(url)
}

/// Builds the job for a quality choice, or fails with SessionExpired when
/// the chat has no stored URL. No engine call happens here.
pub fn job_for_selection(
    sessions: &SessionStore,
    chat_id: ChatId,
    selection: Selection,
) -> AppResult<(JobRequest, Session)> {
    let session = sessions.get(chat_id).ok_or(AppError::SessionExpired)?;
    let request = JobRequest {
        url: session.url.clone(),
        title: session.info.title.clone(),
        selection,
        duration_hint: session.info.duration_seconds,
        thumbnail_url: session.info.thumbnail_url.clone(),
    };
    Ok((request, session))
}

async fn handle_message(bot: Bot, msg: Message, deps: HandlerDeps) -> AppResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let url = match parse_candidate_url(text) {
        Ok(url) => url,
        Err(e) => {
            bot.send_message(msg.chat.id, e.user_message()).await?;
            return Ok(());
        }
    };

    log::info!("Probing {} for chat {}", url, msg.chat.id.0);
    let status = bot.send_message(msg.chat.id, "Fetching info...").await?;

    let info = match deps.extractor.probe(&url).await {
        Ok(info) => info,
        Err(e) => {
            log::warn!("Probe failed for {}: {}", url, e);
            bot.edit_message_text(msg.chat.id, status.id, AppError::Download(e).user_message())
                .await?;
            return Ok(());
        }
    };

    // Prefer a thumbnail card; fall back to plain text when the thumbnail
    // URL is absent or Telegram rejects it.
    let mut status_id = status.id;
    let mut status_is_caption = false;
    let thumbnail = info
        .thumbnail_url
        .as_deref()
        .and_then(|u| Url::parse(u).ok());

    if let Some(thumb_url) = thumbnail {
        match bot
            .send_photo(msg.chat.id, InputFile::url(thumb_url))
            .caption(info.title.clone())
            .reply_markup(kind_keyboard())
            .await
        {
            Ok(photo_msg) => {
                if let Err(e) = bot.delete_message(msg.chat.id, status.id).await {
                    log::debug!("Failed to delete probe status message: {}", e);
                }
                status_id = photo_msg.id;
                status_is_caption = true;
            }
            Err(e) => {
                log::warn!("Failed to send thumbnail card, using text: {}", e);
                bot.edit_message_text(msg.chat.id, status.id, info.title.clone())
                    .reply_markup(kind_keyboard())
                    .await?;
            }
        }
    } else {
        bot.edit_message_text(msg.chat.id, status.id, info.title.clone())
            .reply_markup(kind_keyboard())
            .await?;
    }

    deps.sessions.put(
        msg.chat.id,
        Session {
            url,
            info,
            status_message: status_id,
            status_is_caption,
        },
    );
    Ok(())
}

/// The prompt text and keyboard shown for a menu navigation action; going
/// back restores the probed title. Quality choices are not menu swaps.
fn menu_view(action: &CallbackAction, title: &str) -> Option<(String, InlineKeyboardMarkup)> {
    match action {
        CallbackAction::ChooseVideo => {
            Some(("Select video quality:".to_string(), video_quality_keyboard()))
        }
        CallbackAction::ChooseAudio => {
            Some(("Select audio quality:".to_string(), audio_quality_keyboard()))
        }
        CallbackAction::BackToMain => Some((title.to_string(), kind_keyboard())),
        CallbackAction::Quality(_) => None,
    }
}

/// Edits the prompt message to a new menu: caption or text depending on how
/// the session's card was sent, markup only when the session is gone.
async fn edit_menu(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    session: Option<&Session>,
    text: &str,
    markup: InlineKeyboardMarkup,
) -> AppResult<()> {
    let result = match session {
        Some(s) if s.status_is_caption => {
            bot.edit_message_caption(chat_id, message_id)
                .caption(text)
                .reply_markup(markup)
                .await
                .map(|_| ())
        }
        Some(_) => bot
            .edit_message_text(chat_id, message_id, text)
            .reply_markup(markup)
            .await
            .map(|_| ()),
        None => bot
            .edit_message_reply_markup(chat_id, message_id)
            .reply_markup(markup)
            .await
            .map(|_| ()),
    };
    match result {
        Ok(()) => Ok(()),
        // Pressing the same menu button twice re-sends identical content.
        Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn handle_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> AppResult<()> {
    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();

    let Some(action) = CallbackAction::parse(data) else {
        log::warn!("Unknown callback code from chat {}: {}", chat_id.0, data);
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    let session = deps.sessions.get(chat_id);

    match action {
        CallbackAction::ChooseVideo | CallbackAction::ChooseAudio | CallbackAction::BackToMain => {
            let title = session.as_ref().map(|s| s.info.title.as_str()).unwrap_or("");
            if let Some((text, markup)) = menu_view(&action, title) {
                edit_menu(&bot, chat_id, message_id, session.as_ref(), &text, markup).await?;
            }
        }
        CallbackAction::Quality(selection) => {
            match job_for_selection(&deps.sessions, chat_id, selection) {
                Ok((request, session)) => {
                    log::info!(
                        "Chat {} chose {} for {}",
                        chat_id.0,
                        selection.label(),
                        request.url
                    );
                    let transport = Arc::new(TelegramTransport::new(
                        bot.clone(),
                        chat_id,
                        session.status_message,
                        session.status_is_caption,
                    ));
                    let extractor = Arc::clone(&deps.extractor);
                    tokio::spawn(async move {
                        let _ = run_job(extractor, transport, request).await;
                    });
                }
                Err(e) => {
                    bot.send_message(chat_id, e.user_message()).await?;
                }
            }
        }
    }

    bot.answer_callback_query(q.id).await?;
    Ok(())
}
