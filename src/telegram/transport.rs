//! Telegram-backed implementation of the job [`Transport`] seam.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};
use teloxide::{ApiError, RequestError};
use url::Url;

use crate::core::config;
use crate::core::error::AppResult;
use crate::download::job::{Delivery, DeliveryFile, Transport};
use crate::download::locate::MediaType;
use crate::telegram::Bot;

/// One job's outbound channel: a single editable status message plus the
/// final media send.
pub struct TelegramTransport {
    bot: Bot,
    chat_id: ChatId,
    status_message: MessageId,
    /// The status message is a thumbnail photo, so edits go to its caption.
    status_is_caption: bool,
}

impl TelegramTransport {
    pub fn new(bot: Bot, chat_id: ChatId, status_message: MessageId, status_is_caption: bool) -> Self {
        Self { bot, chat_id, status_message, status_is_caption }
    }

    fn is_not_modified(err: &RequestError) -> bool {
        matches!(err, RequestError::Api(ApiError::MessageNotModified))
    }

    fn is_timeout(err: &RequestError) -> bool {
        matches!(err, RequestError::Network(e) if e.is_timeout())
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn update_status(&self, text: &str) -> AppResult<()> {
        let result = if self.status_is_caption {
            self.bot
                .edit_message_caption(self.chat_id, self.status_message)
                .caption(text)
                .await
        } else {
            self.bot
                .edit_message_text(self.chat_id, self.status_message, text)
                .await
        };
        match result {
            Ok(_) => Ok(()),
            // The throttler already suppresses identical texts, but a
            // restarted edit can still race into this.
            Err(e) if Self::is_not_modified(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn deliver(&self, file: DeliveryFile<'_>) -> AppResult<Delivery> {
        let input = InputFile::file(file.path.to_path_buf());
        let upload_timeout = config::network::timeout();

        let send = async {
            match file.media {
                MediaType::Video => {
                    let mut req = self
                        .bot
                        .send_video(self.chat_id, input)
                        .caption(file.title)
                        .supports_streaming(true);
                    if let Some(duration) = file.duration_seconds {
                        req = req.duration(duration);
                    }
                    req.await.map(|_| ())
                }
                MediaType::Audio => {
                    let mut req = self.bot.send_audio(self.chat_id, input).title(file.title);
                    if let Some(duration) = file.duration_seconds {
                        req = req.duration(duration);
                    }
                    let thumbnail = file.thumbnail_url.and_then(|u| Url::parse(u).ok());
                    if let Some(thumb_url) = thumbnail {
                        req = req.thumbnail(InputFile::url(thumb_url));
                    }
                    req.await.map(|_| ())
                }
                MediaType::Image => self
                    .bot
                    .send_photo(self.chat_id, input)
                    .caption(file.title)
                    .await
                    .map(|_| ()),
            }
        };

        match tokio::time::timeout(upload_timeout, send).await {
            Ok(Ok(())) => {
                // The status line has served its purpose once the media is
                // in the chat.
                if let Err(e) = self.bot.delete_message(self.chat_id, self.status_message).await {
                    log::debug!("Failed to delete status message: {}", e);
                }
                Ok(Delivery::Sent)
            }
            Ok(Err(e)) if Self::is_timeout(&e) => Ok(Delivery::TimedOut),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(Delivery::TimedOut),
        }
    }
}
