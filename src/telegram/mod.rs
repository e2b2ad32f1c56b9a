//! Telegram surface: bot setup, session store, keyboards, handlers and the
//! job transport.

pub mod handlers;
pub mod keyboard;
pub mod session;
pub mod transport;

use reqwest::ClientBuilder;

use crate::core::config;

pub type Bot = teloxide::Bot;

/// Creates the bot with an HTTP client whose timeout covers multi-minute
/// uploads of files near the size limit.
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    Ok(Bot::from_env_with_client(client))
}
