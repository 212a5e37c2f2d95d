//! Newsdesk — news curation bot for a moderated Telegram channel.

pub mod bot;
pub mod channel;
pub mod config;
pub mod error;
pub mod feed;
pub mod llm;
pub mod store;
pub mod workflow;
