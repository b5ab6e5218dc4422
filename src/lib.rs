//! A Telegram bot that chats and draws with hosted models.
//!
//! Teleimagine is based on the [`teloxide`](https://docs.rs/teloxide/latest/teloxide/)
//! framework and relays every message to models hosted on [Bytez](https://bytez.com):
//! plain text goes to a chat model, `/imagine <prompt>` goes to an image model.
//!
//! ## Getting Started
//!
//! The bot is a single-binary executable that serves a webhook for Telegram:
//!
//! ```shell
//! $ TELEGRAM_BOT_TOKEN=... BYTEZ_API_KEY=... /path/to/teleimagine
//! ```
//!
//! Once it is reachable from the internet, open `https://<host>/` to register
//! the webhook. For local testing, `--polling` pulls updates instead.
//!
//! The configuration is described in [`config`] module, the bootstrapping in
//! [`app`]. The per-chat state machine lives in [`state`] and the model calls
//! in [`relay`].

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate async_trait;

pub mod app;
pub mod config;
mod dispatcher;
pub mod messenger;
pub mod models;
mod module_mgr;
mod modules;
pub mod relay;
pub mod state;
mod types;
mod utils;
mod webhook;
