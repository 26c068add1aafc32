//! # Jukebox
//!
//! Discord music bot: per-guild track queues, voice playback through Songbird, and an
//! HTTP control API that drives the same playback state as the slash commands.
//!
//! - [`sources`] resolves URLs and search terms into playable tracks
//! - [`audio`] owns queues, voice sessions and the playback coordinator
//! - [`bot`] is the Discord gateway handler
//! - [`api`] is the HTTP control surface
//! - [`ui`] holds reply texts and embeds

pub mod api;
pub mod audio;
pub mod bot;
pub mod config;
pub mod sources;
pub mod ui;
