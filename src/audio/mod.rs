//! # Audio Module
//!
//! Per-guild playback core.
//!
//! ## Architecture
//!
//! ### [`queue`] - Queue Management
//! - FIFO track queue per guild
//! - Registry that creates queues on first access
//!
//! ### [`voice`] - Voice Sessions
//! - Connection and transport state per guild
//! - Playback epochs to tell stale end-of-track reports from real ones
//!
//! ### [`player`] - Playback Coordinator
//! - Owns the "now playing" slot and elapsed-time accounting
//! - Serializes every operation on a guild, including track-end handling
//!
//! ### [`transport`] / [`driver`] - Audio Transport
//! - Traits the core streams through
//! - Songbird implementation used in production
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use jukebox::audio::{
//!     driver::SongbirdTransport, player::PlaybackCoordinator, queue::QueueRegistry,
//!     voice::SessionRegistry,
//! };
//! use serenity::all::{ChannelId, GuildId};
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     manager: Arc<songbird::Songbird>,
//! #     track: jukebox::sources::Track,
//! # ) -> anyhow::Result<()> {
//! let sessions = SessionRegistry::new(Arc::new(SongbirdTransport::new(manager)));
//! let player = PlaybackCoordinator::new(Arc::new(QueueRegistry::new()), Arc::new(sessions));
//! let guild_id = GuildId::new(123456789);
//!
//! player.join(guild_id, ChannelId::new(987654321)).await?;
//! player.enqueue_and_maybe_play(guild_id, track).await?;
//!
//! // Control playback
//! player.pause(guild_id).await?;
//! player.resume(guild_id).await?;
//! player.skip(guild_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod player;
pub mod queue;
pub mod transport;
pub mod voice;
