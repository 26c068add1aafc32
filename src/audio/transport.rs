//! Boundary between the playback core and whatever actually streams audio.
//!
//! A [`Transport`] opens a [`VoiceLink`] per guild. Links report the end of a stream by
//! firing the [`EndSignal`] they were handed in [`VoiceLink::play`]; the signal only sends
//! a [`TrackEnd`] message, so it is safe to fire from any thread.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Failed to connect to voice channel: {0}")]
    Connect(String),

    #[error("Failed to start stream: {0}")]
    Stream(String),
}

/// A stream finished, failed, or was stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEnd {
    pub guild_id: GuildId,
    /// Playback epoch the stream was started under.
    pub epoch: u64,
    pub error: Option<String>,
}

/// Fire-and-forget completion hook handed to a link for one stream.
#[derive(Debug, Clone)]
pub struct EndSignal {
    guild_id: GuildId,
    epoch: u64,
    tx: Option<UnboundedSender<TrackEnd>>,
}

impl EndSignal {
    pub fn new(guild_id: GuildId, epoch: u64, tx: Option<UnboundedSender<TrackEnd>>) -> Self {
        Self { guild_id, epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Never blocks. Dropped silently when nobody listens anymore.
    pub fn fire(&self, error: Option<String>) {
        let Some(tx) = &self.tx else {
            trace!("No track-end listener for guild {}", self.guild_id);
            return;
        };

        let _ = tx.send(TrackEnd {
            guild_id: self.guild_id,
            epoch: self.epoch,
            error,
        });
    }
}

/// Opens voice connections.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceLink>, VoiceError>;
}

/// One live voice connection.
#[async_trait]
pub trait VoiceLink: Send + Sync {
    /// Starts streaming `stream_url`, replacing whatever was playing.
    async fn play(&mut self, stream_url: &str, on_end: EndSignal) -> Result<(), VoiceError>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Halts the current stream. May fire the stream's [`EndSignal`].
    fn stop(&mut self);

    /// Tears the connection down. Failures are logged by the implementation.
    async fn disconnect(&mut self);
}
