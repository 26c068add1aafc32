use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tracing::{debug, info, warn};

use super::transport::{EndSignal, TrackEnd, Transport, VoiceError, VoiceLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Connected, nothing streaming.
    Idle,
    Playing,
    Paused,
}

/// Voice connection and transport state for one guild.
///
/// Every `play`, `stop` and `leave` moves the session to a new playback epoch. Streams
/// are tagged with the epoch they started under, so a completion report that arrives
/// after the stream was stopped or replaced can be told apart from a real end of track.
pub struct VoiceSession {
    guild_id: GuildId,
    transport: Arc<dyn Transport>,
    link: Option<Box<dyn VoiceLink>>,
    channel_id: Option<ChannelId>,
    state: SessionState,
    epoch: u64,
    on_track_end: Option<UnboundedSender<TrackEnd>>,
}

impl VoiceSession {
    pub fn new(guild_id: GuildId, transport: Arc<dyn Transport>) -> Self {
        Self {
            guild_id,
            transport,
            link: None,
            channel_id: None,
            state: SessionState::Disconnected,
            epoch: 0,
            on_track_end: None,
        }
    }

    /// Connects to `channel_id`, replacing any existing connection.
    ///
    /// Does not check whether the session is already in that channel; callers that want
    /// idempotent joins check [`VoiceSession::channel_id`] first.
    pub async fn join(&mut self, channel_id: ChannelId) -> Result<(), VoiceError> {
        let link = self.transport.connect(self.guild_id, channel_id).await?;

        if let Some(mut previous) = self.link.replace(link) {
            self.epoch += 1;
            previous.stop();
            debug!("Replaced voice connection in guild {}", self.guild_id);
        }

        self.channel_id = Some(channel_id);
        self.state = SessionState::Idle;
        info!("🔊 Joined channel {} in guild {}", channel_id, self.guild_id);
        Ok(())
    }

    /// Disconnects. No-op when already disconnected.
    pub async fn leave(&mut self) {
        if let Some(mut link) = self.link.take() {
            self.epoch += 1;
            link.disconnect().await;
            info!("👋 Left voice in guild {}", self.guild_id);
        }

        self.channel_id = None;
        self.state = SessionState::Disconnected;
    }

    /// Forgets the connection without touching the transport, for when the gateway
    /// already reported the bot as gone.
    pub fn mark_disconnected(&mut self) {
        if self.link.take().is_some() {
            self.epoch += 1;
        }
        self.channel_id = None;
        self.state = SessionState::Disconnected;
    }

    /// Starts streaming. On failure the session stays connected and idle.
    pub async fn play(&mut self, stream_url: &str) -> Result<(), VoiceError> {
        let Some(link) = self.link.as_mut() else {
            return Err(VoiceError::NotConnected);
        };

        self.epoch += 1;
        let signal = EndSignal::new(self.guild_id, self.epoch, self.on_track_end.clone());

        match link.play(stream_url, signal).await {
            Ok(()) => {
                self.state = SessionState::Playing;
                Ok(())
            }
            Err(e) => {
                warn!("Stream failed to start in guild {}: {}", self.guild_id, e);
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    pub fn pause(&mut self) {
        if let (SessionState::Playing, Some(link)) = (self.state, self.link.as_mut()) {
            link.pause();
            self.state = SessionState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if let (SessionState::Paused, Some(link)) = (self.state, self.link.as_mut()) {
            link.resume();
            self.state = SessionState::Playing;
        }
    }

    /// Halts the stream but stays connected. The transport may report the stopped
    /// stream as ended; that report belongs to a retired epoch.
    pub fn stop(&mut self) {
        if let Some(link) = self.link.as_mut() {
            self.epoch += 1;
            self.state = SessionState::Idle;
            link.stop();
        }
    }

    /// Applies a completion report. Returns `true` only when it ends the stream that is
    /// current right now, in which case the session drops back to idle.
    pub fn track_ended(&mut self, epoch: u64) -> bool {
        let active = matches!(self.state, SessionState::Playing | SessionState::Paused);
        if active && epoch == self.epoch {
            self.state = SessionState::Idle;
            true
        } else {
            false
        }
    }

    /// Registers where completion reports go. Replaces any previous listener.
    pub fn set_on_track_end(&mut self, tx: UnboundedSender<TrackEnd>) {
        self.on_track_end = Some(tx);
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state == SessionState::Paused
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        self.channel_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

pub type SharedSession = Arc<Mutex<VoiceSession>>;

/// Guild-keyed voice sessions, created on first access.
pub struct SessionRegistry {
    transport: Arc<dyn Transport>,
    sessions: DashMap<GuildId, SharedSession>,
}

impl SessionRegistry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sessions: DashMap::new(),
        }
    }

    pub fn get_session(&self, guild_id: GuildId) -> SharedSession {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(VoiceSession::new(guild_id, self.transport.clone())))
            })
            .clone()
    }

    pub fn remove_session(&self, guild_id: GuildId) {
        self.sessions.remove(&guild_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
