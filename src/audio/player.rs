use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    Mutex,
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{
    queue::QueueRegistry,
    transport::{TrackEnd, VoiceError},
    voice::{SessionRegistry, SessionState, VoiceSession},
};
use crate::sources::Track;

/// Errors surfaced to whoever issued the command.
///
/// The display strings of the state errors are meant to be shown to users verbatim.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Nothing is currently playing.")]
    NothingPlaying,

    #[error("Playback is not paused.")]
    NotPaused,

    #[error("Nothing to skip.")]
    NothingToSkip,

    #[error("I'm not in a voice channel.")]
    NotConnected,

    #[error(transparent)]
    Voice(#[from] VoiceError),
}

impl PlaybackError {
    /// State errors caused by the request rather than by the transport.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, PlaybackError::Voice(_))
    }
}

/// Outcome of [`PlaybackCoordinator::enqueue_and_maybe_play`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enqueued {
    /// `true` when playback started right away.
    pub started: bool,
    /// The track now playing when `started`, otherwise the track that was queued.
    pub track: Track,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueInfo {
    pub current: Option<Track>,
    pub items: Vec<Track>,
}

impl QueueInfo {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
        }
    }
}

/// "Now playing" bookkeeping for one guild.
#[derive(Debug, Default)]
struct GuildPlayback {
    current: Option<Track>,
    /// When the current track last (re)started. `None` while paused or stopped.
    started_at: Option<Instant>,
    /// Play time accumulated before the last pause.
    elapsed_offset: Duration,
}

impl GuildPlayback {
    fn reset(&mut self) {
        self.current = None;
        self.started_at = None;
        self.elapsed_offset = Duration::ZERO;
    }

    fn start(&mut self, track: Track) {
        self.current = Some(track);
        self.started_at = Some(Instant::now());
        self.elapsed_offset = Duration::ZERO;
    }

    fn elapsed(&self) -> Option<Duration> {
        self.current.as_ref()?;
        let running = self.started_at.map(|t| t.elapsed()).unwrap_or_default();
        Some(self.elapsed_offset + running)
    }
}

/// Drives queue and voice session of every guild.
///
/// Each guild owns one async mutex around its [`GuildPlayback`]; every operation that
/// touches that guild's accounting, queue or voice session runs while holding it, so
/// commands, HTTP calls and track-end reports for the same guild are serialized while
/// different guilds proceed independently.
///
/// Transports report finished streams on a channel. A dispatcher task forwards each
/// report into [`PlaybackCoordinator::on_track_end`], which takes the guild lock before
/// touching anything.
pub struct PlaybackCoordinator {
    queues: Arc<QueueRegistry>,
    sessions: Arc<SessionRegistry>,
    guilds: DashMap<GuildId, Arc<Mutex<GuildPlayback>>>,
    events: UnboundedSender<TrackEnd>,
}

impl PlaybackCoordinator {
    /// Builds the coordinator and spawns its track-end dispatcher on the current runtime.
    pub fn new(queues: Arc<QueueRegistry>, sessions: Arc<SessionRegistry>) -> Arc<Self> {
        let (events, rx) = mpsc::unbounded_channel();
        let coordinator = Arc::new(Self {
            queues,
            sessions,
            guilds: DashMap::new(),
            events,
        });

        tokio::spawn(dispatch_track_ends(Arc::downgrade(&coordinator), rx));
        coordinator
    }

    fn guild(&self, guild_id: GuildId) -> Arc<Mutex<GuildPlayback>> {
        self.guilds.entry(guild_id).or_default().clone()
    }

    /// Connects the guild's session to `channel_id` unless it is already there.
    pub async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), PlaybackError> {
        let guild = self.guild(guild_id);
        let mut playback = guild.lock().await;
        let session = self.sessions.get_session(guild_id);
        let mut session = session.lock().await;

        if session.is_connected() && session.channel_id() == Some(channel_id) {
            return Ok(());
        }

        let was_streaming = session.is_playing() || session.is_paused();
        session.set_on_track_end(self.events.clone());
        session.join(channel_id).await?;

        // Moving channels halts the stream
        if was_streaming {
            playback.reset();
        }

        Ok(())
    }

    /// Queues `track` and starts playback if the session is connected and idle.
    ///
    /// Playback always starts from the head of the queue, which is not necessarily
    /// `track` when other requests were queued first.
    pub async fn enqueue_and_maybe_play(
        &self,
        guild_id: GuildId,
        track: Track,
    ) -> Result<Enqueued, PlaybackError> {
        let guild = self.guild(guild_id);
        let mut playback = guild.lock().await;
        let session = self.sessions.get_session(guild_id);
        let mut session = session.lock().await;

        self.queues.get_queue(guild_id).lock().add(track.clone());

        let busy = session.is_playing() || session.is_paused();
        if busy || !session.is_connected() {
            info!("➕ Added to queue in guild {}: {}", guild_id, track.title());
            return Ok(Enqueued { started: false, track });
        }

        match self.advance(guild_id, &mut playback, &mut session).await? {
            Some(now_playing) => Ok(Enqueued {
                started: true,
                track: now_playing,
            }),
            None => Ok(Enqueued { started: false, track }),
        }
    }

    /// Pops the next track and starts it. An empty queue leaves the guild stopped.
    async fn advance(
        &self,
        guild_id: GuildId,
        playback: &mut GuildPlayback,
        session: &mut VoiceSession,
    ) -> Result<Option<Track>, PlaybackError> {
        let next = self.queues.get_queue(guild_id).lock().next();

        let Some(track) = next else {
            playback.reset();
            info!("📭 Queue empty in guild {}", guild_id);
            return Ok(None);
        };

        playback.start(track.clone());
        if let Err(e) = session.play(track.stream_url()).await {
            playback.reset();
            return Err(e.into());
        }

        info!("🎵 Now playing in guild {}: {}", guild_id, track.title());
        Ok(Some(track))
    }

    /// Stops the current track and starts the next one. Returns the new track, if any.
    pub async fn skip(&self, guild_id: GuildId) -> Result<Option<Track>, PlaybackError> {
        let guild = self.guild(guild_id);
        let mut playback = guild.lock().await;
        let session = self.sessions.get_session(guild_id);
        let mut session = session.lock().await;

        if !session.is_playing() && !session.is_paused() {
            return Err(PlaybackError::NothingToSkip);
        }

        // The end report for the stopped stream belongs to a retired epoch and is
        // ignored, so this advance is the only one.
        session.stop();
        debug!("⏭️ Skipping in guild {}", guild_id);

        self.advance(guild_id, &mut playback, &mut session).await
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        let guild = self.guild(guild_id);
        let mut playback = guild.lock().await;
        let session = self.sessions.get_session(guild_id);
        let mut session = session.lock().await;

        if !session.is_playing() {
            return Err(PlaybackError::NothingPlaying);
        }

        if let Some(started_at) = playback.started_at.take() {
            playback.elapsed_offset += started_at.elapsed();
        }
        session.pause();

        info!("⏸️ Paused in guild {}", guild_id);
        Ok(())
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        let guild = self.guild(guild_id);
        let mut playback = guild.lock().await;
        let session = self.sessions.get_session(guild_id);
        let mut session = session.lock().await;

        if !session.is_paused() {
            return Err(PlaybackError::NotPaused);
        }

        session.resume();
        playback.started_at = Some(Instant::now());

        info!("▶️ Resumed in guild {}", guild_id);
        Ok(())
    }

    /// Stops playback, clears the queue and disconnects.
    pub async fn stop_and_leave(&self, guild_id: GuildId) -> Result<(), PlaybackError> {
        let guild = self.guild(guild_id);
        let mut playback = guild.lock().await;
        let session = self.sessions.get_session(guild_id);
        let mut session = session.lock().await;

        if !session.is_connected() {
            return Err(PlaybackError::NotConnected);
        }

        session.stop();
        playback.reset();
        self.queues.get_queue(guild_id).lock().clear();
        session.leave().await;

        info!("⏹️ Stopped and left voice in guild {}", guild_id);
        Ok(())
    }

    /// Handles a completion report from the transport.
    ///
    /// Reports for streams that were stopped, skipped or replaced are dropped; a report
    /// for the live stream advances the queue.
    pub async fn on_track_end(&self, event: TrackEnd) {
        let guild_id = event.guild_id;
        let guild = self.guild(guild_id);
        let mut playback = guild.lock().await;
        let session = self.sessions.get_session(guild_id);
        let mut session = session.lock().await;

        if let Some(error) = &event.error {
            warn!("Stream error in guild {}: {}", guild_id, error);
        }

        if !session.track_ended(event.epoch) {
            debug!(
                "Ignoring stale track end in guild {} (epoch {}, current {})",
                guild_id,
                event.epoch,
                session.epoch()
            );
            return;
        }

        if let Err(e) = self.advance(guild_id, &mut playback, &mut session).await {
            error!("Failed to play next track in guild {}: {}", guild_id, e);
        }
    }

    /// Current track and pending queue, for display.
    pub async fn queue_snapshot(&self, guild_id: GuildId) -> QueueInfo {
        let guild = self.guild(guild_id);
        let playback = guild.lock().await;
        let items = self.queues.get_queue(guild_id).lock().list();

        QueueInfo {
            current: playback.current.clone(),
            items,
        }
    }

    /// Seconds into the current track, excluding paused time. `None` when stopped.
    pub async fn elapsed_seconds(&self, guild_id: GuildId) -> Option<f64> {
        let guild = self.guild(guild_id);
        let playback = guild.lock().await;
        playback.elapsed().map(|d| d.as_secs_f64())
    }

    pub async fn playback_state(&self, guild_id: GuildId) -> PlaybackState {
        let session = self.sessions.get_session(guild_id);
        let session = session.lock().await;
        match session.state() {
            SessionState::Playing => PlaybackState::Playing,
            SessionState::Paused => PlaybackState::Paused,
            SessionState::Idle | SessionState::Disconnected => PlaybackState::Stopped,
        }
    }

    /// Drops every pending track. The current track keeps playing.
    pub async fn clear_queue(&self, guild_id: GuildId) {
        let guild = self.guild(guild_id);
        let _playback = guild.lock().await;
        self.queues.get_queue(guild_id).lock().clear();
    }

    pub async fn is_connected(&self, guild_id: GuildId) -> bool {
        let session = self.sessions.get_session(guild_id);
        let connected = session.lock().await.is_connected();
        connected
    }

    pub async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let session = self.sessions.get_session(guild_id);
        let channel = session.lock().await.channel_id();
        channel
    }

    /// Resets the guild after the gateway reported the bot gone from `left`.
    ///
    /// Returns `false` without touching anything when the session is already
    /// disconnected or now lives in another channel than the one reported.
    pub async fn handle_disconnected(&self, guild_id: GuildId, left: Option<ChannelId>) -> bool {
        let guild = self.guild(guild_id);
        let mut playback = guild.lock().await;
        let session = self.sessions.get_session(guild_id);
        let mut session = session.lock().await;

        if !session.is_connected() {
            return false;
        }
        if left.is_some() && left != session.channel_id() {
            debug!("Stale disconnect for guild {} ignored", guild_id);
            return false;
        }

        session.mark_disconnected();
        playback.reset();
        self.queues.get_queue(guild_id).lock().clear();

        info!("🔌 Voice state cleaned up for guild {}", guild_id);
        true
    }
}

async fn dispatch_track_ends(
    coordinator: Weak<PlaybackCoordinator>,
    mut events: UnboundedReceiver<TrackEnd>,
) {
    while let Some(event) = events.recv().await {
        let Some(coordinator) = coordinator.upgrade() else {
            break;
        };

        tokio::spawn(async move {
            coordinator.on_track_end(event).await;
        });
    }

    debug!("Track-end dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::transport::fake::{Call, FakeTransport};
    use crate::sources::SourceType;
    use pretty_assertions::assert_eq;

    const GUILD: GuildId = GuildId::new(42);
    const CHANNEL: ChannelId = ChannelId::new(1000);

    struct Harness {
        coordinator: Arc<PlaybackCoordinator>,
        transport: FakeTransport,
    }

    fn harness() -> Harness {
        let transport = FakeTransport::new();
        let queues = Arc::new(QueueRegistry::new());
        let sessions = Arc::new(SessionRegistry::new(Arc::new(transport.clone())));

        Harness {
            coordinator: PlaybackCoordinator::new(queues, sessions),
            transport,
        }
    }

    async fn connected() -> Harness {
        let h = harness();
        h.coordinator.join(GUILD, CHANNEL).await.unwrap();
        h
    }

    fn track(title: &str) -> Track {
        Track::new(
            title,
            format!("https://www.youtube.com/watch?v={title}"),
            format!("https://cdn.example/{title}"),
            SourceType::YouTube,
        )
        .with_duration(180)
    }

    /// Lets the dispatcher deliver whatever the transport reported.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_enqueue_when_idle_starts_playback() {
        let h = connected().await;

        let outcome = h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();

        assert_eq!(outcome, Enqueued { started: true, track: track("a") });
        assert_eq!(h.transport.plays(), vec!["https://cdn.example/a".to_string()]);
        let snapshot = h.coordinator.queue_snapshot(GUILD).await;
        assert_eq!(snapshot.current, Some(track("a")));
        assert!(snapshot.items.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_while_playing_queues() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();

        let outcome = h.coordinator.enqueue_and_maybe_play(GUILD, track("b")).await.unwrap();

        assert_eq!(outcome, Enqueued { started: false, track: track("b") });
        assert_eq!(h.transport.plays().len(), 1);
        let snapshot = h.coordinator.queue_snapshot(GUILD).await;
        assert_eq!(snapshot.current, Some(track("a")));
        assert_eq!(snapshot.items, vec![track("b")]);
    }

    #[tokio::test]
    async fn test_enqueue_while_paused_queues() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();
        h.coordinator.pause(GUILD).await.unwrap();

        let outcome = h.coordinator.enqueue_and_maybe_play(GUILD, track("b")).await.unwrap();

        assert!(!outcome.started);
        assert_eq!(h.coordinator.playback_state(GUILD).await, PlaybackState::Paused);
        assert_eq!(h.coordinator.queue_snapshot(GUILD).await.items, vec![track("b")]);
    }

    #[tokio::test]
    async fn test_enqueue_without_connection_only_queues() {
        let h = harness();

        let outcome = h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();

        assert!(!outcome.started);
        assert!(h.transport.plays().is_empty());
        assert_eq!(h.coordinator.queue_snapshot(GUILD).await.items, vec![track("a")]);
    }

    #[tokio::test]
    async fn test_enqueue_plays_queue_head_not_new_track() {
        let h = harness();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("early")).await.unwrap();
        h.coordinator.join(GUILD, CHANNEL).await.unwrap();

        let outcome = h.coordinator.enqueue_and_maybe_play(GUILD, track("late")).await.unwrap();

        assert_eq!(outcome, Enqueued { started: true, track: track("early") });
        assert_eq!(h.coordinator.queue_snapshot(GUILD).await.items, vec![track("late")]);
    }

    #[tokio::test]
    async fn test_failed_play_is_reported_and_leaves_guild_stopped() {
        let h = connected().await;
        h.transport.fail_play(true);

        let err = h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap_err();

        assert!(matches!(err, PlaybackError::Voice(VoiceError::Stream(_))));
        assert!(!err.is_user_error());
        assert_eq!(h.coordinator.playback_state(GUILD).await, PlaybackState::Stopped);
        assert_eq!(h.coordinator.queue_snapshot(GUILD).await.current, None);
        assert!(h.coordinator.is_connected(GUILD).await);
    }

    #[tokio::test]
    async fn test_join_is_idempotent_for_same_channel() {
        let h = connected().await;

        h.coordinator.join(GUILD, CHANNEL).await.unwrap();

        assert_eq!(h.transport.count(&Call::Connect(CHANNEL)), 1);
        assert_eq!(h.coordinator.current_channel(GUILD).await, Some(CHANNEL));
    }

    #[tokio::test]
    async fn test_join_failure_propagates() {
        let h = harness();
        h.transport.fail_connect(true);

        let err = h.coordinator.join(GUILD, CHANNEL).await.unwrap_err();

        assert!(matches!(err, PlaybackError::Voice(VoiceError::Connect(_))));
        assert!(!h.coordinator.is_connected(GUILD).await);
    }

    #[tokio::test]
    async fn test_skip_advances_exactly_once() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("playing")).await.unwrap();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("t1")).await.unwrap();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("t2")).await.unwrap();

        let next = h.coordinator.skip(GUILD).await.unwrap();
        settle().await;

        assert_eq!(next, Some(track("t1")));
        let snapshot = h.coordinator.queue_snapshot(GUILD).await;
        assert_eq!(snapshot.current, Some(track("t1")));
        assert_eq!(snapshot.items, vec![track("t2")]);
        assert_eq!(h.transport.count(&Call::Stop), 1);
        assert_eq!(h.transport.plays().len(), 2);
    }

    #[tokio::test]
    async fn test_rapid_double_skip() {
        let h = connected().await;
        for title in ["playing", "t1", "t2", "t3"] {
            h.coordinator.enqueue_and_maybe_play(GUILD, track(title)).await.unwrap();
        }

        h.coordinator.skip(GUILD).await.unwrap();
        h.coordinator.skip(GUILD).await.unwrap();
        settle().await;

        let snapshot = h.coordinator.queue_snapshot(GUILD).await;
        assert_eq!(snapshot.current, Some(track("t2")));
        assert_eq!(snapshot.items, vec![track("t3")]);
    }

    #[tokio::test]
    async fn test_skip_while_paused() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("b")).await.unwrap();
        h.coordinator.pause(GUILD).await.unwrap();

        let next = h.coordinator.skip(GUILD).await.unwrap();

        assert_eq!(next, Some(track("b")));
        assert_eq!(h.coordinator.playback_state(GUILD).await, PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_skip_last_track_stops() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();

        let next = h.coordinator.skip(GUILD).await.unwrap();
        settle().await;

        assert_eq!(next, None);
        assert_eq!(h.coordinator.queue_snapshot(GUILD).await.current, None);
        assert_eq!(h.coordinator.elapsed_seconds(GUILD).await, None);
        assert_eq!(h.coordinator.playback_state(GUILD).await, PlaybackState::Stopped);
        assert!(h.coordinator.is_connected(GUILD).await);
    }

    #[tokio::test]
    async fn test_skip_with_nothing_playing() {
        let h = connected().await;

        let err = h.coordinator.skip(GUILD).await.unwrap_err();

        assert!(matches!(err, PlaybackError::NothingToSkip));
        assert_eq!(err.to_string(), "Nothing to skip.");
        assert_eq!(h.transport.count(&Call::Stop), 0);
    }

    #[tokio::test]
    async fn test_natural_end_advances() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("t1")).await.unwrap();

        h.transport.finish_current();
        settle().await;

        let snapshot = h.coordinator.queue_snapshot(GUILD).await;
        assert_eq!(snapshot.current, Some(track("t1")));
        assert!(snapshot.items.is_empty());
        assert_eq!(h.transport.plays().len(), 2);
    }

    #[tokio::test]
    async fn test_natural_end_of_last_track_goes_idle() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();

        h.transport.finish_current();
        settle().await;

        assert_eq!(h.coordinator.queue_snapshot(GUILD).await.current, None);
        assert_eq!(h.coordinator.playback_state(GUILD).await, PlaybackState::Stopped);

        let outcome = h.coordinator.enqueue_and_maybe_play(GUILD, track("b")).await.unwrap();
        assert!(outcome.started);
    }

    #[tokio::test]
    async fn test_duplicate_end_reports_advance_once() {
        let h = connected().await;
        for title in ["a", "b", "c"] {
            h.coordinator.enqueue_and_maybe_play(GUILD, track(title)).await.unwrap();
        }
        let epoch = h.transport.finish_current().unwrap();

        h.coordinator
            .on_track_end(TrackEnd { guild_id: GUILD, epoch, error: None })
            .await;
        settle().await;

        let snapshot = h.coordinator.queue_snapshot(GUILD).await;
        assert_eq!(snapshot.current, Some(track("b")));
        assert_eq!(snapshot.items, vec![track("c")]);
    }

    #[tokio::test]
    async fn test_pause_requires_playing() {
        let h = connected().await;

        let err = h.coordinator.pause(GUILD).await.unwrap_err();

        assert_eq!(err.to_string(), "Nothing is currently playing.");
        assert_eq!(h.transport.count(&Call::Pause), 0);
    }

    #[tokio::test]
    async fn test_resume_requires_paused() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();

        let err = h.coordinator.resume(GUILD).await.unwrap_err();

        assert_eq!(err.to_string(), "Playback is not paused.");
        assert_eq!(h.transport.count(&Call::Resume), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_excludes_paused_time() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        h.coordinator.pause(GUILD).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        let frozen = h.coordinator.elapsed_seconds(GUILD).await.unwrap();
        assert!((frozen - 10.0).abs() < 1e-6, "paused at {frozen}");

        h.coordinator.resume(GUILD).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        let elapsed = h.coordinator.elapsed_seconds(GUILD).await.unwrap();
        assert!((elapsed - 15.0).abs() < 1e-6, "elapsed {elapsed}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_resets_on_skip() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("b")).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        h.coordinator.skip(GUILD).await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;

        let elapsed = h.coordinator.elapsed_seconds(GUILD).await.unwrap();
        assert!((elapsed - 3.0).abs() < 1e-6, "elapsed {elapsed}");
    }

    #[tokio::test]
    async fn test_elapsed_absent_when_nothing_playing() {
        let h = connected().await;
        assert_eq!(h.coordinator.elapsed_seconds(GUILD).await, None);
    }

    #[tokio::test]
    async fn test_stop_and_leave() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("b")).await.unwrap();

        h.coordinator.stop_and_leave(GUILD).await.unwrap();
        settle().await;

        let snapshot = h.coordinator.queue_snapshot(GUILD).await;
        assert!(snapshot.is_empty());
        assert!(!h.coordinator.is_connected(GUILD).await);
        assert_eq!(h.coordinator.elapsed_seconds(GUILD).await, None);
        assert_eq!(h.transport.count(&Call::Stop), 1);
        assert_eq!(h.transport.count(&Call::Disconnect), 1);
        assert_eq!(h.transport.plays().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_and_leave_requires_connection() {
        let h = harness();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();

        let err = h.coordinator.stop_and_leave(GUILD).await.unwrap_err();

        assert_eq!(err.to_string(), "I'm not in a voice channel.");
        assert_eq!(h.coordinator.queue_snapshot(GUILD).await.items, vec![track("a")]);
    }

    #[tokio::test]
    async fn test_clear_queue_keeps_current_track() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("b")).await.unwrap();

        h.coordinator.clear_queue(GUILD).await;
        h.coordinator.clear_queue(GUILD).await;

        let snapshot = h.coordinator.queue_snapshot(GUILD).await;
        assert_eq!(snapshot.current, Some(track("a")));
        assert!(snapshot.items.is_empty());
    }

    #[tokio::test]
    async fn test_handle_disconnected_resets_guild() {
        let h = connected().await;
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("b")).await.unwrap();

        assert!(h.coordinator.handle_disconnected(GUILD, Some(CHANNEL)).await);
        h.transport.finish_current();
        settle().await;

        assert!(h.coordinator.queue_snapshot(GUILD).await.is_empty());
        assert!(!h.coordinator.is_connected(GUILD).await);
        assert_eq!(h.transport.count(&Call::Disconnect), 0);
        assert_eq!(h.transport.plays().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_from_previous_channel_keeps_new_session() {
        let h = connected().await;
        let other = ChannelId::new(2000);
        h.coordinator.stop_and_leave(GUILD).await.unwrap();
        h.coordinator.join(GUILD, other).await.unwrap();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();

        assert!(!h.coordinator.handle_disconnected(GUILD, Some(CHANNEL)).await);

        assert!(h.coordinator.is_connected(GUILD).await);
        assert_eq!(h.coordinator.current_channel(GUILD).await, Some(other));
        assert_eq!(h.coordinator.playback_state(GUILD).await, PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_disconnect_while_disconnected_is_ignored() {
        let h = harness();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();

        assert!(!h.coordinator.handle_disconnected(GUILD, None).await);
        assert_eq!(h.coordinator.queue_snapshot(GUILD).await.items, vec![track("a")]);
    }

    #[tokio::test]
    async fn test_guilds_are_isolated() {
        let h = connected().await;
        let other = GuildId::new(7);
        h.coordinator.join(other, ChannelId::new(2000)).await.unwrap();

        h.coordinator.enqueue_and_maybe_play(GUILD, track("a")).await.unwrap();
        h.coordinator.enqueue_and_maybe_play(GUILD, track("b")).await.unwrap();

        assert!(h.coordinator.queue_snapshot(other).await.is_empty());
        assert_eq!(h.coordinator.playback_state(other).await, PlaybackState::Stopped);

        h.coordinator.stop_and_leave(other).await.unwrap();
        assert_eq!(h.coordinator.playback_state(GUILD).await, PlaybackState::Playing);
        assert_eq!(h.coordinator.queue_snapshot(GUILD).await.items, vec![track("b")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_enqueues_play_once() {
        let h = connected().await;

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let coordinator = h.coordinator.clone();
                tokio::spawn(async move {
                    coordinator.enqueue_and_maybe_play(GUILD, track(&format!("t{i}"))).await
                })
            })
            .collect();

        let mut started = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().started {
                started += 1;
            }
        }

        assert_eq!(started, 1);
        assert_eq!(h.transport.plays().len(), 1);
        assert_eq!(h.coordinator.queue_snapshot(GUILD).await.items.len(), 15);
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let h = connected().await;

        let first = h.coordinator.enqueue_and_maybe_play(GUILD, track("A")).await.unwrap();
        assert_eq!(first, Enqueued { started: true, track: track("A") });
        assert!(h.coordinator.queue_snapshot(GUILD).await.items.is_empty());

        let second = h.coordinator.enqueue_and_maybe_play(GUILD, track("B")).await.unwrap();
        assert_eq!(second, Enqueued { started: false, track: track("B") });
        assert_eq!(h.coordinator.queue_snapshot(GUILD).await.items, vec![track("B")]);

        assert_eq!(h.coordinator.skip(GUILD).await.unwrap(), Some(track("B")));
        settle().await;
        let snapshot = h.coordinator.queue_snapshot(GUILD).await;
        assert_eq!(snapshot.current, Some(track("B")));
        assert!(snapshot.items.is_empty());

        h.coordinator.stop_and_leave(GUILD).await.unwrap();
        assert_eq!(h.coordinator.queue_snapshot(GUILD).await.current, None);
        assert!(!h.coordinator.is_connected(GUILD).await);
    }
}
