//! [`Transport`] backed by Songbird.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    error::ControlError,
    input::{HttpRequest, Input},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::transport::{EndSignal, Transport, VoiceError, VoiceLink};

pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for SongbirdTransport {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceLink>, VoiceError> {
        let call = self.manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("Error al conectar al canal de voz: {:?}", e);
            VoiceError::Connect(e.to_string())
        })?;

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);

        Ok(Box::new(SongbirdLink {
            guild_id,
            manager: self.manager.clone(),
            http: self.http.clone(),
            call,
            track: None,
        }))
    }
}

struct SongbirdLink {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    http: reqwest::Client,
    call: Arc<Mutex<Call>>,
    track: Option<TrackHandle>,
}

fn watch_track(
    handle: &TrackHandle,
    guild_id: GuildId,
    on_end: EndSignal,
) -> Result<(), ControlError> {
    handle.add_event(
        Event::Track(TrackEvent::End),
        TrackEndNotifier {
            signal: on_end.clone(),
        },
    )?;
    handle.add_event(
        Event::Track(TrackEvent::Error),
        TrackErrorNotifier {
            guild_id,
            signal: on_end,
        },
    )
}

#[async_trait]
impl VoiceLink for SongbirdLink {
    async fn play(&mut self, stream_url: &str, on_end: EndSignal) -> Result<(), VoiceError> {
        if let Some(previous) = self.track.take() {
            let _ = previous.stop();
        }

        let input: Input = HttpRequest::new(self.http.clone(), stream_url.to_string()).into();
        let handle = self.call.lock().await.play_input(input);

        if let Err(e) = watch_track(&handle, self.guild_id, on_end) {
            // Untracked handles would keep mixing into the call
            let _ = handle.stop();
            return Err(VoiceError::Stream(e.to_string()));
        }

        self.track = Some(handle);
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(track) = &self.track {
            if let Err(e) = track.pause() {
                warn!("Failed to pause track in guild {}: {}", self.guild_id, e);
            }
        }
    }

    fn resume(&mut self) {
        if let Some(track) = &self.track {
            if let Err(e) = track.play() {
                warn!("Failed to resume track in guild {}: {}", self.guild_id, e);
            }
        }
    }

    fn stop(&mut self) {
        if let Some(track) = self.track.take() {
            // Already finished tracks reject the command
            let _ = track.stop();
        }
    }

    async fn disconnect(&mut self) {
        self.stop();

        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("Error al desconectar de guild {}: {:?}", self.guild_id, e);
        } else {
            info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }
    }
}

/// Forwards a finished (or stopped) track to the playback coordinator.
struct TrackEndNotifier {
    signal: EndSignal,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        debug!("Track terminado (epoch {})", self.signal.epoch());
        self.signal.fire(None);
        None
    }
}

struct TrackErrorNotifier {
    guild_id: GuildId,
    signal: EndSignal,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut reason = String::from("track errored");

        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                error!("❌ Error en track para guild {}: {:?}", self.guild_id, state.playing);
                reason = format!("{:?}", state.playing);
            }
        }

        self.signal.fire(Some(reason));
        None
    }
}
