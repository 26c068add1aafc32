use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{collections::VecDeque, sync::Arc};
use tracing::{debug, info};

use crate::sources::Track;

/// Pending tracks for one guild, strictly FIFO.
#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a track at the tail.
    pub fn add(&mut self, track: Track) {
        debug!("➕ Queued: {}", track.title());
        self.items.push_back(track);
    }

    /// Pops the head track.
    pub fn next(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    pub fn peek(&self) -> Option<&Track> {
        self.items.front()
    }

    /// Drops every pending track. No-op when already empty.
    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            info!("🗑️ Cleared {} queued tracks", self.items.len());
        }
        self.items.clear();
    }

    /// Independent copy of the pending tracks, in play order.
    pub fn list(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub type SharedQueue = Arc<Mutex<TrackQueue>>;

/// Guild-keyed queues, created on first access.
///
/// Lookups go through [`DashMap::entry`], so two concurrent first accesses for the
/// same guild observe the same queue.
#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: DashMap<GuildId, SharedQueue>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_queue(&self, guild_id: GuildId) -> SharedQueue {
        self.queues
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(TrackQueue::new())))
            .clone()
    }

    pub fn delete_queue(&self, guild_id: GuildId) {
        if self.queues.remove(&guild_id).is_some() {
            debug!("Queue removed for guild {}", guild_id);
        }
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
