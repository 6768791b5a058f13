#![forbid(unsafe_code)]

//! Room membership and the tile count derived from it.
//!
//! The grid draws one tile per spotlighted peer plus one tile per active
//! screen-share consumer. Peers outside the spotlight set are not drawn; the
//! UI shows them as a "hidden peers" counter instead.
//!
//! ```
//! use peergrid_core::room::{ConsumerSource, RoomMembership};
//!
//! let mut room = RoomMembership::new();
//! room.add_peer("alice");
//! room.add_peer("bob");
//! room.add_peer("carol");
//! room.set_spotlights(["alice", "bob"]);
//! room.add_consumer("c1", "alice", ConsumerSource::Screen);
//!
//! assert_eq!(room.tile_count(), 3);
//! assert_eq!(room.hidden_peer_count(), 1);
//! ```

use std::collections::BTreeMap;

/// Kind of media a consumer carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerSource {
    /// Microphone audio.
    Mic,
    /// Camera video.
    Webcam,
    /// Screen share video. Each one gets its own tile.
    Screen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Consumer {
    peer: String,
    source: ConsumerSource,
}

/// Peers in the room, the current spotlight selection, and active consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomMembership {
    /// Peer names in join order.
    peers: Vec<String>,
    /// Spotlighted peer names, as last set.
    spotlights: Vec<String>,
    /// Consumers keyed by consumer id.
    consumers: BTreeMap<String, Consumer>,
}

impl RoomMembership {
    /// Create an empty room.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer. Re-adding a known peer is a no-op.
    pub fn add_peer(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.peers.contains(&name) {
            self.peers.push(name);
        }
    }

    /// Remove a peer along with its spotlight entry and consumers.
    ///
    /// Returns `true` if the peer was present.
    pub fn remove_peer(&mut self, name: &str) -> bool {
        let before = self.peers.len();
        self.peers.retain(|p| p != name);
        self.spotlights.retain(|p| p != name);
        self.consumers.retain(|_, c| c.peer != name);
        self.peers.len() != before
    }

    /// Replace the spotlight selection wholesale.
    pub fn set_spotlights<I, S>(&mut self, spotlights: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spotlights = spotlights.into_iter().map(Into::into).collect();
    }

    /// Register a consumer for a peer. An existing id is overwritten.
    pub fn add_consumer(
        &mut self,
        id: impl Into<String>,
        peer: impl Into<String>,
        source: ConsumerSource,
    ) {
        self.consumers.insert(
            id.into(),
            Consumer {
                peer: peer.into(),
                source,
            },
        );
    }

    /// Drop a consumer. Returns `true` if it existed.
    pub fn remove_consumer(&mut self, id: &str) -> bool {
        self.consumers.remove(id).is_some()
    }

    /// Number of peers in the room.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Current spotlight selection.
    #[must_use]
    pub fn spotlights(&self) -> &[String] {
        &self.spotlights
    }

    /// Number of active screen-share consumers.
    #[must_use]
    pub fn screen_share_count(&self) -> usize {
        self.consumers
            .values()
            .filter(|c| c.source == ConsumerSource::Screen)
            .count()
    }

    /// Number of tiles the grid must lay out.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.spotlights.len() + self.screen_share_count()
    }

    /// Peers present in the room but left out of the spotlight.
    #[must_use]
    pub fn hidden_peer_count(&self) -> usize {
        self.peers.len().saturating_sub(self.spotlights.len())
    }

    /// Peers that get a tile, in join order.
    pub fn visible_peers(&self) -> impl Iterator<Item = &str> + '_ {
        self.peers
            .iter()
            .filter(|p| self.spotlights.contains(*p))
            .map(String::as_str)
    }
}
