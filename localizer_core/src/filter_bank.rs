//! Filter bank: arena of live tracks with stable identities.
//!
//! Tracks are stored in insertion order and ids are allocated monotonically,
//! so iteration order is deterministic and lookup by id is a binary search.
//! Removal is two-phase: a pass marks tracks [`TrackStatus::Pruned`] while it
//! iterates, and [`FilterBank::compact`] drops them once the pass is done.

use crate::{
    track::{Track, TrackStatus},
    types::TrackId,
};
use rayon::prelude::*;

#[derive(Clone, Debug, Default)]
pub struct FilterBank {
    tracks: Vec<Track>,
    next_id: u64,
}

impl FilterBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Allocate an id and append the track built by `make`.
    pub fn insert_with(&mut self, make: impl FnOnce(TrackId) -> Track) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        let track = make(id);
        debug_assert_eq!(track.id, id);
        self.tracks.push(track);
        id
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.index_of(id).map(|i| &self.tracks[i])
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.index_of(id).map(move |i| &mut self.tracks[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut()
    }

    pub fn par_iter_mut(&mut self) -> rayon::slice::IterMut<'_, Track> {
        self.tracks.par_iter_mut()
    }

    pub fn as_slice(&self) -> &[Track] {
        &self.tracks
    }

    /// Mark a track for removal. Returns false if the id is unknown.
    pub fn mark_pruned(&mut self, id: TrackId) -> bool {
        match self.get_mut(id) {
            Some(track) => {
                track.status = TrackStatus::Pruned;
                true
            }
            None => false,
        }
    }

    /// Drop every track marked pruned. Returns the number removed.
    pub fn compact(&mut self) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|t| !t.is_pruned());
        before - self.tracks.len()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    fn index_of(&self, id: TrackId) -> Option<usize> {
        self.tracks.binary_search_by_key(&id, |t| t.id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StateCov, StateVec};

    fn bank_with(n: usize) -> FilterBank {
        let mut bank = FilterBank::new();
        for _ in 0..n {
            bank.insert_with(|id| Track::new(id, StateVec::zeros(), StateCov::identity(), 0.0));
        }
        bank
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut bank = bank_with(3);
        assert!(bank.mark_pruned(TrackId(2)));
        assert_eq!(bank.compact(), 1);
        let id = bank.insert_with(|id| Track::new(id, StateVec::zeros(), StateCov::identity(), 0.0));
        assert_eq!(id, TrackId(3));
        let ids: Vec<TrackId> = bank.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TrackId(0), TrackId(1), TrackId(3)]);
    }

    #[test]
    fn marked_tracks_survive_until_compaction() {
        let mut bank = bank_with(4);
        bank.mark_pruned(TrackId(1));
        bank.mark_pruned(TrackId(2));
        assert_eq!(bank.len(), 4);
        // The track after a marked one is still reachable during the pass
        assert!(bank.get(TrackId(3)).is_some());
        assert_eq!(bank.compact(), 2);
        assert_eq!(bank.len(), 2);
        assert!(bank.get(TrackId(1)).is_none());
        assert!(bank.get(TrackId(3)).is_some());
    }

    #[test]
    fn unknown_id_is_not_marked() {
        let mut bank = bank_with(1);
        assert!(!bank.mark_pruned(TrackId(7)));
        assert_eq!(bank.compact(), 0);
    }
}
