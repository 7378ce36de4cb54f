use std::sync::Arc;

use super::track::{Track, TrackId};

/// Ordered tracks plus the current position.
///
/// The track list is shared and never mutated; `play` replaces the whole
/// queue, so snapshots handed to consumers stay cheap to clone.
#[derive(Debug, Clone)]
pub struct PlaylistQueue {
    tracks: Arc<[Track]>,
    index: usize,
}

impl PlaylistQueue {
    pub fn empty() -> Self {
        Self {
            tracks: Arc::from(Vec::new()),
            index: 0,
        }
    }

    /// Build a queue positioned on `selected`, or on the first entry when the
    /// id is not part of `tracks`.
    pub fn from_tracks(tracks: impl Into<Arc<[Track]>>, selected: &TrackId) -> Self {
        let mut queue = Self {
            tracks: tracks.into(),
            index: 0,
        };
        queue.index = queue.index_of_id(selected).unwrap_or(0);
        queue
    }

    /// First position holding `id`.
    pub fn index_of_id(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|track| &track.id == id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Current position. Meaningless while the queue is empty.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.index)
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Advance one entry, wrapping past the end.
    pub fn step_forward(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        self.index = (self.index + 1) % self.tracks.len();
        self.current()
    }

    /// Go back one entry, wrapping from the first to the last.
    pub fn step_back(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        self.index = if self.index == 0 {
            self.tracks.len() - 1
        } else {
            self.index - 1
        };
        self.current()
    }
}

impl Default for PlaylistQueue {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for PlaylistQueue {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && (Arc::ptr_eq(&self.tracks, &other.tracks) || self.tracks == other.tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks(ids: &[&str]) -> Vec<Track> {
        ids.iter()
            .map(|id| Track::new(*id, id.to_uppercase(), "Artist", format!("file:///music/{id}.mp3")))
            .collect()
    }

    #[test]
    fn test_positions_on_selected_track() {
        let queue = PlaylistQueue::from_tracks(tracks(&["a", "b", "c"]), &TrackId::new("b"));
        assert_eq!(queue.index(), 1);
        assert_eq!(queue.current().map(|t| t.id.as_str()), Some("b"));
    }

    #[test]
    fn test_unknown_selection_defaults_to_first() {
        let queue = PlaylistQueue::from_tracks(tracks(&["a", "b"]), &TrackId::new("zz"));
        assert_eq!(queue.index(), 0);
    }

    #[test]
    fn test_duplicate_ids_resolve_to_first_occurrence() {
        let queue = PlaylistQueue::from_tracks(tracks(&["a", "b", "a"]), &TrackId::new("a"));
        assert_eq!(queue.index(), 0);
    }

    #[test]
    fn test_index_of_id() {
        let queue = PlaylistQueue::from_tracks(tracks(&["a", "b", "a"]), &TrackId::new("b"));
        assert_eq!(queue.index_of_id(&TrackId::new("a")), Some(0));
        assert_eq!(queue.index_of_id(&TrackId::new("b")), Some(1));
        assert_eq!(queue.index_of_id(&TrackId::new("x")), None);
    }

    #[test]
    fn test_stepping_wraps_both_ways() {
        let mut queue = PlaylistQueue::from_tracks(tracks(&["a", "b", "c"]), &TrackId::new("c"));
        assert_eq!(queue.step_forward().map(|t| t.id.as_str()), Some("a"));
        assert_eq!(queue.step_back().map(|t| t.id.as_str()), Some("c"));
        assert_eq!(queue.step_back().map(|t| t.id.as_str()), Some("b"));
    }

    #[test]
    fn test_empty_queue_does_not_move() {
        let mut queue = PlaylistQueue::empty();
        assert!(queue.step_forward().is_none());
        assert!(queue.step_back().is_none());
        assert_eq!(queue.index(), 0);
    }
}
