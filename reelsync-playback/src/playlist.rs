//! Playlist state and end-of-playback advance decisions.
//!
//! Shuffle keeps a history of already-played indices so every item plays
//! once before any repeats; under `repeat = all` the history clears once
//! exhausted and the cycle starts over.

use rand::Rng;
use reelsync_model::ItemID;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Repeat behavior at end of playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    /// Replay the current item forever
    One,
    /// Wrap around at the end of the playlist
    All,
}

/// Decision produced when the current item ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Replay the current item from position 0
    ReplayCurrent,
    /// Terminal: playback stops here
    Stop,
    /// Navigate to this playlist index
    Next(usize),
}

/// Ordered playlist context surviving across item changes
///
/// Invariant: `shuffle_history` never contains `current_index`.
#[derive(Debug, Clone)]
pub struct PlaylistState {
    items: Vec<ItemID>,
    current_index: usize,
    shuffle_history: HashSet<usize>,
    pub repeat_mode: RepeatMode,
    pub shuffle_enabled: bool,
    pub autoplay_next: bool,
}

impl PlaylistState {
    pub fn new(items: Vec<ItemID>, start_index: usize) -> Self {
        let current_index = start_index.min(items.len().saturating_sub(1));
        Self {
            items,
            current_index,
            shuffle_history: HashSet::new(),
            repeat_mode: RepeatMode::Off,
            shuffle_enabled: false,
            autoplay_next: true,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_item(&self) -> Option<ItemID> {
        self.items.get(self.current_index).copied()
    }

    pub fn item_at(&self, index: usize) -> Option<ItemID> {
        self.items.get(index).copied()
    }

    pub fn shuffle_history(&self) -> &HashSet<usize> {
        &self.shuffle_history
    }

    /// Jump directly to an index (user picked an entry)
    pub fn select(&mut self, index: usize) -> Option<ItemID> {
        let item = self.items.get(index).copied()?;
        self.shuffle_history.remove(&index);
        self.current_index = index;
        Some(item)
    }

    /// Decide what happens when the current item finishes.
    ///
    /// Priority: repeat-one replay, autoplay gate, shuffle pick, sequential
    /// advance. On any shuffle advance the finished index is pushed onto the
    /// history before navigating.
    pub fn advance_on_end(&mut self, rng: &mut impl Rng) -> Advance {
        if self.repeat_mode == RepeatMode::One {
            return Advance::ReplayCurrent;
        }
        if !self.autoplay_next {
            return Advance::Stop;
        }
        if self.shuffle_enabled {
            return match self.pick_shuffled(rng) {
                Some(next) => {
                    self.record_and_move(next);
                    Advance::Next(next)
                }
                None => Advance::Stop,
            };
        }

        // Sequential
        let next = self.current_index + 1;
        if next < self.items.len() {
            self.current_index = next;
            Advance::Next(next)
        } else if self.repeat_mode == RepeatMode::All && !self.items.is_empty() {
            self.current_index = 0;
            Advance::Next(0)
        } else {
            Advance::Stop
        }
    }

    /// Explicit "next" pressed by the user: skips the repeat-one and
    /// autoplay gates but follows the same shuffle/sequential selection
    pub fn next_explicit(&mut self, rng: &mut impl Rng) -> Option<usize> {
        if self.shuffle_enabled {
            let next = self.pick_shuffled(rng)?;
            self.record_and_move(next);
            return Some(next);
        }
        let next = self.current_index + 1;
        if next < self.items.len() {
            self.current_index = next;
            Some(next)
        } else if self.repeat_mode == RepeatMode::All && !self.items.is_empty() {
            self.current_index = 0;
            Some(0)
        } else {
            None
        }
    }

    /// Previous playlist entry; wraps only under `repeat = all`
    pub fn previous(&mut self) -> Option<usize> {
        if self.current_index > 0 {
            self.current_index -= 1;
            self.shuffle_history.remove(&self.current_index);
            Some(self.current_index)
        } else if self.repeat_mode == RepeatMode::All && !self.items.is_empty() {
            self.current_index = self.items.len() - 1;
            self.shuffle_history.remove(&self.current_index);
            Some(self.current_index)
        } else {
            None
        }
    }

    fn record_and_move(&mut self, next: usize) {
        self.shuffle_history.insert(self.current_index);
        self.shuffle_history.remove(&next);
        self.current_index = next;
    }

    /// Uniform pick among unplayed indices, honoring repeat-all recycling
    fn pick_shuffled(&mut self, rng: &mut impl Rng) -> Option<usize> {
        let candidates: Vec<usize> = (0..self.items.len())
            .filter(|i| *i != self.current_index && !self.shuffle_history.contains(i))
            .collect();

        if !candidates.is_empty() {
            return Some(candidates[rng.random_range(0..candidates.len())]);
        }

        if self.repeat_mode != RepeatMode::All || self.items.len() < 2 {
            return None;
        }

        // Every item has played: clear history, everything but the current
        // item becomes eligible again
        log::debug!("[Playlist] Shuffle cycle exhausted; clearing history");
        self.shuffle_history.clear();
        let candidates: Vec<usize> = (0..self.items.len())
            .filter(|i| *i != self.current_index)
            .collect();
        Some(candidates[rng.random_range(0..candidates.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn playlist(n: usize) -> PlaylistState {
        PlaylistState::new((0..n).map(|_| ItemID::new()).collect(), 0)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn repeat_one_always_replays() {
        let mut p = playlist(3);
        p.repeat_mode = RepeatMode::One;
        p.shuffle_enabled = true;
        p.autoplay_next = false;
        assert_eq!(p.advance_on_end(&mut rng()), Advance::ReplayCurrent);
        assert_eq!(p.current_index(), 0);
    }

    #[test]
    fn autoplay_off_stops() {
        let mut p = playlist(3);
        p.autoplay_next = false;
        assert_eq!(p.advance_on_end(&mut rng()), Advance::Stop);
    }

    #[test]
    fn sequential_advances_then_stops() {
        let mut p = playlist(3);
        assert_eq!(p.advance_on_end(&mut rng()), Advance::Next(1));
        assert_eq!(p.advance_on_end(&mut rng()), Advance::Next(2));
        assert_eq!(p.advance_on_end(&mut rng()), Advance::Stop);
    }

    #[test]
    fn sequential_wraps_under_repeat_all() {
        let mut p = playlist(2);
        p.repeat_mode = RepeatMode::All;
        assert_eq!(p.advance_on_end(&mut rng()), Advance::Next(1));
        assert_eq!(p.advance_on_end(&mut rng()), Advance::Next(0));
    }

    #[test]
    fn shuffle_never_repeats_within_a_cycle() {
        let mut p = playlist(6);
        p.shuffle_enabled = true;
        let mut rng = rng();

        let mut played = vec![0usize];
        for _ in 0..5 {
            match p.advance_on_end(&mut rng) {
                Advance::Next(i) => {
                    assert!(!played.contains(&i), "index {} repeated", i);
                    played.push(i);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        // All six played once, no repeat mode: done
        assert_eq!(p.advance_on_end(&mut rng), Advance::Stop);
    }

    #[test]
    fn shuffle_repeat_all_recycles_after_exhaustion() {
        let mut p = playlist(4);
        p.shuffle_enabled = true;
        p.repeat_mode = RepeatMode::All;
        let mut rng = rng();

        let mut seen = std::collections::HashSet::from([0usize]);
        for _ in 0..3 {
            match p.advance_on_end(&mut rng) {
                Advance::Next(i) => assert!(seen.insert(i)),
                other => panic!("unexpected {:?}", other),
            }
        }
        // Cycle complete; history clears and playback keeps going
        let before = p.current_index();
        match p.advance_on_end(&mut rng) {
            Advance::Next(i) => assert_ne!(i, before),
            other => panic!("unexpected {:?}", other),
        }
        assert!(p.shuffle_history().len() <= 1);
    }

    #[test]
    fn history_never_contains_current() {
        let mut p = playlist(5);
        p.shuffle_enabled = true;
        p.repeat_mode = RepeatMode::All;
        let mut rng = rng();
        for _ in 0..20 {
            p.advance_on_end(&mut rng);
            assert!(!p.shuffle_history().contains(&p.current_index()));
        }
    }

    #[test]
    fn previous_wraps_only_under_repeat_all() {
        let mut p = playlist(3);
        assert_eq!(p.previous(), None);
        p.repeat_mode = RepeatMode::All;
        assert_eq!(p.previous(), Some(2));
        assert_eq!(p.previous(), Some(1));
    }

    #[test]
    fn single_item_shuffle_stops_without_repeat_all() {
        let mut p = playlist(1);
        p.shuffle_enabled = true;
        assert_eq!(p.advance_on_end(&mut rng()), Advance::Stop);
        p.repeat_mode = RepeatMode::All;
        // One item cannot shuffle to anything else
        assert_eq!(p.advance_on_end(&mut rng()), Advance::Stop);
    }
}
