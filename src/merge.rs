use crate::models::{normalize_key, CandidateList};
use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Per-theme share of `target_size`. The remainder goes one unit at a time
/// to the earliest themes.
pub fn quotas(theme_count: usize, target_size: usize) -> Vec<usize> {
    if theme_count == 0 {
        return Vec::new();
    }
    let base = target_size / theme_count;
    let extra = target_size % theme_count;
    (0..theme_count).map(|i| if i < extra { base + 1 } else { base }).collect()
}

/// Fair-share interleave of several candidate lists into one playlist.
#[derive(Debug, Clone, Copy)]
pub struct PlaylistMerger {
    target_size: usize,
}

impl PlaylistMerger {
    pub fn new(target_size: usize) -> Self {
        Self { target_size }
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// Merge `candidates` in their given order.
    ///
    /// Each theme first contributes up to its quota of titles not already
    /// picked, in shuffled order. If that leaves the playlist short, the
    /// remaining unused titles of every theme are pooled, shuffled, and used
    /// to backfill. Titles are compared case-insensitively and the result is
    /// never padded: a small pool gives a short playlist.
    pub fn merge<R: Rng + ?Sized>(&self, candidates: &[CandidateList], rng: &mut R) -> Result<Vec<String>> {
        ensure!(!candidates.is_empty(), "cannot merge zero themes");
        ensure!(self.target_size > 0, "target size must be at least 1");

        let mut combined: Vec<String> = Vec::with_capacity(self.target_size);
        let mut used: HashSet<String> = HashSet::new();

        for (list, quota) in candidates.iter().zip(quotas(candidates.len(), self.target_size)) {
            let mut unique = unused_titles(std::slice::from_ref(list), &used);
            unique.shuffle(rng);
            for song in unique.into_iter().take(quota) {
                used.insert(normalize_key(&song));
                combined.push(song);
            }
        }

        if combined.len() < self.target_size {
            let mut remaining = unused_titles(candidates, &used);
            remaining.shuffle(rng);
            let needed = self.target_size - combined.len();
            combined.extend(remaining.into_iter().take(needed));
        }

        Ok(combined)
    }
}

/// Titles from `lists` whose key is not in `used`, first occurrence of each
/// key only.
fn unused_titles(lists: &[CandidateList], used: &HashSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    lists
        .iter()
        .flat_map(|l| l.songs.iter())
        .filter(|song| {
            let key = normalize_key(song);
            !key.is_empty() && !used.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lists(themes: &[(&str, &[&str])]) -> Vec<CandidateList> {
        themes
            .iter()
            .map(|(theme, songs)| CandidateList::new(*theme, songs.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn keys(songs: &[String]) -> HashSet<String> {
        songs.iter().map(|s| normalize_key(s)).collect()
    }

    #[test]
    fn quotas_give_remainder_to_first_themes() {
        assert_eq!(quotas(3, 10), vec![4, 3, 3]);
        assert_eq!(quotas(2, 4), vec![2, 2]);
        assert_eq!(quotas(4, 2), vec![1, 1, 0, 0]);
    }

    #[test]
    fn rock_and_jazz_split_evenly() {
        let candidates = lists(&[("jazz", &["S4", "S5"]), ("rock", &["S1", "S2", "S3"])]);
        let mut rng = StdRng::seed_from_u64(7);
        let out = PlaylistMerger::new(4).merge(&candidates, &mut rng).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(keys(&out).len(), 4);
        // interleave order: both jazz picks come first, then two rock picks
        let mut jazz: Vec<&str> = out[..2].iter().map(|s| s.as_str()).collect();
        jazz.sort();
        assert_eq!(jazz, vec!["S4", "S5"]);
        assert!(out[2..].iter().all(|s| ["S1", "S2", "S3"].contains(&s.as_str())));
    }

    #[test]
    fn duplicates_across_themes_are_skipped_case_insensitively() {
        let candidates = lists(&[("a", &["Song X", "Song Y"]), ("b", &["song x", "SONG Y", "Song Z"])]);
        let mut rng = StdRng::seed_from_u64(1);
        let out = PlaylistMerger::new(3).merge(&candidates, &mut rng).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(keys(&out).len(), 3);
        assert!(keys(&out).contains("song z"));
    }

    #[test]
    fn duplicates_inside_one_theme_are_collapsed() {
        let candidates = lists(&[("a", &["Dup", "dup", "DUP"]), ("b", &["Other"])]);
        let mut rng = StdRng::seed_from_u64(3);
        let out = PlaylistMerger::new(4).merge(&candidates, &mut rng).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(keys(&out).len(), 2);
    }

    #[test]
    fn short_theme_is_backfilled_from_the_others() {
        let candidates = lists(&[("small", &["A"]), ("big", &["B", "C", "D", "E", "F"])]);
        let mut rng = StdRng::seed_from_u64(11);
        let out = PlaylistMerger::new(4).merge(&candidates, &mut rng).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], "A");
        assert_eq!(keys(&out).len(), 4);
    }

    #[test]
    fn small_pool_gives_short_playlist() {
        let candidates = lists(&[("a", &["1", "2"]), ("b", &["3"])]);
        let mut rng = StdRng::seed_from_u64(5);
        let out = PlaylistMerger::new(10).merge(&candidates, &mut rng).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn same_seed_same_playlist() {
        let candidates = lists(&[
            ("a", &["a1", "a2", "a3", "a4", "a5"]),
            ("b", &["b1", "b2", "b3", "b4", "b5"]),
            ("c", &["c1", "c2", "c3", "c4", "c5"]),
        ]);
        let merger = PlaylistMerger::new(10);
        let first = merger.merge(&candidates, &mut StdRng::seed_from_u64(42)).unwrap();
        let second = merger.merge(&candidates, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 10);
        assert_eq!(first[..4].iter().filter(|s| s.starts_with('a')).count(), 4);
    }

    #[test]
    fn zero_themes_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(PlaylistMerger::new(5).merge(&[], &mut rng).is_err());
        let candidates = lists(&[("a", &["x"])]);
        assert!(PlaylistMerger::new(0).merge(&candidates, &mut rng).is_err());
    }
}
