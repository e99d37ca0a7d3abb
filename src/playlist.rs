//! Shuffled, cyclic selection over the fetched catalog.

use crate::video::{Locator, TimeOfDay, Video};
use chrono::Timelike;
use rand::seq::SliceRandom;
use rand::Rng;

/// Forward-only rotation over a shuffled copy of the catalog.
///
/// Every video recurs with a period equal to the sequence length (or the
/// filtered subsequence length while a day/night filter holds). There is no
/// exhaustion signal and no way to remove entries.
pub struct Playlist {
    videos: Vec<Video>,
    cursor: usize,
}

impl Playlist {
    /// Copy and shuffle the catalog with the thread-local RNG.
    pub fn new(videos: Vec<Video>) -> Self {
        Self::with_rng(videos, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(mut videos: Vec<Video>, rng: &mut R) -> Self {
        videos.shuffle(rng);
        Self { videos, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    /// Next video for the current local time.
    #[cfg(test)]
    pub fn next_video(&mut self, filter_active: bool) -> Video {
        self.next_video_at(filter_active, chrono::Local::now().hour())
    }

    /// Next video as if the local clock read `hour`.
    ///
    /// With the filter active, only videos tagged for the hour's bracket are
    /// candidates; when none are, the whole sequence is used instead.
    pub fn next_video_at(&mut self, filter_active: bool, hour: u32) -> Video {
        if self.videos.is_empty() {
            return Video::blank();
        }

        let cursor = self.cursor;
        self.cursor = self.cursor.wrapping_add(1);

        if filter_active {
            let bracket = TimeOfDay::at_hour(hour);
            let matching: Vec<&Video> = self
                .videos
                .iter()
                .filter(|v| v.time_tag() == Some(bracket))
                .collect();
            if !matching.is_empty() {
                return matching[cursor % matching.len()].clone();
            }
            tracing::debug!(
                "No {} videos in playlist, using unfiltered rotation",
                bracket.as_str()
            );
        }

        self.videos[cursor % self.videos.len()].clone()
    }

    /// Next video that resolves for `option`, skipping unsupported ones.
    ///
    /// With the filter active, a bracket where nothing resolves falls back to
    /// the whole sequence. Each pass is bounded by the sequence length, so a
    /// catalog where nothing supports the option cannot spin forever.
    pub fn next_playable(&mut self, filter_active: bool, option: &str) -> Option<(Video, Locator)> {
        let hour = chrono::Local::now().hour();
        self.next_playable_at(filter_active, option, hour)
    }

    pub fn next_playable_at(
        &mut self,
        filter_active: bool,
        option: &str,
        hour: u32,
    ) -> Option<(Video, Locator)> {
        if let Some(found) = self.playable_pass(filter_active, option, hour) {
            return Some(found);
        }
        if filter_active {
            tracing::debug!(
                "No {} video supports '{}', using unfiltered rotation",
                TimeOfDay::at_hour(hour).as_str(),
                option
            );
            return self.playable_pass(false, option, hour);
        }
        None
    }

    fn playable_pass(
        &mut self,
        filter_active: bool,
        option: &str,
        hour: u32,
    ) -> Option<(Video, Locator)> {
        for _ in 0..self.videos.len() {
            let video = self.next_video_at(filter_active, hour);
            match video.resolve(option) {
                Some(locator) => return Some((video, locator)),
                None => {
                    tracing::debug!("Skipping '{}': no source for '{}'", video.label(), option);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn video(label: &str, tag: Option<TimeOfDay>) -> Video {
        Video::new(label)
            .with_source("1080_h264", Locator::new(format!("https://cdn/{label}.mov")))
            .with_time_tag(tag)
    }

    fn catalog(n: usize) -> Vec<Video> {
        (0..n).map(|i| video(&format!("clip-{i}"), None)).collect()
    }

    #[test]
    fn every_video_once_per_cycle() {
        let mut playlist = Playlist::with_rng(catalog(7), &mut StdRng::seed_from_u64(3));

        let first: HashSet<String> = (0..7)
            .map(|_| playlist.next_video(false).label().to_string())
            .collect();
        assert_eq!(first.len(), 7);

        // The second cycle repeats the same order.
        let mut again = Playlist::with_rng(catalog(7), &mut StdRng::seed_from_u64(3));
        let order: Vec<String> = (0..14)
            .map(|_| again.next_video(false).label().to_string())
            .collect();
        assert_eq!(order[..7], order[7..]);
    }

    #[test]
    fn empty_catalog_yields_blank() {
        let mut playlist = Playlist::new(Vec::new());
        assert!(playlist.is_empty());
        for _ in 0..3 {
            assert!(playlist.next_video(true).is_blank());
            assert!(playlist.next_video(false).is_blank());
        }
        assert!(playlist.next_playable(false, "1080_h264").is_none());
    }

    #[test]
    fn filter_selects_current_bracket() {
        let videos = vec![
            video("day-1", Some(TimeOfDay::Day)),
            video("night-1", Some(TimeOfDay::Night)),
            video("day-2", Some(TimeOfDay::Day)),
            video("untagged", None),
        ];
        let mut playlist = Playlist::with_rng(videos, &mut StdRng::seed_from_u64(9));

        for _ in 0..6 {
            let v = playlist.next_video_at(true, 10);
            assert_eq!(v.time_tag(), Some(TimeOfDay::Day), "got {}", v.label());
        }
        for _ in 0..3 {
            assert_eq!(playlist.next_video_at(true, 22).label(), "night-1");
        }
    }

    #[test]
    fn filter_falls_back_when_bracket_is_empty() {
        let videos = vec![
            video("night-1", Some(TimeOfDay::Night)),
            video("night-2", Some(TimeOfDay::Night)),
        ];
        let mut playlist = Playlist::new(videos);

        let v = playlist.next_video_at(true, 12);
        assert_eq!(v.time_tag(), Some(TimeOfDay::Night));
        assert!(!v.is_blank());
    }

    #[test]
    fn filter_off_ignores_tags() {
        let videos = vec![
            video("day", Some(TimeOfDay::Day)),
            video("night", Some(TimeOfDay::Night)),
        ];
        let mut playlist = Playlist::new(videos);

        let seen: HashSet<String> = (0..2)
            .map(|_| playlist.next_video_at(false, 12).label().to_string())
            .collect();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn next_playable_skips_unsupported() {
        let videos = vec![
            Video::new("4k-only").with_source("4k_hevc", Locator::new("a")),
            video("hd", None),
            Video::new("4k-too").with_source("4k_hevc", Locator::new("b")),
        ];
        let mut playlist = Playlist::new(videos);

        for _ in 0..5 {
            let (v, locator) = playlist
                .next_playable_at(false, "1080_h264", 12)
                .expect("one video supports 1080");
            assert_eq!(v.label(), "hd");
            assert_eq!(locator.as_str(), "https://cdn/hd.mov");
        }
    }

    #[test]
    fn next_playable_leaves_bracket_when_nothing_there_resolves() {
        let videos = vec![
            Video::new("day-4k")
                .with_source("4k_hevc", Locator::new("https://cdn/day-4k.mov"))
                .with_time_tag(Some(TimeOfDay::Day)),
            video("night-hd", Some(TimeOfDay::Night)),
        ];
        let mut playlist = Playlist::new(videos);

        for _ in 0..3 {
            let (v, locator) = playlist
                .next_playable_at(true, "1080_h264", 12)
                .expect("the night video is playable");
            assert_eq!(v.label(), "night-hd");
            assert_eq!(locator.as_str(), "https://cdn/night-hd.mov");
        }
    }

    #[test]
    fn next_playable_gives_up_after_one_pass() {
        let videos = vec![
            Video::new("a").with_source("4k_hevc", Locator::new("a")),
            Video::new("b").with_source("4k_hevc", Locator::new("b")),
        ];
        let mut playlist = Playlist::new(videos);
        assert!(playlist.next_playable_at(false, "1080_h264", 12).is_none());
        assert!(playlist.next_playable_at(true, "1080_h264", 12).is_none());
    }
}
