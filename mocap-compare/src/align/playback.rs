//! Mapping a playback step to the pair of frames shown side by side.

use super::dtw::AlignmentPath;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Follow the warping path.
    #[default]
    Aligned,
    /// Step both motions frame by frame.
    Raw,
    /// Follow the path until `switch_at`, then advance both motions together
    /// from the pair reached there.
    Hybrid { switch_at: usize },
}

/// Frames `(a, b)` to show at `step`, clamped to both motions.
pub fn playback_frames(
    mode: PlaybackMode,
    path: &AlignmentPath,
    frames_a: usize,
    frames_b: usize,
    step: usize,
) -> (usize, usize) {
    let last_a = frames_a.saturating_sub(1);
    let last_b = frames_b.saturating_sub(1);
    let on_path = |step: usize| {
        path.get(step.min(path.len().saturating_sub(1)))
            .unwrap_or((0, 0))
    };

    let (a, b) = match mode {
        PlaybackMode::Aligned => on_path(step),
        PlaybackMode::Raw => (step, step),
        PlaybackMode::Hybrid { switch_at } if step <= switch_at => on_path(step),
        PlaybackMode::Hybrid { switch_at } => {
            let (a, b) = on_path(switch_at);
            let extra = step - switch_at;
            (a.saturating_add(extra), b.saturating_add(extra))
        }
    };
    (a.min(last_a), b.min(last_b))
}

/// Number of steps until both motions have reached their last frame.
pub fn playback_len(mode: PlaybackMode, path: &AlignmentPath, frames_a: usize, frames_b: usize) -> usize {
    match mode {
        PlaybackMode::Aligned => path.len(),
        PlaybackMode::Raw => frames_a.max(frames_b),
        PlaybackMode::Hybrid { switch_at } => {
            let switch_at = switch_at.min(path.len().saturating_sub(1));
            let (a, b) = path.get(switch_at).unwrap_or((0, 0));
            let remaining = frames_a.saturating_sub(a + 1).max(frames_b.saturating_sub(b + 1));
            switch_at + 1 + remaining
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> AlignmentPath {
        AlignmentPath {
            a: vec![0, 0, 1, 2, 3],
            b: vec![0, 1, 2, 2, 3],
        }
    }

    #[test]
    fn test_aligned_follows_path_and_clamps() {
        let path = path();
        assert_eq!(playback_frames(PlaybackMode::Aligned, &path, 4, 4, 1), (0, 1));
        assert_eq!(playback_frames(PlaybackMode::Aligned, &path, 4, 4, 3), (2, 2));
        assert_eq!(playback_frames(PlaybackMode::Aligned, &path, 4, 4, 99), (3, 3));
        assert_eq!(playback_len(PlaybackMode::Aligned, &path, 4, 4), 5);
    }

    #[test]
    fn test_raw_clamps_shorter_motion() {
        let path = path();
        assert_eq!(playback_frames(PlaybackMode::Raw, &path, 4, 6, 5), (3, 5));
        assert_eq!(playback_len(PlaybackMode::Raw, &path, 4, 6), 6);
    }

    #[test]
    fn test_hybrid_switches_to_raw() {
        let path = path();
        let mode = PlaybackMode::Hybrid { switch_at: 2 };
        assert_eq!(playback_frames(mode, &path, 6, 8, 1), (0, 1));
        assert_eq!(playback_frames(mode, &path, 6, 8, 2), (1, 2));
        assert_eq!(playback_frames(mode, &path, 6, 8, 4), (3, 4));
        assert_eq!(playback_frames(mode, &path, 6, 8, 20), (5, 7));
        assert_eq!(playback_len(mode, &path, 6, 8), 8);
    }

    #[test]
    fn test_empty_path_stays_at_start() {
        let path = AlignmentPath::default();
        assert_eq!(playback_frames(PlaybackMode::Aligned, &path, 3, 3, 7), (0, 0));
    }
}
