//! Fixed-size bitmask of matching plies.

/// Words in the caller-provided output buffer.
pub const WINDOW_WORDS: usize = 16;
/// Plies representable in one window.
pub const WINDOW_PLIES: usize = WINDOW_WORDS * 32;

/// Matching plies relative to `min_ply`: bit `i % 32` of word `i / 32` is
/// set when ply `min_ply + i` matched.
///
/// `min_ply` is the first matching ply rounded down to a multiple of 32.
/// `count` is the number of matching plies found, including any that fell
/// past the end of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlyWindow {
    pub count: u32,
    pub min_ply: u16,
    pub bits: [u32; WINDOW_WORDS],
}

impl PlyWindow {
    /// Builds a window from matching plies in ascending order.
    pub fn from_plies(plies: &[u16]) -> PlyWindow {
        let Some(&first) = plies.first() else {
            return PlyWindow::default();
        };

        let mut window = PlyWindow {
            count: plies.len() as u32,
            min_ply: first - first % 32,
            bits: [0; WINDOW_WORDS],
        };
        let mut dropped = 0usize;
        for &ply in plies {
            let offset = ply.checked_sub(window.min_ply).map_or(usize::MAX, usize::from);
            if offset < WINDOW_PLIES {
                window.bits[offset / 32] |= 1 << (offset % 32);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(
                min_ply = window.min_ply,
                dropped,
                "matching plies beyond the {WINDOW_PLIES}-ply window were dropped"
            );
        }
        window
    }

    pub fn contains(&self, ply: u16) -> bool {
        let Some(offset) = ply.checked_sub(self.min_ply).map(usize::from) else {
            return false;
        };
        offset < WINDOW_PLIES && self.bits[offset / 32] & (1 << (offset % 32)) != 0
    }

    /// Plies set in the window, ascending. Bits that would name a ply past
    /// `u16::MAX` are skipped.
    pub fn plies(&self) -> impl Iterator<Item = u16> + '_ {
        (0..WINDOW_PLIES)
            .filter(move |offset| self.bits[offset / 32] & (1 << (offset % 32)) != 0)
            .filter_map(move |offset| {
                u16::try_from(offset)
                    .ok()
                    .and_then(|offset| self.min_ply.checked_add(offset))
            })
    }

    /// Whether some matching plies did not fit.
    pub fn is_truncated(&self) -> bool {
        let stored: u32 = self.bits.iter().map(|w| w.count_ones()).sum();
        stored < self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let window = PlyWindow::from_plies(&[]);
        assert_eq!(window.count, 0);
        assert_eq!(window.min_ply, 0);
        assert_eq!(window.plies().count(), 0);
    }

    #[test]
    fn test_min_ply_rounds_down() {
        let window = PlyWindow::from_plies(&[37, 38, 70]);
        assert_eq!(window.count, 3);
        assert_eq!(window.min_ply, 32);
        assert_eq!(window.bits[0], (1 << 5) | (1 << 6));
        assert_eq!(window.bits[1], 1 << 6);
        assert!(window.contains(70));
        assert!(!window.contains(36));
        assert!(!window.contains(3));
        assert_eq!(window.plies().collect::<Vec<_>>(), vec![37, 38, 70]);
        assert!(!window.is_truncated());
    }

    #[test]
    fn test_plies_past_window_are_dropped() {
        let window = PlyWindow::from_plies(&[0, 511, 512, 600]);
        assert_eq!(window.count, 4);
        assert!(window.contains(511));
        assert!(!window.contains(512));
        assert_eq!(window.bits[15], 1 << 31);
        assert!(window.is_truncated());
    }

    #[test]
    fn test_window_at_top_of_ply_range() {
        let window = PlyWindow::from_plies(&[u16::MAX]);
        assert_eq!(window.min_ply, u16::MAX - 31);
        assert_eq!(window.plies().collect::<Vec<_>>(), vec![u16::MAX]);

        let mut bits = [0; WINDOW_WORDS];
        bits[0] = 1 << 31;
        bits[1] = 1;
        bits[15] = 1 << 31;
        let window = PlyWindow {
            count: 3,
            min_ply: u16::MAX - 31,
            bits,
        };
        assert_eq!(window.plies().collect::<Vec<_>>(), vec![u16::MAX]);
    }
}
