//! Which pages to keep warm around the current one

use std::collections::BTreeSet;

/// Pages on each side of the current page that are pre-rendered.
///
/// Covers the open spread plus one spread in each direction.
pub const PREFETCH_RADIUS: usize = 2;

/// Pages rendered before the book is shown: the cover and the first spread
const INITIAL_PAGES: usize = 3;

/// `center ± PREFETCH_RADIUS`, clamped to `[1, page_count]`
#[must_use]
pub fn neighborhood(center: usize, page_count: usize) -> BTreeSet<usize> {
    neighborhood_with_radius(center, page_count, PREFETCH_RADIUS)
}

#[must_use]
pub fn neighborhood_with_radius(center: usize, page_count: usize, radius: usize) -> BTreeSet<usize> {
    let first = center.saturating_sub(radius).max(1);
    let last = center.saturating_add(radius).min(page_count);
    (first..=last).collect()
}

/// Pages awaited during the initial load
#[must_use]
pub fn initial_pages(page_count: usize) -> Vec<usize> {
    (1..=INITIAL_PAGES.min(page_count)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pages: &[usize]) -> BTreeSet<usize> {
        pages.iter().copied().collect()
    }

    #[test]
    fn clamps_at_both_ends() {
        assert_eq!(neighborhood(1, 10), set(&[1, 2, 3]));
        assert_eq!(neighborhood(5, 10), set(&[3, 4, 5, 6, 7]));
        assert_eq!(neighborhood(10, 10), set(&[8, 9, 10]));
    }

    #[test]
    fn second_page_keeps_first() {
        assert_eq!(neighborhood(2, 10), set(&[1, 2, 3, 4]));
        assert_eq!(neighborhood(9, 10), set(&[7, 8, 9, 10]));
    }

    #[test]
    fn short_documents() {
        assert_eq!(neighborhood(1, 1), set(&[1]));
        assert_eq!(neighborhood(2, 2), set(&[1, 2]));
        assert!(neighborhood(1, 0).is_empty());
    }

    #[test]
    fn center_past_end_only_keeps_tail() {
        assert_eq!(neighborhood(12, 10), set(&[10]));
        assert!(neighborhood(20, 10).is_empty());
    }

    #[test]
    fn custom_radius() {
        assert_eq!(neighborhood_with_radius(5, 10, 0), set(&[5]));
        assert_eq!(neighborhood_with_radius(5, 10, 4), set(&[1, 2, 3, 4, 5, 6, 7, 8, 9]));
    }

    #[test]
    fn initial_pages_clamped() {
        assert_eq!(initial_pages(10), vec![1, 2, 3]);
        assert_eq!(initial_pages(2), vec![1, 2]);
        assert!(initial_pages(0).is_empty());
    }
}
