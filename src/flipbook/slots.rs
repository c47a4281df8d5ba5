//! Page slots: one per page index, holding whatever surface is shown there

use std::collections::BTreeMap;
use std::sync::Arc;

use super::types::PageSurface;

/// Side of the spread a page sits on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSide {
    Left,
    Right,
}

impl PageSide {
    /// Even pages sit on the left; page 1 is the cover on the right
    #[must_use]
    pub const fn for_page(page: usize) -> Self {
        if page % 2 == 0 { Self::Left } else { Self::Right }
    }
}

#[derive(Clone, Debug)]
pub struct PageSlot {
    pub page: usize,
    pub side: PageSide,
    /// Page number printed on the slot
    pub label: String,
    pub surface: Option<Arc<PageSurface>>,
}

impl PageSlot {
    fn new(page: usize) -> Self {
        Self {
            page,
            side: PageSide::for_page(page),
            label: page.to_string(),
            surface: None,
        }
    }
}

/// Slots keyed by page index, created on first use and then reused
#[derive(Debug, Default)]
pub struct PageSlots {
    slots: BTreeMap<usize, PageSlot>,
}

impl PageSlots {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing slot for `page`, or a new empty one
    pub fn ensure(&mut self, page: usize) -> &mut PageSlot {
        self.slots.entry(page).or_insert_with(|| PageSlot::new(page))
    }

    /// Replace all slots with empty ones for pages `1..=page_count`
    pub fn rebuild(&mut self, page_count: usize) {
        self.slots.clear();
        for page in 1..=page_count {
            self.ensure(page);
        }
    }

    /// Show `surface` in its page's slot
    pub fn attach(&mut self, surface: Arc<PageSurface>) {
        let page = surface.page;
        self.ensure(page).surface = Some(surface);
    }

    /// Forget every surface but keep the slots
    pub fn clear_surfaces(&mut self) {
        for slot in self.slots.values_mut() {
            slot.surface = None;
        }
    }

    #[must_use]
    pub fn get(&self, page: usize) -> Option<&PageSlot> {
        self.slots.get(&page)
    }

    #[must_use]
    pub fn surface(&self, page: usize) -> Option<&Arc<PageSurface>> {
        self.slots.get(&page)?.surface.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageSlot> {
        self.slots.values()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Pages visible when the book is open at `page`, as `(left, right)`.
///
/// Page 1 is shown alone on the right; later spreads pair an even page with
/// the following odd page.
#[must_use]
pub fn spread_pages(page: usize, page_count: usize) -> (Option<usize>, Option<usize>) {
    if page_count == 0 || page == 0 {
        return (None, None);
    }
    let page = page.min(page_count);
    if page == 1 {
        return (None, Some(1));
    }
    let left = page - page % 2;
    let right = Some(left + 1).filter(|&p| p <= page_count);
    (Some(left), right)
}
