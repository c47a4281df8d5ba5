//! View state management
//!
//! Pure decision logic for the viewport controller: commands update the
//! layout and active page and return the effects the session must carry out,
//! in order.

use super::layout::{LayoutSpec, compute_layout, refine_layout};
use super::prefetch::{initial_pages, neighborhood_with_radius};
use super::widget::TurnEvent;

/// Current layout and position of an open book
#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    /// Container width the layout was computed from
    pub container_width: u32,
    pub gutter: u32,
    /// Aspect used until the document's own is known
    pub fallback_aspect: f32,
    /// Width over height of the document's first page
    pub document_aspect: Option<f32>,
    pub layout: LayoutSpec,
    pub page_count: usize,
    /// Last page the widget reported
    pub active_page: usize,
    pub prefetch_radius: usize,
}

impl ViewState {
    #[must_use]
    pub fn new(container_width: u32, gutter: u32, fallback_aspect: f32, prefetch_radius: usize) -> Self {
        Self {
            container_width,
            gutter,
            fallback_aspect,
            document_aspect: None,
            layout: compute_layout(container_width, gutter, fallback_aspect),
            page_count: 0,
            active_page: 1,
            prefetch_radius,
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::DocumentLoaded { page_count, aspect } => {
                self.page_count = page_count;
                self.document_aspect = Some(aspect);
                self.layout = refine_layout(self.layout, aspect);
                self.active_page = 1;
                vec![
                    Effect::RebuildSlots(page_count),
                    Effect::InitWidget,
                    Effect::AwaitPages(initial_pages(page_count)),
                    Effect::RenderPages(self.neighborhood(1)),
                ]
            }

            Command::Reflow {
                container_width,
                current_page,
            } => {
                self.container_width = container_width;
                self.layout = self.fitted_layout();
                self.active_page = current_page
                    .filter(|&p| p >= 1)
                    .unwrap_or(1)
                    .min(self.page_count.max(1));
                vec![
                    Effect::ResizeWidget {
                        width: self.layout.spread_width(),
                        height: self.layout.spread_height(),
                    },
                    Effect::InvalidateCache,
                    Effect::RenderPages(self.neighborhood(self.active_page)),
                ]
            }

            Command::Turn(event) => {
                let page = event.page();
                if page == 0 || page > self.page_count {
                    return vec![];
                }
                self.active_page = page;
                vec![Effect::RenderPages(self.neighborhood(page))]
            }
        }
    }

    /// Layout for the current container, refined once the document is known
    #[must_use]
    pub fn fitted_layout(&self) -> LayoutSpec {
        let layout = compute_layout(self.container_width, self.gutter, self.fallback_aspect);
        match self.document_aspect {
            Some(aspect) => refine_layout(layout, aspect),
            None => layout,
        }
    }

    fn neighborhood(&self, center: usize) -> Vec<usize> {
        neighborhood_with_radius(center, self.page_count, self.prefetch_radius)
            .into_iter()
            .collect()
    }
}

/// Commands that modify view state
#[derive(Clone, Debug)]
pub enum Command {
    /// The document opened and its first page was measured
    DocumentLoaded { page_count: usize, aspect: f32 },
    /// The container settled at a new width
    Reflow {
        container_width: u32,
        /// Page the widget reports, if it can
        current_page: Option<usize>,
    },
    /// The widget is turning or has turned
    Turn(TurnEvent),
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Create empty slots for every page
    RebuildSlots(usize),
    /// Construct the widget from the current layout
    InitWidget,
    /// Resize the widget, rebuilding it if resizing fails
    ResizeWidget { width: u32, height: u32 },
    /// Drop every cached surface
    InvalidateCache,
    /// Render and wait for these pages
    AwaitPages(Vec<usize>),
    /// Render these pages without waiting
    RenderPages(Vec<usize>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flipbook::layout::DEFAULT_ASPECT;
    use crate::flipbook::prefetch::PREFETCH_RADIUS;

    fn test_state() -> ViewState {
        ViewState::new(1200, 16, DEFAULT_ASPECT, PREFETCH_RADIUS)
    }

    fn loaded(page_count: usize, aspect: f32) -> ViewState {
        let mut state = test_state();
        let _ = state.apply(Command::DocumentLoaded { page_count, aspect });
        state
    }

    #[test]
    fn new_state_uses_fallback_aspect() {
        let state = test_state();
        assert_eq!(state.layout.page_width, 592);
        assert_eq!(state.layout.page_height, 789);
        assert_eq!(state.active_page, 1);
    }

    #[test]
    fn document_loaded_refines_and_renders_first_spread() {
        let mut state = test_state();
        let effects = state.apply(Command::DocumentLoaded {
            page_count: 10,
            aspect: 1.5,
        });

        assert_eq!(state.layout.page_width, 592);
        assert_eq!(state.layout.page_height, 395);
        assert_eq!(
            effects,
            vec![
                Effect::RebuildSlots(10),
                Effect::InitWidget,
                Effect::AwaitPages(vec![1, 2, 3]),
                Effect::RenderPages(vec![1, 2, 3]),
            ]
        );
    }

    #[test]
    fn reflow_invalidates_before_rendering() {
        let mut state = loaded(10, 0.75);
        let effects = state.apply(Command::Reflow {
            container_width: 816,
            current_page: Some(5),
        });

        assert_eq!(state.layout.page_width, 400);
        assert_eq!(state.layout.page_height, 533);
        assert_eq!(state.active_page, 5);
        assert_eq!(
            effects,
            vec![
                Effect::ResizeWidget {
                    width: 816,
                    height: 533
                },
                Effect::InvalidateCache,
                Effect::RenderPages(vec![3, 4, 5, 6, 7]),
            ]
        );
    }

    #[test]
    fn reflow_without_position_falls_back_to_first_page() {
        let mut state = loaded(10, 0.75);
        let effects = state.apply(Command::Reflow {
            container_width: 1000,
            current_page: None,
        });
        assert_eq!(state.active_page, 1);
        assert_eq!(effects.last(), Some(&Effect::RenderPages(vec![1, 2, 3])));
    }

    #[test]
    fn reflow_keeps_document_aspect() {
        let mut state = loaded(10, 1.5);
        let _ = state.apply(Command::Reflow {
            container_width: 1200,
            current_page: Some(1),
        });
        assert_eq!(state.layout.page_height, 395);
    }

    #[test]
    fn both_turn_events_warm_neighborhood() {
        let mut state = loaded(10, 0.75);
        let turning = state.apply(Command::Turn(TurnEvent::Turning(10)));
        assert_eq!(turning, vec![Effect::RenderPages(vec![8, 9, 10])]);
        assert_eq!(state.active_page, 10);

        let turned = state.apply(Command::Turn(TurnEvent::Turned(4)));
        assert_eq!(turned, vec![Effect::RenderPages(vec![2, 3, 4, 5, 6])]);
        assert_eq!(state.active_page, 4);
    }

    #[test]
    fn turn_out_of_range_is_ignored() {
        let mut state = loaded(10, 0.75);
        assert!(state.apply(Command::Turn(TurnEvent::Turned(11))).is_empty());
        assert!(state.apply(Command::Turn(TurnEvent::Turning(0))).is_empty());
        assert_eq!(state.active_page, 1);
    }
}
