// Export modules for use in tests
pub mod flipbook;
pub mod panic_handler;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main session components
pub use flipbook::{LayoutSpec, RenderCache, Session, SessionConfig, SessionPhase};
