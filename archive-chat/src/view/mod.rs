//! Results view
//!
//! Pure page/sort state, the view model that drives it from the search
//! gateway, and the renderers that paint it.

pub mod model;
pub mod render;
pub mod state;

pub use model::{PageOutcome, PageRequest, ResultsViewModel};
pub use render::{Renderer, TerminalRenderer};
pub use state::ResultsState;
