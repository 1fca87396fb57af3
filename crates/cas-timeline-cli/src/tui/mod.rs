//! Terminal user interface.
//!
//! ## Entry points
//!
//! - [`timeline::run_browse`]: the full-screen timeline browser
//!   (`cas browse`).
//! - [`add_dialog::AddDialog`]: modal form for authoring an event.

pub mod add_dialog;
pub mod timeline;

pub use timeline::BrowseArgs;
