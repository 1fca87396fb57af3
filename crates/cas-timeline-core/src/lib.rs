#![forbid(unsafe_code)]
//! cas-timeline-core library.
//!
//! Data model, merge/refine pipeline, view state, shareable-link fragments,
//! local edits and the collaborators (dataset source, event store, publish
//! endpoint) behind the CAS timeline viewer.
//!
//! # Conventions
//!
//! - **Errors**: [`error::TimelineError`] for library operations; binaries
//!   wrap it in `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod authoring;
pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod fragment;
pub mod location;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod render;
pub mod schedule;
pub mod session;
pub mod spy;
pub mod state;
pub mod store;

pub use error::{ErrorCode, TimelineError};
pub use model::{Category, Dataset, Filter, SortOrder, TimelineItem};
pub use session::{Outcome, TimelineSession};
