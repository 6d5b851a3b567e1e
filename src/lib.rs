#![deny(missing_docs)]

//! Fixed-order UI layers for games.
//!
//! Views are opened by identifier into one of seven paint-ordered layers, loaded through a
//! pluggable resource loader, cached per layer and removed again on request. Start-up work is
//! sequenced with an asynchronous task queue.
//!
//! This crate re-exports [`stratum_gui`].

pub use stratum_gui::*;
