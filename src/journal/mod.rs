// src/journal/mod.rs

//! Persisted log state: file layout, framing lines, and run history.
//!
//! Diagnostics go through `tracing` (see `logging.rs`); this module owns the
//! append-only files operators read to audit what shepherd did.

pub mod history;
pub mod layout;
pub mod line;

pub use history::{read_runs, RunRecord};
pub use layout::LogLayout;
pub use line::{parse_line, Event, FramingLine, Journal, ParsedLine, Source};
