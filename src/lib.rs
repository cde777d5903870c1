//! Keep a markdown checkbox list in sync with an in-memory task list.
//!
//! Reading goes through [`parse::parse_tasks`]; writing goes through
//! [`parse::generate_content`], which edits the existing file in place so
//! prose, spacing and line endings survive. [`sync::Reconciler`] ties the two
//! together with change notifications and a file watcher loop.

pub mod cli;
pub mod io;
pub mod model;
pub mod ops;
pub mod parse;
pub mod sync;
