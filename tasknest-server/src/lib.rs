//! `TaskNest` API server library.
//!
//! An in-memory implementation of the todo API the `tasknest` client talks
//! to: account registration and login with bearer tokens, and per-user task
//! CRUD. Exposed as a library so tests can run it in-process.

pub mod api;
pub mod config;
pub mod store;
