//! `TaskNest`: personal task manager client library.

pub mod app;
pub mod auth;
pub mod config;
pub mod mirror;
pub mod notify;
pub mod store;
pub mod tasks;
