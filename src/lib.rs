//! prt: 複数リポジトリの PR をまとめて捌くターミナル UI

pub mod app;
pub mod batch;
pub mod cache;
pub mod client;
pub mod config;
pub mod diff;
pub mod editor;
pub mod event_bus;
pub mod filter;
pub mod git;
pub mod github;
pub mod model;
pub mod ui;
