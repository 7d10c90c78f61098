//! Scheduled blog-post generation: a queue of post specs, a local engine with
//! a remote-API fallback, Markdown output for the static-site build, and a
//! cron-driven retry contract built on a sentinel file.
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod model;
pub mod queue;
pub mod remote;
pub mod scheduler;
pub mod sentinel;
pub mod slug;
pub mod trigger;
pub mod writer;
