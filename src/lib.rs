//! Liked-posts archiver library.
//!
//! Incrementally harvests the posts an account has liked into SQLite and,
//! in a separate pass, downloads their photo attachments to disk.

pub mod api;
pub mod config;
pub mod constants;
pub mod crawler;
pub mod db;
pub mod media;
pub mod reconciler;
