//! Updock Release Engine
//!
//! Components:
//! - `config` - Environment configuration loaded once at startup
//! - `storage` - Object store abstraction, S3 client, in-memory fake
//! - `release` - Channel keys and the object key layout
//! - `catalog` - Version directory listing and parsing
//! - `resolver` - "Is there a newer release?" resolution
//! - `publisher` - Release publication
//! - `api` - HTTP surface

pub mod api;
pub mod catalog;
pub mod config;
pub mod publisher;
pub mod release;
pub mod resolver;
pub mod storage;
