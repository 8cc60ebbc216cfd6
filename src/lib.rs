//! Updock - self-hosted application update server
//! Library crate backing the `updock` binary.

pub mod engine;
