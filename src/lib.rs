//! Reelview: movie and TV metadata served through a stale-while-revalidate
//! read-through cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
