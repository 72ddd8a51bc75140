//! Anime recommendation service: free-text preferences in, a ranked record
//! list out, backed by two metadata sources and a per-query snapshot cache.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
