//! services/api/src/lib.rs
//!
//! Library root for the BaliseBoxd API service.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
