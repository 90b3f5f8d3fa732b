//! Cargo inspection report generator.
//!
//! Report data flows one way: a validated [`models::Report`] picks a strategy,
//! the strategy copies template tables and fills them through the
//! [`template_engine`], and the [`document`] adapter persists the draft.

pub mod config;
pub mod document;
pub mod errors;
pub mod fan_out;
pub mod handlers;
pub mod models;
pub mod numbers;
pub mod photos;
pub mod repository;
pub mod strategies;
pub mod template_engine;
