//! adaptiq-core: adaptive quiz engine, Bloom scoring, and result compilation.
//!
//! This crate defines the data model, the pure adaptive state machine, the
//! async engine with its collaborator traits, and the quiz/transcript file
//! formats that the adaptiq CLI builds on.

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod manager;
pub mod memory;
pub mod model;
pub mod parser;
pub mod replay;
pub mod report;
pub mod results;
pub mod scoring;
pub mod selection;
pub mod session;
pub mod traits;
