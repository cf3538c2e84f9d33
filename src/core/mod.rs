//! Core composition logic — types, capabilities, search, pipeline, composition.

pub mod capability;
pub mod composer;
pub mod parser;
pub mod pipeline;
pub mod search;
pub mod types;
