//! Isotree — declarative infrastructure tree composition.
//!
//! Classifies nodes by capability tag, harvests them from the tree in
//! pre-order, and attaches a mode-gated plugin pipeline to each composed app.

pub mod cli;
pub mod core;
