//! Core modules - pure, stateless logic

pub mod config;
pub mod feed;
pub mod mask;
pub mod metadata;
