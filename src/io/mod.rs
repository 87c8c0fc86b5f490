//! IO modules - side effects (network, filesystem)

pub mod archive;
pub mod fetch;
