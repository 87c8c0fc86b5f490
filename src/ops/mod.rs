//! Package operations: build and install.

pub mod build;
pub mod error;
pub mod install;

pub use build::{BuildRequest, build_package};
pub use error::{BuildError, InstallError};
pub use install::{InstallRequest, install_package};
