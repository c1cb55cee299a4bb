//! Host operations
//!
//! Each module handles one aspect of provisioning. The component routines
//! in [`crate::stages`] call them in order through the step runner.

pub mod archive;
pub mod diagnostics;
pub mod fpm_pool;
pub mod packages;
pub mod selinux;
pub mod services;
pub mod wp_config;
pub mod write_files;
