//! Provisioning components
//!
//! Each component is an ordered list of steps run through
//! [`crate::steps::StepRunner`]:
//! 1. Status page - web server plus a page of instance identity facts
//! 2. WordPress - Apache, PHP-FPM and a configured WordPress install

pub mod status_page;
pub mod wordpress;
