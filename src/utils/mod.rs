//! Utility modules shared by deployment and serving.

pub mod exec;
pub mod mime;
pub mod path;
