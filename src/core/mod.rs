//! Core types shared across the codebase.

mod state;

pub use state::{
    DeployStatus, GateView, ReadinessGate, is_shutdown, register_server, setup_shutdown_handler,
};
