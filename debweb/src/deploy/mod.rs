//! Deployment lifecycle

pub mod fsm;
pub mod lock;
pub mod orchestrator;
pub mod prompt;
