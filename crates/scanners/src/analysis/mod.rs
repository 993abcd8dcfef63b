//! Shared analyses backing the flow-sensitive detectors.
//!
//! The classifier identifies asynchronous declarations and their owned
//! suspension sets, exit-point analysis decides which suspensions are
//! terminal, and the order index answers textual before/after queries.

pub mod classifier;
pub mod exit_points;
pub mod order;

pub use classifier::{
    classify, has_event_payload_param, has_state_object_param, has_suspended_iteration,
    trailing_disposal_names, AsyncFnInfo,
};
pub use exit_points::{terminal_sites, TerminalSite};
pub use order::OrderIndex;
