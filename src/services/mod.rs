//! Business logic services
//!
//! This module contains the LED control logic separated from HTTP concerns.
//! The dispatcher works on transport-neutral requests so it can be driven
//! by the HTTP server, by the lifecycle controller's pump or directly by tests.

pub mod command_table;
pub mod dispatcher;
pub mod documentation;
pub mod lifecycle;
pub mod provisioning;
pub mod state_cache;
