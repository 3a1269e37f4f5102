//! Interaction controller
//!
//! The single state machine that sequences capture -> backend request ->
//! playback, owns the `AssistantStatus`, and publishes every transition for
//! the presentation layer.

pub mod controller;

pub use controller::{
    AssistantStatus, ControllerCommand, ControllerEvent, ControllerHandle, InteractionController,
};
