//! Application layer: use cases for the camctl console.
//!
//! Use cases depend only on traits (`CameraTransport`, `MatrixClient`) and
//! on the pure logic in `camctl-core`.  Sockets and HTTP live in
//! `infrastructure` and are injected at construction time.

pub mod camera_control;
pub mod command_scheduler;
pub mod console;
pub mod control_panel;
pub mod intent;
pub mod matrix_reconciler;
pub mod scene_switcher;
pub mod status;
