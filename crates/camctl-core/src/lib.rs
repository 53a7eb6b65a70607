//! # camctl-core
//!
//! Shared library for camctl containing the PTZ camera protocol codec, the
//! scene identifier scheme, video matrix routing logic and the control panel
//! key model.
//!
//! It has zero dependencies on OS APIs, sockets or the async runtime, so every
//! piece of it can be exercised from plain unit tests.
//!
//! # Architecture overview (for beginners)
//!
//! camctl is an operator console for a small video production setup.  An
//! operator drives PTZ (pan-tilt-zoom) cameras from a gamepad or a button
//! panel, picks scenes in a scene-switching tool, and routes sources through
//! an HDMI video matrix.
//!
//! - **`protocol`** – How camera commands look on the wire.  Every command is
//!   a short fixed-length byte buffer; cameras on the "strict" transport also
//!   need an 8-byte header carrying a sequence number.
//!
//! - **`domain`** – Per-camera speed and preset ranges plus the rules that
//!   turn analog controller input into camera speeds.
//!
//! - **`scene`** – Scene names such as `"3.2 Wide"` encode a `(major, minor)`
//!   identifier.  The directory keeps them ordered so the operator can step
//!   through scenes.
//!
//! - **`matrix`** – Cross-point mappings of the video matrix, the diff that
//!   turns a desired mapping into the smallest set of switch commands, and
//!   the rule table evaluated after every change.
//!
//! - **`panel`** – Button panel keys (simple, long-press, switch, tally,
//!   preset) as one tagged sum type.

pub mod domain;
pub mod matrix;
pub mod panel;
pub mod protocol;
pub mod scene;

pub use domain::camera::{CameraLimits, SpeedRange, SpeedRounding};
pub use matrix::{MatrixError, MatrixMapping, Port, SwitchCommand};
pub use protocol::{encode_command, CodecError, PtzCommand, ViscaVariant};
pub use scene::{parse_scene_id, SceneDirectory, SceneError, SceneId, SceneOverrides};
