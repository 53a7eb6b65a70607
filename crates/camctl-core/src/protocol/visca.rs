//! Encoder for VISCA PTZ camera commands.
//!
//! Every command is a short fixed-length buffer that starts with the camera
//! address byte `0x81` and ends with the terminator `0xFF`:
//! ```text
//! move       81 01 06 01 <pan> <tilt> <panDir> <tiltDir> FF
//! stop       81 01 06 01 01 01 03 03 FF
//! zoom       81 01 04 07 <2p|3p|00> FF
//! focus      81 01 04 08 <2p|3p|00> FF
//! focus mode 81 01 04 38 <02 auto|03 manual|10 toggle> FF
//! preset     81 01 04 3F <01 set|02 recall> <n> FF
//! power      81 01 04 00 <02 on|03 off> FF
//! menu       81 01 04 3F 02 5F FF
//! menu enter 81 01 06 06 05 FF
//! menu back  81 01 06 06 04 FF
//! ```
//! Direction bytes are `01` (negative: left/up), `02` (positive: right/down)
//! and `03` (axis not moving).  Speeds are clamped into the camera's declared
//! range; preset numbers outside the range are rejected.

use thiserror::Error;

use crate::domain::camera::CameraLimits;
use crate::protocol::framing::ViscaVariant;

const TERMINATOR: u8 = 0xFF;

const DIR_NEGATIVE: u8 = 0x01;
const DIR_POSITIVE: u8 = 0x02;
const DIR_NEUTRAL: u8 = 0x03;

/// Speed byte used on the idle axis of a single-axis move.
const IDLE_AXIS_SPEED: u8 = 0x01;

/// Speed used to step through the on-screen menu.
pub const MENU_NAV_SPEED: u8 = 0x0E;

const STOP: [u8; 9] = [0x81, 0x01, 0x06, 0x01, 0x01, 0x01, DIR_NEUTRAL, DIR_NEUTRAL, TERMINATOR];

/// Errors that prevent a command from being encoded.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("preset {preset} out of range {min}..={max}")]
    PresetOutOfRange { preset: u32, min: u8, max: u8 },
}

/// Direction for on-screen menu navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuDirection {
    Up,
    Down,
    Left,
    Right,
}

/// A camera command before encoding.
///
/// Speed arguments are raw values; the encoder clamps them.  `Move` takes
/// signed speeds where the sign selects the direction on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtzCommand {
    Move { pan: i32, tilt: i32 },
    Left(u32),
    Right(u32),
    Up(u32),
    Down(u32),
    Stop,
    ZoomIn(u32),
    ZoomOut(u32),
    ZoomStop,
    FocusFar(u32),
    FocusNear(u32),
    FocusStop,
    AutoFocus,
    ManualFocus,
    ToggleFocusMode,
    PresetSet(u32),
    PresetRecall(u32),
    PowerOn,
    PowerOff,
    MenuOpen,
    MenuNav(MenuDirection),
    MenuEnter,
    MenuBack,
}

impl PtzCommand {
    /// Short human-readable name used in status messages.
    pub fn label(&self) -> String {
        match self {
            Self::Move { pan, tilt } => format!("Move X={pan} Y={tilt}"),
            Self::Left(_) => "Left".into(),
            Self::Right(_) => "Right".into(),
            Self::Up(_) => "Up".into(),
            Self::Down(_) => "Down".into(),
            Self::Stop => "Move stop".into(),
            Self::ZoomIn(speed) => format!("Zoom in speed {speed}"),
            Self::ZoomOut(speed) => format!("Zoom out speed {speed}"),
            Self::ZoomStop => "Zoom stop".into(),
            Self::FocusFar(_) => "Focus far".into(),
            Self::FocusNear(_) => "Focus near".into(),
            Self::FocusStop => "Focus stop".into(),
            Self::AutoFocus => "Auto focus".into(),
            Self::ManualFocus => "Manual focus".into(),
            Self::ToggleFocusMode => "Toggle focus mode".into(),
            Self::PresetSet(n) => format!("Preset set {n}"),
            Self::PresetRecall(n) => format!("Preset call {n}"),
            Self::PowerOn => "Camera on".into(),
            Self::PowerOff => "Camera off".into(),
            Self::MenuOpen => "Menu".into(),
            Self::MenuNav(dir) => format!("Menu {dir:?}"),
            Self::MenuEnter => "Menu enter".into(),
            Self::MenuBack => "Menu back".into(),
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `cmd` into the payloads to transmit, in order.
///
/// Almost every command is a single payload.  Menu navigation on a strict
/// camera is a press frame followed by a release frame.
///
/// # Errors
///
/// Returns [`CodecError::PresetOutOfRange`] for preset numbers outside
/// `limits.preset`.  No bytes are produced in that case.
///
/// # Examples
///
/// ```rust
/// use camctl_core::{encode_command, CameraLimits, PtzCommand, ViscaVariant};
///
/// let payloads = encode_command(&PtzCommand::PowerOn, &CameraLimits::default(), ViscaVariant::Loose).unwrap();
/// assert_eq!(payloads, vec![vec![0x81, 0x01, 0x04, 0x00, 0x02, 0xFF]]);
/// ```
pub fn encode_command(
    cmd: &PtzCommand,
    limits: &CameraLimits,
    variant: ViscaVariant,
) -> Result<Vec<Vec<u8>>, CodecError> {
    match (cmd, variant) {
        (PtzCommand::MenuNav(direction), ViscaVariant::Strict) => {
            Ok(vec![encode_menu_drive(*direction), STOP.to_vec()])
        }
        _ => Ok(vec![encode_payload(cmd, limits)?]),
    }
}

/// Encodes `cmd` into one payload using the loose menu encoding.
///
/// # Errors
///
/// Returns [`CodecError::PresetOutOfRange`] for preset numbers outside
/// `limits.preset`.
pub fn encode_payload(cmd: &PtzCommand, limits: &CameraLimits) -> Result<Vec<u8>, CodecError> {
    let bytes = match *cmd {
        PtzCommand::Move { pan, tilt } => {
            let pan_speed = limits.pan.clamp(pan.unsigned_abs());
            let tilt_speed = limits.tilt.clamp(tilt.unsigned_abs());
            drive(pan_speed, tilt_speed, direction_byte(pan), direction_byte(tilt))
        }
        PtzCommand::Left(speed) => drive(
            limits.pan.clamp(speed),
            IDLE_AXIS_SPEED,
            DIR_NEGATIVE,
            DIR_NEUTRAL,
        ),
        PtzCommand::Right(speed) => drive(
            limits.pan.clamp(speed),
            IDLE_AXIS_SPEED,
            DIR_POSITIVE,
            DIR_NEUTRAL,
        ),
        PtzCommand::Up(speed) => drive(
            IDLE_AXIS_SPEED,
            limits.tilt.clamp(speed),
            DIR_NEUTRAL,
            DIR_NEGATIVE,
        ),
        PtzCommand::Down(speed) => drive(
            IDLE_AXIS_SPEED,
            limits.tilt.clamp(speed),
            DIR_NEUTRAL,
            DIR_POSITIVE,
        ),
        PtzCommand::Stop => STOP.to_vec(),
        PtzCommand::ZoomIn(speed) => vec![0x81, 0x01, 0x04, 0x07, 0x20 | nibble(limits.zoom.clamp(speed)), TERMINATOR],
        PtzCommand::ZoomOut(speed) => vec![0x81, 0x01, 0x04, 0x07, 0x30 | nibble(limits.zoom.clamp(speed)), TERMINATOR],
        PtzCommand::ZoomStop => vec![0x81, 0x01, 0x04, 0x07, 0x00, TERMINATOR],
        PtzCommand::FocusFar(speed) => vec![0x81, 0x01, 0x04, 0x08, 0x20 | nibble(limits.focus.clamp(speed)), TERMINATOR],
        PtzCommand::FocusNear(speed) => vec![0x81, 0x01, 0x04, 0x08, 0x30 | nibble(limits.focus.clamp(speed)), TERMINATOR],
        PtzCommand::FocusStop => vec![0x81, 0x01, 0x04, 0x08, 0x00, TERMINATOR],
        PtzCommand::AutoFocus => vec![0x81, 0x01, 0x04, 0x38, 0x02, TERMINATOR],
        PtzCommand::ManualFocus => vec![0x81, 0x01, 0x04, 0x38, 0x03, TERMINATOR],
        PtzCommand::ToggleFocusMode => vec![0x81, 0x01, 0x04, 0x38, 0x10, TERMINATOR],
        PtzCommand::PresetSet(preset) => preset_frame(0x01, preset, limits)?,
        PtzCommand::PresetRecall(preset) => preset_frame(0x02, preset, limits)?,
        PtzCommand::PowerOn => vec![0x81, 0x01, 0x04, 0x00, 0x02, TERMINATOR],
        PtzCommand::PowerOff => vec![0x81, 0x01, 0x04, 0x00, 0x03, TERMINATOR],
        PtzCommand::MenuOpen => vec![0x81, 0x01, 0x04, 0x3F, 0x02, 0x5F, TERMINATOR],
        PtzCommand::MenuNav(direction) => {
            let speed = u32::from(MENU_NAV_SPEED);
            let single_axis = match direction {
                MenuDirection::Up => PtzCommand::Up(speed),
                MenuDirection::Down => PtzCommand::Down(speed),
                MenuDirection::Left => PtzCommand::Left(speed),
                MenuDirection::Right => PtzCommand::Right(speed),
            };
            return encode_payload(&single_axis, limits);
        }
        PtzCommand::MenuEnter => vec![0x81, 0x01, 0x06, 0x06, 0x05, TERMINATOR],
        PtzCommand::MenuBack => vec![0x81, 0x01, 0x06, 0x06, 0x04, TERMINATOR],
    };
    Ok(bytes)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn drive(pan_speed: u8, tilt_speed: u8, pan_dir: u8, tilt_dir: u8) -> Vec<u8> {
    vec![
        0x81, 0x01, 0x06, 0x01, pan_speed, tilt_speed, pan_dir, tilt_dir, TERMINATOR,
    ]
}

/// Press frame for strict menu navigation: the drive opcode at the fixed menu
/// speed on both axes, unclamped.
fn encode_menu_drive(direction: MenuDirection) -> Vec<u8> {
    let (pan_dir, tilt_dir) = match direction {
        MenuDirection::Up => (DIR_NEUTRAL, DIR_NEGATIVE),
        MenuDirection::Down => (DIR_NEUTRAL, DIR_POSITIVE),
        MenuDirection::Left => (DIR_NEGATIVE, DIR_NEUTRAL),
        MenuDirection::Right => (DIR_POSITIVE, DIR_NEUTRAL),
    };
    drive(MENU_NAV_SPEED, MENU_NAV_SPEED, pan_dir, tilt_dir)
}

fn direction_byte(speed: i32) -> u8 {
    match speed.signum() {
        1 => DIR_POSITIVE,
        -1 => DIR_NEGATIVE,
        _ => DIR_NEUTRAL,
    }
}

/// Speed parameters share a byte with the direction nibble.
fn nibble(speed: u8) -> u8 {
    speed & 0x0F
}

fn preset_frame(action: u8, preset: u32, limits: &CameraLimits) -> Result<Vec<u8>, CodecError> {
    if !limits.preset.contains(preset) {
        return Err(CodecError::PresetOutOfRange {
            preset,
            min: limits.preset.min,
            max: limits.preset.max,
        });
    }
    Ok(vec![0x81, 0x01, 0x04, 0x3F, action, preset as u8, TERMINATOR])
}
