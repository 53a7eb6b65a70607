//! Operator intents: what the person at the console asked for.
//!
//! Input adapters (the line console today, a gamepad or button panel
//! driver tomorrow) translate raw events into these values.  Everything
//! downstream of this module is input-device agnostic.

use camctl_core::protocol::MenuDirection;

use crate::application::control_panel::PanelKeyId;

/// Anything the operator can ask the console to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Camera(CameraIntent),
    Scene(SceneIntent),
    Matrix(MatrixIntent),
    /// A physical panel key went down (`pressed == true`) or up.
    Panel { key: PanelKeyId, pressed: bool },
}

/// Direction of a discrete (fixed-speed) move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
    Left,
    Right,
}

/// On-screen menu actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Open,
    Nav(MenuDirection),
    Enter,
    Back,
}

/// Intents addressed to the selected camera.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraIntent {
    /// Analog stick position, each axis in `[-1, 1]`.  Negative tilt is up.
    PanTilt { x: f64, y: f64 },
    /// Analog trigger positions, each in `[0, 1]`.
    Zoom { zoom_in: f64, zoom_out: f64 },
    /// Focus buttons held.  Both or neither held means stop.
    Focus { far: bool, near: bool },
    Move(MoveDirection),
    ZoomIn,
    ZoomOut,
    /// Stop both the pan/tilt drive and the zoom drive.
    Stop,
    FocusFar,
    FocusNear,
    FocusStop,
    FocusAuto,
    CallPreset(u32),
    SetPreset(u32),
    /// Recall the preset number shown in the preset selector.
    CallSelectedPreset,
    /// Store the current position under the preset selector's number.
    StoreSelectedPreset,
    /// Move the preset selector by this many steps, staying within range.
    StepPreset(i32),
    Menu(MenuAction),
    Power(bool),
    SelectCamera(usize),
    SelectPrevCamera,
    SelectNextCamera,
}

/// Intents addressed to the scene switcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneIntent {
    Prev,
    Next,
    Select(u8),
    /// Switch the scene switcher to the selected scene for the selected camera.
    Switch,
    ToggleStudioMode,
}

/// Intents addressed to the video matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixIntent {
    /// Route one configured input to one configured output, by list index.
    Switch {
        input_index: usize,
        output_index: usize,
    },
    Macro(String),
    Reset,
    Refresh,
}
