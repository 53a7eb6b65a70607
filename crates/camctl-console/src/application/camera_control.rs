//! CameraControl: turns camera intents into scheduled camera commands.
//!
//! Every configured camera is a [`CameraLink`] (limits, frame encoder and
//! transport).  All links share one [`CommandScheduler`] whose context is the
//! [`CameraSession`]: the selected camera, the latest analog controller
//! snapshot and the "already queued" flags used for coalescing.
//!
//! # Coalescing (for beginners)
//!
//! A gamepad stick produces dozens of updates per second but a camera can
//! only digest a command every few hundred milliseconds.  Analog intents
//! therefore only update [`ControllerSnapshot`] and queue *one* thunk of
//! their kind.  The thunk reads the snapshot when it finally runs, so the
//! camera always receives the latest position, and returns `false` when the
//! resulting command equals the last one sent to that camera.
//!
//! Thunks address the camera that is selected when they run, not when they
//! were queued.  Startup power-on is the exception: it names its camera.

use std::time::Duration;

use camctl_core::domain::camera::{stick_speed, zoom_speed, DriveDirection};
use camctl_core::protocol::{encode_command, CodecError, FrameEncoder, MenuDirection, PtzCommand};
use camctl_core::{CameraLimits, SpeedRounding, ViscaVariant};
use thiserror::Error;
use tracing::debug;

use crate::application::command_scheduler::{CommandScheduler, DispatchError, FollowUps};
use crate::application::intent::{CameraIntent, MenuAction, MoveDirection};
use crate::application::status::StatusReporter;

/// Speed of the fixed-speed moves triggered by panel buttons.
const DISCRETE_MOVE_SPEED: u32 = 7;

/// Speed of the fixed-speed zoom triggered by panel buttons.
const DISCRETE_ZOOM_SPEED: u32 = 0;

// ── Transport seam ────────────────────────────────────────────────────────────

/// Error type for camera transports.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send failed: {0}")]
    Send(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw datagram sink for one camera.
///
/// Must not block: the scheduler runs thunks on the event loop.  The UDP
/// implementation uses `try_send_to`; tests record frames.
pub trait CameraTransport: Send {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;
}

/// Failure to put a command on the wire.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

// ── Per-camera state ──────────────────────────────────────────────────────────

/// What was last sent to one camera, used to suppress redundant re-sends.
///
/// Direction values are `1` (in/far), `-1` (out/near) and `0` (stopped).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraTransportState {
    pub prev_zoom_value: Option<i8>,
    pub prev_zoom_speed: Option<u32>,
    pub prev_focus_value: Option<i8>,
    pub prev_pan_tilt: Option<(i32, i32)>,
    pub is_manual_focus: bool,
    pub is_moving: bool,
}

impl CameraTransportState {
    /// Updates the state after `cmd` was transmitted.
    fn record(&mut self, cmd: &PtzCommand) {
        match *cmd {
            PtzCommand::Move { pan, tilt } => {
                self.prev_pan_tilt = Some((pan, tilt));
                self.is_moving = pan != 0 || tilt != 0;
            }
            PtzCommand::Left(_) | PtzCommand::Right(_) | PtzCommand::Up(_) | PtzCommand::Down(_) => {
                self.prev_pan_tilt = None;
                self.is_moving = true;
            }
            PtzCommand::Stop => {
                self.prev_pan_tilt = Some((0, 0));
                self.is_moving = false;
            }
            PtzCommand::ZoomIn(speed) => {
                self.prev_zoom_value = Some(1);
                self.prev_zoom_speed = Some(speed);
            }
            PtzCommand::ZoomOut(speed) => {
                self.prev_zoom_value = Some(-1);
                self.prev_zoom_speed = Some(speed);
            }
            PtzCommand::ZoomStop => {
                self.prev_zoom_value = Some(0);
                self.prev_zoom_speed = None;
            }
            PtzCommand::FocusFar(_) => self.prev_focus_value = Some(1),
            PtzCommand::FocusNear(_) => self.prev_focus_value = Some(-1),
            PtzCommand::FocusStop => self.prev_focus_value = Some(0),
            PtzCommand::AutoFocus => self.is_manual_focus = false,
            PtzCommand::ManualFocus => self.is_manual_focus = true,
            PtzCommand::ToggleFocusMode => self.is_manual_focus = !self.is_manual_focus,
            _ => {}
        }
    }

    /// Updates the state after frame `part` of a `parts`-frame command went out.
    fn record_part(&mut self, cmd: &PtzCommand, part: usize, parts: usize) {
        match cmd {
            // Strict menu navigation: a drive press, then a stop.
            PtzCommand::MenuNav(_) if parts > 1 => {
                if part == 0 {
                    self.prev_pan_tilt = None;
                    self.is_moving = true;
                } else if part + 1 == parts {
                    self.record(&PtzCommand::Stop);
                }
            }
            _ if part + 1 == parts => self.record(cmd),
            _ => {}
        }
    }

    /// Whether a zoom drive `(value, speed)` repeats the last one sent.
    fn zoom_unchanged(&self, value: i8, speed: u32) -> bool {
        self.prev_zoom_value == Some(value) && (value == 0 || self.prev_zoom_speed == Some(speed))
    }
}

/// One configured camera: its limits, framing and transport.
pub struct CameraLink {
    id: u8,
    limits: CameraLimits,
    encoder: FrameEncoder,
    transport: Box<dyn CameraTransport>,
    state: CameraTransportState,
}

impl CameraLink {
    pub fn new(
        id: u8,
        limits: CameraLimits,
        variant: ViscaVariant,
        transport: Box<dyn CameraTransport>,
    ) -> Self {
        Self {
            id,
            limits,
            encoder: FrameEncoder::new(variant),
            transport,
            state: CameraTransportState::default(),
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn limits(&self) -> &CameraLimits {
        &self.limits
    }

    pub fn variant(&self) -> ViscaVariant {
        self.encoder.variant()
    }

    pub fn state(&self) -> &CameraTransportState {
        &self.state
    }

    /// Number of frames `cmd` occupies on this camera.
    pub fn frame_count(&self, cmd: &PtzCommand) -> usize {
        match (cmd, self.variant()) {
            (PtzCommand::MenuNav(_), ViscaVariant::Strict) => 2,
            _ => 1,
        }
    }

    /// Encodes and transmits every frame of `cmd`.
    ///
    /// Encoding happens before anything is wrapped, so a rejected command
    /// never consumes a sequence number.
    pub fn send(&mut self, cmd: &PtzCommand) -> Result<(), LinkError> {
        let payloads = encode_command(cmd, &self.limits, self.variant())?;
        for (part, payload) in payloads.iter().enumerate() {
            self.transmit(payload)?;
            self.state.record_part(cmd, part, payloads.len());
        }
        Ok(())
    }

    /// Transmits only frame `part` of `cmd`.  Returns `false` when `cmd` has
    /// no such frame on this camera.
    pub fn send_part(&mut self, cmd: &PtzCommand, part: usize) -> Result<bool, LinkError> {
        let payloads = encode_command(cmd, &self.limits, self.variant())?;
        let Some(payload) = payloads.get(part) else {
            return Ok(false);
        };
        self.transmit(payload)?;
        self.state.record_part(cmd, part, payloads.len());
        Ok(true)
    }

    fn transmit(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let frame = self.encoder.wrap(payload);
        debug!(camera = self.id, bytes = ?frame, "camera frame");
        self.transport.send(&frame)
    }
}

impl std::fmt::Debug for CameraLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraLink")
            .field("id", &self.id)
            .field("variant", &self.variant())
            .field("state", &self.state)
            .finish()
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

/// Latest analog controller readings.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerSnapshot {
    pub pan_axis: f64,
    pub tilt_axis: f64,
    pub zoom_in: f64,
    pub zoom_out: f64,
    pub focus_far: bool,
    pub focus_near: bool,
}

/// "A thunk of this kind is already queued" flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingFlags {
    pub zoom: bool,
    pub focus: bool,
    pub manual_focus: bool,
    pub ptz: bool,
    pub auto_focus: bool,
    pub call_preset: bool,
    pub set_preset: bool,
}

/// State shared by every camera thunk.
#[derive(Debug)]
pub struct CameraSession {
    cameras: Vec<CameraLink>,
    selected: usize,
    last_commanded: Option<usize>,
    controller: ControllerSnapshot,
    pending: PendingFlags,
    preset_number: u32,
    rounding: SpeedRounding,
    status: StatusReporter,
}

impl CameraSession {
    pub fn cameras(&self) -> &[CameraLink] {
        &self.cameras
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn controller(&self) -> &ControllerSnapshot {
        &self.controller
    }

    pub fn pending(&self) -> &PendingFlags {
        &self.pending
    }

    pub fn preset_number(&self) -> u32 {
        self.preset_number
    }

    fn selected_link(&self) -> &CameraLink {
        &self.cameras[self.selected]
    }

    /// Sends `cmd` to camera `index`.
    ///
    /// Codec rejections are reported and count as "nothing sent".
    /// Transport failures are reported and propagated.
    fn send_to(&mut self, index: usize, cmd: &PtzCommand) -> Result<bool, DispatchError> {
        let Some(link) = self.cameras.get_mut(index) else {
            return Ok(false);
        };
        let id = link.id();
        match link.send(cmd) {
            Ok(()) => {
                self.last_commanded = Some(index);
                self.status.info(format!("Camera {id}: {}", cmd.label()));
                Ok(true)
            }
            Err(LinkError::Codec(e)) => {
                self.status.error(format!("Camera {id}: {e}"));
                Ok(false)
            }
            Err(LinkError::Transport(e)) => {
                self.status.error(format!("Camera {id}: {e}"));
                Err(e.into())
            }
        }
    }

    fn send(&mut self, cmd: &PtzCommand) -> Result<bool, DispatchError> {
        self.send_to(self.selected, cmd)
    }

    /// Sends frame `part` of `cmd` to camera `index`.
    fn send_part_to(
        &mut self,
        index: usize,
        cmd: &PtzCommand,
        part: usize,
    ) -> Result<bool, DispatchError> {
        let Some(link) = self.cameras.get_mut(index) else {
            return Ok(false);
        };
        let id = link.id();
        match link.send_part(cmd, part) {
            Ok(sent) => {
                if sent {
                    self.last_commanded = Some(index);
                    if part == 0 {
                        self.status.info(format!("Camera {id}: {}", cmd.label()));
                    }
                }
                Ok(sent)
            }
            Err(LinkError::Codec(e)) => {
                self.status.error(format!("Camera {id}: {e}"));
                Ok(false)
            }
            Err(LinkError::Transport(e)) => {
                self.status.error(format!("Camera {id}: {e}"));
                Err(e.into())
            }
        }
    }

    fn is_last_commanded(&self) -> bool {
        self.last_commanded == Some(self.selected)
    }

    fn clamp_preset_number(&mut self) {
        let range = self.selected_link().limits().preset;
        self.preset_number = u32::from(range.clamp(self.preset_number));
    }
}

// ── Thunks ────────────────────────────────────────────────────────────────────

type Follow = FollowUps<CameraSession>;

fn ptz_thunk(session: &mut CameraSession, follow_ups: &mut Follow) -> Result<bool, DispatchError> {
    session.pending.ptz = false;
    let limits = *session.selected_link().limits();
    let pan = stick_speed(session.controller.pan_axis, limits.pan);
    let tilt = stick_speed(session.controller.tilt_axis, limits.tilt);
    let state = session.selected_link().state();

    if pan == 0 && tilt == 0 {
        if !state.is_moving {
            return Ok(false);
        }
        return session.send(&PtzCommand::Stop);
    }

    if session.is_last_commanded() && state.prev_pan_tilt == Some((pan, tilt)) {
        return Ok(false);
    }
    if !session.pending.auto_focus {
        session.pending.auto_focus = true;
        follow_ups.push(auto_focus_after_move_thunk);
    }
    session.send(&PtzCommand::Move { pan, tilt })
}

/// Leaves manual focus once the camera starts moving.
fn auto_focus_after_move_thunk(
    session: &mut CameraSession,
    _: &mut Follow,
) -> Result<bool, DispatchError> {
    session.pending.auto_focus = false;
    if !session.selected_link().state().is_manual_focus {
        return Ok(false);
    }
    session.send(&PtzCommand::AutoFocus)
}

fn zoom_thunk(session: &mut CameraSession, _: &mut Follow) -> Result<bool, DispatchError> {
    session.pending.zoom = false;
    let range = session.selected_link().limits().zoom;
    let value = session.controller.zoom_in - session.controller.zoom_out;
    let (direction, speed) = zoom_speed(value, range, session.rounding);
    let speed = u32::from(speed);
    let (drive, cmd) = match direction {
        DriveDirection::Positive => (1, PtzCommand::ZoomIn(speed)),
        DriveDirection::Negative => (-1, PtzCommand::ZoomOut(speed)),
        DriveDirection::Stopped => (0, PtzCommand::ZoomStop),
    };
    if session.is_last_commanded() && session.selected_link().state().zoom_unchanged(drive, speed) {
        return Ok(false);
    }
    session.send(&cmd)
}

fn manual_focus_thunk(session: &mut CameraSession, _: &mut Follow) -> Result<bool, DispatchError> {
    session.pending.manual_focus = false;
    session.send(&PtzCommand::ManualFocus)
}

fn focus_thunk(session: &mut CameraSession, _: &mut Follow) -> Result<bool, DispatchError> {
    session.pending.focus = false;
    let mut far = session.controller.focus_far;
    let mut near = session.controller.focus_near;
    if far == near {
        far = false;
        near = false;
    }
    let speed = u32::from(session.selected_link().limits().focus.min);
    let (value, cmd) = if far {
        (1, PtzCommand::FocusFar(speed))
    } else if near {
        (-1, PtzCommand::FocusNear(speed))
    } else {
        (0, PtzCommand::FocusStop)
    };
    if session.is_last_commanded() && session.selected_link().state().prev_focus_value == Some(value) {
        return Ok(false);
    }
    session.send(&cmd)
}

/// Strict cameras ignore a preset recall while moving.
fn stop_if_moving_thunk(session: &mut CameraSession, _: &mut Follow) -> Result<bool, DispatchError> {
    if !session.selected_link().state().is_moving {
        return Ok(false);
    }
    session.send(&PtzCommand::Stop)
}

// ── Use case ──────────────────────────────────────────────────────────────────

/// Camera intent handler owning the shared camera scheduler.
#[derive(Debug)]
pub struct CameraControl {
    scheduler: CommandScheduler<CameraSession>,
}

impl CameraControl {
    pub fn new(
        cameras: Vec<CameraLink>,
        rounding: SpeedRounding,
        timeout: Duration,
        status: StatusReporter,
    ) -> Self {
        let preset_number = cameras
            .first()
            .map(|c| u32::from(c.limits().preset.min))
            .unwrap_or(0);
        let session = CameraSession {
            cameras,
            selected: 0,
            last_commanded: None,
            controller: ControllerSnapshot::default(),
            pending: PendingFlags::default(),
            preset_number,
            rounding,
            status,
        };
        Self {
            scheduler: CommandScheduler::new(session, timeout),
        }
    }

    pub fn session(&self) -> &CameraSession {
        self.scheduler.context()
    }

    pub fn camera_count(&self) -> usize {
        self.session().cameras.len()
    }

    /// Index of the selected camera, `None` when no camera is configured.
    pub fn selected_index(&self) -> Option<usize> {
        (self.camera_count() > 0).then(|| self.session().selected)
    }

    pub fn selected_camera_id(&self) -> Option<u8> {
        self.selected_index().map(|i| self.session().cameras[i].id())
    }

    pub fn selected_limits(&self) -> Option<CameraLimits> {
        self.selected_index().map(|i| *self.session().cameras[i].limits())
    }

    pub fn deadline(&self) -> Option<tokio::time::Instant> {
        self.scheduler.deadline()
    }

    pub fn timeout(&self) -> Duration {
        self.scheduler.timeout()
    }

    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn on_timeout(&mut self) {
        self.scheduler.on_timeout();
    }

    /// Any camera answered.
    pub fn on_liveness_signal(&mut self) {
        self.scheduler.on_liveness_signal();
    }

    /// Drops every queued camera command.
    ///
    /// The "already queued" flags go with them, so the next analog intent
    /// queues a fresh thunk.
    pub fn clear(&mut self) {
        self.scheduler.clear();
        self.scheduler.context_mut().pending = PendingFlags::default();
    }

    /// Queues a power-on for every camera, in configuration order.
    pub fn startup(&mut self) {
        for index in 0..self.camera_count() {
            self.scheduler
                .enqueue(move |session: &mut CameraSession, _: &mut Follow| {
                    session.send_to(index, &PtzCommand::PowerOn)
                });
        }
    }

    /// Powers every camera off immediately, bypassing the queue.
    pub fn power_off_all(&mut self) {
        let session = self.scheduler.context_mut();
        for index in 0..session.cameras.len() {
            // Failures are already reported; keep going with the other cameras.
            let _ = session.send_to(index, &PtzCommand::PowerOff);
        }
    }

    /// Handles one camera intent.  A no-op when no camera is configured.
    pub fn handle(&mut self, intent: CameraIntent) {
        if self.camera_count() == 0 {
            debug!(?intent, "no cameras configured; ignoring intent");
            return;
        }

        match intent {
            CameraIntent::PanTilt { x, y } => {
                let session = self.scheduler.context_mut();
                session.controller.pan_axis = x;
                session.controller.tilt_axis = y;
                if !session.pending.ptz {
                    session.pending.ptz = true;
                    self.scheduler.enqueue(ptz_thunk);
                }
            }
            CameraIntent::Zoom { zoom_in, zoom_out } => {
                let session = self.scheduler.context_mut();
                session.controller.zoom_in = zoom_in;
                session.controller.zoom_out = zoom_out;
                if !session.pending.zoom {
                    session.pending.zoom = true;
                    self.scheduler.enqueue(zoom_thunk);
                }
            }
            CameraIntent::Focus { far, near } => {
                let session = self.scheduler.context_mut();
                session.controller.focus_far = far;
                session.controller.focus_near = near;
                let queue_manual = !session.pending.manual_focus;
                let queue_focus = !session.pending.focus;
                session.pending.manual_focus = true;
                session.pending.focus = true;
                if queue_manual {
                    self.scheduler.enqueue(manual_focus_thunk);
                }
                if queue_focus {
                    self.scheduler.enqueue(focus_thunk);
                }
            }
            CameraIntent::Move(direction) => {
                let cmd = match direction {
                    MoveDirection::Up => PtzCommand::Up(DISCRETE_MOVE_SPEED),
                    MoveDirection::Down => PtzCommand::Down(DISCRETE_MOVE_SPEED),
                    MoveDirection::Left => PtzCommand::Left(DISCRETE_MOVE_SPEED),
                    MoveDirection::Right => PtzCommand::Right(DISCRETE_MOVE_SPEED),
                };
                self.enqueue_command(cmd);
            }
            CameraIntent::ZoomIn => self.enqueue_command(PtzCommand::ZoomIn(DISCRETE_ZOOM_SPEED)),
            CameraIntent::ZoomOut => self.enqueue_command(PtzCommand::ZoomOut(DISCRETE_ZOOM_SPEED)),
            CameraIntent::Stop => {
                self.enqueue_command(PtzCommand::Stop);
                self.enqueue_command(PtzCommand::ZoomStop);
            }
            CameraIntent::FocusFar => {
                let speed = self.min_focus_speed();
                self.enqueue_command(PtzCommand::ManualFocus);
                self.enqueue_command(PtzCommand::FocusFar(speed));
            }
            CameraIntent::FocusNear => {
                let speed = self.min_focus_speed();
                self.enqueue_command(PtzCommand::ManualFocus);
                self.enqueue_command(PtzCommand::FocusNear(speed));
            }
            CameraIntent::FocusStop => self.enqueue_command(PtzCommand::FocusStop),
            CameraIntent::FocusAuto => self.enqueue_command(PtzCommand::AutoFocus),
            CameraIntent::CallPreset(number) => self.call_preset(number),
            CameraIntent::SetPreset(number) => self.enqueue_command(PtzCommand::PresetSet(number)),
            CameraIntent::CallSelectedPreset => {
                let session = self.scheduler.context_mut();
                if !session.pending.call_preset {
                    session.pending.call_preset = true;
                    self.scheduler
                        .enqueue(|session: &mut CameraSession, _: &mut Follow| {
                            session.pending.call_preset = false;
                            let number = session.preset_number;
                            session.send(&PtzCommand::PresetRecall(number))
                        });
                }
            }
            CameraIntent::StoreSelectedPreset => {
                let session = self.scheduler.context_mut();
                if !session.pending.set_preset {
                    session.pending.set_preset = true;
                    self.scheduler
                        .enqueue(|session: &mut CameraSession, _: &mut Follow| {
                            session.pending.set_preset = false;
                            let number = session.preset_number;
                            session.send(&PtzCommand::PresetSet(number))
                        });
                }
            }
            CameraIntent::StepPreset(delta) => self.step_preset(delta),
            CameraIntent::Menu(action) => match action {
                MenuAction::Open => self.enqueue_command(PtzCommand::MenuOpen),
                MenuAction::Nav(direction) => self.menu_nav(direction),
                MenuAction::Enter => self.enqueue_command(PtzCommand::MenuEnter),
                MenuAction::Back => self.enqueue_command(PtzCommand::MenuBack),
            },
            CameraIntent::Power(true) => self.enqueue_command(PtzCommand::PowerOn),
            CameraIntent::Power(false) => self.enqueue_command(PtzCommand::PowerOff),
            CameraIntent::SelectCamera(index) => self.select(index),
            CameraIntent::SelectPrevCamera => {
                let selected = self.session().selected;
                if selected > 0 {
                    self.select(selected - 1);
                }
            }
            CameraIntent::SelectNextCamera => {
                let selected = self.session().selected;
                if selected + 1 < self.camera_count() {
                    self.select(selected + 1);
                }
            }
        }
    }

    fn enqueue_command(&mut self, cmd: PtzCommand) {
        self.scheduler
            .enqueue(move |session: &mut CameraSession, _: &mut Follow| session.send(&cmd));
    }

    fn min_focus_speed(&self) -> u32 {
        u32::from(self.session().selected_link().limits().focus.min)
    }

    fn call_preset(&mut self, number: u32) {
        if self.session().selected_link().variant() == ViscaVariant::Strict {
            self.scheduler.enqueue(stop_if_moving_thunk);
        }
        self.enqueue_command(PtzCommand::PresetRecall(number));
    }

    /// Queues every frame of a menu move for the camera selected now, so a
    /// press and its release always reach the same camera.
    fn menu_nav(&mut self, direction: MenuDirection) {
        let cmd = PtzCommand::MenuNav(direction);
        let index = self.session().selected;
        let frames = self.session().selected_link().frame_count(&cmd);
        for part in 0..frames {
            self.scheduler
                .enqueue(move |session: &mut CameraSession, _: &mut Follow| {
                    session.send_part_to(index, &cmd, part)
                });
        }
    }

    /// Moves the preset selector by `delta`, only if the result stays within
    /// the selected camera's preset range.
    fn step_preset(&mut self, delta: i32) {
        let session = self.scheduler.context_mut();
        let range = session.selected_link().limits().preset;
        let target = i64::from(session.preset_number) + i64::from(delta);
        if target < i64::from(range.min) || target > i64::from(range.max) {
            return;
        }
        session.preset_number = target as u32;
        session.status.info(format!("Preset {target}"));
    }

    fn select(&mut self, index: usize) {
        let session = self.scheduler.context_mut();
        let Some(link) = session.cameras.get(index) else {
            session
                .status
                .error(format!("Camera index {index} is not configured"));
            return;
        };
        let id = link.id();
        session.selected = index;
        session.clamp_preset_number();
        session.status.info(format!("Camera {id} selected"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::command_scheduler::DEFAULT_COMMAND_TIMEOUT;
    use crate::application::status::{Severity, StatusMessage};
    use camctl_core::SpeedRange;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc::UnboundedReceiver;

    // ── Test doubles ──────────────────────────────────────────────────────────

    #[derive(Clone, Default)]
    struct RecordingTransport {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
        should_fail: bool,
    }

    impl RecordingTransport {
        fn frames(&self) -> Vec<Vec<u8>> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl CameraTransport for RecordingTransport {
        fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
            if self.should_fail {
                return Err(TransportError::Send("injected failure".to_string()));
            }
            self.frames.lock().unwrap().push(frame.to_vec());
            Ok(())
        }
    }

    fn control_with(
        variants: &[ViscaVariant],
    ) -> (CameraControl, Vec<RecordingTransport>, UnboundedReceiver<StatusMessage>) {
        let (status, rx) = StatusReporter::channel();
        let transports: Vec<RecordingTransport> =
            variants.iter().map(|_| RecordingTransport::default()).collect();
        let links = variants
            .iter()
            .zip(&transports)
            .enumerate()
            .map(|(i, (variant, t))| {
                CameraLink::new(i as u8 + 1, CameraLimits::default(), *variant, Box::new(t.clone()))
            })
            .collect();
        let control = CameraControl::new(links, SpeedRounding::Truncate, DEFAULT_COMMAND_TIMEOUT, status);
        (control, transports, rx)
    }

    fn loose_control() -> (CameraControl, RecordingTransport, UnboundedReceiver<StatusMessage>) {
        let (control, mut transports, rx) = control_with(&[ViscaVariant::Loose]);
        (control, transports.remove(0), rx)
    }

    fn drain_statuses(rx: &mut UnboundedReceiver<StatusMessage>) -> Vec<StatusMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    // ── Analog intents ────────────────────────────────────────────────────────

    #[test]
    fn test_stick_move_sends_move_frame_with_mapped_speeds() {
        // Arrange
        let (mut control, transport, _rx) = loose_control();

        // Act – full right, half up
        control.handle(CameraIntent::PanTilt { x: 1.0, y: -0.5 });

        // Assert – pan span 24 -> 24, tilt span 20 * -0.5 -> -10
        assert_eq!(
            transport.frames(),
            vec![vec![0x81, 0x01, 0x06, 0x01, 0x18, 0x0A, 0x02, 0x01, 0xFF]]
        );
        assert!(control.session().selected_link().state().is_moving);
    }

    #[test]
    fn test_stick_updates_coalesce_into_one_thunk_reading_latest_snapshot() {
        // Arrange – first move puts a command in flight
        let (mut control, transport, _rx) = loose_control();
        control.handle(CameraIntent::PanTilt { x: 1.0, y: 0.0 });

        // Act – three more updates arrive before the timeout
        control.handle(CameraIntent::PanTilt { x: 0.5, y: 0.0 });
        control.handle(CameraIntent::PanTilt { x: 0.25, y: 0.0 });
        control.handle(CameraIntent::PanTilt { x: -1.0, y: 0.0 });
        control.on_timeout();

        // Assert – the auto focus follow-up collapsed, one move with the last value
        let frames = transport.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], vec![0x81, 0x01, 0x06, 0x01, 0x18, 0x01, 0x01, 0x03, 0xFF]);
    }

    #[test]
    fn test_repeated_stick_position_is_suppressed() {
        // Arrange
        let (mut control, transport, _rx) = loose_control();
        control.handle(CameraIntent::PanTilt { x: 0.5, y: 0.0 });
        control.on_timeout();

        // Act
        control.handle(CameraIntent::PanTilt { x: 0.5, y: 0.0 });

        // Assert
        assert_eq!(transport.frames().len(), 1);
        assert!(control.deadline().is_none());
    }

    #[test]
    fn test_stick_release_sends_stop_only_when_moving() {
        // Arrange
        let (mut control, transport, _rx) = loose_control();

        // Act – centre while idle sends nothing
        control.handle(CameraIntent::PanTilt { x: 0.0, y: 0.0 });
        assert!(transport.frames().is_empty());

        control.handle(CameraIntent::PanTilt { x: 0.3, y: 0.0 });
        control.on_timeout();
        control.handle(CameraIntent::PanTilt { x: 0.0, y: 0.0 });

        // Assert
        let frames = transport.frames();
        assert_eq!(
            frames.last().unwrap(),
            &vec![0x81, 0x01, 0x06, 0x01, 0x01, 0x01, 0x03, 0x03, 0xFF]
        );
        assert!(!control.session().selected_link().state().is_moving);
    }

    #[test]
    fn test_move_in_manual_focus_queues_auto_focus_follow_up() {
        // Arrange
        let (mut control, transport, _rx) = loose_control();
        control.handle(CameraIntent::FocusFar);
        control.on_timeout();
        control.on_timeout();
        assert!(control.session().selected_link().state().is_manual_focus);

        // Act
        control.handle(CameraIntent::PanTilt { x: 0.5, y: 0.0 });
        control.on_timeout();

        // Assert
        let frames = transport.frames();
        assert_eq!(frames.last().unwrap(), &vec![0x81, 0x01, 0x04, 0x38, 0x02, 0xFF]);
        assert!(!control.session().selected_link().state().is_manual_focus);
    }

    #[test]
    fn test_zoom_trigger_uses_rounding_policy_and_suppresses_duplicates() {
        // Arrange
        let (mut control, transport, _rx) = loose_control();

        // Act – 0.5 * (8 - 1) = 3.5 -> 3
        control.handle(CameraIntent::Zoom { zoom_in: 0.5, zoom_out: 0.0 });
        control.on_timeout();
        control.handle(CameraIntent::Zoom { zoom_in: 0.5, zoom_out: 0.0 });

        // Assert
        assert_eq!(transport.frames(), vec![vec![0x81, 0x01, 0x04, 0x07, 0x23, 0xFF]]);
    }

    #[test]
    fn test_zoom_out_past_full_scale_clamps_to_max() {
        let (mut control, transport, _rx) = loose_control();
        control.handle(CameraIntent::Zoom { zoom_in: 0.0, zoom_out: 1.5 });
        assert_eq!(transport.frames(), vec![vec![0x81, 0x01, 0x04, 0x07, 0x37, 0xFF]]);
    }

    #[test]
    fn test_focus_intent_sends_manual_focus_then_focus_at_min_speed() {
        // Arrange
        let (mut control, transport, _rx) = loose_control();

        // Act
        control.handle(CameraIntent::Focus { far: true, near: false });
        control.on_timeout();

        // Assert
        assert_eq!(
            transport.frames(),
            vec![
                vec![0x81, 0x01, 0x04, 0x38, 0x03, 0xFF],
                vec![0x81, 0x01, 0x04, 0x08, 0x20, 0xFF],
            ]
        );
    }

    #[test]
    fn test_focus_both_buttons_means_stop() {
        let (mut control, transport, _rx) = loose_control();
        control.handle(CameraIntent::Focus { far: true, near: true });
        control.on_timeout();
        assert_eq!(transport.frames()[1], vec![0x81, 0x01, 0x04, 0x08, 0x00, 0xFF]);
    }

    // ── Discrete intents ──────────────────────────────────────────────────────

    #[test]
    fn test_stop_sends_move_stop_then_zoom_stop() {
        // Arrange
        let (mut control, transport, _rx) = loose_control();

        // Act
        control.handle(CameraIntent::Stop);
        control.on_timeout();

        // Assert
        assert_eq!(
            transport.frames(),
            vec![
                vec![0x81, 0x01, 0x06, 0x01, 0x01, 0x01, 0x03, 0x03, 0xFF],
                vec![0x81, 0x01, 0x04, 0x07, 0x00, 0xFF],
            ]
        );
    }

    #[test]
    fn test_discrete_up_uses_fixed_speed() {
        let (mut control, transport, _rx) = loose_control();
        control.handle(CameraIntent::Move(MoveDirection::Up));
        assert_eq!(
            transport.frames(),
            vec![vec![0x81, 0x01, 0x06, 0x01, 0x01, 0x07, 0x03, 0x01, 0xFF]]
        );
    }

    #[test]
    fn test_preset_out_of_range_is_rejected_with_status() {
        // Arrange
        let (mut control, transport, mut rx) = loose_control();

        // Act
        control.handle(CameraIntent::CallPreset(300));

        // Assert
        assert!(transport.frames().is_empty());
        assert!(control.deadline().is_none());
        let statuses = drain_statuses(&mut rx);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].severity, Severity::Error);
    }

    #[test]
    fn test_preset_in_range_sends_exactly_one_frame() {
        let (mut control, transport, _rx) = loose_control();
        control.handle(CameraIntent::CallPreset(4));
        control.on_timeout();
        assert_eq!(transport.frames(), vec![vec![0x81, 0x01, 0x04, 0x3F, 0x02, 0x04, 0xFF]]);
    }

    #[test]
    fn test_strict_preset_call_stops_moving_camera_first() {
        // Arrange
        let (mut control, transports, _rx) = control_with(&[ViscaVariant::Strict]);
        control.handle(CameraIntent::PanTilt { x: 0.5, y: 0.0 });
        control.on_timeout();
        control.on_timeout();

        // Act
        control.handle(CameraIntent::CallPreset(2));
        control.on_timeout();

        // Assert – move, stop, recall; sequence numbers 1, 2, 3
        let frames = transports[0].frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[1][8..], &[0x81, 0x01, 0x06, 0x01, 0x01, 0x01, 0x03, 0x03, 0xFF]);
        assert_eq!(&frames[2][4..8], &[0, 0, 0, 3]);
    }

    #[test]
    fn test_strict_preset_call_on_still_camera_skips_stop() {
        let (mut control, transports, _rx) = control_with(&[ViscaVariant::Strict]);
        control.handle(CameraIntent::CallPreset(2));
        let frames = transports[0].frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][4..8], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_strict_menu_nav_sends_press_then_release_as_two_commands() {
        // Arrange
        let (mut control, transports, _rx) = control_with(&[ViscaVariant::Strict]);

        // Act
        control.handle(CameraIntent::Menu(MenuAction::Nav(MenuDirection::Down)));

        // Assert – release waits for the next slot
        assert_eq!(transports[0].frames().len(), 1);
        control.on_timeout();
        let frames = transports[0].frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[1][4..8], &[0, 0, 0, 2]);
        assert_eq!(&frames[1][8..], &[0x81, 0x01, 0x06, 0x01, 0x01, 0x01, 0x03, 0x03, 0xFF]);
    }

    #[test]
    fn test_menu_release_follows_press_after_camera_switch() {
        // Arrange
        let (mut control, transports, _rx) =
            control_with(&[ViscaVariant::Strict, ViscaVariant::Loose]);

        // Act: switch cameras while the release is still queued.
        control.handle(CameraIntent::Menu(MenuAction::Nav(MenuDirection::Right)));
        control.handle(CameraIntent::SelectCamera(1));
        control.on_timeout();
        control.on_timeout();

        // Assert
        let frames = transports[0].frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][8..], &[0x81, 0x01, 0x06, 0x01, 0x0E, 0x0E, 0x02, 0x03, 0xFF]);
        assert_eq!(&frames[1][8..], &[0x81, 0x01, 0x06, 0x01, 0x01, 0x01, 0x03, 0x03, 0xFF]);
        assert!(transports[1].frames().is_empty());
        assert!(!control.session().cameras()[0].state().is_moving);
    }

    #[test]
    fn test_menu_press_marks_camera_moving_until_release() {
        // Arrange
        let (mut control, _transports, _rx) = control_with(&[ViscaVariant::Strict]);

        // Act
        control.handle(CameraIntent::Menu(MenuAction::Nav(MenuDirection::Up)));

        // Assert: a centred stick now has a drive to stop.
        assert!(control.session().cameras()[0].state().is_moving);
        control.on_timeout();
        assert!(!control.session().cameras()[0].state().is_moving);
    }

    #[test]
    fn test_step_preset_stays_within_range() {
        // Arrange
        let (mut control, _transport, _rx) = loose_control();

        // Act
        control.handle(CameraIntent::StepPreset(-1));
        control.handle(CameraIntent::StepPreset(10));
        control.handle(CameraIntent::StepPreset(1));
        control.handle(CameraIntent::StepPreset(-10));

        // Assert – first step below min was ignored
        assert_eq!(control.session().preset_number(), 1);
    }

    #[test]
    fn test_call_selected_preset_uses_number_at_run_time() {
        // Arrange
        let (mut control, transport, _rx) = loose_control();
        control.handle(CameraIntent::Power(true));
        control.handle(CameraIntent::CallSelectedPreset);

        // Act
        control.handle(CameraIntent::StepPreset(10));
        control.on_timeout();

        // Assert
        assert_eq!(transport.frames()[1], vec![0x81, 0x01, 0x04, 0x3F, 0x02, 0x0A, 0xFF]);
    }

    // ── Selection and lifecycle ───────────────────────────────────────────────

    #[test]
    fn test_thunks_target_camera_selected_at_run_time() {
        // Arrange
        let (mut control, transports, _rx) =
            control_with(&[ViscaVariant::Loose, ViscaVariant::Loose]);
        control.handle(CameraIntent::Power(true));
        control.handle(CameraIntent::FocusAuto);

        // Act
        control.handle(CameraIntent::SelectNextCamera);
        control.on_timeout();

        // Assert
        assert_eq!(transports[0].frames().len(), 1);
        assert_eq!(transports[1].frames(), vec![vec![0x81, 0x01, 0x04, 0x38, 0x02, 0xFF]]);
        assert_eq!(control.selected_camera_id(), Some(2));
    }

    #[test]
    fn test_select_prev_at_first_camera_is_noop() {
        let (mut control, _transports, _rx) =
            control_with(&[ViscaVariant::Loose, ViscaVariant::Loose]);
        control.handle(CameraIntent::SelectPrevCamera);
        assert_eq!(control.selected_index(), Some(0));
    }

    #[test]
    fn test_select_preset_number_is_clamped_to_new_camera_range() {
        // Arrange
        let (status, _rx) = StatusReporter::channel();
        let small = CameraLimits {
            preset: SpeedRange::new(0, 9),
            ..CameraLimits::default()
        };
        let links = vec![
            CameraLink::new(1, CameraLimits::default(), ViscaVariant::Loose, Box::new(RecordingTransport::default())),
            CameraLink::new(2, small, ViscaVariant::Loose, Box::new(RecordingTransport::default())),
        ];
        let mut control = CameraControl::new(links, SpeedRounding::Truncate, DEFAULT_COMMAND_TIMEOUT, status);
        control.handle(CameraIntent::StepPreset(10));
        control.handle(CameraIntent::StepPreset(10));

        // Act
        control.handle(CameraIntent::SelectCamera(1));

        // Assert
        assert_eq!(control.session().preset_number(), 9);
    }

    #[test]
    fn test_startup_powers_on_every_camera_in_order() {
        // Arrange
        let (mut control, transports, _rx) =
            control_with(&[ViscaVariant::Loose, ViscaVariant::Strict]);

        // Act
        control.startup();
        control.on_timeout();

        // Assert
        assert_eq!(transports[0].frames(), vec![vec![0x81, 0x01, 0x04, 0x00, 0x02, 0xFF]]);
        assert_eq!(&transports[1].frames()[0][8..], &[0x81, 0x01, 0x04, 0x00, 0x02, 0xFF]);
    }

    #[test]
    fn test_power_off_all_bypasses_queue() {
        // Arrange
        let (mut control, transports, _rx) =
            control_with(&[ViscaVariant::Loose, ViscaVariant::Loose]);
        control.handle(CameraIntent::Power(true));

        // Act
        control.power_off_all();

        // Assert
        assert_eq!(transports[0].frames().last().unwrap(), &vec![0x81, 0x01, 0x04, 0x00, 0x03, 0xFF]);
        assert_eq!(transports[1].frames(), vec![vec![0x81, 0x01, 0x04, 0x00, 0x03, 0xFF]]);
    }

    #[test]
    fn test_transport_failure_reports_status_and_arms_deadline() {
        // Arrange
        let (status, mut rx) = StatusReporter::channel();
        let transport = RecordingTransport {
            should_fail: true,
            ..RecordingTransport::default()
        };
        let links = vec![CameraLink::new(1, CameraLimits::default(), ViscaVariant::Loose, Box::new(transport))];
        let mut control = CameraControl::new(links, SpeedRounding::Truncate, DEFAULT_COMMAND_TIMEOUT, status);

        // Act
        control.handle(CameraIntent::Power(true));

        // Assert
        assert!(control.deadline().is_some());
        let statuses = drain_statuses(&mut rx);
        assert_eq!(statuses.last().unwrap().severity, Severity::Error);
    }

    #[test]
    fn test_intents_without_cameras_are_ignored() {
        let (status, _rx) = StatusReporter::channel();
        let mut control =
            CameraControl::new(Vec::new(), SpeedRounding::Truncate, DEFAULT_COMMAND_TIMEOUT, status);
        control.handle(CameraIntent::Stop);
        control.startup();
        assert!(control.deadline().is_none());
        assert_eq!(control.selected_index(), None);
    }
}
