//! Console: routes operator intents and device events between the use cases.
//!
//! The console owns the camera control, the scene switcher session and the
//! control panel, and holds the sending ends of the scene switcher socket
//! and the matrix reconciler task.  It never blocks: camera thunks are
//! synchronous, scene frames go into an unbounded channel and matrix intents
//! are handed to the reconciler task with `try_send`.
//!
//! ```text
//! line console / panel ─► Console::handle ─┬─► CameraControl ─► UDP
//!                                          ├─► SceneSwitcher ─► WebSocket
//!                                          └─► matrix task  ─► HTTP
//! scene frames    ─► Console::on_scene_frame
//! matrix events   ─► Console::on_matrix_event (rules → scene overrides)
//! ```

use std::time::Instant;

use camctl_core::matrix::apply_rule_actions;
use camctl_core::MatrixError;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::application::camera_control::CameraControl;
use crate::application::control_panel::ControlPanel;
use crate::application::intent::{CameraIntent, Intent, MatrixIntent, SceneIntent};
use crate::application::matrix_reconciler::MatrixEvent;
use crate::application::scene_switcher::{SceneEvent, SceneSwitcher};
use crate::application::status::StatusReporter;

/// Central router of the running console.
#[derive(Debug)]
pub struct Console {
    cameras: CameraControl,
    scenes: SceneSwitcher,
    panel: ControlPanel,
    scene_out: Option<mpsc::UnboundedSender<String>>,
    matrix: Option<mpsc::Sender<MatrixIntent>>,
    status: StatusReporter,
}

impl Console {
    /// Creates a console without a scene switcher link or matrix.
    pub fn new(cameras: CameraControl, scenes: SceneSwitcher, status: StatusReporter) -> Self {
        let ids: Vec<u8> = cameras.session().cameras().iter().map(|c| c.id()).collect();
        let mut panel = ControlPanel::new(&ids);
        if let Some(index) = cameras.selected_index() {
            panel.on_camera_selected(index, cameras.selected_limits().map(|l| l.preset));
        }
        Self {
            cameras,
            scenes,
            panel,
            scene_out: None,
            matrix: None,
            status,
        }
    }

    /// Frames for the scene switcher are sent on `outbound`.
    pub fn with_scene_link(mut self, outbound: mpsc::UnboundedSender<String>) -> Self {
        self.scene_out = Some(outbound);
        self
    }

    /// Matrix intents are handed to the reconciler task on `intents`.
    pub fn with_matrix(mut self, intents: mpsc::Sender<MatrixIntent>) -> Self {
        self.matrix = Some(intents);
        self
    }

    pub fn cameras(&self) -> &CameraControl {
        &self.cameras
    }

    pub fn cameras_mut(&mut self) -> &mut CameraControl {
        &mut self.cameras
    }

    pub fn scenes(&self) -> &SceneSwitcher {
        &self.scenes
    }

    pub fn panel(&self) -> &ControlPanel {
        &self.panel
    }

    /// Powers the cameras on and resets the matrix.
    pub fn startup(&mut self) {
        info!(cameras = self.cameras.camera_count(), "console starting");
        self.cameras.startup();
        if self.matrix.is_some() {
            self.handle_matrix(MatrixIntent::Reset);
        }
    }

    /// Handles one operator intent.
    pub fn handle(&mut self, intent: Intent, now: Instant) {
        match intent {
            Intent::Camera(camera) => self.handle_camera(camera),
            Intent::Scene(scene) => self.handle_scene(scene),
            Intent::Matrix(matrix) => self.handle_matrix(matrix),
            Intent::Panel { key, pressed } => {
                let intents = if pressed {
                    self.panel.key_down(key, now)
                } else {
                    self.panel.key_up(key, now)
                };
                for intent in intents {
                    self.handle(intent, now);
                }
            }
        }
    }

    /// Advances panel hold timers.
    pub fn poll_panel(&mut self, now: Instant) {
        for intent in self.panel.poll(now) {
            self.handle(intent, now);
        }
    }

    /// One inbound frame from the scene switcher.
    pub fn on_scene_frame(&mut self, text: &str) {
        let output = self.scenes.handle_message(text);
        for frame in output.outbound {
            self.send_scene_frame(frame);
        }
        for event in output.events {
            self.on_scene_event(event);
        }
    }

    /// The scene switcher connection dropped.
    pub fn on_scene_disconnected(&mut self) {
        let event = self.scenes.on_disconnected();
        self.on_scene_event(event);
    }

    /// One event from the matrix reconciler.
    pub fn on_matrix_event(&mut self, event: MatrixEvent) {
        match event {
            MatrixEvent::MappingUpdated(mapping) => {
                debug!(?mapping, "matrix mapping updated");
            }
            MatrixEvent::RulesFired(actions) => {
                apply_rule_actions(&actions, self.scenes.overrides_mut());
                debug!(
                    overrides = self.scenes.overrides().len(),
                    "scene overrides updated by matrix rules"
                );
            }
            MatrixEvent::ConnectionFailed => {
                self.status
                    .error("Matrix connection failed; restart the matrix to regain control.");
            }
        }
    }

    /// First half of shutdown: drop every queued camera command.
    pub fn begin_shutdown(&mut self) {
        info!("console shutting down");
        self.cameras.clear();
    }

    /// Second half of shutdown: power the cameras off and reset the matrix.
    pub fn finish_shutdown(&mut self) {
        self.cameras.power_off_all();
        if self.matrix.is_some() {
            self.handle_matrix(MatrixIntent::Reset);
        }
    }

    fn handle_camera(&mut self, intent: CameraIntent) {
        let before = self.cameras.selected_index();
        self.cameras.handle(intent);
        let after = self.cameras.selected_index();
        if after == before {
            return;
        }
        if let Some(index) = after {
            self.panel
                .on_camera_selected(index, self.cameras.selected_limits().map(|l| l.preset));
        }
    }

    fn handle_scene(&mut self, intent: SceneIntent) {
        match intent {
            SceneIntent::Prev => {
                self.scenes.select_prev();
            }
            SceneIntent::Next => {
                self.scenes.select_next();
            }
            SceneIntent::Select(major) => {
                self.scenes.select(major);
            }
            SceneIntent::Switch => {
                let camera = self.cameras.selected_camera_id().unwrap_or(0);
                if let Some(frame) = self.scenes.switch_selected(camera) {
                    self.send_scene_frame(frame);
                }
            }
            SceneIntent::ToggleStudioMode => {
                let frame = self.scenes.toggle_studio_mode();
                self.send_scene_frame(frame);
            }
        }
    }

    fn handle_matrix(&mut self, intent: MatrixIntent) {
        let Some(matrix) = &self.matrix else {
            self.status.error(MatrixError::Disabled.to_string());
            return;
        };
        if let Err(e) = matrix.try_send(intent) {
            self.status.error(format!("Matrix busy, request dropped: {e}"));
        }
    }

    fn on_scene_event(&mut self, event: SceneEvent) {
        match event {
            SceneEvent::CurrentSceneChanged {
                id, program: true, ..
            } => {
                let camera = (id.minor != 0).then_some(id.minor);
                self.panel.on_program_camera(camera);
            }
            SceneEvent::StudioModeChanged(enabled) => self.panel.on_studio_mode(enabled),
            SceneEvent::Disconnected => self.panel.on_program_camera(None),
            other => debug!(?other, "scene event"),
        }
    }

    fn send_scene_frame(&mut self, frame: String) {
        match &self.scene_out {
            Some(tx) if self.scenes.is_connected() => {
                if tx.send(frame).is_err() {
                    self.status.error("OBS link is not running.");
                }
            }
            _ => self.status.error("OBS is not connected."),
        }
    }
}
