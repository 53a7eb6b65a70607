//! SceneSwitcher: the scene-switching tool's WebSocket session.
//!
//! The session speaks obs-websocket v5 JSON.  It is a pure state machine:
//! [`SceneSwitcher::handle_message`] consumes one inbound text frame and
//! returns the frames to send back plus the events the rest of the console
//! cares about.  The socket itself lives in
//! [`crate::infrastructure::network::scene_ws`].
//!
//! | op | direction | meaning                                   |
//! |----|-----------|-------------------------------------------|
//! | 0  | in        | Hello; answered with Identify (op 1)      |
//! | 2  | in        | Identified; query studio mode, scene list |
//! | 5  | in        | Event                                     |
//! | 6  | out       | Request                                   |
//! | 7  | in        | RequestResponse                           |

use camctl_core::{parse_scene_id, SceneDirectory, SceneError, SceneId, SceneOverrides};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::application::status::StatusReporter;

const OP_HELLO: i64 = 0;
const OP_IDENTIFY: i64 = 1;
const OP_IDENTIFIED: i64 = 2;
const OP_EVENT: i64 = 5;
const OP_REQUEST: i64 = 6;
const OP_REQUEST_RESPONSE: i64 = 7;

const RPC_VERSION: u32 = 1;

/// Scene events (4) and UI events (1024, studio mode).
const EVENT_SUBSCRIPTIONS: u32 = 4 | 1024;

/// Something the rest of the console should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    Connected,
    Disconnected,
    /// The program or preview scene changed.
    CurrentSceneChanged {
        id: SceneId,
        name: String,
        program: bool,
    },
    StudioModeChanged(bool),
    SceneListUpdated,
}

/// Result of handling one inbound frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOutput {
    /// Text frames to send, in order.
    pub outbound: Vec<String>,
    pub events: Vec<SceneEvent>,
}

#[derive(Deserialize)]
struct Envelope {
    op: i64,
    #[serde(default)]
    d: Value,
}

/// Scene switcher session state.
#[derive(Debug)]
pub struct SceneSwitcher {
    directory: SceneDirectory,
    overrides: SceneOverrides,
    studio_mode: bool,
    connected: bool,
    next_request_id: u64,
    current_scene: u8,
    status: StatusReporter,
}

impl SceneSwitcher {
    pub fn new(status: StatusReporter) -> Self {
        Self {
            directory: SceneDirectory::new(),
            overrides: SceneOverrides::new(),
            studio_mode: false,
            connected: false,
            next_request_id: 0,
            current_scene: 0,
            status,
        }
    }

    pub fn directory(&self) -> &SceneDirectory {
        &self.directory
    }

    pub fn overrides(&self) -> &SceneOverrides {
        &self.overrides
    }

    pub fn overrides_mut(&mut self) -> &mut SceneOverrides {
        &mut self.overrides
    }

    pub fn is_studio_mode(&self) -> bool {
        self.studio_mode
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Major number of the scene the operator has selected, `0` for none.
    pub fn current_scene(&self) -> u8 {
        self.current_scene
    }

    /// Handles one inbound text frame.  Frames that are not valid JSON or
    /// carry an unknown op are ignored.
    pub fn handle_message(&mut self, text: &str) -> SessionOutput {
        let mut out = SessionOutput::default();
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("ignoring malformed scene switcher frame: {e}");
                return out;
            }
        };

        match envelope.op {
            OP_HELLO => {
                self.connected = false;
                out.outbound.push(
                    json!({
                        "op": OP_IDENTIFY,
                        "d": {
                            "rpcVersion": RPC_VERSION,
                            "eventSubscriptions": EVENT_SUBSCRIPTIONS,
                        }
                    })
                    .to_string(),
                );
                self.status.info("OBS connecting..");
            }
            OP_IDENTIFIED => {
                out.outbound.push(self.request("GetStudioModeEnabled", json!({})));
                out.outbound.push(self.request("GetSceneList", json!({})));
                self.connected = true;
                self.status.info("OBS connected.");
                out.events.push(SceneEvent::Connected);
            }
            OP_EVENT => self.handle_event(&envelope.d, &mut out),
            OP_REQUEST_RESPONSE => self.handle_response(&envelope.d, &mut out),
            op => debug!(op, "ignoring scene switcher op"),
        }
        out
    }

    /// The socket closed.
    pub fn on_disconnected(&mut self) -> SceneEvent {
        self.connected = false;
        self.status.error("OBS disconnected.");
        SceneEvent::Disconnected
    }

    /// Builds the request switching to scene `major` as seen by camera `camera`.
    ///
    /// In studio mode the preview scene is set, otherwise the program scene.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NotFound`] if neither the overrides nor the
    /// directory know the scene.  Nothing is sent in that case.
    pub fn switch_to(&mut self, major: u8, camera: u8) -> Result<String, SceneError> {
        let name = self
            .directory
            .resolve(&self.overrides, major, camera)?
            .to_string();
        let request_type = if self.studio_mode {
            "SetCurrentPreviewScene"
        } else {
            "SetCurrentProgramScene"
        };
        Ok(self.request(request_type, json!({ "sceneName": name })))
    }

    /// Switches to the selected scene for `camera`, reporting failures.
    pub fn switch_selected(&mut self, camera: u8) -> Option<String> {
        match self.switch_to(self.current_scene, camera) {
            Ok(frame) => Some(frame),
            Err(e) => {
                self.status.error(e.to_string());
                None
            }
        }
    }

    /// Builds the request flipping studio mode.
    pub fn toggle_studio_mode(&mut self) -> String {
        let enabled = !self.studio_mode;
        self.request("SetStudioModeEnabled", json!({ "studioModeEnabled": enabled }))
    }

    /// Moves the selection to the previous scene.  Returns `false` at the start.
    pub fn select_prev(&mut self) -> bool {
        self.select_major(self.directory.prev(self.current_scene))
    }

    /// Moves the selection to the next scene.  Returns `false` at the end.
    pub fn select_next(&mut self) -> bool {
        self.select_major(self.directory.next(self.current_scene))
    }

    /// Selects scene `major` directly.  `0` is ignored.
    pub fn select(&mut self, major: u8) -> bool {
        self.select_major(major)
    }

    fn select_major(&mut self, major: u8) -> bool {
        if major == 0 {
            return false;
        }
        self.current_scene = major;
        self.status.info(format!("Scene {major} selected"));
        true
    }

    fn request(&mut self, request_type: &str, data: Value) -> String {
        self.next_request_id += 1;
        json!({
            "op": OP_REQUEST,
            "d": {
                "requestType": request_type,
                "requestId": self.next_request_id,
                "requestData": data,
            }
        })
        .to_string()
    }

    fn handle_event(&mut self, d: &Value, out: &mut SessionOutput) {
        let event_type = d["eventType"].as_str().unwrap_or_default();
        let data = &d["eventData"];
        match event_type {
            "CurrentProgramSceneChanged" | "CurrentPreviewSceneChanged" => {
                let name = data["sceneName"].as_str().unwrap_or_default().to_string();
                let program = event_type == "CurrentProgramSceneChanged";
                self.status.info(format!("Current Scene: {name}"));
                out.events.push(self.scene_changed(name, program));
            }
            "StudioModeStateChanged" => {
                self.studio_mode = data["studioModeEnabled"].as_bool().unwrap_or(false);
                out.events.push(SceneEvent::StudioModeChanged(self.studio_mode));
            }
            "SceneCreated" => {
                if let Some(name) = data["sceneName"].as_str() {
                    self.directory.insert(name);
                    out.events.push(SceneEvent::SceneListUpdated);
                }
            }
            "SceneRemoved" => {
                if let Some(name) = data["sceneName"].as_str() {
                    self.directory.remove(name);
                    out.events.push(SceneEvent::SceneListUpdated);
                }
            }
            "SceneNameChanged" => {
                let old_name = data["oldSceneName"].as_str().unwrap_or_default();
                if let Some(name) = data["sceneName"].as_str() {
                    self.directory.rename(old_name, name);
                    out.events.push(SceneEvent::SceneListUpdated);
                }
            }
            other => debug!(event_type = other, "ignoring scene switcher event"),
        }
    }

    fn handle_response(&mut self, d: &Value, out: &mut SessionOutput) {
        let data = &d["responseData"];
        match d["requestType"].as_str().unwrap_or_default() {
            "GetSceneList" => {
                let names = data["scenes"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|scene| scene["sceneName"].as_str());
                self.directory = SceneDirectory::from_names(names);
                out.events.push(SceneEvent::SceneListUpdated);

                let preview = data["currentPreviewSceneName"].as_str().unwrap_or_default();
                let program = data["currentProgramSceneName"].as_str().unwrap_or_default();
                let (name, is_program) = if preview.is_empty() {
                    (program, true)
                } else {
                    (preview, false)
                };
                out.events.push(self.scene_changed(name.to_string(), is_program));
            }
            "GetStudioModeEnabled" => {
                self.studio_mode = data["studioModeEnabled"].as_bool().unwrap_or(false);
                out.events.push(SceneEvent::StudioModeChanged(self.studio_mode));
            }
            _ => {}
        }
    }

    fn scene_changed(&mut self, name: String, program: bool) -> SceneEvent {
        let id = parse_scene_id(&name);
        if !id.is_absent() {
            self.current_scene = id.major;
        }
        SceneEvent::CurrentSceneChanged { id, name, program }
    }
}
