//! ControlPanel: the button panel layout and its translation into intents.
//!
//! The panel has one page of preset keys with prev/next page keys, one tally
//! key per camera and a studio-mode switch.  Key state machines live in
//! [`camctl_core::panel`]; this module owns the layout, maps key events to
//! [`Intent`]s and keeps switch, tally and preset labels in sync with the
//! rest of the console.

use std::time::Instant;

use camctl_core::panel::{
    KeyAppearance, KeyEvent, PanelKey, PresetPager, TallyState, PRESET_KEYS_PER_PAGE,
};
use camctl_core::SpeedRange;
use tracing::debug;

use crate::application::intent::{CameraIntent, Intent, SceneIntent};

/// Identifies a physical key on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelKeyId {
    /// Preset key by position on the current page, `0..PRESET_KEYS_PER_PAGE`.
    Preset(usize),
    PrevPresetPage,
    NextPresetPage,
    /// Camera key by configuration index.
    Camera(usize),
    StudioMode,
}

/// Panel layout and key state.
#[derive(Debug)]
pub struct ControlPanel {
    preset_keys: Vec<PanelKey>,
    prev_page_key: PanelKey,
    next_page_key: PanelKey,
    camera_keys: Vec<(u8, PanelKey)>,
    studio_key: PanelKey,
    pager: PresetPager,
    selected: Option<usize>,
    program_camera: Option<u8>,
}

impl ControlPanel {
    /// Builds the panel for cameras with the given ids, in configuration order.
    pub fn new(camera_ids: &[u8]) -> Self {
        let mut panel = Self {
            preset_keys: (0..PRESET_KEYS_PER_PAGE)
                .map(|_| PanelKey::preset(0, false))
                .collect(),
            prev_page_key: PanelKey::switch(false),
            next_page_key: PanelKey::switch(false),
            camera_keys: camera_ids.iter().map(|id| (*id, PanelKey::tally())).collect(),
            studio_key: PanelKey::switch(false),
            pager: PresetPager::new(None),
            selected: None,
            program_camera: None,
        };
        panel.refresh_presets();
        panel
    }

    pub fn key_down(&mut self, key: PanelKeyId, now: Instant) -> Vec<Intent> {
        let events = match self.key_mut(key) {
            Some(k) => k.on_key_down(now),
            None => return Vec::new(),
        };
        self.translate(key, &events)
    }

    pub fn key_up(&mut self, key: PanelKeyId, now: Instant) -> Vec<Intent> {
        let events = match self.key_mut(key) {
            Some(k) => k.on_key_up(now),
            None => return Vec::new(),
        };
        self.translate(key, &events)
    }

    /// Advances hold timers of preset keys.
    pub fn poll(&mut self, now: Instant) -> Vec<Intent> {
        let mut intents = Vec::new();
        for index in 0..self.preset_keys.len() {
            if let Some(event) = self.preset_keys[index].poll(now) {
                intents.extend(self.translate(PanelKeyId::Preset(index), &[event]));
            }
        }
        intents
    }

    /// The selected camera changed; re-page presets across its range.
    pub fn on_camera_selected(&mut self, index: usize, presets: Option<SpeedRange>) {
        self.selected = Some(index);
        self.pager.set_range(presets);
        self.refresh_presets();
        self.refresh_tally();
    }

    /// The camera now on the program output, if any.
    pub fn on_program_camera(&mut self, camera_id: Option<u8>) {
        self.program_camera = camera_id;
        self.refresh_tally();
    }

    pub fn on_studio_mode(&mut self, enabled: bool) {
        self.studio_key.set_switch(enabled);
    }

    /// What the renderer should draw for `key`, `None` for keys that do not exist.
    pub fn appearance(&self, key: PanelKeyId) -> Option<KeyAppearance> {
        self.key(key).map(PanelKey::appearance)
    }

    pub fn pager(&self) -> &PresetPager {
        &self.pager
    }

    fn translate(&mut self, key: PanelKeyId, events: &[KeyEvent]) -> Vec<Intent> {
        let mut intents = Vec::new();
        for event in events {
            debug!(?key, ?event, "panel key event");
            match (key, *event) {
                (PanelKeyId::Preset(_), KeyEvent::RecallPreset(n)) => {
                    intents.push(Intent::Camera(CameraIntent::CallPreset(n)));
                }
                (PanelKeyId::Preset(_), KeyEvent::StorePreset(n)) => {
                    intents.push(Intent::Camera(CameraIntent::SetPreset(n)));
                }
                (PanelKeyId::PrevPresetPage, KeyEvent::Down) => {
                    self.pager.prev_page();
                    self.refresh_presets();
                }
                (PanelKeyId::NextPresetPage, KeyEvent::Down) => {
                    self.pager.next_page();
                    self.refresh_presets();
                }
                (PanelKeyId::Camera(index), KeyEvent::Down) => {
                    intents.push(Intent::Camera(CameraIntent::SelectCamera(index)));
                }
                (PanelKeyId::StudioMode, KeyEvent::Down) => {
                    intents.push(Intent::Scene(SceneIntent::ToggleStudioMode));
                }
                _ => {}
            }
        }
        intents
    }

    fn refresh_presets(&mut self) {
        for (key, slot) in self.preset_keys.iter_mut().zip(self.pager.slots()) {
            key.set_preset(slot.number, slot.enabled);
        }
        self.prev_page_key.set_switch(self.pager.has_prev_page());
        self.next_page_key.set_switch(self.pager.has_next_page());
    }

    fn refresh_tally(&mut self) {
        for (index, (id, key)) in self.camera_keys.iter_mut().enumerate() {
            let active = self.program_camera == Some(*id);
            let preview = self.selected == Some(index);
            key.set_tally(TallyState::from_flags(active, preview));
        }
    }

    fn key(&self, key: PanelKeyId) -> Option<&PanelKey> {
        match key {
            PanelKeyId::Preset(i) => self.preset_keys.get(i),
            PanelKeyId::PrevPresetPage => Some(&self.prev_page_key),
            PanelKeyId::NextPresetPage => Some(&self.next_page_key),
            PanelKeyId::Camera(i) => self.camera_keys.get(i).map(|(_, k)| k),
            PanelKeyId::StudioMode => Some(&self.studio_key),
        }
    }

    fn key_mut(&mut self, key: PanelKeyId) -> Option<&mut PanelKey> {
        match key {
            PanelKeyId::Preset(i) => self.preset_keys.get_mut(i),
            PanelKeyId::PrevPresetPage => Some(&mut self.prev_page_key),
            PanelKeyId::NextPresetPage => Some(&mut self.next_page_key),
            PanelKeyId::Camera(i) => self.camera_keys.get_mut(i).map(|(_, k)| k),
            PanelKeyId::StudioMode => Some(&mut self.studio_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camctl_core::panel::LONG_PRESS_THRESHOLD;
    use std::time::Duration;

    fn panel() -> ControlPanel {
        let mut panel = ControlPanel::new(&[1, 2, 3]);
        panel.on_camera_selected(0, Some(SpeedRange::new(0, 40)));
        panel
    }

    #[test]
    fn test_short_press_on_preset_key_calls_preset() {
        // Arrange
        let mut panel = panel();
        let t0 = Instant::now();

        // Act
        let down = panel.key_down(PanelKeyId::Preset(3), t0);
        let up = panel.key_up(PanelKeyId::Preset(3), t0 + Duration::from_millis(200));

        // Assert
        assert!(down.is_empty());
        assert_eq!(up, vec![Intent::Camera(CameraIntent::CallPreset(3))]);
    }

    #[test]
    fn test_long_hold_on_preset_key_stores_preset_once() {
        // Arrange
        let mut panel = panel();
        let t0 = Instant::now();
        panel.key_down(PanelKeyId::Preset(2), t0);

        // Act
        let polled = panel.poll(t0 + LONG_PRESS_THRESHOLD);
        let up = panel.key_up(PanelKeyId::Preset(2), t0 + LONG_PRESS_THRESHOLD * 2);

        // Assert
        assert_eq!(polled, vec![Intent::Camera(CameraIntent::SetPreset(2))]);
        assert!(up.is_empty());
    }

    #[test]
    fn test_next_page_relabels_preset_keys() {
        // Arrange
        let mut panel = panel();
        let t0 = Instant::now();

        // Act
        panel.key_down(PanelKeyId::NextPresetPage, t0);
        panel.key_up(PanelKeyId::NextPresetPage, t0);

        // Assert
        assert_eq!(panel.pager().first(), 15);
        assert_eq!(
            panel.appearance(PanelKeyId::Preset(0)),
            Some(KeyAppearance::Preset(Some(15)))
        );
        assert_eq!(panel.appearance(PanelKeyId::PrevPresetPage), Some(KeyAppearance::On));
    }

    #[test]
    fn test_preset_keys_outside_range_are_blank() {
        // Arrange
        let mut panel = panel();

        // Act
        panel.on_camera_selected(1, Some(SpeedRange::new(0, 9)));

        // Assert
        assert_eq!(panel.appearance(PanelKeyId::Preset(10)), Some(KeyAppearance::Preset(None)));
        assert_eq!(panel.appearance(PanelKeyId::NextPresetPage), Some(KeyAppearance::Off));
    }

    #[test]
    fn test_camera_key_selects_camera_and_tally_follows() {
        // Arrange
        let mut panel = panel();

        // Act
        let intents = panel.key_down(PanelKeyId::Camera(2), Instant::now());
        panel.on_camera_selected(2, None);
        panel.on_program_camera(Some(1));

        // Assert
        assert_eq!(intents, vec![Intent::Camera(CameraIntent::SelectCamera(2))]);
        assert_eq!(
            panel.appearance(PanelKeyId::Camera(2)),
            Some(KeyAppearance::Tally(TallyState::Preview))
        );
        assert_eq!(
            panel.appearance(PanelKeyId::Camera(0)),
            Some(KeyAppearance::Tally(TallyState::Active))
        );
    }

    #[test]
    fn test_studio_key_toggles_and_shows_state() {
        let mut panel = panel();
        let intents = panel.key_down(PanelKeyId::StudioMode, Instant::now());
        assert_eq!(intents, vec![Intent::Scene(SceneIntent::ToggleStudioMode)]);
        panel.on_studio_mode(true);
        assert_eq!(panel.appearance(PanelKeyId::StudioMode), Some(KeyAppearance::On));
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let mut panel = panel();
        assert!(panel.key_down(PanelKeyId::Camera(9), Instant::now()).is_empty());
        assert_eq!(panel.appearance(PanelKeyId::Preset(99)), None);
    }
}
