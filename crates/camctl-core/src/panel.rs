//! Button panel key model.
//!
//! A panel key is one of a fixed set of behaviours.  Each behaviour reacts to
//! key-down, key-up and the passage of time, and reports what the external
//! renderer should draw.  The panel hardware and icon rendering live outside
//! this crate; only the state machines live here.
//!
//! | behaviour   | press                                     | appearance               |
//! |-------------|-------------------------------------------|--------------------------|
//! | `Simple`    | `Down` / `Up`                             | always idle              |
//! | `LongPress` | `ShortPress` on release, `LongPress` at 1 s| long-pressed while held  |
//! | `Switch`    | `Down` / `Up`, state set by the owner     | on / off                 |
//! | `Tally`     | `Down` / `Up`                             | active / preview / off   |
//! | `Preset`    | `RecallPreset` short, `StorePreset` long  | number or blank          |

use std::time::{Duration, Instant};

use crate::domain::camera::SpeedRange;

/// How long a key must be held before it counts as a long press.
pub const LONG_PRESS_THRESHOLD: Duration = Duration::from_secs(1);

/// Number of preset keys shown on one page.
pub const PRESET_KEYS_PER_PAGE: usize = 15;

/// Event produced by a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Down,
    Up,
    ShortPress,
    LongPress,
    RecallPreset(u32),
    StorePreset(u32),
}

/// Tally light state of a camera key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyState {
    Off,
    /// The camera is selected for control.
    Preview,
    /// The camera is on the program output.
    Active,
}

impl TallyState {
    /// Program output wins over selection.
    pub fn from_flags(active: bool, preview: bool) -> Self {
        if active {
            Self::Active
        } else if preview {
            Self::Preview
        } else {
            Self::Off
        }
    }
}

/// What the renderer should draw for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAppearance {
    Idle,
    LongPressed,
    On,
    Off,
    Tally(TallyState),
    /// `None` draws a blank key.
    Preset(Option<u32>),
}

/// Hold timer carried by long-press capable keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoldTracker {
    pressed_at: Option<Instant>,
    long_fired: bool,
}

impl HoldTracker {
    fn press(&mut self, now: Instant) {
        if self.pressed_at.is_none() {
            self.pressed_at = Some(now);
            self.long_fired = false;
        }
    }

    /// Returns `true` exactly once when the hold crosses the threshold.
    fn poll(&mut self, now: Instant) -> bool {
        match self.pressed_at {
            Some(at) if !self.long_fired && now.duration_since(at) >= LONG_PRESS_THRESHOLD => {
                self.long_fired = true;
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if the release ends a short press.
    fn release(&mut self, now: Instant) -> bool {
        let long = self.long_fired || self.poll(now);
        self.pressed_at = None;
        self.long_fired = false;
        !long
    }

    fn is_held(&self) -> bool {
        self.pressed_at.is_some()
    }

    fn is_long_pressed(&self) -> bool {
        self.long_fired
    }
}

/// Behaviour of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyBehavior {
    Simple,
    LongPress(HoldTracker),
    Switch { on: bool },
    Tally(TallyState),
    Preset {
        number: u32,
        enabled: bool,
        hold: HoldTracker,
    },
}

/// A single panel key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelKey {
    behavior: KeyBehavior,
}

impl PanelKey {
    pub fn simple() -> Self {
        Self::with(KeyBehavior::Simple)
    }

    pub fn long_press() -> Self {
        Self::with(KeyBehavior::LongPress(HoldTracker::default()))
    }

    pub fn switch(on: bool) -> Self {
        Self::with(KeyBehavior::Switch { on })
    }

    pub fn tally() -> Self {
        Self::with(KeyBehavior::Tally(TallyState::Off))
    }

    pub fn preset(number: u32, enabled: bool) -> Self {
        Self::with(KeyBehavior::Preset {
            number,
            enabled,
            hold: HoldTracker::default(),
        })
    }

    fn with(behavior: KeyBehavior) -> Self {
        Self { behavior }
    }

    pub fn behavior(&self) -> &KeyBehavior {
        &self.behavior
    }

    pub fn on_key_down(&mut self, now: Instant) -> Vec<KeyEvent> {
        match &mut self.behavior {
            KeyBehavior::LongPress(hold) | KeyBehavior::Preset { hold, .. } => {
                hold.press(now);
                vec![KeyEvent::Down]
            }
            _ => vec![KeyEvent::Down],
        }
    }

    pub fn on_key_up(&mut self, now: Instant) -> Vec<KeyEvent> {
        match &mut self.behavior {
            KeyBehavior::LongPress(hold) => {
                let mut events = Vec::with_capacity(2);
                if hold.is_held() {
                    let already_fired = hold.is_long_pressed();
                    if hold.release(now) {
                        events.push(KeyEvent::ShortPress);
                    } else if !already_fired {
                        events.push(KeyEvent::LongPress);
                    }
                }
                events.push(KeyEvent::Up);
                events
            }
            KeyBehavior::Preset {
                number,
                enabled,
                hold,
            } => {
                let mut events = Vec::with_capacity(2);
                if hold.is_held() {
                    let already_fired = hold.is_long_pressed();
                    let short = hold.release(now);
                    if *enabled && short {
                        events.push(KeyEvent::RecallPreset(*number));
                    } else if *enabled && !already_fired {
                        events.push(KeyEvent::StorePreset(*number));
                    }
                }
                events.push(KeyEvent::Up);
                events
            }
            _ => vec![KeyEvent::Up],
        }
    }

    /// Advances hold timers.  Call periodically while any key may be held.
    pub fn poll(&mut self, now: Instant) -> Option<KeyEvent> {
        match &mut self.behavior {
            KeyBehavior::LongPress(hold) => hold.poll(now).then_some(KeyEvent::LongPress),
            KeyBehavior::Preset {
                number,
                enabled,
                hold,
            } => (hold.poll(now) && *enabled).then_some(KeyEvent::StorePreset(*number)),
            _ => None,
        }
    }

    pub fn appearance(&self) -> KeyAppearance {
        match &self.behavior {
            KeyBehavior::Simple => KeyAppearance::Idle,
            KeyBehavior::LongPress(hold) if hold.is_long_pressed() => KeyAppearance::LongPressed,
            KeyBehavior::LongPress(_) => KeyAppearance::Idle,
            KeyBehavior::Switch { on: true } => KeyAppearance::On,
            KeyBehavior::Switch { on: false } => KeyAppearance::Off,
            KeyBehavior::Tally(state) => KeyAppearance::Tally(*state),
            KeyBehavior::Preset {
                number,
                enabled,
                hold,
            } => {
                if *enabled && !hold.is_long_pressed() {
                    KeyAppearance::Preset(Some(*number))
                } else {
                    KeyAppearance::Preset(None)
                }
            }
        }
    }

    /// Sets a switch key's state.  Returns `true` if the appearance changed.
    pub fn set_switch(&mut self, value: bool) -> bool {
        match &mut self.behavior {
            KeyBehavior::Switch { on } if *on != value => {
                *on = value;
                true
            }
            _ => false,
        }
    }

    /// Sets a tally key's state.  Returns `true` if the appearance changed.
    pub fn set_tally(&mut self, value: TallyState) -> bool {
        match &mut self.behavior {
            KeyBehavior::Tally(state) if *state != value => {
                *state = value;
                true
            }
            _ => false,
        }
    }

    /// Re-labels a preset key.  Returns `true` if the appearance changed.
    pub fn set_preset(&mut self, value: u32, is_enabled: bool) -> bool {
        match &mut self.behavior {
            KeyBehavior::Preset {
                number, enabled, ..
            } if *number != value || *enabled != is_enabled => {
                *number = value;
                *enabled = is_enabled;
                true
            }
            _ => false,
        }
    }
}

// ── Preset paging ─────────────────────────────────────────────────────────────

/// One preset key slot on the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetSlot {
    pub number: u32,
    pub enabled: bool,
}

/// Pages [`PRESET_KEYS_PER_PAGE`] preset keys across a camera's preset range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetPager {
    first: u32,
    range: Option<SpeedRange>,
}

impl PresetPager {
    pub fn new(range: Option<SpeedRange>) -> Self {
        let mut pager = Self::default();
        pager.set_range(range);
        pager
    }

    /// Switches to another camera's preset range, keeping the current page
    /// when it is still inside the range.
    pub fn set_range(&mut self, range: Option<SpeedRange>) {
        self.range = range;
        if let Some(range) = range {
            let min = u32::from(range.min);
            let count = range.span();
            let page = PRESET_KEYS_PER_PAGE as u32;
            if self.first < min {
                self.first = min;
            }
            if self.first + 1 > min + count {
                self.first = if count > page { min + count - page } else { min };
            }
        }
    }

    pub fn first(&self) -> u32 {
        self.first
    }

    pub fn prev_page(&mut self) {
        let Some(range) = self.range else { return };
        let min = u32::from(range.min);
        let page = PRESET_KEYS_PER_PAGE as u32;
        self.first = if self.first > min + page {
            self.first - page
        } else {
            min
        };
    }

    pub fn next_page(&mut self) {
        if self.has_next_page() {
            self.first += PRESET_KEYS_PER_PAGE as u32;
        }
    }

    pub fn has_prev_page(&self) -> bool {
        self.range
            .map_or(false, |range| self.first > u32::from(range.min))
    }

    pub fn has_next_page(&self) -> bool {
        self.range.map_or(false, |range| {
            self.first + PRESET_KEYS_PER_PAGE as u32 <= u32::from(range.max)
        })
    }

    /// The slots of the current page, in key order.
    pub fn slots(&self) -> Vec<PresetSlot> {
        (0..PRESET_KEYS_PER_PAGE as u32)
            .map(|offset| {
                let number = self.first + offset;
                PresetSlot {
                    number,
                    enabled: self.range.map_or(false, |range| range.contains(number)),
                }
            })
            .collect()
    }
}
