//! Scene identifiers encoded in scene names, and the ordered scene directory.
//!
//! Scene names in the scene-switching tool start with a `"<major>.<minor>"`
//! prefix, for example `"3.2 Pulpit close"`.  The major number is the scene
//! the operator picks; the minor number is the camera id the scene is built
//! for, with minor `0` meaning "any camera".  Names that do not start with a
//! digit decode to major `0`, which means "no scene" and is never stored.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::debug;

/// Errors raised by scene lookups.
#[derive(Debug, Error, PartialEq)]
pub enum SceneError {
    #[error("Scene {major}.{camera} does not exist.")]
    NotFound { major: u8, camera: u8 },
}

/// `(major, minor)` pair decoded from a scene name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SceneId {
    pub major: u8,
    pub minor: u8,
}

impl SceneId {
    /// The "no scene" identifier.
    pub const ABSENT: SceneId = SceneId { major: 0, minor: 0 };

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    pub fn is_absent(&self) -> bool {
        self.major == 0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Decodes the scene identifier at the start of `name`.
///
/// Digits accumulate into the major number until a single `.` switches
/// accumulation to the minor number.  Any other character stops the scan and
/// whatever was accumulated so far is returned.  If either number overflows
/// `u8` the result is [`SceneId::ABSENT`].
///
/// Only ASCII digits count.  Digits from other scripts stop the scan like
/// any other character.
///
/// # Examples
///
/// ```rust
/// use camctl_core::scene::{parse_scene_id, SceneId};
///
/// assert_eq!(parse_scene_id("3.2-backup"), SceneId::new(3, 2));
/// assert_eq!(parse_scene_id("12"), SceneId::new(12, 0));
/// assert_eq!(parse_scene_id("abc"), SceneId::ABSENT);
/// ```
pub fn parse_scene_id(name: &str) -> SceneId {
    let mut parts = [0u8; 2];
    let mut current = 0;

    for c in name.chars() {
        match c.to_digit(10) {
            Some(digit) => {
                let next = parts[current]
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit as u8));
                match next {
                    Some(value) => parts[current] = value,
                    None => return SceneId::ABSENT,
                }
            }
            None if c == '.' && current == 0 => current = 1,
            None => break,
        }
    }

    SceneId::new(parts[0], parts[1])
}

// ── Directory ─────────────────────────────────────────────────────────────────

/// Ordered index of known scenes: `major → (minor → name)`.
///
/// Lookups of the previous and next major number are `O(log n)` in the number
/// of distinct majors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDirectory {
    scenes: BTreeMap<u8, BTreeMap<u8, String>>,
}

impl SceneDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a directory from a full scene list, replacing nothing.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut directory = Self::new();
        for name in names {
            directory.insert(name);
        }
        directory
    }

    /// Stores `name` under its decoded identifier, overwriting any previous
    /// name with the same identifier.  Names without a major number are
    /// ignored.  Returns the identifier used.
    pub fn insert(&mut self, name: impl Into<String>) -> SceneId {
        let name = name.into();
        let id = parse_scene_id(&name);
        if id.is_absent() {
            debug!(%name, "scene name carries no scene number; not indexed");
        } else {
            self.scenes.entry(id.major).or_default().insert(id.minor, name);
        }
        id
    }

    /// Removes the entry for the identifier decoded from `name`.
    pub fn remove(&mut self, name: &str) -> SceneId {
        let id = parse_scene_id(name);
        if let Some(minors) = self.scenes.get_mut(&id.major) {
            minors.remove(&id.minor);
            if minors.is_empty() {
                self.scenes.remove(&id.major);
            }
        }
        id
    }

    /// Applies a rename: removes `old_name` and inserts `new_name`.
    pub fn rename(&mut self, old_name: &str, new_name: impl Into<String>) -> SceneId {
        self.remove(old_name);
        self.insert(new_name)
    }

    pub fn clear(&mut self) {
        self.scenes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Number of distinct major numbers.
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn get(&self, id: SceneId) -> Option<&str> {
        self.scenes
            .get(&id.major)
            .and_then(|minors| minors.get(&id.minor))
            .map(String::as_str)
    }

    /// Largest major number strictly below `major`, or `0` if there is none.
    pub fn prev(&self, major: u8) -> u8 {
        self.scenes
            .range(..major)
            .next_back()
            .map(|(key, _)| *key)
            .unwrap_or(0)
    }

    /// Smallest major number strictly above `major`, or `0` if there is none.
    pub fn next(&self, major: u8) -> u8 {
        if major == u8::MAX {
            return 0;
        }
        self.scenes
            .range(major + 1..)
            .next()
            .map(|(key, _)| *key)
            .unwrap_or(0)
    }

    /// Finds the scene name to switch to for scene `major` on camera `camera`.
    ///
    /// Overrides are consulted first, then the directory.  In both, an entry
    /// specific to `camera` wins over the camera-agnostic entry (minor `0`).
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NotFound`] if neither source has a match.
    pub fn resolve<'a>(
        &'a self,
        overrides: &'a SceneOverrides,
        major: u8,
        camera: u8,
    ) -> Result<&'a str, SceneError> {
        let specific = SceneId::new(major, camera);
        let fallback = SceneId::new(major, 0);
        overrides
            .get(specific)
            .or_else(|| overrides.get(fallback))
            .or_else(|| self.get(specific))
            .or_else(|| self.get(fallback))
            .ok_or(SceneError::NotFound { major, camera })
    }

    /// Iterates `(id, name)` in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (SceneId, &str)> {
        self.scenes.iter().flat_map(|(major, minors)| {
            minors
                .iter()
                .map(move |(minor, name)| (SceneId::new(*major, *minor), name.as_str()))
        })
    }
}

// ── Overrides ─────────────────────────────────────────────────────────────────

/// Scene names that take precedence over the directory.
///
/// Matrix rules update these so that, for example, scene 3 switches to a
/// different program scene while a particular source is routed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneOverrides {
    names: BTreeMap<SceneId, String>,
}

impl SceneOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the override for `id`.  A later call for the same id wins.
    pub fn set(&mut self, id: SceneId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    pub fn get(&self, id: SceneId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_scene_id ────────────────────────────────────────────────────────

    #[test]
    fn test_parse_major_and_minor_stops_at_non_digit() {
        assert_eq!(parse_scene_id("3.2-backup"), SceneId::new(3, 2));
    }

    #[test]
    fn test_parse_major_only() {
        assert_eq!(parse_scene_id("12"), SceneId::new(12, 0));
    }

    #[test]
    fn test_parse_no_leading_digits_is_absent() {
        assert_eq!(parse_scene_id("abc"), SceneId::ABSENT);
    }

    #[test]
    fn test_parse_trailing_dot_has_zero_minor() {
        assert_eq!(parse_scene_id("7."), SceneId::new(7, 0));
    }

    #[test]
    fn test_parse_second_dot_stops_scanning() {
        assert_eq!(parse_scene_id("1.2.3"), SceneId::new(1, 2));
    }

    #[test]
    fn test_parse_major_overflow_is_absent() {
        assert_eq!(parse_scene_id("256"), SceneId::ABSENT);
        assert_eq!(parse_scene_id("99999 Wide"), SceneId::ABSENT);
    }

    #[test]
    fn test_parse_minor_overflow_is_absent() {
        assert_eq!(parse_scene_id("4.300"), SceneId::ABSENT);
    }

    #[test]
    fn test_parse_max_value_fits() {
        assert_eq!(parse_scene_id("255.255"), SceneId::new(255, 255));
    }

    #[test]
    fn test_parse_accepts_ascii_digits_only() {
        // Arabic-Indic "٣.٢" and full-width "３" are not scene numbers.
        assert_eq!(parse_scene_id("\u{0663}.\u{0662} Wide"), SceneId::ABSENT);
        assert_eq!(parse_scene_id("\u{FF13} Stage"), SceneId::ABSENT);
        assert_eq!(parse_scene_id("4\u{0662}"), SceneId::new(4, 0));
    }

    #[test]
    fn test_parse_empty_is_absent() {
        assert_eq!(parse_scene_id(""), SceneId::ABSENT);
    }

    // ── Directory ordering ────────────────────────────────────────────────────

    fn directory_2_5_9() -> SceneDirectory {
        SceneDirectory::from_names(["2 Wide", "5.0 Stage", "5.3 Stage cam 3", "9 Credits"])
    }

    #[test]
    fn test_next_returns_smallest_greater_major() {
        let directory = directory_2_5_9();
        assert_eq!(directory.next(5), 9);
        assert_eq!(directory.next(0), 2);
    }

    #[test]
    fn test_prev_returns_largest_smaller_major() {
        let directory = directory_2_5_9();
        assert_eq!(directory.prev(5), 2);
        assert_eq!(directory.prev(200), 9);
    }

    #[test]
    fn test_next_and_prev_at_edges_return_zero() {
        let directory = directory_2_5_9();
        assert_eq!(directory.next(9), 0);
        assert_eq!(directory.prev(2), 0);
        assert_eq!(directory.next(u8::MAX), 0);
    }

    #[test]
    fn test_insert_ignores_names_without_major() {
        // Arrange
        let mut directory = SceneDirectory::new();

        // Act
        let id = directory.insert("Intermission");

        // Assert
        assert!(id.is_absent());
        assert!(directory.is_empty());
    }

    #[test]
    fn test_insert_duplicate_identifier_overwrites() {
        let mut directory = SceneDirectory::new();
        directory.insert("4.1 Old");
        directory.insert("4.1 New");
        assert_eq!(directory.get(SceneId::new(4, 1)), Some("4.1 New"));
    }

    #[test]
    fn test_remove_last_minor_drops_major() {
        // Arrange
        let mut directory = directory_2_5_9();

        // Act
        directory.remove("9 Credits");

        // Assert
        assert_eq!(directory.next(5), 0);
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn test_rename_moves_entry() {
        let mut directory = directory_2_5_9();
        directory.rename("2 Wide", "3 Wide");
        assert_eq!(directory.next(0), 3);
        assert_eq!(directory.get(SceneId::new(3, 0)), Some("3 Wide"));
    }

    // ── Resolution ────────────────────────────────────────────────────────────

    #[test]
    fn test_resolve_prefers_camera_specific_entry() {
        let directory = directory_2_5_9();
        let overrides = SceneOverrides::new();
        assert_eq!(directory.resolve(&overrides, 5, 3), Ok("5.3 Stage cam 3"));
    }

    #[test]
    fn test_resolve_falls_back_to_camera_zero() {
        let directory = directory_2_5_9();
        let overrides = SceneOverrides::new();
        assert_eq!(directory.resolve(&overrides, 5, 7), Ok("5.0 Stage"));
    }

    #[test]
    fn test_resolve_missing_scene_is_error() {
        // Arrange
        let directory = directory_2_5_9();
        let overrides = SceneOverrides::new();

        // Act
        let result = directory.resolve(&overrides, 4, 1);

        // Assert
        assert_eq!(result, Err(SceneError::NotFound { major: 4, camera: 1 }));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Scene 4.1 does not exist."
        );
    }

    #[test]
    fn test_resolve_override_wins_over_directory() {
        // Arrange
        let directory = directory_2_5_9();
        let mut overrides = SceneOverrides::new();
        overrides.set(SceneId::new(5, 0), "Stage with slides");

        // Act / Assert – camera 7 has no specific entry anywhere
        assert_eq!(directory.resolve(&overrides, 5, 7), Ok("Stage with slides"));
    }

    #[test]
    fn test_resolve_override_can_create_missing_scene() {
        let directory = SceneDirectory::new();
        let mut overrides = SceneOverrides::new();
        overrides.set(SceneId::new(8, 0), "Backup feed");
        assert_eq!(directory.resolve(&overrides, 8, 2), Ok("Backup feed"));
    }

    #[test]
    fn test_iter_yields_in_identifier_order() {
        let directory = directory_2_5_9();
        let ids: Vec<SceneId> = directory.iter().map(|(id, _)| id).collect();
        assert_eq!(
            ids,
            vec![
                SceneId::new(2, 0),
                SceneId::new(5, 0),
                SceneId::new(5, 3),
                SceneId::new(9, 0)
            ]
        );
    }
}
