//! Domain entities with no I/O: camera ranges and speed mapping.

pub mod camera;
