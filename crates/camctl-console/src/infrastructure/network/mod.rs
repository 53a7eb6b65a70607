//! Device transports: camera UDP, matrix HTTP and the scene switcher WebSocket.

pub mod camera_udp;
pub mod matrix_http;
pub mod scene_ws;
