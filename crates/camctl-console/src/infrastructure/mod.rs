//! Infrastructure layer: config storage, device transports and operator input.

pub mod input;
pub mod network;
pub mod storage;
