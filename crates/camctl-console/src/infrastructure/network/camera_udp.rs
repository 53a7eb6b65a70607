//! UDP transport for PTZ cameras.
//!
//! Each camera gets its own socket, bound to an ephemeral local port and
//! connected to the camera's address.  Connecting filters inbound traffic so
//! only the camera's own replies reach the liveness listener.
//!
//! # Liveness (for beginners)
//!
//! A camera answers every command with an ACK and later a completion
//! datagram.  The console does not decode them: *any* datagram from a camera
//! proves the last command arrived, so the listener just forwards the camera
//! id and the scheduler stops waiting for its timeout.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::camera_control::{CameraTransport, TransportError};

/// Largest datagram a camera is expected to send.
const RECV_BUFFER_LEN: usize = 1024;

/// Error type for setting up a camera socket.
#[derive(Debug, Error)]
pub enum CameraUdpError {
    /// The host name could not be resolved.
    #[error("failed to resolve camera address {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// Resolution succeeded but produced no address.
    #[error("camera address {0} resolved to nothing")]
    NoAddress(String),
    /// The local socket could not be bound or connected.
    #[error("failed to open camera socket for {addr}: {source}")]
    Socket {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Non-blocking datagram sink for one camera.
#[derive(Debug, Clone)]
pub struct UdpCameraTransport {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
}

impl UdpCameraTransport {
    /// Resolves `host:port` and opens a socket connected to it.
    ///
    /// # Errors
    ///
    /// Returns [`CameraUdpError`] if resolution, binding or connecting fails.
    pub async fn connect(host: &str, port: u16) -> Result<Self, CameraUdpError> {
        let addr = format!("{host}:{port}");
        let target = tokio::net::lookup_host(&addr)
            .await
            .map_err(|source| CameraUdpError::Resolve {
                addr: addr.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| CameraUdpError::NoAddress(addr.clone()))?;

        let local: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| CameraUdpError::Socket { addr: target, source })?;
        socket
            .connect(target)
            .await
            .map_err(|source| CameraUdpError::Socket { addr: target, source })?;

        info!("camera socket connected to {target}");
        Ok(Self {
            socket: Arc::new(socket),
            target,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Local address of the socket; replies must be sent here.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns a task that forwards `camera_id` on `signals` for every datagram
    /// received from the camera.
    ///
    /// The task ends when the receiver side of `signals` is dropped.
    pub fn spawn_liveness_listener(
        &self,
        camera_id: u8,
        signals: mpsc::UnboundedSender<u8>,
    ) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let target = self.target;
        tokio::spawn(async move {
            let mut buf = vec![0u8; RECV_BUFFER_LEN];
            loop {
                match socket.recv(&mut buf).await {
                    Ok(len) => {
                        debug!(camera_id, len, "datagram from camera {target}");
                        if signals.send(camera_id).is_err() {
                            break;
                        }
                    }
                    // ICMP port unreachable surfaces here on some platforms.
                    Err(e) => {
                        warn!("camera {camera_id} recv error: {e}");
                        if signals.is_closed() {
                            break;
                        }
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }
        })
    }
}

impl CameraTransport for UdpCameraTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let written = self.socket.try_send(frame)?;
        if written != frame.len() {
            return Err(TransportError::Send(format!(
                "short write to {}: {written} of {} bytes",
                self.target,
                frame.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn fake_camera() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    #[tokio::test]
    async fn test_send_delivers_frame_to_camera() {
        // Arrange
        let (camera, port) = fake_camera().await;
        let mut transport = UdpCameraTransport::connect("127.0.0.1", port).await.unwrap();
        let frame = [0x81, 0x01, 0x06, 0x01, 0x01, 0x01, 0x03, 0x03, 0xFF];

        // Act
        transport.send(&frame).unwrap();

        // Assert
        let mut buf = [0u8; 64];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), camera.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], &frame);
    }

    #[tokio::test]
    async fn test_reply_from_camera_raises_liveness_signal() {
        // Arrange
        let (camera, port) = fake_camera().await;
        let transport = UdpCameraTransport::connect("127.0.0.1", port).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = transport.spawn_liveness_listener(4, tx);
        let reply_to = SocketAddr::from(([127, 0, 0, 1], transport.local_addr().unwrap().port()));

        // Act
        camera.send_to(&[0x90, 0x41, 0xFF], reply_to).await.unwrap();

        // Assert
        let id = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(id, Some(4));
        handle.abort();
    }

    #[tokio::test]
    async fn test_connect_to_unresolvable_host_fails() {
        let result = UdpCameraTransport::connect("camera.invalid", 52381).await;
        assert!(result.is_err());
    }
}
