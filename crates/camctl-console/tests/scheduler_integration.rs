//! Integration tests for camera command scheduling.
//!
//! Drives [`CameraControl`] through its public API with recording transports
//! and a paused Tokio clock, checking ordering, the single outstanding
//! deadline and strict-transport sequence numbers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use camctl_console::application::camera_control::{
    CameraControl, CameraLink, CameraTransport, TransportError,
};
use camctl_console::application::intent::{CameraIntent, MoveDirection};
use camctl_console::application::status::{Severity, StatusMessage, StatusReporter};
use camctl_core::{CameraLimits, SpeedRounding, ViscaVariant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_millis(500);

const POWER_ON: [u8; 6] = [0x81, 0x01, 0x04, 0x00, 0x02, 0xFF];
const AUTO_FOCUS: [u8; 6] = [0x81, 0x01, 0x04, 0x38, 0x02, 0xFF];

// ── Test doubles ──────────────────────────────────────────────────────────────

/// Records every datagram; optionally fails every send.
#[derive(Clone, Default)]
struct RecordingTransport {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
    fail: bool,
}

impl RecordingTransport {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().unwrap().clone()
    }
}

impl CameraTransport for RecordingTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::Send("network unreachable".to_string()));
        }
        self.frames.lock().unwrap().push(frame.to_vec());
        Ok(())
    }
}

fn build(
    cameras: Vec<(ViscaVariant, RecordingTransport)>,
) -> (CameraControl, UnboundedReceiver<StatusMessage>) {
    let (status, rx) = StatusReporter::channel();
    let links = cameras
        .into_iter()
        .enumerate()
        .map(|(i, (variant, transport))| {
            CameraLink::new(i as u8 + 1, CameraLimits::default(), variant, Box::new(transport))
        })
        .collect();
    (
        CameraControl::new(links, SpeedRounding::Truncate, TIMEOUT, status),
        rx,
    )
}

fn errors(rx: &mut UnboundedReceiver<StatusMessage>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if message.severity == Severity::Error {
            out.push(message.text);
        }
    }
    out
}

/// Sequence number carried by a strict datagram.
fn sequence_of(frame: &[u8]) -> u32 {
    u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]])
}

// ── Ordering and the deadline ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_startup_powers_cameras_one_per_timeout_in_order() {
    // Arrange
    let transports: Vec<RecordingTransport> = (0..3).map(|_| RecordingTransport::default()).collect();
    let (mut control, _rx) = build(
        transports
            .iter()
            .map(|t| (ViscaVariant::Loose, t.clone()))
            .collect(),
    );
    let start = Instant::now();

    // Act
    control.startup();

    // Assert: one command in flight, one deadline, the rest waiting.
    assert_eq!(transports[0].frames(), vec![POWER_ON.to_vec()]);
    assert!(transports[1].frames().is_empty());
    assert_eq!(control.deadline(), Some(start + TIMEOUT));
    assert_eq!(control.pending(), 2);

    // Act: let the deadline pass.
    tokio::time::sleep_until(control.deadline().unwrap()).await;
    control.on_timeout();

    // Assert
    assert_eq!(transports[1].frames(), vec![POWER_ON.to_vec()]);
    assert!(transports[2].frames().is_empty());

    // Act: a reply arrives well before the second deadline.
    tokio::time::advance(Duration::from_millis(20)).await;
    control.on_liveness_signal();

    // Assert
    assert_eq!(transports[2].frames(), vec![POWER_ON.to_vec()]);
    assert_eq!(control.pending(), 0);
    assert_eq!(
        control.deadline(),
        Some(start + TIMEOUT + Duration::from_millis(20) + TIMEOUT)
    );
}

#[tokio::test(start_paused = true)]
async fn test_idle_after_last_timeout_sends_next_intent_immediately() {
    // Arrange
    let transport = RecordingTransport::default();
    let (mut control, _rx) = build(vec![(ViscaVariant::Loose, transport.clone())]);
    control.handle(CameraIntent::Power(true));
    tokio::time::sleep(TIMEOUT).await;
    control.on_timeout();
    assert_eq!(control.deadline(), None);

    // Act
    control.handle(CameraIntent::FocusAuto);

    // Assert
    assert_eq!(transport.frames().len(), 2);
    assert_eq!(transport.frames()[1], AUTO_FOCUS.to_vec());
    assert!(control.deadline().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_collapsed_thunk_lets_next_command_out_in_same_call() {
    // Arrange: a centred stick on a still camera transmits nothing.
    let transport = RecordingTransport::default();
    let (mut control, _rx) = build(vec![(ViscaVariant::Loose, transport.clone())]);

    // Act
    control.handle(CameraIntent::PanTilt { x: 0.0, y: 0.0 });

    // Assert
    assert!(transport.frames().is_empty());
    assert_eq!(control.deadline(), None);

    // Act
    control.handle(CameraIntent::Move(MoveDirection::Up));

    // Assert
    assert_eq!(transport.frames().len(), 1);
    assert!(control.deadline().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_analog_updates_coalesce_into_latest_position() {
    // Arrange: keep the scheduler busy so the stick thunk has to wait.
    let transport = RecordingTransport::default();
    let (mut control, _rx) = build(vec![(ViscaVariant::Loose, transport.clone())]);
    control.handle(CameraIntent::Power(true));

    // Act
    for i in 1..=10 {
        control.handle(CameraIntent::PanTilt {
            x: f64::from(i) / 10.0,
            y: 0.0,
        });
    }

    // Assert: ten updates, one queued thunk.
    assert_eq!(control.pending(), 1);
    assert_eq!(control.session().controller().pan_axis, 1.0);

    // Act
    control.on_liveness_signal();

    // Assert: exactly one move went out after the power-on, followed by the
    // queued auto-focus check.
    assert_eq!(transport.frames().len(), 2);
    assert_eq!(control.pending(), 1);

    // Act: the camera is in auto focus already, so the check sends nothing.
    control.on_timeout();

    // Assert
    assert_eq!(transport.frames().len(), 2);
    assert_eq!(control.pending(), 0);
    assert_eq!(control.deadline(), None);
}

#[tokio::test(start_paused = true)]
async fn test_clear_drops_queue_and_next_intent_starts_fresh() {
    // Arrange
    let transport = RecordingTransport::default();
    let (mut control, _rx) = build(vec![(ViscaVariant::Loose, transport.clone())]);
    control.handle(CameraIntent::Power(true));
    control.handle(CameraIntent::Zoom {
        zoom_in: 1.0,
        zoom_out: 0.0,
    });
    control.handle(CameraIntent::FocusAuto);

    // Act
    control.clear();

    // Assert
    assert_eq!(control.pending(), 0);
    assert_eq!(control.deadline(), None);

    // Act: the coalesced zoom flag was reset with the queue.
    control.handle(CameraIntent::Zoom {
        zoom_in: 1.0,
        zoom_out: 0.0,
    });

    // Assert
    assert_eq!(transport.frames().len(), 2);
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_reported_and_still_waits_a_timeout() {
    // Arrange
    let (mut control, mut rx) = build(vec![(ViscaVariant::Loose, RecordingTransport::failing())]);

    // Act
    control.handle(CameraIntent::Power(true));
    control.handle(CameraIntent::FocusAuto);

    // Assert
    assert!(control.deadline().is_some());
    assert_eq!(control.pending(), 1);
    let errors = errors(&mut rx);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("network unreachable"));
}

#[tokio::test(start_paused = true)]
async fn test_preset_out_of_range_sends_nothing_and_does_not_wait() {
    // Arrange
    let transport = RecordingTransport::default();
    let (mut control, mut rx) = build(vec![(ViscaVariant::Loose, transport.clone())]);

    // Act
    control.handle(CameraIntent::CallPreset(300));

    // Assert
    assert!(transport.frames().is_empty());
    assert_eq!(control.deadline(), None);
    assert_eq!(errors(&mut rx).len(), 1);
}

// ── Strict transport ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_strict_sequence_numbers_advance_only_on_transmit() {
    // Arrange
    let transport = RecordingTransport::default();
    let (mut control, _rx) = build(vec![(ViscaVariant::Strict, transport.clone())]);

    // Act: power on, a no-op stick, a rejected preset, then auto focus.
    control.handle(CameraIntent::Power(true));
    control.on_liveness_signal();
    control.handle(CameraIntent::PanTilt { x: 0.0, y: 0.0 });
    control.handle(CameraIntent::CallPreset(999));
    control.handle(CameraIntent::FocusAuto);

    // Assert
    let frames = transport.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(sequence_of(&frames[0]), 1);
    assert_eq!(sequence_of(&frames[1]), 2);
    assert_eq!(&frames[1][8..], &AUTO_FOCUS);
}
