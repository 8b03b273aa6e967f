// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the capture session controller

use futures::channel::mpsc;
use mirror::backends::camera::types::{DeviceDescriptor, DevicePosition, FlashMode, PhotoSettings};
use mirror::backends::camera::virtual_camera::{
    DEFAULT_HEIGHT, DEFAULT_WIDTH, VirtualBackend, test_pattern,
};
use mirror::backends::permission::{AuthorizationStatus, StaticPermission};
use mirror::config::{MemoryPreferenceStore, PreferenceStore};
use mirror::pipelines::photo::EncodingFormat;
use mirror::session::{CaptureSessionController, DEFAULT_WAIT, PhotoRequest};
use mirror::{CaptureError, SessionEvent, SessionPhase};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn facetime_and_iphone() -> VirtualBackend {
    VirtualBackend::new(vec![
        DeviceDescriptor::new("A", "FaceTime HD", DevicePosition::Front),
        DeviceDescriptor::new("B", "Continuity iPhone", DevicePosition::Unspecified),
    ])
}

fn three_cameras() -> VirtualBackend {
    VirtualBackend::new(vec![
        DeviceDescriptor::new("A", "Integrated Camera", DevicePosition::Front),
        DeviceDescriptor::new("B", "USB Webcam", DevicePosition::Unspecified),
        DeviceDescriptor::new("C", "Capture Card", DevicePosition::Unspecified),
    ])
}

fn controller_with(
    backend: &VirtualBackend,
    store: Arc<dyn PreferenceStore>,
) -> CaptureSessionController {
    CaptureSessionController::new(
        Arc::new(backend.clone()),
        Arc::new(StaticPermission::authorized()),
        store,
    )
    .unwrap()
}

fn controller(backend: &VirtualBackend) -> CaptureSessionController {
    controller_with(backend, Arc::new(MemoryPreferenceStore::new()))
}

fn running(backend: &VirtualBackend) -> CaptureSessionController {
    let controller = controller(backend);
    controller.activate().unwrap();
    assert!(controller.wait_for_phase(SessionPhase::Running, DEFAULT_WAIT));
    controller
}

fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

fn failures(events: &[SessionEvent]) -> Vec<CaptureError> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Failure(e) => Some(e.clone()),
            _ => None,
        })
        .collect()
}

fn active_id(controller: &CaptureSessionController) -> Option<String> {
    controller.snapshot().active_device_id
}

/// Poll the snapshot until `ready` holds or `timeout` passes
fn wait_until(
    controller: &CaptureSessionController,
    timeout: Duration,
    ready: impl Fn(&mirror::SessionSnapshot) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if ready(&controller.snapshot()) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn running_on(snapshot: &mirror::SessionSnapshot, id: &str) -> bool {
    snapshot.phase == SessionPhase::Running && snapshot.active_device_id.as_deref() == Some(id)
}

#[test]
fn test_fallback_prefers_front_camera_over_linked_phone() {
    let backend = facetime_and_iphone();
    let controller = running(&backend);

    assert_eq!(active_id(&controller).as_deref(), Some("A"));
    // Fallback choice is not written back as the user's choice
    assert_eq!(controller.selected_device_id(), None);
}

#[test]
fn test_linked_phone_used_when_it_is_the_only_camera() {
    let backend = VirtualBackend::new(vec![DeviceDescriptor::new(
        "B",
        "Continuity iPhone",
        DevicePosition::Unspecified,
    )]);
    let controller = running(&backend);
    assert_eq!(active_id(&controller).as_deref(), Some("B"));
}

#[test]
fn test_select_succeeds_only_for_enumerated_ids() {
    let backend = three_cameras();
    let controller = running(&backend);
    let mut events = controller.subscribe();

    for id in ["B", "C", "A"] {
        controller.select_device(id).unwrap();
        assert!(controller.flush(DEFAULT_WAIT));
        assert_eq!(active_id(&controller).as_deref(), Some(id));
    }

    let rejected = controller.select_device("Z");
    assert_eq!(rejected, Err(CaptureError::DeviceUnavailable("Z".into())));
    assert!(controller.flush(DEFAULT_WAIT));
    assert_eq!(active_id(&controller).as_deref(), Some("A"));
    assert_eq!(controller.selected_device_id().as_deref(), Some("A"));
    assert_eq!(controller.snapshot().phase, SessionPhase::Running);

    assert_eq!(
        failures(&drain(&mut events)),
        vec![CaptureError::DeviceUnavailable("Z".into())]
    );
}

#[test]
fn test_mirror_and_device_are_independent() {
    let backend = three_cameras();
    let controller = running(&backend);
    let opened = backend.open_log().len();

    let before = active_id(&controller);
    assert!(controller.is_mirrored());
    assert!(!controller.toggle_mirrored());
    controller.set_mirrored(true);
    assert!(controller.flush(DEFAULT_WAIT));
    assert_eq!(active_id(&controller), before);
    // Mirroring never reopens the camera
    assert_eq!(backend.open_log().len(), opened);

    controller.set_mirrored(false);
    controller.select_device("C").unwrap();
    assert!(controller.flush(DEFAULT_WAIT));
    assert!(!controller.is_mirrored());
    assert!(!controller.snapshot().mirrored);
}

#[test]
fn test_mirror_change_published_once() {
    let backend = VirtualBackend::with_default_devices();
    let controller = controller(&backend);
    let mut events = controller.subscribe();

    controller.set_mirrored(false);
    controller.set_mirrored(false);

    let changes: Vec<bool> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::MirrorChanged(mirrored) => Some(mirrored),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![false]);
}

#[test]
fn test_selection_and_mirror_survive_restart() {
    let backend = three_cameras();
    let store: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());

    {
        let controller = controller_with(&backend, Arc::clone(&store));
        controller.activate().unwrap();
        controller.select_device("C").unwrap();
        controller.set_mirrored(false);
        assert!(controller.flush(DEFAULT_WAIT));
    }
    assert_eq!(backend.open_inputs(), 0);

    let controller = controller_with(&backend, Arc::clone(&store));
    assert!(!controller.is_mirrored());
    controller.activate().unwrap();
    assert!(controller.wait_for_phase(SessionPhase::Running, DEFAULT_WAIT));
    assert_eq!(active_id(&controller).as_deref(), Some("C"));
}

#[test]
fn test_restart_without_persisted_device_falls_back() {
    let backend = three_cameras();
    let store: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());

    {
        let controller = controller_with(&backend, Arc::clone(&store));
        controller.select_device("C").unwrap();
    }
    backend.unplug("C");

    let controller = controller_with(&backend, Arc::clone(&store));
    controller.activate().unwrap();
    assert!(controller.wait_for_phase(SessionPhase::Running, DEFAULT_WAIT));
    assert_eq!(active_id(&controller).as_deref(), Some("A"));
    // The stale choice is kept for when the camera comes back
    assert_eq!(controller.selected_device_id().as_deref(), Some("C"));
}

#[test]
fn test_capture_while_stopped_fails() {
    let backend = VirtualBackend::with_default_devices();
    let controller = running(&backend);
    controller.stop();
    assert!(controller.flush(DEFAULT_WAIT));
    assert_eq!(controller.snapshot().phase, SessionPhase::Stopped);

    let result = futures::executor::block_on(controller.capture_photo_async());
    assert!(matches!(result, Err(CaptureError::CaptureFailed(_))));
}

#[test]
fn test_capture_while_configuring_is_device_unavailable() {
    let backend = three_cameras();
    let controller = running(&backend);

    backend.set_open_delay(Duration::from_millis(500));
    controller.select_device("B").unwrap();
    assert!(controller.wait_for_phase(SessionPhase::Configuring, DEFAULT_WAIT));

    let result = futures::executor::block_on(controller.capture_photo_async());
    assert!(matches!(result, Err(CaptureError::DeviceUnavailable(_))));

    assert!(controller.wait_for_phase(SessionPhase::Running, DEFAULT_WAIT));
    assert_eq!(active_id(&controller).as_deref(), Some("B"));
}

#[test]
fn test_capture_when_never_activated_fails() {
    let backend = VirtualBackend::with_default_devices();
    let controller = controller(&backend);

    let result = futures::executor::block_on(controller.capture_photo_async());
    assert!(matches!(result, Err(CaptureError::CaptureFailed(_))));
}

#[test]
fn test_mirrored_capture_is_flipped() {
    let backend = VirtualBackend::with_default_devices();
    let controller = running(&backend);
    controller.set_mirrored(true);

    let request = PhotoRequest {
        format: EncodingFormat::Png,
        ..PhotoRequest::default()
    };
    let photo = futures::executor::block_on(controller.capture_with_async(request)).unwrap();
    assert!(photo.mirrored);
    assert_eq!(photo.device_id, "virtual:front");

    let decoded = image::load_from_memory(&photo.data).unwrap().to_rgba8();
    let raw = test_pattern(DEFAULT_WIDTH, DEFAULT_HEIGHT);
    let width = DEFAULT_WIDTH as usize;
    for x in 0..DEFAULT_WIDTH {
        let mirrored_x = width - 1 - x as usize;
        assert_eq!(decoded.get_pixel(x, 0)[0], raw[mirrored_x * 4]);
    }
}

#[test]
fn test_unmirrored_capture_matches_sensor() {
    let backend = VirtualBackend::with_default_devices();
    let controller = running(&backend);
    controller.set_mirrored(false);

    let request = PhotoRequest {
        format: EncodingFormat::Png,
        ..PhotoRequest::default()
    };
    let photo = futures::executor::block_on(controller.capture_with_async(request)).unwrap();
    assert!(!photo.mirrored);

    let decoded = image::load_from_memory(&photo.data).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0)[0], 0);
    assert_eq!(decoded.get_pixel(DEFAULT_WIDTH - 1, 0)[0], 255);
}

#[test]
fn test_capture_passes_settings_and_publishes_photo() {
    let backend = VirtualBackend::with_default_devices();
    let controller = running(&backend);
    let mut events = controller.subscribe();

    let request = PhotoRequest {
        settings: PhotoSettings {
            flash: FlashMode::Auto,
        },
        ..PhotoRequest::default()
    };
    let photo = futures::executor::block_on(controller.capture_with_async(request)).unwrap();
    assert_eq!(photo.format, EncodingFormat::Jpeg);
    assert_eq!(
        backend.last_photo_settings().map(|s| s.flash),
        Some(FlashMode::Auto)
    );

    assert!(controller.flush(DEFAULT_WAIT));
    let published = drain(&mut events)
        .into_iter()
        .any(|event| matches!(event, SessionEvent::PhotoCaptured(_)));
    assert!(published);
}

#[test]
fn test_capture_failure_is_reported() {
    let backend = VirtualBackend::with_default_devices();
    backend.fail_capture("virtual:front", true);
    let controller = running(&backend);

    let (tx, rx) = std::sync::mpsc::channel();
    controller.capture_photo(move |result| {
        let _ = tx.send(result);
    });
    let result = rx.recv_timeout(DEFAULT_WAIT).unwrap();
    assert!(matches!(result, Err(CaptureError::CaptureFailed(_))));
    // A failed capture leaves the session running
    assert_eq!(controller.snapshot().phase, SessionPhase::Running);
}

#[test]
fn test_rapid_reselection_ends_on_last_device() {
    let backend = three_cameras();
    let controller = running(&backend);
    let mut events = controller.subscribe();

    controller.select_device("B").unwrap();
    controller.select_device("C").unwrap();
    assert!(controller.flush(DEFAULT_WAIT));

    assert_eq!(active_id(&controller).as_deref(), Some("C"));
    assert_eq!(controller.snapshot().phase, SessionPhase::Running);
    assert_eq!(backend.max_open_inputs(), 1);
    assert_eq!(backend.open_inputs(), 1);
    assert_eq!(backend.open_log(), vec!["A", "B", "C"]);

    let active_changes: Vec<Option<String>> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::ActiveDeviceChanged(device) => Some(device.map(|d| d.id)),
            _ => None,
        })
        .collect();
    assert_eq!(
        active_changes.last().cloned().flatten().as_deref(),
        Some("C")
    );
}

#[test]
fn test_unplugged_device_falls_back() {
    let backend = three_cameras();
    let controller = running(&backend);
    controller.select_device("B").unwrap();
    assert!(controller.flush(DEFAULT_WAIT));
    let mut events = controller.subscribe();

    backend.unplug("B");
    controller.refresh_devices();
    assert!(controller.flush(DEFAULT_WAIT));

    assert_eq!(active_id(&controller).as_deref(), Some("A"));
    assert_eq!(controller.snapshot().phase, SessionPhase::Running);
    assert_eq!(backend.open_inputs(), 1);

    let events = drain(&mut events);
    assert!(
        failures(&events).contains(&CaptureError::DeviceUnavailable("USB Webcam".into()))
    );
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::DevicesChanged(devices) if devices.len() == 2
    )));
}

#[test]
fn test_unplugging_last_device_stops_session() {
    let backend = VirtualBackend::new(vec![DeviceDescriptor::new(
        "only",
        "Only Camera",
        DevicePosition::Front,
    )]);
    let controller = running(&backend);
    let mut events = controller.subscribe();

    backend.unplug("only");
    controller.refresh_devices();
    assert!(controller.flush(DEFAULT_WAIT));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Stopped);
    assert_eq!(snapshot.active_device_id, None);
    assert_eq!(backend.open_inputs(), 0);
    assert_eq!(
        failures(&drain(&mut events)),
        vec![
            CaptureError::DeviceUnavailable("Only Camera".into()),
            CaptureError::NoDeviceAvailable
        ]
    );
}

#[test]
fn test_capture_after_unplug_falls_back() {
    let backend = three_cameras();
    let controller = running(&backend);
    let mut events = controller.subscribe();

    backend.unplug("A");
    let result = futures::executor::block_on(controller.capture_photo_async());
    assert_eq!(
        result.err(),
        Some(CaptureError::DeviceUnavailable("Integrated Camera".into()))
    );

    assert!(controller.flush(DEFAULT_WAIT));
    assert!(running_on(&controller.snapshot(), "B"));
    assert_eq!(backend.open_inputs(), 1);
    assert!(
        failures(&drain(&mut events))
            .contains(&CaptureError::DeviceUnavailable("Integrated Camera".into()))
    );

    let photo = futures::executor::block_on(controller.capture_photo_async()).unwrap();
    assert_eq!(photo.device_id, "B");
}

#[test]
fn test_streaming_disconnect_falls_back() {
    let backend = three_cameras();
    let controller = controller(&backend);
    let _frames = controller.subscribe_frames();
    controller.activate().unwrap();
    assert!(controller.wait_for_phase(SessionPhase::Running, DEFAULT_WAIT));
    let mut events = controller.subscribe();

    backend.unplug("A");
    // Shorter than the device poll interval
    assert!(wait_until(&controller, Duration::from_secs(1), |s| running_on(s, "B")));

    assert_eq!(backend.open_inputs(), 1);
    assert!(
        failures(&drain(&mut events))
            .contains(&CaptureError::DeviceUnavailable("Integrated Camera".into()))
    );
}

#[test]
fn test_device_poll_detects_unplug() {
    let backend = three_cameras();
    let controller = running(&backend);
    let mut events = controller.subscribe();

    backend.unplug("A");
    assert!(wait_until(&controller, DEFAULT_WAIT, |s| running_on(s, "B")));

    let events = drain(&mut events);
    assert!(failures(&events).contains(&CaptureError::DeviceUnavailable("Integrated Camera".into())));
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::DevicesChanged(devices) if devices.len() == 2
    )));
}

#[test]
fn test_photo_uses_sensor_frame_size() {
    let backend = VirtualBackend::with_default_devices();
    backend.set_frame_size(32, 16);
    let controller = running(&backend);

    let request = PhotoRequest {
        format: EncodingFormat::Png,
        ..PhotoRequest::default()
    };
    let photo = futures::executor::block_on(controller.capture_with_async(request)).unwrap();
    let decoded = image::load_from_memory(&photo.data).unwrap();
    assert_eq!((photo.width, photo.height), (32, 16));
    assert_eq!((decoded.width(), decoded.height()), (32, 16));
}

#[test]
fn test_preview_frames_are_mirrored() {
    let backend = VirtualBackend::with_default_devices();
    let controller = controller(&backend);
    let mut frames = controller.subscribe_frames();
    controller.activate().unwrap();

    let frame = futures::executor::block_on(futures::StreamExt::next(&mut frames)).unwrap();
    assert!(frame.mirrored);
    assert_eq!((frame.width, frame.height), (DEFAULT_WIDTH, DEFAULT_HEIGHT));
    assert_eq!(frame.data[0], 255);
}

#[test]
fn test_permission_denied_blocks_activation() {
    let backend = VirtualBackend::with_default_devices();
    let controller = CaptureSessionController::new(
        Arc::new(backend.clone()),
        Arc::new(StaticPermission::denied()),
        Arc::new(MemoryPreferenceStore::new()),
    )
    .unwrap();
    let mut events = controller.subscribe();

    assert_eq!(controller.activate(), Err(CaptureError::PermissionDenied));
    assert_eq!(controller.start(), Err(CaptureError::PermissionDenied));
    assert!(controller.flush(DEFAULT_WAIT));

    assert_eq!(controller.snapshot().phase, SessionPhase::Idle);
    assert_eq!(controller.snapshot().authorization, AuthorizationStatus::Denied);
    assert!(backend.open_log().is_empty());
    assert_eq!(
        failures(&drain(&mut events)),
        vec![CaptureError::PermissionDenied, CaptureError::PermissionDenied]
    );
}

#[test]
fn test_undecided_permission_prompts_once() {
    let backend = VirtualBackend::with_default_devices();
    let permission = Arc::new(StaticPermission::new(AuthorizationStatus::NotDetermined, true));
    let controller = CaptureSessionController::new(
        Arc::new(backend.clone()),
        permission.clone(),
        Arc::new(MemoryPreferenceStore::new()),
    )
    .unwrap();
    assert_eq!(
        controller.snapshot().authorization,
        AuthorizationStatus::NotDetermined
    );

    // Selection before consent is remembered, not applied
    controller.select_device("virtual:external").unwrap();
    assert!(controller.flush(DEFAULT_WAIT));
    assert!(backend.open_log().is_empty());

    controller.activate().unwrap();
    assert!(controller.wait_for_phase(SessionPhase::Running, DEFAULT_WAIT));
    assert_eq!(
        controller.snapshot().authorization,
        AuthorizationStatus::Authorized
    );
    assert_eq!(active_id(&controller).as_deref(), Some("virtual:external"));
}

#[test]
fn test_phase_transitions_are_published_in_order() {
    let backend = VirtualBackend::with_default_devices();
    let controller = controller(&backend);
    let mut events = controller.subscribe();

    controller.activate().unwrap();
    controller.select_device("virtual:external").unwrap();
    controller.stop();
    assert!(controller.flush(DEFAULT_WAIT));

    let phases: Vec<SessionPhase> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::StateChanged(phase) => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            SessionPhase::Configuring,
            SessionPhase::Running,
            SessionPhase::Configuring,
            SessionPhase::Running,
            SessionPhase::Stopped,
        ]
    );
}
