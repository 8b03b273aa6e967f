// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands driving the capture session
//!
//! This module provides command-line functionality for:
//! - Listing and selecting cameras
//! - Toggling mirroring
//! - Taking photos
//! - Running a headless preview

use mirror::backends::camera::types::CameraBackendType;
use mirror::backends::camera::{get_backend, get_backend_for_type};
use mirror::backends::permission::get_permission_gate;
use mirror::config::{JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore, SaveLocation};
use mirror::pipelines::photo::{
    DialogSink, EncodingFormat, LibrarySink, PhotoPipeline, PhotoSink, SaveOutcome,
    resolve_dialog_path,
};
use mirror::session::{
    CaptureSessionController, DEFAULT_WAIT, SessionEvent, SessionPhase, choose_device,
};
use mirror::{CaptureError, storage};
use futures::channel::mpsc;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Options shared by every command
pub struct Options {
    pub backend: Option<CameraBackendType>,
    pub ephemeral: bool,
}

pub enum MirrorChange {
    Set(bool),
    Toggle,
}

pub struct PhotoOptions {
    pub camera: Option<String>,
    pub output: Option<PathBuf>,
    pub dialog: bool,
    pub format: Option<EncodingFormat>,
    pub open: bool,
}

fn build_controller(options: &Options) -> Result<CaptureSessionController, Box<dyn std::error::Error>> {
    let backend = match options.backend {
        Some(backend_type) => get_backend_for_type(backend_type),
        None => get_backend(),
    };
    let permission = get_permission_gate(backend.backend_type());
    let store: Arc<dyn PreferenceStore> = if options.ephemeral {
        Arc::new(MemoryPreferenceStore::new())
    } else {
        Arc::new(JsonPreferenceStore::open_default()?)
    };

    Ok(CaptureSessionController::new(backend, permission, store)?)
}

/// Print the user-facing message and pass the error on
fn report(error: CaptureError) -> Box<dyn std::error::Error> {
    eprintln!("{}", error.user_message());
    error.into()
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

/// Start the session, on `camera` when given, and block until it runs or
/// reports why it cannot
///
/// The camera is opened once: an authorized selection queues its own
/// configuration and the following start is a no-op; otherwise the selection
/// is only saved and the start picks it up.
fn start_session(
    controller: &CaptureSessionController,
    camera: Option<&str>,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<(), CaptureError> {
    match camera {
        Some(id) => {
            controller.select_device(id)?;
            controller.start()?;
        }
        None => controller.activate()?,
    }

    if controller.wait_for_phase(SessionPhase::Running, DEFAULT_WAIT) {
        return Ok(());
    }

    let mut failure = None;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Failure(e) = event {
            failure = Some(e);
        }
    }
    Err(failure.unwrap_or_else(|| CaptureError::CaptureFailed("camera did not start".into())))
}

/// List all available cameras
pub fn list_cameras(options: &Options) -> CliResult {
    let controller = build_controller(options)?;
    let devices = controller.enumerate_devices();

    if devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    let selected = controller.selected_device_id();
    let default = choose_device(
        &devices,
        selected.as_deref(),
        &controller.config().selection_policy,
    )
    .ok()
    .map(|device| device.id.clone());

    println!("Available cameras:");
    println!();
    for device in &devices {
        let marker = if default.as_deref() == Some(device.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {}", marker, device.name);
        println!("      Id: {}", device.id);
        println!("      Position: {}", device.position);
        if selected.as_deref() == Some(device.id.as_str()) {
            println!("      Saved choice");
        }
        println!();
    }
    println!("* camera used on start");

    Ok(())
}

/// Persist the camera to use from now on
pub fn select_camera(options: &Options, id: &str) -> CliResult {
    let controller = build_controller(options)?;
    controller.select_device(id).map_err(report)?;
    println!("Selected camera: {}", id);
    Ok(())
}

/// Show or change the mirror setting
pub fn mirror_setting(options: &Options, change: Option<MirrorChange>) -> CliResult {
    let controller = build_controller(options)?;
    let mirrored = match change {
        Some(MirrorChange::Set(value)) => {
            controller.set_mirrored(value);
            value
        }
        Some(MirrorChange::Toggle) => controller.toggle_mirrored(),
        None => controller.is_mirrored(),
    };
    println!("Mirroring: {}", on_off(mirrored));
    Ok(())
}

/// Print preferences and what the session would start with
pub fn status(options: &Options) -> CliResult {
    let controller = build_controller(options)?;
    let snapshot = controller.snapshot();
    let config = controller.config();
    let devices = controller.enumerate_devices();

    println!("Version: {}", mirror::constants::app_info::version());
    println!("Camera access: {}", snapshot.authorization);
    println!("Cameras attached: {}", devices.len());
    println!(
        "Saved camera: {}",
        config.selected_camera_id.as_deref().unwrap_or("none")
    );
    println!("Mirroring: {}", on_off(snapshot.mirrored));
    println!("Photo format: {}", config.photo_format.display_name());
    println!("JPEG quality: {:?}", config.jpeg_quality);
    println!("Save to: {:?}", config.save_location);

    if let Some(dir) = storage::photo_library_dir() {
        println!("Photo library: {}", dir.display());
        let runtime = tokio::runtime::Runtime::new()?;
        if let Some(latest) = runtime.block_on(storage::latest_photo(dir)) {
            println!("Latest photo: {}", latest.display());
        }
    }

    Ok(())
}

/// Take a photo and save it
pub fn take_photo(options: &Options, photo_options: PhotoOptions) -> CliResult {
    let controller = build_controller(options)?;
    let mut events = controller.subscribe();

    start_session(&controller, photo_options.camera.as_deref(), &mut events).map_err(report)?;

    if let Some(device) = controller.snapshot().active_device() {
        println!("Using camera: {}", device.name);
    }

    let mut request = controller.default_photo_request();
    if let Some(format) = photo_options.format {
        request.format = format;
    }

    // An output path with an extension is written as-is, in the format it names
    let output_file = match &photo_options.output {
        Some(path) if !path.is_dir() && path.extension().is_some() => {
            let (path, format) = resolve_dialog_path(path.clone(), request.format);
            request.format = format;
            Some(path)
        }
        _ => None,
    };

    println!("Capturing...");
    let runtime = tokio::runtime::Runtime::new()?;
    let photo = runtime
        .block_on(controller.capture_with_async(request))
        .map_err(report)?;
    controller.shutdown();
    println!("Captured {}x{} {:?}", photo.width, photo.height, photo.format);

    let outcome = if let Some(path) = output_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &photo.data[..])?;
        SaveOutcome::Saved(path)
    } else {
        let sink: Arc<dyn PhotoSink> = match (&photo_options.output, photo_options.dialog) {
            (_, true) => Arc::new(DialogSink::new()),
            (Some(dir), false) => Arc::new(LibrarySink::new(dir)),
            (None, false) => match controller.config().save_location {
                SaveLocation::Library => Arc::new(LibrarySink::in_pictures().map_err(report)?),
                SaveLocation::Dialog => Arc::new(DialogSink::new()),
            },
        };
        runtime
            .block_on(PhotoPipeline::save(photo, sink))
            .map_err(report)?
    };

    match outcome {
        SaveOutcome::Saved(path) => {
            println!("Photo saved: {}", path.display());
            if photo_options.open {
                open::that(&path)?;
            }
        }
        SaveOutcome::Cancelled => println!("Save cancelled."),
    }

    Ok(())
}

/// Run the session and report frame rate until stopped
pub fn preview(options: &Options, seconds: Option<u64>) -> CliResult {
    let controller = build_controller(options)?;
    let mut events = controller.subscribe();
    let mut frames = controller.subscribe_frames();

    start_session(&controller, None, &mut events).map_err(report)?;
    if let Some(device) = controller.snapshot().active_device() {
        println!("Previewing: {} (mirroring {})", device.name, on_off(controller.is_mirrored()));
    }
    println!("Press Ctrl+C to stop");

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let start = Instant::now();
    let limit = seconds.map(Duration::from_secs);
    let mut window_start = Instant::now();
    let mut window_frames = 0u32;
    let mut last_size = (0, 0);

    while !stop_flag.load(Ordering::SeqCst) && limit.is_none_or(|limit| start.elapsed() < limit) {
        while let Ok(event) = events.try_recv() {
            match event {
                SessionEvent::Failure(e) => eprintln!("\n{}", e.user_message()),
                SessionEvent::ActiveDeviceChanged(Some(device)) => {
                    println!("\nSwitched to: {}", device.name)
                }
                SessionEvent::ActiveDeviceChanged(None) => println!("\nNo active camera"),
                SessionEvent::DevicesChanged(devices) => {
                    println!("\nCameras attached: {}", devices.len())
                }
                _ => {}
            }
        }

        match frames.try_recv() {
            Ok(frame) => {
                window_frames += 1;
                last_size = (frame.width, frame.height);
            }
            Err(_) => std::thread::sleep(Duration::from_millis(5)),
        }

        let elapsed = window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = window_frames as f64 / elapsed.as_secs_f64();
            print!(
                "\r{}x{} @ {:.1} fps   ",
                last_size.0, last_size.1, fps
            );
            std::io::Write::flush(&mut std::io::stdout())?;
            window_start = Instant::now();
            window_frames = 0;
        }
    }
    println!();

    controller.shutdown();
    println!("Preview stopped");
    Ok(())
}
