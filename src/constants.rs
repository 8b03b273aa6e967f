// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Application identity
pub mod app_info {
    /// Name used for config and photo folders
    pub const APP_NAME: &str = "mirror";

    /// Folder under the pictures directory photos are saved to
    pub const PHOTO_FOLDER: &str = "Mirror";

    /// Prefix of saved photo file names
    pub const PHOTO_PREFIX: &str = "Mirror";

    /// Title of the save dialog
    pub const SAVE_DIALOG_TITLE: &str = "Save Mirror Snapshot";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

/// Preference store keys
pub mod keys {
    pub const SELECTED_CAMERA_ID: &str = "selected_camera_id";
    pub const MIRRORED: &str = "mirrored";
    pub const PHOTO_FORMAT: &str = "photo_format";
    pub const JPEG_QUALITY: &str = "jpeg_quality";
    pub const SAVE_LOCATION: &str = "save_location";
    pub const SELECTION_POLICY: &str = "selection_policy";
}

/// Capture device limits
pub mod capture {
    use std::time::Duration;

    /// Largest frame size negotiated with a device
    pub const MAX_WIDTH: u32 = 1920;
    pub const MAX_HEIGHT: u32 = 1080;

    /// Memory-mapped buffers per stream
    pub const BUFFER_COUNT: u32 = 4;

    /// How long to wait for a frame before reporting a timeout
    pub const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

    /// Buffers discarded before a still is taken
    pub const STALE_BUFFERS: usize = 1;
}

/// Session worker timing
pub mod timing {
    use std::time::Duration;

    /// Interval between device list polls while a session is active
    pub const DEVICE_POLL_INTERVAL: Duration = Duration::from_secs(2);

    /// Worker wake-up interval when there is nothing to pump
    pub const IDLE_TICK: Duration = Duration::from_millis(100);

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 120;

    /// Default timeout for `flush` and `wait_for_phase`
    ///
    /// Long enough to span a device poll.
    pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);
}

/// Capacity of each preview frame channel; older frames are dropped when full
pub const FRAME_CHANNEL_CAPACITY: usize = 2;

/// Name of the session worker thread
pub const SESSION_QUEUE_NAME: &str = "camera.session.queue";
