// SPDX-License-Identifier: MPL-2.0

//! Capture session
//!
//! ```text
//!  caller threads                        session queue thread
//! ┌──────────────────────────┐ commands ┌──────────────────────────┐
//! │ CaptureSessionController │ ───────▶ │ SessionWorker            │
//! │  - snapshot()            │          │  - CaptureGraph          │
//! │  - subscribe()           │ ◀─────── │    (1 input, 2 outputs)  │
//! └──────────────────────────┘  events  └──────────────────────────┘
//! ```
//!
//! State machine: `Idle → Configuring → Running → Configuring → … → Stopped`.

mod controller;
mod graph;
mod queue;
mod selection;
mod state;
mod worker;

pub use controller::{CaptureSessionController, DEFAULT_WAIT};
pub use graph::{CaptureGraph, GraphError, MAX_OUTPUTS, OutputKind};
pub use queue::{PhotoCompletion, PhotoRequest};
pub use selection::{SelectionPolicy, choose_device};
pub use state::{SessionEvent, SessionPhase, SessionSnapshot};
