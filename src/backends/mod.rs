// SPDX-License-Identifier: MPL-2.0

//! Hardware access layer
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                Session Layer                │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │               Backend Layer                 │
//! │  ┌──────────────┐    ┌──────────────────┐   │
//! │  │  Permission  │    │      Camera      │   │
//! │  │     gate     │    │ (V4L2 / virtual) │   │
//! │  └──────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Device enumeration and frame capture
//! - [`permission`]: Camera access authorization

pub mod camera;
pub mod permission;
