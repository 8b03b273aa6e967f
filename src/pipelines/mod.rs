// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for captured media
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Frame │ ──▶ │  Photo Pipeline   │ ──▶ │  JPEG / PNG  │
//! │   (RGBA)     │     │  - RGBA→RGB       │     │  (library or │
//! │              │     │  - Mirror flip    │     │   dialog)    │
//! │              │     │  - Encoding       │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`photo`]: Still photo processing, encoding and saving

pub mod photo;
