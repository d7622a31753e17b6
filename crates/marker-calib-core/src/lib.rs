//! Core types for multi-frame marker calibration.
//!
//! This crate knows nothing about boards or solvers. It provides:
//! - [`buffer`]: strided extraction of flat caller-owned arrays into owned values,
//! - marker observations and image sizes,
//! - owned frame images copied out of foreign buffers,
//! - camera intrinsics with Brown-Conrady distortion,
//! - normalised-DLT homographies,
//! - a small stderr logger for the `log` facade.

pub mod buffer;
mod camera;
mod homography;
mod image;
mod logger;
mod marker;

pub use camera::CameraParams;
pub use homography::Homography;
pub use image::{FrameImage, FrameImageView, ImageError};
pub use marker::{ImageSize, MarkerObservation, Quad};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
