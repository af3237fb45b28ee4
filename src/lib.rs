//! Backend for a DIY-assistance app: users upload photos of tools or
//! projects and get back AI-generated descriptions of what is in them.
//!
//! The pipeline is one HTTP handler: a multipart upload is staged to scratch
//! files, each image is sent to a vision-capable completion API in turn, and
//! the descriptions come back as one ordered JSON list. The vision service
//! sits behind the [`VisionModel`] trait so tests can swap in a fake.

pub mod config;
pub mod error;
pub mod server;
pub mod upload;
pub mod vision;

pub use config::Config;
pub use error::AppError;
pub use server::{Analysis, AppState, UploadResponse, analyze_batch, app, bind_with_retry};
pub use upload::{MAX_IMAGES, StagedImage, UploadBatch};
pub use vision::{DEFAULT_SYSTEM_PROMPT, OpenAiVision, VisionModel};
