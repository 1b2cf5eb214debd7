pub mod compensation;
pub mod config;
pub mod deadline;
pub mod error;
pub mod events;
pub mod ffmpeg;
pub mod queue;
pub mod scanner;
pub mod thumbnail;
pub mod trim;
pub mod triplet;

pub use config::FinalizerConfig;
pub use error::AppError;
pub use events::{ClipEventSink, Settlement};
pub use ffmpeg::{FfmpegTools, MediaTools};
pub use queue::{FinalizeRequest, PendingSettlement, QueueProcessor};
