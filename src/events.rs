//! Settlement of finalize-requests and the outbound event seam.

use std::path::PathBuf;

use serde::Serialize;

use crate::queue::PipelineStep;
use crate::triplet::MetadataPayload;

/// The clip was produced; the triplet is on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipReady {
    pub request_id: u64,
    pub buffer_file: PathBuf,
    pub video_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compensation_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataPayload>,
}

/// The activity was too short to keep. Not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipDiscarded {
    pub request_id: u64,
    pub buffer_file: PathBuf,
    pub duration: f64,
    pub min_activity_duration: f64,
}

/// A fatal step failed; no clip was kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipFailed {
    pub request_id: u64,
    pub buffer_file: PathBuf,
    pub step: PipelineStep,
    pub summary: String,
    pub detail: String,
}

/// Terminal outcome of one finalize-request. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Settlement {
    Ready(ClipReady),
    Discarded(ClipDiscarded),
    Failed(ClipFailed),
}

impl Settlement {
    pub fn request_id(&self) -> u64 {
        match self {
            Settlement::Ready(r) => r.request_id,
            Settlement::Discarded(d) => d.request_id,
            Settlement::Failed(f) => f.request_id,
        }
    }

    /// Event name used on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            Settlement::Ready(_) => "clip.ready",
            Settlement::Discarded(_) => "clip.discarded",
            Settlement::Failed(_) => "clip.failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Settlement::Ready(_))
    }
}

/// Receives one settlement per finalize-request, in completion order.
pub trait ClipEventSink: Send + Sync + 'static {
    fn publish(&self, settlement: &Settlement);
}

impl<F> ClipEventSink for F
where
    F: Fn(&Settlement) + Send + Sync + 'static,
{
    fn publish(&self, settlement: &Settlement) {
        self(settlement)
    }
}
