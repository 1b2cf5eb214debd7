//! Finalize-request queue.
//!
//! Requests drain strictly one at a time, in enqueue order. Each runs the
//! pipeline trim → compensate → write metadata → remove buffer → thumbnail,
//! publishes exactly one [`Settlement`] to the sink and resolves the caller's
//! [`PendingSettlement`]. FFmpeg is CPU-heavy on its own, so two cuts never
//! run side by side with the recorder.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::compensation::estimate_compensation;
use crate::config::FinalizerConfig;
use crate::error::AppError;
use crate::events::{ClipDiscarded, ClipEventSink, ClipFailed, ClipReady, Settlement};
use crate::ffmpeg::MediaTools;
use crate::thumbnail::generate_thumbnail;
use crate::trim::{TrimJob, trim_clip};
use crate::triplet::{MetadataPayload, delete_video, write_metadata};

const TARGET: &str = "clip_finalizer::queue";

/// Sidecar key the applied compensation is recorded under.
pub const COMPENSATION_KEY: &str = "compensationSeconds";

/// One activity to cut out of a buffer file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub buffer_file: PathBuf,
    #[serde(default)]
    pub desired_name: Option<String>,
    pub relative_start: f64,
    pub duration: f64,
    #[serde(default)]
    pub metadata: Option<MetadataPayload>,
    /// Filled in by the pipeline once keyframes have been probed.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub compensation_seconds: Option<f64>,
}

impl FinalizeRequest {
    pub fn new(buffer_file: impl Into<PathBuf>, relative_start: f64, duration: f64) -> Self {
        Self {
            buffer_file: buffer_file.into(),
            desired_name: None,
            relative_start,
            duration,
            metadata: None,
            compensation_seconds: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.desired_name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataPayload) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStep {
    Intake,
    Trim,
    Compensate,
    WriteMetadata,
    RemoveBuffer,
    Thumbnail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Failure settles the request as failed.
    Fatal,
    /// Failure is logged; the pipeline carries on.
    BestEffort,
}

impl PipelineStep {
    pub fn policy(self) -> StepPolicy {
        match self {
            PipelineStep::Intake | PipelineStep::Trim | PipelineStep::WriteMetadata => {
                StepPolicy::Fatal
            }
            PipelineStep::Compensate | PipelineStep::RemoveBuffer | PipelineStep::Thumbnail => {
                StepPolicy::BestEffort
            }
        }
    }
}

/// Steps that run once the clip file exists, in order.
const POST_TRIM_STEPS: [PipelineStep; 4] = [
    PipelineStep::Compensate,
    PipelineStep::WriteMetadata,
    PipelineStep::RemoveBuffer,
    PipelineStep::Thumbnail,
];

/// Resolves once the request has settled.
#[derive(Debug)]
pub struct PendingSettlement {
    request_id: u64,
    receiver: oneshot::Receiver<Settlement>,
}

impl PendingSettlement {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub async fn wait(self) -> Result<Settlement, AppError> {
        self.receiver.await.map_err(|_| AppError::QueueClosed)
    }
}

struct QueuedRequest {
    request_id: u64,
    request: FinalizeRequest,
    settled: oneshot::Sender<Settlement>,
}

pub struct QueueProcessor {
    sender: mpsc::UnboundedSender<QueuedRequest>,
    next_request_id: AtomicU64,
    outstanding: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl QueueProcessor {
    /// Start the worker task. Must be called from within a Tokio runtime.
    pub fn spawn(
        config: Arc<FinalizerConfig>,
        tools: Arc<dyn MediaTools>,
        sink: Arc<dyn ClipEventSink>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let outstanding = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline {
            config,
            tools,
            sink,
        };
        let worker = tokio::spawn(drain(pipeline, receiver, Arc::clone(&outstanding)));
        Self {
            sender,
            next_request_id: AtomicU64::new(1),
            outstanding,
            worker,
        }
    }

    /// Queue a request. Returns immediately.
    pub fn enqueue(&self, request: FinalizeRequest) -> PendingSettlement {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (settled, receiver) = oneshot::channel();
        log::info!(
            target: TARGET,
            "Queuing request {} for {} ({:?})",
            request_id,
            request.buffer_file.display(),
            request.desired_name
        );
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let queued = QueuedRequest {
            request_id,
            request,
            settled,
        };
        if self.sender.send(queued).is_err() {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            log::error!(target: TARGET, "Queue worker is gone; request {} dropped", request_id);
        }
        PendingSettlement {
            request_id,
            receiver,
        }
    }

    /// Requests queued or in flight.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Stop accepting requests and wait for the queued ones to settle.
    pub async fn shutdown(self) -> Result<(), AppError> {
        drop(self.sender);
        self.worker
            .await
            .map_err(|e| AppError::Task(e.to_string()))
    }
}

async fn drain(
    pipeline: Pipeline,
    mut receiver: mpsc::UnboundedReceiver<QueuedRequest>,
    outstanding: Arc<AtomicUsize>,
) {
    while let Some(queued) = receiver.recv().await {
        let settlement = pipeline
            .process(queued.request_id, queued.request)
            .await;
        log::info!(
            target: TARGET,
            "Request {} settled: {}",
            settlement.request_id(),
            settlement.event_name()
        );
        pipeline.sink.publish(&settlement);
        outstanding.fetch_sub(1, Ordering::SeqCst);
        let _ = queued.settled.send(settlement);
    }
    log::debug!(target: TARGET, "Queue closed, worker exiting");
}

/// State carried through one processing cycle.
struct Cycle {
    request_id: u64,
    request: FinalizeRequest,
    video_path: PathBuf,
    written_metadata: Option<MetadataPayload>,
    thumbnail_path: Option<PathBuf>,
}

struct Pipeline {
    config: Arc<FinalizerConfig>,
    tools: Arc<dyn MediaTools>,
    sink: Arc<dyn ClipEventSink>,
}

impl Pipeline {
    async fn process(&self, request_id: u64, request: FinalizeRequest) -> Settlement {
        let min_duration = self.config.effective_min_activity_duration();
        let buffer_file = request.buffer_file.clone();
        let failed = |step: PipelineStep, err: &AppError| {
            let (summary, detail) = err.summary_and_detail();
            log::error!(
                target: TARGET,
                "Request {} failed at {:?}: {}",
                request_id,
                step,
                err
            );
            Settlement::Failed(ClipFailed {
                request_id,
                buffer_file: buffer_file.clone(),
                step,
                summary,
                detail,
            })
        };

        if !request.duration.is_finite() || request.duration <= 0.0 {
            let err = AppError::invalid_request(format!(
                "duration must be a positive number of seconds, got {}",
                request.duration
            ));
            return failed(PipelineStep::Intake, &err);
        }

        if request.duration < min_duration {
            log::info!(
                target: TARGET,
                "Activity {} lasting {}s was too short (< {}s), discarding",
                buffer_file.display(),
                request.duration,
                min_duration
            );
            return Settlement::Discarded(ClipDiscarded {
                request_id,
                buffer_file: buffer_file.clone(),
                duration: request.duration,
                min_activity_duration: min_duration,
            });
        }

        let job = match TrimJob::plan(
            &request.buffer_file,
            &self.config.storage_path,
            request.desired_name.as_deref(),
            request.relative_start,
            request.duration,
        ) {
            Ok(job) => job,
            Err(e) => return failed(PipelineStep::Intake, &e),
        };

        let video_path = match self
            .run_blocking(move |tools| trim_clip(tools, &job))
            .await
        {
            Ok(path) => path,
            Err(e) => return failed(PipelineStep::Trim, &e),
        };

        let mut cycle = Cycle {
            request_id,
            request,
            video_path,
            written_metadata: None,
            thumbnail_path: None,
        };

        for step in POST_TRIM_STEPS {
            if let Err(e) = self.run_step(step, &mut cycle).await {
                match step.policy() {
                    StepPolicy::BestEffort => {
                        log::warn!(
                            target: TARGET,
                            "Request {}: {:?} failed, continuing: {}",
                            request_id,
                            step,
                            e
                        );
                    }
                    StepPolicy::Fatal => {
                        // Never leave the clip behind without its sidecar.
                        delete_video(&cycle.video_path);
                        return failed(step, &e);
                    }
                }
            }
        }

        Settlement::Ready(ClipReady {
            request_id: cycle.request_id,
            buffer_file: cycle.request.buffer_file,
            video_path: cycle.video_path,
            thumbnail_path: cycle.thumbnail_path,
            compensation_seconds: cycle.request.compensation_seconds,
            metadata: cycle.written_metadata,
        })
    }

    async fn run_step(&self, step: PipelineStep, cycle: &mut Cycle) -> Result<(), AppError> {
        match step {
            PipelineStep::Compensate => {
                let buffer_file = cycle.request.buffer_file.clone();
                let relative_start = cycle.request.relative_start;
                let compensation = self
                    .run_blocking(move |tools| {
                        estimate_compensation(tools, &buffer_file, relative_start)
                    })
                    .await?;
                cycle.request.compensation_seconds = Some(compensation);
                Ok(())
            }
            PipelineStep::WriteMetadata => {
                let Some(payload) = cycle.request.metadata.as_ref() else {
                    return Ok(());
                };
                let mut payload = payload.clone();
                if let Some(compensation) = cycle.request.compensation_seconds {
                    payload.insert(COMPENSATION_KEY.to_string(), Value::from(compensation));
                }
                let video_path = cycle.video_path.clone();
                let to_write = payload.clone();
                self.run_blocking(move |_| write_metadata(&video_path, &to_write))
                    .await?;
                cycle.written_metadata = Some(payload);
                Ok(())
            }
            PipelineStep::RemoveBuffer => {
                log::debug!(
                    target: TARGET,
                    "Removing buffer file {}",
                    cycle.request.buffer_file.display()
                );
                fs::remove_file(&cycle.request.buffer_file)?;
                Ok(())
            }
            PipelineStep::Thumbnail => {
                let video_path = cycle.video_path.clone();
                let thumbnail = self
                    .run_blocking(move |tools| generate_thumbnail(tools, &video_path))
                    .await?;
                cycle.thumbnail_path = Some(thumbnail);
                Ok(())
            }
            PipelineStep::Intake | PipelineStep::Trim => Ok(()),
        }
    }

    /// Run blocking media work on the blocking pool and wait for it.
    async fn run_blocking<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn MediaTools) -> Result<T, AppError> + Send + 'static,
    {
        let tools = Arc::clone(&self.tools);
        match tokio::task::spawn_blocking(move || f(&*tools)).await {
            Ok(result) => result,
            Err(join_err) => Err(AppError::Task(join_err.to_string())),
        }
    }
}
