use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clip_finalizer_core::config::FinalizerConfig;
use clip_finalizer_core::error::AppError;
use clip_finalizer_core::events::Settlement;
use clip_finalizer_core::ffmpeg::FfmpegTools;
use clip_finalizer_core::queue::{FinalizeRequest, QueueProcessor};
use clip_finalizer_core::scanner::{self, FileSortDirection};
use clip_finalizer_core::triplet;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};

const TARGET: &str = "clip_finalizer::sidecar";

#[derive(Debug, Deserialize)]
struct RpcRequest {
    id: u64,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, serde::Serialize)]
struct RpcSuccess {
    id: u64,
    result: Value,
}

#[derive(Debug, serde::Serialize)]
struct RpcFailure {
    id: u64,
    error: RpcErrorPayload,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RpcErrorPayload {
    summary: String,
    detail: String,
}

#[derive(Debug, serde::Serialize)]
struct RpcEvent<'a> {
    event: &'a str,
    payload: &'a Settlement,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    dir: Option<PathBuf>,
    pattern: Option<String>,
    #[serde(default)]
    direction: FileSortDirection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoParams {
    video_path: PathBuf,
}

type SharedWriter = Arc<Mutex<io::Stdout>>;

fn write_json_line<T: serde::Serialize>(writer: &mut impl Write, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, value)
        .map_err(|e| io::Error::other(format!("serialize response: {}", e)))?;
    writer.write_all(b"\n")?;
    writer.flush()
}

fn write_json_line_shared<T: serde::Serialize>(writer: &SharedWriter, value: &T) -> io::Result<()> {
    let mut guard = writer.lock();
    write_json_line(&mut *guard, value)
}

fn emit_settlement(writer: &SharedWriter, settlement: &Settlement) {
    let message = RpcEvent {
        event: settlement.event_name(),
        payload: settlement,
    };
    if let Err(e) = write_json_line_shared(writer, &message) {
        log::error!(target: TARGET, "Failed to emit {}: {}", settlement.event_name(), e);
    }
}

fn error_payload(err: &AppError) -> RpcErrorPayload {
    let (summary, detail) = err.summary_and_detail();
    RpcErrorPayload { summary, detail }
}

fn params_from_value<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, AppError> {
    serde_json::from_value(params)
        .map_err(|e| AppError::invalid_request(format!("Invalid params payload: {}", e)))
}

fn to_result_value<T: serde::Serialize>(value: T) -> Result<Value, AppError> {
    Ok(serde_json::to_value(value)?)
}

fn dispatch(
    method: &str,
    params: Value,
    config: &FinalizerConfig,
    queue: &QueueProcessor,
) -> Result<Value, AppError> {
    match method {
        "clip.finalize" => {
            let request: FinalizeRequest = params_from_value(params)?;
            let pending = queue.enqueue(request);
            Ok(json!({ "requestId": pending.request_id() }))
        }
        "clip.list" => {
            let parsed: ListParams = if params.is_null() {
                ListParams::default()
            } else {
                params_from_value(params)?
            };
            let dir = parsed.dir.unwrap_or_else(|| config.storage_path.clone());
            let pattern = parsed
                .pattern
                .unwrap_or_else(|| scanner::VIDEO_FILE_PATTERN.to_string());
            let files = scanner::list_sorted_files_matching(&dir, &pattern, parsed.direction)?;
            to_result_value(files)
        }
        "clip.metadata" => {
            let parsed: VideoParams = params_from_value(params)?;
            to_result_value(triplet::read_metadata(&parsed.video_path)?)
        }
        "clip.delete" => {
            let parsed: VideoParams = params_from_value(params)?;
            let deleted = triplet::delete_video(&parsed.video_path);
            Ok(json!({ "deleted": deleted }))
        }
        "clip.protect" => {
            let parsed: VideoParams = params_from_value(params)?;
            to_result_value(triplet::protect(&parsed.video_path)?)
        }
        "queue.status" => Ok(json!({ "outstanding": queue.outstanding() })),
        _ => Err(AppError::invalid_request(format!("Unknown method: {}", method))),
    }
}

fn handle_request(
    request: RpcRequest,
    writer: &SharedWriter,
    config: &FinalizerConfig,
    queue: &QueueProcessor,
) {
    log::debug!(target: TARGET, "-> {} (id={})", request.method, request.id);
    let written = match dispatch(&request.method, request.params, config, queue) {
        Ok(result) => write_json_line_shared(
            writer,
            &RpcSuccess {
                id: request.id,
                result,
            },
        ),
        Err(err) => {
            log::warn!(target: TARGET, "{} (id={}) failed: {}", request.method, request.id, err);
            write_json_line_shared(
                writer,
                &RpcFailure {
                    id: request.id,
                    error: error_payload(&err),
                },
            )
        }
    };
    if let Err(e) = written {
        log::error!(target: TARGET, "Failed to write response for id={}: {}", request.id, e);
    }
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            let target = record.target();
            let target = target.strip_prefix("clip_finalizer::").unwrap_or(target);
            writeln!(
                buf,
                "{} {:<5} {} {}",
                buf.timestamp_seconds(),
                record.level(),
                target,
                record.args()
            )
        })
        .init();
}

fn load_config() -> Result<FinalizerConfig, AppError> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .ok_or_else(|| AppError::Config("usage: clip-finalizer-sidecar <config.json>".into()))?;
    FinalizerConfig::load(&path)
}

fn main() -> Result<(), AppError> {
    init_logging();

    let config = Arc::new(load_config()?);
    let tools = Arc::new(FfmpegTools::discover(config.ffmpeg_path.as_deref())?);
    log::info!(
        target: TARGET,
        "Storing clips in {} (min activity {}s)",
        config.storage_path.display(),
        config.effective_min_activity_duration()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let guard = runtime.enter();

    let stdout: SharedWriter = Arc::new(Mutex::new(io::stdout()));
    let writer_for_events = Arc::clone(&stdout);
    let sink = move |settlement: &Settlement| emit_settlement(&writer_for_events, settlement);
    let queue = QueueProcessor::spawn(Arc::clone(&config), tools, Arc::new(sink));

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                let failure = RpcFailure {
                    id: 0,
                    error: RpcErrorPayload {
                        summary: "Invalid input stream".to_string(),
                        detail: err.to_string(),
                    },
                };
                let _ = write_json_line_shared(&stdout, &failure);
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let request: RpcRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                let failure = RpcFailure {
                    id: 0,
                    error: RpcErrorPayload {
                        summary: "Invalid request".to_string(),
                        detail: err.to_string(),
                    },
                };
                let _ = write_json_line_shared(&stdout, &failure);
                continue;
            }
        };

        handle_request(request, &stdout, &config, &queue);
    }

    log::info!(
        target: TARGET,
        "Input closed, draining {} queued request(s)",
        queue.outstanding()
    );
    drop(guard);
    runtime.block_on(queue.shutdown())
}
