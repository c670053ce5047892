//! Run orchestration: wires a source, the segmenter, and the delivery worker
//! together and tears them down in order.

pub mod replay;
mod shutdown;

use crate::audio::{
    CaptureStream, HandoffPolicy, PipelineEvent, Recorder, SegmentHandoff, Segmenter,
    SegmenterConfig, SegmenterMetrics, SHUTDOWN_FLUSH_TIMEOUT,
};
use crate::config::AppConfig;
use crate::error::CaptureError;
use crate::lock_or_recover;
use crate::sink::{CommandSink, LogSink, Sink};
use crate::worker::{spawn_delivery_worker, WorkerStats};
use anyhow::{Context, Result};
use replay::ReplaySource;
use std::fs;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use shutdown::install_shutdown_handler;

const SUPERVISOR_POLL: Duration = Duration::from_millis(100);

/// What happened over one run, gathered after the worker has drained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: usize,
    pub frames_skipped: usize,
    pub episodes_started: usize,
    pub episodes_aborted: usize,
    pub segments_emitted: usize,
    pub segments_rejected: usize,
    pub segments_discarded: usize,
    pub events_rejected: usize,
    pub files_written: usize,
    pub write_failures: usize,
    pub deliveries_failed: usize,
    pub stream_errors: usize,
}

impl RunSummary {
    fn from_parts(
        metrics: &SegmenterMetrics,
        worker: &WorkerStats,
        events_rejected: usize,
        stream_errors: usize,
    ) -> Self {
        Self {
            frames_processed: metrics.frames_processed,
            frames_skipped: metrics.frames_skipped,
            episodes_started: metrics.episodes_started,
            episodes_aborted: metrics.episodes_aborted,
            segments_emitted: metrics.segments_emitted,
            segments_rejected: metrics.segments_rejected,
            segments_discarded: metrics.segments_discarded,
            events_rejected,
            files_written: worker.files_written,
            write_failures: worker.write_failures,
            deliveries_failed: worker.deliveries_failed,
            stream_errors,
        }
    }
}

enum Source {
    Live(Recorder),
    Replay(ReplaySource),
}

/// Frames dropped by the source and errors reported by the driver.
#[derive(Debug, Default, Clone, Copy)]
struct SourceStats {
    skipped_frames: usize,
    stream_errors: usize,
}

/// Record until the source ends (replay) or a shutdown signal arrives (live).
///
/// Shutdown order: stop the source, finalise the open episode, drop every
/// queue sender, then join the worker so queued segments are still written.
pub fn run(config: &AppConfig) -> Result<RunSummary> {
    fs::create_dir_all(&config.recording_dir).with_context(|| {
        format!(
            "failed to create recording directory '{}'",
            config.recording_dir.display()
        )
    })?;
    let sink = build_sink(config)?;

    let source = match config.replay_wav.as_deref() {
        Some(path) => Source::Replay(ReplaySource::open(path)?),
        None => Source::Live(Recorder::new(config.input_device.as_deref())?),
    };
    let sample_rate = match &source {
        Source::Replay(replay) => {
            if replay.sample_rate() != config.sample_rate {
                tracing::info!(
                    file_rate = replay.sample_rate(),
                    configured_rate = config.sample_rate,
                    "using replay file sample rate"
                );
            }
            replay.sample_rate()
        }
        Source::Live(_) => config.sample_rate,
    };

    // A file has no deadline, so replay waits for the worker instead of
    // dropping segments.
    let policy = match &source {
        Source::Replay(_) => HandoffPolicy::Backpressure,
        Source::Live(_) => HandoffPolicy::RejectNewest,
    };
    let (sender, receiver) = crossbeam_channel::bounded(config.segment_queue_capacity);
    let handoff = SegmentHandoff::with_policy(sender, policy);
    tracing::info!(
        dir = %config.recording_dir.display(),
        sink = sink.name(),
        queue = config.segment_queue_capacity,
        policy = ?policy,
        "starting delivery worker"
    );
    let worker = spawn_delivery_worker(receiver, config.recording_dir.clone(), sink);

    let seg_cfg = SegmenterConfig::from(config).with_sample_rate(sample_rate);
    tracing::info!(
        sample_rate,
        threshold = seg_cfg.amplitude_threshold,
        silence_timeout_s = seg_cfg.silence_timeout.as_secs(),
        remove_last_s = seg_cfg.remove_last_seconds,
        preroll_s = seg_cfg.preroll_seconds,
        max_segment_s = seg_cfg.max_segment_seconds,
        "segmenter configured"
    );
    let segmenter = Arc::new(Mutex::new(Segmenter::new(
        seg_cfg,
        &config.source_label,
        handoff.clone(),
    )));

    if let Err(err) = install_shutdown_handler() {
        tracing::warn!(error = %err, "continuing without signal handling");
    }
    handoff.hand_off(PipelineEvent::Status(format!(
        "{}: recording started",
        config.source_label
    )));

    let driven = drive_source(source, &segmenter, &handoff, config);

    let metrics = {
        let mut segmenter = lock_or_recover(&segmenter, "segmenter shutdown");
        if let Ok(stats) = &driven {
            segmenter.record_skipped_frames(stats.skipped_frames);
        }
        segmenter.finish();
        segmenter.metrics().clone()
    };
    handoff.hand_off_waiting(
        PipelineEvent::Status(format!("{}: recording stopped", config.source_label)),
        SHUTDOWN_FLUSH_TIMEOUT,
    );
    let events_rejected = handoff.rejected();
    if events_rejected > 0 {
        tracing::warn!(total = events_rejected, "segment queue overflowed during the run");
    }
    drop(segmenter);
    drop(handoff);
    let worker_stats = worker.join();

    let source_stats = driven?;
    Ok(RunSummary::from_parts(
        &metrics,
        &worker_stats,
        events_rejected,
        source_stats.stream_errors,
    ))
}

fn build_sink(config: &AppConfig) -> Result<Box<dyn Sink>> {
    match config.sink_cmd.as_deref() {
        Some(command_line) => Ok(Box::new(CommandSink::from_command_line(
            command_line,
            config.deliver_attempts,
        )?)),
        None => Ok(Box::new(LogSink)),
    }
}

fn drive_source(
    source: Source,
    segmenter: &Arc<Mutex<Segmenter>>,
    handoff: &SegmentHandoff,
    config: &AppConfig,
) -> Result<SourceStats> {
    match source {
        Source::Replay(replay) => {
            tracing::info!(channels = replay.channels(), "replaying file");
            let stats = replay.run(segmenter.clone(), config.chunk_size as usize)?;
            tracing::info!(
                frames = stats.frames,
                samples = stats.samples,
                episodes = handoff.onsets(),
                "replay finished"
            );
            Ok(SourceStats {
                skipped_frames: stats.skipped_frames,
                stream_errors: 0,
            })
        }
        Source::Live(recorder) => {
            let stream = recorder.start(segmenter.clone(), config.sample_rate, config.chunk_size)?;
            tracing::info!(device = %recorder.device_name(), "listening");
            supervise(&stream, handoff);
            let stream_errors = stream.stream_errors();
            let skipped_frames = stream.stop();
            Ok(SourceStats {
                skipped_frames,
                stream_errors,
            })
        }
    }
}

/// Poll for shutdown, reporting onsets and growth in dropped frames and
/// rejected events.
fn supervise(stream: &CaptureStream, handoff: &SegmentHandoff) {
    let mut last_skipped = 0usize;
    let mut last_rejected = 0usize;
    let mut last_onsets = 0usize;
    while !shutdown::shutdown_requested() {
        thread::sleep(SUPERVISOR_POLL);

        let onsets = handoff.onsets();
        if onsets > last_onsets {
            tracing::info!(total = onsets, "activity detected; recording");
            last_onsets = onsets;
        }

        let skipped = stream.skipped_frames();
        if skipped > last_skipped {
            tracing::warn!(
                dropped = skipped - last_skipped,
                total = skipped,
                error = %CaptureError::SourceOverflow,
                "frames dropped"
            );
            last_skipped = skipped;
        }
        let rejected = handoff.rejected();
        if rejected > last_rejected {
            tracing::warn!(
                rejected = rejected - last_rejected,
                total = rejected,
                "segment queue full; newest events dropped"
            );
            last_rejected = rejected;
        }
    }
    tracing::info!("shutdown requested");
}
