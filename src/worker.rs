//! Background worker that turns finished segments into files and hands them to
//! the sink. Runs off the frame path so slow disks or slow sinks only ever
//! back up the bounded queue, never the audio callback.

use crate::audio::{wav, PipelineEvent, Segment};
use crate::error::CaptureError;
use crate::naming;
use crate::sink::Sink;
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use std::thread;

/// What the worker did over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub files_written: usize,
    pub write_failures: usize,
    pub deliveries_failed: usize,
    pub episodes_aborted: usize,
    pub notices: usize,
}

/// Handle to the delivery thread.
pub struct DeliveryWorker {
    handle: Option<thread::JoinHandle<WorkerStats>>,
}

impl DeliveryWorker {
    /// Wait for the queue to drain (all senders dropped) and return stats.
    pub fn join(mut self) -> WorkerStats {
        match self.handle.take().map(thread::JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                tracing::error!("delivery worker panicked");
                WorkerStats::default()
            }
            None => WorkerStats::default(),
        }
    }
}

/// Spawn the worker. It exits once every [`SegmentHandoff`](crate::audio::SegmentHandoff)
/// clone has been dropped and the queue is empty, processing events in FIFO order.
pub fn spawn_delivery_worker(
    receiver: Receiver<PipelineEvent>,
    recording_dir: PathBuf,
    mut sink: Box<dyn Sink>,
) -> DeliveryWorker {
    let handle = thread::Builder::new()
        .name("segment-delivery".to_string())
        .spawn(move || {
            let mut stats = WorkerStats::default();
            for event in receiver.iter() {
                handle_event(event, &recording_dir, sink.as_mut(), &mut stats);
            }
            tracing::debug!(?stats, "delivery worker drained");
            stats
        });
    match handle {
        Ok(handle) => DeliveryWorker {
            handle: Some(handle),
        },
        Err(err) => {
            tracing::error!(%err, "failed to spawn delivery worker");
            DeliveryWorker { handle: None }
        }
    }
}

pub(crate) fn handle_event(
    event: PipelineEvent,
    recording_dir: &Path,
    sink: &mut dyn Sink,
    stats: &mut WorkerStats,
) {
    match event {
        PipelineEvent::Segment(segment) => deliver_segment(segment, recording_dir, sink, stats),
        PipelineEvent::EpisodeAborted { at, error } => {
            stats.episodes_aborted += 1;
            tracing::error!(at_ms = at.as_millis() as u64, error = %error, "episode aborted");
            sink.report_status(&format!("Recording aborted ({}): {error}", error.label()));
        }
        PipelineEvent::Status(message) => {
            stats.notices += 1;
            sink.report_status(&message);
        }
    }
}

fn deliver_segment(
    segment: Segment,
    recording_dir: &Path,
    sink: &mut dyn Sink,
    stats: &mut WorkerStats,
) {
    let path = naming::unique_path(recording_dir, &segment.file_name());
    let label = segment.delivery_label();
    match write_segment(&path, &segment) {
        Ok(()) => {
            stats.files_written += 1;
            tracing::info!(
                path = %path.display(),
                samples = segment.len(),
                seconds = segment.duration().as_secs_f32(),
                reason = segment.reason.label(),
                "recording saved"
            );
            // The buffer is no longer needed once the file is on disk.
            drop(segment);
            if let Err(err) = sink.deliver(&path, &label) {
                stats.deliveries_failed += 1;
                tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "delivery failed");
            }
        }
        Err(err) => {
            stats.write_failures += 1;
            tracing::error!(path = %path.display(), error = %err, "failed to write recording");
            sink.report_status(&format!("Failed to save {}: {err}", path.display()));
        }
    }
}

fn write_segment(path: &Path, segment: &Segment) -> Result<(), CaptureError> {
    wav::write_wav_file(path, &segment.samples, segment.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{EndReason, SegmentHandoff};
    use anyhow::{bail, Result};
    use crossbeam_channel::bounded;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    #[derive(Default)]
    struct Calls {
        delivered: Vec<(PathBuf, String)>,
        statuses: Vec<String>,
    }

    /// Records every call; optionally fails deliveries.
    struct RecordingSink {
        calls: Arc<Mutex<Calls>>,
        fail_delivery: bool,
    }

    impl Sink for RecordingSink {
        fn deliver(&mut self, file_path: &Path, label: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .delivered
                .push((file_path.to_path_buf(), label.to_string()));
            if self.fail_delivery {
                bail!("upstream unavailable");
            }
            Ok(())
        }

        fn report_status(&mut self, message: &str) {
            self.calls.lock().unwrap().statuses.push(message.to_string());
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "squelch_worker_{name}_{}_{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn segment(first_sample: i16, len: usize) -> Segment {
        let mut samples = vec![0i16; len];
        samples[0] = first_sample;
        Segment {
            samples,
            sample_rate: 8_000,
            source_label: Arc::from("tower"),
            ended_at: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            reason: EndReason::Silence,
        }
    }

    #[test]
    fn writes_file_before_delivering() {
        let dir = temp_dir("deliver");
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut sink = RecordingSink {
            calls: calls.clone(),
            fail_delivery: false,
        };
        let mut stats = WorkerStats::default();
        let seg = segment(42, 800);
        let expected_name = seg.file_name();
        let expected_label = seg.delivery_label();

        handle_event(PipelineEvent::Segment(seg), &dir, &mut sink, &mut stats);

        assert_eq!(stats.files_written, 1);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.delivered.len(), 1);
        let (path, label) = &calls.delivered[0];
        assert_eq!(path, &dir.join(expected_name));
        assert_eq!(label, &expected_label);
        assert!(label.starts_with("tower "));
        let reader = hound::WavReader::open(path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8_000);
        assert_eq!(reader.len(), 800);
        drop(calls);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_failure_is_reported_and_not_delivered() {
        let dir = temp_dir("write_failure").join("missing");
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut sink = RecordingSink {
            calls: calls.clone(),
            fail_delivery: false,
        };
        let mut stats = WorkerStats::default();

        handle_event(
            PipelineEvent::Segment(segment(1, 10)),
            &dir,
            &mut sink,
            &mut stats,
        );

        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.files_written, 0);
        let calls = calls.lock().unwrap();
        assert!(calls.delivered.is_empty());
        assert_eq!(calls.statuses.len(), 1);
        assert!(calls.statuses[0].starts_with("Failed to save"));
    }

    #[test]
    fn delivery_failure_keeps_the_file() {
        let dir = temp_dir("delivery_failure");
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut sink = RecordingSink {
            calls: calls.clone(),
            fail_delivery: true,
        };
        let mut stats = WorkerStats::default();

        handle_event(
            PipelineEvent::Segment(segment(1, 10)),
            &dir,
            &mut sink,
            &mut stats,
        );

        assert_eq!(stats.files_written, 1);
        assert_eq!(stats.deliveries_failed, 1);
        let path = calls.lock().unwrap().delivered[0].0.clone();
        assert!(path.exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn aborts_and_notices_go_to_status_channel() {
        let dir = temp_dir("status");
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut sink = RecordingSink {
            calls: calls.clone(),
            fail_delivery: false,
        };
        let mut stats = WorkerStats::default();

        handle_event(
            PipelineEvent::EpisodeAborted {
                at: Duration::from_secs(2),
                error: CaptureError::OutOfMemory { requested: 10 },
            },
            &dir,
            &mut sink,
            &mut stats,
        );
        handle_event(
            PipelineEvent::Status("tower: recording started".to_string()),
            &dir,
            &mut sink,
            &mut stats,
        );

        assert_eq!(stats.episodes_aborted, 1);
        assert_eq!(stats.notices, 1);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.statuses.len(), 2);
        assert!(calls.statuses[0].contains("out_of_memory"));
        assert_eq!(calls.statuses[1], "tower: recording started");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn worker_drains_queue_in_order_after_senders_drop() {
        let dir = temp_dir("fifo");
        let calls = Arc::new(Mutex::new(Calls::default()));
        let sink = RecordingSink {
            calls: calls.clone(),
            fail_delivery: false,
        };
        let (tx, rx) = bounded(8);
        let handoff = SegmentHandoff::new(tx);
        for first in [1i16, 2, 3] {
            assert!(handoff.hand_off(PipelineEvent::Segment(segment(first, 16))));
        }
        let worker = spawn_delivery_worker(rx, dir.clone(), Box::new(sink));
        drop(handoff);
        let stats = worker.join();

        assert_eq!(stats.files_written, 3);
        let calls = calls.lock().unwrap();
        let firsts: Vec<i16> = calls
            .delivered
            .iter()
            .map(|(path, _)| {
                let mut reader = hound::WavReader::open(path).unwrap();
                reader.samples::<i16>().next().unwrap().unwrap()
            })
            .collect();
        assert_eq!(firsts, vec![1, 2, 3]);
        // Same offset second: later files get a counter instead of overwriting.
        let names: Vec<String> = calls
            .delivered
            .iter()
            .map(|(path, _)| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names[1].ends_with("_1.wav"));
        assert!(names[2].ends_with("_2.wav"));
        drop(calls);
        let _ = fs::remove_dir_all(&dir);
    }
}
