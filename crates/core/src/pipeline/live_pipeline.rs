use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;

use crate::capture::domain::video_capture::CaptureError;
use crate::capture::frame_source::FrameSource;
use crate::pipeline::frame_queue::FrameQueue;
use crate::pipeline::processor::Processor;
use crate::shared::constants::QUEUE_LOG_EVERY;
use crate::shared::frame::Frame;

/// Default depth of both frame queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

const POP_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

/// Capture and recognition running on their own threads.
///
/// Layout: `capture → raw queue → processing → processed queue → consumer`
///
/// Both queues drop their oldest frame when full, so a slow stage only
/// ever sees recent frames.
pub struct LivePipeline {
    processed: FrameQueue<Frame>,
    stop: Arc<AtomicBool>,
    capture_handle: JoinHandle<Result<(), CaptureError>>,
    processing_handle: JoinHandle<()>,
}

impl LivePipeline {
    pub fn start(
        source: FrameSource,
        processor: Processor,
        queue_capacity: usize,
    ) -> Result<Self, PipelineError> {
        let raw = FrameQueue::new(queue_capacity);
        let processed = FrameQueue::new(queue_capacity);
        let stop = Arc::new(AtomicBool::new(false));

        let capture_handle = spawn_capture(source, raw.clone(), Arc::clone(&stop))?;
        let processing_handle =
            match spawn_processing(processor, raw, processed.clone(), Arc::clone(&stop)) {
                Ok(handle) => handle,
                Err(e) => {
                    stop.store(true, Ordering::Relaxed);
                    let _ = capture_handle.join();
                    return Err(e);
                }
            };

        log::info!("Live pipeline started (queue capacity {queue_capacity})");
        Ok(Self {
            processed,
            stop,
            capture_handle,
            processing_handle,
        })
    }

    /// Annotated frames, newest last.
    pub fn processed(&self) -> &FrameQueue<Frame> {
        &self.processed
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn is_running(&self) -> bool {
        !self.capture_handle.is_finished() && !self.processing_handle.is_finished()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Stop both stages and wait for them. Returns the first failure.
    pub fn join(self) -> Result<(), PipelineError> {
        self.stop();
        let mut first_error: Option<PipelineError> = None;
        fn set_if_none(slot: &mut Option<PipelineError>, err: PipelineError) {
            if slot.is_none() {
                *slot = Some(err);
            }
        }

        match self.capture_handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => set_if_none(&mut first_error, e.into()),
            Err(_) => set_if_none(&mut first_error, PipelineError::WorkerPanicked("capture")),
        }
        if self.processing_handle.join().is_err() {
            set_if_none(&mut first_error, PipelineError::WorkerPanicked("processing"));
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn spawn_capture(
    mut source: FrameSource,
    raw: FrameQueue<Frame>,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<Result<(), CaptureError>>, PipelineError> {
    std::thread::Builder::new()
        .name("capture".into())
        .spawn(move || {
            let result = source.run(&raw, &stop);
            // Without a source nothing will ever arrive; wind the pipeline down.
            if result.is_err() {
                stop.store(true, Ordering::Relaxed);
            }
            result
        })
        .map_err(|source| PipelineError::Spawn {
            name: "capture",
            source,
        })
}

fn spawn_processing(
    mut processor: Processor,
    raw: FrameQueue<Frame>,
    processed: FrameQueue<Frame>,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, PipelineError> {
    std::thread::Builder::new()
        .name("processing".into())
        .spawn(move || {
            let mut handled: u64 = 0;
            while !stop.load(Ordering::Relaxed) {
                let Some(frame) = raw.pop_timeout(POP_TIMEOUT) else {
                    continue;
                };
                let annotated = processor.process(frame);
                if processed.push(annotated) > 0 {
                    log::debug!("Processed queue full, dropped oldest frame");
                }
                handled += 1;
                if handled % QUEUE_LOG_EVERY == 0 {
                    log::debug!(
                        "Frames processed: {handled}, raw queue {}/{}",
                        raw.len(),
                        raw.capacity()
                    );
                }
            }
            log::info!("Processing stopped after {handled} frames");
        })
        .map_err(|source| PipelineError::Spawn {
            name: "processing",
            source,
        })
}
