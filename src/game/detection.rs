use crate::audio::decode::decode_source;
use crate::audio::{AudioSource, SampleBuffer};
use crate::error::DetectionError;
use crate::game::beats::{BeatAnalysis, detect_beats};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::thread;

type DetectionResult = Result<BeatAnalysis, DetectionError>;

/// Beat detection running on its own worker thread.
///
/// The task is independent of the gameplay tick. Dropping it cancels the
/// worker without waiting for it: a worker stuck in a download or a decode
/// notices the stop signal on its own, discards its result and releases its
/// decoder.
pub struct DetectionTask {
    thread: Option<thread::JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    receiver: Receiver<DetectionResult>,
    finished: bool,
}

impl DetectionTask {
    pub fn spawn(source: AudioSource) -> Self {
        Self::spawn_with(move |stop| decode_source(&source, stop))
    }

    /// Runs detection over samples that are already decoded.
    pub fn spawn_samples(buffer: SampleBuffer) -> Self {
        Self::spawn_with(move |_| Ok(buffer))
    }

    fn spawn_with<F>(load: F) -> Self
    where
        F: FnOnce(&AtomicBool) -> Result<SampleBuffer, DetectionError> + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = stop_signal.clone();
        let (sender, receiver) = channel();

        let thread = thread::spawn(move || {
            let result = run_detection(load, &stop_signal_clone);
            match &result {
                Ok(analysis) => info!(
                    "Beat detection finished: {} beats, {} BPM",
                    analysis.beats.len(),
                    analysis.bpm
                ),
                Err(DetectionError::Cancelled) => info!("Beat detection cancelled."),
                Err(e) => error!("Beat detection failed: {}", e),
            }
            // The receiver may already be gone if the owner dropped the task.
            let _ = sender.send(result);
        });

        Self {
            thread: Some(thread),
            stop_signal,
            receiver,
            finished: false,
        }
    }

    /// Asks the worker to stop. Any result it still produces is discarded.
    pub fn cancel(&mut self) {
        self.stop_signal.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop_signal.load(Ordering::Relaxed)
    }

    /// Non-blocking check. Yields the outcome exactly once.
    pub fn poll(&mut self) -> Option<DetectionResult> {
        if self.finished {
            return None;
        }
        let outcome = match self.receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(DetectionError::Disconnected),
        };
        Some(self.finish(outcome))
    }

    /// Blocks until the worker reports.
    pub fn wait(mut self) -> DetectionResult {
        if self.finished {
            return Err(DetectionError::Disconnected);
        }
        let outcome = self
            .receiver
            .recv()
            .unwrap_or(Err(DetectionError::Disconnected));
        self.finish(outcome)
    }

    fn finish(&mut self, outcome: DetectionResult) -> DetectionResult {
        self.finished = true;
        self.join();
        if self.is_cancelled() {
            return Err(DetectionError::Cancelled);
        }
        outcome
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("Beat detection worker panicked.");
            }
        }
    }
}

impl Drop for DetectionTask {
    fn drop(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        self.cancel();
        if handle.is_finished() {
            if handle.join().is_err() {
                warn!("Beat detection worker panicked.");
            }
        } else {
            debug!("Detaching cancelled beat detection worker.");
        }
    }
}

fn run_detection<F>(load: F, stop: &AtomicBool) -> DetectionResult
where
    F: FnOnce(&AtomicBool) -> Result<SampleBuffer, DetectionError>,
{
    if stop.load(Ordering::Relaxed) {
        return Err(DetectionError::Cancelled);
    }
    let buffer = load(stop)?;
    if stop.load(Ordering::Relaxed) {
        return Err(DetectionError::Cancelled);
    }
    let analysis = detect_beats(&buffer);
    drop(buffer);
    if stop.load(Ordering::Relaxed) {
        return Err(DetectionError::Cancelled);
    }
    Ok(analysis)
}
