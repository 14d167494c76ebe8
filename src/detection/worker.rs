//! Background detection worker
//!
//! Runs a [`Detector`] on its own thread. Frames are handed over through a
//! zero-capacity channel, so a submission only succeeds while the worker is
//! idle and nothing stale ever queues up. A busy flag lets the render
//! thread skip copying the frame while a cycle is in flight. Completed
//! results land in a single "latest snapshot" slot that the render thread
//! polls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use image::RgbaImage;
use parking_lot::Mutex;

use super::{Detection, DetectionError, DetectionFilter, Detector};

/// A completed detection cycle
#[derive(Clone, Debug, Default)]
pub struct DetectionSnapshot {
    /// Increases by one with every successful cycle
    pub generation: u64,
    /// Frame number the detections were computed on
    pub frame_number: u64,
    /// Filtered and capped detections
    pub detections: Vec<Detection>,
}

/// Worker health, surfaced to the caller
#[derive(Clone, Debug, Default)]
pub struct DetectionStatus {
    /// Successful cycles
    pub completed: u64,
    /// Failed cycles
    pub failed: u64,
    /// Message of the most recent failure
    pub last_error: Option<String>,
}

/// Work item sent to the worker thread
struct DetectionRequest {
    frame: RgbaImage,
    frame_number: u64,
    filter: DetectionFilter,
}

/// Detection worker handle
pub struct DetectionWorker {
    /// Latest completed result
    latest: Arc<Mutex<Option<DetectionSnapshot>>>,
    /// Success/failure counters
    status: Arc<Mutex<DetectionStatus>>,
    /// Channel to the worker thread
    request_sender: Option<Sender<DetectionRequest>>,
    /// Set to make the detector drop its state before the next cycle
    reset_requested: Arc<AtomicBool>,
    /// Set while the worker runs a cycle
    busy: Arc<AtomicBool>,
    /// Worker thread handle
    thread_handle: Option<std::thread::JoinHandle<()>>,
    /// Detector name for logs
    detector_name: String,
}

impl DetectionWorker {
    /// Start a worker thread that owns `detector`
    pub fn spawn(detector: Box<dyn Detector>) -> Result<Self, DetectionError> {
        let latest = Arc::new(Mutex::new(None));
        let status = Arc::new(Mutex::new(DetectionStatus::default()));
        let reset_requested = Arc::new(AtomicBool::new(false));
        let busy = Arc::new(AtomicBool::new(false));
        let detector_name = detector.name().to_string();

        let (request_sender, request_receiver) = crossbeam_channel::bounded::<DetectionRequest>(0);

        let latest_clone = latest.clone();
        let status_clone = status.clone();
        let reset_clone = reset_requested.clone();
        let busy_clone = busy.clone();

        let thread_handle = std::thread::Builder::new()
            .name("detection".to_string())
            .spawn(move || {
                Self::worker_thread(
                    detector,
                    request_receiver,
                    latest_clone,
                    status_clone,
                    reset_clone,
                    busy_clone,
                );
            })
            .map_err(|e| DetectionError::Worker(format!("Failed to spawn detection thread: {}", e)))?;

        log::info!("Detection worker started ({})", detector_name);

        Ok(Self {
            latest,
            status,
            request_sender: Some(request_sender),
            reset_requested,
            busy,
            thread_handle: Some(thread_handle),
            detector_name,
        })
    }

    /// Worker thread main loop
    fn worker_thread(
        mut detector: Box<dyn Detector>,
        request_receiver: Receiver<DetectionRequest>,
        latest: Arc<Mutex<Option<DetectionSnapshot>>>,
        status: Arc<Mutex<DetectionStatus>>,
        reset_requested: Arc<AtomicBool>,
        busy: Arc<AtomicBool>,
    ) {
        let mut generation = 0u64;

        // Ends when the sender is dropped
        while let Ok(request) = request_receiver.recv() {
            busy.store(true, Ordering::Release);
            if reset_requested.swap(false, Ordering::AcqRel) {
                detector.reset();
            }

            match detector.detect(&request.frame) {
                Ok(detections) => {
                    generation += 1;
                    let detections = request.filter.apply(detections);
                    log::debug!(
                        "Detection cycle {} on frame {}: {} objects",
                        generation,
                        request.frame_number,
                        detections.len()
                    );
                    *latest.lock() = Some(DetectionSnapshot {
                        generation,
                        frame_number: request.frame_number,
                        detections,
                    });
                    status.lock().completed += 1;
                }
                Err(e) => {
                    log::warn!("Detection failed: {}", e);
                    let mut status = status.lock();
                    status.failed += 1;
                    status.last_error = Some(e.to_string());
                }
            }
            busy.store(false, Ordering::Release);
        }

        log::info!("Detection worker stopped");
    }

    /// Offer a frame for detection without blocking
    ///
    /// Returns `false` when the worker is still busy with an earlier frame;
    /// the frame is dropped in that case.
    pub fn submit(&self, frame: &RgbaImage, frame_number: u64, filter: &DetectionFilter) -> bool {
        let Some(sender) = &self.request_sender else { return false };
        if self.is_busy() {
            return false;
        }
        let request = DetectionRequest {
            frame: frame.clone(),
            frame_number,
            filter: filter.clone(),
        };
        match sender.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("Detection worker ({}) is gone", self.detector_name);
                false
            }
        }
    }

    /// Whether a detection cycle is in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Latest completed snapshot, if newer than `seen_generation`
    pub fn newer_than(&self, seen_generation: u64) -> Option<DetectionSnapshot> {
        self.latest
            .lock()
            .as_ref()
            .filter(|s| s.generation > seen_generation)
            .cloned()
    }

    /// Worker health counters
    pub fn status(&self) -> DetectionStatus {
        self.status.lock().clone()
    }

    /// Ask the detector to drop its per-session state before its next cycle
    pub fn request_reset(&self) {
        self.reset_requested.store(true, Ordering::Release);
    }

    /// Detector name
    pub fn detector_name(&self) -> &str {
        &self.detector_name
    }

    /// Stop the worker thread, waiting for an in-flight cycle to finish
    pub fn stop(&mut self) {
        // Dropping the sender ends the receive loop
        self.request_sender = None;

        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Detection worker ({}) panicked", self.detector_name);
            }
        }
        *self.latest.lock() = None;
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::detection::BoundingBox;
    use std::time::{Duration, Instant};

    /// Detector returning a fixed list
    pub(crate) struct FixedDetector(pub Vec<Detection>);

    impl Detector for FixedDetector {
        fn detect(&mut self, _frame: &RgbaImage) -> Result<Vec<Detection>, DetectionError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&mut self, _frame: &RgbaImage) -> Result<Vec<Detection>, DetectionError> {
            Err(DetectionError::Inference("boom".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Detector that holds each cycle until released
    struct GatedDetector(crossbeam_channel::Receiver<()>);

    impl Detector for GatedDetector {
        fn detect(&mut self, _frame: &RgbaImage) -> Result<Vec<Detection>, DetectionError> {
            let _ = self.0.recv_timeout(Duration::from_secs(5));
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    fn wait_for(deadline: Instant, condition: impl Fn() -> bool) -> bool {
        while !condition() {
            if Instant::now() > deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Submit until the worker accepts, then wait for a snapshot newer than `seen`
    fn run_cycle(worker: &DetectionWorker, seen: u64) -> Option<DetectionSnapshot> {
        let frame = RgbaImage::new(8, 8);
        let filter = DetectionFilter {
            score_threshold: 0.0,
            ..Default::default()
        };
        let deadline = Instant::now() + Duration::from_secs(5);
        while !worker.submit(&frame, 1, &filter) {
            if Instant::now() > deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        while Instant::now() < deadline {
            if let Some(snapshot) = worker.newer_than(seen) {
                return Some(snapshot);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        None
    }

    #[test]
    fn test_worker_publishes_capped_snapshot() {
        let list: Vec<Detection> = (0..15)
            .map(|i| Detection::new("person", 0.9, BoundingBox::new(i as f32 * 20.0, 0.0, 10.0, 10.0)))
            .collect();
        let worker = DetectionWorker::spawn(Box::new(FixedDetector(list))).unwrap();

        let snapshot = run_cycle(&worker, 0).expect("no snapshot");
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.detections.len(), 10);

        let next = run_cycle(&worker, snapshot.generation).expect("no second snapshot");
        assert_eq!(next.generation, 2);
        assert!(worker.newer_than(next.generation).is_none());
    }

    #[test]
    fn test_worker_failure_keeps_previous_snapshot() {
        let worker = DetectionWorker::spawn(Box::new(FailingDetector)).unwrap();
        let frame = RgbaImage::new(8, 8);
        let filter = DetectionFilter::default();

        let deadline = Instant::now() + Duration::from_secs(5);
        while worker.status().failed == 0 && Instant::now() < deadline {
            worker.submit(&frame, 1, &filter);
            std::thread::sleep(Duration::from_millis(1));
        }

        let status = worker.status();
        assert!(status.failed >= 1);
        assert_eq!(status.completed, 0);
        assert_eq!(status.last_error.as_deref(), Some("Inference failed: boom"));
        assert!(worker.newer_than(0).is_none());
    }

    #[test]
    fn test_stop_rejects_new_frames() {
        let mut worker = DetectionWorker::spawn(Box::new(FixedDetector(Vec::new()))).unwrap();
        worker.stop();
        assert!(!worker.submit(&RgbaImage::new(4, 4), 0, &DetectionFilter::default()));
        assert!(worker.newer_than(0).is_none());
    }

    #[test]
    fn test_busy_worker_rejects_frames_until_cycle_ends() {
        let (release, gate) = crossbeam_channel::unbounded();
        let worker = DetectionWorker::spawn(Box::new(GatedDetector(gate))).unwrap();
        let frame = RgbaImage::new(8, 8);
        let filter = DetectionFilter::default();
        let deadline = Instant::now() + Duration::from_secs(5);

        assert!(!worker.is_busy());
        assert!(wait_for(deadline, || worker.submit(&frame, 1, &filter)));
        assert!(wait_for(deadline, || worker.is_busy()));

        for _ in 0..5 {
            assert!(!worker.submit(&frame, 2, &filter));
        }

        release.send(()).unwrap();
        assert!(wait_for(deadline, || worker.newer_than(0).is_some()));
        assert!(wait_for(deadline, || !worker.is_busy()));

        assert!(wait_for(deadline, || worker.submit(&frame, 3, &filter)));
        release.send(()).unwrap();
        assert!(wait_for(deadline, || worker.newer_than(1).is_some()));
        assert!(wait_for(deadline, || !worker.is_busy()));
        assert_eq!(worker.status().completed, 2);
    }
}
