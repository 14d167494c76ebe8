//! Camera capture via nokhwa
//!
//! Frames are captured on a background thread and the most recent one is
//! kept in a single slot for the render thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use parking_lot::Mutex;

use super::{Frame, FrameSource};

/// How long `open` waits for the device to start streaming
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Camera errors
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("Failed to open camera {index}: {message}")]
    Open { index: u32, message: String },
    #[error("Failed to spawn capture thread: {0}")]
    Thread(String),
    #[error("Camera {0} did not start in time")]
    Timeout(u32),
}

/// Information about an available camera
#[derive(Clone, Debug)]
pub struct CameraInfo {
    pub index: u32,
    pub name: String,
}

/// Live camera frame source
pub struct CameraCapture {
    /// Latest captured frame
    latest: Arc<Mutex<Option<Frame>>>,
    /// Whether capture is running
    running: Arc<AtomicBool>,
    /// Capture thread handle
    thread_handle: Option<std::thread::JoinHandle<()>>,
    /// Negotiated resolution
    width: u32,
    height: u32,
    /// Frame counter
    frame_count: Arc<AtomicU64>,
}

impl CameraCapture {
    /// List available cameras
    pub fn list_cameras() -> Vec<CameraInfo> {
        match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
            Ok(camera_list) => camera_list
                .iter()
                .enumerate()
                .map(|(idx, info)| CameraInfo {
                    index: idx as u32,
                    name: info.human_name().to_string(),
                })
                .collect(),
            Err(e) => {
                log::warn!("Failed to enumerate cameras: {:?}", e);
                Vec::new()
            }
        }
    }

    /// Open a camera and start streaming
    ///
    /// Blocks until the device reports its resolution or fails to open.
    pub fn open(camera_index: u32) -> Result<Self, CameraError> {
        let latest = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let frame_count = Arc::new(AtomicU64::new(0));
        let (opened_tx, opened_rx) = crossbeam_channel::bounded::<Result<(u32, u32), String>>(1);

        let latest_clone = latest.clone();
        let running_clone = running.clone();
        let frame_count_clone = frame_count.clone();

        let thread_handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                Self::capture_thread(
                    camera_index,
                    opened_tx,
                    latest_clone,
                    running_clone,
                    frame_count_clone,
                );
            })
            .map_err(|e| CameraError::Thread(e.to_string()))?;

        let opened = opened_rx.recv_timeout(OPEN_TIMEOUT);
        let (width, height) = match opened {
            Ok(Ok(size)) => size,
            Ok(Err(message)) => {
                let _ = thread_handle.join();
                return Err(CameraError::Open {
                    index: camera_index,
                    message,
                });
            }
            Err(_) => {
                running.store(false, Ordering::Release);
                return Err(CameraError::Timeout(camera_index));
            }
        };

        Ok(Self {
            latest,
            running,
            thread_handle: Some(thread_handle),
            width,
            height,
            frame_count,
        })
    }

    fn open_device(camera_index: u32) -> Result<Camera, String> {
        let index = CameraIndex::Index(camera_index);

        let attempts = [
            RequestedFormatType::AbsoluteHighestResolution,
            RequestedFormatType::HighestResolution(Resolution::new(640, 480)),
            RequestedFormatType::None,
        ];

        let mut last_error = String::new();
        for format in attempts {
            match Camera::new(index.clone(), RequestedFormat::new::<RgbAFormat>(format)) {
                Ok(camera) => return Ok(camera),
                Err(e) => {
                    log::warn!("Camera format {:?} rejected: {:?}", format, e);
                    last_error = e.to_string();
                }
            }
        }
        Err(last_error)
    }

    /// Camera capture thread
    fn capture_thread(
        camera_index: u32,
        opened: crossbeam_channel::Sender<Result<(u32, u32), String>>,
        latest: Arc<Mutex<Option<Frame>>>,
        running: Arc<AtomicBool>,
        frame_count: Arc<AtomicU64>,
    ) {
        log::info!("Starting camera capture thread (camera {})", camera_index);

        let mut camera = match Self::open_device(camera_index) {
            Ok(camera) => camera,
            Err(e) => {
                log::error!("Failed to open camera with all format attempts: {}", e);
                let _ = opened.send(Err(e));
                return;
            }
        };

        if let Err(e) = camera.open_stream() {
            log::error!("Failed to open camera stream: {:?}", e);
            let _ = opened.send(Err(e.to_string()));
            return;
        }

        let resolution = camera.resolution();
        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            resolution.width(),
            resolution.height()
        );
        let _ = opened.send(Ok((resolution.width(), resolution.height())));

        while running.load(Ordering::Acquire) {
            let frame = match camera.frame() {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Failed to capture frame: {:?}", e);
                    std::thread::sleep(Duration::from_millis(10));
                    continue;
                }
            };

            let decoded = match frame.decode_image::<RgbAFormat>() {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::warn!("Failed to decode frame: {:?}", e);
                    continue;
                }
            };

            let (width, height) = (frame.resolution().width(), frame.resolution().height());
            let Some(image) = RgbaImage::from_raw(width, height, decoded.into_raw()) else {
                log::warn!("Frame buffer does not match {}x{}", width, height);
                continue;
            };

            let frame_number = frame_count.fetch_add(1, Ordering::Relaxed);
            *latest.lock() = Some(Frame {
                image,
                frame_number,
                timestamp: Instant::now(),
            });
        }

        if let Err(e) = camera.stop_stream() {
            log::warn!("Failed to stop camera stream: {:?}", e);
        }
        log::info!("Camera capture thread stopped");
    }

    /// Number of frames captured so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Stop capturing
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        *self.latest.lock() = None;
    }
}

impl FrameSource for CameraCapture {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn is_ready(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.width > 0 && self.height > 0
    }

    fn latest_frame(&self) -> Option<Frame> {
        self.latest.lock().clone()
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
