//! Neglect Lens - detection-driven neglect effects for live video
//!
//! Takes camera frames plus object detections and simulates hemispatial
//! neglect (the left hemifield of the view degrades) and object neglect
//! (the left half of every detected object degrades) by compositing
//! region effects onto an output raster.

pub mod camera;
pub mod compositor;
pub mod detection;
pub mod effects;
pub mod identity;
pub mod registry;
pub mod settings;
pub mod spatial;
pub mod telemetry;

pub use compositor::{EngineError, NeglectEngine};
pub use detection::{BoundingBox, Detection, DetectionError, Detector};
pub use settings::EngineSettings;
