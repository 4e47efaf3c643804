use super::{FrameSnapshot, ObjectDetector};
use crate::error::DetectorError;
use crate::types::Detection;

/// Owned handle to the object detector for one session.
///
/// Loading failures leave the adapter unavailable rather than failing the
/// session: every `detect` call then returns no detections.
pub struct DetectorAdapter {
    backend: Option<Box<dyn ObjectDetector>>,
    unavailable_reason: Option<String>,
}

impl Default for DetectorAdapter {
    fn default() -> Self {
        Self::unloaded()
    }
}

impl std::fmt::Debug for DetectorAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorAdapter")
            .field("available", &self.is_available())
            .field("unavailable_reason", &self.unavailable_reason)
            .finish()
    }
}

impl DetectorAdapter {
    /// Adapter with no backend that has not been asked to load yet
    pub fn unloaded() -> Self {
        Self {
            backend: None,
            unavailable_reason: None,
        }
    }

    /// Wrap an already constructed detector
    pub fn with_detector<D: ObjectDetector + 'static>(detector: D) -> Self {
        Self {
            backend: Some(Box::new(detector)),
            unavailable_reason: None,
        }
    }

    /// Build an adapter from the result of a model load
    pub fn from_load_result(result: Result<Box<dyn ObjectDetector>, DetectorError>) -> Self {
        match result {
            Ok(backend) => Self {
                backend: Some(backend),
                unavailable_reason: None,
            },
            Err(e) => {
                log::warn!("object detector unavailable, analysis will run degraded: {e}");
                Self {
                    backend: None,
                    unavailable_reason: Some(e.to_string()),
                }
            }
        }
    }

    /// Run a loader and wrap whatever it produced
    pub fn load<F>(loader: F) -> Self
    where
        F: FnOnce() -> Result<Box<dyn ObjectDetector>, DetectorError>,
    {
        Self::from_load_result(loader())
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Why the last load failed, if it did
    pub fn unavailable_reason(&self) -> Option<&str> {
        self.unavailable_reason.as_deref()
    }

    /// Detect objects in `frame`, returning an empty list when the backend is
    /// missing or inference fails
    pub fn detect(&mut self, frame: &FrameSnapshot) -> Vec<Detection> {
        let Some(backend) = self.backend.as_mut() else {
            return Vec::new();
        };
        match backend.detect(frame) {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!("inference failed at {:.2}s: {e}", frame.timestamp);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn frame() -> FrameSnapshot {
        FrameSnapshot::empty(1.0, 640, 480)
    }

    #[test]
    fn test_unloaded_returns_nothing() {
        let mut adapter = DetectorAdapter::unloaded();
        assert!(!adapter.is_available());
        assert!(adapter.detect(&frame()).is_empty());
    }

    #[test]
    fn test_wraps_closure_detector() {
        let mut adapter = DetectorAdapter::with_detector(|_: &FrameSnapshot| -> Result<Vec<Detection>, DetectorError> {
            Ok(vec![Detection::new("person", 0.9, BoundingBox::new(0.0, 0.0, 1.0, 1.0))])
        });
        assert!(adapter.is_available());
        assert_eq!(adapter.detect(&frame()).len(), 1);
    }

    #[test]
    fn test_failed_load_degrades() {
        let mut adapter =
            DetectorAdapter::load(|| Err(DetectorError::LoadFailed("no webgpu".to_string())));
        assert!(!adapter.is_available());
        assert_eq!(
            adapter.unavailable_reason(),
            Some("Detector failed to load: no webgpu")
        );
        assert!(adapter.detect(&frame()).is_empty());
    }

    #[test]
    fn test_inference_error_is_swallowed() {
        let mut adapter = DetectorAdapter::with_detector(|_: &FrameSnapshot| -> Result<Vec<Detection>, DetectorError> {
            Err(DetectorError::InferenceFailed("oom".to_string()))
        });
        assert!(adapter.detect(&frame()).is_empty());
    }
}
