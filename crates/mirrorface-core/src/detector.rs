//! Frontal-face detection via the `rustface` crate (SeetaFace engine).
//!
//! Detection runs on a copy of the frame downscaled to [`WORKING_WIDTH`]
//! pixels wide; the returned boxes are in working-image coordinates and go
//! through [`crate::region::normalize_regions`] before any cropping.

use std::path::Path;

use image::imageops::FilterType;
use image::GrayImage;
use thiserror::Error;

use crate::region::{RawDetection, WORKING_WIDTH};

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detector model not found: {0}")]
    ModelNotFound(String),
    #[error("failed to read detector model {path}: {source}")]
    ModelRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse detector model {path}: {message}")]
    ModelParse { path: String, message: String },
}

/// SeetaFace frontal-face detector.
///
/// Holds the parsed model; a detector instance is created per call since
/// `rustface` detectors are stateful and not shareable across calls.
pub struct FaceDetector {
    model: rustface::Model,
}

impl FaceDetector {
    /// Load the SeetaFace model from disk. Fails fast if the file is
    /// missing — detection is mandatory for the frame loop.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }
        let bytes = std::fs::read(model_path).map_err(|source| DetectorError::ModelRead {
            path: model_path.to_string(),
            source,
        })?;
        let model = rustface::read_model(std::io::Cursor::new(bytes)).map_err(|e| {
            DetectorError::ModelParse {
                path: model_path.to_string(),
                message: e.to_string(),
            }
        })?;

        tracing::info!(path = model_path, "SeetaFace detector model loaded");
        Ok(Self { model })
    }

    /// Detect faces in a grayscale frame.
    ///
    /// Returns the raw boxes in working-image coordinates together with
    /// the factor that maps them back to the original resolution.
    pub fn detect_scaled(&self, gray: &GrayImage) -> (Vec<RawDetection>, f32) {
        let (width, height) = gray.dimensions();
        let scale_factor = width as f32 / WORKING_WIDTH as f32;

        let working = if width > WORKING_WIDTH {
            let working_height =
                ((height as f32 / scale_factor).round() as u32).max(1);
            image::imageops::resize(gray, WORKING_WIDTH, working_height, FilterType::Triangle)
        } else {
            gray.clone()
        };
        // If the frame was already narrower than the working width, the
        // boxes are in original coordinates: scale factor 1.
        let scale_factor = if width > WORKING_WIDTH { scale_factor } else { 1.0 };

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(30);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let (ww, wh) = working.dimensions();
        let faces = detector.detect(&rustface::ImageData::new(working.as_raw(), ww, wh));

        let raw = faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                RawDetection {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width(),
                    height: bbox.height(),
                }
            })
            .collect();

        (raw, scale_factor)
    }
}
