//! Face embedding via a FaceNet ONNX model.
//!
//! The embedder maps a face crop to a fixed-length vector whose squared
//! distances the matcher thresholds. Preprocessing follows FaceNet: resize
//! to 160x160 and whiten (per-image standardization).

use std::path::Path;

use image::imageops::FilterType;
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

const FACENET_INPUT_SIZE: usize = 160;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("embedding model not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Anything that can turn a face image into an embedding vector.
///
/// The gallery loader and the frame loop only see this trait; tests swap
/// in stubs, the daemon runs [`FacenetEmbedder`].
pub trait Embedder {
    fn embed(&mut self, face: &GrayImage) -> Result<Vec<f32>, EmbedderError>;
}

/// FaceNet embedder running on ONNX Runtime.
pub struct FacenetEmbedder {
    session: Session,
}

impl FacenetEmbedder {
    pub fn load(model_path: &str) -> Result<Self, EmbedderError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::<()>::from)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "FaceNet model loaded"
        );

        Ok(Self { session })
    }

    /// Resize to 160x160 and whiten into an NCHW tensor, grayscale
    /// replicated across the three channels.
    fn preprocess(face: &GrayImage) -> Array4<f32> {
        let size = FACENET_INPUT_SIZE;
        let resized = image::imageops::resize(face, size as u32, size as u32, FilterType::Triangle);

        let pixels: Vec<f32> = resized.as_raw().iter().map(|&p| p as f32).collect();
        let n = pixels.len() as f32;
        let mean = pixels.iter().sum::<f32>() / n;
        let variance = pixels.iter().map(|p| (p - mean) * (p - mean)).sum::<f32>() / n;
        // Floor the deviation so near-constant crops don't blow up.
        let std_adjusted = variance.sqrt().max(1.0 / n.sqrt());

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for y in 0..size {
            for x in 0..size {
                let whitened = (pixels[y * size + x] - mean) / std_adjusted;
                tensor[[0, 0, y, x]] = whitened;
                tensor[[0, 1, y, x]] = whitened;
                tensor[[0, 2, y, x]] = whitened;
            }
        }
        tensor
    }
}

impl Embedder for FacenetEmbedder {
    fn embed(&mut self, face: &GrayImage) -> Result<Vec<f32>, EmbedderError> {
        let input = Self::preprocess(face);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if data.is_empty() {
            return Err(EmbedderError::InferenceFailed(
                "model produced an empty embedding".into(),
            ));
        }

        Ok(data.to_vec())
    }
}
