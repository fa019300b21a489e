//! Drives the per-frame pipeline from camera capture to emitted events.
//!
//! Startup is an explicit phase: models, gallery and camera are all
//! acquired before the first frame, so a misconfigured deployment fails
//! before the host starts listening for transitions. The loop itself is
//! strictly sequential: acquire, detect, embed, match, update state, emit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::GrayImage;
use mirrorface_core::detector::DetectorError;
use mirrorface_core::embedder::EmbedderError;
use mirrorface_core::events::{Event, EventSink, MatchedFace};
use mirrorface_core::gallery::GalleryError;
use mirrorface_core::region;
use mirrorface_core::{
    Embedder, FaceDetector, FacenetEmbedder, FrameReporter, Gallery, HeadlessReporter, Matcher,
    SessionTracker,
};
use mirrorface_hw::{Camera, CameraError, Frame};
use thiserror::Error;

use crate::config::Settings;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("embedder error: {0}")]
    Embedder(#[from] EmbedderError),
    #[error("gallery error: {0}")]
    Gallery(#[from] GalleryError),
}

pub struct Engine {
    camera: Camera,
    detector: FaceDetector,
    embedder: Box<dyn Embedder + Send>,
    gallery: Gallery,
    matcher: Matcher,
    session: SessionTracker,
    reporter: Box<dyn FrameReporter + Send>,
    sink: Arc<dyn EventSink>,
    interval: std::time::Duration,
    stop: Arc<AtomicBool>,
}

impl Engine {
    /// Run the startup phase: load both models, build the gallery, open
    /// the camera. Any failure here is a configuration error; the caller
    /// reports it and exits without entering the loop.
    pub fn start(
        settings: &Settings,
        sink: Arc<dyn EventSink>,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, EngineError> {
        let detector = FaceDetector::load(&settings.detector_model_path())?;
        sink.emit(&Event::log("Face detector initialized"));

        let mut embedder = FacenetEmbedder::load(&settings.embedder_model_path())?;
        sink.emit(&Event::log("Embedding model initialized"));

        let gallery = Gallery::load(&settings.gallery_dir, &mut embedder, &sink)?;
        sink.emit(&Event::log(format!(
            "Gallery loaded with {} enrolled image(s)",
            gallery.len()
        )));

        let camera_index = if settings.use_usb_cam { 1 } else { 0 };
        let camera = Camera::open_index(camera_index)?;
        sink.emit(&Event::status("Webcam loaded..."));

        let matcher = Matcher::new(settings.threshold, sink.clone());
        let session = SessionTracker::new(settings.logout_delay, sink.clone());
        let reporter = Box::new(HeadlessReporter::new(sink.clone()));

        Ok(Self {
            camera,
            detector,
            embedder: Box::new(embedder),
            gallery,
            matcher,
            session,
            reporter,
            sink,
            interval: settings.interval,
            stop,
        })
    }

    /// The frame loop. Returns when the stop flag is raised or frame
    /// acquisition fails — a camera in a confirmed-failed state is not
    /// retried. Consumes the engine so the camera handle is released on
    /// every exit path.
    pub fn run(mut self) {
        tracing::info!("frame loop started");

        while !self.stop.load(Ordering::Relaxed) {
            let frame = match self.camera.capture_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    self.sink
                        .emit(&Event::log(format!("No image from camera, exiting: {err}")));
                    break;
                }
            };

            self.process_frame(&frame);
            std::thread::sleep(self.interval);
        }

        self.sink
            .emit(&Event::status("Shutdown: cleaning up camera..."));
        tracing::info!("frame loop finished");
    }

    fn process_frame(&mut self, frame: &Frame) {
        let Some(gray) = GrayImage::from_raw(frame.width, frame.height, frame.data.clone()) else {
            self.sink
                .emit(&Event::log("Frame buffer size mismatch, skipping frame"));
            return;
        };

        let (raw, scale_factor) = self.detector.detect_scaled(&gray);
        let regions =
            region::normalize_and_report(&raw, frame.width, frame.height, scale_factor, &self.sink);

        // The matcher only runs when a face is present; without a region
        // there is no live embedding to compare.
        let matched: Vec<MatchedFace> = match regions.first() {
            Some(face) => {
                let crop =
                    image::imageops::crop_imm(&gray, face.left, face.top, face.width(), face.height())
                        .to_image();
                match self.embedder.embed(&crop) {
                    Ok(live) => self.matcher.match_all(self.gallery.samples(), &live),
                    Err(err) => {
                        // One failed inference must not stop the session;
                        // the frame degrades to "no qualifying match".
                        self.sink
                            .emit(&Event::log(format!("Embedding failed for frame: {err}")));
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let transition = self
            .session
            .observe(&matched, regions.len(), Instant::now());
        self.reporter
            .on_frame_result(transition.as_ref(), &matched, &regions);
    }
}
