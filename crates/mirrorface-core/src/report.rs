//! Per-frame result reporting.
//!
//! A single extension point for whatever should happen with a finished
//! frame beyond the session bookkeeping itself. The daemon runs the
//! headless implementation; a windowed overlay would be another
//! implementation selected at composition time.

use std::sync::Arc;

use crate::events::{Event, EventSink, MatchedFace};
use crate::region::FaceRegion;
use crate::session::Transition;

pub trait FrameReporter {
    /// Called once per processed frame, after the session update.
    fn on_frame_result(
        &self,
        transition: Option<&Transition>,
        matched_faces: &[MatchedFace],
        regions: &[FaceRegion],
    );
}

/// Headless reporter: forwards the raw match results to the host every
/// frame as a `matchResults` debug event, regardless of what the session
/// machine committed.
pub struct HeadlessReporter {
    sink: Arc<dyn EventSink>,
}

impl HeadlessReporter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }
}

impl FrameReporter for HeadlessReporter {
    fn on_frame_result(
        &self,
        transition: Option<&Transition>,
        matched_faces: &[MatchedFace],
        regions: &[FaceRegion],
    ) {
        if let Some(transition) = transition {
            tracing::info!(?transition, regions = regions.len(), "session transition");
        }
        self.sink.emit(&Event::MatchResults {
            matched_faces: matched_faces.to_vec(),
        });
    }
}
