//! mirrorface-core — Face identification and session-state engine.
//!
//! Normalizes raw detector output into usable regions, matches live face
//! embeddings against a gallery of enrolled users, and debounces the noisy
//! per-frame results into stable login/logout transitions for the host.

pub mod detector;
pub mod embedder;
pub mod events;
pub mod gallery;
pub mod matcher;
pub mod region;
pub mod report;
pub mod session;

pub use detector::FaceDetector;
pub use embedder::{Embedder, FacenetEmbedder};
pub use events::{Event, EventSink, Identity, MatchedFace};
pub use gallery::{EnrolledSample, Gallery};
pub use matcher::Matcher;
pub use region::FaceRegion;
pub use report::{FrameReporter, HeadlessReporter};
pub use session::{SessionTracker, Transition};
