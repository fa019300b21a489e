//! Turns raw detector boxes into padded regions in original-image coordinates.
//!
//! The detector runs on a downscaled working image to keep per-frame cost
//! bounded; its boxes must be rescaled to the original resolution, padded
//! so crops include the whole head, and clamped to the frame.

use std::sync::Arc;

use crate::events::{Event, EventSink};

/// Width the frame is downscaled to before detection.
pub const WORKING_WIDTH: u32 = 400;

/// Symmetric padding applied around each detected box, percent of box size.
pub const PADDING_PCT: u32 = 15;

/// A raw detector box in working-image coordinates.
#[derive(Debug, Clone, Copy)]
pub struct RawDetection {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A face region in original-image coordinates.
///
/// Invariant: `0 <= left < right <= frame_width` and
/// `0 <= top < bottom <= frame_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl FaceRegion {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Rescale, pad and clamp raw detector boxes into [`FaceRegion`]s.
///
/// `scale_factor` is `original_width / WORKING_WIDTH`. Boxes that collapse
/// to zero area after clamping (fully outside the frame) are dropped, so
/// every returned region satisfies the [`FaceRegion`] invariant.
pub fn normalize_regions(
    raw: &[RawDetection],
    frame_width: u32,
    frame_height: u32,
    scale_factor: f32,
    padding_pct: u32,
) -> Vec<FaceRegion> {
    let mut regions = Vec::with_capacity(raw.len());

    for det in raw {
        let x = (det.x as f32 * scale_factor).round() as i64;
        let y = (det.y as f32 * scale_factor).round() as i64;
        let w = (det.width as f32 * scale_factor).round() as i64;
        let h = (det.height as f32 * scale_factor).round() as i64;

        let width_padding = (w as f32 * padding_pct as f32 / 100.0).round() as i64;
        let height_padding = (h as f32 * padding_pct as f32 / 100.0).round() as i64;

        let left = (x - width_padding).clamp(0, frame_width as i64);
        let top = (y - height_padding).clamp(0, frame_height as i64);
        let right = (x + w + width_padding).clamp(0, frame_width as i64);
        let bottom = (y + h + height_padding).clamp(0, frame_height as i64);

        if left < right && top < bottom {
            regions.push(FaceRegion {
                left: left as u32,
                top: top as u32,
                right: right as u32,
                bottom: bottom as u32,
            });
        } else {
            tracing::debug!(?det, "dropping degenerate region after clamping");
        }
    }

    regions
}

/// [`normalize_regions`] plus the per-frame found-count report on the sink.
pub fn normalize_and_report(
    raw: &[RawDetection],
    frame_width: u32,
    frame_height: u32,
    scale_factor: f32,
    sink: &Arc<dyn EventSink>,
) -> Vec<FaceRegion> {
    let regions = normalize_regions(raw, frame_width, frame_height, scale_factor, PADDING_PCT);
    sink.emit(&Event::log(format!("Found {} face(s)", regions.len())));
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;

    fn det(x: i32, y: i32, width: u32, height: u32) -> RawDetection {
        RawDetection {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let regions = normalize_regions(&[], 640, 480, 1.6, PADDING_PCT);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_rescale_and_pad_interior_box() {
        // 100x100 box at (100, 50) in a 400-wide working image, frame 800x600.
        // Scale 2.0 => (200, 100) 200x200; padding 15% of 200 = 30.
        let regions = normalize_regions(&[det(100, 50, 100, 100)], 800, 600, 2.0, 15);
        assert_eq!(
            regions,
            vec![FaceRegion {
                left: 170,
                top: 70,
                right: 430,
                bottom: 330,
            }]
        );
    }

    #[test]
    fn test_clamps_to_frame_edges() {
        // Box touching the top-left corner: padding pushes it past 0.
        let regions = normalize_regions(&[det(0, 0, 100, 100)], 800, 600, 2.0, 15);
        let r = regions[0];
        assert_eq!(r.left, 0);
        assert_eq!(r.top, 0);
        assert_eq!(r.right, 230);
        assert_eq!(r.bottom, 230);

        // Box at the bottom-right of the working image.
        let regions = normalize_regions(&[det(350, 250, 50, 50)], 800, 600, 2.0, 15);
        let r = regions[0];
        assert_eq!(r.right, 800);
        assert_eq!(r.bottom, 600);
        assert!(r.left < r.right && r.top < r.bottom);
    }

    #[test]
    fn test_invariant_holds_for_arbitrary_boxes() {
        let frame_w = 640;
        let frame_h = 480;
        let boxes = [
            det(-10, -10, 40, 40),
            det(0, 0, 1, 1),
            det(390, 290, 30, 30),
            det(5, 250, 200, 200),
        ];
        for region in normalize_regions(&boxes, frame_w, frame_h, 1.6, 15) {
            assert!(region.left < region.right);
            assert!(region.top < region.bottom);
            assert!(region.right <= frame_w);
            assert!(region.bottom <= frame_h);
        }
    }

    #[test]
    fn test_fully_outside_box_is_dropped() {
        // Entirely right of the frame once scaled.
        let regions = normalize_regions(&[det(500, 10, 20, 20)], 640, 480, 1.6, 15);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_report_emits_found_count() {
        let sink = std::sync::Arc::new(MemorySink::new());
        let sink_dyn: std::sync::Arc<dyn crate::events::EventSink> = sink.clone();
        normalize_and_report(&[det(10, 10, 50, 50)], 640, 480, 1.6, &sink_dyn);
        let logs = sink.events_of_type("log");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message(), serde_json::json!("Found 1 face(s)"));
    }
}
