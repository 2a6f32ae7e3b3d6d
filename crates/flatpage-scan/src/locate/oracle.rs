// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Oracle corner locator — asks an external vision model for the page corners
// and validates whatever comes back.

use std::sync::{Arc, OnceLock};

use flatpage_core::error::{FlatpageError, Result};
use flatpage_core::{Point, Quadrilateral, RasterBuffer};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::CornerLocator;
use crate::raster::codec;

/// A vision-capable service that answers a prompt about one image.
///
/// Implementations own their transport and its timeout; a timeout should be
/// reported as [`FlatpageError::OracleTimeout`].
pub trait CornerOracle: Send + Sync {
    /// Send `prompt` with one PNG-encoded image and return the reply text.
    fn ask(&self, prompt: &str, image_png: &[u8]) -> Result<String>;

    /// Cheap reachability check used by [`CornerLocator::initialize`].
    fn probe(&self) -> Result<()> {
        Ok(())
    }
}

/// Locator that delegates corner finding to a [`CornerOracle`].
///
/// Every failure (transport, timeout, unparsable reply, corner outside the
/// image) is reported as "not found". There are no retries.
pub struct OracleCornerLocator {
    oracle: Arc<dyn CornerOracle>,
    ready: OnceLock<std::result::Result<(), String>>,
}

impl OracleCornerLocator {
    pub fn new(oracle: Arc<dyn CornerOracle>) -> Self {
        Self {
            oracle,
            ready: OnceLock::new(),
        }
    }
}

impl CornerLocator for OracleCornerLocator {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn initialize(&self) -> Result<()> {
        self.ready
            .get_or_init(|| self.oracle.probe().map_err(|e| e.to_string()))
            .clone()
            .map_err(FlatpageError::Oracle)
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn locate(&self, image: &RasterBuffer) -> Option<Quadrilateral> {
        if let Some(Err(reason)) = self.ready.get() {
            warn!(%reason, "Oracle failed initialization; skipping");
            return None;
        }

        let png = match codec::encode_png(image) {
            Ok(png) => png,
            Err(err) => {
                warn!(error = %err, "Could not encode image for oracle");
                return None;
            }
        };

        let prompt = corner_prompt(image.width(), image.height());
        let reply = match self.oracle.ask(&prompt, &png) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "Oracle request failed; treating as not found");
                return None;
            }
        };
        debug!(reply_len = reply.len(), "Oracle replied");

        let Some(points) = parse_corner_reply(&reply) else {
            info!("Oracle reported no document or reply was unusable");
            return None;
        };

        let (w, h) = (image.width() as f64, image.height() as f64);
        if let Some(bad) = points
            .iter()
            .find(|p| !p.is_finite() || !(0.0..=w).contains(&p.x) || !(0.0..=h).contains(&p.y))
        {
            warn!(corner = ?bad, "Oracle corner outside the image; discarding result");
            return None;
        }

        let quad = Quadrilateral::from_unordered(points);
        info!(corners = ?quad.corners(), "Oracle located document");
        Some(quad)
    }
}

/// Instruction sent alongside the image.
pub fn corner_prompt(width: u32, height: u32) -> String {
    format!(
        "The image is {width}x{height} pixels and shows a photographed paper document. \
         Find the four corners of the document page in pixel coordinates, origin at the \
         top-left, x to the right, y downwards. Reply with JSON only, in the form \
         {{\"top_left\": {{\"x\": 0, \"y\": 0}}, \"top_right\": {{...}}, \
         \"bottom_right\": {{...}}, \"bottom_left\": {{...}}}}. \
         If no document is visible reply {{\"found\": false}}."
    )
}

/// A corner written either as `{"x": .., "y": ..}` or as `[x, y]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplyPoint {
    Object { x: f64, y: f64 },
    Pair([f64; 2]),
}

impl From<ReplyPoint> for Point {
    fn from(p: ReplyPoint) -> Self {
        match p {
            ReplyPoint::Object { x, y } => Point::new(x, y),
            ReplyPoint::Pair([x, y]) => Point::new(x, y),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CornerReply {
    Labeled {
        #[serde(alias = "topLeft")]
        top_left: ReplyPoint,
        #[serde(alias = "topRight")]
        top_right: ReplyPoint,
        #[serde(alias = "bottomRight")]
        bottom_right: ReplyPoint,
        #[serde(alias = "bottomLeft")]
        bottom_left: ReplyPoint,
    },
    Listed {
        corners: Vec<ReplyPoint>,
    },
    Verdict {
        #[allow(dead_code)]
        found: bool,
    },
}

/// Pull four corners out of a model reply.
///
/// The reply may wrap its JSON in prose or code fences; the outermost
/// `{ ... }` is parsed. Returns `None` for "not found" verdicts, malformed
/// JSON, or a corner list that is not exactly four long.
pub fn parse_corner_reply(reply: &str) -> Option<[Point; 4]> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    let parsed: CornerReply = serde_json::from_str(&reply[start..=end]).ok()?;

    match parsed {
        CornerReply::Labeled {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        } => Some([
            top_left.into(),
            top_right.into(),
            bottom_right.into(),
            bottom_left.into(),
        ]),
        CornerReply::Listed { corners } => {
            let points: Vec<Point> = corners.into_iter().map(Point::from).collect();
            points.try_into().ok()
        }
        CornerReply::Verdict { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned oracle that records what it was asked.
    struct MockOracle {
        reply: std::result::Result<String, String>,
        probe_ok: bool,
        probes: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl MockOracle {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.into()),
                probe_ok: true,
                probes: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.into()),
                ..Self::replying("")
            }
        }
    }

    impl CornerOracle for MockOracle {
        fn ask(&self, prompt: &str, image_png: &[u8]) -> Result<String> {
            assert_eq!(&image_png[1..4], b"PNG");
            self.prompts.lock().expect("lock").push(prompt.into());
            self.reply.clone().map_err(FlatpageError::Oracle)
        }

        fn probe(&self) -> Result<()> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.probe_ok {
                Ok(())
            } else {
                Err(FlatpageError::Oracle("unreachable".into()))
            }
        }
    }

    fn image() -> RasterBuffer {
        RasterBuffer::filled(400, 300, 3, 90).expect("raster")
    }

    #[test]
    fn labeled_reply_in_code_fence() {
        let reply = "Sure!\n```json\n{\"top_left\": {\"x\": 10, \"y\": 12}, \
                     \"top_right\": {\"x\": 390, \"y\": 8}, \
                     \"bottom_right\": {\"x\": 380, \"y\": 290}, \
                     \"bottom_left\": {\"x\": 15, \"y\": 295}}\n```";
        let oracle = Arc::new(MockOracle::replying(reply));
        let locator = OracleCornerLocator::new(oracle.clone());
        locator.initialize().expect("probe ok");

        let quad = locator.locate(&image()).expect("corners parsed");
        assert_eq!(quad.top_left, Point::new(10.0, 12.0));
        assert_eq!(quad.bottom_left, Point::new(15.0, 295.0));

        let prompts = oracle.prompts.lock().expect("lock");
        assert!(prompts[0].contains("400x300"));
    }

    #[test]
    fn listed_pairs_are_reordered() {
        let reply = r#"{"corners": [[380, 290], [10, 12], [15, 295], [390, 8]]}"#;
        let corners = parse_corner_reply(reply).expect("parsed");
        let quad = Quadrilateral::from_unordered(corners);
        assert_eq!(quad.top_right, Point::new(390.0, 8.0));
        assert_eq!(quad.bottom_right, Point::new(380.0, 290.0));
    }

    #[test]
    fn camel_case_keys_are_accepted() {
        let reply = r#"{"topLeft": [1, 2], "topRight": [3, 2], "bottomRight": [3, 4], "bottomLeft": [1, 4]}"#;
        assert!(parse_corner_reply(reply).is_some());
    }

    #[test]
    fn verdicts_and_garbage_are_not_found() {
        assert!(parse_corner_reply(r#"{"found": false}"#).is_none());
        assert!(parse_corner_reply("I cannot see a document.").is_none());
        assert!(parse_corner_reply(r#"{"corners": [[1, 2], [3, 4], [5, 6]]}"#).is_none());
        assert!(parse_corner_reply("} backwards {").is_none());
    }

    #[test]
    fn out_of_bounds_corner_invalidates_result() {
        let reply = r#"{"corners": [[10, 10], [410, 10], [390, 290], [10, 290]]}"#;
        let locator = OracleCornerLocator::new(Arc::new(MockOracle::replying(reply)));
        assert!(locator.locate(&image()).is_none());
    }

    #[test]
    fn transport_failure_is_not_found() {
        let locator = OracleCornerLocator::new(Arc::new(MockOracle::failing("connection refused")));
        assert!(locator.locate(&image()).is_none());
    }

    #[test]
    fn initialize_probes_once() {
        let mut mock = MockOracle::replying(r#"{"found": false}"#);
        mock.probe_ok = false;
        let oracle = Arc::new(mock);
        let locator = OracleCornerLocator::new(oracle.clone());

        assert!(locator.initialize().is_err());
        assert!(locator.initialize().is_err());
        assert_eq!(oracle.probes.load(Ordering::SeqCst), 1);
        // A failed probe short-circuits location.
        assert!(locator.locate(&image()).is_none());
        assert!(oracle.prompts.lock().expect("lock").is_empty());
    }
}
