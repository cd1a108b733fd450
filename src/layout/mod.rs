//! # Layout
//!
//! Single-pass, top-to-bottom layout over an imperative cursor.
//!
//! There is no constraint solver. Each node is placed where the cursor
//! stands, using the parent's content edges and its own resolved options,
//! and then pushes the cursor forward for whatever comes next. Heights that
//! are not given explicitly are discovered after the children have been
//! drawn, which is why a box's `height` may be unknown while it is open.
//!
//! This module holds the geometry resolver: unit parsing and [`compute_box`].
//! The traversal state lives in [`state`], the per-tag behaviors in
//! [`behavior`].

pub mod behavior;
pub mod state;

use serde::Serialize;
use serde_json::Value;

use crate::model::value::{number, parse_float};
use crate::style::ResolvedOptions;
use state::TraversalState;

/// The resolved geometry of one node, in page coordinates.
///
/// `left` and `right` are distances from the page's left and right edges,
/// so `width == page_width - left - right` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutBox {
    pub top: f64,
    pub left: f64,
    pub right: f64,
    pub width: f64,
    /// `None` until known: content-driven heights are filled in after the children render.
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<f64>,
}

/// Whether a value reads as a number (numeric strings and percentages included).
pub fn is_length(value: Option<&Value>) -> bool {
    value.and_then(number).is_some_and(|n| !n.is_nan())
}

/// Resolve an absolute or percentage value.
///
/// `"25%"` of 1000 is 250. A missing or non-finite total counts as 1, so
/// `"25%"` alone is 0.25. Anything that is not a number resolves to 0.
pub fn resolve_length(value: &Value, total: Option<f64>) -> f64 {
    if let Value::String(s) = value {
        if s.ends_with('%') {
            let total = total.filter(|t| t.is_finite()).unwrap_or(1.0);
            return parse_float(s).unwrap_or(0.0) / 100.0 * total;
        }
    }
    number(value).unwrap_or(0.0)
}

/// Compute a node's box from the traversal state and its resolved options.
///
/// The order of the steps matters: an explicit `width` is applied before
/// explicit `left`/`right`, the final width is always re-derived from the
/// edges, and `bottom` either positions a known height or sizes an unknown one.
pub fn compute_box(state: &TraversalState, options: &ResolvedOptions) -> LayoutBox {
    let margin = options.margin();
    let parent = state.parent();
    let page_width = state.page_width;
    let page_height = state.page_height;

    let origin = if options.is_block() {
        parent.left
    } else {
        state.cursor.x
    };
    let mut left = origin + margin.left;
    let mut right = parent.right + margin.right;
    let mut top = state.cursor.y + margin.top;
    let mut width = None;

    if let Some(w) = options.get("width").filter(|v| is_length(Some(*v))) {
        let available = state.width() - margin.left - margin.right;
        let w = resolve_length(w, Some(available));
        right = page_width - left - w;
        width = Some(w);
    }

    let explicit_left = options.get("left").filter(|v| is_length(Some(*v)));
    if let Some(l) = explicit_left {
        left = resolve_length(l, Some(page_width));
    }

    if let Some(r) = options.get("right").filter(|v| is_length(Some(*v))) {
        right = resolve_length(r, Some(page_width));
        if explicit_left.is_none() {
            left = page_width - right - width.unwrap_or(0.0);
        }
    }

    let width = page_width - left - right;

    if let Some(t) = options.get("top").filter(|v| is_length(Some(*v))) {
        top = resolve_length(t, Some(page_height));
    }

    let mut height = options
        .get("height")
        .filter(|v| is_length(Some(*v)))
        .map(|h| resolve_length(h, Some(page_height)));

    let mut bottom = None;
    if let Some(b) = options.get("bottom").filter(|v| is_length(Some(*v))) {
        let b = resolve_length(b, Some(page_height));
        match height {
            Some(h) => top = page_height - b - h,
            None => height = Some(page_height - b - top),
        }
        bottom = Some(b);
    }

    let pos = LayoutBox {
        top,
        left,
        right,
        width,
        height,
        bottom,
    };
    log::debug!(
        target: "folio::position",
        "Tag {} {:?} parent left {} right {}",
        state.path,
        pos,
        parent.left,
        parent.right
    );
    pos
}
