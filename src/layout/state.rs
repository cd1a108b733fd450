//! Traversal state: the cursor and inherited context threaded through the tree walk.
//!
//! Every child visit is bracketed by [`TraversalState::push`] and
//! [`TraversalState::pop`]. A child may move the content edges, change the
//! text style or open a column context; the pop undoes all of it. Only the
//! cursor (and the open-run flags that travel with it) survives the pop, so
//! the next sibling starts where the previous one stopped.

use crate::canvas::{Point, TextOptions};
use crate::model::Edges;
use crate::style::TextStyle;

/// Column bookkeeping for the children of a `<row>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnContext {
    /// Identifies the row that opened this context.
    pub row: usize,
    /// Top of the current line of columns.
    pub row_top: f64,
    /// Left edge for the next column.
    pub next_column_left: f64,
    /// Lowest column bottom so far on this line; 0 while unbounded.
    pub row_bottom: f64,
}

/// A saved copy of everything a child may change, cursor excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub left: f64,
    pub right: f64,
    pub width: f64,
    pub page_width: f64,
    pub page_height: f64,
    pub page_margins: Edges,
    pub style: TextStyle,
    pub path: String,
    pub columns: Option<ColumnContext>,
}

/// The parent's content bounds as seen by the node being placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentBounds {
    pub left: f64,
    pub right: f64,
    pub width: f64,
}

/// Mutable traversal state for one page.
#[derive(Debug, Clone)]
pub struct TraversalState {
    pub cursor: Point,
    /// A text run is open and must be closed with a line break before the next block.
    pub continued: bool,
    /// Options of the last text run drawn; the closing line break reuses them.
    pub last_run: Option<TextOptions>,
    /// Strip leading whitespace from the next text run.
    pub pending_trim: bool,

    /// Current content-left edge, measured from the page's left side.
    pub left: f64,
    /// Current content-right edge, measured from the page's right side.
    pub right: f64,
    pub page_width: f64,
    pub page_height: f64,
    pub page_margins: Edges,
    pub style: TextStyle,
    pub path: String,
    pub columns: Option<ColumnContext>,

    stack: Vec<Frame>,
    rows_opened: usize,
}

impl TraversalState {
    /// Root state for a page, with the cursor at the content-margin origin.
    pub fn new(page_width: f64, page_height: f64, margins: Edges, style: TextStyle) -> Self {
        Self {
            cursor: Point {
                x: margins.left,
                y: margins.top,
            },
            continued: false,
            last_run: None,
            pending_trim: false,
            left: margins.left,
            right: margins.right,
            page_width,
            page_height,
            page_margins: margins,
            style,
            path: String::new(),
            columns: None,
            stack: Vec::new(),
            rows_opened: 0,
        }
    }

    /// Width between the current content edges.
    pub fn width(&self) -> f64 {
        self.page_width - self.left - self.right
    }

    /// Set the content width by moving the right edge.
    pub fn set_width(&mut self, width: f64) {
        self.right = self.page_width - self.left - width;
    }

    /// Number of saved frames.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The innermost saved frame, if any.
    pub fn frame(&self) -> Option<&Frame> {
        self.stack.last()
    }

    /// Bounds of the enclosing content box: the last saved frame, or the
    /// current edges at the root.
    pub fn parent(&self) -> ParentBounds {
        match self.stack.last() {
            Some(frame) => ParentBounds {
                left: frame.left,
                right: frame.right,
                width: frame.width,
            },
            None => ParentBounds {
                left: self.left,
                right: self.right,
                width: self.width(),
            },
        }
    }

    /// Structural path of the enclosing node.
    pub fn parent_path(&self) -> &str {
        self.stack.last().map_or(self.path.as_str(), |f| f.path.as_str())
    }

    /// Save everything but the cursor.
    pub fn push(&mut self) {
        let frame = Frame {
            left: self.left,
            right: self.right,
            width: self.width(),
            page_width: self.page_width,
            page_height: self.page_height,
            page_margins: self.page_margins,
            style: self.style.clone(),
            path: self.path.clone(),
            columns: self.columns,
        };
        self.stack.push(frame);
    }

    /// Restore the last saved frame. The cursor keeps its advance.
    ///
    /// A column context the frame did not have is dropped. A context opened
    /// by the same row is kept as-is, so column progress made by one child
    /// is visible to the next.
    pub fn pop(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        self.left = frame.left;
        self.right = frame.right;
        self.page_width = frame.page_width;
        self.page_height = frame.page_height;
        self.page_margins = frame.page_margins;
        self.style = frame.style;
        self.path = frame.path;
        self.columns = match (frame.columns, self.columns) {
            (None, _) => None,
            (Some(saved), Some(current)) if saved.row == current.row => Some(current),
            (Some(saved), _) => Some(saved),
        };
    }

    /// Open a column context for a row.
    pub fn open_row(&mut self, row_top: f64, left: f64, row_bottom: f64) -> &mut ColumnContext {
        self.rows_opened += 1;
        self.columns.insert(ColumnContext {
            row: self.rows_opened,
            row_top,
            next_column_left: left,
            row_bottom,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> TraversalState {
        TraversalState::new(600.0, 800.0, Edges::uniform(40.0), TextStyle::default())
    }

    #[test]
    fn test_new_state_starts_at_margin_origin() {
        let state = state();
        assert_eq!(state.cursor, Point { x: 40.0, y: 40.0 });
        assert_eq!(state.width(), 520.0);
        assert_eq!(state.parent().left, 40.0);
        assert_eq!(state.depth(), 0);
    }

    #[test]
    fn test_set_width_moves_right_edge() {
        let mut state = state();
        state.left = 100.0;
        state.set_width(200.0);
        assert_eq!(state.right, 300.0);
        assert_eq!(state.width(), 200.0);
    }

    #[test]
    fn test_pop_restores_fields_but_not_cursor() {
        let mut state = state();
        state.path = "pdf.page(1)".to_string();
        state.push();

        state.left = 70.0;
        state.right = 90.0;
        state.style.size = 30.0;
        state.style.link = Some("https://example.com".to_string());
        state.path = "pdf.page(1).p(1)".to_string();
        state.cursor = Point { x: 55.0, y: 300.0 };
        state.continued = true;
        state.last_run = Some(TextOptions::from_style(&state.style, true));

        assert_eq!(state.parent().left, 40.0);
        assert_eq!(state.parent_path(), "pdf.page(1)");

        state.pop();
        assert_eq!(state.left, 40.0);
        assert_eq!(state.right, 40.0);
        assert_eq!(state.style, TextStyle::default());
        assert_eq!(state.path, "pdf.page(1)");
        assert_eq!(state.cursor, Point { x: 55.0, y: 300.0 });
        assert!(state.continued);
        assert_eq!(state.last_run.as_ref().map(|run| run.size), Some(30.0));
    }

    #[test]
    fn test_column_context_does_not_leak_past_row() {
        let mut state = state();
        state.push();
        state.open_row(40.0, 40.0, 0.0);

        state.push();
        if let Some(cols) = state.columns.as_mut() {
            cols.next_column_left = 240.0;
            cols.row_bottom = 120.0;
        }
        state.pop();

        let cols = state.columns.expect("row context survives its children");
        assert_eq!(cols.next_column_left, 240.0);
        assert_eq!(cols.row_bottom, 120.0);

        state.pop();
        assert!(state.columns.is_none());
    }

    #[test]
    fn test_nested_row_restores_outer_context() {
        let mut state = state();
        state.push();
        state.open_row(40.0, 40.0, 0.0);
        let outer = state.columns;

        state.push();
        state.open_row(60.0, 80.0, 0.0);
        state.columns = None;
        state.pop();

        assert_eq!(state.columns, outer);
    }

    #[test]
    fn test_pop_on_empty_stack_is_noop() {
        let mut state = state();
        state.left = 12.0;
        state.pop();
        assert_eq!(state.left, 12.0);
    }
}
