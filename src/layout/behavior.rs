//! # Tag Behaviors
//!
//! Rendering of one node: resolve its options, place its box, run the
//! behavior its style selects, then close the box so the cursor is ready
//! for the next sibling.
//!
//! Every child is visited between a [`TraversalState::push`] and a
//! [`TraversalState::pop`]. Errors return straight out without popping, so
//! the state's path still names the node that failed.

use std::collections::HashMap;
use std::path::Path;

use crate::canvas::{color_name, Canvas, ImageOptions, Point, Rect, StrokeOptions, TextOptions};
use crate::config::resolve_path;
use crate::error::FolioError;
use crate::model::value::{number, text, truthy};
use crate::model::Node;
use crate::style::{Behavior, ResolvedOptions, StyleRegistry};
use crate::text::{collapse_whitespace, trim_line_starts};

use super::state::TraversalState;
use super::{compute_box, resolve_length, LayoutBox};

/// Everything a behavior needs besides the traversal state.
pub struct LayoutContext<'a> {
    pub registry: &'a StyleRegistry,
    /// Directory image sources are resolved against.
    pub base_path: &'a Path,
    /// Stroke every tag's box.
    pub debug: bool,
    pub canvas: &'a mut dyn Canvas,
}

/// Render `children` in order, each inside its own push/pop scope.
pub fn render_children(
    ctx: &mut LayoutContext<'_>,
    state: &mut TraversalState,
    children: &[Node],
) -> Result<(), FolioError> {
    if children.is_empty() {
        return Ok(());
    }
    log::trace!(target: "folio::render", "Rendering children of {}", state.path);

    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for child in children {
        state.push();
        if child.is_text_run() {
            text_run(ctx, state, child.text.as_deref().unwrap_or_default())?;
        } else {
            let index = occurrences.entry(child.name.as_str()).or_insert(0);
            *index += 1;
            state.path = format!("{}.{}({})", state.parent_path(), child.name, index);
            render_tag(ctx, state, child)?;
        }
        state.pop();
    }
    Ok(())
}

/// Render one element: options, box, behavior, debug outline, then close the box.
pub fn render_tag(
    ctx: &mut LayoutContext<'_>,
    state: &mut TraversalState,
    node: &Node,
) -> Result<(), FolioError> {
    log::debug!(target: "folio::render", "Rendering tag {}", state.path);

    let options = ctx.registry.resolve(&node.name, &node.attributes)?;
    state.style.apply(&options.properties);

    let mut pos = compute_box(state, &options);
    state.cursor = Point {
        x: pos.left,
        y: pos.top,
    };
    let block = options.is_block();
    if block {
        state.left = pos.left;
        state.right = pos.right;
        state.pending_trim = true;
    }

    match options.behavior {
        Behavior::Generic => generic(ctx, state, &options, &mut pos, &node.children)?,
        Behavior::Rule => rule(ctx, state, &options, &pos)?,
        Behavior::Image => image(ctx, state, &options, &pos)?,
        Behavior::Indent => indent(ctx, state, &options, &pos, &node.children)?,
        Behavior::Row => row(ctx, state, &options, &mut pos, &node.children)?,
        Behavior::Column => column(ctx, state, &options, &mut pos, &node.children)?,
        Behavior::Link => link(ctx, state, &options, &mut pos, node)?,
    }

    if ctx.debug || options.flag("debug") {
        let width = if pos.width != 0.0 {
            pos.width
        } else {
            state.page_width - pos.right - pos.left
        };
        let height = pos
            .height
            .filter(|h| *h != 0.0)
            .unwrap_or(state.cursor.y - pos.top);
        let stroke = StrokeOptions {
            line_width: None,
            color: Some(if block { "#f77" } else { "#7f7" }.to_string()),
        };
        ctx.canvas
            .stroke_rect(Rect::new(pos.left, pos.top, width, height), &stroke)?;
    }

    if block {
        state.cursor.x = state.parent().left;
        state.cursor.y += options.number_or("marginBottom", 0.0);
        if state.continued {
            let mut close = state
                .last_run
                .take()
                .unwrap_or_else(|| TextOptions::from_style(&state.style, false));
            close.continued = false;
            close.width = None;
            let end = ctx.canvas.draw_text("\n", state.cursor, &close)?;
            state.cursor.y = end.y;
            state.continued = false;
        }
        state.pending_trim = true;
    } else {
        state.cursor.x += options.number_or("marginRight", 0.0);
    }
    Ok(())
}

/// A run of text, drawn as a continued line at the cursor.
fn text_run(
    ctx: &mut LayoutContext<'_>,
    state: &mut TraversalState,
    content: &str,
) -> Result<(), FolioError> {
    let mut content = if state.style.pre {
        content.to_string()
    } else {
        collapse_whitespace(content)
    };
    if state.style.trim || state.pending_trim {
        content = trim_line_starts(&content);
        state.pending_trim = false;
    }

    let mut options = TextOptions::from_style(&state.style, true);
    options.width = Some(state.page_width - state.cursor.x - state.right);

    log::debug!(
        target: "folio::text",
        "Rendering text {:?} at {} ({}, {})",
        content,
        state.path,
        state.cursor.x,
        state.cursor.y
    );
    state.cursor = ctx.canvas.draw_text(&content, state.cursor, &options)?;
    state.continued = true;
    state.last_run = Some(options);
    Ok(())
}

/// Block or inline box around the children.
fn generic(
    ctx: &mut LayoutContext<'_>,
    state: &mut TraversalState,
    options: &ResolvedOptions,
    pos: &mut LayoutBox,
    children: &[Node],
) -> Result<(), FolioError> {
    let padding = options.padding();
    let block = options.is_block();

    if block {
        let background = color_name(options.get("backgroundColor"));
        if let (Some(color), Some(height)) = (background, pos.height) {
            if pos.width != 0.0 && height != 0.0 {
                log::debug!(target: "folio::render", "Tag background {} {}", state.path, color);
                ctx.canvas
                    .fill_rect(Rect::new(pos.left, pos.top, pos.width, height), &color)?;
            }
        }
        state.cursor.y += padding.top;
        state.left += padding.left;
        state.right += padding.right;
    } else {
        state.cursor.x += padding.left;
    }

    render_children(ctx, state, children)?;

    if block {
        match pos.height {
            Some(height) => state.cursor.y = pos.top + height,
            None => {
                state.cursor.y += padding.bottom;
                pos.height = Some(state.cursor.y - pos.top);
            }
        }
        if options.flag("border") {
            let stroke = StrokeOptions {
                line_width: options.number("border"),
                color: color_name(options.get("borderColor")),
            };
            let height = pos.height.unwrap_or(0.0);
            ctx.canvas
                .stroke_rect(Rect::new(pos.left, pos.top, pos.width, height), &stroke)?;
        }
    } else {
        state.cursor.x += padding.right;
    }
    Ok(())
}

/// Horizontal rule: a filled bar of the box width.
fn rule(
    ctx: &mut LayoutContext<'_>,
    state: &mut TraversalState,
    options: &ResolvedOptions,
    pos: &LayoutBox,
) -> Result<(), FolioError> {
    let thickness = options.number_or("thickness", 0.0);
    let color = options.string("color").unwrap_or_else(|| "black".to_string());
    let bar = Rect::new(state.cursor.x, state.cursor.y, pos.width, thickness);
    ctx.canvas.fill_rect(bar, &color)?;
    state.cursor.y += thickness;
    Ok(())
}

fn image(
    ctx: &mut LayoutContext<'_>,
    state: &mut TraversalState,
    options: &ResolvedOptions,
    pos: &LayoutBox,
) -> Result<(), FolioError> {
    let mut image = ImageOptions::default();
    if pos.width != 0.0 {
        image.width = Some(pos.width);
    }
    image.height = options.get("height").filter(|v| truthy(v)).and_then(number);
    if let Some(scale) = options.get("scale").filter(|v| truthy(v)) {
        image.scale = Some(resolve_length(scale, None));
    }
    if options.flag("fit") {
        if let (Some(w), Some(h)) = (image.width, image.height) {
            image.fit = Some((w, h));
            image.width = None;
            image.height = None;
        }
    }

    let src = options.get("src").and_then(text).unwrap_or_default();
    let source = if src.starts_with("data:") {
        src
    } else {
        resolve_path(ctx.base_path, &src)
            .to_string_lossy()
            .into_owned()
    };

    let height = ctx.canvas.draw_image(&source, state.cursor, &image)?;
    state.cursor.y += height;
    Ok(())
}

/// Indented block with a rail down its left side, as tall as its content.
fn indent(
    ctx: &mut LayoutContext<'_>,
    state: &mut TraversalState,
    options: &ResolvedOptions,
    pos: &LayoutBox,
    children: &[Node],
) -> Result<(), FolioError> {
    state.left += options.number_or("paddingLeft", 0.0);
    state.cursor.x = state.left;

    render_children(ctx, state, children)?;

    let height = state.cursor.y - pos.top;
    let thickness = options.number("thickness").filter(|t| *t != 0.0);
    if let (Some(thickness), Some(color)) = (thickness, color_name(options.get("color"))) {
        ctx.canvas
            .fill_rect(Rect::new(pos.left, pos.top, thickness, height), &color)?;
    }
    Ok(())
}

/// Container for columns. Its height is the lowest column bottom.
fn row(
    ctx: &mut LayoutContext<'_>,
    state: &mut TraversalState,
    options: &ResolvedOptions,
    pos: &mut LayoutBox,
    children: &[Node],
) -> Result<(), FolioError> {
    let bottom = pos
        .height
        .filter(|h| *h != 0.0)
        .map_or(0.0, |h| pos.top + h);
    state.open_row(pos.top, pos.left, bottom);

    generic(ctx, state, options, pos, children)?;

    if let Some(cols) = state.columns.filter(|c| c.row_bottom != 0.0) {
        pos.height = Some(cols.row_bottom - pos.top);
        state.cursor.y = cols.row_bottom;
    }
    state.columns = None;
    Ok(())
}

/// One column of a row, placed after the previous one or wrapped below the line.
fn column(
    ctx: &mut LayoutContext<'_>,
    state: &mut TraversalState,
    options: &ResolvedOptions,
    pos: &mut LayoutBox,
    children: &[Node],
) -> Result<(), FolioError> {
    let Some(mut cols) = state.columns else {
        return Err(FolioError::ColumnOutsideRow);
    };
    let margin = options.margin();
    let padding = options.padding();
    let parent = state.parent();

    let mut left = cols.next_column_left + margin.left;
    log::debug!(
        target: "folio::render",
        "New column {} next {} top {} left {}",
        state.path,
        cols.next_column_left,
        cols.row_top,
        left
    );

    // An overflow of a whole row width or more never wraps.
    let overflow = (left + pos.width) - (parent.left + parent.width);
    if cols.row_bottom != 0.0 && overflow > 0.0 && overflow < parent.width {
        log::debug!(target: "folio::render", "Wrapping column {} by {}", state.path, overflow);
        left = parent.left + margin.left;
        cols.row_top = cols.row_bottom;
        cols.row_bottom = 0.0;
    }
    state.columns = Some(cols);

    let top = cols.row_top + margin.top;
    state.cursor.y = top + padding.top;
    state.left = left + padding.left;
    state.cursor.x = state.left;
    state.set_width(pos.width - padding.left - padding.right);

    render_children(ctx, state, children)?;

    state.cursor.y += padding.bottom;
    state.cursor.x = state.parent().left;

    let bottom = state.cursor.y + margin.bottom;
    let cols = state.columns.get_or_insert(cols);
    cols.next_column_left = left + pos.width + margin.right;
    cols.row_bottom = cols.row_bottom.max(bottom);

    pos.left = left;
    pos.top = top;
    pos.height = Some(cols.row_bottom - top);
    Ok(())
}

/// Hyperlink: sets the link target for the text inside it.
fn link(
    ctx: &mut LayoutContext<'_>,
    state: &mut TraversalState,
    options: &ResolvedOptions,
    pos: &mut LayoutBox,
    node: &Node,
) -> Result<(), FolioError> {
    let href = options
        .get("href")
        .filter(|v| truthy(v))
        .and_then(text)
        .or_else(|| node.text_content().filter(|t| !t.is_empty()))
        .unwrap_or_default();
    let href = if href.starts_with("http") {
        href
    } else {
        format!("https://{}", href)
    };
    state.style.link = Some(href);

    generic(ctx, state, options, pos, &node.children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawCommand, PageOptions, RecordingCanvas};
    use crate::config::Config;
    use crate::model::Edges;
    use crate::style::TextStyle;
    use serde_json::{json, Value};

    struct Outcome {
        result: Result<(), FolioError>,
        canvas: RecordingCanvas,
        path: String,
    }

    fn run_with(markup: &str, options: Value) -> Outcome {
        let root = crate::markup::parse(markup).unwrap();
        let config = Config::from_options(&options).unwrap();
        let registry = StyleRegistry::new(&config);
        let mut canvas = RecordingCanvas::new();
        canvas
            .new_page(&PageOptions {
                width: 1000.0,
                height: 1000.0,
                margins: Edges::uniform(10.0),
                compress: false,
            })
            .unwrap();

        let mut state = TraversalState::new(1000.0, 1000.0, Edges::uniform(10.0), TextStyle::default());
        state.path = "pdf.page(1)".to_string();
        let result = {
            let mut ctx = LayoutContext {
                registry: &registry,
                base_path: Path::new("/base"),
                debug: config.debug,
                canvas: &mut canvas,
            };
            render_children(&mut ctx, &mut state, &root.children)
        };
        Outcome {
            result,
            canvas,
            path: state.path,
        }
    }

    fn run(markup: &str) -> Outcome {
        run_with(markup, json!({}))
    }

    fn text_commands(canvas: &RecordingCanvas) -> Vec<(&str, f64, f64, &TextOptions)> {
        canvas
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, x, y, options } => Some((text.as_str(), *x, *y, options)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_paragraph_text_and_closing_line() {
        let out = run("<pdf><p>Hello \n   world</p></pdf>");
        out.result.unwrap();
        assert_eq!(
            out.canvas.texts(),
            vec![("Hello world", 10.0, 12.0), ("\n", 10.0, 17.0)]
        );
    }

    #[test]
    fn test_rule_fills_box_width() {
        let out = run("<pdf><hr/><p>after</p></pdf>");
        out.result.unwrap();
        assert_eq!(
            out.canvas.commands[1],
            DrawCommand::FillRect {
                rect: Rect::new(10.0, 12.0, 980.0, 4.0),
                color: "black".to_string()
            }
        );
        // rule ends at 16, marginBottom 4, then the paragraph's marginTop 2
        assert_eq!(out.canvas.texts()[0], ("after", 10.0, 22.0));
    }

    #[test]
    fn test_inline_padding_moves_cursor() {
        let out = run(r#"<pdf><p><span padding="3">a</span>b</p></pdf>"#);
        out.result.unwrap();
        let texts = out.canvas.texts();
        assert_eq!(texts[0], ("a", 13.0, 12.0));
        assert_eq!(texts[1], ("b", 22.0, 12.0));
    }

    #[test]
    fn test_child_style_does_not_leak_to_siblings() {
        let out = run("<pdf><p><strong>a</strong>b</p></pdf>");
        out.result.unwrap();
        let texts = text_commands(&out.canvas);
        assert_eq!(texts[0].3.font, "Helvetica-Bold");
        assert_eq!(texts[1].3.font, "Helvetica");
    }

    #[test]
    fn test_pre_keeps_whitespace() {
        let out = run(r#"<pdf><p pre="true">a   b</p></pdf>"#);
        out.result.unwrap();
        assert_eq!(out.canvas.texts()[0].0, "a   b");
    }

    #[test]
    fn test_text_width_runs_to_content_edge() {
        let out = run("<pdf><p>x</p></pdf>");
        let texts = text_commands(&out.canvas);
        assert_eq!(texts[0].3.width, Some(980.0));
        assert!(texts[0].3.continued);
        assert!(!texts[1].3.continued);
    }

    #[test]
    fn test_closing_line_uses_open_run_style() {
        let out = run("<pdf><p><small>x</small></p><p>y</p></pdf>");
        out.result.unwrap();
        let texts = text_commands(&out.canvas);
        assert_eq!((texts[0].0, texts[0].2, texts[0].3.size), ("x", 12.0, 10.0));
        assert_eq!((texts[1].0, texts[1].2, texts[1].3.size), ("\n", 17.0, 10.0));
        assert!(!texts[1].3.continued);
        assert_eq!(texts[1].3.width, None);
        // 17 + 10pt line + lineGap 2, then marginTop 2
        assert_eq!((texts[2].0, texts[2].1, texts[2].2), ("y", 10.0, 31.0));
    }

    #[test]
    fn test_link_target_from_own_text() {
        let out = run("<pdf><p><a>example <span/>.com</a></p></pdf>");
        out.result.unwrap();
        let texts = text_commands(&out.canvas);
        assert_eq!(texts[0].0, "example");
        assert_eq!(texts[0].3.link.as_deref(), Some("https://example .com"));
    }

    #[test]
    fn test_closing_line_keeps_open_run_link() {
        let out = run(r#"<pdf><p>see <a href="example.com">here</a></p></pdf>"#);
        out.result.unwrap();
        let texts = text_commands(&out.canvas);
        assert_eq!(texts[2].0, "\n");
        assert_eq!(texts[2].3.link.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_block_start_trims_only_the_first_run() {
        let out = run("<pdf><p pre=\"true\">a\n   b</p><p pre=\"true\"><span>x</span>y\n   z</p></pdf>");
        out.result.unwrap();
        let runs: Vec<&str> = out
            .canvas
            .texts()
            .into_iter()
            .map(|t| t.0)
            .filter(|t| *t != "\n")
            .collect();
        assert_eq!(runs, vec!["a\nb", "x", "y\n   z"]);
    }

    #[test]
    fn test_trim_style_strips_every_run() {
        let out = run("<pdf><p pre=\"true\" trim=\"true\"><span>x</span>y\n   z</p></pdf>");
        out.result.unwrap();
        let runs: Vec<&str> = out.canvas.texts().into_iter().map(|t| t.0).collect();
        assert_eq!(runs, vec!["x", "y\nz", "\n"]);
    }

    #[test]
    fn test_columns_side_by_side() {
        let out = run(
            r#"<pdf><row width="500">
                <column width="200"><p>a</p></column>
                <column width="200"><p>b</p></column>
            </row></pdf>"#,
        );
        out.result.unwrap();
        let texts = out.canvas.texts();
        assert_eq!(texts[0], ("a", 10.0, 12.0));
        assert_eq!(texts[2], ("b", 210.0, 12.0));
    }

    #[test]
    fn test_overflowing_column_wraps() {
        let out = run(
            r#"<pdf><row width="500">
                <column width="300"><p>a</p></column>
                <column width="300"><p>b</p></column>
            </row><p>after</p></pdf>"#,
        );
        out.result.unwrap();
        let texts = out.canvas.texts();
        assert_eq!(texts[0], ("a", 10.0, 12.0));
        // first column ends at 31: text line 17 + 14
        assert_eq!(texts[2], ("b", 10.0, 33.0));
        // second line of columns ends at 38 + 14 = 52
        assert_eq!(texts[4], ("after", 10.0, 54.0));
    }

    #[test]
    fn test_column_outside_row_fails() {
        let out = run("<pdf><div><column><p>x</p></column></div></pdf>");
        let err = out.result.unwrap_err();
        assert!(matches!(err, FolioError::ColumnOutsideRow));
        assert_eq!(out.path, "pdf.page(1).div(1).column(1)");
        assert!(out.canvas.texts().is_empty());
    }

    #[test]
    fn test_unknown_style_fails_before_drawing() {
        let out = run(r#"<pdf><p style="doesnotexist">x</p></pdf>"#);
        let err = out.result.unwrap_err();
        assert!(matches!(err, FolioError::StyleNotFound(ref s) if s == "doesnotexist"));
        assert_eq!(out.canvas.commands.len(), 1);
    }

    #[test]
    fn test_paths_count_occurrences_per_tag() {
        let out = run("<pdf><p>a</p><div/><p>b</p><p><row><span/></row></p><p><column/></p></pdf>");
        assert!(out.result.is_err());
        assert_eq!(out.path, "pdf.page(1).p(4).column(1)");
    }

    #[test]
    fn test_link_target() {
        let out = run(r#"<pdf><p><a href="example.com">site</a> <a>http://x.org</a></p></pdf>"#);
        out.result.unwrap();
        let texts = text_commands(&out.canvas);
        assert_eq!(texts[0].3.link.as_deref(), Some("https://example.com"));
        assert!(texts[0].3.underline);
        assert_eq!(texts[0].3.color, "blue");
        assert_eq!(texts[1].3.link.as_deref(), Some("http://x.org"));
    }

    #[test]
    fn test_indent_rail_spans_content() {
        let out = run("<pdf><indent><p>x</p></indent></pdf>");
        out.result.unwrap();
        assert_eq!(out.canvas.texts()[0], ("x", 25.0, 12.0));
        assert!(out.canvas.commands.contains(&DrawCommand::FillRect {
            rect: Rect::new(10.0, 10.0, 5.0, 21.0),
            color: "#ddd".to_string()
        }));
    }

    #[test]
    fn test_image_placement() {
        let out = run(r#"<pdf><img src="logo.png" height="50"/><img src="data:image/png;base64,AA" width="100" height="40" fit="true"/></pdf>"#);
        out.result.unwrap();
        let images: Vec<_> = out
            .canvas
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Image { source, x, y, options } => Some((source.clone(), *x, *y, options.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(images[0].0, "/base/logo.png");
        assert_eq!((images[0].1, images[0].2), (10.0, 10.0));
        assert_eq!(images[0].3.width, Some(980.0));
        assert_eq!(images[0].3.height, Some(50.0));

        assert_eq!(images[1].0, "data:image/png;base64,AA");
        assert_eq!(images[1].2, 60.0);
        assert_eq!(images[1].3.fit, Some((100.0, 40.0)));
        assert_eq!(images[1].3.width, None);
    }

    #[test]
    fn test_image_percentage_scale() {
        let out = run(r#"<pdf><img src="logo.png" scale="50%"/></pdf>"#);
        out.result.unwrap();
        let scale = out.canvas.commands.iter().find_map(|c| match c {
            DrawCommand::Image { options, .. } => Some(options.scale),
            _ => None,
        });
        assert_eq!(scale, Some(Some(0.5)));
    }

    #[test]
    fn test_background_and_border() {
        let out = run(r#"<pdf><div height="50" backgroundColor="grey" border="2" borderColor="red"/><p>x</p></pdf>"#);
        out.result.unwrap();
        assert_eq!(
            out.canvas.commands[1],
            DrawCommand::FillRect {
                rect: Rect::new(10.0, 10.0, 980.0, 50.0),
                color: "#ddd".to_string()
            }
        );
        assert_eq!(
            out.canvas.commands[2],
            DrawCommand::StrokeRect {
                rect: Rect::new(10.0, 10.0, 980.0, 50.0),
                options: StrokeOptions {
                    line_width: Some(2.0),
                    color: Some("red".to_string())
                }
            }
        );
        assert_eq!(out.canvas.texts()[0], ("x", 10.0, 62.0));
    }

    #[test]
    fn test_debug_outlines() {
        let out = run_with("<pdf><p>x</p></pdf>", json!({"debug": true}));
        out.result.unwrap();
        let strokes: Vec<_> = out
            .canvas
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::StrokeRect { rect, options } => Some((*rect, options.color.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(strokes, vec![(Rect::new(10.0, 12.0, 980.0, 0.0), Some("#f77".to_string()))]);
    }
}
