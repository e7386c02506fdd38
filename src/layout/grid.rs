use super::style::LayoutStyle;
use super::{map_counter_alignment, map_sizing, AutoLayout, FallbackFlag, FallbackKind, LayoutMode, PrimaryAlign};
use crate::style::tokens::{parse_function, parse_number_unit, split_top_level, split_whitespace_top_level};
use log::trace;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum GridTrack {
    Px(f32),
    Fr(f32),
    Percent(f32),
    Auto,
    MinContent,
    MaxContent,
    MinMax(Box<GridTrack>, Box<GridTrack>),
    FitContent(f32),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GridTemplate {
    pub columns: Vec<GridTrack>,
    pub rows: Vec<GridTrack>,
}

/// One axis of a child's placement: 1-based start line and span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLine {
    #[serde(default)]
    pub start: Option<i32>,
    pub span: u32,
}

impl Default for GridLine {
    fn default() -> Self {
        Self { start: None, span: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridPlacement {
    pub column: GridLine,
    pub row: GridLine,
}

impl GridPlacement {
    pub fn is_auto(&self) -> bool {
        self.column == GridLine::default() && self.row == GridLine::default()
    }
}

fn parse_track(token: &str) -> Result<GridTrack, String> {
    let t = token.to_ascii_lowercase();
    match t.as_str() {
        "auto" => return Ok(GridTrack::Auto),
        "min-content" => return Ok(GridTrack::MinContent),
        "max-content" => return Ok(GridTrack::MaxContent),
        _ => {}
    }
    if let Some((name, args)) = parse_function(&t) {
        return match name {
            "minmax" => match split_top_level(args, ',').as_slice() {
                [min, max] => Ok(GridTrack::MinMax(Box::new(parse_track(min)?), Box::new(parse_track(max)?))),
                _ => Err(format!("bad minmax() '{}'", token)),
            },
            "fit-content" => match parse_number_unit(args) {
                Some((v, "px")) => Ok(GridTrack::FitContent(v)),
                _ => Err(format!("bad fit-content() '{}'", token)),
            },
            other => Err(format!("unsupported track function {}()", other)),
        };
    }
    match parse_number_unit(&t) {
        Some((v, "px")) => Ok(GridTrack::Px(v)),
        Some((v, "fr")) => Ok(GridTrack::Fr(v)),
        Some((v, "%")) => Ok(GridTrack::Percent(v)),
        Some((v, "")) if v == 0.0 => Ok(GridTrack::Px(0.0)),
        _ => Err(format!("unsupported track size '{}'", token)),
    }
}

/// Explicit tracks per axis; longer lists keep absolute positions
pub const MAX_TRACKS: usize = 1000;

/// Parse a `grid-template-*` track list. `repeat(n, ...)` is expanded up to
/// [`MAX_TRACKS`]; auto-repeat and subgrid have no fixed track count and are
/// rejected.
pub fn parse_tracks(raw: &str) -> Result<Vec<GridTrack>, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }
    if raw.eq_ignore_ascii_case("subgrid") || raw.eq_ignore_ascii_case("masonry") {
        return Err(format!("'{}' tracks are not supported", raw));
    }
    let mut tracks = Vec::new();
    for token in split_whitespace_top_level(raw) {
        // line names
        if token.starts_with('[') || token.ends_with(']') {
            continue;
        }
        if let Some((name, args)) = parse_function(token) {
            if name.eq_ignore_ascii_case("repeat") {
                let parts = split_top_level(args, ',');
                let (count, body) = match parts.as_slice() {
                    [count, body] => (*count, *body),
                    _ => return Err(format!("bad repeat() '{}'", token)),
                };
                let n: usize = count
                    .trim()
                    .parse()
                    .map_err(|_| format!("auto-repeat '{}' has no fixed track count", count.trim()))?;
                let inner = parse_tracks(body)?;
                let expanded = n.saturating_mul(inner.len()).saturating_add(tracks.len());
                if expanded > MAX_TRACKS {
                    return Err(format!("repeat() expands to more than {} tracks", MAX_TRACKS));
                }
                for _ in 0..n {
                    tracks.extend(inner.iter().cloned());
                }
                continue;
            }
        }
        tracks.push(parse_track(token)?);
        if tracks.len() > MAX_TRACKS {
            return Err(format!("more than {} tracks", MAX_TRACKS));
        }
    }
    Ok(tracks)
}

fn parse_line(token: &str) -> GridLine {
    let words = split_whitespace_top_level(token);
    match words.as_slice() {
        ["span", n] => GridLine {
            start: None,
            span: n.parse().unwrap_or(1).max(1),
        },
        [n] => GridLine {
            start: n.parse().ok(),
            span: 1,
        },
        _ => GridLine::default(),
    }
}

/// Parse `grid-column` / `grid-row` (`"2"`, `"1 / 3"`, `"span 2"`,
/// `"2 / span 3"`). Named lines resolve to auto placement.
pub fn parse_placement(raw: &str) -> GridLine {
    let parts = split_top_level(raw, '/');
    match parts.as_slice() {
        [single] => parse_line(single),
        [start, end] => {
            let s = parse_line(start);
            let e = parse_line(end);
            match (s.start, e.start) {
                (Some(a), Some(b)) if b > a => GridLine {
                    start: Some(a),
                    span: (b - a) as u32,
                },
                (Some(a), None) => GridLine {
                    start: Some(a),
                    span: e.span,
                },
                _ => s,
            }
        }
        _ => GridLine::default(),
    }
}

fn absolute(fallbacks: &mut Vec<FallbackFlag>, reason: String) -> LayoutMode {
    fallbacks.push(FallbackFlag {
        kind: FallbackKind::AbsolutePosition,
        reason,
    });
    LayoutMode::Absolute
}

/// Best-effort grid mapping: a single column stacks vertically, a single row
/// lines up horizontally, anything else keeps absolute positions. A row-flow
/// grid with more in-flow items than columns wraps into implicit rows.
pub(super) fn map_grid(style: &LayoutStyle, in_flow_items: usize) -> AutoLayout {
    let mut fallbacks = Vec::new();
    let columns = parse_tracks(&style.grid_template_columns);
    let rows = parse_tracks(&style.grid_template_rows);
    let column_flow = style.grid_auto_flow.split_whitespace().any(|w| w == "column");

    let (mode, template) = match (columns, rows) {
        (Ok(columns), Ok(rows)) => {
            let mode = match (columns.len(), rows.len()) {
                (0, 0) if column_flow => LayoutMode::Horizontal,
                (0 | 1, _) if !column_flow => LayoutMode::Vertical,
                (c, 1) if !column_flow && in_flow_items > c => absolute(
                    &mut fallbacks,
                    format!("{} items wrap the {} columns of a single-row grid into implicit rows", in_flow_items, c),
                ),
                (_, 0 | 1) if column_flow || rows.len() == 1 => LayoutMode::Horizontal,
                (c, r) => absolute(
                    &mut fallbacks,
                    format!("grid with {} columns and {} rows has no auto-layout equivalent", c, r),
                ),
            };
            (mode, Some(GridTemplate { columns, rows }))
        }
        (Err(e), _) | (_, Err(e)) => (absolute(&mut fallbacks, e), None),
    };

    let horizontal = mode == LayoutMode::Horizontal;
    let item_spacing = if horizontal { style.column_gap } else { style.row_gap };
    let counter_spacing = if horizontal { style.row_gap } else { style.column_gap };
    // items in a vertical stack align horizontally via justify-items
    let (counter_property, counter_value) = if horizontal {
        ("align-items", &style.align_items)
    } else {
        ("justify-items", &style.justify_items)
    };
    let counter_alignment =
        map_counter_alignment(counter_property, counter_value).record(FallbackKind::CounterAlignment, &mut fallbacks);
    let (primary_size, counter_size) = if horizontal {
        (style.width, style.height)
    } else {
        (style.height, style.width)
    };
    let primary_sizing = map_sizing(primary_size).record(FallbackKind::Sizing, &mut fallbacks);
    let counter_sizing = map_sizing(counter_size).record(FallbackKind::Sizing, &mut fallbacks);

    trace!("grid container: mode={:?} fallbacks={}", mode, fallbacks.len());

    AutoLayout {
        mode,
        primary_sizing,
        counter_sizing,
        primary_alignment: PrimaryAlign::Start,
        counter_alignment,
        item_spacing,
        counter_spacing,
        padding: style.padding,
        reverse_children: false,
        clips_content: style.clips_content,
        fallbacks,
        grid: template,
    }
}
