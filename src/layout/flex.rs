use super::style::{ContentAlign, FlexWrap, LayoutStyle};
use super::{map_counter_alignment, map_sizing, AutoLayout, FallbackKind, LayoutMode, Mapped, PrimaryAlign};
use log::trace;

/// Map `justify-content` onto the primary axis.
///
/// Reversed directions are realised by reordering children, so start and
/// end swap to keep items on the same physical side.
pub(super) fn map_justify(justify: &ContentAlign, reverse: bool) -> Mapped<PrimaryAlign> {
    let (start, end) = if reverse {
        (PrimaryAlign::End, PrimaryAlign::Start)
    } else {
        (PrimaryAlign::Start, PrimaryAlign::End)
    };
    match justify {
        // `stretch` behaves as `flex-start` for flex containers
        ContentAlign::Normal | ContentAlign::Start | ContentAlign::Stretch => Mapped::exact(start),
        ContentAlign::Center => Mapped::exact(PrimaryAlign::Center),
        ContentAlign::End => Mapped::exact(end),
        ContentAlign::SpaceBetween => Mapped::exact(PrimaryAlign::SpaceBetween),
        ContentAlign::SpaceAround => Mapped::fallback(PrimaryAlign::Center, "space-around approximated as center"),
        ContentAlign::SpaceEvenly => Mapped::fallback(PrimaryAlign::Center, "space-evenly approximated as center"),
        ContentAlign::Unknown(raw) => Mapped::fallback(start, format!("unsupported justify-content '{}'", raw)),
    }
}

pub(super) fn map_flex(style: &LayoutStyle) -> AutoLayout {
    let mut fallbacks = Vec::new();
    let row = style.flex_direction.is_row();
    let reverse = style.flex_direction.is_reverse();

    let mode = if style.flex_wrap != FlexWrap::Nowrap {
        fallbacks.push(super::FallbackFlag {
            kind: FallbackKind::AbsolutePosition,
            reason: "flex-wrap: wrap has no auto-layout equivalent; children keep absolute positions".into(),
        });
        LayoutMode::Absolute
    } else if row {
        LayoutMode::Horizontal
    } else {
        LayoutMode::Vertical
    };

    let primary_alignment = map_justify(&style.justify_content, reverse).record(FallbackKind::PrimaryAlignment, &mut fallbacks);
    let counter_alignment =
        map_counter_alignment("align-items", &style.align_items).record(FallbackKind::CounterAlignment, &mut fallbacks);

    let (primary_size, counter_size) = if row {
        (style.width, style.height)
    } else {
        (style.height, style.width)
    };
    let primary_sizing = map_sizing(primary_size).record(FallbackKind::Sizing, &mut fallbacks);
    let counter_sizing = map_sizing(counter_size).record(FallbackKind::Sizing, &mut fallbacks);

    let (item_spacing, counter_spacing) = if row {
        (style.column_gap, style.row_gap)
    } else {
        (style.row_gap, style.column_gap)
    };

    trace!(
        "flex container: mode={:?} primary={:?} counter={:?} spacing={} fallbacks={}",
        mode,
        primary_alignment,
        counter_alignment,
        item_spacing,
        fallbacks.len()
    );

    AutoLayout {
        mode,
        primary_sizing,
        counter_sizing,
        primary_alignment,
        counter_alignment,
        item_spacing,
        counter_spacing,
        padding: style.padding,
        reverse_children: reverse,
        clips_content: style.clips_content,
        fallbacks,
        grid: None,
    }
}
