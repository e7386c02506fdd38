use pagescene::hierarchy::check_integrity;
use pagescene::layout::{FallbackKind, LayoutMode, PrimaryAlign};
use pagescene::{ConvertConfig, Converter, MarkerKind, PageSnapshot, RawElement};

fn normalize(elements: Vec<RawElement>) -> pagescene::Document {
    let snap = PageSnapshot::new("https://example.com/", elements);
    let out = Converter::new(ConvertConfig::default())
        .normalize(&snap)
        .expect("normalize failed");
    let problems = check_integrity(&out.document);
    assert!(problems.is_empty(), "integrity problems: {:?}", problems);
    out.document
}

#[test]
fn scenario_a_flex_row_space_between() {
    let doc = normalize(vec![
        RawElement::new("page", "body", None).with_rect(0.0, 0.0, 800.0, 600.0),
        RawElement::new("bar", "div", Some("page"))
            .with_rect(0.0, 0.0, 800.0, 40.0)
            .with_style("display", "flex")
            .with_style("flex-direction", "row")
            .with_style("justify-content", "space-between")
            .with_style("gap", "8px"),
        RawElement::new("left", "div", Some("bar")).with_rect(0.0, 0.0, 120.0, 40.0),
        RawElement::new("right", "div", Some("bar")).with_rect(680.0, 0.0, 120.0, 40.0),
    ]);
    let bar = doc.get("bar").unwrap();
    let auto = bar.layout.auto_layout.as_ref().expect("flex container maps to auto layout");
    assert_eq!(auto.primary_alignment, PrimaryAlign::SpaceBetween);
    assert_eq!(auto.mode, LayoutMode::Horizontal);
    assert_eq!(auto.item_spacing, 8.0);
    assert!(auto.fallbacks.is_empty());
    assert_eq!(bar.markers_of(MarkerKind::LayoutFallback).count(), 0);
}

#[test]
fn scenario_c_z_index_bands() {
    let doc = normalize(vec![
        RawElement::new("page", "body", None),
        RawElement::new("A", "div", Some("page"))
            .with_style("position", "relative")
            .with_style("z-index", "-1"),
        RawElement::new("B", "div", Some("page")).with_style("position", "relative"),
        RawElement::new("C", "div", Some("page"))
            .with_style("position", "relative")
            .with_style("z-index", "5"),
    ]);
    assert_eq!(doc.get("page").unwrap().children, vec!["A", "B", "C"]);
    let root_ctx = doc.stacking_context("sc:page").unwrap();
    assert_eq!(root_ctx.members, vec!["page", "A", "B", "C"]);
}

#[test]
fn scenario_c_reversed_document_order() {
    // document order C, B, A with the same z values still paints A, B, C
    let doc = normalize(vec![
        RawElement::new("page", "body", None),
        RawElement::new("C", "div", Some("page"))
            .with_style("position", "relative")
            .with_style("z-index", "5"),
        RawElement::new("B", "div", Some("page")).with_style("position", "relative"),
        RawElement::new("A", "div", Some("page"))
            .with_style("position", "relative")
            .with_style("z-index", "-1"),
    ]);
    assert_eq!(doc.get("page").unwrap().children, vec!["A", "B", "C"]);
}

#[test]
fn nested_contexts_paint_atomically() {
    // inner z 100 stays inside its parent context with z 1, below sibling z 2
    let doc = normalize(vec![
        RawElement::new("page", "body", None),
        RawElement::new("low", "div", Some("page"))
            .with_style("position", "relative")
            .with_style("z-index", "1"),
        RawElement::new("inner", "div", Some("low"))
            .with_style("position", "relative")
            .with_style("z-index", "100"),
        RawElement::new("high", "div", Some("page"))
            .with_style("position", "relative")
            .with_style("z-index", "2"),
    ]);
    let root = doc.stacking_context("sc:page").unwrap();
    assert_eq!(root.members, vec!["page", "low", "high"]);
    let low = doc.stacking_context("sc:low").unwrap();
    assert_eq!(low.members, vec!["inner"]);
    assert_eq!(low.parent.as_deref(), Some("sc:page"));
}

#[test]
fn scenario_d_display_none() {
    let doc = normalize(vec![
        RawElement::new("page", "body", None),
        RawElement::new("visible", "p", Some("page")).with_text("shown"),
        RawElement::new("hidden", "p", Some("page"))
            .with_style("display", "none")
            .with_text("not shown"),
    ]);
    let hidden = doc.get("hidden").expect("hidden node stays in the table");
    assert!(hidden.hidden);
    assert!(hidden.text.is_none());
    assert!(hidden.parent.is_none());
    assert!(doc.walk().iter().all(|n| n.id != "hidden"));
    assert!(doc.stacking_contexts.iter().all(|c| !c.members.contains(&"hidden".to_string())));
    assert!(doc.get("visible").unwrap().text.is_some());
}

#[test]
fn orphans_and_cycles_attach_to_root() {
    let doc = normalize(vec![
        RawElement::new("page", "body", None),
        RawElement::new("orphan", "div", Some("does-not-exist")),
        RawElement::new("x", "div", Some("y")),
        RawElement::new("y", "div", Some("x")),
    ]);
    let orphan = doc.get("orphan").unwrap();
    assert_eq!(orphan.parent.as_deref(), Some("page"));
    assert_eq!(orphan.markers_of(MarkerKind::Structural).count(), 1);
    let walked: Vec<&str> = doc.walk().iter().map(|n| n.id.as_str()).collect();
    for id in ["orphan", "x", "y"] {
        assert!(walked.contains(&id), "{} must be reachable", id);
    }
}

#[test]
fn wrapping_and_multi_track_layouts_fall_back_to_absolute() {
    let doc = normalize(vec![
        RawElement::new("page", "body", None),
        RawElement::new("wrap", "div", Some("page"))
            .with_style("display", "flex")
            .with_style("flex-wrap", "wrap"),
        RawElement::new("grid", "div", Some("page"))
            .with_style("display", "grid")
            .with_style("grid-template-columns", "1fr 1fr")
            .with_style("grid-template-rows", "100px 100px"),
    ]);
    for id in ["wrap", "grid"] {
        let auto = doc.get(id).unwrap().layout.auto_layout.clone().unwrap();
        assert_eq!(auto.mode, LayoutMode::Absolute, "{}", id);
        assert!(auto.has_fallback_of(FallbackKind::AbsolutePosition), "{}", id);
        assert!(doc.get(id).unwrap().markers_of(MarkerKind::LayoutFallback).count() > 0);
    }
}

#[test]
fn supported_layouts_set_no_fallback() {
    let configs: Vec<Vec<(&str, &str)>> = vec![
        vec![("display", "flex")],
        vec![("display", "flex"), ("flex-direction", "column"), ("align-items", "center")],
        vec![("display", "flex"), ("justify-content", "flex-end"), ("align-items", "flex-start")],
        vec![("display", "flex"), ("flex-direction", "row-reverse"), ("justify-content", "center")],
        vec![("display", "grid"), ("grid-template-columns", "200px")],
    ];
    for styles in configs {
        let mut container = RawElement::new("box", "div", Some("page"));
        for (k, v) in &styles {
            container = container.with_style(k, v);
        }
        let doc = normalize(vec![RawElement::new("page", "body", None), container]);
        let auto = doc.get("box").unwrap().layout.auto_layout.clone().unwrap();
        assert!(auto.fallbacks.is_empty(), "{:?} -> {:?}", styles, auto.fallbacks);
    }
}

#[test]
fn unparseable_values_leave_markers_not_errors() {
    let doc = normalize(vec![
        RawElement::new("page", "body", None),
        RawElement::new("odd", "div", Some("page"))
            .with_style("box-shadow", "wobbly 3px")
            .with_style("transform", "rotateX(45deg)")
            .with_style("clip-path", "url(#shape)"),
    ]);
    let odd = doc.get("odd").unwrap();
    let props: Vec<&str> = odd
        .markers_of(MarkerKind::Unsupported)
        .map(|m| m.property.as_str())
        .collect();
    assert!(props.contains(&"transform"));
    assert!(props.contains(&"clip-path"));
    assert!(!odd.markers.is_empty());
}

#[test]
fn single_row_grid_that_wraps_falls_back_to_absolute() {
    let grid = |items: usize| {
        let mut elements = vec![
            RawElement::new("page", "body", None),
            RawElement::new("tiles", "div", Some("page"))
                .with_style("display", "grid")
                .with_style("grid-template-columns", "1fr 1fr 1fr")
                .with_style("grid-template-rows", "100px"),
        ];
        for i in 0..items {
            let row = (i / 3) as f32;
            let col = (i % 3) as f32;
            elements.push(
                RawElement::new(format!("t{}", i), "div", Some("tiles")).with_rect(col * 100.0, row * 100.0, 100.0, 100.0),
            );
        }
        // an absolutely positioned badge does not take a cell
        elements.push(RawElement::new("badge", "span", Some("tiles")).with_style("position", "absolute"));
        normalize(elements).get("tiles").unwrap().layout.auto_layout.clone().unwrap()
    };

    let wrapped = grid(6);
    assert_eq!(wrapped.mode, LayoutMode::Absolute);
    assert!(wrapped.has_fallback_of(FallbackKind::AbsolutePosition));

    let single_row = grid(3);
    assert_eq!(single_row.mode, LayoutMode::Horizontal);
    assert!(single_row.fallbacks.is_empty());
}
