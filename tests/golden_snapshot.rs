use pagescene::hierarchy::check_integrity;
use pagescene::ir::{ImagePayload, MarkerKind, NodeKind};
use pagescene::layout::{LayoutMode, PrimaryAlign};
use pagescene::paint::Paint;
use pagescene::sink::SinkCall;
use pagescene::{
    emit_document, CaptureOptions, ConvertConfig, Converter, JsonFileSource, RecordingSink, SnapshotSource,
};

async fn convert_fixture() -> pagescene::Conversion {
    let mut source = JsonFileSource::new("tests/fixtures/landing_page.json");
    let snapshot = source
        .capture("https://shop.example.com/", &CaptureOptions::default())
        .expect("Failed to read fixture");
    let mut config = ConvertConfig::default();
    config.fonts.available.push("Inter".into());
    Converter::new(config).convert(&snapshot).await.expect("conversion failed")
}

#[tokio::test]
async fn landing_page_converts_into_a_sound_tree() {
    let conv = convert_fixture().await;
    let doc = &conv.document;
    assert_eq!(doc.root.as_deref(), Some("1"));
    assert_eq!(doc.len(), 14);
    let problems = check_integrity(doc);
    assert!(problems.is_empty(), "{:?}", problems);

    let tokens = doc.tokens.as_ref().expect("root custom properties become tokens");
    assert!(tokens.colors.contains_key("brand"));
    assert_eq!(tokens.lengths.get("radius"), Some(&8.0));

    let header = doc.get("3").unwrap().layout.auto_layout.clone().unwrap();
    assert_eq!(header.mode, LayoutMode::Horizontal);
    assert_eq!(header.primary_alignment, PrimaryAlign::SpaceBetween);
    assert_eq!(header.item_spacing, 8.0);
    let body = doc.get("2").unwrap().layout.auto_layout.clone().unwrap();
    assert_eq!(body.mode, LayoutMode::Vertical);
    assert_eq!(body.item_spacing, 16.0);
}

#[tokio::test]
async fn landing_page_content() {
    let conv = convert_fixture().await;
    let doc = &conv.document;

    let logo = doc.get("4").unwrap();
    assert_eq!(logo.kind, NodeKind::Image);
    assert!(matches!(logo.image.as_ref().unwrap().payload, ImagePayload::Inline { .. }));
    assert!(logo.text.is_none());

    let h1 = doc.get("9").unwrap().text.as_ref().unwrap();
    assert_eq!(h1.text, "Everything you need");
    assert_eq!(h1.font_weight, 700);
    assert_eq!(h1.font_size, 48.0);
    assert_eq!(h1.font.family, "Inter");

    let hero = doc.get("8").unwrap().background.as_ref().unwrap();
    assert!(hero.layers.iter().any(|l| l.paint.is_gradient()));
    assert!(!hero.layers.iter().any(|l| matches!(l.paint, Paint::Image { .. })));

    let card = doc.get("10").unwrap();
    assert_eq!(card.effects.as_ref().unwrap().shadows.len(), 1);
    assert!(card.border.as_ref().unwrap().radii.is_uniform());
    assert_eq!(doc.get("13").unwrap().vectors.len(), 1);
}

#[tokio::test]
async fn landing_page_hidden_orphan_and_paint_order() {
    let conv = convert_fixture().await;
    let doc = &conv.document;

    let newsletter = doc.get("11").unwrap();
    assert!(newsletter.hidden && newsletter.text.is_none());
    assert_eq!(doc.hidden, vec!["11".to_string()]);

    let footer = doc.get("14").unwrap();
    assert_eq!(footer.parent.as_deref(), Some("1"));
    assert_eq!(footer.markers_of(MarkerKind::Structural).count(), 1);

    // overlay (z -1) under the heading, card (z 2) above it
    assert_eq!(doc.get("8").unwrap().children, vec!["12", "9", "10"]);
    assert!(doc.stacking_contexts.iter().any(|c| c.root == "10" && c.z_index == 2));
    assert_eq!(conv.summary.structural, 1);
    assert_eq!(conv.summary.failed_assets, 0);
}

#[tokio::test]
async fn landing_page_emits_top_down() {
    let conv = convert_fixture().await;
    let mut sink = RecordingSink::new();
    let report = emit_document(&conv.document, &mut sink);
    assert!(report.is_clean(), "{:?}", report);
    // every painted node once; the hidden one never
    assert_eq!(report.created, 13);
    let created = sink.created();
    assert_eq!(created[0], "1");
    assert!(!created.contains(&"11"));
    let pos = |id: &str| created.iter().position(|c| *c == id).unwrap();
    assert!(pos("8") < pos("12") && pos("12") < pos("9") && pos("9") < pos("10"));
    assert!(sink
        .calls
        .iter()
        .any(|c| matches!(c, SinkCall::Text { id, text } if id == "7" && text == "About")));
}
