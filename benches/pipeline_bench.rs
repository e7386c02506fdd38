use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pagescene::hierarchy;
use pagescene::transport::encode_document;
use pagescene::{ConvertConfig, Converter, PageSnapshot, RawElement};
use std::collections::HashMap;

/// A page of `rows` flex rows, each holding a positioned card with a heading and a paragraph
fn synthetic_page(rows: usize) -> PageSnapshot {
    let mut elements = vec![RawElement::new("root", "body", None)
        .with_rect(0.0, 0.0, 1280.0, rows as f32 * 120.0)
        .with_style("display", "flex")
        .with_style("flex-direction", "column")
        .with_style("gap", "12px")];
    for r in 0..rows {
        let y = r as f32 * 120.0;
        let row = format!("row{}", r);
        let card = format!("card{}", r);
        elements.push(
            RawElement::new(&row, "div", Some("root"))
                .with_rect(0.0, y, 1280.0, 108.0)
                .with_style("display", "flex")
                .with_style("justify-content", "space-between"),
        );
        elements.push(
            RawElement::new(&card, "article", Some(&row))
                .with_rect(16.0, y, 400.0, 108.0)
                .with_style("position", "relative")
                .with_style("z-index", if r % 3 == 0 { "2" } else { "auto" })
                .with_style("background-color", "#fafafa")
                .with_style("border-radius", "8px")
                .with_style("box-shadow", "0 2px 4px rgba(0,0,0,0.2)"),
        );
        elements.push(
            RawElement::new(format!("h{}", r), "h2", Some(&card))
                .with_rect(24.0, y + 8.0, 380.0, 28.0)
                .with_style("font-size", "20px")
                .with_text(&format!("Card number {}", r)),
        );
        elements.push(
            RawElement::new(format!("p{}", r), "p", Some(&card))
                .with_rect(24.0, y + 40.0, 380.0, 60.0)
                .with_text("Lorem ipsum dolor sit amet, consectetur adipiscing elit."),
        );
    }
    PageSnapshot::new("https://bench.example.com/", elements)
}

fn bench_normalize(c: &mut Criterion) {
    let snap = synthetic_page(250);
    let converter = Converter::new(ConvertConfig::default());
    c.bench_function("normalize_1000_nodes", |b| {
        b.iter(|| {
            let out = converter.normalize(black_box(&snap)).unwrap();
            black_box(out.document.len());
        })
    });
}

fn bench_hierarchy_rebuild(c: &mut Criterion) {
    let snap = synthetic_page(250);
    let doc = Converter::new(ConvertConfig::default()).normalize(&snap).unwrap().document;
    c.bench_function("hierarchy_rebuild_1000_nodes", |b| {
        b.iter(|| {
            let mut d = doc.clone();
            hierarchy::build(&mut d);
            black_box(d.stacking_contexts.len());
        })
    });
}

fn bench_encode(c: &mut Criterion) {
    let config = ConvertConfig::default();
    let doc = Converter::new(config.clone())
        .normalize(&synthetic_page(250))
        .unwrap()
        .document;
    let payloads: HashMap<String, Vec<u8>> = HashMap::new();
    c.bench_function("encode_document_1000_nodes", |b| {
        b.iter(|| black_box(encode_document(&doc, &payloads, &config.transport).len()))
    });
}

criterion_group!(benches, bench_normalize, bench_hierarchy_rebuild, bench_encode);
criterion_main!(benches);
