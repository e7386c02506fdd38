use pagescene::hierarchy::check_integrity;
use base64::Engine as _;
use pagescene::ir::{ImagePayload, MarkerKind};
use pagescene::paint::Paint;
use pagescene::transport::{encode_document, loopback, read_ndjson, write_ndjson, Envelope, Message, Receiver, StreamStatus};
use pagescene::{Conversion, ConvertConfig, Converter, PageSnapshot, RawElement, TransportConfig};
use std::collections::HashMap;

// 70-byte PNG: streamed in 4 chunks with a 20 byte chunk size
const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

fn streamed_config() -> ConvertConfig {
    let mut config = ConvertConfig::default();
    config.assets.inline_threshold_bytes = 16;
    config.assets.chunk_size_bytes = 20;
    config.transport.nodes_per_batch = 2;
    config
}

async fn convert_with_image(config: ConvertConfig) -> Conversion {
    let mut img = RawElement::new("hero", "img", Some("page")).with_rect(0.0, 0.0, 100.0, 100.0);
    img.image = Some(pagescene::snapshot::RawImage {
        src: format!("data:image/png;base64,{}", PNG_1X1),
        natural_width: Some(1),
        natural_height: Some(1),
    });
    let snap = PageSnapshot::new(
        "https://example.com/",
        vec![
            RawElement::new("page", "body", None),
            RawElement::new("title", "h1", Some("page")).with_text("Hello"),
            img,
            RawElement::new("foot", "footer", Some("page")).with_text("bye"),
        ],
    );
    Converter::new(config).convert(&snap).await.expect("conversion failed")
}

fn asset_id(conv: &Conversion) -> String {
    conv.document.assets.images[0].id.clone()
}

#[tokio::test]
async fn loopback_rebuilds_the_same_tree() {
    let config = streamed_config();
    let conv = convert_with_image(config.clone()).await;
    let received = loopback(&conv.document, &conv.payloads, &config.transport).await.unwrap();
    assert_eq!(received.status, StreamStatus::Complete);
    assert!(check_integrity(&received.document).is_empty());
    for node in conv.document.nodes.values() {
        let other = received.document.get(&node.id).expect("node missing after transport");
        assert_eq!(other.children, node.children, "children of {}", node.id);
        assert_eq!(other.parent, node.parent, "parent of {}", node.id);
    }
    let id = asset_id(&conv);
    assert_eq!(received.payloads[&id], conv.payloads[&id]);
    assert!(received.document.assets.image(&id).unwrap().is_usable());
    assert!(!received.document.get("hero").unwrap().needs_fallback);
}

#[tokio::test]
async fn streamed_image_uses_a_chunk_reference() {
    let conv = convert_with_image(streamed_config()).await;
    let hero = conv.document.get("hero").unwrap();
    match &hero.image.as_ref().unwrap().payload {
        ImagePayload::Chunked(chunk) => {
            assert!(chunk.is_streamed);
            assert_eq!(chunk.total_chunks, 4);
        }
        other => panic!("expected a chunk reference, got {:?}", other),
    }
}

#[tokio::test]
async fn chunk_arrival_order_does_not_change_the_bytes() {
    let config = streamed_config();
    let conv = convert_with_image(config.clone()).await;
    let envs = encode_document(&conv.document, &conv.payloads, &config.transport);

    let replay = |order: &[u32]| -> Vec<u8> {
        let (chunks, mut rest): (Vec<Envelope>, Vec<Envelope>) = envs
            .iter()
            .cloned()
            .partition(|e| matches!(e.message, Message::ImageChunk { .. }));
        let by_index: HashMap<u32, Envelope> = chunks
            .into_iter()
            .filter_map(|e| match e.message {
                Message::ImageChunk { chunk_index, .. } => Some((chunk_index, e)),
                _ => None,
            })
            .collect();
        let complete = rest.pop().unwrap();
        rest.extend(order.iter().map(|i| by_index[i].clone()));
        rest.push(complete);
        let mut rx = Receiver::new(&config.transport);
        for (seq, mut env) in rest.into_iter().enumerate() {
            env.seq = seq as u64 + 1;
            rx.handle(env).unwrap();
        }
        let out = rx.finish();
        assert_eq!(out.status, StreamStatus::Complete);
        out.payloads[&asset_id(&conv)].clone()
    };

    assert_eq!(replay(&[2, 0, 3, 1]), replay(&[0, 1, 2, 3]));
    assert_eq!(replay(&[3, 2, 1, 0]), conv.payloads[&asset_id(&conv)]);
}

#[tokio::test]
async fn ndjson_stream_replays() {
    let config = streamed_config();
    let conv = convert_with_image(config.clone()).await;
    let envs = encode_document(&conv.document, &conv.payloads, &config.transport);
    let mut buf = Vec::new();
    write_ndjson(&mut buf, &envs).unwrap();
    let back = read_ndjson(buf.as_slice()).unwrap();
    assert_eq!(back, envs);

    let kinds: Vec<&str> = back.iter().map(|e| e.message.kind()).collect();
    assert_eq!(kinds[0], "META");
    assert_eq!(*kinds.last().unwrap(), "COMPLETE");
    let batches = kinds.iter().filter(|k| **k == "NODES").count();
    assert_eq!(batches, 2);
}

#[tokio::test]
async fn error_message_aborts_with_partial_tree() {
    let config = streamed_config();
    let conv = convert_with_image(config.clone()).await;
    let mut envs = encode_document(&conv.document, &conv.payloads, &config.transport);
    let cut = envs.iter().position(|e| matches!(e.message, Message::ImageChunk { .. })).unwrap();
    envs.truncate(cut);
    let seq = envs.last().unwrap().seq + 1;
    envs.push(Envelope {
        seq,
        message: Message::Error {
            message: "capture tab crashed".into(),
            recoverable: true,
            phase: Some(pagescene::Phase::Transport),
        },
    });
    let mut rx = Receiver::new(&config.transport);
    for env in envs {
        rx.handle(env).unwrap();
    }
    assert_eq!(rx.open_buffers(), 0);
    let out = rx.finish();
    assert!(matches!(out.status, StreamStatus::Aborted { recoverable: true, .. }));
    let hero = out.document.get("hero").unwrap();
    assert!(hero.needs_fallback);
    assert_eq!(hero.markers_of(MarkerKind::AssetFailure).count(), 1);
}

fn background_bytes(doc: &pagescene::Document, id: &str) -> Option<Vec<u8>> {
    let bg = doc.get(id)?.background.as_ref()?;
    bg.layers.iter().find_map(|l| match &l.paint {
        Paint::Image {
            payload: Some(ImagePayload::Inline { bytes }),
            ..
        } => Some(bytes.clone()),
        _ => None,
    })
}

#[tokio::test]
async fn small_background_image_travels_inline() {
    let config = ConvertConfig::default();
    let snap = PageSnapshot::new(
        "https://example.com/",
        vec![
            RawElement::new("page", "body", None),
            RawElement::new("banner", "div", Some("page"))
                .with_rect(0.0, 0.0, 300.0, 80.0)
                .with_style("background-image", &format!("url(data:image/png;base64,{})", PNG_1X1)),
        ],
    );
    let conv = Converter::new(config.clone()).convert(&snap).await.unwrap();
    let png = base64::engine::general_purpose::STANDARD.decode(PNG_1X1).unwrap();
    assert_eq!(background_bytes(&conv.document, "banner"), Some(png.clone()));
    assert!(conv.payloads.is_empty());

    let received = loopback(&conv.document, &conv.payloads, &config.transport).await.unwrap();
    assert_eq!(received.status, StreamStatus::Complete);
    assert_eq!(background_bytes(&received.document, "banner"), Some(png));
}

#[test]
fn transport_defaults() {
    let t = TransportConfig::default();
    assert_eq!(t.nodes_per_batch, 200);
    assert_eq!(t.reassembly_timeout_ms, 30_000);
}
