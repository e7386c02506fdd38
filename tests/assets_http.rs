#![cfg(feature = "http")]

use base64::Engine as _;
use pagescene::assets::Delivery;
use pagescene::ir::{ImagePayload, MarkerKind};
use pagescene::snapshot::RawImage;
use pagescene::{ConvertConfig, Converter, PageSnapshot, RawElement};
use tiny_http::{Header, Response, Server};

const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

/// Serve `/logo.png` and answer 404 for everything else
fn spawn_server() -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr();
    let png = base64::engine::general_purpose::STANDARD.decode(PNG_1X1).unwrap();

    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = if request.url() == "/logo.png" {
                Response::from_data(png.clone())
                    .with_header(Header::from_bytes(&b"Content-Type"[..], &b"image/png"[..]).unwrap())
            } else {
                Response::from_data(b"not found".to_vec()).with_status_code(404)
            };
            let _ = request.respond(response);
        }
    });

    format!("http://{}/", addr)
}

fn img(id: &str, src: &str) -> RawElement {
    let mut el = RawElement::new(id, "img", Some("page")).with_rect(0.0, 0.0, 32.0, 32.0);
    el.image = Some(RawImage {
        src: src.to_string(),
        natural_width: Some(1),
        natural_height: Some(1),
    });
    el
}

#[tokio::test]
async fn http_assets_inline_or_fall_back() {
    let base = spawn_server();
    let snap = PageSnapshot::new(
        &base,
        vec![
            RawElement::new("page", "body", None).with_rect(0.0, 0.0, 400.0, 300.0),
            // relative source resolved against the page URL
            img("logo", "logo.png"),
            img("broken", &format!("{}missing.png", base)),
        ],
    );

    let conv = Converter::new(ConvertConfig::default())
        .convert(&snap)
        .await
        .expect("conversion failed");

    let logo = conv.document.get("logo").unwrap();
    assert!(!logo.needs_fallback);
    assert!(matches!(logo.image.as_ref().unwrap().payload, ImagePayload::Inline { .. }));

    let broken = conv.document.get("broken").unwrap();
    assert!(broken.needs_fallback);
    assert_eq!(broken.markers_of(MarkerKind::AssetFailure).count(), 1);

    assert!(conv
        .reports
        .iter()
        .any(|r| r.delivery == Delivery::Failed && r.node_ids.contains(&"broken".to_string())));
    assert_eq!(conv.summary.failed_assets, 1);
    assert_eq!(conv.document.assets.images.len(), 1);
}

#[tokio::test]
async fn same_image_fetched_once_for_two_nodes() {
    let base = spawn_server();
    let snap = PageSnapshot::new(
        &base,
        vec![
            RawElement::new("page", "body", None),
            img("a", "/logo.png"),
            img("b", &format!("{}logo.png", base)),
        ],
    );
    let conv = Converter::new(ConvertConfig::default()).convert(&snap).await.unwrap();
    assert_eq!(conv.document.assets.images.len(), 1);
    let report = conv.reports.iter().find(|r| r.delivery == Delivery::Inline).unwrap();
    assert_eq!(report.node_ids.len(), 2);
}
