// Transport module: frame encoding and the detection endpoint round trip

use crate::error::{OverlayError, Result};
use crate::models::{BoundingBox, Detection};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// JPEG quality used for outgoing frames
pub const JPEG_QUALITY: u8 = 92;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Body posted to the detection endpoint
#[derive(Debug, Serialize)]
pub struct DetectRequest<'a> {
    pub image: &'a str,
}

/// Sends one encoded frame to the endpoint and returns the decoded JSON body
///
/// Implementations block; callers run them off the UI thread.
pub trait DetectionTransport: Send + Sync {
    fn detect(&self, endpoint: &str, image_data_url: &str) -> Result<Value>;
}

/// HTTP transport backed by a shared ureq agent
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent }
    }
}

impl DetectionTransport for HttpTransport {
    fn detect(&self, endpoint: &str, image_data_url: &str) -> Result<Value> {
        // Non-2xx statuses surface as ureq::Error::StatusCode
        let mut response = self.agent.post(endpoint).send_json(&DetectRequest {
            image: image_data_url,
        })?;

        let text = response.body_mut().read_to_string()?;
        serde_json::from_str(&text)
            .map_err(|e| OverlayError::Decode(format!("response is not JSON: {e}")))
    }
}

/// Encodes a frame as a JPEG data URL
pub fn encode_data_url(frame: &RgbImage) -> Result<String> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        ExtendedColorType::Rgb8,
    )?;

    let mut url = String::with_capacity(DATA_URL_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    url.push_str(DATA_URL_PREFIX);
    BASE64.encode_string(&jpeg, &mut url);
    Ok(url)
}

/// Extracts the first detection from a response body
///
/// The endpoint is untrusted: anything that does not match
/// `{results: [{emotion: string, bbox: [x, y, w, h]}, ...]}` yields `None`.
pub fn first_detection(body: &Value) -> Option<Detection> {
    let first = body.get("results")?.as_array()?.first()?;
    let emotion = first.get("emotion")?.as_str()?.to_string();

    let coords = first.get("bbox")?.as_array()?;
    if coords.len() != 4 {
        return None;
    }
    let mut nums = [0.0f64; 4];
    for (slot, value) in nums.iter_mut().zip(coords) {
        *slot = value.as_f64()?;
    }

    let emoji = first
        .get("emoji")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(Detection {
        emotion,
        emoji,
        bbox: BoundingBox::new(nums[0], nums[1], nums[2], nums[3]),
    })
}

/// Runs one full poll round trip: encode, send, parse
pub fn process_frame(
    transport: &dyn DetectionTransport,
    endpoint: &str,
    frame: &RgbImage,
) -> Result<Option<Detection>> {
    let data_url = encode_data_url(frame)?;
    debug!("Posting {} byte frame to {}", data_url.len(), endpoint);
    let body = transport.detect(endpoint, &data_url)?;
    Ok(first_detection(&body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_url_carries_jpeg_payload() {
        let frame = RgbImage::from_pixel(8, 6, image::Rgb([200, 40, 40]));
        let url = encode_data_url(&frame).expect("encode");
        assert!(url.starts_with("data:image/jpeg;base64,"));

        let payload = BASE64
            .decode(&url[DATA_URL_PREFIX.len()..])
            .expect("valid base64");
        // JPEG SOI marker
        assert_eq!(&payload[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&payload).expect("decodable jpeg");
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(DetectRequest { image: "data:x" }).unwrap();
        assert_eq!(body, json!({ "image": "data:x" }));
    }

    #[test]
    fn takes_only_first_result() {
        let body = json!({
            "results": [
                { "emotion": "Happy", "bbox": [10, 20, 30, 40], "emoji": "😊" },
                { "emotion": "Sad", "bbox": [1, 2, 3, 4] }
            ]
        });
        let detection = first_detection(&body).expect("detection");
        assert_eq!(detection.emotion, "Happy");
        assert_eq!(detection.emoji.as_deref(), Some("😊"));
        assert_eq!(detection.bbox, BoundingBox::new(10.0, 20.0, 30.0, 40.0));
    }

    #[test]
    fn malformed_results_are_ignored() {
        let cases = [
            json!({}),
            json!({ "results": [] }),
            json!({ "results": "Happy" }),
            json!({ "results": [{ "bbox": [1, 2, 3, 4] }] }),
            json!({ "results": [{ "emotion": 3, "bbox": [1, 2, 3, 4] }] }),
            json!({ "results": [{ "emotion": "Happy", "bbox": [1, 2, 3] }] }),
            json!({ "results": [{ "emotion": "Happy", "bbox": [1, "2", 3, 4] }] }),
            json!([1, 2, 3]),
        ];
        for body in cases {
            assert_eq!(first_detection(&body), None, "body: {body}");
        }
    }

    #[test]
    fn fractional_coordinates_survive() {
        let body = json!({ "results": [{ "emotion": "neutral", "bbox": [0.5, 1.25, 30.0, 40.75] }] });
        let detection = first_detection(&body).expect("detection");
        assert_eq!(detection.bbox, BoundingBox::new(0.5, 1.25, 30.0, 40.75));
    }

    /// Serves exactly one canned HTTP reply and hands back the request head and body
    fn serve_once(status: &str, content_type: &str, body: &str) -> (String, std::thread::JoinHandle<(String, String)>) {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}/detect_emotion", listener.local_addr().expect("addr"));
        let reply = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];
            let body_start = loop {
                let n = stream.read(&mut chunk).expect("read");
                assert!(n > 0, "client closed before sending headers");
                raw.extend_from_slice(&chunk[..n]);
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&raw[..body_start]).to_ascii_lowercase();
            let body = if head.contains("transfer-encoding: chunked") {
                while !raw.ends_with(b"0\r\n\r\n") {
                    let n = stream.read(&mut chunk).expect("read body");
                    assert!(n > 0, "client closed mid-body");
                    raw.extend_from_slice(&chunk[..n]);
                }
                dechunk(&raw[body_start..])
            } else {
                let content_length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                while raw.len() < body_start + content_length {
                    let n = stream.read(&mut chunk).expect("read body");
                    assert!(n > 0, "client closed mid-body");
                    raw.extend_from_slice(&chunk[..n]);
                }
                raw[body_start..body_start + content_length].to_vec()
            };
            stream.write_all(reply.as_bytes()).expect("write reply");
            (head, String::from_utf8(body).expect("utf-8 body"))
        });

        (url, handle)
    }

    fn dechunk(mut data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let line_end = data.windows(2).position(|w| w == b"\r\n").expect("chunk size line");
            let size_text = std::str::from_utf8(&data[..line_end]).expect("chunk size");
            let size = usize::from_str_radix(size_text.split(';').next().unwrap_or("0").trim(), 16)
                .expect("hex chunk size");
            if size == 0 {
                return out;
            }
            let start = line_end + 2;
            out.extend_from_slice(&data[start..start + size]);
            data = &data[start + size + 2..];
        }
    }

    fn transport() -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5))
    }

    #[test]
    fn http_posts_json_image_and_parses_reply() {
        let reply = r#"{"results":[{"emotion":"Happy","bbox":[10,20,30,40]}]}"#;
        let (url, server) = serve_once("200 OK", "application/json", reply);

        let body = transport().detect(&url, "data:image/jpeg;base64,AAAA").expect("detect");
        assert_eq!(body, json!({ "results": [{ "emotion": "Happy", "bbox": [10, 20, 30, 40] }] }));

        let (head, payload) = server.join().expect("server thread");
        assert!(head.starts_with("post /detect_emotion "), "{head}");
        assert!(head.contains("content-type: application/json"), "{head}");
        let sent: Value = serde_json::from_str(&payload).expect("json body");
        assert_eq!(sent, json!({ "image": "data:image/jpeg;base64,AAAA" }));
    }

    #[test]
    fn http_error_status_maps_to_http_error() {
        let (url, server) = serve_once("500 Internal Server Error", "text/plain", "boom");

        let err = transport().detect(&url, "data:image/jpeg;base64,AAAA").unwrap_err();
        assert!(matches!(err, OverlayError::Http(ref msg) if msg.contains("500")), "{err:?}");
        server.join().expect("server thread");
    }

    #[test]
    fn http_non_json_body_maps_to_decode_error() {
        let (url, server) = serve_once("200 OK", "text/plain", "definitely not json");

        let err = transport().detect(&url, "data:image/jpeg;base64,AAAA").unwrap_err();
        assert!(matches!(err, OverlayError::Decode(_)), "{err:?}");
        server.join().expect("server thread");
    }

    #[test]
    fn http_unreachable_endpoint_is_an_http_error() {
        // Bind then drop to get a port nobody listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .expect("addr")
            .port();

        let err = transport()
            .detect(&format!("http://127.0.0.1:{port}/detect"), "data:,")
            .unwrap_err();
        assert!(matches!(err, OverlayError::Http(_)), "{err:?}");
    }
}
