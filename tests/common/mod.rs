//! Shared helpers for integration tests: a fake inference server and
//! multipart request building.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use hound::{SampleFormat, WavSpec, WavWriter};

use narrator::config::ServiceConfig;
use narrator::server::{create_router, AppState};
use narrator::Narrator;

pub const SAMPLE_RATE: u32 = 16000;
/// Frames the fake server renders per character of input
pub const FRAMES_PER_CHAR: usize = 10;
/// Any fragment containing this fails on the fake server
pub const FAIL_MARKER: &str = "FAIL";
/// Any fragment containing this comes back at [`HIFI_SAMPLE_RATE`]
pub const HIFI_MARKER: &str = "HIFI";
pub const HIFI_SAMPLE_RATE: u32 = 24000;
/// How long the fake server spends on each synthesis call
const RENDER_TIME: Duration = Duration::from_millis(30);

/// One synthesis call as seen by the fake server
#[derive(Debug, Clone, Default)]
pub struct RecordedCall {
    pub path: String,
    pub fields: HashMap<String, String>,
    pub files: Vec<String>,
}

impl RecordedCall {
    pub fn text(&self) -> &str {
        self.fields.get("text").map(String::as_str).unwrap_or_default()
    }
}

#[derive(Clone, Default)]
struct MockState {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

/// Fake XTTS/Dia inference server on an ephemeral port
pub struct MockInference {
    pub addr: SocketAddr,
    state: MockState,
}

impl MockInference {
    pub async fn start() -> Self {
        let state = MockState::default();

        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/api/tts", post(synthesize))
            .route("/api/generate", post(synthesize))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Most synthesis calls the server was ever handling at once
    pub fn peak_in_flight(&self) -> usize {
        self.state.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.text().to_string()).collect()
    }
}

async fn synthesize(State(state): State<MockState>, uri: axum::http::Uri, mut multipart: Multipart) -> Response {
    let mut call = RecordedCall {
        path: uri.path().to_string(),
        ..Default::default()
    };

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if field.file_name().is_some() {
            field.bytes().await.unwrap();
            call.files.push(name);
        } else {
            let value = field.text().await.unwrap();
            call.fields.insert(name, value);
        }
    }

    let text = call.text().to_string();
    state.calls.lock().unwrap().push(call);

    let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(RENDER_TIME).await;
    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    if text.contains(FAIL_MARKER) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "CUDA out of memory").into_response();
    }

    let sample_rate = if text.contains(HIFI_MARKER) { HIFI_SAMPLE_RATE } else { SAMPLE_RATE };
    let frames = text.chars().count() * FRAMES_PER_CHAR;
    ([(header::CONTENT_TYPE, "audio/wav")], wav_bytes_at(sample_rate, frames)).into_response()
}

pub fn wav_spec() -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

pub fn wav_bytes(frames: usize) -> Vec<u8> {
    wav_bytes_at(SAMPLE_RATE, frames)
}

pub fn wav_bytes_at(sample_rate: u32, frames: usize) -> Vec<u8> {
    let spec = WavSpec { sample_rate, ..wav_spec() };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            writer.write_sample(((i % 100) as i16) * 100).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Service config pointing both engines at `url`, workspaces under `temp_root`
pub fn config(url: &str, temp_root: &Path) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.xtts.base_url = url.to_string();
    config.dia.base_url = url.to_string();
    config.xtts.timeout_secs = 5;
    config.dia.timeout_secs = 5;
    config.temp_dir = Some(temp_root.to_path_buf());
    config
}

pub fn router(config: ServiceConfig) -> Router {
    create_router(AppState::new(Arc::new(Narrator::new(config))))
}

/// multipart/form-data request builder
pub struct FormRequest {
    boundary: String,
    body: Vec<u8>,
}

impl FormRequest {
    pub fn new() -> Self {
        Self {
            boundary: "narrator-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: audio/wav\r\n\r\n",
                self.boundary, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn build(mut self) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/tts")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// A consented request for `text`
pub fn tts_form(text: &str) -> FormRequest {
    FormRequest::new().field("text", text).field("consent", "true")
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
