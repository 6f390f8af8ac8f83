//! In-process Docker Registry V2 used by the integration tests
//!
//! Repository names contain slashes, so every request goes through one
//! fallback handler that splits the path itself. State lives behind a mutex
//! and can be inspected between sync runs.

#![allow(dead_code)]

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use registry_sync::image::manifest::{CONFIG_MEDIA_TYPE, LAYER_MEDIA_TYPE};
use registry_sync::image::{Descriptor, MANIFEST_V2_MEDIA_TYPE, Manifest, sha256_digest};
use registry_sync::{Logger, RegistryClient, RegistryConfig};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How the upload session Location header is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStyle {
    Relative,
    Absolute,
}

#[derive(Default)]
struct RegistryState {
    address: String,
    manifests: HashMap<(String, String), (String, Vec<u8>)>,
    blobs: HashMap<(String, String), Bytes>,
    sessions: HashSet<(String, String)>,
    absolute_location: bool,
    fail_upload_digests: HashSet<String>,
    reject_mounts: bool,
    head_misses: HashSet<(String, String)>,
    manifest_replacements: HashMap<(String, String), Vec<u8>>,
    upload_session_status: Option<StatusCode>,
    omit_upload_location: bool,
    ping_delay: Option<Duration>,
    upload_delay: Option<Duration>,
    manifest_heads: usize,
    upload_sessions: usize,
    blob_uploads: usize,
    mounts: usize,
    manifest_puts: usize,
}

#[derive(Clone)]
pub struct MockRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl MockRegistry {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(RegistryState::default()));
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock registry");
        let address = format!(
            "http://{}",
            listener.local_addr().expect("mock registry address")
        );
        state.lock().unwrap().address = address;

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock registry failed");
        });

        Self { state }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap()
    }

    pub fn address(&self) -> String {
        self.lock().address.clone()
    }

    pub fn client(&self) -> RegistryClient {
        RegistryClient::builder(RegistryConfig::new(self.address()).with_timeout(30))
            .with_logger(Logger::new_quiet())
            .build()
            .unwrap()
    }

    pub fn set_location_style(&self, style: LocationStyle) {
        self.lock().absolute_location = style == LocationStyle::Absolute;
    }

    pub fn fail_upload_of(&self, digest: &str) {
        self.lock().fail_upload_digests.insert(digest.to_string());
    }

    pub fn reject_mounts(&self) {
        self.lock().reject_mounts = true;
    }

    /// Answer 404 to HEAD for this manifest while GET still serves it
    pub fn hide_manifest_from_head(&self, repository: &str, reference: &str) {
        self.lock()
            .head_misses
            .insert((repository.to_string(), reference.to_string()));
    }

    /// Store `manifest` instead of the pushed bytes when this tag is published
    pub fn replace_manifest_on_put(&self, repository: &str, reference: &str, manifest: &Manifest) {
        let data = manifest.to_canonical_json().unwrap();
        self.lock()
            .manifest_replacements
            .insert((repository.to_string(), reference.to_string()), data);
    }

    /// Answer upload session requests with `status` instead of 202
    pub fn refuse_upload_sessions(&self, status: StatusCode) {
        self.lock().upload_session_status = Some(status);
    }

    /// Answer upload session requests with 202 but no Location header
    pub fn omit_upload_location(&self) {
        self.lock().omit_upload_location = true;
    }

    pub fn delay_pings(&self, delay: Duration) {
        self.lock().ping_delay = Some(delay);
    }

    /// Hold every upload PUT for `delay` before answering
    pub fn delay_uploads(&self, delay: Duration) {
        self.lock().upload_delay = Some(delay);
    }

    pub fn insert_blob(&self, repository: &str, data: &[u8]) -> String {
        let digest = sha256_digest(data);
        self.lock().blobs.insert(
            (repository.to_string(), digest.clone()),
            Bytes::copy_from_slice(data),
        );
        digest
    }

    pub fn insert_manifest(&self, repository: &str, reference: &str, manifest: &Manifest) {
        let data = manifest.to_canonical_json().unwrap();
        self.lock().manifests.insert(
            (repository.to_string(), reference.to_string()),
            (manifest.media_type.clone(), data),
        );
    }

    /// Store the blobs and the manifest of an image built by [`build_image`]
    pub fn insert_image(&self, repository: &str, tag: &str, image: &TestImage) {
        self.insert_blob(repository, &image.config);
        for layer in &image.layers {
            self.insert_blob(repository, layer);
        }
        self.insert_manifest(repository, tag, &image.manifest);
    }

    pub fn has_blob(&self, repository: &str, digest: &str) -> bool {
        self.lock()
            .blobs
            .contains_key(&(repository.to_string(), digest.to_string()))
    }

    pub fn has_manifest(&self, repository: &str, reference: &str) -> bool {
        self.manifest_bytes(repository, reference).is_some()
    }

    pub fn manifest_bytes(&self, repository: &str, reference: &str) -> Option<Vec<u8>> {
        self.lock()
            .manifests
            .get(&(repository.to_string(), reference.to_string()))
            .map(|(_, data)| data.clone())
    }

    pub fn manifest_heads(&self) -> usize {
        self.lock().manifest_heads
    }

    pub fn upload_sessions(&self) -> usize {
        self.lock().upload_sessions
    }

    pub fn blob_uploads(&self) -> usize {
        self.lock().blob_uploads
    }

    pub fn mounts(&self) -> usize {
        self.lock().mounts
    }

    pub fn manifest_puts(&self) -> usize {
        self.lock().manifest_puts
    }

    /// Every request that could change registry content
    pub fn write_requests(&self) -> usize {
        let state = self.lock();
        state.upload_sessions + state.blob_uploads + state.mounts + state.manifest_puts
    }
}

/// Blob contents and the schema 2 manifest that references them
pub struct TestImage {
    pub config: Vec<u8>,
    pub layers: Vec<Vec<u8>>,
    pub manifest: Manifest,
}

impl TestImage {
    pub fn config_digest(&self) -> String {
        self.manifest.config.digest.clone()
    }

    pub fn layer_digests(&self) -> Vec<String> {
        self.manifest
            .layers
            .iter()
            .map(|layer| layer.digest.clone())
            .collect()
    }
}

pub fn build_image(config: &str, layers: &[&str]) -> TestImage {
    let config = config.as_bytes().to_vec();
    let layers: Vec<Vec<u8>> = layers.iter().map(|layer| layer.as_bytes().to_vec()).collect();
    let manifest = Manifest::new(
        Descriptor::for_content(CONFIG_MEDIA_TYPE, &config),
        layers
            .iter()
            .map(|layer| Descriptor::for_content(LAYER_MEDIA_TYPE, layer))
            .collect(),
    );
    TestImage {
        config,
        layers,
        manifest,
    }
}

fn status(code: StatusCode) -> Response {
    code.into_response()
}

fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

async fn handle(
    State(state): State<Arc<Mutex<RegistryState>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let is_ping = path == "/v2/" || path == "/v2";
    let delay = {
        let state = state.lock().unwrap();
        if is_ping {
            state.ping_delay
        } else if method == Method::PUT && path.contains("/blobs/uploads/") {
            state.upload_delay
        } else {
            None
        }
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if is_ping {
        return status(StatusCode::OK);
    }
    let Some(rest) = path.strip_prefix("/v2/") else {
        return status(StatusCode::NOT_FOUND);
    };

    let mut state = state.lock().unwrap();

    if let Some(repository) = rest.strip_suffix("/blobs/uploads/") {
        if method != Method::POST {
            return status(StatusCode::METHOD_NOT_ALLOWED);
        }
        return start_upload(&mut state, repository, &body);
    }
    if let Some((repository, id)) = rest.split_once("/blobs/uploads/") {
        if method != Method::PUT {
            return status(StatusCode::METHOD_NOT_ALLOWED);
        }
        return finish_upload(&mut state, repository, id, &uri, &body);
    }
    if let Some((repository, digest)) = rest.rsplit_once("/blobs/") {
        let key = (repository.to_string(), digest.to_string());
        return match (state.blobs.get(&key), method) {
            (Some(data), Method::GET) => (StatusCode::OK, data.clone()).into_response(),
            (Some(data), Method::HEAD) => (
                StatusCode::OK,
                [(header::CONTENT_LENGTH, data.len().to_string())],
            )
                .into_response(),
            (None, Method::GET) | (None, Method::HEAD) => status(StatusCode::NOT_FOUND),
            _ => status(StatusCode::METHOD_NOT_ALLOWED),
        };
    }
    if let Some((repository, reference)) = rest.rsplit_once("/manifests/") {
        let key = (repository.to_string(), reference.to_string());
        return match method {
            Method::HEAD if state.head_misses.contains(&key) => {
                state.manifest_heads += 1;
                status(StatusCode::NOT_FOUND)
            }
            Method::GET | Method::HEAD => {
                if method == Method::HEAD {
                    state.manifest_heads += 1;
                }
                match state.manifests.get(&key) {
                    Some((media_type, data)) => (
                        StatusCode::OK,
                        [
                            (header::CONTENT_TYPE, media_type.clone()),
                            (
                                header::HeaderName::from_static("docker-content-digest"),
                                sha256_digest(data),
                            ),
                        ],
                        data.clone(),
                    )
                        .into_response(),
                    None => (StatusCode::NOT_FOUND, "MANIFEST_UNKNOWN").into_response(),
                }
            }
            Method::PUT => {
                let media_type = headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or(MANIFEST_V2_MEDIA_TYPE)
                    .to_string();
                state.manifest_puts += 1;
                let stored = state
                    .manifest_replacements
                    .remove(&key)
                    .unwrap_or_else(|| body.to_vec());
                state.manifests.insert(key, (media_type, stored));
                (
                    StatusCode::CREATED,
                    [(
                        header::HeaderName::from_static("docker-content-digest"),
                        sha256_digest(&body),
                    )],
                )
                    .into_response()
            }
            _ => status(StatusCode::METHOD_NOT_ALLOWED),
        };
    }

    status(StatusCode::NOT_FOUND)
}

fn start_upload(state: &mut RegistryState, repository: &str, body: &Bytes) -> Response {
    let form: HashMap<String, String> = url::form_urlencoded::parse(body)
        .into_owned()
        .collect();

    if let (Some(digest), Some(from)) = (form.get("mount"), form.get("from")) {
        state.mounts += 1;
        let source = (from.clone(), digest.clone());
        if !state.reject_mounts {
            if let Some(data) = state.blobs.get(&source).cloned() {
                state
                    .blobs
                    .insert((repository.to_string(), digest.clone()), data);
                return status(StatusCode::CREATED);
            }
        }
    } else {
        state.upload_sessions += 1;
        if let Some(code) = state.upload_session_status {
            return (code, "UNSUPPORTED").into_response();
        }
    }

    // A mount that cannot be satisfied falls back to a fresh upload session
    let id = uuid::Uuid::new_v4().to_string();
    state.sessions.insert((repository.to_string(), id.clone()));
    let path = format!("/v2/{}/blobs/uploads/{}?_state=opaque-{}", repository, id, id);
    let location = if state.absolute_location {
        format!("{}{}", state.address, path)
    } else {
        path
    };

    let mut response = status(StatusCode::ACCEPTED);
    if state.omit_upload_location {
        return response;
    }
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

fn finish_upload(
    state: &mut RegistryState,
    repository: &str,
    id: &str,
    uri: &Uri,
    body: &Bytes,
) -> Response {
    if !state
        .sessions
        .remove(&(repository.to_string(), id.to_string()))
    {
        return (StatusCode::NOT_FOUND, "BLOB_UPLOAD_UNKNOWN").into_response();
    }
    if query_param(uri, "_state").is_none() {
        return (StatusCode::BAD_REQUEST, "upload state lost").into_response();
    }
    let Some(digest) = query_param(uri, "digest") else {
        return (StatusCode::BAD_REQUEST, "DIGEST_INVALID").into_response();
    };
    if state.fail_upload_digests.contains(&digest) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "injected upload failure").into_response();
    }
    if sha256_digest(body) != digest {
        return (StatusCode::BAD_REQUEST, "DIGEST_INVALID").into_response();
    }

    state.blob_uploads += 1;
    state
        .blobs
        .insert((repository.to_string(), digest), body.clone());
    status(StatusCode::CREATED)
}
