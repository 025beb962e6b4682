#![allow(dead_code)]

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use serde_json::{json, Value};
use tiny_http::{Header, Response, Server};

/// A request as the mock back end received it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub url: String,
    pub host: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// Status, headers, body.
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn status(status: u16) -> Reply {
        Reply {
            status,
            headers: Vec::new(),
            body: String::new(),
            delay: None,
        }
    }

    pub fn json(status: u16, body: Value) -> Reply {
        Reply::status(status)
            .header("Content-Type", "application/json")
            .body(body.to_string())
    }

    pub fn header(mut self, name: &str, value: &str) -> Reply {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: String) -> Reply {
        self.body = body;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Reply {
        self.delay = Some(delay);
        self
    }
}

/// Back end on a background thread answering from a routing closure.
pub struct MockBackend {
    pub base_url: String,
    seen: Arc<Mutex<Vec<Seen>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MockBackend {
    pub fn start<F>(route: F) -> MockBackend
    where
        F: Fn(&Seen) -> Reply + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").expect("http server");
        let base_url = format!("http://{}", server.server_addr());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_seen = Arc::clone(&seen);
        let thread_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            while !thread_stop.load(Ordering::SeqCst) {
                let Ok(Some(mut request)) = server.recv_timeout(Duration::from_millis(50)) else {
                    continue;
                };
                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv(name))
                        .map(|h| h.value.as_str().to_string())
                };
                let authorization = header("Authorization");
                let host = header("Host").unwrap_or_default();
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let entry = Seen {
                    method: request.method().as_str().to_string(),
                    url: request.url().to_string(),
                    host,
                    authorization,
                    body,
                };
                thread_seen.lock().expect("seen lock").push(entry.clone());

                let reply = route(&entry);
                if let Some(delay) = reply.delay {
                    thread::sleep(delay);
                }
                let mut response = Response::from_data(reply.body.into_bytes()).with_status_code(reply.status);
                for (name, value) in &reply.headers {
                    response = response.with_header(Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("header"));
                }
                let _ = request.respond(response);
            }
        });

        MockBackend {
            base_url,
            seen,
            stop,
            handle: Some(handle),
        }
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().expect("seen lock").clone()
    }

    pub fn requests_to(&self, url: &str) -> Vec<Seen> {
        self.seen().into_iter().filter(|s| s.url == url).collect()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Contract shared by the integration tests.
pub fn contract_document() -> Value {
    json!({
        "openapi": "3.0.2",
        "info": {"title": "mock back end", "version": "1.0.0"},
        "paths": {
            "/": {"get": {"responses": {"200": {"content": {"application/json": {"schema": {
                "type": "object",
                "required": ["api_version"],
                "properties": {"api_version": {"type": "string"}}
            }}}}}}},
            "/credentials/basic": {"get": {
                "security": [{"Basic": []}],
                "responses": {"200": {"description": "token"}}
            }},
            "/collections": {"get": {"responses": {"200": {"content": {"application/json": {"schema": {
                "type": "object",
                "required": ["collections"],
                "properties": {"collections": {"type": "array", "items": {"$ref": "#/components/schemas/Collection"}}}
            }}}}}}},
            "/collections/{collection_id}": {"get": {
                "parameters": [{"name": "collection_id", "in": "path", "required": true, "schema": {"type": "string"}}],
                "responses": {"200": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/Collection"}}}}}
            }},
            "/udf_runtimes": {"get": {"responses": {"200": {"description": "runtimes"}}}},
            "/slow": {"get": {"responses": {"200": {"description": "eventually"}}}},
            "/jobs": {
                "get": {"security": [{"Bearer": []}], "responses": {"200": {"description": "jobs"}}},
                "post": {
                    "security": [{"Bearer": []}],
                    "requestBody": {"required": true, "content": {"application/json": {"schema": {
                        "type": "object",
                        "required": ["process"],
                        "properties": {"process": {"type": "object"}}
                    }}}},
                    "responses": {"201": {"headers": {
                        "OpenEO-Identifier": {"schema": {"type": "string"}},
                        "Resource-Identifier": {"schema": {"type": "string"}}
                    }}}
                }
            },
            "/jobs/{job_id}": {"get": {
                "security": [{"Bearer": []}],
                "parameters": [{"name": "job_id", "in": "path", "required": true, "schema": {"type": "string"}}],
                "responses": {"200": {"content": {"application/json": {"schema": {
                    "type": "object",
                    "required": ["id"],
                    "properties": {"id": {"type": "string"}}
                }}}}}
            }}
        },
        "components": {
            "schemas": {"Collection": {"type": "object", "required": ["id"], "properties": {"id": {"type": "string"}}}},
            "securitySchemes": {
                "Basic": {"type": "http", "scheme": "basic"},
                "Bearer": {"type": "http", "scheme": "bearer"}
            }
        }
    })
}

/// Writes the shared contract into `dir` and returns its path.
pub fn write_contract(dir: &Path) -> PathBuf {
    let path = dir.join("openapi.json");
    fs::write(&path, contract_document().to_string()).expect("write contract");
    path
}

/// Writes a TOML config into `dir`; `body` is appended after the header keys.
pub fn write_config(dir: &Path, base_url: &str, contract: &Path, body: &str) -> PathBuf {
    let path = dir.join("config.toml");
    let text = format!(
        "url = '{base_url}'\nopenapi = '{}'\n{body}\n",
        contract.display()
    );
    fs::write(&path, text).expect("write config");
    path
}
