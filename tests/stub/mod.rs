#![allow(dead_code)]

use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::Value;

/// A request the stub received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub struct Reply {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(&'static str, String)>,
}

impl Reply {
    pub fn json(value: &Value) -> Self {
        Self {
            status: 200,
            body: value.to_string(),
            headers: Vec::new(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_owned(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

type Handler = dyn Fn(&Recorded) -> Reply + Send + Sync;

/// Local HTTP server answering through `handler` until dropped.
pub struct Stub {
    pub addr: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Stub {
    pub fn spawn(handler: impl Fn(&Recorded) -> Reply + Send + Sync + 'static) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start stub server");
        let addr = format!("http://{}", server.server_addr());
        let handler: Arc<Handler> = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let recorded = Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_owned(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|h| (h.field.to_string(), h.value.to_string()))
                        .collect(),
                    body,
                };
                let reply = handler(&recorded);
                seen.lock().expect("stub requests lock").push(recorded);

                let mut response =
                    tiny_http::Response::from_string(reply.body).with_status_code(reply.status);
                let content_type =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                response = response.with_header(content_type);
                for (name, value) in reply.headers {
                    let header = tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes())
                        .expect("build header");
                    response = response.with_header(header);
                }
                let _ = request.respond(response);
            }
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().expect("stub requests lock").clone()
    }
}

impl Drop for Stub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn extract_between<'a>(text: &'a str, begin: &str, end: &str) -> Option<&'a str> {
    let start = text.find(begin)? + begin.len();
    let rest = &text[start..];
    let end_rel = rest.find(end)?;
    Some(&rest[..end_rel])
}

/// Canned model answers keyed by schema name.
pub fn canned_answer(schema: &str, prompt: &str) -> Value {
    let text = extract_between(prompt, "BEGIN_SECTION_TEXT\n", "\nEND_SECTION_TEXT").unwrap_or("");
    match schema {
        "basics" if text.contains("Jane Doe") => serde_json::json!({
            "basics": {
                "name": "Jane Doe",
                "email": "jane@example.com",
                "profiles": [{ "network": "GitHub", "url": "https://github.com/janedoe" }]
            }
        }),
        "basics" => serde_json::json!({ "basics": { "name": "Anonymous" } }),
        "work" if text.contains("Acme") => serde_json::json!({
            "work": [{ "name": "Acme", "position": "Engineer", "startDate": "2021", "endDate": "Present" }]
        }),
        "skills" if text.contains("Rust") => serde_json::json!({
            "skills": [{ "name": "Languages", "keywords": ["Rust", "Go"] }]
        }),
        "evaluation" => serde_json::json!({
            "scores": {
                "open_source": { "score": 40, "max": 35, "evidence": "merged upstream work" },
                "self_projects": { "score": 20, "max": 30, "evidence": "CLI tools" },
                "production": { "score": 25, "max": 25, "evidence": "three years at Acme" },
                "technical_skills": { "score": 10, "max": 10, "evidence": "Rust and Go" }
            },
            "bonus_points": { "total": 15, "breakdown": "strong blog" },
            "deductions": { "total": 5, "reasons": "vague dates" },
            "key_strengths": ["systems programming"],
            "areas_for_improvement": ["testing"]
        }),
        other => Value::Object(serde_json::Map::from_iter([(other.to_owned(), serde_json::json!([]))])),
    }
}

/// OpenAI Responses API shape at `{addr}/v1/responses`.
pub fn openai() -> Stub {
    Stub::spawn(|request| {
        if request.method != "POST" || request.url != "/v1/responses" {
            return Reply::status(404, "not found");
        }
        let body = request.json();
        let schema = body
            .pointer("/text/format/name")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let prompt = body.get("input").and_then(|v| v.as_str()).unwrap_or("");
        let text = format!("```json\n{}\n```", canned_answer(schema, prompt));
        Reply::json(&serde_json::json!({
            "id": "resp_stub",
            "object": "response",
            "output": [{
                "type": "message",
                "role": "assistant",
                "content": [{ "type": "output_text", "text": text }]
            }]
        }))
    })
}

/// Ollama chat shape at `{addr}/api/chat`.
pub fn ollama() -> Stub {
    Stub::spawn(|request| {
        if request.method != "POST" || request.url != "/api/chat" {
            return Reply::status(404, "not found");
        }
        let body = request.json();
        let schema = body
            .pointer("/format/title")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let prompt = body
            .pointer("/messages/1/content")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let content = format!("<think>reading</think>{}", canned_answer(schema, prompt));
        Reply::json(&serde_json::json!({
            "model": "stub",
            "message": { "role": "assistant", "content": content },
            "done": true
        }))
    })
}
