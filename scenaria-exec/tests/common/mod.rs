#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path as UrlPath, RawQuery};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use scenaria_core::assert::{self, Assertion};
use scenaria_core::error::{Error, ErrorPhase};
use scenaria_core::value::{Map, Value};
use scenaria_exec::reporter::MemoryWriter;
use scenaria_exec::{
    AssertionBuilder, Config, Context, Engine, Invoker, Options, Protocol, RunSummary,
};

static ADDR: OnceLock<String> = OnceLock::new();

/// Base URL of a process-wide echo server, also exported as `TEST_ADDR`.
pub fn echo_addr() -> &'static str {
    ADDR.get_or_init(|| {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap()).unwrap();
                axum::serve(listener, router()).await.unwrap();
            });
        });
        let addr = format!("http://{}", rx.recv().unwrap());
        std::env::set_var("TEST_ADDR", &addr);
        addr
    })
}

fn router() -> Router {
    Router::new()
        .route("/echo", post(echo))
        .route("/headers", get(headers))
        .route("/query", get(query))
        .route("/status/:code", get(status))
        .route("/slow", get(slow))
        .route("/redirect", get(redirect))
}

async fn echo(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let mut out = HeaderMap::new();
    if let Some(ct) = headers.get(header::CONTENT_TYPE) {
        out.insert(header::CONTENT_TYPE, ct.clone());
    }
    if let Some(auth) = headers.get(header::AUTHORIZATION) {
        out.insert("x-authorization", auth.clone());
    }
    (out, body)
}

async fn headers(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    Json(
        headers
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
            .collect(),
    )
}

async fn query(RawQuery(raw): RawQuery) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "raw": raw.unwrap_or_default() }))
}

async fn status(UrlPath(code): UrlPath<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(2)).await;
    "late"
}

async fn redirect() -> Redirect {
    Redirect::temporary("/headers")
}

pub fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, text).unwrap();
    path
}

pub fn engine(dir: &Path) -> Engine {
    echo_addr();
    Engine::new(Config::with_root(dir)).with_options(Options {
        verbose: true,
        colored: false,
        summary: true,
    })
}

pub async fn run(engine: &Engine, files: &[PathBuf]) -> (RunSummary, String) {
    let out = MemoryWriter::new();
    let summary = engine.run_with_writer(files, out.clone()).await.unwrap();
    (summary, out.contents())
}

/// A `fake` protocol whose invoker logs every call, sleeps, and fails the
/// first `fail_first` calls. The response is `{call: n}`.
#[derive(Clone, Default)]
pub struct FakeProtocol {
    pub calls: Arc<AtomicUsize>,
    pub fail_first: usize,
    pub sleep: Duration,
}

impl FakeProtocol {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Protocol for FakeProtocol {
    fn name(&self) -> &str {
        "fake"
    }

    fn unmarshal_request(&self, raw: &Value) -> Result<Box<dyn Invoker>, Error> {
        Ok(Box::new(FakeInvoker {
            protocol: self.clone(),
            raw: raw.clone(),
        }))
    }

    fn unmarshal_expect(&self, raw: &Value) -> Result<Box<dyn AssertionBuilder>, Error> {
        Ok(Box::new(FakeExpect(raw.clone())))
    }
}

struct FakeInvoker {
    protocol: FakeProtocol,
    raw: Value,
}

#[async_trait]
impl Invoker for FakeInvoker {
    async fn invoke(&self, ctx: &Context) -> Result<(Context, Value), Error> {
        let n = self.protocol.calls.fetch_add(1, Ordering::SeqCst) + 1;
        ctx.reporter().log(format!("invocation {n}"));
        let request = ctx.execute(&self.raw)?;
        if !self.protocol.sleep.is_zero() {
            tokio::time::sleep(self.protocol.sleep).await;
        }
        if n <= self.protocol.fail_first {
            return Err(Error::new("transient failure").with_phase(ErrorPhase::Invoke));
        }
        let mut response = Map::new();
        response.insert("call".into(), Value::Int(n as i64));
        let response = Value::Map(response);
        Ok((ctx.with_request(request).with_response(response.clone()), response))
    }
}

struct FakeExpect(Value);

impl AssertionBuilder for FakeExpect {
    fn build(&self, ctx: &Context) -> Result<Assertion, Error> {
        if self.0.is_nil() {
            return Ok(Assertion::new(|_: &Value| Ok(())));
        }
        Ok(assert::build(&ctx.execute(&self.0)?))
    }
}
