//! The built-in `http` protocol.
//!
//! Request: `{client?, method, url, query, header, body}`. The body is sent as
//! JSON unless the `Content-Type` header says `text/*` or form encoding.
//! Response: `{status, code, header, body}` with the body decoded as JSON when
//! possible. Expect: `{code, header, body}`.

mod client;
mod status;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scenaria_core::assert::{self, Assertion};
use scenaria_core::error::{Error, ErrorPhase};
use scenaria_core::scenario::parse_duration;
use scenaria_core::value::{from_json, to_json, Map, Value};
use tracing::debug;

pub use client::{
    canonical_header, ClientConfig, ClientPool, HttpClient, HttpError, HttpRequestParts,
    HttpResponseParts, ReqwestHttpClient,
};
pub use status::{code_assertion, status_text};

use super::{AssertionBuilder, Invoker, Protocol};
use crate::context::Context;

const REQUEST_KEYS: [&str; 6] = ["client", "method", "url", "query", "header", "body"];
const EXPECT_KEYS: [&str; 3] = ["code", "header", "body"];

pub struct HttpProtocol {
    pool: Arc<ClientPool>,
    default_timeout: Option<Duration>,
}

impl HttpProtocol {
    pub fn new() -> Self {
        Self {
            pool: Arc::new(ClientPool::new()),
            default_timeout: None,
        }
    }

    /// Timeout for clients whose `client.timeout` is unset.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn pool(&self) -> &Arc<ClientPool> {
        &self.pool
    }
}

impl Default for HttpProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for HttpProtocol {
    fn name(&self) -> &str {
        "http"
    }

    fn unmarshal_request(&self, raw: &Value) -> Result<Box<dyn Invoker>, Error> {
        check_keys(raw, &REQUEST_KEYS)?;
        Ok(Box::new(HttpInvoker {
            raw: raw.clone(),
            pool: self.pool.clone(),
            default_timeout: self.default_timeout,
        }))
    }

    fn unmarshal_expect(&self, raw: &Value) -> Result<Box<dyn AssertionBuilder>, Error> {
        check_keys(raw, &EXPECT_KEYS)?;
        Ok(Box::new(HttpExpect { raw: raw.clone() }))
    }
}

fn check_keys(raw: &Value, allowed: &[&str]) -> Result<(), Error> {
    let m = match raw {
        Value::Map(m) => m,
        Value::Nil => return Ok(()),
        other => {
            return Err(Error::new(format!("expected mapping but got {}", other.kind_name()))
                .with_phase(ErrorPhase::Parse))
        }
    };
    let errors = m
        .keys()
        .filter(|k| !allowed.contains(&k.as_str()))
        .map(|k| Error::new(format!("unknown field {k:?}")).with_key(k).with_phase(ErrorPhase::Parse))
        .collect();
    Error::collect(errors)
}

struct HttpInvoker {
    raw: Value,
    pool: Arc<ClientPool>,
    default_timeout: Option<Duration>,
}

struct Request {
    client: ClientConfig,
    method: String,
    url: String,
    query: Vec<(String, String)>,
    header: Vec<(String, String)>,
    body: Value,
}

impl HttpInvoker {
    fn render(&self, ctx: &Context) -> Result<(Request, Value), Error> {
        let rendered = ctx.execute(&self.raw).map_err(|e| e.with_phase(ErrorPhase::Render))?;
        let empty = Map::new();
        let m = rendered.as_map().unwrap_or(&empty);

        let client = match m.get("client") {
            Some(v) => client_config(v, self.default_timeout).map_err(|e| e.with_key("client"))?,
            None => ClientConfig {
                timeout: self.default_timeout,
                no_redirect: false,
            },
        };
        let method = match m.get("method") {
            Some(v) if !v.is_nil() => v.to_text().to_ascii_uppercase(),
            _ => "GET".to_string(),
        };
        let url = match m.get("url") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(Error::at(".url", "url is required").with_phase(ErrorPhase::Render)),
        };
        let query = pairs(m.get("query")).map_err(|e| e.with_key("query"))?;
        let header = pairs(m.get("header")).map_err(|e| e.with_key("header"))?;
        let body = m.get("body").cloned().unwrap_or(Value::Nil);

        let mut shown = Map::new();
        shown.insert("method".into(), Value::from(method.as_str()));
        shown.insert("url".into(), Value::from(url.as_str()));
        shown.insert("query".into(), multi_map(&query));
        shown.insert("header".into(), multi_map(&header));
        shown.insert("body".into(), body.clone());

        Ok((
            Request {
                client,
                method,
                url,
                query,
                header,
                body,
            },
            Value::Map(shown),
        ))
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(&self, ctx: &Context) -> Result<(Context, Value), Error> {
        let (req, shown) = self.render(ctx)?;
        let ctx = ctx.with_request(shown);
        let client = self
            .pool
            .get(&req.client)
            .map_err(|e| Error::new(e.to_string()).with_phase(ErrorPhase::Invoke))?;
        let parts = encode(req)?;
        debug!(method = %parts.method, url = %ctx.redact(&parts.url), "sending HTTP request");

        let sent = tokio::select! {
            r = client.send(parts) => r,
            _ = ctx.cancel_token().cancelled() => {
                return Err(Error::new("context canceled").with_phase(ErrorPhase::Timeout));
            }
        };
        let resp = sent.map_err(|e| {
            Error::new(format!("failed to send request: {e}")).with_phase(ErrorPhase::Invoke)
        })?;
        let value = response_value(&resp);
        Ok((ctx.with_response(value.clone()), value))
    }
}

fn client_config(v: &Value, default_timeout: Option<Duration>) -> Result<ClientConfig, Error> {
    let mut cfg = ClientConfig {
        timeout: default_timeout,
        no_redirect: false,
    };
    let Some(m) = v.as_map() else {
        return Ok(cfg);
    };
    match m.get("timeout") {
        None | Some(Value::Nil) => {}
        Some(Value::Duration(d)) => {
            cfg.timeout = Some(
                d.to_std()
                    .map_err(|_| Error::at(".timeout", "timeout must not be negative"))?,
            )
        }
        Some(other) => {
            cfg.timeout = Some(
                parse_duration(&other.to_text()).map_err(|e| Error::at(".timeout", e))?,
            )
        }
    }
    if let Some(b) = m.get("noRedirect").and_then(Value::as_bool) {
        cfg.no_redirect = b;
    }
    Ok(cfg)
}

/// Flattens `{k: v}` / `{k: [v1, v2]}` into ordered pairs.
fn pairs(v: Option<&Value>) -> Result<Vec<(String, String)>, Error> {
    let m = match v {
        None | Some(Value::Nil) => return Ok(Vec::new()),
        Some(Value::Map(m)) => m,
        Some(other) => {
            return Err(Error::new(format!("expected mapping but got {}", other.kind_name()))
                .with_phase(ErrorPhase::Render))
        }
    };
    let mut out = Vec::new();
    for (k, v) in m {
        match v {
            Value::Seq(items) => out.extend(items.iter().map(|i| (k.clone(), i.to_text()))),
            Value::Nil => {}
            other => out.push((k.clone(), other.to_text())),
        }
    }
    Ok(out)
}

fn multi_map(pairs: &[(String, String)]) -> Value {
    let mut m = Map::new();
    for (k, v) in pairs {
        if let Value::Seq(items) = m.entry(k.clone()).or_insert_with(|| Value::Seq(Vec::new())) {
            items.push(Value::from(v.as_str()));
        }
    }
    Value::Map(m)
}

fn encode(req: Request) -> Result<HttpRequestParts, Error> {
    let mut url = url::Url::parse(&req.url).map_err(|e| {
        Error::at(".url", format!("invalid url {:?}: {e}", req.url)).with_phase(ErrorPhase::Render)
    })?;
    if !req.query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(req.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    let mut headers = req.header;
    let content_type = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.to_ascii_lowercase());

    let body = match (&req.body, content_type.as_deref()) {
        (Value::Nil, _) => None,
        (body, Some(ct)) if ct.starts_with("text/") => Some(body.to_text().into_bytes()),
        (body, Some(ct)) if ct.starts_with("application/x-www-form-urlencoded") => {
            Some(form_encode(body).into_bytes())
        }
        (body, ct) => {
            if ct.is_none() {
                headers.push(("Content-Type".into(), "application/json".into()));
            }
            let json = serde_json::to_vec(&to_json(body)).map_err(|e| {
                Error::at(".body", format!("failed to encode body: {e}")).with_phase(ErrorPhase::Render)
            })?;
            Some(json)
        }
    };

    Ok(HttpRequestParts {
        method: req.method,
        url: url.to_string(),
        headers,
        body,
    })
}

fn form_encode(body: &Value) -> String {
    let Some(m) = body.as_map() else {
        return body.to_text();
    };
    pairs(Some(&Value::Map(m.clone())))
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn response_value(resp: &HttpResponseParts) -> Value {
    let mut header = Map::new();
    for (k, vs) in &resp.headers {
        header.insert(
            k.clone(),
            Value::Seq(vs.iter().map(|v| Value::from(v.as_str())).collect()),
        );
    }
    let body = match serde_json::from_slice::<serde_json::Value>(&resp.body) {
        Ok(json) => from_json(&json),
        Err(_) if resp.body.is_empty() => Value::Nil,
        Err(_) => match std::str::from_utf8(&resp.body) {
            Ok(s) => Value::from(s),
            Err(_) => Value::Bytes(resp.body.clone()),
        },
    };
    let mut m = Map::new();
    m.insert("status".into(), Value::from(status_text(resp.status)));
    m.insert("code".into(), Value::Int(i64::from(resp.status)));
    m.insert("header".into(), Value::Map(header));
    m.insert("body".into(), body);
    Value::Map(m)
}

struct HttpExpect {
    raw: Value,
}

impl AssertionBuilder for HttpExpect {
    fn build(&self, ctx: &Context) -> Result<Assertion, Error> {
        let rendered = ctx.execute(&self.raw).map_err(|e| e.with_phase(ErrorPhase::Render))?;
        let empty = Map::new();
        let m = rendered.as_map().unwrap_or(&empty);

        let code = code_assertion(m.get("code").unwrap_or(&Value::Int(200)));
        let header = m.get("header").map(assert::build_metadata);
        let body = m.get("body").map(assert::build);

        Ok(Assertion::new(move |actual: &Value| {
            let field = |name: &str| actual.as_map().and_then(|m| m.get(name)).cloned().unwrap_or(Value::Nil);
            let mut errors = Vec::new();
            if let Err(e) = code.assert(&field("code")) {
                errors.push(e.with_key("code"));
            }
            if let Some(header) = &header {
                if let Err(e) = header.assert(&field("header")) {
                    errors.push(e.with_key("header"));
                }
            }
            if let Some(body) = &body {
                if let Err(e) = body.assert(&field("body")) {
                    errors.push(e.with_key("body"));
                }
            }
            Error::collect(errors)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::{MemoryWriter, Options, Reporter};

    fn ctx() -> Context {
        Context::new(Reporter::with_writer(Options::default(), MemoryWriter::new()))
    }

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn unknown_request_fields_are_rejected() {
        let err = HttpProtocol::new()
            .unmarshal_request(&yaml("url: http://x\nheaders: {}"))
            .err()
            .unwrap();
        assert_eq!(err.errors()[0].path, ".headers");
        assert_eq!(err.phase(), Some(ErrorPhase::Parse));
    }

    #[test]
    fn json_body_gets_content_type_and_query_is_appended() {
        let invoker = HttpInvoker {
            raw: yaml("method: post\nurl: http://localhost/echo\nquery: {q: [a, b]}\nheader: {X-Id: '{{vars.id}}'}\nbody: {message: hello}"),
            pool: Arc::new(ClientPool::new()),
            default_timeout: None,
        };
        let (req, shown) = invoker.render(&ctx().with_vars(yaml("id: 7"))).unwrap();
        assert_eq!(shown.as_map().unwrap().get("method"), Some(&Value::from("POST")));
        let parts = encode(req).unwrap();
        assert_eq!(parts.url, "http://localhost/echo?q=a&q=b");
        assert!(parts.headers.contains(&("X-Id".to_string(), "7".to_string())));
        assert!(parts
            .headers
            .contains(&("Content-Type".to_string(), "application/json".to_string())));
        assert_eq!(parts.body.unwrap(), br#"{"message":"hello"}"#.to_vec());
    }

    #[test]
    fn form_and_text_bodies() {
        let req = |ct: &str, body: &str| Request {
            client: ClientConfig::default(),
            method: "POST".into(),
            url: "http://localhost/".into(),
            query: vec![],
            header: vec![("Content-Type".into(), ct.into())],
            body: yaml(body),
        };
        let form = encode(req("application/x-www-form-urlencoded", "{a: 1 2, b: x}")).unwrap();
        assert_eq!(form.body.unwrap(), b"a=1%202&b=x".to_vec());
        let text = encode(req("text/plain", "hello")).unwrap();
        assert_eq!(text.body.unwrap(), b"hello".to_vec());
    }

    #[test]
    fn response_body_is_decoded_when_json() {
        let mut headers = scenaria_core::ordered_map::OrderedMap::new();
        headers.insert("Content-Type".to_string(), vec!["application/json".to_string()]);
        let v = response_value(&HttpResponseParts {
            status: 404,
            headers,
            body: br#"{"error":"missing"}"#.to_vec(),
        });
        assert_eq!(v, yaml("status: 404 Not Found\ncode: 404\nheader: {Content-Type: [application/json]}\nbody: {error: missing}"));
    }

    #[test]
    fn expect_checks_code_header_and_body() {
        let expect = HttpProtocol::new()
            .unmarshal_expect(&yaml("code: OK\nheader: {content-type: application/json}\nbody: {message: world}"))
            .unwrap();
        let assertion = expect.build(&ctx()).unwrap();
        let actual = yaml("code: 200\nheader: {Content-Type: [application/json]}\nbody: {message: hello}");
        let err = assertion.assert(&actual).unwrap_err();
        let errors = err.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, ".body.message");
        assert!(errors[0].message.contains("hello") && errors[0].message.contains("world"));
    }

    #[test]
    fn missing_code_defaults_to_ok() {
        let expect = HttpProtocol::new().unmarshal_expect(&Value::Nil).unwrap();
        let err = expect
            .build(&ctx())
            .unwrap()
            .assert(&yaml("code: 500"))
            .unwrap_err();
        assert_eq!(err.errors()[0].path, ".code");
    }
}
