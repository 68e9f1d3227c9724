//! HTTP adapter for the identity gateway
//!
//! - POST /ca/enroll    - Enroll the caller with the organization CA
//! - POST /ca/rotateKey - Re-enroll the caller with a fresh key
//! - POST /ca/register  - Register a new identity, signed by the caller
//! - GET  /fabric       - Evaluate a chaincode function (query)
//! - POST /fabric       - Submit a chaincode transaction (invoke)
//!
//! Every path is also served under `/v1`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::gateway::{form_to_json, BodyInput, IdentityGateway, Operation, Outcome, RequestInput};
use crate::types::{GatewayError, Violation};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Error type accepted from request bodies
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Request bodies are read up to this size, never further.
const MAX_BODY_BYTES: usize = 64 * 1024;

// =============================================================================
// Path matching
// =============================================================================

/// Result of matching a request line against the gateway paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayRoute {
    Operation(Operation),
    /// Known path, unsupported method
    MethodNotAllowed,
}

/// Match `method path` to a gateway operation. `None` if the path is not
/// a gateway path.
pub fn match_route(method: &Method, path: &str) -> Option<GatewayRoute> {
    let path = path.strip_prefix("/v1").filter(|p| p.starts_with('/')).unwrap_or(path);
    let path = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);

    let op = match (method, path) {
        (&Method::POST, "/ca/enroll") => Operation::Enroll,
        (&Method::POST, "/ca/rotateKey") => Operation::RotateKey,
        (&Method::POST, "/ca/register") => Operation::Register,
        (&Method::GET, "/fabric") => Operation::Query,
        (&Method::POST, "/fabric") => Operation::Invoke,
        (_, "/ca/enroll" | "/ca/rotateKey" | "/ca/register" | "/fabric") => {
            return Some(GatewayRoute::MethodNotAllowed)
        }
        _ => return None,
    };
    Some(GatewayRoute::Operation(op))
}

// =============================================================================
// Request decoding
// =============================================================================

/// Decode query, body and `Authorization` header into a [`RequestInput`].
pub async fn read_input<B>(req: Request<B>) -> RequestInput
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let query = req
        .uri()
        .query()
        .map(|q| {
            serde_urlencoded::from_str::<Vec<(String, String)>>(q).unwrap_or_else(|e| {
                debug!("Ignoring undecodable query string: {}", e);
                Vec::new()
            })
        })
        .unwrap_or_default();

    let authorization = get_auth_header(&req);
    let is_form = req
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => decode_body(&collected.to_bytes(), is_form),
        Err(e) if e.is::<LengthLimitError>() => {
            debug!("Request body exceeds {} bytes", MAX_BODY_BYTES);
            BodyInput::Invalid("request body too large".into())
        }
        Err(e) => BodyInput::Invalid(format!("failed to read body: {}", e)),
    };

    RequestInput {
        query,
        body,
        authorization,
    }
}

fn decode_body(bytes: &[u8], is_form: bool) -> BodyInput {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return BodyInput::Empty;
    }

    if is_form {
        match serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes) {
            Ok(pairs) => BodyInput::Json(form_to_json(pairs)),
            Err(e) => BodyInput::Invalid(format!("invalid form body: {}", e)),
        }
    } else {
        match serde_json::from_slice(bytes) {
            Ok(value) => BodyInput::Json(value),
            Err(e) => BodyInput::Invalid(format!("invalid JSON: {}", e)),
        }
    }
}

/// Raw `Authorization` header. Non-ASCII bytes are kept (lossily) so the
/// resolver reports the header as malformed rather than missing.
fn get_auth_header<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .map(|v| match v.to_str() {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(v.as_bytes()).into_owned(),
        })
}

// =============================================================================
// Handler
// =============================================================================

/// Run `op` for an HTTP request and render the outcome.
pub async fn handle_gateway_request<B>(
    op: Operation,
    req: Request<B>,
    gateway: &IdentityGateway,
) -> Response<BoxBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let input = read_input(req).await;
    match gateway.handle(op, &input).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => error_response(op, &e),
    }
}

fn outcome_response(outcome: Outcome) -> Response<BoxBody> {
    let status = outcome.status_code();
    match outcome {
        Outcome::Enrolled => text_response(status, "CLIENT ENROLLED"),
        Outcome::KeyRotated => text_response(status, "KEY ROTATED"),
        Outcome::Registered { enrollment_secret } => json_response(
            status,
            &serde_json::json!({ "enrollmentSecret": enrollment_secret }),
        ),
        Outcome::Queried(value) => json_response(status, &value),
        Outcome::Invoked(raw) => json_response(status, &raw),
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    msg: &'static str,
    #[serde(skip_serializing_if = "no_violations")]
    violations: &'a [Violation],
}

fn no_violations(violations: &&[Violation]) -> bool {
    violations.is_empty()
}

/// Failure envelope: `{"error", "msg"}` plus `violations` for rejected input.
pub fn error_response(op: Operation, err: &GatewayError) -> Response<BoxBody> {
    json_response(
        err.status_code(),
        &ErrorBody {
            error: err.to_string(),
            msg: op.failure_label(),
            violations: err.violations(),
        },
    )
}

// =============================================================================
// Response helpers
// =============================================================================

pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(full_body(json))
        .unwrap()
}

fn text_response(status: StatusCode, text: &'static str) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Access-Control-Allow-Origin", "*")
        .body(full_body(text))
        .unwrap()
}

pub fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(full_body(Bytes::new()))
        .unwrap()
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}
