use bytes::Bytes;
use serde_json::Value;
use tracing::warn;

use crate::error::{CmisError, CmisResult};
use crate::transport::HttpResponse;

#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Raw(Bytes),
}

impl ResponseBody {
    pub fn into_json(self) -> CmisResult<Value> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Raw(body) => Err(CmisError::invalid_response(format!(
                "expected a json body, got {} raw bytes",
                body.len()
            ))),
        }
    }
}

pub fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .map(|value| value.trim().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}

/// Decodes a response. The canonical key casing is the browser binding's
/// own camelCase wire casing (`repositoryUrl`, `succinctProperties`), so JSON
/// keys are kept exactly as sent. A blank JSON body decodes to `null`.
pub fn interpret(response: HttpResponse) -> CmisResult<ResponseBody> {
    if !response.is_success() {
        return Err(request_error(&response));
    }
    if !is_json(response.content_type.as_deref()) {
        return Ok(ResponseBody::Raw(response.body));
    }
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ResponseBody::Json(Value::Null));
    }
    serde_json::from_slice(&response.body)
        .map(ResponseBody::Json)
        .map_err(|err| CmisError::invalid_response(format!("json decode failed: {err}")))
}

/// Returns the body bytes untouched on success, for content stream reads.
pub fn interpret_raw(response: HttpResponse) -> CmisResult<Bytes> {
    if !response.is_success() {
        return Err(request_error(&response));
    }
    Ok(response.body)
}

fn request_error(response: &HttpResponse) -> CmisError {
    let raw = String::from_utf8_lossy(&response.body).into_owned();
    let parsed = is_json(response.content_type.as_deref())
        .then(|| serde_json::from_slice::<Value>(&response.body).ok())
        .flatten();

    let error = match parsed.as_ref().and_then(|body| {
        body.get("exception")
            .and_then(Value::as_str)
            .map(|exception| (exception, body))
    }) {
        Some((exception, body)) => CmisError::Request {
            status: response.status,
            exception: Some(exception.to_string()),
            message: body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        None => CmisError::Request {
            status: response.status,
            exception: None,
            message: raw,
        },
    };
    warn!(status = response.status, error = %error, "cmis request rejected");
    error
}
