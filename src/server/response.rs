use may_minihttp::Response;
use serde_json::Value;

/// Content type of the Prometheus text exposition format
pub const PROMETHEUS_CONTENT_TYPE: &str = "Content-Type: text/plain; version=0.0.4; charset=utf-8";

pub(crate) fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

pub fn write_json(res: &mut Response, status: u16, body: &Value) {
    res.status_code(status as usize, status_reason(status));
    res.header("Content-Type: application/json");
    res.body_vec(body.to_string().into_bytes());
}

pub fn write_json_error(res: &mut Response, status: u16, message: &str) {
    write_json(res, status, &serde_json::json!({ "error": message }));
}

/// Write a text body; `content_type` is a full `Content-Type: ...` header line
pub fn write_text(res: &mut Response, status: u16, content_type: &'static str, body: String) {
    res.status_code(status as usize, status_reason(status));
    res.header(content_type);
    res.body_vec(body.into_bytes());
}
