//! The built-in `TRACE` response: echo the request back as `message/http`.
//!
//! Grounded in `router/inbuilt/trace.go`'s `traceResponse`/
//! `renderHTTPRequest`: rather than dispatching `TRACE` to a handler, the
//! router renders the request it just parsed as the response body
//! (`§5`: "TRACE+405 special-cased to echo the request back").

use crate::request::Request;
use crate::response::Response;
use crate::status::StatusCode;

pub(crate) fn trace_response<T>(req: &Request<T>) -> Response {
    let mut body = String::new();
    body.push_str(req.method().as_str());
    body.push(' ');
    body.push_str(&request_uri(req));
    body.push(' ');
    body.push_str(req.proto().as_str());
    body.push_str("\r\n");

    for (key, value) in req.headers().iter() {
        body.push_str(key);
        body.push_str(": ");
        body.push_str(value);
        body.push_str("\r\n");
    }
    body.push_str("content-length: 0\r\n");
    body.push_str("\r\n");

    Response::new()
        .status(StatusCode::OK)
        .header("content-type", "message/http")
        .string(body)
}

fn request_uri<T>(req: &Request<T>) -> String {
    let query = req.query().raw();
    if query.is_empty() {
        req.path().to_string()
    } else {
        format!("{}?{}", req.path(), query)
    }
}
