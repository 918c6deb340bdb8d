//! Conversion between tiny_http and the routing types.

use anyhow::Result;
use std::io::{self, Read};
use tiny_http::{Header, Request, Response, StatusCode};

use super::handler::{ContentRequest, Reply};
use crate::{debug, embed::serve::UNAVAILABLE_HTML, utils::mime::types};

/// Request bodies beyond this size are rejected with 413.
const MAX_BODY: u64 = 64 * 1024 * 1024;

/// Read the method, target, content type and body of `request`.
///
/// Returns `None` when the body exceeds [`MAX_BODY`].
pub fn read_request(request: &mut Request) -> Result<Option<ContentRequest>> {
    if request.body_length().is_some_and(|len| len as u64 > MAX_BODY) {
        return Ok(None);
    }

    let content_type = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_string());

    let Some(body) = read_limited(request.as_reader(), MAX_BODY)? else {
        return Ok(None);
    };

    Ok(Some(ContentRequest {
        method: request.method().clone(),
        url: request.url().to_string(),
        content_type,
        body,
    }))
}

/// Read all of `reader`, or `None` once more than `limit` bytes arrive.
fn read_limited(reader: impl Read, limit: u64) -> io::Result<Option<Vec<u8>>> {
    let mut body = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut body)?;
    Ok((body.len() as u64 <= limit).then_some(body))
}

/// Send `reply`. tiny_http drops the body of HEAD responses itself.
pub fn send(request: Request, reply: Reply) -> Result<()> {
    let mut response = Response::from_data(reply.body).with_status_code(StatusCode(reply.status));
    for (name, value) in &reply.headers {
        if let Some(header) = make_header(name, value) {
            response.add_header(header);
        }
    }
    request.respond(response)?;
    Ok(())
}

/// Respond with 413 Payload Too Large.
pub fn respond_too_large(request: Request) -> Result<()> {
    let reply = Reply::new(413).with_body(types::PLAIN, "413 Payload Too Large");
    send(request, reply)
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    let reply = Reply::new(503).with_body(types::HTML, UNAVAILABLE_HTML);
    send(request, reply)
}

fn make_header(name: &str, value: &str) -> Option<Header> {
    let header = Header::from_bytes(name.as_bytes(), value.as_bytes()).ok();
    if header.is_none() {
        debug!("serve"; "dropping invalid header `{}`", name);
    }
    header
}
