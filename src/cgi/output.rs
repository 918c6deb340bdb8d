//! Parsing of CGI script output into status, headers and body.
//!
//! Output is read line by line (`\n`, trailing `\r` stripped). Lines up to
//! the first blank line are `Name: value` headers; every later line is
//! appended to the body followed by `\n`. Output without a blank line is
//! all body.

/// HTTP response produced by a CGI script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CgiResponse {
    /// First header named `name` (case-insensitive).
    #[cfg(test)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub fn parse(output: &[u8]) -> CgiResponse {
    let lines: Vec<&[u8]> = lines(output).collect();
    let blank = lines.iter().position(|line| line.is_empty());

    let (header_lines, body_lines) = match blank {
        Some(idx) => (&lines[..idx], &lines[idx + 1..]),
        None => (&lines[..0], &lines[..]),
    };

    let mut status = 200;
    let mut headers = Vec::with_capacity(header_lines.len());
    for line in header_lines {
        let line = String::from_utf8_lossy(line);
        let Some((name, value)) = line.split_once(':') else {
            crate::debug!("cgi"; "ignoring malformed header line `{}`", line);
            continue;
        };
        let (name, value) = (name.trim(), value.trim());

        if name.eq_ignore_ascii_case("status") {
            match parse_status(value) {
                Some(code) => status = code,
                None => crate::debug!("cgi"; "ignoring invalid status `{}`", value),
            }
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let mut body = Vec::with_capacity(output.len());
    for line in body_lines {
        body.extend_from_slice(line);
        body.push(b'\n');
    }

    CgiResponse {
        status,
        headers,
        body,
    }
}

/// Split on `\n`, stripping one trailing `\r`; a final newline adds no empty line.
fn lines(output: &[u8]) -> impl Iterator<Item = &[u8]> {
    let output = output.strip_suffix(b"\n").unwrap_or(output);
    output
        .split(|&b| b == b'\n')
        .filter(move |_| !output.is_empty())
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

/// `404 Not Found` -> 404
fn parse_status(value: &str) -> Option<u16> {
    value
        .split_whitespace()
        .next()?
        .parse()
        .ok()
        .filter(|code| (100..=999).contains(code))
}
