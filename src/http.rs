//! Just enough HTTP/1.1 for the dashboard: parse the request line, write a response head.

use core::fmt::Write;

use crate::errors::TachError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    Index,
    SensorData,
    DownloadData,
    ToggleRecording,
    /// `None` when the `mode` parameter is missing or not `0`/`1`
    Theme { dark: Option<bool> },
    NotFound,
}

impl Route {
    /// Match the request target (path plus optional query)
    pub fn from_target(target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        match path {
            "/" | "/index.html" => Route::Index,
            "/sensor-data" => Route::SensorData,
            "/download-data" => Route::DownloadData,
            "/toggle-recording" => Route::ToggleRecording,
            "/theme" => Route::Theme {
                dark: query.and_then(|q| query_param(q, "mode")).and_then(parse_flag),
            },
            _ => Route::NotFound,
        }
    }
}

fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// Parse the request line of a raw request. Only GET is served.
pub fn parse_request(raw: &[u8]) -> Result<Route, TachError> {
    let line_end = raw
        .windows(2)
        .position(|w| w == b"\r\n")
        .ok_or(TachError::MalformedRequest())?;
    let line = core::str::from_utf8(&raw[..line_end]).map_err(|_| TachError::MalformedRequest())?;

    let mut parts = line.split(' ');
    let method = parts.next().ok_or(TachError::MalformedRequest())?;
    let target = parts.next().ok_or(TachError::MalformedRequest())?;
    let version = parts.next().ok_or(TachError::MalformedRequest())?;
    if !version.starts_with("HTTP/1.") || parts.next().is_some() || !target.starts_with('/') {
        return Err(TachError::MalformedRequest());
    }
    if method != "GET" {
        return Err(TachError::UnsupportedMethod());
    }
    Ok(Route::from_target(target))
}

/// True once the blank line ending the request head has arrived
pub fn is_head_complete(raw: &[u8]) -> bool {
    raw.windows(4).any(|w| w == b"\r\n\r\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
            Status::InternalServerError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::MethodNotAllowed => "Method Not Allowed",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

impl From<TachError> for Status {
    fn from(error: TachError) -> Self {
        match error {
            TachError::MalformedRequest() => Status::BadRequest,
            TachError::UnsupportedMethod() => Status::MethodNotAllowed,
            _ => Status::InternalServerError,
        }
    }
}

pub const CONTENT_HTML: &str = "text/html; charset=utf-8";
pub const CONTENT_JSON: &str = "application/json";
pub const CONTENT_CSV: &str = "text/csv";
pub const CONTENT_TEXT: &str = "text/plain";

pub const CSV_DISPOSITION: (&str, &str) = ("Content-Disposition", "attachment; filename=rpm_data.csv");

/// Write status line and headers, including the blank line. Connections are always closed after
/// one response.
pub fn write_head<W: Write>(
    out: &mut W,
    status: Status,
    content_type: &str,
    content_length: usize,
    extra_header: Option<(&str, &str)>,
) -> core::fmt::Result {
    write!(out, "HTTP/1.1 {} {}\r\n", status.code(), status.reason())?;
    write!(out, "Content-Type: {}\r\n", content_type)?;
    write!(out, "Content-Length: {}\r\n", content_length)?;
    if let Some((name, value)) = extra_header {
        write!(out, "{}: {}\r\n", name, value)?;
    }
    out.write_str("Cache-Control: no-store\r\nConnection: close\r\n\r\n")
}
