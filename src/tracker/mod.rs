pub mod query;
pub mod response;
pub mod url;

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use native_tls::TlsConnector;

use query::QueryParams;
use response::{TrackerResponse, TrackerResponseError};
use url::{Protocol, TrackerUrl, TrackerUrlError};

const TRACKER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug)]
pub enum TrackerError {
    Url(TrackerUrlError),
    Connect(io::Error),
    Tls(native_tls::Error),
    TlsHandshake,
    Io(io::Error),
    Response(TrackerResponseError),
}

/// Talks to a single announce URL over raw HTTP(S), matching what any
/// tracker expects from a BitTorrent client: a GET with the standard
/// announce query parameters and a bencoded reply.
pub struct TrackerClient {
    url: TrackerUrl,
}

impl TrackerClient {
    pub fn new(announce: &str) -> Result<Self, TrackerError> {
        let url = TrackerUrl::parse(announce).map_err(TrackerError::Url)?;
        Ok(Self { url })
    }

    /// Announces to the tracker. A non-200 HTTP status yields an empty peer
    /// list rather than an error, so the caller can simply retry later.
    pub fn announce(&self, params: &QueryParams) -> Result<TrackerResponse, TrackerError> {
        let request = self.build_request(params);
        let body = match self.url.protocol {
            Protocol::Http => self.request_over(request, self.connect()?)?,
            Protocol::Https => {
                let connector = TlsConnector::new().map_err(TrackerError::Tls)?;
                let stream = connector
                    .connect(&self.url.host, self.connect()?)
                    .map_err(|_| TrackerError::TlsHandshake)?;
                self.request_over(request, stream)?
            }
        };

        match Self::split_status_and_body(&body) {
            Some((200, payload)) => {
                TrackerResponse::parse(payload).map_err(TrackerError::Response)
            }
            _ => Ok(TrackerResponse {
                interval: 0,
                peers: Vec::new(),
            }),
        }
    }

    fn connect(&self) -> Result<TcpStream, TrackerError> {
        let addr = (self.url.host.as_str(), self.url.port)
            .to_socket_addrs()
            .map_err(TrackerError::Connect)?
            .next()
            .ok_or_else(|| {
                TrackerError::Connect(io::Error::new(io::ErrorKind::NotFound, "no address"))
            })?;
        let stream =
            TcpStream::connect_timeout(&addr, TRACKER_TIMEOUT).map_err(TrackerError::Connect)?;
        stream
            .set_read_timeout(Some(TRACKER_TIMEOUT))
            .map_err(TrackerError::Connect)?;
        stream
            .set_write_timeout(Some(TRACKER_TIMEOUT))
            .map_err(TrackerError::Connect)?;
        Ok(stream)
    }

    fn build_request(&self, params: &QueryParams) -> String {
        format!(
            "GET {}{} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\nUser-Agent: bitpull/0.1\r\n\r\n",
            self.url.path,
            params.build(),
            self.url.host,
        )
    }

    fn request_over<S: Read + Write>(&self, request: String, mut stream: S) -> Result<Vec<u8>, TrackerError> {
        stream
            .write_all(request.as_bytes())
            .map_err(TrackerError::Io)?;
        let mut response = Vec::new();
        stream.read_to_end(&mut response).map_err(TrackerError::Io)?;
        Ok(response)
    }

    /// Splits a raw HTTP response into its status code and body, skipping
    /// headers at the first blank line.
    fn split_status_and_body(response: &[u8]) -> Option<(u16, &[u8])> {
        let header_end = response
            .windows(4)
            .position(|window| window == b"\r\n\r\n")?;
        let headers = std::str::from_utf8(&response[..header_end]).ok()?;
        let status_line = headers.lines().next()?;
        let status: u16 = status_line.split_whitespace().nth(1)?.parse().ok()?;
        Some((status, &response[header_end + 4..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_status_and_body_on_header_boundary() {
        let response = b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nfoo";
        let (status, body) = TrackerClient::split_status_and_body(response).unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, b"foo");
    }

    #[test]
    fn non_200_status_is_identified() {
        let response = b"HTTP/1.1 500 Internal Server Error\r\n\r\n";
        let (status, _) = TrackerClient::split_status_and_body(response).unwrap();
        assert_eq!(status, 500);
    }
}
