/// A parsed announce URL: scheme, host, port, and request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerUrl {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TrackerUrlError {
    InvalidUrl,
    UnsupportedProtocol,
    InvalidPort,
}

impl TrackerUrl {
    pub fn parse(url: &str) -> Result<Self, TrackerUrlError> {
        let (rest, protocol) = Self::split_protocol(url)?;
        let (authority, path) = Self::split_path(rest);

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (
                host.to_string(),
                port.parse().map_err(|_| TrackerUrlError::InvalidPort)?,
            ),
            None => (
                authority.to_string(),
                match protocol {
                    Protocol::Https => 443,
                    Protocol::Http => 80,
                },
            ),
        };

        if host.is_empty() {
            return Err(TrackerUrlError::InvalidUrl);
        }

        Ok(Self {
            protocol,
            host,
            port,
            path,
        })
    }

    fn split_protocol(url: &str) -> Result<(&str, Protocol), TrackerUrlError> {
        let (scheme, rest) = url.split_once("://").ok_or(TrackerUrlError::InvalidUrl)?;
        let protocol = match scheme {
            "http" => Protocol::Http,
            "https" => Protocol::Https,
            _ => return Err(TrackerUrlError::UnsupportedProtocol),
        };
        Ok((rest, protocol))
    }

    fn split_path(rest: &str) -> (&str, String) {
        match rest.split_once('/') {
            Some((authority, path)) => (authority, format!("/{path}")),
            None => (rest, "/".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_http_without_explicit_port() {
        let url = TrackerUrl::parse("http://tracker.example.org/announce").unwrap();
        assert_eq!(url.protocol, Protocol::Http);
        assert_eq!(url.host, "tracker.example.org");
        assert_eq!(url.port, 80);
        assert_eq!(url.path, "/announce");
    }

    #[test]
    fn parses_https_with_explicit_port() {
        let url = TrackerUrl::parse("https://tracker.example.org:1337/a/b").unwrap();
        assert_eq!(url.protocol, Protocol::Https);
        assert_eq!(url.port, 1337);
        assert_eq!(url.path, "/a/b");
    }

    #[test]
    fn defaults_to_root_path_when_absent() {
        let url = TrackerUrl::parse("http://tracker.example.org").unwrap();
        assert_eq!(url.path, "/");
    }

    #[test]
    fn rejects_unsupported_protocol() {
        assert_eq!(
            TrackerUrl::parse("udp://tracker.example.org/announce"),
            Err(TrackerUrlError::UnsupportedProtocol)
        );
    }

    #[test]
    fn rejects_malformed_port() {
        assert_eq!(
            TrackerUrl::parse("http://tracker.example.org:abc/announce"),
            Err(TrackerUrlError::InvalidPort)
        );
    }
}
