use std::fmt;
use std::fs::DirBuilder;
use std::net::SocketAddr;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use strum::{Display, EnumString};
use thiserror::Error;
use url::Url;

/// Address families a TCP endpoint may bind to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TcpFamily {
    /// Bind to the first address the host resolves to.
    #[default]
    Any,
    /// Restrict binding to IPv4 addresses.
    V4,
    /// Restrict binding to IPv6 addresses.
    V6,
}

impl TcpFamily {
    /// Returns true when `addr` belongs to this family.
    #[must_use]
    pub const fn admits(self, addr: &SocketAddr) -> bool {
        match self {
            Self::Any => true,
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }

    const fn unspecified_host(self) -> &'static str {
        match self {
            Self::Any | Self::V4 => "0.0.0.0",
            Self::V6 => "::",
        }
    }
}

/// Declarative configuration for the ingestion socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEndpoint {
    /// Unix domain socket endpoint.
    Unix { path: Utf8PathBuf },
    /// TCP socket endpoint.
    Tcp {
        host: String,
        port: u16,
        family: TcpFamily,
    },
}

impl SocketEndpoint {
    /// Builds a Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Builds a TCP socket endpoint that accepts any address family.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
            family: TcpFamily::Any,
        }
    }

    /// Builds an endpoint from a network kind and a bind address.
    ///
    /// Accepted networks are `tcp`, `tcp4`, `tcp6` and `unix`. TCP addresses
    /// take the `host:port` form; IPv6 hosts are bracketed (`[::1]:9090`) and
    /// an empty host binds every interface of the family.
    pub fn from_network(network: &str, address: &str) -> Result<Self, SocketParseError> {
        let family = match network {
            "unix" => {
                if address.is_empty() {
                    return Err(SocketParseError::MissingUnixPath(address.to_owned()));
                }
                return Ok(Self::unix(address));
            }
            "tcp" => TcpFamily::Any,
            "tcp4" => TcpFamily::V4,
            "tcp6" => TcpFamily::V6,
            other => return Err(SocketParseError::UnsupportedNetwork(other.to_owned())),
        };

        let (host, port) = split_host_port(address)?;
        let host = if host.is_empty() {
            family.unspecified_host().to_owned()
        } else {
            host.to_owned()
        };
        Ok(Self::Tcp { host, port, family })
    }

    /// Returns the Unix socket path when the endpoint uses the Unix transport.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_ref()),
            Self::Tcp { .. } => None,
        }
    }

    /// Ensures the socket's parent directory exists with restrictive permissions.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let Some(parent) = path.parent() else {
            return Err(SocketPreparationError::MissingParent {
                path: path.to_path_buf(),
            });
        };
        if parent.as_str().is_empty() {
            return Ok(());
        }

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        if let Err(source) = builder.create(parent.as_std_path())
            && source.kind() != std::io::ErrorKind::AlreadyExists
        {
            return Err(SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            });
        }

        Ok(())
    }
}

fn split_host_port(address: &str) -> Result<(&str, u16), SocketParseError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| SocketParseError::MissingPort(address.to_owned()))?;
    let host = host
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(host);
    if port.is_empty() {
        return Err(SocketParseError::MissingPort(address.to_owned()));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| SocketParseError::InvalidPort(address.to_owned()))?;
    Ok((host, port))
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port, .. } if host.contains(':') => {
                write!(formatter, "tcp://[{host}]:{port}")
            }
            Self::Tcp { host, port, .. } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        match url.scheme() {
            "unix" => {
                let path = url.path();
                if path.is_empty() {
                    return Err(SocketParseError::MissingUnixPath(input.to_owned()));
                }
                Ok(Self::unix(path))
            }
            "tcp" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| SocketParseError::MissingHost(input.to_owned()))?;
                let host = host
                    .strip_prefix('[')
                    .and_then(|inner| inner.strip_suffix(']'))
                    .unwrap_or(host);
                let port = url
                    .port()
                    .ok_or_else(|| SocketParseError::MissingPort(input.to_owned()))?;
                Ok(Self::tcp(host, port))
            }
            other => Err(SocketParseError::UnsupportedScheme(other.to_owned())),
        }
    }
}

/// Errors encountered while parsing a [`SocketEndpoint`] from text.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Scheme was not recognised.
    #[error("unsupported socket scheme '{0}'")]
    UnsupportedScheme(String),
    /// Network kind was not recognised.
    #[error("unsupported network '{0}' (expected tcp, tcp4, tcp6 or unix)")]
    UnsupportedNetwork(String),
    /// TCP host name was missing.
    #[error("missing TCP host in '{0}'")]
    MissingHost(String),
    /// TCP port was missing from the address.
    #[error("missing TCP port in '{0}'")]
    MissingPort(String),
    /// TCP port was not a number in range.
    #[error("invalid TCP port in '{0}'")]
    InvalidPort(String),
    /// Unix socket path was absent.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// Parent directory is missing when creating a Unix socket path.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent { path: Utf8PathBuf },
    /// Failed to create or adjust socket directories.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}
