//! Connection establishment
//!
//! The client reaches servers through a [`Connector`], which turns a host
//! and port into a pair of byte streams. [`TcpConnector`] is the plain TCP
//! implementation; tests and embedders can supply their own.

use super::{Error, Result};
use log::{debug, trace};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Timeouts applied while connecting and exchanging data
///
/// `None` means wait forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Limit for establishing the TCP connection
    pub connection: Option<Duration>,
    /// Limit for each read or write
    pub io: Option<Duration>,
    /// Limit for resolving the host name
    pub name_resolver: Option<Duration>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            connection: Some(Duration::from_secs(30)),
            io: Some(Duration::from_secs(30)),
            name_resolver: Some(Duration::from_secs(60)),
        }
    }
}

/// An established connection: one stream per direction
pub struct Connection {
    pub input: Box<dyn Read + Send>,
    pub output: Box<dyn Write + Send>,
}

impl Connection {
    /// Build a connection from separate input and output streams
    pub fn new(input: impl Read + Send + 'static, output: impl Write + Send + 'static) -> Self {
        Connection {
            input: Box::new(input),
            output: Box::new(output),
        }
    }
}

/// Opens connections to servers
pub trait Connector: Send + Sync {
    /// Connect to `host:port` within the given timeouts
    fn connect(&self, host: &str, port: u16, timeouts: &Timeouts) -> Result<Connection>;
}

/// Plain TCP connector
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        TcpConnector
    }

    /// Resolve a host name, giving up after `timeout`
    ///
    /// Literal addresses skip the resolver.
    fn resolve(host: &str, port: u16, timeout: Option<Duration>) -> Result<SocketAddr> {
        let literal = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = literal.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, port));
        }

        let name = host.to_string();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = (name.as_str(), port)
                .to_socket_addrs()
                .map(|mut addrs| addrs.next());
            // the receiver may have timed out already
            let _ = tx.send(result);
        });

        let received = match timeout {
            Some(timeout) => rx.recv_timeout(timeout).map_err(|err| match err {
                mpsc::RecvTimeoutError::Timeout => Error::Timeout,
                mpsc::RecvTimeoutError::Disconnected => {
                    Error::NameResolution(format!("{}: resolver thread exited", host))
                }
            })?,
            None => rx
                .recv()
                .map_err(|_| Error::NameResolution(format!("{}: resolver thread exited", host)))?,
        };

        match received {
            Ok(Some(addr)) => Ok(addr),
            Ok(None) => Err(Error::NameResolution(format!("{}: no addresses", host))),
            Err(err) => Err(Error::NameResolution(format!("{}: {}", host, err))),
        }
    }
}

impl Connector for TcpConnector {
    fn connect(&self, host: &str, port: u16, timeouts: &Timeouts) -> Result<Connection> {
        let addr = Self::resolve(host, port, timeouts.name_resolver)?;
        debug!("connecting to {} ({}:{})", addr, host, port);

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        let target = SockAddr::from(addr);
        let connected = match timeouts.connection {
            Some(timeout) => socket.connect_timeout(&target, timeout),
            None => socket.connect(&target),
        };
        if let Err(err) = connected {
            return Err(match err.kind() {
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
                _ => Error::ConnectionFailed(format!("{}: {}", addr, err)),
            });
        }

        socket.set_nodelay(true)?;
        socket.set_read_timeout(timeouts.io)?;
        socket.set_write_timeout(timeouts.io)?;

        let stream: TcpStream = socket.into();
        trace!("connected, local address {:?}", stream.local_addr().ok());

        let input = stream.try_clone()?;
        Ok(Connection::new(input, stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_connect_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let mut connection = TcpConnector::new()
            .connect("127.0.0.1", addr.port(), &Timeouts::default())
            .unwrap();
        connection.output.write_all(b"ping").unwrap();
        connection.output.flush().unwrap();

        let mut buf = [0u8; 4];
        connection.input.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        handle.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // grab a free port, then close it
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = TcpConnector::new().connect("127.0.0.1", port, &Timeouts::default());
        assert!(matches!(result, Err(Error::ConnectionFailed(_))));
    }

    #[test]
    fn test_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let _handle = thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(2));
        });

        let timeouts = Timeouts {
            io: Some(Duration::from_millis(100)),
            ..Timeouts::default()
        };
        let mut connection = TcpConnector::new()
            .connect("127.0.0.1", addr.port(), &timeouts)
            .unwrap();

        let mut buf = [0u8; 10];
        let err = Error::from(connection.input.read(&mut buf).unwrap_err());
        assert!(err.is_timeout());
    }

    #[test]
    fn test_resolve_literal() {
        let addr = TcpConnector::resolve("[::1]", 8080, None).unwrap();
        assert_eq!(addr, "[::1]:8080".parse().unwrap());
    }

    #[test]
    fn test_resolve_unknown_host() {
        let result = TcpConnector::resolve("no-such-host.invalid", 80, Some(Duration::from_secs(10)));
        assert!(matches!(
            result,
            Err(Error::NameResolution(_)) | Err(Error::Timeout)
        ));
    }
}
