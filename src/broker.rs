//! Data connection broker.
//!
//! Turns "move one payload out of band" into a rendezvous: the offering side
//! binds an ephemeral port and advertises `<ip>,<port>` over the control
//! channel, the other side dials it, and exactly one connection is accepted.
//!
//! Ownership carries the cleanup. [`DataListener::accept`] consumes the
//! listener so it is closed as soon as the first peer is in, and the returned
//! [`DataConnection`] closes its socket when dropped, on every exit path.

use bytes::Bytes;
use std::io;
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::str::FromStr;
use tracing::{debug, trace};

use crate::error::{Error, ProtocolError, Result};
use crate::frame;

/// Pending connections allowed on a data listener.
const DATA_BACKLOG: i32 = 1;

/// `<ip>,<port>` telling the peer where to dial for the data phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advertisement {
    pub addr: SocketAddrV4,
}

impl std::fmt::Display for Advertisement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.addr.ip(), self.addr.port())
    }
}

impl FromStr for Advertisement {
    type Err = ProtocolError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (ip, port) = s
            .split_once(',')
            .ok_or_else(|| ProtocolError::BadAdvertisement(s.to_string()))?;
        let ip: Ipv4Addr = ip
            .trim()
            .parse()
            .map_err(|_| ProtocolError::BadAdvertisement(format!("invalid address '{}'", ip)))?;
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| ProtocolError::BadAdvertisement(format!("invalid port '{}'", port)))?;
        Ok(Advertisement {
            addr: SocketAddrV4::new(ip, port),
        })
    }
}

/// Listening half of a data session.
#[derive(Debug)]
pub struct DataListener {
    listener: TcpListener,
    advertisement: Advertisement,
}

/// Bind an ephemeral data listener on `ip` and build its advertisement.
pub fn offer(ip: Ipv4Addr) -> Result<DataListener> {
    let addr = SocketAddr::V4(SocketAddrV4::new(ip, 0));
    let listener = create_listener(addr).map_err(|source| Error::Bind { addr, source })?;
    let local = listener
        .local_addr()
        .map_err(|source| Error::Bind { addr, source })?;
    let port = local.port();

    let advertisement = Advertisement {
        addr: SocketAddrV4::new(ip, port),
    };
    debug!(endpoint = %advertisement, "Data listener ready");

    Ok(DataListener {
        listener,
        advertisement,
    })
}

impl DataListener {
    pub fn advertisement(&self) -> Advertisement {
        self.advertisement
    }

    /// Block until one peer connects. The listener is closed on return.
    pub fn accept(self) -> Result<DataConnection> {
        let (stream, peer) = self.listener.accept().map_err(Error::data)?;
        debug!(peer = %peer, endpoint = %self.advertisement, "Data connection accepted");
        Ok(DataConnection { stream, peer })
    }
}

/// Open the outbound half of a data session.
pub fn dial(advertisement: &Advertisement) -> Result<DataConnection> {
    let addr = SocketAddr::V4(advertisement.addr);
    let stream = TcpStream::connect(addr).map_err(|source| Error::Connect { addr, source })?;
    debug!(endpoint = %advertisement, "Data connection dialed");
    Ok(DataConnection { stream, peer: addr })
}

/// One accepted or dialed data connection, good for a single payload.
#[derive(Debug)]
pub struct DataConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl DataConnection {
    /// Send the payload and close the connection.
    pub fn send(mut self, payload: &[u8]) -> Result<()> {
        frame::send(&mut self.stream, payload).map_err(Error::data)?;
        self.close();
        Ok(())
    }

    /// Receive the payload and close the connection.
    pub fn receive(mut self, buffer_size: usize) -> Result<Bytes> {
        let payload = frame::receive(&mut self.stream, buffer_size).map_err(Error::data)?;
        self.close();
        Ok(payload)
    }

    fn close(self) {
        // the socket is released on drop either way; shutdown tells the peer now
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            trace!(error = %e, "Data connection shutdown");
        }
        debug!(peer = %self.peer, "Data connection closed");
    }
}

/// Create a blocking TCP listener with an explicit backlog.
pub(crate) fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    create_listener_with_backlog(addr, DATA_BACKLOG)
}

pub(crate) fn create_listener_with_backlog(
    addr: SocketAddr,
    backlog: i32,
) -> io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_advertisement_format() {
        let ad = Advertisement {
            addr: SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 40211),
        };
        assert_eq!(ad.to_string(), "127.0.0.1,40211");
        assert_eq!("127.0.0.1,40211".parse::<Advertisement>().unwrap(), ad);
    }

    #[test]
    fn test_bad_advertisement() {
        for bad in [
            "127.0.0.1",
            "127.0.0.1:80",
            "localhost,80",
            "10.0.0.1,70000",
            ",",
            "",
        ] {
            match bad.parse::<Advertisement>() {
                Err(ProtocolError::BadAdvertisement(_)) => {}
                other => panic!("{:?} parsed as {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_offer_uses_ephemeral_port() {
        let listener = offer(Ipv4Addr::LOCALHOST).unwrap();
        let ad = listener.advertisement();
        assert_eq!(*ad.addr.ip(), Ipv4Addr::LOCALHOST);
        assert_ne!(ad.addr.port(), 0);
    }

    #[test]
    fn test_single_transfer() {
        let listener = offer(Ipv4Addr::LOCALHOST).unwrap();
        let ad = listener.advertisement();

        let sender = thread::spawn(move || {
            let conn = dial(&ad).unwrap();
            conn.send(b"payload over the data channel").unwrap();
        });

        let conn = listener.accept().unwrap();
        let got = conn.receive(7).unwrap();
        sender.join().unwrap();
        assert_eq!(&got[..], b"payload over the data channel");
    }

    #[test]
    fn test_listener_closed_after_accept() {
        let listener = offer(Ipv4Addr::LOCALHOST).unwrap();
        let ad = listener.advertisement();

        let first = thread::spawn(move || dial(&ad).unwrap());
        let accepted = listener.accept().unwrap();
        let _dialed = first.join().unwrap();
        drop(accepted);

        match dial(&ad) {
            Err(Error::Connect { .. }) => {}
            other => panic!("second dial should be refused: {:?}", other),
        }
    }

    #[test]
    fn test_dial_refused() {
        // grab a free port, then release it so nothing listens there
        let port = {
            let sock = TcpListener::bind("127.0.0.1:0").unwrap();
            sock.local_addr().unwrap().port()
        };
        let ad = Advertisement {
            addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, port),
        };
        match dial(&ad) {
            Err(Error::Connect { .. }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
