use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use super::error::NetError;
use super::framer::{FrameBuffer, RawFrame};
use super::protocol::{Message, encode_frame};

const READ_CHUNK: usize = 4096;
/// Socket reads per `read_frames` call; whatever is left waits for the next poll.
const MAX_READS_PER_CALL: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub protocol_errors: u64,
}

impl NetworkStats {
    pub fn merge(&mut self, other: &NetworkStats) {
        self.packets_sent += other.packets_sent;
        self.packets_received += other.packets_received;
        self.bytes_sent += other.bytes_sent;
        self.bytes_received += other.bytes_received;
        self.protocol_errors += other.protocol_errors;
    }
}

pub fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(!cfg!(target_os = "windows"))?;
    socket.bind(&addr.into())?;
    socket.listen(16)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

pub fn configure_stream(stream: &TcpStream) -> io::Result<()> {
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)?;
    Ok(())
}

pub fn resolve(host: &str, port: u16) -> Result<SocketAddr, NetError> {
    if host.trim().is_empty() {
        return Err(NetError::Resolve(String::from("empty host name")));
    }
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| NetError::Resolve(format!("{}:{}: {}", host, port, e)))?;
    addrs
        .next()
        .ok_or_else(|| NetError::Resolve(format!("{}:{}: no addresses", host, port)))
}

fn is_in_progress(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    #[cfg(unix)]
    if e.raw_os_error() == Some(libc::EINPROGRESS) {
        return true;
    }
    false
}

/// An outbound non-blocking connect that has not completed yet.
#[derive(Debug)]
pub struct PendingConnect {
    socket: Socket,
    addr: SocketAddr,
}

impl PendingConnect {
    pub fn start(addr: SocketAddr) -> io::Result<Self> {
        let domain = if addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nonblocking(true)?;
        socket.set_nodelay(true)?;

        match socket.connect(&SockAddr::from(addr)) {
            Ok(()) => {}
            Err(ref e) if is_in_progress(e) => {}
            Err(e) => return Err(e),
        }

        Ok(Self { socket, addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Checks whether the socket became writable. Returns the connected
    /// stream once the handshake finished, `Ok(None)` while still pending,
    /// and the socket-level error if the attempt failed.
    pub fn poll(&self) -> io::Result<Option<TcpStream>> {
        if let Some(e) = self.socket.take_error()? {
            return Err(e);
        }
        match self.socket.peer_addr() {
            Ok(_) => {
                let stream: TcpStream = self.socket.try_clone()?.into();
                configure_stream(&stream)?;
                Ok(Some(stream))
            }
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReadOutcome {
    pub frames: Vec<RawFrame>,
    pub closed: bool,
    pub error: Option<NetError>,
}

/// A framed, non-blocking TCP stream with its own receive and send buffers.
#[derive(Debug)]
pub struct StreamEndpoint {
    stream: TcpStream,
    peer_addr: SocketAddr,
    recv: FrameBuffer,
    send: Vec<u8>,
    send_sequence: u32,
    max_send_buffer: usize,
    stats: NetworkStats,
}

impl StreamEndpoint {
    pub fn new(stream: TcpStream, max_send_buffer: usize) -> io::Result<Self> {
        configure_stream(&stream)?;
        let peer_addr = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer_addr,
            recv: FrameBuffer::new(),
            send: Vec::new(),
            send_sequence: 0,
            max_send_buffer,
            stats: NetworkStats::default(),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn buffered_recv(&self) -> usize {
        self.recv.len()
    }

    /// Encodes `message` with the next sequence number and queues it.
    pub fn queue(&mut self, message: &Message) -> Result<(), NetError> {
        let bytes = encode_frame(message, self.send_sequence)?;
        if self.send.len() + bytes.len() > self.max_send_buffer {
            return Err(NetError::SendOverflow(self.send.len() + bytes.len()));
        }
        self.send_sequence = self.send_sequence.wrapping_add(1);
        self.send.extend_from_slice(&bytes);
        self.stats.packets_sent += 1;
        Ok(())
    }

    pub fn send(&mut self, message: &Message) -> Result<(), NetError> {
        self.queue(message)?;
        self.flush()?;
        Ok(())
    }

    /// Writes as much queued data as the socket accepts without blocking.
    pub fn flush(&mut self) -> io::Result<()> {
        while !self.send.is_empty() {
            match self.stream.write(&self.send) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "socket closed")),
                Ok(n) => {
                    self.send.drain(..n);
                    self.stats.bytes_sent += n as u64;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Reads what is available, up to a fixed number of socket reads.
    /// Complete frames come back in arrival order even when the stream ended
    /// or failed after them.
    pub fn read_frames(&mut self) -> ReadOutcome {
        let mut outcome = ReadOutcome::default();
        let mut chunk = [0u8; READ_CHUNK];

        for _ in 0..MAX_READS_PER_CALL {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    outcome.closed = true;
                    break;
                }
                Ok(n) => {
                    self.stats.bytes_received += n as u64;
                    self.recv.extend(&chunk[..n]);
                    if let Err(e) = self.drain_frames(&mut outcome.frames) {
                        outcome.error = Some(e);
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    outcome.error = Some(e.into());
                    break;
                }
            }
        }

        outcome
    }

    fn drain_frames(&mut self, out: &mut Vec<RawFrame>) -> Result<(), NetError> {
        for frame in self.recv.frames() {
            match frame {
                Ok(frame) => {
                    self.stats.packets_received += 1;
                    out.push(frame);
                }
                Err(e) => {
                    self.stats.protocol_errors += 1;
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    pub fn shutdown(&mut self) {
        let _ = self.flush();
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
        self.recv.clear();
        self.send.clear();
    }
}
