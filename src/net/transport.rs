use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const READ_WRITE_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_FRAME_LEN: u32 = 65_535;

#[derive(Debug)]
pub enum TransportError {
    ConnectTimeout,
    ConnectRefused,
    ReadTimeout,
    Io(io::Error),
    CorruptFrame(u32),
}

/// Opens a TCP connection to a peer, applying the 3 s connect deadline.
///
/// `TcpStream::connect_timeout` performs the non-blocking-connect-then-poll
/// dance internally, which is exactly the sequence this needs.
pub fn create_connection(ip: Ipv4Addr, port: u16) -> Result<TcpStream, TransportError> {
    let addr = SocketAddr::V4(SocketAddrV4::new(ip, port));
    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(|err| {
        match err.kind() {
            io::ErrorKind::TimedOut => TransportError::ConnectTimeout,
            io::ErrorKind::ConnectionRefused => TransportError::ConnectRefused,
            _ => TransportError::Io(err),
        }
    })?;
    stream
        .set_read_timeout(Some(READ_WRITE_TIMEOUT))
        .map_err(TransportError::Io)?;
    stream
        .set_write_timeout(Some(READ_WRITE_TIMEOUT))
        .map_err(TransportError::Io)?;
    Ok(stream)
}

pub fn send_data(stream: &mut TcpStream, bytes: &[u8]) -> Result<(), TransportError> {
    stream.write_all(bytes).map_err(TransportError::Io)
}

/// Reads one length-prefixed frame: 4-byte BE length, then that many bytes.
/// A zero length is a keep-alive and yields an empty `Vec`.
pub fn receive_frame(stream: &mut TcpStream) -> Result<Vec<u8>, TransportError> {
    let mut len_bytes = [0u8; 4];
    read_exact_with_timeout(stream, &mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes);

    if len > MAX_FRAME_LEN {
        return Err(TransportError::CorruptFrame(len));
    }
    if len == 0 {
        return Ok(Vec::new());
    }

    let mut payload = vec![0u8; len as usize];
    read_exact_with_timeout(stream, &mut payload)?;
    Ok(payload)
}

/// Reads exactly `buf.len()` bytes, honoring the per-read timeout set on the
/// stream at connection time.
pub fn receive_exact(stream: &mut TcpStream, buf: &mut [u8]) -> Result<(), TransportError> {
    read_exact_with_timeout(stream, buf)
}

fn read_exact_with_timeout(stream: &mut TcpStream, buf: &mut [u8]) -> Result<(), TransportError> {
    stream.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::ReadTimeout,
        _ => TransportError::Io(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn rejects_oversized_frame_as_corrupt() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(&(MAX_FRAME_LEN + 1).to_be_bytes()).unwrap();
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(READ_WRITE_TIMEOUT)).unwrap();
        let result = receive_frame(&mut stream);
        handle.join().unwrap();

        assert!(matches!(result, Err(TransportError::CorruptFrame(_))));
    }

    #[test]
    fn reads_a_keep_alive_as_an_empty_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(&0u32.to_be_bytes()).unwrap();
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(READ_WRITE_TIMEOUT)).unwrap();
        let frame = receive_frame(&mut stream).unwrap();
        handle.join().unwrap();

        assert!(frame.is_empty());
    }

    #[test]
    fn reads_a_framed_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(&3u32.to_be_bytes()).unwrap();
            socket.write_all(&[1, 2, 3]).unwrap();
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(READ_WRITE_TIMEOUT)).unwrap();
        let frame = receive_frame(&mut stream).unwrap();
        handle.join().unwrap();

        assert_eq!(frame, vec![1, 2, 3]);
    }
}
