/// TCP socket setup shared by both ends of the stream.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use socket2::{Domain, Protocol, SockRef, Socket, Type};

/// 4 MB socket buffers for throughput.
pub const SOCKET_BUF_SIZE: usize = 4 * 1024 * 1024;

/// Pending connections queued by the listener.
pub const LISTEN_BACKLOG: i32 = 10;

/// Bind a listener with `SO_REUSEADDR` so a restarted server can rebind
/// while old connections sit in TIME_WAIT.
pub fn bind_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let sock = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    sock.set_reuse_address(true)?;
    sock.bind(&addr.into())?;
    sock.listen(LISTEN_BACKLOG)?;
    Ok(sock.into())
}

/// Connect to a sender. `read_timeout` bounds each blocking read so the
/// receiver can check its stop signal while the connection is idle.
pub fn connect(addr: SocketAddr, read_timeout: Option<Duration>) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(addr)?;
    tune_stream(&stream)?;
    stream.set_read_timeout(read_timeout)?;
    Ok(stream)
}

/// Set socket options for throughput.
pub fn tune_stream(stream: &TcpStream) -> io::Result<()> {
    let sock_ref = SockRef::from(stream);
    sock_ref.set_nodelay(true)?;
    sock_ref.set_send_buffer_size(SOCKET_BUF_SIZE)?;
    sock_ref.set_recv_buffer_size(SOCKET_BUF_SIZE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_and_connect() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let client = connect(addr, Some(Duration::from_millis(50))).unwrap();
        let (server, _) = listener.accept().unwrap();
        tune_stream(&server).unwrap();

        assert!(client.nodelay().unwrap());
        // The kernel rounds the timeout up to its timer tick.
        let timeout = client.read_timeout().unwrap().expect("read timeout set");
        assert!(timeout >= Duration::from_millis(50), "got {:?}", timeout);
        assert!(timeout < Duration::from_millis(100), "got {:?}", timeout);
    }
}
