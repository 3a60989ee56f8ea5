//! Trace stream transport for the hosted port
//!
//! With the `trace` feature the queue's binary records are drained from the
//! global trace buffer and sent as raw HDLC bytes to any `Write` sink or a
//! UDP listener. Without it every function is a no-op.

use std::io;
use std::net::{ToSocketAddrs, UdpSocket};

/// Bytes moved per `read` from the trace buffer
#[cfg(feature = "trace")]
const CHUNK: usize = 512;

/// Reset the trace buffer, enable the record types in `mask` and announce
/// the target
#[cfg(feature = "trace")]
pub fn enable(mask: u32, target_name: &str) {
    evq_trace::init();
    evq_trace::global_filter_mask(mask);
    evq_trace::target_info(target_name);
}

#[cfg(not(feature = "trace"))]
pub fn enable(_mask: u32, _target_name: &str) {
    log::debug!("trace support not compiled in (enable the `trace` feature)");
}

/// Move every buffered trace byte into `out`
#[cfg(feature = "trace")]
pub fn flush_to<W: io::Write>(out: &mut W) -> io::Result<usize> {
    let mut chunk = [0u8; CHUNK];
    let mut total = 0;
    loop {
        let n = evq_trace::read(&mut chunk);
        if n == 0 {
            break;
        }
        out.write_all(&chunk[..n])?;
        total += n;
    }
    out.flush()?;
    Ok(total)
}

#[cfg(not(feature = "trace"))]
pub fn flush_to<W: io::Write>(_out: &mut W) -> io::Result<usize> {
    Ok(0)
}

/// Trace sink sending datagrams to a listening decoder
pub struct UdpSink {
    socket: UdpSocket,
}

impl UdpSink {
    /// Bind an ephemeral local port and connect it to `addr`
    pub fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.connect(addr)?;
        Ok(Self { socket })
    }

    /// Send everything buffered, one datagram per chunk
    pub fn flush(&self) -> io::Result<usize> {
        flush_to(&mut DatagramWriter(&self.socket))
    }
}

struct DatagramWriter<'a>(&'a UdpSocket);

impl io::Write for DatagramWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
