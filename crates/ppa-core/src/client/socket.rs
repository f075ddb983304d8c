//! Socket construction shared by clients and the simulator.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;

/// Create a broadcast-capable UDP socket with SO_REUSEADDR bound to `local`.
///
/// With `interface` set the socket is tied to that device (SO_BINDTODEVICE).
/// Only Linux supports this; elsewhere the binding is skipped with a warning.
pub fn bind_udp(
    local: SocketAddr,
    interface: Option<&str>,
) -> Result<std::net::UdpSocket, std::io::Error> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;

    if let Some(iface) = interface {
        bind_device(&socket, iface)?;
    }

    socket.bind(&local.into())?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

#[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
fn bind_device(socket: &Socket, iface: &str) -> Result<(), std::io::Error> {
    socket.bind_device(Some(iface.as_bytes()))
}

#[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
fn bind_device(_socket: &Socket, iface: &str) -> Result<(), std::io::Error> {
    tracing::warn!(iface, "binding to an interface is not supported on this platform");
    Ok(())
}
