use std::{
    io, mem,
    os::fd::{AsRawFd, OwnedFd},
};

use libc::{
    packet_mreq, sockaddr_ll, ETH_ALEN, ETH_P_ALL, PACKET_MR_PROMISC, SOL_PACKET, SO_PRIORITY,
};
use log::debug;
use nix::{
    fcntl::{fcntl, FcntlArg, OFlag},
    sys::socket::{socket, AddressFamily, SockFlag, SockProtocol, SockType},
};

use crate::interface::DriverError;

/// Largest frame read off the RX socket, radiotap header included.
const RX_BUFFER: usize = 6000;

const PACKET_IGNORE_OUTGOING: libc::c_int = 23;

fn io_error(context: &str) -> DriverError {
    DriverError::Io(format!("{context}: {}", io::Error::last_os_error()))
}

/// Raw AF_PACKET socket bound to `ifindex` in promiscuous, non-blocking mode.
fn open_packet_socket(ifindex: i32) -> Result<OwnedFd, DriverError> {
    let mut saddr: sockaddr_ll = unsafe { mem::zeroed() };
    let mut mrq: packet_mreq = unsafe { mem::zeroed() };
    let prioval = 20;

    let fd = socket(
        AddressFamily::Packet,
        SockType::Raw,
        SockFlag::SOCK_CLOEXEC,
        SockProtocol::EthAll,
    )
    .map_err(|e| DriverError::Io(e.to_string()))?;

    mrq.mr_ifindex = ifindex;
    mrq.mr_type = PACKET_MR_PROMISC as u16;

    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            SOL_PACKET,
            libc::PACKET_ADD_MEMBERSHIP,
            &mrq as *const _ as *const libc::c_void,
            mem::size_of::<packet_mreq>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(io_error("PACKET_ADD_MEMBERSHIP"));
    }

    unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            SOL_PACKET,
            SO_PRIORITY,
            &prioval as *const _ as *const libc::c_void,
            mem::size_of::<i32>() as libc::socklen_t,
        )
    };

    saddr.sll_family = libc::AF_PACKET as u16;
    saddr.sll_protocol = (ETH_P_ALL as u16).to_be();
    saddr.sll_ifindex = ifindex;
    saddr.sll_halen = ETH_ALEN as u8;

    let bind_ret = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            (&saddr as *const libc::sockaddr_ll).cast(),
            mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if bind_ret < 0 {
        return Err(io_error("bind"));
    }

    let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFL).map_err(|e| DriverError::Io(e.to_string()))?;
    let new_flags = OFlag::from_bits_truncate(flags | OFlag::O_NONBLOCK.bits());
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(new_flags)).map_err(|e| DriverError::Io(e.to_string()))?;

    Ok(fd)
}

pub fn open_socket_tx(ifindex: i32) -> Result<OwnedFd, DriverError> {
    open_packet_socket(ifindex)
}

pub fn open_socket_rx(ifindex: i32) -> Result<OwnedFd, DriverError> {
    let fd = open_packet_socket(ifindex)?;

    // Our own injected frames would otherwise loop back (Linux 4.20+).
    let enable: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            SOL_PACKET,
            PACKET_IGNORE_OUTGOING,
            &enable as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        debug!("PACKET_IGNORE_OUTGOING is not supported by kernel");
    }

    Ok(fd)
}

/// Write one radiotap-framed packet. A full socket buffer is reported as
/// [DriverError::QueueFull].
pub fn write_packet(fd: &OwnedFd, packet: &[u8]) -> Result<(), DriverError> {
    let written = unsafe {
        libc::write(
            fd.as_raw_fd(),
            packet.as_ptr() as *const libc::c_void,
            packet.len(),
        )
    };
    if written < 0 {
        let error = io::Error::last_os_error();
        return match error.raw_os_error() {
            Some(libc::ENOBUFS) | Some(libc::EAGAIN) => Err(DriverError::QueueFull),
            _ => Err(DriverError::Io(error.to_string())),
        };
    }
    Ok(())
}

/// Read one packet. `Ok(None)` when nothing is waiting.
pub fn read_packet(fd: &OwnedFd) -> Result<Option<Vec<u8>>, DriverError> {
    let mut buffer = vec![0u8; RX_BUFFER];
    let len = unsafe {
        libc::read(
            fd.as_raw_fd(),
            buffer.as_mut_ptr() as *mut libc::c_void,
            buffer.len(),
        )
    };
    if len < 0 {
        let error = io::Error::last_os_error();
        if error.kind() == io::ErrorKind::WouldBlock {
            return Ok(None);
        }
        return Err(DriverError::Io(error.to_string()));
    }

    buffer.truncate(len as usize);
    Ok(Some(buffer))
}
