//! Pseudo-terminal allocation.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Both ends of a freshly opened pseudo-terminal.
pub(crate) struct Pty {
    /// Non-blocking master, read by the supervisor.
    pub master: File,
    /// Slave, handed to the child as stdout and stderr.
    pub slave: OwnedFd,
}

/// Opens a pty whose master is non-blocking and whose descriptors are not
/// inherited across exec (the child only receives the slave through its
/// stdio redirections).
pub(crate) fn open() -> io::Result<Pty> {
    let mut master: libc::c_int = -1;
    let mut slave: libc::c_int = -1;

    // SAFETY: openpty only writes the two descriptor out-parameters; the
    // name, termios and winsize arguments are documented as optional.
    let rc = unsafe {
        libc::openpty(
            &mut master,
            &mut slave,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: on success both descriptors are open and owned by nobody else.
    let (master, slave) = unsafe { (OwnedFd::from_raw_fd(master), OwnedFd::from_raw_fd(slave)) };

    set_cloexec(master.as_raw_fd())?;
    set_cloexec(slave.as_raw_fd())?;
    set_nonblocking(master.as_raw_fd())?;

    Ok(Pty {
        master: File::from(master),
        slave,
    })
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl on a descriptor we own; F_GETFL/F_SETFL take no pointers.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    // SAFETY: as above, F_GETFD/F_SETFD take no pointers.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Reading a pty master whose slave side has been closed fails with EIO on
/// Linux instead of returning end-of-file.
pub(crate) fn is_hangup(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_open_pty_master_is_nonblocking() {
        let pty = open().unwrap();
        let mut buf = [0u8; 16];
        let err = (&pty.master).read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_slave_writes_reach_master() {
        let pty = open().unwrap();
        let mut slave = File::from(pty.slave);
        slave.write_all(b"hi\n").unwrap();
        slave.flush().unwrap();

        let mut out = Vec::new();
        let mut buf = [0u8; 16];
        for _ in 0..100 {
            match (&pty.master).read(&mut buf) {
                Ok(n) => {
                    out.extend_from_slice(&buf[..n]);
                    if out.ends_with(b"\n") {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
                Err(e) => panic!("unexpected read error: {e}"),
            }
        }
        // The line discipline translates "\n" to "\r\n".
        assert_eq!(out, b"hi\r\n");
    }
}
