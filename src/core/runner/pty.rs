//! Pseudo-terminal allocation for children whose output targets a terminal.

use std::fs::File;
use std::io;
use std::os::fd::{FromRawFd, OwnedFd};

/// Both ends of a freshly opened pseudo-terminal.
pub struct Pty {
    /// Parent side; reading it yields everything the child writes.
    pub master: File,
    /// Child side; handed to the child as stdout and stderr.
    pub slave: OwnedFd,
}

/// Open a pty sized like the orchestrator's own terminal (80x24 if unknown).
pub fn open() -> io::Result<Pty> {
    let mut master: libc::c_int = -1;
    let mut slave: libc::c_int = -1;
    let mut size = terminal_size();

    let rc = unsafe {
        libc::openpty(
            &mut master,
            &mut slave,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            &mut size,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: openpty succeeded, so both descriptors are open and owned by us.
    let master = unsafe { OwnedFd::from_raw_fd(master) };
    let slave = unsafe { OwnedFd::from_raw_fd(slave) };

    set_cloexec(&master)?;
    // The child receives the slave only through the dup2'd stdout and stderr.
    set_cloexec(&slave)?;

    Ok(Pty {
        master: File::from(master),
        slave,
    })
}

fn terminal_size() -> libc::winsize {
    let mut size = libc::winsize {
        ws_row: 24,
        ws_col: 80,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut size) };
    if rc != 0 || size.ws_col == 0 || size.ws_row == 0 {
        size.ws_row = 24;
        size.ws_col = 80;
    }

    size
}

fn set_cloexec(fd: &OwnedFd) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let raw = fd.as_raw_fd();
    let flags = unsafe { libc::fcntl(raw, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(raw, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
