//! Single-instance guard.
//!
//! Telegram allows one long-poller per bot token; a second process would
//! fight the first over `getUpdates`. The guard is taken before the channel
//! starts and held for the life of the process.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;

use crate::config::LockConfig;
use crate::error::StartupError;

/// A way of claiming the bot's transport exclusively.
pub trait StartupGuard: Send + Sync {
    /// Take the lock, failing with `TransportConflict` if another
    /// instance holds it.
    fn acquire(&self) -> Result<InstanceLock, StartupError>;

    /// Human-readable lock location for logs.
    fn describe(&self) -> String;
}

/// Build the guard selected by configuration.
pub fn from_config(config: &LockConfig) -> Box<dyn StartupGuard> {
    match config {
        LockConfig::File(path) => Box::new(FileLockGuard::new(path.clone())),
        LockConfig::Socket(name) => Box::new(AbstractSocketGuard::new(name.clone())),
    }
}

/// Held lock. Released when dropped (or when the process exits).
#[derive(Debug)]
pub struct InstanceLock {
    resource: String,
    _held: Held,
}

/// Kept only so the lock lives as long as the `InstanceLock`.
#[derive(Debug)]
enum Held {
    File { _file: File },
    Socket { _listener: UnixListener },
}

impl InstanceLock {
    pub fn resource(&self) -> &str {
        &self.resource
    }
}

// ── flock ───────────────────────────────────────────────────────────

/// Exclusive, non-blocking `flock` on a file. The holder's pid is written
/// into the file for operators.
pub struct FileLockGuard {
    path: PathBuf,
}

impl FileLockGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StartupGuard for FileLockGuard {
    fn acquire(&self) -> Result<InstanceLock, StartupError> {
        let resource = self.describe();
        let lock_err = |source: io::Error| StartupError::Lock {
            resource: resource.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(lock_err)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(lock_err)?;

        // SAFETY: the descriptor is owned by `file` and open for the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                let resource = match holder_pid(&mut file) {
                    Some(pid) => format!("{resource} (pid {pid})"),
                    None => resource.clone(),
                };
                return Err(StartupError::TransportConflict { resource });
            }
            return Err(lock_err(err));
        }

        write_pid(&mut file).map_err(lock_err)?;

        Ok(InstanceLock {
            resource,
            _held: Held::File { _file: file },
        })
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

fn write_pid(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()
}

fn holder_pid(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

// ── abstract socket ─────────────────────────────────────────────────

/// Bind a Linux abstract-namespace unix socket. The kernel frees the name
/// when the process dies, so there is no stale lock to clean up.
pub struct AbstractSocketGuard {
    name: String,
}

impl AbstractSocketGuard {
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

impl StartupGuard for AbstractSocketGuard {
    fn acquire(&self) -> Result<InstanceLock, StartupError> {
        let resource = self.describe();
        match bind_abstract(&self.name) {
            Ok(listener) => Ok(InstanceLock {
                resource,
                _held: Held::Socket {
                    _listener: listener,
                },
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                Err(StartupError::TransportConflict { resource })
            }
            Err(source) => Err(StartupError::Lock { resource, source }),
        }
    }

    fn describe(&self) -> String {
        format!("abstract socket @{}", self.name)
    }
}

#[cfg(target_os = "linux")]
fn bind_abstract(name: &str) -> io::Result<UnixListener> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::SocketAddr;

    let addr = SocketAddr::from_abstract_name(name.as_bytes())?;
    UnixListener::bind_addr(&addr)
}

#[cfg(not(target_os = "linux"))]
fn bind_abstract(_name: &str) -> io::Result<UnixListener> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "abstract unix sockets are Linux-only; use a file lock",
    ))
}
