use std::io::ErrorKind;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::IpcStream;

/// Where the daemon listens unless configured otherwise.
pub const DEFAULT_SOCKET_PATH: &str = "/run/portod.socket";

/// `sockaddr_un.sun_path` is 108 bytes on Linux, 104 on macOS and the BSDs.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

fn check_path_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}

/// NUL-terminated socket address for `path`. The length must already have
/// been checked.
fn socket_addr(path: &Path) -> std::io::Result<(libc::sockaddr_un, libc::socklen_t)> {
    let bytes = path.as_os_str().as_bytes();
    if bytes.contains(&0) {
        return Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            "socket path contains a NUL byte",
        ));
    }

    // SAFETY: sockaddr_un is plain old data; all-zero is a valid value.
    let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
    for (dst, src) in addr.sun_path.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }
    let len = std::mem::size_of::<libc::sockaddr_un>() as libc::socklen_t;
    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    {
        addr.sun_len = len as u8;
    }
    Ok((addr, len))
}

/// A fresh, unconnected stream socket.
fn stream_socket() -> std::io::Result<OwnedFd> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let kind = libc::SOCK_STREAM | libc::SOCK_CLOEXEC;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let kind = libc::SOCK_STREAM;

    // SAFETY: socket(2) has no memory arguments; the result is checked below.
    let fd = unsafe { libc::socket(libc::AF_UNIX, kind, 0) };
    if fd < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: `fd` was just created and is owned by nothing else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Open a close-on-exec stream connection to the socket at `path`.
///
/// `timeout` bounds the connect itself (a daemon with a full accept
/// backlog makes it wait) and is left applied to reads and writes. `None`
/// blocks indefinitely.
pub fn connect(path: impl AsRef<Path>, timeout: Option<Duration>) -> Result<IpcStream> {
    let path = path.as_ref();
    check_path_len(path)?;

    let connect_err = |source| TransportError::Connect {
        path: path.to_path_buf(),
        source,
    };

    let (addr, len) = socket_addr(path).map_err(connect_err)?;
    let stream = UnixStream::from(stream_socket().map_err(connect_err)?);
    // SO_SNDTIMEO also limits how long connect(2) waits for backlog room.
    stream.set_write_timeout(timeout).map_err(connect_err)?;
    stream.set_read_timeout(timeout).map_err(connect_err)?;

    loop {
        // SAFETY: `addr` is a valid sockaddr_un of `len` bytes and the fd is
        // an open socket owned by `stream`.
        let rc = unsafe {
            libc::connect(
                stream.as_raw_fd(),
                (&addr as *const libc::sockaddr_un).cast::<libc::sockaddr>(),
                len,
            )
        };
        if rc == 0 {
            break;
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != ErrorKind::Interrupted {
            return Err(connect_err(err));
        }
    }

    let stream = IpcStream::from_unix(stream);
    stream.set_cloexec()?;

    debug!(?path, ?timeout, "connected to unix domain socket");
    Ok(stream)
}

/// Listening side of a filesystem-path Unix socket.
///
/// The socket file is removed on drop, unless something else has replaced
/// it in the meantime.
pub struct LocalListener {
    listener: UnixListener,
    path: PathBuf,
    identity: (u64, u64),
}

impl LocalListener {
    /// Permission mode applied to the socket file.
    pub const SOCKET_MODE: u32 = 0o600;

    /// Bind at `path`, replacing a stale socket file but nothing else.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with(path.as_ref(), |path| UnixListener::bind(path))
    }

    /// Like [`LocalListener::bind`], with an explicit accept backlog.
    pub fn bind_with_backlog(path: impl AsRef<Path>, backlog: u32) -> Result<Self> {
        let backlog = libc::c_int::try_from(backlog).unwrap_or(libc::c_int::MAX);
        Self::bind_with(path.as_ref(), |path| {
            let (addr, len) = socket_addr(path)?;
            let fd = stream_socket()?;
            let addr_ptr = (&addr as *const libc::sockaddr_un).cast::<libc::sockaddr>();
            // SAFETY: `addr` is a valid sockaddr_un of `len` bytes and `fd` is
            // an open socket.
            if unsafe { libc::bind(fd.as_raw_fd(), addr_ptr, len) } < 0 {
                return Err(std::io::Error::last_os_error());
            }
            // SAFETY: `fd` is an open, bound socket.
            if unsafe { libc::listen(fd.as_raw_fd(), backlog) } < 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(UnixListener::from(fd))
        })
    }

    fn bind_with(
        path: &Path,
        open: impl FnOnce(&Path) -> std::io::Result<UnixListener>,
    ) -> Result<Self> {
        let path = path.to_path_buf();
        check_path_len(&path)?;

        let bind_err = |source| TransportError::Bind {
            path: path.clone(),
            source,
        };

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = open(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(Self::SOCKET_MODE))
            .map_err(bind_err)?;
        let metadata = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        debug!(?path, "listening on unix domain socket");
        Ok(Self {
            listener,
            identity: (metadata.dev(), metadata.ino()),
            path,
        })
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<IpcStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted connection");
        Ok(IpcStream::from_unix(stream))
    }

    /// The path this listener is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LocalListener {
    fn drop(&mut self) {
        let Ok(metadata) = std::fs::symlink_metadata(&self.path) else {
            return;
        };
        if metadata.file_type().is_socket() && (metadata.dev(), metadata.ino()) == self.identity {
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path replaced; skipping cleanup");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "portwire-uds-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn connect_to_listener() {
        let dir = temp_dir("connect");
        let sock_path = dir.join("daemon.sock");
        let listener = LocalListener::bind(&sock_path).unwrap();

        let path_clone = sock_path.clone();
        let client = std::thread::spawn(move || {
            let mut stream = connect(&path_clone, Some(Duration::from_secs(5))).unwrap();
            assert!(stream.is_cloexec());
            stream.write_all(b"hello").unwrap();
        });

        let mut server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        client.join().unwrap();

        drop(listener);
        assert!(!sock_path.exists(), "socket file should be removed on drop");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn connect_times_out_on_full_backlog() {
        let dir = temp_dir("backlog");
        let sock_path = dir.join("daemon.sock");
        let _listener = LocalListener::bind_with_backlog(&sock_path, 0).unwrap();

        // Nothing is ever accepted, so the queue fills after a connection or two.
        let timeout = Duration::from_millis(200);
        let mut pending = Vec::new();
        let err = loop {
            let started = std::time::Instant::now();
            match connect(&sock_path, Some(timeout)) {
                Ok(stream) => {
                    assert!(pending.len() < 8, "backlog never filled");
                    pending.push(stream);
                }
                Err(err) => {
                    assert!(
                        started.elapsed() < Duration::from_secs(2),
                        "connect ignored its timeout"
                    );
                    break err;
                }
            }
        };
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn connect_applies_timeout_to_the_stream() {
        let dir = temp_dir("stream-timeout");
        let sock_path = dir.join("daemon.sock");
        let listener = LocalListener::bind_with_backlog(&sock_path, 4).unwrap();

        let stream = connect(&sock_path, Some(Duration::from_millis(300))).unwrap();
        assert!(stream.is_cloexec());
        assert_eq!(
            stream.read_timeout().unwrap(),
            Some(Duration::from_millis(300))
        );
        let _server = listener.accept().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn connect_missing_socket_fails() {
        let dir = temp_dir("missing");
        let err = connect(dir.join("nobody.sock"), None).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(!err.is_timeout());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn path_too_long_is_rejected() {
        let long_path = "/tmp/".to_string() + &"p".repeat(200) + ".sock";
        assert!(matches!(
            connect(&long_path, None),
            Err(TransportError::PathTooLong { .. })
        ));
        assert!(matches!(
            LocalListener::bind(&long_path),
            Err(TransportError::PathTooLong { .. })
        ));
    }

    #[test]
    fn bind_refuses_to_replace_regular_file() {
        let dir = temp_dir("regular");
        let sock_path = dir.join("not-a-socket");
        std::fs::write(&sock_path, b"data").unwrap();

        let result = LocalListener::bind(&sock_path);
        assert!(matches!(result, Err(TransportError::Bind { .. })));
        assert!(sock_path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bind_replaces_stale_socket() {
        let dir = temp_dir("stale");
        let sock_path = dir.join("daemon.sock");
        let first = LocalListener::bind(&sock_path).unwrap();
        std::mem::forget(first);

        let second = LocalListener::bind(&sock_path).unwrap();
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, LocalListener::SOCKET_MODE);
        drop(second);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
