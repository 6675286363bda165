use libc::{c_void, fstat, off_t, pread, pwrite};
use std::io;
use std::os::fd::IntoRawFd;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

/// An owned file descriptor used for positioned I/O and memory mapping.
///
/// A handle created with [`FileHandle::create_scratch`] unlinks its path
/// when dropped, so a scratch file disappears on every exit path, not only
/// after a successful sort.
pub struct FileHandle {
    fd: RawFd,
    path: PathBuf,
    delete_on_drop: bool,
}

impl FileHandle {
    /// Open an existing file for reading and writing.
    pub fn open_rw(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;
        Ok(Self {
            fd: file.into_raw_fd(),
            path: path.as_ref().to_path_buf(),
            delete_on_drop: false,
        })
    }

    /// Open an existing file for reading only.
    pub fn open_readonly(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Ok(Self {
            fd: file.into_raw_fd(),
            path: path.as_ref().to_path_buf(),
            delete_on_drop: false,
        })
    }

    /// Create (or truncate) a file that lives only as long as the handle.
    pub fn create_scratch(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        Ok(Self {
            fd: file.into_raw_fd(),
            path: path.as_ref().to_path_buf(),
            delete_on_drop: true,
        })
    }

    /// Get the raw file descriptor
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file in bytes.
    pub fn size(&self) -> io::Result<u64> {
        let mut stat_buf: libc::stat = unsafe { std::mem::zeroed() };

        let result = unsafe { fstat(self.fd, &mut stat_buf) };

        if result < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(stat_buf.st_size as u64)
        }
    }

    /// Set the file's length, extending or shrinking as needed.
    pub fn truncate(&self, len: u64) -> io::Result<()> {
        let result = unsafe { libc::ftruncate(self.fd, len as off_t) };

        if result < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    /// Positioned read; does not move the file cursor.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let result = unsafe {
            pread(
                self.fd,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                offset as off_t,
            )
        };

        if result < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(result as usize)
        }
    }

    /// Positioned write; does not move the file cursor.
    pub fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        let result = unsafe {
            pwrite(
                self.fd,
                buf.as_ptr() as *const c_void,
                buf.len(),
                offset as off_t,
            )
        };

        if result < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(result as usize)
        }
    }

    /// Read exactly `buf.len()` bytes at `offset`. A zero-length read before
    /// the buffer is full is an unexpected end of file, not success.
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(&mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "end of file before buffer was filled",
                ));
            }
            filled += n;
        }
        Ok(())
    }

    /// Write all of `buf` at `offset`, retrying short writes.
    pub fn write_all_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write_at(&buf[written..], offset + written as u64)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "write returned zero bytes",
                ));
            }
            written += n;
        }
        Ok(())
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if self.delete_on_drop {
            // Unlink the filename from the directory. Errors are ignored
            // here because Drop cannot return a Result and the file may
            // already be gone.
            let _ = std::fs::remove_file(&self.path);
        }

        unsafe {
            libc::close(self.fd);
        }
    }
}
