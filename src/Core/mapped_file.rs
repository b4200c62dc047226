// File-backed shared memory mapping for POSIX platforms
// Uses open/ftruncate + mmap(MAP_SHARED); growth is munmap -> ftruncate -> mmap

/// A filesystem-backed, shared, byte-addressable mapping over an entire file.
///
/// The mapping length always equals the file length at the time it was
/// (re)mapped. `extend_size` re-creates the mapping over the new length;
/// every base pointer previously obtained from `address_rw`/`address_ro`
/// is invalidated by growth and must be re-fetched.
pub struct MappedFile {
    fd: libc::c_int,
    rw_address: *mut u8,
    ro_address: *const u8,
    len: usize,
}

// The mapping is shared between processes by the kernel; moving the owning
// handle to another thread is fine. It is not Sync: callers serialize access.
unsafe impl Send for MappedFile {}

#[cfg(unix)]
mod posix {
    use super::MappedFile;
    use std::ffi::CString;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;
    use std::ptr;

    fn c_path(path: &Path) -> io::Result<CString> {
        CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL byte"))
    }

    fn fd_len(fd: libc::c_int) -> io::Result<usize> {
        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut st) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(st.st_size as usize)
    }

    fn map(fd: libc::c_int, len: usize, writeable: bool) -> io::Result<*mut u8> {
        let prot = if writeable {
            libc::PROT_READ | libc::PROT_WRITE
        } else {
            libc::PROT_READ
        };
        let addr = unsafe { libc::mmap(ptr::null_mut(), len, prot, libc::MAP_SHARED, fd, 0) };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(addr as *mut u8)
    }

    impl MappedFile {
        /// Does `path` name an existing regular file?
        pub fn exists(path: &Path) -> bool {
            path.metadata().map(|m| m.is_file()).unwrap_or(false)
        }

        fn open_and_map(path: &Path, flags: libc::c_int, writeable: bool) -> io::Result<Self> {
            let cpath = c_path(path)?;
            let fd = unsafe { libc::open(cpath.as_ptr(), flags, 0o666 as libc::c_uint) };
            if fd == -1 {
                return Err(io::Error::last_os_error());
            }
            let len = match fd_len(fd) {
                Ok(len) => len,
                Err(e) => {
                    unsafe { libc::close(fd) };
                    return Err(e);
                }
            };
            match map(fd, len, writeable) {
                Ok(addr) => Ok(Self {
                    fd,
                    rw_address: if writeable { addr } else { ptr::null_mut() },
                    ro_address: addr as *const u8,
                    len,
                }),
                Err(e) => {
                    unsafe { libc::close(fd) };
                    Err(e)
                }
            }
        }

        fn create_and_map(path: &Path, size: usize, writeable: bool) -> io::Result<Self> {
            let cpath = c_path(path)?;
            // The file descriptor is always opened read-write so the length
            // can be set; `writeable` controls only the mapping protection.
            let fd = unsafe {
                libc::open(
                    cpath.as_ptr(),
                    libc::O_RDWR | libc::O_CREAT,
                    0o666 as libc::c_uint,
                )
            };
            if fd == -1 {
                return Err(io::Error::last_os_error());
            }
            if unsafe { libc::ftruncate(fd, size as libc::off_t) } == -1 {
                let e = io::Error::last_os_error();
                unsafe { libc::close(fd) };
                return Err(e);
            }
            match map(fd, size, writeable) {
                Ok(addr) => Ok(Self {
                    fd,
                    rw_address: if writeable { addr } else { ptr::null_mut() },
                    ro_address: addr as *const u8,
                    len: size,
                }),
                Err(e) => {
                    unsafe { libc::close(fd) };
                    Err(e)
                }
            }
        }

        /// Open an existing file and map it read-write over its full length.
        pub fn open_rw(path: &Path) -> io::Result<Self> {
            Self::open_and_map(path, libc::O_RDWR, true)
        }

        /// Open an existing file and map it read-only over its full length.
        pub fn open_ro(path: &Path) -> io::Result<Self> {
            Self::open_and_map(path, libc::O_RDONLY, false)
        }

        /// Create (or truncate-and-reuse) a file of exactly `size` bytes and
        /// map it read-write.
        pub fn create_rw(path: &Path, size: usize) -> io::Result<Self> {
            Self::create_and_map(path, size, true)
        }

        /// Create (or truncate-and-reuse) a file of exactly `size` bytes and
        /// map it read-only.
        pub fn create_ro(path: &Path, size: usize) -> io::Result<Self> {
            Self::create_and_map(path, size, false)
        }

        /// Grow the underlying file to `new_size` bytes and remap.
        ///
        /// The previous mapping is flushed and torn down first, so any base
        /// pointer obtained before this call is invalid afterwards. Only
        /// supported for read-write mappings, and `new_size` must not
        /// shrink the file.
        pub fn extend_size(&mut self, new_size: usize) -> io::Result<()> {
            if self.rw_address.is_null() {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "extend_size requires a read-write mapping",
                ));
            }
            if new_size < self.len {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "extend_size cannot shrink the mapping",
                ));
            }
            self.sync()?;
            if unsafe { libc::munmap(self.rw_address as *mut libc::c_void, self.len) } == -1 {
                return Err(io::Error::last_os_error());
            }
            self.rw_address = ptr::null_mut();
            self.ro_address = ptr::null();
            if unsafe { libc::ftruncate(self.fd, new_size as libc::off_t) } == -1 {
                return Err(io::Error::last_os_error());
            }
            let addr = map(self.fd, new_size, true)?;
            self.rw_address = addr;
            self.ro_address = addr as *const u8;
            self.len = new_size;
            Ok(())
        }

        /// Flush the full mapping to disk. No-op for read-only mappings.
        pub fn sync(&self) -> io::Result<()> {
            if self.rw_address.is_null() {
                return Ok(());
            }
            if unsafe {
                libc::msync(
                    self.rw_address as *mut libc::c_void,
                    self.len,
                    libc::MS_SYNC | libc::MS_INVALIDATE,
                )
            } == -1
            {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        /// Flush `bytes` bytes starting at `offset`. The range is widened
        /// down to a page boundary as msync requires. No-op for read-only
        /// mappings.
        pub fn sync_range(&self, offset: usize, bytes: usize) -> io::Result<()> {
            if self.rw_address.is_null() {
                return Ok(());
            }
            if offset + bytes > self.len {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "sync range exceeds mapping",
                ));
            }
            let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
            let aligned_offset = offset & !(page - 1);
            let aligned_bytes = bytes + offset - aligned_offset;
            if unsafe {
                libc::msync(
                    self.rw_address.add(aligned_offset) as *mut libc::c_void,
                    aligned_bytes,
                    libc::MS_SYNC | libc::MS_INVALIDATE,
                )
            } == -1
            {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        /// Flush (if writeable), unmap, and close the file handle.
        /// Safe to call more than once; the second call is a no-op.
        pub fn close(&mut self) -> io::Result<()> {
            if self.ro_address.is_null() {
                // A failed extend can leave the file open with no mapping.
                if self.fd != -1 {
                    unsafe { libc::close(self.fd) };
                    self.fd = -1;
                }
                return Ok(());
            }
            let flush = self.sync();
            if unsafe { libc::munmap(self.ro_address as *mut libc::c_void, self.len) } == -1 {
                return Err(io::Error::last_os_error());
            }
            unsafe { libc::close(self.fd) };
            self.fd = -1;
            self.rw_address = ptr::null_mut();
            self.ro_address = ptr::null();
            self.len = 0;
            flush
        }
    }
}

#[cfg(not(unix))]
mod unsupported {
    use super::MappedFile;
    use std::io;
    use std::path::Path;

    fn unsupported<T>() -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "memory-mapped files are only supported on POSIX platforms",
        ))
    }

    impl MappedFile {
        pub fn exists(_path: &Path) -> bool {
            false
        }
        pub fn open_rw(_path: &Path) -> io::Result<Self> {
            unsupported()
        }
        pub fn open_ro(_path: &Path) -> io::Result<Self> {
            unsupported()
        }
        pub fn create_rw(_path: &Path, _size: usize) -> io::Result<Self> {
            unsupported()
        }
        pub fn create_ro(_path: &Path, _size: usize) -> io::Result<Self> {
            unsupported()
        }
        pub fn extend_size(&mut self, _new_size: usize) -> io::Result<()> {
            unsupported()
        }
        pub fn sync(&self) -> io::Result<()> {
            unsupported()
        }
        pub fn sync_range(&self, _offset: usize, _bytes: usize) -> io::Result<()> {
            unsupported()
        }
        pub fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

impl MappedFile {
    /// True when the mapping was opened or created read-write.
    pub fn is_writeable(&self) -> bool {
        !self.rw_address.is_null()
    }

    /// Read-write base address; null for read-only mappings.
    /// Invalidated by `extend_size` and `close`.
    pub fn address_rw(&self) -> *mut u8 {
        self.rw_address
    }

    /// Read-only base address. Invalidated by `extend_size` and `close`.
    pub fn address_ro(&self) -> *const u8 {
        self.ro_address
    }

    /// Mapped length in bytes (equals the file length at map time).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
