// Named POSIX semaphore wrapper (sem_open family)
// Producer creates with O_CREAT|O_EXCL and falls back to opening on EEXIST;
// consumers open by the names published in the control file.

#[cfg(unix)]
type RawSem = *mut libc::sem_t;
#[cfg(not(unix))]
type RawSem = *mut core::ffi::c_void;

/// An open reference to a named kernel semaphore.
///
/// The name lives in the system namespace independently of any process;
/// dropping this handle closes the reference but does not remove the name.
/// Use [`NamedSemaphore::unlink`] to remove it.
pub struct NamedSemaphore {
    sem: RawSem,
}

unsafe impl Send for NamedSemaphore {}

#[cfg(unix)]
mod posix {
    use super::NamedSemaphore;
    use std::ffi::CString;
    use std::io;
    use std::ptr;
    use std::time::Duration;

    fn c_name(name: &str) -> io::Result<CString> {
        CString::new(name)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "semaphore name contains NUL"))
    }

    impl NamedSemaphore {
        /// Atomically create the named semaphore with `initial` tokens, or
        /// open the existing one when the name is already taken.
        pub fn create_exclusive(name: &str, initial: u32) -> io::Result<Self> {
            let cname = c_name(name)?;
            let sem = unsafe {
                libc::sem_open(
                    cname.as_ptr(),
                    libc::O_CREAT | libc::O_EXCL,
                    0o666 as libc::c_uint,
                    initial as libc::c_uint,
                )
            };
            if sem != libc::SEM_FAILED {
                return Ok(Self { sem });
            }
            let e = io::Error::last_os_error();
            if e.raw_os_error() != Some(libc::EEXIST) {
                return Err(e);
            }
            let sem = unsafe { libc::sem_open(cname.as_ptr(), 0) };
            if sem == libc::SEM_FAILED {
                return Err(io::Error::last_os_error());
            }
            Ok(Self { sem })
        }

        /// Open an already-created named semaphore.
        pub fn open(name: &str) -> io::Result<Self> {
            let cname = c_name(name)?;
            let sem = unsafe { libc::sem_open(cname.as_ptr(), 0) };
            if sem == libc::SEM_FAILED {
                return Err(io::Error::last_os_error());
            }
            Ok(Self { sem })
        }

        /// Release one token, waking at most one blocked waiter.
        pub fn post(&self) -> io::Result<()> {
            if unsafe { libc::sem_post(self.sem) } == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        /// Block until a token is available. Fails with `Interrupted` when a
        /// signal cuts the wait short.
        pub fn wait(&self) -> io::Result<()> {
            if unsafe { libc::sem_wait(self.sem) } == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        /// Take a token if one is immediately available.
        /// Returns `Ok(false)` when the semaphore count is zero.
        pub fn try_wait(&self) -> io::Result<bool> {
            if unsafe { libc::sem_trywait(self.sem) } == 0 {
                return Ok(true);
            }
            let e = io::Error::last_os_error();
            if e.raw_os_error() == Some(libc::EAGAIN) {
                return Ok(false);
            }
            Err(e)
        }

        /// Wait up to `timeout` for a token. Returns `Ok(false)` on timeout.
        ///
        /// Linux has sem_timedwait; platforms without it (macOS) get a
        /// trywait-plus-sleep emulation with a 500 microsecond slice.
        #[cfg(target_os = "linux")]
        pub fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
            let mut now: libc::timespec = unsafe { std::mem::zeroed() };
            if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) } == -1 {
                return Err(io::Error::last_os_error());
            }
            let mut abs = libc::timespec {
                tv_sec: now.tv_sec + timeout.as_secs() as libc::time_t,
                tv_nsec: now.tv_nsec + timeout.subsec_nanos() as libc::c_long,
            };
            if abs.tv_nsec >= 1_000_000_000 {
                abs.tv_sec += 1;
                abs.tv_nsec -= 1_000_000_000;
            }
            loop {
                if unsafe { libc::sem_timedwait(self.sem, &abs) } == 0 {
                    return Ok(true);
                }
                let e = io::Error::last_os_error();
                match e.raw_os_error() {
                    Some(libc::ETIMEDOUT) => return Ok(false),
                    Some(libc::EINTR) => continue,
                    _ => return Err(e),
                }
            }
        }

        #[cfg(all(unix, not(target_os = "linux")))]
        pub fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
            const SLICE: Duration = Duration::from_micros(500);
            let mut waited = Duration::ZERO;
            while waited < timeout {
                if self.try_wait()? {
                    return Ok(true);
                }
                std::thread::sleep(SLICE);
                waited += SLICE;
            }
            Ok(false)
        }

        /// Close this reference. Safe to call more than once.
        pub fn close(&mut self) -> io::Result<()> {
            if self.sem.is_null() {
                return Ok(());
            }
            let rc = unsafe { libc::sem_close(self.sem) };
            self.sem = ptr::null_mut();
            if rc == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        /// Remove `name` from the system namespace. Existing references stay
        /// valid; new opens by this name will fail.
        pub fn unlink(name: &str) -> io::Result<()> {
            let cname = c_name(name)?;
            if unsafe { libc::sem_unlink(cname.as_ptr()) } == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
    }
}

#[cfg(not(unix))]
mod unsupported {
    use super::NamedSemaphore;
    use std::io;
    use std::time::Duration;

    fn unsupported<T>() -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "named semaphores are only supported on POSIX platforms",
        ))
    }

    impl NamedSemaphore {
        pub fn create_exclusive(_name: &str, _initial: u32) -> io::Result<Self> {
            unsupported()
        }
        pub fn open(_name: &str) -> io::Result<Self> {
            unsupported()
        }
        pub fn post(&self) -> io::Result<()> {
            unsupported()
        }
        pub fn wait(&self) -> io::Result<()> {
            unsupported()
        }
        pub fn try_wait(&self) -> io::Result<bool> {
            unsupported()
        }
        pub fn wait_timeout(&self, _timeout: Duration) -> io::Result<bool> {
            unsupported()
        }
        pub fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
        pub fn unlink(_name: &str) -> io::Result<()> {
            unsupported()
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
