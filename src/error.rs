use thiserror::Error;

/// Errors surfaced by the host services and the LED module.
///
/// Each variant maps onto the errno the equivalent kernel call would
/// return, see [`Error::errno`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument")]
    InvalidArgument,

    #[error("numerical result out of range")]
    OutOfRange,

    #[error("GPIO line {0} is busy")]
    Busy(u32),

    #[error("out of memory")]
    NoMemory,

    #[error("sysfs entry '{0}' already exists")]
    Exists(String),

    #[error("no such sysfs entry '{0}'")]
    NotFound(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("no tokio runtime to run deferred work on")]
    NoRuntime,

    #[error("configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(target_os = "linux")]
    #[error(transparent)]
    Gpio(#[from] gpio_cdev::Error),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl Error {
    /// Linux errno for this error, positive.
    pub fn errno(&self) -> i32 {
        match self {
            Error::InvalidArgument | Error::Config(_) => 22, // EINVAL
            Error::OutOfRange => 34,                         // ERANGE
            Error::Busy(_) => 16,                            // EBUSY
            Error::NoMemory => 12,                           // ENOMEM
            Error::Exists(_) => 17,                          // EEXIST
            Error::NotFound(_) => 2,                         // ENOENT
            Error::PermissionDenied => 13,                   // EACCES
            Error::NoRuntime => 3,                           // ESRCH
            Error::Io(e) => e.raw_os_error().unwrap_or(5),
            #[cfg(target_os = "linux")]
            Error::Gpio(_) => 5, // EIO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_matches_kernel_codes() {
        assert_eq!(Error::InvalidArgument.errno(), 22);
        assert_eq!(Error::Busy(40).errno(), 16);
        assert_eq!(Error::NoMemory.errno(), 12);
        assert_eq!(Error::OutOfRange.errno(), 34);
        assert_eq!(Error::PermissionDenied.errno(), 13);
    }

    #[test]
    fn io_errors_keep_their_os_code() {
        let err = Error::from(std::io::Error::from_raw_os_error(16));
        assert_eq!(err.errno(), 16);
    }
}
