//! Native error codes reported by the host.

use thiserror::Error;

/// Error code returned by the host for a failed job or property read.
///
/// Only the low 16 bits identify the error; the upper bits carry
/// provider-specific detail and are preserved untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("host error {}", .0 & 0xFFFF)]
pub struct ErrorCode(pub u64);

impl ErrorCode {
    /// The operation was successful.
    pub const OK: Self = Self(0);
    /// Unspecified failure.
    pub const FAIL: Self = Self(1);
    pub const OUT_OF_MEMORY: Self = Self(2);
    pub const INVALID_ARG: Self = Self(3);
    pub const FILE_NOT_FOUND: Self = Self(4);
    pub const OBJECT_IS_BUSY: Self = Self(5);
    pub const NOT_SUPPORTED: Self = Self(6);
    pub const FILE_ERROR: Self = Self(7);
    pub const DISK_FULL: Self = Self(8);
    pub const CANCELLED: Self = Self(10);
    pub const INVALID_HANDLE: Self = Self(1000);
    pub const NOT_SUPPORTED_ON_HANDLE_TYPE: Self = Self(1001);
    pub const NOT_FOUND: Self = Self(2000);
    pub const TYPE_MISMATCH: Self = Self(2001);
    pub const HOST_USER_PERMISSIONS: Self = Self(3015);
    pub const UNRECOGNIZED_PROPERTY: Self = Self(6000);
    pub const VM_NOT_FOUND: Self = Self(4000);
    pub const VM_ALREADY_LOADED: Self = Self(4003);

    /// The significant part of the code.
    pub fn code(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Whether this code reports success.
    pub fn is_ok(&self) -> bool {
        self.code() == 0
    }

    /// Default English text for well-known codes.
    ///
    /// Host implementations may return richer text from
    /// [`HostApi::error_text`](crate::HostApi::error_text).
    pub fn default_text(&self) -> &'static str {
        match Self(u64::from(self.code())) {
            Self::OK => "The operation was successful",
            Self::FAIL => "Unknown error",
            Self::OUT_OF_MEMORY => "Memory allocation failed: out of memory",
            Self::INVALID_ARG => "One of the parameters was invalid",
            Self::FILE_NOT_FOUND => "A file was not found",
            Self::OBJECT_IS_BUSY => {
                "This function cannot be performed because the handle is executing another function"
            }
            Self::NOT_SUPPORTED => "The operation is not supported",
            Self::FILE_ERROR => {
                "A file access error occurred on the host or guest operating system"
            }
            Self::DISK_FULL => "An error occurred while writing a file; the disk is full",
            Self::CANCELLED => "The operation has been cancelled",
            Self::INVALID_HANDLE => "The handle is not a valid handle",
            Self::NOT_SUPPORTED_ON_HANDLE_TYPE => {
                "This operation is not supported on this type of handle"
            }
            Self::NOT_FOUND => "The object is not found",
            Self::TYPE_MISMATCH => "The object has the wrong type",
            Self::HOST_USER_PERMISSIONS => "Insufficient permissions in host operating system",
            Self::UNRECOGNIZED_PROPERTY => "Unrecognized handle property identifier",
            Self::VM_NOT_FOUND => "The virtual machine cannot be found",
            Self::VM_ALREADY_LOADED => "The virtual machine is already loaded",
            _ => "Unknown error",
        }
    }
}

impl From<u64> for ErrorCode {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_bits_are_ignored() {
        let code = ErrorCode(0x0003_0000_0000_0008);
        assert_eq!(code.code(), 8);
        assert!(!code.is_ok());
        assert_eq!(code.default_text(), ErrorCode::DISK_FULL.default_text());
    }

    #[test]
    fn test_ok_is_ok() {
        assert!(ErrorCode::OK.is_ok());
        assert!(ErrorCode(0x0001_0000_0000_0000).is_ok());
        assert!(!ErrorCode::FAIL.is_ok());
    }

    #[test]
    fn test_unknown_code_text() {
        assert_eq!(ErrorCode(9999).default_text(), "Unknown error");
        assert_eq!(ErrorCode(9999).to_string(), "host error 9999");
        assert_eq!(ErrorCode(0x0002_0000_0000_0008).to_string(), "host error 8");
    }
}
