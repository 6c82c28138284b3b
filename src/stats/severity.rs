use std::fmt;

/// MessageType is the severity class a counted log event belongs to.
///
/// Only these three levels are tracked per error code; everything below
/// WARNING is ignored by the window counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Warning = 0,
    Error = 1,
    Fatal = 2,
}

/// Number of tracked message types, used for array sizing.
pub const MESSAGE_TYPE_COUNT: usize = 3;

impl MessageType {
    /// Returns the label used in snapshot rows and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    /// Position of this type in per-type counter arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Return all message types in snapshot order.
    pub fn all() -> &'static [Self] {
        &[Self::Warning, Self::Error, Self::Fatal]
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
