//! Configurable limits for bounded decoding.

/// Wire-level limits for message decoding.
///
/// These limits are enforced during decoding to prevent resource exhaustion
/// and reject obviously hostile input early. Body length validation belongs
/// to the codec, which knows the expected field layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum message size in bytes.
    pub max_message_bytes: usize,

    /// Maximum sub-object index accepted on a message.
    pub max_sub_index: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            // Header (16) plus five full-precision vectors (60) fits easily.
            max_message_bytes: 256,
            max_sub_index: 255,
        }
    }
}

impl Limits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_message_bytes: 96,
            max_sub_index: 8,
        }
    }

    /// Creates limits with no restrictions (use with caution).
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_message_bytes: usize::MAX,
            max_sub_index: u32::MAX,
        }
    }
}
