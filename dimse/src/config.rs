//! Configuration for the DIMSE service provider.
use std::time::Duration;

/// The default maximum PDU size in bytes
/// used when fragmenting outbound messages.
pub const DEFAULT_MAX_PDU: u32 = 16_382;

/// The default capacity of the C-CANCEL request map.
pub const DEFAULT_CANCEL_CAPACITY: usize = 10;

/// Configuration values for a DIMSE service provider.
///
/// A value of this type is handed to the provider at construction time
/// and governs field validation strictness,
/// outbound fragmentation,
/// and the blocking behavior of message dequeues.
#[derive(Debug, Clone, PartialEq)]
pub struct DimseConfig {
    /// Whether unique identifier values must
    /// strictly conform to the DICOM UID grammar
    /// (and the 64 character limit).
    pub enforce_uid_conformance: bool,
    /// Whether application entity titles are encoded
    /// as written (up to 16 characters)
    /// instead of space padded to exactly 16 bytes.
    pub use_short_aet: bool,
    /// The maximum number of C-CANCEL requests retained per association.
    /// Further requests from the peer are silently dropped.
    pub cancel_queue_capacity: usize,
    /// The maximum PDU size when sending DIMSE messages.
    pub max_pdu_size: u32,
    /// The maximum amount of time to wait for an indication
    /// in a blocking dequeue.
    /// `None` means wait indefinitely.
    pub dimse_timeout: Option<Duration>,
}

impl Default for DimseConfig {
    fn default() -> Self {
        DimseConfig {
            enforce_uid_conformance: false,
            use_short_aet: false,
            cancel_queue_capacity: DEFAULT_CANCEL_CAPACITY,
            max_pdu_size: DEFAULT_MAX_PDU,
            dimse_timeout: None,
        }
    }
}

impl DimseConfig {
    /// Create a new configuration with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable strict UID conformance checks.
    pub fn enforce_uid_conformance(mut self, value: bool) -> Self {
        self.enforce_uid_conformance = value;
        self
    }

    /// Enable or disable short AE title encoding.
    pub fn use_short_aet(mut self, value: bool) -> Self {
        self.use_short_aet = value;
        self
    }

    /// Override the maximum PDU size for outbound messages.
    pub fn max_pdu_size(mut self, value: u32) -> Self {
        self.max_pdu_size = value;
        self
    }

    /// Override the C-CANCEL request map capacity.
    pub fn cancel_queue_capacity(mut self, value: usize) -> Self {
        self.cancel_queue_capacity = value;
        self
    }

    /// Set the DIMSE timeout for blocking dequeues.
    pub fn dimse_timeout(mut self, value: Duration) -> Self {
        self.dimse_timeout = Some(value);
        self
    }
}
