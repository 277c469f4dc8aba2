//! DIMSE service primitives.
//!
//! A primitive is the typed, in-memory mirror of one DIMSE message.
//! Each variant carries request-only, response-only and common fields;
//! a single value serves both roles,
//! with the [`is_valid_request`](Primitive::is_valid_request)
//! and [`is_valid_response`](Primitive::is_valid_response) predicates
//! reporting whether the mandatory fields for the given role are set.
//!
//! Payload fields
//! (data sets, identifiers, attribute lists and friends)
//! are opaque byte buffers:
//! the DIMSE layer never decodes them,
//! it only carries them between the peer and the service user.
use snafu::{ensure, Backtrace, Snafu};

pub mod composite;
pub mod normalized;

pub use composite::{CCancel, CEcho, CFind, CGet, CMove, CStore};
pub use normalized::{NAction, NCreate, NDelete, NEventReport, NGet, NSet};

/// An error raised when assigning an out-of-domain value
/// to a primitive field.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ValueError {
    #[snafu(display("Invalid unique identifier `{}`", value))]
    InvalidUid { value: String, backtrace: Backtrace },

    #[snafu(display("Unique identifier has {} characters (maximum is 64)", length))]
    UidTooLong { length: usize, backtrace: Backtrace },

    #[snafu(display(
        "Application entity title has {} characters (maximum is 16)",
        length
    ))]
    AeTitleTooLong { length: usize, backtrace: Backtrace },

    #[snafu(display("Unknown priority code {:#06x}", code))]
    UnknownPriority { code: u16, backtrace: Backtrace },
}

pub type Result<T, E = ValueError> = std::result::Result<T, E>;

/// A unique identifier (VR UI) value.
///
/// Stored without trailing padding.
/// Under strict conformance,
/// values must match the DICOM UID grammar
/// and stay within 64 characters.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct Uid(String);

impl Uid {
    /// Create a UID value,
    /// rejecting non-conforming values when `enforce_conformance` is on.
    pub fn new(value: impl Into<String>, enforce_conformance: bool) -> Result<Self> {
        let value: String = value.into();
        let value = value
            .trim_end_matches(|c| c == '\0' || c == ' ')
            .to_string();
        if enforce_conformance {
            ensure!(
                value.len() <= 64,
                UidTooLongSnafu {
                    length: value.len()
                }
            );
            ensure!(is_conformant_uid(&value), InvalidUidSnafu { value });
        }
        Ok(Uid(value))
    }

    /// Create a UID value without conformance checks.
    ///
    /// Used on the receiving path,
    /// where the peer's values are carried as found on the wire.
    pub(crate) fn lenient(value: impl Into<String>) -> Self {
        let value: String = value.into();
        Uid(value
            .trim_end_matches(|c| c == '\0' || c == ' ')
            .to_string())
    }

    /// The UID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Whether a value matches the DICOM UID grammar:
/// dot separated numeric components with no leading zeros.
fn is_conformant_uid(value: &str) -> bool {
    !value.is_empty()
        && value.split('.').all(|component| {
            !component.is_empty()
                && component.bytes().all(|b| b.is_ascii_digit())
                && (component == "0" || !component.starts_with('0'))
        })
}

/// An application entity title (VR AE) value.
///
/// Stored trimmed;
/// padding to the full 16 bytes happens at encoding time
/// unless the short form is configured.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct AeTitle(String);

impl AeTitle {
    /// Parse an AE title.
    ///
    /// Leading and trailing whitespace is not significant.
    /// An empty or whitespace-only value yields `None`
    /// (the field is left unset),
    /// and a value longer than 16 characters is rejected.
    pub fn new(value: impl AsRef<str>) -> Result<Option<Self>> {
        let trimmed = value.as_ref().trim_matches(|c| c == ' ' || c == '\0');
        if trimmed.is_empty() {
            return Ok(None);
        }
        ensure!(
            trimmed.len() <= 16,
            AeTitleTooLongSnafu {
                length: trimmed.len()
            }
        );
        Ok(Some(AeTitle(trimmed.to_string())))
    }

    /// The trimmed AE title.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The wire form of the AE title:
    /// space padded to 16 bytes,
    /// or kept as written when `short` is on.
    pub fn encoded(&self, short: bool) -> String {
        if short {
            self.0.clone()
        } else {
            format!("{:<16}", self.0)
        }
    }
}

impl std::fmt::Display for AeTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The priority of a composite operation request.
#[derive(Debug, Clone, Copy, Default, Eq, Hash, PartialEq)]
#[repr(u16)]
pub enum Priority {
    #[default]
    Medium = 0x0000,
    High = 0x0001,
    Low = 0x0002,
}

impl Priority {
    /// The wire code of this priority.
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for Priority {
    type Error = ValueError;

    fn try_from(code: u16) -> Result<Self> {
        match code {
            0x0000 => Ok(Priority::Medium),
            0x0001 => Ok(Priority::High),
            0x0002 => Ok(Priority::Low),
            _ => UnknownPrioritySnafu { code }.fail(),
        }
    }
}

/// A typed DIMSE service primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    CEcho(CEcho),
    CStore(CStore),
    CFind(CFind),
    CGet(CGet),
    CMove(CMove),
    CCancel(CCancel),
    NEventReport(NEventReport),
    NGet(NGet),
    NSet(NSet),
    NAction(NAction),
    NCreate(NCreate),
    NDelete(NDelete),
}

impl Primitive {
    /// A short name of the operation, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Primitive::CEcho(_) => "C-ECHO",
            Primitive::CStore(_) => "C-STORE",
            Primitive::CFind(_) => "C-FIND",
            Primitive::CGet(_) => "C-GET",
            Primitive::CMove(_) => "C-MOVE",
            Primitive::CCancel(_) => "C-CANCEL",
            Primitive::NEventReport(_) => "N-EVENT-REPORT",
            Primitive::NGet(_) => "N-GET",
            Primitive::NSet(_) => "N-SET",
            Primitive::NAction(_) => "N-ACTION",
            Primitive::NCreate(_) => "N-CREATE",
            Primitive::NDelete(_) => "N-DELETE",
        }
    }

    /// The message ID, if set.
    pub fn message_id(&self) -> Option<u16> {
        match self {
            Primitive::CEcho(p) => p.message_id,
            Primitive::CStore(p) => p.message_id,
            Primitive::CFind(p) => p.message_id,
            Primitive::CGet(p) => p.message_id,
            Primitive::CMove(p) => p.message_id,
            Primitive::CCancel(_) => None,
            Primitive::NEventReport(p) => p.message_id,
            Primitive::NGet(p) => p.message_id,
            Primitive::NSet(p) => p.message_id,
            Primitive::NAction(p) => p.message_id,
            Primitive::NCreate(p) => p.message_id,
            Primitive::NDelete(p) => p.message_id,
        }
    }

    /// The message ID being responded to, if set.
    ///
    /// A primitive with this field set takes the response form
    /// on its way to the wire.
    pub fn message_id_being_responded_to(&self) -> Option<u16> {
        match self {
            Primitive::CEcho(p) => p.message_id_being_responded_to,
            Primitive::CStore(p) => p.message_id_being_responded_to,
            Primitive::CFind(p) => p.message_id_being_responded_to,
            Primitive::CGet(p) => p.message_id_being_responded_to,
            Primitive::CMove(p) => p.message_id_being_responded_to,
            Primitive::CCancel(p) => p.message_id_being_responded_to,
            Primitive::NEventReport(p) => p.message_id_being_responded_to,
            Primitive::NGet(p) => p.message_id_being_responded_to,
            Primitive::NSet(p) => p.message_id_being_responded_to,
            Primitive::NAction(p) => p.message_id_being_responded_to,
            Primitive::NCreate(p) => p.message_id_being_responded_to,
            Primitive::NDelete(p) => p.message_id_being_responded_to,
        }
    }

    /// Whether all mandatory fields for the request role are set.
    pub fn is_valid_request(&self) -> bool {
        match self {
            Primitive::CEcho(p) => p.is_valid_request(),
            Primitive::CStore(p) => p.is_valid_request(),
            Primitive::CFind(p) => p.is_valid_request(),
            Primitive::CGet(p) => p.is_valid_request(),
            Primitive::CMove(p) => p.is_valid_request(),
            Primitive::CCancel(p) => p.is_valid_request(),
            Primitive::NEventReport(p) => p.is_valid_request(),
            Primitive::NGet(p) => p.is_valid_request(),
            Primitive::NSet(p) => p.is_valid_request(),
            Primitive::NAction(p) => p.is_valid_request(),
            Primitive::NCreate(p) => p.is_valid_request(),
            Primitive::NDelete(p) => p.is_valid_request(),
        }
    }

    /// Whether all mandatory fields for the response role are set.
    pub fn is_valid_response(&self) -> bool {
        match self {
            Primitive::CEcho(p) => p.is_valid_response(),
            Primitive::CStore(p) => p.is_valid_response(),
            Primitive::CFind(p) => p.is_valid_response(),
            Primitive::CGet(p) => p.is_valid_response(),
            Primitive::CMove(p) => p.is_valid_response(),
            Primitive::CCancel(_) => false,
            Primitive::NEventReport(p) => p.is_valid_response(),
            Primitive::NGet(p) => p.is_valid_response(),
            Primitive::NSet(p) => p.is_valid_response(),
            Primitive::NAction(p) => p.is_valid_response(),
            Primitive::NCreate(p) => p.is_valid_response(),
            Primitive::NDelete(p) => p.is_valid_response(),
        }
    }
}
