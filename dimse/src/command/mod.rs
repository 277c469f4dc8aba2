//! DIMSE Command Set model.
//!
//! A Command Set is the mandatory header portion of a DIMSE message:
//! an ordered collection of data elements in tag group `0x0000`,
//! always encoded in _Implicit VR Little Endian_
//! regardless of the transfer syntax negotiated
//! for the accompanying data set.
//!
//! The [`reader`] and [`writer`] modules provide the wire codec.
use std::collections::BTreeMap;

use dicom_core::Tag;
use dicom_dictionary_std::tags;

pub mod reader;
pub mod writer;

pub use reader::read_command_set;
pub use writer::write_command_set;

/// Value of _CommandDataSetType_ (0000,0800) stating that
/// no data set follows the command set.
pub const NO_DATA_SET: u16 = 0x0101;

/// Value of _CommandDataSetType_ (0000,0800) stating that
/// a data set follows the command set.
pub const DATA_SET_PRESENT: u16 = 0x0001;

/// The command field enumerator of a DIMSE message,
/// as carried in _CommandField_ (0000,0100).
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum CommandField {
    CStoreRq,
    CStoreRsp,
    CGetRq,
    CGetRsp,
    CFindRq,
    CFindRsp,
    CMoveRq,
    CMoveRsp,
    CEchoRq,
    CEchoRsp,
    CCancelRq,
    NEventReportRq,
    NEventReportRsp,
    NGetRq,
    NGetRsp,
    NSetRq,
    NSetRsp,
    NActionRq,
    NActionRsp,
    NCreateRq,
    NCreateRsp,
    NDeleteRq,
    NDeleteRsp,
}

impl CommandField {
    /// The wire code of this command field.
    pub fn code(self) -> u16 {
        match self {
            CommandField::CStoreRq => 0x0001,
            CommandField::CStoreRsp => 0x8001,
            CommandField::CGetRq => 0x0010,
            CommandField::CGetRsp => 0x8010,
            CommandField::CFindRq => 0x0020,
            CommandField::CFindRsp => 0x8020,
            CommandField::CMoveRq => 0x0021,
            CommandField::CMoveRsp => 0x8021,
            CommandField::CEchoRq => 0x0030,
            CommandField::CEchoRsp => 0x8030,
            CommandField::CCancelRq => 0x0FFF,
            CommandField::NEventReportRq => 0x0100,
            CommandField::NEventReportRsp => 0x8100,
            CommandField::NGetRq => 0x0110,
            CommandField::NGetRsp => 0x8110,
            CommandField::NSetRq => 0x0120,
            CommandField::NSetRsp => 0x8120,
            CommandField::NActionRq => 0x0130,
            CommandField::NActionRsp => 0x8130,
            CommandField::NCreateRq => 0x0140,
            CommandField::NCreateRsp => 0x8140,
            CommandField::NDeleteRq => 0x0150,
            CommandField::NDeleteRsp => 0x8150,
        }
    }

    /// Resolve a wire code into a command field enumerator.
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0x0001 => CommandField::CStoreRq,
            0x8001 => CommandField::CStoreRsp,
            0x0010 => CommandField::CGetRq,
            0x8010 => CommandField::CGetRsp,
            0x0020 => CommandField::CFindRq,
            0x8020 => CommandField::CFindRsp,
            0x0021 => CommandField::CMoveRq,
            0x8021 => CommandField::CMoveRsp,
            0x0030 => CommandField::CEchoRq,
            0x8030 => CommandField::CEchoRsp,
            0x0FFF => CommandField::CCancelRq,
            0x0100 => CommandField::NEventReportRq,
            0x8100 => CommandField::NEventReportRsp,
            0x0110 => CommandField::NGetRq,
            0x8110 => CommandField::NGetRsp,
            0x0120 => CommandField::NSetRq,
            0x8120 => CommandField::NSetRsp,
            0x0130 => CommandField::NActionRq,
            0x8130 => CommandField::NActionRsp,
            0x0140 => CommandField::NCreateRq,
            0x8140 => CommandField::NCreateRsp,
            0x0150 => CommandField::NDeleteRq,
            0x8150 => CommandField::NDeleteRsp,
            _ => return None,
        })
    }

    /// Whether this command field identifies a response message.
    pub fn is_response(self) -> bool {
        self.code() & 0x8000 != 0
    }

    /// A short human readable name, for logging.
    pub fn name(self) -> &'static str {
        match self {
            CommandField::CStoreRq => "C-STORE-RQ",
            CommandField::CStoreRsp => "C-STORE-RSP",
            CommandField::CGetRq => "C-GET-RQ",
            CommandField::CGetRsp => "C-GET-RSP",
            CommandField::CFindRq => "C-FIND-RQ",
            CommandField::CFindRsp => "C-FIND-RSP",
            CommandField::CMoveRq => "C-MOVE-RQ",
            CommandField::CMoveRsp => "C-MOVE-RSP",
            CommandField::CEchoRq => "C-ECHO-RQ",
            CommandField::CEchoRsp => "C-ECHO-RSP",
            CommandField::CCancelRq => "C-CANCEL-RQ",
            CommandField::NEventReportRq => "N-EVENT-REPORT-RQ",
            CommandField::NEventReportRsp => "N-EVENT-REPORT-RSP",
            CommandField::NGetRq => "N-GET-RQ",
            CommandField::NGetRsp => "N-GET-RSP",
            CommandField::NSetRq => "N-SET-RQ",
            CommandField::NSetRsp => "N-SET-RSP",
            CommandField::NActionRq => "N-ACTION-RQ",
            CommandField::NActionRsp => "N-ACTION-RSP",
            CommandField::NCreateRq => "N-CREATE-RQ",
            CommandField::NCreateRsp => "N-CREATE-RSP",
            CommandField::NDeleteRq => "N-DELETE-RQ",
            CommandField::NDeleteRsp => "N-DELETE-RSP",
        }
    }

    /// The elements that a received command set must carry
    /// for a message of this kind,
    /// besides the command field itself.
    pub fn mandatory_tags(self) -> &'static [Tag] {
        match self {
            CommandField::CEchoRq => &[tags::MESSAGE_ID, tags::AFFECTED_SOP_CLASS_UID],
            CommandField::CEchoRsp => &[tags::MESSAGE_ID_BEING_RESPONDED_TO, tags::STATUS],
            CommandField::CStoreRq => &[
                tags::MESSAGE_ID,
                tags::AFFECTED_SOP_CLASS_UID,
                tags::AFFECTED_SOP_INSTANCE_UID,
                tags::PRIORITY,
            ],
            CommandField::CStoreRsp => &[tags::MESSAGE_ID_BEING_RESPONDED_TO, tags::STATUS],
            CommandField::CFindRq | CommandField::CGetRq => &[
                tags::MESSAGE_ID,
                tags::AFFECTED_SOP_CLASS_UID,
                tags::PRIORITY,
            ],
            CommandField::CMoveRq => &[
                tags::MESSAGE_ID,
                tags::AFFECTED_SOP_CLASS_UID,
                tags::PRIORITY,
                tags::MOVE_DESTINATION,
            ],
            CommandField::CFindRsp | CommandField::CGetRsp | CommandField::CMoveRsp => {
                &[tags::MESSAGE_ID_BEING_RESPONDED_TO, tags::STATUS]
            }
            CommandField::CCancelRq => &[tags::MESSAGE_ID_BEING_RESPONDED_TO],
            CommandField::NEventReportRq => &[
                tags::MESSAGE_ID,
                tags::AFFECTED_SOP_CLASS_UID,
                tags::AFFECTED_SOP_INSTANCE_UID,
                tags::EVENT_TYPE_ID,
            ],
            CommandField::NGetRq | CommandField::NSetRq | CommandField::NDeleteRq => &[
                tags::MESSAGE_ID,
                tags::REQUESTED_SOP_CLASS_UID,
                tags::REQUESTED_SOP_INSTANCE_UID,
            ],
            CommandField::NActionRq => &[
                tags::MESSAGE_ID,
                tags::REQUESTED_SOP_CLASS_UID,
                tags::REQUESTED_SOP_INSTANCE_UID,
                tags::ACTION_TYPE_ID,
            ],
            CommandField::NCreateRq => &[tags::MESSAGE_ID, tags::AFFECTED_SOP_CLASS_UID],
            CommandField::NEventReportRsp
            | CommandField::NGetRsp
            | CommandField::NSetRsp
            | CommandField::NActionRsp
            | CommandField::NCreateRsp
            | CommandField::NDeleteRsp => &[tags::MESSAGE_ID_BEING_RESPONDED_TO, tags::STATUS],
        }
    }
}

/// The value representation discipline of a known command set element.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub(crate) enum CommandVr {
    /// unsigned long, 4 bytes
    Ul,
    /// unsigned short, 2 bytes
    Us,
    /// unique identifier, NUL padded string
    Ui,
    /// application entity title, space padded string
    Ae,
    /// long string, space padded
    Lo,
    /// attribute tag list, 4 bytes each
    At,
}

/// The value representation of a known group `0x0000` tag,
/// or `None` if the tag is not recognized.
pub(crate) fn vr_of(tag: Tag) -> Option<CommandVr> {
    Some(match tag {
        tags::COMMAND_GROUP_LENGTH => CommandVr::Ul,
        tags::AFFECTED_SOP_CLASS_UID
        | tags::REQUESTED_SOP_CLASS_UID
        | tags::AFFECTED_SOP_INSTANCE_UID
        | tags::REQUESTED_SOP_INSTANCE_UID => CommandVr::Ui,
        tags::COMMAND_FIELD
        | tags::MESSAGE_ID
        | tags::MESSAGE_ID_BEING_RESPONDED_TO
        | tags::PRIORITY
        | tags::COMMAND_DATA_SET_TYPE
        | tags::STATUS
        | tags::EVENT_TYPE_ID
        | tags::ACTION_TYPE_ID
        | tags::NUMBER_OF_REMAINING_SUBOPERATIONS
        | tags::NUMBER_OF_COMPLETED_SUBOPERATIONS
        | tags::NUMBER_OF_FAILED_SUBOPERATIONS
        | tags::NUMBER_OF_WARNING_SUBOPERATIONS
        | tags::MOVE_ORIGINATOR_MESSAGE_ID => CommandVr::Us,
        tags::MOVE_DESTINATION | tags::MOVE_ORIGINATOR_APPLICATION_ENTITY_TITLE => CommandVr::Ae,
        tags::ERROR_COMMENT => CommandVr::Lo,
        tags::OFFENDING_ELEMENT | tags::ATTRIBUTE_IDENTIFIER_LIST => CommandVr::At,
        _ => return None,
    })
}

/// The value of a single command set element.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub enum CommandValue {
    /// An unsigned 16-bit integer (VR US).
    U16(u16),
    /// An unsigned 32-bit integer (VR UL).
    U32(u32),
    /// A text value (VR UI, AE or LO), stored without padding.
    Str(String),
    /// A list of attribute tags (VR AT).
    Tags(Vec<Tag>),
    /// The raw value of an unrecognized element,
    /// preserved as found on the wire.
    Unknown(Vec<u8>),
}

impl CommandValue {
    /// The value as an unsigned 16-bit integer, if applicable.
    pub fn to_u16(&self) -> Option<u16> {
        match self {
            CommandValue::U16(v) => Some(*v),
            CommandValue::U32(v) => u16::try_from(*v).ok(),
            _ => None,
        }
    }

    /// The value as text, if applicable.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CommandValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// The value as a list of attribute tags, if applicable.
    pub fn as_tags(&self) -> Option<&[Tag]> {
        match self {
            CommandValue::Tags(v) => Some(v),
            _ => None,
        }
    }
}

impl From<u16> for CommandValue {
    fn from(value: u16) -> Self {
        CommandValue::U16(value)
    }
}

impl From<&str> for CommandValue {
    fn from(value: &str) -> Self {
        CommandValue::Str(value.to_string())
    }
}

impl From<String> for CommandValue {
    fn from(value: String) -> Self {
        CommandValue::Str(value)
    }
}

/// An ordered collection of group `0x0000` elements.
///
/// Elements are kept in ascending tag order,
/// which is also the order in which they are encoded.
/// The group length element is not held here:
/// it is computed on write and discarded on read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSet {
    elements: BTreeMap<Tag, CommandValue>,
}

impl CommandSet {
    /// Create an empty command set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an element.
    pub fn put(&mut self, tag: Tag, value: impl Into<CommandValue>) {
        self.elements.insert(tag, value.into());
    }

    /// Fetch an element value by tag.
    pub fn get(&self, tag: Tag) -> Option<&CommandValue> {
        self.elements.get(&tag)
    }

    /// Whether an element with the given tag is present.
    pub fn contains(&self, tag: Tag) -> bool {
        self.elements.contains_key(&tag)
    }

    /// Fetch an unsigned 16-bit value by tag.
    pub fn u16(&self, tag: Tag) -> Option<u16> {
        self.get(tag).and_then(CommandValue::to_u16)
    }

    /// Fetch a text value by tag.
    pub fn str(&self, tag: Tag) -> Option<&str> {
        self.get(tag).and_then(CommandValue::as_str)
    }

    /// Iterate over the elements in ascending tag order.
    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &CommandValue)> {
        self.elements.iter()
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The command field code of this command set, if present.
    pub fn command_field(&self) -> Option<u16> {
        self.u16(tags::COMMAND_FIELD)
    }

    /// Whether the command set announces an accompanying data set.
    pub fn has_data_set(&self) -> bool {
        self.u16(tags::COMMAND_DATA_SET_TYPE)
            .map(|v| v != NO_DATA_SET)
            .unwrap_or(false)
    }
}

impl FromIterator<(Tag, CommandValue)> for CommandSet {
    fn from_iter<T: IntoIterator<Item = (Tag, CommandValue)>>(iter: T) -> Self {
        CommandSet {
            elements: iter.into_iter().collect(),
        }
    }
}
