//! Command set writer module
use byteordered::byteorder::{LittleEndian, WriteBytesExt};
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use snafu::{Backtrace, OptionExt, ResultExt, Snafu};
use std::io::Write;

use super::{vr_of, CommandSet, CommandValue, CommandVr};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not write element {}", tag))]
    WriteElement {
        tag: Tag,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not write command set"))]
    WriteCommandSet {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Unsuitable value for element {}", tag))]
    UnsuitableValue { tag: Tag, backtrace: Backtrace },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Encode a command set in Implicit VR Little Endian.
///
/// Elements are written in ascending tag order.
/// The _CommandGroupLength_ element is written first with a placeholder
/// which is then patched with the byte length of the remaining elements.
pub fn write_command_set<W>(writer: &mut W, commands: &CommandSet) -> Result<()>
where
    W: Write,
{
    let mut buffer: Vec<u8> = Vec::with_capacity(128);

    write_header(&mut buffer, tags::COMMAND_GROUP_LENGTH, 4)?;
    buffer.extend_from_slice(&[0; 4]);

    for (&tag, value) in commands.iter() {
        if tag == tags::COMMAND_GROUP_LENGTH {
            continue;
        }
        write_element(&mut buffer, tag, value)?;
    }

    // patch the group length with the byte count past its own value field
    let group_length = (buffer.len() - 12) as u32;
    buffer[8..12].copy_from_slice(&group_length.to_le_bytes());

    writer.write_all(&buffer).context(WriteCommandSetSnafu)
}

fn write_header(buffer: &mut Vec<u8>, tag: Tag, length: u32) -> Result<()> {
    buffer
        .write_u16::<LittleEndian>(tag.group())
        .context(WriteElementSnafu { tag })?;
    buffer
        .write_u16::<LittleEndian>(tag.element())
        .context(WriteElementSnafu { tag })?;
    buffer
        .write_u32::<LittleEndian>(length)
        .context(WriteElementSnafu { tag })?;
    Ok(())
}

fn write_element(buffer: &mut Vec<u8>, tag: Tag, value: &CommandValue) -> Result<()> {
    match (vr_of(tag), value) {
        (Some(CommandVr::Us), v) => {
            let v = v.to_u16().context(UnsuitableValueSnafu { tag })?;
            write_header(buffer, tag, 2)?;
            buffer
                .write_u16::<LittleEndian>(v)
                .context(WriteElementSnafu { tag })?;
        }
        (Some(CommandVr::Ul), &CommandValue::U32(v)) => {
            write_header(buffer, tag, 4)?;
            buffer
                .write_u32::<LittleEndian>(v)
                .context(WriteElementSnafu { tag })?;
        }
        (Some(CommandVr::Ul), &CommandValue::U16(v)) => {
            write_header(buffer, tag, 4)?;
            buffer
                .write_u32::<LittleEndian>(u32::from(v))
                .context(WriteElementSnafu { tag })?;
        }
        (Some(CommandVr::Ui), CommandValue::Str(v)) => {
            write_text(buffer, tag, v, b'\0')?;
        }
        (Some(CommandVr::Ae), CommandValue::Str(v))
        | (Some(CommandVr::Lo), CommandValue::Str(v)) => {
            write_text(buffer, tag, v, b' ')?;
        }
        (Some(CommandVr::At), CommandValue::Tags(v)) => {
            write_header(buffer, tag, (v.len() * 4) as u32)?;
            for t in v {
                buffer
                    .write_u16::<LittleEndian>(t.group())
                    .context(WriteElementSnafu { tag })?;
                buffer
                    .write_u16::<LittleEndian>(t.element())
                    .context(WriteElementSnafu { tag })?;
            }
        }
        (_, CommandValue::Unknown(v)) => {
            write_header(buffer, tag, v.len() as u32)?;
            buffer.extend_from_slice(v);
        }
        _ => return UnsuitableValueSnafu { tag }.fail(),
    }
    Ok(())
}

fn write_text(buffer: &mut Vec<u8>, tag: Tag, value: &str, pad: u8) -> Result<()> {
    let mut bytes = value.as_bytes().to_vec();
    if bytes.len() % 2 != 0 {
        bytes.push(pad);
    }
    write_header(buffer, tag, bytes.len() as u32)?;
    buffer.extend_from_slice(&bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandField;

    /// C-ECHO-RQ command set,
    /// message ID 7, verification SOP class
    pub(crate) const C_ECHO_RQ_CMD: &[u8] = &[
        0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x38, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02,
        0x00, 0x12, 0x00, 0x00, 0x00, 0x31, 0x2e, 0x32, 0x2e, 0x38, 0x34, 0x30, 0x2e, 0x31, 0x30,
        0x30, 0x30, 0x38, 0x2e, 0x31, 0x2e, 0x31, 0x00, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x00,
        0x00, 0x30, 0x00, 0x00, 0x00, 0x10, 0x01, 0x02, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00,
        0x00, 0x08, 0x02, 0x00, 0x00, 0x00, 0x01, 0x01,
    ];

    #[test]
    fn write_c_echo_rq() {
        let mut commands = CommandSet::new();
        commands.put(tags::AFFECTED_SOP_CLASS_UID, "1.2.840.10008.1.1");
        commands.put(tags::COMMAND_FIELD, CommandField::CEchoRq.code());
        commands.put(tags::MESSAGE_ID, 7_u16);
        commands.put(tags::COMMAND_DATA_SET_TYPE, super::super::NO_DATA_SET);

        let mut out = Vec::new();
        write_command_set(&mut out, &commands).unwrap();
        assert_eq!(out, C_ECHO_RQ_CMD);
    }

    #[test]
    fn write_c_echo_rsp() {
        // message ID being responded to 8, status success
        let mut commands = CommandSet::new();
        commands.put(tags::AFFECTED_SOP_CLASS_UID, "1.2.840.10008.1.1");
        commands.put(tags::COMMAND_FIELD, CommandField::CEchoRsp.code());
        commands.put(tags::MESSAGE_ID_BEING_RESPONDED_TO, 8_u16);
        commands.put(tags::COMMAND_DATA_SET_TYPE, super::super::NO_DATA_SET);
        commands.put(tags::STATUS, 0x0000_u16);

        let mut out = Vec::new();
        write_command_set(&mut out, &commands).unwrap();

        let expected: &[u8] = &[
            0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x42, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x12, 0x00, 0x00, 0x00, 0x31, 0x2e, 0x32, 0x2e, 0x38, 0x34, 0x30, 0x2e,
            0x31, 0x30, 0x30, 0x30, 0x38, 0x2e, 0x31, 0x2e, 0x31, 0x00, 0x00, 0x00, 0x00, 0x01,
            0x02, 0x00, 0x00, 0x00, 0x30, 0x80, 0x00, 0x00, 0x20, 0x01, 0x02, 0x00, 0x00, 0x00,
            0x08, 0x00, 0x00, 0x00, 0x00, 0x08, 0x02, 0x00, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00,
            0x00, 0x09, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(out, expected);
    }
}
