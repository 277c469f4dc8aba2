//! Command set reader module
use byteordered::byteorder::{LittleEndian, ReadBytesExt};
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use std::io::{Cursor, Read};

use super::{vr_of, CommandSet, CommandValue, CommandVr};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read command element field `{}`", field))]
    ReadField {
        field: &'static str,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not read the value of element {}", tag))]
    ReadValue {
        tag: Tag,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Unexpected element {} outside group 0000H", tag))]
    UnexpectedGroup { tag: Tag, backtrace: Backtrace },

    #[snafu(display("Invalid length {} for element {}", length, tag))]
    InvalidValueLength {
        tag: Tag,
        length: u32,
        backtrace: Backtrace,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Decode a full command set from its Implicit VR Little Endian encoding.
///
/// Unknown tags in group `0x0000` are preserved as opaque values
/// and do not block decoding.
/// The _CommandGroupLength_ element is consumed but not retained.
pub fn read_command_set(bytes: &[u8]) -> Result<CommandSet> {
    let mut cursor = Cursor::new(bytes);
    let mut commands = CommandSet::new();

    while (cursor.position() as usize) < bytes.len() {
        let group = cursor
            .read_u16::<LittleEndian>()
            .context(ReadFieldSnafu { field: "group" })?;
        let element = cursor
            .read_u16::<LittleEndian>()
            .context(ReadFieldSnafu { field: "element" })?;
        let tag = Tag(group, element);
        ensure!(group == 0x0000, UnexpectedGroupSnafu { tag });

        let length = cursor
            .read_u32::<LittleEndian>()
            .context(ReadFieldSnafu { field: "length" })?;

        if tag == tags::COMMAND_GROUP_LENGTH {
            // consumed for framing only
            ensure!(length == 4, InvalidValueLengthSnafu { tag, length });
            cursor
                .read_u32::<LittleEndian>()
                .context(ReadValueSnafu { tag })?;
            continue;
        }

        let value = match vr_of(tag) {
            Some(CommandVr::Us) => {
                ensure!(length == 2, InvalidValueLengthSnafu { tag, length });
                CommandValue::U16(
                    cursor
                        .read_u16::<LittleEndian>()
                        .context(ReadValueSnafu { tag })?,
                )
            }
            Some(CommandVr::Ul) => {
                ensure!(length == 4, InvalidValueLengthSnafu { tag, length });
                CommandValue::U32(
                    cursor
                        .read_u32::<LittleEndian>()
                        .context(ReadValueSnafu { tag })?,
                )
            }
            Some(CommandVr::Ui) | Some(CommandVr::Ae) | Some(CommandVr::Lo) => {
                let data = read_n(&mut cursor, length as usize).context(ReadValueSnafu { tag })?;
                let text = String::from_utf8_lossy(&data)
                    .trim_end_matches(|c| c == '\0' || c == ' ')
                    .to_string();
                CommandValue::Str(text)
            }
            Some(CommandVr::At) => {
                ensure!(length % 4 == 0, InvalidValueLengthSnafu { tag, length });
                let mut items = Vec::with_capacity((length / 4) as usize);
                for _ in 0..length / 4 {
                    let g = cursor
                        .read_u16::<LittleEndian>()
                        .context(ReadValueSnafu { tag })?;
                    let e = cursor
                        .read_u16::<LittleEndian>()
                        .context(ReadValueSnafu { tag })?;
                    items.push(Tag(g, e));
                }
                CommandValue::Tags(items)
            }
            None => CommandValue::Unknown(
                read_n(&mut cursor, length as usize).context(ReadValueSnafu { tag })?,
            ),
        };

        commands.put(tag, value);
    }

    Ok(commands)
}

fn read_n<R>(reader: &mut R, bytes_to_read: usize) -> std::io::Result<Vec<u8>>
where
    R: Read,
{
    let mut result = vec![0; bytes_to_read];
    reader.read_exact(&mut result)?;
    Ok(result)
}
