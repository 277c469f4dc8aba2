//! DIMSE message bridge.
//!
//! A [`Message`] holds one DIMSE message in transit:
//! the command set,
//! the optional data set payload (opaque bytes),
//! and the presentation context it travels under.
//! It is built in one of two directions:
//! from a typed [`Primitive`] on the sending path,
//! or from reassembled presentation data values on the receiving path.
//!
//! Fragmentation follows the P-DATA rules of PS3.8:
//! command and data fragments never share a presentation data value,
//! each value payload stays within the negotiated maximum PDU size,
//! and the last fragment of each portion carries the last-fragment bit.
use bytes::BytesMut;
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_ul::pdu::{PDataValue, PDataValueType, Pdu};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};

use crate::command::{
    self, read_command_set, write_command_set, CommandField, CommandSet, DATA_SET_PRESENT,
    NO_DATA_SET,
};
use crate::config::DimseConfig;
use crate::primitives::{
    AeTitle, CCancel, CEcho, CFind, CGet, CMove, CStore, NAction, NCreate, NDelete, NEventReport,
    NGet, NSet, Primitive, Priority, Uid,
};

/// The length of a presentation data value header in bytes:
/// the item length (4),
/// the presentation context ID (1)
/// and the message control header (1).
pub const PDV_HEADER_SIZE: u32 = 6;

/// An error when building an outbound message from a primitive.
///
/// These are programmer errors:
/// they are raised before anything reaches the wire.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum BuildError {
    #[snafu(display("Missing mandatory field `{}` in {}", field, message))]
    MissingField {
        field: &'static str,
        message: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Maximum PDU size {} is too small to fragment into", max_pdu_size))]
    MaxPduTooSmall {
        max_pdu_size: u32,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not encode command set"))]
    EncodeCommandSet {
        #[snafu(backtrace)]
        source: command::writer::Error,
    },
}

/// An error when decoding an inbound message.
///
/// Any of these means the peer sent something
/// that cannot be understood as a DIMSE message;
/// the provider escalates to the upper layer,
/// which aborts the association.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not decode command set"))]
    DecodeCommandSet {
        #[snafu(backtrace)]
        source: command::reader::Error,
    },

    #[snafu(display("Command set has no command field"))]
    MissingCommandField { backtrace: Backtrace },

    #[snafu(display("Unknown command field {:#06x}", code))]
    UnknownCommandField { code: u16, backtrace: Backtrace },

    #[snafu(display("Missing mandatory element {} in {}", tag, message))]
    MissingMandatoryElement {
        tag: Tag,
        message: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Unsuitable value for element {} in {}", tag, message))]
    InvalidElementValue {
        tag: Tag,
        message: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Data set fragment arrived before the command set was complete"))]
    DataBeforeCommand { backtrace: Backtrace },

    #[snafu(display("Command fragment arrived after the command set was complete"))]
    CommandAfterCommand { backtrace: Backtrace },

    #[snafu(display("Data set fragment arrived for a message which announced none"))]
    UnexpectedDataSet { backtrace: Backtrace },

    #[snafu(display(
        "Presentation context ID changed mid-message (expected {}, got {})",
        expected,
        got
    ))]
    ContextIdMismatch {
        expected: u8,
        got: u8,
        backtrace: Backtrace,
    },

    #[snafu(display("Presentation data value arrived after the message was complete"))]
    PdvAfterCompletion { backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// One DIMSE message in transit between primitive and wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The command field enumerator of this message.
    pub command_field: CommandField,
    /// The encoded command set elements.
    pub command_set: CommandSet,
    /// The data set portion, if the message carries one,
    /// encoded under the presentation context's transfer syntax.
    pub data: Option<Vec<u8>>,
    /// The identifier of the presentation context this message rides on.
    pub context_id: u8,
}

fn require<'a, T>(
    value: &'a Option<T>,
    field: &'static str,
    message: &'static str,
) -> std::result::Result<&'a T, BuildError> {
    value.as_ref().context(MissingFieldSnafu { field, message })
}

impl Message {
    /// Build a message from a service primitive.
    ///
    /// The request form is chosen unless
    /// _MessageIDBeingRespondedTo_ is set,
    /// in which case the response form is used.
    /// Missing mandatory fields fail fast
    /// before anything reaches the wire.
    pub fn from_primitive(
        primitive: &Primitive,
        context_id: u8,
        config: &DimseConfig,
    ) -> std::result::Result<Message, BuildError> {
        let response = primitive.message_id_being_responded_to().is_some();
        let short_aet = config.use_short_aet;

        let (command_field, mut commands, data) = match primitive {
            Primitive::CEcho(p) => build_c_echo(p, response)?,
            Primitive::CStore(p) => build_c_store(p, response, short_aet)?,
            Primitive::CFind(p) => build_c_find(p, response)?,
            Primitive::CGet(p) => build_c_get(p, response)?,
            Primitive::CMove(p) => build_c_move(p, response, short_aet)?,
            Primitive::CCancel(p) => build_c_cancel(p)?,
            Primitive::NEventReport(p) => build_n_event_report(p, response)?,
            Primitive::NGet(p) => build_n_get(p, response)?,
            Primitive::NSet(p) => build_n_set(p, response)?,
            Primitive::NAction(p) => build_n_action(p, response)?,
            Primitive::NCreate(p) => build_n_create(p, response)?,
            Primitive::NDelete(p) => build_n_delete(p, response)?,
        };

        commands.put(tags::COMMAND_FIELD, command_field.code());
        commands.put(
            tags::COMMAND_DATA_SET_TYPE,
            if data.is_some() {
                DATA_SET_PRESENT
            } else {
                NO_DATA_SET
            },
        );

        Ok(Message {
            command_field,
            command_set: commands,
            data,
            context_id,
        })
    }

    /// Convert this message into a typed service primitive.
    ///
    /// Fails when the command set lacks a mandatory element
    /// for the identified command
    /// or carries an unsuitable value.
    pub fn into_primitive(self) -> Result<Primitive> {
        let field = self.command_field;
        let commands = &self.command_set;
        for &tag in field.mandatory_tags() {
            ensure!(
                commands.contains(tag),
                MissingMandatoryElementSnafu {
                    tag,
                    message: field.name()
                }
            );
        }

        let p = match field {
            CommandField::CEchoRq | CommandField::CEchoRsp => Primitive::CEcho(CEcho {
                message_id: commands.u16(tags::MESSAGE_ID),
                message_id_being_responded_to: commands.u16(tags::MESSAGE_ID_BEING_RESPONDED_TO),
                affected_sop_class_uid: read_uid(commands, tags::AFFECTED_SOP_CLASS_UID),
                status: commands.u16(tags::STATUS),
                error_comment: read_text(commands, tags::ERROR_COMMENT),
                offending_element: read_tags(commands, tags::OFFENDING_ELEMENT),
            }),
            CommandField::CStoreRq | CommandField::CStoreRsp => Primitive::CStore(CStore {
                message_id: commands.u16(tags::MESSAGE_ID),
                message_id_being_responded_to: commands.u16(tags::MESSAGE_ID_BEING_RESPONDED_TO),
                affected_sop_class_uid: read_uid(commands, tags::AFFECTED_SOP_CLASS_UID),
                affected_sop_instance_uid: read_uid(commands, tags::AFFECTED_SOP_INSTANCE_UID),
                priority: read_priority(commands, field)?,
                data_set: self.data,
                move_originator_application_entity_title: read_aet(
                    commands,
                    tags::MOVE_ORIGINATOR_APPLICATION_ENTITY_TITLE,
                    field,
                )?,
                move_originator_message_id: commands.u16(tags::MOVE_ORIGINATOR_MESSAGE_ID),
                status: commands.u16(tags::STATUS),
                error_comment: read_text(commands, tags::ERROR_COMMENT),
                offending_element: read_tags(commands, tags::OFFENDING_ELEMENT),
            }),
            CommandField::CFindRq | CommandField::CFindRsp => Primitive::CFind(CFind {
                message_id: commands.u16(tags::MESSAGE_ID),
                message_id_being_responded_to: commands.u16(tags::MESSAGE_ID_BEING_RESPONDED_TO),
                affected_sop_class_uid: read_uid(commands, tags::AFFECTED_SOP_CLASS_UID),
                priority: read_priority(commands, field)?,
                identifier: self.data,
                status: commands.u16(tags::STATUS),
                error_comment: read_text(commands, tags::ERROR_COMMENT),
                offending_element: read_tags(commands, tags::OFFENDING_ELEMENT),
            }),
            CommandField::CGetRq | CommandField::CGetRsp => Primitive::CGet(CGet {
                message_id: commands.u16(tags::MESSAGE_ID),
                message_id_being_responded_to: commands.u16(tags::MESSAGE_ID_BEING_RESPONDED_TO),
                affected_sop_class_uid: read_uid(commands, tags::AFFECTED_SOP_CLASS_UID),
                priority: read_priority(commands, field)?,
                identifier: self.data,
                status: commands.u16(tags::STATUS),
                number_of_remaining_suboperations: commands
                    .u16(tags::NUMBER_OF_REMAINING_SUBOPERATIONS),
                number_of_completed_suboperations: commands
                    .u16(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS),
                number_of_failed_suboperations: commands.u16(tags::NUMBER_OF_FAILED_SUBOPERATIONS),
                number_of_warning_suboperations: commands
                    .u16(tags::NUMBER_OF_WARNING_SUBOPERATIONS),
                error_comment: read_text(commands, tags::ERROR_COMMENT),
                offending_element: read_tags(commands, tags::OFFENDING_ELEMENT),
            }),
            CommandField::CMoveRq | CommandField::CMoveRsp => Primitive::CMove(CMove {
                message_id: commands.u16(tags::MESSAGE_ID),
                message_id_being_responded_to: commands.u16(tags::MESSAGE_ID_BEING_RESPONDED_TO),
                affected_sop_class_uid: read_uid(commands, tags::AFFECTED_SOP_CLASS_UID),
                priority: read_priority(commands, field)?,
                move_destination: read_aet(commands, tags::MOVE_DESTINATION, field)?,
                identifier: self.data,
                status: commands.u16(tags::STATUS),
                number_of_remaining_suboperations: commands
                    .u16(tags::NUMBER_OF_REMAINING_SUBOPERATIONS),
                number_of_completed_suboperations: commands
                    .u16(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS),
                number_of_failed_suboperations: commands.u16(tags::NUMBER_OF_FAILED_SUBOPERATIONS),
                number_of_warning_suboperations: commands
                    .u16(tags::NUMBER_OF_WARNING_SUBOPERATIONS),
                error_comment: read_text(commands, tags::ERROR_COMMENT),
                offending_element: read_tags(commands, tags::OFFENDING_ELEMENT),
            }),
            CommandField::CCancelRq => Primitive::CCancel(CCancel {
                message_id_being_responded_to: commands.u16(tags::MESSAGE_ID_BEING_RESPONDED_TO),
            }),
            CommandField::NEventReportRq | CommandField::NEventReportRsp => {
                let (event_information, event_reply) = if field == CommandField::NEventReportRq {
                    (self.data, None)
                } else {
                    (None, self.data)
                };
                Primitive::NEventReport(NEventReport {
                    message_id: commands.u16(tags::MESSAGE_ID),
                    message_id_being_responded_to: commands
                        .u16(tags::MESSAGE_ID_BEING_RESPONDED_TO),
                    affected_sop_class_uid: read_uid(commands, tags::AFFECTED_SOP_CLASS_UID),
                    affected_sop_instance_uid: read_uid(commands, tags::AFFECTED_SOP_INSTANCE_UID),
                    event_type_id: commands.u16(tags::EVENT_TYPE_ID),
                    event_information,
                    event_reply,
                    status: commands.u16(tags::STATUS),
                    error_comment: read_text(commands, tags::ERROR_COMMENT),
                    offending_element: read_tags(commands, tags::OFFENDING_ELEMENT),
                })
            }
            CommandField::NGetRq | CommandField::NGetRsp => Primitive::NGet(NGet {
                message_id: commands.u16(tags::MESSAGE_ID),
                message_id_being_responded_to: commands.u16(tags::MESSAGE_ID_BEING_RESPONDED_TO),
                requested_sop_class_uid: read_uid(commands, tags::REQUESTED_SOP_CLASS_UID),
                requested_sop_instance_uid: read_uid(commands, tags::REQUESTED_SOP_INSTANCE_UID),
                attribute_identifier_list: read_tags(commands, tags::ATTRIBUTE_IDENTIFIER_LIST),
                affected_sop_class_uid: read_uid(commands, tags::AFFECTED_SOP_CLASS_UID),
                affected_sop_instance_uid: read_uid(commands, tags::AFFECTED_SOP_INSTANCE_UID),
                attribute_list: self.data,
                status: commands.u16(tags::STATUS),
                error_comment: read_text(commands, tags::ERROR_COMMENT),
                offending_element: read_tags(commands, tags::OFFENDING_ELEMENT),
            }),
            CommandField::NSetRq | CommandField::NSetRsp => {
                let (modification_list, attribute_list) = if field == CommandField::NSetRq {
                    (self.data, None)
                } else {
                    (None, self.data)
                };
                Primitive::NSet(NSet {
                    message_id: commands.u16(tags::MESSAGE_ID),
                    message_id_being_responded_to: commands
                        .u16(tags::MESSAGE_ID_BEING_RESPONDED_TO),
                    requested_sop_class_uid: read_uid(commands, tags::REQUESTED_SOP_CLASS_UID),
                    requested_sop_instance_uid: read_uid(
                        commands,
                        tags::REQUESTED_SOP_INSTANCE_UID,
                    ),
                    modification_list,
                    affected_sop_class_uid: read_uid(commands, tags::AFFECTED_SOP_CLASS_UID),
                    affected_sop_instance_uid: read_uid(commands, tags::AFFECTED_SOP_INSTANCE_UID),
                    attribute_list,
                    status: commands.u16(tags::STATUS),
                    error_comment: read_text(commands, tags::ERROR_COMMENT),
                    offending_element: read_tags(commands, tags::OFFENDING_ELEMENT),
                })
            }
            CommandField::NActionRq | CommandField::NActionRsp => {
                let (action_information, action_reply) = if field == CommandField::NActionRq {
                    (self.data, None)
                } else {
                    (None, self.data)
                };
                Primitive::NAction(NAction {
                    message_id: commands.u16(tags::MESSAGE_ID),
                    message_id_being_responded_to: commands
                        .u16(tags::MESSAGE_ID_BEING_RESPONDED_TO),
                    requested_sop_class_uid: read_uid(commands, tags::REQUESTED_SOP_CLASS_UID),
                    requested_sop_instance_uid: read_uid(
                        commands,
                        tags::REQUESTED_SOP_INSTANCE_UID,
                    ),
                    action_type_id: commands.u16(tags::ACTION_TYPE_ID),
                    action_information,
                    affected_sop_class_uid: read_uid(commands, tags::AFFECTED_SOP_CLASS_UID),
                    affected_sop_instance_uid: read_uid(commands, tags::AFFECTED_SOP_INSTANCE_UID),
                    action_reply,
                    status: commands.u16(tags::STATUS),
                    error_comment: read_text(commands, tags::ERROR_COMMENT),
                    offending_element: read_tags(commands, tags::OFFENDING_ELEMENT),
                })
            }
            CommandField::NCreateRq | CommandField::NCreateRsp => Primitive::NCreate(NCreate {
                message_id: commands.u16(tags::MESSAGE_ID),
                message_id_being_responded_to: commands.u16(tags::MESSAGE_ID_BEING_RESPONDED_TO),
                affected_sop_class_uid: read_uid(commands, tags::AFFECTED_SOP_CLASS_UID),
                affected_sop_instance_uid: read_uid(commands, tags::AFFECTED_SOP_INSTANCE_UID),
                attribute_list: self.data,
                status: commands.u16(tags::STATUS),
                error_comment: read_text(commands, tags::ERROR_COMMENT),
                offending_element: read_tags(commands, tags::OFFENDING_ELEMENT),
            }),
            CommandField::NDeleteRq | CommandField::NDeleteRsp => Primitive::NDelete(NDelete {
                message_id: commands.u16(tags::MESSAGE_ID),
                message_id_being_responded_to: commands.u16(tags::MESSAGE_ID_BEING_RESPONDED_TO),
                requested_sop_class_uid: read_uid(commands, tags::REQUESTED_SOP_CLASS_UID),
                requested_sop_instance_uid: read_uid(commands, tags::REQUESTED_SOP_INSTANCE_UID),
                affected_sop_class_uid: read_uid(commands, tags::AFFECTED_SOP_CLASS_UID),
                affected_sop_instance_uid: read_uid(commands, tags::AFFECTED_SOP_INSTANCE_UID),
                status: commands.u16(tags::STATUS),
                error_comment: read_text(commands, tags::ERROR_COMMENT),
                offending_element: read_tags(commands, tags::OFFENDING_ELEMENT),
            }),
        };

        Ok(p)
    }

    /// Produce the P-DATA sequence carrying this message.
    ///
    /// The sequence is lazy, finite and non-restartable.
    pub fn fragments(self, max_pdu_size: u32) -> std::result::Result<Fragments, BuildError> {
        ensure!(
            max_pdu_size > PDV_HEADER_SIZE,
            MaxPduTooSmallSnafu { max_pdu_size }
        );
        let mut command = Vec::with_capacity(128);
        write_command_set(&mut command, &self.command_set).context(EncodeCommandSetSnafu)?;

        Ok(Fragments {
            context_id: self.context_id,
            max_data_length: (max_pdu_size - PDV_HEADER_SIZE) as usize,
            command,
            command_pos: 0,
            command_done: false,
            data: self.data,
            data_pos: 0,
            data_done: false,
        })
    }
}

fn read_uid(commands: &CommandSet, tag: Tag) -> Option<Uid> {
    commands.str(tag).map(Uid::lenient)
}

fn read_text(commands: &CommandSet, tag: Tag) -> Option<String> {
    commands.str(tag).map(|s| s.to_string())
}

fn read_tags(commands: &CommandSet, tag: Tag) -> Option<Vec<Tag>> {
    commands
        .get(tag)
        .and_then(|v| v.as_tags())
        .map(|v| v.to_vec())
}

fn read_priority(commands: &CommandSet, field: CommandField) -> Result<Priority> {
    match commands.u16(tags::PRIORITY) {
        None => Ok(Priority::default()),
        Some(code) => Priority::try_from(code).ok().context(InvalidElementValueSnafu {
            tag: tags::PRIORITY,
            message: field.name(),
        }),
    }
}

fn read_aet(commands: &CommandSet, tag: Tag, field: CommandField) -> Result<Option<AeTitle>> {
    match commands.str(tag) {
        None => Ok(None),
        Some(value) => AeTitle::new(value).ok().context(InvalidElementValueSnafu {
            tag,
            message: field.name(),
        }),
    }
}

type Parts = (CommandField, CommandSet, Option<Vec<u8>>);

fn build_c_echo(p: &CEcho, response: bool) -> std::result::Result<Parts, BuildError> {
    let mut commands = CommandSet::new();
    if response {
        let name = "C-ECHO-RSP";
        commands.put(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            *require(&p.message_id_being_responded_to, "MessageIDBeingRespondedTo", name)?,
        );
        commands.put(tags::STATUS, *require(&p.status, "Status", name)?);
        if let Some(uid) = &p.affected_sop_class_uid {
            commands.put(tags::AFFECTED_SOP_CLASS_UID, uid.as_str());
        }
        if let Some(id) = p.message_id {
            commands.put(tags::MESSAGE_ID, id);
        }
        put_error_detail(&mut commands, &p.error_comment, &p.offending_element);
        Ok((CommandField::CEchoRsp, commands, None))
    } else {
        let name = "C-ECHO-RQ";
        commands.put(tags::MESSAGE_ID, *require(&p.message_id, "MessageID", name)?);
        commands.put(
            tags::AFFECTED_SOP_CLASS_UID,
            require(&p.affected_sop_class_uid, "AffectedSOPClassUID", name)?.as_str(),
        );
        Ok((CommandField::CEchoRq, commands, None))
    }
}

fn build_c_store(
    p: &CStore,
    response: bool,
    short_aet: bool,
) -> std::result::Result<Parts, BuildError> {
    let mut commands = CommandSet::new();
    if response {
        let name = "C-STORE-RSP";
        commands.put(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            *require(&p.message_id_being_responded_to, "MessageIDBeingRespondedTo", name)?,
        );
        commands.put(tags::STATUS, *require(&p.status, "Status", name)?);
        if let Some(uid) = &p.affected_sop_class_uid {
            commands.put(tags::AFFECTED_SOP_CLASS_UID, uid.as_str());
        }
        if let Some(uid) = &p.affected_sop_instance_uid {
            commands.put(tags::AFFECTED_SOP_INSTANCE_UID, uid.as_str());
        }
        put_error_detail(&mut commands, &p.error_comment, &p.offending_element);
        Ok((CommandField::CStoreRsp, commands, None))
    } else {
        let name = "C-STORE-RQ";
        commands.put(tags::MESSAGE_ID, *require(&p.message_id, "MessageID", name)?);
        commands.put(
            tags::AFFECTED_SOP_CLASS_UID,
            require(&p.affected_sop_class_uid, "AffectedSOPClassUID", name)?.as_str(),
        );
        commands.put(
            tags::AFFECTED_SOP_INSTANCE_UID,
            require(&p.affected_sop_instance_uid, "AffectedSOPInstanceUID", name)?.as_str(),
        );
        commands.put(tags::PRIORITY, p.priority.code());
        if let Some(aet) = &p.move_originator_application_entity_title {
            commands.put(
                tags::MOVE_ORIGINATOR_APPLICATION_ENTITY_TITLE,
                aet.encoded(short_aet),
            );
        }
        if let Some(id) = p.move_originator_message_id {
            commands.put(tags::MOVE_ORIGINATOR_MESSAGE_ID, id);
        }
        let data = require(&p.data_set, "DataSet", name)?.clone();
        Ok((CommandField::CStoreRq, commands, Some(data)))
    }
}

fn build_c_find(p: &CFind, response: bool) -> std::result::Result<Parts, BuildError> {
    let mut commands = CommandSet::new();
    if response {
        let name = "C-FIND-RSP";
        commands.put(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            *require(&p.message_id_being_responded_to, "MessageIDBeingRespondedTo", name)?,
        );
        commands.put(tags::STATUS, *require(&p.status, "Status", name)?);
        if let Some(uid) = &p.affected_sop_class_uid {
            commands.put(tags::AFFECTED_SOP_CLASS_UID, uid.as_str());
        }
        put_error_detail(&mut commands, &p.error_comment, &p.offending_element);
        Ok((CommandField::CFindRsp, commands, p.identifier.clone()))
    } else {
        let name = "C-FIND-RQ";
        commands.put(tags::MESSAGE_ID, *require(&p.message_id, "MessageID", name)?);
        commands.put(
            tags::AFFECTED_SOP_CLASS_UID,
            require(&p.affected_sop_class_uid, "AffectedSOPClassUID", name)?.as_str(),
        );
        commands.put(tags::PRIORITY, p.priority.code());
        let data = require(&p.identifier, "Identifier", name)?.clone();
        Ok((CommandField::CFindRq, commands, Some(data)))
    }
}

fn build_c_get(p: &CGet, response: bool) -> std::result::Result<Parts, BuildError> {
    let mut commands = CommandSet::new();
    if response {
        let name = "C-GET-RSP";
        commands.put(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            *require(&p.message_id_being_responded_to, "MessageIDBeingRespondedTo", name)?,
        );
        commands.put(tags::STATUS, *require(&p.status, "Status", name)?);
        if let Some(uid) = &p.affected_sop_class_uid {
            commands.put(tags::AFFECTED_SOP_CLASS_UID, uid.as_str());
        }
        put_suboperation_counts(&mut commands, p.number_of_remaining_suboperations, p.number_of_completed_suboperations, p.number_of_failed_suboperations, p.number_of_warning_suboperations);
        put_error_detail(&mut commands, &p.error_comment, &p.offending_element);
        Ok((CommandField::CGetRsp, commands, p.identifier.clone()))
    } else {
        let name = "C-GET-RQ";
        commands.put(tags::MESSAGE_ID, *require(&p.message_id, "MessageID", name)?);
        commands.put(
            tags::AFFECTED_SOP_CLASS_UID,
            require(&p.affected_sop_class_uid, "AffectedSOPClassUID", name)?.as_str(),
        );
        commands.put(tags::PRIORITY, p.priority.code());
        let data = require(&p.identifier, "Identifier", name)?.clone();
        Ok((CommandField::CGetRq, commands, Some(data)))
    }
}

fn build_c_move(
    p: &CMove,
    response: bool,
    short_aet: bool,
) -> std::result::Result<Parts, BuildError> {
    let mut commands = CommandSet::new();
    if response {
        let name = "C-MOVE-RSP";
        commands.put(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            *require(&p.message_id_being_responded_to, "MessageIDBeingRespondedTo", name)?,
        );
        commands.put(tags::STATUS, *require(&p.status, "Status", name)?);
        if let Some(uid) = &p.affected_sop_class_uid {
            commands.put(tags::AFFECTED_SOP_CLASS_UID, uid.as_str());
        }
        put_suboperation_counts(&mut commands, p.number_of_remaining_suboperations, p.number_of_completed_suboperations, p.number_of_failed_suboperations, p.number_of_warning_suboperations);
        put_error_detail(&mut commands, &p.error_comment, &p.offending_element);
        Ok((CommandField::CMoveRsp, commands, p.identifier.clone()))
    } else {
        let name = "C-MOVE-RQ";
        commands.put(tags::MESSAGE_ID, *require(&p.message_id, "MessageID", name)?);
        commands.put(
            tags::AFFECTED_SOP_CLASS_UID,
            require(&p.affected_sop_class_uid, "AffectedSOPClassUID", name)?.as_str(),
        );
        commands.put(tags::PRIORITY, p.priority.code());
        commands.put(
            tags::MOVE_DESTINATION,
            require(&p.move_destination, "MoveDestination", name)?.encoded(short_aet),
        );
        let data = require(&p.identifier, "Identifier", name)?.clone();
        Ok((CommandField::CMoveRq, commands, Some(data)))
    }
}

fn build_c_cancel(p: &CCancel) -> std::result::Result<Parts, BuildError> {
    let mut commands = CommandSet::new();
    commands.put(
        tags::MESSAGE_ID_BEING_RESPONDED_TO,
        *require(
            &p.message_id_being_responded_to,
            "MessageIDBeingRespondedTo",
            "C-CANCEL-RQ",
        )?,
    );
    Ok((CommandField::CCancelRq, commands, None))
}

fn build_n_event_report(p: &NEventReport, response: bool) -> std::result::Result<Parts, BuildError> {
    let mut commands = CommandSet::new();
    if response {
        let name = "N-EVENT-REPORT-RSP";
        commands.put(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            *require(&p.message_id_being_responded_to, "MessageIDBeingRespondedTo", name)?,
        );
        commands.put(tags::STATUS, *require(&p.status, "Status", name)?);
        if let Some(uid) = &p.affected_sop_class_uid {
            commands.put(tags::AFFECTED_SOP_CLASS_UID, uid.as_str());
        }
        if let Some(uid) = &p.affected_sop_instance_uid {
            commands.put(tags::AFFECTED_SOP_INSTANCE_UID, uid.as_str());
        }
        if let Some(id) = p.event_type_id {
            commands.put(tags::EVENT_TYPE_ID, id);
        }
        put_error_detail(&mut commands, &p.error_comment, &p.offending_element);
        Ok((CommandField::NEventReportRsp, commands, p.event_reply.clone()))
    } else {
        let name = "N-EVENT-REPORT-RQ";
        commands.put(tags::MESSAGE_ID, *require(&p.message_id, "MessageID", name)?);
        commands.put(
            tags::AFFECTED_SOP_CLASS_UID,
            require(&p.affected_sop_class_uid, "AffectedSOPClassUID", name)?.as_str(),
        );
        commands.put(
            tags::AFFECTED_SOP_INSTANCE_UID,
            require(&p.affected_sop_instance_uid, "AffectedSOPInstanceUID", name)?.as_str(),
        );
        commands.put(
            tags::EVENT_TYPE_ID,
            *require(&p.event_type_id, "EventTypeID", name)?,
        );
        Ok((
            CommandField::NEventReportRq,
            commands,
            p.event_information.clone(),
        ))
    }
}

fn build_n_get(p: &NGet, response: bool) -> std::result::Result<Parts, BuildError> {
    let mut commands = CommandSet::new();
    if response {
        let name = "N-GET-RSP";
        commands.put(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            *require(&p.message_id_being_responded_to, "MessageIDBeingRespondedTo", name)?,
        );
        commands.put(tags::STATUS, *require(&p.status, "Status", name)?);
        if let Some(uid) = &p.affected_sop_class_uid {
            commands.put(tags::AFFECTED_SOP_CLASS_UID, uid.as_str());
        }
        if let Some(uid) = &p.affected_sop_instance_uid {
            commands.put(tags::AFFECTED_SOP_INSTANCE_UID, uid.as_str());
        }
        put_error_detail(&mut commands, &p.error_comment, &p.offending_element);
        Ok((CommandField::NGetRsp, commands, p.attribute_list.clone()))
    } else {
        let name = "N-GET-RQ";
        commands.put(tags::MESSAGE_ID, *require(&p.message_id, "MessageID", name)?);
        commands.put(
            tags::REQUESTED_SOP_CLASS_UID,
            require(&p.requested_sop_class_uid, "RequestedSOPClassUID", name)?.as_str(),
        );
        commands.put(
            tags::REQUESTED_SOP_INSTANCE_UID,
            require(&p.requested_sop_instance_uid, "RequestedSOPInstanceUID", name)?.as_str(),
        );
        if let Some(list) = &p.attribute_identifier_list {
            commands.put(
                tags::ATTRIBUTE_IDENTIFIER_LIST,
                crate::command::CommandValue::Tags(list.clone()),
            );
        }
        Ok((CommandField::NGetRq, commands, None))
    }
}

fn build_n_set(p: &NSet, response: bool) -> std::result::Result<Parts, BuildError> {
    let mut commands = CommandSet::new();
    if response {
        let name = "N-SET-RSP";
        commands.put(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            *require(&p.message_id_being_responded_to, "MessageIDBeingRespondedTo", name)?,
        );
        commands.put(tags::STATUS, *require(&p.status, "Status", name)?);
        if let Some(uid) = &p.affected_sop_class_uid {
            commands.put(tags::AFFECTED_SOP_CLASS_UID, uid.as_str());
        }
        if let Some(uid) = &p.affected_sop_instance_uid {
            commands.put(tags::AFFECTED_SOP_INSTANCE_UID, uid.as_str());
        }
        put_error_detail(&mut commands, &p.error_comment, &p.offending_element);
        Ok((CommandField::NSetRsp, commands, p.attribute_list.clone()))
    } else {
        let name = "N-SET-RQ";
        commands.put(tags::MESSAGE_ID, *require(&p.message_id, "MessageID", name)?);
        commands.put(
            tags::REQUESTED_SOP_CLASS_UID,
            require(&p.requested_sop_class_uid, "RequestedSOPClassUID", name)?.as_str(),
        );
        commands.put(
            tags::REQUESTED_SOP_INSTANCE_UID,
            require(&p.requested_sop_instance_uid, "RequestedSOPInstanceUID", name)?.as_str(),
        );
        let data = require(&p.modification_list, "ModificationList", name)?.clone();
        Ok((CommandField::NSetRq, commands, Some(data)))
    }
}

fn build_n_action(p: &NAction, response: bool) -> std::result::Result<Parts, BuildError> {
    let mut commands = CommandSet::new();
    if response {
        let name = "N-ACTION-RSP";
        commands.put(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            *require(&p.message_id_being_responded_to, "MessageIDBeingRespondedTo", name)?,
        );
        commands.put(tags::STATUS, *require(&p.status, "Status", name)?);
        if let Some(uid) = &p.affected_sop_class_uid {
            commands.put(tags::AFFECTED_SOP_CLASS_UID, uid.as_str());
        }
        if let Some(uid) = &p.affected_sop_instance_uid {
            commands.put(tags::AFFECTED_SOP_INSTANCE_UID, uid.as_str());
        }
        if let Some(id) = p.action_type_id {
            commands.put(tags::ACTION_TYPE_ID, id);
        }
        put_error_detail(&mut commands, &p.error_comment, &p.offending_element);
        Ok((CommandField::NActionRsp, commands, p.action_reply.clone()))
    } else {
        let name = "N-ACTION-RQ";
        commands.put(tags::MESSAGE_ID, *require(&p.message_id, "MessageID", name)?);
        commands.put(
            tags::REQUESTED_SOP_CLASS_UID,
            require(&p.requested_sop_class_uid, "RequestedSOPClassUID", name)?.as_str(),
        );
        commands.put(
            tags::REQUESTED_SOP_INSTANCE_UID,
            require(&p.requested_sop_instance_uid, "RequestedSOPInstanceUID", name)?.as_str(),
        );
        commands.put(
            tags::ACTION_TYPE_ID,
            *require(&p.action_type_id, "ActionTypeID", name)?,
        );
        Ok((
            CommandField::NActionRq,
            commands,
            p.action_information.clone(),
        ))
    }
}

fn build_n_create(p: &NCreate, response: bool) -> std::result::Result<Parts, BuildError> {
    let mut commands = CommandSet::new();
    if response {
        let name = "N-CREATE-RSP";
        commands.put(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            *require(&p.message_id_being_responded_to, "MessageIDBeingRespondedTo", name)?,
        );
        commands.put(tags::STATUS, *require(&p.status, "Status", name)?);
        if let Some(uid) = &p.affected_sop_class_uid {
            commands.put(tags::AFFECTED_SOP_CLASS_UID, uid.as_str());
        }
        if let Some(uid) = &p.affected_sop_instance_uid {
            commands.put(tags::AFFECTED_SOP_INSTANCE_UID, uid.as_str());
        }
        put_error_detail(&mut commands, &p.error_comment, &p.offending_element);
        Ok((CommandField::NCreateRsp, commands, p.attribute_list.clone()))
    } else {
        let name = "N-CREATE-RQ";
        commands.put(tags::MESSAGE_ID, *require(&p.message_id, "MessageID", name)?);
        commands.put(
            tags::AFFECTED_SOP_CLASS_UID,
            require(&p.affected_sop_class_uid, "AffectedSOPClassUID", name)?.as_str(),
        );
        if let Some(uid) = &p.affected_sop_instance_uid {
            commands.put(tags::AFFECTED_SOP_INSTANCE_UID, uid.as_str());
        }
        Ok((CommandField::NCreateRq, commands, p.attribute_list.clone()))
    }
}

fn build_n_delete(p: &NDelete, response: bool) -> std::result::Result<Parts, BuildError> {
    let mut commands = CommandSet::new();
    if response {
        let name = "N-DELETE-RSP";
        commands.put(
            tags::MESSAGE_ID_BEING_RESPONDED_TO,
            *require(&p.message_id_being_responded_to, "MessageIDBeingRespondedTo", name)?,
        );
        commands.put(tags::STATUS, *require(&p.status, "Status", name)?);
        if let Some(uid) = &p.affected_sop_class_uid {
            commands.put(tags::AFFECTED_SOP_CLASS_UID, uid.as_str());
        }
        if let Some(uid) = &p.affected_sop_instance_uid {
            commands.put(tags::AFFECTED_SOP_INSTANCE_UID, uid.as_str());
        }
        put_error_detail(&mut commands, &p.error_comment, &p.offending_element);
        Ok((CommandField::NDeleteRsp, commands, None))
    } else {
        let name = "N-DELETE-RQ";
        commands.put(tags::MESSAGE_ID, *require(&p.message_id, "MessageID", name)?);
        commands.put(
            tags::REQUESTED_SOP_CLASS_UID,
            require(&p.requested_sop_class_uid, "RequestedSOPClassUID", name)?.as_str(),
        );
        commands.put(
            tags::REQUESTED_SOP_INSTANCE_UID,
            require(&p.requested_sop_instance_uid, "RequestedSOPInstanceUID", name)?.as_str(),
        );
        Ok((CommandField::NDeleteRq, commands, None))
    }
}

fn put_error_detail(
    commands: &mut CommandSet,
    error_comment: &Option<String>,
    offending_element: &Option<Vec<Tag>>,
) {
    if let Some(comment) = error_comment {
        commands.put(tags::ERROR_COMMENT, comment.as_str());
    }
    if let Some(elements) = offending_element {
        commands.put(
            tags::OFFENDING_ELEMENT,
            crate::command::CommandValue::Tags(elements.clone()),
        );
    }
}

fn put_suboperation_counts(
    commands: &mut CommandSet,
    remaining: Option<u16>,
    completed: Option<u16>,
    failed: Option<u16>,
    warning: Option<u16>,
) {
    if let Some(v) = remaining {
        commands.put(tags::NUMBER_OF_REMAINING_SUBOPERATIONS, v);
    }
    if let Some(v) = completed {
        commands.put(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS, v);
    }
    if let Some(v) = failed {
        commands.put(tags::NUMBER_OF_FAILED_SUBOPERATIONS, v);
    }
    if let Some(v) = warning {
        commands.put(tags::NUMBER_OF_WARNING_SUBOPERATIONS, v);
    }
}

/// A lazy, finite sequence of P-DATA PDUs carrying one message.
///
/// Command set fragments come first,
/// followed by data set fragments when a data set is present.
/// Each produced PDU carries a single presentation data value.
#[must_use]
pub struct Fragments {
    context_id: u8,
    max_data_length: usize,
    command: Vec<u8>,
    command_pos: usize,
    command_done: bool,
    data: Option<Vec<u8>>,
    data_pos: usize,
    data_done: bool,
}

impl Iterator for Fragments {
    type Item = Pdu;

    fn next(&mut self) -> Option<Pdu> {
        if !self.command_done {
            let remaining = self.command.len() - self.command_pos;
            let take = remaining.min(self.max_data_length);
            let chunk = self.command[self.command_pos..self.command_pos + take].to_vec();
            self.command_pos += take;
            let is_last = self.command_pos == self.command.len();
            self.command_done = is_last;
            return Some(Pdu::PData {
                data: vec![PDataValue {
                    presentation_context_id: self.context_id,
                    value_type: PDataValueType::Command,
                    is_last,
                    data: chunk,
                }],
            });
        }

        let data = self.data.as_ref()?;
        if self.data_done {
            return None;
        }
        let remaining = data.len() - self.data_pos;
        let take = remaining.min(self.max_data_length);
        let chunk = data[self.data_pos..self.data_pos + take].to_vec();
        self.data_pos += take;
        let is_last = self.data_pos == data.len();
        self.data_done = is_last;
        Some(Pdu::PData {
            data: vec![PDataValue {
                presentation_context_id: self.context_id,
                value_type: PDataValueType::Data,
                is_last,
                data: chunk,
            }],
        })
    }
}

/// Reassembles an inbound message from presentation data values.
///
/// The assembler accumulates command fragments until the last one arrives,
/// decodes the command set,
/// and then accumulates data fragments if the command announced a data set.
/// Values that disagree with the current state yield an error,
/// upon which the whole message must be discarded.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    context_id: Option<u8>,
    command: BytesMut,
    command_set: Option<CommandSet>,
    command_field: Option<CommandField>,
    expects_data: bool,
    data: BytesMut,
    complete: bool,
}

impl MessageAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed all presentation data values of one P-DATA primitive.
    ///
    /// Returns the completed message exactly once,
    /// on the value that finishes it.
    pub fn feed_pdata(&mut self, values: &[PDataValue]) -> Result<Option<Message>> {
        let mut message = None;
        for value in values {
            ensure!(message.is_none(), PdvAfterCompletionSnafu);
            message = self.feed(value)?;
        }
        Ok(message)
    }

    /// Feed a single presentation data value.
    pub fn feed(&mut self, value: &PDataValue) -> Result<Option<Message>> {
        ensure!(!self.complete, PdvAfterCompletionSnafu);
        match self.context_id {
            None => self.context_id = Some(value.presentation_context_id),
            Some(expected) => {
                ensure!(
                    expected == value.presentation_context_id,
                    ContextIdMismatchSnafu {
                        expected,
                        got: value.presentation_context_id
                    }
                );
            }
        }

        match value.value_type {
            PDataValueType::Command => {
                ensure!(self.command_set.is_none(), CommandAfterCommandSnafu);
                self.command.extend_from_slice(&value.data);
                if value.is_last {
                    let commands = read_command_set(&self.command).context(DecodeCommandSetSnafu)?;
                    let code = commands.command_field().context(MissingCommandFieldSnafu)?;
                    let field =
                        CommandField::from_code(code).context(UnknownCommandFieldSnafu { code })?;
                    self.expects_data = commands.has_data_set();
                    self.command_set = Some(commands);
                    self.command_field = Some(field);
                    if !self.expects_data {
                        return Ok(Some(self.take_message(false)));
                    }
                }
                Ok(None)
            }
            PDataValueType::Data => {
                ensure!(self.command_set.is_some(), DataBeforeCommandSnafu);
                ensure!(self.expects_data, UnexpectedDataSetSnafu);
                self.data.extend_from_slice(&value.data);
                if value.is_last {
                    return Ok(Some(self.take_message(true)));
                }
                Ok(None)
            }
        }
    }

    fn take_message(&mut self, with_data: bool) -> Message {
        self.complete = true;
        Message {
            command_field: self.command_field.take().expect("command set is complete"),
            command_set: self.command_set.take().expect("command set is complete"),
            data: if with_data {
                Some(std::mem::take(&mut self.data).to_vec())
            } else {
                None
            },
            context_id: self.context_id.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DimseConfig;

    /// C-STORE-RQ command fragment from a C-MOVE initiated store,
    /// with the message control header byte stripped
    pub(crate) const C_STORE_RQ_CMD: &[u8] = &[
        0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0xaa, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02,
        0x00, 0x1a, 0x00, 0x00, 0x00, 0x31, 0x2e, 0x32, 0x2e, 0x38, 0x34, 0x30, 0x2e, 0x31, 0x30,
        0x30, 0x30, 0x38, 0x2e, 0x35, 0x2e, 0x31, 0x2e, 0x34, 0x2e, 0x31, 0x2e, 0x31, 0x2e, 0x32,
        0x00, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x10, 0x01,
        0x02, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x00, 0x00, 0x07, 0x02, 0x00, 0x00, 0x00, 0x02,
        0x00, 0x00, 0x00, 0x00, 0x08, 0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x10,
        0x3a, 0x00, 0x00, 0x00, 0x31, 0x2e, 0x32, 0x2e, 0x33, 0x39, 0x32, 0x2e, 0x32, 0x30, 0x30,
        0x30, 0x33, 0x36, 0x2e, 0x39, 0x31, 0x31, 0x36, 0x2e, 0x32, 0x2e, 0x36, 0x2e, 0x31, 0x2e,
        0x34, 0x38, 0x2e, 0x31, 0x32, 0x31, 0x35, 0x37, 0x30, 0x39, 0x30, 0x34, 0x34, 0x2e, 0x31,
        0x34, 0x35, 0x39, 0x33, 0x31, 0x36, 0x32, 0x35, 0x34, 0x2e, 0x35, 0x32, 0x32, 0x34, 0x34,
        0x31, 0x00, 0x00, 0x00, 0x30, 0x10, 0x0c, 0x00, 0x00, 0x00, 0x55, 0x4e, 0x49, 0x54, 0x54,
        0x45, 0x53, 0x54, 0x5f, 0x53, 0x43, 0x50, 0x00, 0x00, 0x31, 0x10, 0x02, 0x00, 0x00, 0x00,
        0x03, 0x00,
    ];

    /// The accompanying data set fragment
    /// (PatientName "Tube HeNe", PatientID "Test1101"),
    /// message control header stripped
    pub(crate) const C_STORE_DS: &[u8] = &[
        0x10, 0x00, 0x10, 0x00, 0x0a, 0x00, 0x00, 0x00, 0x54, 0x75, 0x62, 0x65, 0x20, 0x48, 0x65,
        0x4e, 0x65, 0x20, 0x10, 0x00, 0x20, 0x00, 0x08, 0x00, 0x00, 0x00, 0x54, 0x65, 0x73, 0x74,
        0x31, 0x31, 0x30, 0x31,
    ];

    fn c_store_request() -> Primitive {
        Primitive::CStore(CStore {
            message_id: Some(7),
            affected_sop_class_uid: Some(Uid::new("1.2.840.10008.5.1.4.1.1.2", false).unwrap()),
            affected_sop_instance_uid: Some(
                Uid::new(
                    "1.2.392.200036.9116.2.6.1.48.1215709044.1459316254.522441",
                    false,
                )
                .unwrap(),
            ),
            priority: Priority::Low,
            move_originator_application_entity_title: AeTitle::new("UNITTEST_SCP").unwrap(),
            move_originator_message_id: Some(3),
            data_set: Some(C_STORE_DS.to_vec()),
            ..Default::default()
        })
    }

    fn short_aet_config() -> DimseConfig {
        DimseConfig::new().use_short_aet(true)
    }

    #[test]
    fn c_store_rq_encodes_to_reference_bytes() {
        let message = Message::from_primitive(&c_store_request(), 1, &short_aet_config()).unwrap();
        let pdus: Vec<_> = message.fragments(16382).unwrap().collect();
        assert_eq!(pdus.len(), 2);

        match &pdus[0] {
            Pdu::PData { data } => {
                assert_eq!(data.len(), 1);
                assert_eq!(data[0].value_type, PDataValueType::Command);
                assert!(data[0].is_last);
                assert_eq!(data[0].data, C_STORE_RQ_CMD);
            }
            pdu => panic!("expected PData, got {:?}", pdu),
        }
        match &pdus[1] {
            Pdu::PData { data } => {
                assert_eq!(data[0].value_type, PDataValueType::Data);
                assert!(data[0].is_last);
                assert_eq!(data[0].data, C_STORE_DS);
            }
            pdu => panic!("expected PData, got {:?}", pdu),
        }
    }

    #[test]
    fn fragments_respect_the_maximum_pdu_size() {
        let message = Message::from_primitive(&c_store_request(), 1, &short_aet_config()).unwrap();
        let max_pdu_size = 64;
        let pdus: Vec<_> = message.fragments(max_pdu_size).unwrap().collect();
        assert!(pdus.len() > 2);

        let mut last_command_fragments = 0;
        let mut last_data_fragments = 0;
        for pdu in &pdus {
            match pdu {
                Pdu::PData { data } => {
                    assert_eq!(data.len(), 1);
                    let value = &data[0];
                    assert!(value.data.len() <= (max_pdu_size - PDV_HEADER_SIZE) as usize);
                    match (value.value_type.clone(), value.is_last) {
                        (PDataValueType::Command, true) => last_command_fragments += 1,
                        (PDataValueType::Data, true) => last_data_fragments += 1,
                        _ => (),
                    }
                }
                pdu => panic!("expected PData, got {:?}", pdu),
            }
        }
        assert_eq!(last_command_fragments, 1);
        assert_eq!(last_data_fragments, 1);
    }

    #[test]
    fn round_trip_preserves_fields() {
        let original = c_store_request();
        let message = Message::from_primitive(&original, 1, &short_aet_config()).unwrap();
        let pdus: Vec<_> = message.fragments(128).unwrap().collect();

        let mut assembler = MessageAssembler::new();
        let mut decoded = None;
        for pdu in pdus {
            match pdu {
                Pdu::PData { data } => {
                    if let Some(message) = assembler.feed_pdata(&data).unwrap() {
                        decoded = Some(message);
                    }
                }
                pdu => panic!("expected PData, got {:?}", pdu),
            }
        }
        let decoded = decoded.expect("message must complete").into_primitive().unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn echo_round_trip() {
        let original = Primitive::CEcho(CEcho::request(
            7,
            Uid::new("1.2.840.10008.1.1", false).unwrap(),
        ));
        let message =
            Message::from_primitive(&original, 3, &DimseConfig::default()).unwrap();
        let pdus: Vec<_> = message.fragments(16382).unwrap().collect();
        assert_eq!(pdus.len(), 1);

        let mut assembler = MessageAssembler::new();
        let decoded = match &pdus[0] {
            Pdu::PData { data } => assembler.feed_pdata(data).unwrap().unwrap(),
            pdu => panic!("expected PData, got {:?}", pdu),
        };
        assert_eq!(decoded.context_id, 3);
        assert_eq!(decoded.into_primitive().unwrap(), original);
    }

    #[test]
    fn data_fragment_before_command_is_invalid() {
        let mut assembler = MessageAssembler::new();
        let result = assembler.feed(&PDataValue {
            presentation_context_id: 1,
            value_type: PDataValueType::Data,
            is_last: true,
            data: vec![0x00],
        });
        assert!(matches!(result, Err(Error::DataBeforeCommand { .. })));
    }

    #[test]
    fn unannounced_data_set_is_invalid() {
        let original = Primitive::CEcho(CEcho::request(
            7,
            Uid::new("1.2.840.10008.1.1", false).unwrap(),
        ));
        let message = Message::from_primitive(&original, 1, &DimseConfig::default()).unwrap();
        let pdus: Vec<_> = message.fragments(16382).unwrap().collect();

        // complete message, then send a stray data fragment
        let mut assembler = MessageAssembler::new();
        match &pdus[0] {
            Pdu::PData { data } => {
                let mut values = data.clone();
                values[0].is_last = false;
                assert!(assembler.feed_pdata(&values).unwrap().is_none());
            }
            pdu => panic!("expected PData, got {:?}", pdu),
        }
        let result = assembler.feed(&PDataValue {
            presentation_context_id: 1,
            value_type: PDataValueType::Data,
            is_last: true,
            data: vec![0x00],
        });
        assert!(matches!(result, Err(Error::DataBeforeCommand { .. })));
    }

    #[test]
    fn missing_mandatory_field_fails_fast() {
        let primitive = Primitive::CEcho(CEcho::default());
        let err = Message::from_primitive(&primitive, 1, &DimseConfig::default()).unwrap_err();
        assert!(matches!(err, BuildError::MissingField { .. }));
    }

    #[test]
    fn unknown_command_field_is_invalid() {
        let mut commands = CommandSet::new();
        commands.put(tags::COMMAND_FIELD, 0x7777_u16);
        commands.put(tags::COMMAND_DATA_SET_TYPE, NO_DATA_SET);
        let mut encoded = Vec::new();
        write_command_set(&mut encoded, &commands).unwrap();

        let mut assembler = MessageAssembler::new();
        let result = assembler.feed(&PDataValue {
            presentation_context_id: 1,
            value_type: PDataValueType::Command,
            is_last: true,
            data: encoded,
        });
        assert!(matches!(result, Err(Error::UnknownCommandField { .. })));
    }
}
