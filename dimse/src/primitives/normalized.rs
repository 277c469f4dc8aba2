//! DIMSE-N service primitives.
use dicom_core::Tag;

use super::Uid;

/// An N-EVENT-REPORT request or response primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NEventReport {
    pub message_id: Option<u16>,
    pub message_id_being_responded_to: Option<u16>,
    pub affected_sop_class_uid: Option<Uid>,
    pub affected_sop_instance_uid: Option<Uid>,
    pub event_type_id: Option<u16>,
    /// Event information, encoded under the context's transfer syntax.
    pub event_information: Option<Vec<u8>>,
    /// Event reply, encoded under the context's transfer syntax.
    pub event_reply: Option<Vec<u8>>,
    pub status: Option<u16>,
    pub error_comment: Option<String>,
    pub offending_element: Option<Vec<Tag>>,
}

impl NEventReport {
    pub fn is_valid_request(&self) -> bool {
        self.message_id.is_some()
            && self.affected_sop_class_uid.is_some()
            && self.affected_sop_instance_uid.is_some()
            && self.event_type_id.is_some()
    }

    pub fn is_valid_response(&self) -> bool {
        self.message_id_being_responded_to.is_some() && self.status.is_some()
    }
}

/// An N-GET request or response primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NGet {
    pub message_id: Option<u16>,
    pub message_id_being_responded_to: Option<u16>,
    pub requested_sop_class_uid: Option<Uid>,
    pub requested_sop_instance_uid: Option<Uid>,
    /// The attributes to retrieve (VR AT).
    pub attribute_identifier_list: Option<Vec<Tag>>,
    pub affected_sop_class_uid: Option<Uid>,
    pub affected_sop_instance_uid: Option<Uid>,
    /// Attribute list, encoded under the context's transfer syntax.
    pub attribute_list: Option<Vec<u8>>,
    pub status: Option<u16>,
    pub error_comment: Option<String>,
    pub offending_element: Option<Vec<Tag>>,
}

impl NGet {
    pub fn is_valid_request(&self) -> bool {
        self.message_id.is_some()
            && self.requested_sop_class_uid.is_some()
            && self.requested_sop_instance_uid.is_some()
    }

    pub fn is_valid_response(&self) -> bool {
        self.message_id_being_responded_to.is_some() && self.status.is_some()
    }
}

/// An N-SET request or response primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NSet {
    pub message_id: Option<u16>,
    pub message_id_being_responded_to: Option<u16>,
    pub requested_sop_class_uid: Option<Uid>,
    pub requested_sop_instance_uid: Option<Uid>,
    /// Modification list, encoded under the context's transfer syntax.
    pub modification_list: Option<Vec<u8>>,
    pub affected_sop_class_uid: Option<Uid>,
    pub affected_sop_instance_uid: Option<Uid>,
    /// Attribute list, encoded under the context's transfer syntax.
    pub attribute_list: Option<Vec<u8>>,
    pub status: Option<u16>,
    pub error_comment: Option<String>,
    pub offending_element: Option<Vec<Tag>>,
}

impl NSet {
    pub fn is_valid_request(&self) -> bool {
        self.message_id.is_some()
            && self.requested_sop_class_uid.is_some()
            && self.requested_sop_instance_uid.is_some()
            && self.modification_list.is_some()
    }

    pub fn is_valid_response(&self) -> bool {
        self.message_id_being_responded_to.is_some() && self.status.is_some()
    }
}

/// An N-ACTION request or response primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NAction {
    pub message_id: Option<u16>,
    pub message_id_being_responded_to: Option<u16>,
    pub requested_sop_class_uid: Option<Uid>,
    pub requested_sop_instance_uid: Option<Uid>,
    pub action_type_id: Option<u16>,
    /// Action information, encoded under the context's transfer syntax.
    pub action_information: Option<Vec<u8>>,
    pub affected_sop_class_uid: Option<Uid>,
    pub affected_sop_instance_uid: Option<Uid>,
    /// Action reply, encoded under the context's transfer syntax.
    pub action_reply: Option<Vec<u8>>,
    pub status: Option<u16>,
    pub error_comment: Option<String>,
    pub offending_element: Option<Vec<Tag>>,
}

impl NAction {
    pub fn is_valid_request(&self) -> bool {
        self.message_id.is_some()
            && self.requested_sop_class_uid.is_some()
            && self.requested_sop_instance_uid.is_some()
            && self.action_type_id.is_some()
    }

    pub fn is_valid_response(&self) -> bool {
        self.message_id_being_responded_to.is_some() && self.status.is_some()
    }
}

/// An N-CREATE request or response primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NCreate {
    pub message_id: Option<u16>,
    pub message_id_being_responded_to: Option<u16>,
    pub affected_sop_class_uid: Option<Uid>,
    pub affected_sop_instance_uid: Option<Uid>,
    /// Attribute list, encoded under the context's transfer syntax.
    pub attribute_list: Option<Vec<u8>>,
    pub status: Option<u16>,
    pub error_comment: Option<String>,
    pub offending_element: Option<Vec<Tag>>,
}

impl NCreate {
    pub fn is_valid_request(&self) -> bool {
        self.message_id.is_some() && self.affected_sop_class_uid.is_some()
    }

    pub fn is_valid_response(&self) -> bool {
        self.message_id_being_responded_to.is_some() && self.status.is_some()
    }
}

/// An N-DELETE request or response primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NDelete {
    pub message_id: Option<u16>,
    pub message_id_being_responded_to: Option<u16>,
    pub requested_sop_class_uid: Option<Uid>,
    pub requested_sop_instance_uid: Option<Uid>,
    pub affected_sop_class_uid: Option<Uid>,
    pub affected_sop_instance_uid: Option<Uid>,
    pub status: Option<u16>,
    pub error_comment: Option<String>,
    pub offending_element: Option<Vec<Tag>>,
}

impl NDelete {
    pub fn is_valid_request(&self) -> bool {
        self.message_id.is_some()
            && self.requested_sop_class_uid.is_some()
            && self.requested_sop_instance_uid.is_some()
    }

    pub fn is_valid_response(&self) -> bool {
        self.message_id_being_responded_to.is_some() && self.status.is_some()
    }
}
