//! DIMSE-C service primitives.
use dicom_core::Tag;

use super::{AeTitle, Priority, Uid};

/// A C-ECHO request or response primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CEcho {
    pub message_id: Option<u16>,
    pub message_id_being_responded_to: Option<u16>,
    pub affected_sop_class_uid: Option<Uid>,
    pub status: Option<u16>,
    pub error_comment: Option<String>,
    pub offending_element: Option<Vec<Tag>>,
}

impl CEcho {
    /// Create a verification request with the given message ID.
    pub fn request(message_id: u16, affected_sop_class_uid: Uid) -> Self {
        CEcho {
            message_id: Some(message_id),
            affected_sop_class_uid: Some(affected_sop_class_uid),
            ..Default::default()
        }
    }

    pub fn is_valid_request(&self) -> bool {
        self.message_id.is_some() && self.affected_sop_class_uid.is_some()
    }

    pub fn is_valid_response(&self) -> bool {
        self.message_id_being_responded_to.is_some() && self.status.is_some()
    }
}

/// A C-STORE request or response primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CStore {
    pub message_id: Option<u16>,
    pub message_id_being_responded_to: Option<u16>,
    pub affected_sop_class_uid: Option<Uid>,
    pub affected_sop_instance_uid: Option<Uid>,
    pub priority: Priority,
    /// The composite instance to be stored,
    /// encoded under the presentation context's transfer syntax.
    pub data_set: Option<Vec<u8>>,
    pub move_originator_application_entity_title: Option<AeTitle>,
    pub move_originator_message_id: Option<u16>,
    pub status: Option<u16>,
    pub error_comment: Option<String>,
    pub offending_element: Option<Vec<Tag>>,
}

impl CStore {
    pub fn is_valid_request(&self) -> bool {
        self.message_id.is_some()
            && self.affected_sop_class_uid.is_some()
            && self.affected_sop_instance_uid.is_some()
            && self.data_set.is_some()
    }

    pub fn is_valid_response(&self) -> bool {
        self.message_id_being_responded_to.is_some() && self.status.is_some()
    }
}

/// A C-FIND request or response primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CFind {
    pub message_id: Option<u16>,
    pub message_id_being_responded_to: Option<u16>,
    pub affected_sop_class_uid: Option<Uid>,
    pub priority: Priority,
    /// The query identifier,
    /// encoded under the presentation context's transfer syntax.
    pub identifier: Option<Vec<u8>>,
    pub status: Option<u16>,
    pub error_comment: Option<String>,
    pub offending_element: Option<Vec<Tag>>,
}

impl CFind {
    pub fn is_valid_request(&self) -> bool {
        self.message_id.is_some()
            && self.affected_sop_class_uid.is_some()
            && self.identifier.is_some()
    }

    pub fn is_valid_response(&self) -> bool {
        self.message_id_being_responded_to.is_some() && self.status.is_some()
    }
}

/// A C-GET request or response primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CGet {
    pub message_id: Option<u16>,
    pub message_id_being_responded_to: Option<u16>,
    pub affected_sop_class_uid: Option<Uid>,
    pub priority: Priority,
    /// The retrieve identifier,
    /// encoded under the presentation context's transfer syntax.
    pub identifier: Option<Vec<u8>>,
    pub status: Option<u16>,
    pub number_of_remaining_suboperations: Option<u16>,
    pub number_of_completed_suboperations: Option<u16>,
    pub number_of_failed_suboperations: Option<u16>,
    pub number_of_warning_suboperations: Option<u16>,
    pub error_comment: Option<String>,
    pub offending_element: Option<Vec<Tag>>,
}

impl CGet {
    pub fn is_valid_request(&self) -> bool {
        self.message_id.is_some()
            && self.affected_sop_class_uid.is_some()
            && self.identifier.is_some()
    }

    pub fn is_valid_response(&self) -> bool {
        self.message_id_being_responded_to.is_some() && self.status.is_some()
    }
}

/// A C-MOVE request or response primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CMove {
    pub message_id: Option<u16>,
    pub message_id_being_responded_to: Option<u16>,
    pub affected_sop_class_uid: Option<Uid>,
    pub priority: Priority,
    /// The application entity that the sub-operations are directed to.
    pub move_destination: Option<AeTitle>,
    /// The retrieve identifier,
    /// encoded under the presentation context's transfer syntax.
    pub identifier: Option<Vec<u8>>,
    pub status: Option<u16>,
    pub number_of_remaining_suboperations: Option<u16>,
    pub number_of_completed_suboperations: Option<u16>,
    pub number_of_failed_suboperations: Option<u16>,
    pub number_of_warning_suboperations: Option<u16>,
    pub error_comment: Option<String>,
    pub offending_element: Option<Vec<Tag>>,
}

impl CMove {
    pub fn is_valid_request(&self) -> bool {
        self.message_id.is_some()
            && self.affected_sop_class_uid.is_some()
            && self.move_destination.is_some()
            && self.identifier.is_some()
    }

    pub fn is_valid_response(&self) -> bool {
        self.message_id_being_responded_to.is_some() && self.status.is_some()
    }
}

/// A C-CANCEL request primitive.
///
/// Cancel requests are advisory and out of band:
/// the service provider routes them to a bounded map
/// keyed on the message ID of the operation to cancel,
/// not to the indication queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CCancel {
    pub message_id_being_responded_to: Option<u16>,
}

impl CCancel {
    /// Create a cancel request directed at the given operation.
    pub fn new(message_id_being_responded_to: u16) -> Self {
        CCancel {
            message_id_being_responded_to: Some(message_id_being_responded_to),
        }
    }

    pub fn is_valid_request(&self) -> bool {
        self.message_id_being_responded_to.is_some()
    }
}
