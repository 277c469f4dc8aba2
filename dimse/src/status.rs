//! DIMSE status code taxonomy.
//!
//! Status values are 16-bit codes carried in the _Status_ (0000,0900)
//! element of response messages.
//! The standard groups them into categories
//! (PS3.7, Annex C);
//! the category drives control flow in the service class dispatcher,
//! most notably for the multi-response services.

/// The general category of a DIMSE status code.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum StatusCategory {
    /// The operation completed successfully.
    Success,
    /// The operation was terminated by a C-CANCEL request.
    Cancel,
    /// The operation is continuing.
    Pending,
    /// The operation completed with one or more issues.
    Warning,
    /// The operation failed.
    Failure,
    /// The code is not assigned to any known category.
    Unknown,
}

/// Well known status codes used by the service class implementations.
pub mod codes {
    /// Success.
    pub const SUCCESS: u16 = 0x0000;
    /// Sub-operations or matching terminated due to a Cancel indication.
    pub const CANCEL: u16 = 0xFE00;
    /// Operation is continuing.
    pub const PENDING: u16 = 0xFF00;
    /// Matches are continuing, but one or more optional keys
    /// were not supported.
    pub const PENDING_WARNING: u16 = 0xFF01;

    /// Warning: sub-operations complete, one or more failures or warnings.
    pub const WARNING_SUBOPERATIONS: u16 = 0xB000;
    /// Warning: elements discarded.
    pub const WARNING_ELEMENTS_DISCARDED: u16 = 0xB006;
    /// Warning: data set does not match SOP class.
    pub const WARNING_DATASET_MISMATCH: u16 = 0xB007;

    /// Refused: SOP class not supported.
    pub const SOP_CLASS_NOT_SUPPORTED: u16 = 0x0122;
    /// Refused: not authorised.
    pub const NOT_AUTHORISED: u16 = 0x0124;
    /// Refused: duplicate SOP instance.
    pub const DUPLICATE_SOP_INSTANCE: u16 = 0x0111;
    /// Refused: invalid SOP instance.
    pub const INVALID_SOP_INSTANCE: u16 = 0x0117;
    /// Failed: processing failure.
    pub const PROCESSING_FAILURE: u16 = 0x0110;
    /// Refused: duplicate invocation.
    pub const DUPLICATE_INVOCATION: u16 = 0x0210;
    /// Refused: unrecognised operation.
    pub const UNRECOGNISED_OPERATION: u16 = 0x0211;
    /// Refused: mistyped argument.
    pub const MISTYPED_ARGUMENT: u16 = 0x0212;

    /// Out of resources: unable to calculate the number of matches.
    pub const OUT_OF_RESOURCES_MATCHES: u16 = 0xA701;
    /// Out of resources: unable to perform sub-operations.
    pub const OUT_OF_RESOURCES_SUBOPERATIONS: u16 = 0xA702;
    /// Refused: move destination unknown.
    pub const MOVE_DESTINATION_UNKNOWN: u16 = 0xA801;

    /// A status reply was produced without a status code.
    pub const MISSING_STATUS: u16 = 0xC001;
    /// A status reply of an unrecognized shape was produced.
    pub const INVALID_STATUS_TYPE: u16 = 0xC002;
    /// The C-STORE request data set could not be decoded.
    pub const STORE_DECODE_FAILURE: u16 = 0xC210;
    /// The C-STORE handler failed.
    pub const STORE_HANDLER_FAILURE: u16 = 0xC211;
    /// The C-FIND request identifier could not be decoded.
    pub const FIND_DECODE_FAILURE: u16 = 0xC310;
    /// The C-FIND handler failed.
    pub const FIND_HANDLER_FAILURE: u16 = 0xC311;
    /// A C-FIND match could not be encoded in the negotiated
    /// transfer syntax.
    pub const FIND_ENCODE_FAILURE: u16 = 0xC312;
    /// The C-GET request identifier could not be decoded.
    pub const GET_DECODE_FAILURE: u16 = 0xC410;
    /// The C-GET handler failed.
    pub const GET_HANDLER_FAILURE: u16 = 0xC411;
    /// The C-GET handler reported an unusable sub-operation count.
    pub const GET_SUBOPERATION_COUNT: u16 = 0xC413;
    /// The C-MOVE request identifier could not be decoded.
    pub const MOVE_DECODE_FAILURE: u16 = 0xC510;
    /// The C-MOVE handler failed.
    pub const MOVE_HANDLER_FAILURE: u16 = 0xC511;
    /// The C-MOVE handler reported an unusable sub-operation count.
    pub const MOVE_SUBOPERATION_COUNT: u16 = 0xC513;
    /// The C-MOVE handler produced an unusable result.
    pub const MOVE_BAD_YIELD: u16 = 0xC514;
    /// The C-MOVE destination could not be reached.
    pub const MOVE_BAD_DESTINATION: u16 = 0xC515;
}

/// Determine the general category of a status code,
/// following the taxonomy of PS3.7 Annex C.
pub fn category(code: u16) -> StatusCategory {
    match code {
        0x0000 => StatusCategory::Success,
        0xFE00 => StatusCategory::Cancel,
        0xFF00 | 0xFF01 => StatusCategory::Pending,
        0x0001 | 0x0107 | 0x0116 | 0xB000..=0xBFFF => StatusCategory::Warning,
        0x0100..=0x01FF
        | 0x0200..=0x02FF
        | 0xA000..=0xAFFF
        | 0xC000..=0xCFFF => StatusCategory::Failure,
        _ => StatusCategory::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_of_core_codes() {
        assert_eq!(category(0x0000), StatusCategory::Success);
        assert_eq!(category(0xFE00), StatusCategory::Cancel);
        assert_eq!(category(0xFF00), StatusCategory::Pending);
        assert_eq!(category(0xFF01), StatusCategory::Pending);
        assert_eq!(category(0xB000), StatusCategory::Warning);
        assert_eq!(category(0xB007), StatusCategory::Warning);
        assert_eq!(category(0x0122), StatusCategory::Failure);
        assert_eq!(category(0x0211), StatusCategory::Failure);
        assert_eq!(category(0xA701), StatusCategory::Failure);
        assert_eq!(category(0xA801), StatusCategory::Failure);
        assert_eq!(category(0xA900), StatusCategory::Failure);
        assert_eq!(category(0xC000), StatusCategory::Failure);
        assert_eq!(category(0xCFFF), StatusCategory::Failure);
        assert_eq!(category(0xD000), StatusCategory::Unknown);
    }
}
