//! The storage service class.
use tracing::{error, warn};

use crate::dataset;
use crate::primitives::{CStore, Primitive};
use crate::provider::{DimseProvider, Dul};
use crate::service::{
    check_status, send_response, PresentationContext, Result, ServiceClassKind, ServiceHandlers,
};
use crate::status::codes;

/// Serve one C-STORE request.
pub(crate) fn scp<D: Dul>(
    handlers: &mut ServiceHandlers,
    provider: &DimseProvider<D>,
    context: &PresentationContext,
    req: CStore,
) -> Result<()> {
    let mut rsp = CStore {
        message_id: req.message_id,
        message_id_being_responded_to: req.message_id,
        affected_sop_class_uid: req.affected_sop_class_uid.clone(),
        affected_sop_instance_uid: req.affected_sop_instance_uid.clone(),
        ..Default::default()
    };

    // the data set must decode under the negotiated transfer syntax
    // before any user code sees the request
    let decoded = match req.data_set.as_deref() {
        None => None,
        Some(bytes) => match dataset::read_dataset(bytes, &context.transfer_syntax) {
            Ok(data_set) => Some(data_set),
            Err(e) => {
                error!("{}", e);
                None
            }
        },
    };
    let Some(data_set) = decoded else {
        error!("failed to decode the received data set");
        rsp.status = Some(codes::STORE_DECODE_FAILURE);
        rsp.error_comment = Some("Unable to decode the dataset".to_string());
        return send_response(provider, context.id, Primitive::CStore(rsp));
    };

    let outcome = match handlers.on_c_store.as_mut() {
        None => {
            warn!("no handler bound for C-STORE");
            codes::STORE_HANDLER_FAILURE.into()
        }
        Some(handler) => match handler.on_c_store(&req, &data_set, context) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("exception in the C-STORE handler: {}", e);
                codes::STORE_HANDLER_FAILURE.into()
            }
        },
    };

    let detail = outcome.into_detail();
    check_status(ServiceClassKind::Storage, detail.status);
    rsp.status = Some(detail.status);
    rsp.error_comment = detail.error_comment;
    rsp.offending_element = detail.offending_element;
    if let Some(uid) = detail.affected_sop_instance_uid {
        rsp.affected_sop_instance_uid = Some(uid);
    }

    send_response(provider, context.id, Primitive::CStore(rsp))
}
