//! The verification service class.
use tracing::warn;

use crate::primitives::{CEcho, Primitive};
use crate::provider::{DimseProvider, Dul};
use crate::service::{
    check_status, send_response, PresentationContext, Result, ServiceClassKind, ServiceHandlers,
};

/// Serve one C-ECHO request.
///
/// Verification must not fail because of user code:
/// handler errors and absent handlers alike
/// are answered with Success.
pub(crate) fn scp<D: Dul>(
    handlers: &mut ServiceHandlers,
    provider: &DimseProvider<D>,
    context: &PresentationContext,
    req: CEcho,
) -> Result<()> {
    let mut rsp = CEcho {
        message_id: req.message_id,
        message_id_being_responded_to: req.message_id,
        affected_sop_class_uid: req.affected_sop_class_uid.clone(),
        status: Some(0x0000),
        ..Default::default()
    };

    match handlers.on_c_echo.as_mut() {
        None => {
            warn!("no handler bound for C-ECHO, responding with Success");
        }
        Some(handler) => match handler.on_c_echo(&req, context) {
            Ok(outcome) => {
                let detail = outcome.into_detail();
                check_status(ServiceClassKind::Verification, detail.status);
                rsp.status = Some(detail.status);
                rsp.error_comment = detail.error_comment;
                rsp.offending_element = detail.offending_element;
            }
            Err(e) => {
                warn!(
                    "exception in the C-ECHO handler, responding with Success: {}",
                    e
                );
                rsp.status = Some(0x0000);
            }
        },
    }

    send_response(provider, context.id, Primitive::CEcho(rsp))
}
