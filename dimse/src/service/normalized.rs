//! Dispatch of the normalized (DIMSE-N) operations.
//!
//! The N-services share one response shape:
//! the affected identifiers are copied back from the request,
//! the handler contributes a status and an optional data set payload,
//! and the payload is re-encoded under
//! the presentation context's transfer syntax.
use dicom_object::InMemDicomObject;
use tracing::{error, warn};

use crate::dataset;
use crate::primitives::{
    NAction, NCreate, NDelete, NEventReport, NGet, NSet, Primitive,
};
use crate::provider::{DimseProvider, Dul};
use crate::service::{
    check_status, send_response, HandlerError, HandlerStatus, PresentationContext, Result,
    ServiceClassKind, ServiceHandlers, StatusDetail,
};
use crate::status::codes::PROCESSING_FAILURE;

/// Serve one DIMSE-N request.
pub(crate) fn scp<D: Dul>(
    handlers: &mut ServiceHandlers,
    provider: &DimseProvider<D>,
    context: &PresentationContext,
    primitive: Primitive,
) -> Result<()> {
    match primitive {
        Primitive::NEventReport(req) => event_report_scp(handlers, provider, context, req),
        Primitive::NGet(req) => n_get_scp(handlers, provider, context, req),
        Primitive::NSet(req) => n_set_scp(handlers, provider, context, req),
        Primitive::NAction(req) => n_action_scp(handlers, provider, context, req),
        Primitive::NCreate(req) => n_create_scp(handlers, provider, context, req),
        Primitive::NDelete(req) => n_delete_scp(handlers, provider, context, req),
        primitive => {
            warn!("{} is not a normalized operation", primitive.name());
            Ok(())
        }
    }
}

/// Resolve a handler result into a status detail,
/// folding errors and absent handlers into a processing failure.
fn resolve(
    operation: &'static str,
    result: Option<std::result::Result<(HandlerStatus, Option<InMemDicomObject>), HandlerError>>,
) -> (StatusDetail, Option<InMemDicomObject>) {
    match result {
        None => {
            warn!("no handler bound for {}", operation);
            (StatusDetail::from_status(PROCESSING_FAILURE), None)
        }
        Some(Err(e)) => {
            error!("exception in the {} handler: {}", operation, e);
            (StatusDetail::from_status(PROCESSING_FAILURE), None)
        }
        Some(Ok((outcome, payload))) => {
            let detail = outcome.into_detail();
            check_status(ServiceClassKind::Normalized, detail.status);
            (detail, payload)
        }
    }
}

/// Encode a reply payload under the context's transfer syntax.
/// Encoding failures drop the payload and turn the status
/// into a processing failure.
fn encode_payload(
    detail: &mut StatusDetail,
    payload: Option<InMemDicomObject>,
    context: &PresentationContext,
) -> Option<Vec<u8>> {
    let payload = payload?;
    match dataset::write_dataset(&payload, &context.transfer_syntax) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            error!("could not encode the response payload: {}", e);
            detail.status = PROCESSING_FAILURE;
            None
        }
    }
}

fn event_report_scp<D: Dul>(
    handlers: &mut ServiceHandlers,
    provider: &DimseProvider<D>,
    context: &PresentationContext,
    req: NEventReport,
) -> Result<()> {
    let result = handlers
        .on_n_event_report
        .as_mut()
        .map(|handler| handler.on_n_event_report(&req, context));
    let (mut detail, payload) = resolve("N-EVENT-REPORT", result);
    let event_reply = encode_payload(&mut detail, payload, context);

    let rsp = NEventReport {
        message_id_being_responded_to: req.message_id,
        affected_sop_class_uid: req.affected_sop_class_uid.clone(),
        affected_sop_instance_uid: req.affected_sop_instance_uid.clone(),
        event_type_id: req.event_type_id,
        event_reply,
        status: Some(detail.status),
        error_comment: detail.error_comment,
        offending_element: detail.offending_element,
        ..Default::default()
    };
    send_response(provider, context.id, Primitive::NEventReport(rsp))
}

fn n_get_scp<D: Dul>(
    handlers: &mut ServiceHandlers,
    provider: &DimseProvider<D>,
    context: &PresentationContext,
    req: NGet,
) -> Result<()> {
    let result = handlers
        .on_n_get
        .as_mut()
        .map(|handler| handler.on_n_get(&req, context));
    let (mut detail, payload) = resolve("N-GET", result);
    let attribute_list = encode_payload(&mut detail, payload, context);

    let rsp = NGet {
        message_id_being_responded_to: req.message_id,
        affected_sop_class_uid: req.requested_sop_class_uid.clone(),
        affected_sop_instance_uid: req.requested_sop_instance_uid.clone(),
        attribute_list,
        status: Some(detail.status),
        error_comment: detail.error_comment,
        offending_element: detail.offending_element,
        ..Default::default()
    };
    send_response(provider, context.id, Primitive::NGet(rsp))
}

fn n_set_scp<D: Dul>(
    handlers: &mut ServiceHandlers,
    provider: &DimseProvider<D>,
    context: &PresentationContext,
    req: NSet,
) -> Result<()> {
    // the modification list must decode before user code runs
    let modification_list = match req
        .modification_list
        .as_deref()
        .map(|bytes| dataset::read_dataset(bytes, &context.transfer_syntax))
    {
        Some(Ok(list)) => Some(list),
        None => None,
        Some(Err(e)) => {
            error!("failed to decode the modification list: {}", e);
            let rsp = NSet {
                message_id_being_responded_to: req.message_id,
                affected_sop_class_uid: req.requested_sop_class_uid.clone(),
                affected_sop_instance_uid: req.requested_sop_instance_uid.clone(),
                status: Some(PROCESSING_FAILURE),
                error_comment: Some("Unable to decode the dataset".to_string()),
                ..Default::default()
            };
            return send_response(provider, context.id, Primitive::NSet(rsp));
        }
    };

    let result = match (handlers.on_n_set.as_mut(), modification_list) {
        (Some(handler), Some(list)) => Some(handler.on_n_set(&req, &list, context)),
        (Some(handler), None) => {
            Some(handler.on_n_set(&req, &InMemDicomObject::new_empty(), context))
        }
        (None, _) => None,
    };
    let (mut detail, payload) = resolve("N-SET", result);
    let attribute_list = encode_payload(&mut detail, payload, context);

    let rsp = NSet {
        message_id_being_responded_to: req.message_id,
        affected_sop_class_uid: req.requested_sop_class_uid.clone(),
        affected_sop_instance_uid: req.requested_sop_instance_uid.clone(),
        attribute_list,
        status: Some(detail.status),
        error_comment: detail.error_comment,
        offending_element: detail.offending_element,
        ..Default::default()
    };
    send_response(provider, context.id, Primitive::NSet(rsp))
}

fn n_action_scp<D: Dul>(
    handlers: &mut ServiceHandlers,
    provider: &DimseProvider<D>,
    context: &PresentationContext,
    req: NAction,
) -> Result<()> {
    let result = handlers
        .on_n_action
        .as_mut()
        .map(|handler| handler.on_n_action(&req, context));
    let (mut detail, payload) = resolve("N-ACTION", result);
    let action_reply = encode_payload(&mut detail, payload, context);

    let rsp = NAction {
        message_id_being_responded_to: req.message_id,
        affected_sop_class_uid: req.requested_sop_class_uid.clone(),
        affected_sop_instance_uid: req.requested_sop_instance_uid.clone(),
        action_type_id: req.action_type_id,
        action_reply,
        status: Some(detail.status),
        error_comment: detail.error_comment,
        offending_element: detail.offending_element,
        ..Default::default()
    };
    send_response(provider, context.id, Primitive::NAction(rsp))
}

fn n_create_scp<D: Dul>(
    handlers: &mut ServiceHandlers,
    provider: &DimseProvider<D>,
    context: &PresentationContext,
    req: NCreate,
) -> Result<()> {
    let result = handlers
        .on_n_create
        .as_mut()
        .map(|handler| handler.on_n_create(&req, context));
    let (mut detail, payload) = resolve("N-CREATE", result);
    let attribute_list = encode_payload(&mut detail, payload, context);

    let rsp = NCreate {
        message_id_being_responded_to: req.message_id,
        affected_sop_class_uid: req.affected_sop_class_uid.clone(),
        affected_sop_instance_uid: detail
            .affected_sop_instance_uid
            .take()
            .or_else(|| req.affected_sop_instance_uid.clone()),
        attribute_list,
        status: Some(detail.status),
        error_comment: detail.error_comment,
        offending_element: detail.offending_element,
        ..Default::default()
    };
    send_response(provider, context.id, Primitive::NCreate(rsp))
}

fn n_delete_scp<D: Dul>(
    handlers: &mut ServiceHandlers,
    provider: &DimseProvider<D>,
    context: &PresentationContext,
    req: NDelete,
) -> Result<()> {
    let outcome = match handlers.on_n_delete.as_mut() {
        None => {
            warn!("no handler bound for N-DELETE");
            HandlerStatus::Code(PROCESSING_FAILURE)
        }
        Some(handler) => match handler.on_n_delete(&req, context) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("exception in the N-DELETE handler: {}", e);
                HandlerStatus::Code(PROCESSING_FAILURE)
            }
        },
    };
    let detail = outcome.into_detail();
    check_status(ServiceClassKind::Normalized, detail.status);

    let rsp = NDelete {
        message_id_being_responded_to: req.message_id,
        affected_sop_class_uid: req.requested_sop_class_uid.clone(),
        affected_sop_instance_uid: req.requested_sop_instance_uid.clone(),
        status: Some(detail.status),
        error_comment: detail.error_comment,
        offending_element: detail.offending_element,
        ..Default::default()
    };
    send_response(provider, context.id, Primitive::NDelete(rsp))
}
