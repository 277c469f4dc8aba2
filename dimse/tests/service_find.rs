//! Dispatcher scenarios for the C-FIND service.
mod common;

use std::sync::Arc;

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::InMemDicomObject;

use dicom_dimse::dataset;
use dicom_dimse::primitives::{CFind, Primitive, Uid};
use dicom_dimse::provider::{CancelToken, DimseProvider};
use dicom_dimse::service::{
    DispatchOutcome, FindHandler, HandlerError, HandlerStatus, PresentationContext,
    ResponseStream, ServiceDispatcher, ServiceHandlers,
};
use dicom_dimse::{AeTitle, DimseConfig};

use common::{deliver, RecordingDul};

fn patient(name: &str) -> InMemDicomObject {
    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(
        tags::QUERY_RETRIEVE_LEVEL,
        VR::CS,
        PrimitiveValue::from("PATIENT"),
    ));
    obj.put(DataElement::new(
        tags::PATIENT_NAME,
        VR::PN,
        PrimitiveValue::from(name),
    ));
    obj
}

fn find_request(message_id: u16) -> Primitive {
    let mut query = InMemDicomObject::new_empty();
    query.put(DataElement::new(
        tags::QUERY_RETRIEVE_LEVEL,
        VR::CS,
        PrimitiveValue::from("PATIENT"),
    ));
    query.put(DataElement::new(
        tags::PATIENT_NAME,
        VR::PN,
        PrimitiveValue::from("*"),
    ));
    let identifier = dataset::write_dataset(&query, uids::IMPLICIT_VR_LITTLE_ENDIAN).unwrap();

    Primitive::CFind(CFind {
        message_id: Some(message_id),
        affected_sop_class_uid: Some(
            Uid::new(uids::PATIENT_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND, false).unwrap(),
        ),
        identifier: Some(identifier),
        ..Default::default()
    })
}

fn find_context() -> PresentationContext {
    PresentationContext {
        id: 1,
        abstract_syntax: uids::PATIENT_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND.to_string(),
        transfer_syntax: uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
    }
}

fn dispatcher_with(
    dul: &RecordingDul,
    handlers: ServiceHandlers,
) -> (Arc<DimseProvider<RecordingDul>>, ServiceDispatcher<RecordingDul>) {
    let provider = Arc::new(DimseProvider::new(dul.clone(), DimseConfig::default()));
    let dispatcher = ServiceDispatcher::new(
        Arc::clone(&provider),
        vec![find_context()],
        AeTitle::new("TEST-SCP").unwrap(),
        handlers,
    );
    (provider, dispatcher)
}

/// Yields two pending matches, then ends without a final status.
struct TwoMatches;

impl FindHandler for TwoMatches {
    fn on_c_find(
        &mut self,
        _request: &CFind,
        _identifier: &InMemDicomObject,
        _context: &PresentationContext,
        _cancel: CancelToken,
    ) -> Result<ResponseStream, HandlerError> {
        let matches = vec![patient("Doe^John"), patient("Doe^Jane")];
        Ok(Box::new(
            matches
                .into_iter()
                .map(|ds| (HandlerStatus::Code(0xFF00), Some(ds))),
        ))
    }
}

#[test]
fn find_streams_pending_matches_then_synthesized_success() {
    let dul = RecordingDul::new();
    let (provider, mut dispatcher) =
        dispatcher_with(&dul, ServiceHandlers::new().on_c_find(TwoMatches));

    deliver(&provider, &find_request(7), 1);
    assert_eq!(dispatcher.serve_one().unwrap(), DispatchOutcome::Handled);

    let sent = dul.sent_primitives();
    assert_eq!(sent.len(), 3);

    for (i, expected_name) in [(0, "Doe^John"), (1, "Doe^Jane")] {
        let (context_id, rsp) = &sent[i];
        assert_eq!(*context_id, 1);
        let Primitive::CFind(rsp) = rsp else {
            panic!("expected a C-FIND response, got {}", rsp.name());
        };
        assert_eq!(rsp.message_id_being_responded_to, Some(7));
        assert_eq!(rsp.status, Some(0xFF00));
        let identifier = dataset::read_dataset(
            rsp.identifier.as_deref().expect("pending carries a match"),
            uids::IMPLICIT_VR_LITTLE_ENDIAN,
        )
        .unwrap();
        assert_eq!(
            identifier
                .element(tags::PATIENT_NAME)
                .unwrap()
                .to_str()
                .unwrap(),
            expected_name
        );
    }

    let Primitive::CFind(last) = &sent[2].1 else {
        panic!("expected a C-FIND response");
    };
    assert_eq!(last.status, Some(0x0000));
    assert_eq!(last.message_id_being_responded_to, Some(7));
    assert!(last.identifier.is_none());
}

/// Yields a cancel response as soon as the token reports cancellation.
struct CancelAware;

impl FindHandler for CancelAware {
    fn on_c_find(
        &mut self,
        _request: &CFind,
        _identifier: &InMemDicomObject,
        _context: &PresentationContext,
        cancel: CancelToken,
    ) -> Result<ResponseStream, HandlerError> {
        let mut remaining = vec![patient("Doe^John"), patient("Doe^Jane")].into_iter();
        Ok(Box::new(std::iter::from_fn(move || {
            if cancel.is_cancelled() {
                return Some((HandlerStatus::Code(0xFE00), None));
            }
            remaining
                .next()
                .map(|ds| (HandlerStatus::Code(0xFF00), Some(ds)))
        })))
    }
}

#[test]
fn cancel_request_is_observed_by_the_handler() {
    let dul = RecordingDul::new();
    let (provider, mut dispatcher) =
        dispatcher_with(&dul, ServiceHandlers::new().on_c_find(CancelAware));

    deliver(&provider, &find_request(42), 1);
    deliver(
        &provider,
        &Primitive::CCancel(dicom_dimse::primitives::CCancel::new(42)),
        1,
    );

    // the cancel request bypassed the indication queue
    assert_eq!(dispatcher.serve_one().unwrap(), DispatchOutcome::Handled);

    let sent = dul.sent_primitives();
    assert_eq!(sent.len(), 1);
    let Primitive::CFind(rsp) = &sent[0].1 else {
        panic!("expected a C-FIND response");
    };
    assert_eq!(rsp.status, Some(0xFE00));
    assert_eq!(rsp.message_id_being_responded_to, Some(42));
}

#[test]
fn corrupt_identifier_is_rejected_before_the_handler_runs() {
    struct MustNotRun;
    impl FindHandler for MustNotRun {
        fn on_c_find(
            &mut self,
            _request: &CFind,
            _identifier: &InMemDicomObject,
            _context: &PresentationContext,
            _cancel: CancelToken,
        ) -> Result<ResponseStream, HandlerError> {
            panic!("handler must not see a corrupt identifier");
        }
    }

    let dul = RecordingDul::new();
    let (provider, mut dispatcher) =
        dispatcher_with(&dul, ServiceHandlers::new().on_c_find(MustNotRun));

    let rq = Primitive::CFind(CFind {
        message_id: Some(3),
        affected_sop_class_uid: Some(
            Uid::new(uids::PATIENT_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND, false).unwrap(),
        ),
        // an element header promising more data than there is
        identifier: Some(vec![0x08, 0x00, 0x05, 0x00, 0xFF, 0xFF, 0x00, 0x00]),
        ..Default::default()
    });
    deliver(&provider, &rq, 1);
    assert_eq!(dispatcher.serve_one().unwrap(), DispatchOutcome::Handled);

    let sent = dul.sent_primitives();
    assert_eq!(sent.len(), 1);
    let Primitive::CFind(rsp) = &sent[0].1 else {
        panic!("expected a C-FIND response");
    };
    assert_eq!(rsp.status, Some(0xC310));
    assert_eq!(
        rsp.error_comment.as_deref(),
        Some("Unable to decode the dataset")
    );
}
