//! Dispatcher scenarios for verification and storage.
mod common;

use std::sync::Arc;

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::InMemDicomObject;
use dicom_ul::pdu::Pdu;

use dicom_dimse::dataset;
use dicom_dimse::primitives::{CEcho, CStore, Primitive, Uid};
use dicom_dimse::provider::DimseProvider;
use dicom_dimse::service::{
    DispatchOutcome, EchoHandler, HandlerError, HandlerStatus, PresentationContext,
    ServiceDispatcher, ServiceHandlers, StoreHandler,
};
use dicom_dimse::{AeTitle, DimseConfig, StatusDetail};

use common::{deliver, RecordingDul};

const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";

fn contexts() -> Vec<PresentationContext> {
    vec![
        PresentationContext {
            id: 1,
            abstract_syntax: uids::VERIFICATION.to_string(),
            transfer_syntax: uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
        },
        PresentationContext {
            id: 3,
            abstract_syntax: CT_IMAGE_STORAGE.to_string(),
            transfer_syntax: uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
        },
        PresentationContext {
            id: 5,
            abstract_syntax: "1.2.276.0.7230010.3.5.1.1".to_string(),
            transfer_syntax: uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
        },
    ]
}

fn harness(
    dul: &RecordingDul,
    handlers: ServiceHandlers,
) -> (Arc<DimseProvider<RecordingDul>>, ServiceDispatcher<RecordingDul>) {
    let provider = Arc::new(DimseProvider::new(dul.clone(), DimseConfig::default()));
    let dispatcher = ServiceDispatcher::new(
        Arc::clone(&provider),
        contexts(),
        AeTitle::new("STORE-SCP").unwrap(),
        handlers,
    );
    (provider, dispatcher)
}

fn store_request(message_id: u16, data_set: Vec<u8>) -> Primitive {
    Primitive::CStore(CStore {
        message_id: Some(message_id),
        affected_sop_class_uid: Some(Uid::new(CT_IMAGE_STORAGE, false).unwrap()),
        affected_sop_instance_uid: Some(Uid::new("1.2.3.4.5", false).unwrap()),
        data_set: Some(data_set),
        ..Default::default()
    })
}

struct FailingEcho;

impl EchoHandler for FailingEcho {
    fn on_c_echo(
        &mut self,
        _request: &CEcho,
        _context: &PresentationContext,
    ) -> Result<HandlerStatus, HandlerError> {
        Err("verification handler broke".into())
    }
}

#[test]
fn echo_handler_failures_are_swallowed() {
    let dul = RecordingDul::new();
    let (provider, mut dispatcher) =
        harness(&dul, ServiceHandlers::new().on_c_echo(FailingEcho));

    let rq = Primitive::CEcho(CEcho::request(
        7,
        Uid::new(uids::VERIFICATION, false).unwrap(),
    ));
    deliver(&provider, &rq, 1);
    assert_eq!(dispatcher.serve_one().unwrap(), DispatchOutcome::Handled);

    let sent = dul.sent_primitives();
    assert_eq!(sent.len(), 1);
    let Primitive::CEcho(rsp) = &sent[0].1 else {
        panic!("expected a C-ECHO response");
    };
    assert_eq!(rsp.status, Some(0x0000));
    assert_eq!(rsp.message_id_being_responded_to, Some(7));
    assert_eq!(
        rsp.affected_sop_class_uid.as_ref().unwrap().as_str(),
        uids::VERIFICATION
    );
}

struct RecordingStore;

impl StoreHandler for RecordingStore {
    fn on_c_store(
        &mut self,
        _request: &CStore,
        data_set: &InMemDicomObject,
        _context: &PresentationContext,
    ) -> Result<HandlerStatus, HandlerError> {
        // the data set was decoded before we were called
        let patient_id = data_set.element(tags::PATIENT_ID)?.to_str()?;
        if patient_id == "Test1101" {
            Ok(HandlerStatus::Code(0x0000))
        } else {
            Ok(HandlerStatus::Detail(StatusDetail {
                status: 0xA900,
                error_comment: Some("unexpected patient".to_string()),
                ..Default::default()
            }))
        }
    }
}

#[test]
fn store_delivers_the_decoded_data_set_to_the_handler() {
    let dul = RecordingDul::new();
    let (provider, mut dispatcher) =
        harness(&dul, ServiceHandlers::new().on_c_store(RecordingStore));

    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(
        tags::PATIENT_ID,
        VR::LO,
        PrimitiveValue::from("Test1101"),
    ));
    let bytes = dataset::write_dataset(&obj, uids::IMPLICIT_VR_LITTLE_ENDIAN).unwrap();

    deliver(&provider, &store_request(9, bytes), 3);
    assert_eq!(dispatcher.serve_one().unwrap(), DispatchOutcome::Handled);

    let sent = dul.sent_primitives();
    assert_eq!(sent.len(), 1);
    let Primitive::CStore(rsp) = &sent[0].1 else {
        panic!("expected a C-STORE response");
    };
    assert_eq!(rsp.status, Some(0x0000));
    assert_eq!(rsp.message_id_being_responded_to, Some(9));
    assert_eq!(
        rsp.affected_sop_instance_uid.as_ref().unwrap().as_str(),
        "1.2.3.4.5"
    );
}

#[test]
fn store_with_undecodable_data_set_fails_with_c210() {
    let dul = RecordingDul::new();
    let (provider, mut dispatcher) =
        harness(&dul, ServiceHandlers::new().on_c_store(RecordingStore));

    // an element header promising more data than there is
    let garbage = vec![0x08, 0x00, 0x05, 0x00, 0xFF, 0xFF, 0x00, 0x00];
    deliver(&provider, &store_request(10, garbage), 3);
    assert_eq!(dispatcher.serve_one().unwrap(), DispatchOutcome::Handled);

    let sent = dul.sent_primitives();
    assert_eq!(sent.len(), 1);
    let Primitive::CStore(rsp) = &sent[0].1 else {
        panic!("expected a C-STORE response");
    };
    assert_eq!(rsp.status, Some(0xC210));
    assert_eq!(
        rsp.error_comment.as_deref(),
        Some("Unable to decode the dataset")
    );
}

#[test]
fn request_for_an_unserviceable_sop_class_aborts() {
    let dul = RecordingDul::new();
    let (provider, mut dispatcher) = harness(&dul, ServiceHandlers::new());

    // negotiated, but mapped to no known service class
    let rq = Primitive::CEcho(CEcho::request(
        2,
        Uid::new("1.2.276.0.7230010.3.5.1.1", false).unwrap(),
    ));
    deliver(&provider, &rq, 5);

    assert!(dispatcher.serve_one().is_err());
    assert!(dul
        .sent()
        .iter()
        .any(|pdu| matches!(pdu, Pdu::AbortRQ { .. })));
}
