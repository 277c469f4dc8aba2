//! Dispatcher scenarios for the C-GET and C-MOVE retrieve engines.
mod common;

use std::sync::Arc;

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::InMemDicomObject;

use dicom_dimse::dataset;
use dicom_dimse::primitives::{CGet, CMove, CStore, Primitive, Uid};
use dicom_dimse::provider::{CancelToken, DimseProvider};
use dicom_dimse::service::{
    DispatchOutcome, GetHandler, HandlerError, HandlerStatus, MoveHandler, MoveSubOperations,
    PresentationContext, ServiceDispatcher, ServiceHandlers, SubOperations,
};
use dicom_dimse::{AeTitle, DimseConfig};

use common::{deliver, RecordingDul};

const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";

fn instance(uid: &str) -> InMemDicomObject {
    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(
        tags::SOP_CLASS_UID,
        VR::UI,
        PrimitiveValue::from(CT_IMAGE_STORAGE),
    ));
    obj.put(DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(uid),
    ));
    obj.put(DataElement::new(
        tags::PATIENT_ID,
        VR::LO,
        PrimitiveValue::from("Test1101"),
    ));
    obj
}

fn retrieve_identifier() -> Vec<u8> {
    let mut query = InMemDicomObject::new_empty();
    query.put(DataElement::new(
        tags::QUERY_RETRIEVE_LEVEL,
        VR::CS,
        PrimitiveValue::from("STUDY"),
    ));
    dataset::write_dataset(&query, uids::IMPLICIT_VR_LITTLE_ENDIAN).unwrap()
}

fn contexts() -> Vec<PresentationContext> {
    vec![
        PresentationContext {
            id: 1,
            abstract_syntax: uids::PATIENT_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_GET.to_string(),
            transfer_syntax: uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
        },
        PresentationContext {
            id: 3,
            abstract_syntax: CT_IMAGE_STORAGE.to_string(),
            transfer_syntax: uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
        },
        PresentationContext {
            id: 5,
            abstract_syntax: uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE.to_string(),
            transfer_syntax: uids::IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
        },
    ]
}

fn harness(
    dul: &RecordingDul,
    handlers: ServiceHandlers,
) -> (Arc<DimseProvider<RecordingDul>>, ServiceDispatcher<RecordingDul>) {
    // a short timeout turns engine deadlocks into test failures
    let config = DimseConfig::new().dimse_timeout(std::time::Duration::from_millis(500));
    let provider = Arc::new(DimseProvider::new(dul.clone(), config));
    let dispatcher = ServiceDispatcher::new(
        Arc::clone(&provider),
        contexts(),
        AeTitle::new("RETRIEVE-SCP").unwrap(),
        handlers,
    );
    (provider, dispatcher)
}

fn store_response(message_id: u16, status: u16) -> Primitive {
    Primitive::CStore(CStore {
        message_id_being_responded_to: Some(message_id),
        status: Some(status),
        ..Default::default()
    })
}

/// Announces two sub-operations and yields both instances as pending.
struct TwoInstances;

impl GetHandler for TwoInstances {
    fn on_c_get(
        &mut self,
        _request: &CGet,
        _identifier: &InMemDicomObject,
        _context: &PresentationContext,
        _cancel: CancelToken,
    ) -> Result<SubOperations, HandlerError> {
        let instances = vec![instance("1.2.3.1"), instance("1.2.3.2")];
        Ok(SubOperations {
            count: 2,
            responses: Box::new(
                instances
                    .into_iter()
                    .map(|ds| (HandlerStatus::Code(0xFF00), Some(ds))),
            ),
        })
    }
}

#[test]
fn get_with_one_failing_suboperation_rolls_up_to_warning() {
    let dul = RecordingDul::new();
    let (provider, mut dispatcher) =
        harness(&dul, ServiceHandlers::new().on_c_get(TwoInstances));

    let rq = Primitive::CGet(CGet {
        message_id: Some(11),
        affected_sop_class_uid: Some(
            Uid::new(uids::PATIENT_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_GET, false).unwrap(),
        ),
        identifier: Some(retrieve_identifier()),
        ..Default::default()
    });
    deliver(&provider, &rq, 1);
    // pre-load the peer's store confirmations:
    // the first sub-operation fails, the second succeeds
    deliver(&provider, &store_response(1, 0xC000), 3);
    deliver(&provider, &store_response(2, 0x0000), 3);

    assert_eq!(dispatcher.serve_one().unwrap(), DispatchOutcome::Handled);

    let sent = dul.sent_primitives();
    // two C-STORE sub-operations, two interim Pending responses, one final
    assert_eq!(sent.len(), 5);

    let stores: Vec<_> = sent
        .iter()
        .filter_map(|(context_id, p)| match p {
            Primitive::CStore(store) if store.message_id_being_responded_to.is_none() => {
                Some((*context_id, store))
            }
            _ => None,
        })
        .collect();
    assert_eq!(stores.len(), 2);
    for (context_id, store) in &stores {
        // sub-operations ride the storage context of the same association
        assert_eq!(*context_id, 3);
        assert_eq!(
            store.affected_sop_class_uid.as_ref().unwrap().as_str(),
            CT_IMAGE_STORAGE
        );
        assert!(store.data_set.is_some());
    }

    let pendings: Vec<_> = sent
        .iter()
        .filter_map(|(_, p)| match p {
            Primitive::CGet(rsp) if rsp.status == Some(0xFF00) => Some(rsp),
            _ => None,
        })
        .collect();
    assert_eq!(pendings.len(), 2);
    assert_eq!(pendings[0].number_of_remaining_suboperations, Some(1));
    assert_eq!(pendings[0].number_of_failed_suboperations, Some(1));
    assert_eq!(pendings[1].number_of_remaining_suboperations, Some(0));
    assert_eq!(pendings[1].number_of_completed_suboperations, Some(1));

    let (context_id, last) = sent.last().unwrap();
    assert_eq!(*context_id, 1);
    let Primitive::CGet(last) = last else {
        panic!("expected a C-GET response, got {}", last.name());
    };
    assert_eq!(last.message_id_being_responded_to, Some(11));
    assert_eq!(last.status, Some(0xB000));
    assert_eq!(last.number_of_failed_suboperations, Some(1));
    assert_eq!(last.number_of_completed_suboperations, Some(1));
    assert_eq!(last.number_of_warning_suboperations, Some(0));
    assert_eq!(last.number_of_remaining_suboperations, None);

    let identifier = dataset::read_dataset(
        last.identifier.as_deref().expect("warning carries a list"),
        uids::IMPLICIT_VR_LITTLE_ENDIAN,
    )
    .unwrap();
    let failed = identifier
        .element(tags::FAILED_SOP_INSTANCE_UID_LIST)
        .unwrap()
        .value()
        .to_multi_str()
        .unwrap()
        .to_vec();
    let failed: Vec<_> = failed
        .iter()
        .map(|s| s.trim_end_matches('\0').to_string())
        .collect();
    assert_eq!(failed, vec!["1.2.3.1".to_string()]);
}

/// Reports that the destination AE title cannot be resolved.
struct UnknownDestination;

impl MoveHandler for UnknownDestination {
    fn on_c_move(
        &mut self,
        _request: &CMove,
        _identifier: &InMemDicomObject,
        _context: &PresentationContext,
        _cancel: CancelToken,
    ) -> Result<MoveSubOperations, HandlerError> {
        Ok(MoveSubOperations {
            destination: None,
            store_classes: vec![CT_IMAGE_STORAGE.to_string()],
            sub_operations: SubOperations {
                count: 2,
                responses: Box::new(std::iter::empty()),
            },
        })
    }
}

#[test]
fn move_with_unknown_destination_responds_once_with_a801() {
    let dul = RecordingDul::new();
    let (provider, mut dispatcher) =
        harness(&dul, ServiceHandlers::new().on_c_move(UnknownDestination));

    let rq = Primitive::CMove(CMove {
        message_id: Some(21),
        affected_sop_class_uid: Some(
            Uid::new(uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE, false).unwrap(),
        ),
        move_destination: AeTitle::new("NOWHERE-SCP").unwrap(),
        identifier: Some(retrieve_identifier()),
        ..Default::default()
    });
    deliver(&provider, &rq, 5);

    assert_eq!(dispatcher.serve_one().unwrap(), DispatchOutcome::Handled);

    let sent = dul.sent_primitives();
    assert_eq!(sent.len(), 1);
    let Primitive::CMove(rsp) = &sent[0].1 else {
        panic!("expected a C-MOVE response");
    };
    assert_eq!(rsp.message_id_being_responded_to, Some(21));
    assert_eq!(rsp.status, Some(0xA801));
}

/// Announces more instances than sub-operations;
/// the excess yields must be ignored.
struct OverCommitted;

impl GetHandler for OverCommitted {
    fn on_c_get(
        &mut self,
        _request: &CGet,
        _identifier: &InMemDicomObject,
        _context: &PresentationContext,
        _cancel: CancelToken,
    ) -> Result<SubOperations, HandlerError> {
        let instances = vec![instance("1.2.3.1"), instance("1.2.3.2")];
        Ok(SubOperations {
            count: 1,
            responses: Box::new(
                instances
                    .into_iter()
                    .map(|ds| (HandlerStatus::Code(0xFF00), Some(ds))),
            ),
        })
    }
}

#[test]
fn excess_handler_yields_are_ignored_once_suboperations_complete() {
    let dul = RecordingDul::new();
    let (provider, mut dispatcher) =
        harness(&dul, ServiceHandlers::new().on_c_get(OverCommitted));

    let rq = Primitive::CGet(CGet {
        message_id: Some(31),
        affected_sop_class_uid: Some(
            Uid::new(uids::PATIENT_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_GET, false).unwrap(),
        ),
        identifier: Some(retrieve_identifier()),
        ..Default::default()
    });
    deliver(&provider, &rq, 1);
    deliver(&provider, &store_response(1, 0x0000), 3);

    assert_eq!(dispatcher.serve_one().unwrap(), DispatchOutcome::Handled);

    let sent = dul.sent_primitives();
    // one sub-operation, one interim Pending, one final Success
    assert_eq!(sent.len(), 3);
    let Primitive::CGet(last) = &sent.last().unwrap().1 else {
        panic!("expected a C-GET response");
    };
    assert_eq!(last.status, Some(0x0000));
    assert_eq!(last.number_of_completed_suboperations, Some(1));
    assert_eq!(last.number_of_failed_suboperations, Some(0));
    assert!(last.identifier.is_none());
}
