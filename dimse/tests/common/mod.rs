//! Shared test harness: a scripted in-memory upper layer.
#![allow(dead_code)]
use std::sync::{Arc, Mutex};

use dicom_dimse::message::MessageAssembler;
use dicom_dimse::primitives::Primitive;
use dicom_dimse::provider::{DimseProvider, Dul, UpperLayerEvent};
use dicom_dimse::{DimseConfig, Message};
use dicom_ul::pdu::Pdu;

/// An upper layer double which records everything pushed into it.
#[derive(Debug, Default, Clone)]
pub struct RecordingDul {
    inner: Arc<Mutex<Recorded>>,
}

#[derive(Debug, Default)]
struct Recorded {
    pdus: Vec<Pdu>,
    events: Vec<UpperLayerEvent>,
}

impl RecordingDul {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every PDU sent so far.
    pub fn sent(&self) -> Vec<Pdu> {
        self.inner.lock().unwrap().pdus.clone()
    }

    /// Every event escalated so far.
    pub fn events(&self) -> Vec<UpperLayerEvent> {
        self.inner.lock().unwrap().events.clone()
    }

    /// Reassemble the sent P-DATA stream back into primitives.
    pub fn sent_primitives(&self) -> Vec<(u8, Primitive)> {
        let mut out = Vec::new();
        let mut assembler = MessageAssembler::new();
        for pdu in self.sent() {
            let Pdu::PData { data } = pdu else {
                continue;
            };
            if let Some(message) = assembler.feed_pdata(&data).expect("sent stream is valid") {
                let context_id = message.context_id;
                out.push((
                    context_id,
                    message.into_primitive().expect("sent message is valid"),
                ));
                assembler = MessageAssembler::new();
            }
        }
        out
    }
}

impl Dul for RecordingDul {
    fn send_pdu(
        &mut self,
        pdu: Pdu,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        self.inner.lock().unwrap().pdus.push(pdu);
        Ok(())
    }

    fn push_event(&mut self, event: UpperLayerEvent) {
        self.inner.lock().unwrap().events.push(event);
    }

    fn is_alive(&self) -> bool {
        true
    }
}

/// Feed a primitive into the provider as if the peer had sent it.
pub fn deliver(provider: &DimseProvider<RecordingDul>, primitive: &Primitive, context_id: u8) {
    let message = Message::from_primitive(primitive, context_id, &DimseConfig::default())
        .expect("test primitive is valid");
    for pdu in message.fragments(16382).expect("fragmentation succeeds") {
        let Pdu::PData { data } = pdu else {
            unreachable!("fragments are P-DATA");
        };
        provider.receive_pdata(&data);
    }
}
