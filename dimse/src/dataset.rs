//! Boundary over the external data set codec.
//!
//! The DIMSE core carries data set payloads as opaque bytes;
//! the service classes materialize them only at the handler boundary,
//! under the transfer syntax negotiated for the presentation context.
use dicom_core::value::{DataSetSequence, Value};
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_encoding::transfer_syntax::TransferSyntaxIndex;
use dicom_object::InMemDicomObject;
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use snafu::{Backtrace, OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Unsupported transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String, backtrace: Backtrace },

    #[snafu(display("Could not decode data set"))]
    ReadDataSet {
        #[snafu(source(from(dicom_object::ReadError, Box::new)))]
        source: Box<dicom_object::ReadError>,
    },

    #[snafu(display("Could not encode data set"))]
    WriteDataSet {
        #[snafu(source(from(dicom_object::WriteError, Box::new)))]
        source: Box<dicom_object::WriteError>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Decode a data set from its encoding
/// under the given transfer syntax.
pub fn read_dataset(bytes: &[u8], transfer_syntax_uid: &str) -> Result<InMemDicomObject> {
    let ts = TransferSyntaxRegistry
        .get(transfer_syntax_uid)
        .context(UnsupportedTransferSyntaxSnafu {
            uid: transfer_syntax_uid,
        })?;
    InMemDicomObject::read_dataset_with_ts(bytes, ts).context(ReadDataSetSnafu)
}

/// Encode a data set under the given transfer syntax.
pub fn write_dataset(object: &InMemDicomObject, transfer_syntax_uid: &str) -> Result<Vec<u8>> {
    let ts = TransferSyntaxRegistry
        .get(transfer_syntax_uid)
        .context(UnsupportedTransferSyntaxSnafu {
            uid: transfer_syntax_uid,
        })?;
    let mut out = Vec::new();
    object
        .write_dataset_with_ts(&mut out, ts)
        .context(WriteDataSetSnafu)?;
    Ok(out)
}

/// Whether a tag identifies a top level bulk data element
/// for the purposes of retrieval without bulk data.
fn is_bulk_data_tag(tag: Tag) -> bool {
    // pixel data family
    tag == tags::PIXEL_DATA
        || tag == tags::FLOAT_PIXEL_DATA
        || tag == tags::DOUBLE_FLOAT_PIXEL_DATA
        || tag == tags::PIXEL_DATA_PROVIDER_URL
        || tag == tags::SPECTROSCOPY_DATA
        || tag == tags::ENCAPSULATED_DOCUMENT
        // overlay data, repeating group 60xx
        || (tag.group() & 0xFF00 == 0x6000 && tag.element() == 0x3000)
        // curve data and audio sample data, repeating group 50xx
        || (tag.group() & 0xFF00 == 0x5000
            && (tag.element() == 0x3000 || tag.element() == 0x200C))
}

/// Remove known bulk data elements from a composite instance,
/// as required by the retrieve-without-bulk-data service:
/// the documented top level elements,
/// plus _WaveformData_ inside each _WaveformSequence_ item.
///
/// Returns the filtered object along with
/// the names of the removed elements for logging.
pub fn strip_bulk_data(object: InMemDicomObject) -> (InMemDicomObject, Vec<&'static str>) {
    let mut removed: Vec<&'static str> = Vec::new();

    let elements: Vec<_> = object
        .into_iter()
        .filter_map(|element| {
            let tag = element.header().tag;
            if is_bulk_data_tag(tag) {
                removed.push(bulk_data_name(tag));
                return None;
            }
            if tag == tags::WAVEFORM_SEQUENCE {
                if let Some(items) = element.value().items() {
                    let has_waveform_data = items
                        .iter()
                        .any(|item| item.element(tags::WAVEFORM_DATA).is_ok());
                    if has_waveform_data {
                        removed.push("WaveformData");
                        let items: Vec<InMemDicomObject> = items
                            .iter()
                            .map(|item| {
                                InMemDicomObject::from_element_iter(
                                    item.clone()
                                        .into_iter()
                                        .filter(|e| e.header().tag != tags::WAVEFORM_DATA),
                                )
                            })
                            .collect();
                        return Some(dicom_core::DataElement::new(
                            tags::WAVEFORM_SEQUENCE,
                            dicom_core::VR::SQ,
                            Value::Sequence(DataSetSequence::from(items)),
                        ));
                    }
                }
            }
            Some(element)
        })
        .collect();

    (InMemDicomObject::from_element_iter(elements), removed)
}

fn bulk_data_name(tag: Tag) -> &'static str {
    match tag {
        tags::PIXEL_DATA => "PixelData",
        tags::FLOAT_PIXEL_DATA => "FloatPixelData",
        tags::DOUBLE_FLOAT_PIXEL_DATA => "DoubleFloatPixelData",
        tags::PIXEL_DATA_PROVIDER_URL => "PixelDataProviderURL",
        tags::SPECTROSCOPY_DATA => "SpectroscopyData",
        tags::ENCAPSULATED_DOCUMENT => "EncapsulatedDocument",
        _ if tag.group() & 0xFF00 == 0x6000 => "OverlayData",
        _ if tag.group() & 0xFF00 == 0x5000 && tag.element() == 0x3000 => "CurveData",
        _ if tag.group() & 0xFF00 == 0x5000 && tag.element() == 0x200C => "AudioSampleData",
        _ => "BulkData",
    }
}
