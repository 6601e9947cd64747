use std::path::Path;

use dicom_core::value::DataSetSequence;
use dicom_core::{DataElement, Length, PrimitiveValue, Tag, VR};
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};

use crate::dicom::{
    APPROVAL_STATUS, FRAME_OF_REFERENCE_UID, MODALITY, PIXEL_DATA,
    REFERENCED_FRAME_OF_REFERENCE_SEQUENCE,
};

const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
const FIXTURE_INSTANCE_UID: &str = "1.2.826.0.1.3680043.8.498.99";

/// Builds small DICOM files for tests.
pub struct DicomFixture {
    object: InMemDicomObject,
}

impl DicomFixture {
    pub fn new(modality: &str) -> Self {
        Self::without_modality().text(MODALITY, modality)
    }

    pub fn without_modality() -> Self {
        Self {
            object: InMemDicomObject::new_empty(),
        }
    }

    pub fn text(mut self, tag: Tag, value: &str) -> Self {
        self.object
            .put(DataElement::new(tag, vr_for(tag), PrimitiveValue::from(value)));
        self
    }

    pub fn referenced_frame_of_reference(mut self, uid: &str) -> Self {
        let mut item = InMemDicomObject::new_empty();
        item.put(DataElement::new(
            FRAME_OF_REFERENCE_UID,
            VR::UI,
            PrimitiveValue::from(uid),
        ));
        self.object.put(DataElement::new(
            REFERENCED_FRAME_OF_REFERENCE_SEQUENCE,
            VR::SQ,
            DataSetSequence::new(vec![item], Length::UNDEFINED),
        ));
        self
    }

    pub fn pixel_data(mut self, bytes: Vec<u8>) -> Self {
        self.object
            .put(DataElement::new(PIXEL_DATA, VR::OB, PrimitiveValue::from(bytes)));
        self
    }

    pub fn write(self, path: &Path) {
        let file = self
            .object
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(CT_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid(FIXTURE_INSTANCE_UID),
            )
            .expect("fixture meta group should build");
        file.write_to_file(path)
            .expect("fixture should be written to disk");
    }
}

fn vr_for(tag: Tag) -> VR {
    match tag {
        MODALITY | APPROVAL_STATUS => VR::CS,
        FRAME_OF_REFERENCE_UID => VR::UI,
        _ => VR::LO,
    }
}
