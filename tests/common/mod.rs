//! Synthetic CT slices written with dicom-rs itself.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use dicom_dictionary_std::{tags, uids};

pub const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";

/// Description of one slice to write.
#[derive(Debug, Clone)]
pub struct SyntheticSlice {
    pub series_uid: Option<String>,
    pub series_description: String,
    pub z: f64,
    pub rows: u16,
    pub columns: u16,
    /// Value stored in every pixel.
    pub fill: u16,
    pub slope: f64,
    pub intercept: f64,
}

impl SyntheticSlice {
    pub fn new(series_uid: &str, z: f64) -> Self {
        Self {
            series_uid: Some(series_uid.to_string()),
            series_description: "Chest".to_string(),
            z,
            rows: 4,
            columns: 3,
            fill: 0,
            slope: 1.0,
            intercept: -1024.0,
        }
    }

    pub fn fill(mut self, fill: u16) -> Self {
        self.fill = fill;
        self
    }

    pub fn size(mut self, rows: u16, columns: u16) -> Self {
        self.rows = rows;
        self.columns = columns;
        self
    }

    pub fn without_series(mut self) -> Self {
        self.series_uid = None;
        self
    }
}

fn decimal_strings(values: &[f64]) -> PrimitiveValue {
    PrimitiveValue::Strs(values.iter().map(|value| value.to_string()).collect())
}

/// Write `slice` to `dir/name` and return the path.
pub fn write_slice(dir: &Path, name: &str, slice: &SyntheticSlice) -> PathBuf {
    let instance_uid = format!("2.25.{}", (slice.z * 1000.0).abs() as u64 + 1);
    let pixel_count = usize::from(slice.rows) * usize::from(slice.columns);

    let mut elements = vec![
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(CT_IMAGE_STORAGE)),
        DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(instance_uid.as_str()),
        ),
        DataElement::new(tags::STUDY_DATE, VR::DA, PrimitiveValue::from("20240102")),
        DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CT")),
        DataElement::new(
            tags::SERIES_DESCRIPTION,
            VR::LO,
            PrimitiveValue::from(slice.series_description.as_str()),
        ),
        DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from("Doe^Jane")),
        DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("P-0001")),
        DataElement::new(tags::SLICE_THICKNESS, VR::DS, decimal_strings(&[2.5])),
        DataElement::new(
            tags::IMAGE_POSITION_PATIENT,
            VR::DS,
            decimal_strings(&[0.0, 0.0, slice.z]),
        ),
        DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)),
        DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            PrimitiveValue::from("MONOCHROME2"),
        ),
        DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(slice.rows)),
        DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(slice.columns)),
        DataElement::new(tags::PIXEL_SPACING, VR::DS, decimal_strings(&[0.5, 0.5])),
        DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16)),
        DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(16_u16)),
        DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(15_u16)),
        DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0_u16)),
        DataElement::new(tags::RESCALE_INTERCEPT, VR::DS, decimal_strings(&[slice.intercept])),
        DataElement::new(tags::RESCALE_SLOPE, VR::DS, decimal_strings(&[slice.slope])),
        DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::U16(std::iter::repeat_n(slice.fill, pixel_count).collect()),
        ),
    ];
    if let Some(uid) = &slice.series_uid {
        elements.push(DataElement::new(
            tags::SERIES_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(uid.as_str()),
        ));
    }

    let object = InMemDicomObject::from_element_iter(elements)
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(CT_IMAGE_STORAGE)
                .media_storage_sop_instance_uid(instance_uid.as_str()),
        )
        .unwrap();

    let path = dir.join(name);
    object.write_to_file(&path).unwrap();
    path
}

/// A unit file exporting the built-in statistics capability.
pub const STATISTICS_UNIT: &str = r#"{
    "types": [{
        "name": "StatisticsModule",
        "entry": "statistics",
        "metadata": {"id": "statistics", "name": "Study statistics", "version": "1.0.0",
                     "description": "Intensity statistics of the loaded volume"}
    }]
}"#;
