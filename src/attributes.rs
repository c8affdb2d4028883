//! Lenient attribute accessors: a missing or malformed element reads as `None`.

use dicom::core::Tag;
use dicom::object::DefaultDicomObject;

pub(crate) fn text(object: &DefaultDicomObject, tag: Tag) -> Option<String> {
    object
        .element(tag)
        .ok()
        .and_then(|element| element.to_str().ok())
        .map(|value| value.trim_matches(|c: char| c.is_whitespace() || c == '\0').to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn float(object: &DefaultDicomObject, tag: Tag) -> Option<f64> {
    object.element(tag).ok()?.to_float64().ok()
}

pub(crate) fn floats(object: &DefaultDicomObject, tag: Tag) -> Option<Vec<f64>> {
    object.element(tag).ok()?.to_multi_float64().ok()
}
