use std::fs;
use std::io::Cursor;
use std::path::Path;

use dicom_core::dictionary::{DataDictionary, DataDictionaryEntry};
use dicom_object::{
    from_reader, open_file, DefaultDicomObject, OpenFileOptions, ReadError, StandardDataDictionary,
    Tag,
};

use crate::classify::ClassificationKey;
use crate::error::{Result, SortError};

pub(crate) const MODALITY: Tag = Tag(0x0008, 0x0060);
pub(crate) const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);
pub(crate) const FRAME_OF_REFERENCE_UID: Tag = Tag(0x0020, 0x0052);
pub(crate) const REFERENCED_FRAME_OF_REFERENCE_SEQUENCE: Tag = Tag(0x3006, 0x0010);
pub(crate) const APPROVAL_STATUS: Tag = Tag(0x300E, 0x0002);
pub(crate) const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

pub const NO_FRAME_OF_REFERENCE: &str = "NoFrameOfReferenceUID";
pub const NO_SERIES_DESCRIPTION: &str = "NoSeriesDescription";
pub const NO_APPROVAL_STATUS: &str = "NoApprovalStatus";
pub const NOT_AVAILABLE: &str = "N/A";

const PRIVATE_TAG_NAME: &str = "Private Tag Data";
const UNKNOWN_TAG_NAME: &str = "Unknown";
const MAX_DETAIL_VALUE_CHARS: usize = 512;
const PREAMBLE_LEN: usize = 128;
const DICM_MAGIC: &[u8] = b"DICM";

/// How much of a file to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadDepth {
    /// Everything before PixelData.
    Header,
    Full,
}

/// One dataset element as shown in the detail window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRecord {
    pub tag: String,
    pub name: String,
    pub value: String,
}

/// Reads the modality, frame of reference and series label of a single file.
///
/// Only the header is decoded, so bulk pixel data may be absent or truncated.
/// RTSTRUCT objects keep their frame of reference inside
/// ReferencedFrameOfReferenceSequence, and RTPLAN labels carry the approval
/// status as a suffix.
pub fn extract_classification(path: &Path) -> Result<ClassificationKey> {
    log::debug!("Reading: {}", path.display());
    let obj = open_dicom_object(path, ReadDepth::Header)?;
    classification_from_object(path, &obj)
}

fn classification_from_object(path: &Path, obj: &DefaultDicomObject) -> Result<ClassificationKey> {
    let modality = read_text(obj, MODALITY).ok_or_else(|| SortError::MissingAttribute {
        path: path.to_path_buf(),
        attribute: "Modality",
    })?;

    let reference_id = if modality == "RTSTRUCT" {
        read_nested_text(
            obj,
            REFERENCED_FRAME_OF_REFERENCE_SEQUENCE,
            0,
            FRAME_OF_REFERENCE_UID,
        )
    } else {
        read_text(obj, FRAME_OF_REFERENCE_UID)
    }
    .unwrap_or_else(|| NO_FRAME_OF_REFERENCE.to_string());

    let mut series_label =
        read_text(obj, SERIES_DESCRIPTION).unwrap_or_else(|| NO_SERIES_DESCRIPTION.to_string());
    if modality == "RTPLAN" {
        let status =
            read_text(obj, APPROVAL_STATUS).unwrap_or_else(|| NO_APPROVAL_STATUS.to_string());
        series_label = format!("{series_label} ({status})");
    }

    Ok(ClassificationKey {
        modality,
        reference_id,
        series_label,
    })
}

/// Decodes the whole file and lists every dataset element in tag order.
pub fn inspect(path: &Path) -> Result<Vec<DetailRecord>> {
    let obj = open_dicom_object(path, ReadDepth::Full)?;
    let records = obj
        .iter()
        .map(|element| {
            let tag = element.header().tag;
            let value = element
                .to_str()
                .map(|text| shorten_for_display(clean_text(&text)))
                .unwrap_or_else(|_| NOT_AVAILABLE.to_string());
            DetailRecord {
                tag: tag.to_string(),
                name: tag_name(tag),
                value,
            }
        })
        .collect();
    Ok(records)
}

pub fn format_records(records: &[DetailRecord]) -> String {
    let mut text = String::new();
    for record in records {
        text.push_str(&format!("Tag: {}\n", record.tag));
        text.push_str(&format!("Name: {}\n", record.name));
        text.push_str(&format!("Value: {}\n\n", record.value));
    }
    text
}

fn tag_name(tag: Tag) -> String {
    match StandardDataDictionary.by_tag(tag) {
        Some(entry) => entry.alias().to_string(),
        None if tag.group() % 2 == 1 => PRIVATE_TAG_NAME.to_string(),
        None => UNKNOWN_TAG_NAME.to_string(),
    }
}

fn shorten_for_display(value: String) -> String {
    if value.chars().count() <= MAX_DETAIL_VALUE_CHARS {
        return value;
    }
    let mut shortened = value
        .chars()
        .take(MAX_DETAIL_VALUE_CHARS)
        .collect::<String>();
    shortened.push('…');
    shortened
}

fn open_dicom_object(path: &Path, depth: ReadDepth) -> Result<DefaultDicomObject> {
    let first_attempt = match depth {
        ReadDepth::Header => OpenFileOptions::new()
            .read_until(PIXEL_DATA)
            .open_file(path),
        ReadDepth::Full => open_file(path),
    };

    match first_attempt {
        Ok(obj) => Ok(obj),
        Err(err) if is_missing_meta_group_length_error(&err) => {
            let bytes = fs::read(path).map_err(|source| SortError::io(path, source))?;
            let Some(repaired) = repair_missing_meta_group_length(&bytes) else {
                return Err(decode_error(path, err));
            };
            log::debug!(
                "Repaired missing File Meta Information Group Length in {}",
                path.display()
            );
            let reader = Cursor::new(repaired);
            let retry = match depth {
                ReadDepth::Header => OpenFileOptions::new()
                    .read_until(PIXEL_DATA)
                    .from_reader(reader),
                ReadDepth::Full => from_reader(reader),
            };
            retry.map_err(|source| decode_error(path, source))
        }
        Err(err) => Err(decode_error(path, err)),
    }
}

fn decode_error(path: &Path, source: ReadError) -> SortError {
    match source {
        ReadError::OpenFile { source, .. } => SortError::io(path, source),
        source => SortError::Decode {
            path: path.to_path_buf(),
            source,
        },
    }
}

fn is_missing_meta_group_length_error(error: &ReadError) -> bool {
    matches!(
        error,
        ReadError::ParseMetaDataSet {
            source: dicom_object::meta::Error::UnexpectedTag { tag, .. }
        } if tag.group() == 0x0002 && tag.element() != 0x0000
    )
}

/// Inserts a (0002,0000) group length element in front of a file meta group
/// that lacks one. The returned bytes start at the `DICM` magic code.
fn repair_missing_meta_group_length(bytes: &[u8]) -> Option<Vec<u8>> {
    let meta_start = dicom_meta_offset(bytes)?;
    let group = read_u16(bytes, meta_start)?;
    let element = read_u16(bytes, meta_start + 2)?;
    if group != 0x0002 || element == 0x0000 {
        return None;
    }

    let meta_len = u32::try_from(measure_meta_group(bytes, meta_start)?).ok()?;
    let rest = bytes.get(meta_start..)?;

    let mut repaired = Vec::with_capacity(DICM_MAGIC.len() + 12 + rest.len());
    repaired.extend_from_slice(DICM_MAGIC);
    repaired.extend_from_slice(&group_length_element(meta_len));
    repaired.extend_from_slice(rest);
    Some(repaired)
}

/// Offset of the first file meta element, right after `DICM`. Files without
/// the 128 byte preamble are accepted too.
fn dicom_meta_offset(bytes: &[u8]) -> Option<usize> {
    [PREAMBLE_LEN, 0]
        .into_iter()
        .find(|&at| bytes.get(at..at + DICM_MAGIC.len()) == Some(DICM_MAGIC))
        .map(|at| at + DICM_MAGIC.len())
}

/// Byte length of the run of group 0002 elements starting at `start`.
fn measure_meta_group(bytes: &[u8], start: usize) -> Option<usize> {
    let mut position = start;
    while read_u16(bytes, position) == Some(0x0002) {
        position = next_element_offset(bytes, position)?;
    }
    (position > start).then(|| position - start)
}

/// Offset just past the explicit VR little endian element at `position`.
fn next_element_offset(bytes: &[u8], position: usize) -> Option<usize> {
    let vr = bytes.get(position + 4..position + 6)?;
    let (header_len, value_len) = if has_long_length_field(vr) {
        let len = read_u32(bytes, position + 8).filter(|&len| len != u32::MAX)?;
        (12, len)
    } else {
        (8, u32::from(read_u16(bytes, position + 6)?))
    };

    let next = position
        .checked_add(header_len)?
        .checked_add(usize::try_from(value_len).ok()?)?;
    (next <= bytes.len()).then_some(next)
}

fn has_long_length_field(vr: &[u8]) -> bool {
    matches!(
        vr,
        b"OB" | b"OD" | b"OF" | b"OL" | b"OW" | b"SQ" | b"UC" | b"UR" | b"UT" | b"UN"
    )
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let raw: [u8; 2] = bytes.get(at..at.checked_add(2)?)?.try_into().ok()?;
    Some(u16::from_le_bytes(raw))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(at..at.checked_add(4)?)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

/// (0002,0000) UL, length 4, explicit VR little endian.
fn group_length_element(group_len: u32) -> Vec<u8> {
    [[0x02, 0x00, 0x00, 0x00], [b'U', b'L', 0x04, 0x00], group_len.to_le_bytes()].concat()
}

/// Strips DICOM value padding (spaces and NUL).
fn clean_text(value: &str) -> String {
    value
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

fn read_text(obj: &DefaultDicomObject, tag: Tag) -> Option<String> {
    obj.element(tag)
        .ok()
        .and_then(|el| el.to_str().ok())
        .map(|value| clean_text(&value))
        .filter(|value| !value.is_empty())
}

fn read_nested_text(
    obj: &DefaultDicomObject,
    seq_tag: Tag,
    item_index: u32,
    element_tag: Tag,
) -> Option<String> {
    obj.value_at((seq_tag, item_index, element_tag))
        .ok()
        .and_then(|value| value.to_str().ok())
        .map(|value| clean_text(&value))
        .filter(|value| !value.is_empty())
}
