use chrono::{NaiveDate, NaiveDateTime};
use exif::{Context, Exif, In, Tag, Value};
use std::io::Cursor;

use super::{FocusPoint, Properties};
use crate::orientation::Orientation;

// Not in the standard tag list: Microsoft's rating tag in IFD0
const RATING: Tag = Tag(Context::Tiff, 0x4746);

pub(super) fn read(data: &[u8]) -> Option<Exif> {
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()
}

pub(super) fn orientation(exif: Option<&Exif>) -> Orientation {
    exif.and_then(|exif| uint(exif, Tag::Orientation))
        .map_or(Orientation::NORMAL, Orientation::from_exif)
}

pub(super) fn properties(exif: Option<&Exif>) -> Properties {
    let Some(exif) = exif else {
        return Properties::default();
    };

    Properties {
        timestamp: timestamp(exif),
        iso_speed: uint(exif, Tag::PhotographicSensitivity),
        aperture: rational(exif, Tag::FNumber),
        focal_length: rational(exif, Tag::FocalLength),
        exposure_time: rational(exif, Tag::ExposureTime),
        flash: uint(exif, Tag::Flash).map(|flash| flash & 1 != 0),
        rating: uint(exif, RATING).and_then(|rating| i32::try_from(rating).ok()),
        focus_points: subject_area(exif).into_iter().collect(),
    }
}

/// The embedded JPEG thumbnail from IFD1, if present and in bounds.
pub(super) fn thumbnail(exif: &Exif) -> Option<Vec<u8>> {
    let offset = usize::try_from(thumbnail_uint(exif, Tag::JPEGInterchangeFormat)?).ok()?;
    let length = usize::try_from(thumbnail_uint(exif, Tag::JPEGInterchangeFormatLength)?).ok()?;

    exif.buf()
        .get(offset..offset.checked_add(length)?)
        .filter(|bytes| !bytes.is_empty())
        .map(<[u8]>::to_vec)
}

fn uint(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)?.value.get_uint(0)
}

fn thumbnail_uint(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::THUMBNAIL)?.value.get_uint(0)
}

fn rational(exif: &Exif, tag: Tag) -> Option<f64> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(values) => values.first().map(|value| value.to_f64()),
        _ => None,
    }
}

fn timestamp(exif: &Exif) -> Option<NaiveDateTime> {
    let field = exif
        .get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))?;

    let Value::Ascii(values) = &field.value else {
        return None;
    };
    let dt = exif::DateTime::from_ascii(values.first()?).ok()?;

    NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())?.and_hms_opt(
        dt.hour.into(),
        dt.minute.into(),
        dt.second.into(),
    )
}

// SubjectArea with four values is a rectangle given by its centre
fn subject_area(exif: &Exif) -> Option<FocusPoint> {
    let field = exif.get_field(Tag::SubjectArea, In::PRIMARY)?;
    let value = |index| field.value.get_uint(index);

    if field.value.iter_uint()?.count() != 4 {
        return None;
    }

    let (cx, cy, width, height) = (value(0)?, value(1)?, value(2)?, value(3)?);
    Some(FocusPoint {
        x: cx.saturating_sub(width / 2),
        y: cy.saturating_sub(height / 2),
        width,
        height,
    })
}
