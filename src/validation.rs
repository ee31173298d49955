//! Upload predicates for a validation framework.
//!
//! Every check returns a plain `bool` and never fails. Size and content-type
//! checks pass when there is no upload; dimension checks fail when there is
//! no upload or the file is not a decodable GIF, JPEG or PNG.

use std::path::Path;

use attachforge_common::{file_column, Record, RecordLookup, UploadPayload};
use attachforge_geometry::read_dimensions;
use regex::RegexBuilder;
use tracing::{debug, warn};

/// A validation rule applied to one attachment field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    MinSize(u64),
    MaxSize(u64),
    /// Allowed MIME types; entries written `/pattern/flags` are regexes.
    ContentType(Vec<String>),
    Presence,
    MinWidth(u32),
    MaxWidth(u32),
    MinHeight(u32),
    MaxHeight(u32),
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MinSize(n) => write!(f, "min size {}", n),
            Self::MaxSize(n) => write!(f, "max size {}", n),
            Self::ContentType(types) => write!(f, "content type in [{}]", types.join(", ")),
            Self::Presence => write!(f, "presence"),
            Self::MinWidth(n) => write!(f, "min width {}", n),
            Self::MaxWidth(n) => write!(f, "max width {}", n),
            Self::MinHeight(n) => write!(f, "min height {}", n),
            Self::MaxHeight(n) => write!(f, "max height {}", n),
        }
    }
}

/// The upload, if one was actually received.
fn received(upload: Option<&UploadPayload>) -> Option<&UploadPayload> {
    upload.filter(|p| !p.temp_path.as_os_str().is_empty())
}

pub fn min_size(upload: Option<&UploadPayload>, min: u64) -> bool {
    received(upload).map_or(true, |p| min <= p.size)
}

pub fn max_size(upload: Option<&UploadPayload>, max: u64) -> bool {
    received(upload).map_or(true, |p| p.size <= max)
}

/// MIME type of the upload: sniffed from its bytes when recognisable,
/// otherwise the declared type.
pub fn detected_mime(upload: &UploadPayload) -> String {
    match infer::get_from_path(&upload.temp_path) {
        Ok(Some(kind)) => kind.mime_type().to_string(),
        Ok(None) => upload.content_type.clone(),
        Err(e) => {
            debug!(path = %upload.temp_path.display(), error = %e, "Cannot sniff upload type");
            upload.content_type.clone()
        }
    }
}

/// Match a `/pattern/flags` rule. Only the `i` flag is honoured.
fn pattern_matches(rule: &str, mime: &str) -> bool {
    let body = &rule[1..];
    let (pattern, flags) = match body.rfind('/') {
        Some(end) => (&body[..end], &body[end + 1..]),
        None => (body, ""),
    };
    match RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .build()
    {
        Ok(re) => re.is_match(mime),
        Err(e) => {
            warn!(rule, error = %e, "Invalid content type pattern");
            false
        }
    }
}

pub fn content_type<S: AsRef<str>>(upload: Option<&UploadPayload>, allowed: &[S]) -> bool {
    let Some(upload) = received(upload) else {
        return true;
    };
    let mime = detected_mime(upload);

    allowed.iter().map(AsRef::as_ref).any(|rule| {
        if rule.starts_with('/') {
            pattern_matches(rule, &mime)
        } else {
            rule == mime
        }
    })
}

/// True when a new upload is present or, for a stored record, a file name is
/// already on record (in memory, or read through `lookup` when the column is
/// not loaded).
pub fn presence(
    record: &Record,
    field: &str,
    upload: Option<&UploadPayload>,
    lookup: &dyn RecordLookup,
) -> bool {
    if received(upload).is_some() {
        return true;
    }
    let Some(id) = record.id.as_ref() else {
        return false;
    };

    let column = file_column(field, "file_name");
    if record.file_name(field).is_some() {
        return true;
    }
    if record.contains(&column) {
        return false;
    }

    match lookup.stored_values(&record.entity, id, std::slice::from_ref(&column)) {
        Ok(values) => values
            .get(&column)
            .and_then(Option::as_deref)
            .is_some_and(|name| !name.is_empty()),
        Err(e) => {
            warn!(entity = %record.entity, field, error = %e, "Presence lookup failed");
            false
        }
    }
}

fn dimensions(upload: Option<&UploadPayload>) -> Option<(u32, u32)> {
    let upload = received(upload)?;
    read_dimensions(Path::new(&upload.temp_path)).ok()
}

pub fn min_width(upload: Option<&UploadPayload>, min: u32) -> bool {
    dimensions(upload).is_some_and(|(w, _)| w >= min)
}

pub fn max_width(upload: Option<&UploadPayload>, max: u32) -> bool {
    dimensions(upload).is_some_and(|(w, _)| w <= max)
}

pub fn min_height(upload: Option<&UploadPayload>, min: u32) -> bool {
    dimensions(upload).is_some_and(|(_, h)| h >= min)
}

pub fn max_height(upload: Option<&UploadPayload>, max: u32) -> bool {
    dimensions(upload).is_some_and(|(_, h)| h <= max)
}

/// Evaluate `rule` for `field` of `record`.
pub fn check(rule: &Rule, record: &Record, field: &str, lookup: &dyn RecordLookup) -> bool {
    let upload = record.upload(field);
    match rule {
        Rule::MinSize(n) => min_size(upload, *n),
        Rule::MaxSize(n) => max_size(upload, *n),
        Rule::ContentType(types) => content_type(upload, types.as_slice()),
        Rule::Presence => presence(record, field, upload, lookup),
        Rule::MinWidth(n) => min_width(upload, *n),
        Rule::MaxWidth(n) => max_width(upload, *n),
        Rule::MinHeight(n) => min_height(upload, *n),
        Rule::MaxHeight(n) => max_height(upload, *n),
    }
}
