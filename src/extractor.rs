//! Embedded image extraction from a single PDF.
//!
//! Pages are walked in order and every image XObject in a page's resources is
//! considered. Each candidate is read, filtered by size and format, written to
//! the output directory under a fresh UUID, and described by an
//! [`ImageRecord`]. Failures for one image never stop the rest of the
//! document, and failures for one document never reach the caller as errors.

use crate::error::{Error, ExtractionFailure, FailureKind, Result};
use crate::formats::png::{self, ColorType, RasterLayout};
use crate::formats::{ImageFormat, detect_format};
use crate::metadata::{ImageRecord, MetadataIndex, timestamp_now};
use crate::persist;
use flate2::read::ZlibDecoder;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::any::Any;
use std::collections::HashSet;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// How far up the page tree inherited `/Resources` are looked for.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// How deeply nested Form XObjects are searched for images.
const MAX_FORM_DEPTH: usize = 16;

/// Filters whose output is an encoded image file rather than pixels.
const IMAGE_CODECS: &[&[u8]] = &[b"DCTDecode", b"DCT", b"JPXDecode"];

/// Extraction settings shared by every document of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Directory extracted images are written to.
    pub output_dir: PathBuf,
    /// Images smaller than this many bytes are discarded.
    pub min_size_bytes: u64,
    /// Documents with more pages than this are skipped.
    pub max_pages: u32,
}

/// How a document was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    /// Pages were scanned; zero or more images were kept.
    Extracted,
    /// The document has more pages than allowed and was not scanned.
    SkippedPageLimit { pages: usize },
    /// The document could not be opened.
    Failed,
}

/// Everything one document produced.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub document: PathBuf,
    pub status: DocumentStatus,
    pub records: MetadataIndex,
    pub failures: Vec<ExtractionFailure>,
}

impl DocumentOutcome {
    fn new(document: &Path, status: DocumentStatus) -> Self {
        Self {
            document: document.to_path_buf(),
            status,
            records: MetadataIndex::new(),
            failures: Vec::new(),
        }
    }

    fn failed(document: &Path, error: &Error) -> Self {
        let mut outcome = Self::new(document, DocumentStatus::Failed);
        outcome.failures.push(ExtractionFailure::document(document, error));
        outcome
    }

    /// Number of images written for this document.
    pub fn image_count(&self) -> usize {
        self.records.len()
    }
}

/// Extracts images from one document at a time.
#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    options: ExtractOptions,
}

impl DocumentExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract every qualifying image from the document at `path`.
    ///
    /// Never fails: open errors, and panics raised by malformed input, come
    /// back as a [`DocumentStatus::Failed`] outcome.
    pub fn extract(&self, path: &Path) -> DocumentOutcome {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        match panic::catch_unwind(AssertUnwindSafe(|| self.extract_document(&path))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let error = Error::document(&path, panic_message(payload.as_ref()));
                warn!("{}", error);
                DocumentOutcome::failed(&path, &error)
            }
        }
    }

    fn extract_document(&self, path: &Path) -> DocumentOutcome {
        let document = match Document::load(path) {
            Ok(document) => document,
            Err(e) => {
                let error = Error::document(path, e);
                warn!("{}", error);
                return DocumentOutcome::failed(path, &error);
            }
        };

        let pages = document.get_pages();
        if pages.len() > self.options.max_pages as usize {
            debug!(
                "Skipping {}: {} pages exceeds limit of {}",
                path.display(),
                pages.len(),
                self.options.max_pages
            );
            return DocumentOutcome::new(
                path,
                DocumentStatus::SkippedPageLimit { pages: pages.len() },
            );
        }

        let mut outcome = DocumentOutcome::new(path, DocumentStatus::Extracted);
        let source = SourceDocument::new(path);
        let mut seen = HashSet::new();

        for (&page_number, &page_id) in &pages {
            let image_ids = match page_image_ids(&document, page_id) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("Cannot list images on page {} of {}: {}", page_number, path.display(), e);
                    outcome.failures.push(ExtractionFailure::page(
                        FailureKind::ImageDecode,
                        path,
                        page_number,
                        &e,
                    ));
                    continue;
                }
            };

            for (position, image_id) in image_ids.into_iter().enumerate() {
                let image_index = position as u32 + 1;

                // The same image object may be drawn on many pages.
                if !seen.insert(image_id) {
                    debug!(
                        "Page {} image {} of {} repeats object {:?}",
                        page_number,
                        image_index,
                        path.display(),
                        image_id
                    );
                    continue;
                }

                let location = ImageLocation {
                    page_number,
                    image_index,
                };
                match self.extract_image(&document, image_id, &source, location) {
                    Ok(Some((id, record))) => outcome.records.insert(id, record),
                    Ok(None) => {}
                    Err((kind, e)) => {
                        warn!(
                            "Skipping page {} image {} of {}: {}",
                            page_number,
                            image_index,
                            path.display(),
                            e
                        );
                        outcome.failures.push(ExtractionFailure::image(
                            kind,
                            path,
                            page_number,
                            image_index,
                            &e,
                        ));
                    }
                }
            }
        }

        debug!(
            "Extracted {} image(s) from {}",
            outcome.image_count(),
            path.display()
        );
        outcome
    }

    /// Read, filter and persist one image.
    ///
    /// `Ok(None)` means the image was filtered out.
    fn extract_image(
        &self,
        document: &Document,
        image_id: ObjectId,
        source: &SourceDocument,
        location: ImageLocation,
    ) -> std::result::Result<Option<(String, ImageRecord)>, (FailureKind, Error)> {
        let stream = document
            .get_object(image_id)
            .and_then(|object| object.as_stream())
            .map_err(|e| (FailureKind::ImageDecode, Error::image_stream(e)))?;

        let data = image_bytes(document, stream).map_err(|e| (FailureKind::ImageDecode, e))?;

        if (data.len() as u64) < self.options.min_size_bytes {
            debug!(
                "Discarding page {} image {}: {} bytes is below {}",
                location.page_number,
                location.image_index,
                data.len(),
                self.options.min_size_bytes
            );
            return Ok(None);
        }

        let Some(format) = detect_format(&data) else {
            debug!(
                "Discarding page {} image {}: unrecognized format",
                location.page_number, location.image_index
            );
            return Ok(None);
        };

        let id = Uuid::new_v4().to_string();
        let output_path = persist::image_path(&self.options.output_dir, &id, format);
        persist::write_image(&data, &output_path).map_err(|e| (FailureKind::ImageWrite, e))?;

        let record = source.record(location, format, data.len() as u64, output_path);
        Ok(Some((id, record)))
    }
}

/// Per-document attributes copied into every record.
struct SourceDocument {
    pdf_path: PathBuf,
    file_name: String,
}

impl SourceDocument {
    fn new(path: &Path) -> Self {
        Self {
            pdf_path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    fn record(
        &self,
        location: ImageLocation,
        format: ImageFormat,
        size_bytes: u64,
        path: PathBuf,
    ) -> ImageRecord {
        ImageRecord {
            pdf_path: self.pdf_path.clone(),
            file_name: self.file_name.clone(),
            page_number: location.page_number,
            image_index: location.image_index,
            image_type: format,
            size_bytes,
            path,
            extraction_date: timestamp_now(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ImageLocation {
    page_number: u32,
    image_index: u32,
}

/// Object ids of the image XObjects a page draws, in resource order.
///
/// Images inside Form XObjects are listed where the form appears.
fn page_image_ids(document: &Document, page_id: ObjectId) -> Result<Vec<ObjectId>> {
    let Some(resources) = page_resources(document, page_id)? else {
        return Ok(Vec::new());
    };
    let mut ids = Vec::new();
    let mut forms = HashSet::new();
    collect_images(document, resources, 0, &mut forms, &mut ids)?;
    Ok(ids)
}

fn collect_images(
    document: &Document,
    resources: &Dictionary,
    depth: usize,
    forms: &mut HashSet<ObjectId>,
    ids: &mut Vec<ObjectId>,
) -> Result<()> {
    let xobjects = match resources.get(b"XObject") {
        Ok(object) => resolve_dict(document, object)?,
        Err(_) => return Ok(()),
    };

    for (name, value) in xobjects.iter() {
        let name = String::from_utf8_lossy(name);
        let Ok(id) = value.as_reference() else {
            debug!("XObject /{} is not a reference", name);
            continue;
        };
        let stream = match document.get_object(id).and_then(|object| object.as_stream()) {
            Ok(stream) => stream,
            Err(e) => {
                debug!("XObject /{} unreadable: {}", name, e);
                continue;
            }
        };

        if is_image(&stream.dict) {
            ids.push(id);
        } else if has_subtype(&stream.dict, b"Form") {
            // Forms may reference each other; each is walked once per page.
            if depth >= MAX_FORM_DEPTH || !forms.insert(id) {
                continue;
            }
            let Ok(form_resources) = stream.dict.get(b"Resources") else {
                continue;
            };
            let nested = resolve_dict(document, form_resources)
                .and_then(|form_resources| collect_images(document, form_resources, depth + 1, forms, ids));
            if let Err(e) = nested {
                debug!("Form /{} resources unreadable: {}", name, e);
            }
        }
    }
    Ok(())
}

/// The page's `/Resources`, inherited from an ancestor in the page tree if
/// the page has none.
fn page_resources(document: &Document, page_id: ObjectId) -> Result<Option<&Dictionary>> {
    let mut node = document.get_dictionary(page_id).map_err(Error::image_stream)?;

    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(document, resources).map(Some);
        }
        match node.get(b"Parent").and_then(|parent| parent.as_reference()) {
            Ok(parent_id) => {
                node = document.get_dictionary(parent_id).map_err(Error::image_stream)?;
            }
            Err(_) => return Ok(None),
        }
    }
    Ok(None)
}

fn resolve_dict<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Dictionary> {
    let dict = match object {
        Object::Reference(id) => document.get_dictionary(*id),
        other => other.as_dict(),
    };
    dict.map_err(Error::image_stream)
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn is_image(dict: &Dictionary) -> bool {
    has_subtype(dict, b"Image")
}

fn has_subtype(dict: &Dictionary, subtype: &[u8]) -> bool {
    matches!(dict.get(b"Subtype").and_then(|value| value.as_name()), Ok(name) if name == subtype)
}

fn int(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).ok()?.as_i64().ok()
}

/// Names in a stream's `/Filter` entry, outermost first.
fn stream_filters(dict: &Dictionary) -> Vec<&[u8]> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.as_slice()],
        Ok(Object::Array(items)) => items.iter().filter_map(|item| item.as_name().ok()).collect(),
        _ => Vec::new(),
    }
}

fn is_image_codec(filter: &[u8]) -> bool {
    IMAGE_CODECS.contains(&filter)
}

fn is_flate(filter: &[u8]) -> bool {
    filter == b"FlateDecode" || filter == b"Fl"
}

/// The bytes of an image as stored, with transport filters removed.
///
/// JPEG streams come out as-is. Flate streams using PNG predictors are
/// re-wrapped as PNG files. Anything else is decoded as far as its filters
/// allow and left for the format check to reject if it is bare pixel data.
pub(crate) fn image_bytes(document: &Document, stream: &Stream) -> Result<Vec<u8>> {
    let filters = stream_filters(&stream.dict);

    if let [only] = filters.as_slice() {
        if is_flate(only) {
            if let Some(png) = rewrap_png(document, stream) {
                return Ok(png);
            }
        }
    }
    decode_filters(&stream.content, &filters)
}

/// Apply `filters` in order, stopping at the first image codec or at a
/// filter PIE cannot undo. What has been decoded so far is returned.
fn decode_filters(content: &[u8], filters: &[&[u8]]) -> Result<Vec<u8>> {
    let mut data = content.to_vec();
    for &filter in filters {
        if is_image_codec(filter) {
            break;
        }
        data = match filter {
            b"FlateDecode" | b"Fl" => inflate(&data)?,
            b"ASCIIHexDecode" | b"AHx" => decode_ascii_hex(&data)?,
            other => {
                debug!("Leaving /{} encoded", String::from_utf8_lossy(other));
                break;
            }
        };
    }
    Ok(data)
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|e| Error::image_stream(format!("FlateDecode: {}", e)))?;
    Ok(decoded)
}

fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;

    for &byte in data {
        let nibble = match byte {
            b'>' => break,
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            _ if byte.is_ascii_whitespace() => continue,
            _ => return Err(Error::image_stream(format!("ASCIIHexDecode: bad byte 0x{:02X}", byte))),
        };
        match high.take() {
            Some(h) => decoded.push(h << 4 | nibble),
            None => high = Some(nibble),
        }
    }
    // An odd final digit is followed by an implied 0.
    if let Some(h) = high {
        decoded.push(h << 4);
    }
    Ok(decoded)
}

/// Wrap a predictor-encoded Flate raster as a PNG without decoding it.
fn rewrap_png(document: &Document, stream: &Stream) -> Option<Vec<u8>> {
    let dict = &stream.dict;
    if matches!(dict.get(b"ImageMask").and_then(|mask| mask.as_bool()), Ok(true)) {
        return None;
    }

    let params = match dict.get(b"DecodeParms").ok().and_then(|p| resolve(document, p))? {
        Object::Dictionary(params) => params,
        Object::Array(items) => items.first()?.as_dict().ok()?,
        _ => return None,
    };
    if int(params, b"Predictor").unwrap_or(1) < 10 {
        return None;
    }

    let width = int(dict, b"Width")?;
    let height = int(dict, b"Height")?;
    let bit_depth = int(dict, b"BitsPerComponent")?;
    let color_type = color_type(document, dict.get(b"ColorSpace").ok()?)?;

    // The predictor must describe the same rows as the image header.
    if int(params, b"Colors").unwrap_or(1) != i64::from(color_type.channels())
        || int(params, b"BitsPerComponent").unwrap_or(8) != bit_depth
        || int(params, b"Columns").unwrap_or(1) != width
    {
        return None;
    }

    let layout = RasterLayout {
        width: u32::try_from(width).ok()?,
        height: u32::try_from(height).ok()?,
        bit_depth: u8::try_from(bit_depth).ok()?,
        color_type,
    };
    png::wrap_idat(&layout, &stream.content)
}

/// PNG colour type for a PDF colour space, following ICC profiles to their
/// component count.
fn color_type(document: &Document, color_space: &Object) -> Option<ColorType> {
    match resolve(document, color_space)? {
        Object::Name(name) => ColorType::from_color_space(name),
        Object::Array(items) => {
            let family = items.first()?.as_name().ok()?;
            match family {
                b"ICCBased" => {
                    let profile = resolve(document, items.get(1)?)?.as_stream().ok()?;
                    match int(&profile.dict, b"N")? {
                        1 => Some(ColorType::Gray),
                        3 => Some(ColorType::Rgb),
                        _ => None,
                    }
                }
                b"CalGray" => Some(ColorType::Gray),
                b"CalRGB" => Some(ColorType::Rgb),
                _ => None,
            }
        }
        _ => None,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("parser panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("parser panicked: {}", message)
    } else {
        String::from("parser panicked")
    }
}
