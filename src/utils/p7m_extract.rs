//! Recovers the PDF embedded in a .p7m envelope without decoding the CMS structure.
//!
//! The envelope is first cleaned of the OCTET STRING chunk prefixes listed in
//! [`STRIP_PATTERNS`], then the payload is cut between the first `%PDF` and the
//! end of the last `%%EOF`.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::boundary::{find_header, find_trailer, PDF_TRAILER};
use super::sequence_stripper::SequenceStripper;
use super::strip_patterns::{StripPattern, PATTERN_LEN, STRIP_PATTERNS, STRIP_TABLE_VERSION};

/// Full stripping passes run before the markers are searched.
pub const DEFAULT_STRIP_PASSES: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no PDF payload found in the envelope")]
    NoPayloadFound,
}

/// What happened during one extraction, for logs and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    pub table_version: u32,
    pub input_len: usize,
    pub stripped_len: usize,
    pub removed_per_pass: Vec<usize>,
    pub header_offset: usize,
    pub trailer_offset: usize,
    pub payload_len: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    stripper: SequenceStripper<'a>,
    passes: usize,
}

impl Default for Extractor<'static> {
    fn default() -> Self {
        Self::new(&STRIP_PATTERNS, DEFAULT_STRIP_PASSES)
    }
}

impl Extractor<'static> {
    /// Default table with a custom pass count.
    pub fn with_passes(passes: usize) -> Self {
        Self::new(&STRIP_PATTERNS, passes)
    }
}

impl<'a> Extractor<'a> {
    pub fn new(patterns: &'a [StripPattern], passes: usize) -> Self {
        Self {
            stripper: SequenceStripper::new(patterns),
            passes,
        }
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn stripper(&self) -> &SequenceStripper<'a> {
        &self.stripper
    }

    pub fn extract(&self, envelope: &[u8]) -> Result<Vec<u8>, ExtractError> {
        self.extract_with_report(envelope).map(|(pdf, _)| pdf)
    }

    pub fn extract_with_report(
        &self,
        envelope: &[u8],
    ) -> Result<(Vec<u8>, ExtractionReport), ExtractError> {
        let stripped = self.stripper.strip(envelope, self.passes);
        let buf = &stripped.buffer;
        debug!(
            target: "p7m_extract",
            input_len = envelope.len(),
            stripped_len = buf.len(),
            removed = ?stripped.removed_per_pass,
            removed_bytes = stripped.total_removed() * PATTERN_LEN,
            "Envelope stripped"
        );

        let header = find_header(buf);
        let trailer = find_trailer(buf);
        let (header, trailer) = match (header, trailer) {
            (Some(h), Some(t)) => (h, t),
            _ => {
                debug!(
                    target: "p7m_extract",
                    header = ?header,
                    trailer = ?trailer,
                    "PDF marker missing"
                );
                return Err(ExtractError::NoPayloadFound);
            }
        };

        let end = trailer + PDF_TRAILER.len();
        if end <= header {
            debug!(
                target: "p7m_extract",
                header,
                trailer,
                "Trailer precedes header"
            );
            return Err(ExtractError::NoPayloadFound);
        }

        let pdf = buf[header..end].to_vec();
        let report = ExtractionReport {
            table_version: STRIP_TABLE_VERSION,
            input_len: envelope.len(),
            stripped_len: buf.len(),
            removed_per_pass: stripped.removed_per_pass,
            header_offset: header,
            trailer_offset: trailer,
            payload_len: pdf.len(),
        };
        info!(
            target: "p7m_extract",
            input_len = report.input_len,
            payload_len = report.payload_len,
            "PDF payload extracted"
        );
        Ok((pdf, report))
    }
}
