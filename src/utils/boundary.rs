use memchr::memmem;

/// Header every PDF starts with.
pub const PDF_HEADER: &[u8] = b"%PDF";
/// End-of-file comment closing a PDF (or one of its incremental revisions).
pub const PDF_TRAILER: &[u8] = b"%%EOF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    First,
    Last,
}

/// Offset of the first or last exact occurrence of `marker` in `buf`.
/// An empty marker never matches.
pub fn locate(buf: &[u8], marker: &[u8], direction: SearchDirection) -> Option<usize> {
    if marker.is_empty() {
        return None;
    }
    match direction {
        SearchDirection::First => memmem::find(buf, marker),
        SearchDirection::Last => memmem::rfind(buf, marker),
    }
}

pub fn find_header(buf: &[u8]) -> Option<usize> {
    locate(buf, PDF_HEADER, SearchDirection::First)
}

/// Later revisions append their own `%%EOF`, so the last one closes the document.
pub fn find_trailer(buf: &[u8]) -> Option<usize> {
    locate(buf, PDF_TRAILER, SearchDirection::Last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_takes_first_occurrence() {
        assert_eq!(find_header(b"xx%PDF-1.4 %PDF"), Some(2));
        assert_eq!(find_header(b"%PDF"), Some(0));
    }

    #[test]
    fn trailer_takes_last_occurrence() {
        let buf = b"%PDF a %%EOF b %%EOF\n";
        assert_eq!(find_trailer(buf), Some(15));
    }

    #[test]
    fn missing_markers() {
        assert_eq!(find_header(b"%PD"), None);
        assert_eq!(find_header(b""), None);
        assert_eq!(find_trailer(b"%%EO"), None);
        assert_eq!(find_trailer(b"%PDF"), None);
    }

    #[test]
    fn markers_are_case_sensitive() {
        assert_eq!(find_header(b"%pdf"), None);
        assert_eq!(find_trailer(b"%%eof"), None);
    }

    #[test]
    fn empty_marker_never_matches() {
        assert_eq!(locate(b"abc", b"", SearchDirection::First), None);
        assert_eq!(locate(b"abc", b"", SearchDirection::Last), None);
    }

    #[test]
    fn trailing_percent_run() {
        // "%%%EOF" holds a single "%%EOF" starting at offset 1
        assert_eq!(find_trailer(b"%%%EOF"), Some(1));
    }
}
