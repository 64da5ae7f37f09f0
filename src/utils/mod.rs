pub mod boundary;
pub mod content_guard;
pub mod p7m_extract;
pub mod pdf;
pub mod sequence_stripper;
pub mod session;
pub mod strip_patterns;
