//! PDF quote to product rows extraction service.
//!
//! A single endpoint receives a base64 PDF, extracts its text, asks Gemini
//! for the product table inside it and returns the rows numbered from 1.

pub mod error;
pub mod extraction;
pub mod gemini;
pub mod handler;
pub mod observability;
pub mod pdf_extractor;
pub mod settings;
