//! Self-describing binary container format
//!
//! One exported graph travels as a single byte sequence: a JSON header,
//! a NUL separator, the markup-text segment, then every blob
//! contiguously in ascending offset order. The header alone locates
//! every segment. Two older shapes are still parsed: plain headerless
//! text, and a header whose `data` field is a bare string.

mod errors;
mod exporter;
mod header;
mod importer;

pub use errors::{ContainerError, ContainerResult};
pub use exporter::{pack, BlobFetcher, Exporter};
pub use header::{ContainerHeader, FORMAT_VERSION, MARKUP_KEY};
pub use importer::{import, BlobContent, CurrentGraph, LegacyGraph, ParsedContainer};
