//! Input and output for the binary file formats the conversion touches:
//! the SWIN visibility files themselves and the auxiliary export and
//! diagnostic streams derived from them.

pub mod error;
pub mod export;
pub mod fileset;
pub mod swin;

pub use error::IOError;
pub use export::DiagnosticSink;
pub use fileset::SwinFileSet;
