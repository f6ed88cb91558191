//! # libxml-bridge Library
//!
//! Safe wrappers over two libxml2 facilities: DTD objects (parsing, creation,
//! attachment to documents) and the forward-only `xmlTextWriter`.
//!
//! The interesting part is lifetime bridging. Every native pointer lives in a
//! handle tagged with who frees it, so a DTD attached to a document is never
//! freed twice, and a writer is always released before the buffer, byte sink
//! or document it writes into.
//!
//! ```no_run
//! use libxml_bridge::Writer;
//!
//! let mut writer = Writer::string()?;
//! writer.start_element("a");
//! writer.write_string("x");
//! writer.end_element();
//! let xml = writer.result()?.and_then(|output| output.into_text());
//! assert_eq!(xml.as_deref(), Some("<a>x</a>"));
//! # Ok::<(), libxml_bridge::BindingError>(())
//! ```

pub mod config;
pub mod diagnostics;
pub mod document;
pub mod dtd;
pub mod encoding;
pub mod error;
pub mod handle;
pub mod libxml2;
pub mod sink;
pub mod writer;

pub use config::{ConfigManager, DiagnosticsConfig, EnvProvider, FormatConfig, WriterConfig};
pub use diagnostics::{DiagnosticReporter, VerbosityLevel};
pub use document::{Document, ValidationResult};
pub use dtd::{Dtd, SubsetOptions};
pub use encoding::{CharEncoding, UnknownEncoding};
pub use error::{BindingError, ConfigError, LibXml2Error, Result};
pub use handle::Ownership;
pub use libxml2::{DiagnosticLevel, NativeDiagnostic, XML_DTD_NODE};
pub use sink::SinkKind;
pub use writer::{DocumentOptions, Flushed, Writer, WriterOutput};
