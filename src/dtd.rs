//! DTD handle adapter
//!
//! A [`Dtd`] wraps one native `xmlDtd`. Parsed DTDs are owned by the handle;
//! subsets created against a [`Document`] are attached to it, and the handle
//! then only keeps the document alive.

use std::fmt;

use libc::{c_char, c_int};

use crate::document::Document;
use crate::error::{BindingError, LibXml2Error, Result};
use crate::handle::{DtdResource, NativeHandle, Ownership};
use crate::libxml2::{self, NativeDiagnostic, XmlDtd, optional_cstring, optional_ptr};

/// Options for [`Dtd::create`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsetOptions<'a> {
    /// Root element name the subset declares
    pub name: Option<&'a str>,
    /// Document to hook the new subset into
    pub document: Option<&'a Document>,
    /// Create the internal subset instead of the external one
    pub internal: bool,
}

impl<'a> SubsetOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn document(mut self, document: &'a Document) -> Self {
        self.document = Some(document);
        self
    }

    pub fn internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }
}

/// A native DTD together with its ownership state
pub struct Dtd {
    handle: NativeHandle<DtdResource>,
}

impl Dtd {
    /// Parse a complete DTD from text.
    ///
    /// The encoding is auto-detected. The returned handle owns the DTD. libxml2
    /// has no identifiers for an in-memory DTD and fills name, public and system
    /// identifier with the placeholder `"none"`.
    ///
    /// On failure the error carries the first error libxml2 raised.
    pub fn parse_str(text: &str) -> Result<Self> {
        libxml2::init();
        let len = c_int::try_from(text.len()).map_err(|_| BindingError::InvalidArgument {
            argument: "text",
            reason: "DTD larger than 2 GiB".to_string(),
        })?;

        libxml2::reset_last_error();
        let parsed = unsafe {
            let input = libxml2::xmlAllocParserInputBuffer(libxml2::XML_CHAR_ENCODING_NONE);
            if input.is_null() {
                return Err(LibXml2Error::CreationFailed {
                    what: "parser input buffer",
                    diagnostic: libxml2::last_error_or_unknown(),
                }
                .into());
            }
            if libxml2::xmlParserInputBufferPush(input, len, text.as_ptr() as *const c_char) < 0 {
                libxml2::xmlFreeParserInputBuffer(input);
                return Err(LibXml2Error::DtdParseFailed {
                    diagnostic: libxml2::last_error_or_unknown(),
                }
                .into());
            }
            // The parser takes the input buffer and frees it on every path
            libxml2::collect_errors(|| {
                libxml2::xmlIOParseDTD(std::ptr::null_mut(), input, libxml2::XML_CHAR_ENCODING_NONE)
            })
        };

        Self::parsed(parsed)
    }

    /// Load and parse the DTD named by a public and system identifier.
    pub fn parse_external(external_id: &str, system_id: &str) -> Result<Self> {
        libxml2::init();
        let external_id = optional_cstring("external_id", Some(external_id))?;
        let system_id = optional_cstring("system_id", Some(system_id))?;

        libxml2::reset_last_error();
        let parsed = libxml2::collect_errors(|| unsafe {
            libxml2::xmlParseDTD(optional_ptr(&external_id), optional_ptr(&system_id))
        });

        Self::parsed(parsed)
    }

    fn parsed((ptr, diagnostics): (*mut XmlDtd, Vec<NativeDiagnostic>)) -> Result<Self> {
        unsafe { Self::owned(ptr) }.ok_or_else(|| {
            LibXml2Error::DtdParseFailed {
                diagnostic: libxml2::first_or_last_error(diagnostics),
            }
            .into()
        })
    }

    /// Create a new subset, optionally hooked into a document.
    ///
    /// With `internal` unset this creates an external subset, which fills the
    /// document's external subset slot. Otherwise it creates the document's
    /// internal subset. libxml2 refuses either when the slot is already taken.
    pub fn create(external_id: &str, system_id: &str, options: SubsetOptions<'_>) -> Result<Self> {
        libxml2::init();
        let external_id = optional_cstring("external_id", Some(external_id))?;
        let system_id = optional_cstring("system_id", Some(system_id))?;
        let name = optional_cstring("name", options.name)?;
        let doc = options
            .document
            .map_or(std::ptr::null_mut(), Document::as_ptr);

        libxml2::reset_last_error();
        let ptr = unsafe {
            if options.internal {
                libxml2::xmlCreateIntSubset(
                    doc,
                    optional_ptr(&name),
                    optional_ptr(&external_id),
                    optional_ptr(&system_id),
                )
            } else {
                libxml2::xmlNewDtd(
                    doc,
                    optional_ptr(&name),
                    optional_ptr(&external_id),
                    optional_ptr(&system_id),
                )
            }
        };

        let mut dtd = unsafe { Self::owned(ptr) }.ok_or_else(|| LibXml2Error::CreationFailed {
            what: if options.internal {
                "internal subset"
            } else {
                "external subset"
            },
            diagnostic: libxml2::last_error_or_unknown(),
        })?;

        if let Some(document) = options.document {
            dtd.handle.attach(document.clone());
        }
        Ok(dtd)
    }

    unsafe fn owned(ptr: *mut XmlDtd) -> Option<Self> {
        unsafe { NativeHandle::owned(ptr) }.map(|handle| Dtd { handle })
    }

    /// Wrap a subset that `document` already owns.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a DTD linked into `document`.
    pub(crate) unsafe fn attached(ptr: *mut XmlDtd, document: Document) -> Option<Self> {
        unsafe { NativeHandle::attached(ptr, document) }.map(|handle| Dtd { handle })
    }

    pub(crate) fn as_ptr(&self) -> Option<*mut XmlDtd> {
        self.handle.as_ptr()
    }

    fn read<T>(&self, field: impl FnOnce(&XmlDtd) -> T) -> Option<T> {
        self.as_ptr().map(|ptr| field(unsafe { &*ptr }))
    }

    pub fn name(&self) -> Option<String> {
        self.read(|dtd| unsafe { libxml2::optional_string(dtd.name) })
            .flatten()
    }

    /// The public identifier.
    pub fn external_id(&self) -> Option<String> {
        self.read(|dtd| unsafe { libxml2::optional_string(dtd.external_id) })
            .flatten()
    }

    /// The system identifier.
    pub fn uri(&self) -> Option<String> {
        self.read(|dtd| unsafe { libxml2::optional_string(dtd.system_id) })
            .flatten()
    }

    /// Alias of [`Dtd::uri`].
    pub fn system_id(&self) -> Option<String> {
        self.uri()
    }

    /// Raw `xmlElementType` tag; [`libxml2::XML_DTD_NODE`] for every DTD.
    pub fn node_type(&self) -> i32 {
        self.read(|dtd| dtd.node_type).unwrap_or(0)
    }

    pub fn is_attached(&self) -> bool {
        self.handle.ownership().is_attached()
    }

    /// The document this subset belongs to, when attached.
    pub fn document(&self) -> Option<&Document> {
        match self.handle.ownership() {
            Ownership::Attached(document) => Some(document),
            _ => None,
        }
    }

    pub fn ownership(&self) -> &Ownership {
        self.handle.ownership()
    }
}

impl fmt::Debug for Dtd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dtd")
            .field("name", &self.name())
            .field("external_id", &self.external_id())
            .field("system_id", &self.system_id())
            .field("ownership", self.ownership())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE_DTD: &str = "<!ELEMENT note (to, body)>\n\
                            <!ELEMENT to (#PCDATA)>\n\
                            <!ELEMENT body (#PCDATA)>\n";

    #[test]
    fn test_parse_str_is_owned() {
        let dtd = Dtd::parse_str(NOTE_DTD).unwrap();
        assert!(dtd.ownership().is_owned());
        assert!(dtd.document().is_none());
        assert_eq!(dtd.node_type(), libxml2::XML_DTD_NODE);
        // In-memory DTDs carry libxml2's placeholder identifiers
        assert_eq!(dtd.name().as_deref(), Some("none"));
        assert_eq!(dtd.external_id().as_deref(), Some("none"));
        assert_eq!(dtd.uri().as_deref(), Some("none"));
    }

    #[test]
    fn test_parse_str_failure() {
        let err = Dtd::parse_str("<!ELEMENT note (to").unwrap_err();
        assert!(err.is_construction_failure());
        match err {
            BindingError::LibXml2(LibXml2Error::DtdParseFailed { diagnostic }) => {
                assert_ne!(diagnostic, NativeDiagnostic::unknown());
            }
            other => panic!("Expected DtdParseFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_create_without_document() {
        let dtd = Dtd::create(
            "-//W3C//DTD XHTML 1.0 Transitional//EN",
            "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd",
            SubsetOptions::new().name("html"),
        )
        .unwrap();

        assert_eq!(dtd.name().as_deref(), Some("html"));
        assert_eq!(
            dtd.external_id().as_deref(),
            Some("-//W3C//DTD XHTML 1.0 Transitional//EN")
        );
        assert_eq!(dtd.uri(), dtd.system_id());
        assert!(dtd.ownership().is_owned());
    }

    #[test]
    fn test_create_attaches_to_document() {
        let document = Document::new().unwrap();
        let dtd = Dtd::create(
            "-//TEST//DTD note//EN",
            "note.dtd",
            SubsetOptions::new().name("note").document(&document),
        )
        .unwrap();

        assert!(dtd.is_attached());
        assert!(dtd.document().unwrap().ptr_eq(&document));
        assert_eq!(document.handle_count(), 2);
        assert_eq!(document.external_subset().unwrap().name().as_deref(), Some("note"));
    }

    #[test]
    fn test_second_internal_subset_is_refused() {
        let document = Document::new().unwrap();
        let first = Dtd::create("a", "a.dtd", SubsetOptions::new().document(&document).internal(true));
        assert!(first.is_ok());

        let second = Dtd::create("b", "b.dtd", SubsetOptions::new().document(&document).internal(true));
        let err = second.unwrap_err();
        assert!(err.is_construction_failure());
        assert_eq!(document.handle_count(), 2);
    }

    #[test]
    fn test_interior_nul_is_rejected() {
        let err = Dtd::create("a\0b", "a.dtd", SubsetOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            BindingError::InvalidArgument {
                argument: "external_id",
                ..
            }
        ));
    }
}
