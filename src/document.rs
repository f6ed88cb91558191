//! Tree document collaborator
//!
//! Just enough of libxml2's document API to own the trees that DTD subsets
//! attach to and that the document-sink writer produces. Clones share one native
//! document, which is freed (along with any attached DTD) when the last clone
//! drops.

use std::fmt;
use std::ptr;
use std::rc::Rc;

use libc::{c_char, c_int};

use crate::dtd::Dtd;
use crate::error::{BindingError, LibXml2Error, Result};
use crate::handle::{BufferResource, DocumentResource, NativeHandle};
use crate::libxml2::{self, NativeDiagnostic};

/// Outcome of validating a document against a DTD
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    /// Every error libxml2 raised while validating, in order
    Invalid { diagnostics: Vec<NativeDiagnostic> },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn diagnostics(&self) -> &[NativeDiagnostic] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid { diagnostics } => diagnostics,
        }
    }
}

/// Shared owner of a native `xmlDoc`
#[derive(Clone)]
pub struct Document {
    inner: Rc<NativeHandle<DocumentResource>>,
}

impl Document {
    /// Create an empty version 1.0 document.
    pub fn new() -> Result<Self> {
        libxml2::init();
        libxml2::reset_last_error();

        let ptr = unsafe { libxml2::xmlNewDoc(c"1.0".as_ptr()) };
        unsafe { Self::from_raw(ptr) }.ok_or_else(|| {
            LibXml2Error::CreationFailed {
                what: "document",
                diagnostic: libxml2::last_error_or_unknown(),
            }
            .into()
        })
    }

    /// Parse a complete XML document from text.
    ///
    /// On failure the error carries the first error libxml2 raised.
    pub fn parse_str(xml: &str) -> Result<Self> {
        libxml2::init();
        let size = c_int::try_from(xml.len()).map_err(|_| BindingError::InvalidArgument {
            argument: "xml",
            reason: "document larger than 2 GiB".to_string(),
        })?;

        libxml2::reset_last_error();
        let (ptr, diagnostics) = libxml2::collect_errors(|| unsafe {
            libxml2::xmlReadMemory(
                xml.as_ptr() as *const c_char,
                size,
                ptr::null(),
                ptr::null(),
                0,
            )
        });
        unsafe { Self::from_raw(ptr) }.ok_or_else(|| {
            LibXml2Error::DocumentParseFailed {
                diagnostic: libxml2::first_or_last_error(diagnostics),
            }
            .into()
        })
    }

    /// Take ownership of a native document.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a document nothing else will free.
    pub(crate) unsafe fn from_raw(ptr: *mut libxml2::XmlDoc) -> Option<Self> {
        unsafe { NativeHandle::owned(ptr) }.map(|handle| Document {
            inner: Rc::new(handle),
        })
    }

    pub(crate) fn as_ptr(&self) -> *mut libxml2::XmlDoc {
        self.inner.as_ptr().unwrap_or(ptr::null_mut())
    }

    /// Number of live clones, DTD keep-alive edges and writer sinks included.
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    /// Whether both values share one native document.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Serialize the document as UTF-8 XML text.
    pub fn to_xml_string(&self) -> Result<String> {
        let buffer = NativeHandle::<BufferResource>::new_buffer().ok_or_else(|| {
            LibXml2Error::CreationFailed {
                what: "output buffer",
                diagnostic: libxml2::last_error_or_unknown(),
            }
        })?;
        let buffer_ptr = buffer.as_ptr().unwrap_or(ptr::null_mut());

        libxml2::reset_last_error();
        unsafe {
            let ctxt = libxml2::xmlSaveToBuffer(buffer_ptr, c"UTF-8".as_ptr(), 0);
            if ctxt.is_null() {
                return Err(LibXml2Error::SerializationFailed {
                    diagnostic: libxml2::last_error_or_unknown(),
                }
                .into());
            }
            let written = libxml2::xmlSaveDoc(ctxt, self.as_ptr());
            // Closing flushes into the buffer
            let closed = libxml2::xmlSaveClose(ctxt);
            if written < 0 || closed < 0 {
                return Err(LibXml2Error::SerializationFailed {
                    diagnostic: libxml2::last_error_or_unknown(),
                }
                .into());
            }
        }

        Ok(String::from_utf8_lossy(&buffer.bytes()).into_owned())
    }

    /// Name of the root element, if the document has one.
    pub fn root_name(&self) -> Option<String> {
        unsafe {
            let root = libxml2::xmlDocGetRootElement(self.as_ptr());
            if root.is_null() {
                None
            } else {
                libxml2::optional_string((*root).name)
            }
        }
    }

    /// Concatenated text content of the root element.
    pub fn root_content(&self) -> Option<String> {
        let buffer = NativeHandle::<BufferResource>::new_buffer()?;
        unsafe {
            let root = libxml2::xmlDocGetRootElement(self.as_ptr());
            if root.is_null() {
                return None;
            }
            if libxml2::xmlNodeBufGetContent(buffer.as_ptr()?, root) < 0 {
                return None;
            }
        }
        Some(String::from_utf8_lossy(&buffer.bytes()).into_owned())
    }

    /// The document's internal DTD subset, as an attached handle.
    pub fn internal_subset(&self) -> Option<Dtd> {
        let doc = self.as_ptr();
        if doc.is_null() {
            return None;
        }
        unsafe { Dtd::attached((*doc).int_subset, self.clone()) }
    }

    /// The document's external DTD subset, as an attached handle.
    pub fn external_subset(&self) -> Option<Dtd> {
        let doc = self.as_ptr();
        if doc.is_null() {
            return None;
        }
        unsafe { Dtd::attached((*doc).ext_subset, self.clone()) }
    }

    /// Validate this document against `dtd`.
    pub fn validate(&self, dtd: &Dtd) -> Result<ValidationResult> {
        let Some(dtd_ptr) = dtd.as_ptr() else {
            return Err(BindingError::InvalidArgument {
                argument: "dtd",
                reason: "DTD handle already released".to_string(),
            });
        };

        unsafe {
            let ctxt = libxml2::xmlNewValidCtxt();
            if ctxt.is_null() {
                return Err(LibXml2Error::ValidationContextCreationFailed.into());
            }

            libxml2::reset_last_error();
            let (code, diagnostics) = libxml2::collect_errors(|| {
                libxml2::xmlValidateDtd(ctxt, self.as_ptr(), dtd_ptr)
            });

            // Always free the validation context
            libxml2::xmlFreeValidCtxt(ctxt);

            if code == 1 {
                Ok(ValidationResult::Valid)
            } else {
                Ok(ValidationResult::Invalid { diagnostics })
            }
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root_name())
            .field("handles", &self.handle_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_is_empty() {
        let document = Document::new().unwrap();
        assert_eq!(document.root_name(), None);
        assert_eq!(document.root_content(), None);
        assert!(document.internal_subset().is_none());
        assert!(document.external_subset().is_none());
    }

    #[test]
    fn test_parse_and_inspect() {
        let document = Document::parse_str("<greeting>hello <b>world</b></greeting>").unwrap();
        assert_eq!(document.root_name().as_deref(), Some("greeting"));
        assert_eq!(document.root_content().as_deref(), Some("hello world"));
    }

    #[test]
    fn test_parse_failure_carries_diagnostic() {
        let err = Document::parse_str("<open>").unwrap_err();
        match err {
            BindingError::LibXml2(LibXml2Error::DocumentParseFailed { diagnostic }) => {
                assert!(!diagnostic.message.is_empty());
            }
            other => panic!("Expected DocumentParseFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_serialization() {
        let document = Document::parse_str("<root a=\"1\"/>").unwrap();
        let xml = document.to_xml_string().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\""));
        assert!(xml.contains("<root a=\"1\"/>"));
    }

    #[test]
    fn test_validation_collects_every_error() {
        let dtd = Dtd::parse_str("<!ELEMENT note (to)>\n<!ELEMENT to (#PCDATA)>\n").unwrap();
        let document = Document::parse_str("<note><bogus/><other/></note>").unwrap();

        let result = document.validate(&dtd).unwrap();
        assert!(!result.is_valid());
        let messages: Vec<&str> = result
            .diagnostics()
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert!(messages.len() >= 2, "{:?}", messages);
        assert!(messages.iter().any(|m| m.contains("bogus")));
        assert!(messages.iter().any(|m| m.contains("other")));
    }

    #[test]
    fn test_valid_document_has_no_diagnostics() {
        let dtd = Dtd::parse_str("<!ELEMENT note (#PCDATA)>\n").unwrap();
        let document = Document::parse_str("<note>hi</note>").unwrap();

        let result = document.validate(&dtd).unwrap();
        assert_eq!(result, ValidationResult::Valid);
        assert!(result.diagnostics().is_empty());
    }

    #[test]
    fn test_clones_share_native_document() {
        let document = Document::new().unwrap();
        let clone = document.clone();
        assert!(document.ptr_eq(&clone));
        assert_eq!(document.handle_count(), 2);
        assert_eq!(document.as_ptr(), clone.as_ptr());

        drop(clone);
        assert_eq!(document.handle_count(), 1);
    }

    #[test]
    fn test_internal_subset_from_parsed_document() {
        let document =
            Document::parse_str("<!DOCTYPE note [<!ELEMENT note (#PCDATA)>]><note>hi</note>")
                .unwrap();
        let subset = document.internal_subset().unwrap();
        assert_eq!(subset.name().as_deref(), Some("note"));
        assert!(subset.is_attached());
        assert_eq!(document.handle_count(), 2);
    }
}
