//! LibXML2 FFI layer
//!
//! Raw declarations for the parts of libxml2 this crate binds: DTD parsing and
//! creation, the `xmlTextWriter` family, in-memory buffers, and just enough of
//! the tree API to own documents produced by the writer.
//!
//! ## Linking
//!
//! The system `xml2` library is linked directly (`libxml2` on Windows). No build
//! script is involved; `pkg-config` style discovery is left to the linker search
//! path.
//!
//! ## Struct layouts
//!
//! Most native objects stay opaque. `xmlDtd`, `xmlDoc` and `xmlNode` are declared
//! with their leading fields only, because the adapters read `name`, `doc`,
//! `parent`, `ExternalID`, `SystemID` and the subset slots directly. Those
//! prefixes have been stable since libxml2 2.6. Never construct these structs in
//! Rust; only read through pointers handed out by libxml2.

use std::ffi::{CStr, CString};
use std::fmt;
use std::ptr;
use std::sync::Once;

use libc::{c_char, c_int, c_long, c_void};

use crate::error::{BindingError, Result};

/// Global initialization flag for libxml2
///
/// libxml2's initialization functions are NOT thread-safe, so they are guarded
/// by `std::sync::Once` and run before the first handle is created.
static LIBXML2_INIT: Once = Once::new();

/// `XML_DTD_NODE` from libxml2's `xmlElementType` enumeration.
pub const XML_DTD_NODE: i32 = 14;

/// `XML_CHAR_ENCODING_NONE`: let the parser detect the encoding.
pub(crate) const XML_CHAR_ENCODING_NONE: c_int = 0;

// xmlErrorLevel
pub(crate) const XML_ERR_WARNING: c_int = 1;
pub(crate) const XML_ERR_ERROR: c_int = 2;
pub(crate) const XML_ERR_FATAL: c_int = 3;

// Opaque libxml2 structures
#[repr(C)]
pub struct XmlTextWriter {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlOutputBuffer {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlBuffer {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlParserInputBuffer {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlCharEncodingHandler {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSaveCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlValidCtxt {
    _private: [u8; 0],
}

/// Leading fields of `struct _xmlNode`.
#[repr(C)]
pub struct XmlNode {
    pub _private: *mut c_void,
    pub node_type: c_int,
    pub name: *const c_char,
    pub children: *mut XmlNode,
    pub last: *mut XmlNode,
    pub parent: *mut XmlNode,
    pub next: *mut XmlNode,
    pub prev: *mut XmlNode,
    pub doc: *mut XmlDoc,
}

/// Leading fields of `struct _xmlDoc`, up to the DTD subset slots.
#[repr(C)]
pub struct XmlDoc {
    pub _private: *mut c_void,
    pub node_type: c_int,
    pub name: *mut c_char,
    pub children: *mut XmlNode,
    pub last: *mut XmlNode,
    pub parent: *mut XmlNode,
    pub next: *mut XmlNode,
    pub prev: *mut XmlNode,
    pub doc: *mut XmlDoc,
    pub compression: c_int,
    pub standalone: c_int,
    pub int_subset: *mut XmlDtd,
    pub ext_subset: *mut XmlDtd,
}

/// Full layout of `struct _xmlDtd`.
#[repr(C)]
pub struct XmlDtd {
    pub _private: *mut c_void,
    pub node_type: c_int,
    pub name: *const c_char,
    pub children: *mut XmlNode,
    pub last: *mut XmlNode,
    pub parent: *mut XmlDoc,
    pub next: *mut XmlNode,
    pub prev: *mut XmlNode,
    pub doc: *mut XmlDoc,
    pub notations: *mut c_void,
    pub elements: *mut c_void,
    pub attributes: *mut c_void,
    pub entities: *mut c_void,
    pub external_id: *const c_char,
    pub system_id: *const c_char,
    pub pentities: *mut c_void,
}

#[allow(non_camel_case_types)]
#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlOutputWriteCallback =
    Option<unsafe extern "C" fn(context: *mut c_void, buffer: *const c_char, len: c_int) -> c_int>;

pub type XmlOutputCloseCallback = Option<unsafe extern "C" fn(context: *mut c_void) -> c_int>;

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *const xmlError)>;

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();

    // Error state
    pub fn xmlGetLastError() -> *const xmlError;
    pub fn xmlResetLastError();
    pub fn xmlSetStructuredErrorFunc(ctx: *mut c_void, handler: XmlStructuredErrorFunc);

    // DTD parsing and creation
    pub fn xmlAllocParserInputBuffer(enc: c_int) -> *mut XmlParserInputBuffer;
    pub fn xmlParserInputBufferPush(
        input: *mut XmlParserInputBuffer,
        len: c_int,
        buf: *const c_char,
    ) -> c_int;
    pub fn xmlFreeParserInputBuffer(input: *mut XmlParserInputBuffer);
    pub fn xmlIOParseDTD(
        sax: *mut c_void,
        input: *mut XmlParserInputBuffer,
        enc: c_int,
    ) -> *mut XmlDtd;
    pub fn xmlParseDTD(external_id: *const c_char, system_id: *const c_char) -> *mut XmlDtd;
    pub fn xmlNewDtd(
        doc: *mut XmlDoc,
        name: *const c_char,
        external_id: *const c_char,
        system_id: *const c_char,
    ) -> *mut XmlDtd;
    pub fn xmlCreateIntSubset(
        doc: *mut XmlDoc,
        name: *const c_char,
        external_id: *const c_char,
        system_id: *const c_char,
    ) -> *mut XmlDtd;
    pub fn xmlFreeDtd(dtd: *mut XmlDtd);

    // Documents
    pub fn xmlNewDoc(version: *const c_char) -> *mut XmlDoc;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);
    pub fn xmlReadMemory(
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlDocGetRootElement(doc: *const XmlDoc) -> *mut XmlNode;
    pub fn xmlNodeBufGetContent(buffer: *mut XmlBuffer, node: *const XmlNode) -> c_int;
    pub fn xmlSaveToBuffer(
        buffer: *mut XmlBuffer,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlSaveCtxt;
    pub fn xmlSaveDoc(ctxt: *mut XmlSaveCtxt, doc: *mut XmlDoc) -> c_long;
    pub fn xmlSaveClose(ctxt: *mut XmlSaveCtxt) -> c_int;

    // DTD validation
    pub fn xmlNewValidCtxt() -> *mut XmlValidCtxt;
    pub fn xmlFreeValidCtxt(ctxt: *mut XmlValidCtxt);
    pub fn xmlValidateDtd(ctxt: *mut XmlValidCtxt, doc: *mut XmlDoc, dtd: *mut XmlDtd) -> c_int;

    // Buffers and output
    pub fn xmlBufferCreate() -> *mut XmlBuffer;
    pub fn xmlBufferFree(buf: *mut XmlBuffer);
    pub fn xmlBufferContent(buf: *const XmlBuffer) -> *const c_char;
    pub fn xmlBufferLength(buf: *const XmlBuffer) -> c_int;
    pub fn xmlBufferEmpty(buf: *mut XmlBuffer);
    pub fn xmlFindCharEncodingHandler(name: *const c_char) -> *mut XmlCharEncodingHandler;
    pub fn xmlOutputBufferCreateIO(
        iowrite: XmlOutputWriteCallback,
        ioclose: XmlOutputCloseCallback,
        ioctx: *mut c_void,
        encoder: *mut XmlCharEncodingHandler,
    ) -> *mut XmlOutputBuffer;
    pub fn xmlOutputBufferClose(out: *mut XmlOutputBuffer) -> c_int;

    // Text writer construction
    pub fn xmlNewTextWriter(out: *mut XmlOutputBuffer) -> *mut XmlTextWriter;
    pub fn xmlNewTextWriterFilename(uri: *const c_char, compression: c_int) -> *mut XmlTextWriter;
    pub fn xmlNewTextWriterMemory(buf: *mut XmlBuffer, compression: c_int) -> *mut XmlTextWriter;
    pub fn xmlNewTextWriterDoc(doc: *mut *mut XmlDoc, compression: c_int) -> *mut XmlTextWriter;
    pub fn xmlFreeTextWriter(writer: *mut XmlTextWriter);
    pub fn xmlTextWriterFlush(writer: *mut XmlTextWriter) -> c_int;

    // Text writer formatting
    pub fn xmlTextWriterSetIndent(writer: *mut XmlTextWriter, indent: c_int) -> c_int;
    pub fn xmlTextWriterSetIndentString(writer: *mut XmlTextWriter, str: *const c_char) -> c_int;
    pub fn xmlTextWriterSetQuoteChar(writer: *mut XmlTextWriter, quotechar: u8) -> c_int;

    // Document, elements, attributes
    pub fn xmlTextWriterStartDocument(
        writer: *mut XmlTextWriter,
        version: *const c_char,
        encoding: *const c_char,
        standalone: *const c_char,
    ) -> c_int;
    pub fn xmlTextWriterEndDocument(writer: *mut XmlTextWriter) -> c_int;
    pub fn xmlTextWriterStartElement(writer: *mut XmlTextWriter, name: *const c_char) -> c_int;
    pub fn xmlTextWriterStartElementNS(
        writer: *mut XmlTextWriter,
        prefix: *const c_char,
        name: *const c_char,
        namespace_uri: *const c_char,
    ) -> c_int;
    pub fn xmlTextWriterEndElement(writer: *mut XmlTextWriter) -> c_int;
    pub fn xmlTextWriterFullEndElement(writer: *mut XmlTextWriter) -> c_int;
    pub fn xmlTextWriterStartAttribute(writer: *mut XmlTextWriter, name: *const c_char) -> c_int;
    pub fn xmlTextWriterStartAttributeNS(
        writer: *mut XmlTextWriter,
        prefix: *const c_char,
        name: *const c_char,
        namespace_uri: *const c_char,
    ) -> c_int;
    pub fn xmlTextWriterEndAttribute(writer: *mut XmlTextWriter) -> c_int;

    // Comments, CDATA, processing instructions, text
    pub fn xmlTextWriterStartComment(writer: *mut XmlTextWriter) -> c_int;
    pub fn xmlTextWriterEndComment(writer: *mut XmlTextWriter) -> c_int;
    pub fn xmlTextWriterStartCDATA(writer: *mut XmlTextWriter) -> c_int;
    pub fn xmlTextWriterEndCDATA(writer: *mut XmlTextWriter) -> c_int;
    pub fn xmlTextWriterStartPI(writer: *mut XmlTextWriter, target: *const c_char) -> c_int;
    pub fn xmlTextWriterEndPI(writer: *mut XmlTextWriter) -> c_int;
    pub fn xmlTextWriterWriteString(writer: *mut XmlTextWriter, content: *const c_char) -> c_int;
    pub fn xmlTextWriterWriteRaw(writer: *mut XmlTextWriter, content: *const c_char) -> c_int;

    // DTD output
    pub fn xmlTextWriterStartDTD(
        writer: *mut XmlTextWriter,
        name: *const c_char,
        pubid: *const c_char,
        sysid: *const c_char,
    ) -> c_int;
    pub fn xmlTextWriterEndDTD(writer: *mut XmlTextWriter) -> c_int;
    pub fn xmlTextWriterStartDTDElement(writer: *mut XmlTextWriter, name: *const c_char) -> c_int;
    pub fn xmlTextWriterEndDTDElement(writer: *mut XmlTextWriter) -> c_int;
    pub fn xmlTextWriterStartDTDAttlist(writer: *mut XmlTextWriter, name: *const c_char) -> c_int;
    pub fn xmlTextWriterEndDTDAttlist(writer: *mut XmlTextWriter) -> c_int;
    pub fn xmlTextWriterStartDTDEntity(
        writer: *mut XmlTextWriter,
        pe: c_int,
        name: *const c_char,
    ) -> c_int;
    pub fn xmlTextWriterEndDTDEntity(writer: *mut XmlTextWriter) -> c_int;
    pub fn xmlTextWriterWriteDTDEntity(
        writer: *mut XmlTextWriter,
        pe: c_int,
        name: *const c_char,
        pubid: *const c_char,
        sysid: *const c_char,
        ndataid: *const c_char,
        content: *const c_char,
    ) -> c_int;
    pub fn xmlTextWriterWriteDTDExternalEntity(
        writer: *mut XmlTextWriter,
        pe: c_int,
        name: *const c_char,
        pubid: *const c_char,
        sysid: *const c_char,
        ndataid: *const c_char,
    ) -> c_int;
    pub fn xmlTextWriterWriteDTDExternalEntityContents(
        writer: *mut XmlTextWriter,
        pubid: *const c_char,
        sysid: *const c_char,
        ndataid: *const c_char,
    ) -> c_int;
    pub fn xmlTextWriterWriteDTDNotation(
        writer: *mut XmlTextWriter,
        name: *const c_char,
        pubid: *const c_char,
        sysid: *const c_char,
    ) -> c_int;
}

/// Initialize libxml2 exactly once, in a thread-safe manner.
///
/// Every constructor in this crate calls this before touching the library, so
/// callers never need to.
pub fn init() {
    LIBXML2_INIT.call_once(|| unsafe {
        xmlInitParser();
    });
}

/// Map a libxml2 status code to success.
///
/// libxml2 returns a byte count or `0` on success and `-1` on failure.
pub(crate) fn status_ok(code: c_int) -> bool {
    code >= 0
}

/// Severity of a native diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    None,
    Warning,
    Error,
    Fatal,
}

impl DiagnosticLevel {
    fn from_raw(level: c_int) -> Self {
        match level {
            XML_ERR_WARNING => DiagnosticLevel::Warning,
            XML_ERR_ERROR => DiagnosticLevel::Error,
            XML_ERR_FATAL => DiagnosticLevel::Fatal,
            _ => DiagnosticLevel::None,
        }
    }
}

/// Owned copy of libxml2's last-error record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeDiagnostic {
    pub domain: i32,
    pub code: i32,
    pub level: DiagnosticLevel,
    pub message: String,
    pub file: Option<String>,
    pub line: i32,
}

impl NativeDiagnostic {
    /// Stand-in used when libxml2 failed without recording an error.
    pub fn unknown() -> Self {
        NativeDiagnostic {
            domain: 0,
            code: 0,
            level: DiagnosticLevel::None,
            message: "unknown libxml2 error".to_string(),
            file: None,
            line: 0,
        }
    }

    /// Copy a native error record.
    ///
    /// # Safety
    ///
    /// `error` must be null or point to a valid `xmlError`.
    pub(crate) unsafe fn from_raw(error: *const xmlError) -> Option<Self> {
        if error.is_null() {
            return None;
        }
        let error = unsafe { &*error };
        // A zeroed record means nothing has been raised since the last reset
        if error.code == 0 && error.message.is_null() {
            return None;
        }

        Some(NativeDiagnostic {
            domain: error.domain,
            code: error.code,
            level: DiagnosticLevel::from_raw(error.level),
            message: unsafe { optional_string(error.message) }
                .map(|m| m.trim().to_string())
                .unwrap_or_default(),
            file: unsafe { optional_string(error.file) },
            line: error.line,
        })
    }
}

impl fmt::Display for NativeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{} ({}:{})", self.message, file, self.line),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Read the calling thread's libxml2 last error, if any.
pub fn last_error() -> Option<NativeDiagnostic> {
    unsafe { NativeDiagnostic::from_raw(xmlGetLastError()) }
}

/// Like [`last_error`], falling back to [`NativeDiagnostic::unknown`].
pub(crate) fn last_error_or_unknown() -> NativeDiagnostic {
    last_error().unwrap_or_else(NativeDiagnostic::unknown)
}

/// The first of `diagnostics`, falling back to [`last_error_or_unknown`].
pub(crate) fn first_or_last_error(diagnostics: Vec<NativeDiagnostic>) -> NativeDiagnostic {
    diagnostics
        .into_iter()
        .next()
        .unwrap_or_else(last_error_or_unknown)
}

/// Clear the calling thread's libxml2 last error.
pub fn reset_last_error() {
    unsafe { xmlResetLastError() }
}

/// Structured error handler pushing every raised error onto a
/// `Vec<NativeDiagnostic>`
unsafe extern "C" fn collect_structured_error(user_data: *mut c_void, error: *const xmlError) {
    if user_data.is_null() {
        return;
    }
    let diagnostics = unsafe { &mut *(user_data as *mut Vec<NativeDiagnostic>) };
    if let Some(diagnostic) = unsafe { NativeDiagnostic::from_raw(error) } {
        diagnostics.push(diagnostic);
    }
}

/// Run `call` with the calling thread's libxml2 errors collected instead of
/// printed to stderr.
///
/// The last-error record is still updated. The default handler is restored
/// before returning.
pub(crate) fn collect_errors<T>(call: impl FnOnce() -> T) -> (T, Vec<NativeDiagnostic>) {
    let mut diagnostics: Vec<NativeDiagnostic> = Vec::new();
    let sink = &mut diagnostics as *mut Vec<NativeDiagnostic> as *mut c_void;

    unsafe { xmlSetStructuredErrorFunc(sink, Some(collect_structured_error)) };
    let value = call();
    unsafe { xmlSetStructuredErrorFunc(ptr::null_mut(), None) };

    (value, diagnostics)
}

/// Copy a nullable C string into an owned `String`.
///
/// # Safety
///
/// `ptr` must be null or a valid NUL-terminated string.
pub(crate) unsafe fn optional_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(
            unsafe { CStr::from_ptr(ptr) }
                .to_string_lossy()
                .into_owned(),
        )
    }
}

/// Convert an optional argument for a native call.
pub(crate) fn optional_cstring(
    argument: &'static str,
    value: Option<&str>,
) -> Result<Option<CString>> {
    value
        .map(|v| CString::new(v).map_err(|_| BindingError::interior_nul(argument)))
        .transpose()
}

/// Pointer for an optional argument, null when absent.
pub(crate) fn optional_ptr(value: &Option<CString>) -> *const c_char {
    value.as_ref().map_or(ptr::null(), |v| v.as_ptr())
}
