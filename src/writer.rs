//! Streaming writer adapter
//!
//! A [`Writer`] is one forward-only serialization session over libxml2's
//! `xmlTextWriter`, bound to a single sink for its whole life. Operations
//! mirror the native begin/write/end primitives and report failure as `false`;
//! libxml2 itself decides which call sequences are structurally valid.
//!
//! Every text argument goes through one marshalling step into NUL-terminated
//! UTF-8, the only input libxml2 accepts; its output encoder produces the
//! session encoding. `None` arguments reach libxml2 as null pointers, which it
//! interprets per call (a missing namespace URI suppresses the `xmlns`
//! declaration, a missing system id drops the `SYSTEM` clause).

use std::fmt;
use std::io::Write;
use std::path::Path;

use libc::{c_char, c_int};
use serde::{Deserialize, Serialize};

use crate::config::WriterConfig;
use crate::diagnostics::DiagnosticReporter;
use crate::document::Document;
use crate::encoding::{CharEncoding, MarshalledArgs};
use crate::error::{BindingError, LibXml2Error, Result};
use crate::handle::{NativeHandle, TextWriterResource};
use crate::libxml2::{self, NativeDiagnostic, XmlTextWriter};
use crate::sink::{self, OpenedSink, Sink, SinkKind};

/// Options for [`Writer::start_document`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentOptions {
    /// Declared and output encoding; `None` means UTF-8 without a declaration
    pub encoding: Option<CharEncoding>,
    /// `standalone="yes"` / `"no"`, omitted when `None`
    pub standalone: Option<bool>,
}

impl DocumentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encoding(mut self, encoding: CharEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn standalone(mut self, standalone: bool) -> Self {
        self.standalone = Some(standalone);
        self
    }
}

/// What [`Writer::flush`] produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flushed {
    /// Buffered text of a string sink
    Text(String),
    /// Bytes pushed to any other sink
    Bytes(usize),
}

/// The final artifact of a session
#[derive(Debug, Clone)]
pub enum WriterOutput {
    Document(Document),
    Text(String),
}

impl WriterOutput {
    pub fn into_text(self) -> Option<String> {
        match self {
            WriterOutput::Text(text) => Some(text),
            WriterOutput::Document(_) => None,
        }
    }

    pub fn into_document(self) -> Option<Document> {
        match self {
            WriterOutput::Document(document) => Some(document),
            WriterOutput::Text(_) => None,
        }
    }
}

/// One forward-only XML serialization session
pub struct Writer {
    // Declared before `sink`: the native writer must be freed first
    handle: NativeHandle<TextWriterResource>,
    sink: Sink,
    encoding: CharEncoding,
    document_options: DocumentOptions,
    reporter: DiagnosticReporter,
    last_error: Option<NativeDiagnostic>,
}

impl Writer {
    fn from_opened((handle, sink): OpenedSink, encoding: CharEncoding) -> Self {
        Writer {
            handle,
            sink,
            encoding,
            document_options: DocumentOptions::default(),
            reporter: DiagnosticReporter::default(),
            last_error: None,
        }
    }

    /// Session writing UTF-8 into any byte sink.
    pub fn stream<W: Write + 'static>(sink: W) -> Result<Self> {
        Self::stream_with_encoding(sink, CharEncoding::Utf8)
    }

    /// Session writing into a byte sink in the given encoding.
    ///
    /// Output is pushed to `sink` whenever libxml2 flushes. An I/O error from
    /// the sink fails the native call that triggered it and is returned by
    /// the next [`Writer::flush`].
    pub fn stream_with_encoding<W: Write + 'static>(
        sink: W,
        encoding: CharEncoding,
    ) -> Result<Self> {
        let opened = sink::open_stream(Box::new(sink), encoding)?;
        Ok(Self::from_opened(opened, encoding))
    }

    /// Session writing a file that libxml2 opens and owns.
    pub fn file(path: impl AsRef<Path>) -> Result<Self> {
        let opened = sink::open_file(path.as_ref())?;
        Ok(Self::from_opened(opened, CharEncoding::Utf8))
    }

    /// Session accumulating output in memory.
    pub fn string() -> Result<Self> {
        let opened = sink::open_string()?;
        Ok(Self::from_opened(opened, CharEncoding::Utf8))
    }

    /// Session building a [`Document`] tree.
    pub fn document() -> Result<Self> {
        let opened = sink::open_document()?;
        Ok(Self::from_opened(opened, CharEncoding::Utf8))
    }

    pub fn sink_kind(&self) -> SinkKind {
        self.sink.kind()
    }

    /// Encoding of the session's output.
    pub fn encoding(&self) -> CharEncoding {
        self.encoding
    }

    pub fn is_closed(&self) -> bool {
        self.handle.as_ptr().is_none()
    }

    /// Native diagnostic recorded by the most recent failing operation.
    pub fn last_error(&self) -> Option<&NativeDiagnostic> {
        self.last_error.as_ref()
    }

    pub fn set_reporter(&mut self, reporter: DiagnosticReporter) {
        self.reporter = reporter;
    }

    /// Run one native call with marshalled arguments and map its status.
    fn invoke<F>(
        &mut self,
        operation: &'static str,
        args: &[(&'static str, Option<&str>)],
        call: F,
    ) -> bool
    where
        F: FnOnce(*mut XmlTextWriter, &MarshalledArgs) -> c_int,
    {
        let Some(writer) = self.handle.as_ptr() else {
            self.reporter.report_operation_failure(operation, None);
            return false;
        };

        let args = match MarshalledArgs::marshal(args) {
            Ok(args) => args,
            Err(err) => {
                self.last_error = None;
                self.reporter.report_error(&err);
                return false;
            }
        };

        libxml2::reset_last_error();
        if libxml2::status_ok(call(writer, &args)) {
            true
        } else {
            self.last_error = libxml2::last_error();
            self.reporter
                .report_operation_failure(operation, self.last_error.as_ref());
            false
        }
    }

    fn invoke_void(
        &mut self,
        operation: &'static str,
        native: unsafe extern "C" fn(*mut XmlTextWriter) -> c_int,
    ) -> bool {
        self.invoke(operation, &[], |writer, _| unsafe { native(writer) })
    }

    fn invoke_single(
        &mut self,
        operation: &'static str,
        argument: &'static str,
        value: &str,
        native: unsafe extern "C" fn(*mut XmlTextWriter, *const c_char) -> c_int,
    ) -> bool {
        self.invoke(operation, &[(argument, Some(value))], |writer, args| unsafe {
            native(writer, args.ptr(0))
        })
    }

    /// Start, then write `content` if given, then end; stops at the first failure.
    fn write_composite(
        &mut self,
        start: impl FnOnce(&mut Self) -> bool,
        content: Option<&str>,
        end: impl FnOnce(&mut Self) -> bool,
    ) -> bool {
        if !start(self) {
            return false;
        }
        if let Some(content) = content
            && !self.write_string(content)
        {
            return false;
        }
        end(self)
    }

    // Formatting

    pub fn set_indent(&mut self, indent: bool) -> bool {
        self.invoke("set_indent", &[], |writer, _| unsafe {
            libxml2::xmlTextWriterSetIndent(writer, c_int::from(indent))
        })
    }

    pub fn set_indent_string(&mut self, indentation: &str) -> bool {
        self.invoke_single(
            "set_indent_string",
            "indentation",
            indentation,
            libxml2::xmlTextWriterSetIndentString,
        )
    }

    /// Set the attribute quote character; libxml2 accepts only `"` and `'`.
    pub fn set_quote_char(&mut self, quote: char) -> bool {
        let Ok(byte) = u8::try_from(quote) else {
            self.last_error = None;
            self.reporter.report_operation_failure("set_quote_char", None);
            return false;
        };
        self.invoke("set_quote_char", &[], |writer, _| unsafe {
            libxml2::xmlTextWriterSetQuoteChar(writer, byte)
        })
    }

    /// Apply formatting, document defaults and diagnostics from `config`.
    ///
    /// Returns `false` if libxml2 rejected any formatting setting.
    pub fn apply_config(&mut self, config: &WriterConfig) -> bool {
        self.reporter = DiagnosticReporter::from_config(&config.diagnostics);
        self.document_options = config.document.clone();

        let mut ok = self.set_indent(config.format.indent);
        if let Some(indentation) = &config.format.indent_string {
            ok &= self.set_indent_string(indentation);
        }
        if let Some(quote) = config.format.quote_char {
            ok &= self.set_quote_char(quote);
        }
        ok
    }

    // Document

    /// Write the XML declaration.
    ///
    /// On success the session encoding becomes `options.encoding` (UTF-8 when
    /// unset), matching what libxml2 does to its output encoder.
    pub fn start_document(&mut self, options: &DocumentOptions) -> bool {
        let standalone = options
            .standalone
            .map(|standalone| if standalone { "yes" } else { "no" });
        let started = self.invoke(
            "start_document",
            &[
                ("encoding", options.encoding.map(|e| e.name())),
                ("standalone", standalone),
            ],
            |writer, args| unsafe {
                libxml2::xmlTextWriterStartDocument(
                    writer,
                    std::ptr::null(),
                    args.ptr(0),
                    args.ptr(1),
                )
            },
        );
        if started {
            self.encoding = options.encoding.unwrap_or_default();
        }
        started
    }

    /// [`Writer::start_document`] with the options from the applied config.
    pub fn start_configured_document(&mut self) -> bool {
        let options = self.document_options.clone();
        self.start_document(&options)
    }

    pub fn end_document(&mut self) -> bool {
        self.invoke_void("end_document", libxml2::xmlTextWriterEndDocument)
    }

    // Elements

    pub fn start_element(&mut self, name: &str) -> bool {
        self.invoke_single(
            "start_element",
            "name",
            name,
            libxml2::xmlTextWriterStartElement,
        )
    }

    /// Start an element in a namespace.
    ///
    /// With `namespace_uri` unset no `xmlns` declaration is written, which is
    /// how an already-declared prefix is reused.
    pub fn start_element_ns(
        &mut self,
        prefix: Option<&str>,
        name: &str,
        namespace_uri: Option<&str>,
    ) -> bool {
        self.invoke(
            "start_element_ns",
            &[
                ("prefix", prefix),
                ("name", Some(name)),
                ("namespace_uri", namespace_uri),
            ],
            |writer, args| unsafe {
                libxml2::xmlTextWriterStartElementNS(
                    writer,
                    args.ptr(0),
                    args.ptr(1),
                    args.ptr(2),
                )
            },
        )
    }

    /// Close the current element, as `<a/>` when it is still empty.
    pub fn end_element(&mut self) -> bool {
        self.invoke_void("end_element", libxml2::xmlTextWriterEndElement)
    }

    /// Close the current element, always with a separate end tag.
    pub fn full_end_element(&mut self) -> bool {
        self.invoke_void("full_end_element", libxml2::xmlTextWriterFullEndElement)
    }

    /// Write a whole element; without content it is an empty element.
    pub fn write_element(&mut self, name: &str, content: Option<&str>) -> bool {
        self.write_composite(
            |writer| writer.start_element(name),
            content,
            Self::end_element,
        )
    }

    pub fn write_element_ns(
        &mut self,
        prefix: Option<&str>,
        name: &str,
        namespace_uri: Option<&str>,
        content: Option<&str>,
    ) -> bool {
        self.write_composite(
            |writer| writer.start_element_ns(prefix, name, namespace_uri),
            content,
            Self::end_element,
        )
    }

    // Attributes

    pub fn start_attribute(&mut self, name: &str) -> bool {
        self.invoke_single(
            "start_attribute",
            "name",
            name,
            libxml2::xmlTextWriterStartAttribute,
        )
    }

    pub fn start_attribute_ns(
        &mut self,
        prefix: Option<&str>,
        name: &str,
        namespace_uri: Option<&str>,
    ) -> bool {
        self.invoke(
            "start_attribute_ns",
            &[
                ("prefix", prefix),
                ("name", Some(name)),
                ("namespace_uri", namespace_uri),
            ],
            |writer, args| unsafe {
                libxml2::xmlTextWriterStartAttributeNS(
                    writer,
                    args.ptr(0),
                    args.ptr(1),
                    args.ptr(2),
                )
            },
        )
    }

    pub fn end_attribute(&mut self) -> bool {
        self.invoke_void("end_attribute", libxml2::xmlTextWriterEndAttribute)
    }

    pub fn write_attribute(&mut self, name: &str, content: &str) -> bool {
        self.write_composite(
            |writer| writer.start_attribute(name),
            Some(content),
            Self::end_attribute,
        )
    }

    pub fn write_attribute_ns(
        &mut self,
        prefix: Option<&str>,
        name: &str,
        namespace_uri: Option<&str>,
        content: &str,
    ) -> bool {
        self.write_composite(
            |writer| writer.start_attribute_ns(prefix, name, namespace_uri),
            Some(content),
            Self::end_attribute,
        )
    }

    // Comments, CDATA sections, processing instructions

    pub fn start_comment(&mut self) -> bool {
        self.invoke_void("start_comment", libxml2::xmlTextWriterStartComment)
    }

    pub fn end_comment(&mut self) -> bool {
        self.invoke_void("end_comment", libxml2::xmlTextWriterEndComment)
    }

    pub fn write_comment(&mut self, content: &str) -> bool {
        self.write_composite(Self::start_comment, Some(content), Self::end_comment)
    }

    pub fn start_cdata(&mut self) -> bool {
        self.invoke_void("start_cdata", libxml2::xmlTextWriterStartCDATA)
    }

    pub fn end_cdata(&mut self) -> bool {
        self.invoke_void("end_cdata", libxml2::xmlTextWriterEndCDATA)
    }

    pub fn write_cdata(&mut self, content: &str) -> bool {
        self.write_composite(Self::start_cdata, Some(content), Self::end_cdata)
    }

    pub fn start_pi(&mut self, target: &str) -> bool {
        self.invoke_single("start_pi", "target", target, libxml2::xmlTextWriterStartPI)
    }

    pub fn end_pi(&mut self) -> bool {
        self.invoke_void("end_pi", libxml2::xmlTextWriterEndPI)
    }

    pub fn write_pi(&mut self, target: &str, content: &str) -> bool {
        self.write_composite(
            |writer| writer.start_pi(target),
            Some(content),
            Self::end_pi,
        )
    }

    // Text

    /// Write text, escaping `<`, `&` and (in attributes) `"`.
    pub fn write_string(&mut self, content: &str) -> bool {
        self.invoke_single(
            "write_string",
            "content",
            content,
            libxml2::xmlTextWriterWriteString,
        )
    }

    /// Write text verbatim.
    pub fn write_raw(&mut self, content: &str) -> bool {
        self.invoke_single(
            "write_raw",
            "content",
            content,
            libxml2::xmlTextWriterWriteRaw,
        )
    }

    // DTD

    pub fn start_dtd(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> bool {
        self.invoke(
            "start_dtd",
            &[
                ("name", Some(name)),
                ("public_id", public_id),
                ("system_id", system_id),
            ],
            |writer, args| unsafe {
                libxml2::xmlTextWriterStartDTD(writer, args.ptr(0), args.ptr(1), args.ptr(2))
            },
        )
    }

    pub fn end_dtd(&mut self) -> bool {
        self.invoke_void("end_dtd", libxml2::xmlTextWriterEndDTD)
    }

    /// Write a whole `<!DOCTYPE>`, with `subset` as its internal subset.
    pub fn write_dtd(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        subset: Option<&str>,
    ) -> bool {
        self.write_composite(
            |writer| writer.start_dtd(name, public_id, system_id),
            subset,
            Self::end_dtd,
        )
    }

    pub fn start_dtd_element(&mut self, name: &str) -> bool {
        self.invoke_single(
            "start_dtd_element",
            "name",
            name,
            libxml2::xmlTextWriterStartDTDElement,
        )
    }

    pub fn end_dtd_element(&mut self) -> bool {
        self.invoke_void("end_dtd_element", libxml2::xmlTextWriterEndDTDElement)
    }

    /// Write `<!ELEMENT name content>`.
    pub fn write_dtd_element(&mut self, name: &str, content: &str) -> bool {
        self.write_composite(
            |writer| writer.start_dtd_element(name),
            Some(content),
            Self::end_dtd_element,
        )
    }

    pub fn start_dtd_attlist(&mut self, name: &str) -> bool {
        self.invoke_single(
            "start_dtd_attlist",
            "name",
            name,
            libxml2::xmlTextWriterStartDTDAttlist,
        )
    }

    pub fn end_dtd_attlist(&mut self) -> bool {
        self.invoke_void("end_dtd_attlist", libxml2::xmlTextWriterEndDTDAttlist)
    }

    /// Write `<!ATTLIST name content>`.
    pub fn write_dtd_attlist(&mut self, name: &str, content: &str) -> bool {
        self.write_composite(
            |writer| writer.start_dtd_attlist(name),
            Some(content),
            Self::end_dtd_attlist,
        )
    }

    /// Start an entity declaration; `pe` makes it a parameter entity.
    pub fn start_dtd_entity(&mut self, name: &str, pe: bool) -> bool {
        self.invoke("start_dtd_entity", &[("name", Some(name))], |writer, args| unsafe {
            libxml2::xmlTextWriterStartDTDEntity(writer, c_int::from(pe), args.ptr(0))
        })
    }

    pub fn end_dtd_entity(&mut self) -> bool {
        self.invoke_void("end_dtd_entity", libxml2::xmlTextWriterEndDTDEntity)
    }

    /// Write `<!ENTITY name "content">` (or `<!ENTITY % ...>` with `pe`).
    pub fn write_dtd_internal_entity(&mut self, name: &str, content: &str, pe: bool) -> bool {
        self.write_composite(
            |writer| writer.start_dtd_entity(name, pe),
            Some(content),
            Self::end_dtd_entity,
        )
    }

    /// `xmlTextWriterWriteDTDEntity`: internal when `content` is given,
    /// external otherwise.
    pub fn write_dtd_entity(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        ndata_id: Option<&str>,
        content: Option<&str>,
        pe: bool,
    ) -> bool {
        self.invoke(
            "write_dtd_entity",
            &[
                ("name", Some(name)),
                ("public_id", public_id),
                ("system_id", system_id),
                ("ndata_id", ndata_id),
                ("content", content),
            ],
            |writer, args| unsafe {
                libxml2::xmlTextWriterWriteDTDEntity(
                    writer,
                    c_int::from(pe),
                    args.ptr(0),
                    args.ptr(1),
                    args.ptr(2),
                    args.ptr(3),
                    args.ptr(4),
                )
            },
        )
    }

    /// `xmlTextWriterWriteDTDExternalEntity`; `ndata_id` is rejected by
    /// libxml2 for parameter entities.
    pub fn write_dtd_external_entity(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
        ndata_id: Option<&str>,
        pe: bool,
    ) -> bool {
        self.invoke(
            "write_dtd_external_entity",
            &[
                ("name", Some(name)),
                ("public_id", public_id),
                ("system_id", system_id),
                ("ndata_id", ndata_id),
            ],
            |writer, args| unsafe {
                libxml2::xmlTextWriterWriteDTDExternalEntity(
                    writer,
                    c_int::from(pe),
                    args.ptr(0),
                    args.ptr(1),
                    args.ptr(2),
                    args.ptr(3),
                )
            },
        )
    }

    /// The `PUBLIC`/`SYSTEM`/`NDATA` tail of an entity opened with
    /// [`Writer::start_dtd_entity`].
    pub fn write_dtd_external_entity_contents(
        &mut self,
        public_id: Option<&str>,
        system_id: Option<&str>,
        ndata_id: Option<&str>,
    ) -> bool {
        self.invoke(
            "write_dtd_external_entity_contents",
            &[
                ("public_id", public_id),
                ("system_id", system_id),
                ("ndata_id", ndata_id),
            ],
            |writer, args| unsafe {
                libxml2::xmlTextWriterWriteDTDExternalEntityContents(
                    writer,
                    args.ptr(0),
                    args.ptr(1),
                    args.ptr(2),
                )
            },
        )
    }

    pub fn write_dtd_notation(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> bool {
        self.invoke(
            "write_dtd_notation",
            &[
                ("name", Some(name)),
                ("public_id", public_id),
                ("system_id", system_id),
            ],
            |writer, args| unsafe {
                libxml2::xmlTextWriterWriteDTDNotation(
                    writer,
                    args.ptr(0),
                    args.ptr(1),
                    args.ptr(2),
                )
            },
        )
    }

    // Output

    fn flush_native(&mut self) -> Result<usize> {
        let writer = self.handle.as_ptr().ok_or(BindingError::Closed)?;

        libxml2::reset_last_error();
        let count = unsafe { libxml2::xmlTextWriterFlush(writer) };
        // A sink I/O error explains a failed flush better than libxml2 does
        self.sink.after_flush()?;
        if !libxml2::status_ok(count) {
            return Err(LibXml2Error::FlushFailed {
                diagnostic: libxml2::last_error_or_unknown(),
            }
            .into());
        }
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Push buffered output to the sink.
    ///
    /// A string sink returns its buffered text, emptied afterwards when
    /// `empty` is set; every other sink returns the flushed byte count.
    pub fn flush(&mut self, empty: bool) -> Result<Flushed> {
        let count = self.flush_native()?;
        let encoding = self.encoding;
        match &mut self.sink {
            Sink::String(buffer) => {
                let text = encoding.decode(&buffer.bytes());
                if empty {
                    buffer.clear();
                }
                Ok(Flushed::Text(text))
            }
            _ => Ok(Flushed::Bytes(count)),
        }
    }

    /// The session's artifact: the document, the accumulated text, or `None`
    /// for stream and file sinks.
    ///
    /// Flushes first while the session is open; after [`Writer::close`] the
    /// artifact is still available.
    pub fn result(&mut self) -> Result<Option<WriterOutput>> {
        if !self.is_closed() {
            self.flush_native()?;
        }
        Ok(match &self.sink {
            Sink::Document(document) => Some(WriterOutput::Document(document.clone())),
            Sink::String(buffer) => Some(WriterOutput::Text(self.encoding.decode(&buffer.bytes()))),
            Sink::Stream(_) | Sink::File => None,
        })
    }

    /// Flush and release the native writer. Idempotent.
    ///
    /// Afterwards every operation returns `false` and `flush` returns
    /// [`BindingError::Closed`]. The file is closed, the byte sink no longer
    /// receives output, and a document sink's tree is complete.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Err(err) = self.flush_native() {
            self.reporter.report_error(&err);
        }
        self.sink.mark_closed();
        self.handle.release();
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("sink", &self.sink_kind())
            .field("encoding", &self.encoding)
            .field("closed", &self.is_closed())
            .finish()
    }
}
