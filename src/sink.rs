//! Writer output sinks
//!
//! Each constructor allocates the native text writer together with whatever
//! the session must keep alive for it: the byte-sink context behind the stream
//! callbacks, the native string buffer, or the document being built.

use std::ffi::CString;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::ptr::{self, NonNull};

use libc::{c_char, c_int, c_void};

use crate::document::Document;
use crate::encoding::CharEncoding;
use crate::error::{BindingError, LibXml2Error, Result};
use crate::handle::{BufferResource, NativeHandle, TextWriterResource};
use crate::libxml2;

/// Which kind of output a writer session produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// libxml2 owns the target (file sink)
    None,
    Stream,
    Document,
    String,
}

/// State shared with the native write callback
struct StreamContext {
    sink: Box<dyn Write>,
    closed: bool,
    error: Option<io::Error>,
}

/// Owner of the boxed context handed to `xmlOutputBufferCreateIO`
pub(crate) struct StreamTarget {
    context: NonNull<StreamContext>,
}

impl StreamTarget {
    fn new(sink: Box<dyn Write>) -> Self {
        let context = Box::new(StreamContext {
            sink,
            closed: false,
            error: None,
        });
        StreamTarget {
            context: NonNull::from(Box::leak(context)),
        }
    }

    fn context_ptr(&self) -> *mut c_void {
        self.context.as_ptr() as *mut c_void
    }

    // Only called between native calls; the callback never runs concurrently.
    fn context(&mut self) -> &mut StreamContext {
        unsafe { self.context.as_mut() }
    }

    /// Flush the byte sink, surfacing any error the callback captured.
    fn flush(&mut self) -> io::Result<()> {
        let context = self.context();
        if let Some(err) = context.error.take() {
            return Err(err);
        }
        context.sink.flush()
    }

    fn mark_closed(&mut self) {
        self.context().closed = true;
    }
}

impl Drop for StreamTarget {
    fn drop(&mut self) {
        drop(unsafe { Box::from_raw(self.context.as_ptr()) });
    }
}

unsafe extern "C" fn write_to_stream(
    context: *mut c_void,
    buffer: *const c_char,
    len: c_int,
) -> c_int {
    if context.is_null() || len < 0 {
        return -1;
    }
    let context = unsafe { &mut *(context as *mut StreamContext) };
    if context.closed {
        // Output arriving during teardown is swallowed
        return len;
    }
    if len == 0 || buffer.is_null() {
        return 0;
    }

    let bytes = unsafe { std::slice::from_raw_parts(buffer as *const u8, len as usize) };
    match panic::catch_unwind(AssertUnwindSafe(|| context.sink.write_all(bytes))) {
        Ok(Ok(())) => len,
        Ok(Err(err)) => {
            context.error = Some(err);
            -1
        }
        Err(_) => {
            context.error = Some(io::Error::other("byte sink panicked during write"));
            -1
        }
    }
}

unsafe extern "C" fn close_stream(_context: *mut c_void) -> c_int {
    // The context is reclaimed by `StreamTarget`, after the writer is freed
    0
}

/// The output a session writes into
pub(crate) enum Sink {
    File,
    Stream(StreamTarget),
    Document(Document),
    String(NativeHandle<BufferResource>),
}

impl Sink {
    pub(crate) fn kind(&self) -> SinkKind {
        match self {
            Sink::File => SinkKind::None,
            Sink::Stream(_) => SinkKind::Stream,
            Sink::Document(_) => SinkKind::Document,
            Sink::String(_) => SinkKind::String,
        }
    }

    /// Work needed after the native writer flushed into this sink.
    pub(crate) fn after_flush(&mut self) -> Result<()> {
        match self {
            Sink::Stream(target) => target.flush().map_err(BindingError::from),
            _ => Ok(()),
        }
    }

    pub(crate) fn mark_closed(&mut self) {
        if let Sink::Stream(target) = self {
            target.mark_closed();
        }
    }
}

fn creation_failed(what: &'static str) -> BindingError {
    LibXml2Error::CreationFailed {
        what,
        diagnostic: libxml2::last_error_or_unknown(),
    }
    .into()
}

/// A freshly allocated native writer and the sink it writes into
pub(crate) type OpenedSink = (NativeHandle<TextWriterResource>, Sink);

/// Writer forwarding its output to `sink`, encoded as `encoding`.
pub(crate) fn open_stream(sink: Box<dyn Write>, encoding: CharEncoding) -> Result<OpenedSink> {
    libxml2::init();
    libxml2::reset_last_error();

    let encoder = if encoding.is_utf8() {
        ptr::null_mut()
    } else {
        let name = CString::new(encoding.name()).map_err(|_| BindingError::interior_nul("encoding"))?;
        // Unknown to this libxml2 build: fall back to UTF-8 output
        unsafe { libxml2::xmlFindCharEncodingHandler(name.as_ptr()) }
    };

    let target = StreamTarget::new(sink);
    unsafe {
        let out = libxml2::xmlOutputBufferCreateIO(
            Some(write_to_stream),
            Some(close_stream),
            target.context_ptr(),
            encoder,
        );
        if out.is_null() {
            return Err(creation_failed("output buffer"));
        }

        match NativeHandle::owned(libxml2::xmlNewTextWriter(out)) {
            Some(writer) => Ok((writer, Sink::Stream(target))),
            None => {
                let err = creation_failed("stream writer");
                libxml2::xmlOutputBufferClose(out);
                Err(err)
            }
        }
    }
}

/// Writer whose output file libxml2 opens and owns.
pub(crate) fn open_file(path: &Path) -> Result<OpenedSink> {
    libxml2::init();
    let path = path.to_str().ok_or_else(|| BindingError::InvalidArgument {
        argument: "path",
        reason: "path is not valid UTF-8".to_string(),
    })?;
    let path = CString::new(path).map_err(|_| BindingError::interior_nul("path"))?;

    libxml2::reset_last_error();
    let writer = unsafe { NativeHandle::owned(libxml2::xmlNewTextWriterFilename(path.as_ptr(), 0)) }
        .ok_or_else(|| creation_failed("file writer"))?;
    Ok((writer, Sink::File))
}

/// Writer appending to a native growable buffer.
pub(crate) fn open_string() -> Result<OpenedSink> {
    libxml2::reset_last_error();
    let buffer =
        NativeHandle::<BufferResource>::new_buffer().ok_or_else(|| creation_failed("output buffer"))?;
    let buffer_ptr = buffer.as_ptr().unwrap_or(ptr::null_mut());

    // On failure `buffer` drops here and frees the native buffer
    let writer = unsafe { NativeHandle::owned(libxml2::xmlNewTextWriterMemory(buffer_ptr, 0)) }
        .ok_or_else(|| creation_failed("string writer"))?;
    Ok((writer, Sink::String(buffer)))
}

/// Writer building a document tree in memory.
pub(crate) fn open_document() -> Result<OpenedSink> {
    libxml2::init();
    libxml2::reset_last_error();

    let mut doc: *mut libxml2::XmlDoc = ptr::null_mut();
    let writer = unsafe { NativeHandle::owned(libxml2::xmlNewTextWriterDoc(&mut doc, 0)) }
        .ok_or_else(|| creation_failed("document writer"))?;
    // The writer never frees a document it handed out
    let document = unsafe { Document::from_raw(doc) }.ok_or_else(|| creation_failed("document"))?;
    Ok((writer, Sink::Document(document)))
}
