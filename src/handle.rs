//! Native handle ownership policy
//!
//! Every libxml2 object this crate touches is held in a [`NativeHandle`], which
//! pairs the raw pointer with an [`Ownership`] tag. Release logic branches on the
//! tag instead of on whatever the native parent pointers happen to say:
//!
//! - `Owned`: the handle frees the object when dropped, unless libxml2 has since
//!   linked it under a document or parent node.
//! - `Attached(document)`: the document's teardown frees the object. The handle
//!   keeps a strong [`Document`] clone so that teardown cannot run first; it is a
//!   reachability edge, never a release trigger.
//! - `Released`: nothing left to do, and the pointer is no longer handed out.

use std::fmt;
use std::ptr::NonNull;

use crate::document::Document;
use crate::libxml2;

/// Who is responsible for freeing a native object
#[derive(Clone)]
pub enum Ownership {
    Owned,
    Attached(Document),
    Released,
}

impl Ownership {
    pub fn is_owned(&self) -> bool {
        matches!(self, Ownership::Owned)
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, Ownership::Attached(_))
    }

    pub fn is_released(&self) -> bool {
        matches!(self, Ownership::Released)
    }
}

impl fmt::Debug for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ownership::Owned => f.write_str("Owned"),
            Ownership::Attached(_) => f.write_str("Attached"),
            Ownership::Released => f.write_str("Released"),
        }
    }
}

/// A kind of libxml2 object and how to free it
pub(crate) trait NativeResource {
    type Raw;

    /// Free the native object.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live object of this kind that nothing else will free.
    unsafe fn free(ptr: NonNull<Self::Raw>);

    /// Whether libxml2 itself has linked the object under another owner.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live object of this kind.
    unsafe fn has_native_owner(_ptr: NonNull<Self::Raw>) -> bool {
        false
    }
}

/// A libxml2 pointer together with its ownership state
pub(crate) struct NativeHandle<R: NativeResource> {
    ptr: NonNull<R::Raw>,
    ownership: Ownership,
}

impl<R: NativeResource> NativeHandle<R> {
    /// Take ownership of a freshly allocated native object.
    ///
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live object of this kind with no other owner.
    pub(crate) unsafe fn owned(ptr: *mut R::Raw) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| NativeHandle {
            ptr,
            ownership: Ownership::Owned,
        })
    }

    /// Wrap an object whose lifetime belongs to `document`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live object that `document` frees on teardown.
    pub(crate) unsafe fn attached(ptr: *mut R::Raw, document: Document) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| NativeHandle {
            ptr,
            ownership: Ownership::Attached(document),
        })
    }

    /// The raw pointer, or `None` once released.
    pub(crate) fn as_ptr(&self) -> Option<*mut R::Raw> {
        if self.ownership.is_released() {
            None
        } else {
            Some(self.ptr.as_ptr())
        }
    }

    pub(crate) fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    /// Hand the object over to `document`; the handle will no longer free it.
    pub(crate) fn attach(&mut self, document: Document) {
        if !self.ownership.is_released() {
            self.ownership = Ownership::Attached(document);
        }
    }

    /// Release according to the ownership state. Idempotent.
    pub(crate) fn release(&mut self) {
        match std::mem::replace(&mut self.ownership, Ownership::Released) {
            Ownership::Owned => unsafe {
                if !R::has_native_owner(self.ptr) {
                    R::free(self.ptr);
                }
            },
            // Dropping the clone here is the only effect; the document frees the object
            Ownership::Attached(_document) => {}
            Ownership::Released => {}
        }
    }
}

impl<R: NativeResource> Drop for NativeHandle<R> {
    fn drop(&mut self) {
        self.release();
    }
}

/// `xmlDoc`, freed with everything linked under it (subsets included)
pub(crate) struct DocumentResource;

impl NativeResource for DocumentResource {
    type Raw = libxml2::XmlDoc;

    unsafe fn free(ptr: NonNull<libxml2::XmlDoc>) {
        unsafe { libxml2::xmlFreeDoc(ptr.as_ptr()) }
    }
}

/// `xmlDtd`; libxml2 owns it once it has a document or a parent
pub(crate) struct DtdResource;

impl NativeResource for DtdResource {
    type Raw = libxml2::XmlDtd;

    unsafe fn free(ptr: NonNull<libxml2::XmlDtd>) {
        unsafe { libxml2::xmlFreeDtd(ptr.as_ptr()) }
    }

    unsafe fn has_native_owner(ptr: NonNull<libxml2::XmlDtd>) -> bool {
        let dtd = unsafe { ptr.as_ref() };
        !dtd.doc.is_null() || !dtd.parent.is_null()
    }
}

/// `xmlBuffer`, the growable byte buffer behind string output
pub(crate) struct BufferResource;

impl NativeResource for BufferResource {
    type Raw = libxml2::XmlBuffer;

    unsafe fn free(ptr: NonNull<libxml2::XmlBuffer>) {
        unsafe { libxml2::xmlBufferFree(ptr.as_ptr()) }
    }
}

impl NativeHandle<BufferResource> {
    /// Allocate an empty buffer.
    pub(crate) fn new_buffer() -> Option<Self> {
        libxml2::init();
        unsafe { Self::owned(libxml2::xmlBufferCreate()) }
    }

    /// Copy of the bytes written so far.
    pub(crate) fn bytes(&self) -> Vec<u8> {
        let Some(buffer) = self.as_ptr() else {
            return Vec::new();
        };
        unsafe {
            let content = libxml2::xmlBufferContent(buffer);
            let len = libxml2::xmlBufferLength(buffer);
            if content.is_null() || len <= 0 {
                Vec::new()
            } else {
                std::slice::from_raw_parts(content as *const u8, len as usize).to_vec()
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        if let Some(buffer) = self.as_ptr() {
            unsafe { libxml2::xmlBufferEmpty(buffer) }
        }
    }
}

/// `xmlTextWriter`; freeing it also closes (and flushes) its output buffer
pub(crate) struct TextWriterResource;

impl NativeResource for TextWriterResource {
    type Raw = libxml2::XmlTextWriter;

    unsafe fn free(ptr: NonNull<libxml2::XmlTextWriter>) {
        unsafe { libxml2::xmlFreeTextWriter(ptr.as_ptr()) }
    }
}
