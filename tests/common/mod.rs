//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use libxml_bridge::{Writer, WriterOutput};
use tempfile::TempDir;

pub const NOTE_DTD: &str = r#"<!ELEMENT note (to, from, body)>
<!ELEMENT to (#PCDATA)>
<!ELEMENT from (#PCDATA)>
<!ELEMENT body (#PCDATA)>
<!ATTLIST note id CDATA #IMPLIED>
"#;

pub const VALID_NOTE: &str = r#"<?xml version="1.0"?>
<note id="n1"><to>Tove</to><from>Jani</from><body>Hello</body></note>"#;

pub const INVALID_NOTE: &str = r#"<?xml version="1.0"?>
<note><from>Jani</from><body>Hello</body></note>"#;

/// Byte sink whose contents stay inspectable after the writer took it
#[derive(Clone, Default)]
pub struct SharedSink(Rc<RefCell<Vec<u8>>>);

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Byte sink that refuses every write
pub struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Flush a string writer and return everything it produced
pub fn string_result(writer: &mut Writer) -> String {
    match writer.result().expect("flush failed") {
        Some(WriterOutput::Text(text)) => text,
        other => panic!("Expected text output, got {:?}", other),
    }
}

/// Write `content` to a fresh file in a temporary directory
pub fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("failed to write fixture");
    path
}

pub fn read_file(path: &Path) -> String {
    std::fs::read_to_string(path).expect("failed to read output")
}
