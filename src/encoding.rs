//! Character encodings and argument marshalling
//!
//! libxml2 takes every text argument as UTF-8 and converts to the session
//! encoding in its own output encoder. The session encoding is only needed on
//! the way back, to decode what a string sink accumulated. Decoding goes
//! through `encoding_rs`, except for ISO-8859-1, which `encoding_rs` treats as
//! windows-1252 and is mapped byte for byte here.

use std::ffi::CString;
use std::fmt;
use std::str::FromStr;

use encoding_rs::{
    EUC_JP, Encoding, ISO_2022_JP, ISO_8859_2, ISO_8859_3, ISO_8859_4, ISO_8859_5, ISO_8859_6,
    ISO_8859_7, ISO_8859_8, SHIFT_JIS, UTF_16BE, UTF_16LE, WINDOWS_1254,
};
use libc::c_char;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{BindingError, Result};
use crate::libxml2::optional_ptr;

/// An encoding name libxml2 could not be asked for
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown character encoding: {0}")]
pub struct UnknownEncoding(pub String);

/// The named encodings libxml2 supports without iconv
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CharEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Iso8859_1,
    Iso8859_2,
    Iso8859_3,
    Iso8859_4,
    Iso8859_5,
    Iso8859_6,
    Iso8859_7,
    Iso8859_8,
    Iso8859_9,
    Iso2022Jp,
    ShiftJis,
    EucJp,
    Ascii,
}

impl CharEncoding {
    /// The name libxml2 knows this encoding by.
    pub fn name(&self) -> &'static str {
        match self {
            CharEncoding::Utf8 => "UTF-8",
            CharEncoding::Utf16Le => "UTF-16LE",
            CharEncoding::Utf16Be => "UTF-16BE",
            CharEncoding::Iso8859_1 => "ISO-8859-1",
            CharEncoding::Iso8859_2 => "ISO-8859-2",
            CharEncoding::Iso8859_3 => "ISO-8859-3",
            CharEncoding::Iso8859_4 => "ISO-8859-4",
            CharEncoding::Iso8859_5 => "ISO-8859-5",
            CharEncoding::Iso8859_6 => "ISO-8859-6",
            CharEncoding::Iso8859_7 => "ISO-8859-7",
            CharEncoding::Iso8859_8 => "ISO-8859-8",
            CharEncoding::Iso8859_9 => "ISO-8859-9",
            CharEncoding::Iso2022Jp => "ISO-2022-JP",
            CharEncoding::ShiftJis => "Shift-JIS",
            CharEncoding::EucJp => "EUC-JP",
            CharEncoding::Ascii => "ASCII",
        }
    }

    pub fn is_utf8(&self) -> bool {
        matches!(self, CharEncoding::Utf8)
    }

    /// The `encoding_rs` decoder for output in this encoding.
    ///
    /// `None` for UTF-8 and ASCII, which decode as UTF-8, and for ISO-8859-1.
    pub fn to_encoding_rs(&self) -> Option<&'static Encoding> {
        match self {
            CharEncoding::Utf8 | CharEncoding::Ascii | CharEncoding::Iso8859_1 => None,
            CharEncoding::Utf16Le => Some(UTF_16LE),
            CharEncoding::Utf16Be => Some(UTF_16BE),
            CharEncoding::Iso8859_2 => Some(ISO_8859_2),
            CharEncoding::Iso8859_3 => Some(ISO_8859_3),
            CharEncoding::Iso8859_4 => Some(ISO_8859_4),
            CharEncoding::Iso8859_5 => Some(ISO_8859_5),
            CharEncoding::Iso8859_6 => Some(ISO_8859_6),
            CharEncoding::Iso8859_7 => Some(ISO_8859_7),
            CharEncoding::Iso8859_8 => Some(ISO_8859_8),
            // Windows 1254 is a superset of ISO-8859-9 in the printable range
            CharEncoding::Iso8859_9 => Some(WINDOWS_1254),
            CharEncoding::Iso2022Jp => Some(ISO_2022_JP),
            CharEncoding::ShiftJis => Some(SHIFT_JIS),
            CharEncoding::EucJp => Some(EUC_JP),
        }
    }

    /// Decode output bytes produced in this encoding.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            CharEncoding::Iso8859_1 => bytes.iter().map(|&byte| char::from(byte)).collect(),
            _ => match self.to_encoding_rs() {
                Some(encoding) => encoding.decode_with_bom_removal(bytes).0.into_owned(),
                None => String::from_utf8_lossy(bytes).into_owned(),
            },
        }
    }
}

impl fmt::Display for CharEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CharEncoding {
    type Err = UnknownEncoding;

    fn from_str(name: &str) -> std::result::Result<Self, Self::Err> {
        let encoding = match name.trim().to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => CharEncoding::Utf8,
            "UTF-16" | "UTF16" | "UTF-16LE" => CharEncoding::Utf16Le,
            "UTF-16BE" => CharEncoding::Utf16Be,
            "ISO-8859-1" | "ISO-LATIN-1" | "LATIN1" => CharEncoding::Iso8859_1,
            "ISO-8859-2" | "ISO-LATIN-2" | "LATIN2" => CharEncoding::Iso8859_2,
            "ISO-8859-3" => CharEncoding::Iso8859_3,
            "ISO-8859-4" => CharEncoding::Iso8859_4,
            "ISO-8859-5" => CharEncoding::Iso8859_5,
            "ISO-8859-6" => CharEncoding::Iso8859_6,
            "ISO-8859-7" => CharEncoding::Iso8859_7,
            "ISO-8859-8" => CharEncoding::Iso8859_8,
            "ISO-8859-9" => CharEncoding::Iso8859_9,
            "ISO-2022-JP" => CharEncoding::Iso2022Jp,
            "SHIFT-JIS" | "SHIFT_JIS" | "SJIS" => CharEncoding::ShiftJis,
            "EUC-JP" => CharEncoding::EucJp,
            "ASCII" | "US-ASCII" => CharEncoding::Ascii,
            _ => return Err(UnknownEncoding(name.to_string())),
        };
        Ok(encoding)
    }
}

impl TryFrom<String> for CharEncoding {
    type Error = UnknownEncoding;

    fn try_from(name: String) -> std::result::Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<CharEncoding> for String {
    fn from(encoding: CharEncoding) -> Self {
        encoding.name().to_string()
    }
}

/// Text arguments of one native call as NUL-terminated UTF-8
pub(crate) struct MarshalledArgs {
    values: Vec<Option<CString>>,
}

impl MarshalledArgs {
    /// Convert every argument; `None` stays absent.
    pub(crate) fn marshal(args: &[(&'static str, Option<&str>)]) -> Result<Self> {
        let values = args
            .iter()
            .map(|&(argument, value)| {
                value
                    .map(|text| {
                        CString::new(text).map_err(|_| BindingError::interior_nul(argument))
                    })
                    .transpose()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(MarshalledArgs { values })
    }

    /// Pointer for argument `index`, null when absent or out of range.
    pub(crate) fn ptr(&self, index: usize) -> *const c_char {
        self.values
            .get(index)
            .map_or(std::ptr::null(), optional_ptr)
    }
}
