use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::CodecResult;

/// How a tiddler's `text` maps onto the stored body bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextEncoding {
    /// Text is the body, byte for byte.
    Utf8,
    /// Declared UTF-16LE by the wiki; stored byte for byte like UTF-8.
    Utf16Le,
    /// Text is the base64 form of a binary body.
    Base64,
}

impl TextEncoding {
    /// Encoding used for a tiddler `type`. Unknown types are UTF-8.
    pub fn for_type(content_type: &str) -> Self {
        match content_type {
            "application/pdf"
            | "application/zip"
            | "image/jpeg"
            | "image/png"
            | "image/gif"
            | "image/x-icon"
            | "application/font-woff"
            | "application/x-font-ttf"
            | "audio/ogg"
            | "video/mp4"
            | "audio/mp3"
            | "audio/mp4"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            | "application/epub+zip"
            | "application/octet-stream" => Self::Base64,
            "application/hta" => Self::Utf16Le,
            _ => Self::Utf8,
        }
    }

    /// Body bytes to store for `text`.
    pub fn decode_body(self, text: &str) -> CodecResult<Vec<u8>> {
        match self {
            Self::Base64 => Ok(STANDARD.decode(text)?),
            Self::Utf8 | Self::Utf16Le => Ok(text.as_bytes().to_vec()),
        }
    }

    /// `text` for stored body bytes.
    pub fn encode_body(self, body: &[u8]) -> String {
        match self {
            Self::Base64 => STANDARD.encode(body),
            Self::Utf8 | Self::Utf16Le => String::from_utf8_lossy(body).into_owned(),
        }
    }
}
