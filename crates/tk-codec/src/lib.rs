//! Tiddler model and codecs.
//!
//! A [`Tiddler`] travels in two forms:
//!
//! - **JSON** -- a flat object: custom fields sit beside the reserved keys
//!   (`title`, `revision`, `tags`, ...). This is the wire format of the HTTP
//!   surface and the layout of the stored metadata blob.
//! - **Text** -- `key: value` header lines, a blank line, then the raw body.
//!   This is the form handed to an editor.
//!
//! Both decoders fold unknown keys into [`Tiddler::fields`] and both accept
//! what their encoder writes.

pub mod error;
pub mod json;
pub mod mime;
pub mod text;
pub mod tiddler;
pub mod value;

pub use error::{CodecError, CodecResult};
pub use json::{decode_json, decode_object, encode_json, is_reserved, NODE_REF_KEY};
pub use mime::TextEncoding;
pub use text::{decode_text, encode_text, parse_tag_list};
pub use tiddler::{Tiddler, TiddlerRef, SYSTEM_PREFIX};
pub use value::{FieldValue, Scalar};
