//! The editor-facing text form.
//!
//! ```text
//! tags: a [[b c]]
//! title: Foo
//!
//! body follows the first blank line
//! ```

use std::fmt::Write as _;

use serde_json::{Map, Value};

use crate::error::{CodecError, CodecResult};
use crate::tiddler::Tiddler;

fn quote_list_item(item: &str) -> String {
    if item.contains(' ') {
        format!("[[{item}]]")
    } else {
        item.to_string()
    }
}

/// Render `t` as header lines, a blank line and the body.
///
/// Headers come in key order. List values (tags, list fields) bracket-quote
/// items containing a space; other values are written verbatim.
///
/// The form is lossy outside `tags`: decoding reads every other header back
/// as a string field, so list, number and boolean fields return as their
/// rendered text. Empty tags do not survive either.
pub fn encode_text(t: &Tiddler) -> Vec<u8> {
    let obj = t.to_json_object();
    let mut out = String::new();
    for (key, value) in &obj {
        if key == "text" {
            continue;
        }
        let rendered = match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => quote_list_item(s),
                    other => quote_list_item(&other.to_string()),
                })
                .collect::<Vec<_>>()
                .join(" "),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = writeln!(out, "{key}: {rendered}");
    }
    out.push('\n');
    out.push_str(&t.text);
    out.into_bytes()
}

/// Parse a text form back into a tiddler.
///
/// Every header line must hold a `": "` separator and the header must end
/// with a blank line; everything after it is the body verbatim.
pub fn decode_text(data: &[u8]) -> CodecResult<Tiddler> {
    let data = std::str::from_utf8(data)?;
    let mut obj = Map::new();
    let mut rest = data;

    let body = loop {
        let Some(nl) = rest.find('\n') else {
            return Err(CodecError::MissingBody);
        };
        let line = rest[..nl].strip_suffix('\r').unwrap_or(&rest[..nl]);
        rest = &rest[nl + 1..];
        if line.is_empty() {
            break rest;
        }

        let (key, value) = line
            .split_once(": ")
            .ok_or_else(|| CodecError::MalformedField(line.to_string()))?;
        let value = if key == "tags" {
            Value::Array(parse_tag_list(value).into_iter().map(Value::String).collect())
        } else {
            Value::String(value.to_string())
        };
        obj.insert(key.to_string(), value);
    };

    obj.insert("text".into(), Value::String(body.to_string()));
    Tiddler::from_json_object(&obj)
}

/// Split a space-separated tag list, honoring `[[multi word]]` quoting.
///
/// An unterminated trailing `[[` span is kept as one tag with the opening
/// brackets removed. Empty tokens are skipped.
pub fn parse_tag_list(s: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut span = String::new();

    for token in s.split(' ') {
        let trimmed = token.trim();
        if span.is_empty() && !trimmed.starts_with("[[") {
            if !trimmed.is_empty() {
                tags.push(trimmed.to_string());
            }
            continue;
        }
        span.push(' ');
        span.push_str(token);
        if trimmed.ends_with("]]") {
            let quoted = span.trim();
            let inner = quoted.strip_prefix("[[").unwrap_or(quoted);
            let inner = inner.strip_suffix("]]").unwrap_or(inner);
            tags.push(inner.to_string());
            span.clear();
        }
    }

    if !span.is_empty() {
        let quoted = span.trim();
        tags.push(quoted.strip_prefix("[[").unwrap_or(quoted).to_string());
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{FieldValue, Scalar};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use tk_types::ObjectId;

    #[test]
    fn decodes_bracketed_tags_and_body() {
        let t = decode_text(b"tags: a [[b c]]\n\nbody").unwrap();
        assert_eq!(t.tags, vec!["a", "b c"]);
        assert_eq!(t.text, "body");
    }

    #[test]
    fn encodes_sorted_headers_then_body() {
        let mut t = Tiddler::new("Foo Bar");
        t.tags = vec!["a".into(), "b c".into()];
        t.bag = "default".into();
        t.fields.insert("color".into(), FieldValue::from("dark red"));
        t.text = "line one\n\nline two".into();
        assert_eq!(
            String::from_utf8(encode_text(&t)).unwrap(),
            "bag: default\ncolor: dark red\ntags: a [[b c]]\ntitle: Foo Bar\n\nline one\n\nline two"
        );
    }

    #[test]
    fn list_fields_are_bracket_quoted() {
        let mut t = Tiddler::new("Foo");
        t.fields.insert(
            "list".into(),
            FieldValue::List(vec![Scalar::String("x y".into()), Scalar::Number(2.into())]),
        );
        let text = String::from_utf8(encode_text(&t)).unwrap();
        assert!(text.contains("list: [[x y]] 2\n"));
    }

    #[test]
    fn missing_separator_is_malformed() {
        let err = decode_text(b"title Foo\n\nbody").unwrap_err();
        assert!(matches!(err, CodecError::MalformedField(line) if line == "title Foo"));
    }

    #[test]
    fn missing_blank_line_is_malformed() {
        assert!(matches!(decode_text(b"title: Foo\n"), Err(CodecError::MissingBody)));
        assert!(matches!(decode_text(b"title: Foo"), Err(CodecError::MissingBody)));
    }

    #[test]
    fn crlf_headers_are_accepted() {
        let t = decode_text(b"title: Foo\r\ntags: x\r\n\r\nbody\r\n").unwrap();
        assert_eq!(t.title, "Foo");
        assert_eq!(t.tags, vec!["x"]);
        assert_eq!(t.text, "body\r\n");
    }

    #[test]
    fn empty_body() {
        let t = decode_text(b"title: Foo\n\n").unwrap();
        assert_eq!(t.title, "Foo");
        assert_eq!(t.text, "");
    }

    #[test]
    fn unknown_headers_become_string_fields() {
        let t = decode_text(b"color: red\ntitle: Foo\ntype: text/plain\n\n").unwrap();
        assert_eq!(t.fields["color"], FieldValue::from("red"));
        assert_eq!(t.content_type, "text/plain");
    }

    #[test]
    fn revision_and_node_survive() {
        let mut t = Tiddler::new("Foo");
        t.revision = Some(Utc.with_ymd_and_hms(2023, 7, 8, 9, 10, 11).unwrap());
        t.node = Some(ObjectId::from_bytes(b"node"));
        assert_eq!(decode_text(&encode_text(&t)).unwrap(), t);
    }

    #[test]
    fn tag_list_edge_cases() {
        assert_eq!(parse_tag_list("a  b"), vec!["a", "b"]);
        assert_eq!(parse_tag_list("[[one]] two"), vec!["one", "two"]);
        assert_eq!(parse_tag_list("[[a  b]]"), vec!["a  b"]);
        assert_eq!(parse_tag_list("x [[open ended"), vec!["x", "open ended"]);
        assert!(parse_tag_list("").is_empty());
    }

    #[test]
    fn non_tag_values_come_back_as_text() {
        let mut t = Tiddler::new("Foo");
        t.tags = vec!["".into(), "a".into(), "b c".into()];
        t.fields.insert(
            "list".into(),
            FieldValue::List(vec![Scalar::String("x y".into()), Scalar::Number(2.into())]),
        );
        t.fields.insert("count".into(), FieldValue::from(3i64));
        t.fields.insert("done".into(), FieldValue::from(true));

        let back = decode_text(&encode_text(&t)).unwrap();
        assert_eq!(back.tags, vec!["a", "b c"]);
        assert_eq!(back.fields["list"], FieldValue::from("[[x y]] 2"));
        assert_eq!(back.fields["count"], FieldValue::from("3"));
        assert_eq!(back.fields["done"], FieldValue::from("true"));
    }

    #[test]
    fn bare_empty_tokens_are_skipped() {
        assert_eq!(parse_tag_list(" a  "), vec!["a"]);
        assert!(parse_tag_list("   ").is_empty());
        assert_eq!(parse_tag_list("[[]] b"), vec!["", "b"]);
    }

    fn tiddler() -> impl Strategy<Value = Tiddler> {
        (
            "[^\r\n]{1,20}",
            "[a-z]{0,8}",
            prop::collection::vec("[a-z]{1,5}( [a-z]{1,5})?", 0..4),
            prop::option::of(0i64..4_000_000_000),
            prop::collection::btree_map(
                "[a-z][a-z0-9]{0,10}".prop_filter("reserved", |k| !crate::json::is_reserved(k)),
                "[^\r\n]{0,12}".prop_map(FieldValue::String),
                0..5,
            ),
            "(.|\n){0,40}",
        )
            .prop_map(|(title, bag, tags, secs, fields, text)| Tiddler {
                title,
                bag,
                tags,
                revision: secs.and_then(|s| Utc.timestamp_opt(s, 0).single()),
                fields,
                text,
                ..Tiddler::default()
            })
    }

    proptest! {
        #[test]
        fn text_round_trip(t in tiddler()) {
            prop_assert_eq!(decode_text(&encode_text(&t)).unwrap(), t);
        }
    }

    proptest! {
        #[test]
        fn tags_survive_except_empty(
            tags in prop::collection::vec("([a-z]{1,5}( [a-z]{1,5})?)?", 0..6),
        ) {
            let mut t = Tiddler::new("Foo");
            t.tags = tags.clone();
            let back = decode_text(&encode_text(&t)).unwrap();
            let kept: Vec<String> = tags.into_iter().filter(|tag| !tag.is_empty()).collect();
            prop_assert_eq!(back.tags, kept);
        }

        #[test]
        fn list_fields_return_as_their_rendering(
            items in prop::collection::vec("[a-z]{1,5}( [a-z]{1,5})?", 1..4),
        ) {
            let mut t = Tiddler::new("Foo");
            let list = items.iter().cloned().map(Scalar::String).collect();
            t.fields.insert("list".into(), FieldValue::List(list));
            let rendered = items
                .iter()
                .map(|item| quote_list_item(item))
                .collect::<Vec<_>>()
                .join(" ");
            let back = decode_text(&encode_text(&t)).unwrap();
            prop_assert_eq!(&back.fields["list"], &FieldValue::String(rendered));
        }
    }
}
