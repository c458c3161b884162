use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::item::Item;

/// Dumps `item` as ASCII-only JSON, for debugging and log output only.
///
/// Bytes are base64-encoded; `float16`, `simple`, and `tag` items (which
/// have no native JSON representation) are serialized as `{"type": ...}`
/// objects. This is explicitly **not** a round-trippable format — there is
/// no corresponding `from_json`, only [`crate::decode`]/[`crate::encode`]
/// for the real wire format (§4.C).
pub fn to_json(item: &Item) -> String {
    let mut out = String::new();
    write_item(&mut out, item);
    out
}

fn write_item(out: &mut String, item: &Item) {
    match item {
        Item::Int(v) => out.push_str(&v.to_string()),
        Item::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Item::Null => out.push_str("null"),
        Item::Undefined => out.push_str(r#"{"type":"undefined"}"#),
        Item::String(s) => write_json_string(out, s),
        Item::Bytes(b) => {
            out.push('"');
            out.push_str(&BASE64.encode(b));
            out.push('"');
        }
        Item::Array(items) => {
            out.push('[');
            for (i, child) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_item(out, child);
            }
            out.push(']');
        }
        Item::Map(pairs) => {
            out.push('{');
            for (i, pair) in pairs.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                match &pair.key {
                    Item::String(s) => write_json_string(out, s),
                    other => {
                        // Non-string keys have no JSON object-key form; dump
                        // their JSON representation as the key text instead.
                        let mut tmp = String::new();
                        write_item(&mut tmp, other);
                        write_json_string(out, &tmp);
                    }
                }
                out.push(':');
                write_item(out, &pair.value);
            }
            out.push('}');
        }
        Item::Float16(raw) => {
            out.push_str(&format!(r#"{{"type":"float16","bits":{raw}}}"#));
        }
        Item::Float32(f) => out.push_str(&json_number(*f as f64)),
        Item::Float64(f) => out.push_str(&json_number(*f)),
        Item::Simple(v) => {
            out.push_str(&format!(r#"{{"type":"simple","value":{v}}}"#));
        }
        Item::Tag(tag, child) => {
            let mut tmp = String::new();
            write_item(&mut tmp, child);
            out.push_str(&format!(r#"{{"type":"tag","tag":{tag},"value":{tmp}}}"#));
        }
    }
}

fn json_number(f: f64) -> String {
    if f.is_finite() {
        f.to_string()
    } else {
        // Non-finite floats have no JSON number form; this is a debug dump,
        // not a strict encoder, so we fall back to a tagged object rather
        // than emitting invalid JSON silently.
        format!(r#"{{"type":"float64","bits":{}}}"#, f.to_bits())
    }
}

fn write_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c if c.is_ascii() => out.push(c),
            c => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
    }
    out.push('"');
}
