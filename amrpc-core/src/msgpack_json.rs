//! JSON <-> MessagePack transcoding for the TEXT/MSGPACK conversion pair.
//!
//! Both directions work on dynamic value trees (`serde_json::Value` and
//! `rmpv::Value`) rather than typed `Deserialize`/`Serialize`, because the
//! payload's Rust type is not known at the point of conversion. The encoder
//! (JSON -> MessagePack) is hand-written to match an exact byte layout:
//! integers always as signed 64-bit (`0xD3`), floats always as f64 (`0xCB`),
//! and strings/arrays/maps using the smallest length-prefix class that fits.
//! The decoder (MessagePack -> JSON) renders `Bin` values as base64-quoted
//! JSON strings and everything else via its natural JSON counterpart.

use base64::Engine as _;
use rmpv::Value as MpValue;
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{Error, Result};

pub fn json_to_msgpack(json: &JsonValue) -> Vec<u8> {
    let mut buf = Vec::new();
    write_msgpack(json, &mut buf);
    buf
}

fn write_msgpack(value: &JsonValue, data: &mut Vec<u8>) {
    match value {
        JsonValue::Null => data.push(0xC0),
        JsonValue::Bool(b) => data.push(if *b { 0xC3 } else { 0xC2 }),
        JsonValue::Number(n) => write_number_value(n, data),
        JsonValue::String(s) => write_str(s, data),
        JsonValue::Array(arr) => {
            let n = arr.len();
            if n <= 15 {
                data.push(0x90 | n as u8);
            } else if n <= u16::MAX as usize {
                data.push(0xDC);
                data.extend_from_slice(&(n as u16).to_be_bytes());
            } else {
                data.push(0xDD);
                data.extend_from_slice(&(n as u32).to_be_bytes());
            }
            for el in arr {
                write_msgpack(el, data);
            }
        }
        JsonValue::Object(obj) => {
            let n = obj.len();
            if n <= 15 {
                data.push(0x80 | (n as u8 & 0xF));
            } else if n <= u16::MAX as usize {
                data.push(0xDE);
                data.extend_from_slice(&(n as u16).to_be_bytes());
            } else {
                data.push(0xDF);
                data.extend_from_slice(&(n as u32).to_be_bytes());
            }
            for (k, v) in obj {
                write_str(k, data);
                write_msgpack(v, data);
            }
        }
    }
}

fn write_number_value(n: &Number, data: &mut Vec<u8>) {
    if let Some(i) = n.as_i64() {
        data.push(0xD3);
        data.extend_from_slice(&i.to_be_bytes());
    } else if let Some(f) = n.as_f64() {
        data.push(0xCB);
        data.extend_from_slice(&f.to_be_bytes());
    } else {
        // u64 beyond i64::MAX: render as the nearest representable f64,
        // matching the "numbers representable as signed 64-bit or double"
        // contract -- values outside that range have no lossless mapping.
        let f = n.as_f64().unwrap_or(0.0);
        data.push(0xCB);
        data.extend_from_slice(&f.to_be_bytes());
    }
}

fn write_str(s: &str, data: &mut Vec<u8>) {
    let n = s.len();
    if n <= 31 {
        data.push(0xA0 | n as u8);
    } else if n <= u8::MAX as usize {
        data.push(0xD9);
        data.push(n as u8);
    } else if n <= u16::MAX as usize {
        data.push(0xDA);
        data.extend_from_slice(&(n as u16).to_be_bytes());
    } else {
        data.push(0xDB);
        data.extend_from_slice(&(n as u32).to_be_bytes());
    }
    data.extend_from_slice(s.as_bytes());
}

pub fn msgpack_to_json(bytes: &[u8]) -> Result<JsonValue> {
    let mut cursor = std::io::Cursor::new(bytes);
    let value = rmpv::decode::read_value(&mut cursor)
        .map_err(|e| Error::DataConvertible(format!("MSGPACK -> TEXT error: {e}")))?;
    Ok(mp_value_to_json(&value))
}

fn mp_value_to_json(value: &MpValue) -> JsonValue {
    match value {
        MpValue::Nil => JsonValue::Null,
        MpValue::Boolean(b) => JsonValue::Bool(*b),
        MpValue::Integer(i) => {
            if let Some(i) = i.as_i64() {
                JsonValue::Number(Number::from(i))
            } else if let Some(u) = i.as_u64() {
                JsonValue::Number(Number::from(u))
            } else {
                JsonValue::Number(Number::from_f64(i.as_f64().unwrap_or(0.0)).unwrap())
            }
        }
        MpValue::F32(f) => {
            JsonValue::Number(Number::from_f64(*f as f64).unwrap_or_else(|| Number::from(0)))
        }
        MpValue::F64(f) => {
            JsonValue::Number(Number::from_f64(*f).unwrap_or_else(|| Number::from(0)))
        }
        MpValue::String(s) => JsonValue::String(s.as_str().unwrap_or_default().to_string()),
        MpValue::Binary(bin) => {
            JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bin))
        }
        MpValue::Array(arr) => JsonValue::Array(arr.iter().map(mp_value_to_json).collect()),
        MpValue::Map(pairs) => {
            let mut map = Map::new();
            for (k, v) in pairs {
                let key = match k {
                    MpValue::String(s) => s.as_str().unwrap_or_default().to_string(),
                    other => mp_value_to_json(other).to_string(),
                };
                map.insert(key, mp_value_to_json(v));
            }
            JsonValue::Object(map)
        }
        MpValue::Ext(_, bytes) => {
            JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_bool_round_trip() {
        for v in [json!(null), json!(true), json!(false)] {
            let packed = json_to_msgpack(&v);
            assert_eq!(msgpack_to_json(&packed).unwrap(), v);
        }
    }

    #[test]
    fn integer_encodes_as_int64() {
        let packed = json_to_msgpack(&json!(42));
        assert_eq!(packed[0], 0xD3);
        assert_eq!(packed.len(), 9);
    }

    #[test]
    fn double_encodes_as_f64() {
        let packed = json_to_msgpack(&json!(1.5));
        assert_eq!(packed[0], 0xCB);
        assert_eq!(packed.len(), 9);
    }

    #[test]
    fn short_string_uses_fixstr() {
        let packed = json_to_msgpack(&json!("abcd"));
        assert_eq!(packed[0], 0xA0 | 4);
    }

    #[test]
    fn array_and_map_round_trip() {
        let v = json!({"int_num": 1, "double_num": 1.0, "str": "abcd"});
        let packed = json_to_msgpack(&v);
        let back = msgpack_to_json(&packed).unwrap();
        assert_eq!(back["int_num"], json!(1));
        assert_eq!(back["str"], json!("abcd"));

        let arr = json!([1, "two", 3.0, null]);
        let packed = json_to_msgpack(&arr);
        assert_eq!(msgpack_to_json(&packed).unwrap(), arr);
    }

    #[test]
    fn long_string_uses_str16() {
        let s = "a".repeat(300);
        let packed = json_to_msgpack(&json!(s));
        assert_eq!(packed[0], 0xDA);
    }

    #[test]
    fn malformed_msgpack_reports_data_convertible() {
        let err = msgpack_to_json(&[0xC1]).unwrap_err();
        assert!(matches!(err, Error::DataConvertible(_)));
    }
}
