//! `Data`: a payload held in one wire form, with lazy, memoized, and
//! latching-on-failure conversion to the other convertible form.

use std::sync::Mutex;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::msgpack_json::{json_to_msgpack, msgpack_to_json};
use crate::wire::WireForm;

/// The outcome of the one non-identity conversion a `Data` may ever need:
/// TEXT -> MSGPACK or MSGPACK -> TEXT. `Bin` targets are always identity to
/// the origin bytes and never touch this cache.
enum ConvSlot {
    NotComputed,
    Computed(Bytes),
    Failed,
}

pub struct Data {
    origin: WireForm,
    bytes: Bytes,
    converted: Mutex<ConvSlot>,
}

impl Data {
    pub fn new(origin: WireForm, bytes: impl Into<Bytes>) -> Self {
        Data {
            origin,
            bytes: bytes.into(),
            converted: Mutex::new(ConvSlot::NotComputed),
        }
    }

    pub fn origin(&self) -> WireForm {
        self.origin
    }

    /// Render this payload in `target` form, converting and memoizing on
    /// first request. Fails with `Error::DataConvertible` if `target` is not
    /// reachable from the origin form (`Bin` origin can only ever view as
    /// `Bin`).
    pub fn view(&self, target: WireForm) -> Result<Bytes> {
        if target == WireForm::Bin || target == self.origin {
            return Ok(self.bytes.clone());
        }

        if self.origin == WireForm::Bin {
            return Err(Error::DataConvertible(format!(
                "{:?} -> {:?} error: BIN is opaque and has no structured view",
                self.origin, target
            )));
        }

        let mut slot = self.converted.lock().unwrap();
        match &*slot {
            ConvSlot::Computed(bytes) => Ok(bytes.clone()),
            ConvSlot::Failed => Err(Error::DataConvertible(format!(
                "{:?} -> {:?} error: previously failed",
                self.origin, target
            ))),
            ConvSlot::NotComputed => match self.convert(target) {
                Ok(bytes) => {
                    *slot = ConvSlot::Computed(bytes.clone());
                    Ok(bytes)
                }
                Err(e) => {
                    *slot = ConvSlot::Failed;
                    Err(e)
                }
            },
        }
    }

    fn convert(&self, target: WireForm) -> Result<Bytes> {
        match (self.origin, target) {
            (WireForm::Text, WireForm::Msgpack) => {
                let json: serde_json::Value = serde_json::from_slice(&self.bytes).map_err(|e| {
                    Error::DataConvertible(format!("TEXT -> MSGPACK error: {e}"))
                })?;
                Ok(Bytes::from(json_to_msgpack(&json)))
            }
            (WireForm::Msgpack, WireForm::Text) => {
                let json = msgpack_to_json(&self.bytes)
                    .map_err(|e| Error::DataConvertible(format!("MSGPACK -> TEXT error: {e}")))?;
                let out = serde_json::to_vec(&json).map_err(|e| {
                    Error::DataConvertible(format!("MSGPACK -> TEXT error: {e}"))
                })?;
                Ok(Bytes::from(out))
            }
            _ => unreachable!("identity and BIN targets are handled in view()"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bin_has_no_structured_view() {
        let d = Data::new(WireForm::Bin, b"raw".to_vec());
        assert!(d.view(WireForm::Bin).is_ok());
        assert!(matches!(
            d.view(WireForm::Text).unwrap_err(),
            Error::DataConvertible(_)
        ));
        assert!(matches!(
            d.view(WireForm::Msgpack).unwrap_err(),
            Error::DataConvertible(_)
        ));
    }

    #[test]
    fn text_converts_to_msgpack_and_memoizes() {
        let body = serde_json::to_vec(&json!("hello")).unwrap();
        let d = Data::new(WireForm::Text, body);
        let first = d.view(WireForm::Msgpack).unwrap();
        let second = d.view(WireForm::Msgpack).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0], 0xA5); // fixstr of length 5
    }

    #[test]
    fn msgpack_converts_to_text() {
        let mut packed = Vec::new();
        packed.push(0xA5);
        packed.extend_from_slice(b"hello");
        let d = Data::new(WireForm::Msgpack, packed);
        let view = d.view(WireForm::Text).unwrap();
        assert_eq!(view.as_ref(), br#""hello""#);
    }

    #[test]
    fn bin_view_is_always_origin_bytes() {
        let d = Data::new(WireForm::Text, b"\"x\"".to_vec());
        assert_eq!(d.view(WireForm::Bin).unwrap().as_ref(), b"\"x\"");
    }

    #[test]
    fn failed_conversion_latches() {
        let d = Data::new(WireForm::Msgpack, vec![0xC1]); // invalid msgpack
        assert!(d.view(WireForm::Text).is_err());
        assert!(d.view(WireForm::Text).is_err());
    }
}
