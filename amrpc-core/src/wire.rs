//! Wire form constants: MIME names, sub-protocol names, header names, and
//! the `WireForm` enum itself.

/// One of the three canonical forms a payload crosses the wire in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireForm {
    Bin,
    Text,
    Msgpack,
}

pub const CONTENT_TYPE: &str = "content-type";
pub const ACCEPT: &str = "accept";
pub const CHECK_ENABLED: &str = "amrpc_check_enabled";

pub const MIME_MSGPACK: &str = "application/x-msgpack";
pub const MIME_JSON: &str = "application/json";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_BIN: &str = "application/octet-stream";

pub const WS_SUBPROTOCOL_HEADER: &str = "Sec-WebSocket-Protocol";
pub const SUBPROTOCOL_MSGPACK: &str = "ecv_amrpc_msgpack";
pub const SUBPROTOCOL_JSON: &str = "ecv_amrpc_json";
pub const SUBPROTOCOL_TEXT: &str = "ecv_amrpc_text";
pub const SUBPROTOCOL_BIN: &str = "ecv_amrpc_bin";

impl WireForm {
    /// The MIME string this form is announced as on the wire.
    pub fn as_mime(self) -> &'static str {
        match self {
            WireForm::Bin => MIME_BIN,
            WireForm::Text => MIME_TEXT,
            WireForm::Msgpack => MIME_MSGPACK,
        }
    }

    /// Parse a `Content-Type`/`Accept` value into a wire form. Unknown or
    /// absent values default to `Bin`, per the dispatch algorithm.
    pub fn from_mime(value: &str) -> WireForm {
        if value == MIME_MSGPACK {
            WireForm::Msgpack
        } else if value == MIME_TEXT || value == MIME_JSON {
            WireForm::Text
        } else {
            WireForm::Bin
        }
    }

    /// The Publish stream sub-protocol name announced by a Puller.
    pub fn as_subprotocol(self) -> &'static str {
        match self {
            WireForm::Bin => SUBPROTOCOL_BIN,
            WireForm::Text => SUBPROTOCOL_TEXT,
            WireForm::Msgpack => SUBPROTOCOL_MSGPACK,
        }
    }

    pub fn from_subprotocol(value: &str) -> WireForm {
        if value == SUBPROTOCOL_MSGPACK {
            WireForm::Msgpack
        } else if value == SUBPROTOCOL_TEXT || value == SUBPROTOCOL_JSON {
            WireForm::Text
        } else {
            WireForm::Bin
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_round_trips() {
        for form in [WireForm::Bin, WireForm::Text, WireForm::Msgpack] {
            assert_eq!(WireForm::from_mime(form.as_mime()), form);
        }
    }

    #[test]
    fn unknown_mime_defaults_to_bin() {
        assert_eq!(WireForm::from_mime("nonsense/whatever"), WireForm::Bin);
        assert_eq!(WireForm::from_mime(""), WireForm::Bin);
    }

    #[test]
    fn json_alias_maps_to_text() {
        assert_eq!(WireForm::from_mime(MIME_JSON), WireForm::Text);
    }

    #[test]
    fn subprotocol_round_trips() {
        for form in [WireForm::Bin, WireForm::Text, WireForm::Msgpack] {
            assert_eq!(WireForm::from_subprotocol(form.as_subprotocol()), form);
        }
    }
}
