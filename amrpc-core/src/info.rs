use crate::wire::WireForm;

/// Immutable endpoint descriptor, shared by RPC and Publish registrations.
#[derive(Debug, Clone)]
pub struct EndpointInfo {
    pub wire_form: WireForm,
    /// Registration path, unique within a Server across RPC+Publish.
    pub method: String,
    /// Human-readable function name, surfaced by `/debug/reflection`.
    pub func_name: String,
}
