//! Plain configuration structs, populated programmatically by library
//! callers or by `amrpc-cli`'s `clap::Parser`-derived CLI args, mirroring
//! how the teacher keeps connection configuration a plain data struct
//! decoupled from any particular CLI framework.

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Whether `GET /debug/reflection` is registered. Defaults to on, per
    /// the introspection contract.
    pub debug_enabled: bool,
    /// Name given to the server's dedicated executor thread pool.
    pub thread_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            debug_enabled: true,
            thread_name: "amrpc-server".to_string(),
        }
    }
}
