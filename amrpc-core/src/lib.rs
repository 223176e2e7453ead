//! Runtime for loosely-coupled RPC and publish/subscribe between local or
//! networked processes, over Unix-domain or TCP transports.
//!
//! A [`Server`] exposes two kinds of endpoint: a unary [`Server::add_rpc_raw`]
//! (request in, response out) and a fan-out [`Server::add_publish_raw`]
//! (one producer, many subscribers with bounded per-subscriber queues).
//! [`RemoteFunction`] and [`Puller`] are the client-side counterparts.
//! [`typed`] layers typed sugar for string/bytes/JSON/MessagePack payloads
//! on top of the raw byte-oriented API.

pub mod config;
pub mod data;
pub mod distributor;
pub mod error;
pub mod executor;
pub mod info;
pub mod msgpack_json;
pub mod puller;
pub mod remote_function;
pub mod server;
pub mod transport;
pub mod typed;
pub mod wire;

pub use config::ServerConfig;
pub use data::Data;
pub use error::{Error, Result};
pub use executor::Executor;
pub use info::EndpointInfo;
pub use puller::Puller;
pub use remote_function::RemoteFunction;
pub use server::Server;
pub use typed::Bytes;
pub use wire::WireForm;
