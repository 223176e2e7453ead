use clap::{Parser, Subcommand, ValueEnum};

use amrpc_core::WireForm;

/// Like cURL, but for amrpc: command-line tool for exercising amrpc servers.
#[derive(Parser, Debug)]
#[command(
    name = "amrpc",
    version,
    after_help = "Example usage:\n  \
        amrpc call ipc://demo /echo --wire-form text --data '\"hi\"'\n  \
        amrpc pull ipc://demo /chat --wire-form text\n  \
        amrpc reflect ipc://demo"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether a remote method is registered.
    Enabled {
        /// Transport URI, e.g. ipc://my-socket or tcp://127.0.0.1:9000
        uri: String,
        /// Method path, e.g. /echo
        method: String,
    },
    /// Invoke a unary RPC method.
    Call {
        uri: String,
        method: String,
        /// Wire form the request body is already encoded in / the response
        /// is requested in.
        #[arg(long, value_enum, default_value = "text")]
        wire_form: WireFormArg,
        /// Request body. For `text`, a JSON literal; for `bin`, raw bytes
        /// read verbatim; for `msgpack`, a JSON literal converted to
        /// MessagePack before sending.
        #[arg(short = 'd', long)]
        data: Option<String>,
    },
    /// Subscribe to a Publish endpoint and print each message until
    /// interrupted.
    Pull {
        uri: String,
        method: String,
        #[arg(long, value_enum, default_value = "text")]
        wire_form: WireFormArg,
    },
    /// Print the server's `/debug/reflection` table of registered methods.
    Reflect { uri: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum WireFormArg {
    Bin,
    Text,
    Msgpack,
}

impl From<WireFormArg> for WireForm {
    fn from(value: WireFormArg) -> Self {
        match value {
            WireFormArg::Bin => WireForm::Bin,
            WireFormArg::Text => WireForm::Text,
            WireFormArg::Msgpack => WireForm::Msgpack,
        }
    }
}
