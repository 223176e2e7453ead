mod cli;

use std::process;

use clap::Parser;
use cli::{Cli, Commands};

use amrpc_core::executor::Executor;
use amrpc_core::msgpack_json::{json_to_msgpack, msgpack_to_json};
use amrpc_core::puller::Puller;
use amrpc_core::remote_function::RemoteFunction;
use amrpc_core::transport::{self, Envelope};
use amrpc_core::wire;
use amrpc_core::WireForm;

const DEBUG_REFLECTION_METHOD: &str = "/debug/reflection";

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Enabled { uri, method } => run_enabled(&uri, &method),
        Commands::Call {
            uri,
            method,
            wire_form,
            data,
        } => run_call(&uri, &method, wire_form.into(), data),
        Commands::Pull {
            uri,
            method,
            wire_form,
        } => run_pull(&uri, &method, wire_form.into()),
        Commands::Reflect { uri } => run_reflect(&uri),
    };

    if let Err(e) = result {
        eprintln!("amrpc: {e}");
        process::exit(1);
    }
}

fn run_enabled(uri: &str, method: &str) -> amrpc_core::Result<()> {
    let executor = Executor::new("amrpc-cli")?;
    let func = RemoteFunction::new(uri, method, WireForm::Bin, executor);
    let enabled = func.enabled()?;
    println!("{enabled}");
    Ok(())
}

fn run_call(
    uri: &str,
    method: &str,
    wire_form: WireForm,
    data: Option<String>,
) -> amrpc_core::Result<()> {
    let executor = Executor::new("amrpc-cli")?;
    let func = RemoteFunction::new(uri, method, wire_form, executor);

    let body = encode_request_body(wire_form, data.as_deref())?;
    let response = func.invoke_raw(body)?;
    println!("{}", decode_response_body(wire_form, &response)?);
    Ok(())
}

fn encode_request_body(wire_form: WireForm, data: Option<&str>) -> amrpc_core::Result<Vec<u8>> {
    let data = data.unwrap_or("null");
    match wire_form {
        WireForm::Bin => Ok(data.as_bytes().to_vec()),
        WireForm::Text => {
            // validate it parses before sending, for a friendlier CLI error.
            serde_json::from_str::<serde_json::Value>(data)
                .map_err(|e| amrpc_core::Error::BadRequest(format!("invalid JSON: {e}")))?;
            Ok(data.as_bytes().to_vec())
        }
        WireForm::Msgpack => {
            let json: serde_json::Value = serde_json::from_str(data)
                .map_err(|e| amrpc_core::Error::BadRequest(format!("invalid JSON: {e}")))?;
            Ok(json_to_msgpack(&json))
        }
    }
}

fn decode_response_body(wire_form: WireForm, body: &[u8]) -> amrpc_core::Result<String> {
    match wire_form {
        WireForm::Bin => Ok(String::from_utf8_lossy(body).into_owned()),
        WireForm::Text => {
            String::from_utf8(body.to_vec()).map_err(|e| amrpc_core::Error::DataConvertible(e.to_string()))
        }
        WireForm::Msgpack => {
            let json = msgpack_to_json(body)?;
            Ok(json.to_string())
        }
    }
}

fn run_pull(uri: &str, method: &str, wire_form: WireForm) -> amrpc_core::Result<()> {
    let executor = Executor::new("amrpc-cli")?;
    let exec_handle = executor.clone();

    let _puller = Puller::create(uri, method, wire_form, executor, move |result| {
        match result {
            Ok(bytes) => match decode_response_body(wire_form, &bytes) {
                Ok(text) => println!("{text}"),
                Err(e) => eprintln!("amrpc: could not decode message: {e}"),
            },
            Err(e) => eprintln!("amrpc: subscription ended: {e}"),
        }
    })?;

    exec_handle.submit(tokio::signal::ctrl_c());
    Ok(())
}

fn run_reflect(uri: &str) -> amrpc_core::Result<()> {
    let executor = Executor::new("amrpc-cli")?;
    let uri = uri.to_string();
    let body = executor.submit(async move {
        let mut session = transport::connect(&uri).await?;
        let request = Envelope::request(DEBUG_REFLECTION_METHOD, Vec::new())
            .with_header(wire::CONTENT_TYPE, wire::MIME_BIN)
            .with_header(wire::ACCEPT, wire::MIME_TEXT)
            .with_header("connection", "close");
        session.write(&request).await?;
        let response = session.read().await?.ok_or_else(|| {
            amrpc_core::Error::Transport("connection closed before response".into())
        })?;
        let _ = session.close().await;
        match response.status {
            200 => Ok(response.body),
            404 => Err(amrpc_core::Error::NotFound),
            other => Err(amrpc_core::Error::UnknownStatus(other)),
        }
    })?;

    let json: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| amrpc_core::Error::DataConvertible(e.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&json).unwrap());
    Ok(())
}
