//! A broadcast chat room: one RPC posts a message, one Publish endpoint
//! fans it out to every subscribed Puller. A small queue depth is used
//! deliberately so a subscriber that stops draining its queue gets evicted
//! rather than slowing down the room for everyone else.

use amrpc_core::{Server, ServerConfig};

const ROOM: &str = "/chat/room";
const ROOM_QUEUE_DEPTH: usize = 4;

fn main() -> amrpc_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
        .init();

    let uri = std::env::args().nth(1).unwrap_or_else(|| "ipc://chat-demo".to_string());
    let server = Server::bind(&uri, ServerConfig::default())?;

    server.add_publish_json(ROOM, "chat_room", ROOM_QUEUE_DEPTH)?;

    let say_server = server.clone();
    server.add_rpc_json("/chat/say", "chat_say", move |entry| {
        let say_server = say_server.clone();
        async move {
            let _ = say_server.publish_json(ROOM, &entry);
            serde_json::json!({ "ok": true, "subscribers": say_server.puller_size(ROOM) })
        }
    })?;

    tracing::info!(%uri, room = ROOM, "chat-server listening");
    server.executor().submit(tokio::signal::ctrl_c()).ok();
    Ok(())
}
