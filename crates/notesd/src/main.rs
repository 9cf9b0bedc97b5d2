//! Notes Daemon - query/mutation API for notes over RESP

mod handler;
mod resp;
mod view;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::BytesMut;
use clap::{Parser, ValueEnum};
use notecache::{NoteCache, RefreshCache};
use notestore::{FileNoteStore, MemoryNoteStore, NoteStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::handler::{CommandHandler, SharedCache};
use crate::resp::RespValue;

/// Where notes are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Journal file under the data directory
    File,
    /// Process memory only
    Memory,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1:6380")]
    bind: String,

    /// Data directory (file backend)
    #[arg(short, long, default_value = "./data")]
    data: String,

    /// Storage backend
    #[arg(long, value_enum, default_value_t = Backend::File)]
    backend: Backend,

    /// Health check mode (for Docker)
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if args.health {
        match TcpStream::connect(&args.bind).await {
            Ok(_) => {
                println!("OK");
                std::process::exit(0);
            }
            Err(_) => {
                eprintln!("FAILED");
                std::process::exit(1);
            }
        }
    }

    info!("Starting notesd v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {:?}", args.backend);

    let store: Arc<dyn NoteStore> = match args.backend {
        Backend::File => {
            info!("Data directory: {}", args.data);
            Arc::new(
                FileNoteStore::open(&args.data)
                    .with_context(|| format!("opening note store at {}", args.data))?,
            )
        }
        Backend::Memory => Arc::new(MemoryNoteStore::new()),
    };
    let cache: SharedCache = Arc::new(RefreshCache::new(store));

    let warm = Arc::clone(&cache);
    let notes = tokio::task::spawn_blocking(move || warm.find_all()).await??;
    info!("Cache warmed with {} notes", notes.len());

    let listener = TcpListener::bind(&args.bind).await?;
    info!("Server listening on {}", args.bind);
    println!("\nnotesd ready on redis://{}", args.bind);
    println!("   Try: redis-cli -p {} NOTES.ALL", port_of(&args.bind));
    println!("   Press Ctrl+C to stop\n");

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let handler = CommandHandler::new(Arc::clone(&cache));

                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, addr, handler).await {
                            error!("Error handling client {}: {}", addr, e);
                        }
                        info!("Connection closed: {}", addr);
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn handle_client(
    mut stream: TcpStream,
    addr: SocketAddr,
    handler: CommandHandler,
) -> Result<()> {
    let mut buffer = BytesMut::with_capacity(4096);

    loop {
        let n = stream.read_buf(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }

        loop {
            match RespValue::parse(&mut buffer) {
                Ok(Some(cmd)) => {
                    // Cache calls block on store I/O
                    let handler = handler.clone();
                    let response = tokio::task::spawn_blocking(move || handler.handle(cmd)).await?;
                    stream.write_all(&response.serialize()).await?;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Parse error from {}: {}", addr, e);
                    let error_resp = RespValue::Error(format!("ERR {}", e));
                    stream.write_all(&error_resp.serialize()).await?;
                    buffer.clear();
                    break;
                }
            }
        }
    }
}

fn port_of(bind: &str) -> &str {
    bind.rsplit(':').next().unwrap_or("6380")
}
