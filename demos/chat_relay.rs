//! Chat relay example: two backplane instances sharing one log
//!
//! Run with: cargo run --example chat_relay [SERVER]
//!
//! Examples:
//!   cargo run --example chat_relay               # uses localhost:27017
//!   cargo run --example chat_relay db.internal   # uses db.internal:27017
//!
//! Two `MongoBackplane` instances stand in for two independent server
//! processes. Lines typed on stdin are published through process A; a
//! subscriber long-polling process B prints them as they arrive, having
//! travelled through the shared capped collection.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use mongo_backplane::{BackplaneConfig, MongoBackplane};

fn print_usage() {
    eprintln!("Usage: chat_relay [SERVER]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  SERVER    MongoDB host (default: localhost)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let server = args.get(1).cloned().unwrap_or_else(|| "localhost".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mongo_backplane=debug".parse()?),
        )
        .init();

    let config = |host: &str| BackplaneConfig::new(host, "chat_demo", "events");

    // Two instances, as if two server processes were scaled out
    let process_a = Arc::new(MongoBackplane::new(config(&server))?);
    let process_b = Arc::new(MongoBackplane::new(config(&server))?);

    process_a.ensure_ready().await?;
    process_b.ensure_ready().await?;

    println!("Connected to {}. Type a message and press enter; ctrl-c to quit.", server);

    let cancel = CancellationToken::new();

    // Subscriber on process B: long-poll and print whatever arrives
    let subscriber = {
        let process_b = Arc::clone(&process_b);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let keys = vec!["chat".to_string()];
            let mut cursor: Option<String> = None;

            while !cancel.is_cancelled() {
                let batch = match process_b.get_messages(&keys, cursor.as_deref(), &cancel).await {
                    Ok(batch) => batch,
                    Err(e) => {
                        eprintln!("subscriber error: {}", e);
                        break;
                    }
                };
                for message in &batch.messages {
                    println!("[{}] {}", message.connection_id, message.payload);
                }
                cursor = batch.cursor_token().or(cursor);
            }
        })
    };

    // Publisher on process A: one message per stdin line
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if !line.trim().is_empty() => {
                    process_a.send("demo", "chat", line.trim()).await?;
                }
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    cancel.cancel();
    let _ = subscriber.await;
    process_a.shutdown().await;
    process_b.shutdown().await;

    Ok(())
}
