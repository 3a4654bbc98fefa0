//! Beacon CLI
//!
//! Command-line consumer for the Beacon event channel. Connects to the
//! notification endpoint, authorizes the session for a user, and prints
//! live notifications as they arrive; `--history` fetches stored
//! notifications from the REST API instead.

use beacon_core::{ChannelConfig, ChannelError, Envelope, Topic, DEFAULT_ENDPOINT};
use clap::Parser;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod history;

/// Beacon - live notification channel client
///
/// Follows a user's notification stream over WebSocket, reconnecting
/// automatically when the connection drops.
#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(version, about, long_about = None)]
struct Args {
    /// WebSocket endpoint of the notification channel
    #[arg(short, long, env = "BEACON_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// User to authorize the session for
    #[arg(short, long, env = "BEACON_USER_ID")]
    user_id: String,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Fetch stored notification history instead of following the stream
    #[arg(long)]
    history: bool,

    /// Base URL of the notification REST API (for --history)
    #[arg(long, env = "BEACON_API_URL", default_value = "http://localhost:8383")]
    api_url: String,

    /// History page number, 1-based (for --history)
    #[arg(long, default_value = "1")]
    page: u32,

    /// History page size (for --history)
    #[arg(long, default_value = "20")]
    limit: u32,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Channel occurrence forwarded from listener callbacks to the main loop
#[derive(Debug)]
enum UiEvent {
    Connected,
    Disconnected,
    Error(ChannelError),
    Message(Envelope),
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let json_output = matches!(args.format, OutputFormat::Json);

    if args.history {
        return match history::fetch_history(&args.api_url, &args.user_id, args.page, args.limit)
            .await
        {
            Ok(page) => {
                print_history(&page, json_output);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    tracing::info!(
        "Following notifications for '{}' at {}",
        args.user_id,
        args.endpoint
    );

    let client = beacon_core::initialize(ChannelConfig::new(&args.endpoint));

    // Bridge listener callbacks onto the async main loop
    let (tx, mut rx) = mpsc::unbounded_channel::<UiEvent>();

    let connect_tx = tx.clone();
    client.on_connect(move || {
        let _ = connect_tx.send(UiEvent::Connected);
    });
    let disconnect_tx = tx.clone();
    client.on_disconnect(move || {
        let _ = disconnect_tx.send(UiEvent::Disconnected);
    });
    let error_tx = tx.clone();
    client.on_error(move |err| {
        let _ = error_tx.send(UiEvent::Error(err.clone()));
    });
    let message_tx = tx;
    client.on_message(move |envelope| {
        let _ = message_tx.send(UiEvent::Message(envelope.clone()));
    });

    let exit = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break ExitCode::SUCCESS;
            }
            event = rx.recv() => match event {
                Some(UiEvent::Connected) => {
                    tracing::info!("connected; authorizing session");
                    if let Err(e) = client.send(&Envelope::authorization(&args.user_id)) {
                        tracing::warn!(error = %e, "authorization send failed");
                    }
                }
                Some(UiEvent::Disconnected) => {
                    tracing::info!("disconnected");
                }
                Some(UiEvent::Error(err)) => {
                    tracing::warn!(error = %err, "channel error");
                    if matches!(err, ChannelError::ReconnectExhausted(_)) {
                        eprintln!("Error: {err}");
                        break ExitCode::FAILURE;
                    }
                }
                Some(UiEvent::Message(envelope)) => {
                    print_envelope(&envelope, json_output);
                }
                None => break ExitCode::SUCCESS,
            },
        }
    };

    beacon_core::teardown();
    exit
}

/// Print one inbound envelope in the selected format
fn print_envelope(envelope: &Envelope, json_output: bool) {
    if json_output {
        println!(
            "{}",
            serde_json::to_string(envelope).unwrap_or_else(|_| "{}".to_string())
        );
        return;
    }

    match envelope.topic {
        Topic::Announcement => match envelope.notification() {
            Some(notification) => {
                println!("[{}] {}", notification.topic, notification.title);
                println!("  {}", notification.description);
                if let Some(link) = &notification.link {
                    println!("  -> {link}");
                }
            }
            None => println!("[announcement] {}", envelope.content),
        },
        Topic::Connected => println!("[server] session acknowledged"),
        _ => println!("[{}] {}", envelope.topic, envelope.content),
    }
}

/// Print a history page in the selected format
fn print_history(page: &history::HistoryPage, json_output: bool) {
    if json_output {
        for notification in &page.notifications {
            println!(
                "{}",
                serde_json::to_string(notification).unwrap_or_else(|_| "{}".to_string())
            );
        }
        return;
    }

    for notification in &page.notifications {
        println!("[{}] {}", notification.topic, notification.title);
        println!("  {}", notification.description);
        if let Some(link) = &notification.link {
            println!("  -> {link}");
        }
    }
    println!(
        "{} of {} notification(s)",
        page.notifications.len(),
        page.total
    );
}
