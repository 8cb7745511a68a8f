//! Daterr CLI - terminal chat client.

use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use daterr_chat::{ChatSession, Notifier, ReconnectPolicy, SessionConfig, SessionEvent};
use daterr_client::{HttpClient, DEFAULT_API_URL};
use daterr_core::{ChatMessage, ConversationId, UserId};

/// Daterr CLI - chat from the terminal
#[derive(Parser)]
#[command(name = "daterr")]
#[command(about = "Terminal client for Daterr conversations", long_about = None)]
struct Cli {
    /// User API base URL
    #[arg(long, env = "DATERR_API_URL", default_value = DEFAULT_API_URL)]
    api: String,

    /// Access token sent as a bearer token
    #[arg(long, env = "DATERR_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List conversations
    Conversations {
        /// Hide this user from participant lists
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Open a conversation and chat interactively
    ///
    /// Sent messages are shown once the server echoes them back.
    Chat {
        /// Local user ID
        #[arg(short, long)]
        user: String,

        /// Conversation (match) ID
        #[arg(short, long)]
        conversation: String,

        /// Chat WebSocket endpoint
        #[arg(long, env = "DATERR_CHAT_URL", default_value = "ws://localhost:4000/v1/chat/ws")]
        endpoint: String,

        /// Back off exponentially between reconnects instead of every 5s
        #[arg(long)]
        backoff: bool,

        /// Skip loading the message backlog
        #[arg(long)]
        no_history: bool,
    },
}

/// Rings the terminal bell for incoming messages.
struct BellNotifier;

impl Notifier for BellNotifier {
    fn message_received(&self, _message: &ChatMessage) {
        let mut stdout = std::io::stdout();
        stdout.write_all(b"\x07").ok();
        stdout.flush().ok();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("daterr=info".parse()?))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let http = HttpClient::new(&cli.api, cli.token.clone());

    match cli.command {
        Commands::Conversations { user } => {
            list_conversations(&http, user.map(UserId::from)).await?;
        }
        Commands::Chat {
            user,
            conversation,
            endpoint,
            backoff,
            no_history,
        } => {
            let mut config = SessionConfig::new(endpoint);
            if let Some(token) = cli.token {
                config = config.with_auth_token(token);
            }
            if backoff {
                config = config.with_reconnect(ReconnectPolicy::exponential());
            }

            let history = if no_history { None } else { Some(&http) };
            chat(
                config,
                history,
                UserId::from(user),
                ConversationId::from(conversation),
            )
            .await?;
        }
    }

    Ok(())
}

async fn list_conversations(
    http: &HttpClient,
    user: Option<UserId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let conversations = http.list_conversations().await?;

    if conversations.is_empty() {
        println!("No conversations.");
        return Ok(());
    }

    println!("{:<38} {:<30} {:>6}", "ID", "WITH", "UNREAD");
    println!("{}", "-".repeat(76));
    let me = user.unwrap_or_default();
    for conversation in &conversations {
        let with: Vec<&str> = conversation
            .peers(&me)
            .map(|p| {
                if p.name.is_empty() {
                    p.id.as_str()
                } else {
                    p.name.as_str()
                }
            })
            .collect();
        println!(
            "{:<38} {:<30} {:>6}",
            conversation.id,
            with.join(", "),
            conversation.unread_count
        );
    }

    Ok(())
}

async fn chat(
    config: SessionConfig,
    history: Option<&HttpClient>,
    user: UserId,
    conversation: ConversationId,
) -> Result<(), Box<dyn std::error::Error>> {
    let (session, mut events) = ChatSession::new(config);
    let mut session = session.with_notifier(Arc::new(BellNotifier));

    // The backlog is printed once, before any live message can arrive
    let backlog = match history {
        Some(http) => http.fetch_history(&conversation).await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not load message history");
            Vec::new()
        }),
        None => Vec::new(),
    };
    for message in &backlog {
        println!("{}", format_message(message, &user));
    }

    session.open(conversation.clone(), user.clone()).await?;
    if !backlog.is_empty() {
        session.seed_history(backlog);
    }

    println!("Chatting in {} as {}. Type /quit to leave.", conversation, user);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim_end();

                if line == "/quit" {
                    break;
                } else if let Some(draft) = line.strip_prefix("/typing") {
                    session.notify_typing(draft.trim_start());
                } else if let Err(e) = session.send(line).await {
                    println!("! not sent: {}", e);
                }
            }
            Some(event) = events.recv() => {
                print_event(&event, &user);
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    session.close().await;
    info!("Bye");
    Ok(())
}

fn print_event(event: &SessionEvent, me: &UserId) {
    match event {
        SessionEvent::MessageReceived(message) => println!("{}", format_message(message, me)),
        SessionEvent::TypingChanged(typing) => {
            if let (true, Some(peer)) = (typing.is_typing, &typing.typing_peer_id) {
                println!("  {} is typing...", peer);
            }
        }
        SessionEvent::ConnectionChanged(state) => println!("[{}]", state),
        SessionEvent::ConnectionError { message } => println!("[error] {}", message),
        SessionEvent::ReconnectScheduled { attempt, retry_in } => {
            println!("[retrying in {}s, attempt {}]", retry_in.as_secs(), attempt);
        }
        SessionEvent::HistorySeeded { total, duplicates } => {
            info!(total, duplicates, "History merged");
        }
    }
}

fn format_message(message: &ChatMessage, me: &UserId) -> String {
    let time = chrono::DateTime::from_timestamp(message.timestamp, 0)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());

    if message.is_system() {
        format!("{} -- {} --", time, message.content)
    } else if message.is_from(me) {
        format!("{} me: {}", time, message.content)
    } else {
        format!("{} {}: {}", time, message.sender_id, message.content)
    }
}
