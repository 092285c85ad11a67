//! Line-oriented chat client.
//!
//! ```not_rust
//! cargo run -p chat-cli -- --id 1 --name alice
//! ```
//!
//! Type a line to broadcast it. `@2 hello` sends to client 2 only,
//! `/list` shows who is online, `/quit` leaves.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use twotter::logging::init_logging;
use twotter::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "chat-cli")]
#[command(about = "Terminal client for a Twotter chat server", long_about = None)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    server: SocketAddr,

    /// Client id to claim (non-zero)
    #[arg(short, long)]
    id: u32,

    /// Display name, up to 20 bytes
    #[arg(short, long)]
    name: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Broadcast(&'a str),
    Direct(ClientId, &'a str),
    List,
    Quit,
    Empty,
    Invalid(&'static str),
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    match line {
        "/quit" => return Command::Quit,
        "/list" => return Command::List,
        _ => {}
    }
    if let Some(rest) = line.strip_prefix('@') {
        let Some((id, text)) = rest.split_once(' ') else {
            return Command::Invalid("usage: @<id> <text>");
        };
        return match id.parse::<u32>() {
            Ok(id) if id != 0 => Command::Direct(ClientId(id), text.trim()),
            _ => Command::Invalid("recipient must be a non-zero number"),
        };
    }
    Command::Broadcast(line)
}

fn print_message(msg: &Message) {
    let scope = if msg.is_broadcast() { "all" } else { "direct" };
    println!("[{scope}] {} ({}): {}", msg.sender_name, msg.origin, msg.body);
}

#[tokio::main]
async fn main() {
    init_logging(env!("CARGO_BIN_NAME"), "warn");

    if let Err(e) = run(Args::parse()).await {
        eprintln!("chat-cli: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), TwotterError> {
    let config = SessionConfig::new(args.server, ClientId(args.id), args.name);
    let mut session = ChatSession::connect(config).await?;
    println!("connected as {} ({})", session.name(), session.client_id());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut notices = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to read stdin");
                        break;
                    }
                };
                let sent = match parse_command(&line) {
                    Command::Broadcast(text) => session.send_text(text, ClientId::BROADCAST).await,
                    Command::Direct(dest, text) => session.send_direct(text, dest).await,
                    Command::List => {
                        let requested = session.request_online_list().await;
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        let online: Vec<String> =
                            session.online_ids().iter().map(ToString::to_string).collect();
                        println!("online: {}", online.join(", "));
                        requested
                    }
                    Command::Quit => break,
                    Command::Empty => Ok(()),
                    Command::Invalid(usage) => {
                        eprintln!("{usage}");
                        Ok(())
                    }
                };
                if let Err(e) = sent {
                    eprintln!("send failed: {e}");
                }
            }
            msg = session.next_message() => match msg {
                Some(msg) => print_message(&msg),
                None => break,
            },
            _ = notices.tick() => {
                for notice in session.drain_errors() {
                    eprintln!("server: {}", notice.body);
                }
            }
        }
    }

    session.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_line_is_broadcast() {
        assert_eq!(parse_command("hello all"), Command::Broadcast("hello all"));
    }

    #[test]
    fn test_parse_direct_message() {
        assert_eq!(parse_command("@12 hi there"), Command::Direct(ClientId(12), "hi there"));
    }

    #[test]
    fn test_parse_direct_to_zero_is_invalid() {
        assert!(matches!(parse_command("@0 hi"), Command::Invalid(_)));
    }

    #[test]
    fn test_parse_direct_without_text_is_invalid() {
        assert!(matches!(parse_command("@5"), Command::Invalid(_)));
    }

    #[test]
    fn test_parse_commands_and_blank() {
        assert_eq!(parse_command("/list"), Command::List);
        assert_eq!(parse_command("  /quit  "), Command::Quit);
        assert_eq!(parse_command("   "), Command::Empty);
    }
}
