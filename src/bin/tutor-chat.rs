use clap::Parser;
use dotenv::dotenv;
use math_tutor::client::{ ChatLog, InputBuffer, TutorClient };
use math_tutor::models::chat::{ MessageBody, Sender };
use std::error::Error;
use std::io::Write;
use std::time::Duration;
use tokio::io::{ AsyncBufReadExt, BufReader };

/// Interactive terminal chat against a running math tutor server.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct ChatArgs {
    /// Base URL of the tutor server.
    #[arg(long, env = "TUTOR_SERVER_URL", default_value = "http://127.0.0.1:3001")]
    server_url: String,

    /// Seconds to wait for a reply; rendering can take minutes.
    #[arg(long, env = "TUTOR_REQUEST_TIMEOUT_SECS", default_value = "600")]
    timeout_secs: u64,
}

fn print_prompt(continuing: bool) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", if continuing { "... " } else { "you> " })?;
    stdout.flush()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = ChatArgs::parse();

    let client = TutorClient::new(&args.server_url, Duration::from_secs(args.timeout_secs))?;
    let mut log = ChatLog::new();
    let mut input = InputBuffer::new();

    println!("Connected to {}. End a line with \\ to continue it, Ctrl-D to quit.", client.base_url());
    print_prompt(false)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(message) = input.feed_line(&line) else {
            print_prompt(input.is_continuing())?;
            continue;
        };

        println!("tutor> thinking...");
        // Failures are already recorded in the log.
        let _ = client.send(&mut log, &message).await;

        for entry in log.unseen() {
            if entry.sender != Sender::Assistant {
                continue;
            }
            match &entry.body {
                MessageBody::Text { content } => println!("tutor> {}", content),
                MessageBody::Video { url } => println!("tutor> [video] {}", url),
            }
        }
        print_prompt(false)?;
    }

    println!();
    Ok(())
}
