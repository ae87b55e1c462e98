pub mod agent;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod lesson;
pub mod llm;
pub mod media;
pub mod models;
pub mod server;

use agent::TutorAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat Model: {}", args.chat_model);
    info!("Code Model: {}", args.code_model());
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("adapter default"));
    info!("LLM Timeout: {}s", args.llm_timeout_secs);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Media Dir: {}", args.media_dir);
    info!("Scripts Dir: {}", args.scripts_dir);
    info!("Render Quality: {:?}", args.render_quality);
    info!("Subtitles Enabled: {}", args.enable_subtitles);
    info!("Chat Rate Limit: {}/s", args.chat_rate_limit);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = Arc::new(TutorAgent::new(&args)?);
    let videos_dir = agent.videos_dir();
    let server = Server::new(args.server_addr.clone(), agent, videos_dir, args.clone());
    server.run().await?;

    Ok(())
}
