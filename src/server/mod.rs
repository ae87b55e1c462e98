pub mod api;

use crate::agent::TutorAgent;
use crate::cli::Args;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

pub struct Server {
    addr: String,
    agent: Arc<TutorAgent>,
    videos_dir: PathBuf,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: Arc<TutorAgent>, videos_dir: PathBuf, args: Args) -> Self {
        Self {
            addr,
            agent,
            videos_dir,
            args,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        tokio::fs::create_dir_all(&self.videos_dir).await?;
        let app = api::router(
            Arc::clone(&self.agent),
            self.videos_dir.clone(),
            self.args.chat_rate_limit
        );
        api::start_http_server(&self.addr, app, &self.args).await
    }
}
