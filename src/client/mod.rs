use log::{ debug, warn };
use reqwest::Client as HttpClient;
use std::time::Duration;
use thiserror::Error;

use crate::models::chat::{ ChatMessage, ChatReply, ChatRequest, ErrorBody, Sender };

/// Shown in place of an answer when the server could not be reached.
pub const FAILURE_TEXT: &str = "Sorry, something went wrong. Please try again.";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {}", .body.error)]
    Status { status: u16, body: ErrorBody },
}

/// Ordered conversation of one session. Entries are only ever appended.
#[derive(Debug, Default, Clone)]
pub struct ChatLog {
    entries: Vec<ChatMessage>,
    seen: usize,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.entries.push(ChatMessage::text(Sender::User, text));
    }

    /// Appends the explanation (if any) and then the video (if any).
    /// Returns how many entries were added.
    pub fn apply_reply(&mut self, reply: &ChatReply) -> usize {
        let before = self.entries.len();
        if !reply.reply.is_empty() {
            self.entries.push(ChatMessage::text(Sender::Assistant, reply.reply.clone()));
        }
        if let Some(url) = &reply.video_url {
            self.entries.push(ChatMessage::video(Sender::Assistant, url.clone()));
        }
        self.entries.len() - before
    }

    pub fn apply_error(&mut self, body: &ErrorBody) {
        self.entries.push(ChatMessage::text(Sender::Assistant, body.error.clone()));
    }

    pub fn apply_failure(&mut self) {
        self.entries.push(ChatMessage::text(Sender::Assistant, FAILURE_TEXT));
    }

    /// Entries appended since the previous call; the caller keeps the view
    /// scrolled to these.
    pub fn unseen(&mut self) -> &[ChatMessage] {
        let start = self.seen;
        self.seen = self.entries.len();
        &self.entries[start..]
    }
}

/// Line-based input with continuation: a line ending in `\` adds a newline
/// to the pending message instead of submitting it.
#[derive(Debug, Default)]
pub struct InputBuffer {
    pending: String,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_continuing(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Returns the complete message once a line submits it. Blank messages
    /// are swallowed.
    pub fn feed_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(head) = line.strip_suffix('\\') {
            self.pending.push_str(head);
            self.pending.push('\n');
            return None;
        }
        self.pending.push_str(line);
        let message = std::mem::take(&mut self.pending);
        if message.trim().is_empty() {
            None
        } else {
            Some(message)
        }
    }
}

pub struct TutorClient {
    http: HttpClient,
    base_url: String,
}

impl TutorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Server-relative video URLs are made absolute so they can be opened
    /// outside the browser.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with('/') { format!("{}{}", self.base_url, url) } else { url.to_string() }
    }

    async fn post_chat(&self, message: &str) -> Result<ChatReply, ClientError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!("POST {}", url);
        let response = self.http
            .post(&url)
            .json(&(ChatRequest { message: message.to_string() }))
            .send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.unwrap_or_else(|_| ErrorBody {
                error: FAILURE_TEXT.to_string(),
                details: None,
            });
            return Err(ClientError::Status { status: status.as_u16(), body });
        }
        Ok(response.json::<ChatReply>().await?)
    }

    /// Sends one message and records both sides of the exchange in `log`,
    /// whatever the outcome.
    pub async fn send(&self, log: &mut ChatLog, message: &str) -> Result<(), ClientError> {
        log.push_user(message);
        match self.post_chat(message).await {
            Ok(mut reply) => {
                reply.video_url = reply.video_url.map(|u| self.resolve_url(&u));
                log.apply_reply(&reply);
                Ok(())
            }
            Err(ClientError::Status { status, body }) => {
                warn!("Server rejected message with {}: {}", status, body.error);
                log.apply_error(&body);
                Err(ClientError::Status { status, body })
            }
            Err(e) => {
                warn!("Chat request failed: {}", e);
                log.apply_failure();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::MessageBody;
    use axum::{ routing::post, Json, Router };

    fn text_of(message: &ChatMessage) -> &str {
        match &message.body {
            MessageBody::Text { content } => content.as_str(),
            MessageBody::Video { url } => url.as_str(),
        }
    }

    #[test]
    fn reply_appends_text_then_video() {
        let mut log = ChatLog::new();
        log.push_user("what is pi?");
        let added = log.apply_reply(&ChatReply {
            reply: "About 3.14159.".into(),
            video_url: Some("/videos/a/480p15/Pi_a_subtitled.mp4".into()),
        });
        assert_eq!(added, 2);
        assert_eq!(log.entries()[0].sender, Sender::User);
        assert_eq!(log.entries()[1].body, MessageBody::Text { content: "About 3.14159.".into() });
        assert!(matches!(log.entries()[2].body, MessageBody::Video { .. }));
    }

    #[test]
    fn empty_reply_without_video_adds_nothing() {
        let mut log = ChatLog::new();
        assert_eq!(log.apply_reply(&ChatReply { reply: String::new(), video_url: None }), 0);
        assert!(log.is_empty());
    }

    #[test]
    fn unseen_tracks_newest_entries() {
        let mut log = ChatLog::new();
        log.push_user("one");
        assert_eq!(log.unseen().len(), 1);
        assert!(log.unseen().is_empty());
        log.apply_failure();
        let fresh = log.unseen();
        assert_eq!(fresh.len(), 1);
        assert_eq!(text_of(&fresh[0]), FAILURE_TEXT);
    }

    #[test]
    fn trailing_backslash_continues_the_message() {
        let mut input = InputBuffer::new();
        assert_eq!(input.feed_line("first line\\\n"), None);
        assert!(input.is_continuing());
        assert_eq!(input.feed_line("second line\n"), Some("first line\nsecond line".to_string()));
        assert!(!input.is_continuing());
        assert_eq!(input.feed_line("   "), None);
    }

    #[test]
    fn relative_urls_resolve_against_server() {
        let client = TutorClient::new("http://127.0.0.1:3001/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.resolve_url("/videos/x.mp4"), "http://127.0.0.1:3001/videos/x.mp4");
        assert_eq!(client.resolve_url("https://cdn/x.mp4"), "https://cdn/x.mp4");
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn send_records_reply_from_server() {
        let app = Router::new().route(
            "/api/chat",
            post(|Json(req): Json<ChatRequest>| async move {
                Json(ChatReply {
                    reply: format!("echo: {}", req.message),
                    video_url: Some("/videos/v.mp4".into()),
                })
            })
        );
        let base = serve(app).await;
        let client = TutorClient::new(&base, Duration::from_secs(5)).unwrap();
        let mut log = ChatLog::new();

        client.send(&mut log, "hi").await.unwrap();

        assert_eq!(log.len(), 3);
        assert_eq!(text_of(&log.entries()[1]), "echo: hi");
        assert_eq!(text_of(&log.entries()[2]), format!("{}/videos/v.mp4", base));
    }

    #[tokio::test]
    async fn unreachable_server_appends_fixed_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = TutorClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let mut log = ChatLog::new();
        assert!(client.send(&mut log, "hi").await.is_err());
        assert_eq!(log.len(), 2);
        assert_eq!(text_of(&log.entries()[1]), FAILURE_TEXT);
    }
}
