use chrono::Utc;
use serde::{ Deserialize, Serialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessageBody {
    Text {
        content: String,
    },
    Video {
        url: String,
    },
}

/// One entry of a conversation log. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    #[serde(flatten)]
    pub body: MessageBody,
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn text(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            sender,
            body: MessageBody::Text { content: content.into() },
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn video(sender: Sender, url: impl Into<String>) -> Self {
        Self {
            sender,
            body: MessageBody::Video { url: url.into() },
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub video_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_uses_camel_case_and_explicit_null() {
        let reply = ChatReply { reply: "hi".into(), video_url: None };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json, serde_json::json!({ "reply": "hi", "videoUrl": null }));
    }

    #[test]
    fn message_body_is_tagged_by_kind() {
        let msg = ChatMessage::video(Sender::Assistant, "/videos/a.mp4");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["sender"], "assistant");
        assert_eq!(json["kind"], "video");
        assert_eq!(json["url"], "/videos/a.mp4");
    }
}
