use orderslip_core::{ConversationId, OrderRequest};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MalformedPayload {
    #[error("update body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("update has no message.chat.id")]
    MissingChatId,
}

/// The subset of a Bot API `Update` the order pipeline reads.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub chat: Option<Chat>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Chat {
    #[serde(default)]
    pub id: Option<ChatId>,
}

/// Chat ids are integers on the wire; string ids (`@channel`) are accepted
/// as-is.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Numeric(i64),
    Text(String),
}

impl From<ChatId> for ConversationId {
    fn from(value: ChatId) -> Self {
        match value {
            ChatId::Numeric(id) => ConversationId(id.to_string()),
            ChatId::Text(id) => ConversationId(id),
        }
    }
}

impl Update {
    /// Builds the order for this update. A message without text is an empty
    /// order rather than an error.
    pub fn into_order(self) -> Result<OrderRequest, MalformedPayload> {
        let message = self.message.ok_or(MalformedPayload::MissingChatId)?;
        let chat_id =
            message.chat.and_then(|chat| chat.id).ok_or(MalformedPayload::MissingChatId)?;

        Ok(OrderRequest {
            conversation_id: chat_id.into(),
            raw_text: message.text.unwrap_or_default(),
        })
    }
}

pub fn parse_order(body: &[u8]) -> Result<OrderRequest, MalformedPayload> {
    serde_json::from_slice::<Update>(body)?.into_order()
}

#[cfg(test)]
mod tests {
    use orderslip_core::ConversationId;

    use super::{parse_order, MalformedPayload};

    #[test]
    fn extracts_chat_id_and_text() {
        let order = parse_order(
            br#"{"update_id":1,"message":{"message_id":7,"chat":{"id":-100123,"type":"group"},"text":"2 kg tomato"}}"#,
        )
        .expect("update should parse");

        assert_eq!(order.conversation_id, ConversationId("-100123".to_string()));
        assert_eq!(order.raw_text, "2 kg tomato");
    }

    #[test]
    fn missing_text_is_an_empty_order() {
        let order =
            parse_order(br#"{"message":{"chat":{"id":42},"photo":[]}}"#).expect("update parses");
        assert_eq!(order.conversation_id, ConversationId("42".to_string()));
        assert_eq!(order.raw_text, "");
    }

    #[test]
    fn missing_chat_id_is_malformed() {
        let bodies: [&[u8]; 3] = [
            br#"{"update_id":1}"#,
            br#"{"message":{"text":"hi"}}"#,
            br#"{"message":{"chat":{},"text":"hi"}}"#,
        ];
        for body in bodies {
            assert!(matches!(parse_order(body), Err(MalformedPayload::MissingChatId)));
        }
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(parse_order(b"not json"), Err(MalformedPayload::InvalidJson(_))));
    }
}
