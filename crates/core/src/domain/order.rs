use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One parsed unit of an order.
///
/// The wire form produced by the extraction model uses `item_name` for the
/// name. Missing fields become empty strings and numeric quantities are kept
/// as their textual form, so a sloppy reply still yields a usable row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "item_name", default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub quantity: String,
}

impl LineItem {
    pub fn new(name: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self { name: name.into(), quantity: quantity.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderRequest {
    pub conversation_id: ConversationId,
    pub raw_text: String,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    })
}
