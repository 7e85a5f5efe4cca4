//! Telegram Bot API integration
//!
//! - **Updates** (`update`) - inbound webhook payloads and order extraction
//! - **Bot API** (`api`) - `sendDocument` uploads through `DocumentSender`
//!
//! One `BotApiClient` serves every business line; each call names the bot
//! token to use, so tokens never live in the client itself.

pub mod api;
pub mod update;

pub use api::{BotApiClient, DeliveryError, DocumentSender, OutboundDocument, SentDocument};
pub use update::{parse_order, MalformedPayload, Update};
