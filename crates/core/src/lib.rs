//! Shared domain model, configuration and error taxonomy for orderslip.
//!
//! - `domain` - line items, order requests and the paginator
//! - `config` - layered configuration (defaults, TOML file, env, overrides)
//! - `errors` - application and interface error mapping

pub mod config;
pub mod domain;
pub mod errors;

pub use domain::order::{ConversationId, LineItem, OrderRequest};
pub use domain::page::{paginate, Page, PageRow, DEFAULT_ROWS_PER_PAGE};
pub use errors::{ApplicationError, DomainError, InterfaceError};
