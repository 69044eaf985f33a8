//! # bulkline-gateway
//!
//! Client for the external SMS gateway that carries Bulkline's outbound
//! traffic.
//!
//! ```text
//!  bulkline-api                       SMS gateway
//!       │                                  │
//!       ├── GET /account/balance/{u}/{k} ─► │
//!       ├── POST /sms/send ───────────────► │
//!       ├◄──── "Balance: 1,234.50" ──────── │
//! ```
//!
//! ## Key concepts
//!
//! - **Client** (`client.rs`): one method per upstream endpoint.
//! - **Phrase table** (`phrases.rs`): the gateway signals failure with free
//!   text; all interpretation happens in one place.
//! - **Envelope** (`envelope.rs`): the `{success, data, error, error_code}`
//!   shape returned to callers, always with HTTP 200.
//! - **Operations** (`operation.rs`): the `operation`-tagged request bodies
//!   accepted by the proxy function.

pub mod client;
pub mod envelope;
pub mod error;
pub mod operation;
pub mod phrases;

pub use client::{Credentials, GatewayClient};
pub use envelope::GatewayEnvelope;
pub use error::{GatewayError, GatewayErrorCode};
pub use operation::GatewayOperation;
