//! # lazyaws-core – runtime core for shape-driven AWS clients
//!
//! Service bindings are data: a [`ServiceDefinition`] lists shapes,
//! operations, waiters and error codes, and the core turns calls into
//! signed HTTP exchanges and decoded values.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │  Client  (client.rs)                             │
//! │  ├── call / send / presign / pages               │
//! │  └── waiter  ──▶ Waiter  (waiter.rs)             │
//! ├──────────────────────────────────────────────────┤
//! │  protocol::marshal / unmarshal  (protocol/)      │
//! │  rest-xml · rest-json · json · query             │
//! ├──────────────────────────────────────────────────┤
//! │  SigV4Signer  (signing.rs)                       │
//! │  CacheProvider ▶ ChainProvider  (credentials/)   │
//! ├──────────────────────────────────────────────────┤
//! │  Transport  (http.rs, transport.rs)              │
//! │  └── PendingResponse ──▶ LazyResult  (result.rs) │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Protocols
//!
//! | Protocol  | Request                          | Response        |
//! |-----------|----------------------------------|-----------------|
//! | rest-xml  | URI/query/header bindings + XML  | XML + headers   |
//! | rest-json | URI/query/header bindings + JSON | JSON + headers  |
//! | json      | `X-Amz-Target` + JSON body       | JSON            |
//! | query     | form-encoded `Action`/`Version`  | wrapped XML     |

// ── Sub-modules ─────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod http;
pub mod transport;

pub mod endpoint;
pub mod shape;
pub mod signing;
pub mod value;

pub mod credentials;
pub mod protocol;
pub mod service;

pub mod client;
pub mod result;
pub mod waiter;

pub mod sts;

// ── Re-exports for ergonomic access ─────────────────────────────────────

pub use client::{Client, ClientBuilder, Clock, RequestContext};
pub use config::{Configuration, RetryConfig, RetryMode};
pub use credentials::{default_chain, CredentialProvider, Credentials};
pub use endpoint::{EndpointMetadata, EndpointRules};
pub use error::{ErrorKind, SdkError, SdkResult, ServiceError};
pub use http::{Headers, PendingResponse, RawResponse, Request, Transport};
pub use protocol::Protocol;
pub use result::{Input, LazyResult, Output, ResponseInfo, ResultState};
pub use service::{OperationDefinition, OperationDraft, Pagination, ServiceBuilder, ServiceDefinition};
pub use shape::{MemberDraft, Model, ShapeDraft, TimestampFormat};
pub use signing::{SigV4Signer, SignerFlavor};
pub use transport::{ReqwestTransport, StubTransport};
pub use value::{StructBuilder, Value};
pub use waiter::{Acceptor, AcceptorState, Delay, Matcher, Waiter, WaiterSpec, WaiterState};
