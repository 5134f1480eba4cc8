//! LTI Gateway
//!
//! Tool-provider side of LTI 1.1: verifies OAuth 1.0a signed launches from a
//! learning management system, keeps the launch in a per-user session, gates
//! protected operations on LTI roles and posts grades back to the consumer.
//!
//! # Features
//!
//! - **Launch verification**: HMAC-SHA1 and HMAC-SHA256 signatures,
//!   body or `Authorization` header parameters, timestamp window
//! - **Role gates**: `staff`, `instructor`, `administrator`, `student` or `any`
//! - **Grade passback**: LTI 1.1 POX `replaceResult`/`deleteResult` and the
//!   LIS v2 Result REST service, both OAuth-signed with a body hash
//! - **HTTP host**: axum adapter with cookie sessions
//!
//! # Example
//!
//! ```no_run
//! use lti_gateway::{Config, LaunchRequest, LtiGateway, LtiSession, Requirement};
//!
//! # fn run(request: LaunchRequest) -> anyhow::Result<()> {
//! let gateway = LtiGateway::from_config(&Config::from_env()?)?;
//! let mut session = LtiSession::new();
//!
//! let greeting = gateway.guard(
//!     &Requirement::initial().with_role("student"),
//!     &request,
//!     &mut session,
//!     |ctx| format!("Hello, {}", ctx.name()),
//! );
//! # let _ = greeting;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consumer;
pub mod error;
pub mod gateway;
pub mod launch;
pub mod oauth;
pub mod outcome;
pub mod roles;
pub mod server;
pub mod session;
pub mod verify;

pub use config::Config;
pub use consumer::{Consumer, ConsumerRegistry};
pub use error::{LtiError, LtiResult, VerificationError, VerificationResult};
pub use gateway::{LtiContext, LtiGateway, Rejection, RejectionKind, RequestKind, Requirement};
pub use launch::LaunchRequest;
pub use outcome::{GradePoster, UrlRewrite};
pub use session::LtiSession;
pub use verify::{LaunchOutcome, RequestVerifier};
