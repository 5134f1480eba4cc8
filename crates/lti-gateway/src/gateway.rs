//! Authorization gate in front of protected operations.
//!
//! A protected operation declares a [`Requirement`]; [`LtiGateway::guard`]
//! verifies the request or session, checks the role and only then hands the
//! operation an [`LtiContext`]. Failures never reach the operation.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::consumer::{Consumer, ConsumerRegistry};
use crate::error::{LtiError, LtiResult, VerificationError};
use crate::launch::LaunchRequest;
use crate::outcome::{self, GradePoster};
use crate::roles;
use crate::session::LtiSession;
use crate::verify::{RequestVerifier, VerifierOptions};

/// How a protected operation expects to be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A signed launch from the consumer; (re)establishes the session.
    Initial,
    /// A follow-up request inside an established session. A freshly signed
    /// launch is accepted in place of a session.
    Session,
}

/// Access requirement of one protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Expected request kind.
    pub kind: RequestKind,
    /// Role class (see [`roles::ROLE_CLASSES`]) or `any`.
    pub required_role: String,
}

impl Requirement {
    /// Requirement with an explicit kind and role class.
    #[must_use]
    pub fn new(kind: RequestKind, required_role: impl Into<String>) -> Self {
        Self {
            kind,
            required_role: required_role.into(),
        }
    }

    /// Signed launch, any role.
    #[must_use]
    pub fn initial() -> Self {
        Self::new(RequestKind::Initial, roles::ANY)
    }

    /// Established session, any role.
    #[must_use]
    pub fn session() -> Self {
        Self::new(RequestKind::Session, roles::ANY)
    }

    /// Restrict to a role class.
    #[must_use]
    pub fn with_role(mut self, required_role: impl Into<String>) -> Self {
        self.required_role = required_role.into();
        self
    }
}

/// Caller-visible outcome of a refused request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// No valid launch or session.
    Unauthenticated,
    /// Authenticated, but the role does not match.
    Forbidden,
    /// The requirement itself is invalid.
    Misconfigured,
}

/// A refused request, safe to show to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Category of the refusal.
    pub kind: RejectionKind,
    /// User-facing reason.
    pub message: String,
}

impl Rejection {
    /// Matching HTTP status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.kind {
            RejectionKind::Unauthenticated => 401,
            RejectionKind::Forbidden => 403,
            RejectionKind::Misconfigured => 500,
        }
    }
}

impl From<&LtiError> for Rejection {
    fn from(err: &LtiError) -> Self {
        let kind = match err {
            LtiError::NotAuthorized { .. } => RejectionKind::Forbidden,
            LtiError::UnknownRole(_) => RejectionKind::Misconfigured,
            _ => RejectionKind::Unauthenticated,
        };
        Self {
            kind,
            message: err.to_user_message(),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error: {}", self.message)
    }
}

impl std::error::Error for Rejection {}

/// Verifies requests, maintains the LTI session and enforces roles.
#[derive(Debug, Clone)]
pub struct LtiGateway {
    registry: Arc<ConsumerRegistry>,
    verifier: RequestVerifier,
    poster: GradePoster,
}

impl LtiGateway {
    /// Assemble a gateway from its parts.
    #[must_use]
    pub fn new(
        registry: Arc<ConsumerRegistry>,
        verifier: RequestVerifier,
        poster: GradePoster,
    ) -> Self {
        Self {
            registry,
            verifier,
            poster,
        }
    }

    /// Initialize the registry and grade poster from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the certificate cannot be written or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let registry = Arc::new(ConsumerRegistry::initialize(config)?);
        let verifier = RequestVerifier::new(VerifierOptions::from(config));
        let poster = GradePoster::new(config)?;
        Ok(Self::new(registry, verifier, poster))
    }

    /// Registered consumers.
    #[must_use]
    pub fn registry(&self) -> &ConsumerRegistry {
        &self.registry
    }

    /// Grade poster used by contexts handed out by this gateway.
    #[must_use]
    pub const fn poster(&self) -> &GradePoster {
        &self.poster
    }

    /// Run the verification and role check for `requirement`.
    ///
    /// On a launch (or a session fallback launch) the session is rewritten:
    /// populated on success, purged on failure.
    pub fn authorize(
        &self,
        requirement: &Requirement,
        request: &LaunchRequest,
        session: &mut LtiSession,
    ) -> LtiResult<LtiContext> {
        tracing::debug!(
            kind = ?requirement.kind,
            role = %requirement.required_role,
            "verify request"
        );

        match requirement.kind {
            RequestKind::Initial => self.verify_launch(request, session)?,
            RequestKind::Session => {
                if !session.is_authenticated() {
                    tracing::debug!("verify_session failed, trying launch verification");
                    self.verify_launch(request, session).map_err(|err| match err {
                        LtiError::Verification(VerificationError::MalformedRequest(_))
                            if !carries_oauth(request) =>
                        {
                            LtiError::NotInSession
                        }
                        other => other,
                    })?;
                }
            }
        }

        roles::require(session.roles(), &requirement.required_role)?;

        Ok(LtiContext {
            session: session.clone(),
            registry: Arc::clone(&self.registry),
            poster: self.poster.clone(),
        })
    }

    /// Authorize, then run `op` with the context.
    ///
    /// Any failure becomes a [`Rejection`] and `op` is not called.
    pub fn guard<T>(
        &self,
        requirement: &Requirement,
        request: &LaunchRequest,
        session: &mut LtiSession,
        op: impl FnOnce(LtiContext) -> T,
    ) -> Result<T, Rejection> {
        match self.authorize(requirement, request, session) {
            Ok(ctx) => Ok(op(ctx)),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    role = %requirement.required_role,
                    "LTI request rejected"
                );
                Err(Rejection::from(&err))
            }
        }
    }

    fn verify_launch(&self, request: &LaunchRequest, session: &mut LtiSession) -> LtiResult<()> {
        match self.verifier.verify(&self.registry, request) {
            Ok(outcome) => {
                session.establish(&outcome);
                Ok(())
            }
            Err(err) => {
                session.purge();
                Err(err.into())
            }
        }
    }
}

/// Whether the request carries OAuth data in its body, query or header.
fn carries_oauth(request: &LaunchRequest) -> bool {
    request.parameter("oauth_consumer_key").is_some()
        || request.header("authorization").is_some()
        || url::Url::parse(request.url())
            .is_ok_and(|url| url.query_pairs().any(|(key, _)| key == "oauth_consumer_key"))
}

/// Authorized view handed to a protected operation.
#[derive(Clone)]
pub struct LtiContext {
    session: LtiSession,
    registry: Arc<ConsumerRegistry>,
    poster: GradePoster,
}

impl LtiContext {
    /// LTI property from the session.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.session.property(name)
    }

    /// All LTI properties from the session.
    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, String> {
        self.session.properties()
    }

    /// `user_id` as provided by the consumer.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.property("user_id")
    }

    /// Best guess of a name to greet the user with.
    ///
    /// Sourced id, then primary email, then user id, else empty.
    #[must_use]
    pub fn name(&self) -> &str {
        ["lis_person_sourcedid", "lis_person_contact_email_primary", "user_id"]
            .iter()
            .find_map(|name| self.property(name))
            .unwrap_or_default()
    }

    /// OAuth consumer key of the launch.
    #[must_use]
    pub fn consumer_key(&self) -> Option<&str> {
        self.property("oauth_consumer_key")
    }

    /// Roles of the launch.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        self.session.roles()
    }

    /// Whether the user's roles satisfy a role class.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole` for unknown classes.
    pub fn is_role(&self, role_class: &str) -> LtiResult<bool> {
        roles::authorize(self.session.roles(), role_class)
    }

    /// `lis_result_sourcedid` for outcome calls.
    #[must_use]
    pub fn lis_result_sourcedid(&self) -> Option<&str> {
        self.property("lis_result_sourcedid")
    }

    /// Outcome service URL after the rewrite hook.
    #[must_use]
    pub fn response_url(&self) -> Option<String> {
        self.property("lis_outcome_service_url").map(|url| self.poster.rewrite_url(url))
    }

    /// Post `score` through the POX outcome service.
    ///
    /// `Ok(false)` for scores outside `[0, 1]`; nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns `MissingProperty` when the launch carried no outcome service,
    /// and `PostMessageFailed` when the consumer could not be reached or refused.
    pub async fn post_grade(&self, score: f64) -> LtiResult<bool> {
        if !outcome::is_valid_score(score) {
            return Ok(false);
        }
        let consumer = self.consumer()?;
        let sourcedid = self.require("lis_result_sourcedid")?;
        let url = self.require("lis_outcome_service_url")?;

        self.poster.post_grade_xml(consumer, sourcedid, score, url).await
    }

    /// Post `score` through the LIS v2 Result REST service.
    ///
    /// Defaults to the launching user when `user_id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `MissingProperty` when the launch carried no outcome service or
    /// user, and `PostMessageFailed` when the consumer could not be reached or refused.
    pub async fn post_grade_rest(
        &self,
        score: f64,
        user_id: Option<&str>,
        comment: &str,
    ) -> LtiResult<bool> {
        if !outcome::is_valid_score(score) {
            return Ok(false);
        }
        let consumer = self.consumer()?;
        let user_id = match user_id {
            Some(user_id) => user_id,
            None => self.require("user_id")?,
        };
        let url = self.require("lis_outcome_service_url")?;

        self.poster.post_grade_rest(consumer, user_id, score, comment, url).await
    }

    fn consumer(&self) -> LtiResult<&Consumer> {
        let key = self.require("oauth_consumer_key")?;
        self.registry
            .lookup(key)
            .ok_or_else(|| VerificationError::unknown_consumer(key).into())
    }

    fn require(&self, name: &'static str) -> LtiResult<&str> {
        self.property(name).ok_or(LtiError::MissingProperty(name))
    }
}

impl std::fmt::Debug for LtiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LtiContext")
            .field("user_id", &self.user_id())
            .field("consumer_key", &self.consumer_key())
            .field("roles", &self.roles())
            .finish()
    }
}
