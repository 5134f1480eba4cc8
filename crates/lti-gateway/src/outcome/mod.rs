//! Grade passback to the consumer.
//!
//! Two wire formats share the same OAuth signing:
//! - LTI 1.1 Basic Outcomes: POX envelope, `POST`, `application/xml`
//! - LTI 2.0 LIS Result service: JSON, `PUT`, `application/vnd.ims.lis.v2.result+json`
//!
//! Requests are signed with an `Authorization: OAuth` header that carries an
//! `oauth_body_hash` of the payload. No retries; each call is bounded by the
//! configured timeouts.

pub mod pox;
pub mod rewrite;

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};

use crate::config::Config;
use crate::consumer::Consumer;
use crate::error::{LtiError, LtiResult};
use crate::oauth::{self, SignatureMethod, encode::percent_encode, header::authorization_header};

pub use pox::OutcomeOperation;
pub use rewrite::{NoRewrite, PrefixRewrite, UrlRewrite};

/// Content type of LIS v2 Result bodies.
pub const LIS_RESULT_CONTENT_TYPE: &str = "application/vnd.ims.lis.v2.result+json";

/// JSON-LD context of LIS v2 Result bodies.
pub const LIS_RESULT_CONTEXT: &str = "http://purl.imsglobal.org/ctx/lis/v2/Result";

/// Largest outcome response body read from a consumer.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// True for scores a consumer may receive.
#[must_use]
pub fn is_valid_score(score: f64) -> bool {
    (0.0..=1.0).contains(&score)
}

/// Per-user LIS v2 result endpoint derived from the outcome service URL.
#[must_use]
pub fn rest_result_url(outcome_url: &str, user_id: &str) -> String {
    outcome_url.replace(
        "/grade_handler",
        &format!("/lti_2_0_result_rest_handler/user/{}", percent_encode(user_id)),
    )
}

/// Sends signed grade reports to consumers.
#[derive(Clone)]
pub struct GradePoster {
    client: Client,
    rewrite: Arc<dyn UrlRewrite>,
    message_identifier: String,
}

impl GradePoster {
    /// Create a poster from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        let rewrite: Arc<dyn UrlRewrite> = if config.url_rewrites.is_empty() {
            Arc::new(NoRewrite)
        } else {
            Arc::new(PrefixRewrite::new(config.url_rewrites.clone()))
        };

        Ok(Self {
            client,
            rewrite,
            message_identifier: config.message_identifier.clone(),
        })
    }

    /// Replace the outcome URL rewrite hook.
    #[must_use]
    pub fn with_rewrite(mut self, rewrite: impl UrlRewrite + 'static) -> Self {
        self.rewrite = Arc::new(rewrite);
        self
    }

    /// Apply the rewrite hook to a consumer-supplied URL.
    #[must_use]
    pub fn rewrite_url(&self, url: &str) -> String {
        self.rewrite.rewrite(url)
    }

    /// Report `score` for `sourcedid` with a POX `replaceResult` request.
    ///
    /// Returns `Ok(false)` without contacting the consumer when `score` is
    /// outside `[0, 1]`, and `Ok(true)` once the consumer accepted the score.
    ///
    /// # Errors
    ///
    /// Returns `PostMessageFailed` when the request cannot be delivered or the
    /// consumer does not answer with a success envelope.
    pub async fn post_grade_xml(
        &self,
        consumer: &Consumer,
        sourcedid: &str,
        score: f64,
        callback_url: &str,
    ) -> LtiResult<bool> {
        if !is_valid_score(score) {
            tracing::warn!(score, "Refusing to post out-of-range score");
            return Ok(false);
        }

        let body = pox::generate_request_xml(
            &self.message_identifier,
            OutcomeOperation::ReplaceResult,
            sourcedid,
            Some(score),
        );
        self.post_pox(consumer, body, callback_url).await?;

        tracing::info!(consumer_key = %consumer.key(), sourcedid, score, "Posted grade");
        Ok(true)
    }

    /// Remove the score for `sourcedid` with a POX `deleteResult` request.
    ///
    /// # Errors
    ///
    /// Returns `PostMessageFailed` when the request cannot be delivered or is refused.
    pub async fn post_delete_xml(
        &self,
        consumer: &Consumer,
        sourcedid: &str,
        callback_url: &str,
    ) -> LtiResult<bool> {
        let body = pox::generate_request_xml(
            &self.message_identifier,
            OutcomeOperation::DeleteResult,
            sourcedid,
            None,
        );
        self.post_pox(consumer, body, callback_url).await?;

        tracing::info!(consumer_key = %consumer.key(), sourcedid, "Deleted grade");
        Ok(true)
    }

    /// Report `score` for `user_id` through the LIS v2 Result REST service.
    ///
    /// `callback_url` is the LTI 1.1 outcome URL; its `/grade_handler`
    /// segment is swapped for the per-user result endpoint.
    ///
    /// # Errors
    ///
    /// Returns `PostMessageFailed` when the request cannot be delivered or the
    /// consumer does not answer `200 OK`.
    pub async fn post_grade_rest(
        &self,
        consumer: &Consumer,
        user_id: &str,
        score: f64,
        comment: &str,
        callback_url: &str,
    ) -> LtiResult<bool> {
        if !is_valid_score(score) {
            tracing::warn!(score, "Refusing to post out-of-range score");
            return Ok(false);
        }

        let url = rest_result_url(&self.rewrite_url(callback_url), user_id);
        let body = serde_json::to_string(&serde_json::json!({
            "@context": LIS_RESULT_CONTEXT,
            "@type": "Result",
            "resultScore": score,
            "comment": comment
        }))
        .map_err(|e| LtiError::post_failed(format!("failed to encode result: {e}")))?;

        let response =
            self.send_signed(consumer, Method::PUT, &url, body, LIS_RESULT_CONTENT_TYPE).await?;
        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(status = status.as_u16(), "Consumer refused LIS result");
            return Err(LtiError::post_failed(format!("consumer answered {status}")));
        }

        tracing::info!(consumer_key = %consumer.key(), user_id, score, "Posted LIS result");
        Ok(true)
    }

    async fn post_pox(
        &self,
        consumer: &Consumer,
        body: String,
        callback_url: &str,
    ) -> LtiResult<()> {
        let url = self.rewrite_url(callback_url);
        let response =
            self.send_signed(consumer, Method::POST, &url, body, pox::CONTENT_TYPE).await?;

        let status = response.status();
        let text = read_capped(response).await?;
        tracing::debug!(status = status.as_u16(), "Outcome service response received");

        if !status.is_success() || !pox::is_success_response(&text) {
            tracing::warn!(status = status.as_u16(), "Consumer refused outcome request");
            return Err(LtiError::post_failed(format!(
                "consumer did not acknowledge the outcome request ({status})"
            )));
        }
        Ok(())
    }

    async fn send_signed(
        &self,
        consumer: &Consumer,
        method: Method,
        url: &str,
        body: String,
        content_type: &str,
    ) -> LtiResult<reqwest::Response> {
        let mut params = oauth::oauth_parameters(consumer.key(), SignatureMethod::HmacSha1);
        params.insert("oauth_body_hash".to_string(), oauth::body_hash(body.as_bytes()));
        oauth::sign_request(consumer, method.as_str(), url, &mut params)
            .map_err(|e| LtiError::post_failed(format!("failed to sign request: {e}")))?;

        tracing::debug!(method = %method, url, "Sending signed outcome request");

        let response = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, authorization_header(&params))
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        Ok(response)
    }
}

/// Read a response body, failing once it exceeds [`MAX_RESPONSE_BYTES`].
async fn read_capped(mut response: reqwest::Response) -> LtiResult<String> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
            tracing::warn!(limit = MAX_RESPONSE_BYTES, "Outcome response too large");
            return Err(LtiError::post_failed("outcome response exceeds size limit"));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

impl std::fmt::Debug for GradePoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradePoster")
            .field("message_identifier", &self.message_identifier)
            .finish()
    }
}
