//! LTI 1.1 Basic Outcomes POX (Plain Old XML) envelopes.

/// Namespace of the IMS outcome messages.
pub const IMSX_NAMESPACE: &str = "http://www.imsglobal.org/services/ltiv1p1/xsd/imsoms_v1p0";

/// Content type for POX requests.
pub const CONTENT_TYPE: &str = "application/xml";

/// Marker of an accepted request in the consumer's response envelope.
const SUCCESS_MARKER: &str = "<imsx_codeMajor>success</imsx_codeMajor>";

/// Outcome service operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeOperation {
    /// Set the score for a sourcedid.
    ReplaceResult,
    /// Remove the score for a sourcedid.
    DeleteResult,
}

impl OutcomeOperation {
    /// Operation name as used in the request element (`<name>Request`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReplaceResult => "replaceResult",
            Self::DeleteResult => "deleteResult",
        }
    }
}

/// Render a score the way consumers expect: always with a decimal point.
#[must_use]
pub fn format_score(score: f64) -> String {
    let rendered = score.to_string();
    if rendered.contains('.') { rendered } else { format!("{rendered}.0") }
}

/// Build the request envelope. The `<result>` element is only emitted with a score.
#[must_use]
pub fn generate_request_xml(
    message_identifier: &str,
    operation: OutcomeOperation,
    sourcedid: &str,
    score: Option<f64>,
) -> String {
    let result = score
        .map(|score| {
            format!(
                "<result><resultScore><language>en</language><textString>{}</textString></resultScore></result>",
                format_score(score)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<imsx_POXEnvelopeRequest xmlns="{IMSX_NAMESPACE}"><imsx_POXHeader><imsx_POXRequestHeaderInfo><imsx_version>V1.0</imsx_version><imsx_messageIdentifier>{message_identifier}</imsx_messageIdentifier></imsx_POXRequestHeaderInfo></imsx_POXHeader><imsx_POXBody><{operation}Request><resultRecord><sourcedGUID><sourcedId>{sourcedid}</sourcedId></sourcedGUID>{result}</resultRecord></{operation}Request></imsx_POXBody></imsx_POXEnvelopeRequest>"#,
        message_identifier = xml_escape(message_identifier),
        operation = operation.as_str(),
        sourcedid = xml_escape(sourcedid),
    )
}

/// True when the consumer's response envelope reports success.
#[must_use]
pub fn is_success_response(body: &str) -> bool {
    body.contains(SUCCESS_MARKER)
}

/// Escape XML special characters.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
