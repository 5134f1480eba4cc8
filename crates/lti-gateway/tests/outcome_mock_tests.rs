//! Grade passback tests against a mocked consumer outcome service.

use std::sync::Arc;

use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lti_gateway::oauth::{self, SignatureMethod};
use lti_gateway::outcome::MAX_RESPONSE_BYTES;
use lti_gateway::{
    Config, Consumer, ConsumerRegistry, GradePoster, LaunchRequest, LtiError, LtiGateway,
    LtiSession, RequestVerifier, Requirement,
};

const SUCCESS_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<imsx_POXEnvelopeResponse xmlns="http://www.imsglobal.org/services/ltiv1p1/xsd/imsoms_v1p0"><imsx_POXHeader><imsx_POXResponseHeaderInfo><imsx_version>V1.0</imsx_version><imsx_messageIdentifier>4560</imsx_messageIdentifier><imsx_statusInfo><imsx_codeMajor>success</imsx_codeMajor><imsx_severity>status</imsx_severity></imsx_statusInfo></imsx_POXResponseHeaderInfo></imsx_POXHeader><imsx_POXBody><replaceResultResponse/></imsx_POXBody></imsx_POXEnvelopeResponse>"#;

const FAILURE_RESPONSE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<imsx_POXEnvelopeResponse xmlns="http://www.imsglobal.org/services/ltiv1p1/xsd/imsoms_v1p0"><imsx_POXHeader><imsx_POXResponseHeaderInfo><imsx_statusInfo><imsx_codeMajor>failure</imsx_codeMajor><imsx_severity>error</imsx_severity></imsx_statusInfo></imsx_POXResponseHeaderInfo></imsx_POXHeader><imsx_POXBody/></imsx_POXEnvelopeResponse>"#;

fn demo_consumer() -> Consumer {
    Consumer::new("demo_key", "demo_secret")
}

fn poster() -> GradePoster {
    GradePoster::new(&Config::for_testing()).unwrap()
}

fn grade_url(mock_server: &MockServer) -> String {
    format!("{}/courses/c1/handler/grade_handler", mock_server.uri())
}

// =============================================================================
// POX replaceResult
// =============================================================================

#[tokio::test]
async fn test_post_grade_xml_accepted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/courses/c1/handler/grade_handler"))
        .and(header("content-type", "application/xml"))
        .and(header_exists("authorization"))
        .and(body_string_contains("<sourcedId>sid1</sourcedId>"))
        .and(body_string_contains("<textString>0.8</textString>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_RESPONSE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = grade_url(&mock_server);
    let accepted = poster().post_grade_xml(&demo_consumer(), "sid1", 0.8, &url).await.unwrap();
    assert!(accepted);
}

#[tokio::test]
async fn test_post_grade_xml_out_of_range_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_RESPONSE))
        .expect(0)
        .mount(&mock_server)
        .await;

    let poster = poster();
    let url = grade_url(&mock_server);
    assert!(!poster.post_grade_xml(&demo_consumer(), "sid1", 1.5, &url).await.unwrap());
    assert!(!poster.post_grade_xml(&demo_consumer(), "sid1", -0.1, &url).await.unwrap());
}

#[tokio::test]
async fn test_post_grade_xml_refused() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FAILURE_RESPONSE))
        .mount(&mock_server)
        .await;

    let url = grade_url(&mock_server);
    let result = poster().post_grade_xml(&demo_consumer(), "sid1", 0.5, &url).await;
    assert!(matches!(result, Err(LtiError::PostMessageFailed(_))));
}

#[tokio::test]
async fn test_post_grade_xml_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let url = grade_url(&mock_server);
    let result = poster().post_grade_xml(&demo_consumer(), "sid1", 0.5, &url).await;
    assert!(matches!(result, Err(LtiError::PostMessageFailed(_))));
}

#[tokio::test]
async fn test_post_grade_xml_oversized_response() {
    let mock_server = MockServer::start().await;

    let padded = format!("{SUCCESS_RESPONSE}{}", " ".repeat(MAX_RESPONSE_BYTES));
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(padded))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = grade_url(&mock_server);
    let result = poster().post_grade_xml(&demo_consumer(), "sid1", 0.5, &url).await;
    assert!(matches!(result, Err(LtiError::PostMessageFailed(_))));
}

#[tokio::test]
async fn test_outbound_request_is_signed_with_body_hash() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_RESPONSE))
        .mount(&mock_server)
        .await;

    let url = grade_url(&mock_server);
    poster().post_grade_xml(&demo_consumer(), "sid1", 1.0, &url).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let authorization = request.headers.get("authorization").unwrap().to_str().unwrap();
    assert!(authorization.starts_with("OAuth realm=\"\""));

    let params = oauth::header::parse_authorization(authorization).unwrap();
    assert_eq!(params["oauth_body_hash"], oauth::body_hash(&request.body));
    assert_eq!(params["oauth_signature_method"], "HMAC-SHA1");

    // The consumer can verify the request with the shared secret.
    let registry: ConsumerRegistry = [demo_consumer()].into_iter().collect();
    let inbound = LaunchRequest::new("POST", url).with_header("authorization", authorization);
    let outcome = lti_gateway::verify::verify(&registry, &inbound).unwrap();
    assert_eq!(outcome.consumer_key, "demo_key");
}

#[tokio::test]
async fn test_post_delete_xml() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("<deleteResultRequest>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_RESPONSE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let deleted =
        poster().post_delete_xml(&demo_consumer(), "sid1", &grade_url(&mock_server)).await.unwrap();
    assert!(deleted);
}

#[tokio::test]
async fn test_rewrite_hook_redirects_outcome_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/courses/c1/handler/grade_handler"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_RESPONSE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let target = mock_server.uri();
    let poster =
        poster().with_rewrite(move |url: &str| url.replace("https://lms.invalid", &target));

    let url = "https://lms.invalid/courses/c1/handler/grade_handler";
    let accepted = poster.post_grade_xml(&demo_consumer(), "sid1", 0.3, url).await.unwrap();
    assert!(accepted);
}

// =============================================================================
// LIS v2 REST
// =============================================================================

#[tokio::test]
async fn test_post_grade_rest_accepted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/courses/c1/handler/lti_2_0_result_rest_handler/user/u1"))
        .and(header("content-type", "application/vnd.ims.lis.v2.result+json"))
        .and(body_string_contains("\"resultScore\":0.5"))
        .and(body_string_contains("\"@type\":\"Result\""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let accepted = poster()
        .post_grade_rest(&demo_consumer(), "u1", 0.5, "well done", &grade_url(&mock_server))
        .await
        .unwrap();
    assert!(accepted);
}

#[tokio::test]
async fn test_post_grade_rest_requires_ok() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let result =
        poster().post_grade_rest(&demo_consumer(), "u1", 0.5, "", &grade_url(&mock_server)).await;
    assert!(matches!(result, Err(LtiError::PostMessageFailed(_))));
}

// =============================================================================
// Through the gateway context
// =============================================================================

#[tokio::test]
async fn test_context_posts_grade_from_launch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("<sourcedId>sid1</sourcedId>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_RESPONSE))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/courses/c1/handler/lti_2_0_result_rest_handler/user/u1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let registry: ConsumerRegistry = [demo_consumer()].into_iter().collect();
    let gateway = LtiGateway::new(Arc::new(registry), RequestVerifier::default(), poster());

    let launch_url = "https://tool.example/launch";
    let mut params = oauth::oauth_parameters("demo_key", SignatureMethod::HmacSha1);
    params.insert("user_id".to_string(), "u1".to_string());
    params.insert("roles".to_string(), "Learner".to_string());
    params.insert("lis_result_sourcedid".to_string(), "sid1".to_string());
    params.insert("lis_outcome_service_url".to_string(), grade_url(&mock_server));
    oauth::sign_request(&demo_consumer(), "POST", launch_url, &mut params).unwrap();

    let mut session = LtiSession::new();
    let ctx = gateway
        .authorize(&Requirement::initial(), &LaunchRequest::post(launch_url, params), &mut session)
        .unwrap();

    assert!(ctx.post_grade(0.8).await.unwrap());
    assert!(ctx.post_grade_rest(0.8, None, "").await.unwrap());
    assert!(!ctx.post_grade(2.0).await.unwrap());
}
