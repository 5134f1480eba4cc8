//! Gateway scenarios: launch, session continuation and role gates.

use std::collections::BTreeMap;
use std::sync::Arc;

use lti_gateway::oauth::{self, SignatureMethod};
use lti_gateway::{
    Config, Consumer, ConsumerRegistry, GradePoster, LaunchRequest, LtiError, LtiGateway,
    LtiSession, RejectionKind, RequestVerifier, Requirement, VerificationError,
};

const LAUNCH_URL: &str = "https://tool.example/launch";

fn demo_consumer() -> Consumer {
    Consumer::new("demo_key", "demo_secret")
}

fn gateway() -> LtiGateway {
    let registry: ConsumerRegistry = [demo_consumer()].into_iter().collect();
    let poster = GradePoster::new(&Config::for_testing()).unwrap();
    LtiGateway::new(Arc::new(registry), RequestVerifier::default(), poster)
}

fn launch_params(roles: &str) -> BTreeMap<String, String> {
    let mut params = oauth::oauth_parameters("demo_key", SignatureMethod::HmacSha1);
    for (name, value) in [
        ("user_id", "u1"),
        ("roles", roles),
        ("lis_result_sourcedid", "sid1"),
        ("lis_outcome_service_url", "https://lms.example/grade"),
        ("lti_message_type", "basic-lti-launch-request"),
    ] {
        params.insert(name.to_string(), value.to_string());
    }
    params
}

fn signed_launch(roles: &str) -> LaunchRequest {
    let mut params = launch_params(roles);
    oauth::sign_request(&demo_consumer(), "POST", LAUNCH_URL, &mut params).unwrap();
    LaunchRequest::post(LAUNCH_URL, params)
}

// =============================================================================
// Launch and session
// =============================================================================

#[test]
fn test_instructor_launch_then_session_request() {
    let gateway = gateway();
    let mut session = LtiSession::new();

    let ctx = gateway
        .authorize(&Requirement::initial(), &signed_launch("Instructor"), &mut session)
        .unwrap();
    assert!(session.is_authenticated());
    assert_eq!(session.roles(), ["Instructor".to_string()]);
    assert_eq!(ctx.lis_result_sourcedid(), Some("sid1"));
    assert_eq!(ctx.response_url().as_deref(), Some("https://lms.example/grade"));

    let follow_up = LaunchRequest::get("https://tool.example/instructor");
    let granted = gateway.guard(
        &Requirement::session().with_role("instructor"),
        &follow_up,
        &mut session,
        |ctx| ctx.user_id().map(str::to_string),
    );
    assert_eq!(granted, Ok(Some("u1".to_string())));
}

#[test]
fn test_session_keeps_only_allow_listed_properties() {
    let gateway = gateway();
    let mut session = LtiSession::new();
    gateway.authorize(&Requirement::initial(), &signed_launch("Learner"), &mut session).unwrap();

    assert_eq!(session.property("user_id"), Some("u1"));
    assert_eq!(session.property("oauth_consumer_key"), Some("demo_key"));
    assert_eq!(session.property("lti_message_type"), None);
    assert_eq!(session.property("oauth_signature"), None);
    assert_eq!(session.property("oauth_timestamp"), None);
}

#[test]
fn test_second_launch_replaces_session() {
    let gateway = gateway();
    let mut session = LtiSession::new();
    gateway.authorize(&Requirement::initial(), &signed_launch("Instructor"), &mut session).unwrap();
    gateway.authorize(&Requirement::initial(), &signed_launch("Learner"), &mut session).unwrap();

    assert_eq!(session.roles(), ["Learner".to_string()]);
    let err = gateway
        .authorize(
            &Requirement::session().with_role("instructor"),
            &LaunchRequest::get("https://tool.example/instructor"),
            &mut session,
        )
        .unwrap_err();
    assert!(matches!(err, LtiError::NotAuthorized { .. }));
}

#[test]
fn test_unknown_consumer() {
    let gateway = gateway();
    let mut session = LtiSession::new();

    let mut params = oauth::oauth_parameters("stranger", SignatureMethod::HmacSha1);
    params.insert("user_id".to_string(), "u1".to_string());
    oauth::sign_request(&Consumer::new("stranger", "x"), "POST", LAUNCH_URL, &mut params).unwrap();

    let err = gateway
        .authorize(&Requirement::initial(), &LaunchRequest::post(LAUNCH_URL, params), &mut session)
        .unwrap_err();
    assert!(matches!(
        err,
        LtiError::Verification(VerificationError::UnknownConsumer { ref key }) if key == "stranger"
    ));
}

#[test]
fn test_session_request_without_session_is_rejected() {
    let gateway = gateway();
    let mut session = LtiSession::new();
    let mut calls = 0;

    let result = gateway.guard(
        &Requirement::session(),
        &LaunchRequest::get("https://tool.example/staff").with_parameter("user_id", "u1"),
        &mut session,
        |_ctx| calls += 1,
    );

    assert_eq!(calls, 0);
    assert_eq!(result.unwrap_err().kind, RejectionKind::Unauthenticated);
    assert!(!session.is_authenticated());
}

#[test]
fn test_session_request_with_bad_signature_purges() {
    let gateway = gateway();
    let mut session = LtiSession::new();
    gateway.authorize(&Requirement::initial(), &signed_launch("Instructor"), &mut session).unwrap();

    let tampered = signed_launch("Instructor").with_parameter("roles", "Administrator");
    let rejection = gateway
        .guard(&Requirement::initial(), &tampered, &mut session, |_| ())
        .unwrap_err();

    assert_eq!(rejection.kind, RejectionKind::Unauthenticated);
    assert!(rejection.message.contains("signature"));
    assert!(!session.is_authenticated());
    assert!(session.properties().is_empty());
}

// =============================================================================
// Roles
// =============================================================================

#[test]
fn test_role_table() {
    let gateway = gateway();
    let cases = [
        ("Instructor", "instructor", true),
        ("Instructor", "staff", true),
        ("Instructor", "student", false),
        ("Learner", "student", true),
        ("Learner", "instructor", false),
        ("urn:lti:role:ims/lis/Instructor", "instructor", true),
        ("urn:lti:instrole:ims/lis/Administrator", "administrator", true),
        ("Administrator", "staff", true),
        ("", "any", true),
    ];

    for (roles, required, expected) in cases {
        let mut session = LtiSession::new();
        let result = gateway.authorize(
            &Requirement::initial().with_role(required),
            &signed_launch(roles),
            &mut session,
        );
        assert_eq!(result.is_ok(), expected, "roles={roles:?} required={required}");
    }
}

#[test]
fn test_authorization_header_launch() {
    let gateway = gateway();
    let mut session = LtiSession::new();

    let mut params = launch_params("Learner");
    oauth::sign_request(&demo_consumer(), "POST", LAUNCH_URL, &mut params).unwrap();
    let header = oauth::header::authorization_header(&params);
    let body: BTreeMap<String, String> =
        params.into_iter().filter(|(name, _)| !name.starts_with("oauth_")).collect();

    let request = LaunchRequest::post(LAUNCH_URL, body).with_header("Authorization", header);
    let ctx = gateway.authorize(&Requirement::initial(), &request, &mut session).unwrap();
    assert_eq!(ctx.consumer_key(), Some("demo_key"));
}

#[test]
fn test_forwarded_proto_launch() {
    let gateway = gateway();
    let mut session = LtiSession::new();

    let mut params = launch_params("Learner");
    oauth::sign_request(&demo_consumer(), "POST", LAUNCH_URL, &mut params).unwrap();

    let behind_proxy = LaunchRequest::post("http://tool.example/launch", params.clone());
    assert!(gateway.authorize(&Requirement::initial(), &behind_proxy, &mut session).is_err());

    let forwarded = LaunchRequest::post("http://tool.example/launch", params)
        .with_header("X-Forwarded-Proto", "https");
    assert!(gateway.authorize(&Requirement::initial(), &forwarded, &mut session).is_ok());
}
