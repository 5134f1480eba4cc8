//! Per-user LTI session state.
//!
//! The host owns storage; this type only defines what an authenticated LTI
//! session contains and how it changes when a launch succeeds or fails.

use std::collections::BTreeMap;

use crate::verify::LaunchOutcome;

/// Launch parameters that are copied into the session.
pub const LTI_PROPERTY_LIST: &[&str] = &[
    "oauth_consumer_key",
    "launch_presentation_return_url",
    "user_id",
    "oauth_nonce",
    "context_label",
    "context_id",
    "resource_link_title",
    "resource_link_id",
    "lis_person_contact_email_primary",
    "lis_person_contact_emailprimary",
    "lis_person_name_full",
    "lis_person_name_family",
    "lis_person_name_given",
    "lis_result_sourcedid",
    "lis_person_sourcedid",
    "launch_type",
    "lti_message",
    "lti_version",
    "roles",
    "lis_outcome_service_url",
];

/// True if `name` may be stored in a session.
#[must_use]
pub fn is_lti_property(name: &str) -> bool {
    LTI_PROPERTY_LIST.contains(&name)
}

/// LTI portion of a user session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LtiSession {
    authenticated: bool,
    properties: BTreeMap<String, String>,
    roles: Vec<String>,
}

impl LtiSession {
    /// Empty, unauthenticated session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a launch has been verified for this session.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Stored LTI property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// All stored LTI properties.
    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Roles from the last verified launch.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Replace the session contents with a verified launch.
    ///
    /// Only allow-listed, non-empty parameters are kept.
    pub fn establish(&mut self, outcome: &LaunchOutcome) {
        self.properties = outcome
            .parameters
            .iter()
            .filter(|(name, value)| is_lti_property(name) && !value.is_empty())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        self.roles.clone_from(&outcome.roles);
        self.authenticated = true;
    }

    /// Drop every LTI property and mark the session unauthenticated.
    pub fn purge(&mut self) {
        self.properties.clear();
        self.roles.clear();
        self.authenticated = false;
    }
}
