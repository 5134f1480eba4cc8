//! Role classes and role checks.
//!
//! Consumers send either the short LIS role names (`Instructor`) or the full
//! URNs (`urn:lti:role:ims/lis/Instructor`); both are listed per class.

use crate::error::{LtiError, LtiResult};

/// Role class that skips the role check entirely.
pub const ANY: &str = "any";

/// Role class → concrete LTI roles that satisfy it.
pub const ROLE_CLASSES: &[(&str, &[&str])] = &[
    (
        "staff",
        &[
            "Administrator",
            "Instructor",
            "urn:lti:instrole:ims/lis/Administrator",
            "urn:lti:role:ims/lis/Instructor",
            "urn:lti:instrole:ims/lis/Instructor",
        ],
    ),
    (
        "instructor",
        &["Instructor", "urn:lti:role:ims/lis/Instructor", "urn:lti:instrole:ims/lis/Instructor"],
    ),
    (
        "administrator",
        &[
            "Administrator",
            "urn:lti:instrole:ims/lis/Administrator",
            "urn:lti:role:ims/lis/Administrator",
        ],
    ),
    (
        "student",
        &["Student", "Learner", "urn:lti:role:ims/lis/Learner", "urn:lti:instrole:ims/lis/Student"],
    ),
];

/// Concrete roles of a class, `None` for unknown classes.
#[must_use]
pub fn role_class(name: &str) -> Option<&'static [&'static str]> {
    ROLE_CLASSES.iter().find(|(class, _)| *class == name).map(|(_, roles)| *roles)
}

/// Split a comma-separated `roles` launch parameter.
#[must_use]
pub fn parse_roles(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `roles` satisfy `required_role`.
///
/// # Errors
///
/// Returns `UnknownRole` when `required_role` is neither `any` nor a known class.
pub fn authorize(roles: &[String], required_role: &str) -> LtiResult<bool> {
    if required_role == ANY {
        return Ok(true);
    }

    let allowed = role_class(required_role).ok_or_else(|| LtiError::unknown_role(required_role))?;
    let granted = roles.iter().any(|role| allowed.contains(&role.as_str()));

    tracing::debug!(required_role, roles = ?roles, granted, "is_role");
    Ok(granted)
}

/// Like [`authorize`], but a refusal is an error.
///
/// # Errors
///
/// Returns `NotAuthorized` when the roles do not match and `UnknownRole` for
/// unknown classes.
pub fn require(roles: &[String], required_role: &str) -> LtiResult<()> {
    if authorize(roles, required_role)? {
        Ok(())
    } else {
        Err(LtiError::not_authorized(required_role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(list: &[&str]) -> Vec<String> {
        list.iter().map(|r| (*r).to_string()).collect()
    }

    #[test]
    fn test_any_always_passes() {
        assert!(authorize(&[], ANY).unwrap());
        assert!(authorize(&roles(&["Learner"]), ANY).unwrap());
    }

    #[test]
    fn test_instructor() {
        assert!(!authorize(&roles(&["Learner"]), "instructor").unwrap());
        assert!(authorize(&roles(&["Instructor"]), "instructor").unwrap());
        assert!(authorize(&roles(&["urn:lti:role:ims/lis/Instructor"]), "instructor").unwrap());
    }

    #[test]
    fn test_staff_includes_administrators() {
        assert!(authorize(&roles(&["Learner", "Administrator"]), "staff").unwrap());
        assert!(!authorize(&roles(&["Learner"]), "staff").unwrap());
    }

    #[test]
    fn test_unknown_role_class() {
        let err = authorize(&roles(&["Instructor"]), "janitor").unwrap_err();
        assert!(matches!(err, LtiError::UnknownRole(ref name) if name == "janitor"));
    }

    #[test]
    fn test_require() {
        let err = require(&roles(&["Learner"]), "instructor").unwrap_err();
        assert!(matches!(err, LtiError::NotAuthorized { .. }));
        assert!(require(&roles(&["Learner"]), "student").is_ok());
    }

    #[test]
    fn test_parse_roles() {
        assert_eq!(parse_roles(Some("Instructor, Learner,,")), roles(&["Instructor", "Learner"]));
        assert!(parse_roles(None).is_empty());
        assert!(parse_roles(Some("")).is_empty());
    }
}
