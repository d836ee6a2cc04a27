use serde::{Deserialize, Serialize};

/// Why a requester bypasses all rules, if it does
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Exemption {
    #[default]
    None,
    Administrator,
    LoggedIn,
    Role(String),
    Url(String),
    /// Decided by the caller for reasons of its own
    Caller,
}

impl Exemption {
    pub fn is_exempt(&self) -> bool {
        !matches!(self, Exemption::None)
    }
}

impl From<bool> for Exemption {
    fn from(exempt: bool) -> Self {
        if exempt {
            Exemption::Caller
        } else {
            Exemption::None
        }
    }
}

/// Who is asking, as far as the front end knows
#[derive(Debug, Clone, Default)]
pub struct RequesterContext {
    pub is_administrator: bool,
    pub is_logged_in: bool,
    pub roles: Vec<String>,
    pub request_path: Option<String>,
}

/// Which requesters bypass blocking entirely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExemptionPolicy {
    pub exempt_administrators: bool,
    pub exempt_logged_in: bool,
    pub exempted_roles: Vec<String>,
    /// Substrings of the request path
    pub exempted_urls: Vec<String>,
}

impl Default for ExemptionPolicy {
    fn default() -> Self {
        Self {
            exempt_administrators: true,
            exempt_logged_in: false,
            exempted_roles: Vec::new(),
            exempted_urls: Vec::new(),
        }
    }
}

impl ExemptionPolicy {
    pub fn evaluate(&self, requester: &RequesterContext) -> Exemption {
        if self.exempt_administrators && requester.is_administrator {
            return Exemption::Administrator;
        }

        if requester.is_logged_in {
            if self.exempt_logged_in {
                return Exemption::LoggedIn;
            }
            if let Some(role) = requester
                .roles
                .iter()
                .find(|role| self.exempted_roles.contains(role))
            {
                return Exemption::Role(role.clone());
            }
        }

        if let Some(path) = requester.request_path.as_deref() {
            if let Some(url) = self
                .exempted_urls
                .iter()
                .find(|url| !url.is_empty() && path.contains(url.as_str()))
            {
                return Exemption::Url(url.clone());
            }
        }

        Exemption::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bool() {
        assert!(Exemption::from(true).is_exempt());
        assert!(!Exemption::from(false).is_exempt());
    }

    #[test]
    fn test_administrators_exempt_by_default() {
        let policy = ExemptionPolicy::default();
        let admin = RequesterContext {
            is_administrator: true,
            is_logged_in: true,
            ..Default::default()
        };
        assert_eq!(policy.evaluate(&admin), Exemption::Administrator);

        let user = RequesterContext {
            is_logged_in: true,
            ..Default::default()
        };
        assert_eq!(policy.evaluate(&user), Exemption::None);
    }

    #[test]
    fn test_roles_require_login() {
        let policy = ExemptionPolicy {
            exempted_roles: vec!["editor".to_string()],
            ..Default::default()
        };
        let mut requester = RequesterContext {
            roles: vec!["editor".to_string()],
            ..Default::default()
        };
        assert_eq!(policy.evaluate(&requester), Exemption::None);

        requester.is_logged_in = true;
        assert_eq!(
            policy.evaluate(&requester),
            Exemption::Role("editor".to_string())
        );
    }

    #[test]
    fn test_url_substring() {
        let policy = ExemptionPolicy {
            exempted_urls: vec!["/contact".to_string(), String::new()],
            ..Default::default()
        };
        let requester = RequesterContext {
            request_path: Some("/en/contact?ref=1".to_string()),
            ..Default::default()
        };
        assert_eq!(
            policy.evaluate(&requester),
            Exemption::Url("/contact".to_string())
        );

        let requester = RequesterContext {
            request_path: Some("/shop".to_string()),
            ..Default::default()
        };
        assert_eq!(policy.evaluate(&requester), Exemption::None);
    }
}
