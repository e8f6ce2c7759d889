//! Turns an [`AuthConfig`] into concrete header, query or transport changes.

use crate::constants::headers::AUTHORIZATION;
use crate::engine::spec::{header_present, ApiKeyLocation, AuthConfig, Credentials, RequestSpec};
use serde_json::Value;

/// Applies `auth` to `spec` and returns the resulting spec.
///
/// A caller-supplied `Authorization` header suppresses bearer and API-key
/// injection. Basic credentials go to the transport slot and are applied
/// regardless of existing headers.
pub fn inject_auth(spec: RequestSpec, auth: &AuthConfig) -> RequestSpec {
    match auth {
        AuthConfig::None => spec,
        AuthConfig::Basic { username, password } => {
            if username.is_empty() {
                return spec;
            }
            spec.with_credentials(Credentials {
                username: username.clone(),
                password: password.clone(),
            })
        }
        AuthConfig::Bearer { token } => {
            if token.is_empty() || header_present(&spec, AUTHORIZATION) {
                return spec;
            }
            spec.with_header(AUTHORIZATION, &format!("Bearer {}", token))
        }
        AuthConfig::ApiKey {
            key,
            value,
            location,
        } => {
            if key.is_empty() || value.is_empty() || header_present(&spec, AUTHORIZATION) {
                return spec;
            }
            match location {
                ApiKeyLocation::Header => spec.with_header(key, value),
                ApiKeyLocation::Query => spec.with_param(key, Value::String(value.clone())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spec::HttpMethod;
    use proptest::prelude::*;

    fn base() -> RequestSpec {
        RequestSpec::new("https://example.test/ok", HttpMethod::Get)
    }

    fn bearer(token: &str) -> AuthConfig {
        AuthConfig::Bearer {
            token: token.to_string(),
        }
    }

    fn apikey(key: &str, value: &str, location: ApiKeyLocation) -> AuthConfig {
        AuthConfig::ApiKey {
            key: key.to_string(),
            value: value.to_string(),
            location,
        }
    }

    #[test]
    fn bearer_writes_authorization_header() {
        let spec = inject_auth(base(), &bearer("abc"));
        assert_eq!(spec.headers.get("Authorization"), Some("Bearer abc"));
        assert!(spec.credentials.is_none());
    }

    #[test]
    fn empty_bearer_token_is_a_no_op() {
        assert_eq!(inject_auth(base(), &bearer("")), base());
    }

    #[test]
    fn apikey_in_query_lands_in_params_only() {
        let spec = inject_auth(base(), &apikey("api_key", "k1", ApiKeyLocation::Query));
        assert_eq!(spec.params.get("api_key"), Some(&Value::String("k1".into())));
        assert!(!spec.headers.contains("api_key"));
    }

    #[test]
    fn apikey_in_header_sets_named_header() {
        let spec = inject_auth(base(), &apikey("X-Api-Key", "k1", ApiKeyLocation::Header));
        assert_eq!(spec.headers.get("x-api-key"), Some("k1"));
        assert!(spec.params.is_empty());
    }

    #[test]
    fn apikey_requires_key_and_value() {
        assert_eq!(
            inject_auth(base(), &apikey("", "k1", ApiKeyLocation::Header)),
            base()
        );
        assert_eq!(
            inject_auth(base(), &apikey("X-Api-Key", "", ApiKeyLocation::Query)),
            base()
        );
    }

    #[test]
    fn basic_ignores_empty_username() {
        let auth = AuthConfig::Basic {
            username: String::new(),
            password: "pw".to_string(),
        };
        assert!(inject_auth(base(), &auth).credentials.is_none());
    }

    #[test]
    fn lowercase_authorization_header_also_suppresses_bearer() {
        let spec = base().with_header("authorization", "Token xyz");
        let out = inject_auth(spec.clone(), &bearer("abc"));
        assert_eq!(out, spec);
    }

    fn header_map() -> impl Strategy<Value = Vec<(String, String)>> {
        prop::collection::vec(("[A-Za-z][A-Za-z-]{0,12}", "[ -~]{0,16}"), 0..6)
    }

    proptest! {
        #[test]
        fn existing_authorization_blocks_bearer_and_apikey(
            headers in header_map(),
            auth_value in "[ -~]{1,24}",
            token in "[A-Za-z0-9]{1,16}",
            key in "[A-Za-z][A-Za-z-]{0,12}",
            value in "[A-Za-z0-9]{1,16}",
            in_query in any::<bool>(),
        ) {
            let mut spec = base();
            for (k, v) in &headers {
                spec = spec.with_header(k, v);
            }
            spec = spec.with_header("Authorization", &auth_value);
            let location = if in_query { ApiKeyLocation::Query } else { ApiKeyLocation::Header };

            prop_assert_eq!(inject_auth(spec.clone(), &bearer(&token)), spec.clone());
            prop_assert_eq!(inject_auth(spec.clone(), &apikey(&key, &value, location)), spec);
        }

        #[test]
        fn basic_credentials_survive_existing_authorization(
            username in "[A-Za-z0-9]{1,12}",
            password in "[ -~]{0,16}",
            preset in any::<bool>(),
        ) {
            let spec = if preset {
                base().with_header("Authorization", "Bearer other")
            } else {
                base()
            };
            let auth = AuthConfig::Basic { username: username.clone(), password: password.clone() };
            let out = inject_auth(spec.clone(), &auth);
            prop_assert_eq!(out.credentials, Some(Credentials { username, password }));
            prop_assert_eq!(out.headers, spec.headers);
        }
    }
}
