//! Request model consumed by the native renderers.

use serde::{Deserialize, Serialize};

use crate::domain::{error::DomainError, types::CheckoutEnv};

const DEFAULT_LANG: &str = "en";
const DEFAULT_COUNTRY: &str = "US";

/// Raw query string parameters, exactly as the button sends them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NativeRenderQuery {
    #[serde(rename = "parentDomain")]
    pub parent_domain: Option<String>,
    pub env: Option<String>,
    #[serde(rename = "clientID")]
    pub client_id: Option<String>,
    #[serde(rename = "sessionID")]
    pub session_id: Option<String>,
    #[serde(rename = "buttonSessionID")]
    pub button_session_id: Option<String>,
    #[serde(rename = "sdkCorrelationID")]
    pub sdk_correlation_id: Option<String>,
    #[serde(rename = "locale.lang")]
    pub locale_lang: Option<String>,
    #[serde(rename = "locale.country")]
    pub locale_country: Option<String>,
    pub debug: Option<String>,
}

impl NativeRenderQuery {
    pub fn with_parent_domain(parent_domain: impl Into<String>) -> Self {
        Self {
            parent_domain: Some(parent_domain.into()),
            ..Self::default()
        }
    }
}

/// One incoming render call. Immutable once built by the transport.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub query: NativeRenderQuery,
    pub request_id: Option<String>,
}

impl RenderRequest {
    pub fn new(query: NativeRenderQuery) -> Self {
        Self {
            query,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn parent_domain(&self) -> Option<&str> {
        self.query.parent_domain.as_deref()
    }

    /// Parse the optional parameters. Unrecognised values fall back to their
    /// defaults and are reported in [`ParsedOptions::ignored`].
    pub fn options(&self) -> ParsedOptions {
        let query = &self.query;
        let mut ignored = Vec::new();

        let env = match non_blank(query.env.as_deref()) {
            None => CheckoutEnv::default(),
            Some(value) => value.parse().unwrap_or_else(|err| {
                ignored.push(err);
                CheckoutEnv::default()
            }),
        };

        let lang = locale_part(
            "locale.lang",
            query.locale_lang.as_deref(),
            DEFAULT_LANG,
            |b| b.is_ascii_alphabetic(),
            &mut ignored,
        )
        .to_ascii_lowercase();
        let country = locale_part(
            "locale.country",
            query.locale_country.as_deref(),
            DEFAULT_COUNTRY,
            |b| b.is_ascii_alphanumeric(),
            &mut ignored,
        )
        .to_ascii_uppercase();

        let debug = match non_blank(query.debug.as_deref()) {
            None | Some("false" | "0") => false,
            Some("true" | "1") => true,
            Some(other) => {
                ignored.push(DomainError::invalid_parameter("debug", other));
                false
            }
        };

        ParsedOptions {
            options: RenderOptions {
                env,
                client_id: owned(query.client_id.as_deref()),
                session_id: owned(query.session_id.as_deref()),
                button_session_id: owned(query.button_session_id.as_deref()),
                sdk_correlation_id: owned(query.sdk_correlation_id.as_deref()),
                locale: Locale { lang, country },
                debug,
            },
            ignored,
        }
    }
}

/// Options plus the parameters that were dropped in favour of defaults.
#[derive(Debug, Clone)]
pub struct ParsedOptions {
    pub options: RenderOptions,
    pub ignored: Vec<DomainError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Locale {
    pub lang: String,
    pub country: String,
}

/// Validated optional parameters of a render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub env: CheckoutEnv,
    pub client_id: Option<String>,
    pub session_id: Option<String>,
    pub button_session_id: Option<String>,
    pub sdk_correlation_id: Option<String>,
    pub locale: Locale,
    pub debug: bool,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn owned(value: Option<&str>) -> Option<String> {
    non_blank(value).map(str::to_string)
}

fn locale_part<'a>(
    name: &'static str,
    value: Option<&'a str>,
    default: &'a str,
    allowed: fn(u8) -> bool,
    ignored: &mut Vec<DomainError>,
) -> &'a str {
    match non_blank(value) {
        None => default,
        Some(part) if part.len() == 2 && part.bytes().all(allowed) => part,
        Some(part) => {
            ignored.push(DomainError::invalid_parameter(name, part));
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_parent_domain_is_sent() {
        let request = RenderRequest::new(NativeRenderQuery::with_parent_domain("foo.paypal.com"));
        let ParsedOptions { options, ignored } = request.options();

        assert_eq!(options.env, CheckoutEnv::Production);
        assert_eq!(options.locale.lang, "en");
        assert_eq!(options.locale.country, "US");
        assert!(!options.debug);
        assert_eq!(options.client_id, None);
        assert!(ignored.is_empty());
    }

    #[test]
    fn locale_is_normalized() {
        let mut query = NativeRenderQuery::with_parent_domain("foo.paypal.com");
        query.locale_lang = Some("DE".into());
        query.locale_country = Some("de".into());
        let parsed = RenderRequest::new(query).options();
        assert_eq!(
            parsed.options.locale,
            Locale {
                lang: "de".into(),
                country: "DE".into()
            }
        );
        assert!(parsed.ignored.is_empty());
    }

    #[test]
    fn alphanumeric_country_codes_are_kept() {
        let mut query = NativeRenderQuery::with_parent_domain("foo.paypal.com");
        query.locale_lang = Some("zh".into());
        query.locale_country = Some("c2".into());
        let parsed = RenderRequest::new(query).options();

        assert_eq!(parsed.options.locale.country, "C2");
        assert!(parsed.ignored.is_empty());
    }

    #[test]
    fn malformed_locale_falls_back_to_default() {
        let mut query = NativeRenderQuery::with_parent_domain("foo.paypal.com");
        query.locale_lang = Some("<script>".into());
        let parsed = RenderRequest::new(query).options();

        assert_eq!(parsed.options.locale.lang, DEFAULT_LANG);
        assert_eq!(
            parsed.ignored,
            vec![DomainError::invalid_parameter("locale.lang", "<script>")]
        );
    }

    #[test]
    fn unknown_env_and_debug_values_fall_back_to_defaults() {
        let mut query = NativeRenderQuery::with_parent_domain("foo.paypal.com");
        query.env = Some("qa".into());
        query.debug = Some("yes".into());
        let parsed = RenderRequest::new(query.clone()).options();
        assert_eq!(parsed.options.env, CheckoutEnv::Production);
        assert!(!parsed.options.debug);
        assert_eq!(parsed.ignored.len(), 2);

        query.env = Some("sandbox".into());
        query.debug = Some("1".into());
        let parsed = RenderRequest::new(query).options();
        assert_eq!(parsed.options.env, CheckoutEnv::Sandbox);
        assert!(parsed.options.debug);
        assert!(parsed.ignored.is_empty());
    }
}
