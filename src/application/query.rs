//! Queries sent to the button configuration backend.

use serde_json::{Value, json};

use crate::{
    application::request::RenderOptions,
    domain::types::{FundingSource, RenderMode},
};

pub const NATIVE_POPUP_QUERY: &str = r#"
query GetNativePopupConfig(
    $clientID: String
    $fundingSource: FundingSourceType!
    $env: String!
    $locale: LocaleInput!
) {
    nativePopup(clientID: $clientID, fundingSource: $fundingSource, env: $env, locale: $locale) {
        eligible
        appSwitch
        redirectUrl
    }
}
"#;

pub const NATIVE_FALLBACK_QUERY: &str = r#"
query GetNativeFallbackConfig(
    $clientID: String
    $fundingSource: FundingSourceType!
    $env: String!
    $locale: LocaleInput!
) {
    nativeFallback(clientID: $clientID, fundingSource: $fundingSource, env: $env, locale: $locale) {
        fallbackUrl
        buttonLabel
    }
}
"#;

pub fn query_for(mode: RenderMode) -> &'static str {
    match mode {
        RenderMode::Popup => NATIVE_POPUP_QUERY,
        RenderMode::Fallback => NATIVE_FALLBACK_QUERY,
    }
}

pub fn variables_for(funding_source: FundingSource, options: &RenderOptions) -> Value {
    json!({
        "clientID": options.client_id,
        "fundingSource": funding_source.as_str(),
        "env": options.env.as_str(),
        "locale": options.locale,
    })
}
