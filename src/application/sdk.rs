use std::{fmt, sync::Arc};

use crate::application::ports::{SdkError, SdkInstallRequest, SdkVersionManager};

pub const DEFAULT_SDK_PACKAGE: &str = "@paypal/smart-payment-buttons";

/// Non-empty SDK version ready to be embedded in markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkVersion(String);

impl SdkVersion {
    /// `None` for blank input.
    pub fn new(value: &str) -> Option<Self> {
        let value = value.trim();
        (!value.is_empty()).then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SdkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the live SDK version and makes sure it is installed.
#[derive(Clone)]
pub struct SdkVersionResolver {
    manager: Arc<dyn SdkVersionManager>,
    package: String,
}

impl SdkVersionResolver {
    pub fn new(manager: Arc<dyn SdkVersionManager>, package: impl Into<String>) -> Self {
        Self {
            manager,
            package: package.into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub async fn resolve(&self) -> Result<SdkVersion, SdkError> {
        let live = self.manager.live_version();
        let live = live.trim();
        if live.is_empty() {
            return Err(SdkError::NoLiveVersion {
                package: self.package.clone(),
            });
        }

        let installed = self
            .manager
            .get_or_install(SdkInstallRequest {
                package: self.package.clone(),
                version: live.to_string(),
            })
            .await?;

        SdkVersion::new(&installed).ok_or_else(|| SdkError::EmptyInstalledVersion {
            package: self.package.clone(),
        })
    }
}
