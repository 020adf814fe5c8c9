//! SDK version manager backed by a local package cache.
//!
//! Layout: `{cache_dir}/{package}/{version}/{bundle}`. A version counts as
//! installed once its directory exists; installs download every bundle into
//! a staging directory and rename it into place so readers never observe a
//! partial install.

use std::{
    cmp::Ordering,
    path::{Component, Path, PathBuf},
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use reqwest::Client;
use tokio::{fs, sync::OnceCell};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    application::ports::{SdkError, SdkInstallRequest, SdkVersionManager},
    domain::types::RenderMode,
};

use super::error::InfraError;

const BUNDLE_MODES: [RenderMode; 2] = [RenderMode::Popup, RenderMode::Fallback];
const INSTALL_RETRY_BACKOFF: Duration = Duration::from_secs(30);

type InstallCell = Arc<OnceCell<Result<(), String>>>;

pub struct PackageCacheVersionManager {
    cache_dir: PathBuf,
    package: String,
    pinned: Option<String>,
    cdn_base: Url,
    http: Client,
    live: RwLock<String>,
    installed: DashSet<String>,
    in_flight: DashMap<String, InstallCell>,
    failures: DashMap<String, (Instant, String)>,
}

impl PackageCacheVersionManager {
    pub async fn open(
        cache_dir: PathBuf,
        package: String,
        pinned: Option<String>,
        cdn_base: Url,
        install_timeout: Duration,
    ) -> Result<Self, InfraError> {
        let http = Client::builder()
            .timeout(install_timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("sdk installer: {err}")))?;

        let manager = Self {
            cache_dir,
            package,
            pinned,
            cdn_base,
            http,
            live: RwLock::new(String::new()),
            installed: DashSet::new(),
            in_flight: DashMap::new(),
            failures: DashMap::new(),
        };
        manager.refresh().await?;
        Ok(manager)
    }

    /// Re-read the cache and recompute the live version.
    pub async fn refresh(&self) -> Result<String, InfraError> {
        let root = package_dir(&self.cache_dir, &self.package).ok_or_else(|| {
            InfraError::configuration(format!("invalid sdk package `{}`", self.package))
        })?;

        let versions = installed_versions(&root).await?;
        for version in &versions {
            self.installed.insert(version.clone());
        }

        let live = match &self.pinned {
            Some(pinned) => pinned.clone(),
            None => versions
                .into_iter()
                .max_by(|a, b| compare_versions(a, b))
                .unwrap_or_default(),
        };

        if let Ok(mut current) = self.live.write() {
            if *current != live {
                info!(
                    target = "native::sdk",
                    package = %self.package,
                    live = %live,
                    "live sdk version changed"
                );
            }
            *current = live.clone();
        }

        Ok(live)
    }

    /// Run at most one install per version; concurrent callers share its result.
    async fn install_once(&self, version: &str) -> Result<(), String> {
        if let Some(reason) = self.recent_failure(version) {
            return Err(reason);
        }

        let cell = Arc::clone(&self.in_flight.entry(version.to_string()).or_default());
        let result = cell.get_or_init(|| self.install(version)).await.clone();

        match &result {
            Ok(()) => {
                self.installed.insert(version.to_string());
                self.failures.remove(version);
            }
            Err(reason) => {
                self.failures
                    .insert(version.to_string(), (Instant::now(), reason.clone()));
            }
        }
        self.in_flight
            .remove_if(version, |_, current| Arc::ptr_eq(current, &cell));

        result
    }

    fn recent_failure(&self, version: &str) -> Option<String> {
        let entry = self.failures.get(version)?;
        let (failed_at, reason) = entry.value();
        (failed_at.elapsed() < INSTALL_RETRY_BACKOFF).then(|| reason.clone())
    }

    async fn install(&self, version: &str) -> Result<(), String> {
        let root = package_dir(&self.cache_dir, &self.package)
            .ok_or_else(|| "invalid package name".to_string())?;
        let target = root.join(version);
        if fs::try_exists(&target).await.unwrap_or(false) {
            return Ok(());
        }

        let staging = root.join(format!(".{version}.{}.partial", Uuid::new_v4()));
        fs::create_dir_all(&staging)
            .await
            .map_err(|err| format!("create staging dir: {err}"))?;

        let result = self.download_bundles(version, &staging).await;
        let result = match result {
            Ok(()) => match fs::rename(&staging, &target).await {
                Ok(()) => Ok(()),
                Err(_) if fs::try_exists(&target).await.unwrap_or(false) => Ok(()),
                Err(err) => Err(format!("move into place: {err}")),
            },
            Err(err) => Err(err),
        };

        if fs::try_exists(&staging).await.unwrap_or(false) {
            let _ = fs::remove_dir_all(&staging).await;
        }
        result
    }

    async fn download_bundles(&self, version: &str, staging: &Path) -> Result<(), String> {
        for mode in BUNDLE_MODES {
            let url = bundle_url(&self.cdn_base, version, mode.bundle_file());
            let response = self
                .http
                .get(url.as_str())
                .send()
                .await
                .map_err(|err| format!("download {url}: {err}"))?;
            if !response.status().is_success() {
                return Err(format!("download {url}: status {}", response.status()));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|err| format!("download {url}: {err}"))?;
            fs::write(staging.join(mode.bundle_file()), &bytes)
                .await
                .map_err(|err| format!("write {}: {err}", mode.bundle_file()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl SdkVersionManager for PackageCacheVersionManager {
    fn live_version(&self) -> String {
        self.live
            .read()
            .map(|live| live.clone())
            .unwrap_or_default()
    }

    async fn get_or_install(&self, request: SdkInstallRequest) -> Result<String, SdkError> {
        let SdkInstallRequest { package, version } = request;
        let failure = |reason: String| SdkError::Install {
            package: package.clone(),
            version: version.clone(),
            reason,
        };

        if package != self.package {
            return Err(failure(format!("cache serves `{}` only", self.package)));
        }
        if !is_safe_version(&version) {
            return Err(failure("version contains unsupported characters".into()));
        }
        if self.installed.contains(&version) {
            return Ok(version);
        }

        info!(
            target = "native::sdk",
            package = %package,
            version = %version,
            "installing sdk version"
        );
        if let Err(reason) = self.install_once(&version).await {
            warn!(
                target = "native::sdk",
                package = %package,
                version = %version,
                reason = %reason,
                "sdk install failed"
            );
            return Err(failure(reason));
        }

        Ok(version)
    }
}

fn package_dir(cache_dir: &Path, package: &str) -> Option<PathBuf> {
    let relative = Path::new(package);
    let mut components = relative.components().peekable();
    components.peek()?;
    if !components.all(|component| matches!(component, Component::Normal(_))) {
        return None;
    }
    Some(cache_dir.join(relative))
}

async fn installed_versions(root: &Path) -> Result<Vec<String>, InfraError> {
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut versions = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        match entry.file_name().to_str() {
            Some(name) if is_safe_version(name) => versions.push(name.to_string()),
            _ => {}
        }
    }
    Ok(versions)
}

fn bundle_url(cdn_base: &Url, version: &str, file: &str) -> String {
    format!(
        "{}/{}/{}",
        cdn_base.as_str().trim_end_matches('/'),
        version,
        file
    )
}

fn is_safe_version(version: &str) -> bool {
    !version.is_empty()
        && !version.starts_with('.')
        && version
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'+'))
}

/// Order dotted versions numerically where both sides are numeric.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split(['.', '-', '+']);
    let mut right = b.split(['.', '-', '+']);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use axum::{Router, http::StatusCode, routing::get};

    const PACKAGE: &str = "@paypal/smart-payment-buttons";

    fn cdn() -> Url {
        Url::parse("http://127.0.0.1:9/unreachable").expect("url")
    }

    async fn manager(dir: &Path, pinned: Option<&str>) -> PackageCacheVersionManager {
        PackageCacheVersionManager::open(
            dir.to_path_buf(),
            PACKAGE.to_string(),
            pinned.map(str::to_string),
            cdn(),
            Duration::from_secs(1),
        )
        .await
        .expect("manager")
    }

    /// Local CDN counting bundle downloads.
    async fn counting_cdn(delay: Duration, status: StatusCode) -> (Url, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/{version}/{file}",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, AtomicOrdering::SeqCst);
                    tokio::time::sleep(delay).await;
                    (status, "bundle")
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind cdn");
        let addr = listener.local_addr().expect("cdn addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("cdn serve");
        });
        (Url::parse(&format!("http://{addr}/")).expect("url"), hits)
    }

    async fn manager_with_cdn(dir: &Path, cdn: Url) -> PackageCacheVersionManager {
        PackageCacheVersionManager::open(
            dir.to_path_buf(),
            PACKAGE.to_string(),
            Some("6.0.0".to_string()),
            cdn,
            Duration::from_secs(5),
        )
        .await
        .expect("manager")
    }

    fn install_request(version: &str) -> SdkInstallRequest {
        SdkInstallRequest {
            package: PACKAGE.into(),
            version: version.into(),
        }
    }

    fn install_fixture(dir: &Path, version: &str) {
        std::fs::create_dir_all(dir.join(PACKAGE).join(version)).expect("fixture");
    }

    #[test]
    fn versions_compare_numerically() {
        assert_eq!(compare_versions("5.0.100", "5.0.99"), Ordering::Greater);
        assert_eq!(compare_versions("5.0.100", "5.0.100"), Ordering::Equal);
        assert_eq!(compare_versions("5.1", "5.1.0"), Ordering::Less);
        assert_eq!(compare_versions("10.0.0", "9.9.9"), Ordering::Greater);
    }

    #[test]
    fn unsafe_versions_and_packages_are_refused() {
        assert!(is_safe_version("5.0.100-rc.1"));
        assert!(!is_safe_version("../etc"));
        assert!(!is_safe_version("5/0"));
        assert!(!is_safe_version(""));
        assert!(package_dir(Path::new("/cache"), "../escape").is_none());
        assert!(package_dir(Path::new("/cache"), "/abs").is_none());
        assert_eq!(
            package_dir(Path::new("/cache"), PACKAGE),
            Some(PathBuf::from("/cache/@paypal/smart-payment-buttons"))
        );
    }

    #[tokio::test]
    async fn live_version_is_newest_installed() {
        let dir = tempfile::tempdir().expect("tempdir");
        install_fixture(dir.path(), "5.0.99");
        install_fixture(dir.path(), "5.0.100");
        std::fs::write(dir.path().join(PACKAGE).join("README"), "x").expect("file");

        let manager = manager(dir.path(), None).await;

        assert_eq!(manager.live_version(), "5.0.100");
    }

    #[tokio::test]
    async fn pinned_version_overrides_cache_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        install_fixture(dir.path(), "5.0.100");

        let manager = manager(dir.path(), Some("5.0.90")).await;

        assert_eq!(manager.live_version(), "5.0.90");
    }

    #[tokio::test]
    async fn empty_cache_has_no_live_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = manager(dir.path(), None).await;
        assert_eq!(manager.live_version(), "");
    }

    #[tokio::test]
    async fn installed_versions_are_served_from_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        install_fixture(dir.path(), "5.0.100");
        let manager = manager(dir.path(), None).await;

        let version = manager
            .get_or_install(SdkInstallRequest {
                package: PACKAGE.into(),
                version: "5.0.100".into(),
            })
            .await
            .expect("cached");

        assert_eq!(version, "5.0.100");
    }

    #[tokio::test]
    async fn failed_install_leaves_no_partial_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = manager(dir.path(), Some("6.0.0")).await;

        let err = manager
            .get_or_install(SdkInstallRequest {
                package: PACKAGE.into(),
                version: "6.0.0".into(),
            })
            .await
            .expect_err("cdn unreachable");

        assert!(matches!(err, SdkError::Install { .. }));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join(PACKAGE))
            .expect("package dir")
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn foreign_packages_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = manager(dir.path(), None).await;

        let err = manager
            .get_or_install(SdkInstallRequest {
                package: "@other/pkg".into(),
                version: "1.0.0".into(),
            })
            .await
            .expect_err("foreign package");

        assert!(matches!(err, SdkError::Install { .. }));
    }

    #[tokio::test]
    async fn concurrent_installs_download_each_bundle_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (cdn, hits) = counting_cdn(Duration::from_millis(100), StatusCode::OK).await;
        let manager = Arc::new(manager_with_cdn(dir.path(), cdn).await);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.get_or_install(install_request("6.0.0")).await
            }));
        }
        for handle in handles {
            let version = handle.await.expect("join").expect("installed");
            assert_eq!(version, "6.0.0");
        }

        assert_eq!(hits.load(AtomicOrdering::SeqCst), BUNDLE_MODES.len());
        for mode in BUNDLE_MODES {
            assert!(
                dir.path()
                    .join(PACKAGE)
                    .join("6.0.0")
                    .join(mode.bundle_file())
                    .is_file()
            );
        }
        assert!(manager.in_flight.is_empty());

        manager
            .get_or_install(install_request("6.0.0"))
            .await
            .expect("cached");
        assert_eq!(hits.load(AtomicOrdering::SeqCst), BUNDLE_MODES.len());
    }

    #[tokio::test]
    async fn recent_install_failures_are_not_retried() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (cdn, hits) = counting_cdn(Duration::ZERO, StatusCode::INTERNAL_SERVER_ERROR).await;
        let manager = manager_with_cdn(dir.path(), cdn).await;

        let first = manager
            .get_or_install(install_request("6.0.0"))
            .await
            .expect_err("cdn refuses");
        let second = manager
            .get_or_install(install_request("6.0.0"))
            .await
            .expect_err("failure remembered");

        assert!(matches!(first, SdkError::Install { .. }));
        assert!(matches!(second, SdkError::Install { .. }));
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 1);
    }
}
