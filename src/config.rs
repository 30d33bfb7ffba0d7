use crate::model::NamespaceScope;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub project: Option<String>,
    pub location: Option<String>,
    pub cluster: Option<String>,
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub request_timeout_secs: u64,
    pub delete_grace_period_secs: Option<u32>,
    pub log_tail_lines: i64,
    pub spinner_interval_ms: u64,
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project: None,
            location: None,
            cluster: None,
            context: None,
            namespace: None,
            request_timeout_secs: 10,
            delete_grace_period_secs: Some(30),
            log_tail_lines: 500,
            spinner_interval_ms: 100,
            source: None,
        }
    }
}

impl Settings {
    /// Loads the explicit path, or the first discovered file, or defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => discover_config_path(),
        };
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut settings = Self::parse(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        settings.source = Some(path);
        Ok(settings)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_yaml::from_str(raw)?;
        Ok(settings)
    }

    pub fn apply_cli(&mut self, namespace: Option<&str>, all_namespaces: bool) {
        if all_namespaces {
            self.namespace = Some("*".to_string());
        } else if let Some(namespace) = namespace {
            self.namespace = Some(namespace.to_string());
        }
    }

    pub fn namespace_scope(&self, fallback: &str) -> NamespaceScope {
        match self.namespace.as_deref().map(str::trim) {
            Some("*") | Some("all") => NamespaceScope::All,
            Some(namespace) if !namespace.is_empty() => NamespaceScope::Named(namespace.to_string()),
            _ => NamespaceScope::Named(fallback.to_string()),
        }
    }

    /// Explicit context, or the one `gcloud container clusters get-credentials` writes.
    pub fn kube_context(&self) -> Option<String> {
        if let Some(context) = self.context.as_ref().filter(|value| !value.trim().is_empty()) {
            return Some(context.clone());
        }

        match (&self.project, &self.location, &self.cluster) {
            (Some(project), Some(location), Some(cluster)) => {
                Some(format!("gke_{project}_{location}_{cluster}"))
            }
            _ => None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn spinner_interval(&self) -> Duration {
        Duration::from_millis(self.spinner_interval_ms.clamp(30, 1_000))
    }
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("PODNAV_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [PathBuf::from("podnav.yaml"), PathBuf::from("podnav.yml")];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/podnav/config.yaml"),
            PathBuf::from(&home).join(".config/podnav/config.yml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::Settings;
    use crate::model::NamespaceScope;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.delete_grace_period_secs, Some(30));
        assert_eq!(settings.spinner_interval(), Duration::from_millis(100));
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let settings = Settings::parse("namespace: payments\nlog_tail_lines: 50\n").unwrap();
        assert_eq!(settings.namespace.as_deref(), Some("payments"));
        assert_eq!(settings.log_tail_lines, 50);
        assert_eq!(settings.request_timeout_secs, 10);
    }

    #[test]
    fn gke_context_is_derived_from_cluster_coordinates() {
        let settings = Settings::parse(
            "project: acme-prod\nlocation: europe-west1\ncluster: main\n",
        )
        .unwrap();
        assert_eq!(
            settings.kube_context().as_deref(),
            Some("gke_acme-prod_europe-west1_main")
        );

        let explicit = Settings::parse("context: minikube\ncluster: main\n").unwrap();
        assert_eq!(explicit.kube_context().as_deref(), Some("minikube"));
        assert_eq!(Settings::default().kube_context(), None);
    }

    #[test]
    fn cli_flags_override_namespace() {
        let mut settings = Settings::parse("namespace: payments\n").unwrap();
        settings.apply_cli(Some("billing"), false);
        assert_eq!(
            settings.namespace_scope("default"),
            NamespaceScope::Named("billing".to_string())
        );

        settings.apply_cli(Some("billing"), true);
        assert_eq!(settings.namespace_scope("default"), NamespaceScope::All);
        assert_eq!(
            Settings::default().namespace_scope("kube-public"),
            NamespaceScope::Named("kube-public".to_string())
        );
    }

    #[test]
    fn bad_field_types_are_reported() {
        assert!(Settings::parse("request_timeout_secs: soon\n").is_err());
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cluster: main\ndelete_grace_period_secs: 0").unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.cluster.as_deref(), Some("main"));
        assert_eq!(settings.delete_grace_period_secs, Some(0));
        assert_eq!(settings.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn load_reports_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let error = Settings::load(Some(&dir.path().join("absent.yaml"))).unwrap_err();
        assert!(format!("{error:#}").contains("failed to read config"));
    }
}
