use crate::config::Settings;
use anyhow::{Context, Result};
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tracing::info;

/// Arguments for `gcloud container clusters get-credentials`.
pub fn credentials_args(settings: &Settings) -> Result<Vec<String>> {
    let required = |value: &Option<String>, key: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .with_context(|| format!("`{key}` must be set in the config file to fetch credentials"))
    };
    let cluster = required(&settings.cluster, "cluster")?;
    let location = required(&settings.location, "location")?;
    let project = required(&settings.project, "project")?;

    Ok(vec![
        "container".to_string(),
        "clusters".to_string(),
        "get-credentials".to_string(),
        cluster,
        "--location".to_string(),
        location,
        "--project".to_string(),
        project,
    ])
}

/// Writes a kubeconfig entry for the configured GKE cluster.
pub async fn get_credentials(settings: &Settings) -> Result<()> {
    let args = credentials_args(settings)?;
    info!("running gcloud {}", args.join(" "));

    let status = TokioCommand::new("gcloud")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .context("failed to run gcloud; is the Google Cloud SDK installed?")?;

    if status.success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("gcloud get-credentials exited with {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::credentials_args;
    use crate::config::Settings;

    #[test]
    fn args_name_cluster_location_and_project() {
        let settings =
            Settings::parse("project: acme-prod\nlocation: europe-west1\ncluster: main\n").unwrap();
        assert_eq!(
            credentials_args(&settings).unwrap(),
            vec![
                "container",
                "clusters",
                "get-credentials",
                "main",
                "--location",
                "europe-west1",
                "--project",
                "acme-prod",
            ]
        );
    }

    #[test]
    fn missing_coordinates_are_reported() {
        let settings = Settings::parse("project: acme-prod\ncluster: main\n").unwrap();
        let error = credentials_args(&settings).unwrap_err();
        assert!(error.to_string().contains("`location`"));

        let blank = Settings::parse("project: ' '\nlocation: x\ncluster: main\n").unwrap();
        assert!(credentials_args(&blank).is_err());
    }
}
