use crate::collaborator::{Collaborator, LogStream, ResourceDetail, ResourceSpec};
use crate::config::Settings;
use crate::model::{NamespaceScope, ResourceKind, ResourceRow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{AsyncBufReadExt, StreamExt, TryStreamExt};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, LogParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, Resource, ResourceExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info};

const IN_CLUSTER_CONTEXT: &str = "in-cluster";

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    default_namespace: String,
    request_timeout: Duration,
    log_tail_lines: i64,
}

impl KubeGateway {
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let context = settings.kube_context();
        let kubeconfig = Kubeconfig::read().ok();

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            let options = KubeConfigOptions {
                context: context.clone(),
                cluster: None,
                user: None,
            };
            Config::from_custom_kubeconfig(kubeconfig_value, &options)
                .await
                .context("failed to load Kubernetes configuration from kubeconfig")?
        } else {
            if let Some(context) = &context {
                anyhow::bail!(
                    "kubeconfig not found; run `podnav auth` to fetch credentials for {context}"
                );
            }
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let cluster = config.cluster_url.to_string();
        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;
        let context = context
            .or_else(|| kubeconfig.and_then(|cfg| cfg.current_context))
            .unwrap_or_else(|| IN_CLUSTER_CONTEXT.to_string());
        info!(context = %context, cluster = %cluster, "connected to cluster");

        Ok(Self {
            client,
            context,
            cluster,
            default_namespace,
            request_timeout: settings.request_timeout(),
            log_tail_lines: settings.log_tail_lines.max(1),
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    fn scoped<K>(&self, scope: &NamespaceScope) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        match scope {
            NamespaceScope::All => Api::all(self.client.clone()),
            NamespaceScope::Named(namespace) => Api::namespaced(self.client.clone(), namespace),
        }
    }

    fn namespaced<K>(&self, namespace: Option<&str>, kind: ResourceKind) -> Result<Api<K>>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        let namespace = namespace
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .with_context(|| format!("namespace is required for {}", kind.singular()))?;
        Ok(Api::namespaced(self.client.clone(), namespace))
    }

    async fn bounded<T, F>(&self, what: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.request_timeout, future).await {
            Ok(result) => result,
            Err(_) => anyhow::bail!(
                "{what} timed out after {}s",
                self.request_timeout.as_secs()
            ),
        }
    }

    async fn fetch_rows(&self, kind: ResourceKind, scope: &NamespaceScope) -> Result<Vec<ResourceRow>> {
        let mut rows = match kind {
            ResourceKind::Pods => {
                let api: Api<Pod> = self.scoped(scope);
                api.list(&list_params()).await?.iter().map(pod_row).collect::<Vec<_>>()
            }
            ResourceKind::Secrets => {
                let api: Api<Secret> = self.scoped(scope);
                api.list(&list_params()).await?.iter().map(secret_row).collect()
            }
            ResourceKind::ConfigMaps => {
                let api: Api<ConfigMap> = self.scoped(scope);
                api.list(&list_params()).await?.iter().map(configmap_row).collect()
            }
            ResourceKind::Deployments => {
                let api: Api<Deployment> = self.scoped(scope);
                api.list(&list_params()).await?.iter().map(deployment_row).collect()
            }
            ResourceKind::Namespaces => {
                let api: Api<Namespace> = Api::all(self.client.clone());
                api.list(&list_params()).await?.iter().map(namespace_row).collect()
            }
        };

        rows.sort_by(|left, right| {
            left.namespace
                .cmp(&right.namespace)
                .then_with(|| left.name.cmp(&right.name))
        });
        Ok(rows)
    }

    async fn fetch_detail(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceDetail> {
        let mut detail = ResourceDetail {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            ..ResourceDetail::default()
        };

        match kind {
            ResourceKind::Pods => {
                let mut pod = self.namespaced::<Pod>(namespace, kind)?.get(name).await?;
                detail.containers = pod
                    .spec
                    .as_ref()
                    .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
                    .unwrap_or_default();
                strip_managed_fields(&mut pod.metadata);
                detail.manifest = yaml_detail(&pod);
            }
            ResourceKind::Secrets => {
                let mut secret = self.namespaced::<Secret>(namespace, kind)?.get(name).await?;
                detail.data = decode_secret_data(&secret);
                strip_managed_fields(&mut secret.metadata);
                detail.manifest = yaml_detail(&secret);
            }
            ResourceKind::ConfigMaps => {
                let mut configmap = self.namespaced::<ConfigMap>(namespace, kind)?.get(name).await?;
                detail.data = configmap_data(&configmap);
                strip_managed_fields(&mut configmap.metadata);
                detail.manifest = yaml_detail(&configmap);
            }
            ResourceKind::Deployments => {
                let mut deployment = self.namespaced::<Deployment>(namespace, kind)?.get(name).await?;
                detail.containers = deployment
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.template.spec.as_ref())
                    .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
                    .unwrap_or_default();
                strip_managed_fields(&mut deployment.metadata);
                detail.manifest = yaml_detail(&deployment);
            }
            ResourceKind::Namespaces => {
                let api: Api<Namespace> = Api::all(self.client.clone());
                let mut namespace = api.get(name).await?;
                strip_managed_fields(&mut namespace.metadata);
                detail.manifest = yaml_detail(&namespace);
            }
        }

        Ok(detail)
    }

    async fn remove(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
        params: &DeleteParams,
    ) -> Result<()> {
        match kind {
            ResourceKind::Pods => {
                let _ = self.namespaced::<Pod>(namespace, kind)?.delete(name, params).await?;
            }
            ResourceKind::Secrets => {
                let _ = self.namespaced::<Secret>(namespace, kind)?.delete(name, params).await?;
            }
            ResourceKind::ConfigMaps => {
                let _ = self
                    .namespaced::<ConfigMap>(namespace, kind)?
                    .delete(name, params)
                    .await?;
            }
            ResourceKind::Deployments => {
                let _ = self
                    .namespaced::<Deployment>(namespace, kind)?
                    .delete(name, params)
                    .await?;
            }
            ResourceKind::Namespaces => {
                let api: Api<Namespace> = Api::all(self.client.clone());
                let _ = api.delete(name, params).await?;
            }
        }
        Ok(())
    }

    async fn apply_patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<()> {
        let params = PatchParams::default();
        let namespace = Some(namespace);
        match kind {
            ResourceKind::Deployments => {
                let api = self.namespaced::<Deployment>(namespace, kind)?;
                let _ = api.patch(name, &params, &Patch::Strategic(patch)).await?;
            }
            ResourceKind::Pods => {
                let api = self.namespaced::<Pod>(namespace, kind)?;
                let _ = api.patch(name, &params, &Patch::Strategic(patch)).await?;
            }
            ResourceKind::Secrets => {
                let api = self.namespaced::<Secret>(namespace, kind)?;
                let _ = api.patch(name, &params, &Patch::Merge(patch)).await?;
            }
            ResourceKind::ConfigMaps => {
                let api = self.namespaced::<ConfigMap>(namespace, kind)?;
                let _ = api.patch(name, &params, &Patch::Merge(patch)).await?;
            }
            ResourceKind::Namespaces => {
                let api: Api<Namespace> = Api::all(self.client.clone());
                let _ = api.patch(name, &params, &Patch::Merge(patch)).await?;
            }
        }
        Ok(())
    }

    fn follow_logs(&self, namespace: &str, pod: &str, params: LogParams) -> LogStream {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod_name = pod.to_string();
        let target = format!("{namespace}/{pod}");
        let (tx, rx) = mpsc::unbounded_channel::<Result<String>>();

        tokio::spawn(async move {
            let stream = match api.log_stream(&pod_name, &params).await {
                Ok(stream) => stream,
                Err(error) => {
                    let _ = tx.send(Err(anyhow::Error::new(error)
                        .context(format!("failed to follow logs for {target}"))));
                    return;
                }
            };

            let mut lines = stream.lines();
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    result = lines.try_next() => match result {
                        Ok(Some(line)) => {
                            if tx.send(Ok(line)).is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(error) => {
                            let _ = tx.send(Err(anyhow::Error::new(error)
                                .context(format!("log stream for {target} broke"))));
                            break;
                        }
                    }
                }
            }
            debug!("log follow for {target} finished");
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }
}

#[async_trait]
impl Collaborator for KubeGateway {
    async fn list_resources(
        &self,
        kind: ResourceKind,
        scope: &NamespaceScope,
    ) -> Result<Vec<ResourceRow>> {
        self.bounded(
            &format!("listing {}", kind.title().to_lowercase()),
            self.fetch_rows(kind, scope),
        )
        .await
        .with_context(|| format!("failed to list {} in {scope}", kind.title().to_lowercase()))
    }

    async fn get_resource(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceDetail> {
        self.bounded(
            &format!("loading {} {name}", kind.singular()),
            self.fetch_detail(kind, namespace, name),
        )
        .await
        .with_context(|| format!("failed to load {} {name}", kind.singular()))
    }

    async fn delete_resource(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<()> {
        let params = DeleteParams {
            grace_period_seconds,
            ..DeleteParams::default()
        };
        self.bounded(
            &format!("deleting {} {name}", kind.singular()),
            self.remove(kind, namespace, name, &params),
        )
        .await
        .with_context(|| format!("failed to delete {} {name}", kind.singular()))
    }

    async fn create_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        spec: ResourceSpec,
    ) -> Result<()> {
        let ResourceSpec::Secret {
            name,
            secret_type,
            data,
        } = spec;
        if kind != ResourceKind::Secrets {
            anyhow::bail!("cannot create a {} from a secret spec", kind.singular());
        }

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            type_: Some(secret_type),
            string_data: Some(data),
            ..Secret::default()
        };
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        self.bounded(&format!("creating secret {name}"), async {
            api.create(&PostParams::default(), &secret).await?;
            Ok(())
        })
        .await
        .with_context(|| format!("failed to create secret {namespace}/{name}"))
    }

    async fn update_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<()> {
        self.bounded(
            &format!("patching {} {name}", kind.singular()),
            self.apply_patch(kind, namespace, name, &patch),
        )
        .await
        .with_context(|| format!("failed to update {} {namespace}/{name}", kind.singular()))
    }

    async fn exec_interactive(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        command: &[String],
    ) -> Result<i32> {
        let mut cmd = TokioCommand::new("kubectl");
        if self.context != IN_CLUSTER_CONTEXT {
            cmd.arg("--context").arg(&self.context);
        }
        cmd.arg("exec").arg("-it").arg("-n").arg(namespace).arg(pod);
        if let Some(container) = container {
            cmd.arg("-c").arg(container);
        }
        cmd.arg("--")
            .args(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let status = cmd
            .status()
            .await
            .with_context(|| format!("failed to run kubectl exec for {namespace}/{pod}"))?;
        Ok(status.code().unwrap_or(-1))
    }

    async fn stream_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        follow: bool,
    ) -> Result<LogStream> {
        let params = LogParams {
            container: container.map(str::to_string),
            follow,
            tail_lines: Some(self.log_tail_lines),
            timestamps: true,
            ..LogParams::default()
        };

        if follow {
            return Ok(self.follow_logs(namespace, pod, params));
        }

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let logs = self
            .bounded(&format!("loading logs for {namespace}/{pod}"), async {
                Ok(pods.logs(pod, &params).await?)
            })
            .await
            .with_context(|| format!("failed to load logs for {namespace}/{pod}"))?;
        let lines = logs
            .lines()
            .map(|line| Ok(line.to_string()))
            .collect::<Vec<_>>();
        Ok(futures::stream::iter(lines).boxed())
    }
}

fn list_params() -> ListParams {
    ListParams::default().limit(500)
}

fn pod_row(pod: &Pod) -> ResourceRow {
    let name = pod.name_any();
    let namespace = pod.namespace();
    let status = pod_status(pod);
    let node = pod.spec.as_ref().and_then(|spec| spec.node_name.clone());
    let (ready, total, restarts) = pod.status.as_ref().map(pod_readiness).unwrap_or((0, 0, 0));
    let age = human_age(pod.metadata.creation_timestamp.as_ref());

    ResourceRow {
        kind: ResourceKind::Pods,
        columns: vec![
            name.clone(),
            namespace.clone().unwrap_or_else(|| "-".to_string()),
            node.clone().unwrap_or_else(|| "-".to_string()),
            format!("{ready}/{total}"),
            status.clone(),
            restarts.to_string(),
            age.clone(),
        ],
        name,
        namespace,
        status,
        age,
        node,
    }
}

fn pod_status(pod: &Pod) -> String {
    if pod.metadata.deletion_timestamp.is_some() {
        return "Terminating".to_string();
    }

    let waiting = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .and_then(|statuses| {
            statuses.iter().find_map(|container| {
                container
                    .state
                    .as_ref()
                    .and_then(|state| state.waiting.as_ref())
                    .and_then(|waiting| waiting.reason.clone())
            })
        });

    waiting
        .or_else(|| pod.status.as_ref().and_then(|status| status.phase.clone()))
        .unwrap_or_else(|| "Unknown".to_string())
}

fn pod_readiness(status: &k8s_openapi::api::core::v1::PodStatus) -> (usize, usize, i32) {
    let container_statuses = status.container_statuses.as_deref().unwrap_or(&[]);
    let total = container_statuses.len();
    let ready = container_statuses
        .iter()
        .filter(|container| container.ready)
        .count();
    let restarts = container_statuses
        .iter()
        .map(|container| container.restart_count)
        .sum();

    (ready, total, restarts)
}

fn secret_row(secret: &Secret) -> ResourceRow {
    let name = secret.name_any();
    let namespace = secret.namespace();
    let secret_type = secret.type_.clone().unwrap_or_else(|| "Opaque".to_string());
    let data_count = secret.data.as_ref().map(|map| map.len()).unwrap_or(0);
    let age = human_age(secret.metadata.creation_timestamp.as_ref());

    ResourceRow {
        kind: ResourceKind::Secrets,
        columns: vec![
            name.clone(),
            namespace.clone().unwrap_or_else(|| "-".to_string()),
            truncate(&secret_type, 28),
            data_count.to_string(),
            age.clone(),
        ],
        name,
        namespace,
        status: secret_type,
        age,
        node: None,
    }
}

fn configmap_row(configmap: &ConfigMap) -> ResourceRow {
    let name = configmap.name_any();
    let namespace = configmap.namespace();
    let entries = configmap.data.as_ref().map(|map| map.len()).unwrap_or(0)
        + configmap.binary_data.as_ref().map(|map| map.len()).unwrap_or(0);
    let age = human_age(configmap.metadata.creation_timestamp.as_ref());

    ResourceRow {
        kind: ResourceKind::ConfigMaps,
        columns: vec![
            name.clone(),
            namespace.clone().unwrap_or_else(|| "-".to_string()),
            entries.to_string(),
            age.clone(),
        ],
        name,
        namespace,
        status: format!("{entries} keys"),
        age,
        node: None,
    }
}

fn deployment_row(deployment: &Deployment) -> ResourceRow {
    let name = deployment.name_any();
    let namespace = deployment.namespace();
    let desired = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1);
    let status = deployment.status.as_ref();
    let ready = status.and_then(|status| status.ready_replicas).unwrap_or(0);
    let updated = status.and_then(|status| status.updated_replicas).unwrap_or(0);
    let available = status.and_then(|status| status.available_replicas).unwrap_or(0);
    let age = human_age(deployment.metadata.creation_timestamp.as_ref());
    let state = if desired == 0 {
        "Scaled down"
    } else if available >= desired {
        "Available"
    } else {
        "Progressing"
    };

    ResourceRow {
        kind: ResourceKind::Deployments,
        columns: vec![
            name.clone(),
            namespace.clone().unwrap_or_else(|| "-".to_string()),
            format!("{ready}/{desired}"),
            updated.to_string(),
            available.to_string(),
            age.clone(),
        ],
        name,
        namespace,
        status: state.to_string(),
        age,
        node: None,
    }
}

fn namespace_row(namespace: &Namespace) -> ResourceRow {
    let name = namespace.name_any();
    let phase = namespace
        .status
        .as_ref()
        .and_then(|status| status.phase.clone())
        .unwrap_or_else(|| "Active".to_string());
    let age = human_age(namespace.metadata.creation_timestamp.as_ref());

    ResourceRow {
        kind: ResourceKind::Namespaces,
        columns: vec![name.clone(), phase.clone(), age.clone()],
        name,
        namespace: None,
        status: phase,
        age,
        node: None,
    }
}

fn decode_secret_data(secret: &Secret) -> BTreeMap<String, String> {
    let mut decoded = secret
        .data
        .as_ref()
        .map(|data| {
            data.iter()
                .map(|(key, value)| (key.clone(), String::from_utf8_lossy(&value.0).into_owned()))
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();
    if let Some(string_data) = &secret.string_data {
        decoded.extend(string_data.clone());
    }
    decoded
}

fn configmap_data(configmap: &ConfigMap) -> BTreeMap<String, String> {
    let mut data = configmap.data.clone().unwrap_or_default();
    if let Some(binary) = &configmap.binary_data {
        for (key, value) in binary {
            data.insert(key.clone(), format!("<{} bytes of binary data>", value.0.len()));
        }
    }
    data
}

fn strip_managed_fields(metadata: &mut ObjectMeta) {
    metadata.managed_fields = None;
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }

    let mut out = value
        .chars()
        .take(max.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn human_age(timestamp: Option<&Time>) -> String {
    let Some(timestamp) = timestamp else {
        return "-".to_string();
    };

    let elapsed_seconds =
        (k8s_openapi::jiff::Timestamp::now().as_second() - timestamp.0.as_second()).max(0);
    format_elapsed_seconds(elapsed_seconds)
}

fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }

    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }

    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }

    format!("{seconds}s")
}

fn yaml_detail<T>(value: &T) -> String
where
    T: Serialize,
{
    serde_yaml::to_string(value).unwrap_or_else(|error| format!("failed to format detail: {error}"))
}
