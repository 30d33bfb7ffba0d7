use crate::collaborator::{Collaborator, ResourceSpec};
use crate::error::EngineError;
use crate::message::Message;
use crate::model::{ResourceKind, ResourceRow};
use anyhow::{Context, Result};
use chrono::Utc;
use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SHELL_BOOTSTRAP: &str = "if command -v bash >/dev/null 2>&1; then exec bash; else exec sh; fi";

/// Side-effecting operations reachable from menus, shortcuts and wizards.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Operation {
    Describe,
    DecodeData,
    ViewLogs,
    FollowLogs,
    Shell,
    Delete,
    Restart,
    SetEnv {
        container: String,
        name: String,
        value: String,
    },
    CreateSecret(ResourceSpec),
}

impl Operation {
    pub fn menu_for(kind: ResourceKind) -> Vec<Self> {
        match kind {
            ResourceKind::Pods => vec![
                Self::Describe,
                Self::ViewLogs,
                Self::FollowLogs,
                Self::Shell,
                Self::Delete,
            ],
            ResourceKind::Secrets | ResourceKind::ConfigMaps => {
                vec![Self::Describe, Self::DecodeData, Self::Delete]
            }
            ResourceKind::Deployments => vec![Self::Describe, Self::Restart],
            ResourceKind::Namespaces => vec![Self::Describe],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Describe => "Describe",
            Self::DecodeData => "Decode data",
            Self::ViewLogs => "Logs",
            Self::FollowLogs => "Follow logs",
            Self::Shell => "Shell",
            Self::Delete => "Delete",
            Self::Restart => "Restart",
            Self::SetEnv { .. } => "Set env var",
            Self::CreateSecret(_) => "Create secret",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Describe => "≡",
            Self::DecodeData => "⚿",
            Self::ViewLogs | Self::FollowLogs => "¶",
            Self::Shell => "$",
            Self::Delete => "✗",
            Self::Restart => "↻",
            Self::SetEnv { .. } => "⚙",
            Self::CreateSecret(_) => "+",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Describe => "Show the full manifest",
            Self::DecodeData => "Show decoded data entries",
            Self::ViewLogs => "Show the recent log tail",
            Self::FollowLogs => "Stream new log lines until Esc",
            Self::Shell => "Open an interactive shell in the pod",
            Self::Delete => "Delete the resource",
            Self::Restart => "Roll the pods of the deployment",
            Self::SetEnv { .. } => "Add or replace an environment variable",
            Self::CreateSecret(_) => "Create a new secret",
        }
    }

    pub fn supports(&self, kind: ResourceKind) -> bool {
        match self {
            Self::SetEnv { .. } => kind == ResourceKind::Deployments,
            Self::CreateSecret(_) => kind == ResourceKind::Secrets,
            other => Self::menu_for(kind).contains(other),
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Self::Delete | Self::Restart)
    }

    pub fn needs_terminal(&self) -> bool {
        matches!(self, Self::Shell)
    }

    pub fn accepts_many(&self) -> bool {
        matches!(self, Self::Delete)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DispatchRequest {
    pub operation: Operation,
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub targets: Vec<ResourceRow>,
    /// Container for pod operations; resolved from the pod when unset.
    pub container: Option<String>,
}

impl DispatchRequest {
    pub fn on_rows(operation: Operation, kind: ResourceKind, targets: Vec<ResourceRow>) -> Self {
        let namespace = targets.first().and_then(|row| row.namespace.clone());
        Self {
            operation,
            kind,
            namespace,
            targets,
            container: None,
        }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Human readable subject, e.g. `pod default/api-0` or `3 pods`.
    pub fn subject(&self) -> String {
        match self.targets.as_slice() {
            [] => match (&self.operation, &self.namespace) {
                (Operation::CreateSecret(spec), Some(namespace)) => {
                    format!("{} {namespace}/{}", self.kind.singular(), spec.name())
                }
                _ => self.kind.singular().to_string(),
            },
            [row] => format!("{} {}", self.kind.singular(), row.qualified_name()),
            rows => format!("{} {}", rows.len(), self.kind.title().to_lowercase()),
        }
    }

    pub fn prompt(&self) -> String {
        format!("{} {}", self.operation.label(), self.subject())
    }

    fn single_target(&self) -> Result<&ResourceRow> {
        self.targets
            .first()
            .with_context(|| format!("{} needs a selected {}", self.operation.label(), self.kind.singular()))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Confirmation {
    NotRequired,
    Affirmed,
    Declined,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Effect {
    None,
    Refresh,
    ShowText { title: String, lines: Vec<String> },
    FollowLogs {
        namespace: String,
        pod: String,
        container: Option<String>,
    },
    ChooseContainer {
        request: Box<DispatchRequest>,
        containers: Vec<String>,
    },
}

enum ContainerChoice {
    Resolved(Option<String>),
    Ambiguous(Vec<String>),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DispatchOutcome {
    pub message: Message,
    pub effect: Effect,
    pub succeeded: bool,
}

impl DispatchOutcome {
    fn success(message: Message, effect: Effect) -> Self {
        Self {
            message,
            effect,
            succeeded: true,
        }
    }

    fn failure(message: Message, effect: Effect) -> Self {
        Self {
            message,
            effect,
            succeeded: false,
        }
    }
}

/// Turns confirmed requests into collaborator calls and one terminal message each.
#[derive(Clone)]
pub struct Dispatcher {
    collaborator: Arc<dyn Collaborator>,
    grace_period: Option<u32>,
}

impl Dispatcher {
    pub fn new(collaborator: Arc<dyn Collaborator>, grace_period: Option<u32>) -> Self {
        Self {
            collaborator,
            grace_period,
        }
    }

    pub async fn dispatch(
        &self,
        request: &DispatchRequest,
        confirmation: Confirmation,
    ) -> DispatchOutcome {
        if request.operation.requires_confirmation() && confirmation != Confirmation::Affirmed {
            info!(operation = request.operation.label(), "declined {}", request.subject());
            return DispatchOutcome::failure(
                Message::info(format!("{}: {}", request.prompt(), EngineError::Cancelled)),
                Effect::None,
            );
        }

        debug!(operation = request.operation.label(), "dispatching {}", request.subject());
        match self.execute(request).await {
            Ok(outcome) => outcome,
            Err(error) => {
                let error = EngineError::collaborator(request.prompt(), &error);
                warn!("{error}");
                DispatchOutcome::failure(Message::error(error.to_string()), Effect::None)
            }
        }
    }

    async fn execute(&self, request: &DispatchRequest) -> Result<DispatchOutcome> {
        let kind = request.kind;
        match &request.operation {
            Operation::Describe => {
                let target = request.single_target()?;
                let detail = self
                    .collaborator
                    .get_resource(kind, target.namespace.as_deref(), &target.name)
                    .await?;
                let lines = detail.manifest.lines().map(str::to_string).collect();
                Ok(DispatchOutcome::success(
                    Message::info(format!("Loaded {}", request.subject())),
                    Effect::ShowText {
                        title: format!("Describe {}", request.subject()),
                        lines,
                    },
                ))
            }
            Operation::DecodeData => {
                let target = request.single_target()?;
                let detail = self
                    .collaborator
                    .get_resource(kind, target.namespace.as_deref(), &target.name)
                    .await?;
                let lines = data_lines(&detail.data);
                Ok(DispatchOutcome::success(
                    Message::info(format!(
                        "Decoded {} keys from {}",
                        detail.data.len(),
                        request.subject()
                    )),
                    Effect::ShowText {
                        title: format!("Data {}", request.subject()),
                        lines,
                    },
                ))
            }
            Operation::ViewLogs => {
                let target = request.single_target()?;
                let namespace = target.namespace.as_deref().context("pod has no namespace")?;
                let choice = self.resolve_container(request, namespace, &target.name).await?;
                let container = match choice {
                    ContainerChoice::Resolved(container) => container,
                    ContainerChoice::Ambiguous(containers) => {
                        return Ok(choose_container(request, containers));
                    }
                };
                let stream = self
                    .collaborator
                    .stream_logs(namespace, &target.name, container.as_deref(), false)
                    .await?;
                let lines = stream.try_collect::<Vec<_>>().await?;
                Ok(DispatchOutcome::success(
                    Message::info(format!("Loaded {} log lines for {}", lines.len(), request.subject())),
                    Effect::ShowText {
                        title: format!("Logs {}", request.subject()),
                        lines,
                    },
                ))
            }
            Operation::FollowLogs => {
                let target = request.single_target()?;
                let namespace = target.namespace.clone().context("pod has no namespace")?;
                let choice = self.resolve_container(request, &namespace, &target.name).await?;
                let container = match choice {
                    ContainerChoice::Resolved(container) => container,
                    ContainerChoice::Ambiguous(containers) => {
                        return Ok(choose_container(request, containers));
                    }
                };
                Ok(DispatchOutcome::success(
                    Message::info(format!("Following logs for {} (Esc to stop)", request.subject())),
                    Effect::FollowLogs {
                        namespace,
                        pod: target.name.clone(),
                        container,
                    },
                ))
            }
            Operation::Shell => {
                let target = request.single_target()?;
                let namespace = target.namespace.as_deref().context("pod has no namespace")?;
                let choice = self.resolve_container(request, namespace, &target.name).await?;
                let container = match choice {
                    ContainerChoice::Resolved(container) => container,
                    ContainerChoice::Ambiguous(containers) => {
                        return Ok(choose_container(request, containers));
                    }
                };
                let command = vec![
                    "/bin/sh".to_string(),
                    "-c".to_string(),
                    SHELL_BOOTSTRAP.to_string(),
                ];
                let code = self
                    .collaborator
                    .exec_interactive(namespace, &target.name, container.as_deref(), &command)
                    .await?;
                let message = format!("Shell session for {} exited with status {code}", request.subject());
                Ok(DispatchOutcome::success(Message::info(message), Effect::None))
            }
            Operation::Delete => self.delete_targets(request).await,
            Operation::Restart => {
                let target = request.single_target()?;
                let namespace = target.namespace.as_deref().context("deployment has no namespace")?;
                let patch = serde_json::json!({
                    "spec": {
                        "template": {
                            "metadata": {
                                "annotations": {
                                    "kubectl.kubernetes.io/restartedAt": Utc::now().to_rfc3339()
                                }
                            }
                        }
                    }
                });
                self.collaborator
                    .update_resource(kind, namespace, &target.name, patch)
                    .await?;
                Ok(DispatchOutcome::success(
                    Message::success(format!("Restarted {}", request.subject())),
                    Effect::Refresh,
                ))
            }
            Operation::SetEnv {
                container,
                name,
                value,
            } => {
                let target = request.single_target()?;
                let namespace = target.namespace.as_deref().context("deployment has no namespace")?;
                let patch = serde_json::json!({
                    "spec": {
                        "template": {
                            "spec": {
                                "containers": [{
                                    "name": container,
                                    "env": [{ "name": name, "value": value }]
                                }]
                            }
                        }
                    }
                });
                self.collaborator
                    .update_resource(kind, namespace, &target.name, patch)
                    .await?;
                Ok(DispatchOutcome::success(
                    Message::success(format!("Set {name} on {}/{container}", request.subject())),
                    Effect::Refresh,
                ))
            }
            Operation::CreateSecret(spec) => {
                let namespace = request
                    .namespace
                    .as_deref()
                    .context("a namespace is required to create a secret")?;
                self.collaborator
                    .create_resource(kind, namespace, spec.clone())
                    .await?;
                Ok(DispatchOutcome::success(
                    Message::success(format!("Created {}", request.subject())),
                    Effect::Refresh,
                ))
            }
        }
    }

    /// Uses the requested container, or the pod's only one.
    async fn resolve_container(
        &self,
        request: &DispatchRequest,
        namespace: &str,
        pod: &str,
    ) -> Result<ContainerChoice> {
        if let Some(container) = &request.container {
            return Ok(ContainerChoice::Resolved(Some(container.clone())));
        }

        let detail = self
            .collaborator
            .get_resource(ResourceKind::Pods, Some(namespace), pod)
            .await?;
        let mut containers = detail.containers;
        Ok(match containers.len() {
            0 => ContainerChoice::Resolved(None),
            1 => ContainerChoice::Resolved(containers.pop()),
            _ => ContainerChoice::Ambiguous(containers),
        })
    }

    async fn delete_targets(&self, request: &DispatchRequest) -> Result<DispatchOutcome> {
        request.single_target()?;

        let mut failures = Vec::new();
        for target in &request.targets {
            if let Err(error) = self
                .collaborator
                .delete_resource(
                    request.kind,
                    target.namespace.as_deref(),
                    &target.name,
                    self.grace_period,
                )
                .await
            {
                failures.push((target.qualified_name(), error));
            }
        }

        let total = request.targets.len();
        match failures.as_slice() {
            [] => Ok(DispatchOutcome::success(
                Message::success(format!("Deleted {}", request.subject())),
                Effect::Refresh,
            )),
            [(_, error)] if total == 1 => Err(anyhow::anyhow!("{error:#}")),
            [(name, error), ..] => Ok(DispatchOutcome::failure(
                Message::error(format!(
                    "Deleted {} of {total} {}; {name}: {error:#}",
                    total - failures.len(),
                    request.kind.title().to_lowercase(),
                )),
                Effect::Refresh,
            )),
        }
    }
}

fn choose_container(request: &DispatchRequest, containers: Vec<String>) -> DispatchOutcome {
    debug!("{} has {} containers", request.subject(), containers.len());
    DispatchOutcome::success(
        Message::info(format!("Pick a container for {}", request.prompt())),
        Effect::ChooseContainer {
            request: Box::new(request.clone()),
            containers,
        },
    )
}

/// Renders decoded key/value data, multi-line values as indented blocks.
pub fn data_lines(data: &BTreeMap<String, String>) -> Vec<String> {
    let mut lines = Vec::new();
    for (key, value) in data {
        let mut value_lines = value.lines();
        match (value_lines.next(), value.contains('\n')) {
            (Some(first), false) => lines.push(format!("{key}: {first}")),
            (Some(first), true) => {
                lines.push(format!("{key}: |"));
                lines.push(format!("  {first}"));
                lines.extend(value_lines.map(|line| format!("  {line}")));
            }
            (None, _) => lines.push(format!("{key}: ")),
        }
    }
    if lines.is_empty() {
        lines.push("(no data)".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::{Confirmation, DispatchRequest, Dispatcher, Effect, Operation};
    use crate::collaborator::ResourceSpec;
    use crate::collaborator::tests::StubCollaborator;
    use crate::message::MessageLevel;
    use crate::model::{ResourceKind, sample_row};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn pod_request(operation: Operation) -> DispatchRequest {
        DispatchRequest::on_rows(
            operation,
            ResourceKind::Pods,
            vec![sample_row(ResourceKind::Pods, "default", "api-0", "Running")],
        )
    }

    #[test]
    fn only_destructive_operations_need_confirmation() {
        assert!(Operation::Delete.requires_confirmation());
        assert!(Operation::Restart.requires_confirmation());
        assert!(!Operation::Describe.requires_confirmation());
        assert!(!Operation::ViewLogs.requires_confirmation());
        assert!(!Operation::FollowLogs.requires_confirmation());
    }

    #[test]
    fn menus_match_resource_kinds() {
        assert!(Operation::Shell.supports(ResourceKind::Pods));
        assert!(!Operation::Shell.supports(ResourceKind::Secrets));
        assert!(Operation::DecodeData.supports(ResourceKind::ConfigMaps));
        assert!(!Operation::Delete.supports(ResourceKind::Namespaces));
    }

    #[test]
    fn subject_pluralizes_bulk_targets() {
        let request = DispatchRequest::on_rows(
            Operation::Delete,
            ResourceKind::Pods,
            vec![
                sample_row(ResourceKind::Pods, "default", "a", "Running"),
                sample_row(ResourceKind::Pods, "default", "b", "Running"),
            ],
        );
        assert_eq!(request.prompt(), "Delete 2 pods");
        assert_eq!(pod_request(Operation::Delete).prompt(), "Delete pod default/api-0");
    }

    #[tokio::test]
    async fn declined_delete_never_reaches_collaborator() {
        let stub = Arc::new(StubCollaborator::default());
        let dispatcher = Dispatcher::new(stub.clone(), Some(30));

        let outcome = dispatcher
            .dispatch(&pod_request(Operation::Delete), Confirmation::Declined)
            .await;
        assert_eq!(stub.total_calls(), 0);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.message.level, MessageLevel::Info);
        assert_eq!(outcome.message.text, "Delete pod default/api-0: cancelled");

        let outcome = dispatcher
            .dispatch(&pod_request(Operation::Delete), Confirmation::NotRequired)
            .await;
        assert_eq!(stub.total_calls(), 0);
        assert!(!outcome.succeeded);
    }

    #[tokio::test]
    async fn affirmed_delete_passes_grace_period() {
        let stub = Arc::new(StubCollaborator::default());
        let dispatcher = Dispatcher::new(stub.clone(), Some(30));

        let outcome = dispatcher
            .dispatch(&pod_request(Operation::Delete), Confirmation::Affirmed)
            .await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.effect, Effect::Refresh);
        assert_eq!(outcome.message.text, "Deleted pod default/api-0");
        assert_eq!(
            stub.last_call("delete_resource").as_deref(),
            Some("Pods Some(\"default\") api-0 Some(30)")
        );
    }

    #[tokio::test]
    async fn collaborator_failure_becomes_error_message() {
        let stub = Arc::new(StubCollaborator::failing("pods \"api-0\" is forbidden"));
        let dispatcher = Dispatcher::new(stub.clone(), None);

        let outcome = dispatcher
            .dispatch(&pod_request(Operation::Delete), Confirmation::Affirmed)
            .await;
        assert!(!outcome.succeeded);
        assert_eq!(outcome.message.level, MessageLevel::Error);
        assert_eq!(
            outcome.message.text,
            "Delete pod default/api-0 failed: pods \"api-0\" is forbidden"
        );
        assert_eq!(stub.calls("delete_resource"), 1);
    }

    #[tokio::test]
    async fn bulk_delete_reports_one_summary() {
        let stub = Arc::new(StubCollaborator::default());
        let dispatcher = Dispatcher::new(stub.clone(), None);
        let request = DispatchRequest::on_rows(
            Operation::Delete,
            ResourceKind::Secrets,
            vec![
                sample_row(ResourceKind::Secrets, "default", "a", "Opaque"),
                sample_row(ResourceKind::Secrets, "default", "b", "Opaque"),
                sample_row(ResourceKind::Secrets, "default", "c", "Opaque"),
            ],
        );

        let outcome = dispatcher.dispatch(&request, Confirmation::Affirmed).await;
        assert_eq!(stub.calls("delete_resource"), 3);
        assert_eq!(outcome.message.text, "Deleted 3 secrets");
    }

    #[tokio::test]
    async fn describe_shows_manifest_without_confirmation() {
        let stub = Arc::new(StubCollaborator::default());
        let dispatcher = Dispatcher::new(stub.clone(), None);

        let outcome = dispatcher
            .dispatch(&pod_request(Operation::Describe), Confirmation::NotRequired)
            .await;
        let Effect::ShowText { title, lines } = outcome.effect else {
            panic!("expected text view");
        };
        assert_eq!(title, "Describe pod default/api-0");
        assert_eq!(lines, vec!["kind: pod".to_string(), "name: api-0".to_string()]);
    }

    #[tokio::test]
    async fn decode_renders_multiline_values_as_blocks() {
        let stub = Arc::new(StubCollaborator::with_data(&[
            ("password", "hunter2"),
            ("tls.crt", "line1\nline2"),
        ]));
        let dispatcher = Dispatcher::new(stub, None);
        let request = DispatchRequest::on_rows(
            Operation::DecodeData,
            ResourceKind::Secrets,
            vec![sample_row(ResourceKind::Secrets, "default", "creds", "Opaque")],
        );

        let outcome = dispatcher.dispatch(&request, Confirmation::NotRequired).await;
        let Effect::ShowText { lines, .. } = outcome.effect else {
            panic!("expected text view");
        };
        assert_eq!(
            lines,
            vec![
                "password: hunter2".to_string(),
                "tls.crt: |".to_string(),
                "  line1".to_string(),
                "  line2".to_string(),
            ]
        );
        assert_eq!(outcome.message.text, "Decoded 2 keys from secret default/creds");
    }

    #[tokio::test]
    async fn logs_are_collected_into_text_view() {
        let stub = Arc::new(StubCollaborator::with_logs(&["starting", "ready"]));
        let dispatcher = Dispatcher::new(stub.clone(), None);

        let outcome = dispatcher
            .dispatch(&pod_request(Operation::ViewLogs), Confirmation::NotRequired)
            .await;
        assert_eq!(
            outcome.effect,
            Effect::ShowText {
                title: "Logs pod default/api-0".to_string(),
                lines: vec!["starting".to_string(), "ready".to_string()],
            }
        );
        assert_eq!(
            stub.last_call("get_resource").as_deref(),
            Some("Pods Some(\"default\") api-0")
        );
        assert_eq!(
            stub.last_call("stream_logs").as_deref(),
            Some("default api-0 Some(\"app\") follow=false")
        );
    }

    #[tokio::test]
    async fn logs_for_multi_container_pod_ask_for_a_container() {
        let stub = Arc::new(
            StubCollaborator::with_logs(&["ready"]).with_containers(&["app", "istio-proxy"]),
        );
        let dispatcher = Dispatcher::new(stub.clone(), None);
        let request = pod_request(Operation::ViewLogs);

        let outcome = dispatcher.dispatch(&request, Confirmation::NotRequired).await;
        assert_eq!(
            outcome.effect,
            Effect::ChooseContainer {
                request: Box::new(request.clone()),
                containers: vec!["app".to_string(), "istio-proxy".to_string()],
            }
        );
        assert_eq!(stub.calls("stream_logs"), 0);

        let outcome = dispatcher
            .dispatch(&request.with_container("istio-proxy"), Confirmation::NotRequired)
            .await;
        assert!(matches!(outcome.effect, Effect::ShowText { .. }));
        assert_eq!(stub.calls("get_resource"), 1);
        assert_eq!(
            stub.last_call("stream_logs").as_deref(),
            Some("default api-0 Some(\"istio-proxy\") follow=false")
        );
    }

    #[tokio::test]
    async fn pod_without_containers_leaves_choice_to_the_cluster() {
        let stub = Arc::new(StubCollaborator::default().with_containers(&[]));
        let dispatcher = Dispatcher::new(stub.clone(), None);

        dispatcher
            .dispatch(&pod_request(Operation::Shell), Confirmation::NotRequired)
            .await;
        let call = stub.last_call("exec_interactive").unwrap_or_default();
        assert!(call.starts_with("default api-0 None /bin/sh"));
    }

    #[tokio::test]
    async fn follow_logs_hands_off_to_follower() {
        let stub = Arc::new(StubCollaborator::default());
        let dispatcher = Dispatcher::new(stub.clone(), None);

        let outcome = dispatcher
            .dispatch(&pod_request(Operation::FollowLogs), Confirmation::NotRequired)
            .await;
        assert_eq!(
            outcome.effect,
            Effect::FollowLogs {
                namespace: "default".to_string(),
                pod: "api-0".to_string(),
                container: Some("app".to_string()),
            }
        );
        assert_eq!(stub.calls("stream_logs"), 0);
    }

    #[tokio::test]
    async fn shell_runs_exec_with_bootstrap() {
        let stub = Arc::new(StubCollaborator::default());
        let dispatcher = Dispatcher::new(stub.clone(), None);

        let outcome = dispatcher
            .dispatch(&pod_request(Operation::Shell), Confirmation::NotRequired)
            .await;
        assert_eq!(
            outcome.message.text,
            "Shell session for pod default/api-0 exited with status 0"
        );
        let call = stub.last_call("exec_interactive").unwrap_or_default();
        assert!(call.starts_with("default api-0 Some(\"app\") /bin/sh -c"));
    }

    #[tokio::test]
    async fn set_env_patches_named_container() {
        let stub = Arc::new(StubCollaborator::default());
        let dispatcher = Dispatcher::new(stub.clone(), None);
        let request = DispatchRequest::on_rows(
            Operation::SetEnv {
                container: "app".to_string(),
                name: "LOG_LEVEL".to_string(),
                value: "debug".to_string(),
            },
            ResourceKind::Deployments,
            vec![sample_row(ResourceKind::Deployments, "default", "api", "1/1")],
        );

        let outcome = dispatcher.dispatch(&request, Confirmation::NotRequired).await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.message.text, "Set LOG_LEVEL on deployment default/api/app");
        let call = stub.last_call("update_resource").unwrap_or_default();
        assert!(call.contains("\"name\":\"LOG_LEVEL\""));
        assert!(call.contains("\"value\":\"debug\""));
    }

    #[tokio::test]
    async fn create_secret_uses_request_namespace() {
        let stub = Arc::new(StubCollaborator::default());
        let dispatcher = Dispatcher::new(stub.clone(), None);
        let spec = ResourceSpec::Secret {
            name: "db-creds".to_string(),
            secret_type: "Opaque".to_string(),
            data: BTreeMap::from([("password".to_string(), "s3cr3t".to_string())]),
        };
        let request = DispatchRequest {
            operation: Operation::CreateSecret(spec),
            kind: ResourceKind::Secrets,
            namespace: Some("payments".to_string()),
            targets: Vec::new(),
            container: None,
        };

        let outcome = dispatcher.dispatch(&request, Confirmation::NotRequired).await;
        assert_eq!(outcome.message.text, "Created secret payments/db-creds");
        assert_eq!(stub.calls("create_resource"), 1);
    }
}
