use crate::model::{NamespaceScope, ResourceKind, ResourceRow};
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::BTreeMap;

pub type LogStream = BoxStream<'static, Result<String>>;

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ResourceDetail {
    pub name: String,
    pub namespace: Option<String>,
    pub manifest: String,
    /// Decoded secret or configmap payload, keyed by data key.
    pub data: BTreeMap<String, String>,
    pub containers: Vec<String>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResourceSpec {
    Secret {
        name: String,
        secret_type: String,
        data: BTreeMap<String, String>,
    },
}

impl ResourceSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Secret { name, .. } => name,
        }
    }
}

/// Everything the engine needs from the cluster side.
#[async_trait]
pub trait Collaborator: Send + Sync {
    async fn list_resources(
        &self,
        kind: ResourceKind,
        scope: &NamespaceScope,
    ) -> Result<Vec<ResourceRow>>;

    async fn get_resource(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceDetail>;

    async fn delete_resource(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
        grace_period_seconds: Option<u32>,
    ) -> Result<()>;

    async fn create_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        spec: ResourceSpec,
    ) -> Result<()>;

    async fn update_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<()>;

    /// Runs an interactive command with the caller's terminal attached.
    async fn exec_interactive(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        command: &[String],
    ) -> Result<i32>;

    async fn stream_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        follow: bool,
    ) -> Result<LogStream>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{Collaborator, LogStream, ResourceDetail, ResourceSpec};
    use crate::model::{NamespaceScope, ResourceKind, ResourceRow};
    use anyhow::Result;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted collaborator that records every call it receives.
    #[derive(Default)]
    pub(crate) struct StubCollaborator {
        rows: Mutex<Vec<ResourceRow>>,
        failure: Option<String>,
        calls: Mutex<Vec<(String, String)>>,
        log_lines: Vec<String>,
        data: BTreeMap<String, String>,
        containers: Option<Vec<String>>,
        stalled_lists: AtomicUsize,
        endless_logs: bool,
    }

    impl StubCollaborator {
        pub(crate) fn with_rows(rows: Vec<ResourceRow>) -> Self {
            Self {
                rows: Mutex::new(rows),
                ..Self::default()
            }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self {
                failure: Some(message.to_string()),
                ..Self::default()
            }
        }

        pub(crate) fn with_logs(lines: &[&str]) -> Self {
            Self {
                log_lines: lines.iter().map(|line| line.to_string()).collect(),
                ..Self::default()
            }
        }

        pub(crate) fn with_data(data: &[(&str, &str)]) -> Self {
            Self {
                data: data
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect(),
                ..Self::default()
            }
        }

        pub(crate) fn with_containers(mut self, containers: &[&str]) -> Self {
            self.containers = Some(containers.iter().map(|name| name.to_string()).collect());
            self
        }

        /// The next `count` list calls never complete.
        pub(crate) fn stalling_lists(self, count: usize) -> Self {
            self.stalled_lists.store(count, Ordering::SeqCst);
            self
        }

        /// Log streams stay open after the scripted lines.
        pub(crate) fn endless_logs(mut self) -> Self {
            self.endless_logs = true;
            self
        }

        pub(crate) fn set_rows(&self, rows: Vec<ResourceRow>) {
            *self.rows.lock().unwrap() = rows;
        }

        pub(crate) fn calls(&self, operation: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(name, _)| name == operation)
                .count()
        }

        pub(crate) fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub(crate) fn last_call(&self, operation: &str) -> Option<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(name, _)| name == operation)
                .map(|(_, args)| args.clone())
        }

        fn record(&self, operation: &str, args: String) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((operation.to_string(), args));
            match &self.failure {
                Some(message) => Err(anyhow::anyhow!(message.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl Collaborator for StubCollaborator {
        async fn list_resources(
            &self,
            kind: ResourceKind,
            scope: &NamespaceScope,
        ) -> Result<Vec<ResourceRow>> {
            self.record("list_resources", format!("{kind} {scope}"))?;
            let stalled = self
                .stalled_lists
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if stalled {
                futures::future::pending::<()>().await;
            }
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn get_resource(
            &self,
            kind: ResourceKind,
            namespace: Option<&str>,
            name: &str,
        ) -> Result<ResourceDetail> {
            self.record("get_resource", format!("{kind} {namespace:?} {name}"))?;
            Ok(ResourceDetail {
                name: name.to_string(),
                namespace: namespace.map(str::to_string),
                manifest: format!("kind: {}\nname: {name}\n", kind.singular()),
                data: self.data.clone(),
                containers: self
                    .containers
                    .clone()
                    .unwrap_or_else(|| vec!["app".to_string()]),
            })
        }

        async fn delete_resource(
            &self,
            kind: ResourceKind,
            namespace: Option<&str>,
            name: &str,
            grace_period_seconds: Option<u32>,
        ) -> Result<()> {
            self.record(
                "delete_resource",
                format!("{kind} {namespace:?} {name} {grace_period_seconds:?}"),
            )
        }

        async fn create_resource(
            &self,
            kind: ResourceKind,
            namespace: &str,
            spec: ResourceSpec,
        ) -> Result<()> {
            self.record("create_resource", format!("{kind} {namespace} {spec:?}"))
        }

        async fn update_resource(
            &self,
            kind: ResourceKind,
            namespace: &str,
            name: &str,
            patch: serde_json::Value,
        ) -> Result<()> {
            self.record("update_resource", format!("{kind} {namespace} {name} {patch}"))
        }

        async fn exec_interactive(
            &self,
            namespace: &str,
            pod: &str,
            container: Option<&str>,
            command: &[String],
        ) -> Result<i32> {
            self.record(
                "exec_interactive",
                format!("{namespace} {pod} {container:?} {}", command.join(" ")),
            )?;
            Ok(0)
        }

        async fn stream_logs(
            &self,
            namespace: &str,
            pod: &str,
            container: Option<&str>,
            follow: bool,
        ) -> Result<LogStream> {
            self.record(
                "stream_logs",
                format!("{namespace} {pod} {container:?} follow={follow}"),
            )?;
            let lines = futures::stream::iter(self.log_lines.clone().into_iter().map(Ok));
            if self.endless_logs {
                Ok(lines.chain(futures::stream::pending()).boxed())
            } else {
                Ok(lines.boxed())
            }
        }
    }
}
