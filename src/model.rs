use crate::list::ListItem;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Pods,
    Secrets,
    ConfigMaps,
    Deployments,
    Namespaces,
}

impl ResourceKind {
    pub const ALL: [Self; 5] = [
        Self::Pods,
        Self::Secrets,
        Self::ConfigMaps,
        Self::Deployments,
        Self::Namespaces,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Pods => "Pods",
            Self::Secrets => "Secrets",
            Self::ConfigMaps => "ConfigMaps",
            Self::Deployments => "Deployments",
            Self::Namespaces => "Namespaces",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            Self::Pods => "pod",
            Self::Secrets => "secret",
            Self::ConfigMaps => "configmap",
            Self::Deployments => "deployment",
            Self::Namespaces => "namespace",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "po" | "pod" | "pods" => Some(Self::Pods),
            "secret" | "secrets" => Some(Self::Secrets),
            "cm" | "configmap" | "configmaps" | "config-map" | "config-maps" => {
                Some(Self::ConfigMaps)
            }
            "deploy" | "deployment" | "deployments" | "dp" => Some(Self::Deployments),
            "ns" | "namespace" | "namespaces" => Some(Self::Namespaces),
            _ => None,
        }
    }

    pub fn is_namespaced(self) -> bool {
        !matches!(self, Self::Namespaces)
    }

    pub fn supports_multi_select(self) -> bool {
        matches!(self, Self::Pods | Self::Secrets | Self::ConfigMaps)
    }

    pub fn headers(self) -> &'static [&'static str] {
        match self {
            Self::Pods => &["Name", "Namespace", "Node", "Ready", "Status", "Restarts", "Age"],
            Self::Secrets => &["Name", "Namespace", "Type", "Data", "Age"],
            Self::ConfigMaps => &["Name", "Namespace", "Data", "Age"],
            Self::Deployments => &["Name", "Namespace", "Ready", "Up-to-date", "Available", "Age"],
            Self::Namespaces => &["Name", "Status", "Age"],
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NamespaceScope {
    All,
    Named(String),
}

impl NamespaceScope {
    pub fn label(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Named(namespace) => namespace.clone(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Named(namespace) => Some(namespace),
        }
    }
}

impl Display for NamespaceScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Summary projection of one cluster object, replaced wholesale on reload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResourceRow {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
    pub status: String,
    pub age: String,
    pub node: Option<String>,
    pub columns: Vec<String>,
}

impl ResourceRow {
    /// A row known only by name, for targets that did not come from a list.
    pub fn named(kind: ResourceKind, namespace: Option<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind,
            columns: vec![name.clone()],
            name,
            namespace,
            status: String::new(),
            age: String::new(),
            node: None,
        }
    }

    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl ListItem for ResourceRow {
    fn title(&self) -> String {
        self.name.clone()
    }

    fn filter_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.status.as_str()];
        if let Some(namespace) = &self.namespace {
            fields.push(namespace);
        }
        if let Some(node) = &self.node {
            fields.push(node);
        }
        fields
    }
}

#[cfg(test)]
pub(crate) fn sample_row(kind: ResourceKind, namespace: &str, name: &str, status: &str) -> ResourceRow {
    ResourceRow {
        kind,
        name: name.to_string(),
        namespace: Some(namespace.to_string()),
        status: status.to_string(),
        age: "1m".to_string(),
        node: None,
        columns: vec![name.to_string(), namespace.to_string(), status.to_string()],
    }
}
