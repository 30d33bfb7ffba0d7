use crate::dispatch::{DispatchRequest, Operation};
use crate::list::{ListItem, ordinal_for};
use crate::model::{ResourceKind, ResourceRow};
use crate::wizard::WizardKind;

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MenuAction {
    Open(ResourceKind),
    Run(Operation),
    Dispatch(DispatchRequest),
    StartWizard(WizardKind),
    UseNamespace(String),
    UseNamespaceAll,
    Quit,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MenuItem {
    pub ordinal_key: Option<char>,
    pub title: String,
    pub description: String,
    pub icon: &'static str,
    pub action: MenuAction,
}

impl ListItem for MenuItem {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn ordinal_key(&self) -> Option<char> {
        self.ordinal_key
    }

    fn filter_fields(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.description.as_str()]
    }
}

pub fn main_menu() -> Vec<MenuItem> {
    let mut entries = ResourceKind::ALL
        .iter()
        .map(|kind| {
            (
                kind.title().to_string(),
                format!("Browse {}", kind.title().to_lowercase()),
                kind_icon(*kind),
                MenuAction::Open(*kind),
            )
        })
        .collect::<Vec<_>>();
    entries.push((
        "Create secret".to_string(),
        "Walk through a new secret".to_string(),
        "+",
        MenuAction::StartWizard(WizardKind::CreateSecret),
    ));
    entries.push((
        "Quit".to_string(),
        "Leave podnav".to_string(),
        "⏻",
        MenuAction::Quit,
    ));
    numbered(entries)
}

/// Actions offered for one selected row.
pub fn action_menu(kind: ResourceKind, row: &ResourceRow) -> Vec<MenuItem> {
    let mut entries = Vec::new();

    if kind == ResourceKind::Namespaces {
        entries.push((
            "Use namespace".to_string(),
            format!("Scope lists to {}", row.name),
            "◎",
            MenuAction::UseNamespace(row.name.clone()),
        ));
        entries.push((
            "Use all namespaces".to_string(),
            "List resources across every namespace".to_string(),
            "◉",
            MenuAction::UseNamespaceAll,
        ));
    }

    for operation in Operation::menu_for(kind) {
        entries.push((
            operation.label().to_string(),
            operation.description().to_string(),
            operation.icon(),
            MenuAction::Run(operation),
        ));

        if kind == ResourceKind::Deployments && entries.len() == 1 {
            if let Some(namespace) = &row.namespace {
                entries.push((
                    "Set env var".to_string(),
                    "Add or replace an environment variable".to_string(),
                    "⚙",
                    MenuAction::StartWizard(WizardKind::SetEnvVar {
                        namespace: namespace.clone(),
                        deployment: row.name.clone(),
                    }),
                ));
            }
        }
    }

    numbered(entries)
}

/// Actions offered for several selected rows at once.
pub fn bulk_action_menu(kind: ResourceKind) -> Vec<MenuItem> {
    let entries = Operation::menu_for(kind)
        .into_iter()
        .filter(Operation::accepts_many)
        .map(|operation| {
            (
                operation.label().to_string(),
                operation.description().to_string(),
                operation.icon(),
                MenuAction::Run(operation),
            )
        })
        .collect();
    numbered(entries)
}

/// One entry per container, each re-running `request` against it.
pub fn container_menu(request: &DispatchRequest, containers: &[String]) -> Vec<MenuItem> {
    let entries = containers
        .iter()
        .map(|container| {
            (
                container.clone(),
                format!("{} in {container}", request.operation.label()),
                "▣",
                MenuAction::Dispatch(request.clone().with_container(container.as_str())),
            )
        })
        .collect();
    numbered(entries)
}

fn numbered(entries: Vec<(String, String, &'static str, MenuAction)>) -> Vec<MenuItem> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, (title, description, icon, action))| MenuItem {
            ordinal_key: ordinal_for(index),
            title,
            description,
            icon,
            action,
        })
        .collect()
}

fn kind_icon(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Pods => "◆",
        ResourceKind::Secrets => "⚿",
        ResourceKind::ConfigMaps => "☰",
        ResourceKind::Deployments => "▲",
        ResourceKind::Namespaces => "◎",
    }
}
