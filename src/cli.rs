use crate::model::ResourceKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "podnav",
    version,
    about = "Browse and operate pods, secrets and deployments on a GKE cluster."
)]
pub struct CliArgs {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Namespace to operate in
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    /// Operate across all namespaces
    #[arg(short = 'A', long, global = true)]
    pub all_namespaces: bool,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_filter: String,

    /// Write logs to this file while the TUI is running
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Fetch cluster credentials with gcloud
    Auth,

    /// Print resources of one kind
    List {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
    },

    /// Print the decoded data of a secret
    Secret { name: String },

    /// Print pod logs
    Logs {
        pod: String,
        #[arg(short, long)]
        container: Option<String>,
        /// Keep streaming until interrupted
        #[arg(short, long)]
        follow: bool,
    },

    /// Run an interactive command in a pod
    Exec {
        pod: String,
        #[arg(short, long)]
        container: Option<String>,
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Delete a resource after confirmation
    Delete {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        name: String,
        /// Grace period in seconds, overriding the configured one
        #[arg(long)]
        grace: Option<u32>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn parse_kind(token: &str) -> Result<ResourceKind, String> {
    ResourceKind::from_token(token).ok_or_else(|| {
        format!("unknown resource kind '{token}' (expected pods, secrets, configmaps, deployments or namespaces)")
    })
}

#[cfg(test)]
mod tests {
    use super::{CliArgs, Command};
    use crate::model::ResourceKind;
    use clap::Parser;

    #[test]
    fn no_subcommand_starts_tui() {
        let args = CliArgs::try_parse_from(["podnav", "-n", "payments"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.namespace.as_deref(), Some("payments"));
        assert_eq!(args.log_filter, "info");
    }

    #[test]
    fn list_accepts_kind_aliases() {
        let args = CliArgs::try_parse_from(["podnav", "list", "cm", "-A"]).unwrap();
        assert!(args.all_namespaces);
        assert!(matches!(
            args.command,
            Some(Command::List {
                kind: ResourceKind::ConfigMaps
            })
        ));
        assert!(CliArgs::try_parse_from(["podnav", "list", "nodes"]).is_err());
    }

    #[test]
    fn exec_collects_trailing_command() {
        let args =
            CliArgs::try_parse_from(["podnav", "exec", "api-0", "-c", "app", "--", "ls", "-la"])
                .unwrap();
        let Some(Command::Exec {
            pod,
            container,
            command,
        }) = args.command
        else {
            panic!("expected exec");
        };
        assert_eq!(pod, "api-0");
        assert_eq!(container.as_deref(), Some("app"));
        assert_eq!(command, vec!["ls".to_string(), "-la".to_string()]);
    }

    #[test]
    fn delete_takes_grace_override() {
        let args =
            CliArgs::try_parse_from(["podnav", "delete", "pod", "api-0", "--grace", "0", "-y"])
                .unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Delete {
                kind: ResourceKind::Pods,
                grace: Some(0),
                yes: true,
                ..
            })
        ));
    }
}
