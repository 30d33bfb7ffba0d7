use crate::collaborator::Collaborator;
use crate::dispatch::{Confirmation, DispatchRequest, Dispatcher, Operation, data_lines};
use crate::message::MessageLevel;
use crate::model::{NamespaceScope, ResourceKind, ResourceRow};
use anyhow::{Context, Result};
use futures::StreamExt;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_EXEC_COMMAND: &str = "/bin/sh";

/// Shared inputs for the one-shot subcommands.
pub struct CommandContext {
    pub collaborator: Arc<dyn Collaborator>,
    pub scope: NamespaceScope,
    /// Namespace for single-object commands when the scope spans all namespaces.
    pub default_namespace: String,
    pub grace_period: Option<u32>,
}

impl CommandContext {
    fn namespace(&self) -> &str {
        self.scope.namespace().unwrap_or(&self.default_namespace)
    }
}

pub async fn list(ctx: &CommandContext, kind: ResourceKind, out: &mut impl Write) -> Result<i32> {
    let rows = ctx.collaborator.list_resources(kind, &ctx.scope).await?;
    debug!("listed {} {kind} in {}", rows.len(), ctx.scope);
    if rows.is_empty() {
        writeln!(out, "No {} found ({})", kind.title().to_lowercase(), ctx.scope)?;
        return Ok(0);
    }
    for line in format_table(kind.headers(), &rows) {
        writeln!(out, "{line}")?;
    }
    Ok(0)
}

pub async fn secret(ctx: &CommandContext, name: &str, out: &mut impl Write) -> Result<i32> {
    let namespace = ctx.namespace();
    let detail = ctx
        .collaborator
        .get_resource(ResourceKind::Secrets, Some(namespace), name)
        .await
        .with_context(|| format!("failed to read secret {namespace}/{name}"))?;
    for line in data_lines(&detail.data) {
        writeln!(out, "{line}")?;
    }
    Ok(0)
}

/// Prints logs, stopping on end of stream or Ctrl-C when following.
pub async fn logs(
    ctx: &CommandContext,
    pod: &str,
    container: Option<&str>,
    follow: bool,
    out: &mut impl Write,
) -> Result<i32> {
    let namespace = ctx.namespace();
    let mut stream = ctx
        .collaborator
        .stream_logs(namespace, pod, container, follow)
        .await
        .with_context(|| format!("failed to open logs for {namespace}/{pod}"))?;

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            _ = &mut interrupt => {
                debug!("log stream interrupted");
                break;
            }
            next = stream.next() => match next {
                Some(line) => {
                    writeln!(out, "{}", line?)?;
                    out.flush()?;
                }
                None => break,
            },
        }
    }
    Ok(0)
}

pub async fn exec(
    ctx: &CommandContext,
    pod: &str,
    container: Option<&str>,
    command: Vec<String>,
) -> Result<i32> {
    let command = if command.is_empty() {
        vec![DEFAULT_EXEC_COMMAND.to_string()]
    } else {
        command
    };
    ctx.collaborator
        .exec_interactive(ctx.namespace(), pod, container, &command)
        .await
}

/// Deletes one object, asking on `input` unless `assume_yes` is set.
pub async fn delete(
    ctx: &CommandContext,
    kind: ResourceKind,
    name: &str,
    grace: Option<u32>,
    assume_yes: bool,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<i32> {
    let namespace = kind.is_namespaced().then(|| ctx.namespace().to_string());
    let request = DispatchRequest::on_rows(
        Operation::Delete,
        kind,
        vec![ResourceRow::named(kind, namespace, name)],
    );

    let confirmation = if assume_yes {
        Confirmation::Affirmed
    } else {
        write!(out, "{}? [y/N] ", request.prompt())?;
        out.flush()?;
        let mut answer = String::new();
        input.read_line(&mut answer)?;
        parse_confirmation(&answer)
    };

    let dispatcher = Dispatcher::new(ctx.collaborator.clone(), grace.or(ctx.grace_period));
    let outcome = dispatcher.dispatch(&request, confirmation).await;
    writeln!(out, "{}", outcome.message.text)?;
    Ok(exit_code(outcome.message.level))
}

fn parse_confirmation(answer: &str) -> Confirmation {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Confirmation::Affirmed,
        _ => Confirmation::Declined,
    }
}

fn exit_code(level: MessageLevel) -> i32 {
    match level {
        MessageLevel::Error => 1,
        MessageLevel::Info | MessageLevel::Success => 0,
    }
}

/// Left-aligned columns padded to the widest cell, two spaces apart.
fn format_table(headers: &[&str], rows: &[ResourceRow]) -> Vec<String> {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(&row.columns) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header = headers
        .iter()
        .map(|header| header.to_uppercase())
        .collect::<Vec<_>>();
    let mut lines = vec![render(&header)];
    lines.extend(rows.iter().map(|row| render(&row.columns)));
    lines
}
