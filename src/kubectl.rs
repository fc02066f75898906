use anyhow::{Context, Result};
use chrono::Local;
use serde_json::Value;
use std::io::BufRead;
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::model::{ResourceKind, ResourceRow, ResourceTable};

/// Captured result of a non-interactive kubectl invocation. Failures are
/// carried as data so they can be rendered on the same channel as success
/// output instead of tearing down the loop.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    fn from_output(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    pub fn rendered(&self) -> String {
        let body = if self.stderr.trim().is_empty() {
            self.stdout.clone()
        } else if self.stdout.trim().is_empty() {
            format!("stderr:\n{}", self.stderr)
        } else {
            format!("stdout:\n{}\n\nstderr:\n{}", self.stdout, self.stderr)
        };

        if self.success {
            body
        } else {
            format!("command exited with {}\n\n{}", self.status, body)
        }
    }
}

/// All cluster access goes through the external CLI; this gateway owns the
/// argument shape and the capture/inherit split for its invocations.
#[derive(Debug, Clone)]
pub struct KubectlGateway {
    program: String,
    namespace: Option<String>,
    all_namespaces: bool,
}

impl KubectlGateway {
    pub fn new(program: String, namespace: Option<String>, all_namespaces: bool) -> Self {
        Self {
            program,
            namespace,
            all_namespaces,
        }
    }

    async fn run_captured(&self, args: &[String]) -> Result<CommandOutput> {
        debug!("kubectl {}", args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("failed to run {} {}", self.program, args.join(" ")))?;
        Ok(CommandOutput::from_output(output))
    }

    async fn run_interactive(&self, args: &[String]) -> Result<ExitStatus> {
        debug!("kubectl (interactive) {}", args.join(" "));
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .with_context(|| format!("failed to run {} {}", self.program, args.join(" ")))
    }

    fn listing_scope(&self) -> Vec<String> {
        if self.all_namespaces {
            vec!["--all-namespaces".to_string()]
        } else if let Some(namespace) = &self.namespace {
            vec!["--namespace".to_string(), namespace.clone()]
        } else {
            Vec::new()
        }
    }

    fn namespace_scope(&self, namespace: Option<&str>) -> Vec<String> {
        match namespace.or(self.namespace.as_deref()) {
            Some(namespace) => vec!["--namespace".to_string(), namespace.to_string()],
            None => Vec::new(),
        }
    }

    /// `kubectl get <kind> [-o wide]`. Query failures and empty listings
    /// come back as a table with the error flag set, never as an Err.
    pub async fn fetch_table(&self, kind: &ResourceKind, wide: bool) -> Result<ResourceTable> {
        let mut args = vec!["get".to_string(), kind.as_str().to_string()];
        if wide {
            args.push("--output".to_string());
            args.push("wide".to_string());
        }
        args.extend(self.listing_scope());

        let output = self.run_captured(&args).await?;
        if !output.success {
            return Ok(ResourceTable::with_error(output.rendered(), Local::now()));
        }

        let table = ResourceTable::from_lines(output.stdout.lines(), Local::now());
        if table.is_empty() {
            let mut table = table;
            table.error = Some(format!("no {kind} found"));
            return Ok(table);
        }
        Ok(table)
    }

    /// Builds a table from piped stdin instead of querying the cluster.
    pub fn table_from_reader(reader: impl BufRead) -> ResourceTable {
        let lines = reader.lines().map_while(Result::ok);
        ResourceTable::from_lines(lines, Local::now())
    }

    /// Resource kinds the cluster reports as supporting `get`; the source
    /// of the dashboard kind picker.
    pub async fn api_resource_kinds(&self) -> Result<Vec<String>> {
        let args = vec![
            "api-resources".to_string(),
            "--verbs=get".to_string(),
            "--output".to_string(),
            "name".to_string(),
        ];
        let output = self.run_captured(&args).await?;
        if !output.success {
            anyhow::bail!("api-resources discovery failed: {}", output.rendered());
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    pub async fn describe(&self, kind: &ResourceKind, rows: &[ResourceRow]) -> Result<CommandOutput> {
        self.per_namespace_verb(rows, |namespace, names| {
            let mut args = vec!["describe".to_string(), kind.as_str().to_string()];
            args.extend(names.iter().cloned());
            args.extend(self.namespace_scope(namespace));
            args
        })
        .await
    }

    pub async fn get_dump(
        &self,
        kind: &ResourceKind,
        rows: &[ResourceRow],
        format: &str,
    ) -> Result<CommandOutput> {
        self.per_namespace_verb(rows, |namespace, names| {
            let mut args = vec!["get".to_string(), kind.as_str().to_string()];
            args.extend(names.iter().cloned());
            args.push("--output".to_string());
            args.push(format.to_string());
            args.extend(self.namespace_scope(namespace));
            args
        })
        .await
    }

    pub async fn delete(&self, kind: &ResourceKind, rows: &[ResourceRow]) -> Result<CommandOutput> {
        self.per_namespace_verb(rows, |namespace, names| {
            let mut args = vec!["delete".to_string(), kind.as_str().to_string()];
            args.extend(names.iter().cloned());
            args.extend(self.namespace_scope(namespace));
            args
        })
        .await
    }

    pub async fn uncordon(&self, names: &[String]) -> Result<CommandOutput> {
        let mut args = vec!["uncordon".to_string()];
        args.extend(names.iter().cloned());
        self.run_captured(&args).await
    }

    async fn jsonpath(
        &self,
        namespace: Option<&str>,
        kind: &str,
        name: &str,
        path: &str,
    ) -> Result<CommandOutput> {
        let mut args = vec![
            "get".to_string(),
            kind.to_string(),
            name.to_string(),
            "--output".to_string(),
            format!("jsonpath={{{path}}}"),
        ];
        args.extend(self.namespace_scope(namespace));
        self.run_captured(&args).await
    }

    pub async fn pod_containers(&self, namespace: Option<&str>, pod: &str) -> Result<Vec<String>> {
        let output = self
            .jsonpath(namespace, "pod", pod, ".spec.containers[*].name")
            .await?;
        if !output.success {
            anyhow::bail!("failed to list containers for {pod}: {}", output.rendered());
        }
        Ok(output
            .stdout
            .split_whitespace()
            .map(String::from)
            .collect())
    }

    pub async fn pod_node(&self, namespace: Option<&str>, pod: &str) -> Result<String> {
        let output = self.jsonpath(namespace, "pod", pod, ".spec.nodeName").await?;
        if !output.success {
            anyhow::bail!("failed to resolve node for {pod}: {}", output.rendered());
        }
        let node = output.stdout.trim().to_string();
        if node.is_empty() {
            anyhow::bail!("pod {pod} is not scheduled to a node");
        }
        Ok(node)
    }

    pub async fn pod_phase(&self, namespace: Option<&str>, pod: &str) -> Result<String> {
        let output = self.jsonpath(namespace, "pod", pod, ".status.phase").await?;
        if !output.success {
            anyhow::bail!("failed to read phase of {pod}: {}", output.rendered());
        }
        Ok(output.stdout.trim().to_string())
    }

    /// Curated info for a single pod: name, namespace, labels, containers.
    pub async fn pod_info(&self, namespace: Option<&str>, pod: &str) -> Result<String> {
        let mut args = vec![
            "get".to_string(),
            "pod".to_string(),
            pod.to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        args.extend(self.namespace_scope(namespace));
        let output = self.run_captured(&args).await?;
        if !output.success {
            return Ok(output.rendered());
        }
        let value: Value = serde_json::from_str(&output.stdout)
            .with_context(|| format!("unexpected kubectl json for pod {pod}"))?;
        Ok(curate_pod_info(&value))
    }

    pub async fn apply_manifest(&self, manifest: &str) -> Result<CommandOutput> {
        debug!("kubectl apply -f - ({} bytes)", manifest.len());
        let mut child = Command::new(&self.program)
            .args(["apply", "-f", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {} apply", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(manifest.as_bytes())
                .await
                .context("failed to stream manifest to kubectl apply")?;
        }

        let output = child
            .wait_with_output()
            .await
            .context("kubectl apply did not complete")?;
        Ok(CommandOutput::from_output(output))
    }

    pub async fn delete_pod(&self, namespace: Option<&str>, name: &str) -> Result<CommandOutput> {
        let mut args = vec![
            "delete".to_string(),
            "pod".to_string(),
            name.to_string(),
            "--wait=false".to_string(),
        ];
        args.extend(self.namespace_scope(namespace));
        self.run_captured(&args).await
    }

    pub async fn exec_shell(
        &self,
        namespace: Option<&str>,
        pod: &str,
        container: Option<&str>,
        shell: &str,
    ) -> Result<ExitStatus> {
        let mut args = vec!["exec".to_string(), "-it".to_string()];
        args.extend(self.namespace_scope(namespace));
        args.push(pod.to_string());
        if let Some(container) = container {
            args.push("--container".to_string());
            args.push(container.to_string());
        }
        args.push("--".to_string());
        args.push(shell.to_string());
        self.run_interactive(&args).await
    }

    pub async fn exec_command(
        &self,
        namespace: Option<&str>,
        pod: &str,
        container: Option<&str>,
        command_line: &str,
    ) -> Result<CommandOutput> {
        let mut args = vec!["exec".to_string()];
        args.extend(self.namespace_scope(namespace));
        args.push(pod.to_string());
        if let Some(container) = container {
            args.push("--container".to_string());
            args.push(container.to_string());
        }
        args.push("--".to_string());
        args.extend(command_line.split_whitespace().map(String::from));
        self.run_captured(&args).await
    }

    pub async fn follow_logs(
        &self,
        namespace: Option<&str>,
        pod: &str,
        container: Option<&str>,
        tail: u32,
    ) -> Result<ExitStatus> {
        let mut args = vec![
            "logs".to_string(),
            "--follow".to_string(),
            format!("--tail={tail}"),
        ];
        args.extend(self.namespace_scope(namespace));
        args.push(pod.to_string());
        if let Some(container) = container {
            args.push("--container".to_string());
            args.push(container.to_string());
        }
        self.run_interactive(&args).await
    }

    pub async fn edit(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        names: &[String],
    ) -> Result<ExitStatus> {
        let mut args = vec!["edit".to_string(), kind.as_str().to_string()];
        args.extend(names.iter().cloned());
        args.extend(self.namespace_scope(namespace));

        let mut cmd = Command::new(&self.program);
        cmd.args(&args);
        if std::env::var_os("KUBE_EDITOR").is_none()
            && let Some(editor) = std::env::var_os("EDITOR")
        {
            cmd.env("KUBE_EDITOR", editor);
        }
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd.status()
            .await
            .with_context(|| format!("failed to run {} edit {kind}", self.program))
    }

    /// Runs one invocation per distinct row namespace, preserving first-seen
    /// order, and concatenates the rendered outputs. A listing without
    /// namespaces collapses to a single call.
    async fn per_namespace_verb<F>(&self, rows: &[ResourceRow], build: F) -> Result<CommandOutput>
    where
        F: Fn(Option<&str>, &[String]) -> Vec<String>,
    {
        let groups = group_rows_by_namespace(rows);
        let mut merged = CommandOutput {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: String::new(),
            stderr: String::new(),
        };

        for (namespace, names) in groups {
            let args = build(namespace.as_deref(), &names);
            let output = self.run_captured(&args).await?;
            if !output.success {
                merged.success = false;
                merged.status = output.status.clone();
            }
            if !merged.stdout.is_empty() && !output.stdout.is_empty() {
                merged.stdout.push('\n');
            }
            merged.stdout.push_str(&output.stdout);
            merged.stderr.push_str(&output.stderr);
        }

        Ok(merged)
    }
}

pub fn group_rows_by_namespace(rows: &[ResourceRow]) -> Vec<(Option<String>, Vec<String>)> {
    let mut groups: Vec<(Option<String>, Vec<String>)> = Vec::new();
    for row in rows {
        match groups.iter_mut().find(|(ns, _)| *ns == row.namespace) {
            Some((_, names)) => names.push(row.name.clone()),
            None => groups.push((row.namespace.clone(), vec![row.name.clone()])),
        }
    }
    groups
}

fn curate_pod_info(value: &Value) -> String {
    let name = value
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or("-");
    let namespace = value
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
        .unwrap_or("-");

    let mut out = format!("name: {name}\nnamespace: {namespace}\n");

    out.push_str("labels:\n");
    match value.pointer("/metadata/labels").and_then(Value::as_object) {
        Some(labels) if !labels.is_empty() => {
            for (key, label) in labels {
                out.push_str(&format!("  {key}: {}\n", label.as_str().unwrap_or("-")));
            }
        }
        _ => out.push_str("  (none)\n"),
    }

    out.push_str("containers:\n");
    match value.pointer("/spec/containers").and_then(Value::as_array) {
        Some(containers) if !containers.is_empty() => {
            for container in containers {
                let container_name = container
                    .pointer("/name")
                    .and_then(Value::as_str)
                    .unwrap_or("-");
                out.push_str(&format!("  - {container_name}\n"));
            }
        }
        _ => out.push_str("  (none)\n"),
    }

    out
}
