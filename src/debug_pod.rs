use anyhow::{Context, Result};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::config::DebugPodConfig;
use crate::kubectl::{CommandOutput, KubectlGateway};

/// The slice of the gateway the debug-pod lifecycle needs. A seam rather
/// than a direct dependency so the one-teardown-per-provision guarantee is
/// testable with a counting fake.
pub trait NodeShellOps {
    async fn apply_manifest(&self, manifest: &str) -> Result<CommandOutput>;
    async fn pod_phase(&self, namespace: Option<&str>, name: &str) -> Result<String>;
    async fn attach_shell(&self, namespace: Option<&str>, name: &str, shell: &str) -> Result<bool>;
    async fn delete_pod(&self, namespace: Option<&str>, name: &str) -> Result<CommandOutput>;
}

impl NodeShellOps for KubectlGateway {
    async fn apply_manifest(&self, manifest: &str) -> Result<CommandOutput> {
        KubectlGateway::apply_manifest(self, manifest).await
    }

    async fn pod_phase(&self, namespace: Option<&str>, name: &str) -> Result<String> {
        KubectlGateway::pod_phase(self, namespace, name).await
    }

    async fn attach_shell(&self, namespace: Option<&str>, name: &str, shell: &str) -> Result<bool> {
        let status = self.exec_shell(namespace, name, None, shell).await?;
        Ok(status.success())
    }

    async fn delete_pod(&self, namespace: Option<&str>, name: &str) -> Result<CommandOutput> {
        KubectlGateway::delete_pod(self, namespace, name).await
    }
}

/// Typed descriptor for the privileged helper pod pinned to one node.
/// Serialized to YAML for `kubectl apply -f -`.
#[derive(Debug, Clone)]
pub struct DebugPodSpec {
    pub name: String,
    pub namespace: String,
    pub node: String,
    pub image: String,
    pub host_network: bool,
}

impl DebugPodSpec {
    pub fn new(node: &str, config: &DebugPodConfig) -> Self {
        Self {
            name: generate_pod_name(node),
            namespace: config.namespace.clone(),
            node: node.to_string(),
            image: config.image.clone(),
            host_network: config.host_network,
        }
    }

    pub fn manifest(&self) -> Result<String> {
        let manifest = PodManifest {
            api_version: "v1",
            kind: "Pod",
            metadata: Metadata {
                name: self.name.clone(),
                namespace: self.namespace.clone(),
                labels: BTreeMap::from([("app.kubernetes.io/managed-by", "kpick")]),
            },
            spec: PodSpec {
                node_name: self.node.clone(),
                host_network: self.host_network,
                host_pid: true,
                restart_policy: "Never",
                tolerations: vec![Toleration { operator: "Exists" }],
                containers: vec![ContainerSpec {
                    name: "shell",
                    image: self.image.clone(),
                    command: vec!["sleep", "infinity"],
                    stdin: true,
                    tty: true,
                    security_context: SecurityContext { privileged: true },
                    volume_mounts: vec![VolumeMount {
                        name: "host-root",
                        mount_path: "/host",
                    }],
                }],
                volumes: vec![Volume {
                    name: "host-root",
                    host_path: HostPath { path: "/" },
                }],
            },
        };
        serde_yaml::to_string(&manifest).context("failed to serialize debug pod manifest")
    }
}

/// Names must be DNS-1123 labels; the random suffix keeps concurrent
/// invocations against the same node from colliding.
fn generate_pod_name(node: &str) -> String {
    let node_part: String = node
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .take(20)
        .collect();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("kpick-debug-{}-{}", node_part.trim_matches('-'), suffix)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PodManifest {
    api_version: &'static str,
    kind: &'static str,
    metadata: Metadata,
    spec: PodSpec,
}

#[derive(Serialize)]
struct Metadata {
    name: String,
    namespace: String,
    labels: BTreeMap<&'static str, &'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PodSpec {
    node_name: String,
    host_network: bool,
    host_pid: bool,
    restart_policy: &'static str,
    tolerations: Vec<Toleration>,
    containers: Vec<ContainerSpec>,
    volumes: Vec<Volume>,
}

#[derive(Serialize)]
struct Toleration {
    operator: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContainerSpec {
    name: &'static str,
    image: String,
    command: Vec<&'static str>,
    stdin: bool,
    tty: bool,
    security_context: SecurityContext,
    volume_mounts: Vec<VolumeMount>,
}

#[derive(Serialize)]
struct SecurityContext {
    privileged: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VolumeMount {
    name: &'static str,
    mount_path: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    name: &'static str,
    host_path: HostPath,
}

#[derive(Serialize)]
struct HostPath {
    path: &'static str,
}

#[derive(Debug, Clone)]
pub struct DebugPodHandle {
    pub name: String,
    pub namespace: String,
}

/// Owns the full lifecycle of one debug pod: provision, attach, teardown.
/// The pod is released exactly once on every exit path.
pub struct DebugPodManager<'a, G> {
    ops: &'a G,
    config: &'a DebugPodConfig,
}

impl<'a, G: NodeShellOps> DebugPodManager<'a, G> {
    pub fn new(ops: &'a G, config: &'a DebugPodConfig) -> Self {
        Self { ops, config }
    }

    /// Applies the manifest and polls phase until Running. Timing out is a
    /// hard error; the half-provisioned pod is deleted before returning it.
    pub async fn provision(&self, spec: &DebugPodSpec) -> Result<DebugPodHandle> {
        let manifest = spec.manifest()?;
        let applied = self.ops.apply_manifest(&manifest).await?;
        if !applied.success {
            anyhow::bail!("debug pod apply failed: {}", applied.rendered());
        }

        let handle = DebugPodHandle {
            name: spec.name.clone(),
            namespace: spec.namespace.clone(),
        };
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let deadline = Instant::now() + Duration::from_secs(self.config.provision_timeout_secs);

        loop {
            match self
                .ops
                .pod_phase(Some(&handle.namespace), &handle.name)
                .await
            {
                Ok(phase) if phase == "Running" => {
                    debug!("debug pod {} is running", handle.name);
                    return Ok(handle);
                }
                Ok(phase) => debug!("debug pod {} phase: {phase}", handle.name),
                Err(error) => debug!("debug pod {} phase poll failed: {error:#}", handle.name),
            }

            if Instant::now() >= deadline {
                self.teardown(&handle).await;
                anyhow::bail!(
                    "debug pod {} did not reach Running within {}s",
                    handle.name,
                    self.config.provision_timeout_secs
                );
            }
            sleep(poll_interval).await;
        }
    }

    pub async fn attach(&self, handle: &DebugPodHandle, shell: &str) -> Result<()> {
        let clean_exit = self
            .ops
            .attach_shell(Some(&handle.namespace), &handle.name, shell)
            .await?;
        if !clean_exit {
            anyhow::bail!("debug pod shell for {} exited abnormally", handle.name);
        }
        Ok(())
    }

    /// Teardown never propagates its own failure; a leaked pod is logged so
    /// the operator can clean it up by hand.
    pub async fn teardown(&self, handle: &DebugPodHandle) {
        match self
            .ops
            .delete_pod(Some(&handle.namespace), &handle.name)
            .await
        {
            Ok(output) if output.success => debug!("debug pod {} deleted", handle.name),
            Ok(output) => warn!(
                "debug pod {} may be leaked: {}",
                handle.name,
                output.rendered()
            ),
            Err(error) => warn!("debug pod {} may be leaked: {error:#}", handle.name),
        }
    }

    /// Full session for a node shell. Attach failures still tear down.
    pub async fn shell_session(&self, node: &str, shell: &str) -> Result<()> {
        let spec = DebugPodSpec::new(node, self.config);
        let handle = self.provision(&spec).await?;
        let attach_result = self.attach(&handle, shell).await;
        self.teardown(&handle).await;
        attach_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeOps {
        phases: Mutex<Vec<&'static str>>,
        applies: AtomicUsize,
        attaches: AtomicUsize,
        deletes: AtomicUsize,
        attach_clean: bool,
    }

    impl FakeOps {
        fn with_phases(phases: Vec<&'static str>, attach_clean: bool) -> Self {
            Self {
                phases: Mutex::new(phases),
                attach_clean,
                ..Self::default()
            }
        }
    }

    impl NodeShellOps for FakeOps {
        async fn apply_manifest(&self, _manifest: &str) -> Result<CommandOutput> {
            self.applies.fetch_add(1, Ordering::SeqCst);
            Ok(ok_output())
        }

        async fn pod_phase(&self, _namespace: Option<&str>, _name: &str) -> Result<String> {
            let mut phases = self.phases.lock().unwrap();
            let phase = if phases.len() > 1 {
                phases.remove(0)
            } else {
                phases.first().copied().unwrap_or("Pending")
            };
            Ok(phase.to_string())
        }

        async fn attach_shell(
            &self,
            _namespace: Option<&str>,
            _name: &str,
            _shell: &str,
        ) -> Result<bool> {
            self.attaches.fetch_add(1, Ordering::SeqCst);
            Ok(self.attach_clean)
        }

        async fn delete_pod(&self, _namespace: Option<&str>, _name: &str) -> Result<CommandOutput> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(ok_output())
        }
    }

    fn ok_output() -> CommandOutput {
        CommandOutput {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    fn fast_config() -> DebugPodConfig {
        DebugPodConfig {
            poll_interval_ms: 1,
            provision_timeout_secs: 1,
            ..DebugPodConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_session_tears_down_exactly_once() {
        let ops = FakeOps::with_phases(vec!["Pending", "Running"], true);
        let config = fast_config();
        let manager = DebugPodManager::new(&ops, &config);

        manager.shell_session("node-a", "/bin/sh").await.unwrap();

        assert_eq!(ops.applies.load(Ordering::SeqCst), 1);
        assert_eq!(ops.attaches.load(Ordering::SeqCst), 1);
        assert_eq!(ops.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_attach_still_tears_down_exactly_once() {
        let ops = FakeOps::with_phases(vec!["Running"], false);
        let config = fast_config();
        let manager = DebugPodManager::new(&ops, &config);

        let result = manager.shell_session("node-a", "/bin/sh").await;

        assert!(result.is_err());
        assert_eq!(ops.applies.load(Ordering::SeqCst), 1);
        assert_eq!(ops.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn provision_timeout_is_a_hard_error_and_releases_the_pod() {
        let ops = FakeOps::with_phases(vec!["Pending"], true);
        let config = fast_config();
        let manager = DebugPodManager::new(&ops, &config);

        let result = manager.shell_session("node-a", "/bin/sh").await;

        assert!(result.is_err());
        assert_eq!(ops.attaches.load(Ordering::SeqCst), 0);
        assert_eq!(ops.deletes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn manifest_pins_node_and_privilege() {
        let config = DebugPodConfig::default();
        let spec = DebugPodSpec::new("worker-1", &config);
        let manifest = spec.manifest().unwrap();
        assert!(manifest.contains("nodeName: worker-1"));
        assert!(manifest.contains("privileged: true"));
        assert!(manifest.contains("hostNetwork: true"));
        assert!(manifest.contains("mountPath: /host"));
        assert!(manifest.contains("restartPolicy: Never"));
    }

    #[test]
    fn manifest_honors_host_network_flag() {
        let config = DebugPodConfig {
            host_network: false,
            ..DebugPodConfig::default()
        };
        let spec = DebugPodSpec::new("worker-1", &config);
        let manifest = spec.manifest().unwrap();
        assert!(manifest.contains("hostNetwork: false"));
    }

    #[test]
    fn generated_names_are_dns_safe_and_distinct() {
        let config = DebugPodConfig::default();
        let first = DebugPodSpec::new("Worker_Node.1", &config);
        let second = DebugPodSpec::new("Worker_Node.1", &config);
        assert_ne!(first.name, second.name);
        for name in [&first.name, &second.name] {
            assert!(
                name.chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            );
            assert!(name.starts_with("kpick-debug-"));
        }
    }
}
