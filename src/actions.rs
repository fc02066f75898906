use anyhow::Result;

use crate::config::Config;
use crate::kubectl::{KubectlGateway, group_rows_by_namespace};
use crate::model::{ExportTarget, KindClass, ResourceKind, ResourceRow, export_target};

/// What the pressed key asks for, before the resource kind gives it a
/// concrete meaning. Kind-agnostic by design; the same physical key maps to
/// different primitives per kind class.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ActionKey {
    Describe,
    Logs,
    Shell,
    RunCommand,
    CopyOwner,
    Delete,
    Edit,
    DumpYaml,
    DumpJson,
    Info,
    ExportColumn(u8),
    Confirm,
}

/// A concrete action after kind-class resolution.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Action {
    Describe,
    Edit,
    Logs,
    PodShell,
    NodeShell,
    RunCommand,
    CopyOwnerNode,
    Uncordon,
    Delete,
    DumpYaml,
    DumpJson,
    PodInfo,
    NodeInfo,
    DescribeInfo,
    CopyNames,
    CopyColumn(u8),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Resolution {
    Run(Action),
    NoOp,
    Refused(&'static str),
}

/// The key/kind transition table. Keys that are meaningless for a kind
/// resolve to NoOp and never reach the cluster.
pub fn resolve(key: ActionKey, class: KindClass) -> Resolution {
    use ActionKey as K;
    use KindClass as C;

    match (key, class) {
        (K::Describe, _) => Resolution::Run(Action::Describe),
        (K::Edit, _) => Resolution::Run(Action::Edit),
        (K::DumpYaml, _) => Resolution::Run(Action::DumpYaml),
        (K::DumpJson, _) => Resolution::Run(Action::DumpJson),
        (K::Confirm, _) => Resolution::Run(Action::CopyNames),
        (K::ExportColumn(n), _) => Resolution::Run(Action::CopyColumn(n)),

        (K::Logs, C::Pod) => Resolution::Run(Action::Logs),
        (K::Logs, _) => Resolution::NoOp,

        (K::Shell, C::Pod) => Resolution::Run(Action::PodShell),
        (K::Shell, C::Node) => Resolution::Run(Action::NodeShell),
        (K::Shell, C::Other) => Resolution::NoOp,

        (K::RunCommand, C::Pod) => Resolution::Run(Action::RunCommand),
        (K::RunCommand, _) => Resolution::NoOp,

        (K::CopyOwner, C::Pod) => Resolution::Run(Action::CopyOwnerNode),
        (K::CopyOwner, C::Node) => Resolution::Run(Action::Uncordon),
        (K::CopyOwner, C::Other) => Resolution::NoOp,

        (K::Delete, C::Node) => {
            Resolution::Refused("refusing to delete a node; cordon/drain it instead")
        }
        (K::Delete, _) => Resolution::Run(Action::Delete),

        (K::Info, C::Pod) => Resolution::Run(Action::PodInfo),
        (K::Info, C::Node) => Resolution::Run(Action::NodeInfo),
        (K::Info, C::Other) => Resolution::Run(Action::DescribeInfo),
    }
}

/// Sub-pick follow-ups that need a container before they can run.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ContainerAction {
    Logs,
    Shell,
    RunCommand,
}

/// Long-running commands that inherit the terminal; the caller suspends the
/// TUI around them.
#[derive(Debug, Clone)]
pub enum InteractiveCmd {
    PodShell {
        namespace: Option<String>,
        pod: String,
        container: Option<String>,
    },
    FollowLogs {
        namespace: Option<String>,
        pod: String,
        container: Option<String>,
    },
    Edit {
        kind: ResourceKind,
        /// One editor session per distinct namespace, first-seen order.
        groups: Vec<(Option<String>, Vec<String>)>,
    },
    NodeShell {
        node: String,
    },
}

#[derive(Debug, Clone)]
pub enum ActionOutcome {
    /// Text to render: paged overlay in dashboard launches, raw otherwise.
    Output { title: String, body: String },
    /// One-line status (clipboard copies, refusals, no-ops).
    Status(String),
    Interactive(InteractiveCmd),
    /// The pod has several containers; the caller must sub-pick one.
    NeedContainers {
        action: ContainerAction,
        row: ResourceRow,
        containers: Vec<String>,
    },
    /// The caller must prompt for a command line.
    NeedCommandLine {
        row: ResourceRow,
        container: Option<String>,
    },
    None,
}

pub struct Dispatcher<'a> {
    gateway: &'a KubectlGateway,
    config: &'a Config,
}

impl<'a> Dispatcher<'a> {
    pub fn new(gateway: &'a KubectlGateway, config: &'a Config) -> Self {
        Self { gateway, config }
    }

    /// Entry point for a confirmed key press. An empty selection means no
    /// action; cluster failures come back as rendered text, not errors.
    pub async fn execute(
        &self,
        key: ActionKey,
        kind: &ResourceKind,
        rows: &[ResourceRow],
    ) -> Result<ActionOutcome> {
        if rows.is_empty() {
            return Ok(ActionOutcome::None);
        }

        let action = match resolve(key, kind.class()) {
            Resolution::NoOp => {
                return Ok(ActionOutcome::Status(format!(
                    "nothing bound to that key for {kind}"
                )));
            }
            Resolution::Refused(reason) => {
                return Ok(ActionOutcome::Status(format!("refused: {reason}")));
            }
            Resolution::Run(action) => action,
        };

        self.run(action, kind, rows).await
    }

    async fn run(
        &self,
        action: Action,
        kind: &ResourceKind,
        rows: &[ResourceRow],
    ) -> Result<ActionOutcome> {
        match action {
            Action::Describe | Action::DescribeInfo => {
                let output = self.gateway.describe(kind, rows).await?;
                Ok(ActionOutcome::Output {
                    title: format!("describe {kind}"),
                    body: output.rendered(),
                })
            }
            Action::DumpYaml => {
                let output = self.gateway.get_dump(kind, rows, "yaml").await?;
                Ok(ActionOutcome::Output {
                    title: format!("{kind} yaml"),
                    body: output.rendered(),
                })
            }
            Action::DumpJson => {
                let output = self.gateway.get_dump(kind, rows, "json").await?;
                Ok(ActionOutcome::Output {
                    title: format!("{kind} json"),
                    body: output.rendered(),
                })
            }
            Action::Delete => {
                let output = self.gateway.delete(kind, rows).await?;
                Ok(ActionOutcome::Output {
                    title: format!("delete {kind}"),
                    body: output.rendered(),
                })
            }
            Action::Edit => Ok(ActionOutcome::Interactive(InteractiveCmd::Edit {
                kind: kind.clone(),
                groups: group_rows_by_namespace(rows),
            })),
            Action::Logs => self.with_container(ContainerAction::Logs, &rows[0]).await,
            Action::PodShell => self.with_container(ContainerAction::Shell, &rows[0]).await,
            Action::RunCommand => {
                self.with_container(ContainerAction::RunCommand, &rows[0])
                    .await
            }
            Action::NodeShell => Ok(ActionOutcome::Interactive(InteractiveCmd::NodeShell {
                node: rows[0].name.clone(),
            })),
            Action::Uncordon => {
                let names: Vec<String> = rows.iter().map(|row| row.name.clone()).collect();
                let output = self.gateway.uncordon(&names).await?;
                Ok(ActionOutcome::Output {
                    title: "uncordon".to_string(),
                    body: output.rendered(),
                })
            }
            Action::CopyOwnerNode => {
                let mut nodes = Vec::new();
                for row in rows {
                    match self
                        .gateway
                        .pod_node(row.namespace.as_deref(), &row.name)
                        .await
                    {
                        Ok(node) => nodes.push(node),
                        Err(error) => {
                            return Ok(ActionOutcome::Status(format!("{error:#}")));
                        }
                    }
                }
                self.copy(nodes.join("\n"), "owning node name")
            }
            Action::PodInfo => {
                let mut body = String::new();
                for row in rows {
                    if !body.is_empty() {
                        body.push('\n');
                    }
                    body.push_str(
                        &self
                            .gateway
                            .pod_info(row.namespace.as_deref(), &row.name)
                            .await?,
                    );
                }
                Ok(ActionOutcome::Output {
                    title: "pod info".to_string(),
                    body,
                })
            }
            Action::NodeInfo => {
                let body = rows
                    .iter()
                    .map(|row| format!("name: {}", row.name))
                    .collect::<Vec<_>>()
                    .join("\n");
                Ok(ActionOutcome::Output {
                    title: "node info".to_string(),
                    body,
                })
            }
            Action::CopyNames => {
                let names = rows
                    .iter()
                    .map(|row| row.name.clone())
                    .collect::<Vec<_>>()
                    .join("\n");
                self.copy(names, "resource name(s)")
            }
            Action::CopyColumn(fn_index) => {
                let namespaced = rows.iter().any(|row| row.namespace.is_some());
                let Some(target) = export_target(kind.class(), namespaced, fn_index) else {
                    return Ok(ActionOutcome::Status(format!(
                        "no exportable column behind F{fn_index} for {kind}"
                    )));
                };
                let values: Vec<String> = match target {
                    ExportTarget::Namespace => {
                        rows.iter().filter_map(|row| row.namespace.clone()).collect()
                    }
                    ExportTarget::Column(column) => rows
                        .iter()
                        .filter_map(|row| row.columns.get(column).cloned())
                        .collect(),
                };
                if values.is_empty() {
                    return Ok(ActionOutcome::Status(format!(
                        "selected rows have nothing behind F{fn_index}"
                    )));
                }
                self.copy(values.join("\n"), "column value(s)")
            }
        }
    }

    /// Resolves the container for a pod-scoped follow-up: one container is
    /// used directly, several trigger the sub-picker.
    async fn with_container(
        &self,
        action: ContainerAction,
        row: &ResourceRow,
    ) -> Result<ActionOutcome> {
        let containers = match self
            .gateway
            .pod_containers(row.namespace.as_deref(), &row.name)
            .await
        {
            Ok(containers) => containers,
            Err(error) => return Ok(ActionOutcome::Status(format!("{error:#}"))),
        };

        if containers.len() > 1 {
            return Ok(ActionOutcome::NeedContainers {
                action,
                row: row.clone(),
                containers,
            });
        }

        let container = containers.into_iter().next();
        Ok(self.continue_with_container(action, row.clone(), container))
    }

    /// Re-entry point once a container has been chosen (or was unambiguous).
    pub fn continue_with_container(
        &self,
        action: ContainerAction,
        row: ResourceRow,
        container: Option<String>,
    ) -> ActionOutcome {
        match action {
            ContainerAction::Logs => ActionOutcome::Interactive(InteractiveCmd::FollowLogs {
                namespace: row.namespace.clone(),
                pod: row.name,
                container,
            }),
            ContainerAction::Shell => ActionOutcome::Interactive(InteractiveCmd::PodShell {
                namespace: row.namespace.clone(),
                pod: row.name,
                container,
            }),
            ContainerAction::RunCommand => ActionOutcome::NeedCommandLine { row, container },
        }
    }

    /// Re-entry point once the run-command prompt has been submitted.
    pub async fn run_command_line(
        &self,
        row: &ResourceRow,
        container: Option<&str>,
        command_line: &str,
    ) -> Result<ActionOutcome> {
        if command_line.trim().is_empty() {
            return Ok(ActionOutcome::None);
        }
        let output = self
            .gateway
            .exec_command(row.namespace.as_deref(), &row.name, container, command_line)
            .await?;
        Ok(ActionOutcome::Output {
            title: format!("exec {} ({command_line})", row.name),
            body: output.rendered(),
        })
    }

    fn copy(&self, text: String, what: &str) -> Result<ActionOutcome> {
        match copy_to_clipboard(&text) {
            Ok(()) => Ok(ActionOutcome::Status(format!("copied {what} to clipboard"))),
            Err(error) => Ok(ActionOutcome::Status(format!("clipboard failed: {error:#}"))),
        }
    }
}

pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(text.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KindClass;

    const EVERY_CLASS: [KindClass; 3] = [KindClass::Pod, KindClass::Node, KindClass::Other];

    #[test]
    fn node_delete_is_refused_unconditionally() {
        assert!(matches!(
            resolve(ActionKey::Delete, KindClass::Node),
            Resolution::Refused(_)
        ));
        assert_eq!(
            resolve(ActionKey::Delete, KindClass::Pod),
            Resolution::Run(Action::Delete)
        );
        assert_eq!(
            resolve(ActionKey::Delete, KindClass::Other),
            Resolution::Run(Action::Delete)
        );
    }

    #[test]
    fn pod_only_keys_are_noops_elsewhere() {
        for class in [KindClass::Node, KindClass::Other] {
            assert_eq!(resolve(ActionKey::Logs, class), Resolution::NoOp);
            assert_eq!(resolve(ActionKey::RunCommand, class), Resolution::NoOp);
        }
        assert_eq!(resolve(ActionKey::Shell, KindClass::Other), Resolution::NoOp);
        assert_eq!(
            resolve(ActionKey::CopyOwner, KindClass::Other),
            Resolution::NoOp
        );
    }

    #[test]
    fn shell_key_is_polymorphic_over_kind_class() {
        assert_eq!(
            resolve(ActionKey::Shell, KindClass::Pod),
            Resolution::Run(Action::PodShell)
        );
        assert_eq!(
            resolve(ActionKey::Shell, KindClass::Node),
            Resolution::Run(Action::NodeShell)
        );
    }

    #[test]
    fn copy_owner_key_uncordons_nodes() {
        assert_eq!(
            resolve(ActionKey::CopyOwner, KindClass::Pod),
            Resolution::Run(Action::CopyOwnerNode)
        );
        assert_eq!(
            resolve(ActionKey::CopyOwner, KindClass::Node),
            Resolution::Run(Action::Uncordon)
        );
    }

    #[test]
    fn info_key_curates_per_class_with_describe_fallback() {
        assert_eq!(
            resolve(ActionKey::Info, KindClass::Pod),
            Resolution::Run(Action::PodInfo)
        );
        assert_eq!(
            resolve(ActionKey::Info, KindClass::Node),
            Resolution::Run(Action::NodeInfo)
        );
        assert_eq!(
            resolve(ActionKey::Info, KindClass::Other),
            Resolution::Run(Action::DescribeInfo)
        );
    }

    #[test]
    fn confirm_and_universal_keys_resolve_for_every_class() {
        for class in EVERY_CLASS {
            assert_eq!(
                resolve(ActionKey::Confirm, class),
                Resolution::Run(Action::CopyNames)
            );
            assert_eq!(
                resolve(ActionKey::Describe, class),
                Resolution::Run(Action::Describe)
            );
            assert_eq!(
                resolve(ActionKey::DumpYaml, class),
                Resolution::Run(Action::DumpYaml)
            );
            assert_eq!(
                resolve(ActionKey::DumpJson, class),
                Resolution::Run(Action::DumpJson)
            );
            assert_eq!(resolve(ActionKey::Edit, class), Resolution::Run(Action::Edit));
        }
    }

    #[test]
    fn export_keys_resolve_to_column_copies() {
        for class in EVERY_CLASS {
            assert_eq!(
                resolve(ActionKey::ExportColumn(3), class),
                Resolution::Run(Action::CopyColumn(3))
            );
        }
    }

    fn row(name: &str, namespace: Option<&str>) -> ResourceRow {
        ResourceRow {
            name: name.to_string(),
            namespace: namespace.map(String::from),
            columns: vec![name.to_string()],
        }
    }

    #[tokio::test]
    async fn edit_batches_one_session_per_namespace() {
        let gateway = KubectlGateway::new("kubectl".to_string(), None, true);
        let config = Config::default();
        let dispatcher = Dispatcher::new(&gateway, &config);
        let rows = vec![
            row("a", Some("default")),
            row("b", Some("kube-system")),
            row("c", Some("default")),
        ];

        let outcome = dispatcher
            .execute(ActionKey::Edit, &ResourceKind::new("pods"), &rows)
            .await
            .unwrap();

        match outcome {
            ActionOutcome::Interactive(InteractiveCmd::Edit { kind, groups }) => {
                assert_eq!(kind.as_str(), "pods");
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0].0.as_deref(), Some("default"));
                assert_eq!(groups[0].1, vec!["a".to_string(), "c".to_string()]);
                assert_eq!(groups[1].0.as_deref(), Some("kube-system"));
                assert_eq!(groups[1].1, vec!["b".to_string()]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
