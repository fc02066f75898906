use clap::Parser;

const KEY_BINDING_HELP: &str = "\
Key bindings inside the picker:
  enter    copy selected name(s) to the clipboard
  tab      toggle selection on the current row
  ctrl-a   toggle selection on every filtered row
  ctrl-d   describe
  ctrl-e   edit
  ctrl-l   logs (pods; follows, ctrl-c returns)
  ctrl-s   shell into container (pods) / debug-pod shell on node (nodes)
  ctrl-r   run a one-off command in a container (pods)
  ctrl-t   delete (refused for nodes)
  ctrl-y   yaml dump
  ctrl-b   json dump
  ctrl-g   curated info (falls back to describe for other kinds)
  ctrl-n   copy owning node name (pods) / uncordon (nodes)
  F1..F9   copy the n-th displayed column value
  esc      cancel (no action)

Omitting <RESOURCE> starts dashboard mode. Piped stdin is used verbatim
as the resource table instead of querying the cluster.";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kpick",
    version,
    about = "Fuzzy-pick Kubernetes resources and act on them without retyping names.",
    after_help = KEY_BINDING_HELP
)]
pub struct CliArgs {
    /// Resource kind to list (for example: pods, nodes, configmaps)
    pub resource: Option<String>,

    /// Initial fuzzy query, prefilled into the picker
    #[arg(trailing_var_arg = true)]
    pub query: Vec<String>,

    /// Namespace to list in
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// List across all namespaces
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// Request wide output from the listing
    #[arg(short, long)]
    pub wide: bool,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}

impl CliArgs {
    pub fn initial_query(&self) -> String {
        self.query.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use clap::Parser;

    #[test]
    fn resource_and_query_parse_positionally() {
        let args = CliArgs::parse_from(["kpick", "pods", "coredns", "kube"]);
        assert_eq!(args.resource.as_deref(), Some("pods"));
        assert_eq!(args.initial_query(), "coredns kube");
    }

    #[test]
    fn no_resource_means_dashboard_mode() {
        let args = CliArgs::parse_from(["kpick"]);
        assert!(args.resource.is_none());
        assert!(args.initial_query().is_empty());
    }

    #[test]
    fn namespace_and_wide_flags_parse() {
        let args = CliArgs::parse_from(["kpick", "-n", "kube-system", "-w", "pods"]);
        assert_eq!(args.namespace.as_deref(), Some("kube-system"));
        assert!(args.wide);
        assert!(!args.all_namespaces);
    }
}
