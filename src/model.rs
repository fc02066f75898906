use chrono::{DateTime, Local};
use std::fmt::{Display, Formatter};

/// Behavioural class of a resource kind. The valid set of kinds is open
/// (discovered from the cluster), but key bindings only branch on whether
/// the selection is pod-like, node-like, or anything else.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum KindClass {
    Pod,
    Node,
    Other,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResourceKind {
    raw: String,
}

impl ResourceKind {
    pub fn new(token: impl Into<String>) -> Self {
        Self { raw: token.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn class(&self) -> KindClass {
        match self.raw.to_ascii_lowercase().as_str() {
            "po" | "pod" | "pods" => KindClass::Pod,
            "no" | "node" | "nodes" => KindClass::Node,
            _ => KindClass::Other,
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// One selectable line of `kubectl get` output. The namespace column of an
/// all-namespaces listing is split off into `namespace` so that `columns[0]`
/// is always the resource name.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ResourceRow {
    pub name: String,
    pub namespace: Option<String>,
    pub columns: Vec<String>,
}

impl ResourceRow {
    pub fn parse(line: &str, namespaced_listing: bool) -> Option<Self> {
        let mut columns: Vec<String> = line.split_whitespace().map(String::from).collect();
        if columns.is_empty() {
            return None;
        }

        let namespace = if namespaced_listing && columns.len() > 1 {
            Some(columns.remove(0))
        } else {
            None
        };

        Some(Self {
            name: columns[0].clone(),
            namespace,
            columns,
        })
    }
}

/// A fetched (or piped) resource listing. The header line is kept for
/// display but is never itself selectable.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<ResourceRow>,
    pub namespaced: bool,
    pub fetched_at: Option<DateTime<Local>>,
    pub error: Option<String>,
}

impl ResourceTable {
    pub fn from_lines<I, S>(lines: I, fetched_at: DateTime<Local>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lines = lines.into_iter();
        let Some(header_line) = lines.next() else {
            return Self::empty(fetched_at);
        };

        let mut headers: Vec<String> = header_line
            .as_ref()
            .split_whitespace()
            .map(String::from)
            .collect();
        let namespaced = headers.first().is_some_and(|h| h == "NAMESPACE");
        if namespaced {
            headers.remove(0);
        }

        let rows = lines
            .filter_map(|line| ResourceRow::parse(line.as_ref(), namespaced))
            .collect();

        Self {
            headers,
            rows,
            namespaced,
            fetched_at: Some(fetched_at),
            error: None,
        }
    }

    pub fn empty(fetched_at: DateTime<Local>) -> Self {
        Self {
            fetched_at: Some(fetched_at),
            ..Self::default()
        }
    }

    pub fn with_error(error: impl Into<String>, fetched_at: DateTime<Local>) -> Self {
        Self {
            error: Some(error.into()),
            fetched_at: Some(fetched_at),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Fixed display subset for pod-like listings: the NAME, STATUS, AGE, IP
/// and NODE positions of `kubectl get pods -o wide`. The ready and restart
/// counts stay on the underlying rows but off the screen. Every other kind
/// shows all columns.
const POD_VISIBLE_COLUMNS: [usize; 5] = [0, 2, 4, 5, 6];

pub fn visible_columns(class: KindClass) -> Option<&'static [usize]> {
    match class {
        KindClass::Pod => Some(&POD_VISIBLE_COLUMNS),
        KindClass::Node | KindClass::Other => None,
    }
}

/// What a function key exports for the selected rows.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ExportTarget {
    Namespace,
    Column(usize),
}

/// Maps a function-key ordinal (F1..F9) to an export target. Pod kinds
/// export through their visible subset so the keys line up with what is
/// on screen; in an all-namespaces listing F1 is the inserted NAMESPACE
/// display column and the remaining keys shift by one.
pub fn export_target(class: KindClass, namespaced: bool, fn_index: u8) -> Option<ExportTarget> {
    if fn_index == 0 {
        return None;
    }
    let mut position = usize::from(fn_index) - 1;
    if namespaced {
        if position == 0 {
            return Some(ExportTarget::Namespace);
        }
        position -= 1;
    }
    match visible_columns(class) {
        Some(subset) => subset.get(position).copied().map(ExportTarget::Column),
        None => Some(ExportTarget::Column(position)),
    }
}

/// Whether this process renders output raw and exits after one action, or
/// pages output in an overlay and loops. Decided once at startup from the
/// CLI shape and stdin, immutable afterwards.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LaunchContext {
    Direct,
    Dashboard,
}

impl LaunchContext {
    pub fn paged(self) -> bool {
        matches!(self, Self::Dashboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    #[test]
    fn kind_aliases_map_to_expected_classes() {
        assert_eq!(ResourceKind::new("po").class(), KindClass::Pod);
        assert_eq!(ResourceKind::new("Pods").class(), KindClass::Pod);
        assert_eq!(ResourceKind::new("nodes").class(), KindClass::Node);
        assert_eq!(ResourceKind::new("no").class(), KindClass::Node);
        assert_eq!(ResourceKind::new("configmaps").class(), KindClass::Other);
        assert_eq!(ResourceKind::new("deploy").class(), KindClass::Other);
    }

    #[test]
    fn pod_visible_columns_are_a_fixed_subset() {
        assert_eq!(visible_columns(KindClass::Pod), Some(&[0, 2, 4, 5, 6][..]));
        assert_eq!(visible_columns(KindClass::Node), None);
        assert_eq!(visible_columns(KindClass::Other), None);
    }

    #[test]
    fn export_target_follows_visible_subset_for_pods() {
        assert_eq!(
            export_target(KindClass::Pod, false, 1),
            Some(ExportTarget::Column(0))
        );
        assert_eq!(
            export_target(KindClass::Pod, false, 2),
            Some(ExportTarget::Column(2))
        );
        assert_eq!(
            export_target(KindClass::Pod, false, 5),
            Some(ExportTarget::Column(6))
        );
        assert_eq!(export_target(KindClass::Pod, false, 6), None);
        assert_eq!(
            export_target(KindClass::Other, false, 3),
            Some(ExportTarget::Column(2))
        );
        assert_eq!(export_target(KindClass::Node, false, 0), None);
    }

    #[test]
    fn export_target_accounts_for_the_namespace_display_column() {
        assert_eq!(
            export_target(KindClass::Pod, true, 1),
            Some(ExportTarget::Namespace)
        );
        assert_eq!(
            export_target(KindClass::Pod, true, 2),
            Some(ExportTarget::Column(0))
        );
        assert_eq!(
            export_target(KindClass::Pod, true, 3),
            Some(ExportTarget::Column(2))
        );
        assert_eq!(
            export_target(KindClass::Other, true, 3),
            Some(ExportTarget::Column(1))
        );
    }

    #[test]
    fn table_header_is_not_selectable() {
        let lines = [
            "NAME      STATUS   AGE",
            "node-a    Ready    12d",
            "node-b    Ready    3d",
        ];
        let table = ResourceTable::from_lines(lines, Local::now());
        assert_eq!(table.headers, vec!["NAME", "STATUS", "AGE"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].name, "node-a");
        assert!(!table.namespaced);
    }

    #[test]
    fn all_namespaces_listing_splits_namespace_column() {
        let lines = [
            "NAMESPACE     NAME        READY   STATUS    RESTARTS   AGE",
            "kube-system   coredns-1   1/1     Running   0          9d",
        ];
        let table = ResourceTable::from_lines(lines, Local::now());
        assert!(table.namespaced);
        assert_eq!(table.headers[0], "NAME");
        let row = &table.rows[0];
        assert_eq!(row.namespace.as_deref(), Some("kube-system"));
        assert_eq!(row.name, "coredns-1");
        assert_eq!(row.columns[0], "coredns-1");
        assert_eq!(row.columns[2], "Running");
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = ResourceTable::from_lines(Vec::<String>::new(), Local::now());
        assert!(table.is_empty());
        assert!(table.error.is_none());
    }
}
