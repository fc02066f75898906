use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use std::collections::HashSet;

use crate::actions::{ActionKey, ContainerAction};
use crate::input::PickerAction;
use crate::model::{ResourceKind, ResourceRow, ResourceTable, visible_columns};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerMode {
    List,
    ContainerPick,
    Prompt,
    Pager,
}

/// One row of the filtered view: index into the full table, match score and
/// highlight positions within the padded display line.
#[derive(Debug, Clone)]
pub struct FilteredRow {
    pub row_index: usize,
    pub score: i64,
    pub highlights: Vec<usize>,
}

/// What the event loop should do after a key was applied.
#[derive(Debug, Clone)]
pub enum AppCommand {
    None,
    /// Picker dismissed with nothing confirmed.
    Cancelled,
    /// A binding was confirmed against the current selection.
    Dispatch(ActionKey),
    ContainerChosen {
        action: ContainerAction,
        row: ResourceRow,
        container: String,
    },
    CommandSubmitted {
        row: ResourceRow,
        container: Option<String>,
        line: String,
    },
}

struct PendingExec {
    action: ContainerAction,
    row: ResourceRow,
    container: Option<String>,
}

/// Interactive picker state: live fuzzy filtering, single/multi selection,
/// and the overlay sub-states (container sub-pick, command prompt, pager).
pub struct App {
    kind: ResourceKind,
    table: ResourceTable,
    display_header: String,
    display_lines: Vec<String>,
    matcher: SkimMatcherV2,
    query: String,
    filtered: Vec<FilteredRow>,
    cursor: usize,
    marks: HashSet<usize>,
    mode: PickerMode,
    status: String,
    page_size: usize,
    containers: Vec<String>,
    container_cursor: usize,
    prompt: String,
    pending: Option<PendingExec>,
    pager_title: String,
    pager_text: String,
    pager_scroll: u16,
}

impl App {
    pub fn new(kind: ResourceKind, table: ResourceTable, initial_query: String) -> Self {
        let (display_header, display_lines) = layout_display(&kind, &table);
        let mut app = Self {
            kind,
            table,
            display_header,
            display_lines,
            matcher: SkimMatcherV2::default(),
            query: initial_query,
            filtered: Vec::new(),
            cursor: 0,
            marks: HashSet::new(),
            mode: PickerMode::List,
            status: String::new(),
            page_size: 10,
            containers: Vec::new(),
            container_cursor: 0,
            prompt: String::new(),
            pending: None,
            pager_title: String::new(),
            pager_text: String::new(),
            pager_scroll: 0,
        };
        if let Some(error) = app.table.error.clone() {
            app.status = error;
        }
        app.refilter();
        app
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn mode(&self) -> PickerMode {
        self.mode
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn display_header(&self) -> &str {
        &self.display_header
    }

    pub fn filtered(&self) -> &[FilteredRow] {
        &self.filtered
    }

    pub fn display_line(&self, row_index: usize) -> &str {
        &self.display_lines[row_index]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_marked(&self, row_index: usize) -> bool {
        self.marks.contains(&row_index)
    }

    pub fn mark_count(&self) -> usize {
        self.marks.len()
    }

    pub fn row_count(&self) -> usize {
        self.table.rows.len()
    }

    pub fn match_count(&self) -> usize {
        self.filtered.len()
    }

    pub fn set_page_size(&mut self, rows: usize) {
        self.page_size = rows.max(1);
    }

    pub fn containers(&self) -> (&[String], usize) {
        (&self.containers, self.container_cursor)
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn pager(&self) -> (&str, &str, u16) {
        (&self.pager_title, &self.pager_text, self.pager_scroll)
    }

    /// Marked rows in table order, falling back to the row under the
    /// cursor. Empty when there is nothing to act on.
    pub fn selection(&self) -> Vec<ResourceRow> {
        if !self.marks.is_empty() {
            return self
                .table
                .rows
                .iter()
                .enumerate()
                .filter(|(index, _)| self.marks.contains(index))
                .map(|(_, row)| row.clone())
                .collect();
        }

        self.filtered
            .get(self.cursor)
            .map(|filtered| vec![self.table.rows[filtered.row_index].clone()])
            .unwrap_or_default()
    }

    pub fn apply_action(&mut self, action: PickerAction) -> AppCommand {
        match self.mode {
            PickerMode::List => self.apply_list_action(action),
            PickerMode::ContainerPick => self.apply_container_action(action),
            PickerMode::Prompt => self.apply_prompt_action(action),
            PickerMode::Pager => self.apply_pager_action(action),
        }
    }

    fn apply_list_action(&mut self, action: PickerAction) -> AppCommand {
        match action {
            PickerAction::Cancel => return AppCommand::Cancelled,
            PickerAction::Accept => return AppCommand::Dispatch(ActionKey::Confirm),
            PickerAction::Binding(key) => return AppCommand::Dispatch(key),
            PickerAction::Up => self.cursor = self.cursor.saturating_sub(1),
            PickerAction::Down => self.move_cursor_down(1),
            PickerAction::PageUp => self.cursor = self.cursor.saturating_sub(self.page_size),
            PickerAction::PageDown => self.move_cursor_down(self.page_size),
            PickerAction::ToggleMark => {
                if let Some(filtered) = self.filtered.get(self.cursor) {
                    let row_index = filtered.row_index;
                    if !self.marks.remove(&row_index) {
                        self.marks.insert(row_index);
                    }
                    self.move_cursor_down(1);
                }
            }
            PickerAction::ToggleAll => self.toggle_all(),
            PickerAction::InputChar(c) => {
                self.query.push(c);
                self.refilter();
            }
            PickerAction::Backspace => {
                self.query.pop();
                self.refilter();
            }
            PickerAction::DeleteWord => {
                while self.query.pop().is_some_and(|c| !c.is_whitespace()) {}
                self.refilter();
            }
            PickerAction::ScrollUp | PickerAction::ScrollDown | PickerAction::ClosePager => {}
        }
        AppCommand::None
    }

    fn apply_container_action(&mut self, action: PickerAction) -> AppCommand {
        match action {
            PickerAction::Cancel => {
                self.pending = None;
                self.mode = PickerMode::List;
                self.status = "container pick cancelled".to_string();
            }
            PickerAction::Up => self.container_cursor = self.container_cursor.saturating_sub(1),
            PickerAction::Down => {
                if self.container_cursor + 1 < self.containers.len() {
                    self.container_cursor += 1;
                }
            }
            PickerAction::Accept => {
                let Some(pending) = self.pending.take() else {
                    self.mode = PickerMode::List;
                    return AppCommand::None;
                };
                let Some(container) = self.containers.get(self.container_cursor).cloned() else {
                    self.mode = PickerMode::List;
                    return AppCommand::None;
                };
                self.mode = PickerMode::List;
                return AppCommand::ContainerChosen {
                    action: pending.action,
                    row: pending.row,
                    container,
                };
            }
            _ => {}
        }
        AppCommand::None
    }

    fn apply_prompt_action(&mut self, action: PickerAction) -> AppCommand {
        match action {
            PickerAction::Cancel => {
                self.pending = None;
                self.prompt.clear();
                self.mode = PickerMode::List;
                self.status = "command cancelled".to_string();
            }
            PickerAction::InputChar(c) => self.prompt.push(c),
            PickerAction::Backspace => {
                self.prompt.pop();
            }
            PickerAction::DeleteWord => {
                while self.prompt.pop().is_some_and(|c| !c.is_whitespace()) {}
            }
            PickerAction::Accept => {
                let Some(pending) = self.pending.take() else {
                    self.mode = PickerMode::List;
                    return AppCommand::None;
                };
                let line = std::mem::take(&mut self.prompt);
                self.mode = PickerMode::List;
                return AppCommand::CommandSubmitted {
                    row: pending.row,
                    container: pending.container,
                    line,
                };
            }
            _ => {}
        }
        AppCommand::None
    }

    fn apply_pager_action(&mut self, action: PickerAction) -> AppCommand {
        match action {
            PickerAction::ClosePager | PickerAction::Cancel => {
                self.mode = PickerMode::List;
                self.pager_scroll = 0;
            }
            PickerAction::ScrollUp => self.pager_scroll = self.pager_scroll.saturating_sub(1),
            PickerAction::ScrollDown => self.scroll_pager(1),
            PickerAction::PageUp => {
                self.pager_scroll = self.pager_scroll.saturating_sub(self.page_size as u16)
            }
            PickerAction::PageDown => self.scroll_pager(self.page_size as u16),
            _ => {}
        }
        AppCommand::None
    }

    fn scroll_pager(&mut self, lines: u16) {
        let max = self.pager_text.lines().count().saturating_sub(1) as u16;
        self.pager_scroll = (self.pager_scroll + lines).min(max);
    }

    fn move_cursor_down(&mut self, by: usize) {
        if self.filtered.is_empty() {
            self.cursor = 0;
            return;
        }
        self.cursor = (self.cursor + by).min(self.filtered.len() - 1);
    }

    fn toggle_all(&mut self) {
        let all_marked = !self.filtered.is_empty()
            && self
                .filtered
                .iter()
                .all(|filtered| self.marks.contains(&filtered.row_index));
        if all_marked {
            for filtered in &self.filtered {
                self.marks.remove(&filtered.row_index);
            }
        } else {
            for filtered in &self.filtered {
                self.marks.insert(filtered.row_index);
            }
        }
    }

    pub fn set_container_picker(
        &mut self,
        action: ContainerAction,
        row: ResourceRow,
        containers: Vec<String>,
    ) {
        self.containers = containers;
        self.container_cursor = 0;
        self.pending = Some(PendingExec {
            action,
            row,
            container: None,
        });
        self.mode = PickerMode::ContainerPick;
    }

    pub fn start_command_prompt(&mut self, row: ResourceRow, container: Option<String>) {
        self.prompt.clear();
        self.pending = Some(PendingExec {
            action: ContainerAction::RunCommand,
            row,
            container,
        });
        self.mode = PickerMode::Prompt;
    }

    pub fn show_pager(&mut self, title: impl Into<String>, text: String) {
        self.pager_title = title.into();
        self.pager_text = text;
        self.pager_scroll = 0;
        self.mode = PickerMode::Pager;
    }

    fn refilter(&mut self) {
        let query = self.query.trim();
        if query.is_empty() {
            self.filtered = (0..self.table.rows.len())
                .map(|row_index| FilteredRow {
                    row_index,
                    score: 0,
                    highlights: Vec::new(),
                })
                .collect();
        } else {
            let mut scored: Vec<FilteredRow> = self
                .display_lines
                .iter()
                .enumerate()
                .filter_map(|(row_index, line)| {
                    self.matcher
                        .fuzzy_indices(line, query)
                        .map(|(score, highlights)| FilteredRow {
                            row_index,
                            score,
                            highlights,
                        })
                })
                .collect();
            scored.sort_by(|a, b| b.score.cmp(&a.score).then(a.row_index.cmp(&b.row_index)));
            self.filtered = scored;
        }
        self.cursor = self.cursor.min(self.filtered.len().saturating_sub(1));
    }
}

/// Pads the visible columns into aligned display lines. The hidden pod
/// columns stay on the underlying rows for the action layer.
fn layout_display(kind: &ResourceKind, table: &ResourceTable) -> (String, Vec<String>) {
    let subset = visible_columns(kind.class());

    let project = |cells: &[String]| -> Vec<String> {
        match subset {
            Some(indices) => indices
                .iter()
                .filter_map(|&index| cells.get(index).cloned())
                .collect(),
            None => cells.to_vec(),
        }
    };

    let mut header_cells = project(&table.headers);
    let mut row_cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            let mut cells = project(&row.columns);
            if table.namespaced {
                cells.insert(0, row.namespace.clone().unwrap_or_default());
            }
            cells
        })
        .collect();
    if table.namespaced {
        header_cells.insert(0, "NAMESPACE".to_string());
    }

    let column_count = row_cells
        .iter()
        .map(Vec::len)
        .chain([header_cells.len()])
        .max()
        .unwrap_or(0);
    let mut widths = vec![0usize; column_count];
    for cells in row_cells.iter().chain([&header_cells]) {
        for (index, cell) in cells.iter().enumerate() {
            widths[index] = widths[index].max(cell.chars().count());
        }
    }

    let join = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(index, cell)| format!("{cell:<width$}", width = widths[index]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header = join(&header_cells);
    let lines = row_cells.drain(..).map(|cells| join(&cells)).collect();
    (header, lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceTable;
    use chrono::Local;

    fn pod_table() -> ResourceTable {
        let lines = [
            "NAME        READY   STATUS    RESTARTS   AGE   IP          NODE",
            "coredns-1   1/1     Running   0          9d    10.0.0.10   node-a",
            "coredns-2   1/1     Running   2          9d    10.0.0.11   node-b",
            "traefik-1   1/1     Running   0          3d    10.0.0.12   node-a",
        ];
        ResourceTable::from_lines(lines, Local::now())
    }

    fn pod_app(query: &str) -> App {
        App::new(ResourceKind::new("pods"), pod_table(), query.to_string())
    }

    #[test]
    fn prefilled_query_filters_immediately() {
        let app = pod_app("coredns");
        assert_eq!(app.match_count(), 2);
        assert_eq!(app.selection()[0].name, "coredns-1");
    }

    #[test]
    fn empty_query_keeps_table_order() {
        let app = pod_app("");
        assert_eq!(app.match_count(), 3);
        assert_eq!(app.filtered()[0].row_index, 0);
        assert_eq!(app.filtered()[2].row_index, 2);
    }

    #[test]
    fn toggle_all_then_single_untoggle_leaves_total_minus_one() {
        let mut app = pod_app("");
        app.apply_action(PickerAction::ToggleAll);
        assert_eq!(app.mark_count(), 3);
        app.apply_action(PickerAction::Up); // cursor back to a marked row
        app.apply_action(PickerAction::ToggleMark);
        assert_eq!(app.mark_count(), app.row_count() - 1);
    }

    #[test]
    fn toggle_all_twice_clears_marks() {
        let mut app = pod_app("");
        app.apply_action(PickerAction::ToggleAll);
        app.apply_action(PickerAction::ToggleAll);
        assert_eq!(app.mark_count(), 0);
    }

    #[test]
    fn cancel_returns_cancelled_not_a_selection() {
        let mut app = pod_app("");
        let command = app.apply_action(PickerAction::Cancel);
        assert!(matches!(command, AppCommand::Cancelled));
    }

    #[test]
    fn enter_dispatches_the_confirm_binding() {
        let mut app = pod_app("coredns");
        let command = app.apply_action(PickerAction::Accept);
        match command {
            AppCommand::Dispatch(key) => assert_eq!(key, crate::actions::ActionKey::Confirm),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn selection_prefers_marks_over_cursor() {
        let mut app = pod_app("");
        app.apply_action(PickerAction::ToggleMark); // marks row 0, cursor -> 1
        app.apply_action(PickerAction::Down);
        let selection = app.selection();
        assert_eq!(selection.len(), 1);
        assert_eq!(selection[0].name, "coredns-1");
    }

    #[test]
    fn empty_table_yields_empty_selection() {
        let app = App::new(
            ResourceKind::new("pods"),
            ResourceTable::empty(Local::now()),
            String::new(),
        );
        assert!(app.selection().is_empty());
    }

    #[test]
    fn pod_display_hides_ready_and_restart_columns_but_rows_keep_them() {
        let app = pod_app("");
        assert!(!app.display_line(0).contains("1/1"));
        assert!(app.display_line(0).contains("coredns-1"));
        assert!(app.display_line(0).contains("Running"));
        assert!(app.display_line(0).contains("10.0.0.10"));
        assert!(app.display_line(0).contains("node-a"));
        let selection = pod_app("").selection();
        assert!(selection[0].columns.contains(&"1/1".to_string()));
    }

    #[test]
    fn container_pick_round_trip() {
        let mut app = pod_app("coredns");
        let row = app.selection().remove(0);
        app.set_container_picker(
            ContainerAction::Shell,
            row,
            vec!["coredns".to_string(), "sidecar".to_string()],
        );
        assert_eq!(app.mode(), PickerMode::ContainerPick);
        app.apply_action(PickerAction::Down);
        let command = app.apply_action(PickerAction::Accept);
        match command {
            AppCommand::ContainerChosen {
                container, action, ..
            } => {
                assert_eq!(container, "sidecar");
                assert_eq!(action, ContainerAction::Shell);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(app.mode(), PickerMode::List);
    }

    #[test]
    fn prompt_submits_the_typed_command_line() {
        let mut app = pod_app("coredns");
        let row = app.selection().remove(0);
        app.start_command_prompt(row, Some("coredns".to_string()));
        for c in "uname -a".chars() {
            app.apply_action(PickerAction::InputChar(c));
        }
        let command = app.apply_action(PickerAction::Accept);
        match command {
            AppCommand::CommandSubmitted {
                line, container, ..
            } => {
                assert_eq!(line, "uname -a");
                assert_eq!(container.as_deref(), Some("coredns"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn pager_scroll_is_bounded() {
        let mut app = pod_app("");
        app.show_pager("describe", "one\ntwo\nthree".to_string());
        assert_eq!(app.mode(), PickerMode::Pager);
        for _ in 0..10 {
            app.apply_action(PickerAction::ScrollDown);
        }
        let (_, _, scroll) = app.pager();
        assert_eq!(scroll, 2);
        app.apply_action(PickerAction::ClosePager);
        assert_eq!(app.mode(), PickerMode::List);
    }
}
