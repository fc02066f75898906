use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::actions::ActionKey;
use crate::app::PickerMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    Up,
    Down,
    PageUp,
    PageDown,
    ToggleMark,
    ToggleAll,
    Accept,
    Cancel,
    Backspace,
    DeleteWord,
    InputChar(char),
    Binding(ActionKey),
    ScrollUp,
    ScrollDown,
    ClosePager,
}

pub fn map_key(mode: PickerMode, key: KeyEvent) -> Option<PickerAction> {
    match mode {
        PickerMode::List => map_list_key(key),
        PickerMode::ContainerPick => map_sub_pick_key(key),
        PickerMode::Prompt => map_prompt_key(key),
        PickerMode::Pager => map_pager_key(key),
    }
}

fn map_list_key(key: KeyEvent) -> Option<PickerAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => Some(PickerAction::Cancel),
        KeyCode::Char('c') if ctrl => Some(PickerAction::Cancel),
        KeyCode::Enter => Some(PickerAction::Accept),
        KeyCode::Up => Some(PickerAction::Up),
        KeyCode::Down => Some(PickerAction::Down),
        KeyCode::PageUp => Some(PickerAction::PageUp),
        KeyCode::PageDown => Some(PickerAction::PageDown),
        KeyCode::Tab | KeyCode::BackTab => Some(PickerAction::ToggleMark),
        KeyCode::Backspace => Some(PickerAction::Backspace),
        KeyCode::Char('w') if ctrl => Some(PickerAction::DeleteWord),
        KeyCode::Char('a') if ctrl => Some(PickerAction::ToggleAll),
        KeyCode::Char('d') if ctrl => Some(PickerAction::Binding(ActionKey::Describe)),
        KeyCode::Char('e') if ctrl => Some(PickerAction::Binding(ActionKey::Edit)),
        KeyCode::Char('l') if ctrl => Some(PickerAction::Binding(ActionKey::Logs)),
        KeyCode::Char('s') if ctrl => Some(PickerAction::Binding(ActionKey::Shell)),
        KeyCode::Char('r') if ctrl => Some(PickerAction::Binding(ActionKey::RunCommand)),
        KeyCode::Char('t') if ctrl => Some(PickerAction::Binding(ActionKey::Delete)),
        KeyCode::Char('y') if ctrl => Some(PickerAction::Binding(ActionKey::DumpYaml)),
        KeyCode::Char('b') if ctrl => Some(PickerAction::Binding(ActionKey::DumpJson)),
        KeyCode::Char('g') if ctrl => Some(PickerAction::Binding(ActionKey::Info)),
        KeyCode::Char('n') if ctrl => Some(PickerAction::Binding(ActionKey::CopyOwner)),
        KeyCode::F(n @ 1..=9) => Some(PickerAction::Binding(ActionKey::ExportColumn(n as u8))),
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(PickerAction::InputChar(c))
        }
        _ => None,
    }
}

fn map_sub_pick_key(key: KeyEvent) -> Option<PickerAction> {
    match key.code {
        KeyCode::Esc => Some(PickerAction::Cancel),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(PickerAction::Cancel)
        }
        KeyCode::Enter => Some(PickerAction::Accept),
        KeyCode::Up | KeyCode::Char('k') => Some(PickerAction::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(PickerAction::Down),
        _ => None,
    }
}

fn map_prompt_key(key: KeyEvent) -> Option<PickerAction> {
    match key.code {
        KeyCode::Esc => Some(PickerAction::Cancel),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(PickerAction::Cancel)
        }
        KeyCode::Enter => Some(PickerAction::Accept),
        KeyCode::Backspace => Some(PickerAction::Backspace),
        KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(PickerAction::DeleteWord)
        }
        KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
            Some(PickerAction::InputChar(c))
        }
        _ => None,
    }
}

fn map_pager_key(key: KeyEvent) -> Option<PickerAction> {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter => Some(PickerAction::ClosePager),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(PickerAction::ClosePager)
        }
        KeyCode::Up | KeyCode::Char('k') => Some(PickerAction::ScrollUp),
        KeyCode::Down | KeyCode::Char('j') => Some(PickerAction::ScrollDown),
        KeyCode::PageUp => Some(PickerAction::PageUp),
        KeyCode::PageDown => Some(PickerAction::PageDown),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionKey;
    use crate::app::PickerMode;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn list_mode_maps_plain_chars_into_the_query() {
        let key = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        assert_eq!(
            map_key(PickerMode::List, key),
            Some(PickerAction::InputChar('x'))
        );
    }

    #[test]
    fn list_mode_maps_action_bindings() {
        assert_eq!(
            map_key(PickerMode::List, ctrl('d')),
            Some(PickerAction::Binding(ActionKey::Describe))
        );
        assert_eq!(
            map_key(PickerMode::List, ctrl('s')),
            Some(PickerAction::Binding(ActionKey::Shell))
        );
        assert_eq!(
            map_key(PickerMode::List, ctrl('t')),
            Some(PickerAction::Binding(ActionKey::Delete))
        );
        assert_eq!(
            map_key(PickerMode::List, ctrl('n')),
            Some(PickerAction::Binding(ActionKey::CopyOwner))
        );
    }

    #[test]
    fn function_keys_map_to_column_export() {
        let key = KeyEvent::new(KeyCode::F(3), KeyModifiers::NONE);
        assert_eq!(
            map_key(PickerMode::List, key),
            Some(PickerAction::Binding(ActionKey::ExportColumn(3)))
        );
        let out_of_range = KeyEvent::new(KeyCode::F(10), KeyModifiers::NONE);
        assert_eq!(map_key(PickerMode::List, out_of_range), None);
    }

    #[test]
    fn tab_toggles_and_ctrl_a_toggles_all() {
        let tab = KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(map_key(PickerMode::List, tab), Some(PickerAction::ToggleMark));
        assert_eq!(
            map_key(PickerMode::List, ctrl('a')),
            Some(PickerAction::ToggleAll)
        );
    }

    #[test]
    fn escape_and_ctrl_c_cancel_in_every_input_mode() {
        for mode in [PickerMode::List, PickerMode::ContainerPick, PickerMode::Prompt] {
            let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
            assert_eq!(map_key(mode, esc), Some(PickerAction::Cancel));
            assert_eq!(map_key(mode, ctrl('c')), Some(PickerAction::Cancel));
        }
    }

    #[test]
    fn pager_mode_scrolls_and_closes() {
        let q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(map_key(PickerMode::Pager, q), Some(PickerAction::ClosePager));
        let j = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE);
        assert_eq!(map_key(PickerMode::Pager, j), Some(PickerAction::ScrollDown));
    }

    #[test]
    fn prompt_mode_accepts_text_and_submit() {
        let key = KeyEvent::new(KeyCode::Char('-'), KeyModifiers::NONE);
        assert_eq!(
            map_key(PickerMode::Prompt, key),
            Some(PickerAction::InputChar('-'))
        );
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(map_key(PickerMode::Prompt, enter), Some(PickerAction::Accept));
    }
}
