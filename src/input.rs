use crate::app::InputMode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    Top,
    Bottom,
    Select,
    SelectByOrdinal(usize),
    Back,
    ToggleSelect,
    ToggleHelp,
    Refresh,
    StartFilter,
    FilterInput(char),
    FilterBackspace,
    FilterCommit,
    FilterCancel,
    Describe,
    Logs,
    FollowLogs,
    Shell,
    Delete,
    Create,
    InputChar(char),
    Backspace,
    NextField,
    PrevField,
    ChoiceNext,
    ChoicePrev,
    WizardNext,
    WizardBack,
    Cancel,
    ConfirmYes,
    ConfirmNo,
}

pub fn resolve(mode: InputMode, key: KeyEvent) -> Option<Action> {
    match mode {
        InputMode::Browsing => map_browsing_key(key),
        InputMode::Filtering => map_filter_key(key),
        InputMode::Wizard => map_wizard_key(key),
        InputMode::Confirm => Some(map_confirm_key(key)),
    }
}

fn map_browsing_key(key: KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => Some(Action::Quit),
        KeyCode::Char('b') | KeyCode::Char('u') if ctrl => Some(Action::PageUp),
        KeyCode::Char('f') | KeyCode::Char('d') if ctrl => Some(Action::PageDown),
        _ if ctrl => None,
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('0') => Some(Action::Back),
        KeyCode::Char(c @ '1'..='9') => c.to_digit(10).map(|n| Action::SelectByOrdinal(n as usize)),
        KeyCode::Up | KeyCode::Char('k') => Some(Action::MoveUp),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::MoveDown),
        KeyCode::PageUp => Some(Action::PageUp),
        KeyCode::PageDown => Some(Action::PageDown),
        KeyCode::Home | KeyCode::Char('g') => Some(Action::Top),
        KeyCode::End | KeyCode::Char('G') => Some(Action::Bottom),
        KeyCode::Enter => Some(Action::Select),
        KeyCode::Esc | KeyCode::Backspace => Some(Action::Back),
        KeyCode::Char(' ') => Some(Action::ToggleSelect),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Char('/') => Some(Action::StartFilter),
        KeyCode::Char('d') => Some(Action::Describe),
        KeyCode::Char('l') => Some(Action::Logs),
        KeyCode::Char('f') => Some(Action::FollowLogs),
        KeyCode::Char('s') => Some(Action::Shell),
        KeyCode::Char('x') | KeyCode::Delete => Some(Action::Delete),
        KeyCode::Char('n') => Some(Action::Create),
        _ => None,
    }
}

fn map_filter_key(key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => Some(Action::FilterCancel),
        KeyCode::Enter => Some(Action::FilterCommit),
        KeyCode::Backspace => Some(Action::FilterBackspace),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Action::FilterCancel)
        }
        KeyCode::Char(c) if is_plain_text(key.modifiers) => Some(Action::FilterInput(c)),
        _ => None,
    }
}

fn map_wizard_key(key: KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => Some(Action::Cancel),
        KeyCode::Char('c') if ctrl => Some(Action::Cancel),
        KeyCode::Char('b') if ctrl => Some(Action::WizardBack),
        KeyCode::PageUp => Some(Action::WizardBack),
        KeyCode::Enter => Some(Action::WizardNext),
        KeyCode::Tab => Some(Action::NextField),
        KeyCode::BackTab => Some(Action::PrevField),
        KeyCode::Up => Some(Action::ChoicePrev),
        KeyCode::Down => Some(Action::ChoiceNext),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Char(c) if is_plain_text(key.modifiers) => Some(Action::InputChar(c)),
        _ => None,
    }
}

fn map_confirm_key(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') if is_plain_text(key.modifiers) => {
            Action::ConfirmYes
        }
        _ => Action::ConfirmNo,
    }
}

fn is_plain_text(modifiers: KeyModifiers) -> bool {
    modifiers.is_empty() || modifiers == KeyModifiers::SHIFT
}
