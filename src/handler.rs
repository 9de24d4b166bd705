use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, AppMode, DialogKind, SearchToggle};

/// Handle a key event.
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    match app.mode.clone() {
        AppMode::Normal => handle_normal_key(app, key),
        AppMode::Search => handle_search_key(app, key),
        AppMode::Dialog(kind) => handle_dialog_key(app, &kind, key),
        AppMode::Viewer => handle_viewer_key(app, key),
    }
}

fn handle_normal_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
        KeyCode::Char('g') | KeyCode::Home => app.select_first(),
        KeyCode::Char('G') | KeyCode::End => app.select_last(),
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Enter => app.expand_selected(),
        KeyCode::Char('h') | KeyCode::Left => app.collapse_selected(),
        KeyCode::Char('C') => app.collapse_all(),
        KeyCode::Char('.') => app.toggle_hidden(),
        KeyCode::Char('s') => app.toggle_grouping(),
        KeyCode::Char('r') | KeyCode::F(5) => app.refresh_current_dir(),
        KeyCode::Char('W') => app.toggle_watcher(),
        KeyCode::Char('a') => app.open_dialog(DialogKind::CreateFile),
        KeyCode::Char('A') => app.open_dialog(DialogKind::CreateDirectory),
        KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
        KeyCode::Char('/') => app.open_search(),
        KeyCode::Char('H') => app.open_dialog(DialogKind::History),
        KeyCode::Char('n') => app.select_next_match(),
        KeyCode::Char('m') => app.toggle_match_lines(),
        KeyCode::Char('u') | KeyCode::Backspace => app.go_parent(),
        KeyCode::Char('o') => app.enter_selected(),
        KeyCode::Char('b') => app.go_back(),
        KeyCode::Char('f') => app.go_forward(),
        KeyCode::Char(':') => app.open_go_to(),
        KeyCode::Char('v') => app.open_file_view(),
        KeyCode::Char('M') => app.toggle_mouse(),
        KeyCode::Char('+') => app.adjust_timeout(1),
        KeyCode::Char('-') => app.adjust_timeout(-1),
        KeyCode::Esc => app.cancel_search(),
        _ => {}
    }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::ALT) {
        match key.code {
            KeyCode::Char('r') => app.toggle_option(SearchToggle::Regex),
            KeyCode::Char('c') => app.toggle_option(SearchToggle::CaseSensitive),
            KeyCode::Char('w') => app.toggle_option(SearchToggle::WholeWord),
            KeyCode::Up => app.adjust_timeout(1),
            KeyCode::Down => app.adjust_timeout(-1),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Enter => app.submit_search(),
        KeyCode::Esc => app.close_search(),
        KeyCode::Backspace => app.search_input.delete_char(),
        KeyCode::Left => app.search_input.move_left(),
        KeyCode::Right => app.search_input.move_right(),
        KeyCode::Home => app.search_input.home(),
        KeyCode::End => app.search_input.end(),
        KeyCode::Char(c) => app.search_input.insert_char(c),
        _ => {}
    }
}

/// Lines moved by one page in the file pane.
const PAGE_LINES: isize = 20;

fn handle_viewer_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.scroll_file_view(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_file_view(-1),
        KeyCode::PageDown | KeyCode::Char(' ') => app.scroll_file_view(PAGE_LINES),
        KeyCode::PageUp => app.scroll_file_view(-PAGE_LINES),
        KeyCode::Char('g') | KeyCode::Home => app.scroll_file_view_to(true),
        KeyCode::Char('G') | KeyCode::End => app.scroll_file_view_to(false),
        KeyCode::Char('q') | KeyCode::Char('v') | KeyCode::Esc => app.close_file_view(),
        _ => {}
    }
}

fn handle_dialog_key(app: &mut App, kind: &DialogKind, key: KeyEvent) {
    match kind {
        DialogKind::CreateFile | DialogKind::CreateDirectory | DialogKind::GoTo => {
            match key.code {
                KeyCode::Enter => app.confirm_dialog(),
                KeyCode::Esc => app.close_dialog(),
                KeyCode::Backspace => app.dialog_input.delete_char(),
                KeyCode::Left => app.dialog_input.move_left(),
                KeyCode::Right => app.dialog_input.move_right(),
                KeyCode::Home => app.dialog_input.home(),
                KeyCode::End => app.dialog_input.end(),
                KeyCode::Char(c) => app.dialog_input.insert_char(c),
                _ => {}
            }
        }
        DialogKind::DeleteConfirm { .. } => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => app.confirm_dialog(),
            KeyCode::Char('n') | KeyCode::Esc => app.close_dialog(),
            _ => {}
        },
        DialogKind::History => match key.code {
            KeyCode::Char('j') | KeyCode::Down => app.history_next(),
            KeyCode::Char('k') | KeyCode::Up => app.history_previous(),
            KeyCode::Enter => app.confirm_dialog(),
            KeyCode::Esc | KeyCode::Char('q') => app.close_dialog(),
            _ => {}
        },
    }
}

/// Handle a mouse event: the wheel moves the selection, or scrolls the
/// file pane while it has focus.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    if !app.mouse_enabled {
        return;
    }
    let step = match mouse.kind {
        MouseEventKind::ScrollDown => 1,
        MouseEventKind::ScrollUp => -1,
        _ => return,
    };
    match app.mode {
        AppMode::Normal if step > 0 => app.select_next(),
        AppMode::Normal => app.select_previous(),
        AppMode::Viewer => app.scroll_file_view(step * 3),
        _ => {}
    }
}
