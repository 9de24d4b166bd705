use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::Style,
    widgets::{Block, Borders},
    Frame,
};

use fm_search::completion::{Activity, BusyReason, Stage};
use fm_search::fs::node::display_name;
use fm_search::search::types::SearchResult;

use crate::app::{App, AppMode, DialogKind};
use crate::components::dialog::DialogWidget;
use crate::components::file_view::FileViewWidget;
use crate::components::search::{MatchesWidget, SearchBarWidget};
use crate::components::status_bar::StatusBarWidget;
use crate::components::tree::TreeWidget;
use crate::theme::ThemeColors;

/// Render the application UI.
pub fn render(app: &mut App, theme: &ThemeColors, frame: &mut Frame) {
    let area = frame.area();

    let [search_area, body_area, status_area] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(area);

    frame.render_widget(
        SearchBarWidget::new(
            &app.search_input,
            app.options,
            app.search.timeout_secs(),
            theme,
        )
        .focused(app.mode == AppMode::Search),
        search_area,
    );

    let (tree_column, file_area) = if app.file_view.is_some() {
        let [tree, file] = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .areas(body_area);
        (tree, Some(file))
    } else {
        (body_area, None)
    };

    let highlights = app.search.highlights();
    let expanded_result = expanded_match_result(app);

    let (tree_area, matches_area) = match expanded_result {
        Some(_) => {
            let [tree, matches] = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .areas(tree_column);
            (tree, Some(matches))
        }
        None => (tree_column, None),
    };

    // Keep the selection visible; two rows go to the border.
    app.update_scroll(tree_area.height.saturating_sub(2) as usize);

    let block = Block::default()
        .title(format!(" {} ", display_name(&app.root)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.mode == AppMode::Normal {
            theme.border_focused_fg
        } else {
            theme.border_fg
        }));
    frame.render_widget(
        TreeWidget::new(&app.rows, &highlights, theme)
            .selection(app.selected_index, app.scroll_offset)
            .block(block),
        tree_area,
    );

    if let (Some(result), Some(matches_area)) = (&expanded_result, matches_area) {
        frame.render_widget(MatchesWidget::new(result, theme), matches_area);
    }

    if let (Some(view), Some(file_area)) = (&app.file_view, file_area) {
        let matched_lines: Vec<usize> = app
            .search
            .results()
            .into_iter()
            .find(|r| r.path == view.path)
            .map(|r| r.matches.iter().map(|m| m.line).collect())
            .unwrap_or_default();
        frame.render_widget(
            FileViewWidget::new(view, theme)
                .matched_lines(&matched_lines)
                .focused(app.mode == AppMode::Viewer),
            file_area,
        );
    }

    let path_str = app.current_dir().display().to_string();
    let summary = app.search_summary();
    let watcher = (!app.watcher_active).then_some("[watch off]");
    let busy = busy_label(&app.activity);

    let mut status = StatusBarWidget::new(&path_str, theme);
    if let Some(ref summary) = summary {
        status = status.summary(summary);
    }
    if let Some(label) = busy {
        status = status.busy(label);
    }
    if let Some(label) = watcher {
        status = status.watcher_status(label);
    }
    if let Some(ref msg) = app.status_message {
        status = status.status_message(&msg.text, msg.is_error);
    }
    frame.render_widget(status, status_area);

    if let AppMode::Dialog(ref kind) = app.mode {
        let history = if *kind == DialogKind::History {
            app.search.history()
        } else {
            Vec::new()
        };
        frame.render_widget(
            DialogWidget::new(&app.mode, &app.dialog_input, theme)
                .history(&history, app.history_selected),
            area,
        );
    }
}

/// Result for the selected file when its match lines are toggled open.
fn expanded_match_result(app: &App) -> Option<SearchResult> {
    let row = app.selected_row()?;
    if row.node.is_dir() {
        return None;
    }
    let expanded = app
        .search
        .highlights()
        .get(&row.node.path)
        .is_some_and(|h| h.expanded);
    if !expanded {
        return None;
    }
    app.search
        .results()
        .into_iter()
        .find(|r| r.path == row.node.path)
}

fn busy_label(activity: &Activity) -> Option<&'static str> {
    match activity {
        Activity::Settled => None,
        Activity::Busy(BusyReason::Stage(Stage::Searching)) => Some("[searching]"),
        Activity::Busy(BusyReason::Stage(Stage::Expanding)) => Some("[expanding]"),
        Activity::Busy(_) => Some("[updating]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_label_follows_activity() {
        assert_eq!(busy_label(&Activity::Settled), None);
        assert_eq!(
            busy_label(&Activity::Busy(BusyReason::Stage(Stage::Searching))),
            Some("[searching]")
        );
        assert_eq!(
            busy_label(&Activity::Busy(BusyReason::Stage(Stage::Expanding))),
            Some("[expanding]")
        );
        assert_eq!(
            busy_label(&Activity::Busy(BusyReason::Burst)),
            Some("[updating]")
        );
    }
}
