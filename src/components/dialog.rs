use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Padding, Widget},
};

use fm_search::fs::node::Node;

use crate::app::{AppMode, DialogKind, LineInput};
use crate::theme::ThemeColors;

/// Dialog widget that renders a centered modal overlay.
pub struct DialogWidget<'a> {
    mode: &'a AppMode,
    input: &'a LineInput,
    history: &'a [String],
    history_selected: usize,
    theme: &'a ThemeColors,
}

impl<'a> DialogWidget<'a> {
    pub fn new(mode: &'a AppMode, input: &'a LineInput, theme: &'a ThemeColors) -> Self {
        Self {
            mode,
            input,
            history: &[],
            history_selected: 0,
            theme,
        }
    }

    pub fn history(mut self, entries: &'a [String], selected: usize) -> Self {
        self.history = entries;
        self.history_selected = selected;
        self
    }

    /// Calculate a centered rectangle within the given area.
    fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height.saturating_sub(height) / 2;
        let w = width.min(area.width);
        let h = height.min(area.height);
        Rect::new(x, y, w, h)
    }

    fn framed(&self, title: String, width: u16, height: u16, area: Rect, buf: &mut Buffer) -> Rect {
        let rect = Self::centered_rect(width, height, area);
        Clear.render(rect, buf);

        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border_focused_fg))
            .padding(Padding::horizontal(1));

        let inner = block.inner(rect);
        block.render(rect, buf);
        inner
    }

    fn hint(&self, text: &'static str, inner: Rect, buf: &mut Buffer) {
        if inner.height > 1 {
            let hint_line = Line::from(Span::styled(
                text,
                Style::default()
                    .fg(self.theme.dim_fg)
                    .add_modifier(Modifier::DIM),
            ));
            buf.set_line(inner.x, inner.y + inner.height - 1, &hint_line, inner.width);
        }
    }

    fn render_input(&self, title: &str, area: Rect, buf: &mut Buffer) {
        let width = 50.min(area.width.saturating_sub(4));
        let inner = self.framed(format!(" {} ", title), width, 5, area, buf);
        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let (before, at, after) = self.input.split_at_cursor();

        // Keep the cursor visible by dropping characters from the left.
        let max_width = inner.width as usize;
        let before_len = before.chars().count();
        let skip = before_len.saturating_sub(max_width.saturating_sub(2));
        let before_display: String = before.chars().skip(skip).collect();

        let input_style = Style::default().fg(self.theme.status_fg);
        let cursor_style = Style::default()
            .bg(self.theme.status_fg)
            .fg(self.theme.tree_selected_bg)
            .add_modifier(Modifier::BOLD);

        let line = Line::from(vec![
            Span::styled(before_display, input_style),
            Span::styled(if at.is_empty() { " " } else { at }, cursor_style),
            Span::styled(after, input_style),
        ]);
        buf.set_line(inner.x, inner.y + inner.height / 2, &line, inner.width);

        self.hint("[Enter] Confirm  [Esc] Cancel", inner, buf);
    }

    fn render_confirm(&self, node: &Node, area: Rect, buf: &mut Buffer) {
        let width = (node.name.chars().count() as u16 + 10)
            .max(40)
            .min(area.width.saturating_sub(4));
        let inner = self.framed(" Delete Confirmation ".to_string(), width, 6, area, buf);
        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let header = Line::from(Span::styled(
            if node.is_dir() {
                "Delete this directory and its contents?"
            } else {
                "Delete this file?"
            },
            Style::default()
                .fg(self.theme.warning_fg)
                .add_modifier(Modifier::BOLD),
        ));
        buf.set_line(inner.x, inner.y, &header, inner.width);

        if inner.height > 2 {
            let name = Line::from(Span::styled(
                format!("  • {}", node.name),
                Style::default().fg(self.theme.status_fg),
            ));
            buf.set_line(inner.x, inner.y + 1, &name, inner.width);
        }

        self.hint("[y] Yes  [n/Esc] Cancel", inner, buf);
    }

    fn render_history(&self, area: Rect, buf: &mut Buffer) {
        let width = (area.width * 60 / 100).clamp(30, 70).min(area.width);
        let height = (self.history.len() as u16 + 3)
            .clamp(5, 16)
            .min(area.height);
        let inner = self.framed(" Search History ".to_string(), width, height, area, buf);
        if inner.height == 0 || inner.width == 0 {
            return;
        }

        if self.history.is_empty() {
            let line = Line::from(Span::styled(
                "No previous searches",
                Style::default().fg(self.theme.dim_fg),
            ));
            buf.set_line(inner.x, inner.y, &line, inner.width);
            self.hint("[Esc] Close", inner, buf);
            return;
        }

        let visible = inner.height.saturating_sub(1) as usize;
        let scroll = (self.history_selected + 1).saturating_sub(visible);

        for (i, entry) in self
            .history
            .iter()
            .enumerate()
            .skip(scroll)
            .take(visible)
        {
            let y = inner.y + (i - scroll) as u16;
            let line = if i == self.history_selected {
                Line::from(Span::styled(
                    format!("▸ {}", entry),
                    Style::default()
                        .bg(self.theme.tree_selected_bg)
                        .fg(self.theme.tree_selected_fg)
                        .add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(Span::styled(
                    format!("  {}", entry),
                    Style::default().fg(self.theme.status_fg),
                ))
            };
            buf.set_line(inner.x, y, &line, inner.width);
        }

        self.hint("[Enter] Search  [Esc] Close", inner, buf);
    }
}

impl<'a> Widget for DialogWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let kind = match self.mode {
            AppMode::Dialog(kind) => kind,
            _ => return,
        };

        match kind {
            DialogKind::CreateFile => self.render_input("Create New File", area, buf),
            DialogKind::CreateDirectory => self.render_input("Create New Directory", area, buf),
            DialogKind::DeleteConfirm { node } => self.render_confirm(node, area, buf),
            DialogKind::History => self.render_history(area, buf),
            DialogKind::GoTo => self.render_input("Go To Directory", area, buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme;
    use fm_search::fs::node::NodeKind;

    fn buffer_to_string(buf: &Buffer, area: Rect) -> String {
        let mut s = String::new();
        for y in area.y..area.y + area.height {
            for x in area.x..area.x + area.width {
                s.push_str(buf.cell((x, y)).unwrap().symbol());
            }
            s.push('\n');
        }
        s
    }

    fn render(widget: DialogWidget<'_>) -> String {
        let area = Rect::new(0, 0, 80, 24);
        let mut buf = Buffer::empty(area);
        widget.render(area, &mut buf);
        buffer_to_string(&buf, area)
    }

    #[test]
    fn input_dialog_renders() {
        let tc = theme::dark_theme();
        let mode = AppMode::Dialog(DialogKind::CreateFile);
        let mut input = LineInput::default();
        input.set("test.txt");

        let content = render(DialogWidget::new(&mode, &input, &tc));

        assert!(content.contains("Create New File"));
        assert!(content.contains("test.txt"));
    }

    #[test]
    fn confirm_dialog_names_the_target() {
        let tc = theme::dark_theme();
        let mode = AppMode::Dialog(DialogKind::DeleteConfirm {
            node: Node::new("/tmp/file1.txt", NodeKind::File),
        });
        let input = LineInput::default();

        let content = render(DialogWidget::new(&mode, &input, &tc));

        assert!(content.contains("Delete Confirmation"));
        assert!(content.contains("Delete this file?"));
        assert!(content.contains("file1.txt"));
    }

    #[test]
    fn history_dialog_marks_selection() {
        let tc = theme::dark_theme();
        let mode = AppMode::Dialog(DialogKind::History);
        let input = LineInput::default();
        let entries = vec!["needle".to_string(), "fn main".to_string()];

        let content = render(DialogWidget::new(&mode, &input, &tc).history(&entries, 1));

        assert!(content.contains("Search History"));
        assert!(content.contains("  needle"));
        assert!(content.contains("▸ fn main"));
    }

    #[test]
    fn empty_history_shows_placeholder() {
        let tc = theme::dark_theme();
        let mode = AppMode::Dialog(DialogKind::History);
        let input = LineInput::default();

        let content = render(DialogWidget::new(&mode, &input, &tc));

        assert!(content.contains("No previous searches"));
    }

    #[test]
    fn go_to_dialog_shows_typed_path() {
        let tc = theme::dark_theme();
        let mode = AppMode::Dialog(DialogKind::GoTo);
        let mut input = LineInput::default();
        input.set("~/src");

        let content = render(DialogWidget::new(&mode, &input, &tc));

        assert!(content.contains("Go To Directory"));
        assert!(content.contains("~/src"));
    }

    #[test]
    fn no_dialog_mode_noop() {
        let tc = theme::dark_theme();
        let mode = AppMode::Normal;
        let input = LineInput::default();

        let content = render(DialogWidget::new(&mode, &input, &tc));

        assert!(content.trim().is_empty());
    }
}
