use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use fm_search::fs::node::display_name;

use crate::app::{FileText, FileView};
use crate::theme::ThemeColors;

/// Read-only file pane with line numbers. Lines that matched the current
/// search are marked.
pub struct FileViewWidget<'a> {
    view: &'a FileView,
    matched_lines: &'a [usize],
    focused: bool,
    theme: &'a ThemeColors,
}

impl<'a> FileViewWidget<'a> {
    pub fn new(view: &'a FileView, theme: &'a ThemeColors) -> Self {
        Self {
            view,
            matched_lines: &[],
            focused: false,
            theme,
        }
    }

    /// One-based line numbers to mark.
    pub fn matched_lines(mut self, lines: &'a [usize]) -> Self {
        self.matched_lines = lines;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    fn placeholder(&self, text: &str, style: Style, inner: Rect, buf: &mut Buffer) {
        let line = Line::from(Span::styled(text.to_string(), style));
        buf.set_line(inner.x, inner.y, &line, inner.width);
    }
}

impl<'a> Widget for FileViewWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let position = match &self.view.text {
            FileText::Lines(lines) if !lines.is_empty() => {
                format!(" {}/{} ", self.view.scroll + 1, lines.len())
            }
            _ => String::new(),
        };
        let block = Block::default()
            .title(format!(" {} ", display_name(&self.view.path)))
            .title_bottom(Line::from(position).right_aligned())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if self.focused {
                self.theme.border_focused_fg
            } else {
                self.theme.border_fg
            }));

        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let lines = match &self.view.text {
            FileText::Loading => {
                self.placeholder("Loading…", Style::default().fg(self.theme.dim_fg), inner, buf);
                return;
            }
            FileText::Failed(message) => {
                self.placeholder(message, Style::default().fg(self.theme.error_fg), inner, buf);
                return;
            }
            FileText::Lines(lines) if lines.is_empty() => {
                self.placeholder("Empty file", Style::default().fg(self.theme.dim_fg), inner, buf);
                return;
            }
            FileText::Lines(lines) => lines,
        };

        let number_width = lines.len().to_string().len();
        let text_style = Style::default().fg(self.theme.tree_file_fg);
        let matched_style = Style::default()
            .fg(self.theme.match_badge_fg)
            .add_modifier(Modifier::BOLD);

        for (row, (index, text)) in lines
            .iter()
            .enumerate()
            .skip(self.view.scroll)
            .take(inner.height as usize)
            .enumerate()
        {
            let number = index + 1;
            let matched = self.matched_lines.contains(&number);
            let (marker, gutter_style, body_style) = if matched {
                ("▸", matched_style, matched_style)
            } else {
                ("│", Style::default().fg(self.theme.dim_fg), text_style)
            };
            let line = Line::from(vec![
                Span::styled(
                    format!("{:>width$} {} ", number, marker, width = number_width),
                    gutter_style,
                ),
                Span::styled(text.as_str(), body_style),
            ]);
            buf.set_line(inner.x, inner.y + row as u16, &line, inner.width);
        }
    }
}
