use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::theme::ThemeColors;

const KEY_HINTS: &str = " /:search  n:next  u:up  o:open  b:back  v:view  q:quit ";

/// Status bar: current path, search summary, busy marker, watcher state and
/// key hints. A transient status message replaces the whole bar.
pub struct StatusBarWidget<'a> {
    path_str: &'a str,
    summary: Option<&'a str>,
    theme: &'a ThemeColors,
    status_message: Option<&'a str>,
    is_error: bool,
    busy: Option<&'a str>,
    watcher_status: Option<&'a str>,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(path_str: &'a str, theme: &'a ThemeColors) -> Self {
        Self {
            path_str,
            summary: None,
            theme,
            status_message: None,
            is_error: false,
            busy: None,
            watcher_status: None,
        }
    }

    pub fn summary(mut self, summary: &'a str) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn status_message(mut self, msg: &'a str, is_error: bool) -> Self {
        self.status_message = Some(msg);
        self.is_error = is_error;
        self
    }

    pub fn busy(mut self, label: &'a str) -> Self {
        self.busy = Some(label);
        self
    }

    pub fn watcher_status(mut self, status: &'a str) -> Self {
        self.watcher_status = Some(status);
        self
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Keep the last `budget` characters, marking the cut with `...`.
fn truncate_left(s: &str, budget: usize) -> String {
    let len = char_len(s);
    if len <= budget {
        return s.to_string();
    }
    if budget <= 3 {
        return s.chars().take(budget).collect();
    }
    let tail: String = s.chars().skip(len - (budget - 3)).collect();
    format!("...{}", tail)
}

impl<'a> Widget for StatusBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let width = area.width as usize;

        if let Some(msg) = self.status_message {
            let style = if self.is_error {
                Style::default()
                    .bg(self.theme.error_fg)
                    .fg(self.theme.status_fg)
            } else {
                Style::default().fg(self.theme.success_fg)
            };

            let mut display: String = msg.chars().take(width).collect();
            let pad = width.saturating_sub(char_len(&display));
            display.push_str(&" ".repeat(pad));

            let line = Line::from(Span::styled(display, style));
            buf.set_line(area.x, area.y, &line, area.width);
            return;
        }

        let hints_len = char_len(KEY_HINTS);
        let remaining = width.saturating_sub(hints_len);

        let summary = self.summary.unwrap_or("");
        let path_budget = remaining
            .saturating_sub(char_len(summary))
            .saturating_sub(1);
        let path_display = truncate_left(self.path_str, path_budget);

        let summary_budget = remaining.saturating_sub(char_len(&path_display));
        let summary_display: String = summary.chars().take(summary_budget).collect();

        let gap = remaining
            .saturating_sub(char_len(&path_display))
            .saturating_sub(char_len(&summary_display));

        let mut spans = vec![
            Span::styled(path_display, Style::default().fg(self.theme.status_fg)),
            Span::raw(" ".repeat(gap)),
            Span::styled(summary_display, Style::default().fg(self.theme.info_fg)),
        ];

        if let Some(busy) = self.busy {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                busy.to_string(),
                Style::default()
                    .fg(self.theme.accent_fg)
                    .add_modifier(Modifier::BOLD),
            ));
        }

        if let Some(watcher_str) = self.watcher_status {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                watcher_str.to_string(),
                Style::default()
                    .fg(self.theme.warning_fg)
                    .add_modifier(Modifier::BOLD),
            ));
        }

        let used: usize = spans.iter().map(|s| char_len(&s.content)).sum();
        let pad = width.saturating_sub(used).saturating_sub(hints_len);
        if pad > 0 {
            spans.push(Span::raw(" ".repeat(pad)));
        }
        spans.push(Span::styled(
            KEY_HINTS,
            Style::default()
                .fg(self.theme.dim_fg)
                .add_modifier(Modifier::DIM),
        ));

        let line = Line::from(spans);
        buf.set_line(area.x, area.y, &line, area.width);
    }
}
