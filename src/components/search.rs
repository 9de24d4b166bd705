use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Widget},
};

use fm_search::search::timeout::format_timeout;
use fm_search::search::types::{Match, SearchOptions, SearchResult};

use crate::app::LineInput;
use crate::theme::ThemeColors;

/// Search bar: query input, option flags and the current timeout.
pub struct SearchBarWidget<'a> {
    input: &'a LineInput,
    options: SearchOptions,
    timeout_secs: u64,
    focused: bool,
    theme: &'a ThemeColors,
}

impl<'a> SearchBarWidget<'a> {
    pub fn new(
        input: &'a LineInput,
        options: SearchOptions,
        timeout_secs: u64,
        theme: &'a ThemeColors,
    ) -> Self {
        Self {
            input,
            options,
            timeout_secs,
            focused: false,
            theme,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    fn flag(&self, label: &'static str, on: bool) -> Span<'static> {
        let style = if on {
            Style::default()
                .fg(self.theme.option_on_fg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.theme.dim_fg)
        };
        Span::styled(label, style)
    }
}

impl<'a> Widget for SearchBarWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        let border_fg = if self.focused {
            self.theme.border_focused_fg
        } else {
            self.theme.border_fg
        };
        let block = Block::default()
            .title(" Search ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_fg))
            .padding(Padding::horizontal(1));

        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let right = vec![
            self.flag("[.*]", self.options.regex()),
            Span::raw(" "),
            self.flag("[Aa]", self.options.case_sensitive()),
            Span::raw(" "),
            self.flag("[W]", self.options.whole_word()),
            Span::raw(" "),
            Span::styled(
                format!("⏱ {}", format_timeout(self.timeout_secs)),
                Style::default().fg(self.theme.info_fg),
            ),
        ];
        let right_width: u16 = right.iter().map(|s| s.width() as u16).sum();
        let right_x = inner.x + inner.width.saturating_sub(right_width);
        buf.set_line(right_x, inner.y, &Line::from(right), inner.width);

        let input_width = right_x.saturating_sub(inner.x).saturating_sub(1);
        let prompt_style = Style::default()
            .fg(self.theme.accent_fg)
            .add_modifier(Modifier::BOLD);
        let input_style = Style::default().fg(self.theme.status_fg);

        let mut spans = vec![Span::styled("> ", prompt_style)];
        if self.focused {
            let (before, at, after) = self.input.split_at_cursor();
            let cursor_style = Style::default()
                .bg(self.theme.status_fg)
                .fg(self.theme.tree_selected_bg)
                .add_modifier(Modifier::BOLD);
            spans.push(Span::styled(before, input_style));
            spans.push(Span::styled(if at.is_empty() { " " } else { at }, cursor_style));
            spans.push(Span::styled(after, input_style));
        } else if self.input.input.is_empty() {
            spans.push(Span::styled(
                "press / to search",
                Style::default().fg(self.theme.dim_fg),
            ));
        } else {
            spans.push(Span::styled(self.input.input.as_str(), input_style));
        }

        buf.set_line(inner.x, inner.y, &Line::from(spans), input_width);
    }
}

/// Matched lines of one file, with the matched ranges highlighted.
pub struct MatchesWidget<'a> {
    result: &'a SearchResult,
    theme: &'a ThemeColors,
}

impl<'a> MatchesWidget<'a> {
    pub fn new(result: &'a SearchResult, theme: &'a ThemeColors) -> Self {
        Self { result, theme }
    }

    fn match_line(&self, m: &'a Match) -> Line<'a> {
        let line_style = Style::default().fg(self.theme.match_line_fg);
        let range_style = Style::default()
            .bg(self.theme.match_range_bg)
            .fg(self.theme.tree_selected_bg)
            .add_modifier(Modifier::BOLD);

        let mut spans = vec![Span::styled(
            format!("{:>5}: ", m.line),
            Style::default().fg(self.theme.dim_fg),
        )];

        let content = m.content.as_str();
        let mut pos = 0;
        for &[start, end] in &m.ranges {
            let end = end.min(content.len());
            if start < pos
                || start >= end
                || !content.is_char_boundary(start)
                || !content.is_char_boundary(end)
            {
                continue;
            }
            if start > pos {
                spans.push(Span::styled(&content[pos..start], line_style));
            }
            spans.push(Span::styled(&content[start..end], range_style));
            pos = end;
        }
        if pos < content.len() {
            spans.push(Span::styled(&content[pos..], line_style));
        }

        Line::from(spans)
    }
}

impl<'a> Widget for MatchesWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let name = self
            .result
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let block = Block::default()
            .title(format!(" {} ({}) ", name, self.result.match_count()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border_fg));

        let inner = block.inner(area);
        block.render(area, buf);

        for (i, m) in self
            .result
            .matches
            .iter()
            .take(inner.height as usize)
            .enumerate()
        {
            let line = self.match_line(m);
            buf.set_line(inner.x, inner.y + i as u16, &line, inner.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme;
    use std::path::PathBuf;

    fn buffer_lines(buf: &Buffer, area: Rect) -> Vec<String> {
        (area.y..area.y + area.height)
            .map(|y| {
                (area.x..area.x + area.width)
                    .map(|x| buf.cell((x, y)).unwrap().symbol().to_string())
                    .collect()
            })
            .collect()
    }

    fn input(text: &str) -> LineInput {
        let mut input = LineInput::default();
        input.set(text);
        input
    }

    #[test]
    fn search_bar_shows_query_flags_and_timeout() {
        let tc = theme::dark_theme();
        let query = input("needle");
        let options = SearchOptions::default().with_regex(true);
        let area = Rect::new(0, 0, 60, 3);
        let mut buf = Buffer::empty(area);

        SearchBarWidget::new(&query, options, 125, &tc)
            .focused(true)
            .render(area, &mut buf);

        let lines = buffer_lines(&buf, area);
        assert!(lines[0].contains("Search"));
        assert!(lines[1].contains("> needle"));
        assert!(lines[1].contains("[.*]"));
        assert!(lines[1].contains("2m 5s"));
    }

    #[test]
    fn enabled_flag_uses_option_color() {
        let tc = theme::dark_theme();
        let query = input("");
        let options = SearchOptions::default().with_whole_word(true);
        let area = Rect::new(0, 0, 60, 3);
        let mut buf = Buffer::empty(area);

        SearchBarWidget::new(&query, options, 45, &tc).render(area, &mut buf);

        let lines = buffer_lines(&buf, area);
        let byte_idx = lines[1].find("[W]").unwrap();
        let col = lines[1][..byte_idx].chars().count() as u16;
        let cell = buf.cell((col + 1, 1)).unwrap();
        assert_eq!(cell.fg, tc.option_on_fg);
        assert!(lines[1].contains("press / to search"));
    }

    #[test]
    fn matches_panel_lists_lines_with_numbers() {
        let tc = theme::dark_theme();
        let result = SearchResult {
            path: PathBuf::from("/r/notes.txt"),
            matches: vec![
                Match {
                    line: 4,
                    content: "find the needle".into(),
                    ranges: vec![[9, 15]],
                },
                Match {
                    line: 12,
                    content: "needle again".into(),
                    ranges: vec![[0, 6]],
                },
            ],
        };
        let area = Rect::new(0, 0, 40, 4);
        let mut buf = Buffer::empty(area);

        MatchesWidget::new(&result, &tc).render(area, &mut buf);

        let lines = buffer_lines(&buf, area);
        assert!(lines[0].contains("notes.txt (2)"));
        assert!(lines[1].contains("4: find the needle"));
        assert!(lines[2].contains("12: needle again"));
    }

    #[test]
    fn match_ranges_are_highlighted() {
        let tc = theme::dark_theme();
        let m = Match {
            line: 1,
            content: "a needle b".into(),
            ranges: vec![[2, 8]],
        };
        let result = SearchResult {
            path: PathBuf::from("/r/f"),
            matches: vec![m],
        };
        let widget = MatchesWidget::new(&result, &tc);

        let line = widget.match_line(&result.matches[0]);
        let texts: Vec<&str> = line.spans.iter().map(|s| s.content.as_ref()).collect();

        assert_eq!(texts, vec!["    1: ", "a ", "needle", " b"]);
        assert_eq!(line.spans[2].style.bg, Some(tc.match_range_bg));
    }

    #[test]
    fn out_of_bounds_ranges_are_skipped() {
        let tc = theme::dark_theme();
        let result = SearchResult {
            path: PathBuf::from("/r/f"),
            matches: vec![Match {
                line: 1,
                content: "héllo".into(),
                ranges: vec![[1, 2], [40, 50]],
            }],
        };
        let widget = MatchesWidget::new(&result, &tc);

        let line = widget.match_line(&result.matches[0]);
        let text: String = line.spans.iter().skip(1).map(|s| s.content.as_ref()).collect();

        assert_eq!(text, "héllo");
    }
}
