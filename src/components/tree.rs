use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Widget},
};

use fm_search::fs::node::NodeKind;
use fm_search::fs::tree::TreeRow;
use fm_search::search::highlight::HighlightMap;

use crate::theme::ThemeColors;

/// Tree widget that renders cached rows with box-drawing characters and
/// match-count badges.
pub struct TreeWidget<'a> {
    rows: &'a [TreeRow],
    selected: usize,
    scroll: usize,
    highlights: &'a HighlightMap,
    theme: &'a ThemeColors,
    block: Option<Block<'a>>,
}

impl<'a> TreeWidget<'a> {
    pub fn new(
        rows: &'a [TreeRow],
        highlights: &'a HighlightMap,
        theme: &'a ThemeColors,
    ) -> Self {
        Self {
            rows,
            selected: 0,
            scroll: 0,
            highlights,
            theme,
            block: None,
        }
    }

    pub fn selection(mut self, selected: usize, scroll: usize) -> Self {
        self.selected = selected;
        self.scroll = scroll;
        self
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// Build the indentation prefix for the row at `index`.
    ///
    /// Continuation lines depend on whether each ancestor was the last of
    /// its siblings, found by walking back to the nearest row at that depth.
    fn build_prefix(rows: &[TreeRow], index: usize) -> String {
        let row = &rows[index];
        let mut prefix = String::new();

        for d in 0..row.depth {
            let mut ancestor_is_last = false;
            for j in (0..index).rev() {
                if rows[j].depth == d {
                    ancestor_is_last = rows[j].is_last_sibling;
                    break;
                }
                if rows[j].depth < d {
                    break;
                }
            }
            prefix.push_str(if ancestor_is_last { "   " } else { "│  " });
        }

        prefix.push_str(if row.is_last_sibling { "└──" } else { "├──" });
        prefix
    }

    fn indicator(row: &TreeRow) -> &'static str {
        match row.node.kind {
            NodeKind::Directory if row.is_loading => "[…] ",
            NodeKind::Directory if row.is_expanded => "[-] ",
            NodeKind::Directory => "[+] ",
            NodeKind::File => "    ",
        }
    }

    fn row_style(&self, row: &TreeRow, is_selected: bool) -> Style {
        if is_selected {
            Style::default()
                .bg(self.theme.tree_selected_bg)
                .fg(self.theme.tree_selected_fg)
                .add_modifier(Modifier::BOLD)
        } else if row.node.hidden {
            Style::default().fg(self.theme.tree_hidden_fg)
        } else {
            match row.node.kind {
                NodeKind::Directory => Style::default()
                    .fg(self.theme.tree_dir_fg)
                    .add_modifier(Modifier::BOLD),
                NodeKind::File => Style::default().fg(self.theme.tree_file_fg),
            }
        }
    }
}

impl<'a> Widget for TreeWidget<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_area = if let Some(block) = &self.block {
            let inner = block.inner(area);
            block.clone().render(area, buf);
            inner
        } else {
            area
        };

        let visible_height = inner_area.height as usize;
        if self.rows.is_empty() || visible_height == 0 {
            return;
        }

        let visible = self
            .rows
            .iter()
            .enumerate()
            .skip(self.scroll)
            .take(visible_height);

        for (i, (idx, row)) in visible.enumerate() {
            let y = inner_area.y + i as u16;
            let is_selected = idx == self.selected;

            let mut spans = vec![
                Span::raw(Self::build_prefix(self.rows, idx)),
                Span::styled(
                    format!("{}{}", Self::indicator(row), row.node.name),
                    self.row_style(row, is_selected),
                ),
            ];

            if let Some(hit) = self.highlights.get(&row.node.path) {
                spans.push(Span::styled(
                    format!(" ({})", hit.match_count),
                    Style::default()
                        .fg(self.theme.match_badge_fg)
                        .add_modifier(Modifier::BOLD),
                ));
            }

            let line = Line::from(spans);
            buf.set_line(inner_area.x, y, &line, inner_area.width);
        }
    }
}
