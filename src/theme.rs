//! Colors used by the terminal host (Catppuccin Mocha).

use ratatui::style::Color;

#[derive(Debug, Clone)]
pub struct ThemeColors {
    // Tree panel
    pub tree_selected_bg: Color,
    pub tree_selected_fg: Color,
    pub tree_dir_fg: Color,
    pub tree_file_fg: Color,
    pub tree_hidden_fg: Color,

    // Search
    pub match_badge_fg: Color,
    pub match_line_fg: Color,
    pub match_range_bg: Color,
    pub option_on_fg: Color,

    // Status bar
    pub status_fg: Color,

    // Borders
    pub border_fg: Color,
    pub border_focused_fg: Color,

    // Semantic
    pub error_fg: Color,
    pub warning_fg: Color,
    pub success_fg: Color,
    pub info_fg: Color,
    pub accent_fg: Color,
    pub dim_fg: Color,
}

pub fn dark_theme() -> ThemeColors {
    ThemeColors {
        tree_selected_bg: Color::Rgb(69, 71, 90),     // #45475a (surface1)
        tree_selected_fg: Color::Rgb(205, 214, 244),  // #cdd6f4 (text)
        tree_dir_fg: Color::Rgb(137, 180, 250),       // #89b4fa (blue)
        tree_file_fg: Color::Rgb(205, 214, 244),      // #cdd6f4
        tree_hidden_fg: Color::Rgb(108, 112, 134),    // #6c7086 (overlay0)

        match_badge_fg: Color::Rgb(250, 179, 135),    // #fab387 (peach)
        match_line_fg: Color::Rgb(186, 194, 222),     // #bac2de (subtext1)
        match_range_bg: Color::Rgb(249, 226, 175),    // #f9e2af (yellow)
        option_on_fg: Color::Rgb(148, 226, 213),      // #94e2d5 (teal)

        status_fg: Color::Rgb(205, 214, 244),

        border_fg: Color::Rgb(88, 91, 112),           // #585b70 (surface2)
        border_focused_fg: Color::Rgb(137, 180, 250),

        error_fg: Color::Rgb(243, 139, 168),          // #f38ba8 (red)
        warning_fg: Color::Rgb(249, 226, 175),        // #f9e2af (yellow)
        success_fg: Color::Rgb(166, 227, 161),        // #a6e3a1 (green)
        info_fg: Color::Rgb(137, 180, 250),           // #89b4fa (blue)
        accent_fg: Color::Rgb(203, 166, 247),         // #cba6f7 (mauve)
        dim_fg: Color::Rgb(108, 112, 134),
    }
}
