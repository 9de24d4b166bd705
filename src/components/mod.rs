pub mod dialog;
pub mod file_view;
pub mod search;
pub mod status_bar;
pub mod tree;
