use std::cmp::Ordering;

use crate::fs::node::{Node, NodeKind};

/// Order siblings for display.
///
/// With `group_directories_first`, every directory precedes every file.
/// Names compare case-insensitively. The sort is stable, so entries with equal
/// keys keep their relative order and sorting twice changes nothing.
pub fn sort_siblings(mut nodes: Vec<Node>, group_directories_first: bool) -> Vec<Node> {
    sort_siblings_in_place(&mut nodes, group_directories_first);
    nodes
}

/// In-place variant of [`sort_siblings`], used when resorting cached lists.
pub fn sort_siblings_in_place(nodes: &mut [Node], group_directories_first: bool) {
    nodes.sort_by(|a, b| compare_siblings(a, b, group_directories_first));
}

fn compare_siblings(a: &Node, b: &Node, group_directories_first: bool) -> Ordering {
    let mut cmp = Ordering::Equal;

    if group_directories_first {
        cmp = matches!(b.kind, NodeKind::Directory).cmp(&matches!(a.kind, NodeKind::Directory));
    }

    cmp.then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(name: &str) -> Node {
        Node::new(format!("/root/{name}"), NodeKind::Directory)
    }

    fn file(name: &str) -> Node {
        Node::new(format!("/root/{name}"), NodeKind::File)
    }

    fn names(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    fn sample() -> Vec<Node> {
        vec![
            file("zeta.txt"),
            dir("beta"),
            file("Alpha.md"),
            dir("Gamma"),
            file("alpha.rs"),
            dir("aardvark"),
        ]
    }

    #[test]
    fn grouped_puts_directories_first() {
        let sorted = sort_siblings(sample(), true);
        assert_eq!(
            names(&sorted),
            vec!["aardvark", "beta", "Gamma", "Alpha.md", "alpha.rs", "zeta.txt"]
        );
    }

    #[test]
    fn ungrouped_is_purely_alphabetical() {
        let sorted = sort_siblings(sample(), false);
        assert_eq!(
            names(&sorted),
            vec!["aardvark", "Alpha.md", "alpha.rs", "beta", "Gamma", "zeta.txt"]
        );
    }

    #[test]
    fn no_file_precedes_a_directory_when_grouped() {
        let sorted = sort_siblings(sample(), true);
        let first_file = sorted.iter().position(|n| !n.is_dir()).unwrap();
        assert!(sorted[first_file..].iter().all(|n| !n.is_dir()));
    }

    #[test]
    fn sorting_is_idempotent() {
        for grouped in [true, false] {
            let once = sort_siblings(sample(), grouped);
            let twice = sort_siblings(once.clone(), grouped);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let mut upper = file("Readme");
        upper.path = "/a/Readme".into();
        let mut lower = file("readme");
        lower.path = "/b/readme".into();

        let sorted = sort_siblings(vec![upper.clone(), lower.clone()], false);
        assert_eq!(sorted, vec![upper.clone(), lower.clone()]);

        let sorted = sort_siblings(vec![lower.clone(), upper.clone()], false);
        assert_eq!(sorted, vec![lower, upper]);
    }

    #[test]
    fn empty_input_is_fine() {
        assert!(sort_siblings(Vec::new(), true).is_empty());
    }
}
