//! Tree to flat record sequence

use super::values::ValueTable;
use super::Layout;
use crate::model::{Container, Record};
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Flatten a tree into `[value records][pointer records]`.
///
/// Pure; the record's position is its identity.
pub fn encode(tree: &Container, layout: Layout) -> Vec<Record> {
    let records = match layout {
        Layout::FirstChild => encode_first_child(tree),
        Layout::ChildList => encode_child_list(tree),
    };
    debug!(
        layout = %layout,
        records = records.len(),
        pointers = records.iter().filter(|r| r.is_pointer()).count(),
        "encoded tree"
    );
    records
}

/// Traversal step over borrowed containers
enum Visit<'a> {
    Enter(&'a str, &'a Container),
    Exit(&'a str, &'a Container),
}

/// Push the sub-containers of `dir` so they pop in insertion order
fn push_subdirs<'a>(stack: &mut Vec<Visit<'a>>, dir: &'a Container) {
    let subdirs: Vec<_> = dir.subdirs().collect();
    for (name, sub) in subdirs.into_iter().rev() {
        stack.push(Visit::Enter(name, sub));
    }
}

// === First-child layout ===

/// How a container name is materialized in the first-child layout
enum Kind<'a> {
    Empty,
    Terminal(&'a Container),
    /// Names of the container's sub-containers, in order
    Branch(Vec<&'a str>),
}

struct Discovery<'a> {
    kinds: HashMap<&'a str, Kind<'a>>,
    /// Every name seen, first occurrence order
    names: IndexSet<&'a str>,
}

/// Classify every container reachable from the root's sub-containers.
///
/// Names are global: the first occurrence of a name (pre-order) is the one
/// classified, and later containers with the same name are skipped together
/// with their subtrees.
fn discover(tree: &Container) -> Discovery<'_> {
    let mut kinds = HashMap::new();
    let mut claimed = HashSet::new();
    let mut names = IndexSet::new();

    let mut stack = Vec::new();
    push_subdirs(&mut stack, tree);

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(name, dir) => {
                if !claimed.insert(name) {
                    continue;
                }
                if dir.is_empty() {
                    kinds.insert(name, Kind::Empty);
                } else if dir.is_terminal_group() {
                    kinds.insert(name, Kind::Terminal(dir));
                } else {
                    stack.push(Visit::Exit(name, dir));
                    push_subdirs(&mut stack, dir);
                }
            }
            Visit::Exit(name, dir) => {
                let children = dir.subdirs().map(|(n, _)| n.as_str()).collect();
                kinds.insert(name, Kind::Branch(children));
                names.extend(dir.names().map(String::as_str));
            }
        }
    }
    names.extend(tree.subdirs().map(|(n, _)| n.as_str()));

    Discovery { kinds, names }
}

fn encode_first_child(tree: &Container) -> Vec<Record> {
    let Discovery { kinds, names } = discover(tree);

    let mut values = ValueTable::new(tree.leaves());
    let mut terminal_index = HashMap::new();
    for &name in &names {
        if let Some(Kind::Terminal(dir)) = kinds.get(name) {
            terminal_index.insert(name, values.intern(dir.leaves()));
        }
    }

    let base = values.len();
    let mut pointers: Vec<Record> = Vec::new();
    let mut assigned: HashMap<&str, usize> = HashMap::new();

    let walk = tree.subdirs().map(|(n, _)| n.as_str()).chain(names.iter().copied());
    for name in walk {
        // A branch points at its first child's record, so that record is
        // assigned first.
        let mut pending = vec![name];
        while let Some(&current) = pending.last() {
            if assigned.contains_key(current) {
                pending.pop();
                continue;
            }
            let Some(kind) = kinds.get(current) else {
                // Leaf name inside a mixed container; not representable here
                pending.pop();
                continue;
            };
            let target = match kind {
                Kind::Empty => None,
                Kind::Terminal(_) => terminal_index.get(current).copied(),
                Kind::Branch(children) => match children.first() {
                    Some(&first) => match assigned.get(first) {
                        Some(&index) => Some(index),
                        None if pending.contains(&first) => {
                            warn!(name = current, child = first, "name cycle, dropping child link");
                            None
                        }
                        None => {
                            pending.push(first);
                            continue;
                        }
                    },
                    None => None,
                },
            };
            assigned.insert(current, base + pointers.len());
            pointers.push(Record::pointer(current, target));
            pending.pop();
        }
    }

    values.into_records().chain(pointers).collect()
}

// === Child-list layout ===

fn encode_child_list(tree: &Container) -> Vec<Record> {
    let mut values = ValueTable::new(tree.leaves());
    // (name, leaf group index, pointer positions of sub-containers)
    let mut pointers: Vec<(&str, Option<usize>, Vec<usize>)> = Vec::new();
    // Positions of finished containers; a parent takes its children off the top
    let mut finished: Vec<usize> = Vec::new();

    let mut stack = Vec::new();
    push_subdirs(&mut stack, tree);

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(name, dir) => {
                stack.push(Visit::Exit(name, dir));
                push_subdirs(&mut stack, dir);
            }
            Visit::Exit(name, dir) => {
                let child_count = dir.subdirs().count();
                let children = finished.split_off(finished.len() - child_count);
                let leaves = dir.leaves();
                let target = if leaves.is_empty() {
                    None
                } else {
                    Some(values.intern(leaves))
                };
                finished.push(pointers.len());
                pointers.push((name, target, children));
            }
        }
    }

    let base = values.len();
    values
        .into_records()
        .chain(pointers.into_iter().map(|(name, target, children)| {
            Record::branch(name, target, children.into_iter().map(|p| base + p).collect())
        }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Leaf;
    use indexmap::IndexMap;

    fn entries(pairs: &[(&str, Leaf)]) -> IndexMap<String, Leaf> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_tree_encodes_to_nothing() {
        assert!(encode(&Container::new(), Layout::FirstChild).is_empty());
        assert!(encode(&Container::new(), Layout::ChildList).is_empty());
    }

    #[test]
    fn test_first_child_root_primitives_and_empty_dir() {
        let tree = Container::new()
            .with("a", Leaf::from(1))
            .with("b", Leaf::from("x"))
            .with("Dir", Container::new());

        let records = encode(&tree, Layout::FirstChild);
        assert_eq!(
            records,
            vec![
                Record::value(entries(&[("a", Leaf::from(1)), ("b", Leaf::from("x"))])),
                Record::pointer("Dir", None),
            ]
        );
    }

    #[test]
    fn test_first_child_assigns_child_before_parent() {
        let tree = Container::new().with(
            "Outer",
            Container::new().with("Inner", Container::new().with("f", Leaf::from("a"))),
        );

        let records = encode(&tree, Layout::FirstChild);
        assert_eq!(
            records,
            vec![
                Record::value(entries(&[("f", Leaf::from("a"))])),
                Record::pointer("Inner", Some(0)),
                Record::pointer("Outer", Some(1)),
            ]
        );
    }

    #[test]
    fn test_first_child_dedups_terminal_groups() {
        let group = Container::new().with("f", Leaf::from("same"));
        let tree = Container::new()
            .with("A", group.clone())
            .with("B", group)
            .with("C", Container::new().with("f", Leaf::from("other")));

        let records = encode(&tree, Layout::FirstChild);
        let values = records.iter().filter(|r| !r.is_pointer()).count();
        assert_eq!(values, 2);
        assert!(records.contains(&Record::pointer("A", Some(0))));
        assert!(records.contains(&Record::pointer("B", Some(0))));
        assert!(records.contains(&Record::pointer("C", Some(1))));
    }

    #[test]
    fn test_first_child_first_name_wins() {
        let tree = Container::new()
            .with("A", Container::new().with("Same", Container::new().with("f", Leaf::from(1))))
            .with("B", Container::new().with("Same", Container::new()));

        let records = encode(&tree, Layout::FirstChild);
        let same: Vec<_> = records
            .iter()
            .filter(|r| matches!(r, Record::Pointer { name, .. } if name == "Same"))
            .collect();
        assert_eq!(same, vec![&Record::pointer("Same", Some(0))]);
    }

    #[test]
    fn test_first_child_survives_name_cycle() {
        // The inner "B" is a later duplicate; the first "B" links back to "A"
        let tree = Container::new().with(
            "B",
            Container::new().with("A", Container::new().with("B", Container::new())),
        );
        let records = encode(&tree, Layout::FirstChild);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_child_list_layout() {
        let tree = Container::new()
            .with("theme", Leaf::from("dark"))
            .with(
                "Docs",
                Container::new()
                    .with("readme", Leaf::from("hi"))
                    .with("A", Container::new())
                    .with("B", Container::new().with("f", Leaf::from(1))),
            );

        let records = encode(&tree, Layout::ChildList);
        assert_eq!(
            records,
            vec![
                Record::value(entries(&[("theme", Leaf::from("dark"))])),
                Record::value(entries(&[("f", Leaf::from(1))])),
                Record::value(entries(&[("readme", Leaf::from("hi"))])),
                Record::branch("A", None, vec![]),
                Record::branch("B", Some(1), vec![]),
                Record::branch("Docs", Some(2), vec![3, 4]),
            ]
        );
    }

    #[test]
    fn test_deep_nesting() {
        let mut tree = Container::new().with("leaf", Leaf::from(0));
        for depth in 0..1_000 {
            tree = Container::new().with(format!("d{}", depth), tree);
        }
        for layout in [Layout::FirstChild, Layout::ChildList] {
            assert_eq!(encode(&tree, layout).len(), 1_001);
        }
    }
}
