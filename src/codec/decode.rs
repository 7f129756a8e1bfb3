//! Flat record sequence back to a tree

use crate::model::{Container, Leaf, Node, Record, StoredRecord};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

/// Rebuild a tree from records produced by [`encode`](super::encode).
///
/// Records are partitioned by kind, keeping array order. Index `i` addresses
/// value record `i` when `i < V`, otherwise pointer record `i - V`. Every
/// pointer is resolved; pointers nobody references become root children, and
/// value records no pointer targets are merged into the root as leaves.
///
/// "Referenced" is tracked per pointer record, not per name: when two
/// pointers share a name and only one is referenced, the other still lands
/// at the root.
pub fn decode(records: &[Record]) -> Result<Container> {
    let mut resolver = Resolver::new(records);
    resolver.resolve_all()?;
    let tree = resolver.finish();
    debug!(records = records.len(), entries = tree.len(), "decoded tree");
    Ok(tree)
}

/// Decode persisted records, ignoring their identifiers
pub fn decode_stored(records: Vec<StoredRecord>) -> Result<Container> {
    let records: Vec<Record> = records.into_iter().map(StoredRecord::into_record).collect();
    decode(&records)
}

/// Decode records in the untagged wire shape, classifying each by shape.
///
/// Fails on the first record that is neither shape; nothing is dropped.
pub fn decode_untagged(records: Vec<Map<String, Value>>) -> Result<Container> {
    let records = records
        .into_iter()
        .enumerate()
        .map(|(index, map)| Record::from_untagged(index, map))
        .collect::<Result<Vec<_>>>()?;
    decode(&records)
}

struct Pointer<'a> {
    /// Position in the input, for error reporting
    position: usize,
    name: &'a str,
    target: Option<usize>,
    children: Option<&'a [usize]>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Unvisited,
    InProgress,
    Done,
}

struct Resolver<'a> {
    values: Vec<&'a IndexMap<String, Leaf>>,
    pointers: Vec<Pointer<'a>>,
    state: Vec<State>,
    resolved: Vec<Option<Container>>,
    /// Outstanding references per pointer; the last one takes the value
    refs: Vec<usize>,
    referenced: Vec<bool>,
    targeted: Vec<bool>,
}

impl<'a> Resolver<'a> {
    fn new(records: &'a [Record]) -> Self {
        let mut values = Vec::new();
        let mut pointers = Vec::new();
        for (position, record) in records.iter().enumerate() {
            match record {
                Record::Value { entries } => values.push(entries),
                Record::Pointer {
                    name,
                    target,
                    children,
                } => pointers.push(Pointer {
                    position,
                    name: name.as_str(),
                    target: *target,
                    children: children.as_deref(),
                }),
            }
        }

        let (v, p) = (values.len(), pointers.len());
        Resolver {
            values,
            pointers,
            state: vec![State::Unvisited; p],
            resolved: vec![None; p],
            refs: vec![0; p],
            referenced: vec![false; p],
            targeted: vec![false; v],
        }
    }

    fn total(&self) -> usize {
        self.values.len() + self.pointers.len()
    }

    /// Check an index against the record count
    fn locate(&self, pointer: usize, index: usize) -> Result<usize> {
        if index >= self.total() {
            return Err(Error::DanglingPointer {
                name: self.pointers[pointer].name.to_string(),
                target: index,
                len: self.total(),
            });
        }
        Ok(index)
    }

    /// Pointer records that must be resolved before `pointer`
    fn dependencies(&self, pointer: usize) -> Result<Vec<usize>> {
        let p = &self.pointers[pointer];
        let v = self.values.len();
        match p.children {
            None => match p.target {
                Some(target) => {
                    let index = self.locate(pointer, target)?;
                    Ok(if index >= v { vec![index - v] } else { Vec::new() })
                }
                None => Ok(Vec::new()),
            },
            Some(children) => {
                if let Some(target) = p.target {
                    if self.locate(pointer, target)? >= v {
                        return Err(Error::malformed(
                            p.position,
                            format!("'{}' has children but targets a pointer record", p.name),
                        ));
                    }
                }
                children
                    .iter()
                    .map(|&child| {
                        if self.locate(pointer, child)? < v {
                            return Err(Error::malformed(
                                p.position,
                                format!("child index {} of '{}' is a value record", child, p.name),
                            ));
                        }
                        Ok(child - v)
                    })
                    .collect()
            }
        }
    }

    /// Resolve every pointer, depth-first with an explicit stack
    fn resolve_all(&mut self) -> Result<()> {
        let mut deps = Vec::with_capacity(self.pointers.len());
        for pointer in 0..self.pointers.len() {
            let pointer_deps = self.dependencies(pointer)?;
            for &dep in &pointer_deps {
                self.refs[dep] += 1;
            }
            deps.push(pointer_deps);
        }

        for start in 0..self.pointers.len() {
            let mut stack = vec![(start, false)];
            while let Some((pointer, expanded)) = stack.pop() {
                if expanded {
                    self.build(pointer, &deps[pointer]);
                    self.state[pointer] = State::Done;
                    continue;
                }
                match self.state[pointer] {
                    State::Done => continue,
                    State::InProgress => {
                        return Err(Error::CyclicPointer(self.pointers[pointer].name.to_string()))
                    }
                    State::Unvisited => {}
                }
                self.state[pointer] = State::InProgress;
                stack.push((pointer, true));
                for &dep in deps[pointer].iter().rev() {
                    match self.state[dep] {
                        State::Done => {}
                        State::InProgress => {
                            return Err(Error::CyclicPointer(self.pointers[dep].name.to_string()))
                        }
                        State::Unvisited => stack.push((dep, false)),
                    }
                }
            }
        }
        Ok(())
    }

    /// Materialize `pointer` from its already-resolved dependencies
    fn build(&mut self, pointer: usize, deps: &[usize]) {
        let mut dir = Container::new();
        if let Some(target) = self.pointers[pointer].target {
            if target < self.values.len() {
                self.targeted[target] = true;
                for (name, leaf) in self.values[target] {
                    dir.insert(name.clone(), leaf.clone());
                }
            }
        }
        for &child in deps {
            let name = self.pointers[child].name;
            let node = self.take_child(child);
            dir.insert(name, node);
        }
        self.resolved[pointer] = Some(dir);
    }

    fn take_child(&mut self, child: usize) -> Node {
        self.referenced[child] = true;
        self.refs[child] -= 1;
        let dir = if self.refs[child] == 0 {
            self.resolved[child].take()
        } else {
            self.resolved[child].clone()
        };
        Node::Container(dir.unwrap_or_default())
    }

    fn finish(mut self) -> Container {
        let mut root = Container::new();
        for (index, group) in self.values.iter().enumerate() {
            if self.targeted[index] {
                continue;
            }
            for (name, leaf) in group.iter() {
                root.insert(name.clone(), leaf.clone());
            }
        }
        for pointer in 0..self.pointers.len() {
            if self.referenced[pointer] {
                continue;
            }
            let dir = self.resolved[pointer].take().unwrap_or_default();
            root.insert(self.pointers[pointer].name, dir);
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries(pairs: &[(&str, Leaf)]) -> IndexMap<String, Leaf> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode(&[]).unwrap(), Container::new());
    }

    #[test]
    fn test_first_child_chain() {
        let records = vec![
            Record::value(entries(&[("f", Leaf::from("a"))])),
            Record::pointer("Inner", Some(0)),
            Record::pointer("Outer", Some(1)),
        ];
        let tree = decode(&records).unwrap();
        assert_eq!(
            tree,
            Container::new().with(
                "Outer",
                Container::new().with("Inner", Container::new().with("f", Leaf::from("a")))
            )
        );
    }

    #[test]
    fn test_forward_reference_resolves() {
        // Parent appears before the child it points at
        let records = vec![
            Record::value(entries(&[("f", Leaf::from(1))])),
            Record::pointer("Outer", Some(2)),
            Record::pointer("Inner", Some(0)),
        ];
        let tree = decode(&records).unwrap();
        let outer = tree.get("Outer").unwrap().as_container().unwrap();
        assert!(outer.get("Inner").is_some());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_untargeted_values_merge_into_root() {
        let records = vec![
            Record::value(entries(&[("a", Leaf::from(1)), ("b", Leaf::from(2))])),
            Record::value(entries(&[("b", Leaf::from(3))])),
            Record::pointer("Dir", None),
        ];
        let tree = decode(&records).unwrap();
        assert_eq!(
            tree,
            Container::new()
                .with("a", Leaf::from(1))
                .with("b", Leaf::from(3))
                .with("Dir", Container::new())
        );
    }

    #[test]
    fn test_shared_child_is_cloned_for_each_parent() {
        let records = vec![
            Record::pointer("Shared", None),
            Record::pointer("A", Some(0)),
            Record::pointer("B", Some(0)),
        ];
        let tree = decode(&records).unwrap();
        for name in ["A", "B"] {
            let dir = tree.get(name).unwrap().as_container().unwrap();
            assert_eq!(dir.get("Shared"), Some(&Node::Container(Container::new())));
        }
        assert!(tree.get("Shared").is_none());
    }

    #[test]
    fn test_child_list_decode() {
        let records = vec![
            Record::value(entries(&[("readme", Leaf::from("hi"))])),
            Record::branch("A", None, vec![]),
            Record::branch("B", None, vec![]),
            Record::branch("Docs", Some(0), vec![1, 2]),
        ];
        let tree = decode(&records).unwrap();
        assert_eq!(
            tree,
            Container::new().with(
                "Docs",
                Container::new()
                    .with("readme", Leaf::from("hi"))
                    .with("A", Container::new())
                    .with("B", Container::new())
            )
        );
    }

    #[test]
    fn test_dangling_pointer() {
        let records = vec![Record::pointer("Dir", Some(5))];
        let err = decode(&records).unwrap_err();
        assert!(matches!(
            err,
            Error::DanglingPointer { ref name, target: 5, len: 1 } if name == "Dir"
        ));

        let records = vec![Record::branch("Dir", None, vec![9])];
        assert!(matches!(
            decode(&records).unwrap_err(),
            Error::DanglingPointer { target: 9, .. }
        ));
    }

    #[test]
    fn test_self_pointer_is_cyclic() {
        let records = vec![Record::pointer("Loop", Some(0))];
        assert!(matches!(
            decode(&records).unwrap_err(),
            Error::CyclicPointer(name) if name == "Loop"
        ));
    }

    #[test]
    fn test_two_pointer_cycle() {
        let records = vec![Record::pointer("A", Some(1)), Record::pointer("B", Some(0))];
        assert!(matches!(
            decode(&records).unwrap_err(),
            Error::CyclicPointer(_)
        ));
    }

    #[test]
    fn test_child_list_rejects_value_child() {
        let records = vec![
            Record::value(entries(&[("f", Leaf::from(1))])),
            Record::branch("Dir", None, vec![0]),
        ];
        assert!(matches!(
            decode(&records).unwrap_err(),
            Error::MalformedRecord { index: 1, .. }
        ));
    }

    #[test]
    fn test_decode_untagged_strips_ids() {
        let records = vec![
            json!({"a": 1, "b": "x", "id": 0}),
            json!({"Dir": null, "id": 1}),
        ]
        .into_iter()
        .map(|v| match v {
            Value::Object(map) => map,
            _ => unreachable!(),
        })
        .collect();
        let tree = decode_untagged(records).unwrap();
        assert_eq!(
            tree,
            Container::new()
                .with("a", Leaf::from(1))
                .with("b", Leaf::from("x"))
                .with("Dir", Container::new())
        );
    }

    #[test]
    fn test_decode_untagged_fails_closed() {
        let records = vec![json!({"a": {"nested": 1}, "b": 2})]
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => map,
                _ => unreachable!(),
            })
            .collect();
        assert!(matches!(
            decode_untagged(records).unwrap_err(),
            Error::MalformedRecord { index: 0, .. }
        ));
    }
}
