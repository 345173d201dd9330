//! Category hierarchy evaluation.
//!
//! Categories are stored as a flat table of parent pointers. These functions
//! derive the delimited path name of every category and a flattened
//! pre-order forest in which every subtree is a contiguous index range.

use std::collections::{HashMap, HashSet};

use super::{CategoryData, DataId};

/// Entry of the flattened category forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryNode {
    /// Depth below the virtual root.
    pub level: usize,
    /// Index one past the end of this node's subtree. `None` only for a
    /// leaf at the end of the forest.
    pub next: Option<usize>,
    pub data_id: DataId,
}

/// Pre-order forest together with the position of every category in it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTree {
    pub node: Vec<CategoryNode>,
    pub index: HashMap<DataId, usize>,
}

impl CategoryTree {
    pub fn len(&self) -> usize {
        self.node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_empty()
    }

    /// Index one past the subtree rooted at `i`.
    pub fn end(&self, i: usize) -> usize {
        self.node[i].next.unwrap_or(self.node.len())
    }

    /// Whether node `p` lies inside the subtree rooted at node `i`
    /// (a node contains itself).
    pub fn contains(&self, i: usize, p: usize) -> bool {
        i < self.node.len() && p >= i && p < self.end(i)
    }

    /// Whether `id` is `ancestor` or one of its descendants.
    pub fn is_descendant(&self, id: DataId, ancestor: DataId) -> bool {
        match (self.index.get(&ancestor), self.index.get(&id)) {
            (Some(&i), Some(&p)) => self.contains(i, p),
            _ => false,
        }
    }

    /// Category ids in tree order.
    pub fn order(&self) -> Vec<DataId> {
        self.node.iter().map(|n| n.data_id).collect()
    }
}

/// Computes the delimited path of every category.
///
/// Each path is computed once and memoized, so the total work is linear in
/// the number of categories. A parent chain that loops back onto itself is
/// cut where it revisits an id, which still yields a path for every member.
pub fn eval_path(data: &HashMap<DataId, CategoryData>, sep: &str) -> HashMap<DataId, String> {
    let mut path: HashMap<DataId, String> = HashMap::with_capacity(data.len());
    let mut stack: Vec<DataId> = Vec::new();
    let mut on_stack: HashSet<DataId> = HashSet::new();

    for &start in data.keys() {
        if path.contains_key(&start) {
            continue;
        }

        let mut id = start;
        loop {
            stack.push(id);
            on_stack.insert(id);
            let parent = match data.get(&id) {
                Some(category) => category.parent_id,
                None => break,
            };
            if parent.is_void()
                || path.contains_key(&parent)
                || on_stack.contains(&parent)
                || !data.contains_key(&parent)
            {
                break;
            }
            id = parent;
        }

        while let Some(id) = stack.pop() {
            on_stack.remove(&id);
            let Some(category) = data.get(&id) else {
                continue;
            };
            let value = match path.get(&category.parent_id) {
                Some(parent_path) if !category.parent_id.is_void() => {
                    format!("{parent_path}{sep}{}", category.name)
                }
                _ => category.name.clone(),
            };
            path.insert(id, value);
        }
    }

    path
}

/// Flattens the category hierarchy into a pre-order forest.
///
/// Siblings keep their relative position in `order`. Categories whose parent
/// is void or missing become roots. Ids absent from `data`, and members of a
/// parent cycle not reachable from any root, are left out.
pub fn eval_tree(data: &HashMap<DataId, CategoryData>, order: &[DataId]) -> CategoryTree {
    let mut children: HashMap<DataId, Vec<DataId>> = HashMap::new();
    for id in order {
        let Some(category) = data.get(id) else {
            continue;
        };
        let parent = if data.contains_key(&category.parent_id) && category.parent_id != *id {
            category.parent_id
        } else {
            DataId::VOID
        };
        children.entry(parent).or_default().push(*id);
    }

    let mut tree = CategoryTree {
        node: Vec::with_capacity(order.len()),
        index: HashMap::with_capacity(order.len()),
    };
    // Nodes whose subtree end is not known yet, one per open level.
    let mut last: Vec<usize> = Vec::new();
    // (parent, cursor into its children)
    let mut stack: Vec<(DataId, usize)> = vec![(DataId::VOID, 0)];

    while let Some(frame) = stack.last_mut() {
        let (parent, cursor) = *frame;
        let Some(&child) = children.get(&parent).and_then(|c| c.get(cursor)) else {
            stack.pop();
            continue;
        };
        frame.1 += 1;
        if tree.index.contains_key(&child) {
            continue;
        }

        let i = tree.node.len();
        let level = stack.len() - 1;
        while let Some(&j) = last.last() {
            if tree.node[j].level < level {
                break;
            }
            tree.node[j].next = Some(i);
            last.pop();
        }
        tree.node.push(CategoryNode {
            level,
            next: None,
            data_id: child,
        });
        tree.index.insert(child, i);
        last.push(i);

        if children.contains_key(&child) {
            stack.push((child, 0));
        }
    }

    let len = tree.node.len();
    for j in last {
        if j + 1 < len {
            tree.node[j].next = Some(len);
        }
    }

    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, name: &str, parent: i64) -> (DataId, CategoryData) {
        (
            DataId::new(id),
            CategoryData {
                id: DataId::new(id),
                name: name.to_string(),
                active: true,
                parent_id: DataId::new(parent),
            },
        )
    }

    fn ids(values: &[i64]) -> Vec<DataId> {
        values.iter().map(|&v| DataId::new(v)).collect()
    }

    #[test]
    fn path_joins_ancestor_names() {
        let data: HashMap<_, _> = [
            category(3, "Restaurants", 2),
            category(1, "Food", 0),
            category(2, "Dining", 1),
        ]
        .into_iter()
        .collect();
        let path = eval_path(&data, ":");
        assert_eq!(path[&DataId::new(1)], "Food");
        assert_eq!(path[&DataId::new(2)], "Food:Dining");
        assert_eq!(path[&DataId::new(3)], "Food:Dining:Restaurants");
    }

    #[test]
    fn path_uses_given_delimiter() {
        let data: HashMap<_, _> = [category(1, "Bills", 0), category(2, "Water", 1)]
            .into_iter()
            .collect();
        assert_eq!(eval_path(&data, " / ")[&DataId::new(2)], "Bills / Water");
    }

    #[test]
    fn path_terminates_on_cycles() {
        let data: HashMap<_, _> = [category(1, "A", 2), category(2, "B", 1)]
            .into_iter()
            .collect();
        let path = eval_path(&data, ":");
        assert_eq!(path.len(), 2);
        let a = &path[&DataId::new(1)];
        let b = &path[&DataId::new(2)];
        assert!(a == "B:A" || a == "A");
        assert!(b == "A:B" || b == "B");
    }

    #[test]
    fn path_of_orphan_is_its_name() {
        let data: HashMap<_, _> = [category(5, "Lost", 99)].into_iter().collect();
        assert_eq!(eval_path(&data, ":")[&DataId::new(5)], "Lost");
    }

    #[test]
    fn single_root_has_open_end() {
        let data: HashMap<_, _> = [category(1, "Root", 0)].into_iter().collect();
        let tree = eval_tree(&data, &ids(&[1]));
        assert_eq!(
            tree.node,
            vec![CategoryNode {
                level: 0,
                next: None,
                data_id: DataId::new(1)
            }]
        );
        assert_eq!(tree.index, HashMap::from([(DataId::new(1), 0)]));
    }

    #[test]
    fn child_closes_parent_range_at_end() {
        let data: HashMap<_, _> = [category(1, "Root", 0), category(2, "Child", 1)]
            .into_iter()
            .collect();
        let tree = eval_tree(&data, &ids(&[1, 2]));
        assert_eq!(
            tree.node,
            vec![
                CategoryNode {
                    level: 0,
                    next: Some(2),
                    data_id: DataId::new(1)
                },
                CategoryNode {
                    level: 1,
                    next: None,
                    data_id: DataId::new(2)
                },
            ]
        );
    }

    #[test]
    fn subtree_range_contains_only_descendants() {
        // R(1) -> X(2) -> Z(4), R(1) -> Y(3)
        let data: HashMap<_, _> = [
            category(1, "R", 0),
            category(2, "X", 1),
            category(3, "Y", 1),
            category(4, "Z", 2),
        ]
        .into_iter()
        .collect();
        let tree = eval_tree(&data, &ids(&[1, 2, 3, 4]));
        let x = tree.index[&DataId::new(2)];
        let y = tree.index[&DataId::new(3)];
        let z = tree.index[&DataId::new(4)];
        assert_eq!(tree.order(), ids(&[1, 2, 4, 3]));
        assert_eq!(tree.node[x].next, Some(y));
        assert!(tree.contains(x, z));
        assert!(!tree.contains(x, y));
        assert!(tree.is_descendant(DataId::new(4), DataId::new(1)));
        assert!(!tree.is_descendant(DataId::new(1), DataId::new(4)));
        assert_eq!(tree.node[tree.index[&DataId::new(1)]].next, Some(4));
        assert_eq!(tree.node[y].next, None);
    }

    #[test]
    fn siblings_follow_given_order() {
        let data: HashMap<_, _> = [
            category(1, "B", 0),
            category(2, "A", 0),
            category(3, "b2", 1),
            category(4, "b1", 1),
        ]
        .into_iter()
        .collect();
        let tree = eval_tree(&data, &ids(&[2, 1, 4, 3]));
        assert_eq!(tree.order(), ids(&[2, 1, 4, 3]));
        assert_eq!(tree.node[0].next, Some(1));
        assert_eq!(tree.node[1].next, Some(4));
        assert_eq!(tree.node[2].next, Some(3));
        assert_eq!(tree.node[3].next, None);
        assert_eq!(tree.end(1), 4);
    }

    #[test]
    fn cycle_members_are_unreachable() {
        let data: HashMap<_, _> = [
            category(1, "Root", 0),
            category(2, "A", 3),
            category(3, "B", 2),
        ]
        .into_iter()
        .collect();
        let tree = eval_tree(&data, &ids(&[1, 2, 3]));
        assert_eq!(tree.order(), ids(&[1]));
    }
}
