//! Recursive tree search — harvest every descendant matching a predicate.
//!
//! Depth-first, pre-order over a forest of children. Results borrow from the
//! input tree and come back in traversal order, which callers depend on for
//! first-wins lookups.

use super::types::Node;

/// Whether the walk continues below a node that matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DescentPolicy {
    /// Keep descending past matches; nested matches are reported too.
    #[default]
    Inclusive,
    /// Stop at a match; its descendants are not visited.
    Exclusive,
}

/// Find all nodes below `children` that satisfy `predicate`, inclusive policy.
///
/// `None` children are treated as an empty forest.
pub fn find_recursively<'a, P>(children: Option<&'a [Node]>, predicate: P) -> Vec<&'a Node>
where
    P: Fn(Option<&Node>) -> bool,
{
    find_with_policy(children, predicate, DescentPolicy::Inclusive)
}

/// Find all nodes below `children` that satisfy `predicate`.
pub fn find_with_policy<'a, P>(
    children: Option<&'a [Node]>,
    predicate: P,
    policy: DescentPolicy,
) -> Vec<&'a Node>
where
    P: Fn(Option<&Node>) -> bool,
{
    let mut found = Vec::new();
    if let Some(children) = children {
        walk(children, &predicate, policy, &mut found);
    }
    found
}

fn walk<'a, P>(nodes: &'a [Node], predicate: &P, policy: DescentPolicy, found: &mut Vec<&'a Node>)
where
    P: Fn(Option<&Node>) -> bool,
{
    for node in nodes {
        let matched = predicate(Some(node));
        if matched {
            found.push(node);
            if policy == DescentPolicy::Exclusive {
                continue;
            }
        }
        // A node without a children sequence is a leaf.
        if let Some(grandchildren) = node.children.as_deref() {
            walk(grandchildren, predicate, policy, found);
        }
    }
}
