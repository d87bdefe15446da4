//! Generic traversal over [`Value`] trees
//!
//! [`walk`] owns the hard parts shared by every stage: per-branch cycle
//! detection, depth and breadth bounding, and skipping of object properties.
//! A [`Folder`] decides what each node becomes.
//!
//! Every walk is also bounded by a node budget. Shared containers are folded
//! once per path, so a small DAG can stand for an exponentially large tree;
//! once the budget is spent, further containers are collapsed.
//!
//! Cycle detection tracks the identities of the containers on the current
//! path only. A container reached twice through disjoint branches is folded
//! twice; a container that is its own ancestor is reported via
//! [`Folder::circular`].

use contracts::{LimitsConfig, Value};

/// Absolute recursion limit, independent of any folder's own depth limit
pub const MAX_WALK_DEPTH: usize = 512;

/// Depth and node limits for stages that rebuild a whole payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkBounds {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl WalkBounds {
    /// Depth follows the normalizer; the node budget is the byte ceiling,
    /// since every serialized node takes at least one byte.
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self {
            max_depth: limits.max_depth,
            max_nodes: limits.max_event_bytes,
        }
    }
}

impl Default for WalkBounds {
    fn default() -> Self {
        Self::from_limits(&LimitsConfig::default())
    }
}

/// Container flavour, passed to folder hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Array,
    Object,
}

impl Container {
    /// Marker used when a container is collapsed
    pub fn marker(self) -> &'static str {
        match self {
            Container::Array => crate::markers::ARRAY,
            Container::Object => crate::markers::OBJECT,
        }
    }
}

/// Bottom-up fold over a value tree
pub trait Folder {
    type Output;

    /// Any non-container value
    fn leaf(&mut self, value: &Value) -> Self::Output;

    /// Container that is its own ancestor
    fn circular(&mut self, kind: Container) -> Self::Output;

    /// Container beyond the depth limit or the node budget
    fn collapsed(&mut self, kind: Container) -> Self::Output;

    /// Folded array items; `omitted` items were cut by the breadth limit
    fn array(&mut self, items: Vec<Self::Output>, omitted: usize) -> Self::Output;

    /// Folded object properties; `omitted` properties were cut by the breadth limit
    fn object(&mut self, entries: Vec<(String, Self::Output)>, omitted: usize) -> Self::Output;

    /// Containers at this depth or deeper are collapsed
    fn max_depth(&self) -> usize {
        MAX_WALK_DEPTH
    }

    /// Entries kept per container
    fn max_breadth(&self) -> usize {
        usize::MAX
    }

    /// Nodes visited before further containers are collapsed
    fn max_nodes(&self) -> usize {
        usize::MAX
    }

    /// Object properties for which this returns true are left out entirely
    /// and do not count towards the breadth limit
    fn skip_property(&self, _value: &Value) -> bool {
        false
    }
}

/// Fold `value` with `folder`
pub fn walk<F: Folder>(value: &Value, folder: &mut F) -> F::Output {
    let mut state = WalkState::default();
    walk_node(value, folder, 0, &mut state)
}

#[derive(Default)]
struct WalkState {
    ancestors: Vec<usize>,
    nodes: usize,
}

fn walk_node<F: Folder>(
    value: &Value,
    folder: &mut F,
    depth: usize,
    state: &mut WalkState,
) -> F::Output {
    state.nodes += 1;
    let (kind, id) = match value {
        Value::Array(array) => (Container::Array, array.id()),
        Value::Object(object) => (Container::Object, object.id()),
        _ => return folder.leaf(value),
    };

    if state.ancestors.contains(&id) {
        return folder.circular(kind);
    }
    if depth >= folder.max_depth().min(MAX_WALK_DEPTH) || state.nodes > folder.max_nodes() {
        return folder.collapsed(kind);
    }

    let breadth = folder.max_breadth();
    state.ancestors.push(id);
    let output = match value {
        Value::Array(array) => {
            let items = array.snapshot();
            let omitted = items.len().saturating_sub(breadth);
            let folded = items
                .iter()
                .take(breadth)
                .map(|item| walk_node(item, folder, depth + 1, state))
                .collect();
            folder.array(folded, omitted)
        }
        Value::Object(object) => {
            let mut folded = Vec::new();
            let mut omitted = 0;
            for (key, item) in object.entries() {
                if folder.skip_property(&item) {
                    continue;
                }
                if folded.len() >= breadth {
                    omitted += 1;
                    continue;
                }
                let out = walk_node(&item, folder, depth + 1, state);
                folded.push((key, out));
            }
            folder.object(folded, omitted)
        }
        _ => folder.leaf(value),
    };
    state.ancestors.pop();
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Array, Object};

    /// Renders a compact textual shape for assertions
    #[derive(Default)]
    struct Shape {
        max_nodes: Option<usize>,
    }

    impl Folder for Shape {
        type Output = String;

        fn leaf(&mut self, value: &Value) -> String {
            match value {
                Value::String(s) => s.clone(),
                Value::Integer(n) => n.to_string(),
                _ => "?".into(),
            }
        }

        fn circular(&mut self, _kind: Container) -> String {
            "CYCLE".into()
        }

        fn collapsed(&mut self, kind: Container) -> String {
            kind.marker().into()
        }

        fn array(&mut self, items: Vec<String>, omitted: usize) -> String {
            format!("[{}|{}]", items.join(","), omitted)
        }

        fn object(&mut self, entries: Vec<(String, String)>, omitted: usize) -> String {
            let body: Vec<String> = entries.into_iter().map(|(k, v)| format!("{k}:{v}")).collect();
            format!("{{{}|{}}}", body.join(","), omitted)
        }

        fn max_nodes(&self) -> usize {
            self.max_nodes.unwrap_or(usize::MAX)
        }
    }

    /// `levels` nested arrays, each holding two references to the one below
    fn doubling(levels: usize) -> Value {
        let mut value = Value::from("x");
        for _ in 0..levels {
            value = Value::array([value.clone(), value]);
        }
        value
    }

    #[test]
    fn test_self_reference_is_circular() {
        let obj = Object::new();
        obj.insert("a", Value::from(1i64));
        obj.insert("self", Value::Object(obj.clone()));

        assert_eq!(walk(&Value::Object(obj), &mut Shape::default()), "{a:1,self:CYCLE|0}");
    }

    #[test]
    fn test_shared_reference_is_not_circular() {
        let shared = Array::from(vec![Value::from("x")]);
        let root = Value::object([
            ("left", Value::Array(shared.clone())),
            ("right", Value::Array(shared)),
        ]);

        assert_eq!(walk(&root, &mut Shape::default()), "{left:[x|0],right:[x|0]|0}");
    }

    #[test]
    fn test_indirect_cycle() {
        let a = Object::new();
        let b = Object::new();
        a.insert("b", Value::Object(b.clone()));
        b.insert("a", Value::Object(a.clone()));

        assert_eq!(walk(&Value::Object(a), &mut Shape::default()), "{b:{a:CYCLE|0}|0}");
    }

    #[test]
    fn test_node_budget_collapses_remaining_containers() {
        let mut shape = Shape {
            max_nodes: Some(4),
        };
        assert_eq!(walk(&doubling(2), &mut shape), "[[x,x|0],[Array]|0]");
    }

    #[test]
    fn test_shared_dag_walk_is_bounded() {
        let mut shape = Shape {
            max_nodes: Some(10_000),
        };
        let rendered = walk(&doubling(40), &mut shape);

        assert!(rendered.matches('x').count() <= 10_000);
        assert!(rendered.contains("[Array]"));
    }

    #[test]
    fn test_absolute_depth_guard() {
        let mut value = Value::from("leaf");
        for _ in 0..(MAX_WALK_DEPTH + 10) {
            value = Value::array([value]);
        }

        let rendered = walk(&value, &mut Shape::default());
        assert!(rendered.contains("[Array]"));
        assert!(!rendered.contains("leaf"));
    }
}
