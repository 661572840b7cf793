use std::fmt;
use std::sync::Arc;

use scenaria_core::value::{HostObject, Map, Value};

struct Frame {
    value: Value,
    parent: Option<Arc<Frame>>,
}

/// Append-only stack of mappings; newer frames shadow older ones.
///
/// Pushing returns a new stack sharing every older frame, so earlier copies
/// stay valid for concurrent readers.
#[derive(Clone, Default)]
pub struct Stack {
    top: Option<Arc<Frame>>,
}

impl Stack {
    pub fn push(&self, value: Value) -> Self {
        Self {
            top: Some(Arc::new(Frame {
                value,
                parent: self.top.clone(),
            })),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    pub fn depth(&self) -> usize {
        self.frames().count()
    }

    /// Newest value bound to `name`.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.get_by(|m| m.get(name).cloned())
    }

    pub fn get_ignore_case(&self, name: &str) -> Option<Value> {
        self.get_by(|m| m.get_ignore_ascii_case(name).cloned())
    }

    fn get_by(&self, f: impl Fn(&Map) -> Option<Value>) -> Option<Value> {
        self.frames().find_map(|frame| frame.value.as_map().and_then(&f))
    }

    /// All bindings merged, oldest first, as one mapping.
    pub fn merged(&self) -> Map {
        let frames: Vec<&Frame> = self.frames().collect();
        let mut out = Map::new();
        for frame in frames.into_iter().rev() {
            if let Some(m) = frame.value.as_map() {
                for (k, v) in m {
                    out.insert(k.clone(), v.clone());
                }
            }
        }
        out
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.top.as_deref(), |f| f.parent.as_deref())
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack").field("depth", &self.depth()).finish()
    }
}

/// Exposes a [`Stack`] to templates as `vars` or `secrets`.
#[derive(Debug, Clone)]
pub(crate) struct StackView {
    pub name: &'static str,
    pub stack: Stack,
}

impl HostObject for StackView {
    fn type_name(&self) -> &str {
        self.name
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.stack.get(name)
    }

    fn field_ignore_case(&self, name: &str) -> Option<Value> {
        self.stack.get(name).or_else(|| self.stack.get_ignore_case(name))
    }

    fn to_value(&self) -> Option<Value> {
        Some(Value::Map(self.stack.merged()))
    }
}
