use crate::error::EvalError;
use crate::value::Value;

/// Runtime name bindings for one block of a render.
///
/// Each component render starts a root environment holding its props and
/// the slot content captured from the caller. Loop iterations chain a child
/// onto the enclosing environment.
#[derive(Debug)]
pub struct Environment<'p> {
    parent: Option<&'p Environment<'p>>,
    values: Vec<(String, Value)>,
    slot: Option<String>,
}

impl<'p> Environment<'p> {
    /// Root environment seeded from a props value. `Absent` props count as
    /// an empty map.
    pub fn root(props: Value) -> Result<Self, EvalError> {
        Self::with_slot(props, String::new())
    }

    /// Root environment for a component whose caller rendered `slot`
    pub fn with_slot(props: Value, slot: String) -> Result<Self, EvalError> {
        let values = match props {
            Value::Map(entries) => entries,
            Value::Absent => Vec::new(),
            other => return Err(EvalError::PropsNotMap(other.kind().to_string())),
        };
        Ok(Environment { parent: None, values, slot: Some(slot) })
    }

    pub fn child(&self) -> Environment<'_> {
        Environment { parent: Some(self), values: Vec::new(), slot: None }
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// Innermost value bound to `name`
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut current = Some(self);
        while let Some(env) = current {
            if let Some((_, value)) = env.values.iter().find(|(n, _)| n == name) {
                return Some(value);
            }
            current = env.parent;
        }
        None
    }

    /// Slot content of the component being rendered
    pub fn slot(&self) -> &str {
        let mut current = Some(self);
        while let Some(env) = current {
            if let Some(slot) = &env.slot {
                return slot;
            }
            current = env.parent;
        }
        ""
    }
}
