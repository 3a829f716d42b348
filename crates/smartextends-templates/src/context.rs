use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Map;
use serde_json::Value;

use crate::nodelist::Expression;
use crate::template::Template;

/// Render-time variables.
///
/// Values are JSON. Compiled templates can be stored alongside them so a
/// variable `extends` can name a template object directly.
#[derive(Clone, Debug, Default)]
pub struct Context {
    data: Map<String, Value>,
    templates: FxHashMap<String, Arc<Template>>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert_template(&mut self, key: impl Into<String>, template: Arc<Template>) {
        self.templates.insert(key.into(), template);
    }

    /// Follow a dotted lookup. Numeric segments index into arrays.
    #[must_use]
    pub fn lookup(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.data.get(first)?, |value, segment| match value {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index)),
                _ => None,
            })
    }

    #[must_use]
    pub fn template(&self, path: &[String]) -> Option<&Arc<Template>> {
        self.templates.get(&path.join("."))
    }

    pub(crate) fn resolve(&self, expression: &Expression) -> Option<Value> {
        match expression {
            Expression::Literal(value) => Some(value.clone()),
            Expression::Lookup(path) => self.lookup(path).cloned(),
        }
    }
}

impl From<Map<String, Value>> for Context {
    fn from(data: Map<String, Value>) -> Self {
        Self {
            data,
            templates: FxHashMap::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn path(dotted: &str) -> Vec<String> {
        dotted.split('.').map(str::to_string).collect()
    }

    #[test]
    fn test_lookup_nested_values() {
        let context = Context::new().with(
            "user",
            json!({"name": "ada", "groups": [{"name": "staff"}, {"name": "admin"}]}),
        );

        assert_eq!(context.lookup(&path("user.name")), Some(&json!("ada")));
        assert_eq!(
            context.lookup(&path("user.groups.1.name")),
            Some(&json!("admin"))
        );
        assert_eq!(context.lookup(&path("user.groups.9")), None);
        assert_eq!(context.lookup(&path("user.name.first")), None);
        assert_eq!(context.lookup(&path("missing")), None);
    }

    #[test]
    fn test_from_map() {
        let Value::Object(map) = json!({"title": "Change user"}) else {
            unreachable!()
        };
        let context = Context::from(map);
        assert_eq!(
            context.lookup(&path("title")),
            Some(&json!("Change user"))
        );
    }
}
