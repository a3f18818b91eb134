// MIT License
//
// Copyright (c) 2024 Jerome Johnson
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Render contexts
//!
//! A [`Context`] maps names to [`Value`]s. It is supplied fresh for every render and is
//! never modified by the template: `exec` statements write to locals of the render.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{error::ContextError, value::Value};

/// Name to value bindings a template is rendered against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`, replacing any previous binding
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Builder form of [`Context::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The whole context as a map value
    pub fn to_value(&self) -> Value {
        Value::Map(self.values.clone())
    }

    /// Builds a context from a JSON object
    pub fn from_json(value: serde_json::Value) -> Result<Self, ContextError> {
        match Value::from(value) {
            Value::Map(values) => Ok(Self { values }),
            other => Err(ContextError::NotAnObject(other.type_name())),
        }
    }

    /// Builds a context from any serializable struct or map
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, ContextError> {
        Self::from_json(serde_json::to_value(value)?)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Page {
        title: String,
        tags: Vec<String>,
    }

    #[test]
    fn builds_from_json_objects_only() {
        let context = Context::from_json(json!({"name": "World", "n": 2})).unwrap();
        assert_eq!(context.get("name"), Some(&Value::from("World")));
        assert_eq!(context.len(), 2);
        assert!(matches!(
            Context::from_json(json!([1, 2])),
            Err(ContextError::NotAnObject("list"))
        ));
    }

    #[test]
    fn builds_from_structs() {
        let page = Page {
            title: "Home".to_string(),
            tags: vec!["a".to_string()],
        };
        let context = Context::from_serialize(&page).unwrap();
        assert_eq!(context.get("tags"), Some(&Value::from(vec!["a"])));
    }

    #[test]
    fn builder_and_iterator_forms_agree() {
        let built = Context::new().with("a", 1).with("b", "x");
        let collected: Context = [("a", Value::from(1)), ("b", Value::from("x"))]
            .into_iter()
            .collect();
        assert_eq!(built, collected);
        assert!(!built.is_empty());
    }
}
