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

//! Plan execution
//!
//! [`Fragments`] walks a [`Plan`] one instruction at a time and yields each piece of
//! output as soon as it is produced. Nothing but the current fragment, the loop stack
//! and `exec` locals is held in memory. [`Chunks`] regroups any fragment stream into
//! pieces of a fixed number of characters.

use std::{collections::BTreeMap, iter, num::NonZeroUsize, sync::Arc};

use tracing::trace;

use crate::{
    context::Context,
    error::{RenderError, RenderResult},
    expression::Scope,
    plan::{Instruction, Plan},
    value::Value,
};

/// Name under which the whole context is visible to expressions
pub const CONTEXT_NAME: &str = "context";

/// An active `for` loop
struct Loop {
    targets: Vec<String>,
    items: std::vec::IntoIter<Value>,
    bindings: BTreeMap<String, Value>,
}

impl Loop {
    /// Binds the next item to the loop targets, returning false when exhausted
    fn advance(&mut self) -> RenderResult<bool> {
        let Some(item) = self.items.next() else {
            return Ok(false);
        };
        if let [target] = self.targets.as_slice() {
            self.bindings.insert(target.clone(), item);
            return Ok(true);
        }
        match item {
            Value::List(values) if values.len() == self.targets.len() => {
                for (target, value) in self.targets.iter().zip(values) {
                    self.bindings.insert(target.clone(), value);
                }
                Ok(true)
            }
            Value::List(values) => Err(RenderError::Type(format!(
                "cannot unpack {} values into {} names",
                values.len(),
                self.targets.len()
            ))),
            other => Err(RenderError::Type(format!(
                "cannot unpack non-list '{}'",
                other.type_name()
            ))),
        }
    }
}

/// Name bindings of one render
struct State<'c> {
    context: &'c Context,
    locals: BTreeMap<String, Value>,
    loops: Vec<Loop>,
}

impl Scope for State<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.loops
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(name))
            .or_else(|| self.locals.get(name))
            .or_else(|| self.context.get(name))
            .cloned()
            .or_else(|| (name == CONTEXT_NAME).then(|| self.context.to_value()))
    }

    fn assign(&mut self, name: &str, value: Value) {
        let frame = self
            .loops
            .iter_mut()
            .rev()
            .find(|frame| frame.bindings.contains_key(name));
        match frame {
            Some(frame) => {
                frame.bindings.insert(name.to_string(), value);
            }
            None => {
                self.locals.insert(name.to_string(), value);
            }
        }
    }
}

/// Lazily rendered output of a template
///
/// Each literal and each expression yields one fragment. After an error the iterator
/// is finished.
pub struct Fragments<'c> {
    plan: Arc<Plan>,
    state: State<'c>,
    position: usize,
    done: bool,
}

impl<'c> Fragments<'c> {
    pub fn new(plan: Arc<Plan>, context: &'c Context) -> Self {
        Self {
            plan,
            state: State {
                context,
                locals: BTreeMap::new(),
                loops: Vec::new(),
            },
            position: 0,
            done: false,
        }
    }

    /// Runs instructions until one produces output or the plan ends
    fn step(&mut self) -> RenderResult<Option<String>> {
        let state = &mut self.state;
        while let Some(instruction) = self.plan.get(self.position) {
            self.position += 1;
            match instruction {
                Instruction::Literal(text) => return Ok(Some(text.clone())),
                Instruction::Expression { expr, escape } => {
                    let text = expr.evaluate(&*state)?.to_string();
                    return Ok(Some(match escape {
                        Some(language) => language.escape(&text),
                        None => text,
                    }));
                }
                Instruction::Branch {
                    condition,
                    otherwise,
                } => {
                    if !condition.evaluate(&*state)?.is_truthy() {
                        self.position = *otherwise;
                    }
                }
                Instruction::Jump(target) => self.position = *target,
                Instruction::ForStart {
                    targets,
                    iterable,
                    otherwise,
                } => {
                    let items = iterable.evaluate(&*state)?.iterate()?;
                    trace!(items = items.len(), "starting loop");
                    let mut frame = Loop {
                        targets: targets.clone(),
                        items: items.into_iter(),
                        bindings: BTreeMap::new(),
                    };
                    if frame.advance()? {
                        state.loops.push(frame);
                    } else {
                        self.position = *otherwise;
                    }
                }
                Instruction::ForNext { body, exit } => {
                    let more = match state.loops.last_mut() {
                        Some(frame) => frame.advance()?,
                        None => false,
                    };
                    if more {
                        self.position = *body;
                    } else {
                        state.loops.pop();
                        self.position = *exit;
                    }
                }
                Instruction::While { condition, exit } => {
                    if !condition.evaluate(&*state)?.is_truthy() {
                        self.position = *exit;
                    }
                }
                Instruction::Exec(statements) => {
                    for statement in statements {
                        statement.execute(&mut *state)?;
                    }
                }
            }
        }
        Ok(None)
    }
}

impl Iterator for Fragments<'_> {
    type Item = RenderResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(fragment)) => Some(Ok(fragment)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(error) => {
                self.done = true;
                Some(Err(error))
            }
        }
    }
}

impl iter::FusedIterator for Fragments<'_> {}

/// Regroups fragments into chunks of exactly `size` characters, the last one possibly
/// shorter
///
/// Chunks are sliced from a read offset into the buffered fragments, so a fragment is
/// copied once however many chunks it is cut into.
pub struct Chunks<I> {
    inner: I,
    size: NonZeroUsize,
    buffer: String,
    /// Start of the text not yet handed out
    start: usize,
    done: bool,
}

impl<I> Chunks<I> {
    pub fn new(inner: I, size: NonZeroUsize) -> Self {
        Self {
            inner,
            size,
            buffer: String::new(),
            start: 0,
            done: false,
        }
    }

    /// Takes a full chunk from the unread part of the buffer
    fn split_chunk(&mut self) -> Option<String> {
        let pending = &self.buffer[self.start..];
        let end = pending
            .char_indices()
            .map(|(i, _)| i)
            .chain(iter::once(pending.len()))
            .nth(self.size.get())?;
        let chunk = pending[..end].to_string();
        self.start += end;
        Some(chunk)
    }

    /// Appends a fragment after dropping the text already handed out
    fn fill(&mut self, fragment: &str) {
        self.buffer.drain(..self.start);
        self.start = 0;
        self.buffer.push_str(fragment);
    }

    fn take_rest(&mut self) -> Option<String> {
        let rest = self.buffer[self.start..].to_string();
        self.buffer.clear();
        self.start = 0;
        (!rest.is_empty()).then_some(rest)
    }
}

impl<I: Iterator<Item = RenderResult<String>>> Iterator for Chunks<I> {
    type Item = RenderResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = self.split_chunk() {
                return Some(Ok(chunk));
            }
            if self.done {
                return self.take_rest().map(Ok);
            }
            match self.inner.next() {
                Some(Ok(fragment)) => self.fill(&fragment),
                Some(Err(error)) => {
                    self.done = true;
                    self.buffer.clear();
                    self.start = 0;
                    return Some(Err(error));
                }
                None => self.done = true,
            }
        }
    }
}
