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

//! Render plans
//!
//! A compiled template is a flat list of instructions. Nesting is expressed with
//! absolute jump targets, so rendering needs no recursion.
//!
//! Layout of the control structures, `@n` being an instruction index:
//!
//! ```text
//! if:    @a Branch(cond, otherwise: @b)  then...  Jump(@end)
//!        @b Branch(cond2, otherwise: @c) elif... Jump(@end)
//!        @c else...
//!        @end
//! for:   @h ForStart(iter, otherwise: @e) body... ForNext(body: @h+1, exit: @end)
//!        @e empty...
//!        @end
//! while: @h While(cond, exit: @end) body... Jump(@h)
//!        @end
//! ```

use crate::{
    escape::Language,
    expression::{Expr, Stmt},
};

/// A single step of a render plan
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Emits text verbatim
    Literal(String),
    /// Emits the value of `expr`, escaped for `escape` when set
    Expression {
        expr: Expr,
        escape: Option<Language>,
    },
    /// Continues with the next instruction if `condition` is truthy, else jumps
    Branch { condition: Expr, otherwise: usize },
    /// Jumps unconditionally
    Jump(usize),
    /// Starts a loop over `iterable`, jumping to `otherwise` when it has no items
    ForStart {
        targets: Vec<String>,
        iterable: Expr,
        otherwise: usize,
    },
    /// Binds the next item and jumps to `body`, or ends the loop and jumps to `exit`
    ForNext { body: usize, exit: usize },
    /// Jumps to `exit` once `condition` is falsy
    While { condition: Expr, exit: usize },
    /// Runs statements, emitting nothing
    Exec(Vec<Stmt>),
}

/// The compiled form of a template
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    instructions: Vec<Instruction>,
}

impl Plan {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
