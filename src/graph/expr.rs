//! Expression nodes and operators

use super::eval::Evaluator;
use super::{Batch, SharedVariable, Value};
use crate::error::Result;
use crate::roles::{Annotated, RoleTag};
use ndarray::{ArrayD, IxDyn};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
    Sqrt,
    Square,
    Exp,
    Log,
    Abs,
    Sign,
    /// Sum of all elements, as a 0-d value
    Sum,
    /// Ones with the operand's shape
    OnesLike,
    /// 1.0 if any element is NaN or infinite, else 0.0 (0-d)
    AnyNotFinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Maximum,
    /// Elementwise `a < b` as 1.0 / 0.0
    Less,
    /// Reduce the first operand to the shape of the second (gradient plumbing)
    SumLike,
}

pub(crate) enum Op {
    Constant(Value),
    Shared(SharedVariable),
    Input(String),
    Unary(UnaryOp, Expr),
    Binary(BinaryOp, Expr, Expr),
    /// Elementwise `if cond != 0 { then } else { otherwise }`
    Switch(Expr, Expr, Expr),
}

pub(crate) struct Node {
    pub(crate) id: usize,
    pub(crate) op: Op,
    roles: RoleTag,
}

/// Lazily evaluated symbolic expression
///
/// Expressions are immutable DAG nodes; cloning is cheap and shares the
/// node. Arithmetic operators are implemented for owned and borrowed
/// expressions and for `f32` scalars on either side.
#[derive(Clone)]
pub struct Expr {
    node: Rc<Node>,
}

impl Expr {
    fn from_op(op: Op) -> Self {
        Self {
            node: Rc::new(Node {
                id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
                op,
                roles: RoleTag::new(),
            }),
        }
    }

    pub(crate) fn unary(op: UnaryOp, operand: &Expr) -> Self {
        Self::from_op(Op::Unary(op, operand.clone()))
    }

    pub(crate) fn binary(op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Self {
        Self::from_op(Op::Binary(op, lhs.clone(), rhs.clone()))
    }

    pub(crate) fn node(&self) -> &Node {
        &self.node
    }

    /// Unique identity of the node
    pub fn id(&self) -> usize {
        self.node.id
    }

    /// Constant value baked into the graph
    pub fn constant(value: Value) -> Self {
        Self::from_op(Op::Constant(value))
    }

    /// 0-d constant
    pub fn scalar(value: f32) -> Self {
        Self::constant(ArrayD::from_elem(IxDyn(&[]), value))
    }

    /// Reference to a shared variable's current value
    pub fn shared(variable: &SharedVariable) -> Self {
        Self::from_op(Op::Shared(variable.clone()))
    }

    /// Named input, bound from the [`Batch`] at evaluation time
    pub fn input(name: impl Into<String>) -> Self {
        Self::from_op(Op::Input(name.into()))
    }

    /// Elementwise selection; `condition` is nonzero where `then` is taken
    pub fn switch(condition: &Expr, then: &Expr, otherwise: &Expr) -> Self {
        Self::from_op(Op::Switch(condition.clone(), then.clone(), otherwise.clone()))
    }

    pub fn sqrt(&self) -> Self {
        Self::unary(UnaryOp::Sqrt, self)
    }

    pub fn square(&self) -> Self {
        Self::unary(UnaryOp::Square, self)
    }

    pub fn exp(&self) -> Self {
        Self::unary(UnaryOp::Exp, self)
    }

    /// Natural logarithm
    pub fn ln(&self) -> Self {
        Self::unary(UnaryOp::Log, self)
    }

    pub fn abs(&self) -> Self {
        Self::unary(UnaryOp::Abs, self)
    }

    pub fn sign(&self) -> Self {
        Self::unary(UnaryOp::Sign, self)
    }

    /// Sum of all elements (0-d)
    pub fn sum(&self) -> Self {
        Self::unary(UnaryOp::Sum, self)
    }

    pub fn ones_like(&self) -> Self {
        Self::unary(UnaryOp::OnesLike, self)
    }

    /// 0-d flag, 1.0 when any element is NaN or infinite
    pub fn any_not_finite(&self) -> Self {
        Self::unary(UnaryOp::AnyNotFinite, self)
    }

    /// Elementwise power
    pub fn pow(&self, exponent: &Expr) -> Self {
        Self::binary(BinaryOp::Pow, self, exponent)
    }

    /// Elementwise maximum
    pub fn maximum(&self, other: &Expr) -> Self {
        Self::binary(BinaryOp::Maximum, self, other)
    }

    /// Elementwise `self < other` as 1.0 / 0.0
    pub fn less(&self, other: &Expr) -> Self {
        Self::binary(BinaryOp::Less, self, other)
    }

    pub(crate) fn sum_like(&self, like: &Expr) -> Self {
        Self::binary(BinaryOp::SumLike, self, like)
    }

    /// Direct operands of this node
    pub(crate) fn children(&self) -> Vec<&Expr> {
        match &self.node.op {
            Op::Constant(_) | Op::Shared(_) | Op::Input(_) => Vec::new(),
            Op::Unary(_, a) => vec![a],
            Op::Binary(_, a, b) => vec![a, b],
            Op::Switch(c, a, b) => vec![c, a, b],
        }
    }

    /// Nodes reachable from `self`, each once, operands before their users
    pub(crate) fn topological_order(&self) -> Vec<Expr> {
        schedule([self], |_| false)
    }

    /// Distinct shared variables the expression reads, in graph order
    pub fn shared_variables(&self) -> Vec<SharedVariable> {
        let mut seen = HashSet::new();
        self.topological_order()
            .into_iter()
            .filter_map(|expr| match &expr.node.op {
                Op::Shared(variable) if seen.insert(variable.id()) => Some(variable.clone()),
                _ => None,
            })
            .collect()
    }

    /// Evaluate with no bound inputs
    pub fn eval(&self) -> Result<Value> {
        self.eval_with(&Batch::new())
    }

    /// Evaluate against the given inputs
    pub fn eval_with(&self, batch: &Batch) -> Result<Value> {
        Evaluator::new(batch).eval(self)
    }
}

/// Nodes reachable from any root, each once, operands before their users
///
/// Nodes for which `done` holds are treated as already available: they
/// are neither listed nor walked through.
pub(crate) fn schedule<'a>(
    roots: impl IntoIterator<Item = &'a Expr>,
    done: impl Fn(usize) -> bool,
) -> Vec<Expr> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<(Expr, bool)> = roots
        .into_iter()
        .map(|root| (root.clone(), false))
        .collect();
    stack.reverse();

    while let Some((expr, expanded)) = stack.pop() {
        if expanded {
            order.push(expr);
            continue;
        }
        if done(expr.id()) || !visited.insert(expr.id()) {
            continue;
        }
        stack.push((expr.clone(), true));
        for child in expr.children().into_iter().rev() {
            if !visited.contains(&child.id()) && !done(child.id()) {
                stack.push((child.clone(), false));
            }
        }
    }

    order
}

/// Euclidean norm over every element of every expression (0-d)
pub fn l2_norm<'a>(exprs: impl IntoIterator<Item = &'a Expr>) -> Expr {
    exprs
        .into_iter()
        .map(|expr| expr.square().sum())
        .reduce(|acc, term| acc + term)
        .map(|total| total.sqrt())
        .unwrap_or_else(|| Expr::scalar(0.0))
}

impl Annotated for Expr {
    fn role_tag(&self) -> &RoleTag {
        &self.node.roles
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node.op {
            Op::Constant(value) => write!(f, "{}", value),
            Op::Shared(variable) => write!(f, "{}", variable.name()),
            Op::Input(name) => write!(f, "<{}>", name),
            Op::Unary(op, a) => write!(f, "{:?}({:?})", op, a),
            Op::Binary(op, a, b) => write!(f, "{:?}({:?}, {:?})", op, a, b),
            Op::Switch(c, a, b) => write!(f, "Switch({:?}, {:?}, {:?})", c, a, b),
        }
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, &self)
    }
}

impl std::ops::Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, &self, &rhs)
            }
        }

        impl std::ops::$trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, &self, rhs)
            }
        }

        impl std::ops::$trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self, &rhs)
            }
        }

        impl std::ops::$trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, self, rhs)
            }
        }

        impl std::ops::$trait<f32> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f32) -> Expr {
                Expr::binary($op, &self, &Expr::scalar(rhs))
            }
        }

        impl std::ops::$trait<f32> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: f32) -> Expr {
                Expr::binary($op, self, &Expr::scalar(rhs))
            }
        }

        impl std::ops::$trait<Expr> for f32 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, &Expr::scalar(self), &rhs)
            }
        }

        impl std::ops::$trait<&Expr> for f32 {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, &Expr::scalar(self), rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);
