//! Expression evaluation

use super::expr::{schedule, BinaryOp, Op, UnaryOp};
use super::{Batch, Expr, Value};
use crate::error::{Error, Result};
use ndarray::{ArrayD, Dimension, IxDyn, Zip};
use std::collections::HashMap;

/// Evaluates expressions against one batch, computing each node once
///
/// Shared variables are read when first reached, so every expression
/// evaluated by the same `Evaluator` sees the same cell values.
pub(crate) struct Evaluator<'a> {
    batch: &'a Batch,
    cache: HashMap<usize, Value>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(batch: &'a Batch) -> Self {
        Self {
            batch,
            cache: HashMap::new(),
        }
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value> {
        let pending = schedule([expr], |id| self.cache.contains_key(&id));
        self.run(&pending)?;
        Ok(self.cached(expr).clone())
    }

    /// Evaluate a precomputed schedule, skipping nodes already known
    pub(crate) fn run(&mut self, schedule: &[Expr]) -> Result<()> {
        for node in schedule {
            if self.cache.contains_key(&node.id()) {
                continue;
            }
            let value = self.eval_node(node)?;
            self.cache.insert(node.id(), value);
        }
        Ok(())
    }

    /// Value of a node evaluated by an earlier [`run`](Evaluator::run)
    pub(crate) fn value(&self, expr: &Expr) -> Result<Value> {
        self.cache
            .get(&expr.id())
            .cloned()
            .ok_or_else(|| Error::Unsupported(format!("node {} was not scheduled", expr.id())))
    }

    fn cached(&self, expr: &Expr) -> &Value {
        self.cache
            .get(&expr.id())
            .expect("operands are evaluated before their users")
    }

    fn eval_node(&self, expr: &Expr) -> Result<Value> {
        match &expr.node().op {
            Op::Constant(value) => Ok(value.clone()),
            Op::Shared(variable) => Ok(variable.get_value()),
            Op::Input(name) => self
                .batch
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnboundInput(name.clone())),
            Op::Unary(op, a) => Ok(apply_unary(*op, self.cached(a))),
            Op::Binary(op, a, b) => apply_binary(*op, self.cached(a), self.cached(b)),
            Op::Switch(c, a, b) => {
                let shape = common_shape(&[self.cached(c), self.cached(a), self.cached(b)])?;
                let c = broadcast_to(self.cached(c), &shape)?;
                let a = broadcast_to(self.cached(a), &shape)?;
                let b = broadcast_to(self.cached(b), &shape)?;
                Ok(Zip::from(&c)
                    .and(&a)
                    .and(&b)
                    .map_collect(|&c, &a, &b| if c != 0.0 { a } else { b }))
            }
        }
    }
}

fn scalar(value: f32) -> Value {
    ArrayD::from_elem(IxDyn(&[]), value)
}

fn apply_unary(op: UnaryOp, a: &Value) -> Value {
    match op {
        UnaryOp::Neg => a.mapv(|x| -x),
        UnaryOp::Sqrt => a.mapv(f32::sqrt),
        UnaryOp::Square => a.mapv(|x| x * x),
        UnaryOp::Exp => a.mapv(f32::exp),
        UnaryOp::Log => a.mapv(f32::ln),
        UnaryOp::Abs => a.mapv(f32::abs),
        UnaryOp::Sign => a.mapv(|x| if x > 0.0 { 1.0 } else if x < 0.0 { -1.0 } else { 0.0 }),
        UnaryOp::Sum => scalar(a.sum()),
        UnaryOp::OnesLike => ArrayD::ones(a.raw_dim()),
        UnaryOp::AnyNotFinite => scalar(if a.iter().any(|x| !x.is_finite()) { 1.0 } else { 0.0 }),
    }
}

fn apply_binary(op: BinaryOp, a: &Value, b: &Value) -> Result<Value> {
    match op {
        BinaryOp::Add => zip_with(a, b, |x, y| x + y),
        BinaryOp::Sub => zip_with(a, b, |x, y| x - y),
        BinaryOp::Mul => zip_with(a, b, |x, y| x * y),
        BinaryOp::Div => zip_with(a, b, |x, y| x / y),
        BinaryOp::Pow => zip_with(a, b, f32::powf),
        BinaryOp::Maximum => zip_with(a, b, f32::max),
        BinaryOp::Less => zip_with(a, b, |x, y| if x < y { 1.0 } else { 0.0 }),
        BinaryOp::SumLike => {
            if a.shape() == b.shape() {
                Ok(a.clone())
            } else if b.len() == 1 {
                Ok(ArrayD::from_elem(b.raw_dim(), a.sum()))
            } else {
                Err(Error::ShapeMismatch {
                    expected: b.shape().to_vec(),
                    got: a.shape().to_vec(),
                })
            }
        }
    }
}

/// Shape every operand can broadcast to: equal shapes, or single elements
fn common_shape(values: &[&Value]) -> Result<IxDyn> {
    let widest = values
        .iter()
        .max_by_key(|v| (v.len(), v.ndim()))
        .map(|v| v.raw_dim())
        .unwrap_or_else(|| IxDyn(&[]));

    for value in values {
        if value.shape() != widest.slice() && value.len() != 1 {
            return Err(Error::ShapeMismatch {
                expected: widest.slice().to_vec(),
                got: value.shape().to_vec(),
            });
        }
    }
    Ok(widest)
}

fn broadcast_to(value: &Value, shape: &IxDyn) -> Result<Value> {
    if value.shape() == shape.slice() {
        return Ok(value.clone());
    }
    match value.iter().next() {
        Some(&x) if value.len() == 1 => Ok(ArrayD::from_elem(shape.clone(), x)),
        _ => Err(Error::ShapeMismatch {
            expected: shape.slice().to_vec(),
            got: value.shape().to_vec(),
        }),
    }
}

fn zip_with(a: &Value, b: &Value, f: impl Fn(f32, f32) -> f32) -> Result<Value> {
    if a.shape() == b.shape() {
        return Ok(Zip::from(a).and(b).map_collect(|&x, &y| f(x, y)));
    }
    let shape = common_shape(&[a, b])?;
    let a = broadcast_to(a, &shape)?;
    let b = broadcast_to(b, &shape)?;
    Ok(Zip::from(&a).and(&b).map_collect(|&x, &y| f(x, y)))
}
