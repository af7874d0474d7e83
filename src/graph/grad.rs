//! Reverse-mode symbolic differentiation

use super::expr::{BinaryOp, Op, UnaryOp};
use super::{Expr, SharedVariable};
use crate::error::Result;
use std::collections::{HashMap, HashSet};

/// Gradients of `cost` with respect to each variable in `wrt`
///
/// The result is a list of expressions, one per variable, in the order of
/// `wrt`. A non-scalar cost is differentiated as the sum of its elements.
/// Variables the cost does not depend on get a zero gradient.
pub fn grad(cost: &Expr, wrt: &[SharedVariable]) -> Result<Vec<Expr>> {
    let targets: HashSet<usize> = wrt.iter().map(SharedVariable::id).collect();
    let order = cost.topological_order();

    // Only nodes that can reach a target need a gradient.
    let mut relevant = HashSet::new();
    for expr in &order {
        let reaches = match &expr.node().op {
            Op::Shared(variable) => targets.contains(&variable.id()),
            _ => expr.children().iter().any(|c| relevant.contains(&c.id())),
        };
        if reaches {
            relevant.insert(expr.id());
        }
    }

    // A cost known to be 0-d is seeded with a constant, which keeps the
    // cost node itself out of every gradient.
    let mut grads: HashMap<usize, Expr> = HashMap::new();
    if relevant.contains(&cost.id()) {
        let seed = if scalar_nodes(&order).contains(&cost.id()) {
            Expr::scalar(1.0)
        } else {
            cost.ones_like()
        };
        grads.insert(cost.id(), seed);
    }

    let mut shared_grads: HashMap<usize, Expr> = HashMap::new();

    for expr in order.iter().rev() {
        let Some(g) = grads.get(&expr.id()).cloned() else {
            continue;
        };

        let mut accumulate = |child: &Expr, contribution: Expr| {
            if !relevant.contains(&child.id()) {
                return;
            }
            let total = match grads.remove(&child.id()) {
                Some(existing) => existing + contribution,
                None => contribution,
            };
            grads.insert(child.id(), total);
        };

        match &expr.node().op {
            Op::Constant(_) | Op::Input(_) => {}
            Op::Shared(variable) => {
                let total = match shared_grads.remove(&variable.id()) {
                    Some(existing) => existing + g,
                    None => g,
                };
                shared_grads.insert(variable.id(), total);
            }
            Op::Unary(op, a) => match op {
                UnaryOp::Neg => accumulate(a, -g),
                UnaryOp::Sqrt => accumulate(a, g / (expr * 2.0)),
                UnaryOp::Square => accumulate(a, g * a * 2.0),
                UnaryOp::Exp => accumulate(a, g * expr),
                UnaryOp::Log => accumulate(a, g / a),
                UnaryOp::Abs => accumulate(a, g * a.sign()),
                UnaryOp::Sum => accumulate(a, g * a.ones_like()),
                UnaryOp::Sign | UnaryOp::OnesLike | UnaryOp::AnyNotFinite => {}
            },
            Op::Binary(op, a, b) => match op {
                BinaryOp::Add => {
                    accumulate(a, g.sum_like(a));
                    accumulate(b, g.sum_like(b));
                }
                BinaryOp::Sub => {
                    accumulate(a, g.sum_like(a));
                    accumulate(b, (-&g).sum_like(b));
                }
                BinaryOp::Mul => {
                    accumulate(a, (&g * b).sum_like(a));
                    accumulate(b, (&g * a).sum_like(b));
                }
                BinaryOp::Div => {
                    accumulate(a, (&g / b).sum_like(a));
                    accumulate(b, (-(&g * expr) / b).sum_like(b));
                }
                BinaryOp::Pow => {
                    accumulate(a, (&g * b * a.pow(&(b - 1.0))).sum_like(a));
                    accumulate(b, (&g * expr * a.ln()).sum_like(b));
                }
                BinaryOp::Maximum => {
                    let b_wins = a.less(b);
                    accumulate(a, (&g * (1.0 - &b_wins)).sum_like(a));
                    accumulate(b, (&g * &b_wins).sum_like(b));
                }
                BinaryOp::SumLike => accumulate(a, &g * a.ones_like()),
                BinaryOp::Less => {}
            },
            Op::Switch(c, a, b) => {
                let zero = Expr::scalar(0.0);
                accumulate(a, Expr::switch(c, &g, &zero).sum_like(a));
                accumulate(b, Expr::switch(c, &zero, &g).sum_like(b));
            }
        }
    }

    Ok(wrt
        .iter()
        .map(|variable| {
            shared_grads
                .get(&variable.id())
                .cloned()
                .unwrap_or_else(|| variable.expr().ones_like() * 0.0)
        })
        .collect())
}

/// Nodes of `order` that hold a 0-d value whatever the cells and inputs hold
fn scalar_nodes(order: &[Expr]) -> HashSet<usize> {
    let mut scalars = HashSet::new();
    for expr in order {
        let scalar = match &expr.node().op {
            Op::Constant(value) => value.ndim() == 0,
            Op::Shared(_) | Op::Input(_) => false,
            Op::Unary(UnaryOp::Sum | UnaryOp::AnyNotFinite, _) => true,
            Op::Unary(_, a) => scalars.contains(&a.id()),
            Op::Binary(BinaryOp::SumLike, _, like) => scalars.contains(&like.id()),
            Op::Binary(_, a, b) => scalars.contains(&a.id()) && scalars.contains(&b.id()),
            Op::Switch(c, a, b) => [c, a, b].iter().all(|e| scalars.contains(&e.id())),
        };
        if scalar {
            scalars.insert(expr.id());
        }
    }
    scalars
}
