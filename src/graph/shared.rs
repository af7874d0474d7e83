//! Persistent storage cells

use super::{Expr, Value};
use crate::roles::{Annotated, RoleTag};
use ndarray::{ArrayD, IxDyn};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_SHARED_ID: AtomicUsize = AtomicUsize::new(0);

/// Named numeric cell whose value persists across function calls
///
/// Cloning yields another handle to the same cell. Equality and hashing go
/// by cell identity, so a `SharedVariable` can key per-parameter maps.
#[derive(Clone)]
pub struct SharedVariable {
    inner: Rc<SharedInner>,
}

struct SharedInner {
    id: usize,
    name: String,
    value: RefCell<Value>,
    roles: RoleTag,
}

impl SharedVariable {
    /// Create a new cell holding `value`
    pub fn new(value: Value, name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(SharedInner {
                id: NEXT_SHARED_ID.fetch_add(1, Ordering::Relaxed),
                name: name.into(),
                value: RefCell::new(value),
                roles: RoleTag::new(),
            }),
        }
    }

    /// Create a 0-d cell
    pub fn scalar(value: f32, name: impl Into<String>) -> Self {
        Self::new(ArrayD::from_elem(IxDyn(&[]), value), name)
    }

    /// Create a 1-d cell from a vector
    pub fn from_vec(data: Vec<f32>, name: impl Into<String>) -> Self {
        Self::new(ndarray::Array1::from(data).into_dyn(), name)
    }

    /// Create a zero-filled cell with the same shape as `self`
    pub fn zeros_like(&self, name: impl Into<String>) -> Self {
        Self::new(ArrayD::zeros(self.inner.value.borrow().raw_dim()), name)
    }

    /// Unique identity of the cell
    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Copy of the current value
    pub fn get_value(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Replace the current value
    pub fn set_value(&self, value: Value) {
        *self.inner.value.borrow_mut() = value;
    }

    pub fn shape(&self) -> Vec<usize> {
        self.inner.value.borrow().shape().to_vec()
    }

    /// Symbolic reference to the cell, read when the expression is evaluated
    pub fn expr(&self) -> Expr {
        Expr::shared(self)
    }
}

impl Annotated for SharedVariable {
    fn role_tag(&self) -> &RoleTag {
        &self.inner.roles
    }
}

impl PartialEq for SharedVariable {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for SharedVariable {}

impl Hash for SharedVariable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for SharedVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedVariable")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}
