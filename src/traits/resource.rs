// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;

/// Named arguments passed to a resource operation.
pub type NamedArgs = serde_json::Map<String, Value>;

/// One declared parameter of a resource operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub required: bool,
}

/// The declared signature of a resource operation: its name and named parameters.
///
/// Signatures are what a sequence binds against; the routing table is built from the
/// parameter names declared here, never from the arguments a call happens to receive.
///
/// # Example
/// ```
/// use the_benchtop::traits::Signature;
///
/// let sig = Signature::new("configure").param("center_frequency").optional("span");
/// assert!(sig.accepts("span"));
/// assert_eq!(sig.required().collect::<Vec<_>>(), vec!["center_frequency"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Param>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Add a required parameter
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            required: true,
        });
        self
    }

    /// Add a parameter the operation can do without
    pub fn optional(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            required: false,
        });
        self
    }

    pub fn accepts(&self, param: &str) -> bool {
        self.params.iter().any(|p| p.name == param)
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }
}

/// A stateful unit of equipment: something that must be opened before use and closed after.
///
/// Implementations are shared across worker threads, so state lives behind interior
/// mutability. `close` must succeed when the resource is already closed.
///
/// Operations are dispatched by name with named arguments. The defaults describe a
/// resource with no operations at all.
pub trait Resource: Send + Sync {
    fn open(&self) -> anyhow::Result<()>;

    fn close(&self) -> anyhow::Result<()>;

    fn is_open(&self) -> bool;

    /// Signatures of the operations this resource exposes
    fn operations(&self) -> Vec<Signature> {
        Vec::new()
    }

    /// Invoke operation `name` with already-routed named arguments
    fn call(&self, name: &str, _args: &NamedArgs) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("resource has no operation '{}'", name))
    }
}
