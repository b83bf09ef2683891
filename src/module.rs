//! Bound modules: named native functions callable with dynamic host arguments.
//!
//! A module maps function names to a declared [`Signature`] and a native body. Calls resolve
//! the overload and hand the body typed accessors for its arguments. Binding failures surface
//! as a host `TypeError` before the body runs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::{debug, info};

use crate::config::BindOptions;
use crate::core::{BindError, HostError, Rejection};
use crate::dtype::{Element, ElementType};
use crate::host::HostValue;
use crate::optional::Arg;
use crate::overload::{self, Resolution};
use crate::signature::Signature;
use crate::view::{self, ArrayView};

/// Result type of native function bodies.
pub type CallResult = std::result::Result<HostValue, HostError>;

/// Native function body.
pub type NativeFn = Box<dyn Fn(&CallArgs<'_>) -> CallResult + Send + Sync>;

/// Arguments of one call, already matched against the selected overload.
pub struct CallArgs<'a> {
    values: &'a [HostValue],
    resolution: Resolution,
}

impl<'a> CallArgs<'a> {
    /// Index of the selected overload in declaration order.
    pub fn overload(&self) -> usize { self.resolution.index() }

    pub fn overload_name(&self) -> &str { self.resolution.name() }

    /// Raw argument at `position`, absent when omitted or None.
    pub fn value(&self, position: usize) -> Arg<&'a HostValue> {
        Arg::from_host(self.values.get(position))
    }

    /// View of the array argument at `position`.
    pub fn array<T: Element>(&self, position: usize) -> Result<ArrayView<T>, HostError> {
        match self.optional_array(position)? {
            Arg::Present(view) => Ok(view),
            Arg::Absent => Err(BindError::from(Rejection::MissingArgument { position }).into()),
        }
    }

    /// View of an optional array argument; absent arguments are never validated.
    pub fn optional_array<T: Element>(&self, position: usize) -> Result<Arg<ArrayView<T>>, HostError> {
        let accepted = match self.resolution.accepted(position) {
            Some(accepted) => accepted,
            None => return Ok(Arg::Absent),
        };
        match self.values.get(position) {
            Some(HostValue::Array(array)) => Ok(Arg::Present(view::bind_accepted(array, accepted)?)),
            Some(other) => Err(HostError::TypeError(format!(
                "argument {} is a {}, not an array",
                position,
                other.type_name()
            ))),
            None => Ok(Arg::Absent),
        }
    }

    pub fn int(&self, position: usize) -> Result<i64, HostError> {
        self.scalar(position, ElementType::Int64, HostValue::as_int)
    }

    pub fn float(&self, position: usize) -> Result<f64, HostError> {
        self.scalar(position, ElementType::Float64, HostValue::as_float)
    }

    pub fn bool(&self, position: usize) -> Result<bool, HostError> {
        self.scalar(position, ElementType::Bool, HostValue::as_bool)
    }

    fn scalar<V>(
        &self,
        position: usize,
        element: ElementType,
        get: fn(&HostValue) -> Option<V>,
    ) -> Result<V, HostError> {
        match self.value(position) {
            Arg::Present(v) => get(v).ok_or_else(|| {
                HostError::TypeError(format!("argument {} is a {}, expected {}", position, v.type_name(), element))
            }),
            Arg::Absent => Err(BindError::from(Rejection::MissingArgument { position }).into()),
        }
    }
}

struct Binding {
    signature: Signature,
    body: NativeFn,
}

/// A named collection of bound native functions.
pub struct Module {
    name: String,
    options: BindOptions,
    functions: RwLock<HashMap<String, Arc<Binding>>>,
}

impl Module {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self::with_options(name, BindOptions::default())
    }

    pub fn with_options<S: Into<String>>(name: S, options: BindOptions) -> Self {
        Self { name: name.into(), options, functions: RwLock::new(HashMap::new()) }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn options(&self) -> BindOptions { self.options }

    /// Register `body` under `name`. Names are unique within a module.
    pub fn def<S, F>(&self, name: S, signature: Signature, body: F) -> Result<(), HostError>
    where
        S: Into<String>,
        F: Fn(&CallArgs<'_>) -> CallResult + Send + Sync + 'static,
    {
        let name = name.into();
        let mut g = self.functions.write().map_err(|_| HostError::Other("module poisoned".into()))?;
        if g.contains_key(&name) {
            return Err(HostError::Other(format!("function already defined: {}.{}", self.name, name)));
        }
        info!("defined {}.{} with {} overload(s)", self.name, name, signature.len());
        g.insert(name, Arc::new(Binding { signature, body: Box::new(body) }));
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.functions.read().map(|g| g.contains_key(name)).unwrap_or(false)
    }

    pub fn signature(&self, name: &str) -> Option<Signature> {
        let g = self.functions.read().ok()?;
        g.get(name).map(|b| b.signature.clone())
    }

    /// Sorted function names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions
            .read()
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Call `name` with positional host arguments. Trailing optional parameters may be omitted.
    ///
    /// The registry lock is released before the body runs, so bodies may call back into the
    /// module or define new functions.
    pub fn call(&self, name: &str, args: &[HostValue]) -> CallResult {
        let binding = {
            let guard = self.functions.read().map_err(|_| HostError::Other("module poisoned".into()))?;
            guard
                .get(name)
                .cloned()
                .ok_or_else(|| HostError::UnknownFunction(format!("{}.{}", self.name, name)))?
        };
        let resolution = overload::resolve_with(args, &binding.signature, &self.options)?;
        debug!("calling {}.{} overload {}", self.name, name, resolution.name());
        let call_args = CallArgs { values: args, resolution };
        (binding.body)(&call_args)
    }
}
