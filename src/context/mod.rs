//! Per-request context — request, route match, operation identity, bound
//! arguments, caller identity and type-keyed extensions.
//!
//! A [`Context`] is built by the [`Router`](crate::router::Router) once a route
//! matches and then flows by value through the middleware stack into the
//! handler. Everything a layer needs to know about the caller travels here
//! explicitly; nothing is read from ambient or thread-local state.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use crate::Request;

/// Type-erased request extensions map — used to inject per-request state
/// into handlers without requiring handlers to know about each other's types.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Create a new empty extensions map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value of the same type.
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a value from the extensions map
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Remove a value from the extensions map
    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Path parameters extracted from the matched route, in pattern order.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(String, String)>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing an earlier capture with the same name.
    pub fn insert(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a query parameter is bound to an operation argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryBinding {
    /// First value of the parameter, `Null` when absent.
    Single(String),
    /// Every value of the parameter, `Null` when absent.
    Many(String),
}

/// Identity of the logical operation a route dispatches to.
///
/// `type_name` plays the role of the owning controller/module and `name` the
/// action; together they form the cache group of the operation. An operation
/// also declares which query parameters it binds as arguments and whether
/// output caching must be skipped for it entirely.
///
/// # Examples
///
/// ```
/// use rttp_outcache::context::Operation;
///
/// let op = Operation::new("Items", "Get").bind_query("id");
/// assert_eq!(op.type_name(), "Items");
/// assert!(!op.ignores_cache());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    type_name: String,
    name: String,
    query_bindings: Vec<QueryBinding>,
    ignore_cache: bool,
}

impl Operation {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            query_bindings: Vec::new(),
            ignore_cache: false,
        }
    }

    /// Bind the first value of query parameter `name` as an argument.
    #[must_use]
    pub fn bind_query(mut self, name: impl Into<String>) -> Self {
        self.query_bindings.push(QueryBinding::Single(name.into()));
        self
    }

    /// Bind every value of query parameter `name` as one multi-valued argument.
    #[must_use]
    pub fn bind_query_many(mut self, name: impl Into<String>) -> Self {
        self.query_bindings.push(QueryBinding::Many(name.into()));
        self
    }

    /// Mark the operation as never cacheable, whatever layer wraps it.
    #[must_use]
    pub fn ignore_cache(mut self) -> Self {
        self.ignore_cache = true;
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ignores_cache(&self) -> bool {
        self.ignore_cache
    }

    pub fn query_bindings(&self) -> &[QueryBinding] {
        &self.query_bindings
    }
}

/// A bound argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Null,
    Single(String),
    Many(Vec<String>),
}

impl ArgValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }
}

/// Arguments bound for the target operation, in binding order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    entries: Vec<(String, ArgValue)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing an earlier binding with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Bind path captures followed by the operation's declared query bindings.
    fn bind(request: &Request, params: &PathParams, operation: &Operation) -> Self {
        let mut arguments = Self::new();
        for (name, value) in params.iter() {
            arguments.insert(name, ArgValue::Single(value.to_owned()));
        }
        for binding in operation.query_bindings() {
            match binding {
                QueryBinding::Single(name) => {
                    let value = request
                        .query_param(name)
                        .map_or(ArgValue::Null, |v| ArgValue::Single(v.to_owned()));
                    arguments.insert(name.as_str(), value);
                }
                QueryBinding::Many(name) => {
                    let values: Vec<String> =
                        request.query_values(name).map(str::to_owned).collect();
                    let value = if values.is_empty() {
                        ArgValue::Null
                    } else {
                        ArgValue::Many(values)
                    };
                    arguments.insert(name.as_str(), value);
                }
            }
        }
        arguments
    }
}

/// The caller behind a request, as established by an upstream auth layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Identity {
    #[default]
    Anonymous,
    Authenticated { name: String },
}

impl Identity {
    pub fn authenticated(name: impl Into<String>) -> Self {
        Identity::Authenticated { name: name.into() }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated { .. })
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated { name } => Some(name),
        }
    }
}

/// Per-request context handed through the middleware stack to the handler.
pub struct Context {
    request: Request,
    params: PathParams,
    operation: Option<Arc<Operation>>,
    arguments: Arguments,
    identity: Identity,
    extensions: Extensions,
}

impl Context {
    /// Create a context for a request that did not go through route matching.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            params: PathParams::new(),
            operation: None,
            arguments: Arguments::new(),
            identity: Identity::Anonymous,
            extensions: Extensions::new(),
        }
    }

    /// Create a context for a matched route, binding its arguments.
    pub fn for_route(request: Request, params: PathParams, operation: Option<Arc<Operation>>) -> Self {
        Self::new(request).into_route(params, operation)
    }

    /// Attach route-match results to an existing context, keeping its identity and
    /// extensions.
    pub fn into_route(mut self, params: PathParams, operation: Option<Arc<Operation>>) -> Self {
        self.arguments = match operation.as_deref() {
            Some(op) => Arguments::bind(&self.request, &params, op),
            None => Arguments::new(),
        };
        self.params = params;
        self.operation = operation;
        self
    }

    /// Attach the caller identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn operation(&self) -> Option<&Operation> {
        self.operation.as_deref()
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.request.body();
        serde_json::from_slice(body)
    }
}
