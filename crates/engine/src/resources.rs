//! Command and query functions
//!
//! A resource binds a function type of the application definition to the
//! code that executes it. Resources are registered in the application
//! configuration and checked against the definition at prepare.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use appstruct_core::{Error, QName, Result, WsId, NULL_QNAME};

use crate::appdef::{AppDef, TypeKind};
use crate::element::Element;
use crate::event::Event;
use crate::row::Row;

/// Command executor
pub type CommandExec = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

/// Query result callback
pub type QueryCallback<'a> = dyn FnMut(Row) -> Result<()> + 'a;

/// Query executor
pub type QueryExec = Arc<dyn Fn(&QueryArgs, &mut QueryCallback<'_>) -> Result<()> + Send + Sync>;

/// Arguments of a query call
#[derive(Debug, Clone, PartialEq)]
pub struct QueryArgs {
    /// Workspace queried
    pub workspace: WsId,
    /// Argument object
    pub arg: Element,
}

/// Command function
#[derive(Clone)]
pub struct CommandFunction {
    name: QName,
    params: QName,
    unlogged_params: QName,
    result: QName,
    exec: CommandExec,
}

impl CommandFunction {
    /// Command `name` without argument objects or result.
    pub fn new(name: QName, exec: impl Fn(&Event) -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            name,
            params: NULL_QNAME,
            unlogged_params: NULL_QNAME,
            result: NULL_QNAME,
            exec: Arc::new(exec),
        }
    }

    /// Sets the argument object type.
    pub fn with_params(mut self, params: QName) -> Self {
        self.params = params;
        self
    }

    /// Sets the unlogged argument object type.
    pub fn with_unlogged_params(mut self, unlogged: QName) -> Self {
        self.unlogged_params = unlogged;
        self
    }

    /// Sets the result type.
    pub fn with_result(mut self, result: QName) -> Self {
        self.result = result;
        self
    }

    /// Command name.
    pub fn qname(&self) -> &QName {
        &self.name
    }

    /// Argument object type; null if none.
    pub fn params(&self) -> &QName {
        &self.params
    }

    /// Unlogged argument object type; null if none.
    pub fn unlogged_params(&self) -> &QName {
        &self.unlogged_params
    }

    /// Result type; null if none.
    pub fn result(&self) -> &QName {
        &self.result
    }

    /// Runs the command for a built event.
    pub fn exec(&self, event: &Event) -> Result<()> {
        (self.exec)(event)
    }
}

impl fmt::Debug for CommandFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("unlogged_params", &self.unlogged_params)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

/// Query function
#[derive(Clone)]
pub struct QueryFunction {
    name: QName,
    params: QName,
    result: QName,
    exec: QueryExec,
}

impl QueryFunction {
    /// Query `name` without argument object or result.
    pub fn new(
        name: QName,
        exec: impl Fn(&QueryArgs, &mut QueryCallback<'_>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            params: NULL_QNAME,
            result: NULL_QNAME,
            exec: Arc::new(exec),
        }
    }

    /// Sets the argument object type.
    pub fn with_params(mut self, params: QName) -> Self {
        self.params = params;
        self
    }

    /// Sets the result row type.
    pub fn with_result(mut self, result: QName) -> Self {
        self.result = result;
        self
    }

    /// Query name.
    pub fn qname(&self) -> &QName {
        &self.name
    }

    /// Argument object type; null if none.
    pub fn params(&self) -> &QName {
        &self.params
    }

    /// Result row type; null if none.
    pub fn result(&self) -> &QName {
        &self.result
    }

    /// Runs the query, passing result rows to `cb`.
    pub fn exec(&self, args: &QueryArgs, cb: &mut QueryCallback<'_>) -> Result<()> {
        (self.exec)(args, cb)
    }
}

impl fmt::Debug for QueryFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

/// Function resource
#[derive(Debug, Clone)]
pub enum Resource {
    /// Command function
    Command(CommandFunction),
    /// Query function
    Query(QueryFunction),
}

impl Resource {
    /// Function name.
    pub fn qname(&self) -> &QName {
        match self {
            Resource::Command(c) => c.qname(),
            Resource::Query(q) => q.qname(),
        }
    }

    fn kind(&self) -> TypeKind {
        match self {
            Resource::Command(_) => TypeKind::Command,
            Resource::Query(_) => TypeKind::Query,
        }
    }

    fn referenced(&self) -> Vec<(&'static str, &QName)> {
        match self {
            Resource::Command(c) => vec![
                ("params", c.params()),
                ("unlogged params", c.unlogged_params()),
                ("result", c.result()),
            ],
            Resource::Query(q) => vec![("params", q.params()), ("result", q.result())],
        }
    }
}

impl From<CommandFunction> for Resource {
    fn from(c: CommandFunction) -> Self {
        Resource::Command(c)
    }
}

impl From<QueryFunction> for Resource {
    fn from(q: QueryFunction) -> Self {
        Resource::Query(q)
    }
}

/// Resources of one application, by name
#[derive(Debug, Clone, Default)]
pub struct Resources {
    resources: BTreeMap<QName, Resource>,
}

impl Resources {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource, replacing one with the same name.
    pub fn add(&mut self, r: impl Into<Resource>) -> &mut Self {
        let r = r.into();
        self.resources.insert(r.qname().clone(), r);
        self
    }

    /// Resource by name; `None` stands for the null resource.
    pub fn query_resource(&self, name: &QName) -> Option<&Resource> {
        self.resources.get(name)
    }

    /// Command function by name.
    pub fn command_function(&self, name: &QName) -> Option<&CommandFunction> {
        match self.resources.get(name) {
            Some(Resource::Command(c)) => Some(c),
            _ => None,
        }
    }

    /// Query function by name.
    pub fn query_function(&self, name: &QName) -> Option<&QueryFunction> {
        match self.resources.get(name) {
            Some(Resource::Query(q)) => Some(q),
            _ => None,
        }
    }

    /// Resource names in order.
    pub fn names(&self) -> impl Iterator<Item = &QName> {
        self.resources.keys()
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if no resource is registered.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Checks resources against the definition: every resource names a
    /// function type of its kind and refers to defined types only; every
    /// function type has a resource.
    pub(crate) fn validate(&self, app_def: &AppDef) -> Result<()> {
        for r in self.resources.values() {
            match app_def.type_def(r.qname()) {
                Some(t) if t.kind() == r.kind() => {}
                Some(t) => {
                    return Err(Error::invalid_argument(format!(
                        "resource «{}» is {}, but defined as {}",
                        r.qname(),
                        r.kind(),
                        t.kind()
                    )))
                }
                None => {
                    return Err(Error::invalid_argument(format!(
                        "resource «{}» has no type definition",
                        r.qname()
                    )))
                }
            }
            for (what, name) in r.referenced() {
                if !name.is_null() && app_def.type_def(name).is_none() {
                    return Err(Error::invalid_argument(format!(
                        "resource «{}» {} type «{}» is not defined",
                        r.qname(),
                        what,
                        name
                    )));
                }
            }
        }

        for t in app_def.types().filter(|t| t.kind().is_function()) {
            if self.query_resource(t.qname()).is_none() {
                return Err(Error::invalid_argument(format!(
                    "exec of {} «{}» is not defined",
                    t.kind(),
                    t.qname()
                )));
            }
        }
        Ok(())
    }
}
