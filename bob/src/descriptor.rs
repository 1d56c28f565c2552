//! Build descriptors as explicit registries of target functions
//!
//! A descriptor is a named table of [`MethodInfo`] records, each backed by
//! a closure that builds an action graph. Static targets are plain
//! closures; instance targets receive a fresh `D::default()`.

use crate::error::{BootstrapError, BootstrapResult};
use crate::target::MethodInfo;
use convenient_actions::{ActionRef, ActionResult, Clean, Compilation, Jar, TestRun, War, Zip};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Values a target function may return
pub trait IntoTargetAction {
    /// The action to process, `None` when the target produced nothing
    ///
    /// # Errors
    ///
    /// Errors raised while the target built its graph.
    fn into_target_action(self) -> BootstrapResult<Option<ActionRef>>;
}

impl IntoTargetAction for ActionRef {
    fn into_target_action(self) -> BootstrapResult<Option<ActionRef>> {
        Ok(Some(self))
    }
}

macro_rules! node_target {
    ($($node:ty),*) => {
        $(
            impl IntoTargetAction for $node {
                fn into_target_action(self) -> BootstrapResult<Option<ActionRef>> {
                    Ok(Some(self.into()))
                }
            }
        )*
    };
}

node_target!(Jar, War, Zip, Compilation, TestRun, Clean);

impl<T: IntoTargetAction> IntoTargetAction for Option<T> {
    fn into_target_action(self) -> BootstrapResult<Option<ActionRef>> {
        match self {
            Some(value) => value.into_target_action(),
            None => Ok(None),
        }
    }
}

impl<T: IntoTargetAction> IntoTargetAction for ActionResult<T> {
    fn into_target_action(self) -> BootstrapResult<Option<ActionRef>> {
        self?.into_target_action()
    }
}

/// A loaded build descriptor
pub trait BuildModule {
    /// Descriptor name, matching the stem of its source file
    fn name(&self) -> &str;

    /// Every declared method, targets or not
    fn methods(&self) -> Vec<MethodInfo>;

    /// Run the target `name` and return its action graph
    ///
    /// # Errors
    ///
    /// Graph construction failures, and [`BootstrapError::NullAction`] when
    /// the target produced no action.
    fn invoke(&self, name: &str) -> BootstrapResult<ActionRef>;
}

type StaticBody = Box<dyn Fn() -> BootstrapResult<Option<ActionRef>>>;
type InstanceBody<D> = Box<dyn Fn(&D) -> BootstrapResult<Option<ActionRef>>>;

enum Body<D> {
    Static(StaticBody),
    Instance(InstanceBody<D>),
    Declared,
}

struct Method<D> {
    info: MethodInfo,
    body: Body<D>,
}

/// Descriptor whose instance targets run against `D::default()`
pub struct Descriptor<D = ()> {
    name: String,
    methods: Vec<Method<D>>,
}

impl<D> fmt::Debug for Descriptor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.name)
            .field("methods", &self.methods.iter().map(|m| &m.info.name).collect::<Vec<_>>())
            .finish()
    }
}

impl<D: Default + 'static> Descriptor<D> {
    /// Empty descriptor called `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    fn add(mut self, info: MethodInfo, body: Body<D>) -> Self {
        self.methods.retain(|m| m.info.name != info.name);
        self.methods.push(Method { info, body });
        self
    }

    /// Instance target `name`
    #[must_use]
    pub fn target<F, R>(self, name: &str, body: F) -> Self
    where
        F: Fn(&D) -> R + 'static,
        R: IntoTargetAction,
    {
        self.add(
            MethodInfo::target(name),
            Body::Instance(Box::new(move |d: &D| body(d).into_target_action())),
        )
    }

    /// Instance target `name`, marked as the default
    #[must_use]
    pub fn default_target<F, R>(self, name: &str, body: F) -> Self
    where
        F: Fn(&D) -> R + 'static,
        R: IntoTargetAction,
    {
        self.add(
            MethodInfo::default_target(name),
            Body::Instance(Box::new(move |d: &D| body(d).into_target_action())),
        )
    }

    /// Static target described by `info`
    #[must_use]
    pub fn static_target<F, R>(self, info: MethodInfo, body: F) -> Self
    where
        F: Fn() -> R + 'static,
        R: IntoTargetAction,
    {
        self.add(info, Body::Static(Box::new(move || body().into_target_action())))
    }

    /// Method that is listed but has no callable body
    #[must_use]
    pub fn method(self, info: MethodInfo) -> Self {
        self.add(info, Body::Declared)
    }
}

impl<D: Default + 'static> BuildModule for Descriptor<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn methods(&self) -> Vec<MethodInfo> {
        self.methods.iter().map(|m| m.info.clone()).collect()
    }

    fn invoke(&self, name: &str) -> BootstrapResult<ActionRef> {
        let method = self
            .methods
            .iter()
            .find(|m| m.info.name == name)
            .ok_or_else(|| BootstrapError::Internal(format!("{}.{name}() does not exist", self.name)))?;

        let action = match &method.body {
            Body::Static(body) => {
                debug!("Invoking static target {}.{name}()", self.name);
                body()?
            }
            Body::Instance(body) => {
                debug!("Invoking target {}.{name}() on a new instance", self.name);
                body(&D::default())?
            }
            Body::Declared => {
                return Err(BootstrapError::Internal(format!(
                    "{}.{name}() is declared without a body",
                    self.name
                )));
            }
        };

        action.ok_or_else(|| BootstrapError::NullAction {
            descriptor: self.name.clone(),
            target: name.to_string(),
        })
    }
}

/// Known descriptors by name
#[derive(Clone, Default)]
pub struct Registry {
    modules: BTreeMap<String, Rc<dyn BuildModule>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.modules.keys()).finish()
    }
}

impl Registry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `Default` descriptor
    #[must_use]
    pub fn with_builtins() -> Self {
        Self::new().register(crate::builtin::default_descriptor())
    }

    /// Add `module`, replacing a descriptor of the same name
    #[must_use]
    pub fn register<M: BuildModule + 'static>(mut self, module: M) -> Self {
        let name = module.name().to_string();
        if self.modules.insert(name.clone(), Rc::new(module)).is_some() {
            debug!("Descriptor {name} replaced");
        }
        self
    }

    /// Descriptor called `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Rc<dyn BuildModule>> {
        self.modules.get(name).cloned()
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}
