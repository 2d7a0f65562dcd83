//! Service class definitions.
//!
//! A [`ServiceClass`] bundles a [`FieldRegistry`], an ordered validation
//! list, a callback chain and the business-logic routine. Classes are built
//! through a declaration block run under the class's write locks:
//!
//! ```
//! use interactor_core::{args, ServiceClass, Value, ValueType};
//!
//! let greet = ServiceClass::define("Greet", |d| {
//!     d.typed_input("name", ValueType::String);
//!     d.output("greeting");
//!     d.perform(|ctx| {
//!         let name = ctx.get("name").and_then(Value::as_str).unwrap_or("stranger").to_string();
//!         ctx.set("greeting", format!("hello {name}"))?;
//!         Ok(Value::Null)
//!     });
//! })
//! .unwrap();
//!
//! let outcome = greet.call(args([("name", "ada")])).unwrap();
//! assert!(outcome.success());
//! assert_eq!(outcome.get("greeting"), Some(&Value::from("hello ada")));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::{RwLock, RwLockWriteGuard};

use crate::callbacks::{Callback, CallbackChain, Next};
use crate::context::Context;
use crate::error::ServiceError;
use crate::orchestrator::Orchestrator;
use crate::outcome::Outcome;
use crate::registry::{FieldDeclaration, FieldRegistry, RegistryWriter};
use crate::type_check::TypeSpec;
use crate::types::{Args, Value};
use crate::validation::{Rule, Validation};

/// Business-logic routine. Its return value becomes the result unless the
/// routine already set one explicitly.
pub type Routine = Arc<dyn Fn(&mut Context) -> anyhow::Result<Value> + Send + Sync>;

#[derive(Default)]
struct Behaviour {
    validations: Vec<Validation>,
    callbacks: Vec<Callback>,
    routine: Option<Routine>,
}

/// A declared service object type.
pub struct ServiceClass {
    name: String,
    parent: Option<Arc<ServiceClass>>,
    registry: Arc<FieldRegistry>,
    behaviour: RwLock<Behaviour>,
}

impl ServiceClass {
    /// Defines a new root class.
    ///
    /// # Errors
    ///
    /// Returns the first declaration error raised by `body`.
    pub fn define<F>(name: impl Into<String>, body: F) -> Result<Arc<Self>, ServiceError>
    where
        F: FnOnce(&mut Declarer<'_>),
    {
        let name = name.into();
        let class = Arc::new(Self {
            registry: Arc::new(FieldRegistry::new(name.clone())),
            name,
            parent: None,
            behaviour: RwLock::new(Behaviour::default()),
        });
        class.declare(body)?;
        Ok(class)
    }

    /// Defines a subclass that inherits every declaration, validation,
    /// callback and the routine of `self`.
    ///
    /// # Errors
    ///
    /// Returns the first declaration error raised by `body`.
    pub fn subclass<F>(self: &Arc<Self>, name: impl Into<String>, body: F) -> Result<Arc<Self>, ServiceError>
    where
        F: FnOnce(&mut Declarer<'_>),
    {
        let name = name.into();
        let class = Arc::new(Self {
            registry: Arc::new(FieldRegistry::inheriting(name.clone(), self.registry.clone())),
            name,
            parent: Some(self.clone()),
            behaviour: RwLock::new(Behaviour::default()),
        });
        class.declare(body)?;
        Ok(class)
    }

    /// Runs another declaration block on this class.
    ///
    /// The block holds the class's registry and behaviour write locks for
    /// its whole duration, so concurrent blocks on one class never
    /// interleave. Declarations made before an error are kept.
    ///
    /// # Errors
    ///
    /// Returns the first declaration error raised by `body`.
    pub fn declare<F>(&self, body: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut Declarer<'_>),
    {
        let mut declarer = Declarer {
            registry: self.registry.writer(),
            behaviour: self.behaviour.write(),
            error: None,
        };
        body(&mut declarer);
        let error = declarer.error.take();
        drop(declarer);
        tracing::debug!(class = %self.name, "declaration block applied");
        error.map_or(Ok(()), Err)
    }

    /// Invokes the class synchronously.
    ///
    /// # Errors
    ///
    /// Raises `UndeclaredFieldWrite` for undeclared arguments or writes on a
    /// restricted class, and `Routine` for errors escaping the business
    /// logic or a callback. Validation failures are returned in the
    /// [`Outcome`], not raised.
    pub fn call(&self, args: Args) -> Result<Outcome, ServiceError> {
        Orchestrator::new(self).invoke(args)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn parent(&self) -> Option<&Arc<ServiceClass>> {
        self.parent.as_ref()
    }

    #[must_use]
    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    #[must_use]
    pub fn inputs(&self) -> IndexSet<String> {
        self.registry.inputs()
    }

    #[must_use]
    pub fn outputs(&self) -> IndexSet<String> {
        self.registry.outputs()
    }

    #[must_use]
    pub fn constraint(&self, name: &str) -> Option<TypeSpec> {
        self.registry.constraint(name)
    }

    #[must_use]
    pub fn allowed_keys(&self) -> HashSet<String> {
        self.registry.allowed_keys()
    }

    #[must_use]
    pub fn is_restricted(&self) -> bool {
        self.registry.is_restricted()
    }

    /// One type check per constrained field (a subclass constraint shadows
    /// its ancestor's), then the rules of every ancestor and this class.
    #[must_use]
    pub fn validations(&self) -> Vec<Validation> {
        let mut all: Vec<Validation> = self
            .registry
            .constraints()
            .into_iter()
            .map(|(field, spec)| Validation::Type { field, spec })
            .collect();
        all.extend(self.rules());
        all
    }

    fn rules(&self) -> Vec<Validation> {
        let mut all = self
            .parent
            .as_ref()
            .map(|p| p.rules())
            .unwrap_or_default();
        all.extend(self.behaviour.read().validations.iter().cloned());
        all
    }

    /// Callbacks of every ancestor, then this class's own.
    #[must_use]
    pub fn callbacks(&self) -> CallbackChain {
        let mut chain = self
            .parent
            .as_ref()
            .map(|p| p.callbacks())
            .unwrap_or_default();
        for callback in &self.behaviour.read().callbacks {
            chain.push(callback.clone());
        }
        chain
    }

    /// This class's routine, or the nearest ancestor's.
    #[must_use]
    pub fn routine(&self) -> Option<Routine> {
        if let Some(routine) = &self.behaviour.read().routine {
            return Some(routine.clone());
        }
        self.parent.as_ref().and_then(|p| p.routine())
    }
}

impl fmt::Debug for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClass")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("inputs", &self.inputs())
            .field("outputs", &self.outputs())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Declarer
// ---------------------------------------------------------------------------

/// Handle passed to a declaration block.
pub struct Declarer<'a> {
    registry: RegistryWriter<'a>,
    behaviour: RwLockWriteGuard<'a, Behaviour>,
    error: Option<ServiceError>,
}

impl Declarer<'_> {
    /// Declares a field. Its constraint, if any, replaces an earlier one for
    /// the same name and is checked before the rules at call time.
    pub fn field(&mut self, declaration: FieldDeclaration) -> &mut Self {
        self.registry.declare(declaration);
        self
    }

    pub fn input(&mut self, name: impl Into<String>) -> &mut Self {
        self.field(FieldDeclaration::input(name))
    }

    pub fn typed_input(&mut self, name: impl Into<String>, spec: impl Into<TypeSpec>) -> &mut Self {
        self.field(FieldDeclaration::input(name).typed(spec))
    }

    /// Declares an output; outputs are writable even when not also inputs.
    pub fn output(&mut self, name: impl Into<String>) -> &mut Self {
        self.field(FieldDeclaration::output(name))
    }

    pub fn typed_output(&mut self, name: impl Into<String>, spec: impl Into<TypeSpec>) -> &mut Self {
        self.field(FieldDeclaration::output(name).typed(spec))
    }

    /// Appends a field or object-level rule.
    pub fn validates(&mut self, rule: impl Rule + 'static) -> &mut Self {
        self.behaviour.validations.push(Validation::Rule(Arc::new(rule)));
        self
    }

    pub fn before<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.behaviour.callbacks.push(Callback::Before(Arc::new(hook)));
        self
    }

    pub fn after<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.behaviour.callbacks.push(Callback::After(Arc::new(hook)));
        self
    }

    pub fn around<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Context, Next<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.behaviour.callbacks.push(Callback::Around(Arc::new(hook)));
        self
    }

    /// Sets the business-logic routine, replacing any earlier one on this class.
    pub fn perform<F>(&mut self, routine: F) -> &mut Self
    where
        F: Fn(&mut Context) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.behaviour.routine = Some(Arc::new(routine));
        self
    }

    pub fn unrestrict(&mut self) -> &mut Self {
        self.registry.unrestrict();
        self
    }

    /// Re-enables restriction; fails the block if this class unrestricted itself.
    pub fn restrict(&mut self) -> &mut Self {
        if let Err(err) = self.registry.restrict() {
            self.error.get_or_insert(err);
        }
        self
    }
}
