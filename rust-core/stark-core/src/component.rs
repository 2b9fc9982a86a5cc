//! # Components
//!
//! Pluggable units that decide whether they supply a parameter and produce
//! its value through a resolver callable.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Components only produce values, planning lives in the resolver
//! - **O**: New parameter sources are added by implementing `Component`
//! - **L**: Plain components and singletons are matched through `Registered`
//! - **I**: The trait has one required method (`resolver`)
//!
//! Registration order is priority: the first component whose
//! `can_handle_parameter` accepts a parameter wins.

use crate::callable::{Callable, Parameter};
use crate::error::{Error, Result};
use crate::types::TypeTag;
use std::fmt;
use std::sync::Arc;

/// A resolution unit for handler parameters
pub trait Component: Send + Sync {
    /// The callable producing this component's value
    fn resolver(&self) -> &Callable;

    /// Display name used in diagnostics
    fn name(&self) -> &str {
        self.resolver().name()
    }

    /// State key under which the produced value is stored
    fn identity(&self, parameter: &Parameter) -> String {
        default_identity(self.resolver(), parameter)
    }

    /// Whether this component supplies the given parameter
    ///
    /// Defaults to comparing the parameter's annotation with the resolver's
    /// return annotation. A resolver without return annotation never matches.
    fn can_handle_parameter(&self, parameter: &Parameter) -> bool {
        returns_match(self.resolver(), parameter)
    }

    /// Extra parameters this component validates on behalf of `handler`
    ///
    /// Route generation documents them as if the handler declared them.
    fn get_validation_parameters(&self, _handler: &Callable, _parameter: &Parameter) -> Vec<Parameter> {
        Vec::new()
    }
}

/// Lower-cased qualified annotation name, suffixed with `:param_name` when the
/// resolver asks for the parameter itself
#[must_use]
pub fn default_identity(resolver: &Callable, parameter: &Parameter) -> String {
    let annotation_name = parameter.annotation.identity_name();
    if resolver.takes(&TypeTag::Parameter) {
        format!("{annotation_name}:{}", parameter.name.to_lowercase())
    } else {
        annotation_name
    }
}

fn returns_match(resolver: &Callable, parameter: &Parameter) -> bool {
    let returns = resolver.returns();
    !returns.is_empty() && *returns == parameter.annotation
}

/// Component backed by a single callable, matched by return annotation
#[derive(Debug, Clone)]
pub struct FnComponent {
    resolver: Callable,
}

impl FnComponent {
    /// Wrap a resolver callable
    #[must_use]
    pub fn new(resolver: Callable) -> Self {
        Self { resolver }
    }
}

impl Component for FnComponent {
    fn resolver(&self) -> &Callable {
        &self.resolver
    }
}

/// A component resolved once per resolver lifetime
///
/// Always matched by its resolver's return annotation. Construction rejects
/// resolvers that cannot be cached: no return annotation, or a request for
/// the `Parameter` marker.
#[derive(Debug, Clone)]
pub struct Singleton {
    resolver: Callable,
}

impl Singleton {
    /// Validate and wrap a singleton resolver
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the resolver has no return
    /// annotation or depends on the `Parameter` marker.
    pub fn new(resolver: Callable) -> Result<Self> {
        if resolver.returns().is_empty() {
            return Err(Error::configuration(format!(
                "Singleton component \"{}\" must include a return annotation.",
                resolver.name()
            )));
        }
        if resolver.takes(&TypeTag::Parameter) {
            return Err(Error::configuration(format!(
                "Singleton component \"{}\" cannot depend on Parameter.",
                resolver.name()
            )));
        }
        Ok(Self { resolver })
    }

    /// The resolver callable
    #[must_use]
    pub fn resolver(&self) -> &Callable {
        &self.resolver
    }
}

/// An entry in the component registry
#[derive(Clone)]
pub enum Registered {
    /// Resolved per request
    Component(Arc<dyn Component>),
    /// Resolved once and cached
    Singleton(Singleton),
}

impl Registered {
    /// The resolver callable
    #[must_use]
    pub fn resolver(&self) -> &Callable {
        match self {
            Self::Component(component) => component.resolver(),
            Self::Singleton(singleton) => singleton.resolver(),
        }
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Component(component) => component.name(),
            Self::Singleton(singleton) => singleton.resolver().name(),
        }
    }

    /// State key for the given parameter
    #[must_use]
    pub fn identity(&self, parameter: &Parameter) -> String {
        match self {
            Self::Component(component) => component.identity(parameter),
            Self::Singleton(singleton) => default_identity(singleton.resolver(), parameter),
        }
    }

    /// Whether this entry supplies the given parameter
    #[must_use]
    pub fn can_handle_parameter(&self, parameter: &Parameter) -> bool {
        match self {
            Self::Component(component) => component.can_handle_parameter(parameter),
            Self::Singleton(singleton) => returns_match(singleton.resolver(), parameter),
        }
    }

    /// Whether this entry is a singleton
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Singleton(_))
    }

    /// Extra parameters validated on behalf of `handler`
    #[must_use]
    pub fn validation_parameters(&self, handler: &Callable, parameter: &Parameter) -> Vec<Parameter> {
        match self {
            Self::Component(component) => component.get_validation_parameters(handler, parameter),
            Self::Singleton(_) => Vec::new(),
        }
    }
}

impl fmt::Debug for Registered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component(_) => write!(f, "Component({})", self.name()),
            Self::Singleton(_) => write!(f, "Singleton({})", self.name()),
        }
    }
}

/// Ordered component registry, first match wins
#[derive(Debug, Clone, Default)]
pub struct Components {
    entries: Vec<Registered>,
}

impl Components {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component
    pub fn add<C: Component + 'static>(&mut self, component: C) -> &mut Self {
        self.add_arc(Arc::new(component))
    }

    /// Register a shared component
    pub fn add_arc(&mut self, component: Arc<dyn Component>) -> &mut Self {
        self.entries.push(Registered::Component(component));
        self
    }

    /// Register a callable matched by its return annotation
    pub fn add_fn(&mut self, resolver: Callable) -> &mut Self {
        self.add(FnComponent::new(resolver))
    }

    /// Register a singleton
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the resolver cannot be a singleton.
    pub fn add_singleton(&mut self, resolver: Callable) -> Result<&mut Self> {
        self.entries
            .push(Registered::Singleton(Singleton::new(resolver)?));
        Ok(self)
    }

    /// Append every entry of another registry
    pub fn extend(&mut self, other: Self) -> &mut Self {
        self.entries.extend(other.entries);
        self
    }

    /// First entry able to handle the parameter, with its registry index
    #[must_use]
    pub fn find(&self, parameter: &Parameter) -> Option<(usize, &Registered)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.can_handle_parameter(parameter))
    }

    /// Iterate over entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Registered> {
        self.entries.iter()
    }

    /// Number of registered entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Value;

    #[derive(Clone)]
    struct Db;

    crate::types::impl_named!(Db);

    fn db_resolver() -> Callable {
        Callable::builder("make_db")
            .returns_tag(TypeTag::named::<Db>())
            .sync(|_| Ok(Value::new(Db)))
    }

    fn header_resolver() -> Callable {
        Callable::builder("header")
            .param::<Parameter>("parameter")
            .returns::<crate::types::Header>()
            .sync(|_| Ok(Value::new(crate::types::Header(None))))
    }

    #[test]
    fn test_default_identity() {
        let component = FnComponent::new(db_resolver());
        let parameter = Parameter::new("db", TypeTag::named::<Db>());
        assert_eq!(
            component.identity(&parameter),
            std::any::type_name::<Db>().to_lowercase()
        );
        assert!(component.identity(&parameter).ends_with("::db"));
        assert!(component.can_handle_parameter(&parameter));
    }

    #[test]
    fn test_identity_includes_parameter_name() {
        let component = FnComponent::new(header_resolver());
        let parameter = Parameter::new("User_Agent", TypeTag::named::<crate::types::Header>());
        assert_eq!(
            component.identity(&parameter),
            "stark_core::types::header:user_agent"
        );
    }

    #[test]
    fn test_no_return_annotation_never_matches() {
        let resolver = Callable::builder("noop").sync(|_| Ok(Value::none()));
        let component = FnComponent::new(resolver);
        assert!(!component.can_handle_parameter(&Parameter::new("x", TypeTag::Empty)));
    }

    #[test]
    fn test_singleton_registration_rules() {
        let no_return = Callable::builder("noop").sync(|_| Ok(Value::none()));
        assert!(Singleton::new(no_return).is_err());
        assert!(Singleton::new(header_resolver()).is_err());
        assert!(Singleton::new(db_resolver()).is_ok());
    }

    #[test]
    fn test_first_registered_match_wins() {
        let mut components = Components::new();
        components.add_fn(db_resolver());
        components.add_singleton(db_resolver()).unwrap();

        let parameter = Parameter::new("db", TypeTag::named::<Db>());
        let (index, entry) = components.find(&parameter).unwrap();
        assert_eq!(index, 0);
        assert!(!entry.is_singleton());
        assert_eq!(components.len(), 2);
    }
}
