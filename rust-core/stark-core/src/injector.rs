//! # Dependency Resolver
//!
//! Turns a list of target callables into an ordered execution plan and runs
//! it against a per-request [`State`].
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Planning and execution only, components decide applicability
//! - **O**: New value sources are new components, the resolver is unchanged
//! - **D**: Depends on the `Component` abstraction through `Components`
//!
//! ## Planning
//!
//! Every parameter of a target is bound, in declaration order, to one of:
//!
//! 1. the `"return_value"` key, for the `ReturnValue` marker
//! 2. an initial key, when its type is one of the initial bindings
//! 3. the parent parameter, for the `Parameter` marker
//! 4. the identity of the first component able to handle it
//!
//! Component resolvers are planned depth-first before the step that needs
//! them, using an explicit frame stack. Identities currently being planned
//! are tracked so that a component depending on itself is reported as a
//! `CircularDependency` error.
//!
//! Plans are cached per sequence of callable identities. A plan that resolves
//! a cold singleton is never cached: once the singleton value is known the
//! next plan binds it as a constant instead.
//!
//! Each singleton slot is filled at most once. Concurrent runs that reach a
//! cold slot wait for the first resolution instead of repeating it.

use crate::callable::{Callable, CallableId, Parameter};
use crate::component::Components;
use crate::error::{Error, Result};
use crate::state::{Args, State, Value};
use crate::types::TypeTag;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::OnceCell;

/// State key holding the most recent target's result
pub const RETURN_VALUE: &str = "return_value";

/// State key set by a step whose plan must not stay cached
pub const NO_CACHE_KEY: &str = "__no_cache__";

/// One call in an execution plan
#[derive(Debug, Clone)]
pub struct Step {
    /// Callable to invoke
    pub func: Callable,
    /// Whether the callable suspends
    pub is_async: bool,
    /// Argument name to state key
    pub bindings: Vec<(String, String)>,
    /// Argument name to constant value
    pub constants: Vec<(String, Value)>,
    /// State key receiving the result
    pub output: String,
    /// Whether the result also becomes the return value
    pub set_return: bool,
    /// Singleton slot filled by this step
    pub memoize: Option<usize>,
}

impl Step {
    fn arguments(&self, state: &State) -> Result<Args> {
        let mut args = Args::new();
        for (name, key) in &self.bindings {
            let value = state.get(key).ok_or_else(|| Error::MissingState { key: key.clone() })?;
            args.insert(name.clone(), value.clone());
        }
        for (name, value) in &self.constants {
            args.insert(name.clone(), value.clone());
        }
        Ok(args)
    }
}

/// Once-filled storage for one singleton component
#[derive(Default)]
struct SingletonSlot {
    value: OnceCell<Value>,
    init: Mutex<()>,
}

/// Ordered steps for a sequence of target callables
#[derive(Debug, Clone)]
pub struct Plan {
    steps: Vec<Step>,
    cacheable: bool,
}

impl Plan {
    /// Steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether the plan may be reused by later runs
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }
}

struct Frame {
    func: Callable,
    output: String,
    parent: Option<Parameter>,
    singleton: Option<usize>,
    set_return: bool,
    in_flight: bool,
    next: usize,
    bindings: Vec<(String, String)>,
    constants: Vec<(String, Value)>,
}

impl Frame {
    fn new(func: Callable, output: String, parent: Option<Parameter>, set_return: bool) -> Self {
        Self {
            func,
            output,
            parent,
            singleton: None,
            set_return,
            in_flight: false,
            next: 0,
            bindings: Vec::new(),
            constants: Vec::new(),
        }
    }

    fn next_parameter(&mut self) -> Option<Parameter> {
        let parameter = self.func.parameters().get(self.next).cloned();
        self.next += 1;
        parameter
    }
}

/// Dependency-injection resolver
///
/// Owns the component registry, the initial bindings and the plan and
/// singleton caches. Shareable across threads; cache mutation happens under
/// a write lock and plans are executed without holding any lock.
pub struct Resolver {
    components: Components,
    initial: Vec<(String, TypeTag)>,
    reverse_initial: HashMap<TypeTag, String>,
    allow_async: bool,
    plans: RwLock<HashMap<Vec<CallableId>, Arc<Plan>>>,
    singletons: RwLock<HashMap<usize, Arc<SingletonSlot>>>,
}

impl Resolver {
    /// Create a synchronous resolver
    pub fn new<K: Into<String>>(
        components: Components,
        initial: impl IntoIterator<Item = (K, TypeTag)>,
    ) -> Self {
        Self::build(components, initial, false)
    }

    /// Create a resolver that accepts asynchronous callables
    pub fn new_async<K: Into<String>>(
        components: Components,
        initial: impl IntoIterator<Item = (K, TypeTag)>,
    ) -> Self {
        Self::build(components, initial, true)
    }

    fn build<K: Into<String>>(
        components: Components,
        initial: impl IntoIterator<Item = (K, TypeTag)>,
        allow_async: bool,
    ) -> Self {
        let initial: Vec<(String, TypeTag)> =
            initial.into_iter().map(|(k, t)| (k.into(), t)).collect();
        let reverse_initial = initial
            .iter()
            .map(|(key, tag)| (tag.clone(), key.clone()))
            .collect();
        Self {
            components,
            initial,
            reverse_initial,
            allow_async,
            plans: RwLock::new(HashMap::new()),
            singletons: RwLock::new(HashMap::new()),
        }
    }

    /// Registered components
    #[must_use]
    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Initial bindings as (key, type) pairs
    #[must_use]
    pub fn initial(&self) -> &[(String, TypeTag)] {
        &self.initial
    }

    /// Initial key bound to a type, if any
    #[must_use]
    pub fn initial_key(&self, tag: &TypeTag) -> Option<&str> {
        self.reverse_initial.get(tag).map(String::as_str)
    }

    /// Whether asynchronous callables are accepted
    #[must_use]
    pub fn allows_async(&self) -> bool {
        self.allow_async
    }

    /// Plan the steps computing `func` and everything it needs
    ///
    /// `seen` holds the state keys already planned (or present) and is
    /// extended in place. Returns the steps and whether they may be cached.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for an unhandled parameter, a misused
    /// `Parameter` marker or an async callable in a sync resolver, and
    /// `Error::CircularDependency` when a component needs its own identity.
    pub fn resolve_function(
        &self,
        func: &Callable,
        seen: &mut HashSet<String>,
        output_name: Option<String>,
        parent: Option<Parameter>,
        set_return: bool,
    ) -> Result<(Vec<Step>, bool)> {
        let output = output_name.unwrap_or_else(|| self.output_name(func));
        let mut stack = vec![Frame::new(func.clone(), output, parent, set_return)];
        let mut in_flight: Vec<String> = Vec::new();
        let mut steps = Vec::new();
        let mut cacheable = true;

        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };
            let Some(parameter) = frame.next_parameter() else {
                let done = stack.pop().ok_or_else(|| Error::configuration("empty frame stack"))?;
                if done.in_flight {
                    in_flight.pop();
                }
                steps.push(self.finish_frame(done)?);
                continue;
            };

            if let Some(child) =
                self.bind_parameter(frame, parameter, seen, &mut in_flight, &mut cacheable)?
            {
                stack.push(child);
            }
        }

        Ok((steps, cacheable))
    }

    fn bind_parameter(
        &self,
        frame: &mut Frame,
        parameter: Parameter,
        seen: &mut HashSet<String>,
        in_flight: &mut Vec<String>,
        cacheable: &mut bool,
    ) -> Result<Option<Frame>> {
        let name = parameter.name.clone();

        if parameter.annotation == TypeTag::ReturnValue {
            frame.bindings.push((name, RETURN_VALUE.to_string()));
            return Ok(None);
        }

        if let Some(key) = self.reverse_initial.get(&parameter.annotation) {
            frame.bindings.push((name, key.clone()));
            return Ok(None);
        }

        if parameter.annotation == TypeTag::Parameter {
            if frame.singleton.is_some() {
                return Err(Error::configuration(format!(
                    "Singleton component \"{}\" cannot depend on Parameter.",
                    frame.func.name()
                )));
            }
            let parent = frame.parent.clone().ok_or_else(|| {
                Error::configuration(format!(
                    "Function \"{}\" asks for its Parameter but is not resolving one.",
                    frame.func.name()
                ))
            })?;
            frame.constants.push((name, Value::new(parent)));
            return Ok(None);
        }

        let Some((index, entry)) = self.components.find(&parameter) else {
            return Err(Error::configuration(format!(
                "No component able to handle parameter \"{}\" on function \"{}\".",
                parameter.name,
                frame.func.name()
            )));
        };

        if entry.is_singleton() {
            if let Some(instance) = self.singleton(index) {
                frame.constants.push((name, instance));
                return Ok(None);
            }
        }

        let identity = entry.identity(&parameter);
        if self.initial.iter().any(|(key, _)| *key == identity) {
            return Err(Error::configuration(format!(
                "Component identity \"{identity}\" for parameter \"{}\" on function \"{}\" collides with an initial binding.",
                parameter.name,
                frame.func.name()
            )));
        }
        if let Some(position) = in_flight.iter().position(|i| *i == identity) {
            let mut cycle = in_flight[position..].to_vec();
            cycle.push(identity);
            return Err(Error::CircularDependency { cycle });
        }

        frame.bindings.push((name, identity.clone()));
        if !seen.insert(identity.clone()) {
            return Ok(None);
        }

        let mut child = Frame::new(
            entry.resolver().clone(),
            identity.clone(),
            Some(parameter),
            false,
        );
        if entry.is_singleton() {
            child.singleton = Some(index);
            *cacheable = false;
        }
        child.in_flight = true;
        in_flight.push(identity);
        Ok(Some(child))
    }

    fn finish_frame(&self, frame: Frame) -> Result<Step> {
        let is_async = frame.func.is_async();
        if is_async && !self.allow_async {
            return Err(Error::configuration(format!(
                "Function \"{}\" may not be async.",
                frame.func.name()
            )));
        }
        Ok(Step {
            func: frame.func,
            is_async,
            bindings: frame.bindings,
            constants: frame.constants,
            output: frame.output,
            set_return: frame.set_return,
            memoize: frame.singleton,
        })
    }

    fn output_name(&self, func: &Callable) -> String {
        self.reverse_initial
            .get(func.returns())
            .cloned()
            .unwrap_or_else(|| RETURN_VALUE.to_string())
    }

    /// Plan a sequence of targets against a seeded state
    ///
    /// # Errors
    ///
    /// Propagates planning errors from [`Resolver::resolve_function`].
    pub fn resolve_functions(&self, funcs: &[Callable], state: &State) -> Result<Plan> {
        let mut seen: HashSet<String> = self
            .initial
            .iter()
            .map(|(key, _)| key.clone())
            .chain(state.keys().map(ToString::to_string))
            .collect();
        let mut steps = Vec::new();
        let mut cacheable = true;
        for func in funcs {
            let (func_steps, func_cacheable) =
                self.resolve_function(func, &mut seen, None, None, true)?;
            steps.extend(func_steps);
            cacheable &= func_cacheable;
        }
        Ok(Plan { steps, cacheable })
    }

    /// Cached plan for a sequence of targets, if any
    #[must_use]
    pub fn cached_plan(&self, funcs: &[Callable]) -> Option<Arc<Plan>> {
        let key = plan_key(funcs);
        self.plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Look up or build the plan for `funcs`
    ///
    /// # Errors
    ///
    /// Propagates planning errors.
    pub fn plan(&self, funcs: &[Callable], state: &State, cache: bool) -> Result<Arc<Plan>> {
        if cache {
            if let Some(plan) = self.cached_plan(funcs) {
                return Ok(plan);
            }
        }
        let plan = Arc::new(self.resolve_functions(funcs, state)?);
        if cache && plan.cacheable {
            self.plans
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(plan_key(funcs), Arc::clone(&plan));
        }
        Ok(plan)
    }

    /// Run targets synchronously with plan caching
    ///
    /// Returns `None` for an empty target list, otherwise the value stored
    /// by the last step.
    ///
    /// # Errors
    ///
    /// Propagates planning errors and any error raised by a step. State is
    /// left as far as execution reached.
    pub fn run(&self, funcs: &[Callable], state: &mut State) -> Result<Option<Value>> {
        self.run_with(funcs, state, true)
    }

    /// Run targets synchronously, optionally bypassing the plan cache
    ///
    /// # Errors
    ///
    /// See [`Resolver::run`]. An asynchronous step fails with
    /// `Error::Configuration`.
    pub fn run_with(&self, funcs: &[Callable], state: &mut State, cache: bool) -> Result<Option<Value>> {
        if funcs.is_empty() {
            return Ok(None);
        }
        let plan = self.plan(funcs, state, cache)?;
        for step in plan.steps() {
            let value = match step.memoize {
                Some(index) => self.resolve_singleton(index, step, state)?,
                None => step.func.call(step.arguments(state)?)?,
            };
            Self::store(step, state, value);
        }
        self.complete(funcs, &plan, state)
    }

    /// Run targets, awaiting asynchronous steps
    ///
    /// # Errors
    ///
    /// See [`Resolver::run`].
    pub async fn run_async(&self, funcs: &[Callable], state: &mut State) -> Result<Option<Value>> {
        if funcs.is_empty() {
            return Ok(None);
        }
        let plan = self.plan(funcs, state, true)?;
        for step in plan.steps() {
            let value = match step.memoize {
                Some(index) if step.is_async => {
                    let slot = self.slot(index);
                    let args = step.arguments(state)?;
                    slot.value
                        .get_or_try_init(|| step.func.call_async(args))
                        .await?
                        .clone()
                }
                Some(index) => self.resolve_singleton(index, step, state)?,
                None if step.is_async => step.func.call_async(step.arguments(state)?).await?,
                None => step.func.call(step.arguments(state)?)?,
            };
            Self::store(step, state, value);
        }
        self.complete(funcs, &plan, state)
    }

    fn slot(&self, index: usize) -> Arc<SingletonSlot> {
        if let Some(slot) = self
            .singletons
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&index)
        {
            return Arc::clone(slot);
        }
        let mut singletons = self.singletons.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(singletons.entry(index).or_default())
    }

    /// Resolve a synchronous singleton step, holding the slot's init lock
    fn resolve_singleton(&self, index: usize, step: &Step, state: &State) -> Result<Value> {
        let slot = self.slot(index);
        if let Some(value) = slot.value.get() {
            return Ok(value.clone());
        }
        let _init = slot.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = slot.value.get() {
            return Ok(value.clone());
        }
        let value = step.func.call(step.arguments(state)?)?;
        let _ = slot.value.set(value.clone());
        Ok(slot.value.get().cloned().unwrap_or(value))
    }

    fn store(step: &Step, state: &mut State, value: Value) {
        if step.memoize.is_some() {
            state.insert(NO_CACHE_KEY, Value::none());
        }
        if step.set_return {
            state.insert(RETURN_VALUE, value.clone());
        }
        state.insert(step.output.clone(), value);
    }

    fn complete(&self, funcs: &[Callable], plan: &Plan, state: &mut State) -> Result<Option<Value>> {
        if state.remove(NO_CACHE_KEY).is_some() {
            self.plans
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&plan_key(funcs));
        }
        let Some(last) = plan.steps.last() else {
            return Ok(None);
        };
        state
            .get(&last.output)
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::MissingState {
                key: last.output.clone(),
            })
    }

    /// Cached singleton value for a registry index
    #[must_use]
    pub fn singleton(&self, index: usize) -> Option<Value> {
        self.singletons
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&index)
            .and_then(|slot| slot.value.get().cloned())
    }

    /// Parameters validated on behalf of `handler` by the components it uses
    ///
    /// Walks the component graph breadth-first from the handler's own
    /// parameters, visiting each identity once. Unhandled parameters are
    /// skipped here and reported when the handler is planned.
    #[must_use]
    pub fn validation_parameters(&self, handler: &Callable) -> Vec<Parameter> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<Parameter> = handler.parameters().iter().cloned().collect();
        while let Some(parameter) = queue.pop_front() {
            if matches!(parameter.annotation, TypeTag::ReturnValue | TypeTag::Parameter)
                || self.reverse_initial.contains_key(&parameter.annotation)
            {
                continue;
            }
            let Some((_, entry)) = self.components.find(&parameter) else {
                continue;
            };
            if !visited.insert(entry.identity(&parameter)) {
                continue;
            }
            found.extend(entry.validation_parameters(handler, &parameter));
            queue.extend(entry.resolver().parameters().iter().cloned());
        }
        found
    }
}

fn plan_key(funcs: &[Callable]) -> Vec<CallableId> {
    funcs.iter().map(Callable::id).collect()
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("components", &self.components)
            .field("initial", &self.initial)
            .field("allow_async", &self.allow_async)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::types::{impl_named, Annotated, ReturnValue};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, PartialEq)]
    struct Request(String);
    #[derive(Clone)]
    struct Session(String);
    #[derive(Clone)]
    struct User(String);
    #[derive(Clone)]
    struct Config(u32);
    #[derive(Clone)]
    struct Loop;

    impl_named!(Request, Session, User, Config, Loop);

    fn key<T: 'static>() -> String {
        std::any::type_name::<T>().to_lowercase()
    }

    fn initial() -> Vec<(&'static str, TypeTag)> {
        vec![("request", Request::annotation())]
    }

    fn session() -> Callable {
        Callable::builder("session")
            .param::<Request>("request")
            .returns::<Session>()
            .sync(|args| {
                let request: Request = args.get("request")?;
                Ok(Value::new(Session(format!("session:{}", request.0))))
            })
    }

    fn user() -> Callable {
        Callable::builder("user")
            .param::<Session>("session")
            .returns::<User>()
            .sync(|args| {
                let session: Session = args.get("session")?;
                Ok(Value::new(User(format!("user:{}", session.0))))
            })
    }

    fn whoami() -> Callable {
        Callable::builder("whoami")
            .param::<User>("user")
            .returns::<String>()
            .sync(|args| Ok(Value::new(args.get::<User>("user")?.0)))
    }

    fn resolver() -> Resolver {
        let mut components = Components::new();
        components.add_fn(user()).add_fn(session());
        Resolver::new(components, initial())
    }

    fn seeded() -> State {
        let mut state = State::new();
        state.set("request", Request("r1".to_string()));
        state
    }

    #[test]
    fn test_zero_parameter_function_is_one_step() {
        let resolver = resolver();
        let func = Callable::builder("ping").sync(|_| Ok(Value::new("pong".to_string())));
        let plan = resolver.resolve_functions(&[func], &State::new()).unwrap();
        assert_eq!(plan.steps().len(), 1);
        assert!(plan.steps()[0].bindings.is_empty());
        assert!(plan.steps()[0].constants.is_empty());
        assert_eq!(plan.steps()[0].output, RETURN_VALUE);
    }

    #[test]
    fn test_chain_is_planned_in_dependency_order() {
        let resolver = resolver();
        let plan = resolver.resolve_functions(&[whoami()], &seeded()).unwrap();
        let names: Vec<&str> = plan.steps().iter().map(|s| s.func.name()).collect();
        assert_eq!(names, vec!["session", "user", "whoami"]);

        let mut produced: HashSet<String> = ["request".to_string()].into();
        for step in plan.steps() {
            for (_, key) in &step.bindings {
                assert!(produced.contains(key), "{key} used before produced");
            }
            produced.insert(step.output.clone());
        }
        assert!(plan.steps()[2].set_return);
        assert!(!plan.steps()[0].set_return);
    }

    #[test]
    fn test_run_returns_last_output() {
        let resolver = resolver();
        let mut state = seeded();
        let value = resolver.run(&[whoami()], &mut state).unwrap().unwrap();
        assert_eq!(value.extract::<String>().unwrap(), "user:session:r1");
        assert!(state.contains(&key::<Session>()));
        assert!(state.contains(RETURN_VALUE));
    }

    #[test]
    fn test_empty_funcs_is_noop() {
        let mut state = State::new();
        assert!(resolver().run(&[], &mut state).unwrap().is_none());
        assert!(state.is_empty());
    }

    #[test]
    fn test_plan_cache_hit() {
        let resolver = resolver();
        let funcs = [whoami()];

        let mut first = seeded();
        resolver.run(&funcs, &mut first).unwrap();
        let cached = resolver.cached_plan(&funcs).unwrap();

        let mut second = State::new();
        second.set("request", Request("r2".to_string()));
        let value = resolver.run(&funcs, &mut second).unwrap().unwrap();
        assert_eq!(value.extract::<String>().unwrap(), "user:session:r2");
        assert!(Arc::ptr_eq(&cached, &resolver.cached_plan(&funcs).unwrap()));
    }

    #[test]
    fn test_run_without_cache_does_not_store_plan() {
        let resolver = resolver();
        let funcs = [whoami()];
        resolver.run_with(&funcs, &mut seeded(), false).unwrap();
        assert!(resolver.cached_plan(&funcs).is_none());
    }

    #[test]
    fn test_singleton_resolved_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let config = Callable::builder("config")
            .returns::<Config>()
            .sync(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::new(Config(7)))
            });
        let mut components = Components::new();
        components.add_singleton(config).unwrap();
        let resolver = Resolver::new(components, initial());

        let handler = Callable::builder("handler")
            .param::<Config>("config")
            .returns::<u32>()
            .sync(|args| Ok(Value::new(args.get::<Config>("config")?.0)));
        let funcs = [handler];

        let first = resolver.run(&funcs, &mut State::new()).unwrap().unwrap();
        assert_eq!(first.extract::<u32>(), Some(7));
        assert!(resolver.cached_plan(&funcs).is_none());

        let second = resolver.run(&funcs, &mut State::new()).unwrap().unwrap();
        assert_eq!(second.extract::<u32>(), Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let plan = resolver.cached_plan(&funcs).unwrap();
        assert_eq!(plan.steps().len(), 1);
        assert_eq!(plan.steps()[0].constants.len(), 1);
    }

    #[test]
    fn test_unhandled_parameter_is_configuration_error() {
        let func = Callable::builder("needs_loop")
            .param::<Loop>("event_loop")
            .sync(|_| Ok(Value::none()));
        let err = resolver().resolve_functions(&[func], &State::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: No component able to handle parameter \"event_loop\" on function \"needs_loop\"."
        );
    }

    #[test]
    fn test_async_rejected_by_sync_resolver() {
        let func = Callable::builder("later").asynchronous(|_| async { Ok(Value::none()) });
        let err = resolver().resolve_functions(&[func], &State::new()).unwrap_err();
        assert!(err.to_string().contains("Function \"later\" may not be async."));
    }

    #[test]
    fn test_cycle_is_reported() {
        let a = Callable::builder("make_session")
            .param::<User>("user")
            .returns::<Session>()
            .sync(|_| Ok(Value::new(Session(String::new()))));
        let b = Callable::builder("make_user")
            .param::<Session>("session")
            .returns::<User>()
            .sync(|_| Ok(Value::new(User(String::new()))));
        let mut components = Components::new();
        components.add_fn(a).add_fn(b);
        let resolver = Resolver::new(components, initial());

        let err = resolver.resolve_functions(&[whoami()], &State::new()).unwrap_err();
        match err {
            Error::CircularDependency { cycle } => {
                assert_eq!(cycle, vec![key::<User>(), key::<Session>(), key::<User>()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_return_annotation_overrides_initial_key() {
        let resolver = resolver();
        let rewrite = Callable::builder("rewrite")
            .param::<Request>("request")
            .returns::<Request>()
            .sync(|args| {
                let request: Request = args.get("request")?;
                Ok(Value::new(Request(format!("{}!", request.0))))
            });
        let mut state = seeded();
        resolver.run(&[rewrite, whoami()], &mut state).unwrap();
        assert_eq!(state.get_as::<Request>("request"), Some(Request("r1!".to_string())));
        assert_eq!(state.get_as::<String>(RETURN_VALUE), Some("user:session:r1!".to_string()));
    }

    #[test]
    fn test_return_value_marker_reads_previous_result() {
        let resolver = resolver();
        let shout = Callable::builder("shout")
            .param::<ReturnValue>("value")
            .returns::<String>()
            .sync(|args| {
                let previous: ReturnValue = args.get("value")?;
                let text = previous.0.extract::<String>().unwrap_or_default();
                Ok(Value::new(text.to_uppercase()))
            });
        let value = resolver.run(&[whoami(), shout], &mut seeded()).unwrap().unwrap();
        assert_eq!(value.extract::<String>().unwrap(), "USER:SESSION:R1");
    }

    struct NamedLookup {
        resolver: Callable,
    }

    impl Component for NamedLookup {
        fn resolver(&self) -> &Callable {
            &self.resolver
        }

        fn can_handle_parameter(&self, parameter: &Parameter) -> bool {
            parameter.annotation == TypeTag::Str
        }
    }

    #[test]
    fn test_parameter_marker_receives_parent() {
        let lookup = Callable::builder("lookup")
            .param::<Parameter>("parameter")
            .returns::<String>()
            .sync(|args| Ok(Value::new(args.get::<Parameter>("parameter")?.name)));
        let mut components = Components::new();
        components.add(NamedLookup { resolver: lookup });
        let resolver = Resolver::new(components, initial());

        let handler = Callable::builder("pair")
            .param::<String>("first")
            .param::<String>("second")
            .returns::<String>()
            .sync(|args| {
                let first: String = args.get("first")?;
                let second: String = args.get("second")?;
                Ok(Value::new(format!("{first}+{second}")))
            });
        let value = resolver.run(&[handler], &mut State::new()).unwrap().unwrap();
        assert_eq!(value.extract::<String>().unwrap(), "first+second");
    }

    #[test]
    fn test_parameter_marker_without_parent_fails() {
        let func = Callable::builder("orphan")
            .param::<Parameter>("parameter")
            .sync(|_| Ok(Value::none()));
        assert!(resolver().resolve_functions(&[func], &State::new()).is_err());
    }

    #[test]
    fn test_step_error_propagates_and_keeps_state() {
        let failing = Callable::builder("failing")
            .param::<Session>("session")
            .sync(|_| Err(Error::configuration("boom")));
        let mut state = seeded();
        let err = resolver().run(&[failing], &mut state).unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(state.contains(&key::<Session>()));
        assert!(!state.contains(RETURN_VALUE));
    }

    #[tokio::test]
    async fn test_run_async_awaits_async_steps() {
        let mut components = Components::new();
        components.add_fn(session());
        let resolver = Resolver::new_async(components, initial());
        let handler = Callable::builder("handler")
            .param::<Session>("session")
            .returns::<String>()
            .asynchronous(|args| async move {
                let session: Session = args.get("session")?;
                tokio::task::yield_now().await;
                Ok(Value::new(session.0))
            });
        let value = resolver
            .run_async(&[handler], &mut seeded())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value.extract::<String>().unwrap(), "session:r1");
    }

    #[derive(Clone)]
    struct Repo<T>(&'static str, std::marker::PhantomData<T>);
    #[derive(Clone)]
    struct Users;
    #[derive(Clone)]
    struct Orders;

    impl<T: Clone + Send + Sync + 'static> Annotated for Repo<T> {
        fn annotation() -> TypeTag {
            TypeTag::named::<Self>()
        }
    }

    fn repo<T: Clone + Send + Sync + 'static>(table: &'static str) -> Callable {
        Callable::builder(table)
            .returns::<Repo<T>>()
            .sync(move |_| Ok(Value::new(Repo::<T>(table, std::marker::PhantomData))))
    }

    #[test]
    fn test_generic_components_get_distinct_identities() {
        let mut components = Components::new();
        components.add_fn(repo::<Users>("users")).add_fn(repo::<Orders>("orders"));
        let resolver = Resolver::new(components, initial());
        let handler = Callable::builder("tables")
            .param::<Repo<Users>>("users")
            .param::<Repo<Orders>>("orders")
            .returns::<String>()
            .sync(|args| {
                let users: Repo<Users> = args.get("users")?;
                let orders: Repo<Orders> = args.get("orders")?;
                Ok(Value::new(format!("{}+{}", users.0, orders.0)))
            });

        let plan = resolver.resolve_functions(&[handler.clone()], &State::new()).unwrap();
        let names: Vec<&str> = plan.steps().iter().map(|s| s.func.name()).collect();
        assert_eq!(names, vec!["users", "orders", "tables"]);

        let value = resolver.run(&[handler], &mut State::new()).unwrap().unwrap();
        assert_eq!(value.extract::<String>().unwrap(), "users+orders");
    }

    struct Shadowing {
        resolver: Callable,
    }

    impl Component for Shadowing {
        fn resolver(&self) -> &Callable {
            &self.resolver
        }

        fn identity(&self, _parameter: &Parameter) -> String {
            "request".to_string()
        }
    }

    #[test]
    fn test_identity_equal_to_initial_key_is_rejected() {
        let mut components = Components::new();
        components.add(Shadowing {
            resolver: Callable::builder("make_config")
                .returns::<Config>()
                .sync(|_| Ok(Value::new(Config(1)))),
        });
        let resolver = Resolver::new(components, initial());
        let handler = Callable::builder("handler")
            .param::<Config>("config")
            .sync(|_| Ok(Value::none()));
        let err = resolver.resolve_functions(&[handler], &State::new()).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("collides with an initial binding"));
    }

    #[test]
    fn test_concurrent_cold_singleton_resolved_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let config = Callable::builder("config")
            .returns::<Config>()
            .sync(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(50));
                Ok(Value::new(Config(9)))
            });
        let mut components = Components::new();
        components.add_singleton(config).unwrap();
        let resolver = Resolver::new(components, initial());
        let handler = Callable::builder("handler")
            .param::<Config>("config")
            .returns::<u32>()
            .sync(|args| Ok(Value::new(args.get::<Config>("config")?.0)));

        let barrier = std::sync::Barrier::new(4);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    barrier.wait();
                    let value = resolver.run(&[handler.clone()], &mut State::new()).unwrap().unwrap();
                    assert_eq!(value.extract::<u32>(), Some(9));
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_singleton_resolved_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let config = Callable::builder("config")
            .returns::<Config>()
            .asynchronous(move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    Ok(Value::new(Config(3)))
                }
            });
        let mut components = Components::new();
        components.add_singleton(config).unwrap();
        let resolver = Resolver::new_async(components, initial());
        let handler = Callable::builder("handler")
            .param::<Config>("config")
            .returns::<u32>()
            .sync(|args| Ok(Value::new(args.get::<Config>("config")?.0)));
        let funcs = [handler];

        let mut state_a = State::new();
        let mut state_b = State::new();
        let (first, second) = tokio::join!(
            resolver.run_async(&funcs, &mut state_a),
            resolver.run_async(&funcs, &mut state_b)
        );
        assert_eq!(first.unwrap().unwrap().extract::<u32>(), Some(3));
        assert_eq!(second.unwrap().unwrap().extract::<u32>(), Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
