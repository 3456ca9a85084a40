#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Registry of named game actions and the shared query/execute pipeline.
//!
//! Every action is a pair of handlers: `query` predicts the outcome against a
//! shared borrow of the world and `execute` applies it. The registry always
//! runs `query` before `execute`, checks that the park can afford the
//! predicted cost, and books the cost after a successful execute, so handlers
//! only describe the change itself.

pub mod builtin;

use std::{
    collections::BTreeMap,
    panic::{catch_unwind, AssertUnwindSafe},
};

use parkscript_core::{
    ActionArgs, ActionStatus, GameActionResult, PermissionType, PluginId, ScriptError,
};
use parkscript_world::{query, World};
use tracing::{debug, info, warn};

type Validator = Box<dyn Fn(&ActionArgs) -> Result<(), ScriptError>>;
type QueryHandler = Box<dyn Fn(&World, &ActionArgs) -> GameActionResult>;
type ExecuteHandler = Box<dyn FnMut(&mut World, &ActionArgs) -> GameActionResult>;

/// Description of a game action supplied at registration.
pub struct GameActionDesc {
    id: String,
    permissions: Vec<PermissionType>,
    validate: Option<Validator>,
    query: QueryHandler,
    execute: ExecuteHandler,
}

impl GameActionDesc {
    /// Creates an action from its query and execute handlers.
    #[must_use]
    pub fn new<Q, E>(id: impl Into<String>, query: Q, execute: E) -> Self
    where
        Q: Fn(&World, &ActionArgs) -> GameActionResult + 'static,
        E: FnMut(&mut World, &ActionArgs) -> GameActionResult + 'static,
    {
        Self {
            id: id.into(),
            permissions: Vec::new(),
            validate: None,
            query: Box::new(query),
            execute: Box::new(execute),
        }
    }

    /// Adds a permission that grants access to the action.
    ///
    /// Holding any one of the listed permissions is sufficient.
    #[must_use]
    pub fn requires(mut self, permission: PermissionType) -> Self {
        if !self.permissions.contains(&permission) {
            self.permissions.push(permission);
        }
        self
    }

    /// Attaches a shape check run synchronously before a request is accepted.
    #[must_use]
    pub fn validated_by<V>(mut self, validate: V) -> Self
    where
        V: Fn(&ActionArgs) -> Result<(), ScriptError> + 'static,
    {
        self.validate = Some(Box::new(validate));
        self
    }

    /// Identifier scripts use to invoke the action.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Permissions that grant access; empty means unrestricted.
    #[must_use]
    pub fn permissions(&self) -> &[PermissionType] {
        &self.permissions
    }

    /// Runs the shape check, if the action has one.
    pub fn validate(&self, args: &ActionArgs) -> Result<(), ScriptError> {
        match &self.validate {
            Some(validate) => validate(args),
            None => Ok(()),
        }
    }

    fn run_query(&self, world: &World, args: &ActionArgs) -> GameActionResult {
        catch_unwind(AssertUnwindSafe(|| (self.query)(world, args)))
            .unwrap_or_else(|_| handler_panicked(&self.id, "query"))
    }

    fn run_execute(&mut self, world: &mut World, args: &ActionArgs) -> GameActionResult {
        let execute = &mut self.execute;
        catch_unwind(AssertUnwindSafe(|| execute(world, args)))
            .unwrap_or_else(|_| handler_panicked(&self.id, "execute"))
    }
}

impl std::fmt::Debug for GameActionDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameActionDesc")
            .field("id", &self.id)
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

fn handler_panicked(id: &str, phase: &str) -> GameActionResult {
    warn!(target: "actions", action = id, phase, "action handler panicked");
    GameActionResult::failure(
        ActionStatus::Unknown,
        "Action failed",
        format!("the {phase} handler of '{id}' panicked"),
    )
}

#[derive(Debug)]
struct RegisteredAction {
    desc: GameActionDesc,
    owner: Option<PluginId>,
}

/// Registry mapping action identifiers to their handlers.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, RegisteredAction>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with the built-in actions.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::install(&mut registry);
        registry
    }

    /// Registers an action, optionally on behalf of a plugin.
    pub fn register(
        &mut self,
        desc: GameActionDesc,
        owner: Option<PluginId>,
    ) -> Result<(), ScriptError> {
        if self.actions.contains_key(desc.id()) {
            return Err(ScriptError::AlreadyRegistered(desc.id().to_owned()));
        }
        info!(
            target: "actions",
            action = desc.id(),
            plugin = owner.map(|plugin| plugin.get()),
            "game action registered"
        );
        let _ = self
            .actions
            .insert(desc.id().to_owned(), RegisteredAction { desc, owner });
        Ok(())
    }

    /// Removes every action registered by `plugin` and returns their identifiers.
    pub fn unregister_plugin(&mut self, plugin: PluginId) -> Vec<String> {
        let removed: Vec<String> = self
            .actions
            .iter()
            .filter(|(_, action)| action.owner == Some(plugin))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &removed {
            let _ = self.actions.remove(id);
        }
        if !removed.is_empty() {
            debug!(
                target: "actions",
                plugin = plugin.get(),
                count = removed.len(),
                "plugin actions removed"
            );
        }
        removed
    }

    /// Looks up an action.
    pub fn get(&self, id: &str) -> Result<&GameActionDesc, ScriptError> {
        self.actions
            .get(id)
            .map(|action| &action.desc)
            .ok_or_else(|| ScriptError::UnknownAction(id.to_owned()))
    }

    /// Reports whether an action is registered under `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.actions.contains_key(id)
    }

    /// Registered identifiers in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Predicts the outcome of an action without touching the world.
    pub fn query(
        &self,
        world: &World,
        id: &str,
        args: &ActionArgs,
    ) -> Result<GameActionResult, ScriptError> {
        let desc = self.get(id)?;
        Ok(check_funds(world, desc.run_query(world, args)))
    }

    /// Runs an action against the world and books its cost.
    ///
    /// The world is only handed to the execute handler when the query phase
    /// succeeds and the park can afford the predicted cost.
    pub fn execute(
        &mut self,
        world: &mut World,
        id: &str,
        args: &ActionArgs,
    ) -> Result<GameActionResult, ScriptError> {
        let action = self
            .actions
            .get_mut(id)
            .ok_or_else(|| ScriptError::UnknownAction(id.to_owned()))?;
        let predicted = check_funds(world, action.desc.run_query(world, args));
        if !predicted.is_success() {
            return Ok(predicted);
        }
        let result = action.desc.run_execute(world, args);
        if result.is_success() && result.cost != 0 {
            world
                .park_mut()
                .spend(result.cost, result.expenditure_type);
        }
        Ok(result)
    }
}

fn check_funds(world: &World, result: GameActionResult) -> GameActionResult {
    if result.is_success() && !query::park(world).can_afford(result.cost) {
        let position = result.position;
        return GameActionResult::failure(
            ActionStatus::InsufficientFunds,
            "Not enough cash",
            format!(
                "this requires {} but the park has {}",
                result.cost,
                query::park(world).cash()
            ),
        )
        .at(position);
    }
    result
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use parkscript_core::{Coord3, ExpenditureType};

    fn priced(id: &str, cost: i64, executed: Rc<Cell<u32>>) -> GameActionDesc {
        GameActionDesc::new(
            id,
            move |_, _| {
                GameActionResult::success(Coord3::default(), cost, ExpenditureType::Marketing)
            },
            move |_, _| {
                executed.set(executed.get() + 1);
                GameActionResult::success(Coord3::default(), cost, ExpenditureType::Marketing)
            },
        )
    }

    #[test]
    fn duplicate_identifiers_are_rejected() {
        let mut registry = ActionRegistry::new();
        let counter = Rc::new(Cell::new(0));
        registry
            .register(priced("advertise", 10, counter.clone()), None)
            .expect("first registration");
        assert_eq!(
            registry.register(priced("advertise", 10, counter), None),
            Err(ScriptError::AlreadyRegistered("advertise".to_owned()))
        );
    }

    #[test]
    fn execute_books_cost_against_the_park() {
        let mut registry = ActionRegistry::new();
        let counter = Rc::new(Cell::new(0));
        registry
            .register(priced("advertise", 300, counter.clone()), None)
            .expect("registered");
        let mut world = World::new();
        let cash = query::park(&world).cash();

        let result = registry
            .execute(&mut world, "advertise", &ActionArgs::new())
            .expect("known action");

        assert!(result.is_success());
        assert_eq!(counter.get(), 1);
        assert_eq!(query::park(&world).cash(), cash - 300);
        assert_eq!(query::park(&world).spending(ExpenditureType::Marketing), 300);
    }

    #[test]
    fn unaffordable_actions_never_reach_execute() {
        let mut registry = ActionRegistry::new();
        let counter = Rc::new(Cell::new(0));
        registry
            .register(priced("statue", 1_000_000, counter.clone()), None)
            .expect("registered");
        let mut world = World::new();

        let queried = registry
            .query(&world, "statue", &ActionArgs::new())
            .expect("known action");
        let executed = registry
            .execute(&mut world, "statue", &ActionArgs::new())
            .expect("known action");

        assert_eq!(queried.error, "insufficient_funds");
        assert_eq!(executed, queried);
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn extreme_income_saturates_cash() {
        let mut registry = ActionRegistry::new();
        let counter = Rc::new(Cell::new(0));
        registry
            .register(priced("jackpot", i64::MIN, counter.clone()), None)
            .expect("registered");
        let mut world = World::new();

        for _ in 0..2 {
            let result = registry
                .execute(&mut world, "jackpot", &ActionArgs::new())
                .expect("known action");
            assert!(result.is_success());
        }

        assert_eq!(counter.get(), 2);
        assert_eq!(query::park(&world).cash(), i64::MAX);
        assert_eq!(
            query::park(&world).spending(ExpenditureType::Marketing),
            i64::MIN
        );
    }

    #[test]
    fn panicking_handler_yields_unknown_failure() {
        let mut registry = ActionRegistry::new();
        registry
            .register(
                GameActionDesc::new(
                    "explode",
                    |_, _| {
                        GameActionResult::success(Coord3::default(), 0, ExpenditureType::Research)
                    },
                    |_, _| panic!("boom"),
                ),
                None,
            )
            .expect("registered");
        let mut world = World::new();
        let result = registry
            .execute(&mut world, "explode", &ActionArgs::new())
            .expect("known action");
        assert_eq!(result.error, "unknown");
    }

    #[test]
    fn unloading_a_plugin_removes_only_its_actions() {
        let mut registry = ActionRegistry::with_builtins();
        let counter = Rc::new(Cell::new(0));
        let plugin = PluginId::new(3);
        registry
            .register(priced("plugin.one", 0, counter.clone()), Some(plugin))
            .expect("registered");
        registry
            .register(priced("plugin.two", 0, counter.clone()), Some(plugin))
            .expect("registered");
        registry
            .register(priced("other", 0, counter), Some(PluginId::new(4)))
            .expect("registered");

        let removed = registry.unregister_plugin(plugin);

        assert_eq!(removed, vec!["plugin.one".to_owned(), "plugin.two".to_owned()]);
        assert!(registry.contains("other"));
        assert!(registry.contains("ridedemolish"));
        assert!(matches!(
            registry.get("plugin.one"),
            Err(ScriptError::UnknownAction(_))
        ));
    }
}
