//! Resource kinds and their lifecycle
//!
//! A [`ResourceKind`] is implemented once per remote object type with typed
//! configuration and state. The planner and executor work on the erased
//! [`DynKind`] view, which moves values through JSON so that kinds with
//! different types can live in one [`Registry`].

use crate::schema::Schema;
use crate::types::{ReadOutcome, Record};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Typed lifecycle of one resource kind
///
/// `Config` holds the declarable attributes, `State` the full observed
/// attribute set. Each call reconciles a single instance and performs
/// blocking I/O; implementations must not share mutable state across
/// instances.
///
/// # Example
///
/// ```ignore
/// impl ResourceKind for BranchKind {
///     type Config = BranchConfig;
///     type State = BranchState;
///
///     fn type_name(&self) -> &'static str { "gitlab_branch" }
///     fn schema(&self) -> Schema { branch_schema() }
///     fn id(&self, state: &BranchState) -> String { state.id.clone() }
///     fn declared(&self, state: &BranchState) -> BranchConfig { state.declared() }
///     fn create(&self, config: &BranchConfig) -> Result<BranchState> { ... }
///     fn read(&self, id: &str, prior: Option<&BranchState>) -> Result<ReadOutcome<BranchState>> { ... }
///     fn delete(&self, state: &BranchState) -> Result<()> { ... }
/// }
/// ```
pub trait ResourceKind: Send + Sync {
    type Config: Serialize + DeserializeOwned + Clone + fmt::Debug;
    type State: Serialize + DeserializeOwned + Clone + fmt::Debug;

    /// Resource type name, e.g. `gitlab_group`
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Remote identifier recorded for an instance
    fn id(&self, state: &Self::State) -> String;

    /// Fill in provider-level defaults the attribute types cannot express
    fn normalize(&self, config: Self::Config) -> Self::Config {
        config
    }

    /// Project observed state back onto the declarable attributes
    ///
    /// Attributes that cannot be observed are projected as `None` and are
    /// not treated as drift.
    fn declared(&self, state: &Self::State) -> Self::Config;

    /// Create the instance and return its state as read back afterwards
    fn create(&self, config: &Self::Config) -> Result<Self::State>;

    /// Read the instance identified by `id`
    ///
    /// Returns [`ReadOutcome::Missing`] when the remote side reports it
    /// absent. `prior` carries attributes that cannot be observed remotely.
    fn read(&self, id: &str, prior: Option<&Self::State>) -> Result<ReadOutcome<Self::State>>;

    /// Update the listed attributes in place
    fn update(
        &self,
        state: &Self::State,
        config: &Self::Config,
        changed: &[String],
    ) -> Result<Self::State> {
        let _ = (state, config);
        anyhow::bail!(
            "{} does not support in-place updates (changed: {})",
            ResourceKind::type_name(self),
            changed.join(", ")
        )
    }

    fn delete(&self, state: &Self::State) -> Result<()>;

    /// Adopt an existing remote instance by identifier
    fn import(&self, id: &str) -> Result<Self::State> {
        match ResourceKind::read(self, id, None)? {
            ReadOutcome::Found(state) => Ok(state),
            ReadOutcome::Missing => anyhow::bail!(
                "cannot import {} {id}: it does not exist",
                ResourceKind::type_name(self)
            ),
        }
    }
}

/// Type-erased view of a [`ResourceKind`]
pub trait DynKind: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Validate declared attributes and fill defaults
    fn normalize(&self, config: &Value) -> Result<Value>;

    /// Declarable projection of recorded attributes
    fn declared(&self, attributes: &Value) -> Result<Value>;

    fn create(&self, config: &Value) -> Result<Record>;

    fn read(&self, record: &Record) -> Result<ReadOutcome<Record>>;

    fn update(&self, record: &Record, config: &Value, changed: &[String]) -> Result<Record>;

    fn delete(&self, record: &Record) -> Result<()>;

    fn import(&self, id: &str) -> Result<Record>;
}

fn to_record<K: ResourceKind + ?Sized>(kind: &K, state: &K::State) -> Result<Record> {
    Ok(Record {
        id: ResourceKind::id(kind, state),
        attributes: serde_json::to_value(state)
            .with_context(|| format!("Failed to encode {} state", ResourceKind::type_name(kind)))?,
    })
}

fn config_of<K: ResourceKind + ?Sized>(kind: &K, config: &Value) -> Result<K::Config> {
    serde_json::from_value(config.clone())
        .with_context(|| format!("Invalid {} attributes", ResourceKind::type_name(kind)))
}

fn state_of<K: ResourceKind + ?Sized>(kind: &K, attributes: &Value) -> Result<K::State> {
    serde_json::from_value(attributes.clone())
        .with_context(|| format!("Corrupt {} state", ResourceKind::type_name(kind)))
}

impl<K: ResourceKind> DynKind for K {
    fn type_name(&self) -> &'static str {
        ResourceKind::type_name(self)
    }

    fn schema(&self) -> Schema {
        ResourceKind::schema(self)
    }

    fn normalize(&self, config: &Value) -> Result<Value> {
        let typed = ResourceKind::normalize(self, config_of(self, config)?);
        Ok(serde_json::to_value(typed)?)
    }

    fn declared(&self, attributes: &Value) -> Result<Value> {
        let state = state_of(self, attributes)?;
        Ok(serde_json::to_value(ResourceKind::declared(self, &state))?)
    }

    fn create(&self, config: &Value) -> Result<Record> {
        let state = ResourceKind::create(self, &config_of(self, config)?)?;
        to_record(self, &state)
    }

    fn read(&self, record: &Record) -> Result<ReadOutcome<Record>> {
        let prior = state_of(self, &record.attributes)?;
        match ResourceKind::read(self, &record.id, Some(&prior))? {
            ReadOutcome::Found(state) => Ok(ReadOutcome::Found(to_record(self, &state)?)),
            ReadOutcome::Missing => Ok(ReadOutcome::Missing),
        }
    }

    fn update(&self, record: &Record, config: &Value, changed: &[String]) -> Result<Record> {
        let state = state_of(self, &record.attributes)?;
        let updated = ResourceKind::update(self, &state, &config_of(self, config)?, changed)?;
        to_record(self, &updated)
    }

    fn delete(&self, record: &Record) -> Result<()> {
        ResourceKind::delete(self, &state_of(self, &record.attributes)?)
    }

    fn import(&self, id: &str) -> Result<Record> {
        let state = ResourceKind::import(self, id)?;
        to_record(self, &state)
    }
}

/// Resource kinds known to a provider, keyed by type name
#[derive(Clone, Default)]
pub struct Registry {
    kinds: BTreeMap<&'static str, Arc<dyn DynKind>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind, replacing any previous kind with the same name
    pub fn register<K: ResourceKind + 'static>(&mut self, kind: K) -> &mut Self {
        let name = ResourceKind::type_name(&kind);
        self.kinds.insert(name, Arc::new(kind));
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&dyn DynKind> {
        self.kinds.get(type_name).map(AsRef::as_ref)
    }

    /// Look up a kind, failing with the list of known types
    pub fn require(&self, type_name: &str) -> Result<&dyn DynKind> {
        self.get(type_name).with_context(|| {
            format!(
                "Unknown resource type '{}' (known: {})",
                type_name,
                self.type_names().collect::<Vec<_>>().join(", ")
            )
        })
    }

    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.keys().copied()
    }

    pub fn schemas(&self) -> Vec<Schema> {
        self.kinds.values().map(|k| k.schema()).collect()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory kind shared by the planner and executor tests.

    use super::*;
    use crate::schema::{Attribute, AttributeType};
    use serde::Deserialize;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    pub struct WidgetConfig {
        pub name: String,
        #[serde(default)]
        pub color: String,
        pub size: Option<u32>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct WidgetState {
        pub id: String,
        pub name: String,
        pub color: String,
        pub size: Option<u32>,
        pub serial: u32,
    }

    /// Widgets keyed by name; `name` and `size` are force-new.
    ///
    /// Clones share the same store so tests can inspect it after
    /// registering a clone.
    #[derive(Default, Clone)]
    pub struct WidgetKind {
        pub store: Arc<Mutex<HashMap<String, WidgetState>>>,
        pub fail_create: Arc<Mutex<Option<String>>>,
        pub serial: Arc<Mutex<u32>>,
    }

    impl WidgetKind {
        pub fn seed(&self, name: &str, color: &str) -> Record {
            let state = WidgetState {
                id: name.to_string(),
                name: name.to_string(),
                color: color.to_string(),
                size: None,
                serial: 0,
            };
            self.store
                .lock()
                .unwrap()
                .insert(name.to_string(), state.clone());
            Record {
                id: state.id.clone(),
                attributes: serde_json::to_value(state).unwrap(),
            }
        }
    }

    impl ResourceKind for WidgetKind {
        type Config = WidgetConfig;
        type State = WidgetState;

        fn type_name(&self) -> &'static str {
            "widget"
        }

        fn schema(&self) -> Schema {
            Schema::new(
                "widget",
                vec![
                    Attribute::required("name", AttributeType::String).force_new(),
                    Attribute::optional("color", AttributeType::String),
                    Attribute::optional_computed("size", AttributeType::Int).force_new(),
                    Attribute::computed("serial", AttributeType::Int),
                ],
            )
        }

        fn id(&self, state: &WidgetState) -> String {
            state.id.clone()
        }

        fn normalize(&self, mut config: WidgetConfig) -> WidgetConfig {
            if config.color.is_empty() {
                config.color = "grey".to_string();
            }
            config
        }

        fn declared(&self, state: &WidgetState) -> WidgetConfig {
            WidgetConfig {
                name: state.name.clone(),
                color: state.color.clone(),
                size: state.size,
            }
        }

        fn create(&self, config: &WidgetConfig) -> Result<WidgetState> {
            if self.fail_create.lock().unwrap().as_deref() == Some(config.name.as_str()) {
                anyhow::bail!("create of {} rejected", config.name);
            }
            let mut serial = self.serial.lock().unwrap();
            *serial += 1;
            let state = WidgetState {
                id: config.name.clone(),
                name: config.name.clone(),
                color: config.color.clone(),
                size: config.size,
                serial: *serial,
            };
            self.store
                .lock()
                .unwrap()
                .insert(state.id.clone(), state.clone());
            Ok(state)
        }

        fn read(&self, id: &str, _prior: Option<&WidgetState>) -> Result<ReadOutcome<WidgetState>> {
            Ok(match self.store.lock().unwrap().get(id) {
                Some(state) => ReadOutcome::Found(state.clone()),
                None => ReadOutcome::Missing,
            })
        }

        fn update(
            &self,
            state: &WidgetState,
            config: &WidgetConfig,
            _changed: &[String],
        ) -> Result<WidgetState> {
            let mut store = self.store.lock().unwrap();
            let current = store
                .get_mut(&state.id)
                .ok_or_else(|| anyhow::anyhow!("widget {} vanished", state.id))?;
            current.color = config.color.clone();
            Ok(current.clone())
        }

        fn delete(&self, state: &WidgetState) -> Result<()> {
            self.store
                .lock()
                .unwrap()
                .remove(&state.id)
                .map(|_| ())
                .ok_or_else(|| anyhow::anyhow!("widget {} not found", state.id))
        }
    }
}
