//! Component registry.
//!
//! Maps `(category, name)` to a constructor. Constructors take a [`Params`]
//! bag and return a boxed component. The registry is shared state: all
//! access goes through one `parking_lot::RwLock`, and constructors run
//! outside the lock so a constructor may itself consult the registry.
//!
//! A process-wide instance with the built-in components already discovered
//! is available through [`ComponentRegistry::global`]. Tests and embedders
//! that want isolation create their own with [`ComponentRegistry::new`].

use crate::components::{ComponentKind, FromParams, Loader, Processor, Writer};
use crate::error::{PipelineError, Result};
use crate::params::Params;
use crate::{loaders, processors, writers};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Factory signature for a component category.
pub type Constructor<T> = Arc<dyn Fn(&Params) -> anyhow::Result<Box<T>> + Send + Sync>;

/// Constructor for loaders.
pub type LoaderConstructor = Constructor<dyn Loader>;
/// Constructor for processors.
pub type ProcessorConstructor = Constructor<dyn Processor>;
/// Constructor for writers.
pub type WriterConstructor = Constructor<dyn Writer>;

/// Name and description of a registered component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentInfo {
    pub kind: ComponentKind,
    pub name: String,
    pub description: String,
}

struct Descriptor<T: ?Sized> {
    description: String,
    constructor: Constructor<T>,
}

type Catalog<T> = BTreeMap<String, Descriptor<T>>;

#[derive(Default)]
struct Catalogs {
    loaders: Catalog<dyn Loader>,
    processors: Catalog<dyn Processor>,
    writers: Catalog<dyn Writer>,
}

/// Selects the catalog that stores a given component trait object.
trait Category {
    const KIND: ComponentKind;
    fn catalog(catalogs: &Catalogs) -> &Catalog<Self>;
    fn catalog_mut(catalogs: &mut Catalogs) -> &mut Catalog<Self>;
}

impl Category for dyn Loader {
    const KIND: ComponentKind = ComponentKind::Loader;
    fn catalog(catalogs: &Catalogs) -> &Catalog<Self> {
        &catalogs.loaders
    }
    fn catalog_mut(catalogs: &mut Catalogs) -> &mut Catalog<Self> {
        &mut catalogs.loaders
    }
}

impl Category for dyn Processor {
    const KIND: ComponentKind = ComponentKind::Processor;
    fn catalog(catalogs: &Catalogs) -> &Catalog<Self> {
        &catalogs.processors
    }
    fn catalog_mut(catalogs: &mut Catalogs) -> &mut Catalog<Self> {
        &mut catalogs.processors
    }
}

impl Category for dyn Writer {
    const KIND: ComponentKind = ComponentKind::Writer;
    fn catalog(catalogs: &Catalogs) -> &Catalog<Self> {
        &catalogs.writers
    }
    fn catalog_mut(catalogs: &mut Catalogs) -> &mut Catalog<Self> {
        &mut catalogs.writers
    }
}

/// What to do when a name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnConflict {
    Fail,
    Keep,
}

static GLOBAL: Lazy<ComponentRegistry> = Lazy::new(|| {
    let registry = ComponentRegistry::new();
    registry.auto_discover();
    registry
});

/// Thread-safe store of component constructors, keyed by category and name.
#[derive(Default)]
pub struct ComponentRegistry {
    inner: RwLock<Catalogs>,
}

static_assertions::assert_impl_all!(ComponentRegistry: Send, Sync);

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in components registered.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.auto_discover();
        registry
    }

    /// The process-wide registry, discovered on first access.
    pub fn global() -> &'static ComponentRegistry {
        &GLOBAL
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a loader constructor.
    ///
    /// Fails with [`PipelineError::DuplicateName`] if a loader with this name
    /// already exists.
    pub fn register_loader<F>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        constructor: F,
    ) -> Result<()>
    where
        F: Fn(&Params) -> anyhow::Result<Box<dyn Loader>> + Send + Sync + 'static,
    {
        self.insert::<dyn Loader>(name.into(), description.into(), Arc::new(constructor), OnConflict::Fail)
            .map(|_| ())
    }

    /// Register a processor constructor.
    pub fn register_processor<F>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        constructor: F,
    ) -> Result<()>
    where
        F: Fn(&Params) -> anyhow::Result<Box<dyn Processor>> + Send + Sync + 'static,
    {
        self.insert::<dyn Processor>(name.into(), description.into(), Arc::new(constructor), OnConflict::Fail)
            .map(|_| ())
    }

    /// Register a writer constructor.
    pub fn register_writer<F>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        constructor: F,
    ) -> Result<()>
    where
        F: Fn(&Params) -> anyhow::Result<Box<dyn Writer>> + Send + Sync + 'static,
    {
        self.insert::<dyn Writer>(name.into(), description.into(), Arc::new(constructor), OnConflict::Fail)
            .map(|_| ())
    }

    /// Register a loader type under its [`FromParams::NAME`].
    pub fn register_loader_type<T>(&self) -> Result<()>
    where
        T: Loader + FromParams + 'static,
    {
        self.insert::<dyn Loader>(T::NAME.to_string(), T::DESCRIPTION.to_string(), loader_constructor::<T>(), OnConflict::Fail)
            .map(|_| ())
    }

    /// Register a processor type under its [`FromParams::NAME`].
    pub fn register_processor_type<T>(&self) -> Result<()>
    where
        T: Processor + FromParams + 'static,
    {
        self.insert::<dyn Processor>(T::NAME.to_string(), T::DESCRIPTION.to_string(), processor_constructor::<T>(), OnConflict::Fail)
            .map(|_| ())
    }

    /// Register a writer type under its [`FromParams::NAME`].
    pub fn register_writer_type<T>(&self) -> Result<()>
    where
        T: Writer + FromParams + 'static,
    {
        self.insert::<dyn Writer>(T::NAME.to_string(), T::DESCRIPTION.to_string(), writer_constructor::<T>(), OnConflict::Fail)
            .map(|_| ())
    }

    // Discovery helpers: register under `name` unless already present.

    pub(crate) fn discover_loader<T>(&self, name: &str) -> bool
    where
        T: Loader + FromParams + 'static,
    {
        self.insert::<dyn Loader>(name.to_string(), T::DESCRIPTION.to_string(), loader_constructor::<T>(), OnConflict::Keep)
            .unwrap_or(false)
    }

    pub(crate) fn discover_processor<T>(&self, name: &str) -> bool
    where
        T: Processor + FromParams + 'static,
    {
        self.insert::<dyn Processor>(name.to_string(), T::DESCRIPTION.to_string(), processor_constructor::<T>(), OnConflict::Keep)
            .unwrap_or(false)
    }

    pub(crate) fn discover_writer<T>(&self, name: &str) -> bool
    where
        T: Writer + FromParams + 'static,
    {
        self.insert::<dyn Writer>(name.to_string(), T::DESCRIPTION.to_string(), writer_constructor::<T>(), OnConflict::Keep)
            .unwrap_or(false)
    }

    /// Register every built-in component that is not registered yet.
    ///
    /// Safe to call any number of times: names that already exist are left
    /// untouched. Returns how many components were newly registered.
    pub fn auto_discover(&self) -> usize {
        let added = loaders::discover(self) + processors::discover(self) + writers::discover(self);
        info!(
            added,
            loaders = self.list(ComponentKind::Loader).len(),
            processors = self.list(ComponentKind::Processor).len(),
            writers = self.list(ComponentKind::Writer).len(),
            "Component discovery complete"
        );
        added
    }

    fn insert<T>(
        &self,
        name: String,
        description: String,
        constructor: Constructor<T>,
        on_conflict: OnConflict,
    ) -> Result<bool>
    where
        T: Category + ?Sized,
    {
        let mut catalogs = self.inner.write();
        let catalog = T::catalog_mut(&mut catalogs);

        if catalog.contains_key(&name) {
            return match on_conflict {
                OnConflict::Fail => Err(PipelineError::DuplicateName { kind: T::KIND, name }),
                OnConflict::Keep => {
                    debug!(kind = %T::KIND, name = %name, "Already registered, skipping");
                    Ok(false)
                }
            };
        }

        debug!(kind = %T::KIND, name = %name, "Registered component");
        catalog.insert(
            name,
            Descriptor {
                description,
                constructor,
            },
        );
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Lookup and instantiation
    // ------------------------------------------------------------------

    /// Instantiate a registered loader with the given parameters.
    pub fn get_loader(&self, name: &str, params: &Params) -> Result<Box<dyn Loader>> {
        self.instantiate::<dyn Loader>(name, params)
    }

    /// Instantiate a registered processor with the given parameters.
    pub fn get_processor(&self, name: &str, params: &Params) -> Result<Box<dyn Processor>> {
        self.instantiate::<dyn Processor>(name, params)
    }

    /// Instantiate a registered writer with the given parameters.
    pub fn get_writer(&self, name: &str, params: &Params) -> Result<Box<dyn Writer>> {
        self.instantiate::<dyn Writer>(name, params)
    }

    fn instantiate<T>(&self, name: &str, params: &Params) -> Result<Box<T>>
    where
        T: Category + ?Sized,
    {
        // Clone the constructor out so it runs without holding the lock.
        let constructor = {
            let catalogs = self.inner.read();
            T::catalog(&catalogs)
                .get(name)
                .map(|d| Arc::clone(&d.constructor))
        };

        let constructor = constructor.ok_or_else(|| PipelineError::UnknownComponent {
            kind: T::KIND,
            name: name.to_string(),
        })?;

        debug!(kind = %T::KIND, name, params = params.len(), "Instantiating component");
        constructor(params).map_err(|source| PipelineError::ComponentConstruction {
            kind: T::KIND,
            name: name.to_string(),
            source,
        })
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Check whether a component is registered.
    pub fn contains(&self, kind: ComponentKind, name: &str) -> bool {
        let catalogs = self.inner.read();
        match kind {
            ComponentKind::Loader => catalogs.loaders.contains_key(name),
            ComponentKind::Processor => catalogs.processors.contains_key(name),
            ComponentKind::Writer => catalogs.writers.contains_key(name),
        }
    }

    /// Registered names for a category, sorted.
    pub fn list(&self, kind: ComponentKind) -> Vec<String> {
        self.describe(kind).into_iter().map(|info| info.name).collect()
    }

    pub fn list_loaders(&self) -> Vec<String> {
        self.list(ComponentKind::Loader)
    }

    pub fn list_processors(&self) -> Vec<String> {
        self.list(ComponentKind::Processor)
    }

    pub fn list_writers(&self) -> Vec<String> {
        self.list(ComponentKind::Writer)
    }

    /// Name and description of every component in a category, sorted by name.
    pub fn describe(&self, kind: ComponentKind) -> Vec<ComponentInfo> {
        let catalogs = self.inner.read();
        match kind {
            ComponentKind::Loader => infos(kind, &catalogs.loaders),
            ComponentKind::Processor => infos(kind, &catalogs.processors),
            ComponentKind::Writer => infos(kind, &catalogs.writers),
        }
    }

    /// Total number of registered components across all categories.
    pub fn len(&self) -> usize {
        let catalogs = self.inner.read();
        catalogs.loaders.len() + catalogs.processors.len() + catalogs.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn infos<T: ?Sized>(kind: ComponentKind, catalog: &Catalog<T>) -> Vec<ComponentInfo> {
    catalog
        .iter()
        .map(|(name, descriptor)| ComponentInfo {
            kind,
            name: name.clone(),
            description: descriptor.description.clone(),
        })
        .collect()
}

fn loader_constructor<T: Loader + FromParams + 'static>() -> LoaderConstructor {
    Arc::new(|params: &Params| T::from_params(params).map(|c| Box::new(c) as Box<dyn Loader>))
}

fn processor_constructor<T: Processor + FromParams + 'static>() -> ProcessorConstructor {
    Arc::new(|params: &Params| T::from_params(params).map(|c| Box::new(c) as Box<dyn Processor>))
}

fn writer_constructor<T: Writer + FromParams + 'static>() -> WriterConstructor {
    Arc::new(|params: &Params| T::from_params(params).map(|c| Box::new(c) as Box<dyn Writer>))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Table;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    struct TestLoader {
        test_param: Option<String>,
    }

    impl Loader for TestLoader {
        fn name(&self) -> &str {
            "TestLoader"
        }
        fn load(&self) -> anyhow::Result<Table> {
            Ok(df!("test" => [1i64, 2, 3])?)
        }
    }

    impl FromParams for TestLoader {
        const NAME: &'static str = "TestLoader";
        const DESCRIPTION: &'static str = "Loader used in registry tests";
        fn from_params(params: &Params) -> anyhow::Result<Self> {
            Ok(Self {
                test_param: params.str("test_param")?.map(str::to_string),
            })
        }
    }

    struct Identity;

    impl Processor for Identity {
        fn name(&self) -> &str {
            "Identity"
        }
        fn process(&self, input: Table) -> anyhow::Result<Table> {
            Ok(input)
        }
    }

    #[test]
    fn test_register_and_get_loader() {
        let registry = ComponentRegistry::new();
        registry.register_loader_type::<TestLoader>().unwrap();

        assert!(registry.contains(ComponentKind::Loader, "TestLoader"));
        let loader = registry
            .get_loader("TestLoader", &Params::new().with("test_param", "value"))
            .unwrap();
        assert_eq!(loader.name(), "TestLoader");
        assert_eq!(loader.load().unwrap().height(), 3);
    }

    #[test]
    fn test_constructor_receives_params() {
        let registry = ComponentRegistry::new();
        registry
            .register_loader("Probe", "", |params: &Params| {
                let loader = TestLoader::from_params(params)?;
                anyhow::ensure!(loader.test_param.as_deref() == Some("value"), "param not forwarded");
                Ok(Box::new(loader) as Box<dyn Loader>)
            })
            .unwrap();

        assert!(registry
            .get_loader("Probe", &Params::new().with("test_param", "value"))
            .is_ok());
        assert!(registry.get_loader("Probe", &Params::new()).is_err());
    }

    #[test]
    fn test_unknown_component() {
        let registry = ComponentRegistry::new();
        let err = registry
            .get_processor("NonExistentProcessor", &Params::new())
            .err()
            .expect("lookup should fail");
        assert!(matches!(
            err,
            PipelineError::UnknownComponent { kind: ComponentKind::Processor, ref name } if name == "NonExistentProcessor"
        ));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = ComponentRegistry::new();
        registry
            .register_processor("Identity", "", |_: &Params| Ok(Box::new(Identity) as Box<dyn Processor>))
            .unwrap();
        let err = registry
            .register_processor("Identity", "", |_: &Params| Ok(Box::new(Identity) as Box<dyn Processor>))
            .unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_NAME");
    }

    #[test]
    fn test_same_name_in_different_categories() {
        let registry = ComponentRegistry::new();
        registry
            .register_processor("Shared", "", |_: &Params| Ok(Box::new(Identity) as Box<dyn Processor>))
            .unwrap();
        registry
            .register_loader("Shared", "", |_: &Params| {
                Ok(Box::new(TestLoader { test_param: None }) as Box<dyn Loader>)
            })
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_construction_error_is_wrapped() {
        let registry = ComponentRegistry::new();
        registry
            .register_writer("Broken", "", |_: &Params| -> anyhow::Result<Box<dyn Writer>> {
                anyhow::bail!("output_dir is required")
            })
            .unwrap();

        let err = registry.get_writer("Broken", &Params::new()).err().unwrap();
        assert_eq!(err.error_code(), "COMPONENT_CONSTRUCTION");
        assert!(err.to_string().contains("output_dir is required"));
    }

    #[test]
    fn test_list_is_sorted() {
        let registry = ComponentRegistry::new();
        for name in ["Zeta", "Alpha", "Mid"] {
            registry
                .register_processor(name, "", |_: &Params| Ok(Box::new(Identity) as Box<dyn Processor>))
                .unwrap();
        }
        assert_eq!(registry.list_processors(), vec!["Alpha", "Mid", "Zeta"]);
        assert!(registry.list_loaders().is_empty());
    }

    #[test]
    fn test_auto_discover_is_idempotent() {
        let registry = ComponentRegistry::new();
        let first = registry.auto_discover();
        let snapshot: Vec<_> = ComponentKind::ALL
            .iter()
            .map(|kind| registry.list(*kind))
            .collect();

        let second = registry.auto_discover();
        let after: Vec<_> = ComponentKind::ALL
            .iter()
            .map(|kind| registry.list(*kind))
            .collect();

        assert!(first > 0);
        assert_eq!(second, 0);
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_auto_discover_keeps_user_registrations() {
        let registry = ComponentRegistry::new();
        registry
            .register_processor("FilterProcessor", "custom", |_: &Params| {
                Ok(Box::new(Identity) as Box<dyn Processor>)
            })
            .unwrap();
        registry.auto_discover();

        let filter = registry
            .describe(ComponentKind::Processor)
            .into_iter()
            .find(|info| info.name == "FilterProcessor")
            .unwrap();
        assert_eq!(filter.description, "custom");
    }

    #[test]
    fn test_explicit_register_after_discovery_still_fails() {
        let registry = ComponentRegistry::with_builtins();
        let err = registry
            .register_processor("FilterProcessor", "", |_: &Params| Ok(Box::new(Identity) as Box<dyn Processor>))
            .unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateName { .. }));
    }

    #[test]
    fn test_global_registry_has_builtins() {
        let registry = ComponentRegistry::global();
        assert!(registry.contains(ComponentKind::Loader, "CsvLoader"));
        assert!(registry.contains(ComponentKind::Writer, "CsvWriter"));
        assert!(registry.contains(ComponentKind::Processor, "FilterProcessor"));
    }

    #[test]
    fn test_concurrent_lookups() {
        let registry = Arc::new(ComponentRegistry::with_builtins());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .get_processor("FilterProcessor", &Params::new().with("column", "a").with("condition", 1))
                        .is_ok()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().expect("Thread should not panic"));
        }
    }
}
