use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::requirements::{SystemToolProbe, ToolProbe};
use crate::constants::DEFAULT_BACKUP_RETENTION;
use crate::metadata::MetadataStore;
use crate::transfer::{FileTransfer, Inventory};

/// Everything a component instance is bound to.
///
/// Cloning is cheap and shares the metadata store and inventory, so all
/// components of one run serialize their metadata writes on the same locks.
#[derive(Debug, Clone)]
pub struct ComponentContext {
    install_root: PathBuf,
    source_root: PathBuf,
    store: Arc<MetadataStore>,
    inventory: Arc<Inventory>,
    staged_commit: bool,
    planned: Arc<BTreeSet<String>>,
    probe: Arc<dyn ToolProbe>,
    placeholder: bool,
}

impl ComponentContext {
    pub fn new(install_root: impl Into<PathBuf>, source_root: impl Into<PathBuf>) -> Self {
        Self::with_retention(install_root, source_root, DEFAULT_BACKUP_RETENTION)
    }

    pub fn with_retention(
        install_root: impl Into<PathBuf>,
        source_root: impl Into<PathBuf>,
        backup_retention: usize,
    ) -> Self {
        let install_root = install_root.into();
        let store = Arc::new(MetadataStore::with_retention(&install_root, backup_retention));
        let inventory = Arc::new(Inventory::new(store.layout().inventory_file()));
        Self {
            install_root,
            source_root: source_root.into(),
            store,
            inventory,
            staged_commit: true,
            planned: Arc::new(BTreeSet::new()),
            probe: Arc::new(SystemToolProbe),
            placeholder: false,
        }
    }

    /// Context used only to read a factory's metadata; no path is ever touched.
    pub fn placeholder() -> Self {
        Self {
            placeholder: true,
            ..Self::new(PathBuf::new(), PathBuf::new())
        }
    }

    /// Whether this is [`ComponentContext::placeholder`]; components skip
    /// file discovery for it.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    #[must_use]
    pub fn with_staged_commit(mut self, staged: bool) -> Self {
        self.staged_commit = staged;
        self
    }

    /// Components installed in the same run; they satisfy each other's
    /// dependency checks before any of them is written.
    #[must_use]
    pub fn with_planned<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.planned = Arc::new(names.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn ToolProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }

    pub fn inventory(&self) -> &Arc<Inventory> {
        &self.inventory
    }

    pub fn staged_commit(&self) -> bool {
        self.staged_commit
    }

    pub fn is_planned(&self, name: &str) -> bool {
        self.planned.contains(name)
    }

    pub fn probe(&self) -> &dyn ToolProbe {
        self.probe.as_ref()
    }

    pub fn transfer(&self) -> FileTransfer {
        FileTransfer::new(Arc::clone(&self.store), Arc::clone(&self.inventory))
    }
}
