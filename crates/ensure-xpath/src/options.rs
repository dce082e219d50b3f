//! Reusable configuration for the builder entry points.
//!
//! ```
//! use std::sync::Arc;
//! use ensure_xpath::{EnsureOptions, Ensurer};
//! use ensure_xpath_tree::{NamespaceManager, XmlNode};
//!
//! let tva = NamespaceManager::new().with("tva", "urn:tva:metadata:2010");
//! let ensurer = Ensurer::new(
//!     EnsureOptions::default()
//!         .with_namespace_resolver(Arc::new(tva))
//!         .with_candidates(["tva:Title", "tva:Genre"]),
//! );
//! let root = XmlNode::parse_str("<Root xmlns='urn:tva:metadata:2010'><Title/></Root>").unwrap();
//! let synopsis = ensurer.get_or_create_element_after(&root, "tva:Synopsis").unwrap();
//! assert_eq!(synopsis.previous_sibling(), root.first_child());
//! ```
use std::fmt;
use std::sync::Arc;

use ensure_xpath_tree::{EmptyResolver, NamespaceResolver, XmlNode};

use crate::error::Error;
use crate::parser::{PathExpression, parse_path_with};
use crate::placement;
use crate::resolver::{self, CreateMode, Placement};

/// Bounds applied to a path before and after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathLimits {
    /// Maximum expression length in bytes.
    pub max_path_len: usize,
    pub max_steps: usize,
}

impl Default for PathLimits {
    fn default() -> Self {
        Self { max_path_len: 4096, max_steps: 256 }
    }
}

impl PathLimits {
    pub const UNBOUNDED: PathLimits = PathLimits { max_path_len: usize::MAX, max_steps: usize::MAX };

    pub(crate) fn check_len(&self, path: &str) -> Result<(), Error> {
        check("path length", self.max_path_len, path.len())
    }

    pub(crate) fn check_steps(&self, steps: usize) -> Result<(), Error> {
        check("step count", self.max_steps, steps)
    }
}

fn check(what: &'static str, limit: usize, actual: usize) -> Result<(), Error> {
    if actual > limit {
        return Err(Error::LimitExceeded { what, limit, actual });
    }
    Ok(())
}

#[derive(Clone, Default)]
pub struct EnsureOptions {
    resolver: Option<Arc<dyn NamespaceResolver + Send + Sync>>,
    candidates: Vec<String>,
    mode: CreateMode,
    limits: PathLimits,
}

impl fmt::Debug for EnsureOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnsureOptions")
            .field("resolver", &self.resolver.as_ref().map(|_| "<dyn NamespaceResolver>"))
            .field("candidates", &self.candidates)
            .field("mode", &self.mode)
            .field("limits", &self.limits)
            .finish()
    }
}

impl EnsureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace_resolver(mut self, resolver: Arc<dyn NamespaceResolver + Send + Sync>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn namespace_resolver(&self) -> Option<Arc<dyn NamespaceResolver + Send + Sync>> {
        self.resolver.as_ref().map(Arc::clone)
    }

    /// Ordered sibling names for [`Ensurer::get_or_create_element_after`];
    /// later entries take priority.
    pub fn with_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Mode used by [`Ensurer::element`] and [`Ensurer::node`].
    pub fn with_mode(mut self, mode: CreateMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> CreateMode {
        self.mode
    }

    pub fn with_limits(mut self, limits: PathLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> PathLimits {
        self.limits
    }
}

/// Builder entry points bound to one [`EnsureOptions`].
#[derive(Debug, Clone, Default)]
pub struct Ensurer {
    options: EnsureOptions,
}

impl Ensurer {
    pub fn new(options: EnsureOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EnsureOptions {
        &self.options
    }

    pub fn parse(&self, path: &str) -> Result<PathExpression, Error> {
        parse_path_with(path, &self.options.limits)
    }

    fn resolver(&self) -> &dyn NamespaceResolver {
        if let Some(resolver) = &self.options.resolver {
            return resolver.as_ref();
        }
        &EmptyResolver
    }

    fn run(&self, root: &XmlNode, path: &str, mode: CreateMode) -> Result<XmlNode, Error> {
        let path = self.parse(path)?;
        resolver::resolve(root, &path, self.resolver(), mode, Placement::Append)
    }

    fn run_element(&self, root: &XmlNode, path: &str, mode: CreateMode) -> Result<XmlNode, Error> {
        let path = self.parse(path)?;
        let node = resolver::resolve(root, &path, self.resolver(), mode, Placement::Append)?;
        resolver::expect_element(node, &path)
    }

    /// Element at `path`, created according to the configured mode.
    pub fn element(&self, root: &XmlNode, path: &str) -> Result<XmlNode, Error> {
        self.run_element(root, path, self.options.mode)
    }

    /// Element or attribute at `path`, created according to the configured mode.
    pub fn node(&self, root: &XmlNode, path: &str) -> Result<XmlNode, Error> {
        self.run(root, path, self.options.mode)
    }

    pub fn create_element(&self, root: &XmlNode, path: &str) -> Result<XmlNode, Error> {
        self.run_element(root, path, CreateMode::AlwaysCreateNew)
    }

    pub fn get_or_create_element(&self, root: &XmlNode, path: &str) -> Result<XmlNode, Error> {
        self.run_element(root, path, CreateMode::CreateOnlyIfMissing)
    }

    pub fn create_node(&self, root: &XmlNode, path: &str) -> Result<XmlNode, Error> {
        self.run(root, path, CreateMode::AlwaysCreateNew)
    }

    pub fn get_or_create_node(&self, root: &XmlNode, path: &str) -> Result<XmlNode, Error> {
        self.run(root, path, CreateMode::CreateOnlyIfMissing)
    }

    /// Like [`Ensurer::get_or_create_element`], placing a new first-step
    /// element after the configured candidates.
    pub fn get_or_create_element_after(&self, root: &XmlNode, path: &str) -> Result<XmlNode, Error> {
        let path = self.parse(path)?;
        let candidates: Vec<&str> = self.options.candidates.iter().map(String::as_str).collect();
        let node = resolver::resolve(
            root,
            &path,
            self.resolver(),
            CreateMode::CreateOnlyIfMissing,
            Placement::After(&candidates),
        )?;
        resolver::expect_element(node, &path)
    }

    pub fn ensure_xpath(&self, root: &XmlNode, path: &str) -> Result<XmlNode, Error> {
        let path = self.parse(path)?;
        resolver::ensure(root, &path, self.resolver())
    }

    /// Place `child` under `parent` after the configured candidates.
    pub fn insert_after(&self, parent: &XmlNode, child: &XmlNode) -> Result<(), Error> {
        placement::insert_after(parent, child, self.options.candidates.as_slice(), Some(self.resolver()))
    }
}
