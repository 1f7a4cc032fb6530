//! In-memory schema index and module loader.

use crate::error::{Result, SchemaError};
use crate::module::{ModuleSource, ObjectDef, TypeDef};
use poller_types::{BaseType, ObjectKind, Oid, TypeInfo};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A named object registered in the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaObject {
    pub name: String,
    pub module: String,
    pub oid: Oid,
    pub kind: ObjectKind,
    pub type_info: Option<Arc<TypeInfo>>,
}

/// The set of loaded modules.
///
/// Names are unique by first registration; `MODULE::name` always addresses
/// a specific module's object. Paths are looked up by longest prefix.
#[derive(Debug, Default)]
pub struct Schema {
    modules: Vec<String>,
    objects: Vec<SchemaObject>,
    by_name: HashMap<String, usize>,
    by_oid: HashMap<Vec<u32>, usize>,
    types: HashMap<String, Arc<TypeInfo>>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `modules` (and their imports) from the first search path that
    /// has them.
    pub fn load<P: AsRef<Path>, S: AsRef<str>>(paths: &[P], modules: &[S]) -> Result<Self> {
        let mut loader = SchemaLoader::new(paths.iter().map(|p| p.as_ref().to_path_buf()));
        for module in modules {
            loader.load_module(module.as_ref())?;
        }
        let schema = loader.finish();
        info!(
            modules = schema.modules.len(),
            objects = schema.objects.len(),
            "Loaded {} schema modules",
            schema.modules.len()
        );
        Ok(schema)
    }

    /// Builds a schema from already parsed modules, in order.
    pub fn from_sources(sources: impl IntoIterator<Item = ModuleSource>) -> Result<Self> {
        let mut schema = Schema::new();
        for source in sources {
            schema.add_module(source)?;
        }
        Ok(schema)
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m == name)
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Looks up an object by `name` or `MODULE::name`.
    pub fn object(&self, name: &str) -> Option<&SchemaObject> {
        self.by_name.get(name).map(|&idx| &self.objects[idx])
    }

    /// Returns the registered object with the longest path prefixing `oid`,
    /// together with the remaining arcs.
    pub fn object_by_oid<'a>(&self, oid: &'a Oid) -> Option<(&SchemaObject, &'a [u32])> {
        let arcs = oid.arcs();
        (1..=arcs.len()).rev().find_map(|len| {
            self.by_oid
                .get(&arcs[..len])
                .map(|&idx| (&self.objects[idx], &arcs[len..]))
        })
    }

    /// Looks up a textual convention.
    pub fn type_info(&self, name: &str) -> Option<&Arc<TypeInfo>> {
        self.types.get(name)
    }

    /// Registers a module. A module already present is ignored.
    pub fn add_module(&mut self, source: ModuleSource) -> Result<()> {
        if self.has_module(&source.module) {
            debug!(module = %source.module, "schema module already registered");
            return Ok(());
        }

        for def in &source.types {
            let info = self.build_type(&source.module, def)?;
            if self.types.contains_key(&def.name) {
                debug!(module = %source.module, name = %def.name, "duplicate type ignored");
                continue;
            }
            self.types.insert(def.name.clone(), Arc::new(info));
        }

        for def in &source.objects {
            let object = self.build_object(&source.module, def)?;
            self.insert_object(object);
        }

        self.modules.push(source.module);
        Ok(())
    }

    fn insert_object(&mut self, object: SchemaObject) {
        let idx = self.objects.len();
        let qualified = format!("{}::{}", object.module, object.name);

        self.by_name.entry(qualified).or_insert(idx);
        if self.by_name.contains_key(&object.name) {
            debug!(
                module = %object.module,
                name = %object.name,
                "object name already registered by another module"
            );
        } else {
            self.by_name.insert(object.name.clone(), idx);
        }
        self.by_oid.entry(object.oid.arcs().to_vec()).or_insert(idx);
        self.objects.push(object);
    }

    fn build_type(&self, module: &str, def: &TypeDef) -> Result<TypeInfo> {
        let mut info = self.resolve_type_ref(module, &def.base)?;
        info.name = Some(def.name.clone());
        apply_overrides(&mut info, def.hint.as_ref(), &def.values, &def.bits);
        Ok(info)
    }

    fn build_object(&self, module: &str, def: &ObjectDef) -> Result<SchemaObject> {
        let oid = self.resolve_oid_expr(module, &def.oid)?;

        let has_overrides = def.hint.is_some() || !def.values.is_empty() || !def.bits.is_empty();
        let type_info = match &def.type_ref {
            Some(type_ref) if !has_overrides => match self.types.get(type_ref) {
                Some(tc) => Some(Arc::clone(tc)),
                None => Some(Arc::new(self.resolve_type_ref(module, type_ref)?)),
            },
            Some(type_ref) => {
                let mut info = self.resolve_type_ref(module, type_ref)?;
                apply_overrides(&mut info, def.hint.as_ref(), &def.values, &def.bits);
                Some(Arc::new(info))
            }
            None if has_overrides => {
                let mut info = TypeInfo::new(BaseType::Integer32);
                apply_overrides(&mut info, def.hint.as_ref(), &def.values, &def.bits);
                Some(Arc::new(info))
            }
            None => None,
        };

        Ok(SchemaObject {
            name: def.name.clone(),
            module: module.to_string(),
            oid,
            kind: def.kind,
            type_info,
        })
    }

    fn resolve_type_ref(&self, module: &str, type_ref: &str) -> Result<TypeInfo> {
        if let Some(tc) = self.types.get(type_ref) {
            return Ok(TypeInfo::clone(tc));
        }
        type_ref
            .parse::<BaseType>()
            .map(TypeInfo::new)
            .map_err(|_| SchemaError::invalid(module, format!("unknown type {}", type_ref)))
    }

    fn resolve_oid_expr(&self, module: &str, expr: &str) -> Result<Oid> {
        if let Ok(oid) = expr.parse::<Oid>() {
            return Ok(oid);
        }

        let (base, suffix) = match expr.split_once('.') {
            Some((base, suffix)) => (base, Some(suffix)),
            None => (expr, None),
        };
        let parent = self.object(base).ok_or_else(|| {
            SchemaError::invalid(module, format!("unknown parent {} in path {}", base, expr))
        })?;

        match suffix {
            None => Ok(parent.oid.clone()),
            Some(suffix) => {
                let arcs = suffix
                    .split('.')
                    .map(str::parse::<u32>)
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|_| SchemaError::invalid(module, format!("invalid path {}", expr)))?;
                Ok(parent.oid.join(&arcs))
            }
        }
    }
}

fn apply_overrides(
    info: &mut TypeInfo,
    hint: Option<&String>,
    values: &BTreeMap<String, i64>,
    bits: &BTreeMap<String, u32>,
) {
    if let Some(hint) = hint {
        info.format = Some(hint.clone());
    }
    if !values.is_empty() {
        info.base = BaseType::Enum;
        info.enums = values.iter().map(|(label, v)| (*v, label.clone())).collect();
    }
    if !bits.is_empty() {
        info.base = BaseType::Bits;
        info.bits = bits.iter().map(|(label, b)| (*b, label.clone())).collect();
    }
}

/// Loads module files from search paths, imports first.
#[derive(Debug)]
pub struct SchemaLoader {
    paths: Vec<PathBuf>,
    schema: Schema,
    visiting: HashSet<String>,
}

impl SchemaLoader {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let paths: Vec<PathBuf> = paths.into_iter().collect();
        for path in &paths {
            debug!(path = %path.display(), "schema path added");
        }
        Self {
            paths,
            schema: Schema::new(),
            visiting: HashSet::new(),
        }
    }

    /// Loads one module and, recursively, everything it imports.
    pub fn load_module(&mut self, name: &str) -> Result<()> {
        if self.schema.has_module(name) || !self.visiting.insert(name.to_string()) {
            return Ok(());
        }

        let path = self.find(name)?;
        let text = fs::read_to_string(&path).map_err(|e| SchemaError::io(&path, e))?;
        let source = ModuleSource::from_yaml_str(&text).map_err(|e| SchemaError::parse(&path, e))?;
        if source.module != name {
            return Err(SchemaError::invalid(
                name,
                format!("{} declares module {}", path.display(), source.module),
            ));
        }

        for import in &source.imports {
            self.load_module(import)?;
        }

        let objects = source.objects.len();
        self.schema.add_module(source)?;
        debug!(module = name, path = %path.display(), objects, "schema module loaded");
        Ok(())
    }

    fn find(&self, name: &str) -> Result<PathBuf> {
        for dir in &self.paths {
            for ext in ["yaml", "yml"] {
                let candidate = dir.join(format!("{}.{}", name, ext));
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
        warn!(module = name, "schema module not found");
        Err(SchemaError::ModuleNotFound {
            module: name.to_string(),
            paths: self.paths.clone(),
        })
    }

    pub fn finish(self) -> Schema {
        self.schema
    }
}
