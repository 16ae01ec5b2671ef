//! Blast-radius planning for incremental updates.
//!
//! A caller in an unchanged file keeps its edges unless something its
//! resolution can observe has changed. What a caller can observe:
//!
//! - its own file's import map and the export surface of every file it
//!   imports (import-based, class lookup through imports);
//! - classes by name, their methods, supertypes and DI registrations
//!   (method and DI strategies);
//! - functions by name (export-based and fuzzy strategies).
//!
//! The plan over-approximates each of these by name. Body-only edits change
//! no fingerprint, so they never widen the plan.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use calltrace_core::types::collections::FxHashMap;
use xxhash_rust::xxh3::Xxh3;

use crate::parsers::types::DecoratorInfo;

use super::di_support::{class_tokens, provider_token};
use super::extractor::{ExportEntry, ExtractedClass, ExtractedFile, ExtractedFunction};
use super::index::ImportMap;

/// Per-file extraction bundles keyed by path.
pub type Extractions = BTreeMap<String, Arc<ExtractedFile>>;

/// Hash of everything about a function a caller elsewhere can observe.
/// Excludes the body hash and line numbers.
pub fn function_fingerprint(func: &ExtractedFunction) -> u64 {
    let mut h = Xxh3::new();
    func.id.hash(&mut h);
    func.name.hash(&mut h);
    func.qualified_name.hash(&mut h);
    func.class_name.hash(&mut h);
    func.is_exported.hash(&mut h);
    func.visibility.hash(&mut h);
    func.signature_hash.hash(&mut h);
    func.return_type.hash(&mut h);
    hash_decorators(&func.decorators, &mut h);
    h.finish()
}

pub fn class_fingerprint(class: &ExtractedClass) -> u64 {
    let mut h = Xxh3::new();
    class.name.hash(&mut h);
    class.parent.hash(&mut h);
    class.implements.hash(&mut h);
    class.kind.hash(&mut h);
    class.is_exported.hash(&mut h);
    class.field_types.hash(&mut h);
    hash_decorators(&class.decorators, &mut h);
    h.finish()
}

pub fn exports_fingerprint(exports: &[ExportEntry]) -> u64 {
    let mut h = Xxh3::new();
    exports.len().hash(&mut h);
    for e in exports {
        e.exported.hash(&mut h);
        e.local.hash(&mut h);
        e.source.hash(&mut h);
    }
    h.finish()
}

fn hash_decorators(decorators: &[DecoratorInfo], h: &mut Xxh3) {
    decorators.len().hash(h);
    for d in decorators {
        d.name.hash(h);
        d.arguments.len().hash(h);
        for arg in &d.arguments {
            arg.key.hash(h);
            arg.value.hash(h);
        }
    }
}

/// Before/after view of one update.
pub struct PlanInput<'a> {
    pub old: &'a Extractions,
    pub new: &'a Extractions,
    pub old_imports: &'a ImportMap,
    pub new_imports: &'a ImportMap,
    /// Files removed, re-extracted, or added by this update.
    pub changed_files: &'a BTreeSet<String>,
    pub extra_di_markers: &'a [String],
}

/// What an update invalidates outside the changed files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    /// Files whose import-visible surface changed.
    pub surface_changed: BTreeSet<String>,
    /// Files whose import resolution may differ; every caller in them is
    /// re-resolved.
    pub import_affected: BTreeSet<String>,
    /// Class names whose members or ancestry may resolve differently.
    pub affected_classes: BTreeSet<String>,
    /// Callee names whose resolution may differ.
    pub affected_names: BTreeSet<String>,
    /// Functions present before and after whose signature hash changed.
    pub signature_changes: usize,
}

impl InvalidationPlan {
    pub fn compute(input: &PlanInput<'_>) -> Self {
        let mut plan = Self::default();
        let mut seed_classes: BTreeSet<String> = BTreeSet::new();
        let mut changed_functions: Vec<&ExtractedFunction> = Vec::new();

        for file in input.changed_files {
            let before = input.old.get(file);
            let after = input.new.get(file);
            match (before, after) {
                (Some(old), Some(new)) => {
                    if plan.diff_file(old, new, &mut seed_classes, &mut changed_functions) {
                        plan.surface_changed.insert(file.clone());
                    }
                }
                (Some(only), None) | (None, Some(only)) => {
                    plan.surface_changed.insert(file.clone());
                    changed_functions.extend(only.functions.iter());
                    seed_classes.extend(only.classes.iter().map(|c| c.name.clone()));
                }
                (None, None) => {}
            }
        }

        plan.propagate_imports(input);
        for file in &plan.import_affected {
            for ef in [input.old.get(file), input.new.get(file)].into_iter().flatten() {
                seed_classes.extend(ef.classes.iter().map(|c| c.name.clone()));
            }
        }

        let universes = [input.old, input.new];
        let mut tokens: BTreeSet<String> = BTreeSet::new();
        for func in &changed_functions {
            plan.affected_names.insert(func.name.clone());
            if let Some(class) = &func.class_name {
                seed_classes.insert(class.clone());
            }
            if let Some(token) = provider_token(func) {
                tokens.insert(token);
            }
        }
        for class in all_classes(universes) {
            if seed_classes.contains(&class.name) {
                tokens.extend(class_tokens(class, input.extra_di_markers));
            }
        }
        // Anything sharing a DI token with a changed class or provider.
        for class in all_classes(universes) {
            if class_tokens(class, input.extra_di_markers)
                .iter()
                .any(|t| tokens.contains(t))
            {
                seed_classes.insert(class.name.clone());
            }
        }
        plan.affected_names.extend(tokens);

        let hierarchy = Hierarchy::new(universes);
        plan.affected_classes = hierarchy.descendants(&seed_classes);
        let with_ancestors = hierarchy.ancestors(&plan.affected_classes);
        plan.affected_names
            .extend(plan.affected_classes.iter().cloned());
        for ef in universes.iter().flat_map(|u| u.values()) {
            for func in &ef.functions {
                if func
                    .class_name
                    .as_deref()
                    .is_some_and(|c| with_ancestors.contains(c))
                {
                    plan.affected_names.insert(func.name.clone());
                }
            }
        }

        tracing::debug!(
            surface_changed = plan.surface_changed.len(),
            import_affected = plan.import_affected.len(),
            classes = plan.affected_classes.len(),
            names = plan.affected_names.len(),
            "invalidation plan"
        );
        plan
    }

    /// Compare two versions of one file. Records changed functions and
    /// classes; returns true when anything visible to other files differs.
    fn diff_file<'a>(
        &mut self,
        old: &'a ExtractedFile,
        new: &'a ExtractedFile,
        seed_classes: &mut BTreeSet<String>,
        changed_functions: &mut Vec<&'a ExtractedFunction>,
    ) -> bool {
        let mut changed = false;

        let old_fns: FxHashMap<&str, &ExtractedFunction> =
            old.functions.iter().map(|f| (f.id.as_str(), f)).collect();
        let new_fns: FxHashMap<&str, &ExtractedFunction> =
            new.functions.iter().map(|f| (f.id.as_str(), f)).collect();
        for func in &old.functions {
            match new_fns.get(func.id.as_str()) {
                None => {
                    changed = true;
                    changed_functions.push(func);
                }
                Some(next) => {
                    if function_fingerprint(func) != function_fingerprint(next) {
                        changed = true;
                        changed_functions.push(func);
                        changed_functions.push(next);
                        if func.signature_hash != next.signature_hash {
                            self.signature_changes += 1;
                        }
                    }
                }
            }
        }
        for func in &new.functions {
            if !old_fns.contains_key(func.id.as_str()) {
                changed = true;
                changed_functions.push(func);
            }
        }

        let old_classes: BTreeMap<&str, u64> = old
            .classes
            .iter()
            .map(|c| (c.name.as_str(), class_fingerprint(c)))
            .collect();
        let new_classes: BTreeMap<&str, u64> = new
            .classes
            .iter()
            .map(|c| (c.name.as_str(), class_fingerprint(c)))
            .collect();
        for name in old_classes.keys().chain(new_classes.keys()) {
            if old_classes.get(name) != new_classes.get(name) {
                changed = true;
                seed_classes.insert(name.to_string());
            }
        }
        // Same names, different declaration order or duplicates.
        if old.classes.len() != new.classes.len() {
            changed = true;
            seed_classes.extend(old.classes.iter().map(|c| c.name.clone()));
            seed_classes.extend(new.classes.iter().map(|c| c.name.clone()));
        }

        if exports_fingerprint(&old.exports) != exports_fingerprint(&new.exports) {
            changed = true;
        }
        changed
    }

    /// Mark files whose imports resolve differently or point at a changed
    /// surface. Files forwarding re-exports pass the change on to their own
    /// importers.
    fn propagate_imports(&mut self, input: &PlanInput<'_>) {
        let files: BTreeSet<&String> = input.old.keys().chain(input.new.keys()).collect();
        let empty = BTreeMap::new();
        loop {
            let mut grew = false;
            for file in &files {
                if self.import_affected.contains(*file) {
                    continue;
                }
                let before = input.old_imports.get(*file).unwrap_or(&empty);
                let after = input.new_imports.get(*file).unwrap_or(&empty);
                let affected = before != after
                    || before
                        .values()
                        .chain(after.values())
                        .any(|target| self.surface_changed.contains(target));
                if !affected {
                    continue;
                }
                self.import_affected.insert((*file).clone());
                grew = true;
                let forwards = [input.old.get(*file), input.new.get(*file)]
                    .into_iter()
                    .flatten()
                    .any(|ef| ef.exports.iter().any(|e| e.source.is_some()));
                if forwards {
                    self.surface_changed.insert((*file).clone());
                }
            }
            if !grew {
                break;
            }
        }
    }

    /// True when a caller outside the changed files must be re-resolved.
    pub fn affects(
        &self,
        file: &str,
        caller_class: Option<&str>,
        callee_name: &str,
        imported_name: Option<&str>,
    ) -> bool {
        self.import_affected.contains(file)
            || caller_class.is_some_and(|c| self.affected_classes.contains(c))
            || self.affected_names.contains(callee_name)
            || imported_name.is_some_and(|n| self.affected_names.contains(n))
    }

    /// Callers in `files` (none of them changed) that need re-resolution.
    pub fn incoming_callers<'a>(
        &self,
        files: impl IntoIterator<Item = &'a ExtractedFile>,
    ) -> BTreeSet<String> {
        let mut callers = BTreeSet::new();
        for ef in files {
            let classes: FxHashMap<&str, Option<&str>> = ef
                .functions
                .iter()
                .map(|f| (f.id.as_str(), f.class_name.as_deref()))
                .collect();
            for call in &ef.call_sites {
                if callers.contains(&call.caller) {
                    continue;
                }
                let class = classes.get(call.caller.as_str()).copied().flatten();
                if self.affects(
                    &ef.file,
                    class,
                    &call.callee_name,
                    call.imported_name.as_deref(),
                ) {
                    callers.insert(call.caller.clone());
                }
            }
        }
        callers
    }
}

fn all_classes<'a>(universes: [&'a Extractions; 2]) -> impl Iterator<Item = &'a ExtractedClass> {
    universes
        .into_iter()
        .flat_map(|u| u.values())
        .flat_map(|ef| ef.classes.iter())
}

/// Name-level supertype relation over both universes.
struct Hierarchy {
    /// Supertype name (raw and last segment) → subclass names.
    children: BTreeMap<String, BTreeSet<String>>,
    /// Class name → supertype names.
    parents: BTreeMap<String, BTreeSet<String>>,
}

impl Hierarchy {
    fn new(universes: [&Extractions; 2]) -> Self {
        let mut children: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut parents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for class in all_classes(universes) {
            for sup in class.supertypes() {
                for key in [sup, last_segment(sup)] {
                    children
                        .entry(key.to_string())
                        .or_default()
                        .insert(class.name.clone());
                    parents
                        .entry(class.name.clone())
                        .or_default()
                        .insert(key.to_string());
                }
            }
        }
        Self { children, parents }
    }

    fn descendants(&self, seeds: &BTreeSet<String>) -> BTreeSet<String> {
        closure(seeds, &self.children)
    }

    fn ancestors(&self, seeds: &BTreeSet<String>) -> BTreeSet<String> {
        closure(seeds, &self.parents)
    }
}

fn closure(
    seeds: &BTreeSet<String>,
    edges: &BTreeMap<String, BTreeSet<String>>,
) -> BTreeSet<String> {
    let mut out = seeds.clone();
    let mut stack: Vec<String> = seeds.iter().cloned().collect();
    while let Some(name) = stack.pop() {
        let keys = [name.as_str(), last_segment(&name)];
        for key in keys {
            if let Some(next) = edges.get(key) {
                for n in next {
                    if out.insert(n.clone()) {
                        stack.push(n.clone());
                    }
                }
            }
        }
    }
    out
}

fn last_segment(name: &str) -> &str {
    name.rsplit(['.', ':']).next().unwrap_or(name)
}
