//! Resolution index: cross-file lookup tables built once per resolution pass.
//!
//! Construction is one linear pass over every extracted file in the batch and
//! must finish before any call site is resolved. The index is never persisted.

use std::collections::BTreeMap;
use std::sync::Arc;

use calltrace_core::constants::{MAX_ANCESTOR_DEPTH, MAX_REEXPORT_DEPTH};
use calltrace_core::errors::CallGraphError;
use calltrace_core::types::collections::{FxHashMap, FxHashSet};
use calltrace_core::types::NameInterner;
use lasso::Spur;
use smallvec::SmallVec;

use crate::scanner::language_detect::Language;

use super::di_support::{self, DiRegistry, DiTarget};
use super::extractor::{ExtractedClass, ExtractedFile, ExtractedFunction, DEFAULT_IMPORT};
use super::import_paths::ModuleResolver;

pub type FileIdx = u32;
pub type FnIdx = u32;
pub type ClassIdx = u32;

/// Importing file → import source → resolved target file.
pub type ImportMap = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone)]
pub struct IndexedFunction {
    pub id: String,
    pub file: FileIdx,
    pub name: Spur,
    pub class: Option<Spur>,
    pub is_exported: bool,
    pub is_constructor: bool,
    pub language: Language,
    /// Position in the owning file's `functions`.
    local: u32,
}

impl IndexedFunction {
    pub fn is_method(&self) -> bool {
        self.class.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct IndexedClass {
    pub file: FileIdx,
    pub name: Spur,
    /// Position in the owning file's `classes`.
    local: u32,
    methods: FxHashMap<Spur, SmallVec<[FnIdx; 1]>>,
    constructor: Option<FnIdx>,
}

#[derive(Debug, Clone)]
enum ExportTarget {
    Local(String),
    ReExport { file: Option<FileIdx>, name: String },
}

#[derive(Debug, Default)]
struct FileExports {
    named: FxHashMap<String, ExportTarget>,
    stars: Vec<FileIdx>,
}

/// A name an export or import ultimately denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Function(FnIdx),
    Class(ClassIdx),
}

/// Options that change what the index registers.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    pub extra_di_markers: Vec<String>,
}

#[derive(Debug)]
pub struct ResolutionIndex {
    names: NameInterner,
    files: Vec<Arc<ExtractedFile>>,
    file_ids: FxHashMap<String, FileIdx>,
    functions: Vec<IndexedFunction>,
    fn_ids: FxHashMap<String, FnIdx>,
    /// name → every function with that name.
    by_name: FxHashMap<Spur, Vec<FnIdx>>,
    /// (file, name) → free functions.
    free_by_file: FxHashMap<(FileIdx, Spur), SmallVec<[FnIdx; 1]>>,
    /// name → exported functions.
    exported_by_name: FxHashMap<Spur, Vec<FnIdx>>,
    classes: Vec<IndexedClass>,
    classes_by_name: FxHashMap<Spur, Vec<ClassIdx>>,
    class_by_file: FxHashMap<(FileIdx, Spur), ClassIdx>,
    exports: Vec<FileExports>,
    /// (file, import source) → resolved file.
    imports: FxHashMap<(FileIdx, String), FileIdx>,
    di: DiRegistry,
}

impl ResolutionIndex {
    /// Build the index over `files`. Files are ordered by path first so every
    /// candidate list is in a deterministic order.
    pub fn build(
        files: &[Arc<ExtractedFile>],
        options: &IndexOptions,
    ) -> Result<Self, CallGraphError> {
        let mut sorted: Vec<Arc<ExtractedFile>> = files.to_vec();
        sorted.sort_by(|a, b| a.file.cmp(&b.file));
        if let Some(pair) = sorted.windows(2).find(|w| w[0].file == w[1].file) {
            return Err(CallGraphError::IndexFailed {
                message: format!("file {} was extracted twice", pair[0].file),
            });
        }

        let mut index = Self {
            names: NameInterner::new(),
            files: Vec::with_capacity(sorted.len()),
            file_ids: FxHashMap::default(),
            functions: Vec::new(),
            fn_ids: FxHashMap::default(),
            by_name: FxHashMap::default(),
            free_by_file: FxHashMap::default(),
            exported_by_name: FxHashMap::default(),
            classes: Vec::new(),
            classes_by_name: FxHashMap::default(),
            class_by_file: FxHashMap::default(),
            exports: Vec::with_capacity(sorted.len()),
            imports: FxHashMap::default(),
            di: DiRegistry::new(),
        };

        for ef in &sorted {
            index.add_definitions(ef)?;
        }
        index.files = sorted;

        let modules = ModuleResolver::new(index.files.iter().map(|f| f.file.as_str()));
        for file_idx in 0..index.files.len() as FileIdx {
            index.add_imports(file_idx, &modules);
        }
        for file_idx in 0..index.files.len() as FileIdx {
            index.add_exports(file_idx);
        }
        index.add_di_registrations(options);

        Ok(index)
    }

    fn add_definitions(&mut self, ef: &ExtractedFile) -> Result<(), CallGraphError> {
        let file_idx = self.file_ids.len() as FileIdx;
        self.file_ids.insert(ef.file.clone(), file_idx);

        for (local, class) in ef.classes.iter().enumerate() {
            let name = self.names.intern(&class.name);
            let class_idx = self.classes.len() as ClassIdx;
            self.classes.push(IndexedClass {
                file: file_idx,
                name,
                local: local as u32,
                methods: FxHashMap::default(),
                constructor: None,
            });
            self.classes_by_name.entry(name).or_default().push(class_idx);
            // First declaration wins for duplicate class names in one file.
            self.class_by_file.entry((file_idx, name)).or_insert(class_idx);
        }

        for (local, func) in ef.functions.iter().enumerate() {
            let fn_idx = self.functions.len() as FnIdx;
            if self.fn_ids.insert(func.id.clone(), fn_idx).is_some() {
                return Err(CallGraphError::IndexFailed {
                    message: format!("duplicate function id {}", func.id),
                });
            }
            let name = self.names.intern(&func.name);
            let class = func.class_name.as_deref().map(|c| self.names.intern(c));
            self.functions.push(IndexedFunction {
                id: func.id.clone(),
                file: file_idx,
                name,
                class,
                is_exported: func.is_exported,
                is_constructor: func.is_constructor(),
                language: ef.language,
                local: local as u32,
            });
            self.by_name.entry(name).or_default().push(fn_idx);
            if func.is_exported {
                self.exported_by_name.entry(name).or_default().push(fn_idx);
            }
            match class {
                None => self
                    .free_by_file
                    .entry((file_idx, name))
                    .or_default()
                    .push(fn_idx),
                Some(class_name) => {
                    if let Some(&class_idx) = self.class_by_file.get(&(file_idx, class_name)) {
                        let class = &mut self.classes[class_idx as usize];
                        class.methods.entry(name).or_default().push(fn_idx);
                        if func.is_constructor() && class.constructor.is_none() {
                            class.constructor = Some(fn_idx);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn add_imports(&mut self, file_idx: FileIdx, modules: &ModuleResolver) {
        let ef = Arc::clone(&self.files[file_idx as usize]);
        let sources = ef
            .imports
            .iter()
            .map(|b| b.source.as_str())
            .chain(ef.call_sites.iter().filter_map(|c| c.import_source.as_deref()))
            .chain(ef.exports.iter().filter_map(|e| e.source.as_deref()));
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for source in sources {
            if !seen.insert(source) {
                continue;
            }
            if let Some(target) = modules.resolve(&ef.file, source, ef.language) {
                if let Some(&target_idx) = self.file_ids.get(&target) {
                    self.imports.insert((file_idx, source.to_string()), target_idx);
                }
            }
        }
    }

    fn add_exports(&mut self, file_idx: FileIdx) {
        let ef = Arc::clone(&self.files[file_idx as usize]);
        let mut exports = FileExports::default();

        for entry in &ef.exports {
            match &entry.source {
                Some(source) => {
                    let target = self.resolved_import(file_idx, source);
                    if entry.is_star() {
                        if let Some(target) = target {
                            if !exports.stars.contains(&target) {
                                exports.stars.push(target);
                            }
                        }
                    } else if let Some(local) = &entry.local {
                        exports
                            .named
                            .entry(entry.exported.clone())
                            .or_insert(ExportTarget::ReExport {
                                file: target,
                                name: local.clone(),
                            });
                    }
                }
                None => {
                    if let Some(local) = &entry.local {
                        exports
                            .named
                            .entry(entry.exported.clone())
                            .or_insert(ExportTarget::Local(local.clone()));
                    }
                }
            }
        }

        // Declarations exported in place (`export function`, Go capitals,
        // public Java classes).
        for func in ef.functions.iter().filter(|f| f.is_exported && !f.is_method()) {
            exports
                .named
                .entry(func.name.clone())
                .or_insert_with(|| ExportTarget::Local(func.name.clone()));
        }
        for class in ef.classes.iter().filter(|c| c.is_exported) {
            exports
                .named
                .entry(class.name.clone())
                .or_insert_with(|| ExportTarget::Local(class.name.clone()));
        }

        self.exports.push(exports);
    }

    fn add_di_registrations(&mut self, options: &IndexOptions) {
        for class_idx in 0..self.classes.len() {
            let class = self.extracted_class(class_idx as ClassIdx);
            for token in di_support::class_tokens(class, &options.extra_di_markers) {
                self.di.register(&token, DiTarget::Class(class_idx as ClassIdx));
            }
        }
        for fn_idx in 0..self.functions.len() {
            let func = self.extracted_function(fn_idx as FnIdx);
            if let Some(token) = di_support::provider_token(func) {
                self.di.register(&token, DiTarget::Provider(fn_idx as FnIdx));
            }
        }
    }

    // ---- accessors ----

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn files(&self) -> &[Arc<ExtractedFile>] {
        &self.files
    }

    pub fn name(&self, name: &str) -> Option<Spur> {
        self.names.get(name)
    }

    pub fn resolve_name(&self, name: Spur) -> &str {
        self.names.resolve(&name)
    }

    pub fn file_id(&self, file: &str) -> Option<FileIdx> {
        self.file_ids.get(file).copied()
    }

    pub fn file(&self, idx: FileIdx) -> &ExtractedFile {
        &self.files[idx as usize]
    }

    pub fn function(&self, idx: FnIdx) -> &IndexedFunction {
        &self.functions[idx as usize]
    }

    pub fn function_id(&self, id: &str) -> Option<FnIdx> {
        self.fn_ids.get(id).copied()
    }

    pub fn extracted_function(&self, idx: FnIdx) -> &ExtractedFunction {
        let f = &self.functions[idx as usize];
        &self.files[f.file as usize].functions[f.local as usize]
    }

    pub fn class(&self, idx: ClassIdx) -> &IndexedClass {
        &self.classes[idx as usize]
    }

    pub fn extracted_class(&self, idx: ClassIdx) -> &ExtractedClass {
        let c = &self.classes[idx as usize];
        &self.files[c.file as usize].classes[c.local as usize]
    }

    pub fn di(&self) -> &DiRegistry {
        &self.di
    }

    /// Every function named `name`, ordered by file path then declaration.
    pub fn candidates(&self, name: &str) -> &[FnIdx] {
        self.name(name)
            .and_then(|n| self.by_name.get(&n))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Exported functions named `name`, same order as [`Self::candidates`].
    pub fn exported_candidates(&self, name: &str) -> &[FnIdx] {
        self.name(name)
            .and_then(|n| self.exported_by_name.get(&n))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn free_function(&self, file: FileIdx, name: &str) -> Option<FnIdx> {
        let name = self.name(name)?;
        self.free_by_file.get(&(file, name)).and_then(|v| v.first().copied())
    }

    pub fn class_in_file(&self, file: FileIdx, name: &str) -> Option<ClassIdx> {
        let name = self.name(name)?;
        self.class_by_file.get(&(file, name)).copied()
    }

    /// Method declared directly on `class`.
    pub fn method_of(&self, class: ClassIdx, method: &str) -> Option<FnIdx> {
        let name = self.name(method)?;
        self.classes[class as usize]
            .methods
            .get(&name)
            .and_then(|v| v.first().copied())
    }

    pub fn constructor_of(&self, class: ClassIdx) -> Option<FnIdx> {
        self.classes[class as usize].constructor
    }

    /// File an import source resolves to from `file`.
    pub fn resolved_import(&self, file: FileIdx, source: &str) -> Option<FileIdx> {
        self.imports.get(&(file, source.to_string())).copied()
    }

    /// Every resolved import source, by path. Sources that resolve to no
    /// project file are absent.
    pub fn import_map(&self) -> ImportMap {
        let mut map = ImportMap::new();
        for ((from, source), to) in &self.imports {
            map.entry(self.files[*from as usize].file.clone())
                .or_default()
                .insert(source.clone(), self.files[*to as usize].file.clone());
        }
        map
    }

    /// Follow `file`'s exports (and re-exports, up to a bounded depth) to
    /// the symbol published as `name`.
    pub fn resolve_export(&self, file: FileIdx, name: &str) -> Option<Symbol> {
        self.resolve_export_at(file, name, 0)
    }

    fn resolve_export_at(&self, file: FileIdx, name: &str, depth: usize) -> Option<Symbol> {
        if depth > MAX_REEXPORT_DEPTH {
            return None;
        }
        let exports = &self.exports[file as usize];
        match exports.named.get(name) {
            Some(ExportTarget::Local(local)) => return self.symbol_in_file(file, local),
            Some(ExportTarget::ReExport {
                file: Some(target),
                name: inner,
            }) => return self.resolve_export_at(*target, inner, depth + 1),
            Some(ExportTarget::ReExport { file: None, .. }) => return None,
            None => {}
        }
        if name == DEFAULT_IMPORT {
            return None;
        }
        exports
            .stars
            .iter()
            .find_map(|star| self.resolve_export_at(*star, name, depth + 1))
    }

    fn symbol_in_file(&self, file: FileIdx, name: &str) -> Option<Symbol> {
        self.free_function(file, name)
            .map(Symbol::Function)
            .or_else(|| self.class_in_file(file, name).map(Symbol::Class))
    }

    /// Locate the class a type name refers to from within `context`: a class
    /// declared in that file, then one reached through its imports, then the
    /// only class with that name in the project.
    pub fn find_class(&self, context: FileIdx, name: &str) -> Option<ClassIdx> {
        if let Some(class) = self.class_in_file(context, name) {
            return Some(class);
        }
        let ef = &self.files[context as usize];
        if let Some(binding) = ef.binding(name) {
            if let Some(target) = self.resolved_import(context, &binding.source) {
                let found = if binding.is_namespace() {
                    self.class_in_file(target, name)
                } else {
                    match self.resolve_export(target, &binding.imported) {
                        Some(Symbol::Class(c)) => Some(c),
                        _ => None,
                    }
                };
                if found.is_some() {
                    return found;
                }
            }
        }
        let name = self.name(name)?;
        match self.classes_by_name.get(&name).map(|v| v.as_slice()) {
            Some([only]) => Some(*only),
            _ => None,
        }
    }

    /// Method reachable from `class` through its ancestors (parent first,
    /// then interfaces, depth-first). The class's own methods are not
    /// considered.
    pub fn inherited_method(&self, class: ClassIdx, method: &str) -> Option<FnIdx> {
        let mut visited: FxHashSet<ClassIdx> = FxHashSet::default();
        visited.insert(class);
        self.inherited_method_at(class, method, &mut visited, 0)
    }

    fn inherited_method_at(
        &self,
        class: ClassIdx,
        method: &str,
        visited: &mut FxHashSet<ClassIdx>,
        depth: usize,
    ) -> Option<FnIdx> {
        if depth >= MAX_ANCESTOR_DEPTH {
            return None;
        }
        let context = self.classes[class as usize].file;
        let supertypes: Vec<&str> = self.extracted_class(class).supertypes().collect();
        for sup in supertypes {
            let Some(ancestor) = self.find_class(context, sup) else {
                continue;
            };
            if !visited.insert(ancestor) {
                continue;
            }
            if let Some(found) = self.method_of(ancestor, method) {
                return Some(found);
            }
            if let Some(found) = self.inherited_method_at(ancestor, method, visited, depth + 1) {
                return Some(found);
            }
        }
        None
    }

    /// Every ancestor of `class`, nearest first.
    pub fn ancestors(&self, class: ClassIdx) -> Vec<ClassIdx> {
        let mut out = Vec::new();
        let mut visited: FxHashSet<ClassIdx> = FxHashSet::default();
        visited.insert(class);
        let mut stack = vec![(class, 0usize)];
        while let Some((current, depth)) = stack.pop() {
            if depth >= MAX_ANCESTOR_DEPTH {
                continue;
            }
            let context = self.classes[current as usize].file;
            for sup in self.extracted_class(current).supertypes() {
                if let Some(ancestor) = self.find_class(context, sup) {
                    if visited.insert(ancestor) {
                        out.push(ancestor);
                        stack.push((ancestor, depth + 1));
                    }
                }
            }
        }
        out
    }

    /// Field type declared on `class` or an ancestor.
    pub fn field_type(&self, class: ClassIdx, field: &str) -> Option<&str> {
        if let Some(ty) = self.extracted_class(class).field_type(field) {
            return Some(ty);
        }
        self.ancestors(class)
            .into_iter()
            .find_map(|a| self.extracted_class(a).field_type(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_graph::extractor::{extract_file, ExtractOptions};
    use crate::parsers::types::{
        ClassInfo, ExportInfo, FunctionInfo, ImportInfo, ImportSpecifier, ParseResult,
    };

    fn extracted(pr: ParseResult) -> Arc<ExtractedFile> {
        Arc::new(extract_file(&pr, &ExtractOptions::default()).unwrap())
    }

    fn free(file: &str, names: &[&str], exported: bool) -> ParseResult {
        let mut pr = ParseResult::new(file);
        pr.functions = names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                let mut f = FunctionInfo::new(*n, i as u32 * 10 + 1, i as u32 * 10 + 5);
                f.is_exported = exported;
                f
            })
            .collect();
        pr
    }

    #[test]
    fn candidates_are_ordered_by_file() {
        let files = vec![
            extracted(free("z.ts", &["dup"], true)),
            extracted(free("a.ts", &["dup"], false)),
        ];
        let idx = ResolutionIndex::build(&files, &IndexOptions::default()).unwrap();
        let ids: Vec<&str> = idx
            .candidates("dup")
            .iter()
            .map(|f| idx.function(*f).id.as_str())
            .collect();
        assert_eq!(ids, vec!["a.ts::dup", "z.ts::dup"]);
        assert_eq!(idx.exported_candidates("dup").len(), 1);
    }

    #[test]
    fn duplicate_file_fails_the_build() {
        let files = vec![extracted(free("a.ts", &["f"], true)), extracted(free("a.ts", &["g"], true))];
        assert!(matches!(
            ResolutionIndex::build(&files, &IndexOptions::default()),
            Err(CallGraphError::IndexFailed { .. })
        ));
    }

    #[test]
    fn star_reexports_are_followed() {
        let mut barrel = ParseResult::new("src/lib/index.ts");
        barrel.exports = vec![ExportInfo {
            name: None,
            source: Some("./impl".into()),
            ..Default::default()
        }];
        let files = vec![extracted(barrel), extracted(free("src/lib/impl.ts", &["work"], true))];
        let idx = ResolutionIndex::build(&files, &IndexOptions::default()).unwrap();
        let barrel_idx = idx.file_id("src/lib/index.ts").unwrap();
        let Some(Symbol::Function(f)) = idx.resolve_export(barrel_idx, "work") else {
            panic!("expected function");
        };
        assert_eq!(idx.function(f).id, "src/lib/impl.ts::work");
    }

    #[test]
    fn reexport_cycles_terminate() {
        let mut a = ParseResult::new("a.ts");
        a.exports = vec![ExportInfo {
            name: None,
            source: Some("./b".into()),
            ..Default::default()
        }];
        let mut b = ParseResult::new("b.ts");
        b.exports = vec![ExportInfo {
            name: None,
            source: Some("./a".into()),
            ..Default::default()
        }];
        let files = vec![extracted(a), extracted(b)];
        let idx = ResolutionIndex::build(&files, &IndexOptions::default()).unwrap();
        assert_eq!(idx.resolve_export(0, "missing"), None);
    }

    #[test]
    fn inherited_method_walks_parent_chain() {
        let mut pr = ParseResult::new("src/models.ts");
        pr.classes = vec![
            ClassInfo {
                name: "Base".into(),
                methods: vec![FunctionInfo::new("save", 2, 4)],
                ..Default::default()
            },
            ClassInfo {
                name: "Mid".into(),
                extends: Some("Base".into()),
                methods: vec![FunctionInfo::new("other", 6, 8)],
                ..Default::default()
            },
            ClassInfo {
                name: "Leaf".into(),
                extends: Some("Mid".into()),
                ..Default::default()
            },
        ];
        let idx = ResolutionIndex::build(&[extracted(pr)], &IndexOptions::default()).unwrap();
        let leaf = idx.class_in_file(0, "Leaf").unwrap();
        let found = idx.inherited_method(leaf, "save").unwrap();
        assert_eq!(idx.function(found).id, "src/models.ts::Base.save");
        assert_eq!(idx.ancestors(leaf).len(), 2);
    }

    #[test]
    fn find_class_through_import_binding() {
        let mut svc = ParseResult::new("src/svc.ts");
        svc.classes = vec![ClassInfo {
            name: "UserService".into(),
            is_exported: true,
            ..Default::default()
        }];
        let mut other = ParseResult::new("src/other.ts");
        other.classes = vec![ClassInfo {
            name: "UserService".into(),
            ..Default::default()
        }];
        let mut ctl = ParseResult::new("src/ctl.ts");
        ctl.imports = vec![ImportInfo {
            source: "./svc".into(),
            specifiers: [ImportSpecifier {
                name: "UserService".into(),
                alias: None,
            }]
            .into_iter()
            .collect(),
            ..Default::default()
        }];
        let files = vec![extracted(svc), extracted(other), extracted(ctl)];
        let idx = ResolutionIndex::build(&files, &IndexOptions::default()).unwrap();
        let ctl_idx = idx.file_id("src/ctl.ts").unwrap();
        let class = idx.find_class(ctl_idx, "UserService").unwrap();
        assert_eq!(idx.file(idx.class(class).file).file, "src/svc.ts");

        // Without the import the name is ambiguous project-wide.
        let unrelated = free("src/x.ts", &["f"], false);
        let files2 = vec![files[0].clone(), files[1].clone(), extracted(unrelated)];
        let idx2 = ResolutionIndex::build(&files2, &IndexOptions::default()).unwrap();
        assert_eq!(idx2.find_class(idx2.file_id("src/x.ts").unwrap(), "UserService"), None);
    }
}
