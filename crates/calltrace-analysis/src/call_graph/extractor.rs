//! Extractor: turns one parse result into normalized functions, call sites,
//! import bindings, exports, and data-access mentions.
//!
//! Everything downstream of this module is language-agnostic. Receiver
//! spellings (`this`, `self`, `@field`), import shapes, and type annotations
//! are folded into the same normalized records here.

use calltrace_core::errors::ExtractionError;
use calltrace_core::types::collections::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::parsers::types::{
    CallSite, ClassInfo, ClassKind, DecoratorInfo, ExportInfo, FunctionInfo, ImportInfo,
    ParseResult, Visibility,
};
use crate::scanner::language_detect::Language;
use crate::scanner::types::normalize_path_str;

use super::data_access::{self, DataAccessMention};

/// Import name recorded for a namespace binding (`import * as ns`).
pub const NAMESPACE_IMPORT: &str = "*";
/// Import name recorded for a default binding (`import x from`).
pub const DEFAULT_IMPORT: &str = "default";

/// Per-file extraction bundle. Serialized into storage so unchanged files can
/// rejoin the resolution index without being re-parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFile {
    pub file: String,
    pub language: Language,
    pub content_hash: u64,
    pub functions: Vec<ExtractedFunction>,
    pub classes: Vec<ExtractedClass>,
    pub call_sites: Vec<NormalizedCallSite>,
    pub imports: Vec<ImportBinding>,
    pub exports: Vec<ExportEntry>,
    pub data_access: Vec<DataAccessMention>,
    /// Calls at module level, outside every function body.
    pub orphan_call_sites: usize,
}

impl ExtractedFile {
    pub fn function(&self, id: &str) -> Option<&ExtractedFunction> {
        self.functions.iter().find(|f| f.id == id)
    }

    pub fn class(&self, name: &str) -> Option<&ExtractedClass> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Import binding for a local name.
    pub fn binding(&self, local: &str) -> Option<&ImportBinding> {
        self.imports.iter().find(|b| b.local == local)
    }
}

/// A normalized function or method declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFunction {
    /// `file::qualified_name`, with a `#L<line>` suffix when two
    /// declarations in one file share a qualified name.
    pub id: String,
    pub name: String,
    pub qualified_name: String,
    pub class_name: Option<String>,
    pub line: u32,
    pub end_line: u32,
    pub is_exported: bool,
    pub visibility: Visibility,
    pub signature_hash: u64,
    pub body_hash: u64,
    pub return_type: Option<String>,
    pub decorators: Vec<DecoratorInfo>,
    pub parameters: Vec<ExtractedParameter>,
}

impl ExtractedFunction {
    pub fn is_method(&self) -> bool {
        self.class_name.is_some()
    }

    pub fn is_constructor(&self) -> bool {
        self.class_name.is_some() && is_constructor_name(&self.name)
    }

    pub fn parameter_type(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.type_name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedParameter {
    pub name: String,
    /// Normalized type name (generics and nullability stripped).
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedClass {
    pub name: String,
    pub parent: Option<String>,
    pub implements: Vec<String>,
    pub kind: ClassKind,
    pub is_exported: bool,
    /// Field name → normalized type, from properties and constructor parameters.
    pub field_types: Vec<(String, String)>,
    pub decorators: Vec<DecoratorInfo>,
}

impl ExtractedClass {
    pub fn field_type(&self, field: &str) -> Option<&str> {
        self.field_types
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, ty)| ty.as_str())
    }

    /// Direct supertypes: the parent first, then implemented interfaces.
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.parent
            .iter()
            .map(|p| p.as_str())
            .chain(self.implements.iter().map(|i| i.as_str()))
    }
}

/// A local name bound by an import statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    pub local: String,
    pub source: String,
    /// Exported name in the source module; `*` or `default` for namespace
    /// and default imports.
    pub imported: String,
    pub line: u32,
}

impl ImportBinding {
    pub fn is_namespace(&self) -> bool {
        self.imported == NAMESPACE_IMPORT
    }
}

/// A name a file makes visible to importers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    /// Name seen by importers; `default` for default exports, `*` for a star
    /// re-export.
    pub exported: String,
    /// Local (or, for re-exports, source-module) name.
    pub local: Option<String>,
    /// Module a re-export forwards to.
    pub source: Option<String>,
}

impl ExportEntry {
    pub fn is_star(&self) -> bool {
        self.exported == NAMESPACE_IMPORT && self.source.is_some()
    }
}

/// Normalized call receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Receiver {
    /// `this` / `self` / `cls`.
    SelfRef,
    /// `super`.
    Super,
    /// A field of the current instance: `this.repo`, `self.repo`, `@repo`.
    SelfField(String),
    /// Any other expression, as written (`api`, `prisma.user`).
    Named(String),
}

impl Receiver {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let receiver = match raw {
            "this" | "self" | "cls" | "Self" | "$this" | "me" => Self::SelfRef,
            "super" | "base" | "parent" | "super()" => Self::Super,
            _ => {
                let field = ["this.", "self.", "$this->", "@"]
                    .iter()
                    .find_map(|prefix| raw.strip_prefix(prefix))
                    .filter(|rest| is_identifier(rest));
                match field {
                    Some(name) => Self::SelfField(name.to_string()),
                    None => Self::Named(raw.to_string()),
                }
            }
        };
        Some(receiver)
    }

    pub fn named(&self) -> Option<&str> {
        match self {
            Self::Named(n) => Some(n),
            _ => None,
        }
    }
}

/// A call expression attributed to its innermost enclosing function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedCallSite {
    /// Id of the calling function.
    pub caller: String,
    pub callee_name: String,
    pub receiver: Option<Receiver>,
    /// Module the callee is bound to through an import, as written.
    pub import_source: Option<String>,
    /// Name the callee has in `import_source` (`default` for default imports).
    pub imported_name: Option<String>,
    /// `ns.fn()` where `ns` is a namespace import.
    pub namespace_call: bool,
    pub line: u32,
    pub argument_count: u8,
    pub is_constructor: bool,
}

/// Extraction knobs taken from configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Skip files reporting more syntax errors than this.
    pub max_syntax_errors: Option<u32>,
}

/// Normalize one parse result.
///
/// Fails only for inputs that cannot produce a consistent bundle; the caller
/// records the failure and leaves the file out of the build.
pub fn extract_file(
    pr: &ParseResult,
    options: &ExtractOptions,
) -> Result<ExtractedFile, ExtractionError> {
    let file = normalize_path_str(&pr.file);
    if file.is_empty() {
        return Err(ExtractionError::EmptyPath);
    }
    if let Some(limit) = options.max_syntax_errors {
        if pr.error_count > limit {
            return Err(ExtractionError::TooManySyntaxErrors {
                file,
                error_count: pr.error_count,
            });
        }
    }

    let exports = normalize_exports(&pr.exports);
    let locally_exported: FxHashSet<&str> = exports
        .iter()
        .filter(|e| e.source.is_none())
        .filter_map(|e| e.local.as_deref())
        .collect();

    let mut functions = Vec::with_capacity(pr.functions.len());
    let mut used_ids: FxHashSet<String> = FxHashSet::default();

    for fi in &pr.functions {
        let exported = fi.is_exported || locally_exported.contains(fi.name.as_str());
        let qualified = fi.qualified_name.clone().unwrap_or_else(|| fi.name.clone());
        functions.push(normalize_function(
            &file, fi, qualified, None, exported, &mut used_ids,
        )?);
    }

    let mut classes = Vec::with_capacity(pr.classes.len());
    for class in &pr.classes {
        let class_exported = class.is_exported || locally_exported.contains(class.name.as_str());
        for method in &class.methods {
            if method.is_abstract {
                continue;
            }
            let exported =
                method.is_exported || (class_exported && method.visibility == Visibility::Public);
            let qualified = method
                .qualified_name
                .clone()
                .unwrap_or_else(|| format!("{}.{}", class.name, method.name));
            functions.push(normalize_function(
                &file,
                method,
                qualified,
                Some(class.name.clone()),
                exported,
                &mut used_ids,
            )?);
        }
        classes.push(normalize_class(class, class_exported));
    }

    let imports = normalize_imports(&pr.imports);
    let (call_sites, data_access, orphan_call_sites) =
        normalize_call_sites(&pr.call_sites, &functions, &imports);

    Ok(ExtractedFile {
        file,
        language: pr.language,
        content_hash: pr.content_hash,
        functions,
        classes,
        call_sites,
        imports,
        exports,
        data_access,
        orphan_call_sites,
    })
}

fn normalize_function(
    file: &str,
    fi: &FunctionInfo,
    qualified_name: String,
    class_name: Option<String>,
    is_exported: bool,
    used_ids: &mut FxHashSet<String>,
) -> Result<ExtractedFunction, ExtractionError> {
    if fi.end_line < fi.line {
        return Err(ExtractionError::InvalidRange {
            file: file.to_string(),
            function: qualified_name,
            start: fi.line,
            end: fi.end_line,
        });
    }

    let mut id = format!("{file}::{qualified_name}");
    if used_ids.contains(&id) {
        id = format!("{file}::{qualified_name}#L{}", fi.line);
        if used_ids.contains(&id) {
            id = format!("{file}::{qualified_name}#L{}c{}", fi.line, fi.column);
        }
    }
    used_ids.insert(id.clone());

    let parameters: Vec<ExtractedParameter> = fi
        .parameters
        .iter()
        .map(|p| ExtractedParameter {
            name: p.name.clone(),
            type_name: p.type_annotation.as_deref().and_then(normalize_type_name),
        })
        .collect();

    let signature_hash = if fi.signature_hash != 0 {
        fi.signature_hash
    } else {
        fallback_signature_hash(&qualified_name, fi)
    };

    Ok(ExtractedFunction {
        id,
        name: fi.name.clone(),
        qualified_name,
        class_name,
        line: fi.line,
        end_line: fi.end_line,
        is_exported,
        visibility: fi.visibility,
        signature_hash,
        body_hash: fi.body_hash,
        return_type: fi.return_type.clone(),
        decorators: fi.decorators.clone(),
        parameters,
    })
}

/// Hash of the callable shape, used when the parser did not supply one.
fn fallback_signature_hash(qualified_name: &str, fi: &FunctionInfo) -> u64 {
    let mut buf = String::with_capacity(64);
    buf.push_str(qualified_name);
    buf.push('(');
    for p in &fi.parameters {
        buf.push_str(&p.name);
        buf.push(':');
        buf.push_str(p.type_annotation.as_deref().unwrap_or("_"));
        if p.is_rest {
            buf.push_str("...");
        }
        buf.push(',');
    }
    buf.push(')');
    buf.push_str(fi.return_type.as_deref().unwrap_or(""));
    if fi.is_async {
        buf.push_str(" async");
    }
    xxh3_64(buf.as_bytes())
}

fn normalize_class(class: &ClassInfo, is_exported: bool) -> ExtractedClass {
    let mut field_types: Vec<(String, String)> = class
        .properties
        .iter()
        .filter_map(|p| {
            let ty = p.type_annotation.as_deref().and_then(normalize_type_name)?;
            Some((p.name.clone(), ty))
        })
        .collect();

    // Constructor parameters double as injected fields.
    for ctor in class.methods.iter().filter(|m| is_constructor_name(&m.name)) {
        for p in &ctor.parameters {
            if field_types.iter().any(|(name, _)| *name == p.name) {
                continue;
            }
            if let Some(ty) = p.type_annotation.as_deref().and_then(normalize_type_name) {
                field_types.push((p.name.clone(), ty));
            }
        }
    }

    ExtractedClass {
        name: class.name.clone(),
        parent: class.extends.as_deref().and_then(normalize_type_name),
        implements: class
            .implements
            .iter()
            .filter_map(|i| normalize_type_name(i))
            .collect(),
        kind: class.class_kind,
        is_exported,
        field_types,
        decorators: class.decorators.clone(),
    }
}

fn normalize_imports(imports: &[ImportInfo]) -> Vec<ImportBinding> {
    let mut bindings = Vec::new();
    for import in imports {
        if import.source.is_empty() {
            continue;
        }
        if import.specifiers.is_empty() {
            // `import utils` / `require('./utils')`: the module itself is bound.
            if let Some(local) = module_local_name(&import.source) {
                bindings.push(ImportBinding {
                    local,
                    source: import.source.clone(),
                    imported: NAMESPACE_IMPORT.to_string(),
                    line: import.line,
                });
            }
            continue;
        }
        for spec in &import.specifiers {
            let local = match (spec.name.as_str(), spec.alias.as_deref()) {
                (_, Some(alias)) => alias.to_string(),
                (NAMESPACE_IMPORT, None) => match module_local_name(&import.source) {
                    Some(local) => local,
                    None => continue,
                },
                (DEFAULT_IMPORT, None) => continue,
                (name, None) => name.to_string(),
            };
            bindings.push(ImportBinding {
                local,
                source: import.source.clone(),
                imported: spec.name.clone(),
                line: import.line,
            });
        }
    }
    bindings
}

/// Last module segment: `./utils/strings.ts` → `strings`, `os.path` → `path`.
fn module_local_name(source: &str) -> Option<String> {
    let last = source
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source);
    let last = last.rsplit("::").next().unwrap_or(last);
    let stem = match last.rsplit_once('.') {
        Some((stem, ext)) if is_known_extension(ext) => stem,
        _ => last.rsplit('.').next().unwrap_or(last),
    };
    let stem = stem.trim_start_matches('@');
    if is_identifier(stem) {
        Some(stem.to_string())
    } else {
        None
    }
}

fn is_known_extension(ext: &str) -> bool {
    Language::from_extension(Some(ext)).is_some()
}

fn normalize_exports(exports: &[ExportInfo]) -> Vec<ExportEntry> {
    let mut entries = Vec::with_capacity(exports.len());
    for export in exports {
        let name = export.name.as_deref().filter(|n| !n.is_empty());
        let entry = match (&export.source, name) {
            (Some(source), None) | (Some(source), Some(NAMESPACE_IMPORT)) => ExportEntry {
                exported: NAMESPACE_IMPORT.to_string(),
                local: None,
                source: Some(source.clone()),
            },
            (source, Some(name)) => ExportEntry {
                exported: if export.is_default {
                    DEFAULT_IMPORT.to_string()
                } else {
                    name.to_string()
                },
                local: Some(name.to_string()),
                source: source.clone(),
            },
            (None, None) => continue,
        };
        entries.push(entry);
    }
    entries
}

/// Attribute call sites to callers and derive data-access mentions.
/// Returns `(call_sites, data_access, orphans)`.
fn normalize_call_sites(
    raw: &[CallSite],
    functions: &[ExtractedFunction],
    imports: &[ImportBinding],
) -> (Vec<NormalizedCallSite>, Vec<DataAccessMention>, usize) {
    let bindings: FxHashMap<&str, &ImportBinding> =
        imports.iter().map(|b| (b.local.as_str(), b)).collect();

    let mut call_sites = Vec::with_capacity(raw.len());
    let mut data_access = Vec::new();
    let mut orphans = 0usize;

    for cs in raw {
        if cs.callee_name.is_empty() {
            continue;
        }
        let Some(caller) = innermost_function(functions, cs.line) else {
            orphans += 1;
            continue;
        };
        let receiver = cs.receiver.as_deref().and_then(Receiver::parse);

        let mut import_source = None;
        let mut imported_name = None;
        let mut namespace_call = false;
        match &receiver {
            None => {
                if let Some(binding) = bindings.get(cs.callee_name.as_str()) {
                    if !binding.is_namespace() {
                        import_source = Some(binding.source.clone());
                        imported_name = Some(binding.imported.clone());
                    }
                }
            }
            Some(Receiver::Named(name)) => {
                if let Some(binding) = bindings.get(name.as_str()) {
                    if binding.is_namespace() {
                        import_source = Some(binding.source.clone());
                        imported_name = Some(cs.callee_name.clone());
                        namespace_call = true;
                    }
                }
            }
            Some(_) => {}
        }
        if import_source.is_none() && receiver.is_none() {
            if let Some(source) = cs.import_source.as_ref().filter(|s| !s.is_empty()) {
                import_source = Some(source.clone());
                imported_name = Some(cs.callee_name.clone());
            }
        }

        if let Some(mention) =
            data_access::detect(&caller.id, &cs.callee_name, cs.receiver.as_deref(), cs.line)
        {
            data_access.push(mention);
        }

        call_sites.push(NormalizedCallSite {
            caller: caller.id.clone(),
            callee_name: cs.callee_name.clone(),
            receiver,
            import_source,
            imported_name,
            namespace_call,
            line: cs.line,
            argument_count: cs.argument_count,
            is_constructor: cs.is_constructor,
        });
    }

    (call_sites, data_access, orphans)
}

/// Smallest function span containing `line`; nested functions win over
/// their enclosing function.
fn innermost_function(functions: &[ExtractedFunction], line: u32) -> Option<&ExtractedFunction> {
    functions
        .iter()
        .filter(|f| f.line <= line && line <= f.end_line)
        .min_by(|a, b| {
            (a.end_line - a.line)
                .cmp(&(b.end_line - b.line))
                .then(b.line.cmp(&a.line))
                .then(a.id.cmp(&b.id))
        })
}

pub fn is_constructor_name(name: &str) -> bool {
    matches!(name, "constructor" | "__init__" | "new" | "init" | "initialize" | "__construct")
}

/// Reduce a type annotation to a bare type name:
/// `Repository<User>` → `Repository`, `?Logger` → `Logger`,
/// `&mut Store` → `Store`, `models.User | None` → `User`.
pub fn normalize_type_name(raw: &str) -> Option<String> {
    let mut s = raw.trim();
    for prefix in ["&mut ", "&", "*", "mut ", "readonly ", "const ", "?", "@"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.trim_start();
        }
    }
    let s = s.split('|').next().unwrap_or(s).trim();
    let s = s.split(['<', '[', '(']).next().unwrap_or(s).trim();
    let s = s.trim_end_matches(['?', '!']).trim();
    let s = s.rsplit("::").next().unwrap_or(s);
    let s = s.rsplit('.').next().unwrap_or(s);
    if is_identifier(s) {
        Some(s.to_string())
    } else {
        None
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::types::{ImportSpecifier, ParameterInfo, PropertyInfo};

    fn func(name: &str, line: u32, end: u32) -> FunctionInfo {
        FunctionInfo::new(name, line, end)
    }

    #[test]
    fn call_sites_attach_to_innermost_function() {
        let mut pr = ParseResult::new("src/a.ts");
        pr.functions = vec![func("outer", 1, 20), func("inner", 5, 8)];
        pr.call_sites = vec![CallSite::new("x", 6), CallSite::new("y", 12), CallSite::new("z", 30)];

        let ef = extract_file(&pr, &ExtractOptions::default()).unwrap();
        assert_eq!(ef.call_sites[0].caller, "src/a.ts::inner");
        assert_eq!(ef.call_sites[1].caller, "src/a.ts::outer");
        assert_eq!(ef.orphan_call_sites, 1);
    }

    #[test]
    fn duplicate_names_get_line_suffix() {
        let mut pr = ParseResult::new("a.py");
        pr.functions = vec![func("f", 1, 2), func("f", 4, 5)];
        let ef = extract_file(&pr, &ExtractOptions::default()).unwrap();
        assert_eq!(ef.functions[0].id, "a.py::f");
        assert_eq!(ef.functions[1].id, "a.py::f#L4");
    }

    #[test]
    fn inverted_range_fails_the_file() {
        let mut pr = ParseResult::new("a.ts");
        pr.functions = vec![func("f", 9, 2)];
        let err = extract_file(&pr, &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidRange { .. }));
    }

    #[test]
    fn syntax_error_limit_is_enforced() {
        let mut pr = ParseResult::new("a.ts");
        pr.error_count = 12;
        let opts = ExtractOptions {
            max_syntax_errors: Some(10),
        };
        assert!(matches!(
            extract_file(&pr, &opts),
            Err(ExtractionError::TooManySyntaxErrors { error_count: 12, .. })
        ));
    }

    #[test]
    fn imports_bind_callee_and_namespace_calls() {
        let mut pr = ParseResult::new("src/a.ts");
        pr.functions = vec![func("main", 1, 10)];
        pr.imports = vec![
            ImportInfo {
                source: "./b".into(),
                specifiers: [ImportSpecifier {
                    name: "bar".into(),
                    alias: Some("baz".into()),
                }]
                .into_iter()
                .collect(),
                ..Default::default()
            },
            ImportInfo {
                source: "./utils".into(),
                specifiers: [ImportSpecifier {
                    name: "*".into(),
                    alias: Some("u".into()),
                }]
                .into_iter()
                .collect(),
                ..Default::default()
            },
        ];
        let mut ns_call = CallSite::new("slugify", 4);
        ns_call.receiver = Some("u".into());
        pr.call_sites = vec![CallSite::new("baz", 3), ns_call];

        let ef = extract_file(&pr, &ExtractOptions::default()).unwrap();
        let aliased = &ef.call_sites[0];
        assert_eq!(aliased.import_source.as_deref(), Some("./b"));
        assert_eq!(aliased.imported_name.as_deref(), Some("bar"));
        assert!(!aliased.namespace_call);

        let ns = &ef.call_sites[1];
        assert!(ns.namespace_call);
        assert_eq!(ns.import_source.as_deref(), Some("./utils"));
        assert_eq!(ns.imported_name.as_deref(), Some("slugify"));
    }

    #[test]
    fn receivers_are_normalized() {
        assert_eq!(Receiver::parse("self"), Some(Receiver::SelfRef));
        assert_eq!(
            Receiver::parse("this.repo"),
            Some(Receiver::SelfField("repo".into()))
        );
        assert_eq!(Receiver::parse("@repo"), Some(Receiver::SelfField("repo".into())));
        assert_eq!(Receiver::parse("super"), Some(Receiver::Super));
        assert_eq!(
            Receiver::parse("this.a.b"),
            Some(Receiver::Named("this.a.b".into()))
        );
    }

    #[test]
    fn class_fields_include_constructor_parameters() {
        let mut pr = ParseResult::new("src/svc.ts");
        let mut ctor = func("constructor", 2, 4);
        ctor.parameters.push(ParameterInfo {
            name: "repo".into(),
            type_annotation: Some("UserRepository".into()),
            ..Default::default()
        });
        pr.classes = vec![ClassInfo {
            name: "UserService".into(),
            methods: vec![ctor],
            properties: vec![PropertyInfo {
                name: "cache".into(),
                type_annotation: Some("Map<string, User>".into()),
                ..Default::default()
            }],
            ..Default::default()
        }];
        let ef = extract_file(&pr, &ExtractOptions::default()).unwrap();
        let class = ef.class("UserService").unwrap();
        assert_eq!(class.field_type("repo"), Some("UserRepository"));
        assert_eq!(class.field_type("cache"), Some("Map"));
        assert_eq!(ef.functions[0].id, "src/svc.ts::UserService.constructor");
        assert!(ef.functions[0].is_constructor());
    }

    #[test]
    fn type_names_are_reduced() {
        assert_eq!(normalize_type_name("Repository<User>").as_deref(), Some("Repository"));
        assert_eq!(normalize_type_name("&mut Store").as_deref(), Some("Store"));
        assert_eq!(normalize_type_name("models.User | None").as_deref(), Some("User"));
        assert_eq!(normalize_type_name("?Logger").as_deref(), Some("Logger"));
        assert_eq!(normalize_type_name("{ a: 1 }"), None);
    }

    #[test]
    fn abstract_methods_are_not_functions() {
        let mut pr = ParseResult::new("src/base.ts");
        let mut m = func("run", 2, 2);
        m.is_abstract = true;
        pr.classes = vec![ClassInfo {
            name: "Base".into(),
            methods: vec![m, func("helper", 3, 5)],
            ..Default::default()
        }];
        let ef = extract_file(&pr, &ExtractOptions::default()).unwrap();
        assert_eq!(ef.functions.len(), 1);
        assert_eq!(ef.functions[0].qualified_name, "Base.helper");
    }

    #[test]
    fn explicit_export_marks_function_exported() {
        let mut pr = ParseResult::new("src/b.ts");
        pr.functions = vec![func("bar", 1, 3)];
        pr.exports = vec![ExportInfo {
            name: Some("bar".into()),
            ..Default::default()
        }];
        let ef = extract_file(&pr, &ExtractOptions::default()).unwrap();
        assert!(ef.functions[0].is_exported);
    }
}
