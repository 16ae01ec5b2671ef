//! 6 resolution strategies: SameFile, MethodCall, DiInjection, ImportBased, ExportBased, Fuzzy.
//! First match wins; strategies are tried in order of decreasing confidence
//! and never blended.

use std::collections::BTreeMap;

use calltrace_core::config::ResolutionConfig;
use calltrace_core::constants::{
    DEFAULT_LOW_RATE_THRESHOLD, DEFAULT_REGRESSION_TOLERANCE, MIN_CALL_SITES_FOR_REGRESSION,
};
use calltrace_core::types::collections::FxHashSet;

use crate::scanner::language_detect::Language;

use super::extractor::{ExtractedFunction, NormalizedCallSite, Receiver};
use super::import_paths::common_dir_depth;
use super::index::{ClassIdx, FileIdx, FnIdx, ResolutionIndex, Symbol};
use super::types::{Resolution, AMBIGUOUS_EXPORT_CONFIDENCE, INHERITED_METHOD_CONFIDENCE};

/// Names too common for fuzzy resolution; matching these produces false positives.
const FUZZY_BLOCKLIST: &[&str] = &[
    "get", "set", "run", "init", "start", "stop", "open", "close",
    "read", "write", "create", "update", "delete", "find", "filter",
    "map", "reduce", "forEach", "push", "pop", "add", "remove",
    "send", "receive", "call", "apply", "bind", "new", "make",
    "build", "parse", "format", "render", "handle", "process",
    "execute", "dispatch", "emit", "on", "off", "then", "catch",
    "resolve", "reject", "next", "done", "log", "print", "debug",
    "error", "warn", "info", "toString", "valueOf", "clone",
    "equals", "compare", "sort", "merge", "split", "join", "trim",
    "replace", "match", "test", "check", "validate", "verify",
    "load", "save", "reset", "clear", "flush", "sync", "async",
    "wait", "sleep", "yield", "return", "throw", "raise",
];

/// Check if a name is on the built-in fuzzy blocklist.
pub fn is_fuzzy_blocked(name: &str) -> bool {
    FUZZY_BLOCKLIST.iter().any(|b| b.eq_ignore_ascii_case(name))
}

/// Language family groupings: cross-file matches never leave a family.
fn language_family(lang: Language) -> u8 {
    match lang {
        Language::TypeScript | Language::JavaScript => 1,
        Language::Python => 2,
        Language::Java | Language::Kotlin | Language::Scala => 3,
        Language::Go => 4,
        Language::Rust => 5,
        Language::CSharp => 6,
        Language::Ruby => 7,
        Language::Php => 8,
        Language::C | Language::Cpp => 9,
        Language::Swift => 10,
    }
}

/// A call site mapped to its target.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCall {
    pub callee_id: String,
    pub resolution: Resolution,
    pub confidence: f32,
}

/// Caller-side facts every strategy needs.
struct CallerContext<'i> {
    file: FileIdx,
    class: Option<ClassIdx>,
    function: &'i ExtractedFunction,
    language: Language,
}

/// Applies the strategy chain against one resolution index.
pub struct Resolver<'i> {
    index: &'i ResolutionIndex,
    blocklist_enabled: bool,
    extra_blocklist: FxHashSet<String>,
}

impl<'i> Resolver<'i> {
    pub fn new(index: &'i ResolutionIndex, config: &ResolutionConfig) -> Self {
        Self {
            index,
            blocklist_enabled: config.effective_fuzzy_blocklist(),
            extra_blocklist: config
                .extra_blocklist
                .iter()
                .map(|n| n.to_lowercase())
                .collect(),
        }
    }

    pub fn index(&self) -> &'i ResolutionIndex {
        self.index
    }

    /// Resolve one call site. `None` means unresolved; that is not an error.
    pub fn resolve(&self, call: &NormalizedCallSite) -> Option<ResolvedCall> {
        let ctx = self.caller_context(call)?;

        // Strategy 1: Same-file direct call (confidence 0.95)
        if let Some(f) = self.resolve_same_file(&ctx, call) {
            return Some(self.hit(f, Resolution::SameFile, Resolution::SameFile.default_confidence()));
        }

        // Strategy 2: Method call on a known receiver type (0.90, inherited 0.85)
        if let Some((f, inherited)) = self.resolve_method_call(&ctx, call) {
            let confidence = if inherited {
                INHERITED_METHOD_CONFIDENCE
            } else {
                Resolution::MethodCall.default_confidence()
            };
            return Some(self.hit(f, Resolution::MethodCall, confidence));
        }

        // Strategy 3: DI registration (0.80)
        if let Some(f) = self.resolve_di(&ctx, call) {
            return Some(self.hit(
                f,
                Resolution::DiInjection,
                Resolution::DiInjection.default_confidence(),
            ));
        }

        // Strategy 4: Import-based resolution (0.75)
        if let Some(f) = self.resolve_import_based(&ctx, call) {
            return Some(self.hit(
                f,
                Resolution::ImportBased,
                Resolution::ImportBased.default_confidence(),
            ));
        }

        // Strategy 5: Export-based cross-module (0.60, ambiguous 0.50)
        if let Some((f, confidence)) = self.resolve_export_based(&ctx, call) {
            return Some(self.hit(f, Resolution::ExportBased, confidence));
        }

        // Strategy 6: Fuzzy, project-unique name only (0.40)
        if let Some(f) = self.resolve_fuzzy(&ctx, call) {
            return Some(self.hit(f, Resolution::Fuzzy, Resolution::Fuzzy.default_confidence()));
        }

        None
    }

    fn hit(&self, f: FnIdx, resolution: Resolution, confidence: f32) -> ResolvedCall {
        ResolvedCall {
            callee_id: self.index.function(f).id.clone(),
            resolution,
            confidence,
        }
    }

    fn caller_context(&self, call: &NormalizedCallSite) -> Option<CallerContext<'i>> {
        let caller = self.index.function_id(&call.caller)?;
        let indexed = self.index.function(caller);
        let function = self.index.extracted_function(caller);
        let class = function
            .class_name
            .as_deref()
            .and_then(|c| self.index.class_in_file(indexed.file, c));
        Some(CallerContext {
            file: indexed.file,
            class,
            function,
            language: indexed.language,
        })
    }

    /// Same-file: a free function in the caller's file, a method of the
    /// caller's own class (implicit or explicit `this`), or a static call on a
    /// class declared in the same file.
    fn resolve_same_file(&self, ctx: &CallerContext<'_>, call: &NormalizedCallSite) -> Option<FnIdx> {
        if call.namespace_call {
            return None;
        }
        let index = self.index;
        match &call.receiver {
            None => {
                if let Some(f) = index.free_function(ctx.file, &call.callee_name) {
                    return Some(f);
                }
                if call.is_constructor {
                    return None;
                }
                index.method_of(ctx.class?, &call.callee_name)
            }
            Some(Receiver::SelfRef) => index.method_of(ctx.class?, &call.callee_name),
            Some(Receiver::Named(name)) => {
                let class = index.class_in_file(ctx.file, name)?;
                index.method_of(class, &call.callee_name)
            }
            Some(Receiver::Super) | Some(Receiver::SelfField(_)) => None,
        }
    }

    /// Method call: determine the receiver's class, look the method up
    /// directly, then along the ancestor chain. Returns `(callee, inherited)`.
    fn resolve_method_call(
        &self,
        ctx: &CallerContext<'_>,
        call: &NormalizedCallSite,
    ) -> Option<(FnIdx, bool)> {
        let index = self.index;
        if call.is_constructor {
            let class = index.find_class(ctx.file, &call.callee_name)?;
            if let Some(ctor) = index.constructor_of(class) {
                return Some((ctor, false));
            }
            return index
                .ancestors(class)
                .into_iter()
                .find_map(|a| index.constructor_of(a))
                .map(|ctor| (ctor, true));
        }
        match call.receiver.as_ref()? {
            Receiver::SelfRef => self.lookup_method(ctx.class?, &call.callee_name),
            Receiver::Super => index
                .inherited_method(ctx.class?, &call.callee_name)
                .map(|f| (f, true)),
            Receiver::SelfField(_) | Receiver::Named(_) => {
                if call.namespace_call {
                    return None;
                }
                let type_name = self.receiver_type(ctx, call)?;
                let class = index.find_class(ctx.file, type_name)?;
                self.lookup_method(class, &call.callee_name)
            }
        }
    }

    fn lookup_method(&self, class: ClassIdx, method: &str) -> Option<(FnIdx, bool)> {
        if let Some(f) = self.index.method_of(class, method) {
            return Some((f, false));
        }
        self.index.inherited_method(class, method).map(|f| (f, true))
    }

    /// Declared type of a field or named receiver. A bare identifier with no
    /// declared type is taken as a type name itself (static call or
    /// imported class).
    fn receiver_type<'c>(
        &'c self,
        ctx: &'c CallerContext<'_>,
        call: &'c NormalizedCallSite,
    ) -> Option<&'c str> {
        match call.receiver.as_ref()? {
            Receiver::SelfField(field) => self.index.field_type(ctx.class?, field),
            Receiver::Named(name) => Some(ctx.function.parameter_type(name).unwrap_or(name)),
            Receiver::SelfRef | Receiver::Super => None,
        }
    }

    /// DI: the receiver's type is a token bound to exactly one class, or a
    /// bare callee names a token bound to exactly one provider function.
    fn resolve_di(&self, ctx: &CallerContext<'_>, call: &NormalizedCallSite) -> Option<FnIdx> {
        let di = self.index.di();
        if di.is_empty() || call.namespace_call {
            return None;
        }
        match &call.receiver {
            Some(Receiver::SelfField(field)) => {
                let mut tokens: Vec<String> = Vec::with_capacity(3);
                if let Some(ty) = self.receiver_type(ctx, call) {
                    tokens.push(ty.to_string());
                }
                // Untyped injected field: `this.userService` → `UserService`.
                tokens.push(field.clone());
                tokens.push(capitalize(field));
                tokens.iter().find_map(|token| {
                    let class = di.unique_class(token)?;
                    self.lookup_method(class, &call.callee_name).map(|(f, _)| f)
                })
            }
            Some(Receiver::Named(_)) => {
                let token = self.receiver_type(ctx, call)?;
                let class = di.unique_class(token)?;
                self.lookup_method(class, &call.callee_name).map(|(f, _)| f)
            }
            None if !call.is_constructor => di.unique_provider(&call.callee_name),
            _ => None,
        }
    }

    /// Import-based: resolve the import source to a file, then follow that
    /// file's exports to the imported name.
    fn resolve_import_based(
        &self,
        ctx: &CallerContext<'_>,
        call: &NormalizedCallSite,
    ) -> Option<FnIdx> {
        let source = call.import_source.as_deref()?;
        let name = call.imported_name.as_deref().unwrap_or(&call.callee_name);
        let target = self.index.resolved_import(ctx.file, source)?;
        match self.index.resolve_export(target, name)? {
            Symbol::Function(f) => Some(f),
            Symbol::Class(c) if call.is_constructor => self.index.constructor_of(c),
            Symbol::Class(_) => None,
        }
    }

    /// Export-based: every exported function with the callee's name, in the
    /// caller's language family and of a compatible kind. Ties go to the
    /// deepest shared directory, then to the lexicographically first file.
    fn resolve_export_based(
        &self,
        ctx: &CallerContext<'_>,
        call: &NormalizedCallSite,
    ) -> Option<(FnIdx, f32)> {
        if call.import_source.is_some() {
            return None;
        }
        let candidates: Vec<FnIdx> = self
            .index
            .exported_candidates(&call.callee_name)
            .iter()
            .copied()
            .filter(|f| self.compatible(ctx, call, *f))
            .collect();
        match candidates.as_slice() {
            [] => None,
            [only] => Some((*only, Resolution::ExportBased.default_confidence())),
            _ => {
                let caller_path = &self.index.file(ctx.file).file;
                let depth_of = |f: FnIdx| {
                    let path = &self.index.file(self.index.function(f).file).file;
                    common_dir_depth(caller_path, path)
                };
                let best = candidates.iter().map(|f| depth_of(*f)).max()?;
                let mut tied: Vec<FnIdx> = candidates
                    .into_iter()
                    .filter(|f| depth_of(*f) == best)
                    .collect();
                if tied.len() == 1 {
                    return Some((tied[0], Resolution::ExportBased.default_confidence()));
                }
                tied.sort_by(|a, b| {
                    let fa = self.index.function(*a);
                    let fb = self.index.function(*b);
                    let pa = &self.index.file(fa.file).file;
                    let pb = &self.index.file(fb.file).file;
                    (pa, &fa.id).cmp(&(pb, &fb.id))
                });
                Some((tied[0], AMBIGUOUS_EXPORT_CONFIDENCE))
            }
        }
    }

    /// Fuzzy: only when exactly one function in the whole project carries
    /// the name. Two or more candidates refuse resolution.
    fn resolve_fuzzy(&self, ctx: &CallerContext<'_>, call: &NormalizedCallSite) -> Option<FnIdx> {
        if call.import_source.is_some() || self.is_blocked(&call.callee_name) {
            return None;
        }
        match self.index.candidates(&call.callee_name) {
            [only] if self.compatible(ctx, call, *only) => Some(*only),
            _ => None,
        }
    }

    fn is_blocked(&self, name: &str) -> bool {
        (self.blocklist_enabled && is_fuzzy_blocked(name))
            || self.extra_blocklist.contains(&name.to_lowercase())
    }

    /// Receiver calls target methods; bare and namespace calls target free
    /// functions. Candidates never cross a language family.
    fn compatible(&self, ctx: &CallerContext<'_>, call: &NormalizedCallSite, f: FnIdx) -> bool {
        let candidate = self.index.function(f);
        if language_family(candidate.language) != language_family(ctx.language) {
            return false;
        }
        let wants_method = call.receiver.is_some() && !call.namespace_call;
        candidate.is_method() == wants_method
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolve with default configuration.
pub fn resolve_call(index: &ResolutionIndex, call: &NormalizedCallSite) -> Option<ResolvedCall> {
    Resolver::new(index, &ResolutionConfig::default()).resolve(call)
}

/// Call-site outcomes of one caller, kept so diagnostics can be recomputed
/// after an incremental update without re-resolving everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerTally {
    pub language: Language,
    pub total: u32,
    pub resolved: u32,
    /// Indexed by [`Resolution::ordinal`].
    pub by_strategy: [u32; 6],
}

impl CallerTally {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            total: 0,
            resolved: 0,
            by_strategy: [0; 6],
        }
    }

    pub fn record(&mut self, resolution: Option<Resolution>) {
        self.total += 1;
        if let Some(r) = resolution {
            self.resolved += 1;
            self.by_strategy[r.ordinal()] += 1;
        }
    }
}

/// A language whose resolution rate is under the warning threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct LowResolution {
    pub language: String,
    pub resolved: usize,
    pub total: usize,
    pub rate: f64,
}

/// A language whose rate dropped by more than the tolerance since the
/// previous build.
#[derive(Debug, Clone, PartialEq)]
pub struct RateRegression {
    pub language: String,
    pub previous_rate: f64,
    pub current_rate: f64,
}

/// Diagnostics for resolution tracking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionDiagnostics {
    pub total_call_sites: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub by_strategy: BTreeMap<String, usize>,
    /// language → (resolved, total)
    pub by_language: BTreeMap<String, (usize, usize)>,
}

impl ResolutionDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, strategy: Option<Resolution>, language: Language) {
        self.total_call_sites += 1;
        let lang_entry = self
            .by_language
            .entry(language.id().to_string())
            .or_insert((0, 0));
        lang_entry.1 += 1;

        if let Some(s) = strategy {
            self.resolved += 1;
            *self.by_strategy.entry(s.name().to_string()).or_default() += 1;
            lang_entry.0 += 1;
        } else {
            self.unresolved += 1;
        }
    }

    /// Fold one caller's tally in.
    pub fn add_tally(&mut self, tally: &CallerTally) {
        if tally.total == 0 {
            return;
        }
        let total = tally.total as usize;
        let resolved = tally.resolved as usize;
        self.total_call_sites += total;
        self.resolved += resolved;
        self.unresolved += total - resolved;
        let lang_entry = self
            .by_language
            .entry(tally.language.id().to_string())
            .or_insert((0, 0));
        lang_entry.0 += resolved;
        lang_entry.1 += total;
        for r in Resolution::all_ordered() {
            let n = tally.by_strategy[r.ordinal()] as usize;
            if n > 0 {
                *self.by_strategy.entry(r.name().to_string()).or_default() += n;
            }
        }
    }

    pub fn from_tallies<'a>(tallies: impl IntoIterator<Item = &'a CallerTally>) -> Self {
        let mut diagnostics = Self::new();
        for tally in tallies {
            diagnostics.add_tally(tally);
        }
        diagnostics
    }

    pub fn resolution_rate(&self) -> f64 {
        if self.total_call_sites == 0 {
            0.0
        } else {
            self.resolved as f64 / self.total_call_sites as f64
        }
    }

    pub fn language_rate(&self, language: &str) -> Option<f64> {
        let (resolved, total) = self.by_language.get(language)?;
        (*total > 0).then(|| *resolved as f64 / *total as f64)
    }

    /// Languages resolving fewer than `threshold` of their call sites.
    pub fn low_resolution(&self, threshold: f64) -> Vec<LowResolution> {
        self.by_language
            .iter()
            .filter(|(_, (_, total))| *total > 0)
            .filter_map(|(lang, (resolved, total))| {
                let rate = *resolved as f64 / *total as f64;
                (rate < threshold).then(|| LowResolution {
                    language: lang.clone(),
                    resolved: *resolved,
                    total: *total,
                    rate,
                })
            })
            .collect()
    }

    pub fn low_resolution_warnings(&self) -> Vec<String> {
        self.low_resolution(DEFAULT_LOW_RATE_THRESHOLD)
            .into_iter()
            .map(format_low_resolution)
            .collect()
    }

    /// Languages whose rate fell by more than `tolerance` compared with
    /// `previous`. Languages with too few call sites are ignored.
    pub fn regressions(&self, previous: &ResolutionDiagnostics, tolerance: f64) -> Vec<RateRegression> {
        self.by_language
            .iter()
            .filter(|(_, (_, total))| *total >= MIN_CALL_SITES_FOR_REGRESSION)
            .filter_map(|(lang, _)| {
                let current_rate = self.language_rate(lang)?;
                let (_, prev_total) = previous.by_language.get(lang)?;
                if *prev_total < MIN_CALL_SITES_FOR_REGRESSION {
                    return None;
                }
                let previous_rate = previous.language_rate(lang)?;
                (previous_rate - current_rate > tolerance).then(|| RateRegression {
                    language: lang.clone(),
                    previous_rate,
                    current_rate,
                })
            })
            .collect()
    }

    pub fn regressions_default(&self, previous: &ResolutionDiagnostics) -> Vec<RateRegression> {
        self.regressions(previous, DEFAULT_REGRESSION_TOLERANCE)
    }
}

pub fn format_low_resolution(low: LowResolution) -> String {
    format!(
        "Low resolution rate for {}: {:.1}% ({}/{})",
        low.language,
        low.rate * 100.0,
        low.resolved,
        low.total
    )
}

pub fn format_regression(regression: &RateRegression) -> String {
    format!(
        "Resolution rate for {} dropped from {:.1}% to {:.1}%",
        regression.language,
        regression.previous_rate * 100.0,
        regression.current_rate * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::call_graph::extractor::{extract_file, ExtractOptions, ExtractedFile};
    use crate::call_graph::index::IndexOptions;
    use crate::parsers::types::{
        CallSite, ClassInfo, DecoratorInfo, FunctionInfo, ImportInfo, ImportSpecifier,
        ParameterInfo, ParseResult, PropertyInfo,
    };

    fn func(name: &str, line: u32, exported: bool) -> FunctionInfo {
        let mut f = FunctionInfo::new(name, line, line + 5);
        f.is_exported = exported;
        f
    }

    fn call(name: &str, line: u32) -> CallSite {
        CallSite::new(name, line)
    }

    fn recv_call(receiver: &str, name: &str, line: u32) -> CallSite {
        let mut c = CallSite::new(name, line);
        c.receiver = Some(receiver.into());
        c
    }

    fn import(source: &str, names: &[&str]) -> ImportInfo {
        ImportInfo {
            source: source.into(),
            specifiers: names
                .iter()
                .map(|n| ImportSpecifier {
                    name: n.to_string(),
                    alias: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    struct Fixture {
        files: Vec<Arc<ExtractedFile>>,
    }

    impl Fixture {
        fn new(prs: Vec<ParseResult>) -> Self {
            let files = prs
                .iter()
                .map(|pr| Arc::new(extract_file(pr, &ExtractOptions::default()).unwrap()))
                .collect();
            Self { files }
        }

        fn resolve_all(&self) -> Vec<(String, Option<ResolvedCall>)> {
            let index = ResolutionIndex::build(&self.files, &IndexOptions::default()).unwrap();
            let resolver = Resolver::new(&index, &ResolutionConfig::default());
            self.files
                .iter()
                .flat_map(|f| f.call_sites.iter())
                .map(|c| (c.callee_name.clone(), resolver.resolve(c)))
                .collect()
        }

        fn only(&self) -> Option<ResolvedCall> {
            let mut all = self.resolve_all();
            assert_eq!(all.len(), 1, "fixture should have exactly one call site");
            all.pop().and_then(|(_, r)| r)
        }
    }

    // CG-RES-T01: same-file beats export-based for a name that is also exported elsewhere.
    #[test]
    fn same_file_takes_precedence() {
        let mut a = ParseResult::new("src/a.ts");
        a.functions = vec![func("main", 1, false), func("helper", 10, false)];
        a.call_sites = vec![call("helper", 2)];
        let b = {
            let mut b = ParseResult::new("src/b.ts");
            b.functions = vec![func("helper", 1, true)];
            b
        };
        let r = Fixture::new(vec![a, b]).only().unwrap();
        assert_eq!(r.resolution, Resolution::SameFile);
        assert_eq!(r.callee_id, "src/a.ts::helper");
        assert_eq!(r.confidence, 0.95);
    }

    // CG-RES-T02: the a.ts/b.ts import example.
    #[test]
    fn import_based_then_export_based_when_import_removed() {
        let mut a = ParseResult::new("a.ts");
        a.functions = vec![func("foo", 1, false)];
        a.call_sites = vec![call("bar", 2)];
        a.imports = vec![import("./b", &["bar"])];
        let mut b = ParseResult::new("b.ts");
        b.functions = vec![func("bar", 1, true)];

        let r = Fixture::new(vec![a.clone(), b.clone()]).only().unwrap();
        assert_eq!(r.resolution, Resolution::ImportBased);
        assert_eq!(r.confidence, 0.75);
        assert_eq!(r.callee_id, "b.ts::bar");

        a.imports.clear();
        let r = Fixture::new(vec![a.clone(), b.clone()]).only().unwrap();
        assert_eq!(r.resolution, Resolution::ExportBased);
        assert_eq!(r.confidence, 0.60);

        // A second, non-exported `bar` leaves export-based unique but blocks fuzzy.
        let mut c = ParseResult::new("c.ts");
        c.functions = vec![func("bar", 1, false)];
        let r = Fixture::new(vec![a.clone(), b, c.clone()]).only().unwrap();
        assert_eq!(r.resolution, Resolution::ExportBased);

        // Two exported `bar`s in sibling directories: deterministic pick at 0.50.
        let mut d1 = ParseResult::new("x/d.ts");
        d1.functions = vec![func("bar", 1, true)];
        let mut d2 = ParseResult::new("y/d.ts");
        d2.functions = vec![func("bar", 1, true)];
        let r = Fixture::new(vec![a, d1, d2]).only().unwrap();
        assert_eq!(r.resolution, Resolution::ExportBased);
        assert_eq!(r.confidence, 0.50);
        assert_eq!(r.callee_id, "x/d.ts::bar");
    }

    // CG-RES-T03: directory proximity breaks export ties at full confidence.
    #[test]
    fn export_tie_broken_by_directory_prefix() {
        let mut caller = ParseResult::new("src/orders/api.ts");
        caller.functions = vec![func("handle", 1, false)];
        caller.call_sites = vec![call("computeTotal", 2)];
        let mut near = ParseResult::new("src/orders/math.ts");
        near.functions = vec![func("computeTotal", 1, true)];
        let mut far = ParseResult::new("lib/math.ts");
        far.functions = vec![func("computeTotal", 1, true)];
        let r = Fixture::new(vec![caller, far, near]).only().unwrap();
        assert_eq!(r.callee_id, "src/orders/math.ts::computeTotal");
        assert_eq!(r.confidence, 0.60);
    }

    // CG-RES-T04: ambiguous fuzzy refusal.
    #[test]
    fn fuzzy_refuses_ambiguous_names() {
        let mut a = ParseResult::new("a.ts");
        a.functions = vec![func("main", 1, false)];
        a.call_sites = vec![call("compute", 2)];
        let mut b = ParseResult::new("b.ts");
        b.functions = vec![func("compute", 1, false)];
        let mut c = ParseResult::new("c.ts");
        c.functions = vec![func("compute", 1, false)];
        assert_eq!(Fixture::new(vec![a.clone(), b.clone(), c]).only(), None);

        let r = Fixture::new(vec![a, b]).only().unwrap();
        assert_eq!(r.resolution, Resolution::Fuzzy);
        assert_eq!(r.confidence, 0.40);
    }

    #[test]
    fn fuzzy_blocklist_and_language_family() {
        let mut a = ParseResult::new("a.ts");
        a.functions = vec![func("main", 1, false)];
        a.call_sites = vec![call("render", 2), call("compute", 3)];
        let mut b = ParseResult::new("b.ts");
        b.functions = vec![func("render", 1, false)];
        let mut py = ParseResult::new("c.py");
        py.functions = vec![func("compute", 1, false)];
        let results = Fixture::new(vec![a, b, py]).resolve_all();
        assert!(results.iter().all(|(_, r)| r.is_none()));
    }

    // CG-RES-T05: method resolution through field types and inheritance.
    #[test]
    fn method_call_direct_and_inherited() {
        let mut repo = ParseResult::new("src/repo.ts");
        repo.classes = vec![
            ClassInfo {
                name: "BaseRepo".into(),
                is_exported: true,
                methods: vec![func("findAll", 2, false)],
                ..Default::default()
            },
            ClassInfo {
                name: "UserRepo".into(),
                extends: Some("BaseRepo".into()),
                is_exported: true,
                methods: vec![func("byEmail", 10, false)],
                ..Default::default()
            },
        ];
        let mut svc = ParseResult::new("src/svc.ts");
        svc.imports = vec![import("./repo", &["UserRepo"])];
        svc.classes = vec![ClassInfo {
            name: "UserService".into(),
            properties: vec![PropertyInfo {
                name: "repo".into(),
                type_annotation: Some("UserRepo".into()),
                ..Default::default()
            }],
            methods: vec![func("list", 2, false)],
            ..Default::default()
        }];
        svc.call_sites = vec![recv_call("this.repo", "byEmail", 3), recv_call("this.repo", "findAll", 4)];

        let results = Fixture::new(vec![repo, svc]).resolve_all();
        let by_email = results[0].1.as_ref().unwrap();
        assert_eq!(by_email.resolution, Resolution::MethodCall);
        assert_eq!(by_email.confidence, 0.90);
        assert_eq!(by_email.callee_id, "src/repo.ts::UserRepo.byEmail");
        let find_all = results[1].1.as_ref().unwrap();
        assert_eq!(find_all.confidence, 0.85);
        assert_eq!(find_all.callee_id, "src/repo.ts::BaseRepo.findAll");
    }

    #[test]
    fn parameter_types_and_constructors() {
        let mut m = ParseResult::new("app/models.py");
        m.classes = vec![ClassInfo {
            name: "Order".into(),
            is_exported: true,
            methods: vec![func("__init__", 2, false), func("total", 8, false)],
            ..Default::default()
        }];
        let mut v = ParseResult::new("app/views.py");
        let mut view = func("show", 1, true);
        view.parameters.push(ParameterInfo {
            name: "order".into(),
            type_annotation: Some("Order".into()),
            ..Default::default()
        });
        v.functions = vec![view];
        let mut ctor = call("Order", 2);
        ctor.is_constructor = true;
        v.call_sites = vec![ctor, recv_call("order", "total", 3)];
        let results = Fixture::new(vec![m, v]).resolve_all();
        assert_eq!(
            results[0].1.as_ref().unwrap().callee_id,
            "app/models.py::Order.__init__"
        );
        assert_eq!(results[1].1.as_ref().unwrap().callee_id, "app/models.py::Order.total");
        assert!(results
            .iter()
            .all(|(_, r)| r.as_ref().unwrap().resolution == Resolution::MethodCall));
    }

    // CG-RES-T06: DI token resolution through an interface.
    #[test]
    fn di_resolves_interface_typed_field() {
        let mut svc = ParseResult::new("src/mail.ts");
        svc.classes = vec![ClassInfo {
            name: "SmtpMailer".into(),
            implements: ["Mailer".to_string()].into_iter().collect(),
            decorators: vec![DecoratorInfo::named("Injectable")],
            methods: vec![func("deliver", 2, false)],
            ..Default::default()
        }];
        let mut user = ParseResult::new("src/user.ts");
        user.classes = vec![ClassInfo {
            name: "Signup".into(),
            properties: vec![PropertyInfo {
                name: "mailer".into(),
                type_annotation: Some("Mailer".into()),
                ..Default::default()
            }],
            methods: vec![func("run", 2, false)],
            ..Default::default()
        }];
        user.call_sites = vec![recv_call("this.mailer", "deliver", 3)];
        let r = Fixture::new(vec![svc, user]).only().unwrap();
        assert_eq!(r.resolution, Resolution::DiInjection);
        assert_eq!(r.confidence, 0.80);
        assert_eq!(r.callee_id, "src/mail.ts::SmtpMailer.deliver");
    }

    #[test]
    fn namespace_and_reexported_imports() {
        let mut barrel = ParseResult::new("src/util/index.ts");
        barrel.exports = vec![crate::parsers::types::ExportInfo {
            name: Some("slugify".into()),
            source: Some("./strings".into()),
            ..Default::default()
        }];
        let mut strings = ParseResult::new("src/util/strings.ts");
        strings.functions = vec![func("slugify", 1, true)];
        let mut caller = ParseResult::new("src/page.ts");
        caller.functions = vec![func("render", 1, false)];
        caller.imports = vec![ImportInfo {
            source: "./util".into(),
            specifiers: [ImportSpecifier {
                name: "*".into(),
                alias: Some("u".into()),
            }]
            .into_iter()
            .collect(),
            ..Default::default()
        }];
        caller.call_sites = vec![recv_call("u", "slugify", 2)];
        let r = Fixture::new(vec![barrel, strings, caller]).only().unwrap();
        assert_eq!(r.resolution, Resolution::ImportBased);
        assert_eq!(r.callee_id, "src/util/strings.ts::slugify");
    }

    #[test]
    fn external_import_is_not_guessed() {
        let mut a = ParseResult::new("a.ts");
        a.functions = vec![func("main", 1, false)];
        a.imports = vec![import("lodash", &["debounce"])];
        a.call_sites = vec![call("debounce", 2)];
        let mut b = ParseResult::new("b.ts");
        b.functions = vec![func("debounce", 1, true)];
        assert_eq!(Fixture::new(vec![a, b]).only(), None);
    }

    #[test]
    fn diagnostics_track_rates_and_regressions() {
        let mut prev = ResolutionDiagnostics::new();
        let mut cur = ResolutionDiagnostics::new();
        for i in 0..40 {
            prev.record((i < 30).then_some(Resolution::Fuzzy), Language::Python);
            cur.record((i < 10).then_some(Resolution::Fuzzy), Language::Python);
        }
        assert_eq!(cur.low_resolution(0.30).len(), 1);
        let regs = cur.regressions(&prev, 0.10);
        assert_eq!(regs.len(), 1);
        assert!((regs[0].previous_rate - 0.75).abs() < 1e-9);
        assert!(prev.regressions(&cur, 0.10).is_empty());
    }

    #[test]
    fn tallies_fold_into_diagnostics() {
        let mut t = CallerTally::new(Language::Go);
        t.record(Some(Resolution::SameFile));
        t.record(None);
        let d = ResolutionDiagnostics::from_tallies([&t, &t]);
        assert_eq!(d.total_call_sites, 4);
        assert_eq!(d.resolved, 2);
        assert_eq!(d.by_strategy.get("same_file"), Some(&2));
        assert_eq!(d.by_language.get("go"), Some(&(2, 4)));
    }
}
