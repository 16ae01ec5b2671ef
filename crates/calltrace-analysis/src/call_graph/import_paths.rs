//! Import-source → file resolution.
//!
//! Relative sources resolve against the importing file's directory. Other
//! sources are tried root-relative, then as a unique path suffix
//! (`com.acme.UserService` → `src/main/java/com/acme/UserService.java`).

use calltrace_core::types::collections::{FxHashMap, FxHashSet};

use crate::scanner::language_detect::Language;

/// Lookup tables over the set of files taking part in a resolution pass.
#[derive(Debug, Default)]
pub struct ModuleResolver {
    /// Path without extension → files (`src/utils` → `src/utils.ts`).
    stems: FxHashMap<String, Vec<String>>,
    /// Directory → index-module files (`src/utils` → `src/utils/index.ts`).
    index_dirs: FxHashMap<String, Vec<String>>,
    /// Last path segment → stem keys from both maps, for suffix lookups.
    by_last_segment: FxHashMap<String, Vec<String>>,
    files: FxHashSet<String>,
}

impl ModuleResolver {
    pub fn new<'a>(files: impl IntoIterator<Item = &'a str>) -> Self {
        let mut resolver = Self::default();
        for file in files {
            resolver.insert(file);
        }
        for list in resolver
            .stems
            .values_mut()
            .chain(resolver.index_dirs.values_mut())
            .chain(resolver.by_last_segment.values_mut())
        {
            list.sort();
            list.dedup();
        }
        resolver
    }

    fn insert(&mut self, file: &str) {
        if !self.files.insert(file.to_string()) {
            return;
        }
        let Some((stem, _ext)) = split_extension(file) else {
            return;
        };
        self.stems
            .entry(stem.to_string())
            .or_default()
            .push(file.to_string());
        self.by_last_segment
            .entry(last_segment(stem).to_string())
            .or_default()
            .push(stem.to_string());

        let (dir, name) = match stem.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", stem),
        };
        let is_index = Language::from_path(file)
            .map(|l| l.index_modules().contains(&name))
            .unwrap_or(false);
        if is_index {
            self.index_dirs
                .entry(dir.to_string())
                .or_default()
                .push(file.to_string());
            if !dir.is_empty() {
                self.by_last_segment
                    .entry(last_segment(dir).to_string())
                    .or_default()
                    .push(dir.to_string());
            }
        }
    }

    pub fn contains(&self, file: &str) -> bool {
        self.files.contains(file)
    }

    /// Resolve `source`, as written in `caller_file`, to a known file.
    pub fn resolve(&self, caller_file: &str, source: &str, language: Language) -> Option<String> {
        let source = source.trim();
        if source.is_empty() {
            return None;
        }
        let caller_dir = parent_dir(caller_file);

        if let Some(base) = relative_base(caller_dir, source, language) {
            return self.lookup(&base, language);
        }

        let base = absolute_base(source, language);
        if base.is_empty() {
            return None;
        }
        if let Some(found) = self.lookup(&base, language) {
            return Some(found);
        }
        self.lookup_suffix(&base, language)
    }

    /// Exact lookup of a base path: as a file, with an extension, then as a
    /// directory holding an index module.
    fn lookup(&self, base: &str, language: Language) -> Option<String> {
        if self.files.contains(base) && compatible(base, language) {
            return Some(base.to_string());
        }
        // `./b.js` written in TypeScript may name `b.ts`.
        let base = match split_extension(base) {
            Some((stem, ext)) if Language::from_extension(Some(ext)).is_some() => stem,
            _ => base,
        };
        if let Some(found) = self.stems.get(base).and_then(|c| pick(c, language)) {
            return Some(found);
        }
        self.index_dirs.get(base).and_then(|c| pick(c, language))
    }

    /// Unique file whose stem path ends with `/base`.
    fn lookup_suffix(&self, base: &str, language: Language) -> Option<String> {
        let keys = self.by_last_segment.get(last_segment(base))?;
        let suffix = format!("/{base}");
        let mut matches: Vec<String> = keys
            .iter()
            .filter(|k| k.ends_with(&suffix))
            .filter_map(|k| self.lookup(k, language))
            .collect();
        matches.sort();
        matches.dedup();
        if matches.len() == 1 {
            matches.pop()
        } else {
            None
        }
    }
}

/// Base path for relative sources, or `None` when the source is not relative.
fn relative_base(caller_dir: &str, source: &str, language: Language) -> Option<String> {
    if source.starts_with("./") || source.starts_with("../") || source == "." || source == ".." {
        return join_relative(caller_dir, source);
    }
    if language.dotted_modules() && source.starts_with('.') {
        // Python: one leading dot is the current package, each extra dot
        // climbs one level.
        let dots = source.chars().take_while(|c| *c == '.').count();
        let rest = source[dots..].replace('.', "/");
        let mut dir = caller_dir.to_string();
        for _ in 1..dots {
            dir = parent_dir(&dir).to_string();
        }
        return Some(join_path(&dir, &rest));
    }
    if let Some(rest) = source.strip_prefix("super::") {
        let dir = parent_dir(caller_dir);
        return Some(join_path(dir, &rest.replace("::", "/")));
    }
    if let Some(rest) = source.strip_prefix("self::") {
        return Some(join_path(caller_dir, &rest.replace("::", "/")));
    }
    None
}

fn absolute_base(source: &str, language: Language) -> String {
    let mut s = source;
    for prefix in ["@/", "~/", "/", "crate::"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
            break;
        }
    }
    if s.contains("::") {
        return s.replace("::", "/");
    }
    if language.dotted_modules() && !s.contains('/') {
        return s.replace('.', "/");
    }
    s.to_string()
}

/// Among same-stem files, prefer the caller language's extension order.
fn pick(candidates: &[String], language: Language) -> Option<String> {
    let exts = language.import_extensions();
    candidates
        .iter()
        .filter_map(|c| {
            let ext = split_extension(c)?.1;
            let rank = exts.iter().position(|e| *e == ext)?;
            Some((rank, c))
        })
        .min()
        .map(|(_, c)| c.clone())
}

fn compatible(file: &str, language: Language) -> bool {
    split_extension(file)
        .map(|(_, ext)| language.import_extensions().contains(&ext))
        .unwrap_or(false)
}

fn split_extension(path: &str) -> Option<(&str, &str)> {
    let (stem, ext) = path.rsplit_once('.')?;
    if stem.is_empty() || stem.ends_with('/') || ext.contains('/') {
        return None;
    }
    Some((stem, ext))
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub(crate) fn parent_dir(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    }
}

fn join_path(dir: &str, rest: &str) -> String {
    match (dir.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (false, true) => dir.to_string(),
        (false, false) => format!("{dir}/{rest}"),
    }
}

/// Join and normalize `.` / `..` components. Escaping the root fails.
fn join_relative(dir: &str, rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for component in rel.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Number of leading directory components two files share.
pub fn common_dir_depth(a: &str, b: &str) -> usize {
    parent_dir(a)
        .split('/')
        .filter(|p| !p.is_empty())
        .zip(parent_dir(b).split('/').filter(|p| !p.is_empty()))
        .take_while(|(x, y)| x == y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(files: &[&str]) -> ModuleResolver {
        ModuleResolver::new(files.iter().copied())
    }

    #[test]
    fn relative_with_extension_lookup() {
        let r = resolver(&["src/a.ts", "src/b.ts"]);
        assert_eq!(r.resolve("src/a.ts", "./b", Language::TypeScript).as_deref(), Some("src/b.ts"));
        assert_eq!(r.resolve("src/a.ts", "./b.js", Language::TypeScript).as_deref(), Some("src/b.ts"));
    }

    #[test]
    fn parent_dirs_and_index_modules() {
        let r = resolver(&["src/x/a.ts", "src/lib/index.ts"]);
        assert_eq!(
            r.resolve("src/x/a.ts", "../lib", Language::TypeScript).as_deref(),
            Some("src/lib/index.ts")
        );
        assert_eq!(r.resolve("a.ts", "../../nope", Language::TypeScript), None);
    }

    #[test]
    fn file_beats_index_module() {
        let r = resolver(&["src/utils.ts", "src/utils/index.ts", "src/a.ts"]);
        assert_eq!(
            r.resolve("src/a.ts", "./utils", Language::TypeScript).as_deref(),
            Some("src/utils.ts")
        );
    }

    #[test]
    fn python_relative_and_dotted() {
        let r = resolver(&["app/pkg/models.py", "app/pkg/views.py", "app/core/db.py"]);
        assert_eq!(
            r.resolve("app/pkg/views.py", ".models", Language::Python).as_deref(),
            Some("app/pkg/models.py")
        );
        assert_eq!(
            r.resolve("app/pkg/views.py", "..core.db", Language::Python).as_deref(),
            Some("app/core/db.py")
        );
        assert_eq!(
            r.resolve("app/pkg/views.py", "app.core.db", Language::Python).as_deref(),
            Some("app/core/db.py")
        );
    }

    #[test]
    fn java_package_suffix_match() {
        let r = resolver(&["src/main/java/com/acme/UserService.java"]);
        assert_eq!(
            r.resolve(
                "src/main/java/com/acme/web/Ctl.java",
                "com.acme.UserService",
                Language::Java
            )
            .as_deref(),
            Some("src/main/java/com/acme/UserService.java")
        );
    }

    #[test]
    fn ambiguous_suffix_is_refused() {
        let r = resolver(&["a/util/str.py", "b/util/str.py"]);
        assert_eq!(r.resolve("main.py", "util.str", Language::Python), None);
    }

    #[test]
    fn bare_package_is_external() {
        let r = resolver(&["src/a.ts"]);
        assert_eq!(r.resolve("src/a.ts", "react", Language::TypeScript), None);
    }

    #[test]
    fn other_language_files_are_not_targets() {
        let r = resolver(&["src/a.ts", "src/b.py"]);
        assert_eq!(r.resolve("src/a.ts", "./b", Language::TypeScript), None);
    }

    #[test]
    fn common_dir_depth_counts_components() {
        assert_eq!(common_dir_depth("src/a/x.ts", "src/a/y.ts"), 2);
        assert_eq!(common_dir_depth("src/a/x.ts", "src/b/y.ts"), 1);
        assert_eq!(common_dir_depth("x.ts", "src/y.ts"), 0);
    }
}
