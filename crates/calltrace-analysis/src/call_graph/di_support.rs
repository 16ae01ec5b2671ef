//! Dependency-injection registrations.
//!
//! A class carrying a DI marker decorator registers itself under its own name,
//! every interface it implements, and any explicit token argument. Provider
//! functions (`@Bean`, `@Provides`) register under their return type, or
//! their own name when untyped.

use calltrace_core::types::collections::FxHashMap;
use smallvec::SmallVec;

use crate::parsers::types::DecoratorInfo;

use super::extractor::{normalize_type_name, ExtractedClass, ExtractedFunction};

/// Class decorators that make the class a DI-managed provider
/// (NestJS, Angular, Spring, CDI, Guice, tsyringe).
pub const DI_CLASS_MARKERS: &[&str] = &[
    "Injectable",
    "Service",
    "Component",
    "Repository",
    "Controller",
    "RestController",
    "Singleton",
    "Named",
    "ApplicationScoped",
    "RequestScoped",
    "injectable",
    "singleton",
];

/// Function decorators that register the return value as a provider.
pub const DI_PROVIDER_MARKERS: &[&str] = &["Bean", "Provides", "Produces", "provider", "Factory"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiTarget {
    /// Index of a class in the resolution index.
    Class(u32),
    /// Index of a provider function in the resolution index.
    Provider(u32),
}

/// Token → registered targets.
#[derive(Debug, Default)]
pub struct DiRegistry {
    tokens: FxHashMap<String, SmallVec<[DiTarget; 1]>>,
}

impl DiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, token: &str, target: DiTarget) {
        let entry = self.tokens.entry(token.to_string()).or_default();
        if !entry.contains(&target) {
            entry.push(target);
        }
    }

    /// The single target for `token`, or `None` when unknown or ambiguous.
    pub fn unique(&self, token: &str) -> Option<DiTarget> {
        match self.tokens.get(token).map(|t| t.as_slice()) {
            Some([only]) => Some(*only),
            _ => None,
        }
    }

    pub fn unique_class(&self, token: &str) -> Option<u32> {
        match self.unique(token)? {
            DiTarget::Class(idx) => Some(idx),
            DiTarget::Provider(_) => None,
        }
    }

    pub fn unique_provider(&self, token: &str) -> Option<u32> {
        match self.unique(token)? {
            DiTarget::Provider(idx) => Some(idx),
            DiTarget::Class(_) => None,
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Bare decorator name: `@nestjs.Injectable()` → `Injectable`.
pub fn decorator_name(raw: &str) -> &str {
    let name = raw.trim().trim_start_matches('@');
    let name = name.split('(').next().unwrap_or(name);
    name.rsplit('.').next().unwrap_or(name).trim()
}

fn has_marker(decorators: &[DecoratorInfo], markers: &[&str], extra: &[String]) -> bool {
    decorators.iter().any(|d| {
        let name = decorator_name(&d.name);
        markers.contains(&name) || extra.iter().any(|e| e == name)
    })
}

/// Identifier-like first positional (or `value`/`name`) argument, unquoted.
fn explicit_token(decorators: &[DecoratorInfo]) -> Option<String> {
    decorators.iter().find_map(|d| {
        let arg = d
            .arguments
            .iter()
            .find(|a| matches!(a.key.as_deref(), None | Some("value") | Some("name")))?;
        let value = arg.value.trim().trim_matches(['"', '\'', '`']);
        let ok = !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.' || c == '-');
        ok.then(|| value.to_string())
    })
}

/// Tokens a class registers under, empty when it is not DI-managed.
pub fn class_tokens(class: &ExtractedClass, extra_markers: &[String]) -> Vec<String> {
    if !has_marker(&class.decorators, DI_CLASS_MARKERS, extra_markers) {
        return Vec::new();
    }
    let mut tokens = vec![class.name.clone()];
    for iface in &class.implements {
        if !tokens.contains(iface) {
            tokens.push(iface.clone());
        }
    }
    if let Some(token) = explicit_token(&class.decorators) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// Token a provider function registers under.
pub fn provider_token(func: &ExtractedFunction) -> Option<String> {
    if !has_marker(&func.decorators, DI_PROVIDER_MARKERS, &[]) {
        return None;
    }
    explicit_token(&func.decorators)
        .or_else(|| func.return_type.as_deref().and_then(normalize_type_name))
        .or_else(|| Some(func.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::types::{ClassKind, DecoratorArgument, Visibility};

    fn class(name: &str, decorators: &[&str], implements: &[&str]) -> ExtractedClass {
        ExtractedClass {
            name: name.into(),
            parent: None,
            implements: implements.iter().map(|s| s.to_string()).collect(),
            kind: ClassKind::Class,
            is_exported: true,
            field_types: Vec::new(),
            decorators: decorators.iter().map(|d| DecoratorInfo::named(*d)).collect(),
        }
    }

    #[test]
    fn marked_class_registers_name_and_interfaces() {
        let c = class("UserService", &["Injectable()"], &["IUserService"]);
        assert_eq!(class_tokens(&c, &[]), vec!["UserService", "IUserService"]);
    }

    #[test]
    fn unmarked_class_registers_nothing() {
        let c = class("Plain", &["Deprecated"], &[]);
        assert!(class_tokens(&c, &[]).is_empty());
        assert_eq!(class_tokens(&c, &["Deprecated".into()]), vec!["Plain"]);
    }

    #[test]
    fn explicit_token_argument() {
        let mut c = class("MailerImpl", &["Named"], &[]);
        c.decorators[0].arguments.push(DecoratorArgument {
            key: None,
            value: "\"mailer\"".into(),
        });
        assert_eq!(class_tokens(&c, &[]), vec!["MailerImpl", "mailer"]);
    }

    #[test]
    fn provider_uses_return_type() {
        let f = ExtractedFunction {
            id: "cfg.java::AppConfig.dataSource".into(),
            name: "dataSource".into(),
            qualified_name: "AppConfig.dataSource".into(),
            class_name: Some("AppConfig".into()),
            line: 1,
            end_line: 3,
            is_exported: true,
            visibility: Visibility::Public,
            signature_hash: 1,
            body_hash: 2,
            return_type: Some("DataSource".into()),
            decorators: vec![DecoratorInfo::named("Bean")],
            parameters: Vec::new(),
        };
        assert_eq!(provider_token(&f).as_deref(), Some("DataSource"));
    }

    #[test]
    fn ambiguous_token_is_not_unique() {
        let mut reg = DiRegistry::new();
        reg.register("Repo", DiTarget::Class(1));
        reg.register("Repo", DiTarget::Class(2));
        reg.register("Repo", DiTarget::Class(2));
        assert_eq!(reg.unique("Repo"), None);
        reg.register("Cache", DiTarget::Class(3));
        assert_eq!(reg.unique_class("Cache"), Some(3));
    }
}
