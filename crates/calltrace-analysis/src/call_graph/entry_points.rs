//! Entry-point classification.
//!
//! Detectors run in fixed priority order and the first match wins:
//! route decorator, controller directory, exported handler naming, program
//! main, framework structure. Detection looks only at a function's own
//! extraction and its enclosing class, so it can be recomputed per file.

use calltrace_core::config::EntryPointConfig;
use calltrace_core::errors::ConfigError;
use calltrace_core::types::collections::FxHashSet;
use regex::Regex;

use crate::parsers::types::DecoratorInfo;
use crate::scanner::language_detect::Language;

use super::di_support::decorator_name;
use super::extractor::{ExtractedClass, ExtractedFile, ExtractedFunction};
use super::types::{EntryPoint, EntryPointKind};

const ROUTE_CONFIDENCE: f32 = 0.95;
const CONTROLLER_CONFIDENCE: f32 = 0.85;
const EXPORTED_HANDLER_CONFIDENCE: f32 = 0.70;
const MAIN_CONFIDENCE: f32 = 0.99;

/// Route decorators: (name, HTTP method, framework).
const ROUTE_DECORATORS: &[(&str, &str, &str)] = &[
    // NestJS
    ("Get", "GET", "nestjs"),
    ("Post", "POST", "nestjs"),
    ("Put", "PUT", "nestjs"),
    ("Delete", "DELETE", "nestjs"),
    ("Patch", "PATCH", "nestjs"),
    ("All", "ANY", "nestjs"),
    // Spring
    ("GetMapping", "GET", "spring"),
    ("PostMapping", "POST", "spring"),
    ("PutMapping", "PUT", "spring"),
    ("DeleteMapping", "DELETE", "spring"),
    ("PatchMapping", "PATCH", "spring"),
    ("RequestMapping", "ANY", "spring"),
    // ASP.NET
    ("HttpGet", "GET", "aspnet"),
    ("HttpPost", "POST", "aspnet"),
    ("HttpPut", "PUT", "aspnet"),
    ("HttpDelete", "DELETE", "aspnet"),
    ("HttpPatch", "PATCH", "aspnet"),
    ("Route", "ANY", "aspnet"),
    // JAX-RS
    ("GET", "GET", "jaxrs"),
    ("POST", "POST", "jaxrs"),
    ("PUT", "PUT", "jaxrs"),
    ("DELETE", "DELETE", "jaxrs"),
    ("Path", "ANY", "jaxrs"),
    // Flask / FastAPI / Express-style decorators
    ("route", "ANY", "flask"),
    ("get", "GET", "fastapi"),
    ("post", "POST", "fastapi"),
    ("put", "PUT", "fastapi"),
    ("delete", "DELETE", "fastapi"),
    ("patch", "PATCH", "fastapi"),
    ("api_view", "ANY", "django"),
];

/// Class decorators whose argument prefixes every method route.
const ROUTE_PREFIX_DECORATORS: &[&str] = &["Controller", "RequestMapping", "Route", "Path"];

/// Decorators marking externally invoked jobs and commands.
const FRAMEWORK_DECORATORS: &[(&str, &str, f32)] = &[
    ("command", "click", 0.90),
    ("group", "click", 0.85),
    ("task", "celery", 0.85),
    ("shared_task", "celery", 0.85),
    ("Scheduled", "spring", 0.90),
    ("Cron", "nestjs", 0.90),
    ("EventPattern", "nestjs", 0.85),
    ("MessagePattern", "nestjs", 0.85),
    ("KafkaListener", "spring", 0.85),
    ("receiver", "django", 0.80),
];

const HTTP_METHOD_EXPORTS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

const SERVLET_METHODS: &[&str] = &["doGet", "doPost", "doPut", "doDelete", "service"];

const DJANGO_VIEW_BASES: &[&str] = &["View", "APIView", "ViewSet", "ModelViewSet", "GenericAPIView", "TemplateView"];

const DJANGO_VIEW_METHODS: &[&str] = &["get", "post", "put", "patch", "delete", "list", "create", "retrieve", "update", "destroy"];

pub struct EntryPointDetector {
    controller_globs: Vec<glob::Pattern>,
    extra_route_decorators: FxHashSet<String>,
    handler_name: Regex,
}

impl EntryPointDetector {
    pub fn new(config: &EntryPointConfig) -> Result<Self, ConfigError> {
        let controller_globs = config
            .effective_controller_globs()
            .iter()
            .map(|g| {
                glob::Pattern::new(g).map_err(|e| ConfigError::InvalidValue {
                    field: "entry_points.controller_globs".to_string(),
                    message: format!("{g}: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let handler_name =
            Regex::new(r"^(handle|handler|Handle|Handler|lambda_handler)$|^(handle|Handle)[A-Z_]|[a-z]Handler$|^on[A-Z]")
                .map_err(|e| ConfigError::InvalidValue {
                    field: "entry_points.handler_name".to_string(),
                    message: e.to_string(),
                })?;
        Ok(Self {
            controller_globs,
            extra_route_decorators: config.extra_route_decorators.iter().cloned().collect(),
            handler_name,
        })
    }

    /// Classify every function of `file`.
    pub fn detect_file(&self, file: &ExtractedFile) -> Vec<(String, EntryPoint)> {
        file.functions
            .iter()
            .filter_map(|f| self.detect(file, f).map(|ep| (f.id.clone(), ep)))
            .collect()
    }

    pub fn detect(&self, file: &ExtractedFile, func: &ExtractedFunction) -> Option<EntryPoint> {
        let class = func.class_name.as_deref().and_then(|c| file.class(c));

        if let Some(ep) = self.route_handler(func, class) {
            return Some(ep);
        }
        if func.is_exported && !func.is_constructor() && self.in_controller_dir(&file.file) {
            return Some(EntryPoint::new(EntryPointKind::ControllerMethod, CONTROLLER_CONFIDENCE));
        }
        if func.is_exported && self.handler_name.is_match(&func.name) {
            return Some(EntryPoint::new(EntryPointKind::ExportedHandler, EXPORTED_HANDLER_CONFIDENCE));
        }
        if is_main(file.language, &file.file, func) {
            return Some(EntryPoint::new(EntryPointKind::MainFunction, MAIN_CONFIDENCE));
        }
        framework_entry(file, func, class)
    }

    fn in_controller_dir(&self, path: &str) -> bool {
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        // `**/x/**` should also match `x/...` at the project root.
        let rooted = format!("./{path}");
        self.controller_globs.iter().any(|g| {
            g.matches_with(path, options) || g.matches_with(&rooted, options)
        })
    }

    fn route_handler(&self, func: &ExtractedFunction, class: Option<&ExtractedClass>) -> Option<EntryPoint> {
        let (decorator, method, framework) = func.decorators.iter().find_map(|d| {
            let name = decorator_name(&d.name);
            if let Some((_, method, framework)) = ROUTE_DECORATORS.iter().find(|(n, _, _)| *n == name) {
                return Some((d, method.to_string(), Some(framework.to_string())));
            }
            self.extra_route_decorators
                .contains(name)
                .then(|| (d, "ANY".to_string(), None))
        })?;

        let method = match decorator_keyword(decorator, "methods") {
            Some(methods) if method == "ANY" => first_http_method(&methods).unwrap_or(method),
            _ => method,
        };
        let path = first_string_argument(decorator);
        let prefix = class.and_then(|c| {
            c.decorators
                .iter()
                .filter(|d| ROUTE_PREFIX_DECORATORS.contains(&decorator_name(&d.name)))
                .find_map(first_string_argument)
        });
        let route = match (prefix, path) {
            (Some(prefix), Some(path)) => Some(join_route(&prefix, &path)),
            (Some(prefix), None) => Some(join_route(&prefix, "")),
            (None, Some(path)) => Some(path),
            (None, None) => None,
        };

        Some(EntryPoint {
            kind: EntryPointKind::RouteHandler,
            route,
            method: Some(method),
            framework,
            confidence: ROUTE_CONFIDENCE,
        })
    }
}

impl std::fmt::Debug for EntryPointDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryPointDetector")
            .field("controller_globs", &self.controller_globs.len())
            .field("extra_route_decorators", &self.extra_route_decorators)
            .finish()
    }
}

fn is_main(language: Language, path: &str, func: &ExtractedFunction) -> bool {
    match language {
        Language::Java | Language::Kotlin | Language::Scala | Language::CSharp => {
            matches!(func.name.as_str(), "main" | "Main")
        }
        Language::Python if path.ends_with("__main__.py") => func.class_name.is_none(),
        _ => func.class_name.is_none() && func.name == "main",
    }
}

/// Structural framework conventions that do not rely on a route decorator.
fn framework_entry(
    file: &ExtractedFile,
    func: &ExtractedFunction,
    class: Option<&ExtractedClass>,
) -> Option<EntryPoint> {
    if let Some((framework, confidence)) = func.decorators.iter().find_map(|d| {
        let name = decorator_name(&d.name);
        FRAMEWORK_DECORATORS
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, fw, c)| (*fw, *c))
    }) {
        return Some(EntryPoint::framework(framework, confidence));
    }

    // Next.js app router: `app/**/route.ts` exporting HTTP verbs.
    if func.is_exported
        && func.class_name.is_none()
        && HTTP_METHOD_EXPORTS.contains(&func.name.as_str())
        && is_next_route_file(&file.file)
    {
        let mut ep = EntryPoint::framework("nextjs", 0.90);
        ep.route = Some(next_route_path(&file.file));
        ep.method = Some(func.name.clone());
        return Some(ep);
    }

    let class = class?;
    let extends = |bases: &[&str]| {
        class
            .supertypes()
            .any(|s| bases.contains(&s.rsplit('.').next().unwrap_or(s)))
    };
    match file.language {
        Language::Java | Language::Kotlin
            if SERVLET_METHODS.contains(&func.name.as_str()) && extends(&["HttpServlet"]) =>
        {
            Some(EntryPoint::framework("servlet", 0.85))
        }
        Language::Python
            if DJANGO_VIEW_METHODS.contains(&func.name.as_str()) && extends(DJANGO_VIEW_BASES) =>
        {
            let mut ep = EntryPoint::framework("django", 0.80);
            ep.method = Some(func.name.to_uppercase());
            Some(ep)
        }
        Language::Go if func.name == "ServeHTTP" => Some(EntryPoint::framework("net/http", 0.80)),
        _ => None,
    }
}

fn is_next_route_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    let stem = name.split('.').next().unwrap_or(name);
    stem == "route" && (path.starts_with("app/") || path.contains("/app/"))
}

/// `src/app/api/users/[id]/route.ts` → `/api/users/[id]`.
fn next_route_path(path: &str) -> String {
    let after_app = match path.find("app/") {
        Some(i) if i == 0 || path[..i].ends_with('/') => &path[i + 4..],
        _ => path,
    };
    let dir = after_app.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
    let segments: Vec<&str> = dir
        .split('/')
        .filter(|s| !s.is_empty() && !(s.starts_with('(') && s.ends_with(')')))
        .collect();
    format!("/{}", segments.join("/"))
}

fn strip_quotes(value: &str) -> &str {
    value.trim().trim_matches(['"', '\'', '`'])
}

fn is_quoted(value: &str) -> bool {
    let v = value.trim();
    v.len() >= 2
        && (v.starts_with('"') || v.starts_with('\'') || v.starts_with('`'))
        && v.ends_with(|c: char| c == '"' || c == '\'' || c == '`')
}

/// First positional string argument, or `value`/`path`.
fn first_string_argument(decorator: &DecoratorInfo) -> Option<String> {
    decorator
        .arguments
        .iter()
        .filter(|a| matches!(a.key.as_deref(), None | Some("value") | Some("path")))
        .find(|a| is_quoted(&a.value))
        .map(|a| strip_quotes(&a.value).to_string())
}

fn decorator_keyword(decorator: &DecoratorInfo, key: &str) -> Option<String> {
    decorator
        .arguments
        .iter()
        .find(|a| a.key.as_deref() == Some(key))
        .map(|a| a.value.clone())
}

/// `['POST', 'PUT']` → `POST`.
fn first_http_method(list: &str) -> Option<String> {
    list.split(|c: char| !c.is_ascii_alphabetic())
        .find(|s| !s.is_empty())
        .map(|s| s.to_uppercase())
}

fn join_route(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let path = path.trim_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{path}"),
        (false, true) => format!("/{prefix}"),
        (false, false) => format!("/{prefix}/{path}"),
    }
}
