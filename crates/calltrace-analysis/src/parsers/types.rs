//! Canonical parse records handed over by the parser collaborator.
//!
//! Language differences (how a receiver is spelled, what counts as exported,
//! how an import is written) are settled by the parser before these records
//! are built. The call-graph engine never branches on syntax.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::scanner::language_detect::Language;

/// One parsed source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    pub file: String,
    pub language: Language,
    pub content_hash: u64,

    // Structural extraction
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<ClassInfo>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,

    // Call extraction
    pub call_sites: Vec<CallSite>,

    // Metadata
    pub namespace: Option<String>,
    pub error_count: u32,
    pub has_errors: bool,
}

impl ParseResult {
    /// Empty result for `file`, language detected from the extension.
    pub fn new(file: impl Into<String>) -> Self {
        let file = file.into();
        let language = Language::from_path(&file).unwrap_or(Language::TypeScript);
        Self {
            file,
            language,
            ..Self::default()
        }
    }
}

impl Default for ParseResult {
    fn default() -> Self {
        Self {
            file: String::new(),
            language: Language::TypeScript,
            content_hash: 0,
            functions: Vec::new(),
            classes: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            call_sites: Vec::new(),
            namespace: None,
            error_count: 0,
            has_errors: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub qualified_name: Option<String>,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub parameters: SmallVec<[ParameterInfo; 4]>,
    pub return_type: Option<String>,
    pub visibility: Visibility,
    pub is_exported: bool,
    pub is_async: bool,
    pub is_abstract: bool,
    pub decorators: Vec<DecoratorInfo>,
    pub body_hash: u64,
    pub signature_hash: u64,
}

impl FunctionInfo {
    pub fn new(name: impl Into<String>, line: u32, end_line: u32) -> Self {
        Self {
            name: name.into(),
            line,
            end_line,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    pub namespace: Option<String>,
    pub extends: Option<String>,
    pub implements: SmallVec<[String; 2]>,
    pub is_exported: bool,
    pub is_abstract: bool,
    pub class_kind: ClassKind,
    pub methods: Vec<FunctionInfo>,
    pub properties: Vec<PropertyInfo>,
    pub decorators: Vec<DecoratorInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Struct,
    Enum,
    Trait,
    Record,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecoratorInfo {
    pub name: String,
    pub arguments: SmallVec<[DecoratorArgument; 2]>,
    pub raw_text: String,
}

impl DecoratorInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecoratorArgument {
    pub key: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallSite {
    pub callee_name: String,
    pub receiver: Option<String>,
    /// Module the callee was imported from, when the parser could tell.
    pub import_source: Option<String>,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub argument_count: u8,
    pub is_await: bool,
    /// `new Foo()` and equivalents.
    pub is_constructor: bool,
}

impl CallSite {
    pub fn new(callee_name: impl Into<String>, line: u32) -> Self {
        Self {
            callee_name: callee_name.into(),
            line,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportInfo {
    pub source: String,
    pub specifiers: SmallVec<[ImportSpecifier; 4]>,
    pub is_type_only: bool,
    pub file: String,
    pub line: u32,
}

/// `name` is the exported name (`default` for default imports, `*` for
/// namespace imports); `alias` is the local binding when it differs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSpecifier {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportInfo {
    pub name: Option<String>,
    pub is_default: bool,
    pub is_type_only: bool,
    /// Re-export source (`export { x } from './y'`).
    pub source: Option<String>,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub type_annotation: Option<String>,
    pub default_value: Option<String>,
    pub is_rest: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub name: String,
    pub type_annotation: Option<String>,
    pub is_static: bool,
    pub is_readonly: bool,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
}
