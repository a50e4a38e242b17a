use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

/// Default import source for the safe helpers.
pub const DEFAULT_HELPER_MODULE: &str = "@/lib/arrayHelpers";

/// Default generic emptiness helper, always imported alongside the others.
pub const DEFAULT_EMPTY_CHECK_HELPER: &str = "isEmpty";

const DEFAULT_METHODS: &[(&str, &str)] = &[
    ("map", "safeMap"),
    ("filter", "safeFilter"),
    ("find", "safeFind"),
    ("reduce", "safeReduce"),
    ("forEach", "safeForEach"),
    ("some", "safeSome"),
    ("every", "safeEvery"),
];

const DEFAULT_EXEMPT_IDENTIFIERS: &[&str] = &[
    "Array", "Object", "JSON", "Math", "Promise", "String", "Number", "Date", "Reflect",
    "console", "window", "document", "z", "trpc",
];

const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx"];

const DEFAULT_IGNORE_DIRS: &[&str] = &["node_modules", ".git", "dist", "build"];

/// Immutable rule set shared by the detector and the rewriter.
///
/// Changing any of these values invalidates previously written reports.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RuleConfig {
    /// Import source the safe helpers live in
    pub helper_module: String,
    /// Helper always added to injected imports
    pub empty_check_helper: String,
    /// Ordered unsafe method -> safe helper table
    pub methods: Vec<MethodRule>,
    pub exemptions: Exemptions,
    pub discovery: DiscoveryConfig,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            helper_module: DEFAULT_HELPER_MODULE.to_string(),
            empty_check_helper: DEFAULT_EMPTY_CHECK_HELPER.to_string(),
            methods: DEFAULT_METHODS
                .iter()
                .map(|(method, helper)| MethodRule::new(*method, *helper))
                .collect(),
            exemptions: Exemptions::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl RuleConfig {
    /// Safe helper mapped to `method`, if the method is in the table.
    pub fn helper_for(&self, method: &str) -> Option<&str> {
        self.methods
            .iter()
            .find(|rule| rule.method == method)
            .map(|rule| rule.helper.as_str())
    }

    /// All configured method helpers, in table order.
    pub fn helper_names(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|rule| rule.helper.as_str())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.methods.is_empty() {
            issues.push(ValidationIssue::EmptyMethodTable);
        }
        if self.helper_module.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                method: None,
                field: "helper_module",
            });
        }
        if self.empty_check_helper.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                method: None,
                field: "empty_check_helper",
            });
        }

        let mut seen = HashSet::new();
        for rule in &self.methods {
            if rule.method.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    method: None,
                    field: "methods.method",
                });
                continue;
            }
            if !is_identifier(&rule.method) {
                issues.push(ValidationIssue::InvalidName {
                    method: rule.method.clone(),
                    message: "method is not a valid identifier".to_string(),
                });
            }
            if rule.helper.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    method: Some(rule.method.clone()),
                    field: "methods.helper",
                });
            } else if !is_identifier(&rule.helper) {
                issues.push(ValidationIssue::InvalidName {
                    method: rule.method.clone(),
                    message: format!("helper '{}' is not a valid identifier", rule.helper),
                });
            }
            if !seen.insert(rule.method.as_str()) {
                issues.push(ValidationIssue::DuplicateMethod {
                    method: rule.method.clone(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// One entry of the unsafe method table.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MethodRule {
    pub method: String,
    pub helper: String,
}

impl MethodRule {
    pub fn new(method: impl Into<String>, helper: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            helper: helper.into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Exemptions {
    /// Receivers that are never reported (globals, framework bindings)
    pub identifiers: Vec<String>,
}

impl Default for Exemptions {
    fn default() -> Self {
        Self {
            identifiers: DEFAULT_EXEMPT_IDENTIFIERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// File extensions (without the dot) considered source files
    pub extensions: Vec<String>,
    /// Directory names pruned during discovery and refused by the rewriter
    pub ignore_dirs: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Distinct method rules named by the issues, first mention first.
    pub fn methods(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for name in self.issues.iter().filter_map(ValidationIssue::method) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyMethodTable,
    MissingField {
        method: Option<String>,
        field: &'static str,
    },
    InvalidName {
        method: String,
        message: String,
    },
    DuplicateMethod {
        method: String,
    },
}

impl ValidationIssue {
    pub fn method(&self) -> Option<&str> {
        match self {
            ValidationIssue::EmptyMethodTable => None,
            ValidationIssue::MissingField { method, .. } => method.as_deref(),
            ValidationIssue::InvalidName { method, .. }
            | ValidationIssue::DuplicateMethod { method } => Some(method.as_str()),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyMethodTable => write!(f, "rule config contains no methods"),
            ValidationIssue::MissingField { method, field } => match method {
                Some(m) => write!(f, "method '{m}' missing required field '{field}'"),
                None => write!(f, "missing required field '{field}'"),
            },
            ValidationIssue::InvalidName { method, message } => {
                write!(f, "method '{method}' has invalid configuration: {message}")
            }
            ValidationIssue::DuplicateMethod { method } => {
                write!(f, "method '{method}' is declared more than once")
            }
        }
    }
}
