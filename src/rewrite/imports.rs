//! Helper import injection.

use crate::config::RuleConfig;
use crate::report::Finding;
use once_cell::sync::Lazy;
use regex::Regex;

static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\x{FEFF}?\s*import(?:\s|\{|\*|"|')"#).expect("static regex is valid")
});

/// Helper names a file needs: one per distinct known method, in table order,
/// followed by the emptiness helper.
pub fn required_helpers(findings: &[Finding], config: &RuleConfig) -> Vec<String> {
    let mut names: Vec<String> = config
        .methods
        .iter()
        .filter(|rule| findings.iter().any(|f| f.method == rule.method))
        .map(|rule| rule.helper.clone())
        .collect();

    if !names.iter().any(|n| n == &config.empty_check_helper) {
        names.push(config.empty_check_helper.clone());
    }
    names
}

/// True if the file already imports from the helper module.
pub fn has_helper_import(content: &str, module: &str) -> bool {
    ['"', '\''].iter().any(|q| {
        content.contains(&format!("from {q}{module}{q}"))
            || content.contains(&format!("import {q}{module}{q}"))
    })
}

pub fn import_statement(names: &[String], module: &str) -> String {
    format!("import {{ {} }} from \"{}\";", names.join(", "), module)
}

/// Index of the first line that starts an import statement.
pub fn first_import_line<S: AsRef<str>>(lines: &[S]) -> Option<usize> {
    lines.iter().position(|line| IMPORT_LINE.is_match(line.as_ref()))
}
