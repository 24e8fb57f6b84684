//! `{{name}}` marker substitution for URL, header and body templates
//!
//! Markers may also appear URL-encoded as `%7B%7Bname%7D%7D`. Output is
//! the body of a JavaScript template literal, so literal text is escaped
//! and data-driven markers become `${item["name"]}` interpolations, so
//! column names need not be JavaScript identifiers.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CompileError, CompileResult};

static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\{\{|%7B%7B)(.+?)(?:\}\}|%7D%7D)").expect("marker pattern is valid")
});

/// Where a template lives in the profile, for error messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateTarget {
    Url,
    Header(String),
    Body,
}

impl fmt::Display for TemplateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateTarget::Url => f.write_str("url"),
            TemplateTarget::Header(name) => write!(f, "header '{name}'"),
            TemplateTarget::Body => f.write_str("body"),
        }
    }
}

/// Strict marker renderer: every marker must resolve
#[derive(Debug, Clone, Copy)]
pub struct MarkerTemplate<'a> {
    variables: &'a BTreeMap<String, String>,
    /// `Some` when the profile iterates a data file; inner `Some` restricts the column names
    data_columns: Option<Option<&'a [String]>>,
}

impl<'a> MarkerTemplate<'a> {
    pub fn new(variables: &'a BTreeMap<String, String>) -> Self {
        Self {
            variables,
            data_columns: None,
        }
    }

    /// Allow unresolved markers to read from the current data row
    pub fn with_data_file(mut self, columns: Option<&'a [String]>) -> Self {
        self.data_columns = Some(columns);
        self
    }

    /// Names of all markers in `template`, in order of appearance
    pub fn markers(template: &str) -> Vec<String> {
        MARKER_RE
            .captures_iter(template)
            .map(|c| c[1].trim().to_string())
            .collect()
    }

    /// Render `template` as the contents of a JS template literal
    pub fn render(&self, template: &str, target: &TemplateTarget) -> CompileResult<String> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for caps in MARKER_RE.captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&escape_template_literal(&template[last..whole.start()]));
            last = whole.end();

            let name = caps[1].trim();
            if let Some(value) = self.variables.get(name) {
                out.push_str(&escape_template_literal(value));
                continue;
            }

            match self.data_columns {
                Some(None) => push_item_ref(&mut out, name)?,
                Some(Some(columns)) if columns.iter().any(|c| c == name) => {
                    push_item_ref(&mut out, name)?
                }
                _ => {
                    return Err(CompileError::UndefinedVariable {
                        name: name.to_string(),
                        location: target.to_string(),
                    })
                }
            }
        }

        out.push_str(&escape_template_literal(&template[last..]));
        Ok(out)
    }
}

fn push_item_ref(out: &mut String, name: &str) -> CompileResult<()> {
    let key = serde_json::to_string(name).map_err(|e| CompileError::invalid(e.to_string()))?;
    out.push_str("${item[");
    out.push_str(&key);
    out.push_str("]}");
    Ok(())
}

/// Escape text for use inside a JavaScript template literal
pub fn escape_template_literal(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}
