use std::fs;
use std::path::PathBuf;

use crate::error::{PipelineError, Result};

pub const TRANSFERS_DAILY: &str = "transfers_daily.sql";
pub const MINTS_DAILY: &str = "mints_daily.sql";
pub const ACTIVE_WALLETS_DAILY: &str = "active_wallets_daily.sql";
pub const TOP_WALLETS: &str = "top_x_wallets.sql";
pub const WALLET_ACTIVITY: &str = "wallet_activity.sql";

/// Named text parameters substituted into `{name}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        let name = name.into();
        let value = value.to_string();
        match self.values.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }
}

/// SQL templates kept as files under one directory.
#[derive(Debug, Clone)]
pub struct QueryTemplateStore {
    dir: PathBuf,
}

impl QueryTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        fs::read_to_string(&path).map_err(|err| PipelineError::QueryTemplate {
            template: name.to_string(),
            message: format!("failed to read {}: {err}", path.display()),
        })
    }

    pub fn render(&self, name: &str, params: &QueryParams) -> Result<String> {
        let template = self.load(name)?;
        render(name, &template, params)
    }
}

/// Substitutes `{name}` placeholders; `{{` and `}}` produce literal braces.
pub fn render(template_name: &str, template: &str, params: &QueryParams) -> Result<String> {
    let fail = |message: String| PipelineError::QueryTemplate {
        template: template_name.to_string(),
        message,
    };

    let mut rendered = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                rendered.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                rendered.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(next) => name.push(next),
                        None => return Err(fail(format!("unterminated placeholder `{{{name}`"))),
                    }
                }
                let name = name.trim();
                let value = params
                    .get(name)
                    .ok_or_else(|| fail(format!("no value for placeholder `{name}`")))?;
                rendered.push_str(value);
            }
            '}' => return Err(fail("unmatched `}`".to_string())),
            other => rendered.push(other),
        }
    }

    Ok(rendered)
}

/// Quotes values as comma-separated SQL string literals: `'a', 'b'`.
pub fn sql_list<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|value| format!("'{}'", value.as_ref().replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ")
}
