//! Execution requests and their translation into command-line arguments.
//!
//! A request names an action (the first positional argument) and carries a
//! flat mapping of parameter names to [`ParamValue`]s. Parameters keep the
//! order in which they appeared in the request body.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A single parameter value.
///
/// JSON `true`/`false` map to [`ParamValue::Flag`], JSON strings map to
/// [`ParamValue::Text`]. JSON `null` is accepted at the map level and treated
/// as an absent parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Flag(bool),
    Text(String),
}

/// Body of an execute call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionRequest {
    /// Action passed to the executable as its first positional argument.
    #[serde(default)]
    pub action: String,
    /// Named parameters, converted into `--name [value]` tokens.
    #[serde(default)]
    pub params: IndexMap<String, Option<ParamValue>>,
}

impl ExecutionRequest {
    /// Check that the request can be turned into a sensible argument list.
    ///
    /// Rejects a missing or blank action, an action that would be parsed as
    /// an option, and parameter names that cannot form a `--name` token.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.action.trim().is_empty() {
            return Err(CoreError::Validation("action is required".to_string()));
        }
        if self.action.starts_with('-') {
            return Err(CoreError::Validation(format!(
                "action must not start with '-': {}",
                self.action
            )));
        }
        for name in self.params.keys() {
            validate_param_name(name)?;
        }
        Ok(())
    }

    /// Build the argument list for this request.
    ///
    /// The action comes first, followed by one `--name` token per enabled
    /// flag and a `--name value` pair per non-empty text value. False flags,
    /// empty strings and nulls are omitted.
    ///
    /// # Examples
    ///
    /// ```
    /// use runcast_core::params::{ExecutionRequest, ParamValue};
    ///
    /// let mut req = ExecutionRequest { action: "build".into(), ..Default::default() };
    /// req.params.insert("a".into(), Some(ParamValue::Flag(true)));
    /// req.params.insert("b".into(), Some(ParamValue::Text("x".into())));
    /// req.params.insert("c".into(), Some(ParamValue::Flag(false)));
    ///
    /// assert_eq!(req.build_args(), ["build", "--a", "--b", "x"]);
    /// ```
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![self.action.clone()];
        for (name, value) in &self.params {
            match value {
                Some(ParamValue::Flag(true)) => args.push(format!("--{name}")),
                Some(ParamValue::Text(text)) if !text.is_empty() => {
                    args.push(format!("--{name}"));
                    args.push(text.clone());
                }
                Some(ParamValue::Flag(false)) | Some(ParamValue::Text(_)) | None => {}
            }
        }
        args
    }
}

fn validate_param_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "parameter names must not be empty".to_string(),
        ));
    }
    if name.starts_with('-') {
        return Err(CoreError::Validation(format!(
            "parameter name must not start with '-': {name}"
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || c == '=') {
        return Err(CoreError::Validation(format!(
            "parameter name must not contain whitespace or '=': {name}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
