// file: src/config/loader.rs
// version: 1.0.0
// guid: bce6ca24-cd1c-4f4c-9491-f7a9edb54f17

//! Network plan loading and environment variable substitution

use super::NetworkPlan;
use crate::error::MeshError;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

static ENV_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid regex pattern"));

/// Plan loader with environment variable substitution
pub struct ConfigLoader {
    env_vars: HashMap<String, String>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            env_vars: std::env::vars().collect(),
        }
    }

    /// Resolve the plan for this invocation: a plan file wins over a profile name
    pub fn resolve_plan<P: AsRef<Path>>(&self, profile: &str, plan_file: Option<P>) -> Result<NetworkPlan> {
        let plan = match plan_file {
            Some(path) => self.load_plan(path)?,
            None => {
                let plan = NetworkPlan::builtin(profile)?;
                plan.validate()?;
                plan
            }
        };
        debug!("Using network plan '{}'", plan.name);
        Ok(plan)
    }

    /// Load a network plan from a YAML file
    pub fn load_plan<P: AsRef<Path>>(&self, path: P) -> Result<NetworkPlan> {
        info!("Loading network plan from {}", path.as_ref().display());
        let content = fs::read_to_string(&path).map_err(|e| {
            MeshError::config(format!(
                "Failed to read plan file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let expanded = self.expand_env_vars(&content)?;
        let plan: NetworkPlan = serde_yaml::from_str(&expanded)?;

        plan.validate()?;

        Ok(plan)
    }

    /// Expand environment variables in plan content
    fn expand_env_vars(&self, content: &str) -> Result<String> {
        let mut result = content.to_string();
        let mut missing_vars = Vec::new();

        for cap in ENV_VAR_RE.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];

            if let Some(value) = self.env_vars.get(var_name) {
                result = result.replace(placeholder, value);
            } else if !missing_vars.iter().any(|m| m == var_name) {
                missing_vars.push(var_name.to_string());
            }
        }

        if !missing_vars.is_empty() {
            return Err(MeshError::config(format!(
                "Missing environment variables: {}",
                missing_vars.join(", ")
            )));
        }

        Ok(result)
    }

    /// Set environment variable for substitution
    pub fn set_env_var(&mut self, key: String, value: String) {
        self.env_vars.insert(key, value);
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
