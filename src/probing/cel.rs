// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CEL availability probes.
//!
//! Rules see the probed object as `self`. A rule is compiled once when the
//! probe is built. There is no static type checker for CEL here, so the
//! compiled program is also evaluated against an empty object: a rule that
//! already yields a non-boolean value there (a literal, arithmetic, `self`
//! itself) is rejected up front. Rules whose type depends on fields of the
//! object are checked again on every evaluation.

use super::{ProbeResult, Prober};
use crate::errors::ProbeError;
use cel_interpreter::{Context, Program, Value as CelValue};
use serde_json::Value;
use std::fmt;

/// Binding under which rules see the probed object.
const SELF_BINDING: &str = "self";

/// Evaluates a compiled CEL rule against objects.
pub struct CelProbe {
    rule: String,
    message: String,
    program: Program,
}

impl fmt::Debug for CelProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CelProbe")
            .field("rule", &self.rule)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl CelProbe {
    /// Compiles `rule`.
    ///
    /// # Errors
    ///
    /// - [`ProbeError::CelCompile`] if the rule does not parse
    /// - [`ProbeError::CelInvalidEvaluationType`] if the rule yields a non-boolean value
    pub fn new(rule: impl Into<String>, message: impl Into<String>) -> Result<Self, ProbeError> {
        let rule = rule.into();
        let program = Program::compile(&rule).map_err(|e| ProbeError::CelCompile {
            rule: rule.clone(),
            reason: e.to_string(),
        })?;

        if let Ok(value) = evaluate(&program, &Value::Object(serde_json::Map::new())) {
            if !matches!(value, CelValue::Bool(_)) {
                return Err(ProbeError::CelInvalidEvaluationType {
                    rule,
                    actual: type_name(&value).to_string(),
                });
            }
        }

        Ok(Self {
            rule,
            message: message.into(),
            program,
        })
    }

    #[must_use]
    pub fn rule(&self) -> &str {
        &self.rule
    }
}

impl Prober for CelProbe {
    fn probe(&self, object: &Value) -> ProbeResult {
        match evaluate(&self.program, object) {
            Ok(CelValue::Bool(true)) => ProbeResult::ok(),
            Ok(CelValue::Bool(false)) => ProbeResult::fail(self.message.clone()),
            Ok(other) => ProbeResult::fail(format!(
                "CEL rule {:?} evaluated to {} instead of bool",
                self.rule,
                type_name(&other)
            )),
            Err(reason) => ProbeResult::fail(format!(
                "CEL rule {:?} failed to evaluate: {reason}",
                self.rule
            )),
        }
    }
}

fn evaluate(program: &Program, object: &Value) -> Result<CelValue, String> {
    let mut context = Context::default();
    context
        .add_variable(SELF_BINDING, object.clone())
        .map_err(|e| e.to_string())?;
    program.execute(&context).map_err(|e| e.to_string())
}

fn type_name(value: &CelValue) -> &'static str {
    match value {
        CelValue::Bool(_) => "bool",
        CelValue::Int(_) => "int",
        CelValue::UInt(_) => "uint",
        CelValue::Float(_) => "double",
        CelValue::String(_) => "string",
        CelValue::Bytes(_) => "bytes",
        CelValue::List(_) => "list",
        CelValue::Map(_) => "map",
        CelValue::Null => "null",
        _ => "unknown",
    }
}

#[cfg(test)]
#[path = "cel_tests.rs"]
mod cel_tests;
