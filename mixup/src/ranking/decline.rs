//! Decline functions: score multipliers driven by the intra-group position
//!
//! A decline function is selected by name and parameters when the request is
//! set up, then called once per window candidate. Implementations must be
//! pure: the result depends only on the inputs passed to [`DeclineFunction::multiplier`].

use crate::candidate::FieldValues;
use crate::error::Error;
use crate::ranking::expression::Expression;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Inputs available to a decline function for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct DeclineInput<'a> {
    /// 0-based rank inside the candidate's group
    pub position: usize,
    /// Original score before re-ranking
    pub score: f32,
    /// Values of the declared extra fields
    pub fields: &'a FieldValues,
}

/// A pluggable multiplier function of position (and optional fields).
pub trait DeclineFunction: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Fields the function reads. Each must be declared for resolution.
    fn required_fields(&self) -> &[String] {
        &[]
    }

    /// Multiplier applied to the original score.
    fn multiplier(&self, input: &DeclineInput<'_>) -> Result<f64>;
}

/// Reference to a decline function as it appears in a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeclineSpec {
    pub name: String,
    #[serde(default, alias = "parameters")]
    pub params: Map<String, Value>,
}

impl DeclineSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    /// Builder-style helper to set a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Shortcut for the `expression` escape hatch
    pub fn expression(source: &str) -> Self {
        Self::new(EXPRESSION).with_param("source", source)
    }
}

pub const POSITION_RECIP: &str = "position_recip";
pub const EXPONENTIAL: &str = "exponential";
pub const LINEAR: &str = "linear";
pub const CONSTANT: &str = "constant";
pub const EXPRESSION: &str = "expression";

/// `m / (a * pos + b) + c`
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecip {
    pub m: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Default for PositionRecip {
    fn default() -> Self {
        Self {
            m: 1.0,
            a: 1.0,
            b: 1.0,
            c: 0.0,
        }
    }
}

impl DeclineFunction for PositionRecip {
    fn name(&self) -> &str {
        POSITION_RECIP
    }

    fn multiplier(&self, input: &DeclineInput<'_>) -> Result<f64> {
        Ok(self.m / (self.a * input.position as f64 + self.b) + self.c)
    }
}

/// `base ^ pos`
#[derive(Debug, Clone, PartialEq)]
pub struct Exponential {
    pub base: f64,
}

impl DeclineFunction for Exponential {
    fn name(&self) -> &str {
        EXPONENTIAL
    }

    fn multiplier(&self, input: &DeclineInput<'_>) -> Result<f64> {
        Ok(self.base.powf(input.position as f64))
    }
}

/// `max(min, 1 - step * pos)`
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    pub step: f64,
    pub min: f64,
}

impl DeclineFunction for Linear {
    fn name(&self) -> &str {
        LINEAR
    }

    fn multiplier(&self, input: &DeclineInput<'_>) -> Result<f64> {
        Ok((1.0 - self.step * input.position as f64).max(self.min))
    }
}

/// Same multiplier for every position
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub value: f64,
}

impl DeclineFunction for Constant {
    fn name(&self) -> &str {
        CONSTANT
    }

    fn multiplier(&self, _input: &DeclineInput<'_>) -> Result<f64> {
        Ok(self.value)
    }
}

/// User-supplied expression, compiled once per request
#[derive(Debug, Clone)]
pub struct ExpressionDecline {
    expression: Expression,
}

impl ExpressionDecline {
    pub fn new(expression: Expression) -> Self {
        Self { expression }
    }
}

impl DeclineFunction for ExpressionDecline {
    fn name(&self) -> &str {
        EXPRESSION
    }

    fn required_fields(&self) -> &[String] {
        self.expression.fields()
    }

    fn multiplier(&self, input: &DeclineInput<'_>) -> Result<f64> {
        self.expression
            .evaluate(input.position, input.score, input.fields)
    }
}

/// Builds a decline function from request parameters.
pub type DeclineFactory =
    Arc<dyn Fn(&Map<String, Value>) -> Result<Arc<dyn DeclineFunction>> + Send + Sync>;

/// Resolves `(name, params)` pairs to decline functions.
pub struct DeclineRegistry {
    factories: HashMap<String, DeclineFactory>,
}

impl DeclineRegistry {
    /// Registry with every built-in decline function.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(POSITION_RECIP, |params| {
            let defaults = PositionRecip::default();
            Ok(Arc::new(PositionRecip {
                m: number_param(params, "m", defaults.m)?,
                a: number_param(params, "a", defaults.a)?,
                b: number_param(params, "b", defaults.b)?,
                c: number_param(params, "c", defaults.c)?,
            }) as Arc<dyn DeclineFunction>)
        });
        registry.register(EXPONENTIAL, |params| {
            let base = number_param(params, "base", 0.5)?;
            if base <= 0.0 {
                return Err(Error::Config(format!(
                    "exponential decline needs base > 0, got {}",
                    base
                )));
            }
            Ok(Arc::new(Exponential { base }) as Arc<dyn DeclineFunction>)
        });
        registry.register(LINEAR, |params| {
            let step = number_param(params, "step", 0.1)?;
            let min = number_param(params, "min", 0.0)?;
            if !step.is_finite() || !(min.is_finite() && min >= 0.0) {
                return Err(Error::Config(format!(
                    "linear decline needs a finite step and min >= 0, got step={} min={}",
                    step, min
                )));
            }
            Ok(Arc::new(Linear { step, min }) as Arc<dyn DeclineFunction>)
        });
        registry.register(CONSTANT, |params| {
            Ok(Arc::new(Constant {
                value: number_param(params, "value", 1.0)?,
            }) as Arc<dyn DeclineFunction>)
        });
        registry.register(EXPRESSION, |params| {
            let source = params
                .get("source")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::Config("expression decline needs a string 'source' param".to_string())
                })?;
            let constants = params
                .iter()
                .filter(|(key, _)| key.as_str() != "source")
                .map(|(key, value)| {
                    value
                        .as_f64()
                        .map(|v| (key.clone(), v))
                        .ok_or_else(|| {
                            Error::Config(format!("Expression param '{}' must be numeric", key))
                        })
                })
                .collect::<Result<HashMap<_, _>>>()?;
            let expression = Expression::compile(source, &constants)?;
            Ok(Arc::new(ExpressionDecline::new(expression)) as Arc<dyn DeclineFunction>)
        });
        registry
    }

    /// Registry without any decline function.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) a named factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Map<String, Value>) -> Result<Arc<dyn DeclineFunction>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn resolve(&self, spec: &DeclineSpec) -> Result<Arc<dyn DeclineFunction>> {
        let factory = self.factories.get(&spec.name).ok_or_else(|| {
            Error::Config(format!("Unknown decline function [{}]", spec.name))
        })?;
        factory(&spec.params)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for DeclineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeclineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclineRegistry")
            .field("names", &self.names())
            .finish()
    }
}

fn number_param(params: &Map<String, Value>, key: &str, default: f64) -> Result<f64> {
    match params.get(key) {
        None => Ok(default),
        Some(value) => value.as_f64().ok_or_else(|| {
            Error::Config(format!("Decline param '{}' must be numeric, got {}", key, value))
        }),
    }
}
