//! Evaluates script expressions against an environment.

use super::env::Environment;
use crate::error::EvalError;
use crate::value::Value;
use oxc_ast::ast::{ArrayExpressionElement, Expression, NumericLiteral, ObjectPropertyKind};
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};

pub fn evaluate(expr: &Expression<'_>, env: &Environment<'_>) -> Result<Value, EvalError> {
    match expr {
        Expression::StringLiteral(lit) => Ok(Value::Str(lit.value.to_string())),
        Expression::NumericLiteral(lit) => number(lit),
        Expression::BooleanLiteral(lit) => Ok(Value::Bool(lit.value)),
        Expression::NullLiteral(_) => Ok(Value::Absent),
        // Unknown names, `undefined` among them, are absent rather than an error
        Expression::Identifier(ident) => Ok(env.lookup(ident.name.as_str()).cloned().unwrap_or_default()),
        Expression::ArrayExpression(array) => {
            let mut items = Vec::with_capacity(array.elements.len());
            for element in &array.elements {
                match element {
                    ArrayExpressionElement::SpreadElement(_) => return Err(unsupported("spread")),
                    ArrayExpressionElement::Elision(_) => items.push(Value::Absent),
                    element => match element.as_expression() {
                        Some(item) => items.push(evaluate(item, env)?),
                        None => return Err(unsupported("array element")),
                    },
                }
            }
            Ok(Value::Seq(items))
        }
        Expression::ObjectExpression(object) => {
            let mut entries = Vec::with_capacity(object.properties.len());
            for property in &object.properties {
                let ObjectPropertyKind::ObjectProperty(property) = property else {
                    return Err(unsupported("spread"));
                };
                let key = match (property.computed, property.key.static_name()) {
                    (false, Some(key)) => key.to_string(),
                    _ => return Err(unsupported("computed key")),
                };
                entries.push((key, evaluate(&property.value, env)?));
            }
            Ok(Value::Map(entries))
        }
        Expression::UnaryExpression(unary) => match unary.operator {
            UnaryOperator::LogicalNot => Ok(Value::Bool(!evaluate(&unary.argument, env)?.is_truthy())),
            op => Err(EvalError::Unsupported(format!("operator '{}'", op.as_str()))),
        },
        Expression::BinaryExpression(binary) => {
            let left = evaluate(&binary.left, env)?;
            let right = evaluate(&binary.right, env)?;
            evaluate_binary(binary.operator, left, right)
        }
        Expression::LogicalExpression(logical) => {
            let left = evaluate(&logical.left, env)?;
            // The right side only runs when the left does not decide
            let decided = match logical.operator {
                LogicalOperator::Or => left.is_truthy(),
                LogicalOperator::And => !left.is_truthy(),
                LogicalOperator::Coalesce => !left.is_absent(),
            };
            if decided { Ok(left) } else { evaluate(&logical.right, env) }
        }
        Expression::ConditionalExpression(cond) => {
            if evaluate(&cond.test, env)?.is_truthy() {
                evaluate(&cond.consequent, env)
            } else {
                evaluate(&cond.alternate, env)
            }
        }
        Expression::StaticMemberExpression(member_expr) => {
            let object = evaluate(&member_expr.object, env)?;
            Ok(member(&object, member_expr.property.name.as_str()))
        }
        Expression::ComputedMemberExpression(member_expr) => {
            let object = evaluate(&member_expr.object, env)?;
            let index = evaluate(&member_expr.expression, env)?;
            Ok(match (&object, &index) {
                (Value::Seq(items), Value::Int(i)) => {
                    usize::try_from(*i).ok().and_then(|i| items.get(i)).cloned().unwrap_or_default()
                }
                (_, Value::Str(key)) => member(&object, key),
                _ => Value::Absent,
            })
        }
        Expression::ParenthesizedExpression(inner) => evaluate(&inner.expression, env),
        Expression::CallExpression(_) | Expression::NewExpression(_) => Err(unsupported("function call")),
        Expression::ArrowFunctionExpression(_) => Err(unsupported("arrow function")),
        Expression::FunctionExpression(_) => Err(unsupported("function")),
        Expression::AssignmentExpression(assign) => {
            Err(EvalError::Unsupported(format!("operator '{}'", assign.operator.as_str())))
        }
        Expression::UpdateExpression(update) => {
            Err(EvalError::Unsupported(format!("operator '{}'", update.operator.as_str())))
        }
        Expression::TemplateLiteral(_) => Err(unsupported("template literal")),
        _ => Err(unsupported("expression")),
    }
}

fn unsupported(what: &str) -> EvalError {
    EvalError::Unsupported(what.to_string())
}

/// Only integers render on the server
fn number(lit: &NumericLiteral<'_>) -> Result<Value, EvalError> {
    let value = lit.value;
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return Ok(Value::Int(value as i64));
    }
    let raw = lit.raw.map(|raw| raw.to_string()).unwrap_or_else(|| value.to_string());
    Err(EvalError::InvalidNumber(raw))
}

fn member(object: &Value, property: &str) -> Value {
    match (object, property) {
        (Value::Seq(items), "length") => Value::Int(items.len() as i64),
        (Value::Str(s), "length") => Value::Int(s.chars().count() as i64),
        (object, key) => object.get(key).cloned().unwrap_or_default(),
    }
}

fn evaluate_binary(op: BinaryOperator, left: Value, right: Value) -> Result<Value, EvalError> {
    match op {
        BinaryOperator::Addition => match (&left, &right) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            _ => Err(EvalError::Mismatch {
                op: op.as_str().to_string(),
                left: left.kind().to_string(),
                right: right.kind().to_string(),
            }),
        },
        BinaryOperator::Equality => Ok(Value::Bool(left.loose_eq(&right))),
        BinaryOperator::Inequality => Ok(Value::Bool(!left.loose_eq(&right))),
        BinaryOperator::StrictEquality => Ok(Value::Bool(left.strict_eq(&right))),
        BinaryOperator::StrictInequality => Ok(Value::Bool(!left.strict_eq(&right))),
        other => Err(EvalError::Unsupported(format!("operator '{}'", other.as_str()))),
    }
}
