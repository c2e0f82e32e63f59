//! C6 — Phase-2 Selector Resolver (spec §4.6).

use discovery_core::invocation::{
    ExpressionOperator, FieldExpression, LabelMatchExpression, LabelSelectorOperator, LabelSelectorSpec,
    ResourceRequest, SortDirection, SortKey,
};
use discovery_core::{ClusterReader, DiscoveryError, Gvk, Gvr, ListQuery, Resource};
use regex::Regex;
use std::sync::Arc;

pub struct SelectorResolver {
    cluster: Arc<dyn ClusterReader>,
}

#[derive(Debug, Default)]
pub struct SelectorOutcome {
    pub resources: Vec<Resource>,
    pub constraint_violation: Option<String>,
}

impl SelectorResolver {
    pub fn new(cluster: Arc<dyn ClusterReader>) -> Self {
        Self { cluster }
    }

    pub async fn resolve(
        &self,
        req: &ResourceRequest,
        function_namespace: &str,
        allowed_namespaces_fallback: &[String],
    ) -> Result<SelectorOutcome, DiscoveryError> {
        let api_version = req
            .api_version
            .as_deref()
            .ok_or_else(|| DiscoveryError::InvalidExpression("selector fetch requires apiVersion".into()))?;
        let kind = req
            .kind
            .as_deref()
            .ok_or_else(|| DiscoveryError::InvalidExpression("selector fetch requires kind".into()))?;

        let label_selector = compile_label_selector(&req.selector)?;
        let namespaces = target_namespaces(req, function_namespace, allowed_namespaces_fallback);

        let gvk = Gvk::from_api_version_kind(api_version, kind);
        let gvr = Gvr::new(gvk.group.clone(), gvk.version.clone(), crate::kinds::naive_plural(kind));

        let mut collected = Vec::new();
        for ns in &namespaces {
            let query = ListQuery {
                label_selector: label_selector.clone(),
                limit: req.constraints.stop_on_first.then_some(1),
            };
            let items = self
                .cluster
                .list(&gvr, kind, Some(ns.as_str()), query)
                .await
                .map_err(|e| DiscoveryError::Internal(format!("list failed in namespace {ns:?}: {e}")))?;
            collected.extend(items);
            if req.constraints.stop_on_first && !collected.is_empty() {
                break;
            }
        }
        if namespaces.is_empty() {
            let query = ListQuery {
                label_selector: label_selector.clone(),
                limit: req.constraints.stop_on_first.then_some(1),
            };
            collected = self
                .cluster
                .list(&gvr, kind, None, query)
                .await
                .map_err(|e| DiscoveryError::Internal(format!("cluster-scoped list failed: {e}")))?;
        }

        let mut filtered = Vec::new();
        for resource in collected {
            if matches_all_expressions(&resource, &req.expressions)? {
                filtered.push(resource);
            }
        }

        sort_resources(&mut filtered, &req.sort);

        let mut violation = None;
        if let Some(max) = req.constraints.max_matches {
            filtered.truncate(max);
        }
        if let Some(min) = req.constraints.min_matches {
            if filtered.len() < min {
                if req.constraints.fail_on_constraint_violation {
                    return Err(DiscoveryError::ConstraintViolation { found: filtered.len(), required: min });
                }
                violation = Some(format!("minMatches={min} not satisfied, got {}", filtered.len()));
            }
        }

        Ok(SelectorOutcome { resources: filtered, constraint_violation: violation })
    }
}

fn target_namespaces(req: &ResourceRequest, function_namespace: &str, allowed_fallback: &[String]) -> Vec<String> {
    let sel = &req.namespace_selection;
    if !sel.namespaces.is_empty() {
        return sel.namespaces.clone();
    }
    if sel.cross_namespace {
        if !sel.allowed_namespaces.is_empty() {
            return sel.allowed_namespaces.clone();
        }
        return allowed_fallback.to_vec();
    }
    vec![function_namespace.to_string()]
}

fn compile_label_selector(spec: &LabelSelectorSpec) -> Result<Option<String>, DiscoveryError> {
    if spec.match_labels.is_empty() && spec.match_expressions.is_empty() {
        return Ok(None);
    }
    let mut parts = Vec::new();
    for (key, value) in &spec.match_labels {
        parts.push(format!("{key}={value}"));
    }
    for expr in &spec.match_expressions {
        parts.push(compile_match_expression(expr)?);
    }
    Ok(Some(parts.join(",")))
}

fn compile_match_expression(expr: &LabelMatchExpression) -> Result<String, DiscoveryError> {
    match expr.operator {
        LabelSelectorOperator::In => {
            require_values(expr)?;
            Ok(format!("{} in ({})", expr.key, expr.values.join(",")))
        }
        LabelSelectorOperator::NotIn => {
            require_values(expr)?;
            Ok(format!("{} notin ({})", expr.key, expr.values.join(",")))
        }
        LabelSelectorOperator::Exists => Ok(expr.key.clone()),
        LabelSelectorOperator::DoesNotExist => Ok(format!("!{}", expr.key)),
    }
}

fn require_values(expr: &LabelMatchExpression) -> Result<(), DiscoveryError> {
    if expr.values.is_empty() {
        return Err(DiscoveryError::InvalidSelector(format!(
            "operator {:?} on key {:?} requires a non-empty value list",
            expr.operator, expr.key
        )));
    }
    Ok(())
}

fn matches_all_expressions(resource: &Resource, expressions: &[FieldExpression]) -> Result<bool, DiscoveryError> {
    let full = resource.full_value();
    for expr in expressions {
        if !matches_expression(&full, expr)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_expression(obj: &serde_json::Value, expr: &FieldExpression) -> Result<bool, DiscoveryError> {
    let extracted = discovery_labels::extract(obj, &expr.path);

    match expr.operator {
        ExpressionOperator::Exists => Ok(extracted.is_ok()),
        ExpressionOperator::NotExists => Ok(extracted.is_err()),
        _ => {
            let value = match extracted {
                Ok(v) => v,
                Err(_) => return Ok(false),
            };
            match expr.operator {
                ExpressionOperator::Equals => Ok(expr.values.first().map(|v| v == &value).unwrap_or(false)),
                ExpressionOperator::NotEquals => Ok(expr.values.first().map(|v| v != &value).unwrap_or(true)),
                ExpressionOperator::In => Ok(expr.values.iter().any(|v| v == &value)),
                ExpressionOperator::NotIn => Ok(!expr.values.iter().any(|v| v == &value)),
                ExpressionOperator::Contains => Ok(expr.values.first().map(|v| value.contains(v.as_str())).unwrap_or(false)),
                ExpressionOperator::StartsWith => {
                    Ok(expr.values.first().map(|v| value.starts_with(v.as_str())).unwrap_or(false))
                }
                ExpressionOperator::EndsWith => Ok(expr.values.first().map(|v| value.ends_with(v.as_str())).unwrap_or(false)),
                ExpressionOperator::Regex => {
                    let pattern = expr
                        .values
                        .first()
                        .ok_or_else(|| DiscoveryError::InvalidExpression("regex operator requires a pattern".into()))?;
                    let re = Regex::new(pattern)
                        .map_err(|e| DiscoveryError::InvalidExpression(format!("invalid regex {pattern:?}: {e}")))?;
                    Ok(re.is_match(&value))
                }
                ExpressionOperator::Exists | ExpressionOperator::NotExists => unreachable!(),
            }
        }
    }
}

/// Lexical comparison on one or more paths; later keys only break ties left
/// by earlier ones (spec §4.6).
fn sort_resources(resources: &mut [Resource], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    resources.sort_by(|a, b| {
        for key in keys {
            let a_val = discovery_labels::extract(&a.full_value(), &key.path).unwrap_or_default();
            let b_val = discovery_labels::extract(&b.full_value(), &key.path).unwrap_or_default();
            let ordering = a_val.cmp(&b_val);
            let ordering = match key.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_match_labels_and_expressions() {
        let spec = LabelSelectorSpec {
            match_labels: std::collections::HashMap::from([("app".to_string(), "demo".to_string())]),
            match_expressions: vec![LabelMatchExpression {
                key: "tier".into(),
                operator: LabelSelectorOperator::In,
                values: vec!["web".into(), "api".into()],
            }],
        };
        let compiled = compile_label_selector(&spec).unwrap().unwrap();
        assert!(compiled.contains("app=demo"));
        assert!(compiled.contains("tier in (web,api)"));
    }

    #[test]
    fn in_operator_without_values_is_rejected() {
        let expr = LabelMatchExpression { key: "tier".into(), operator: LabelSelectorOperator::In, values: vec![] };
        assert!(compile_match_expression(&expr).is_err());
    }
}
