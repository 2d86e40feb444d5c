use super::runtime::{call_llm_json, DEFAULT_MAX_RETRIES};
use super::LlmBackend;
use crate::error::EnrichError;
use crate::plan::{deterministic_plan, TestPlan, TestRecommendation};
use riskmap_collector::Confidence;
use riskmap_graph::Graph;
use riskmap_rules::{Finding, FindingsReport};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Agent output plus notes about how it was produced
#[derive(Debug, Clone, PartialEq)]
pub struct Enriched<T> {
    pub value: T,
    pub notes: Vec<String>,
}

impl<T> Enriched<T> {
    fn plain(value: T) -> Self {
        Self {
            value,
            notes: Vec::new(),
        }
    }
}

fn risk_prompt(raw: &FindingsReport, graph: &Graph) -> Result<String, EnrichError> {
    let findings = serde_json::to_string_pretty(&raw.findings)
        .map_err(|e| EnrichError::InvalidResponse(e.to_string()))?;
    Ok(format!(
        "You review release risks of a web service.\n\
         The risk graph has {} nodes and {} edges.\n\
         Deterministic findings:\n{findings}\n\n\
         Refine titles, descriptions and recommendations. Keep ids, rule_id, \
         source_ref and suppression_key unchanged. Respond with a JSON object \
         {{\"findings\": [...]}} using the same fields.",
        graph.nodes.len(),
        graph.edges.len(),
    ))
}

fn qa_prompt(findings: &FindingsReport) -> Result<String, EnrichError> {
    let findings = serde_json::to_string_pretty(&findings.findings)
        .map_err(|e| EnrichError::InvalidResponse(e.to_string()))?;
    Ok(format!(
        "Plan tests that cover these release risks:\n{findings}\n\n\
         Respond with a JSON object {{\"items\": [...]}} where each item has \
         id, title, priority, finding_id, source_ref and recommendation."
    ))
}

fn payload_list<T: DeserializeOwned>(mut payload: Map<String, Value>, key: &str) -> Result<Vec<T>, EnrichError> {
    let list = payload
        .remove(key)
        .ok_or_else(|| EnrichError::InvalidResponse(format!("missing '{key}' list")))?;
    serde_json::from_value(list).map_err(|e| EnrichError::InvalidResponse(format!("{key}: {e}")))
}

/// Repository-relative: no root, drive prefix or parent component
pub(crate) fn is_repo_relative(path: &str) -> bool {
    let path = path.replace('\\', "/");
    let drive = path.as_bytes().get(1) == Some(&b':');
    !path.is_empty()
        && !path.starts_with('/')
        && !drive
        && !path.split('/').any(|part| part == "..")
}

fn finding_id(f: &Finding) -> &str {
    &f.id
}

fn rule_id(f: &Finding) -> &str {
    &f.rule_id
}

fn suppression_key(f: &Finding) -> &str {
    &f.suppression_key
}

fn key_set<'a>(findings: &'a [Finding], key: fn(&Finding) -> &str) -> BTreeSet<&'a str> {
    findings.iter().map(key).collect()
}

/// An answer must describe the same findings as the rules did
fn validate_findings(raw: &FindingsReport, answer: &[Finding]) -> Result<(), EnrichError> {
    let keys: [(&str, fn(&Finding) -> &str); 3] = [
        ("id", finding_id),
        ("rule_id", rule_id),
        ("suppression_key", suppression_key),
    ];
    for (name, key) in keys {
        if key_set(&raw.findings, key) != key_set(answer, key) {
            return Err(EnrichError::InvalidResponse(format!(
                "findings changed the set of {name} values"
            )));
        }
    }
    if let Some(f) = answer.iter().find(|f| !is_repo_relative(&f.source_ref)) {
        return Err(EnrichError::InvalidResponse(format!(
            "finding {} has a non-relative source_ref",
            f.id
        )));
    }
    Ok(())
}

fn validate_plan(findings: &FindingsReport, items: &[TestRecommendation]) -> Result<(), EnrichError> {
    let known = key_set(&findings.findings, finding_id);
    for item in items {
        if !known.contains(item.finding_id.as_str()) {
            return Err(EnrichError::InvalidResponse(format!(
                "test plan item {} refers to unknown finding {}",
                item.id, item.finding_id
            )));
        }
        if !is_repo_relative(&item.source_ref) {
            return Err(EnrichError::InvalidResponse(format!(
                "test plan item {} has a non-relative source_ref",
                item.id
            )));
        }
    }
    Ok(())
}

async fn llm_findings(
    backend: &dyn LlmBackend,
    raw: &FindingsReport,
    graph: &Graph,
) -> Result<Vec<Finding>, EnrichError> {
    let prompt = risk_prompt(raw, graph)?;
    let payload = call_llm_json(backend, &prompt, DEFAULT_MAX_RETRIES).await?;
    let findings = payload_list(payload, "findings")?;
    validate_findings(raw, &findings)?;
    Ok(findings)
}

/// Final findings. A backend's validated answer replaces the rules output;
/// if the backend fails the rules output is kept with every confidence
/// lowered to `low`.
pub async fn generate_findings(
    raw: &FindingsReport,
    graph: &Graph,
    backend: Option<&dyn LlmBackend>,
) -> Enriched<FindingsReport> {
    let deterministic = |degrade: bool| {
        let findings = raw
            .findings
            .iter()
            .cloned()
            .map(|mut f| {
                f.generated_without_llm = true;
                if degrade {
                    f.confidence = Confidence::Low;
                }
                f
            })
            .collect();
        FindingsReport::new(findings, true)
    };

    let Some(backend) = backend else {
        return Enriched::plain(deterministic(false));
    };

    match llm_findings(backend, raw, graph).await {
        Ok(findings) => {
            let findings = findings
                .into_iter()
                .map(|mut f| {
                    f.generated_without_llm = false;
                    f
                })
                .collect();
            Enriched::plain(FindingsReport::new(findings, false))
        }
        Err(e) => {
            log::warn!("Risk agent enrichment failed: {e}");
            Enriched {
                value: deterministic(true),
                notes: vec![format!(
                    "Risk agent fell back to deterministic findings with low confidence: {e}"
                )],
            }
        }
    }
}

async fn llm_plan(
    backend: &dyn LlmBackend,
    findings: &FindingsReport,
) -> Result<Vec<TestRecommendation>, EnrichError> {
    let prompt = qa_prompt(findings)?;
    let payload = call_llm_json(backend, &prompt, DEFAULT_MAX_RETRIES).await?;
    let items = payload_list(payload, "items")?;
    validate_plan(findings, &items)?;
    Ok(items)
}

/// Test plan for the final findings, deterministic unless a backend answers
pub async fn generate_test_plan(
    findings: &FindingsReport,
    backend: Option<&dyn LlmBackend>,
) -> Enriched<TestPlan> {
    let Some(backend) = backend else {
        return Enriched::plain(deterministic_plan(findings));
    };
    if findings.is_empty() {
        return Enriched::plain(TestPlan::default());
    }

    match llm_plan(backend, findings).await {
        Ok(items) => Enriched::plain(TestPlan {
            items: items
                .into_iter()
                .map(|mut item| {
                    item.generated_without_llm = false;
                    item
                })
                .collect(),
            generated_without_llm: false,
        }),
        Err(e) => {
            log::warn!("QA strategy enrichment failed: {e}");
            Enriched {
                value: deterministic_plan(findings),
                notes: vec![format!(
                    "QA strategy agent fell back to the deterministic test plan: {e}"
                )],
            }
        }
    }
}
