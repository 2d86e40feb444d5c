//! FastAPI + pytest collector: extraction rules over the typed syntax tree.

use crate::bundle::{ArtifactBundle, EndpointModel, EndpointRef, SchemaRef, TestCaseRef};
use crate::plugin::{ProbeData, ProbeResult, StackCollector};
use crate::scanner::{read_source, FileScanner, SourceFile};
use crate::signals::{scan_fastapi_signals, FastApiSignals};
use crate::syntax::{walk_local, CmpOp, ClassDef, Expr, FunctionDef, Module, PythonParser, Stmt};
use crate::types::{Confidence, PreflightResult, StackId, TransitionSpec};
use std::collections::HashSet;
use std::path::Path;

pub const WRITE_METHODS: &[&str] = &["post", "put", "patch", "delete"];
pub const ROUTE_METHODS: &[&str] = &["get", "post", "put", "patch", "delete"];

const ROUTER_SUFFIX: &str = "router";
const SCHEMA_BASE: &str = "BaseModel";
const RESPONSE_MODEL_KWARG: &str = "response_model";
const STATUS_NAME: &str = "status";
const TRANSITION_MARKER: &str = "transition";
const TEST_FUNCTION_PREFIX: &str = "test_";
const TEST_DIRS: &[&str] = &["tests", "test"];
const NON_TEST_MODULES: &[&str] = &["conftest.py", "__init__.py"];

/// Route method (lower-cased) when `decorator` registers a route on a router-like object.
///
/// `@router.post(...)`, `@self.router.post(...)` and `@api.orders_router.put(...)` all
/// resolve; `@app.post(...)` does not.
pub fn route_method(decorator: &Expr) -> Option<String> {
    let callee = match decorator {
        Expr::Call { func, .. } => func.as_ref(),
        other => other,
    };
    let Expr::Attribute { value, attr } = callee else {
        return None;
    };
    let method = attr.to_ascii_lowercase();
    (ROUTE_METHODS.contains(&method.as_str()) && has_router_anchor(value)).then_some(method)
}

fn has_router_anchor(expr: &Expr) -> bool {
    match expr {
        Expr::Name(id) => id.to_ascii_lowercase().ends_with(ROUTER_SUFFIX),
        Expr::Attribute { value, attr } => {
            attr.to_ascii_lowercase().ends_with(ROUTER_SUFFIX) || has_router_anchor(value)
        }
        _ => false,
    }
}

/// Write method of the first write-route decorator on `func`
fn write_method(func: &FunctionDef) -> Option<String> {
    func.decorators
        .iter()
        .filter_map(route_method)
        .find(|method| WRITE_METHODS.contains(&method.as_str()))
}

pub(crate) fn extract_write_endpoints(module: &Module) -> Vec<(String, String)> {
    module
        .functions()
        .into_iter()
        .filter_map(|func| write_method(func).map(|method| (func.name.clone(), method)))
        .collect()
}

fn is_schema_class(class: &ClassDef) -> bool {
    class.bases.iter().any(|base| match base {
        Expr::Name(id) => id == SCHEMA_BASE,
        Expr::Attribute { attr, .. } => attr == SCHEMA_BASE,
        _ => false,
    })
}

pub(crate) fn extract_schema_models(module: &Module) -> Vec<String> {
    module
        .classes()
        .into_iter()
        .filter(|class| is_schema_class(class))
        .map(|class| class.name.clone())
        .collect()
}

/// Candidate names of an annotation, innermost first.
///
/// `Optional[List[OrderOut]]` yields `OrderOut, List, Optional`.
fn annotation_names(expr: &Expr) -> Vec<&str> {
    match expr {
        Expr::Name(id) => vec![id.as_str()],
        Expr::Attribute { attr, .. } => vec![attr.as_str()],
        // forward references: `payload: "OrderCreate"`
        Expr::Str(value) => vec![value.as_str()],
        Expr::Subscript { value, index } => {
            let mut names: Vec<&str> = index.iter().flat_map(annotation_names).collect();
            names.extend(annotation_names(value));
            names
        }
        Expr::Sequence(items) => items.iter().flat_map(annotation_names).collect(),
        _ => Vec::new(),
    }
}

fn bound_model<'a>(annotation: &'a Expr, known_models: &HashSet<String>) -> Option<&'a str> {
    annotation_names(annotation)
        .into_iter()
        .find(|name| known_models.contains(*name))
}

fn response_model(decorator: &Expr) -> Option<&Expr> {
    let Expr::Call { keywords, .. } = decorator else {
        return None;
    };
    keywords
        .iter()
        .find(|kw| kw.arg.as_deref() == Some(RESPONSE_MODEL_KWARG))
        .map(|kw| &kw.value)
}

/// `(endpoint, model)` bindings for write endpoints: parameter annotations first,
/// then `response_model=` keywords. Duplicates within one endpoint collapse.
pub(crate) fn extract_endpoint_models(
    module: &Module,
    known_models: &HashSet<String>,
) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for func in module.functions() {
        if write_method(func).is_none() {
            continue;
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let from_params = func
            .params
            .iter()
            .filter_map(|param| param.annotation.as_ref())
            .filter_map(|ann| bound_model(ann, known_models));
        let from_response = func
            .decorators
            .iter()
            .filter(|d| route_method(d).is_some())
            .filter_map(response_model)
            .filter_map(|model| bound_model(model, known_models));

        for model in from_params.chain(from_response) {
            if seen.insert(model) {
                out.push((func.name.clone(), model.to_string()));
            }
        }
    }
    out
}

/// Module-level `*transition*` mappings: `{"src": "dst"}` or `{"src": ["dst", ...]}`
pub(crate) fn extract_declared_transitions(module: &Module) -> Vec<(String, String, String)> {
    let mut out = Vec::new();
    for stmt in &module.body {
        let Stmt::Assign { targets, value } = stmt else {
            continue;
        };
        let Some(Expr::Name(machine)) = targets.first() else {
            continue;
        };
        if !machine.to_ascii_lowercase().contains(TRANSITION_MARKER) {
            continue;
        }
        let Expr::Dict(pairs) = value else {
            continue;
        };

        for (key, targets) in pairs {
            let Some(source) = key.as_str() else {
                continue;
            };
            let destinations: Vec<&str> = match targets {
                Expr::Str(single) => vec![single.as_str()],
                Expr::Sequence(items) => items.iter().filter_map(Expr::as_str).collect(),
                _ => Vec::new(),
            };
            for target in destinations {
                out.push((machine.clone(), source.to_string(), target.to_string()));
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusSubject {
    /// bare `status` variable
    Variable,
    /// any `<expr>.status` attribute
    Attribute,
}

impl StatusSubject {
    fn of(expr: &Expr) -> Option<Self> {
        match expr {
            Expr::Name(id) if id == STATUS_NAME => Some(Self::Variable),
            Expr::Attribute { attr, .. } if attr == STATUS_NAME => Some(Self::Attribute),
            _ => None,
        }
    }
}

/// `status == "x"` / `obj.status == "x"` (either operand order)
fn status_test(test: &Expr) -> Option<(StatusSubject, &str)> {
    let Expr::Compare {
        left,
        ops,
        comparators,
    } = test
    else {
        return None;
    };
    if !matches!(ops.as_slice(), [CmpOp::Eq]) || comparators.len() != 1 {
        return None;
    }
    let right = &comparators[0];
    if let (Some(subject), Some(state)) = (StatusSubject::of(left), right.as_str()) {
        return Some((subject, state));
    }
    if let (Some(subject), Some(state)) = (StatusSubject::of(right), left.as_str()) {
        return Some((subject, state));
    }
    None
}

/// `(function, tested state, assigned state)` triples, attributed to the
/// innermost enclosing function. Only the `if` body is searched for the
/// assignment; `elif` branches are checked against their own test.
pub(crate) fn extract_handled_transitions(module: &Module) -> Vec<(String, String, String)> {
    let mut out = Vec::new();
    for func in module.functions() {
        walk_local(&func.body, &mut |stmt| {
            let Stmt::If { test, body, .. } = stmt else {
                return;
            };
            let Some((subject, source)) = status_test(test) else {
                return;
            };
            walk_local(body, &mut |inner| {
                let Stmt::Assign { targets, value } = inner else {
                    return;
                };
                let Some(target_state) = value.as_str() else {
                    return;
                };
                if target_state == source {
                    return;
                }
                for target in targets {
                    if StatusSubject::of(target) == Some(subject) {
                        out.push((
                            func.name.clone(),
                            source.to_string(),
                            target_state.to_string(),
                        ));
                    }
                }
            });
        });
    }
    out
}

pub(crate) fn extract_test_cases(module: &Module) -> Vec<String> {
    module
        .functions()
        .into_iter()
        .filter(|func| func.name.starts_with(TEST_FUNCTION_PREFIX))
        .map(|func| func.name.clone())
        .collect()
}

/// `test_*.py`, `*_test.py`, or any module under a `tests/`/`test/` directory
/// other than `conftest.py` and `__init__.py`
pub fn is_test_file(file: &SourceFile) -> bool {
    if !file.is_python() {
        return false;
    }
    let name = file.file_name();
    if name.starts_with("test_") || name.ends_with("_test.py") {
        return true;
    }
    if NON_TEST_MODULES.contains(&name) {
        return false;
    }
    let mut dirs: Vec<&str> = file.relative.split('/').collect();
    dirs.pop();
    dirs.iter().any(|dir| TEST_DIRS.contains(dir))
}

fn preflight_from_signals(signals: &FastApiSignals) -> PreflightResult {
    if !signals.has_fastapi_import && !signals.has_router {
        return PreflightResult::fail("FastAPI patterns were not found (imports/routes missing).");
    }
    if !signals.has_pytest {
        return PreflightResult::warn(
            "pytest patterns were not found; test coverage recommendations may be noisy.",
        );
    }
    PreflightResult::pass()
}

/// Collector plugin for FastAPI services tested with pytest
#[derive(Debug, Clone, Default)]
pub struct FastApiCollector;

impl StackCollector for FastApiCollector {
    fn stack_id(&self) -> StackId {
        StackId::FastapiPytest
    }

    fn probe(&self, repo_root: &Path) -> Option<ProbeResult> {
        let signals = scan_fastapi_signals(repo_root);
        if !signals.has_fastapi_import && !signals.has_router {
            return None;
        }

        let confidence = if signals.has_fastapi_import && signals.has_router {
            Confidence::High
        } else {
            Confidence::Medium
        };
        let mut reasons = signals.reasons();
        if !signals.has_pytest {
            reasons.push("pytest patterns were not detected.".to_string());
        }

        Some(ProbeResult {
            stack_id: self.stack_id(),
            confidence,
            reasons,
            probe_data: ProbeData::FastApi(signals),
        })
    }

    fn preflight(&self, repo_root: &Path, probe_data: Option<&ProbeData>) -> PreflightResult {
        match probe_data {
            Some(ProbeData::FastApi(signals)) => preflight_from_signals(signals),
            None => preflight_from_signals(&scan_fastapi_signals(repo_root)),
        }
    }

    fn collect(&self, repo_root: &Path) -> ArtifactBundle {
        let files = FileScanner::new(repo_root).scan();
        let mut bundle = ArtifactBundle {
            all_files: files.iter().map(|f| f.relative.clone()).collect(),
            ..Default::default()
        };
        let python: Vec<&SourceFile> = files.iter().filter(|f| f.is_python()).collect();
        bundle.python_files = python.iter().map(|f| f.relative.clone()).collect();
        bundle.test_files = python
            .iter()
            .filter(|f| is_test_file(f))
            .map(|f| f.relative.clone())
            .collect();

        let mut parser = match PythonParser::new() {
            Ok(parser) => parser,
            Err(e) => {
                log::warn!("Python parser unavailable, collected file lists only: {e}");
                return bundle;
            }
        };

        let mut parsed: Vec<(&SourceFile, Module)> = Vec::new();
        for file in &python {
            let source = match read_source(&file.path) {
                Ok(source) => source,
                Err(e) => {
                    log::debug!("Skipping unreadable {}: {e}", file.relative);
                    continue;
                }
            };
            match parser.parse(&source) {
                Some(module) => parsed.push((file, module)),
                None => log::debug!("Skipping unparseable {}", file.relative),
            }
        }

        for (file, module) in &parsed {
            for name in extract_schema_models(module) {
                bundle.schema_models.push(SchemaRef {
                    file: file.relative.clone(),
                    name,
                });
            }
        }
        let known_models: HashSet<String> =
            bundle.schema_models.iter().map(|m| m.name.clone()).collect();

        for (file, module) in &parsed {
            let rel = &file.relative;
            for (name, method) in extract_write_endpoints(module) {
                bundle.write_endpoints.push(EndpointRef {
                    file: rel.clone(),
                    name,
                    method,
                });
            }
            for (endpoint, model) in extract_endpoint_models(module, &known_models) {
                bundle.endpoint_models.push(EndpointModel {
                    file: rel.clone(),
                    endpoint,
                    model,
                });
            }
            for (machine, source, target) in extract_declared_transitions(module) {
                bundle
                    .declared_transitions
                    .push(TransitionSpec::new(machine, source, target, rel.clone()));
            }
            for (machine, source, target) in extract_handled_transitions(module) {
                bundle
                    .handled_transitions
                    .push(TransitionSpec::new(machine, source, target, rel.clone()));
            }
            if is_test_file(file) {
                for name in extract_test_cases(module) {
                    bundle.test_cases.push(TestCaseRef {
                        file: rel.clone(),
                        name,
                    });
                }
            }
        }

        log::info!(
            "Collected {} write endpoints, {} schemas, {} declared / {} handled transitions, {} test cases",
            bundle.write_endpoints.len(),
            bundle.schema_models.len(),
            bundle.declared_transitions.len(),
            bundle.handled_transitions.len(),
            bundle.test_cases.len()
        );
        bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn parse(code: &str) -> Module {
        PythonParser::new().unwrap().parse(code).expect("parses")
    }

    fn triples(items: &[(&str, &str, &str)]) -> Vec<(String, String, String)> {
        items
            .iter()
            .map(|(a, b, c)| (a.to_string(), b.to_string(), c.to_string()))
            .collect()
    }

    #[test]
    fn write_endpoints_resolve_direct_and_chained_routers() {
        let module = parse(
            r#"
@router.post("/orders")
def create_order():
    pass

@self.router.delete("/orders/{id}")
def delete_order():
    pass

@api.orders_router.put("/orders/{id}")
async def replace_order():
    pass

@router.get("/orders")
def list_orders():
    pass

@app.post("/items")
def create_item():
    pass
"#,
        );
        let names: Vec<String> = extract_write_endpoints(&module)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["create_order", "delete_order", "replace_order"]);
    }

    #[test]
    fn schema_classes_match_direct_and_qualified_base() {
        let module = parse(
            "class A(BaseModel):\n    x: int\n\nclass B(pydantic.BaseModel):\n    pass\n\nclass C(Base):\n    pass\n",
        );
        assert_eq!(extract_schema_models(&module), vec!["A", "B"]);
    }

    #[test]
    fn endpoint_models_unwrap_generic_annotations() {
        let module = parse(
            r#"
@router.post("/orders", response_model=List[OrderOut])
def create_order(payload: Optional[OrderCreate], db: Session):
    pass

@router.get("/orders", response_model=OrderOut)
def list_orders():
    pass
"#,
        );
        let known: HashSet<String> = ["OrderOut", "OrderCreate"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let bindings = extract_endpoint_models(&module, &known);
        assert_eq!(
            bindings,
            vec![
                ("create_order".to_string(), "OrderCreate".to_string()),
                ("create_order".to_string(), "OrderOut".to_string()),
            ]
        );
    }

    #[test]
    fn declared_transitions_only_at_module_level() {
        let module = parse(
            r#"
ORDER_TRANSITIONS = {"pending": ["paid", "cancelled"], "paid": "shipped"}
OTHER = {"a": "b"}

def helper():
    local_transitions = {"x": "y"}
"#,
        );
        assert_eq!(
            extract_declared_transitions(&module),
            triples(&[
                ("ORDER_TRANSITIONS", "pending", "paid"),
                ("ORDER_TRANSITIONS", "pending", "cancelled"),
                ("ORDER_TRANSITIONS", "paid", "shipped"),
            ])
        );
    }

    #[test]
    fn handled_transitions_pair_test_with_assignment() {
        let module = parse(
            r#"
def pay(order):
    if order.status == "pending":
        log("paying")
        if ready:
            order.status = "paid"
    elif order.status == "paid":
        order.status = "shipped"

def cancel():
    status = "pending"
    if "pending" == status:
        status = "cancelled"
    if status == "cancelled":
        status = "cancelled"
"#,
        );
        assert_eq!(
            extract_handled_transitions(&module),
            triples(&[
                ("pay", "pending", "paid"),
                ("pay", "paid", "shipped"),
                ("cancel", "pending", "cancelled"),
            ])
        );
    }

    #[test]
    fn else_branch_assignments_are_not_handled_transitions() {
        let module = parse(
            r#"
def settle(order):
    if order.status == "pending":
        notify(order)
    else:
        order.status = "failed"
"#,
        );
        assert!(extract_handled_transitions(&module).is_empty());
    }

    #[test]
    fn test_file_conventions() {
        let file = |rel: &str| SourceFile {
            path: PathBuf::from(rel),
            relative: rel.to_string(),
        };
        assert!(is_test_file(&file("tests/test_api.py")));
        assert!(is_test_file(&file("app/orders_test.py")));
        assert!(is_test_file(&file("test_root.py")));
        assert!(is_test_file(&file("tests/helpers.py")));
        assert!(!is_test_file(&file("tests/conftest.py")));
        assert!(!is_test_file(&file("app/api.py")));
        assert!(!is_test_file(&file("tests/data.json")));
    }

    #[test]
    fn test_cases_require_prefix() {
        let module = parse(
            "def test_create_order():\n    pass\n\ndef helper():\n    pass\n\nclass TestOrders:\n    def test_pay(self):\n        pass\n",
        );
        assert_eq!(extract_test_cases(&module), vec!["test_create_order", "test_pay"]);
    }
}
