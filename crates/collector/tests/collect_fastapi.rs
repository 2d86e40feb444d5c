use pretty_assertions::assert_eq;
use riskmap_collector::{
    detect_stack, registry, Confidence, PreflightStatus, StackCollector, StackId, TransitionSpec,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
    fs::write(path, text).expect("write file");
}

fn orders_service(root: &Path) {
    write(
        root,
        "app/schemas.py",
        r#"
from pydantic import BaseModel

class OrderCreate(BaseModel):
    sku: str

class OrderOut(BaseModel):
    id: int
"#,
    );
    write(
        root,
        "app/api.py",
        r#"
from fastapi import APIRouter
from app.schemas import OrderCreate, OrderOut

router = APIRouter()

ORDER_TRANSITIONS = {"pending": ["paid", "cancelled"], "paid": ["shipped"]}

@router.post("/orders", response_model=OrderOut)
def create_order(payload: OrderCreate):
    return OrderOut(id=1)

@router.patch("/orders/{order_id}/pay")
def pay_order(order_id: int):
    order = load(order_id)
    if order.status == "pending":
        order.status = "paid"
    return order

@router.get("/orders")
def list_orders():
    return []
"#,
    );
    write(
        root,
        "tests/test_orders.py",
        r#"
import pytest

def test_create_order():
    assert True

def helper():
    pass
"#,
    );
    write(root, ".venv/lib/fastapi/routing.py", "from fastapi import APIRouter\n");
}

#[test]
fn detects_and_collects_fastapi_service() {
    let temp = TempDir::new().expect("tempdir");
    orders_service(temp.path());

    let detection = detect_stack(temp.path());
    assert_eq!(detection.stack_id, StackId::FastapiPytest);
    assert_eq!(detection.confidence, Confidence::High);

    let plugin = registry()
        .plugin_for_stack(detection.stack_id)
        .expect("plugin registered");
    let preflight = plugin.preflight(temp.path(), detection.probe_data.as_ref());
    assert_eq!(preflight.status, PreflightStatus::Pass);

    let bundle = plugin.collect(temp.path());
    assert_eq!(
        bundle.python_files,
        vec!["app/api.py", "app/schemas.py", "tests/test_orders.py"]
    );
    let endpoints: Vec<(&str, &str)> = bundle
        .write_endpoints
        .iter()
        .map(|e| (e.name.as_str(), e.method.as_str()))
        .collect();
    assert_eq!(endpoints, vec![("create_order", "post"), ("pay_order", "patch")]);

    let bindings: Vec<(&str, &str)> = bundle
        .endpoint_models
        .iter()
        .map(|b| (b.endpoint.as_str(), b.model.as_str()))
        .collect();
    assert_eq!(
        bindings,
        vec![("create_order", "OrderCreate"), ("create_order", "OrderOut")]
    );

    assert_eq!(bundle.declared_transitions.len(), 3);
    assert_eq!(
        bundle.handled_transitions,
        vec![TransitionSpec::new("pay_order", "pending", "paid", "app/api.py")]
    );
    assert_eq!(bundle.test_files, vec!["tests/test_orders.py"]);
    let tests: Vec<&str> = bundle.test_cases.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tests, vec!["test_create_order"]);
}

#[test]
fn bundle_never_contains_absolute_paths() {
    let temp = TempDir::new().expect("tempdir");
    orders_service(temp.path());

    let bundle = registry().plugins()[0].collect(temp.path());
    let json = serde_json::to_string(&bundle).expect("serialize");
    let root = temp.path().to_string_lossy().to_string();
    assert!(!json.contains(&root), "absolute path leaked: {json}");
    assert!(bundle.all_files.iter().all(|f| !f.starts_with('/')));
}

#[test]
fn missing_pytest_downgrades_preflight_to_warn() {
    let temp = TempDir::new().expect("tempdir");
    write(
        temp.path(),
        "main.py",
        "from fastapi import APIRouter\nrouter = APIRouter()\n",
    );

    let detection = detect_stack(temp.path());
    assert_eq!(detection.stack_id, StackId::FastapiPytest);
    assert_eq!(detection.confidence, Confidence::Medium);
    assert!(detection
        .reasons
        .contains(&"pytest patterns were not detected.".to_string()));

    let plugin = registry()
        .plugin_for_stack(StackId::FastapiPytest)
        .expect("plugin registered");
    let preflight = plugin.preflight(temp.path(), None);
    assert_eq!(preflight.status, PreflightStatus::Warn);
}

#[test]
fn non_fastapi_repository_fails_preflight() {
    let temp = TempDir::new().expect("tempdir");
    write(temp.path(), "app.py", "import flask\n");

    assert_eq!(detect_stack(temp.path()).stack_id, StackId::Unknown);
    let plugin = registry()
        .plugin_for_stack(StackId::FastapiPytest)
        .expect("plugin registered");
    let preflight = plugin.preflight(temp.path(), None);
    assert!(preflight.is_fail());
    assert_eq!(
        preflight.reasons,
        vec!["FastAPI patterns were not found (imports/routes missing)."]
    );
}

#[test]
fn malformed_python_is_skipped_during_collection() {
    let temp = TempDir::new().expect("tempdir");
    orders_service(temp.path());
    write(temp.path(), "app/broken.py", "def nope(:\n    pass\n");

    let bundle = registry().plugins()[0].collect(temp.path());
    assert!(bundle.python_files.contains(&"app/broken.py".to_string()));
    assert_eq!(bundle.write_endpoints.len(), 2);
}
