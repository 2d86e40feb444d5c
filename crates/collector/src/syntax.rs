//! Typed Python syntax tree lowered from tree-sitter.
//!
//! Only the shapes extraction cares about get their own variant; everything
//! else lowers to `Other` (or `Compound` when it owns nested blocks) so the
//! extractors can match exhaustively.

use crate::error::{CollectorError, Result};
use tree_sitter::{Node, Parser};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Assign { targets: Vec<Expr>, value: Expr },
    If { test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt> },
    Import { modules: Vec<String> },
    ImportFrom { module: Option<String> },
    /// `for`, `while`, `with`, `try`, `match`: bodies flattened in source order
    Compound(Vec<Stmt>),
    Expr(Expr),
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub decorators: Vec<Expr>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Expr>,
    pub decorators: Vec<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Attribute { value: Box<Expr>, attr: String },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    /// Plain string constant (no f-string interpolation, no bytes)
    Str(String),
    Dict(Vec<(Expr, Expr)>),
    /// list, tuple, set, union annotation parts
    Sequence(Vec<Expr>),
    Subscript { value: Box<Expr>, index: Vec<Expr> },
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Other,
}

impl CmpOp {
    fn from_token(token: &str) -> Self {
        match token {
            "==" => CmpOp::Eq,
            "!=" | "<>" => CmpOp::NotEq,
            _ => CmpOp::Other,
        }
    }
}

impl Expr {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Str(value) => Some(value),
            _ => None,
        }
    }
}

/// Python parser producing [`Module`]s
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        parser
            .set_language(&language)
            .map_err(|e| CollectorError::tree_sitter(format!("Failed to set language: {e}")))?;
        Ok(Self { parser })
    }

    /// Parse `source`; `None` when the file does not parse cleanly
    pub fn parse(&mut self, source: &str) -> Option<Module> {
        if source.trim().is_empty() {
            return None;
        }
        let tree = self.parser.parse(source, None)?;
        let root = tree.root_node();
        if root.has_error() {
            return None;
        }
        let lowerer = Lowerer {
            src: source.as_bytes(),
        };
        Some(Module {
            body: lowerer.statements(root),
        })
    }
}

struct Lowerer<'a> {
    src: &'a [u8],
}

impl Lowerer<'_> {
    fn text(&self, node: Node) -> String {
        node.utf8_text(self.src).unwrap_or_default().to_string()
    }

    fn statements(&self, parent: Node) -> Vec<Stmt> {
        let mut cursor = parent.walk();
        let children: Vec<Node> = parent.named_children(&mut cursor).collect();
        children
            .into_iter()
            .filter_map(|child| self.statement(child))
            .collect()
    }

    fn statement(&self, node: Node) -> Option<Stmt> {
        let stmt = match node.kind() {
            "comment" => return None,
            "function_definition" => Stmt::FunctionDef(self.function(node, Vec::new())),
            "class_definition" => Stmt::ClassDef(self.class(node, Vec::new())),
            "decorated_definition" => self.decorated(node),
            "expression_statement" => self.expression_statement(node),
            "if_statement" => self.if_statement(node),
            "import_statement" => Stmt::Import {
                modules: self.import_names(node),
            },
            "import_from_statement" => Stmt::ImportFrom {
                module: node
                    .child_by_field_name("module_name")
                    .map(|module| self.text(module)),
            },
            _ => {
                let nested = self.nested_blocks(node);
                if nested.is_empty() {
                    Stmt::Other
                } else {
                    Stmt::Compound(nested)
                }
            }
        };
        Some(stmt)
    }

    fn decorated(&self, node: Node) -> Stmt {
        let mut cursor = node.walk();
        let decorators: Vec<Expr> = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() == "decorator")
            .filter_map(|decorator| decorator.named_child(0))
            .map(|expr| self.expr(expr))
            .collect();

        match node.child_by_field_name("definition") {
            Some(def) if def.kind() == "function_definition" => {
                Stmt::FunctionDef(self.function(def, decorators))
            }
            Some(def) if def.kind() == "class_definition" => {
                Stmt::ClassDef(self.class(def, decorators))
            }
            _ => Stmt::Other,
        }
    }

    fn function(&self, node: Node, decorators: Vec<Expr>) -> FunctionDef {
        FunctionDef {
            name: node
                .child_by_field_name("name")
                .map(|name| self.text(name))
                .unwrap_or_default(),
            decorators,
            params: node
                .child_by_field_name("parameters")
                .map(|params| self.parameters(params))
                .unwrap_or_default(),
            body: node
                .child_by_field_name("body")
                .map(|body| self.statements(body))
                .unwrap_or_default(),
        }
    }

    fn parameters(&self, node: Node) -> Vec<Param> {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        children
            .into_iter()
            .filter_map(|param| match param.kind() {
                "identifier" => Some(Param {
                    name: self.text(param),
                    annotation: None,
                }),
                // typed_parameter has no `name` field; the identifier comes first
                "typed_parameter" => Some(Param {
                    name: param
                        .named_child(0)
                        .map(|name| self.text(name))
                        .unwrap_or_default(),
                    annotation: param
                        .child_by_field_name("type")
                        .map(|ty| self.annotation(ty)),
                }),
                "default_parameter" | "typed_default_parameter" => Some(Param {
                    name: param
                        .child_by_field_name("name")
                        .map(|name| self.text(name))
                        .unwrap_or_default(),
                    annotation: param
                        .child_by_field_name("type")
                        .map(|ty| self.annotation(ty)),
                }),
                _ => None,
            })
            .collect()
    }

    fn class(&self, node: Node, decorators: Vec<Expr>) -> ClassDef {
        let bases = node
            .child_by_field_name("superclasses")
            .map(|args| {
                let mut cursor = args.walk();
                let children: Vec<Node> = args.named_children(&mut cursor).collect();
                children
                    .into_iter()
                    .filter(|child| child.kind() != "keyword_argument" && child.kind() != "comment")
                    .map(|child| self.expr(child))
                    .collect()
            })
            .unwrap_or_default();

        ClassDef {
            name: node
                .child_by_field_name("name")
                .map(|name| self.text(name))
                .unwrap_or_default(),
            bases,
            decorators,
            body: node
                .child_by_field_name("body")
                .map(|body| self.statements(body))
                .unwrap_or_default(),
        }
    }

    fn expression_statement(&self, node: Node) -> Stmt {
        let Some(inner) = node.named_child(0) else {
            return Stmt::Other;
        };
        match inner.kind() {
            "assignment" => self.assignment(inner),
            "augmented_assignment" => Stmt::Other,
            _ => Stmt::Expr(self.expr(inner)),
        }
    }

    /// `a = b = value` nests assignments on the right; flatten into targets
    fn assignment(&self, node: Node) -> Stmt {
        let mut targets = Vec::new();
        let mut current = node;
        loop {
            if let Some(left) = current.child_by_field_name("left") {
                targets.push(self.expr(left));
            }
            match current.child_by_field_name("right") {
                Some(right) if right.kind() == "assignment" => current = right,
                Some(right) => {
                    return Stmt::Assign {
                        targets,
                        value: self.expr(right),
                    }
                }
                // bare annotation `x: int`
                None => return Stmt::Other,
            }
        }
    }

    fn if_statement(&self, node: Node) -> Stmt {
        let mut cursor = node.walk();
        let alternatives: Vec<Node> = node
            .children_by_field_name("alternative", &mut cursor)
            .collect();

        Stmt::If {
            test: self.condition(node),
            body: self.consequence(node),
            orelse: self.else_chain(&alternatives),
        }
    }

    fn condition(&self, node: Node) -> Expr {
        node.child_by_field_name("condition")
            .map(|cond| self.expr(cond))
            .unwrap_or(Expr::Other)
    }

    fn consequence(&self, node: Node) -> Vec<Stmt> {
        node.child_by_field_name("consequence")
            .map(|block| self.statements(block))
            .unwrap_or_default()
    }

    fn else_chain(&self, alternatives: &[Node]) -> Vec<Stmt> {
        let Some((first, rest)) = alternatives.split_first() else {
            return Vec::new();
        };
        match first.kind() {
            "elif_clause" => vec![Stmt::If {
                test: self.condition(*first),
                body: self.consequence(*first),
                orelse: self.else_chain(rest),
            }],
            "else_clause" => first
                .child_by_field_name("body")
                .map(|block| self.statements(block))
                .unwrap_or_default(),
            _ => self.else_chain(rest),
        }
    }

    fn nested_blocks(&self, node: Node) -> Vec<Stmt> {
        let mut out = Vec::new();
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            if child.kind() == "block" {
                out.extend(self.statements(child));
            } else {
                out.extend(self.nested_blocks(child));
            }
        }
        out
    }

    fn import_names(&self, node: Node) -> Vec<String> {
        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
        names
            .into_iter()
            .map(|name| match name.kind() {
                "aliased_import" => name
                    .child_by_field_name("name")
                    .map(|dotted| self.text(dotted))
                    .unwrap_or_default(),
                _ => self.text(name),
            })
            .collect()
    }

    fn expr(&self, node: Node) -> Expr {
        match node.kind() {
            "identifier" => Expr::Name(self.text(node)),
            "attribute" => Expr::Attribute {
                value: Box::new(
                    node.child_by_field_name("object")
                        .map(|object| self.expr(object))
                        .unwrap_or(Expr::Other),
                ),
                attr: node
                    .child_by_field_name("attribute")
                    .map(|attr| self.text(attr))
                    .unwrap_or_default(),
            },
            "call" => self.call(node),
            "string" => self.string(node).map(Expr::Str).unwrap_or(Expr::Other),
            "concatenated_string" => self.concatenated(node),
            "dictionary" => self.dictionary(node),
            "list" | "tuple" | "set" | "expression_list" | "pattern_list" | "tuple_pattern"
            | "list_pattern" => Expr::Sequence(self.elements(node)),
            "subscript" => {
                let mut cursor = node.walk();
                let index: Vec<Node> = node
                    .children_by_field_name("subscript", &mut cursor)
                    .collect();
                Expr::Subscript {
                    value: Box::new(
                        node.child_by_field_name("value")
                            .map(|value| self.expr(value))
                            .unwrap_or(Expr::Other),
                    ),
                    index: index.into_iter().map(|item| self.expr(item)).collect(),
                }
            }
            "comparison_operator" => self.comparison(node),
            "parenthesized_expression" => node
                .named_child(0)
                .map(|inner| self.expr(inner))
                .unwrap_or(Expr::Other),
            "type" | "generic_type" | "member_type" | "union_type" => self.annotation(node),
            _ => Expr::Other,
        }
    }

    /// Type annotations may come back as dedicated type nodes rather than expressions
    fn annotation(&self, node: Node) -> Expr {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        match node.kind() {
            "type" => children
                .first()
                .map(|inner| self.annotation(*inner))
                .unwrap_or(Expr::Other),
            "generic_type" => {
                let value = children
                    .first()
                    .map(|base| self.annotation(*base))
                    .unwrap_or(Expr::Other);
                let mut index = Vec::new();
                for child in children.iter().filter(|c| c.kind() == "type_parameter") {
                    let mut inner_cursor = child.walk();
                    let params: Vec<Node> = child.named_children(&mut inner_cursor).collect();
                    index.extend(params.into_iter().map(|param| self.annotation(param)));
                }
                Expr::Subscript {
                    value: Box::new(value),
                    index,
                }
            }
            "member_type" => match (children.first(), children.last()) {
                (Some(object), Some(attr)) if children.len() >= 2 => Expr::Attribute {
                    value: Box::new(self.annotation(*object)),
                    attr: self.text(*attr),
                },
                _ => Expr::Other,
            },
            "union_type" => Expr::Sequence(
                children
                    .into_iter()
                    .map(|part| self.annotation(part))
                    .collect(),
            ),
            _ => self.expr(node),
        }
    }

    fn call(&self, node: Node) -> Expr {
        let func = node
            .child_by_field_name("function")
            .map(|func| self.expr(func))
            .unwrap_or(Expr::Other);

        let mut args = Vec::new();
        let mut keywords = Vec::new();
        if let Some(arguments) = node.child_by_field_name("arguments") {
            let mut cursor = arguments.walk();
            let children: Vec<Node> = arguments.named_children(&mut cursor).collect();
            for child in children {
                match child.kind() {
                    "keyword_argument" => keywords.push(Keyword {
                        arg: child.child_by_field_name("name").map(|n| self.text(n)),
                        value: child
                            .child_by_field_name("value")
                            .map(|v| self.expr(v))
                            .unwrap_or(Expr::Other),
                    }),
                    "dictionary_splat" => keywords.push(Keyword {
                        arg: None,
                        value: Expr::Other,
                    }),
                    "comment" => {}
                    _ => args.push(self.expr(child)),
                }
            }
        }

        Expr::Call {
            func: Box::new(func),
            args,
            keywords,
        }
    }

    fn string(&self, node: Node) -> Option<String> {
        let mut value = String::new();
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "string_start" => {
                    let prefix = self.text(child).to_ascii_lowercase();
                    if prefix.contains('b') || prefix.contains('f') {
                        return None;
                    }
                }
                "string_content" | "escape_sequence" => value.push_str(&self.text(child)),
                "interpolation" => return None,
                _ => {}
            }
        }
        Some(value)
    }

    fn concatenated(&self, node: Node) -> Expr {
        let mut cursor = node.walk();
        let parts: Vec<Node> = node.named_children(&mut cursor).collect();
        let mut value = String::new();
        for part in parts {
            match self.string(part) {
                Some(text) => value.push_str(&text),
                None => return Expr::Other,
            }
        }
        Expr::Str(value)
    }

    fn dictionary(&self, node: Node) -> Expr {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        let pairs = children
            .into_iter()
            .filter(|child| child.kind() == "pair")
            .map(|pair| {
                let key = pair
                    .child_by_field_name("key")
                    .map(|k| self.expr(k))
                    .unwrap_or(Expr::Other);
                let value = pair
                    .child_by_field_name("value")
                    .map(|v| self.expr(v))
                    .unwrap_or(Expr::Other);
                (key, value)
            })
            .collect();
        Expr::Dict(pairs)
    }

    fn elements(&self, node: Node) -> Vec<Expr> {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        children
            .into_iter()
            .filter(|child| child.kind() != "comment")
            .map(|child| self.expr(child))
            .collect()
    }

    fn comparison(&self, node: Node) -> Expr {
        let mut operands = Vec::new();
        let mut ops = Vec::new();
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            if child.is_named() {
                if child.kind() != "comment" {
                    operands.push(self.expr(child));
                }
            } else {
                ops.push(CmpOp::from_token(child.kind()));
            }
        }

        if operands.is_empty() {
            return Expr::Other;
        }
        let left = operands.remove(0);
        Expr::Compare {
            left: Box::new(left),
            ops,
            comparators: operands,
        }
    }
}

/// Visit every statement, descending into all nested bodies
pub fn walk_stmts<'m>(stmts: &'m [Stmt], visit: &mut dyn FnMut(&'m Stmt)) {
    for stmt in stmts {
        visit(stmt);
        match stmt {
            Stmt::FunctionDef(func) => walk_stmts(&func.body, visit),
            Stmt::ClassDef(class) => walk_stmts(&class.body, visit),
            Stmt::If { body, orelse, .. } => {
                walk_stmts(body, visit);
                walk_stmts(orelse, visit);
            }
            Stmt::Compound(body) => walk_stmts(body, visit),
            Stmt::Assign { .. }
            | Stmt::Import { .. }
            | Stmt::ImportFrom { .. }
            | Stmt::Expr(_)
            | Stmt::Other => {}
        }
    }
}

/// Like [`walk_stmts`] but does not enter nested function definitions
pub fn walk_local<'m>(stmts: &'m [Stmt], visit: &mut dyn FnMut(&'m Stmt)) {
    for stmt in stmts {
        visit(stmt);
        match stmt {
            Stmt::FunctionDef(_) => {}
            Stmt::ClassDef(class) => walk_local(&class.body, visit),
            Stmt::If { body, orelse, .. } => {
                walk_local(body, visit);
                walk_local(orelse, visit);
            }
            Stmt::Compound(body) => walk_local(body, visit),
            Stmt::Assign { .. }
            | Stmt::Import { .. }
            | Stmt::ImportFrom { .. }
            | Stmt::Expr(_)
            | Stmt::Other => {}
        }
    }
}

impl Module {
    /// Every function definition, nested ones included, in source order
    pub fn functions(&self) -> Vec<&FunctionDef> {
        let mut out = Vec::new();
        walk_stmts(&self.body, &mut |stmt| {
            if let Stmt::FunctionDef(func) = stmt {
                out.push(func);
            }
        });
        out
    }

    /// Every class definition, nested ones included, in source order
    pub fn classes(&self) -> Vec<&ClassDef> {
        let mut out = Vec::new();
        walk_stmts(&self.body, &mut |stmt| {
            if let Stmt::ClassDef(class) = stmt {
                out.push(class);
            }
        });
        out
    }
}
