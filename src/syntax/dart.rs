//! Typed views over tree-sitter-dart nodes.

use tree_sitter::Node;

use super::SourceFile;

/// Declarations whose bodies hold class members.
pub const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "mixin_declaration",
    "extension_declaration",
    "extension_type_declaration",
    "enum_declaration",
];

/// Direct children, comments excluded.
pub fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect()
}

/// Named direct children, comments excluded.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect()
}

pub fn first_named_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    named_children(node).into_iter().find(|child| child.kind() == kind)
}

/// Whether `node` has the keyword `token` as a direct child.
pub fn has_token(node: Node<'_>, token: &str) -> bool {
    children(node)
        .iter()
        .any(|child| !child.is_named() && child.kind() == token)
}

/// Strips parentheses and null assertions.
pub fn unwrapped(node: Node<'_>) -> Node<'_> {
    let inner = match node.kind() {
        "parenthesized_expression" => named_children(node).into_iter().next(),
        "null_assertion_expression" => node.child_by_field_name("value"),
        _ => None,
    };
    match inner {
        Some(inner) => unwrapped(inner),
        None => node,
    }
}

pub fn starts_upper(name: &str) -> bool {
    name.trim_start_matches(['_', '$'])
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase())
}

// ============================================================================
// Calls and constructions
// ============================================================================

#[derive(Debug, Clone)]
pub struct Argument<'t> {
    /// Label of a named argument.
    pub name: Option<String>,
    pub value: Node<'t>,
}

/// A call or instance creation: `f(..)`, `a.b<T>(..)`, `const T(..)`,
/// `new p.T.named(..)`.
#[derive(Debug, Clone)]
pub struct Call<'t> {
    pub node: Node<'t>,
    /// Invoked expression; `None` for `new`/`const` creations.
    pub callee: Option<Node<'t>>,
    pub type_args: Option<Node<'t>>,
    pub args: Vec<Argument<'t>>,
    /// Class the expression reads as constructing, judged by naming.
    pub type_name: Option<String>,
    /// Last identifier of the callee.
    pub method_name: Option<String>,
}

impl<'t> Call<'t> {
    pub fn of(node: Node<'t>, file: &SourceFile) -> Option<Self> {
        let arguments = node.child_by_field_name("arguments")?;
        let args = arguments_of(arguments, file);
        match node.kind() {
            "call_expression" => {
                let function = node.child_by_field_name("function")?;
                let (callee, type_args) = if function.kind() == "instantiation_expression" {
                    (
                        function.child_by_field_name("function")?,
                        function.child_by_field_name("type_arguments"),
                    )
                } else {
                    (function, None)
                };
                Some(Self {
                    node,
                    callee: Some(callee),
                    type_args,
                    args,
                    type_name: callee_type_name(callee, file),
                    method_name: callee_method_name(callee, file),
                })
            }
            "new_expression" | "const_object_expression" => {
                let ty = node.child_by_field_name("type")?;
                let text = file.node_text(&ty);
                let constructor = node
                    .child_by_field_name("constructor")
                    .map(|name| file.node_text(&name).to_string());
                let mut path = text.split('<').next().unwrap_or(text).to_string();
                if let Some(constructor) = &constructor {
                    path.push('.');
                    path.push_str(constructor);
                }
                Some(Self {
                    node,
                    callee: None,
                    type_args: first_named_of_kind(ty, "type_arguments"),
                    args,
                    type_name: last_upper_segment(&path),
                    method_name: constructor,
                })
            }
            "constructor_invocation" => {
                let segments: Vec<&str> = named_children(node)
                    .iter()
                    .filter(|child| child.kind() == "type_identifier")
                    .map(|child| file.node_text(child))
                    .collect();
                Some(Self {
                    node,
                    callee: None,
                    type_args: first_named_of_kind(node, "type_arguments"),
                    args,
                    type_name: last_upper_segment(&segments.join(".")),
                    method_name: node
                        .child_by_field_name("constructor")
                        .map(|name| file.node_text(&name).to_string()),
                })
            }
            _ => None,
        }
    }

    pub fn positional(&self) -> impl Iterator<Item = &Argument<'t>> {
        self.args.iter().filter(|arg| arg.name.is_none())
    }

    pub fn named(&self, name: &str) -> Option<&Argument<'t>> {
        self.args.iter().find(|arg| arg.name.as_deref() == Some(name))
    }
}

fn arguments_of<'t>(arguments: Node<'t>, file: &SourceFile) -> Vec<Argument<'t>> {
    let mut args = Vec::new();
    for child in children(arguments) {
        match child.kind() {
            "named_argument" => {
                let parts = children(child);
                let name = parts
                    .iter()
                    .find(|part| part.kind() == "label")
                    .and_then(|label| first_named_of_kind(*label, "identifier"))
                    .map(|id| file.node_text(&id).to_string());
                if let Some(value) = parts.into_iter().find(|part| part.kind() != "label") {
                    args.push(Argument { name, value });
                }
            }
            "this" | "super" => args.push(Argument {
                name: None,
                value: child,
            }),
            _ if child.is_named() => args.push(Argument {
                name: None,
                value: child,
            }),
            _ => {}
        }
    }
    args
}

fn callee_type_name(callee: Node<'_>, file: &SourceFile) -> Option<String> {
    match callee.kind() {
        "identifier" => {
            let name = file.node_text(&callee);
            starts_upper(name).then(|| name.to_string())
        }
        "member_expression" => {
            let object = callee.child_by_field_name("object")?;
            let property = callee.child_by_field_name("property")?;
            if object.kind() != "identifier" {
                return None;
            }
            let (object, property) = (file.node_text(&object), file.node_text(&property));
            match (starts_upper(object), starts_upper(property)) {
                (true, false) => Some(object.to_string()),
                (false, true) => Some(property.to_string()),
                _ => None,
            }
        }
        _ => None,
    }
}

fn callee_method_name(callee: Node<'_>, file: &SourceFile) -> Option<String> {
    match callee.kind() {
        "identifier" => Some(file.node_text(&callee).to_string()),
        "member_expression" | "null_aware_member_expression" => callee
            .child_by_field_name("property")
            .map(|property| file.node_text(&property).to_string()),
        _ => None,
    }
}

fn last_upper_segment(path: &str) -> Option<String> {
    path.trim_end_matches('?')
        .split('.')
        .map(str::trim)
        .filter(|segment| starts_upper(segment))
        .last()
        .map(str::to_string)
}

// ============================================================================
// Literals
// ============================================================================

#[derive(Debug, Clone)]
pub enum StringPiece<'t> {
    Text(String),
    Interpolation(Node<'t>),
}

/// Decoded pieces of a string literal, adjacent parts concatenated.
pub fn string_pieces<'t>(node: Node<'t>, file: &SourceFile) -> Option<Vec<StringPiece<'t>>> {
    if node.kind() != "string_literal" {
        return None;
    }
    let source = file.source.as_str();
    let mut pieces = Vec::new();
    for part in named_children(node) {
        let kind = part.kind();
        let raw = kind.starts_with("raw_");
        let quote = if kind.ends_with("_multiple") { 3 } else { 1 };
        let start = part.start_byte() + usize::from(raw) + quote;
        let end = part.end_byte().checked_sub(quote)?;
        if end < start {
            return None;
        }
        if raw {
            pieces.push(StringPiece::Text(source.get(start..end)?.to_string()));
            continue;
        }

        let mut text = String::new();
        let mut pos = start;
        for inner in named_children(part) {
            match inner.kind() {
                "escape_sequence" => {
                    text.push_str(source.get(pos..inner.start_byte())?);
                    text.push_str(&unescape(file.node_text(&inner)));
                    pos = inner.end_byte();
                }
                "template_substitution" => {
                    text.push_str(source.get(pos..inner.start_byte())?);
                    if !text.is_empty() {
                        pieces.push(StringPiece::Text(std::mem::take(&mut text)));
                    }
                    let expr = named_children(inner).into_iter().next()?;
                    pieces.push(StringPiece::Interpolation(expr));
                    pos = inner.end_byte();
                }
                _ => {}
            }
        }
        text.push_str(source.get(pos..end)?);
        if !text.is_empty() {
            pieces.push(StringPiece::Text(text));
        }
    }
    Some(pieces)
}

fn unescape(sequence: &str) -> String {
    let body = sequence.strip_prefix('\\').unwrap_or(sequence);
    let code = |hex: &str| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    let decoded = match body.chars().next() {
        Some('n') => Some('\n'),
        Some('t') => Some('\t'),
        Some('r') => Some('\r'),
        Some('b') => Some('\u{8}'),
        Some('f') => Some('\u{c}'),
        Some('v') => Some('\u{b}'),
        Some('x') => code(&body[1..]),
        Some('u') => code(body[1..].trim_start_matches('{').trim_end_matches('}')),
        _ => None,
    };
    match decoded {
        Some(c) => c.to_string(),
        None => body.to_string(),
    }
}

/// Value of a string literal without interpolation.
pub fn plain_string(node: Node<'_>, file: &SourceFile) -> Option<String> {
    let mut value = String::new();
    for piece in string_pieces(unwrapped(node), file)? {
        match piece {
            StringPiece::Text(text) => value.push_str(&text),
            StringPiece::Interpolation(_) => return None,
        }
    }
    Some(value)
}

/// `{}`, `<K, V>{}` or a braced literal with at least one `key: value`.
pub fn is_map_literal(node: Node<'_>) -> bool {
    let node = unwrapped(node);
    if node.kind() != "set_or_map_literal" {
        return false;
    }
    let parts = named_children(node);
    if let Some(type_args) = parts.iter().find(|part| part.kind() == "type_arguments") {
        return named_children(*type_args).len() == 2;
    }
    parts.is_empty()
        || parts
            .iter()
            .any(|part| matches!(part.kind(), "pair" | "null_aware_pair"))
}

// ============================================================================
// Functions and parameters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub named: bool,
}

/// Parameters of a `formal_parameter_list`, in declaration order.
pub fn params(list: Node<'_>, file: &SourceFile) -> Vec<Param> {
    let mut out = Vec::new();
    for child in named_children(list) {
        match child.kind() {
            "formal_parameter" => out.extend(param_name(child).map(|name| Param {
                name: file.node_text(&name).to_string(),
                named: false,
            })),
            "optional_formal_parameters" => {
                let named = children(child).first().is_some_and(|open| open.kind() == "{");
                for param in named_children(child) {
                    if param.kind() != "formal_parameter" {
                        continue;
                    }
                    out.extend(param_name(param).map(|name| Param {
                        name: file.node_text(&name).to_string(),
                        named,
                    }));
                }
            }
            _ => {}
        }
    }
    out
}

fn param_name(param: Node<'_>) -> Option<Node<'_>> {
    if let Some(name) = param.child_by_field_name("name") {
        return Some(name);
    }
    named_children(param).into_iter().find_map(|child| match child.kind() {
        "identifier" => Some(child),
        "constructor_param" | "super_formal_parameter" => first_named_of_kind(child, "identifier"),
        _ => None,
    })
}

/// Expression a function body evaluates to: the `=>` expression, or the
/// value of a trailing `return`.
pub fn returned_expr(body: Node<'_>) -> Option<Node<'_>> {
    let body = match body.kind() {
        "function_expression" => body.child_by_field_name("body")?,
        _ => body,
    };
    let inner = named_children(body);
    match inner.iter().find(|child| child.kind() == "block") {
        Some(block) => {
            let last = named_children(*block).into_iter().last()?;
            if last.kind() != "return_statement" {
                return None;
            }
            named_children(last).into_iter().next()
        }
        None => inner.into_iter().next(),
    }
}

/// A function or method with a body.
#[derive(Debug, Clone)]
pub struct Function<'t> {
    pub name: Node<'t>,
    /// `name` for top-level functions, `Type.name` for members.
    pub qualified_name: String,
    pub params: Vec<Param>,
    pub body: Node<'t>,
    pub is_static: bool,
}

/// Every top-level function and member function of `file`.
pub fn functions(file: &SourceFile) -> Vec<Function<'_>> {
    let mut out = Vec::new();
    for decl in named_children(file.root_node()) {
        match decl.kind() {
            "function_declaration" => out.extend(top_level_function(decl, file)),
            kind if TYPE_DECLARATIONS.contains(&kind) => out.extend(methods(decl, file)),
            _ => {}
        }
    }
    out
}

fn top_level_function<'t>(decl: Node<'t>, file: &SourceFile) -> Option<Function<'t>> {
    let signature = decl.child_by_field_name("signature")?;
    let body = decl.child_by_field_name("body")?;
    function_from(signature, body, None, false, file)
}

fn function_from<'t>(
    signature: Node<'t>,
    body: Node<'t>,
    owner: Option<&str>,
    is_static: bool,
    file: &SourceFile,
) -> Option<Function<'t>> {
    let name = signature.child_by_field_name("name")?;
    let params = first_named_of_kind(signature, "formal_parameter_list")
        .map(|list| params(list, file))
        .unwrap_or_default();
    let simple = file.node_text(&name);
    let qualified_name = match owner {
        Some(owner) => format!("{}.{}", owner, simple),
        None => simple.to_string(),
    };
    Some(Function {
        name,
        qualified_name,
        params,
        body,
        is_static,
    })
}

/// Member functions of a class-like declaration.
pub fn methods<'t>(type_decl: Node<'t>, file: &SourceFile) -> Vec<Function<'t>> {
    let owner = type_name(type_decl, file);
    members(type_decl)
        .into_iter()
        .filter(|member| member.kind() == "method_declaration")
        .filter_map(|method| {
            let signature = method.child_by_field_name("signature")?;
            let body = method.child_by_field_name("body")?;
            let function = first_named_of_kind(signature, "function_signature")?;
            function_from(
                function,
                body,
                Some(&owner),
                has_token(signature, "static"),
                file,
            )
        })
        .collect()
}

/// `declaration` and `method_declaration` nodes of a class-like body.
pub fn members(type_decl: Node<'_>) -> Vec<Node<'_>> {
    let Some(body) = type_decl.child_by_field_name("body") else {
        return Vec::new();
    };
    named_children(body)
        .into_iter()
        .filter(|child| child.kind() == "class_member")
        .filter_map(|member| {
            named_children(member)
                .into_iter()
                .find(|inner| matches!(inner.kind(), "declaration" | "method_declaration"))
        })
        .collect()
}

/// Declared name of a class-like declaration. Unnamed extensions are
/// named after the type they extend.
pub fn type_name(type_decl: Node<'_>, file: &SourceFile) -> String {
    if let Some(name) = type_decl.child_by_field_name("name") {
        return file.node_text(&name).to_string();
    }
    let extended = type_decl
        .child_by_field_name("class")
        .map(|ty| file.node_text(&ty))
        .unwrap_or("?");
    format!("extension on {}", extended)
}

/// Innermost class-like declaration containing `node`.
pub fn enclosing_type(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node.parent();
    while let Some(candidate) = current {
        if TYPE_DECLARATIONS.contains(&candidate.kind()) {
            return Some(candidate);
        }
        current = candidate.parent();
    }
    None
}

/// Declared type of the `position`-th positional parameter of the unnamed
/// constructor of `type_decl`. Initializing formals take the field's type.
pub fn constructor_param_type(
    type_decl: Node<'_>,
    position: usize,
    file: &SourceFile,
) -> Option<String> {
    let class = type_name(type_decl, file);
    let members = members(type_decl);
    let list = members.iter().find_map(|member| {
        let holder = match member.kind() {
            "method_declaration" => member.child_by_field_name("signature")?,
            _ => *member,
        };
        named_children(holder).into_iter().find_map(|sig| {
            if !matches!(sig.kind(), "constructor_signature" | "constant_constructor_signature") {
                return None;
            }
            let params = sig.child_by_field_name("parameters")?;
            let head = file.source.get(sig.start_byte()..params.start_byte())?;
            let head = head.trim().trim_start_matches("const").trim();
            (head == class).then_some(params)
        })
    })?;

    let mut positional = Vec::new();
    for child in named_children(list) {
        match child.kind() {
            "formal_parameter" => positional.push(child),
            "optional_formal_parameters"
                if children(child).first().is_some_and(|open| open.kind() == "[") =>
            {
                positional.extend(
                    named_children(child)
                        .into_iter()
                        .filter(|param| param.kind() == "formal_parameter"),
                );
            }
            _ => {}
        }
    }
    let param = *positional.get(position)?;

    if let Some(ty) = first_named_of_kind(param, "type") {
        return Some(file.node_text(&ty).to_string());
    }
    let field = first_named_of_kind(param, "constructor_param")?;
    if let Some(ty) = first_named_of_kind(field, "type") {
        return Some(file.node_text(&ty).to_string());
    }
    let name = file.node_text(&first_named_of_kind(field, "identifier")?);
    members.iter().find_map(|member| {
        if member.kind() != "declaration"
            || !variables(*member)
                .iter()
                .any(|var| file.node_text(&var.name) == name)
        {
            return None;
        }
        first_named_of_kind(*member, "type").map(|ty| file.node_text(&ty).to_string())
    })
}

// ============================================================================
// Variables, imports and top-level names
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Variable<'t> {
    pub name: Node<'t>,
    pub value: Option<Node<'t>>,
    /// Declared `const` or `final`.
    pub is_constant: bool,
    pub is_static: bool,
}

/// Variables introduced by a `top_level_variable_declaration` or a field
/// `declaration`.
pub fn variables(decl: Node<'_>) -> Vec<Variable<'_>> {
    let is_constant = match decl.kind() {
        "top_level_variable_declaration" => decl
            .child_by_field_name("modifier")
            .is_some_and(|modifier| matches!(modifier.kind(), "const" | "final")),
        _ => has_token(decl, "const") || has_token(decl, "final"),
    };
    let is_static = has_token(decl, "static");

    let mut out = Vec::new();
    for list in named_children(decl) {
        if !matches!(
            list.kind(),
            "static_final_declaration_list" | "initialized_identifier_list"
        ) {
            continue;
        }
        for item in named_children(list) {
            if let Some(name) = item.child_by_field_name("name") {
                out.push(Variable {
                    name,
                    value: item.child_by_field_name("value"),
                    is_constant,
                    is_static,
                });
            }
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct Import<'t> {
    pub uri: String,
    /// The whole directive, `;` included.
    pub node: Node<'t>,
}

pub fn imports(file: &SourceFile) -> Vec<Import<'_>> {
    named_children(file.root_node())
        .into_iter()
        .filter(|child| child.kind() == "import_or_export")
        .filter_map(|directive| {
            let import = first_named_of_kind(directive, "library_import")?;
            let spec = first_named_of_kind(import, "import_specification")?;
            let mut uri = spec.child_by_field_name("uri")?;
            if uri.kind() == "configurable_uri" {
                uri = first_named_of_kind(uri, "uri")?;
            }
            let literal = first_named_of_kind(uri, "string_literal")?;
            Some(Import {
                uri: plain_string(literal, file)?,
                node: directive,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub enum Declared<'t> {
    Function(Function<'t>),
    /// A class-like declaration node.
    Type(Node<'t>),
    Variable(Variable<'t>),
}

/// Top-level declarations of `file` by name, in source order.
pub fn top_level(file: &SourceFile) -> Vec<(String, Declared<'_>)> {
    let mut out = Vec::new();
    for decl in named_children(file.root_node()) {
        match decl.kind() {
            "function_declaration" => {
                if let Some(function) = top_level_function(decl, file) {
                    let name = file.node_text(&function.name).to_string();
                    out.push((name, Declared::Function(function)));
                }
            }
            "top_level_variable_declaration" => {
                for var in variables(decl) {
                    out.push((file.node_text(&var.name).to_string(), Declared::Variable(var)));
                }
            }
            kind if TYPE_DECLARATIONS.contains(&kind) => {
                if let Some(name) = decl.child_by_field_name("name") {
                    out.push((file.node_text(&name).to_string(), Declared::Type(decl)));
                }
            }
            _ => {}
        }
    }
    out
}
