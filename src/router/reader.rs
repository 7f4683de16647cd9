//! Reads an existing route configuration back into records.

use tracing::debug;
use tree_sitter::Node;

use crate::model::{CallRecord, Destination, OperationKind, Payload, RoutePath, SourceText, Target};
use crate::syntax::dart::{self, Call};
use crate::syntax::{Resolver, SourceFile};

/// Declarative route construction.
pub const ROUTE_TYPE: &str = "GoRoute";

/// What an existing configuration file contributes to a migration.
#[derive(Debug, Clone, Default)]
pub struct ImportedConfig {
    pub records: Vec<CallRecord>,
    /// Import URIs already present in the file.
    pub imports: Vec<String>,
    /// Top-level routes whose path is not a constant.
    pub opaque: Vec<OpaqueRoute>,
}

/// A route declaration kept as written. Its nested routes are not read,
/// since their absolute paths depend on the unknown parent path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueRoute {
    /// 1-based.
    pub line: usize,
    /// Source text of the `path:` argument, empty when absent.
    pub path_expr: String,
    pub text: String,
}

/// Reads every `GoRoute` of `file`. Paths are evaluated as constants
/// through `resolver`, so `path: Routes.home` is read like a literal.
pub fn read_config<R: Resolver>(file: &SourceFile, resolver: &R) -> ImportedConfig {
    let mut collector = RouteCollector {
        file,
        resolver,
        parents: Vec::new(),
        records: Vec::new(),
        opaque: Vec::new(),
    };
    collector.visit(file.root_node());
    debug!(
        "Read {} routes ({} opaque) from {}",
        collector.records.len(),
        collector.opaque.len(),
        file.path.display()
    );
    ImportedConfig {
        records: collector.records,
        imports: dart::imports(file).into_iter().map(|i| i.uri).collect(),
        opaque: collector.opaque,
    }
}

struct RouteCollector<'a, R: Resolver> {
    file: &'a SourceFile,
    resolver: &'a R,
    /// Absolute paths of the enclosing routes.
    parents: Vec<RoutePath>,
    records: Vec<CallRecord>,
    opaque: Vec<OpaqueRoute>,
}

impl<R: Resolver> RouteCollector<'_, R> {
    fn visit(&mut self, node: Node<'_>) {
        match route_construction(node, self.file) {
            Some(call) => self.route(&call),
            None => {
                for child in dart::named_children(node) {
                    self.visit(child);
                }
            }
        }
    }

    fn route_path(&self, call: &Call<'_>) -> Option<RoutePath> {
        let value = self
            .resolver
            .constant_value(self.file, call.named("path")?.value)?;
        match self.parents.last() {
            Some(parent) => parent.join(&value),
            None => RoutePath::parse(&value),
        }
        .ok()
    }

    fn route(&mut self, call: &Call<'_>) {
        let text = self.file.node_text(&call.node).to_string();
        let path_expr = call
            .named("path")
            .map(|arg| self.file.node_text(&arg.value).to_string());

        let Some(path) = self.route_path(call) else {
            debug!("Route without a constant path: {}", text);
            // Nested ones already travel inside their parent's text.
            if self.parents.is_empty() {
                self.opaque.push(OpaqueRoute {
                    line: self.file.line_of(call.node.start_byte()),
                    path_expr: path_expr.unwrap_or_default(),
                    text,
                });
            }
            return;
        };

        self.records.push(CallRecord {
            location: None,
            kind: OperationKind::Imported,
            destination: Destination::Path(path.clone()),
            destination_expr: path_expr,
            target: built_type(call, self.file).map(|name| Target { name, file: None }),
            type_args: None,
            payload: Payload::None,
            payload_type: None,
            map_literal: false,
            result: None,
            context: None,
            source_text: SourceText::Declaration {
                text,
                nested: !self.parents.is_empty(),
            },
        });

        if let Some(routes) = call.named("routes") {
            self.parents.push(path);
            self.visit(routes.value);
            self.parents.pop();
        }
    }
}

fn route_construction<'t>(node: Node<'t>, file: &SourceFile) -> Option<Call<'t>> {
    if !matches!(
        node.kind(),
        "call_expression" | "const_object_expression" | "new_expression"
    ) {
        return None;
    }
    Call::of(node, file).filter(|call| call.type_name.as_deref() == Some(ROUTE_TYPE))
}

/// Type built by a route's `builder`, if it builds one directly.
fn built_type(call: &Call<'_>, file: &SourceFile) -> Option<String> {
    let builder = dart::unwrapped(call.named("builder")?.value);
    if builder.kind() != "function_expression" {
        return None;
    }
    let built = dart::unwrapped(dart::returned_expr(builder)?);
    Call::of(built, file)?.type_name
}
