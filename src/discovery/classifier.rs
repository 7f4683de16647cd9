//! Call-site classification: turns navigation calls into [`CallRecord`]s.

use tree_sitter::Node;

use crate::model::{
    CallRecord, Destination, OperationKind, Payload, RoutePath, SourceLocation, SourceText, Target,
};
use crate::syntax::dart::{self, Call};
use crate::syntax::{visit, Resolver, SourceFile, Span};

use super::helpers::HelperSet;

/// The imperative navigation facility.
pub const NAVIGATOR: &str = "Navigator";

/// Accessors resolving the current navigator from a context.
const ACCESSORS: &[&str] = &["of", "maybeOf"];

/// Named arguments carrying a route payload.
const PAYLOAD_ARGS: &[&str] = &["arguments", "extra"];

/// How a navigation call is dispatched, with its arguments sorted out.
#[derive(Debug)]
pub(crate) struct CallShape<'t> {
    pub kind: OperationKind,
    pub context: Option<Node<'t>>,
    /// Positional arguments with the implicit context removed.
    pub positional: Vec<Node<'t>>,
    pub destination: Option<Node<'t>>,
    pub payload: Option<Node<'t>>,
}

/// Recognizes `Navigator.m(ctx, ...)`, `Navigator.of(ctx).m(...)` and calls
/// to discovered helpers. Any other call yields `None`.
pub(crate) fn call_shape<'t, R: Resolver>(
    resolver: &R,
    helpers: &HelperSet,
    file: &SourceFile,
    call: &Call<'t>,
) -> Option<CallShape<'t>> {
    let callee = call.callee?;
    if matches!(callee.kind(), "member_expression" | "null_aware_member_expression") {
        let object = dart::unwrapped(callee.child_by_field_name("object")?);
        let method = call.method_name.as_deref()?;
        if object.kind() == "identifier" && file.node_text(&object) == NAVIGATOR {
            let kind = OperationKind::from_method(method)?;
            let mut positional = call.positional().map(|arg| arg.value);
            let context = positional.next();
            return Some(direct_shape(kind, context, positional.collect(), call));
        }
        if let Some(accessor) = Call::of(object, file).filter(|c| is_accessor(c, file)) {
            let kind = OperationKind::from_method(method)?;
            let context = accessor.positional().next().map(|arg| arg.value);
            let positional = call.positional().map(|arg| arg.value).collect();
            return Some(direct_shape(kind, context, positional, call));
        }
    }

    let handle = resolver.resolve_callable(file, callee)?;
    let helper = helpers.get(&handle)?;
    Some(CallShape {
        kind: OperationKind::NavigateByName,
        context: helper.context.as_ref().and_then(|p| p.select(call)),
        positional: call.positional().map(|arg| arg.value).collect(),
        destination: helper.destination.select(call),
        payload: helper.payload.as_ref().and_then(|p| p.select(call)),
    })
}

fn direct_shape<'t>(
    kind: OperationKind,
    context: Option<Node<'t>>,
    positional: Vec<Node<'t>>,
    call: &Call<'t>,
) -> CallShape<'t> {
    let destination = if kind.is_by_name() {
        positional.first().copied()
    } else {
        None
    };
    let payload = PAYLOAD_ARGS
        .iter()
        .find_map(|name| call.named(name))
        .map(|arg| arg.value);
    CallShape {
        kind,
        context,
        positional,
        destination,
        payload,
    }
}

fn is_accessor(call: &Call<'_>, file: &SourceFile) -> bool {
    let Some(callee) = call.callee.filter(|c| c.kind() == "member_expression") else {
        return false;
    };
    let is_navigator = callee
        .child_by_field_name("object")
        .is_some_and(|object| object.kind() == "identifier" && file.node_text(&object) == NAVIGATOR);
    is_navigator
        && call
            .method_name
            .as_deref()
            .is_some_and(|name| ACCESSORS.contains(&name))
}

/// Collects the navigation records of one file.
pub struct Classifier<'a, R: Resolver> {
    resolver: &'a R,
    helpers: &'a HelperSet,
    file: &'a SourceFile,
}

impl<'a, R: Resolver> Classifier<'a, R> {
    pub fn new(resolver: &'a R, helpers: &'a HelperSet, file: &'a SourceFile) -> Self {
        Self {
            resolver,
            helpers,
            file,
        }
    }

    pub fn classify(self) -> Vec<CallRecord> {
        let mut records = Vec::new();
        visit::walk(self.file.root_node(), |node| {
            if node.kind() != "call_expression" {
                return true;
            }
            if let Some(call) = Call::of(node, self.file) {
                if let Some(shape) = call_shape(self.resolver, self.helpers, self.file, &call) {
                    records.push(self.record(&shape, &call));
                }
            }
            true
        });
        records.sort_by_key(|r| r.location.as_ref().map(|l| l.offset));
        records
    }

    fn text(&self, node: Node<'_>) -> String {
        self.file.node_text(&node).to_string()
    }

    fn record(&self, shape: &CallShape<'_>, call: &Call<'_>) -> CallRecord {
        let span = Span::of(&call.node);
        let mut record = CallRecord {
            location: Some(SourceLocation {
                file: self.file.path.clone(),
                line: self.file.line_of(span.start),
                offset: span.start,
                length: span.len(),
            }),
            kind: shape.kind,
            destination: Destination::NotApplicable,
            destination_expr: None,
            target: None,
            type_args: call.type_args.map(|args| self.text(args)),
            payload: Payload::None,
            payload_type: None,
            map_literal: false,
            result: None,
            context: shape.context.map(|c| self.text(c)),
            source_text: SourceText::Call {
                text: self.text(call.node),
            },
        };

        if shape.kind.is_by_name() {
            self.fill_by_name(&mut record, shape, call);
        } else if shape.kind.is_by_widget() {
            self.fill_by_widget(&mut record, shape);
        } else if shape.kind != OperationKind::ConditionalPop {
            // popUntil's positional argument is a predicate, not a result
            record.result = shape.positional.first().map(|arg| self.text(*arg));
        }
        record
    }

    fn fill_by_name(&self, record: &mut CallRecord, shape: &CallShape<'_>, call: &Call<'_>) {
        record.destination = Destination::Unresolved;
        if let Some(dest) = shape.destination {
            record.destination_expr = Some(self.text(dest));
            if let Some(value) = self.resolver.constant_value(self.file, dest) {
                record.destination = match RoutePath::parse(&value) {
                    Ok(path) => Destination::Path(path),
                    Err(_) => Destination::Invalid(value),
                };
            }
        }
        if let Some(payload) = shape.payload {
            record.payload = Payload::Single(self.text(payload));
            record.map_literal = dart::is_map_literal(payload);
        }
        if shape.kind == OperationKind::PopThenNavigateByName {
            record.result = call.named("result").map(|arg| self.text(arg.value));
        }
    }

    fn fill_by_widget(&self, record: &mut CallRecord, shape: &CallShape<'_>) {
        let construction = match shape.positional.as_slice() {
            [route] => self.page_construction(*route),
            _ => None,
        };
        let Some(screen) = construction else {
            record.kind = OperationKind::Unresolved;
            record.destination = Destination::Unresolved;
            record.destination_expr = shape.positional.first().map(|arg| self.text(*arg));
            return;
        };
        let Some(type_name) = screen.type_name.clone() else {
            return;
        };

        record.destination = match RoutePath::from_type_name(&type_name) {
            Ok(path) => Destination::Path(path),
            Err(_) => Destination::Unresolved,
        };
        record.destination_expr = Some(self.text(screen.node));
        record.target = Some(Target {
            name: type_name.clone(),
            file: self.resolver.type_source(self.file, &type_name),
        });

        let fields: Vec<(String, String)> = screen
            .args
            .iter()
            .filter_map(|arg| {
                let name = arg.name.as_ref().filter(|n| n.as_str() != "key")?;
                Some((name.clone(), self.text(arg.value)))
            })
            .collect();
        let positional: Vec<Node> = screen.positional().map(|arg| arg.value).collect();
        record.payload = if !fields.is_empty() {
            Payload::Fields(fields)
        } else if let [only] = positional.as_slice() {
            record.payload_type = self.resolver.parameter_type(self.file, &type_name, 0);
            Payload::Single(self.text(*only))
        } else {
            Payload::None
        };
    }

    /// For `XPageRoute(builder: (..) => Screen(...))` returns the screen's
    /// construction.
    fn page_construction<'t>(&self, route: Node<'t>) -> Option<Call<'t>> {
        let route = Call::of(dart::unwrapped(route), self.file)?;
        if !route.type_name.as_deref()?.ends_with("PageRoute") {
            return None;
        }
        let builder = dart::unwrapped(route.named("builder")?.value);
        if builder.kind() != "function_expression" {
            return None;
        }
        let screen = dart::unwrapped(dart::returned_expr(builder)?);
        Call::of(screen, self.file).filter(|call| call.type_name.is_some())
    }
}
