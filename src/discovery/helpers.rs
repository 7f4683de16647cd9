//! Helper (wrapper function) discovery.
//!
//! A helper is a project function whose body makes exactly one
//! navigate-by-name call, with the route name taken straight from one of its
//! own parameters:
//!
//! ```dart
//! void goTo(BuildContext context, String route) {
//!   Navigator.pushNamed(context, route);
//! }
//! ```

use std::collections::HashMap;

use serde::Serialize;
use tree_sitter::Node;

use crate::model::OperationKind;
use crate::syntax::dart::{self, Argument, Call, Function, Param};
use crate::syntax::{visit, ElementHandle, Resolver, SourceFile};

use super::classifier::call_shape;

pub type HelperSet = HashMap<ElementHandle, HelperDefinition>;

/// A helper parameter, addressable from a call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamRef {
    /// Zero-based index among all parameters.
    pub index: usize,
    /// Index among positional parameters only.
    pub position: usize,
    pub name: String,
    pub named: bool,
}

impl ParamRef {
    fn of(params: &[Param], name: &str) -> Option<Self> {
        let index = params.iter().position(|p| p.name == name)?;
        let param = &params[index];
        let position = params[..index].iter().filter(|p| !p.named).count();
        Some(Self {
            index,
            position,
            name: param.name.clone(),
            named: param.named,
        })
    }

    /// The argument bound to this parameter at `call`.
    pub fn select<'t>(&self, call: &Call<'t>) -> Option<Node<'t>> {
        let arg: Option<&Argument<'t>> = if self.named {
            call.named(&self.name)
        } else {
            call.positional().nth(self.position)
        };
        arg.map(|a| a.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelperDefinition {
    pub handle: ElementHandle,
    /// Parameter supplying the route name.
    pub destination: ParamRef,
    /// Parameter supplying the `BuildContext`, when forwarded as-is.
    pub context: Option<ParamRef>,
    /// Parameter supplying the route arguments, when forwarded as-is.
    pub payload: Option<ParamRef>,
}

/// Discovers the helpers declared in `file`, given the helpers already known.
/// Top-level functions and members of classes, mixins, enums and extensions
/// (named or not) are inspected.
pub fn discover_in_file<R: Resolver>(
    resolver: &R,
    known: &HelperSet,
    file: &SourceFile,
) -> Vec<HelperDefinition> {
    dart::functions(file)
        .iter()
        .filter_map(|func| inspect(resolver, known, file, func))
        .collect()
}

fn inspect<R: Resolver>(
    resolver: &R,
    known: &HelperSet,
    file: &SourceFile,
    func: &Function<'_>,
) -> Option<HelperDefinition> {
    // Navigate-by-name calls, direct or through known helpers.
    let mut calls = Vec::new();
    visit::walk(func.body, |node| {
        if node.kind() == "call_expression" {
            if let Some(call) = Call::of(node, file) {
                let is_navigation = call_shape(resolver, known, file, &call)
                    .is_some_and(|shape| shape.kind == OperationKind::NavigateByName);
                if is_navigation {
                    calls.push(call);
                }
            }
        }
        true
    });

    let [call] = calls.as_slice() else {
        return None;
    };
    let shape = call_shape(resolver, known, file, call)?;
    let as_param = |node: Option<Node<'_>>| {
        node.map(dart::unwrapped)
            .filter(|n| n.kind() == "identifier")
            .and_then(|n| ParamRef::of(&func.params, file.node_text(&n)))
    };

    let destination = as_param(shape.destination)?;
    Some(HelperDefinition {
        handle: ElementHandle::new(
            file.path(),
            func.qualified_name.clone(),
            func.name.start_byte(),
        ),
        destination,
        context: as_param(shape.context),
        payload: as_param(shape.payload),
    })
}
