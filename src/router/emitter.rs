//! Renders a route tree as a `go_router` configuration, either as a whole
//! new file or as a patch of an existing file's route list.

use std::collections::BTreeSet;
use std::path::{Component, Path};

use serde::Serialize;

use crate::edit::{insert_imports, single_quoted};
use crate::model::{CallRecord, Payload, RoutePath};
use crate::syntax::dart::{self, Call};
use crate::syntax::{visit, SourceFile};

use super::reader::ImportedConfig;
use super::tree::{RouteNode, RouteTree};

pub const HEADER: &str =
    "// GENERATED BY route-migrator. Hand edits to individual GoRoute entries are kept on regeneration.";

pub const FLUTTER_IMPORT: &str = "package:flutter/material.dart";
pub const GO_ROUTER_IMPORT: &str = "package:go_router/go_router.dart";

/// Indentation of entries in the top-level route list.
const TOP_INDENT: usize = 4;

/// Router construction whose `routes` list is patched.
const ROUTER_TYPE: &str = "GoRouter";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmitMode {
    Fresh,
    Patch,
}

impl EmitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmitMode::Fresh => "fresh",
            EmitMode::Patch => "patch",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Emission {
    pub text: String,
    pub mode: EmitMode,
    /// An existing file had no recognizable route list and was regenerated.
    pub fell_back: bool,
}

pub struct Emitter<'a> {
    root: &'a Path,
    config_path: &'a Path,
    package: Option<&'a str>,
    router_name: &'a str,
    marker: &'a str,
}

impl<'a> Emitter<'a> {
    pub fn new(root: &'a Path, config_path: &'a Path) -> Self {
        Self {
            root,
            config_path,
            package: None,
            router_name: "appRouter",
            marker: "MIGRATION-REQUIRED",
        }
    }

    pub fn with_package(mut self, package: Option<&'a str>) -> Self {
        self.package = package;
        self
    }

    pub fn with_router_name(mut self, name: &'a str) -> Self {
        self.router_name = name;
        self
    }

    pub fn with_marker(mut self, marker: &'a str) -> Self {
        self.marker = marker;
        self
    }

    /// Renders the configuration. An existing file is patched in place when
    /// its route list can be located, and regenerated otherwise.
    pub fn emit(
        &self,
        tree: &RouteTree,
        existing: Option<(&SourceFile, &ImportedConfig)>,
    ) -> Emission {
        match existing {
            None => Emission {
                text: self.render_fresh(tree, None),
                mode: EmitMode::Fresh,
                fell_back: false,
            },
            Some((file, config)) => match self.patch(file, tree, config) {
                Some(text) => Emission {
                    text,
                    mode: EmitMode::Patch,
                    fell_back: false,
                },
                None => Emission {
                    text: self.render_fresh(tree, Some(config)),
                    mode: EmitMode::Fresh,
                    fell_back: true,
                },
            },
        }
    }

    /// Whole configuration file. Imports and opaque routes of a replaced
    /// configuration are carried over.
    pub fn render_fresh(&self, tree: &RouteTree, carried: Option<&ImportedConfig>) -> String {
        let mut imports: BTreeSet<String> = self.required_imports(tree).into_iter().collect();
        let mut entries = self.route_entries(tree);
        if let Some(config) = carried {
            imports.extend(config.imports.iter().cloned());
            entries.extend(config.opaque.iter().map(|route| route.text.clone()));
        }

        let mut out = String::new();
        out.push_str(HEADER);
        out.push_str("\n\n");
        for uri in &imports {
            out.push_str(&format!("import '{}';\n", uri));
        }
        out.push('\n');
        out.push_str(&format!(
            "final GoRouter {} = GoRouter(\n  routes: <RouteBase>[{}],\n);\n",
            self.router_name,
            list_interior(&entries)
        ));
        out
    }

    /// Replaces only the interior of the existing route list and adds any
    /// missing imports. Opaque routes stay as written. `None` when no route
    /// list is found.
    pub fn patch(
        &self,
        file: &SourceFile,
        tree: &RouteTree,
        config: &ImportedConfig,
    ) -> Option<String> {
        let (open, close) = route_list_bounds(file)?;
        let existing = file.source.as_str();
        let mut entries = self.route_entries(tree);
        entries.extend(config.opaque.iter().map(|route| route.text.clone()));

        let mut text = String::with_capacity(existing.len());
        text.push_str(&existing[..=open]);
        text.push_str(&list_interior(&entries));
        text.push_str(&existing[close..]);
        insert_imports(&text, &self.required_imports(tree)).ok()
    }

    /// Top-level route declarations, in emission order.
    pub fn route_entries(&self, tree: &RouteTree) -> Vec<String> {
        let root = RoutePath::root();
        let mut out = Vec::new();
        let root_verbatim = match &tree.root.record {
            Some(record) => match record.verbatim() {
                Some(text) => {
                    out.push(text.to_string());
                    true
                }
                None => {
                    out.push(self.declaration(Some(record), "/", &root, TOP_INDENT, Vec::new()));
                    false
                }
            },
            None => false,
        };

        if root_verbatim {
            self.beneath_verbatim(&tree.root, &root, &mut out);
        } else {
            for child in tree.root.children.values() {
                if let Ok(path) = root.join(&child.segment) {
                    self.place_top_level(child, &path, &mut out);
                }
            }
        }
        out
    }

    /// Base imports plus one import per synthesized target's file, sorted.
    pub fn required_imports(&self, tree: &RouteTree) -> Vec<String> {
        let mut imports = BTreeSet::new();
        imports.insert(FLUTTER_IMPORT.to_string());
        imports.insert(GO_ROUTER_IMPORT.to_string());
        collect_target_imports(&tree.root, &mut |file| {
            if let Some(uri) = self.import_uri(file) {
                imports.insert(uri);
            }
        });
        imports.into_iter().collect()
    }

    fn import_uri(&self, file: &Path) -> Option<String> {
        if file == self.config_path {
            return None;
        }
        if let Some(package) = self.package {
            if let Ok(relative) = file.strip_prefix(self.root.join("lib")) {
                return Some(format!("package:{}/{}", package, slash_path(relative)));
            }
        }
        relative_uri(self.config_path.parent()?, file)
    }

    /// Places `node` at the top of the route list: verbatim text as-is,
    /// otherwise a synthesized declaration with an absolute path.
    fn place_top_level(&self, node: &RouteNode, path: &RoutePath, out: &mut Vec<String>) {
        if let Some(text) = node.record.as_ref().and_then(|r| r.verbatim()) {
            out.push(text.to_string());
            self.beneath_verbatim(node, path, out);
            return;
        }
        let mut hoisted = Vec::new();
        if let Some(decl) = self.synthesize(node, path.as_str(), path, TOP_INDENT, &mut hoisted) {
            out.push(decl);
        }
        out.extend(hoisted);
    }

    /// Descendants of a verbatim node. Those read from its own `routes`
    /// list are already part of its text; everything else is hoisted.
    fn beneath_verbatim(&self, node: &RouteNode, path: &RoutePath, out: &mut Vec<String>) {
        for child in node.children.values() {
            let Ok(child_path) = path.join(&child.segment) else {
                continue;
            };
            match &child.record {
                Some(record) if !record.is_nested_declaration() => {
                    self.place_top_level(child, &child_path, out)
                }
                _ => self.beneath_verbatim(child, &child_path, out),
            }
        }
    }

    /// Synthesized declaration for `node` and its synthesized descendants.
    /// Verbatim descendants go to `hoisted`. Returns `None` for an
    /// intermediate node left without children.
    fn synthesize(
        &self,
        node: &RouteNode,
        path_text: &str,
        path: &RoutePath,
        indent: usize,
        hoisted: &mut Vec<String>,
    ) -> Option<String> {
        let mut children = Vec::new();
        for child in node.children.values() {
            let Ok(child_path) = path.join(&child.segment) else {
                continue;
            };
            if child.record.as_ref().is_some_and(|r| r.verbatim().is_some()) {
                self.place_top_level(child, &child_path, hoisted);
            } else if let Some(text) =
                self.synthesize(child, &child.segment, &child_path, indent + 4, hoisted)
            {
                children.push(text);
            }
        }
        if node.record.is_none() && children.is_empty() {
            return None;
        }
        Some(self.declaration(node.record.as_ref(), path_text, path, indent, children))
    }

    fn declaration(
        &self,
        record: Option<&CallRecord>,
        path_text: &str,
        path: &RoutePath,
        indent: usize,
        children: Vec<String>,
    ) -> String {
        let pad = " ".repeat(indent);
        let inner = " ".repeat(indent + 2);
        let mut out = String::from("GoRoute(\n");
        out.push_str(&format!("{}path: {},\n", inner, single_quoted(path_text)));
        out.push_str(&self.builder(record, path, &inner));
        if !children.is_empty() {
            out.push_str(&format!("{}routes: <RouteBase>[\n", inner));
            for child in children {
                out.push_str(&format!("{}  {},\n", inner, child));
            }
            out.push_str(&format!("{}],\n", inner));
        }
        out.push_str(&pad);
        out.push(')');
        out
    }

    fn builder(&self, record: Option<&CallRecord>, path: &RoutePath, inner: &str) -> String {
        let Some(record) = record else {
            return format!(
                "{}builder: (context, state) => const Placeholder(/* {}: shell for '{}' */),\n",
                inner, self.marker, path
            );
        };
        let target = record.target.as_ref().map(|t| t.name.as_str());
        let placeholder = |what: &str| {
            format!(
                "const Placeholder(/* {}: {} for '{}' */)",
                self.marker, what, path
            )
        };

        match (&record.payload, target) {
            (Payload::None, Some(target)) => {
                format!("{}builder: (context, state) => {}(),\n", inner, target)
            }
            (Payload::None, None) => format!(
                "{}builder: (context, state) => {},\n",
                inner,
                placeholder("screen")
            ),
            (Payload::Single(_), target) => {
                let cast = match &record.payload_type {
                    Some(ty) => ty.as_str(),
                    None if record.map_literal => "Map<String, dynamic>",
                    None => "dynamic",
                };
                let built = match target {
                    Some(target) => format!("{}(extra)", target),
                    None => placeholder("screen taking extra"),
                };
                format!(
                    "{i}builder: (context, state) {{\n{i}  final extra = state.extra as {cast};\n{i}  return {built};\n{i}}},\n",
                    i = inner,
                    cast = cast,
                    built = built
                )
            }
            (Payload::Fields(fields), Some(target)) => {
                let args: Vec<String> = fields
                    .iter()
                    .map(|(name, _)| format!("{}: args['{}']", name, name))
                    .collect();
                format!(
                    "{i}builder: (context, state) {{\n{i}  final args = state.extra as Map<String, dynamic>;\n{i}  return {t}({a});\n{i}}},\n",
                    i = inner,
                    t = target,
                    a = args.join(", ")
                )
            }
            (Payload::Fields(_), None) => format!(
                "{}builder: (context, state) => {},\n",
                inner,
                placeholder("screen taking extra fields")
            ),
        }
    }
}

fn collect_target_imports(node: &RouteNode, sink: &mut dyn FnMut(&Path)) {
    if let Some(record) = &node.record {
        if record.verbatim().is_none() {
            if let Some(file) = record.target.as_ref().and_then(|t| t.file.as_deref()) {
                sink(file);
            }
        }
    }
    for child in node.children.values() {
        collect_target_imports(child, sink);
    }
}

fn list_interior(entries: &[String]) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n");
    for entry in entries {
        out.push_str(&" ".repeat(TOP_INDENT));
        out.push_str(entry);
        out.push_str(",\n");
    }
    out.push_str("  ");
    out
}

/// Byte offsets of the route list's `[` and its matching `]`, taken from
/// the first `GoRouter(routes: [...])` in the file.
pub fn route_list_bounds(file: &SourceFile) -> Option<(usize, usize)> {
    let mut list = None;
    visit::walk(file.root_node(), |node| {
        if list.is_some() {
            return false;
        }
        if let Some(routes) = Call::of(node, file)
            .filter(|call| call.type_name.as_deref() == Some(ROUTER_TYPE))
            .and_then(|call| call.named("routes").map(|arg| dart::unwrapped(arg.value)))
            .filter(|value| value.kind() == "list_literal")
        {
            list = Some(routes);
            return false;
        }
        true
    });

    let tokens = dart::children(list?);
    let open = tokens.iter().find(|token| token.kind() == "[")?;
    let close = tokens
        .iter()
        .rev()
        .find(|token| token.kind() == "]" && !token.is_missing())?;
    Some((open.start_byte(), close.start_byte()))
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// `to` relative to the directory `from`, `/`-separated.
fn relative_uri(from: &Path, to: &Path) -> Option<String> {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    if common == 0 {
        return None;
    }
    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    Some(parts.join("/"))
}
