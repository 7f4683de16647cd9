//! Project-wide name resolution and constant evaluation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tree_sitter::Node;

use super::dart::{self, Declared, StringPiece, Variable};
use super::SourceFile;

/// Identity of a declaration, comparable across files.
///
/// Names alone collide across files, so the defining file and the offset of
/// the declaration's name are part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementHandle {
    pub file: PathBuf,
    /// `name` for top-level functions, `Type.name` for members.
    pub name: String,
    pub offset: usize,
}

impl ElementHandle {
    pub fn new(file: impl Into<PathBuf>, name: impl Into<String>, offset: usize) -> Self {
        Self {
            file: file.into(),
            name: name.into(),
            offset,
        }
    }
}

/// Name resolution as seen from a file. The file need not be part of the
/// project index; its imports are followed either way.
pub trait Resolver {
    /// Compile-time string value of `expr` as it appears in `file`.
    fn constant_value(&self, file: &SourceFile, expr: Node<'_>) -> Option<String>;

    /// Declaration invoked by a call whose callee is `callee`.
    fn resolve_callable(&self, file: &SourceFile, callee: Node<'_>) -> Option<ElementHandle>;

    /// File that declares the class `name` visible from `file`.
    fn type_source(&self, file: &SourceFile, name: &str) -> Option<PathBuf>;

    /// Declared type of the `position`-th positional parameter of the
    /// unnamed constructor of class `name`.
    fn parameter_type(&self, file: &SourceFile, name: &str, position: usize) -> Option<String>;
}

#[derive(Debug, Default)]
struct FileSymbols {
    top_level: HashSet<String>,
    /// Resolved imports that are part of the project.
    imports: Vec<PathBuf>,
}

/// Index of every parsed project file.
pub struct ProjectIndex {
    root: PathBuf,
    package: Option<String>,
    files: BTreeMap<PathBuf, SourceFile>,
    symbols: HashMap<PathBuf, FileSymbols>,
}

type Seen = HashSet<(PathBuf, String)>;

impl ProjectIndex {
    /// Builds the index. `package` is the project's own package name, used
    /// to resolve `package:<package>/...` imports under `root/lib`.
    pub fn new(root: &Path, package: Option<&str>, files: Vec<SourceFile>) -> Self {
        let files: BTreeMap<PathBuf, SourceFile> = files
            .into_iter()
            .map(|mut file| {
                file.path = normalize_path(&file.path);
                (file.path.clone(), file)
            })
            .collect();

        let mut index = Self {
            root: root.to_path_buf(),
            package: package.map(str::to_string),
            files,
            symbols: HashMap::new(),
        };
        let symbols: HashMap<PathBuf, FileSymbols> = index
            .files
            .iter()
            .map(|(path, file)| {
                let table = FileSymbols {
                    top_level: dart::top_level(file)
                        .into_iter()
                        .map(|(name, _)| name)
                        .collect(),
                    imports: index.project_imports(file),
                };
                (path.clone(), table)
            })
            .collect();
        index.symbols = symbols;
        index
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn file(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(&normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn project_imports(&self, file: &SourceFile) -> Vec<PathBuf> {
        let from = normalize_path(&file.path);
        dart::imports(file)
            .iter()
            .filter_map(|import| {
                resolve_import(&self.root, self.package.as_deref(), &from, &import.uri)
            })
            .filter(|target| self.files.contains_key(target))
            .collect()
    }

    /// Same file first, then the files it imports.
    fn find_top_level<'a>(
        &'a self,
        file: &'a SourceFile,
        name: &str,
    ) -> Option<(&'a SourceFile, Declared<'a>)> {
        let path = normalize_path(&file.path);
        let imports = match self.symbols.get(&path) {
            Some(table) => table.imports.clone(),
            None => self.project_imports(file),
        };
        let imported = imports.iter().filter_map(|p| self.files.get(p)).filter(|source| {
            self.symbols
                .get(&source.path)
                .is_some_and(|table| table.top_level.contains(name))
        });
        std::iter::once(file).chain(imported).find_map(|source| {
            dart::top_level(source)
                .into_iter()
                .find(|(declared, _)| declared == name)
                .map(|(_, decl)| (source, decl))
        })
    }

    fn find_type<'a>(&'a self, file: &'a SourceFile, name: &str) -> Option<(&'a SourceFile, Node<'a>)> {
        match self.find_top_level(file, name)? {
            (source, Declared::Type(node)) => Some((source, node)),
            _ => None,
        }
    }

    fn eval(&self, file: &SourceFile, expr: Node<'_>, seen: &mut Seen) -> Option<String> {
        let expr = dart::unwrapped(expr);
        match expr.kind() {
            "string_literal" => {
                let mut value = String::new();
                for piece in dart::string_pieces(expr, file)? {
                    match piece {
                        StringPiece::Text(text) => value.push_str(&text),
                        StringPiece::Interpolation(inner) if inner.kind() == "identifier_dollar_escaped" => {
                            value.push_str(&self.eval_name(file, inner, seen)?)
                        }
                        StringPiece::Interpolation(inner) => {
                            value.push_str(&self.eval(file, inner, seen)?)
                        }
                    }
                }
                Some(value)
            }
            "additive_expression" => {
                let parts = dart::children(expr);
                let [lhs, op, rhs] = parts.as_slice() else {
                    return None;
                };
                if op.kind() != "+" {
                    return None;
                }
                let mut value = self.eval(file, *lhs, seen)?;
                value.push_str(&self.eval(file, *rhs, seen)?);
                Some(value)
            }
            "identifier" => self.eval_name(file, expr, seen),
            "member_expression" => {
                let object = dart::unwrapped(expr.child_by_field_name("object")?);
                let property = expr.child_by_field_name("property")?;
                if object.kind() != "identifier" {
                    return None;
                }
                let (source, owner) = self.find_type(file, file.node_text(&object))?;
                self.eval_static(source, owner, file.node_text(&property), seen)
            }
            _ => None,
        }
    }

    /// A bare name: static of the enclosing type, then top-level.
    fn eval_name(&self, file: &SourceFile, node: Node<'_>, seen: &mut Seen) -> Option<String> {
        let name = file.node_text(&node);
        if let Some(owner) = dart::enclosing_type(node) {
            if let Some(value) = self.eval_static(file, owner, name, seen) {
                return Some(value);
            }
        }
        match self.find_top_level(file, name)? {
            (source, Declared::Variable(var)) => self.eval_variable(source, name.to_string(), var, seen),
            _ => None,
        }
    }

    fn eval_static(
        &self,
        file: &SourceFile,
        owner: Node<'_>,
        name: &str,
        seen: &mut Seen,
    ) -> Option<String> {
        let type_name = dart::type_name(owner, file);
        dart::members(owner)
            .into_iter()
            .filter(|member| member.kind() == "declaration")
            .flat_map(dart::variables)
            .find(|var| var.is_static && file.node_text(&var.name) == name)
            .and_then(|var| self.eval_variable(file, format!("{}.{}", type_name, name), var, seen))
    }

    fn eval_variable(
        &self,
        file: &SourceFile,
        key: String,
        var: Variable<'_>,
        seen: &mut Seen,
    ) -> Option<String> {
        if !var.is_constant {
            return None;
        }
        let key = (normalize_path(&file.path), key);
        if !seen.insert(key.clone()) {
            return None;
        }
        let value = var.value.and_then(|init| self.eval(file, init, seen));
        seen.remove(&key);
        value
    }
}

impl Resolver for ProjectIndex {
    fn constant_value(&self, file: &SourceFile, expr: Node<'_>) -> Option<String> {
        self.eval(file, expr, &mut HashSet::new())
    }

    fn resolve_callable(&self, file: &SourceFile, callee: Node<'_>) -> Option<ElementHandle> {
        let callee = dart::unwrapped(callee);
        match callee.kind() {
            "identifier" => {
                let name = file.node_text(&callee);
                if let Some(owner) = dart::enclosing_type(callee) {
                    let method = dart::methods(owner, file)
                        .into_iter()
                        .find(|method| file.node_text(&method.name) == name);
                    if let Some(method) = method {
                        return Some(ElementHandle::new(
                            normalize_path(&file.path),
                            method.qualified_name,
                            method.name.start_byte(),
                        ));
                    }
                }
                match self.find_top_level(file, name)? {
                    (source, Declared::Function(function)) => Some(ElementHandle::new(
                        normalize_path(&source.path),
                        function.qualified_name,
                        function.name.start_byte(),
                    )),
                    _ => None,
                }
            }
            "member_expression" => {
                let object = dart::unwrapped(callee.child_by_field_name("object")?);
                let property = callee.child_by_field_name("property")?;
                let type_name = file.node_text(&object);
                if object.kind() != "identifier" || !dart::starts_upper(type_name) {
                    return None;
                }
                let name = file.node_text(&property);
                let (source, owner) = self.find_type(file, type_name)?;
                dart::methods(owner, source)
                    .into_iter()
                    .find(|method| method.is_static && source.node_text(&method.name) == name)
                    .map(|method| {
                        ElementHandle::new(
                            normalize_path(&source.path),
                            method.qualified_name,
                            method.name.start_byte(),
                        )
                    })
            }
            _ => None,
        }
    }

    fn type_source(&self, file: &SourceFile, name: &str) -> Option<PathBuf> {
        self.find_type(file, name)
            .map(|(source, _)| normalize_path(&source.path))
    }

    fn parameter_type(&self, file: &SourceFile, name: &str, position: usize) -> Option<String> {
        let (source, owner) = self.find_type(file, name)?;
        dart::constructor_param_type(owner, position, source)
    }
}

/// Maps an import URI to a project file path.
fn resolve_import(root: &Path, package: Option<&str>, from: &Path, uri: &str) -> Option<PathBuf> {
    if let Some(rest) = uri.strip_prefix("package:") {
        let (name, path) = rest.split_once('/')?;
        if Some(name) != package {
            return None;
        }
        return Some(normalize_path(&root.join("lib").join(path)));
    }
    if uri.contains(':') {
        return None;
    }
    let dir = from.parent()?;
    Some(normalize_path(&dir.join(uri)))
}

/// Lexically resolves `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(files: &[(&str, &str)]) -> ProjectIndex {
        let files = files
            .iter()
            .map(|(path, source)| SourceFile::parse(Path::new("/app").join(path), *source).unwrap())
            .collect();
        ProjectIndex::new(Path::new("/app"), Some("app"), files)
    }

    /// A file outside the index whose last top-level variable holds `expr`.
    fn expression_in(path: &str, prelude: &str, expr: &str) -> SourceFile {
        let source = format!("{}\nfinal value = {};\n", prelude, expr);
        SourceFile::parse(Path::new("/app").join(path), source).unwrap()
    }

    fn value(file: &SourceFile) -> Node<'_> {
        dart::top_level(file)
            .into_iter()
            .find_map(|(name, decl)| match decl {
                Declared::Variable(var) if name == "value" => var.value,
                _ => None,
            })
            .expect("initializer")
    }

    #[test]
    fn test_constant_string_literal() {
        let idx = index(&[]);
        let file = expression_in("lib/a.dart", "", "'/details'");
        assert_eq!(idx.constant_value(&file, value(&file)).as_deref(), Some("/details"));
    }

    #[test]
    fn test_constant_through_imports_and_statics() {
        let idx = index(&[(
            "lib/routes.dart",
            "const base = '/user';\nclass Routes {\n  static const profile = '$base/profile';\n  static const nested = '${Routes.profile}/edit';\n  static final loop = loop2;\n  static final loop2 = loop;\n}\n",
        )]);
        let prelude = "import 'package:app/routes.dart';";
        for (expr, expected) in [
            ("Routes.profile", Some("/user/profile")),
            ("Routes.nested", Some("/user/profile/edit")),
            ("base + '/x'", Some("/user/x")),
            ("Routes.loop", None),
        ] {
            let file = expression_in("lib/pages/home.dart", prelude, expr);
            assert_eq!(
                idx.constant_value(&file, value(&file)).as_deref(),
                expected,
                "{}",
                expr
            );
        }
    }

    #[test]
    fn test_non_constant_variable_is_unresolved() {
        let idx = index(&[]);
        let file = expression_in("lib/a.dart", "var route = '/x';", "route");
        assert_eq!(idx.constant_value(&file, value(&file)), None);
    }

    #[test]
    fn test_resolve_callable_prefers_same_file_and_distinguishes_files() {
        let idx = index(&[
            (
                "lib/a.dart",
                "import 'b.dart';\nvoid go(BuildContext c, String r) {}\nvoid main() {\n  go(c, '/');\n  other();\n  missing();\n}\n",
            ),
            ("lib/b.dart", "void go(BuildContext c, String r) {}\nvoid other() {}\n"),
        ]);
        let a = idx.file(Path::new("/app/lib/a.dart")).unwrap();
        let callees: Vec<Node> = crate::syntax::visit::descendants_of_kind(a.root_node(), "call_expression")
            .iter()
            .filter_map(|call| call.child_by_field_name("function"))
            .collect();

        let handle = idx.resolve_callable(a, callees[0]).expect("handle");
        assert_eq!(handle.file, PathBuf::from("/app/lib/a.dart"));
        let other = idx.resolve_callable(a, callees[1]).expect("imported");
        assert_eq!(other.file, PathBuf::from("/app/lib/b.dart"));
        assert_eq!(idx.resolve_callable(a, callees[2]), None);
    }

    #[test]
    fn test_resolve_static_method_and_type_source() {
        let idx = index(&[
            (
                "lib/nav.dart",
                "class Nav {\n  static void open(BuildContext c, String r) {}\n}\nclass HomeScreen {\n  const HomeScreen(this.id);\n  final int id;\n}\n",
            ),
            ("lib/main.dart", "import './nav.dart';\nvoid f(BuildContext c) => Nav.open(c, '/');\n"),
        ]);
        let main = idx.file(Path::new("/app/lib/main.dart")).unwrap();
        let call = crate::syntax::visit::descendants_of_kind(main.root_node(), "call_expression")[0];
        let handle = idx
            .resolve_callable(main, call.child_by_field_name("function").unwrap())
            .expect("static");
        assert_eq!(handle.name, "Nav.open");
        assert_eq!(
            idx.type_source(main, "HomeScreen"),
            Some(PathBuf::from("/app/lib/nav.dart"))
        );
        assert_eq!(idx.type_source(main, "Unknown"), None);
        assert_eq!(idx.parameter_type(main, "HomeScreen", 0).as_deref(), Some("int"));
    }

    #[test]
    fn test_file_outside_index_follows_its_imports() {
        let idx = index(&[("lib/routes.dart", "class Routes {\n  static const home = '/home';\n}\n")]);
        let config = expression_in(
            "lib/router/app_router.dart",
            "import '../routes.dart';",
            "Routes.home",
        );
        assert_eq!(idx.constant_value(&config, value(&config)).as_deref(), Some("/home"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/app/lib/pages/../routes.dart")),
            PathBuf::from("/app/lib/routes.dart")
        );
        assert_eq!(normalize_path(Path::new("a/./b")), PathBuf::from("a/b"));
    }
}
