//! End-to-end migrations over throw-away Flutter projects.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use route_migrator::{EmitMode, Migrator, Mode, Settings, WarningKind};

const CONFIG: &str = "lib/router/app_router.dart";

fn create_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create directory");
    }
    let mut file = File::create(path).expect("Failed to create file");
    file.write_all(content.as_bytes())
        .expect("Failed to write file");
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).expect("Failed to read file")
}

/// Every file under `dir`, by relative path.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, String> {
    fn collect(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, String>) {
        for entry in fs::read_dir(dir).expect("Failed to read dir") {
            let path = entry.expect("Failed to read entry").path();
            if path.is_dir() {
                collect(root, &path, out);
            } else {
                let relative = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(relative, fs::read_to_string(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    collect(dir, dir, &mut out);
    out
}

fn run(dir: &Path, mode: Mode) -> route_migrator::MigrationReport {
    Migrator::new(dir, Settings::default())
        .expect("Failed to create migrator")
        .run(mode)
        .expect("Migration failed")
}

/// A small app exercising every supported shape.
fn shop_project() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let root = dir.path();
    create_file(root, "pubspec.yaml", "name: shop\ndependencies:\n  go_router: ^14.0.0\n");
    create_file(
        root,
        "lib/main.dart",
        r#"import 'package:flutter/material.dart';
import 'screens/settings.dart';
import 'nav.dart';

class HomeScreen extends StatelessWidget {
  const HomeScreen({super.key});

  @override
  Widget build(BuildContext context) {
    return Column(children: [
      TextButton(
        onPressed: () => Navigator.pushNamed(context, Routes.details, arguments: {'id': 7}),
        child: const Text('Details'),
      ),
      TextButton(
        onPressed: () => Navigator.of(context).push(
          MaterialPageRoute(builder: (_) => SettingsScreen(userId: 'u1')),
        ),
        child: const Text('Settings'),
      ),
      TextButton(
        onPressed: () => openShop(context, '/shop/cart'),
        child: const Text('Cart'),
      ),
      TextButton(onPressed: () => Navigator.maybePop(context), child: const Text('Back')),
      TextButton(onPressed: () => Navigator.pop(context, 'done'), child: const Text('Done')),
    ]);
  }
}

class Routes {
  static const details = '/details';
}
"#,
    );
    create_file(
        root,
        "lib/nav.dart",
        r#"import 'package:flutter/material.dart';

void openShop(BuildContext context, String route) {
  Navigator.pushNamed(context, route);
}
"#,
    );
    create_file(
        root,
        "lib/screens/settings.dart",
        r#"import 'package:flutter/material.dart';

class SettingsScreen extends StatelessWidget {
  const SettingsScreen({super.key, required this.userId});

  final String userId;

  @override
  Widget build(BuildContext context) => Text(userId);
}
"#,
    );
    dir
}

// ============================================================================
// Scenarios
// ============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn test_single_map_payload_call_without_config() {
        let dir = TempDir::new().unwrap();
        create_file(
            dir.path(),
            "lib/main.dart",
            "import 'package:flutter/material.dart';\n\nvoid open(BuildContext context) {\n  Navigator.pushNamed(context, '/details', arguments: {'id': 1});\n}\n",
        );

        let report = run(dir.path(), Mode::Apply);
        assert_eq!(report.emission, EmitMode::Fresh);
        assert_eq!(report.routes, vec!["/details"]);

        let config = read(dir.path(), CONFIG);
        assert!(config.starts_with("// GENERATED BY route-migrator"));
        assert_eq!(config.matches("GoRoute(").count(), 1);
        assert!(config.contains("path: '/details',"));
        assert!(config.contains("final extra = state.extra as Map<String, dynamic>;"));

        let main = read(dir.path(), "lib/main.dart");
        assert!(main.contains("context.push('/details', extra: {'id': 1});"));
        assert!(main.contains("import 'package:go_router/go_router.dart';"));
    }

    #[test]
    fn test_custom_route_without_calls_is_retained() {
        let dir = TempDir::new().unwrap();
        let legacy = "GoRoute(\n      path: '/legacy',\n      builder: (context, state) => const LegacyPage(title: 'Old [beta]'),\n    )";
        let existing = format!(
            "// Hand-maintained routes.\nimport 'package:flutter/material.dart';\nimport 'package:go_router/go_router.dart';\n\nfinal GoRouter appRouter = GoRouter(\n  initialLocation: '/legacy',\n  routes: <RouteBase>[\n    {},\n  ],\n);\n",
            legacy
        );
        create_file(dir.path(), CONFIG, &existing);
        create_file(
            dir.path(),
            "lib/home.dart",
            "void go(BuildContext context) => Navigator.pushNamed(context, '/home');\n",
        );

        let report = run(dir.path(), Mode::Apply);
        assert_eq!(report.emission, EmitMode::Patch);
        assert_eq!(report.retained_routes, 1);
        assert_eq!(report.routes, vec!["/home", "/legacy"]);

        let config = read(dir.path(), CONFIG);
        assert!(config.contains(legacy));
        assert!(config.starts_with("// Hand-maintained routes.\n"));
        assert!(config.contains("initialLocation: '/legacy',"));
        assert!(config.contains("path: '/home',"));
    }

    #[test]
    fn test_existing_declaration_wins_over_fresh_call() {
        let dir = TempDir::new().unwrap();
        let legacy = "GoRoute(\n      path: '/legacy',\n      builder: (context, state) => LegacyPage(mode: state.uri.queryParameters['mode']),\n    )";
        let existing = format!(
            "import 'package:flutter/material.dart';\nimport 'package:go_router/go_router.dart';\n\nfinal GoRouter appRouter = GoRouter(\n  routes: <RouteBase>[\n    {},\n  ],\n);\n",
            legacy
        );
        create_file(dir.path(), CONFIG, &existing);
        create_file(
            dir.path(),
            "lib/main.dart",
            "void open(BuildContext context) {\n  Navigator.pushNamed(context, '/legacy', arguments: {'mode': 'new'});\n}\n",
        );

        let report = run(dir.path(), Mode::Apply);
        assert_eq!(report.emission, EmitMode::Patch);
        assert_eq!(report.routes, vec!["/legacy"]);
        assert_eq!(report.retained_routes, 0);

        let config = read(dir.path(), CONFIG);
        assert_eq!(config.matches(legacy).count(), 1);
        assert_eq!(config.matches("path: '/legacy'").count(), 1);
        assert!(!config.contains("state.extra"));
        assert!(read(dir.path(), "lib/main.dart")
            .contains("context.push('/legacy', extra: {'mode': 'new'});"));
    }

    const NAMED_ROUTE_CONFIG: &str = r#"import 'package:flutter/material.dart';
import 'package:go_router/go_router.dart';
import '../routes.dart';

final GoRouter appRouter = GoRouter(
  routes: <RouteBase>[
    GoRoute(
      path: Routes.home,
      builder: (context, state) => const HomeScreen(),
      routes: [
        GoRoute(path: 'item', builder: (context, state) => const ItemScreen()),
      ],
    ),
  ],
);
"#;

    const NAMED_ROUTE: &str = "GoRoute(\n      path: Routes.home,\n      builder: (context, state) => const HomeScreen(),\n      routes: [\n        GoRoute(path: 'item', builder: (context, state) => const ItemScreen()),\n      ],\n    )";

    fn named_route_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "pubspec.yaml", "name: shop\n");
        create_file(dir.path(), CONFIG, NAMED_ROUTE_CONFIG);
        create_file(
            dir.path(),
            "lib/cart.dart",
            "void openCart(BuildContext context) => Navigator.pushNamed(context, '/cart');\n",
        );
        dir
    }

    #[test]
    fn test_route_with_unknown_path_is_kept_as_written() {
        let dir = named_route_project();

        let report = run(dir.path(), Mode::Apply);
        assert_eq!(report.emission, EmitMode::Patch);
        assert_eq!(report.routes, vec!["/cart"]);
        let warning = report
            .warnings
            .iter()
            .find(|w| w.kind == WarningKind::ConfigRead)
            .expect("opaque route warning");
        assert_eq!(warning.line, Some(7));
        assert!(warning.message.contains("Routes.home"));

        let config = read(dir.path(), CONFIG);
        assert_eq!(config.matches(NAMED_ROUTE).count(), 1);
        assert_eq!(config.matches("path: 'item'").count(), 1);
        assert!(!config.contains("'/item'"));
        assert!(config.contains("path: '/cart',"));

        let again = run(dir.path(), Mode::Apply);
        assert!(!again.config_changed);
    }

    #[test]
    fn test_route_path_constant_is_resolved() {
        let dir = named_route_project();
        create_file(
            dir.path(),
            "lib/routes.dart",
            "class Routes {\n  static const home = '/home';\n}\n",
        );

        let report = run(dir.path(), Mode::Apply);
        assert_eq!(report.routes, vec!["/cart", "/home", "/home/item"]);
        assert!(!report.warnings.iter().any(|w| w.kind == WarningKind::ConfigRead));

        let config = read(dir.path(), CONFIG);
        assert_eq!(config.matches(NAMED_ROUTE).count(), 1);
        assert_eq!(config.matches("path: 'item'").count(), 1);
        assert!(config.contains("path: '/cart',"));
    }

    #[test]
    fn test_local_variable_destination_stays_out_of_config() {
        let dir = TempDir::new().unwrap();
        create_file(
            dir.path(),
            "lib/main.dart",
            "void open(BuildContext context, bool admin) {\n  final target = admin ? '/admin' : '/user';\n  Navigator.pushNamed(context, target);\n  Navigator.pushNamed(context, '/about');\n}\n",
        );

        let report = run(dir.path(), Mode::Apply);
        assert_eq!(report.routes, vec!["/about"]);
        let calls = &report.files[0].calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].destination, "<unresolved>");
        assert_eq!(calls[0].expression, "target");
        assert!(report
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::UnresolvedDestination && w.line == Some(3)));

        let config = read(dir.path(), CONFIG);
        assert!(!config.contains("admin"));
        let main = read(dir.path(), "lib/main.dart");
        assert!(main.contains(
            "/* MIGRATION-REQUIRED(navigate-by-name) */ Navigator.pushNamed(context, target);"
        ));
        assert!(main.contains("context.push('/about');"));
    }
}

// ============================================================================
// Whole-project behavior
// ============================================================================

mod project {
    use super::*;

    #[test]
    fn test_apply_rewrites_every_supported_shape() {
        let dir = shop_project();
        let report = run(dir.path(), Mode::Apply);
        assert_eq!(
            report.routes,
            vec!["/details", "/settings-screen", "/shop/cart"]
        );

        let main = read(dir.path(), "lib/main.dart");
        assert!(main.contains("context.push('/details', extra: {'id': 7})"));
        assert!(main.contains("context.push('/settings-screen', extra: {'userId': 'u1'})"));
        assert!(main.contains("context.push('/shop/cart')"));
        assert!(main.contains("/* MIGRATION-REQUIRED(maybe-pop) */ Navigator.maybePop(context)"));
        assert!(main.contains("context.pop('done')"));
        assert_eq!(main.matches("import 'package:go_router/go_router.dart';").count(), 1);

        let config = read(dir.path(), CONFIG);
        assert!(config.contains("import 'package:shop/screens/settings.dart';"));
        assert!(config.contains("return SettingsScreen(userId: args['userId']);"));
        assert!(config.contains("path: '/shop',"));
        assert!(config.contains("path: 'cart',"));
    }

    #[test]
    fn test_second_apply_changes_nothing() {
        let dir = shop_project();
        run(dir.path(), Mode::Apply);
        let first = snapshot(dir.path());

        let report = run(dir.path(), Mode::Apply);
        assert!(!report.config_changed);
        assert_eq!(report.emission, EmitMode::Patch);
        assert_eq!(snapshot(dir.path()), first);
    }

    #[test]
    fn test_plan_does_not_touch_files() {
        let dir = shop_project();
        let before = snapshot(dir.path());

        let report = run(dir.path(), Mode::Plan);
        assert!(report.config_changed);
        assert!(report.diff_count() > 0);
        assert_eq!(snapshot(dir.path()), before);

        let main = report
            .files
            .iter()
            .find(|f| f.path == Path::new("lib/main.dart"))
            .expect("main.dart in report");
        assert!(main
            .diffs
            .iter()
            .any(|d| d.original.starts_with("Navigator.pushNamed(context, Routes.details")));
    }

    #[test]
    fn test_helper_calls_resolve_across_files() {
        let dir = shop_project();
        let report = run(dir.path(), Mode::Plan);
        let main = report
            .files
            .iter()
            .find(|f| f.path == Path::new("lib/main.dart"))
            .unwrap();
        assert!(main
            .calls
            .iter()
            .any(|c| c.destination == "/shop/cart" && c.expression == "'/shop/cart'"));

        // The helper's own call has a parameter as destination.
        let nav = report
            .files
            .iter()
            .find(|f| f.path == Path::new("lib/nav.dart"))
            .unwrap();
        assert_eq!(nav.calls[0].destination, "<unresolved>");
    }

    #[test]
    fn test_unrecognized_config_is_regenerated() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "pubspec.yaml", "name: shop\n");
        create_file(
            dir.path(),
            CONFIG,
            "import 'package:shop/old.dart';\n\nfinal names = <String>['/a'];\n",
        );
        create_file(
            dir.path(),
            "lib/main.dart",
            "void f(BuildContext c) => Navigator.pushReplacementNamed(c, '/login');\n",
        );

        let report = run(dir.path(), Mode::Apply);
        assert_eq!(report.emission, EmitMode::Fresh);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::MissingRouteList));

        let config = read(dir.path(), CONFIG);
        assert!(config.contains("import 'package:shop/old.dart';"));
        assert!(config.contains("path: '/login',"));
        assert!(read(dir.path(), "lib/main.dart").contains("c.pushReplacement('/login')"));
    }
}
