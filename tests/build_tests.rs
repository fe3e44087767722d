//! Build integration tests
//!
//! End-to-end builds against built-in and on-disk templates, template
//! discovery tiers, and failures that must leave no output behind.

use std::fs;
use std::path::Path;

use serde_json::json;
use tempfile::TempDir;

use texsmith::build::REPORT_FILE;
use texsmith::document::parse_markdown;
use texsmith::{
    list_templates, load_template, locate_template, BuildAssembler, BuildOptions, CollectingSink, DiscoveryRoots,
    SlotDirective, TemplateTier, TexsmithError,
};

/// Scratch workspace with a project directory and a fake home.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("project")).unwrap();
        fs::create_dir_all(dir.path().join("home")).unwrap();
        Self { dir }
    }

    fn project(&self) -> std::path::PathBuf {
        self.dir.path().join("project")
    }

    fn home(&self) -> std::path::PathBuf {
        self.dir.path().join("home")
    }

    fn output(&self) -> std::path::PathBuf {
        self.dir.path().join("out")
    }

    fn roots(&self) -> DiscoveryRoots {
        DiscoveryRoots {
            cwd: self.project(),
            data_dir: Some(self.dir.path().join("data")),
            home: Some(self.home()),
            template_paths: Vec::new(),
        }
    }

    fn options(&self, template: &str) -> BuildOptions {
        BuildOptions {
            template: template.to_string(),
            output_dir: self.output(),
            roots: self.roots(),
            ..BuildOptions::default()
        }
    }
}

/// Write a minimal template with one default `body` slot at section level.
fn write_template(root: &Path, name: &str, marker: &str, extra_manifest: &str) {
    fs::create_dir_all(root).unwrap();
    fs::write(
        root.join("manifest.toml"),
        format!(
            "name = \"{name}\"\nentrypoint = \"{name}.tex\"\n{extra_manifest}\n[slots.body]\ndefault = true\ndepth = \"section\"\n"
        ),
    )
    .unwrap();
    fs::write(
        root.join(format!("{name}.tex")),
        format!("% {marker}\n\\VAR{{fragment_preamble}}\n\\VAR{{body}}"),
    )
    .unwrap();
}

fn write_fragment(template_root: &Path, name: &str, body: &str) {
    let dir = template_root.join("fragments").join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("fragment.toml"), body).unwrap();
}

// =============================================================================
// End-to-end
// =============================================================================

mod end_to_end_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_declared_title_keeps_headings_and_offsets_them() {
        let ws = Workspace::new();
        let document = parse_markdown("---\ntitle: Foo\n---\n## Section\n### Sub\n").unwrap();
        let sink = CollectingSink::new();
        let prepared = BuildAssembler::new(ws.options("article"))
            .prepare(&[document], &sink)
            .unwrap();

        assert_eq!(prepared.attributes.get("title"), Some(&json!("Foo")));
        assert_eq!(
            prepared.slots["mainmatter"],
            "\\section{Section}\\label{section}\n\n\\subsection{Sub}\\label{sub}\n\n"
        );
        assert!(prepared.main.contains("\\title{Foo}"));
        assert!(prepared.main.contains("\\section{Section}"));
        assert!(!ws.output().exists());
    }

    #[test]
    fn test_build_directory_contents() {
        let ws = Workspace::new();
        let document = parse_markdown(
            "---\ntitle: Links\npress:\n  paper: letter\n---\nSee [the site](https://example.org).\n",
        )
        .unwrap();
        let report = BuildAssembler::new(ws.options("article"))
            .build(&[document], &CollectingSink::new())
            .unwrap();

        assert_eq!(report.template, "article");
        assert_eq!(report.tier, TemplateTier::Builtin);
        assert_eq!(report.fragments, vec!["ts-geometry", "ts-links"]);

        let out = ws.output();
        let geometry = fs::read_to_string(out.join("ts-geometry.sty")).unwrap();
        assert!(geometry.contains("\\RequirePackage[letterpaper,margin=2.5cm]{geometry}"));
        assert!(fs::read_to_string(out.join("ts-links.sty")).unwrap().contains("urlcolor=blue"));

        let report_json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(REPORT_FILE)).unwrap()).unwrap();
        assert_eq!(report_json["template"], "article");
        assert_eq!(report_json["fragments"], json!(["ts-geometry", "ts-links"]));
    }

    #[test]
    fn test_book_front_matter_slot_directive() {
        let ws = Workspace::new();
        let document = parse_markdown(
            "---\ntitle: Manual\npress:\n  slot:\n    appendix: Extra\n---\n# Intro\n\nText.\n\n# Extra\n\nMore.\n",
        )
        .unwrap();
        let prepared = BuildAssembler::new(ws.options("book"))
            .prepare(&[document], &CollectingSink::new())
            .unwrap();

        assert!(prepared.slots["mainmatter"].starts_with("\\chapter{Intro}"));
        assert!(prepared.slots["appendix"].starts_with("\\chapter{Extra}"));
        assert!(prepared.main.contains("\\appendix\n\\chapter{Extra}"));
        assert!(prepared.main.contains("\\tableofcontents"));
    }

    #[test]
    fn test_cli_directive_overrides_front_matter_for_same_slot() {
        let ws = Workspace::new();
        let document = parse_markdown(
            "---\ntitle: T\npress:\n  slot:\n    abstract: Summary\n---\n## Summary\n\nA.\n\n## Abstract\n\nB.\n",
        )
        .unwrap();
        let mut options = ws.options("article");
        options.slot_directives = vec![SlotDirective::parse("abstract:Abstract").unwrap()];
        let sink = CollectingSink::new();
        let prepared = BuildAssembler::new(options).prepare(&[document], &sink).unwrap();

        assert_eq!(prepared.slots["abstract"], "B.\n\n");
        assert!(prepared.slots["mainmatter"].contains("\\section{Summary}"));
        assert!(sink.has_code("slot-directive-overridden"));
    }

    #[test]
    fn test_nested_press_title_disables_promotion() {
        let ws = Workspace::new();
        let document =
            parse_markdown("---\npress:\n  press:\n    title: Declared\n---\n# Heading Kept\n## Body\n").unwrap();
        let prepared = BuildAssembler::new(ws.options("article"))
            .prepare(&[document], &CollectingSink::new())
            .unwrap();

        assert_eq!(prepared.attributes.get("title"), Some(&json!("Declared")));
        assert!(prepared.slots["mainmatter"].contains("\\section{Heading Kept}"));
        assert!(prepared.slots["mainmatter"].contains("\\subsection{Body}"));
    }

    #[test]
    fn test_routed_slot_wins_over_same_named_front_matter() {
        let ws = Workspace::new();
        let document = parse_markdown(
            "---\ntitle: T\nabstract: short note\n---\n## Abstract\n\nRouted abstract body.\n\n## Intro\n\nText.\n",
        )
        .unwrap();
        let mut options = ws.options("article");
        options.slot_directives = vec![SlotDirective::parse("abstract:Abstract").unwrap()];
        let sink = CollectingSink::new();
        let prepared = BuildAssembler::new(options).prepare(&[document], &sink).unwrap();

        assert_eq!(prepared.slots["abstract"], "Routed abstract body.\n\n");
        assert!(prepared.main.contains("\\begin{abstract}\nRouted abstract body."));
        assert!(!prepared.main.contains("short note"));
        assert!(sink.has_code("slot-shadows-attribute"));
    }

    #[test]
    fn test_top_level_slot_name_is_the_slot_content() {
        let ws = Workspace::new();
        write_template(&ws.project().join("templates/memo"), "memo", "memo", "fragments = []\n");
        let document = parse_markdown("---\ntitle: M\nbody: oops\n---\n## Hello\n").unwrap();
        let sink = CollectingSink::new();
        let prepared = BuildAssembler::new(ws.options("memo"))
            .prepare(&[document], &sink)
            .unwrap();

        assert!(prepared.main.contains("\\section{Hello}"));
        assert!(!prepared.main.contains("oops"));
        assert!(sink.has_code("slot-shadows-attribute"));
    }

    #[test]
    fn test_unmatched_selector_warns() {
        let ws = Workspace::new();
        let document = parse_markdown("---\ntitle: T\n---\nBody.\n").unwrap();
        let mut options = ws.options("article");
        options.slot_directives = vec![SlotDirective::parse("abstract:#missing").unwrap()];
        let sink = CollectingSink::new();
        let prepared = BuildAssembler::new(options).prepare(&[document], &sink).unwrap();
        assert!(sink.has_code("slot-selector-unmatched"));
        assert_eq!(prepared.slots["mainmatter"], "Body.\n\n");
    }
}

// =============================================================================
// Fatal configuration errors
// =============================================================================

mod failure_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_template_and_fragment_claiming_title() {
        let ws = Workspace::new();
        let root = ws.project().join("templates/memo");
        write_template(
            &root,
            "memo",
            "memo",
            "fragments = [\"ts-title\"]\n[attributes.title]\ndefault = \"\"\n",
        );
        write_fragment(&root, "ts-title", "name = \"ts-title\"\n[attributes.title]\ndefault = \"Untitled\"\n");

        let document = parse_markdown("Body.\n").unwrap();
        let err = BuildAssembler::new(ws.options("memo"))
            .build(&[document], &CollectingSink::new())
            .unwrap_err();
        match err {
            TexsmithError::OwnerConflict { name, first, second } => {
                assert_eq!(name, "title");
                assert_eq!(first, "template 'memo'");
                assert_eq!(second, "fragment 'ts-title'");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!ws.output().exists());
    }

    #[test]
    fn test_two_fragments_overriding_bold() {
        let ws = Workspace::new();
        let root = ws.project().join("templates/memo");
        write_template(&root, "memo", "memo", "fragments = [\"ts-strong\", \"ts-heavy\"]\n");
        write_fragment(
            &root,
            "ts-strong",
            "name = \"ts-strong\"\n[partials]\nbold = '\\textbf{\\VAR{content}}'\n",
        );
        write_fragment(
            &root,
            "ts-heavy",
            "name = \"ts-heavy\"\n[partials]\nbold = '{\\bfseries \\VAR{content}}'\n",
        );

        let document = parse_markdown("**x**\n").unwrap();
        let err = BuildAssembler::new(ws.options("memo"))
            .build(&[document], &CollectingSink::new())
            .unwrap_err();
        match err {
            TexsmithError::PartialConflict { partial, providers } => {
                assert_eq!(partial, "bold");
                assert_eq!(providers, vec!["ts-strong", "ts-heavy"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!ws.output().exists());
    }

    #[test]
    fn test_required_partial_missing() {
        let ws = Workspace::new();
        let root = ws.project().join("templates/memo");
        write_template(&root, "memo", "memo", "fragments = []\nrequired_partials = [\"callout\"]\n");
        let err = BuildAssembler::new(ws.options("memo"))
            .build(&[parse_markdown("x\n").unwrap()], &CollectingSink::new())
            .unwrap_err();
        assert_eq!(err.code(), "missing-partial");
        assert!(!ws.output().exists());
    }

    #[test]
    fn test_unknown_template_names_tiers() {
        let ws = Workspace::new();
        let err = BuildAssembler::new(ws.options("nonexistent"))
            .build(&[parse_markdown("x\n").unwrap()], &CollectingSink::new())
            .unwrap_err();
        match err {
            TexsmithError::TemplateNotFound { name, searched } => {
                assert_eq!(name, "nonexistent");
                assert!(searched.iter().any(|s| s.contains("builtin")));
                assert!(searched.iter().any(|s| s.contains("home")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

// =============================================================================
// Discovery
// =============================================================================

mod discovery_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_local_tree_beats_home() {
        let ws = Workspace::new();
        write_template(&ws.project().join("templates/memo"), "memo", "LOCAL", "fragments = []\n");
        write_template(&ws.home().join(".texsmith/templates/memo"), "memo", "HOME", "fragments = []\n");

        let location = locate_template("memo", &ws.roots()).unwrap();
        assert_eq!(location.tier, TemplateTier::Local);
        let template = load_template(&location).unwrap();
        assert!(template.entrypoint_source.contains("LOCAL"));

        let prepared = BuildAssembler::new(ws.options("memo"))
            .prepare(&[parse_markdown("---\ntitle: M\n---\n## Hello\n").unwrap()], &CollectingSink::new())
            .unwrap();
        assert!(prepared.main.starts_with("% LOCAL"));
        assert!(prepared.main.contains("\\section{Hello}"));

        let listings = list_templates(&ws.roots());
        let memo: Vec<_> = listings.iter().filter(|l| l.name == "memo").collect();
        assert_eq!(memo.len(), 2);
        assert_eq!(memo[0].tier, TemplateTier::Local);
        assert!(!memo[0].shadowed);
        assert!(memo[1].shadowed);
    }

    #[test]
    fn test_home_template_used_when_no_local() {
        let ws = Workspace::new();
        write_template(&ws.home().join(".texsmith/templates/memo"), "memo", "HOME", "fragments = []\n");
        let location = locate_template("memo", &ws.roots()).unwrap();
        assert_eq!(location.tier, TemplateTier::Home);
    }

    #[test]
    fn test_explicit_path_bypasses_tiers() {
        let ws = Workspace::new();
        let elsewhere = ws.dir.path().join("elsewhere/memo");
        write_template(&elsewhere, "memo", "PATH", "fragments = []\n");
        write_template(&ws.project().join("templates/memo"), "memo", "LOCAL", "fragments = []\n");

        let location = locate_template(&elsewhere.display().to_string(), &ws.roots()).unwrap();
        assert_eq!(location.tier, TemplateTier::Path);
        assert!(load_template(&location).unwrap().entrypoint_source.contains("PATH"));
    }
}
