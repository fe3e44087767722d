//! Resolution integration tests
//!
//! Attribute precedence, slot routing, heading offsets and partial
//! resolution exercised through the public API.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use texsmith::attributes::normalisers;
use texsmith::document::parse_markdown;
use texsmith::fragments::FragmentSet;
use texsmith::headings::OffsetPlan;
use texsmith::slots::SlotDeclaration;
use texsmith::templates::{builtin, ComponentRoot};
use texsmith::{
    AttributeDeclaration, AttributeOwner, AttributeRegistry, AttributeResolver, CollectingSink, Document,
    LoadedTemplate, NullSink, PartialResolver, SlotDirective, SlotRouter, SlotSet, TemplateTier, TexsmithError,
    ValueOrigin,
};

fn builtin_template(name: &str) -> LoadedTemplate {
    LoadedTemplate::load(
        ComponentRoot::Builtin(builtin::template(name).unwrap()),
        TemplateTier::Builtin,
    )
    .unwrap()
}

/// Registry of the article template plus its default fragments.
fn article_registry() -> AttributeRegistry {
    let template = builtin_template("article");
    let fragments = FragmentSet::load(&template.manifest.fragments, &template).unwrap();
    let mut registry = AttributeRegistry::new();
    registry
        .register_component(&template.owner(), &template.manifest.attributes, &IndexMap::new())
        .unwrap();
    fragments.register_attributes(&mut registry).unwrap();
    registry
}

fn template_owner() -> AttributeOwner {
    AttributeOwner::Template("memo".to_string())
}

// =============================================================================
// Slot sets
// =============================================================================

mod slot_set_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_templates_have_exactly_one_default() {
        for name in builtin::template_names() {
            let template = builtin_template(name);
            let defaults = template.slots.iter().filter(|slot| slot.default).count();
            assert_eq!(defaults, 1, "{name}");
        }
    }

    #[test]
    fn test_implicit_mainmatter_default() {
        let slots = SlotSet::new(vec![SlotDeclaration::new("abstract", 1).stripping_heading()]).unwrap();
        assert_eq!(slots.default_name(), "mainmatter");
        assert_eq!(slots.iter().filter(|s| s.default).count(), 1);

        let declared = SlotSet::new(vec![SlotDeclaration::new("mainmatter", 0)]).unwrap();
        assert_eq!(declared.default_slot().base_level, 0);
    }

    #[test]
    fn test_two_defaults_rejected() {
        let result = SlotSet::new(vec![
            SlotDeclaration::new("a", 1).as_default(),
            SlotDeclaration::new("b", 1).as_default(),
        ]);
        assert!(result.is_err());
    }
}

// =============================================================================
// Attribute resolution
// =============================================================================

mod attribute_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_after_normalisation_without_input() {
        let registry = article_registry();
        let resolved = AttributeResolver::new(&registry)
            .resolve(&Map::new(), &[], &NullSink)
            .unwrap();

        for declaration in registry.declarations() {
            let mut expected = declaration.default.clone();
            if let Some(name) = &declaration.normaliser {
                let normalise = normalisers::lookup(name).unwrap();
                expected = normalise(&expected, &declaration.default).unwrap();
            }
            let expected = normalisers::apply_escape(declaration.escape, expected);
            assert_eq!(resolved.get(&declaration.name), Some(&expected), "{}", declaration.name);
            assert_eq!(resolved.origin(&declaration.name), Some(&ValueOrigin::Default));
        }
        assert_eq!(resolved.get("paper"), Some(&json!("a4paper")));
        assert_eq!(resolved.get("language"), Some(&json!("english")));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let registry = article_registry();
        let front_matter = json!({"title": "A & B", "author": "Ada", "press": {"paper": "letter"}});
        let mut overrides = Map::new();
        overrides.insert("fontsize".to_string(), json!("12PT"));
        let resolver = AttributeResolver::new(&registry);

        let first = resolver.resolve(&overrides, &[&front_matter], &NullSink).unwrap();
        let second = resolver.resolve(&overrides, &[&front_matter], &NullSink).unwrap();
        assert_eq!(serde_json::to_value(&first).unwrap(), serde_json::to_value(&second).unwrap());
        assert_eq!(first.get("title"), Some(&json!("A \\& B")));
        assert_eq!(first.get("authors"), Some(&json!(["Ada"])));
        assert_eq!(first.get("paper"), Some(&json!("letterpaper")));
        assert_eq!(first.get("fontsize"), Some(&json!("12pt")));
    }

    #[test]
    fn test_precedence_layers() {
        let mut registry = AttributeRegistry::new();
        registry
            .declare(AttributeDeclaration::new("accent", template_owner(), json!("black")))
            .unwrap();
        registry.emit("ts-colors", "accent", json!("navy"));

        let resolver = AttributeResolver::new(&registry);
        let first = json!({"press": {"accent": ""}});
        let second = json!({"accent": "teal"});

        let from_emitter = resolver.resolve(&Map::new(), &[], &NullSink).unwrap();
        assert_eq!(from_emitter.get("accent"), Some(&json!("navy")));

        // The first non-empty value wins, even from a later document
        let from_front_matter = resolver.resolve(&Map::new(), &[&first, &second], &NullSink).unwrap();
        assert_eq!(from_front_matter.get("accent"), Some(&json!("teal")));
        assert_eq!(
            from_front_matter.origin("accent"),
            Some(&ValueOrigin::FrontMatter {
                document: 1,
                path: "accent".to_string()
            })
        );

        // With nothing else in front matter an empty value is kept over the emitter
        let only_empty = resolver.resolve(&Map::new(), &[&first], &NullSink).unwrap();
        assert_eq!(only_empty.get("accent"), Some(&json!("")));
        assert_eq!(
            only_empty.origin("accent"),
            Some(&ValueOrigin::FrontMatter {
                document: 0,
                path: "press.accent".to_string()
            })
        );

        let mut overrides = Map::new();
        overrides.insert("accent".to_string(), json!("red"));
        let overridden = resolver.resolve(&overrides, &[&first, &second], &NullSink).unwrap();
        assert_eq!(overridden.get("accent"), Some(&json!("red")));
    }

    #[test]
    fn test_empty_value_in_first_document_does_not_hide_second() {
        let mut registry = AttributeRegistry::new();
        registry
            .declare(AttributeDeclaration::new("subtitle", template_owner(), json!("dflt")))
            .unwrap();
        let first = json!({"subtitle": ""});
        let second = json!({"subtitle": "second"});
        let resolved = AttributeResolver::new(&registry)
            .resolve(&Map::new(), &[&first, &second], &NullSink)
            .unwrap();
        assert_eq!(resolved.get("subtitle"), Some(&json!("second")));
        assert_eq!(
            resolved.origin("subtitle"),
            Some(&ValueOrigin::FrontMatter {
                document: 1,
                path: "subtitle".to_string()
            })
        );
    }

    #[test]
    fn test_is_supplied_checks_every_front_matter_path() {
        let mut registry = AttributeRegistry::new();
        registry
            .declare(
                AttributeDeclaration::new("title", template_owner(), json!(""))
                    .with_sources(&["meta.heading"]),
            )
            .unwrap();
        let resolver = AttributeResolver::new(&registry);
        let none = Map::new();

        for front_matter in [
            json!({"title": "A"}),
            json!({"press": {"title": "B"}}),
            json!({"press": {"press": {"title": "C"}}}),
            json!({"meta": {"heading": "D"}}),
        ] {
            assert!(resolver.is_supplied("title", &none, &[&front_matter]), "{front_matter}");
        }

        let blank = json!({"title": "  ", "press": {"title": null}});
        assert!(!resolver.is_supplied("title", &none, &[&blank]));
        assert!(!resolver.is_supplied("title", &none, &[]));

        let mut overrides = Map::new();
        overrides.insert("title".to_string(), json!("E"));
        assert!(resolver.is_supplied("title", &overrides, &[]));
    }

    #[test]
    fn test_disallowed_empty_falls_through() {
        let mut registry = AttributeRegistry::new();
        registry
            .declare(AttributeDeclaration::new("margin", template_owner(), json!("2cm")).with_allow_empty(false))
            .unwrap();
        let front_matter = json!({"margin": "  "});
        let sink = CollectingSink::new();
        let resolved = AttributeResolver::new(&registry)
            .resolve(&Map::new(), &[&front_matter], &sink)
            .unwrap();
        assert_eq!(resolved.get("margin"), Some(&json!("2cm")));
        assert!(sink.has_code("attribute-empty-skipped"));
    }

    #[test]
    fn test_type_and_missing_errors() {
        let mut registry = AttributeRegistry::new();
        registry
            .declare(AttributeDeclaration::new("columns", template_owner(), json!(1)))
            .unwrap();
        let front_matter = json!({"columns": "two"});
        let err = AttributeResolver::new(&registry)
            .resolve(&Map::new(), &[&front_matter], &NullSink)
            .unwrap_err();
        match err {
            TexsmithError::AttributeType { name, owner, expected, .. } => {
                assert_eq!(name, "columns");
                assert_eq!(owner, "template 'memo'");
                assert_eq!(expected, "integer");
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut registry = AttributeRegistry::new();
        registry
            .declare(AttributeDeclaration::new("isbn", template_owner(), Value::Null).required())
            .unwrap();
        let err = AttributeResolver::new(&registry)
            .resolve(&Map::new(), &[], &NullSink)
            .unwrap_err();
        assert_eq!(err.code(), "attribute-missing");
        assert!(err.to_string().contains("isbn"));
    }

    #[test]
    fn test_free_form_metadata_passes_through() {
        let registry = AttributeRegistry::new();
        let front_matter = json!({"project": "apollo", "press": {"fragments": ["x"]}});
        let resolved = AttributeResolver::new(&registry)
            .resolve(&Map::new(), &[&front_matter], &NullSink)
            .unwrap();
        assert_eq!(resolved.get("project"), Some(&json!("apollo")));
        assert!(!resolved.contains("press"));
        // Core defaults exist even with an empty registry
        assert_eq!(resolved.get("language"), Some(&json!("english")));
    }

    #[test]
    fn test_ownership_conflict() {
        let mut registry = AttributeRegistry::new();
        registry
            .declare(AttributeDeclaration::new("title", template_owner(), json!("")))
            .unwrap();
        let err = registry
            .declare(AttributeDeclaration::new(
                "title",
                AttributeOwner::Fragment("ts-title".to_string()),
                json!(""),
            ))
            .unwrap_err();
        match err {
            TexsmithError::OwnerConflict { name, first, second } => {
                assert_eq!(name, "title");
                assert_eq!(first, "template 'memo'");
                assert_eq!(second, "fragment 'ts-title'");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

// =============================================================================
// Heading offsets and slot routing
// =============================================================================

mod offset_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_offset_arithmetic() {
        let document = parse_markdown("## Section\n\n### Sub\n").unwrap();
        let plan = OffsetPlan::compute(&document.blocks, 1, 0, 0);
        assert_eq!(plan.fragment_offset, -1);
        assert_eq!(plan.effective_base, 0);
        assert_eq!(plan.depth_of(2), 1);
        assert_eq!(plan.depth_of(3), 2);
    }

    #[test]
    fn test_no_headings_means_zero_offset() {
        let document = parse_markdown("Just text.\n").unwrap();
        let plan = OffsetPlan::compute(&document.blocks, 1, 0, 0);
        assert_eq!(plan.fragment_offset, 0);
        assert_eq!(plan.effective_base, 1);
    }

    fn main_plan(documents: &[Document], cli: &[SlotDirective]) -> OffsetPlan {
        let template = builtin_template("article");
        let routing = SlotRouter::new(&template.slots, template.name())
            .route(documents, cli, &NullSink)
            .unwrap();
        let main = routing
            .fragments("mainmatter")
            .iter()
            .find(|fragment| fragment.document == 1)
            .unwrap();
        OffsetPlan::compute(&main.blocks, template.slots.default_slot().base_level, 0, 0)
    }

    #[test]
    fn test_slot_extraction_does_not_change_main_offset() {
        let documents = vec![
            parse_markdown("# Abstract\n\nWe show things.\n").unwrap(),
            parse_markdown("## Introduction\n\n### Background\n").unwrap(),
        ];
        let routed = main_plan(&documents, &[SlotDirective::parse("abstract:Abstract").unwrap()]);
        let unrouted = main_plan(&documents, &[]);

        assert_eq!(routed, unrouted);
        assert_eq!(routed.fragment_offset, -1);
        assert_eq!(routed.depth_of(2), 1);
    }

    #[test]
    fn test_unknown_slot_fails_before_routing() {
        let template = builtin_template("article");
        let documents = vec![parse_markdown("# A\n").unwrap()];
        let err = SlotRouter::new(&template.slots, template.name())
            .route(&documents, &[SlotDirective::parse("sidebar:*").unwrap()], &NullSink)
            .unwrap_err();
        match err {
            TexsmithError::UnknownSlot { slot, template, declared } => {
                assert_eq!(slot, "sidebar");
                assert_eq!(template, "article");
                assert_eq!(declared, vec!["mainmatter", "abstract"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

// =============================================================================
// Partials
// =============================================================================

mod partial_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bold(body: &str) -> IndexMap<String, String> {
        let mut map = IndexMap::new();
        map.insert("bold".to_string(), body.to_string());
        map
    }

    #[test]
    fn test_two_fragments_providing_bold_conflict() {
        let mut resolver = PartialResolver::new("article");
        resolver.fragment_overrides("ts-strong", bold("\\textbf{\\VAR{content}}"));
        resolver.fragment_overrides("ts-heavy", bold("{\\bfseries \\VAR{content}}"));
        match resolver.resolve().unwrap_err() {
            TexsmithError::PartialConflict { partial, providers } => {
                assert_eq!(partial, "bold");
                assert!(providers.iter().any(|p| p.contains("ts-strong")));
                assert!(providers.iter().any(|p| p.contains("ts-heavy")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_template_override_disambiguates() {
        let mut resolver = PartialResolver::new("article");
        resolver.fragment_overrides("ts-strong", bold("A"));
        resolver.fragment_overrides("ts-heavy", bold("B"));
        resolver.template_override("bold", "\\textsf{\\VAR{content}}");
        let partials = resolver.resolve().unwrap();
        let rendered = partials.get("bold").unwrap().render(&json!({"content": "x"})).unwrap();
        assert_eq!(rendered, "\\textsf{x}");
    }

    #[test]
    fn test_required_partial_without_provider() {
        let mut resolver = PartialResolver::new("article");
        resolver.require("fragment 'ts-callout'", vec!["callout".to_string()]);
        match resolver.resolve().unwrap_err() {
            TexsmithError::MissingPartial { partial, required_by } => {
                assert_eq!(partial, "callout");
                assert_eq!(required_by, "fragment 'ts-callout'");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
