//! @acp:module "Built-in Components"
//! @acp:summary "Templates and fragments compiled into the binary"
//! @acp:domain templates
//! @acp:layer data

/// One file of a built-in bundle, addressed by its path relative to the bundle root.
#[derive(Debug)]
pub struct BuiltinFile {
    pub path: &'static str,
    pub contents: &'static str,
}

/// @acp:summary "A built-in template or fragment directory"
#[derive(Debug)]
pub struct BuiltinBundle {
    pub name: &'static str,
    pub files: &'static [BuiltinFile],
}

impl BuiltinBundle {
    pub fn file(&self, path: &str) -> Option<&'static str> {
        let path = path.trim_start_matches("./");
        self.files.iter().find(|f| f.path == path).map(|f| f.contents)
    }
}

macro_rules! bundle_file {
    ($kind:literal, $name:literal, $path:literal) => {
        BuiltinFile {
            path: $path,
            contents: include_str!(concat!("../../builtin/", $kind, "/", $name, "/", $path)),
        }
    };
}

static TEMPLATES: &[BuiltinBundle] = &[
    BuiltinBundle {
        name: "article",
        files: &[
            bundle_file!("templates", "article", "manifest.toml"),
            bundle_file!("templates", "article", "template.tex"),
        ],
    },
    BuiltinBundle {
        name: "book",
        files: &[
            bundle_file!("templates", "book", "manifest.toml"),
            bundle_file!("templates", "book", "template.tex"),
        ],
    },
];

static FRAGMENTS: &[BuiltinBundle] = &[
    BuiltinBundle {
        name: "ts-geometry",
        files: &[
            bundle_file!("fragments", "ts-geometry", "fragment.toml"),
            bundle_file!("fragments", "ts-geometry", "ts-geometry.sty"),
        ],
    },
    BuiltinBundle {
        name: "ts-code",
        files: &[
            bundle_file!("fragments", "ts-code", "fragment.toml"),
            bundle_file!("fragments", "ts-code", "ts-code.sty"),
            bundle_file!("fragments", "ts-code", "partials/codeblock.tex"),
        ],
    },
    BuiltinBundle {
        name: "ts-links",
        files: &[
            bundle_file!("fragments", "ts-links", "fragment.toml"),
            bundle_file!("fragments", "ts-links", "ts-links.sty"),
        ],
    },
];

pub fn template(name: &str) -> Option<&'static BuiltinBundle> {
    TEMPLATES.iter().find(|bundle| bundle.name == name)
}

pub fn fragment(name: &str) -> Option<&'static BuiltinBundle> {
    FRAGMENTS.iter().find(|bundle| bundle.name == name)
}

pub fn template_names() -> impl Iterator<Item = &'static str> {
    TEMPLATES.iter().map(|bundle| bundle.name)
}

pub fn fragment_names() -> impl Iterator<Item = &'static str> {
    FRAGMENTS.iter().map(|bundle| bundle.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundles_are_complete() {
        for name in template_names() {
            let bundle = template(name).unwrap();
            assert!(bundle.file("manifest.toml").is_some(), "{name}");
        }
        for name in fragment_names() {
            let bundle = fragment(name).unwrap();
            assert!(bundle.file("fragment.toml").is_some(), "{name}");
        }
        assert_eq!(
            fragment("ts-code").unwrap().file("./partials/codeblock.tex").map(|s| s.starts_with("\\begin{lstlisting}")),
            Some(true)
        );
        assert!(template("memoir").is_none());
    }
}
