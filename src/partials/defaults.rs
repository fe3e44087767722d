//! @acp:module "Core Partials"
//! @acp:summary "Built-in rendering rule for every construct"
//! @acp:domain render
//! @acp:layer data

/// Constructs the LaTeX writer can emit, each with a core default below.
pub const CONSTRUCTS: &[&str] = &[
    "paragraph",
    "text",
    "bold",
    "italic",
    "code",
    "codeblock",
    "link",
    "image",
    "list",
    "item",
    "blockquote",
    "linebreak",
    "rule",
    "heading",
    "citation",
    "footnote_citation",
    "diagram",
    "diagram_placeholder",
    "raw_html",
];

/// Core default body for a construct.
pub fn core_partial(name: &str) -> Option<&'static str> {
    let body = match name {
        "paragraph" => "\\VAR{content}\n\n",
        "text" => "\\VAR{text}",
        "bold" => "\\textbf{\\VAR{content}}",
        "italic" => "\\emph{\\VAR{content}}",
        "code" => "\\texttt{\\VAR{text}}",
        "codeblock" => "\\begin{verbatim}\n\\VAR{code}\\end{verbatim}\n\n",
        "link" => "\\href{\\VAR{url}}{\\VAR{content}}",
        "image" => concat!(
            "\\begin{figure}[htbp]\n",
            "\\centering\n",
            "\\includegraphics[width=\\linewidth]{\\VAR{url}}\n",
            "\\BLOCK{if alt}\n",
            "\\caption{\\VAR{alt}}\n",
            "\\BLOCK{endif}\n",
            "\\end{figure}\n\n",
        ),
        "list" => "\\begin{\\VAR{environment}}\n\\VAR{items}\\end{\\VAR{environment}}\n\n",
        "item" => "\\item \\VAR{content}\n",
        "blockquote" => "\\begin{quote}\n\\VAR{content}\\end{quote}\n\n",
        "linebreak" => "\\\\\n",
        "rule" => "\\noindent\\rule{\\linewidth}{0.4pt}\n\n",
        "heading" => "\\\\VAR{command}{\\VAR{title}}\\label{\\VAR{label}}\n\n",
        "citation" => "\\cite{\\VAR{key}}",
        "footnote_citation" => "\\footnote{\\VAR{text}}",
        "diagram" => concat!(
            "\\begin{figure}[htbp]\n",
            "\\centering\n",
            "\\includegraphics[width=\\linewidth]{\\VAR{path}}\n",
            "\\end{figure}\n\n",
        ),
        "diagram_placeholder" => concat!(
            "% \\VAR{language} diagram could not be converted\n",
            "\\begin{verbatim}\n",
            "\\VAR{code}\\end{verbatim}\n\n",
        ),
        "raw_html" => "\\BLOCK{if block}% raw HTML omitted\n\n\\BLOCK{endif}",
        _ => return None,
    };
    Some(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::engine::Template;
    use serde_json::json;

    #[test]
    fn test_every_construct_has_a_parsable_default() {
        for name in CONSTRUCTS {
            let body = core_partial(name).unwrap_or_else(|| panic!("no default for {name}"));
            Template::parse(*name, body).unwrap();
        }
        assert!(core_partial("table").is_none());
    }

    #[test]
    fn test_heading_default() {
        let template = Template::parse("heading", core_partial("heading").unwrap()).unwrap();
        let out = template.render(&json!({"command": "section", "title": "Intro", "label": "intro"})).unwrap();
        assert_eq!(out, "\\section{Intro}\\label{intro}\n\n");
    }
}
