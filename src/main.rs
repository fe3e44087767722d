#![forbid(unsafe_code)]
//! TeXSmith Command Line Interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use texsmith::commands::{
    execute_attributes, execute_render, execute_templates, AttributesOptions, BuildFlags, RenderOptions,
    TemplatesSubcommand,
};
use texsmith::{DiscoveryRoots, TexsmithConfig};

#[derive(Parser)]
#[command(name = "texsmith")]
#[command(about = "Markdown to LaTeX through templates, slots and fragments")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: .texsmith/config.yml, then ~/.texsmith/config.yml)
    #[arg(short, long, global = true, env = "TEXSMITH_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Flags shared by render and attributes
#[derive(clap::Args, Debug, Clone)]
struct BuildArgs {
    /// Template name or path
    #[arg(short, long)]
    template: Option<String>,

    /// Attribute override (key=value, repeatable)
    #[arg(short = 'a', long = "attribute", value_name = "KEY=VALUE")]
    attributes: Vec<String>,

    /// Slot directive (slot:selector, repeatable)
    #[arg(long = "slot", value_name = "SLOT:SELECTOR")]
    slots: Vec<String>,

    /// Document base level (number or sectioning command)
    #[arg(long)]
    base_level: Option<String>,

    /// Keep the first heading in the content
    #[arg(long)]
    no_promote_title: bool,

    /// Extra fragment (repeatable)
    #[arg(long = "fragment", value_name = "NAME")]
    fragments: Vec<String>,

    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,
}

impl BuildArgs {
    fn into_flags(self, output: Option<PathBuf>) -> BuildFlags {
        BuildFlags {
            template: self.template,
            output,
            attributes: self.attributes,
            slots: self.slots,
            base_level: self.base_level,
            no_promote_title: self.no_promote_title,
            fragments: self.fragments,
            strict: self.strict,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render documents into a LaTeX build directory
    Render {
        /// Input Markdown files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        build: BuildArgs,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Render each input as an independent build
        #[arg(long)]
        batch: bool,

        /// Print build reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect available templates
    Templates {
        #[command(subcommand)]
        cmd: TemplatesCommands,

        /// Output as JSON
        #[arg(long, global = true)]
        json: bool,
    },

    /// Print resolved attributes as JSON without rendering
    Attributes {
        /// Input Markdown files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        build: BuildArgs,

        /// Include the origin of every value
        #[arg(long)]
        origins: bool,
    },
}

#[derive(Subcommand)]
enum TemplatesCommands {
    /// List every discoverable template with its tier
    List,

    /// Show a template's slots, attributes, fragments and partials
    Info {
        /// Template name or path
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let roots = DiscoveryRoots::from_env()?;
    let config = TexsmithConfig::load_or_default(cli.config.as_deref(), &roots.cwd, roots.home.as_deref())?;
    let roots = roots.with_template_paths(config.template_paths.clone());

    match cli.command {
        Commands::Render { inputs, build, output, batch, json } => {
            let options = RenderOptions {
                inputs,
                flags: build.into_flags(output),
                batch,
                json,
                verbose: cli.verbose,
            };
            execute_render(options, &config, &roots)?;
        }

        Commands::Templates { cmd, json } => {
            let subcommand = match cmd {
                TemplatesCommands::List => TemplatesSubcommand::List,
                TemplatesCommands::Info { name } => TemplatesSubcommand::Info { name },
            };
            execute_templates(subcommand, &roots, json)?;
        }

        Commands::Attributes { inputs, build, origins } => {
            let options = AttributesOptions {
                inputs,
                flags: build.into_flags(None),
                origins,
                verbose: cli.verbose,
            };
            execute_attributes(options, &config, &roots)?;
        }
    }

    Ok(())
}
