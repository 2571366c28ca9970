mod cli;

use spiff::node::Node;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("SPIFF_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Merge(merge_cli) => merge(merge_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn merge(cli: cli::MergeCommand) -> anyhow::Result<()> {
    use anyhow::Context;

    let template = spiff::documents::load_file(&cli.template)
        .with_context(|| format!("Failed to load template {}", cli.template.display()))?;
    let stubs = cli
        .stubs
        .iter()
        .map(|path| {
            spiff::documents::load_file(path)
                .with_context(|| format!("Failed to load stub {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let options = spiff::flow::FlowOptions {
        max_passes: cli.max_passes,
    };
    let resolution = spiff::flow::cascade(&template, &stubs, cli.partial, &options)
        .context("Failed to resolve template")?;

    if !resolution.is_complete() {
        eprintln!(
            "{}",
            spiff::flow::UnresolvedNodes::new(resolution.unresolved.clone())
        );
    }

    output(&cli.output, &resolution.document)?;
    Ok(())
}

fn output(output: &cli::OutputArgs, document: &Node) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), document)?,
        cli::OutputFormat::Json => {
            serde_json::to_writer_pretty(std::io::stdout(), document)?;
            println!();
        }
    };

    Ok(())
}

/// (spiff-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand::*;
    use spiff::visit::{NodePath, VisitNodes};

    match cli.command {
        Parse { expression } => {
            let expression = spiff::dynaml::parse(&expression, &[])?;
            println!("{expression:#?}");
            println!("{expression}");
        }
        Tree { file } => {
            let document = spiff::documents::load_file(&file)?;
            document.visit_nodes(&mut |path: &NodePath, node: &Node| {
                println!("{path}\t{}", node.value().type_name());
            });
        }
    }

    Ok(())
}
