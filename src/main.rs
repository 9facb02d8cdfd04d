mod classpath;
mod dataflow;
mod descriptor;
mod error;
mod generics;
mod hierarchy;
mod ir;
mod mappings;
mod opcodes;
mod remap;
mod scan;
mod telemetry;

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::classpath::{ClassPool, PlatformClasses};
use crate::dataflow::stack_machine::StackMachine;
use crate::dataflow::walker::{StackVisitor, WalkOutcome, walk};
use crate::generics::{MethodRef, likely_collection_generics};
use crate::hierarchy::{HierarchyResolver, LoaderChain};
use crate::ir::Instruction;
use crate::mappings::MappingSet;
use crate::remap::Remapper;
use crate::scan::{load_classes, load_classpath};
use crate::telemetry::{init_logging, with_span};

/// CLI arguments for jremap execution.
#[derive(Parser, Debug)]
#[command(
    name = "jremap",
    about = "Rename, inspect and simulate JVM classes described as JSON.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a Tiny v1 mapping file and write the renamed classes.
    Remap {
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
        #[arg(long, value_name = "PATH")]
        mappings: PathBuf,
        /// Apply the mappings from target to source namespace.
        #[arg(long)]
        reverse: bool,
        /// Rename inner classes along with their renamed outer class.
        #[arg(long)]
        fix_inner_classes: bool,
        /// Write the applied mappings, including derived inner class renames, as Tiny v1.
        #[arg(long, value_name = "PATH")]
        write_mappings: Option<PathBuf>,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Answer a type hierarchy query.
    Hierarchy {
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
        #[arg(long, value_name = "PATH")]
        classpath: Vec<PathBuf>,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
        #[command(subcommand)]
        query: HierarchyQuery,
    },
    /// Print the simulated operand stack after every instruction of a method.
    Walk {
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
        #[arg(long, value_name = "NAME")]
        class: String,
        #[arg(long, value_name = "NAME")]
        method: String,
        #[arg(long, value_name = "DESC")]
        descriptor: Option<String>,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Guess element types of collections returned by static methods.
    Generics {
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
        #[arg(long, value_name = "PATH")]
        classpath: Vec<PathBuf>,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum HierarchyQuery {
    /// Whether SUB is assignable to SUPER.
    Subtype { super_name: String, sub_name: String },
    /// Closest common superclass, as the verifier computes it.
    CommonSuper { first: String, second: String },
    /// Every interface implemented by NAME, directly or through supertypes.
    Interfaces { name: String },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Remap {
            input,
            mappings,
            reverse,
            fix_inner_classes,
            write_mappings,
            output,
        } => run_remap(
            &input,
            &mappings,
            RemapOptions {
                reverse,
                fix_inner_classes,
                write_mappings: write_mappings.as_deref(),
            },
            output.as_deref(),
        ),
        Command::Hierarchy {
            input,
            classpath,
            output,
            query,
        } => run_hierarchy(&input, &classpath, &query, output.as_deref()),
        Command::Walk {
            input,
            class,
            method,
            descriptor,
            output,
        } => run_walk(&input, &class, &method, descriptor.as_deref(), output.as_deref()),
        Command::Generics {
            input,
            classpath,
            output,
        } => run_generics(&input, &classpath, output.as_deref()),
    }
}

struct RemapOptions<'a> {
    reverse: bool,
    fix_inner_classes: bool,
    write_mappings: Option<&'a Path>,
}

fn run_remap(
    input: &Path,
    mappings: &Path,
    options: RemapOptions<'_>,
    output: Option<&Path>,
) -> Result<()> {
    let classes = load_input(input)?;
    let file = File::open(mappings)
        .with_context(|| format!("failed to open mappings {}", mappings.display()))?;
    let mut mapping_set = MappingSet::parse_tiny_v1(BufReader::new(file))
        .with_context(|| format!("failed to parse mappings {}", mappings.display()))?;
    if options.reverse {
        mapping_set = mapping_set.reversed();
    }

    let mut remapper = Remapper::new();
    remapper.add_targets(classes)?;
    let unmatched = mapping_set.unmatched_classes(|name| remapper.targets().contains(name));
    if !unmatched.is_empty() {
        info!(
            "{} class mappings name no input class, first: {}",
            unmatched.len(),
            unmatched[0]
        );
    }
    mapping_set.apply(&mut remapper)?;
    if options.fix_inner_classes {
        let added = remapper.fix_inner_class_names();
        info!("renamed {} inner classes along with their outer class", added.len());
        mapping_set.extend_classes(&added);
    }
    if let Some(path) = options.write_mappings {
        let file = File::create(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        mapping_set
            .write_tiny_v1(io::BufWriter::new(file))
            .with_context(|| format!("failed to write mappings {}", path.display()))?;
    }
    with_span("remap", || remapper.process())?;
    let classes = remapper.into_targets().into_classes();

    let mut writer = output_writer(output)?;
    serde_json::to_writer_pretty(&mut writer, &classes)
        .context("failed to serialize remapped classes")?;
    writer
        .write_all(b"\n")
        .context("failed to write remapped classes")?;
    Ok(())
}

fn run_hierarchy(
    input: &Path,
    classpath: &[PathBuf],
    query: &HierarchyQuery,
    output: Option<&Path>,
) -> Result<()> {
    let pool = ClassPool::new(load_input(input)?)?;
    let loader = classpath_loader(classpath)?;
    let resolver = HierarchyResolver::new(&pool, &loader);

    let answer = match query {
        HierarchyQuery::Subtype {
            super_name,
            sub_name,
        } => resolver.is_subtype(super_name, sub_name)?.to_string(),
        HierarchyQuery::CommonSuper { first, second } => {
            resolver.common_superclass(first, second)?.name.clone()
        }
        HierarchyQuery::Interfaces { name } => {
            let interfaces = resolver.all_interfaces(name)?;
            interfaces.iter().cloned().collect::<Vec<_>>().join("\n")
        }
    };

    let mut writer = output_writer(output)?;
    writeln!(writer, "{answer}").context("failed to write hierarchy answer")?;
    Ok(())
}

fn run_walk(
    input: &Path,
    class_name: &str,
    method_name: &str,
    descriptor: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let pool = ClassPool::new(load_input(input)?)?;
    let class = pool
        .get(class_name)
        .with_context(|| format!("class {class_name} not found in {}", input.display()))?;
    let method = class
        .find_method(method_name, descriptor)
        .with_context(|| format!("method {method_name} not found in {class_name}"))?;

    let mut trace = StackTrace::default();
    let outcome = walk(class, method, &mut trace)
        .with_context(|| format!("failed to walk {class_name}.{method_name}{}", method.descriptor))?;

    let mut writer = output_writer(output)?;
    if outcome == WalkOutcome::Skipped {
        writeln!(
            writer,
            "skipped: class version {} has no stack map frames",
            class.version
        )?;
        return Ok(());
    }
    for line in &trace.lines {
        writeln!(writer, "{line}").context("failed to write stack trace")?;
    }
    Ok(())
}

fn run_generics(input: &Path, classpath: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let pool = ClassPool::new(load_input(input)?)?;
    let loader = classpath_loader(classpath)?;
    let resolver = HierarchyResolver::new(&pool, &loader);
    let guesses = with_span("generics", || likely_collection_generics(&pool, &resolver));

    let report: Vec<CollectionGuess<'_>> = guesses
        .iter()
        .map(|(method, element)| CollectionGuess { method, element })
        .collect();
    let mut writer = output_writer(output)?;
    serde_json::to_writer_pretty(&mut writer, &report)
        .context("failed to serialize generics report")?;
    writer
        .write_all(b"\n")
        .context("failed to write generics report")?;
    Ok(())
}

fn load_input(input: &Path) -> Result<Vec<ir::Class>> {
    if !input.exists() {
        anyhow::bail!("input not found: {}", input.display());
    }
    with_span("load", || load_classes(input))
}

/// Classpath entries first, then the built-in platform classes.
fn classpath_loader(classpath: &[PathBuf]) -> Result<LoaderChain> {
    for entry in classpath {
        if !entry.exists() {
            anyhow::bail!("classpath entry not found: {}", entry.display());
        }
    }
    let library = ClassPool::new(load_classpath(classpath)?)?;
    Ok(LoaderChain::new().with(library).with(PlatformClasses))
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}

#[derive(Serialize)]
struct CollectionGuess<'a> {
    #[serde(flatten)]
    method: &'a MethodRef,
    element: &'a str,
}

/// Formats the operand stack after each instruction.
#[derive(Default)]
struct StackTrace {
    lines: Vec<String>,
}

impl StackVisitor for StackTrace {
    fn after(&mut self, index: usize, instruction: &Instruction, state: &StackMachine) {
        let stack = state
            .stack_values()
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.lines
            .push(format!("{index:>4} {:<14} [{stack}]", instruction.kind_name()));
    }
}
