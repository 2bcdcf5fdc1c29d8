use crate::problems::{Cause, LinkageProblem, ProblemKind};
use indexmap::{IndexMap, IndexSet};
use jarlink_classfile::Symbol;
use jarlink_graph::{ClassPathEntry, ClassPathResult};
use std::fmt::Write as _;

/// The human-readable grouped listing: one block per distinct symbol
/// problem with the referring classes indented beneath it, causes where
/// attribution found one, and the dependency paths of every artifact
/// involved.
pub fn format_problems(
    problems: &[LinkageProblem],
    classpath: Option<&ClassPathResult>,
) -> String {
    let mut output = String::new();

    // Abstract-method problems do not fit the "referenced by" shape; they
    // are listed individually after the grouped section.
    let (abstract_problems, groupable): (Vec<_>, Vec<_>) = problems
        .iter()
        .partition(|problem| problem.kind() == ProblemKind::AbstractMethodUnimplemented);

    let mut groups: IndexMap<String, Vec<&LinkageProblem>> = IndexMap::new();
    for problem in groupable {
        groups
            .entry(problem.format_symbol_problem())
            .or_default()
            .push(problem);
    }

    for (header, problems) in &groups {
        let count = problems.len();
        let _ = writeln!(
            output,
            "{};\n  referenced by {} class file{}",
            header,
            count,
            if count > 1 { "s" } else { "" }
        );

        let mut causes: IndexSet<&Cause> = IndexSet::new();
        for problem in problems {
            let _ = writeln!(output, "    {}", problem.source());
            if let Some(cause) = problem.cause() {
                if *cause != Cause::Unknown {
                    causes.insert(cause);
                }
            }
        }
        if !causes.is_empty() {
            output.push_str("  Cause:\n");
            for cause in causes {
                let indented = cause.to_string().replace('\n', "\n    ");
                let _ = writeln!(output, "    {}", indented);
            }
        }
    }

    for problem in &abstract_problems {
        let _ = writeln!(output, "{}", problem.format_symbol_problem());
        if let Some(cause) = problem.cause() {
            if *cause != Cause::Unknown {
                let indented = cause.to_string().replace('\n', "\n    ");
                let _ = writeln!(output, "  Cause:\n    {}", indented);
            }
        }
    }

    if let Some(classpath) = classpath {
        let mut problematic: IndexSet<&ClassPathEntry> = IndexSet::new();
        for problem in problems {
            if let Some(target) = problem.target() {
                problematic.insert(&target.entry);
            }
            problematic.insert(&problem.source().entry);
        }
        let listing = classpath.format_dependency_paths(problematic.into_iter());
        if !listing.is_empty() {
            output.push_str("Problematic artifacts in the dependency tree:\n");
            output.push_str(&listing);
        }
    }

    output
}

/// A Graphviz digraph of the problem set: one cluster per artifact, source
/// classes as plaintext nodes, symbols as ellipses, edges coloured by
/// problem kind (dotted black for a missing class, orange for a missing
/// symbol, red otherwise).
pub fn format_graphviz(problems: &[LinkageProblem]) -> String {
    let mut output = String::from("digraph G {\n  rankdir=LR;\n");

    // Artifact label -> class labels / symbol labels shown inside it.
    let mut artifact_classes: IndexMap<String, IndexSet<String>> = IndexMap::new();
    let mut artifact_symbols: IndexMap<String, IndexSet<String>> = IndexMap::new();

    for problem in problems {
        let source_artifact = problem.source().entry.to_string();
        artifact_classes
            .entry(source_artifact)
            .or_default()
            .insert(short_class_name(&problem.source().binary_name));

        let target_artifact = problem
            .target()
            .map(|target| target.entry.to_string())
            .unwrap_or_else(|| "undefined".to_string());
        artifact_symbols
            .entry(target_artifact)
            .or_default()
            .insert(short_symbol(problem.symbol()));
    }

    let mut class_ids: IndexMap<String, String> = IndexMap::new();
    let mut symbol_ids: IndexMap<String, String> = IndexMap::new();
    let mut cluster = 0usize;
    let mut node = 0usize;

    let mut artifacts: IndexSet<&String> = IndexSet::new();
    artifacts.extend(artifact_classes.keys());
    artifacts.extend(artifact_symbols.keys());

    for artifact in artifacts {
        let _ = writeln!(output, "  subgraph cluster_{} {{", cluster);
        cluster += 1;
        output.push_str("    color=lightgrey;\n");
        let _ = writeln!(output, "    label = \"{}\";", artifact);

        if let Some(classes) = artifact_classes.get(artifact) {
            for class in classes {
                let id = format!("class{}", node);
                node += 1;
                let _ = writeln!(
                    output,
                    "    {} [shape=plaintext,fontsize=9,label=\"{}\"];",
                    id, class
                );
                class_ids.insert(class.clone(), id);
            }
        }
        if let Some(symbols) = artifact_symbols.get(artifact) {
            for symbol in symbols {
                let id = format!("sym{}", node);
                node += 1;
                let _ = writeln!(
                    output,
                    "    {} [shape=ellipse,fontsize=9,label=\"{}\"];",
                    id, symbol
                );
                symbol_ids.insert(symbol.clone(), id);
            }
        }
        output.push_str("  }\n");
    }

    for problem in problems {
        let class_label = short_class_name(&problem.source().binary_name);
        let symbol_label = short_symbol(problem.symbol());
        let (Some(class_id), Some(symbol_id)) =
            (class_ids.get(&class_label), symbol_ids.get(&symbol_label))
        else {
            continue;
        };

        let (style, color) = match problem.kind() {
            ProblemKind::ClassNotFound => ("dotted", "black"),
            ProblemKind::SymbolNotFound => ("solid", "orange"),
            _ => ("solid", "red"),
        };
        let _ = writeln!(
            output,
            "  {} -> {} [style={},color={}];",
            class_id, symbol_id, style, color
        );
    }

    output.push('}');
    output
}

/// Machine-readable problem records.
pub fn format_json(problems: &[LinkageProblem]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(problems)
}

/// `com/google/common/collect/ImmutableList` → `c.g.c.c.ImmutableList`.
fn short_class_name(binary_name: &str) -> String {
    let dotted = binary_name.replace('/', ".");
    let parts: Vec<&str> = dotted.split('.').collect();
    let mut short = String::new();
    for part in &parts[..parts.len() - 1] {
        if let Some(initial) = part.chars().next() {
            short.push(initial);
            short.push('.');
        }
    }
    short.push_str(parts[parts.len() - 1]);
    short
}

fn short_symbol(symbol: &Symbol) -> String {
    match symbol {
        Symbol::Class(class) => short_class_name(&class.binary_name),
        Symbol::Method(method) => format!(
            "{}.{}{}",
            short_class_name(&method.owner),
            method.name,
            method.descriptor
        ),
        Symbol::Field(field) => {
            format!("{}.{}", short_class_name(&field.owner), field.name)
        }
    }
}
