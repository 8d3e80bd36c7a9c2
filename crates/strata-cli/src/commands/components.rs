//! Component type listing.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use clap::Args;
use strata_core::{ComponentCategory, ComponentDescriptor};

#[derive(Args)]
pub struct ComponentsArgs {
    /// Show details for one component type
    #[arg(value_name = "TYPE")]
    component: Option<String>,
}

pub fn run(args: ComponentsArgs) -> anyhow::Result<()> {
    let registry = strata_components::builtin_registry();

    if let Some(id) = &args.component {
        let descriptor = registry
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("Unknown component type: {id}"))?;
        print_details(descriptor);
        return Ok(());
    }

    println!("Available Components");
    println!("====================");
    for category in [
        ComponentCategory::Source,
        ComponentCategory::Processor,
        ComponentCategory::Sink,
    ] {
        let descriptors = registry.in_category(category);
        if descriptors.is_empty() {
            continue;
        }
        println!();
        println!("{}:", category.name());
        for d in descriptors {
            println!("  {:16}  {}", d.id, d.description);
        }
    }
    println!();
    println!("Run 'strata components <TYPE>' for parameters.");
    Ok(())
}

fn print_details(d: &ComponentDescriptor) {
    println!("{} ({})", d.name, d.id);
    println!("{}", "=".repeat(d.name.len() + d.id.len() + 3));
    println!();
    println!("{}", d.description);
    println!();
    println!("Category: {}", d.category.name());
    println!();

    let keys: Vec<&str> = d
        .params
        .iter()
        .copied()
        .filter(|k| !matches!(*k, "reader" | "writer"))
        .collect();
    if keys.is_empty() {
        println!("Parameters: none");
    } else {
        println!("Parameters:");
        for key in keys {
            println!("  {key}");
        }
    }

    println!();
    println!("Example entry:");
    println!();
    println!("  [[component]]");
    println!("  name = \"my_{}\"", d.id);
    println!("  type = \"{}\"", d.id);
    if matches!(d.category, ComponentCategory::Processor | ComponentCategory::Sink) {
        println!("  [component.reader]");
        println!("  levels = \"<input level>\"");
    }
}
