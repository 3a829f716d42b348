use anyhow::Context as _;
use anyhow::Result;
use clap::Parser;
use smartextends_templates::Context;

use super::report;
use super::Project;
use crate::args::Args;
use crate::commands::Command;
use crate::exit::Exit;

#[derive(Debug, Parser)]
pub struct Resolve {
    /// Template name as it's looked up, e.g. `admin/change_form.html`.
    name: String,
}

impl Command for Resolve {
    fn execute(&self, _args: &Args, project: &Project) -> Result<Exit> {
        let engine = project.engine()?;

        let candidates = engine
            .chain()
            .candidates(&self.name, None)
            .with_context(|| format!("Failed to look up '{}'", self.name))?;
        if candidates.is_empty() {
            return Ok(Exit::error().with_message(format!(
                "error[T404]: no source supplies '{}'",
                self.name
            )));
        }

        println!("Sources:");
        for origin in &candidates {
            println!("  {origin}");
        }

        let path = match engine.inheritance(&self.name, &Context::new()) {
            Ok(path) => path,
            Err(err) => return Ok(report(&err)),
        };

        println!("Inheritance:");
        for template in path {
            match template.origin() {
                Some(origin) => println!("  {} {origin}", template.name()),
                None => println!("  {}", template.name()),
            }
        }

        Ok(Exit::success())
    }
}
