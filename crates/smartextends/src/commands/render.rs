use anyhow::Context as _;
use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use serde_json::Map;
use serde_json::Value;
use smartextends_templates::Context;

use super::report;
use super::Project;
use crate::args::Args;
use crate::commands::Command;
use crate::exit::Exit;

#[derive(Debug, Parser)]
pub struct Render {
    /// Template name as it's looked up, e.g. `admin/change_form.html`.
    name: String,

    /// Render context as a JSON object.
    #[arg(long, value_name = "JSON", conflicts_with = "context_file")]
    context: Option<String>,

    /// Read the render context from a JSON file.
    #[arg(long, value_name = "PATH")]
    context_file: Option<Utf8PathBuf>,
}

impl Render {
    fn load_context(&self) -> Result<Context> {
        let raw = match (&self.context, &self.context_file) {
            (Some(json), _) => json.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read context file {path}"))?,
            (None, None) => return Ok(Context::new()),
        };

        let data: Map<String, Value> =
            serde_json::from_str(&raw).context("Render context must be a JSON object")?;
        Ok(Context::from(data))
    }
}

impl Command for Render {
    fn execute(&self, _args: &Args, project: &Project) -> Result<Exit> {
        let context = self.load_context()?;
        let engine = project.engine()?;

        match engine.render_to_string(&self.name, &context) {
            Ok(output) => {
                println!("{output}");
                Ok(Exit::success())
            }
            Err(err) => {
                tracing::debug!("Rendering '{}' failed: {:?}", self.name, err);
                Ok(report(&err))
            }
        }
    }
}
