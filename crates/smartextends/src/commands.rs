mod render;
mod resolve;

use anyhow::Context as _;
use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use clap::Subcommand;
use smartextends_conf::Settings;
use smartextends_templates::Engine;
use smartextends_templates::TemplateError;

use crate::args::Args;
use crate::exit::Exit;

pub trait Command {
    fn execute(&self, args: &Args, project: &Project) -> Result<Exit>;
}

#[derive(Debug, Subcommand)]
pub enum SmartExtendsCommand {
    /// Render a template and print the output
    Render(self::render::Render),
    /// Show which sources supply a template and what it inherits from
    Resolve(self::resolve::Resolve),
}

impl Command for SmartExtendsCommand {
    fn execute(&self, args: &Args, project: &Project) -> Result<Exit> {
        match self {
            Self::Render(cmd) => cmd.execute(args, project),
            Self::Resolve(cmd) => cmd.execute(args, project),
        }
    }
}

/// A project root and the settings loaded from it.
pub struct Project {
    pub root: Utf8PathBuf,
    pub settings: Settings,
}

impl Project {
    pub fn load(root: Option<&Utf8Path>) -> Result<Self> {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => resolve_project_root()?,
        };
        let settings = Settings::new(&root).context("Failed to load settings")?;
        Ok(Self { root, settings })
    }

    pub fn engine(&self) -> Result<Engine> {
        Engine::from_settings(&self.settings).context("Failed to build template engine")
    }
}

fn resolve_project_root() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Utf8PathBuf::from_path_buf(cwd)
        .map_err(|_| anyhow::anyhow!("Current directory is not valid UTF-8"))
}

/// Format a template error the way every command reports it.
fn report(err: &TemplateError) -> Exit {
    let mut message = format!("error[{}]: {err}", err.diagnostic_code());
    if let TemplateError::NotFound { tried, .. } = err {
        for attempt in tried {
            message.push_str("\n  tried: ");
            message.push_str(attempt);
        }
    }
    Exit::error().with_message(message)
}
