use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use crate::script::{parse_script, Script};

#[derive(Parser, Debug)]
#[command(
    name = "pageflip",
    author,
    version,
    about = "Headless page-flip viewer",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Configuration file; defaults to `pageflip.toml` in the config directory.
    #[arg(long, value_name = "FILE", env = "PAGEFLIP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Page pack directory (with `pages.toml`, or a plain folder of images).
    #[arg(long, value_name = "DIR")]
    pub pages: Option<PathBuf>,

    /// Viewport size (e.g. `720x1280`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size, default_value = "720x1280")]
    pub size: (u32, u32),

    /// Override the document's page count.
    #[arg(long, value_name = "N")]
    pub max_pages: Option<usize>,

    /// Page shown first.
    #[arg(long, value_name = "INDEX", default_value_t = 0)]
    pub start_page: usize,

    /// Gestures to play, e.g. `f,f,b,~f` (`~` lets the page fall back).
    #[arg(long, value_name = "STEPS", value_parser = parse_script_arg)]
    pub script: Option<Script>,

    /// Write the last composed frame to this PNG file.
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect the resolved configuration.
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the configuration directory and file.
    Where,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32)> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow::anyhow!("expected WxH format, e.g. 720x1280"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid width in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid height in size specification"))?;

    if width == 0 || height == 0 {
        bail!("surface dimensions must be greater than zero");
    }
    Ok((width, height))
}

fn parse_script_arg(raw: &str) -> Result<Script> {
    parse_script(raw).map(Script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn size_accepts_either_separator() {
        assert_eq!(parse_surface_size("640x480").unwrap(), (640, 480));
        assert_eq!(parse_surface_size(" 10 X 20 ").unwrap(), (10, 20));
        assert!(parse_surface_size("0x20").is_err());
        assert!(parse_surface_size("640").is_err());
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "pageflip",
            "--size",
            "100x200",
            "--max-pages",
            "5",
            "--script",
            "f,~b",
        ])
        .unwrap();
        assert_eq!(cli.run.size, (100, 200));
        assert_eq!(cli.run.max_pages, Some(5));
        assert_eq!(cli.run.script.map(|script| script.0.len()), Some(2));
        assert!(cli.command.is_none());
    }
}
