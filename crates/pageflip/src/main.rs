mod cli;
mod paths;
mod run;
mod script;

use anyhow::Result;
use cli::{Command, ConfigAction};
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Config(config_cmd)) => match config_cmd.action {
            ConfigAction::Show => run::show_config(cli.run.config.as_deref()),
            ConfigAction::Where => print_config_location(),
        },
        None => run::run(cli.run),
    }
}

fn print_config_location() -> Result<()> {
    let paths = AppPaths::discover()?;
    let file = paths.config_file();
    println!("config dir:  {}", paths.config_dir().display());
    println!(
        "config file: {} ({})",
        file.display(),
        if file.exists() { "present" } else { "missing; defaults apply" }
    );
    Ok(())
}
