mod builder;
mod config;
mod context;
mod environment;
mod error;
mod history;
mod lifecycle;
mod probe;
mod prompt;
mod registry;
mod script;
mod shell;

use builder::VenvBuilder;
use clap::{Parser, Subcommand};
use config::{ensure_parent, DEFAULT_CONFIG_YAML};
use context::{build_context, Context};
use environment::{EnvOptions, Environment};
use error::VemanError;
use lifecycle::{Manager, NoHooks, UpgradeSelection};
use prompt::{Prompter, TerminalPrompter};
use serde::Serialize;
use serde_json::json;
use shell::InteractiveShell;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "veman", version, about = "Virtual Environment Manager")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new venv
    Create {
        name: Option<String>,
        #[arg(long)]
        activate: bool,
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        system_site_packages: bool,
        #[arg(long)]
        without_pip: bool,
    },
    /// Activate a venv in a new shell
    Activate { name: Option<String> },
    /// Delete an existing venv
    Delete { name: Option<String> },
    /// Show shell history recorded inside a venv
    History {
        name: Option<String>,
        #[arg(long, conflicts_with = "name")]
        all: bool,
        #[arg(long)]
        verbose: bool,
    },
    /// List managed venvs
    List,
    /// Create a temporary venv that is deleted on deactivation
    Temp {
        #[arg(long)]
        system_site_packages: bool,
        #[arg(long)]
        without_pip: bool,
    },
    /// Upgrade dependencies, python and/or scripts of a venv
    Upgrade {
        name: Option<String>,
        #[arg(long, conflicts_with = "name")]
        all: bool,
        #[arg(long)]
        deps: bool,
        #[arg(long)]
        python: bool,
        #[arg(long)]
        scripts: bool,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Init,
    Path,
    Show,
}

#[derive(Debug, Serialize)]
struct JsonResult<T: Serialize> {
    ok: bool,
    result: Option<T>,
    error: Option<String>,
}

type RealManager<'a> = Manager<'a, VenvBuilder, InteractiveShell, NoHooks>;

fn main() -> Result<(), VemanError> {
    let cli = Cli::parse();
    init_tracing();
    let json = cli.json;

    let result = build_context(cli.config.as_ref(), json).and_then(|ctx| run(&ctx, cli.command));

    if let Err(err) = result {
        if let VemanError::Quit = err {
            std::process::exit(err.exit_code());
        }
        if json {
            let payload = JsonResult::<serde_json::Value> {
                ok: false,
                result: None,
                error: Some(err.to_string()),
            };
            print_json(&payload)?;
        } else {
            eprintln!("{err}");
        }
        std::process::exit(err.exit_code());
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("VEMAN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(ctx: &Context, command: Commands) -> Result<(), VemanError> {
    if let Commands::Config { command } = command {
        return handle_config(ctx, command);
    }

    ctx.check_supported()?;
    ctx.ensure_root_dir()?;
    let manager = Manager::new(
        ctx,
        VenvBuilder::new(ctx.python.clone()),
        InteractiveShell,
        NoHooks,
    );
    let mut prompter = TerminalPrompter::new(ctx.json);

    match command {
        Commands::Create {
            name,
            activate,
            overwrite,
            prompt,
            system_site_packages,
            without_pip,
        } => {
            let options = env_options(ctx, prompt, system_site_packages, without_pip);
            handle_create(ctx, &manager, &mut prompter, name, options, overwrite, activate)
        }
        Commands::Activate { name } => {
            ctx.require_inactive("activating another environment")?;
            let name = resolve_name(ctx, name, "activate", &mut prompter)?;
            manager.activate(&manager.environment(&name)?)
        }
        Commands::Delete { name } => {
            let name = resolve_name(ctx, name, "delete", &mut prompter)?;
            let env = manager.environment(&name)?;
            manager.delete(&env)?;
            output(ctx, json!({"name": env.name, "deleted": true}), &[])
        }
        Commands::History { name, all, verbose } => {
            handle_history(ctx, &mut prompter, name, all, verbose)
        }
        Commands::List => {
            let names = registry::list(&ctx.root_dir)?;
            output(ctx, json!({"environments": names}), &names)
        }
        Commands::Temp {
            system_site_packages,
            without_pip,
        } => {
            let options = env_options(ctx, None, system_site_packages, without_pip);
            handle_temp(ctx, &manager, &mut prompter, options)
        }
        Commands::Upgrade {
            name,
            all,
            deps,
            python,
            scripts,
        } => {
            let selection = UpgradeSelection::from_flags(deps, python, scripts);
            if all {
                let upgraded = manager.upgrade_all(selection)?.into_result()?;
                return output(ctx, json!({"upgraded": upgraded}), &[]);
            }
            let name = resolve_name(ctx, name, "upgrade", &mut prompter)?;
            manager.upgrade(&manager.environment(&name)?, selection)?;
            output(ctx, json!({"upgraded": [name]}), &[])
        }
        Commands::Config { .. } => unreachable!("handled above"),
    }
}

/// Command-line flags win over the `defaults` section of the config.
fn env_options(
    ctx: &Context,
    prompt: Option<String>,
    system_site_packages: bool,
    without_pip: bool,
) -> EnvOptions {
    let defaults = &ctx.config.defaults;
    let prompt = prompt.or_else(|| Some(defaults.prompt.clone()));
    EnvOptions::new(
        prompt,
        system_site_packages || defaults.system_site_packages,
        defaults.with_pip && !without_pip,
    )
}

fn resolve_name(
    ctx: &Context,
    name: Option<String>,
    action: &str,
    prompter: &mut dyn Prompter,
) -> Result<String, VemanError> {
    if let Some(name) = name {
        return Ok(name);
    }
    let candidates = registry::list(&ctx.root_dir)?;
    registry::resolve_interactive(prompter, action, &candidates)
}

fn handle_create(
    ctx: &Context,
    manager: &RealManager<'_>,
    prompter: &mut TerminalPrompter,
    name: Option<String>,
    options: EnvOptions,
    overwrite: bool,
    activate: bool,
) -> Result<(), VemanError> {
    ctx.require_inactive("creating a new environment")?;
    let name = match name {
        Some(name) => name,
        None => prompter
            .read_line("Enter name for the new venv")?
            .map(|name| name.trim().to_string())
            .ok_or(VemanError::Quit)?,
    };
    let env = manager.environment(&name)?;
    let created = manager.create(&env, &options, overwrite, prompter)?;
    if created && activate {
        return manager.activate(&env);
    }
    output(
        ctx,
        json!({"name": env.name, "path": env.path, "created": created}),
        &[],
    )
}

fn handle_temp(
    ctx: &Context,
    manager: &RealManager<'_>,
    prompter: &mut TerminalPrompter,
    options: EnvOptions,
) -> Result<(), VemanError> {
    ctx.require_inactive("creating a new environment")?;
    let name = registry::next_temp_name(&ctx.root_dir)?;
    let env = manager.environment(&name)?;
    if let Err(err) = manager.create(&env, &options, true, prompter) {
        // The name was unused before this run, so whatever is there is ours.
        if env.path.symlink_metadata().is_ok() {
            if let Err(cleanup) = fs::remove_dir_all(&env.path) {
                eprintln!("Unable to remove {}: {cleanup}", env.path.display());
            }
        }
        return Err(err);
    }
    let activated = manager.activate(&env);
    if let Err(err) = &activated {
        eprintln!("{err}");
    }
    manager.delete(&env)?;
    activated
}

fn handle_history(
    ctx: &Context,
    prompter: &mut TerminalPrompter,
    name: Option<String>,
    all: bool,
    verbose: bool,
) -> Result<(), VemanError> {
    let lines = if all {
        history::read_aggregate(&ctx.root_dir, verbose)?
    } else {
        let name = resolve_name(ctx, name, "show history for", prompter)?;
        if !registry::list(&ctx.root_dir)?.contains(&name) {
            return Err(VemanError::NotFound(name));
        }
        let env = Environment::new(&ctx.root_dir, &name)?;
        history::read(&env, verbose)
    };
    output(ctx, json!({"lines": lines}), &lines)
}

fn handle_config(ctx: &Context, command: ConfigCommand) -> Result<(), VemanError> {
    match command {
        ConfigCommand::Init => {
            if ctx.config_path.exists() {
                let path = ctx.config_path.display().to_string();
                return output(
                    ctx,
                    json!({"path": ctx.config_path, "created": false}),
                    &[format!("{path} already exists")],
                );
            }
            ensure_parent(&ctx.config_path)?;
            fs::write(&ctx.config_path, DEFAULT_CONFIG_YAML)?;
            let path = ctx.config_path.display().to_string();
            output(
                ctx,
                json!({"path": ctx.config_path, "created": true}),
                &[format!("Wrote {path}")],
            )
        }
        ConfigCommand::Path => output(
            ctx,
            json!({"config": ctx.config_path, "env_dir": ctx.root_dir}),
            &[
                format!("config: {}", ctx.config_path.display()),
                format!("env_dir: {}", ctx.root_dir.display()),
            ],
        ),
        ConfigCommand::Show => {
            let text = serde_yaml::to_string(&ctx.config)?;
            output(ctx, serde_json::to_value(&ctx.config)?, &[text.trim_end().to_string()])
        }
    }
}

/// Prints `payload` wrapped in a `JsonResult` with `--json`, otherwise `lines`.
fn output(ctx: &Context, payload: serde_json::Value, lines: &[String]) -> Result<(), VemanError> {
    if ctx.json {
        let wrapper = JsonResult {
            ok: true,
            result: Some(payload),
            error: None,
        };
        print_json(&wrapper)?;
    } else {
        for line in lines {
            println!("{line}");
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(payload: &T) -> Result<(), VemanError> {
    let text = serde_json::to_string_pretty(payload)?;
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn upgrade_flags_parse() {
        let cli = Cli::try_parse_from(["veman", "upgrade", "foo", "--python"]).unwrap();
        match cli.command {
            Commands::Upgrade {
                name,
                all,
                deps,
                python,
                scripts,
            } => {
                assert_eq!(name.as_deref(), Some("foo"));
                assert!(python && !deps && !scripts && !all);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn all_conflicts_with_a_name() {
        for sub in ["upgrade", "history"] {
            let err = Cli::try_parse_from(["veman", sub, "foo", "--all"]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
            assert!(Cli::try_parse_from(["veman", sub, "--all"]).is_ok());
        }
    }

    #[test]
    fn flags_override_config_defaults() {
        let dir = tempdir().unwrap();
        let mut ctx = Context::new(dir.path().join("envs"), dir.path().to_path_buf());
        ctx.config.defaults.prompt = "cfg".to_string();

        let opts = env_options(&ctx, None, false, false);
        assert_eq!(opts.prompt.as_deref(), Some("cfg"));
        assert!(opts.with_pip);

        let opts = env_options(&ctx, Some("cli".to_string()), true, true);
        assert_eq!(opts.prompt.as_deref(), Some("cli"));
        assert!(opts.system_site_packages);
        assert!(!opts.with_pip);

        ctx.config.defaults.with_pip = false;
        ctx.config.defaults.prompt.clear();
        let opts = env_options(&ctx, None, false, false);
        assert_eq!(opts.prompt, None);
        assert!(!opts.with_pip);
    }
}
