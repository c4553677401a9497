//! Alias management commands
//!
//! An alias stores an application key and the endpoint it authorizes against.

use bz_core::alias::DEFAULT_ENDPOINT;
use bz_core::{Alias, AliasManager};
use clap::Subcommand;
use serde::Serialize;

use super::report;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Alias subcommands
#[derive(Subcommand, Debug)]
pub enum AliasCommands {
    /// Add or update an alias
    Set(SetArgs),

    /// List all configured aliases
    List(ListArgs),

    /// Remove an alias
    Remove(RemoveArgs),
}

/// Arguments for the `alias set` command
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Alias name (e.g., "b2", "backup")
    pub name: String,

    /// Application key id
    pub key_id: String,

    /// Application key
    pub application_key: String,

    /// Authorization endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Fail instead of replacing an existing alias
    #[arg(long)]
    pub no_clobber: bool,
}

/// Arguments for the `alias list` command
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show key ids as well
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for the `alias remove` command
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the alias to remove
    pub name: String,
}

#[derive(Serialize)]
struct AliasListOutput {
    aliases: Vec<AliasInfo>,
}

/// Alias information for JSON output; the application key is never shown
#[derive(Serialize)]
struct AliasInfo {
    name: String,
    endpoint: String,
    key_id: String,
}

impl From<&Alias> for AliasInfo {
    fn from(alias: &Alias) -> Self {
        Self {
            name: alias.name.clone(),
            endpoint: alias.endpoint.clone(),
            key_id: alias.key_id.clone(),
        }
    }
}

#[derive(Serialize)]
struct AliasOperationOutput {
    success: bool,
    alias: String,
    message: String,
}

/// Execute an alias subcommand
pub async fn execute(cmd: AliasCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let manager = match AliasManager::new() {
        Ok(manager) => manager,
        Err(e) => return report(&formatter, &e),
    };

    match cmd {
        AliasCommands::Set(args) => execute_set(args, &manager, &formatter),
        AliasCommands::List(args) => execute_list(args, &manager, &formatter),
        AliasCommands::Remove(args) => execute_remove(args, &manager, &formatter),
    }
}

fn execute_set(args: SetArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    let name = args.name.clone();
    let alias = Alias::new(args.name, args.endpoint, args.key_id, args.application_key);

    let result = if args.no_clobber {
        manager.add(alias)
    } else {
        manager.set(alias)
    };

    match result {
        Ok(()) => {
            let message = format!("Alias '{name}' configured successfully");
            if formatter.is_json() {
                formatter.json(&AliasOperationOutput {
                    success: true,
                    alias: name,
                    message,
                });
            } else {
                formatter.success(&message);
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, &e),
    }
}

fn execute_list(args: ListArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    let aliases = match manager.list() {
        Ok(aliases) => aliases,
        Err(e) => return report(formatter, &e),
    };

    if formatter.is_json() {
        formatter.json(&AliasListOutput {
            aliases: aliases.iter().map(AliasInfo::from).collect(),
        });
    } else if aliases.is_empty() {
        formatter.println("No aliases configured.");
    } else {
        for alias in &aliases {
            if args.long {
                formatter.println(&format!(
                    "{:<12} {} {}",
                    alias.name,
                    alias.endpoint,
                    formatter.dim(&format!("(key id: {})", alias.key_id))
                ));
            } else {
                formatter.println(&format!("{:<12} {}", alias.name, alias.endpoint));
            }
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    match manager.remove(&args.name) {
        Ok(()) => {
            let message = format!("Alias '{}' removed successfully", args.name);
            if formatter.is_json() {
                formatter.json(&AliasOperationOutput {
                    success: true,
                    alias: args.name,
                    message,
                });
            } else {
                formatter.success(&message);
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bz_core::ConfigManager;
    use tempfile::TempDir;

    fn manager() -> (AliasManager, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = ConfigManager::with_path(dir.path().join("config.toml"));
        let manager = AliasManager::with_config_manager(config);
        (manager, dir)
    }

    fn set_args(name: &str, no_clobber: bool) -> SetArgs {
        SetArgs {
            name: name.to_string(),
            key_id: "key-id".to_string(),
            application_key: "app-key".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            no_clobber,
        }
    }

    #[test]
    fn test_alias_info_hides_key() {
        let alias = Alias::new("b2", DEFAULT_ENDPOINT, "key-id", "secret");
        let json = serde_json::to_string(&AliasInfo::from(&alias)).unwrap();
        assert!(json.contains("key-id"));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_set_then_no_clobber_conflicts() {
        let (manager, _dir) = manager();
        let formatter = Formatter::new(OutputConfig {
            quiet: true,
            ..Default::default()
        });

        assert_eq!(execute_set(set_args("b2", false), &manager, &formatter), ExitCode::Success);
        assert_eq!(execute_set(set_args("b2", false), &manager, &formatter), ExitCode::Success);
        assert_eq!(execute_set(set_args("b2", true), &manager, &formatter), ExitCode::Conflict);
    }

    #[test]
    fn test_invalid_name_is_usage_error() {
        let (manager, _dir) = manager();
        let formatter = Formatter::new(OutputConfig {
            quiet: true,
            ..Default::default()
        });
        assert_eq!(
            execute_set(set_args("bad/name", false), &manager, &formatter),
            ExitCode::UsageError
        );
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let (manager, _dir) = manager();
        let formatter = Formatter::new(OutputConfig {
            quiet: true,
            ..Default::default()
        });
        let args = RemoveArgs {
            name: "missing".into(),
        };
        assert_eq!(execute_remove(args, &manager, &formatter), ExitCode::NotFound);
    }
}
