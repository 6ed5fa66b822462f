use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["igscrape"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn run_defaults_to_config_values() {
    let cli = Cli::try_parse_from(["igscrape", "run"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Run {
            input: None,
            output: None,
            post_limit: None,
            dry_run: false
        })
    ));
}

#[test]
fn run_accepts_overrides() {
    let cli = Cli::try_parse_from([
        "igscrape",
        "run",
        "--input",
        "items.csv",
        "--output",
        "out.json",
        "--post-limit",
        "12",
        "--dry-run",
    ])
    .expect("expected valid cli args");

    let Some(Commands::Run {
        input,
        output,
        post_limit,
        dry_run,
    }) = cli.command
    else {
        panic!("expected run command");
    };
    assert_eq!(input, Some(PathBuf::from("items.csv")));
    assert_eq!(output, Some(PathBuf::from("out.json")));
    assert_eq!(post_limit, Some(12));
    assert!(dry_run);
}

#[test]
fn run_rejects_negative_post_limit() {
    let result = Cli::try_parse_from(["igscrape", "run", "--post-limit", "-1"]);
    assert!(result.is_err());
}

#[test]
fn login_without_backend_targets_all() {
    let cli = Cli::try_parse_from(["igscrape", "login"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Login { backend: None })
    ));
}

#[test]
fn login_parses_backend_name() {
    let cli = Cli::try_parse_from(["igscrape", "login", "--backend", "web"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Login {
            backend: Some(BackendId::Web)
        })
    ));
}

#[test]
fn login_rejects_unknown_backend() {
    let result = Cli::try_parse_from(["igscrape", "login", "--backend", "desktop"]);
    assert!(result.is_err());
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}
