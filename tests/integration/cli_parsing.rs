use clap::{CommandFactory, Parser};
use notesync::cli::{Cli, Commands, OutputFormat};

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["notesync", "sync"],
        vec!["notesync", "--workspace", "/tmp/notes", "sync"],
        vec!["notesync", "diff"],
        vec!["notesync", "diff", "--format", "json"],
        vec!["notesync", "check"],
        vec!["notesync", "hash", "note.md"],
        vec!["notesync", "--config", "cfg.toml", "--log-format", "json", "check"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_invalid_input() {
    assert!(Cli::try_parse_from(["notesync"]).is_err());
    assert!(Cli::try_parse_from(["notesync", "diff", "--format", "yaml"]).is_err());
    assert!(Cli::try_parse_from(["notesync", "hash"]).is_err());
}

#[test]
fn diff_defaults_to_text() {
    let cli = Cli::parse_from(["notesync", "diff"]);
    assert!(matches!(
        cli.command,
        Commands::Diff {
            format: OutputFormat::Text
        }
    ));
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}
