//! Integration tests for the sync engine and CLI surface

mod cli_parsing;
mod multi_run;
mod sync_engine;
