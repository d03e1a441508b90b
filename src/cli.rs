//! Command line definitions for the `dbsake` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::mycnf::MySQLTarget;

#[derive(Parser)]
#[command(
    name = "dbsake",
    version,
    about = "Offline MySQL administration toolkit"
)]
pub struct Cli {
    /// Only report warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Stream,
    Directory,
}

#[derive(Subcommand)]
pub enum Command {
    /// Dump .frm files as CREATE TABLE / CREATE VIEW statements
    Frmdump {
        /// Annotate columns with their raw MYSQL_TYPE_* codes
        #[arg(short = 't', long)]
        type_codes: bool,

        /// Output CREATE OR REPLACE for views
        #[arg(short = 'R', long)]
        replace: bool,

        /// Walk directories for .frm files
        #[arg(short = 'r', long)]
        recursive: bool,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Decode MySQL-encoded file names to table names
    DecodeTablename {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Encode table names to MySQL file names
    EncodeTablename {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Filter and transform mysqldump output
    Sieve {
        /// Select the output format
        #[arg(short = 'F', long = "format", value_enum, default_value = "stream")]
        format: FormatArg,

        /// Output directory when --format=directory
        #[arg(short = 'C', long, default_value = ".")]
        directory: PathBuf,

        /// Input file to process instead of stdin
        #[arg(short = 'i', long, default_value = "-")]
        input_file: String,

        /// Compression command for directory output (e.g. "gzip -1")
        #[arg(short = 'z', long)]
        compress_command: Option<String>,

        /// Only output tables matching the glob
        #[arg(short = 't', long = "table")]
        table: Vec<String>,

        /// Exclude tables matching the glob
        #[arg(short = 'T', long = "exclude-table")]
        exclude_table: Vec<String>,

        /// Add secondary indexes after loading table data
        #[arg(long)]
        defer_indexes: bool,

        /// Add foreign key constraints after loading table data
        #[arg(long)]
        defer_foreign_keys: bool,

        #[arg(long, overrides_with = "no_write_binlog")]
        write_binlog: bool,
        /// Disable binary logging during restore
        #[arg(long)]
        no_write_binlog: bool,

        #[arg(long, overrides_with = "no_table_schema")]
        table_schema: bool,
        /// Exclude table schema from output
        #[arg(long)]
        no_table_schema: bool,

        #[arg(long, overrides_with = "no_table_data")]
        table_data: bool,
        /// Exclude table data from output
        #[arg(long)]
        no_table_data: bool,

        #[arg(long, overrides_with = "no_routines")]
        routines: bool,
        /// Exclude stored routines from output
        #[arg(long)]
        no_routines: bool,

        #[arg(long, overrides_with = "no_events")]
        events: bool,
        /// Exclude events from output
        #[arg(long)]
        no_events: bool,

        #[arg(long, overrides_with = "no_triggers")]
        triggers: bool,
        /// Exclude triggers from output
        #[arg(long)]
        no_triggers: bool,

        #[arg(long, overrides_with = "no_master_data")]
        master_data: bool,
        /// Comment out CHANGE MASTER in the output
        #[arg(long)]
        no_master_data: bool,

        /// Force output on stdout, even to a terminal
        #[arg(short = 'O', long)]
        to_stdout: bool,
    },

    /// Unpack a tar or xbstream MySQL backup archive
    Unpack {
        /// List archive contents instead of extracting
        #[arg(short = 'l', long)]
        list_contents: bool,

        /// Directory to extract to
        #[arg(short = 'C', long, default_value = ".")]
        directory: PathBuf,

        /// Only extract tables matching the glob
        #[arg(short = 't', long = "table")]
        table: Vec<String>,

        /// Exclude tables matching the glob
        #[arg(short = 'T', long = "exclude-table")]
        exclude_table: Vec<String>,

        #[arg(long, overrides_with = "no_progress")]
        progress: bool,
        /// Disable progress reporting
        #[arg(long)]
        no_progress: bool,

        /// Archive path, or '-' for stdin
        #[arg(default_value = "-")]
        path: String,
    },

    /// Upgrade a my.cnf to a target MySQL version
    UpgradeMycnf {
        /// Option file to upgrade
        #[arg(short = 'c', long, default_value = "/etc/my.cnf")]
        config: PathBuf,

        /// MySQL version to target
        #[arg(short = 't', long, value_enum, default_value = "5.5")]
        target: MySQLTarget,

        /// Output a unified diff rather than the full config
        #[arg(short = 'p', long)]
        patch: bool,
    },

    /// Report OS page cache residency for files
    Fincore {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Drop files from the OS page cache
    Uncache {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Provision a MySQL sandbox instance
    Sandbox,
}

/// Resolve a --flag/--no-flag pair into a tri-state.
pub fn tri_state(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}
