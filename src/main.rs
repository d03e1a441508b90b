use std::io::{self, BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::{Level, debug, error};

use dbsake::cli::{Cli, Command, FormatArg, tri_state};
use dbsake::compression;
use dbsake::frm::{self, DumpOptions, tablename};
use dbsake::mycnf::{self, MycnfError};
use dbsake::sieve::{self, OutputFormat, SectionKind};
use dbsake::{fincore, unpack};

// sysexits(3) codes used by the command surface
const EX_USAGE: i32 = 64;
const EX_SOFTWARE: i32 = 70;
const EX_CONFIG: i32 = 78;
const EX_SIGPIPE: i32 = 128 + 13;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            use clap::error::ErrorKind;
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EX_USAGE,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let level = if cli.debug {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let code = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run(cli.command))) {
        Ok(Ok(code)) => code,
        Ok(Err(err)) => {
            let code = failure_exit_code(&err);
            if code == EX_SIGPIPE {
                debug!("broken pipe on output");
            } else {
                error!("{err:#}");
            }
            code
        }
        Err(_) => {
            error!("internal error; please report this at the issue tracker");
            EX_SOFTWARE
        }
    };
    std::process::exit(code);
}

fn failure_exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::BrokenPipe {
                return EX_SIGPIPE;
            }
        }
        if matches!(
            cause.downcast_ref::<MycnfError>(),
            Some(MycnfError::MissingConfig { .. })
        ) {
            return EX_CONFIG;
        }
    }
    1
}

fn run(command: Command) -> anyhow::Result<i32> {
    match command {
        Command::Frmdump {
            type_codes,
            replace,
            recursive,
            paths,
        } => cmd_frmdump(type_codes, replace, recursive, paths),
        Command::DecodeTablename { names } => cmd_decode_tablename(names),
        Command::EncodeTablename { names } => cmd_encode_tablename(names),
        Command::Sieve { .. } => cmd_sieve(command),
        Command::Unpack {
            list_contents,
            directory,
            table,
            exclude_table,
            progress,
            no_progress: _,
            path,
        } => cmd_unpack(list_contents, directory, table, exclude_table, progress, path),
        Command::UpgradeMycnf {
            config,
            target,
            patch,
        } => cmd_upgrade_mycnf(config, target, patch),
        Command::Fincore { paths } => cmd_fincore(paths, false),
        Command::Uncache { paths } => cmd_fincore(paths, true),
        Command::Sandbox => {
            error!("sandbox provisioning is not part of this build");
            Ok(EX_USAGE)
        }
    }
}

fn collect_frm_files(dir: &Path, found: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_frm_files(&path, found)?;
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("frm") {
            found.push(path);
        }
    }
    Ok(())
}

fn cmd_frmdump(
    type_codes: bool,
    replace: bool,
    recursive: bool,
    paths: Vec<PathBuf>,
) -> anyhow::Result<i32> {
    let options = DumpOptions {
        type_codes,
        replace,
    };
    let mut failures = 0u64;
    let mut targets = Vec::new();
    for path in paths {
        if path.is_dir() {
            if recursive {
                collect_frm_files(&path, &mut targets)
                    .with_context(|| format!("walking '{}'", path.display()))?;
            } else {
                error!("'{}' is a directory (use --recursive)", path.display());
                failures += 1;
            }
        } else {
            targets.push(path);
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for path in &targets {
        match frm::parse(path) {
            Ok(object) => {
                out.write_all(object.format(&options).as_bytes())?;
                out.write_all(b"\n")?;
            }
            Err(err) => {
                error!("{err}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        error!("{failures} file(s) failed");
        Ok(1)
    } else {
        Ok(0)
    }
}

fn cmd_decode_tablename(names: Vec<String>) -> anyhow::Result<i32> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failures = 0;
    for name in &names {
        match tablename::decode(name) {
            Ok(decoded) => writeln!(out, "{decoded}")?,
            Err(err) => {
                error!("{err}");
                failures += 1;
            }
        }
    }
    Ok(if failures > 0 { 1 } else { 0 })
}

fn cmd_encode_tablename(names: Vec<String>) -> anyhow::Result<i32> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in &names {
        writeln!(out, "{}", tablename::encode(name))?;
    }
    Ok(0)
}

fn cmd_sieve(command: Command) -> anyhow::Result<i32> {
    let Command::Sieve {
        format,
        directory,
        input_file,
        compress_command,
        table,
        exclude_table,
        defer_indexes,
        defer_foreign_keys,
        write_binlog,
        no_write_binlog,
        table_schema,
        no_table_schema,
        table_data,
        no_table_data,
        routines,
        no_routines,
        events,
        no_events,
        triggers,
        no_triggers,
        master_data,
        no_master_data,
        to_stdout,
    } = command
    else {
        unreachable!("dispatched on Command::Sieve");
    };

    let output_format = match format {
        FormatArg::Stream => OutputFormat::Stream,
        FormatArg::Directory => OutputFormat::Directory,
    };
    if output_format == OutputFormat::Stream && io::stdout().is_terminal() && !to_stdout {
        error!(
            "stdout appears to be a terminal and --format=stream. \
             Use -O/--to-stdout to force output or redirect to a file. Aborting."
        );
        return Ok(EX_USAGE);
    }

    let mut options = sieve::Options {
        output_format,
        directory,
        table,
        exclude_table,
        sections: Vec::new(),
        exclude_sections: Vec::new(),
        defer_indexes,
        defer_foreign_keys,
        write_binlog: tri_state(write_binlog, no_write_binlog).unwrap_or(true),
        master_data: tri_state(master_data, no_master_data),
        compress_command,
    };

    if tri_state(table_schema, no_table_schema) == Some(false) {
        options.exclude_section(SectionKind::TableStructure);
    }
    if tri_state(table_data, no_table_data) == Some(false) {
        options.exclude_section(SectionKind::TableData);
        if options.defer_indexes {
            error!("disabling index deferment since --no-table-data requested");
            options.defer_indexes = false;
            options.defer_foreign_keys = false;
        }
    }
    if tri_state(routines, no_routines) == Some(false) {
        options.exclude_section(SectionKind::Routines);
    }
    if tri_state(events, no_events) == Some(false) {
        options.exclude_section(SectionKind::Events);
    }
    if tri_state(triggers, no_triggers) == Some(false) {
        options.exclude_section(SectionKind::Triggers);
    }

    let source = if input_file == "-" {
        None
    } else {
        Some(Path::new(input_file.as_str()))
    };
    let input = compression::open_input(source)
        .with_context(|| format!("opening '{input_file}'"))?;
    let mut reader = BufReader::new(input);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let stats = sieve::sieve(&options, &mut reader, &mut out)?;
    out.flush()?;
    reader.into_inner().finish()?;

    let name = if input_file == "-" {
        "<stdin>"
    } else {
        input_file.as_str()
    };
    eprintln!(
        "Processed {name}. Output: {} database(s) {} table(s) and {} view(s)",
        stats
            .get(&SectionKind::CreateDatabase)
            .copied()
            .unwrap_or(1),
        stats
            .get(&SectionKind::TableStructure)
            .copied()
            .unwrap_or(0),
        stats.get(&SectionKind::View).copied().unwrap_or(0),
    );
    Ok(0)
}

fn cmd_unpack(
    list_contents: bool,
    directory: PathBuf,
    table: Vec<String>,
    exclude_table: Vec<String>,
    progress: bool,
    path: String,
) -> anyhow::Result<i32> {
    if progress {
        debug!("progress reporting is not implemented; continuing without it");
    }
    let source = if path == "-" {
        None
    } else {
        Some(Path::new(path.as_str()))
    };
    let stream = compression::open_input(source)
        .with_context(|| format!("opening '{path}'"))?;
    let options = unpack::Options {
        destination: directory,
        include_tables: table,
        exclude_tables: exclude_table,
        list_contents,
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    unpack::unpack(&options, stream, &mut out)?;
    out.flush()?;
    Ok(0)
}

fn cmd_upgrade_mycnf(
    config: PathBuf,
    target: mycnf::MySQLTarget,
    patch: bool,
) -> anyhow::Result<i32> {
    let output = mycnf::upgrade(&config, target, patch)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    out.write_all(output.as_bytes())?;
    out.flush()?;
    Ok(0)
}

fn cmd_fincore(paths: Vec<PathBuf>, drop: bool) -> anyhow::Result<i32> {
    let mut failures = 0;
    for path in &paths {
        let result = if drop {
            fincore::uncache(path)
        } else {
            fincore::fincore(path)
        };
        if let Err(err) = result {
            error!("{}: {err}", path.display());
            failures += 1;
        }
    }
    Ok(if failures > 0 { 1 } else { 0 })
}
