//! External compressor/decompressor plumbing.
//!
//! Compression is delegated to the usual command line tools (pigz,
//! gzip, pbzip2, xz, ...) found on PATH. A child is always scoped: its
//! pipe end is closed before the wait, and a non-zero exit surfaces as
//! [`CommandError`].

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use thiserror::Error;
use tracing::debug;

use crate::util::{shell_quote, shell_split};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no decompression command found for '{ext}'")]
    NoCommand { ext: String },
    #[error("invalid command line: {0:?}")]
    BadCommandLine(String),
    #[error("command '{command}' exited with {status}")]
    Failed { command: String, status: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Extension to decompressor candidates, in preference order.
const COMPRESSION_LOOKUP: &[(&str, &[&str])] = &[
    (".gz", &["pigz", "gzip"]),
    (".bz2", &["pbzip2", "bzip2", "lbzip2"]),
    (".lzo", &["lzop"]),
    (".xz", &["pxz", "xz"]),
    (".lzma", &["xz", "lzma"]),
];

/// Extension to leading magic bytes.
const COMPRESSION_MAGIC: &[(&str, &[u8])] = &[
    (".gz", &[0x1f, 0x8b]),
    (".bz2", b"BZh"),
    (".lzo", &[0x89, 0x4c, 0x5a, 0x4f, 0x00, 0x0d, 0x0a, 0x1a, 0x0a]),
    (".xz", &[0xfd, b'7', b'z', b'X', b'Z', 0x00]),
];

/// Canonical output extension for a compression command name.
pub fn extension_for_command(command: &str) -> &'static str {
    let program = shell_split(command)
        .and_then(|argv| argv.into_iter().next())
        .unwrap_or_default();
    let base = Path::new(&program)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("");
    match base {
        "gzip" | "pigz" => ".gz",
        "bzip2" | "lbzip2" | "pbzip2" => ".bz2",
        "lzop" => ".lzo",
        "xz" | "pxz" => ".xz",
        "lzma" => ".lzma",
        _ => "",
    }
}

/// Search PATH for an executable.
pub fn which(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Pick the first available decompressor for a filename extension.
pub fn ext_to_command(ext: &str) -> Result<PathBuf, CommandError> {
    let candidates = COMPRESSION_LOOKUP
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, candidates)| *candidates)
        .ok_or_else(|| CommandError::NoCommand {
            ext: ext.to_string(),
        })?;
    candidates
        .iter()
        .find_map(|name| which(name))
        .ok_or_else(|| CommandError::NoCommand {
            ext: ext.to_string(),
        })
}

/// Sniff a compression extension from leading magic bytes.
pub fn magic_to_ext(header: &[u8]) -> Option<&'static str> {
    COMPRESSION_MAGIC
        .iter()
        .find(|(_, magic)| header.starts_with(magic))
        .map(|&(ext, _)| ext)
}

/// Known compression extension of a path, if any.
pub fn path_extension(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_str()?;
    COMPRESSION_LOOKUP
        .iter()
        .map(|&(ext, _)| ext)
        .find(|ext| name.ends_with(ext))
}

/// Render an argv for logs and error messages, quoting where needed.
fn render_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| shell_quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn spawn(argv: &[String], stdin: Stdio, stdout: Stdio) -> Result<Child, CommandError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| CommandError::BadCommandLine(String::new()))?;
    let mut command = Command::new(program);
    command.args(args).stdin(stdin).stdout(stdout);
    restore_sigpipe(&mut command);
    debug!(command = %render_command(argv), "spawning");
    Ok(command.spawn()?)
}

/// Compression tools write to pipes; give them back the default SIGPIPE
/// disposition the Rust runtime masks.
#[cfg(unix)]
fn restore_sigpipe(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        command.pre_exec(|| {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn restore_sigpipe(_command: &mut Command) {}

fn check_status(command: &str, status: std::process::ExitStatus) -> Result<(), CommandError> {
    if status.success() {
        Ok(())
    } else {
        Err(CommandError::Failed {
            command: command.to_string(),
            status: status.to_string(),
        })
    }
}

/// A decompressor child whose stdout is read by the caller.
pub struct DecompressedReader {
    child: Child,
    stdout: Option<ChildStdout>,
    pump: Option<JoinHandle<io::Result<()>>>,
    command: String,
}

impl DecompressedReader {
    /// Decompress a regular file: the child reads the file descriptor
    /// directly.
    pub fn from_file(file: File, ext: &str) -> Result<DecompressedReader, CommandError> {
        let program = ext_to_command(ext)?;
        let argv = vec![program.display().to_string(), "-dc".to_string()];
        let mut child = spawn(&argv, Stdio::from(file), Stdio::piped())?;
        let stdout = child.stdout.take();
        Ok(DecompressedReader {
            child,
            stdout,
            pump: None,
            command: render_command(&argv),
        })
    }

    /// Decompress a non-seekable stream (already partially read into
    /// `header`); a helper thread feeds the child's stdin.
    pub fn from_stream(
        header: Vec<u8>,
        stream: Box<dyn Read + Send>,
        ext: &str,
    ) -> Result<DecompressedReader, CommandError> {
        let program = ext_to_command(ext)?;
        let argv = vec![program.display().to_string(), "-dc".to_string()];
        let mut child = spawn(&argv, Stdio::piped(), Stdio::piped())?;
        let stdout = child.stdout.take();
        let mut stdin = child.stdin.take().expect("piped stdin");
        let mut stream = stream;
        let pump = std::thread::spawn(move || -> io::Result<()> {
            stdin.write_all(&header)?;
            io::copy(&mut stream, &mut stdin)?;
            Ok(())
        });
        Ok(DecompressedReader {
            child,
            stdout,
            pump: Some(pump),
            command: render_command(&argv),
        })
    }

    /// Close the stream and reap the child.
    pub fn finish(mut self) -> Result<(), CommandError> {
        self.stdout.take();
        if let Some(pump) = self.pump.take() {
            // EPIPE from the feeder just means the child stopped reading
            match pump.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.kind() == io::ErrorKind::BrokenPipe => {}
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => {
                    return Err(CommandError::Failed {
                        command: self.command.clone(),
                        status: "feeder thread panicked".to_string(),
                    });
                }
            }
        }
        let status = self.child.wait()?;
        check_status(&self.command, status)
    }
}

impl Read for DecompressedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.stdout {
            Some(stdout) => stdout.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for DecompressedReader {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// An input stream that may or may not be running through an external
/// decompressor.
pub enum InputStream {
    Plain(crate::util::PeekReader<Box<dyn Read + Send>>),
    Decompressed(DecompressedReader),
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            InputStream::Plain(reader) => reader.read(buf),
            InputStream::Decompressed(reader) => reader.read(buf),
        }
    }
}

impl InputStream {
    /// Reap the decompressor, if one was spawned.
    pub fn finish(self) -> Result<(), CommandError> {
        match self {
            InputStream::Plain(_) => Ok(()),
            InputStream::Decompressed(reader) => reader.finish(),
        }
    }
}

/// Wrap a stream in a decompressor when its leading bytes carry a known
/// compression magic; pass it through untouched otherwise.
pub fn maybe_decompress(stream: Box<dyn Read + Send>) -> Result<InputStream, CommandError> {
    // longest magic is 9 bytes (lzop)
    let peek = crate::util::PeekReader::new(stream, 9)?;
    match magic_to_ext(peek.peeked()) {
        Some(ext) => {
            debug!(ext, "input is compressed");
            let (header, inner) = peek.into_parts();
            Ok(InputStream::Decompressed(DecompressedReader::from_stream(
                header, inner, ext,
            )?))
        }
        None => Ok(InputStream::Plain(peek)),
    }
}

/// Open `path` (or stdin when `None`) with transparent decompression.
/// Regular files are handed straight to the decompressor as its stdin;
/// pipes are sniffed and fed through.
pub fn open_input(path: Option<&Path>) -> Result<InputStream, CommandError> {
    use std::io::Seek;

    let Some(path) = path else {
        return maybe_decompress(Box::new(io::stdin()));
    };
    let mut file = File::open(path)?;
    let mut magic = [0u8; 9];
    let mut filled = 0;
    while filled < magic.len() {
        let n = file.read(&mut magic[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    file.rewind()?;
    match magic_to_ext(&magic[..filled]).or_else(|| path_extension(path)) {
        Some(ext) => {
            debug!(ext, path = %path.display(), "decompressing input file");
            Ok(InputStream::Decompressed(DecompressedReader::from_file(
                file, ext,
            )?))
        }
        None => Ok(InputStream::Plain(crate::util::PeekReader::new(
            Box::new(file) as Box<dyn Read + Send>,
            0,
        )?)),
    }
}

/// A compressor child writing to a file; the caller writes into its
/// stdin.
pub struct CompressedWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    command: String,
}

impl CompressedWriter {
    pub fn spawn(command_line: &str, output: File) -> Result<CompressedWriter, CommandError> {
        let argv = shell_split(command_line)
            .filter(|argv| !argv.is_empty())
            .ok_or_else(|| CommandError::BadCommandLine(command_line.to_string()))?;
        let mut child = spawn(&argv, Stdio::piped(), Stdio::from(output))?;
        let stdin = child.stdin.take().expect("piped stdin");
        Ok(CompressedWriter {
            child,
            stdin: Some(stdin),
            command: command_line.to_string(),
        })
    }

    /// Close stdin and wait for the compressor to flush and exit.
    pub fn finish(mut self) -> Result<(), CommandError> {
        self.stdin.take();
        let status = self.child.wait()?;
        check_status(&self.command, status)
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.stdin {
            Some(stdin) => stdin.write(buf),
            None => Err(io::Error::from(io::ErrorKind::BrokenPipe)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.stdin {
            Some(stdin) => stdin.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for CompressedWriter {
    fn drop(&mut self) {
        self.stdin.take();
        let _ = self.child.wait();
    }
}
