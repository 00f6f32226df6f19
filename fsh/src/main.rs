//! Interactive shell over a fatvol disk image.
//!
//! One command per line. `format` creates and initializes an image file,
//! `open` attaches one, and the rest operate on the attached volume through
//! its working-directory cursor.

mod logger;

use std::io::{BufRead, Write};

use log::{error, info, warn};
use owo_colors::OwoColorize;

use fatvol::{FileContainer, FormatOptions, FsResult, Volume};

fn main() {
    if let Err(e) = logger::init() {
        eprintln!("logger init failed: {e}");
    }
    let code = run();
    std::process::exit(code);
}

fn run() -> i32 {
    let stdin = std::io::stdin();
    let mut session: Option<Volume<FileContainer>> = None;
    loop {
        print_prompt(&mut session);
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return 0,
            Ok(_) => {}
            Err(e) => {
                error!("stdin: {e}");
                return 1;
            }
        }
        let tokens = tokenize(&line);
        let Some((command, args)) = tokens.split_first() else {
            continue;
        };
        match dispatch(&mut session, command, args) {
            Ok(Control::Continue) => {}
            Ok(Control::Exit) => return 0,
            Err(e) if e.is_fatal() => {
                // The image can no longer be trusted; drop the session and
                // bail rather than write through a broken structure.
                error!("fatal: {e}");
                return 1;
            }
            Err(e) => error!("{command}: {e}"),
        }
    }
}

enum Control {
    Continue,
    Exit,
}

fn print_prompt(session: &mut Option<Volume<FileContainer>>) {
    let prompt = match session {
        Some(vol) => match vol.pwd() {
            Ok(path) if path == "/" => "~$ ".to_owned(),
            Ok(path) => format!("~{path}$ "),
            Err(_) => "~?$ ".to_owned(),
        },
        None => "fsh> ".to_owned(),
    };
    print!("{prompt}");
    let _ = std::io::stdout().flush();
}

fn dispatch(
    session: &mut Option<Volume<FileContainer>>,
    command: &str,
    args: &[String],
) -> FsResult<Control> {
    match command {
        "format" => {
            let [path, bytes] = args else {
                warn!("usage: format <file> <bytes>");
                return Ok(Control::Continue);
            };
            let Ok(bytes) = bytes.parse::<u64>() else {
                warn!("size must be a byte count");
                return Ok(Control::Continue);
            };
            if session.is_some() {
                warn!("close the current volume first");
                return Ok(Control::Continue);
            }
            let container = FileContainer::create(path, bytes)?;
            match Volume::format(container, FormatOptions::default()) {
                Ok(vol) => *session = Some(vol),
                Err(e) => {
                    // Don't leave a half-made image behind; a retry with a
                    // corrected size would hit AlreadyExists.
                    let _ = std::fs::remove_file(path);
                    return Err(e);
                }
            }
            info!("formatted {path} ({bytes} bytes)");
            Ok(Control::Continue)
        }
        "open" => {
            let [path] = args else {
                warn!("usage: open <file>");
                return Ok(Control::Continue);
            };
            if session.is_some() {
                warn!("close the current volume first");
                return Ok(Control::Continue);
            }
            let container = FileContainer::open(path)?;
            *session = Some(Volume::open(container)?);
            info!("opened {path}");
            Ok(Control::Continue)
        }
        "close" => {
            match session.take() {
                Some(vol) => {
                    vol.close()?;
                    info!("volume closed");
                }
                None => warn!("no open volume"),
            }
            Ok(Control::Continue)
        }
        "help" => {
            print_help();
            Ok(Control::Continue)
        }
        "exit" => {
            if let Some(vol) = session.take() {
                vol.close()?;
            }
            Ok(Control::Exit)
        }
        _ => {
            let Some(vol) = session.as_mut() else {
                warn!("no open volume; use `format` or `open` first");
                return Ok(Control::Continue);
            };
            attached(vol, command, args)?;
            Ok(Control::Continue)
        }
    }
}

fn attached(vol: &mut Volume<FileContainer>, command: &str, args: &[String]) -> FsResult<()> {
    match (command, args) {
        ("mkdir", [path]) => vol.mkdir(path),
        ("touch", [path]) => vol.touch(path),
        ("rm", [path]) => vol.rm(path),
        ("cd", [path]) => vol.cd(path),
        ("pwd", []) => {
            println!("{}", vol.pwd()?);
            Ok(())
        }
        ("ls", args @ ([] | [_])) => {
            let path = args.first().map_or(".", |s| s.as_str());
            for entry in vol.ls(path)? {
                if entry.is_dir {
                    println!("{}", entry.name.bright_blue());
                } else {
                    println!("{}  {}", entry.name, entry.size);
                }
            }
            Ok(())
        }
        ("cat", [path]) => {
            let contents = vol.read(path)?;
            if contents.is_empty() {
                info!("{path} is empty");
                return Ok(());
            }
            let mut out = std::io::stdout().lock();
            out.write_all(&contents)?;
            if contents.last() != Some(&b'\n') {
                out.write_all(b"\n")?;
            }
            Ok(())
        }
        ("append", [path, rest @ ..]) if !rest.is_empty() => {
            let text = rest.join(" ");
            // One line per append, at most one cluster including the
            // terminating newline.
            let payload = vol.geometry().cluster_size as usize;
            if text.len() + 1 > payload {
                warn!("line too long: limit is {} bytes", payload - 1);
                return Ok(());
            }
            let mut data = text.into_bytes();
            data.push(b'\n');
            vol.append(path, &data)
        }
        ("mkdir" | "touch" | "rm" | "cd" | "cat", _) => {
            warn!("usage: {command} <path>");
            Ok(())
        }
        ("append", _) => {
            warn!("usage: append <path> <text>");
            Ok(())
        }
        ("pwd" | "ls", _) => {
            warn!("usage: {command}");
            Ok(())
        }
        _ => {
            warn!("unknown command `{command}`; try `help`");
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        "\
format <file> <bytes>   create and format a new image
open <file>             attach an existing image
close                   flush and detach the image
mkdir <path>            create a directory
cd <path>               change the working directory
ls [path]               list a directory
pwd                     print the working directory
touch <path>            create an empty file
cat <path>              print a file
append <path> <text>    append a line to a file
rm <path>               remove a file or empty directory
help                    this text
exit                    close the image and quit"
    );
}

/// Split a command line into tokens, honoring double quotes so names with
/// spaces survive.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen = false;
    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                seen = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen {
                    tokens.push(std::mem::take(&mut current));
                    seen = false;
                }
            }
            c => {
                current.push(c);
                seen = true;
            }
        }
    }
    if seen {
        tokens.push(current);
    }
    tokens
}
