//! Command-line front-end.
//!
//! One command per invocation, or a stream of commands in interactive mode.
//! Query output and error reports both go to stdout; errors are printed as
//! `Error: <msg>` by the binary, which exits 1.

use crate::codec::DataType;
use crate::error::{Error, Result};
use crate::output::DbOut;
use crate::schema::Schema;
use crate::store::{DbPool, DupPolicy, OpenMode};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

const COMMAND_HELP: &str = "\
Commands:
  create <name> [<data_fmt>] [<description>]
      -- create a database (default format: DOUBLE)
  delete <name>
      -- delete a database
  rename <old_name> <new_name>
      -- rename a database
  set_descr <name> <description>
      -- change the database description
  info <name>
      -- print tab-separated time format, data format and description
  list
      -- list all databases in the data folder
  put <name> <time> <value1> ... <valueN>
      -- write a data point
  get <name>[:N] [<time>]
      -- get the previous or interpolated point
  get_next <name>[:N] [<time1>]
      -- get the next point after time1
  get_prev <name>[:N] [<time2>]
      -- get the previous point before time2
  get_range <name>[:N] [<time1>] [<time2>] [<dt>]
      -- get points in the time range
  del <name> <time>
      -- delete one data point
  del_range <name> <time1> <time2>
      -- delete all points in the time range
  interactive
      -- interactive mode, commands are read from stdin
  sync
      -- flush and close all opened databases
";

/// Program options and the command with its parameters.
#[derive(Parser, Debug)]
#[command(
    name = "tslite",
    about = "command line interface to the TSLite time series database",
    after_help = COMMAND_HELP
)]
pub struct Cli {
    /// Database directory.
    #[arg(short = 'd', value_name = "path", default_value = "/var/lib/tslite")]
    pub dbpath: PathBuf,

    /// What to do with duplicated timestamps:
    /// replace, skip, error, sshift, nsshift.
    #[arg(
        short = 'D',
        value_name = "policy",
        default_value = "replace",
        value_parser = parse_policy
    )]
    pub dpolicy: DupPolicy,

    /// Command and its parameters.
    #[arg(
        value_name = "command",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,
}

fn parse_policy(s: &str) -> std::result::Result<DupPolicy, String> {
    s.parse().map_err(|e: Error| e.to_string())
}

/// Opens the pool and runs the parsed command.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let mut pool = DbPool::open(&cli.dbpath)?;
    run_command(&mut pool, cli.dpolicy, &cli.args, out, false)
}

fn need(args: &[String], min: usize, max: usize, expected: &str) -> Result<()> {
    if args.len() < min {
        return Err(Error::Usage(expected.to_string()));
    }
    if args.len() > max {
        return Err(Error::Usage("too many parameters".to_string()));
    }
    Ok(())
}

/// Splits a `<name>[:N]` dataset spec into the name and the column index.
fn split_col(spec: &str) -> Result<(String, Option<usize>)> {
    match spec.rsplit_once(':') {
        Some((name, col)) => {
            let col = col
                .parse::<usize>()
                .map_err(|_| Error::Usage(format!("bad column number: {col}")))?;
            Ok((name.to_string(), Some(col)))
        }
        None => Ok((spec.to_string(), None)),
    }
}

/// Runs one command against the pool, writing query output to `out`.
pub fn run_command(
    pool: &mut DbPool,
    policy: DupPolicy,
    args: &[String],
    out: &mut dyn Write,
    interactive: bool,
) -> Result<()> {
    let Some(cmd) = args.first() else {
        return Ok(());
    };

    match cmd.to_ascii_lowercase().as_str() {
        "create" => {
            need(args, 2, 4, "database name expected")?;
            let dtype = match args.get(2) {
                Some(fmt) => DataType::from_name(fmt)?,
                None => DataType::Double,
            };
            let descr = args.get(3).cloned().unwrap_or_default();
            pool.create(&args[1], Schema::new(dtype, descr))?;
            Ok(())
        }

        "delete" => {
            need(args, 2, 2, "database name expected")?;
            pool.remove(&args[1])
        }

        "rename" => {
            need(args, 3, 3, "database old and new names expected")?;
            pool.rename(&args[1], &args[2])
        }

        "set_descr" => {
            need(args, 3, 3, "database name and new description text expected")?;
            let db = pool.get(&args[1], OpenMode::ReadWrite)?;
            let mut info = db.read_info().clone();
            info.descr = args[2].clone();
            db.write_info(info)
        }

        "info" => {
            need(args, 2, 2, "database name expected")?;
            let db = pool.get(&args[1], OpenMode::ReadOnly)?;
            let info = db.read_info();
            if info.descr.is_empty() {
                writeln!(out, "{}\t{}", info.ttype.name(), info.dtype.name())?;
            } else {
                writeln!(
                    out,
                    "{}\t{}\t{}",
                    info.ttype.name(),
                    info.dtype.name(),
                    info.descr
                )?;
            }
            Ok(())
        }

        "list" => {
            need(args, 1, 1, "")?;
            for name in pool.list()? {
                writeln!(out, "{name}")?;
            }
            Ok(())
        }

        "put" => {
            need(args, 4, usize::MAX, "database name, timestamp and some values expected")?;
            let db = pool.get(&args[1], OpenMode::ReadWrite)?;
            db.put(&args[2], &args[3..], policy)
        }

        "get_next" => {
            need(args, 2, 3, "database name expected")?;
            let t1 = args.get(2).map(String::as_str).unwrap_or("0");
            let (name, col) = split_col(&args[1])?;
            let db = pool.get(&name, OpenMode::ReadOnly)?;
            let mut sink = DbOut::new(&mut *out).with_column(col);
            db.get_next(t1, &mut sink)
        }

        "get_prev" => {
            need(args, 2, 3, "database name expected")?;
            let t2 = args.get(2).map(String::as_str).unwrap_or("inf");
            let (name, col) = split_col(&args[1])?;
            let db = pool.get(&name, OpenMode::ReadOnly)?;
            let mut sink = DbOut::new(&mut *out).with_column(col);
            db.get_prev(t2, &mut sink)
        }

        "get" => {
            need(args, 2, 3, "database name expected")?;
            let t = args.get(2).map(String::as_str).unwrap_or("inf");
            let (name, col) = split_col(&args[1])?;
            let db = pool.get(&name, OpenMode::ReadOnly)?;
            let mut sink = DbOut::new(&mut *out).with_column(col);
            db.get(t, &mut sink)
        }

        "get_range" => {
            need(args, 2, 5, "database name expected")?;
            let t1 = args.get(2).map(String::as_str).unwrap_or("0");
            let t2 = args.get(3).map(String::as_str).unwrap_or("inf");
            let dt = args.get(4).map(String::as_str).unwrap_or("0");
            let (name, col) = split_col(&args[1])?;
            let db = pool.get(&name, OpenMode::ReadOnly)?;
            let mut sink = DbOut::new(&mut *out).with_column(col);
            db.get_range(t1, t2, dt, &mut sink)
        }

        "del" => {
            need(args, 3, 3, "database name and time expected")?;
            let db = pool.get(&args[1], OpenMode::ReadWrite)?;
            db.del(&args[2])
        }

        "del_range" => {
            need(args, 4, 4, "database name and two times expected")?;
            let db = pool.get(&args[1], OpenMode::ReadWrite)?;
            db.del_range(&args[2], &args[3])
        }

        "interactive" => {
            if interactive {
                return Err(Error::Usage(
                    "Command can not be run in interactive mode".to_string(),
                ));
            }
            need(args, 1, 1, "")?;
            run_interactive(pool, policy, std::io::stdin().lock(), out)
        }

        "sync" => {
            need(args, 1, 1, "")?;
            pool.sync_all()?;
            pool.close_all();
            Ok(())
        }

        _ => Err(Error::Usage(format!("Unknown command: {cmd}"))),
    }
}

/// Interactive mode: one command per input line, `OK` on success, errors
/// reported inline without terminating the stream.
pub fn run_interactive(
    pool: &mut DbPool,
    policy: DupPolicy,
    input: impl BufRead,
    out: &mut dyn Write,
) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if words.is_empty() {
            continue;
        }
        match run_command(pool, policy, &words, &mut *out, true) {
            Ok(()) => writeln!(out, "OK")?,
            Err(e) => writeln!(out, "Error: {e}")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_parsing() {
        let cli = Cli::try_parse_from([
            "tslite", "-d", "/tmp/data", "-D", "skip", "put", "x", "now", "-1",
        ])
        .unwrap();
        assert_eq!(cli.dbpath, PathBuf::from("/tmp/data"));
        assert_eq!(cli.dpolicy, DupPolicy::Skip);
        assert_eq!(cli.args, vec!["put", "x", "now", "-1"]);

        assert!(Cli::try_parse_from(["tslite", "-D", "bogus", "list"]).is_err());
        assert!(Cli::try_parse_from(["tslite"]).is_err());
    }

    #[test]
    fn test_split_col() {
        assert_eq!(split_col("abc").unwrap(), ("abc".to_string(), None));
        assert_eq!(split_col("abc:1").unwrap(), ("abc".to_string(), Some(1)));
        assert!(split_col("abc:x").is_err());
    }
}
