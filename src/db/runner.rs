//! Line-oriented script runner.
//!
//! Feeds a script to the database one line at a time and renders the
//! outcome trace. The clock lives in the `Database`; all formatting and
//! printing live here, so the engine itself stays silent.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::db::api::{CommandResult, Database, DatabaseResult};

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Echo each input line before its results.
    pub echo: bool,
    /// Emit one JSON object per outcome instead of text lines.
    pub json: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { echo: false, json: false }
    }
}

/// Executes scripts against a database and prints the trace.
pub struct Runner {
    db: Database,
    config: RunnerConfig,
}

impl Runner {
    /// Create a runner with default configuration.
    pub fn new(db: Database) -> Self {
        Self { db, config: RunnerConfig::default() }
    }

    /// Create a runner with custom configuration.
    pub fn with_config(db: Database, config: RunnerConfig) -> Self {
        Self { db, config }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run every line of `reader`, writing trace output to `out`.
    ///
    /// Parse failures are reported to `out` and do not stop the run, so a
    /// bad line costs one diagnostic, not the rest of the script.
    pub fn run_reader<R: BufRead, W: Write>(
        &mut self,
        reader: R,
        out: &mut W,
    ) -> DatabaseResult<()> {
        for line in reader.lines() {
            let line = line?;
            if self.config.echo {
                writeln!(out, "> {}", line.trim_end())?;
            }
            match self.db.execute(&line) {
                Ok(None) => {}
                Ok(Some(result)) => self.write_result(&result, out)?,
                Err(e) => writeln!(out, "error: {e}")?,
            }
        }
        Ok(())
    }

    /// Run a script file, writing trace output to `out`.
    pub fn run_file<P: AsRef<Path>, W: Write>(
        &mut self,
        path: P,
        out: &mut W,
    ) -> DatabaseResult<()> {
        let file = File::open(path)?;
        self.run_reader(BufReader::new(file), out)
    }

    fn write_result<W: Write>(&self, result: &CommandResult, out: &mut W) -> DatabaseResult<()> {
        if self.config.json {
            return self.write_json(result, out);
        }
        match result {
            CommandResult::Trace(outcomes) => {
                for outcome in outcomes {
                    writeln!(out, "{outcome}")?;
                }
            }
            CommandResult::Dump(report) => {
                writeln!(out, "{report}")?;
            }
        }
        Ok(())
    }

    fn write_json<W: Write>(&self, result: &CommandResult, out: &mut W) -> DatabaseResult<()> {
        match result {
            CommandResult::Trace(outcomes) => {
                for outcome in outcomes {
                    let line = serde_json::to_string(outcome).map_err(std::io::Error::other)?;
                    writeln!(out, "{line}")?;
                }
            }
            CommandResult::Dump(report) => {
                let line = serde_json::to_string(report).map_err(std::io::Error::other)?;
                writeln!(out, "{line}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run_script(script: &str, config: RunnerConfig) -> String {
        let mut runner = Runner::with_config(Database::new(), config);
        let mut out = Vec::new();
        runner.run_reader(Cursor::new(script), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_simple_script_trace() {
        let script = "\
begin(T1)
R(T1,x2)
W(T1,x2,25)
end(T1)
";
        let output = run_script(script, RunnerConfig::default());
        assert_eq!(
            output,
            "T1 begins\nx2: 20\nT1 writes 25 to x2\nT1 commits\n"
        );
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let script = "\
// warm up
begin(T1)

R(T1,x4) // inline note
";
        let output = run_script(script, RunnerConfig::default());
        assert_eq!(output, "T1 begins\nx4: 40\n");
    }

    #[test]
    fn test_parse_error_reported_and_run_continues() {
        let script = "\
begin(T1)
bogus(T1)
R(T1,x2)
";
        let output = run_script(script, RunnerConfig::default());
        assert!(output.contains("error: parse error: unknown command: bogus"));
        assert!(output.ends_with("x2: 20\n"));
    }

    #[test]
    fn test_blocked_and_retry_trace() {
        let script = "\
begin(T1)
begin(T2)
W(T1,x2,21)
W(T2,x2,22)
end(T1)
end(T2)
";
        let output = run_script(script, RunnerConfig::default());
        assert_eq!(
            output,
            "T1 begins\nT2 begins\nT1 writes 21 to x2\nT2 blocked\n\
             T1 commits\nT2 writes 22 to x2\nT2 commits\n"
        );
    }

    #[test]
    fn test_dump_output_format() {
        let output = run_script("dump()\n", RunnerConfig::default());
        let lines: Vec<&str> = output.trim_end().lines().collect();
        assert_eq!(lines.len(), 10);
        assert!(lines[0].starts_with("site 1 - x2: 20, x4: 40"));
        assert!(lines[1].starts_with("site 2 - x1: 10, x2: 20"));
    }

    #[test]
    fn test_echo_mode() {
        let output = run_script("begin(T1)\n", RunnerConfig { echo: true, json: false });
        assert_eq!(output, "> begin(T1)\nT1 begins\n");
    }

    #[test]
    fn test_json_mode_emits_object_per_outcome() {
        let output = run_script("begin(T1)\n", RunnerConfig { echo: false, json: true });
        let value: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert!(value.get("Began").is_some());
    }

    #[test]
    fn test_run_file() {
        use std::io::Write as _;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("script.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "begin(T1)").unwrap();
        writeln!(file, "R(T1,x6)").unwrap();
        drop(file);

        let mut runner = Runner::new(Database::new());
        let mut out = Vec::new();
        runner.run_file(&path, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "T1 begins\nx6: 60\n");
    }
}
