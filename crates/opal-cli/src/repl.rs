//! Interactive SQL shell with line editing and multi-line input.

use std::borrow::Cow;

use anyhow::Result;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{CompletionType, Config, EditMode, Editor, Helper};
use tracing::error;

use opal_sql::storage::Engine;
use opal_sql::Session;

use crate::formatter;

/// The prompt shown when waiting for input.
const PROMPT: &str = "opal> ";

const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "INSERT", "INTO", "VALUES", "DELETE", "CREATE", "TABLE", "DROP",
    "INDEX", "USING", "PRIMARY", "KEY", "AND", "OR", "BETWEEN", "COPY", "INT", "FLOAT", "BOOLEAN",
    "VARCHAR",
];

/// REPL helper for rustyline: keyword completion plus a validator that
/// keeps reading until the statement ends with a semicolon.
struct ReplHelper;

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(|c: char| c.is_whitespace() || c == '(' || c == ',')
            .map(|i| i + 1)
            .unwrap_or(0);

        let word = line[start..pos].to_uppercase();
        let matches: Vec<Pair> = KEYWORDS
            .iter()
            .filter(|kw| kw.starts_with(&word))
            .map(|kw| Pair {
                display: kw.to_string(),
                replacement: kw.to_string(),
            })
            .collect();

        Ok((start, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        None
    }
}

impl Highlighter for ReplHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Borrowed(line)
    }
}

impl Validator for ReplHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let trimmed = ctx.input().trim();
        if trimmed.is_empty() || trimmed.starts_with('\\') || trimmed.ends_with(';') {
            Ok(ValidationResult::Valid(None))
        } else {
            Ok(ValidationResult::Incomplete)
        }
    }
}

impl Helper for ReplHelper {}

/// Interactive shell over one session.
pub struct Repl {
    session: Session,
    editor: Editor<ReplHelper, DefaultHistory>,
    timing: bool,
}

impl Repl {
    /// Creates a new REPL instance.
    pub fn new(session: Session) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .max_history_size(1000)?
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(ReplHelper));

        Ok(Self {
            session,
            editor,
            timing: false,
        })
    }

    /// Prints the welcome banner.
    pub fn print_banner(&self) {
        println!("OpalDB shell v{}", env!("CARGO_PKG_VERSION"));
        println!("Type \\? for help, \\q to quit.\n");
    }

    /// Runs the main read-eval-print loop.
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(line);

                    if line.starts_with('\\') {
                        if self.process_command(line) {
                            break;
                        }
                    } else {
                        self.execute_and_print(line);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("\\q");
                    break;
                }
                Err(e) => {
                    error!("readline error: {e}");
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Handles a backslash command. Returns true to exit.
    fn process_command(&mut self, line: &str) -> bool {
        match line {
            "\\q" | "\\quit" => return true,
            "\\?" | "\\help" => {
                println!("\\q         quit");
                println!("\\timing    toggle per-stage timing output");
                println!("\\d         list tables");
            }
            "\\timing" => {
                self.timing = !self.timing;
                println!("Timing is {}.", if self.timing { "on" } else { "off" });
            }
            "\\d" => {
                for table in self.session.engine().table_names() {
                    println!("{table}");
                }
            }
            other => println!("Unknown command: {other}"),
        }
        false
    }

    /// Executes SQL and prints the result.
    pub fn execute_and_print(&mut self, sql: &str) {
        let response = self.session.execute(sql);

        if response.failed() {
            eprintln!("ERROR {}: {}", response.code, response.error);
            return;
        }

        if response.records.is_empty() && response.column_names.is_empty() {
            println!("OK");
        } else {
            println!("{}", formatter::format_response(response));
            println!(
                "({} row{})",
                response.records.len(),
                if response.records.len() == 1 { "" } else { "s" }
            );
        }

        if self.timing && !response.query_times.is_empty() {
            println!("{}", formatter::format_times(response));
        }
    }

    /// The underlying session.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}
