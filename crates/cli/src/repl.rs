//! Query loop
//!
//! One request JSON per line in, one response JSON per line out, flushed
//! immediately. Interactive mode (stdin is a TTY) gets a rustyline prompt
//! with history; pipe mode reads stdin line by line. Both share the same
//! per-line handler, and a failed line never stops the loop.

use std::io::{self, BufRead, Write};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::warn;

use crate::format::{error_response, success_response};
use crate::orchestrator::{run_query, QueryContext};
use crate::request::parse_request;

/// Handle one request line, always producing one response line
pub fn handle_line(ctx: &QueryContext<'_>, line: &str) -> String {
    let response = match parse_request(line) {
        Ok(request) => match run_query(ctx, &request) {
            Ok(outcome) => success_response(&outcome, request.format),
            Err(e) => {
                if !e.is_bad_request() {
                    warn!(error = %e, kind = %e.kind(), "query failed");
                }
                error_response(&e)
            }
        },
        Err(e) => error_response(&e),
    };
    response.to_string()
}

/// Run the interactive prompt
pub fn run_repl(ctx: &QueryContext<'_>) -> i32 {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("failed to start prompt: {}", e);
            return 1;
        }
    };

    loop {
        match rl.readline("texsearch> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);
                println!("{}", handle_line(ctx, trimmed));
                let _ = io::stdout().flush();
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("(error) {:?}", e);
                return 1;
            }
        }
    }
    0
}

/// Run in pipe mode: read request lines from stdin until EOF
pub fn run_pipe(ctx: &QueryContext<'_>) -> i32 {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if writeln!(stdout, "{}", handle_line(ctx, trimmed)).is_err() {
            return 1;
        }
        let _ = stdout.flush();
    }
    0
}
