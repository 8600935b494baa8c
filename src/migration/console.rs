//! Operator-facing progress output
//!
//! Each step prints `"<label> ... "` and is completed with a green `OK` or a
//! red `FAILED`. Output is best-effort: a broken terminal never fails a
//! migration.

use colored::Colorize;
use std::io::{self, Stdout, Write};

pub struct Console<W: Write> {
    out: W,
}

impl Console<Stdout> {
    pub fn stdout() -> Self {
        Console::new(io::stdout())
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Console { out }
    }

    pub fn begin(&mut self, label: &str) {
        let _ = write!(self.out, "{} ... ", label);
        let _ = self.out.flush();
    }

    pub fn ok(&mut self) {
        let _ = writeln!(self.out, "{}", "OK".green());
    }

    /// `OK` followed by a dimmed remark, e.g. "(already exists)"
    pub fn ok_with(&mut self, remark: &str) {
        let _ = writeln!(self.out, "{} {}", "OK".green(), remark.dimmed());
    }

    pub fn failed(&mut self) {
        let _ = writeln!(self.out, "{}", "FAILED".red().bold());
    }

    /// Rewrite the current line with an updated percentage
    pub fn progress(&mut self, label: &str, percent: i32) {
        let _ = write!(self.out, "\r{} ... {:>3}%", label, percent);
        let _ = self.out.flush();
    }

    /// Terminate an in-place progress line
    pub fn end_progress(&mut self, success: bool) {
        if success {
            let _ = writeln!(self.out, " {}", "OK".green());
        } else {
            let _ = writeln!(self.out, " {}", "FAILED".red().bold());
        }
    }

    pub fn success(&mut self, message: &str) {
        let _ = writeln!(self.out, "{}", message.green().bold());
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
