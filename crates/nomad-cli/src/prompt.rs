use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use nomad_installer::{is_affirmative, Prompter};

/// Asks questions on stdout and reads answers from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn confirm(&self, question: &str) -> Result<bool> {
        let answer = self.ask_line(question)?;
        Ok(is_affirmative(&answer))
    }

    fn ask_line(&self, question: &str) -> Result<String> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{question} ").context("failed to write prompt")?;
        stdout.flush().context("failed to flush prompt")?;
        read_answer(&mut io::stdin().lock())
    }
}

pub fn read_answer<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .context("failed to read answer")?;
    if read == 0 {
        bail!("no answer, input is closed");
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
