//! Per-table operator confirmation.
//!
//! Each table with matching rows is put to the operator as yes / no / all.
//! "All" is sticky: every later table in the run is deleted without asking.
//! A table with nothing to delete is skipped silently and leaves the sticky
//! state as it was.

use std::io::{BufRead, Write};

use crate::error::PruneError;

const ANSWER_FORMAT: &str = " Y[es]/N[o]/A[ll]: ";
const REPROMPT: &str = "Input yes or no or all:";

/// A recognised operator answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    All,
}

impl Answer {
    /// Case-insensitive, whitespace-trimmed; only y/yes/n/no/a/all.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "y" | "yes" => Some(Answer::Yes),
            "n" | "no" => Some(Answer::No),
            "a" | "all" => Some(Answer::All),
            _ => None,
        }
    }
}

/// Outcome for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    DeleteThis,
    DeleteThisAndRemaining,
}

impl Decision {
    pub fn deletes(self) -> bool {
        !matches!(self, Decision::Skip)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmState {
    Ask,
    AutoYes,
    Done,
}

/// Operator I/O plus the sticky "all" state for one run.
pub struct Confirmer<R, W> {
    input: R,
    output: W,
    state: ConfirmState,
}

impl<R: BufRead, W: Write> Confirmer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            state: ConfirmState::Ask,
        }
    }

    pub fn state(&self) -> ConfirmState {
        self.state
    }

    /// Operator-facing output, for reports written between prompts.
    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    /// Decide what happens to `table`, which has `count` matching rows.
    pub fn decide(&mut self, table: &str, count: i64) -> Result<Decision, PruneError> {
        if count == 0 {
            return Ok(Decision::Skip);
        }
        match self.state {
            ConfirmState::AutoYes => Ok(Decision::DeleteThisAndRemaining),
            ConfirmState::Done => {
                log::warn!("Confirmation for '{}' requested after the run finished", table);
                Ok(Decision::Skip)
            }
            ConfirmState::Ask => {
                let question = format!("{} records will be deleted. Continue?", count);
                match self.ask(&question)? {
                    Answer::Yes => Ok(Decision::DeleteThis),
                    Answer::No => Ok(Decision::Skip),
                    Answer::All => {
                        self.state = ConfirmState::AutoYes;
                        Ok(Decision::DeleteThisAndRemaining)
                    }
                }
            }
        }
    }

    /// Plain yes/no question outside the per-table flow; "all" counts as yes.
    /// The sticky state is neither consulted nor changed.
    pub fn ask_yes_no(&mut self, question: &str) -> Result<bool, PruneError> {
        Ok(!matches!(self.ask(question)?, Answer::No))
    }

    /// End the per-table flow.
    pub fn finish(&mut self) {
        self.state = ConfirmState::Done;
    }

    /// Prompt until a recognised answer arrives. Closed input is an error,
    /// never a default.
    fn ask(&mut self, question: &str) -> Result<Answer, PruneError> {
        loop {
            write!(self.output, "{}{}", question, ANSWER_FORMAT)?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(PruneError::InputClosed);
            }
            if let Some(answer) = Answer::parse(&line) {
                return Ok(answer);
            }
            writeln!(self.output, "{}", REPROMPT)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn confirmer(input: &str) -> Confirmer<Cursor<Vec<u8>>, Vec<u8>> {
        Confirmer::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn prompts(c: &Confirmer<Cursor<Vec<u8>>, Vec<u8>>) -> usize {
        String::from_utf8_lossy(&c.output).matches(ANSWER_FORMAT).count()
    }

    #[test]
    fn test_answer_parse() {
        assert_eq!(Answer::parse(" YES \n"), Some(Answer::Yes));
        assert_eq!(Answer::parse("n"), Some(Answer::No));
        assert_eq!(Answer::parse("All"), Some(Answer::All));
        assert_eq!(Answer::parse("yep"), None);
        assert_eq!(Answer::parse(""), None);
    }

    #[test]
    fn test_yes_deletes_this_only() {
        let mut c = confirmer("y\n");
        assert_eq!(c.decide("orders", 3).unwrap(), Decision::DeleteThis);
        assert_eq!(c.state(), ConfirmState::Ask);
    }

    #[test]
    fn test_no_skips_and_keeps_asking() {
        let mut c = confirmer("no\nyes\n");
        assert_eq!(c.decide("orders", 3).unwrap(), Decision::Skip);
        assert_eq!(c.decide("balance", 1).unwrap(), Decision::DeleteThis);
        assert_eq!(prompts(&c), 2);
    }

    #[test]
    fn test_invalid_input_reprompts() {
        let mut c = confirmer("maybe\n\nY\n");
        assert_eq!(c.decide("orders", 3).unwrap(), Decision::DeleteThis);
        assert_eq!(prompts(&c), 3);
        let out = String::from_utf8_lossy(&c.output).to_string();
        assert_eq!(out.matches(REPROMPT).count(), 2);
    }

    #[test]
    fn test_all_is_sticky_across_zero_match_tables() {
        let mut c = confirmer("a\n");
        assert_eq!(c.decide("orders", 2).unwrap(), Decision::DeleteThisAndRemaining);
        assert_eq!(c.decide("daily_balance", 0).unwrap(), Decision::Skip);
        assert_eq!(c.state(), ConfirmState::AutoYes);
        assert_eq!(c.decide("balance", 5).unwrap(), Decision::DeleteThisAndRemaining);
        assert_eq!(prompts(&c), 1);
    }

    #[test]
    fn test_zero_matches_never_prompts() {
        let mut c = confirmer("");
        assert_eq!(c.decide("orders", 0).unwrap(), Decision::Skip);
        assert_eq!(prompts(&c), 0);
    }

    #[test]
    fn test_closed_input_is_an_error() {
        let mut c = confirmer("what\n");
        assert!(matches!(c.decide("orders", 1), Err(PruneError::InputClosed)));
    }

    #[test]
    fn test_yes_no_question_treats_all_as_yes() {
        let mut c = confirmer("all\nn\n");
        assert!(c.ask_yes_no("Old backups detected, delete them?").unwrap());
        assert!(!c.ask_yes_no("Again?").unwrap());
        assert_eq!(c.state(), ConfirmState::Ask);
    }

    #[test]
    fn test_finished_workflow_skips() {
        let mut c = confirmer("");
        c.finish();
        assert_eq!(c.decide("orders", 4).unwrap(), Decision::Skip);
        assert_eq!(c.state(), ConfirmState::Done);
    }
}
