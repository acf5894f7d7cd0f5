//! Terminal operator: prints the plan and asks before anything is changed

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};

use hs_core::traits::{Confirmation, OperatorSink, PlanEntry};

use crate::output::{format_plan, print_info};

/// Interpret one line of operator input.
///
/// ENTER or `y`/`yes` proceeds; anything else cancels.
pub fn parse_answer(line: &str) -> Confirmation {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" => Confirmation::Proceed,
        _ => Confirmation::Cancel,
    }
}

/// Read one answer from `input`. EOF cancels.
pub async fn read_answer<R: AsyncBufRead + Unpin>(input: &mut R) -> Confirmation {
    let mut line = String::new();
    match input.read_line(&mut line).await {
        Ok(0) => Confirmation::Cancel,
        Ok(_) => parse_answer(&line),
        Err(e) => {
            tracing::warn!("reading confirmation failed: {}", e);
            Confirmation::Cancel
        }
    }
}

/// [`OperatorSink`] on the controlling terminal
pub struct TerminalSink {
    verbose: bool,
}

impl TerminalSink {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait]
impl OperatorSink for TerminalSink {
    fn plan(&self, entries: &[PlanEntry]) {
        println!("{}", format_plan(entries));
    }

    fn verbose(&self, line: &str) {
        if self.verbose {
            print_info(line);
        }
    }

    async fn confirm(&self) -> Confirmation {
        let mut stdout = tokio::io::stdout();
        let _ = stdout
            .write_all(b"Press ENTER to swap, or type n to cancel: ")
            .await;
        let _ = stdout.flush().await;

        let mut stdin = BufReader::new(tokio::io::stdin());
        read_answer(&mut stdin).await
    }
}
