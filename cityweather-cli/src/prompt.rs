//! Interactive prompts. `inquire` blocks the calling thread, so prompts run
//! on the blocking pool.

use anyhow::{Context, Result};
use inquire::{InquireError, Select};

/// Run a prompt; `Ok(None)` when the user cancels (Esc / Ctrl-C).
pub async fn ask<T, F>(prompt: F) -> Result<Option<T>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, InquireError> + Send + 'static,
{
    let answer = tokio::task::spawn_blocking(prompt)
        .await
        .context("prompt task panicked")?;
    cancelled_as_none(answer)
}

fn cancelled_as_none<T>(answer: Result<T, InquireError>) -> Result<Option<T>> {
    match answer {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err).context("prompt failed"),
    }
}

/// Pick one of `options`, starting the cursor at `selected`.
pub async fn select<T>(message: &str, options: Vec<T>, selected: usize) -> Result<Option<T>>
where
    T: std::fmt::Display + Send + 'static,
{
    let message = message.to_string();
    ask(move || Select::new(&message, options).with_starting_cursor(selected).prompt()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_not_an_error() {
        let answer: Result<u8, _> = Err(InquireError::OperationCanceled);
        assert!(cancelled_as_none(answer).unwrap().is_none());

        let answer: Result<u8, _> = Err(InquireError::OperationInterrupted);
        assert!(cancelled_as_none(answer).unwrap().is_none());

        assert_eq!(cancelled_as_none(Ok(3u8)).unwrap(), Some(3));
    }

    #[test]
    fn other_failures_propagate() {
        let answer: Result<u8, _> = Err(InquireError::NotTTY);
        assert!(cancelled_as_none(answer).is_err());
    }
}
