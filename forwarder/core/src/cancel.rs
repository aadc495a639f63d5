pub use tokio_util::sync::CancellationToken;

/// Returned when a reconcile observes its cancellation token between passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("reconcile cancelled before {stage}")]
pub struct Cancelled {
    pub stage: &'static str,
}

/// Checks the token before running `stage`.
pub fn check(token: &CancellationToken, stage: &'static str) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        tracing::debug!(%stage, "Reconcile cancelled");
        return Err(Cancelled { stage });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_token_passes() {
        let token = CancellationToken::new();
        assert_eq!(check(&token, "validate"), Ok(()));
    }

    #[test]
    fn cancelled_token_names_stage() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(
            check(&token, "generate"),
            Err(Cancelled { stage: "generate" })
        );
    }

    #[test]
    fn child_token_observes_parent() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        parent.cancel();
        assert!(check(&child, "migrate").is_err());
    }
}
