use aliver_common::network::target::TargetError;
use thiserror::Error;

/// Errors that abort a sweep. Everything that can go wrong once probing has
/// started is absorbed by the engine instead.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    InvalidSpec(#[from] TargetError),

    #[error("raw ICMP socket unavailable: {reason}{}", render_hint(.hint))]
    SocketUnavailable {
        reason: std::io::Error,
        hint: Option<String>,
    },

    #[error("failed to build echo request: {0}")]
    Packet(String),
}

fn render_hint(hint: &Option<String>) -> String {
    hint.as_deref().map(|h| format!(" ({h})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, SweepError>;
