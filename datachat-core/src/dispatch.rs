// datachat-core/src/dispatch.rs

//! Client-side interpretation of stored message content: decide
//! whether a message is plain text or a data card, and in the card
//! case which kind to mount and how to render it.

use crate::envelope::{looks_like_conversion, mentions_earthquake, RenderMode, ResponseEnvelope};
use crate::models::domain::DataKind;

/// What the client should display for one stored assistant message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageView {
    /// Ordinary markdown text.
    PlainText(String),
    /// A domain-data card with accompanying text.
    Card {
        kind: DataKind,
        text: String,
        render_mode: RenderMode,
        envelope: ResponseEnvelope,
    },
}

/// Parses stored message content.
///
/// Content is only treated as an envelope when it is syntactically
/// wrapped in `{...}`; anything else, including JSON that fails to
/// parse, is shown verbatim.
pub fn parse_message_content(content: &str) -> MessageView {
    let trimmed = content.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return MessageView::PlainText(content.to_string());
    }

    let envelope: ResponseEnvelope = match serde_json::from_str(trimmed) {
        Ok(envelope) => envelope,
        Err(_) => return MessageView::PlainText(content.to_string()),
    };

    match envelope.populated_kind() {
        Some(kind) => {
            let text = if envelope.text.is_empty() {
                default_card_text(kind).to_string()
            } else {
                envelope.text.clone()
            };
            let render_mode = envelope
                .render_mode
                .unwrap_or_else(|| legacy_render_mode(kind, &text));
            MessageView::Card {
                kind,
                text,
                render_mode,
                envelope,
            }
        }
        None => MessageView::PlainText(content.to_string()),
    }
}

fn default_card_text(kind: DataKind) -> &'static str {
    match kind {
        DataKind::Weather => crate::envelope::WEATHER_TEXT,
        DataKind::Earthquake => crate::envelope::EARTHQUAKE_TEXT,
        DataKind::ExchangeRate => crate::envelope::EXCHANGE_RATE_TEXT,
        DataKind::Coin => crate::envelope::COIN_TEXT,
        DataKind::Stock => crate::envelope::STOCK_TEXT,
    }
}

/// Render-mode fallback for envelopes stored before the mode flag
/// existed, re-deriving it from the display text.
fn legacy_render_mode(kind: DataKind, text: &str) -> RenderMode {
    match kind {
        DataKind::Earthquake => {
            if mentions_earthquake(text) {
                RenderMode::Rich
            } else {
                RenderMode::Simple
            }
        }
        DataKind::ExchangeRate => {
            if looks_like_conversion(text) {
                RenderMode::Simple
            } else {
                RenderMode::Rich
            }
        }
        _ => RenderMode::Rich,
    }
}
