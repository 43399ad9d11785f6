// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runnable context preparation: locale, chat history, stored context.

use serde_json::Value;
use skillrun_core::ChatMessage;
use skillrun_core::jobs::HistoryTurn;
use skillrun_core::types::HistoryRef;
use whatlang::{Lang, detect};

/// Locale value that requests detection from the query text.
pub const AUTO_LOCALE: &str = "auto";

const FALLBACK_LOCALE: &str = "en";

/// Picks the locale for an invocation.
///
/// An explicit request wins, then a non-`auto` default. Otherwise the query
/// language is detected, falling back to English when detection is unreliable.
pub fn resolve_locale(requested: Option<&str>, default_locale: &str, query: &str) -> String {
    let explicit = requested
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != AUTO_LOCALE);
    if let Some(locale) = explicit {
        return locale.to_string();
    }
    if default_locale != AUTO_LOCALE && !default_locale.trim().is_empty() {
        return default_locale.to_string();
    }
    detect_locale(query).unwrap_or(FALLBACK_LOCALE).to_string()
}

fn detect_locale(query: &str) -> Option<&'static str> {
    let info = detect(query).filter(|info| info.is_reliable())?;
    let locale = match info.lang() {
        Lang::Eng => "en",
        Lang::Cmn => "zh-CN",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Rus => "ru",
        Lang::Por => "pt",
        Lang::Ita => "it",
        _ => return None,
    };
    Some(locale)
}

/// Replays prior turns as alternating user/assistant messages.
pub fn chat_history(history: &[HistoryTurn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2);
    for turn in history {
        if !turn.query.is_empty() {
            messages.push(ChatMessage::user(&turn.query));
        }
        if !turn.answer.is_empty() {
            messages.push(ChatMessage::assistant(&turn.answer));
        }
    }
    messages
}

/// Minimal refs stored on the result instead of full turns.
pub fn history_refs(history: &[HistoryTurn]) -> Vec<HistoryRef> {
    history
        .iter()
        .map(|turn| HistoryRef {
            result_id: turn.result_id.clone(),
            version: turn.version,
            title: turn.title.clone(),
        })
        .collect()
}

/// Drops bulky `content` fields from context entries before storage.
///
/// Entries are the objects inside the context's top-level arrays; their
/// nested objects are purged too.
pub fn purge_context(context: &Value) -> Value {
    let mut purged = context.clone();
    if let Value::Object(map) = &mut purged {
        for value in map.values_mut() {
            if let Value::Array(entries) = value {
                entries.iter_mut().for_each(strip_content);
            }
        }
    }
    purged
}

fn strip_content(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("content");
            map.values_mut().for_each(strip_content);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_content),
        _ => {}
    }
}
