// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod chat;
pub mod reformat;
pub mod session;

pub use chat::{ChatError, ChatService, EMPTY_MESSAGE_REPLY};
pub use reformat::{reformat, reformat_opt, split_segments, Segment, BULLET, FALLBACK_REPLY};
pub use session::{HistoryPolicy, SessionHandle, SessionStore, Transcript};
