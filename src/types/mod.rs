//! 类型系统模块：缓存层与调用方共享的消息类型。
//!
//! # Types Module
//!
//! Strongly-typed message primitives exchanged between provider wrappers and
//! the conversation cache. Messages are stored inside cached contexts and form
//! part of the canonical request descriptor, so their serialized shape is
//! significant for cache key derivation.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and content |
//! | [`MessageRole`] | Message role (system, user, assistant, tool) |
//! | [`MessageContent`] | Plain text or a list of content blocks |
//!
//! ## Example
//!
//! ```rust
//! use ai_gateway_cache::types::{Message, MessageRole};
//!
//! let system = Message::system("You are a helpful assistant");
//! let user = Message::user("What's the weather?");
//! assert_eq!(user.role, MessageRole::User);
//! assert_eq!(system.text(), "You are a helpful assistant");
//! ```

pub mod message;

pub use message::{ContentBlock, Message, MessageContent, MessageRole};
