mod codec;
pub mod conversation_log;
pub mod knowledge_store;
pub mod migrations;

pub use conversation_log::{
    ChatMessage, ChatSession, ConversationLog, NewChatMessage, SqliteConversationLog,
};
pub use knowledge_store::{KnowledgeItem, KnowledgeStore, NewKnowledgeItem, SqliteKnowledgeStore};
