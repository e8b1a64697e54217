pub mod calendar_service;
pub mod conversation_service;
pub mod delivery;
pub mod message_service;
pub mod presence_cache;

pub use calendar_service::CalendarService;
pub use conversation_service::ConversationService;
pub use message_service::MessageService;
