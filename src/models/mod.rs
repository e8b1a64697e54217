pub mod calendar;
pub mod conversation;
pub mod message;
pub mod user;

pub use calendar::CalendarEvent;
pub use conversation::Conversation;
pub use message::{FileDescriptor, Message, MessageKind};
pub use user::DirectoryUser;
