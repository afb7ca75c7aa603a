pub mod internal;

pub use internal::{
    Conversation, ConversationStatus, Diary, DiaryDraft, DiaryUpdate, Message, Mood, NewDiary,
    Preferences, Role,
};
