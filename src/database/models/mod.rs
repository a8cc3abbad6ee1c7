/// Implements [`crate::visibility::Shared`] for a row with the usual sharing columns
macro_rules! impl_shared {
    ($ty:ty) => {
        impl crate::visibility::Shared for $ty {
            fn created_by(&self) -> uuid::Uuid {
                self.created_by
            }
            fn partner_id(&self) -> Option<uuid::Uuid> {
                self.partner_id
            }
            fn group_id(&self) -> Option<uuid::Uuid> {
                self.group_id
            }
        }
    };
    ($ty:ty, topic) => {
        impl crate::visibility::Shared for $ty {
            fn created_by(&self) -> uuid::Uuid {
                self.created_by
            }
            fn partner_id(&self) -> Option<uuid::Uuid> {
                self.partner_id
            }
            fn group_id(&self) -> Option<uuid::Uuid> {
                self.group_id
            }
            fn topic_id(&self) -> Option<uuid::Uuid> {
                self.topic_id
            }
        }
    };
}

pub(crate) use impl_shared;

pub mod dog;
pub mod event;
pub mod group;
pub mod note;
pub mod partner;
pub mod photo;
pub mod profile;
pub mod push;
pub mod recipe;
pub mod routine;
pub mod shopping;
pub mod todo;
pub mod topic;
