/*!
Generational-handle entity store over sparse-set and chunked component storage
*/

pub mod chunked;
pub mod error;
pub mod free_list;
pub mod handle;
pub mod mask;
pub mod sparse;
pub mod store;
pub mod tag;
pub mod view;

pub mod prelude {
    pub use crate::{
        error::BorrowError,
        handle::{EntityHandle, Handle, Handle32_16, Handle32_8, Handle64_32},
        store::{Component, ComponentRefMut, StorageClass, Store, Tag},
        view::{ComponentView, ReverseComponentView, TagView},
    };
}
