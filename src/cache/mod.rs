pub mod cache_impl;
pub mod entry;
pub mod expiry_list;
pub mod policy;
